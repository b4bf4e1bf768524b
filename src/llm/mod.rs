//! Language-model side of the interpreter
//!
//! The model is a collaborator: it turns a command (plus context and any
//! failure feedback) into a candidate plan. Two implementations ship here,
//! an HTTP-backed LLM and an offline keyword matcher.

pub mod client;
pub mod context;
pub mod keyword;
pub mod parser;

pub use client::LlmClient;
pub use context::{substitute_references, ContextEntry, ContextStore, Reference};
pub use keyword::KeywordActionModel;
pub use parser::LlmActionModel;

use crate::core::error::Result;
use crate::schema::CandidatePlan;
use async_trait::async_trait;

/// Everything the model sees for one attempt
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelRequest {
    /// The user's command after reference resolution
    pub command: String,
    /// Recent turns rendered as text
    pub context: String,
    /// Objects the scene or the dialogue knows about
    pub known_objects: Vec<String>,
    /// Why the previous candidate was rejected or failed, if any
    pub failure_reason: Option<String>,
    /// 1-based attempt number
    pub attempt: usize,
}

impl ModelRequest {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            attempt: 1,
            ..Self::default()
        }
    }

    pub fn is_retry(&self) -> bool {
        self.failure_reason.is_some()
    }
}

/// The language-model collaborator
#[async_trait]
pub trait ActionModel: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &str;

    /// Propose a plan.
    ///
    /// `ArmError::ModelOutput` means the reply was unusable and another
    /// attempt may help; any other error is terminal.
    async fn propose(&self, request: &ModelRequest) -> Result<CandidatePlan>;
}

#[async_trait]
impl<T: ActionModel + ?Sized> ActionModel for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn propose(&self, request: &ModelRequest) -> Result<CandidatePlan> {
        (**self).propose(request).await
    }
}
