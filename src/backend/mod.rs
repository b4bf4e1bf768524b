//! Motion-planning backends
//!
//! A backend receives validated actions one at a time and reports whether
//! the motion succeeded. It never sees free text.

pub mod sim;

pub use sim::SimulatedArm;

use crate::schema::{Action, MotionGlobals};
use async_trait::async_trait;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Success,
    Failure,
}

/// Outcome of executing an action or a plan
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionResult {
    pub status: ExecutionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    /// Index of the step that failed when this describes a plan
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_step: Option<usize>,
}

impl ExecutionResult {
    pub fn success() -> Self {
        Self {
            status: ExecutionStatus::Success,
            failure_reason: None,
            failed_step: None,
        }
    }

    pub fn failure(reason: impl Into<String>) -> Self {
        Self {
            status: ExecutionStatus::Failure,
            failure_reason: Some(reason.into()),
            failed_step: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ExecutionStatus::Success
    }

    /// Reason text, empty for successes
    pub fn reason(&self) -> &str {
        self.failure_reason.as_deref().unwrap_or("")
    }
}

/// The motion planner collaborator
#[async_trait]
pub trait MotionBackend: Send {
    /// Short name for logs
    fn name(&self) -> &str;

    /// Velocity and acceleration scaling for the following steps
    fn apply_globals(&mut self, globals: MotionGlobals);

    /// Plan and execute one action
    async fn execute(&mut self, action: &Action) -> ExecutionResult;
}
