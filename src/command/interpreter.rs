//! Top-level command interpreter
//!
//! Owns the dialogue context and drives one command at a time:
//! clarify or resolve references -> model -> validate -> resolve, with
//! bounded replanning on rejection or failure.

use crate::backend::{ExecutionResult, MotionBackend};
use crate::command::clarify::{Clarifier, Clarity};
use crate::command::replan::{AttemptRecord, ReplanOutcome, ReplanningLoop};
use crate::command::resolver::ActionResolver;
use crate::core::config::ArmConfig;
use crate::core::error::{ArmError, Result};
use crate::llm::context::{ContextEntry, ContextStore, Reference};
use crate::llm::{ActionModel, ModelRequest};
use crate::safety::SafetyPolicy;
use crate::schema::{ActionVocabulary, Plan, SchemaValidator};

/// What a handled command produced
#[derive(Debug, Clone)]
pub enum Outcome {
    /// The plan ran to completion
    Completed {
        plan: Plan,
        attempts: Vec<AttemptRecord>,
    },
    /// Nothing ran; the user needs to answer this first
    Clarification { question: String },
}

pub struct Interpreter<M, B> {
    model: M,
    validator: SchemaValidator,
    resolver: ActionResolver<B>,
    replanner: ReplanningLoop,
    context: ContextStore,
    clarifier: Clarifier,
    /// Command waiting on the answer to a clarifying question
    pending: Option<String>,
}

impl<M: ActionModel, B: MotionBackend> Interpreter<M, B> {
    pub fn new(model: M, backend: B, config: &ArmConfig) -> Self {
        let validator = SchemaValidator::new(
            ActionVocabulary::standard(),
            SafetyPolicy::from_config(&config.safety),
        );
        let context = ContextStore::new(config.interpreter.context_capacity)
            .with_scene_objects(config.scene.frames.keys().cloned().collect());

        Self::with_parts(
            model,
            validator,
            ActionResolver::new(backend),
            ReplanningLoop::new(config.interpreter.max_retries),
            context,
        )
    }

    pub fn with_parts(
        model: M,
        validator: SchemaValidator,
        resolver: ActionResolver<B>,
        replanner: ReplanningLoop,
        context: ContextStore,
    ) -> Self {
        Self {
            model,
            validator,
            resolver,
            replanner,
            context,
            clarifier: Clarifier::new(),
            pending: None,
        }
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn validator(&self) -> &SchemaValidator {
        &self.validator
    }

    pub fn context(&self) -> &ContextStore {
        &self.context
    }

    pub fn clear_context(&mut self) {
        self.context.clear();
        self.pending = None;
    }

    pub fn resolver(&self) -> &ActionResolver<B> {
        &self.resolver
    }

    pub fn backend(&self) -> &B {
        self.resolver.backend()
    }

    pub fn backend_mut(&mut self) -> &mut B {
        self.resolver.backend_mut()
    }

    /// The command waiting on a clarification answer, if any
    pub fn pending(&self) -> Option<&str> {
        self.pending.as_deref()
    }

    /// Interpret and execute one command
    ///
    /// Completed and terminally failed turns are both recorded in the
    /// context. A clarifying question is not.
    pub async fn handle(&mut self, text: &str) -> Result<Outcome> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ArmError::EmptyCommand);
        }

        let command = match self.pending.take() {
            Some(pending) if self.clarifier.looks_like_answer(text) => {
                self.clarifier.apply_answer(&pending, text)
            }
            _ => match self.clarifier.check(text, &self.context) {
                Clarity::Clear(command) => command,
                Clarity::Ask(question) => {
                    tracing::info!("asking for clarification: {}", text);
                    self.pending = Some(text.to_string());
                    return Ok(Outcome::Clarification { question });
                }
            },
        };

        tracing::info!("handling command: {}", command);
        let request = self.request(&command);
        let outcome = match self
            .replanner
            .run(&self.model, &self.validator, &mut self.resolver, request)
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!("model unavailable: {}", e);
                self.context.record(ContextEntry::new(
                    command,
                    None,
                    ExecutionResult::failure(e.to_string()),
                ));
                return Err(e);
            }
        };

        match outcome {
            ReplanOutcome::Resolved { plan, attempts } => {
                self.context.record(ContextEntry::new(
                    command,
                    Some(plan.clone()),
                    ExecutionResult::success(),
                ));
                Ok(Outcome::Completed { plan, attempts })
            }
            ReplanOutcome::Exhausted {
                last_plan,
                last_reason,
                attempts,
            } => {
                tracing::warn!("giving up on '{}': {}", command, last_reason);
                self.context.record(ContextEntry::new(
                    command,
                    last_plan,
                    ExecutionResult::failure(last_reason.clone()),
                ));
                Err(ArmError::RetriesExhausted {
                    attempts: attempts.len(),
                    last_reason,
                })
            }
        }
    }

    /// One model call and validation, nothing executed or recorded
    pub async fn compile(&self, text: &str) -> Result<Plan> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ArmError::EmptyCommand);
        }

        let command = match self.context.resolve_references(text) {
            Reference::Resolved { text, .. } => text,
            _ => text.to_string(),
        };
        let candidate = self.model.propose(&self.request(&command)).await?;
        self.validator
            .validate_plan(&candidate)
            .map_err(ArmError::Rejected)
    }

    fn request(&self, command: &str) -> ModelRequest {
        ModelRequest {
            context: self.context.summary(),
            known_objects: self.context.known_objects(),
            ..ModelRequest::new(command)
        }
    }
}
