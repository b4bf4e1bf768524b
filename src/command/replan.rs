//! Bounded replanning
//!
//! Each attempt asks the model for a candidate, validates it and, if valid,
//! runs it. A rejection or failure becomes the feedback for the next
//! attempt. The loop makes at most `1 + max_retries` attempts.

use crate::backend::{ExecutionResult, MotionBackend};
use crate::command::resolver::ActionResolver;
use crate::core::error::{ArmError, Result};
use crate::llm::{ActionModel, ModelRequest};
use crate::schema::{Plan, Rejection, SchemaValidator};

/// What happened on one attempt
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    /// The model reply could not be read as a plan
    Unparsable(String),
    /// The validator turned the candidate away
    Rejected(Rejection),
    /// Valid plan, but the backend reported a failure
    Failed(ExecutionResult),
    Succeeded,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttemptRecord {
    /// 1-based
    pub attempt: usize,
    pub outcome: AttemptOutcome,
}

impl AttemptRecord {
    /// Whether this attempt reached the backend
    pub fn executed(&self) -> bool {
        matches!(
            self.outcome,
            AttemptOutcome::Failed(_) | AttemptOutcome::Succeeded
        )
    }
}

/// Final state of a replanning run
#[derive(Debug, Clone)]
pub enum ReplanOutcome {
    Resolved {
        plan: Plan,
        attempts: Vec<AttemptRecord>,
    },
    Exhausted {
        /// Last plan that passed validation, if any did
        last_plan: Option<Plan>,
        last_reason: String,
        attempts: Vec<AttemptRecord>,
    },
}

impl ReplanOutcome {
    pub fn attempts(&self) -> &[AttemptRecord] {
        match self {
            ReplanOutcome::Resolved { attempts, .. } => attempts,
            ReplanOutcome::Exhausted { attempts, .. } => attempts,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplanningLoop {
    max_retries: usize,
}

impl ReplanningLoop {
    pub fn new(max_retries: usize) -> Self {
        Self { max_retries }
    }

    pub fn max_retries(&self) -> usize {
        self.max_retries
    }

    pub fn max_attempts(&self) -> usize {
        self.max_retries.saturating_add(1)
    }

    /// Run attempts until one succeeds or the budget is spent
    ///
    /// Only a terminal model error (not an unusable reply) returns `Err`.
    pub async fn run<M, B>(
        &self,
        model: &M,
        validator: &SchemaValidator,
        resolver: &mut ActionResolver<B>,
        mut request: ModelRequest,
    ) -> Result<ReplanOutcome>
    where
        M: ActionModel + ?Sized,
        B: MotionBackend,
    {
        let mut attempts = Vec::new();
        let mut last_plan = None;

        for attempt in 1..=self.max_attempts() {
            request.attempt = attempt;
            tracing::debug!(attempt, model = model.name(), "requesting candidate");

            let candidate = match model.propose(&request).await {
                Ok(candidate) => candidate,
                Err(ArmError::ModelOutput(why)) => {
                    tracing::warn!(attempt, "unusable model reply: {}", why);
                    request.failure_reason = Some(format!("unparsable_reply: {}", why));
                    attempts.push(AttemptRecord {
                        attempt,
                        outcome: AttemptOutcome::Unparsable(why),
                    });
                    continue;
                }
                Err(e) => return Err(e),
            };

            let plan = match validator.validate_plan(&candidate) {
                Ok(plan) => plan,
                Err(rejection) => {
                    tracing::warn!(attempt, "candidate rejected: {}", rejection);
                    request.failure_reason = Some(rejection.to_string());
                    attempts.push(AttemptRecord {
                        attempt,
                        outcome: AttemptOutcome::Rejected(rejection),
                    });
                    continue;
                }
            };

            let result = resolver.resolve(&plan).await;
            if result.is_success() {
                tracing::info!(attempt, "plan executed: {}", plan.describe());
                attempts.push(AttemptRecord {
                    attempt,
                    outcome: AttemptOutcome::Succeeded,
                });
                return Ok(ReplanOutcome::Resolved { plan, attempts });
            }

            tracing::warn!(attempt, "execution failed: {}", result.reason());
            request.failure_reason = Some(result.reason().to_string());
            attempts.push(AttemptRecord {
                attempt,
                outcome: AttemptOutcome::Failed(result),
            });
            last_plan = Some(plan);
        }

        let last_reason = request
            .failure_reason
            .unwrap_or_else(|| "no attempts made".to_string());
        Ok(ReplanOutcome::Exhausted {
            last_plan,
            last_reason,
            attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::SimulatedArm;
    use crate::llm::KeywordActionModel;
    use crate::schema::{CandidateAction, CandidatePlan};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Replays canned replies and remembers every request
    struct Scripted {
        replies: Mutex<Vec<Result<CandidatePlan>>>,
        seen: Mutex<Vec<ModelRequest>>,
    }

    impl Scripted {
        fn new(mut replies: Vec<Result<CandidatePlan>>) -> Self {
            replies.reverse();
            Self {
                replies: Mutex::new(replies),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ActionModel for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn propose(&self, request: &ModelRequest) -> Result<CandidatePlan> {
            self.seen.lock().unwrap().push(request.clone());
            self.replies
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Ok(CandidatePlan::default()))
        }
    }

    fn pick(object: &str) -> CandidatePlan {
        CandidatePlan::single(CandidateAction::new("pick").with("object", object))
    }

    #[tokio::test]
    async fn test_first_attempt_success() {
        let model = Scripted::new(vec![Ok(pick("red_cube"))]);
        let mut resolver = ActionResolver::new(SimulatedArm::default());
        let outcome = ReplanningLoop::new(2)
            .run(&model, &SchemaValidator::default(), &mut resolver, ModelRequest::new("pick the red cube"))
            .await
            .unwrap();
        assert!(matches!(outcome, ReplanOutcome::Resolved { .. }));
        assert_eq!(outcome.attempts().len(), 1);
    }

    #[tokio::test]
    async fn test_backend_failure_feeds_back() {
        let model = Scripted::new(vec![Ok(pick("cube")), Ok(pick("red_cube"))]);
        let mut resolver = ActionResolver::new(SimulatedArm::default());
        let outcome = ReplanningLoop::new(2)
            .run(&model, &SchemaValidator::default(), &mut resolver, ModelRequest::new("pick the cube"))
            .await
            .unwrap();

        assert!(matches!(outcome, ReplanOutcome::Resolved { .. }));
        let seen = model.seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].failure_reason, None);
        assert_eq!(seen[1].attempt, 2);
        assert_eq!(
            seen[1].failure_reason.as_deref(),
            Some("step_0:tf_lookup_failed:cube")
        );
        assert_eq!(seen[1].command, "pick the cube");
    }

    #[tokio::test]
    async fn test_rejection_is_recovered_locally() {
        let model = Scripted::new(vec![
            Ok(CandidatePlan::single(CandidateAction::new("yeet"))),
            Ok(pick("red_cube")),
        ]);
        let mut resolver = ActionResolver::new(SimulatedArm::default());
        let outcome = ReplanningLoop::new(1)
            .run(&model, &SchemaValidator::default(), &mut resolver, ModelRequest::new("throw it"))
            .await
            .unwrap();

        assert!(matches!(outcome, ReplanOutcome::Resolved { .. }));
        assert!(matches!(
            outcome.attempts()[0].outcome,
            AttemptOutcome::Rejected(_)
        ));
        assert_eq!(resolver.invocations(), 1);
    }

    #[tokio::test]
    async fn test_unparsable_reply_counts_as_attempt() {
        let model = Scripted::new(vec![
            Err(ArmError::ModelOutput("No JSON found in response".into())),
            Ok(pick("red_cube")),
        ]);
        let mut resolver = ActionResolver::new(SimulatedArm::default());
        let outcome = ReplanningLoop::new(1)
            .run(&model, &SchemaValidator::default(), &mut resolver, ModelRequest::new("pick"))
            .await
            .unwrap();
        assert_eq!(outcome.attempts().len(), 2);
        let seen = model.seen.lock().unwrap();
        assert!(seen[1]
            .failure_reason
            .as_deref()
            .unwrap()
            .starts_with("unparsable_reply"));
    }

    #[tokio::test]
    async fn test_transport_error_is_terminal() {
        let model = Scripted::new(vec![Err(ArmError::Llm("connection refused".into()))]);
        let mut resolver = ActionResolver::new(SimulatedArm::default());
        let result = ReplanningLoop::new(3)
            .run(&model, &SchemaValidator::default(), &mut resolver, ModelRequest::new("pick"))
            .await;
        assert!(matches!(result, Err(ArmError::Llm(_))));
        assert_eq!(model.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_exhaustion_keeps_last_plan_and_reason() {
        let model = KeywordActionModel::new();
        let mut resolver = ActionResolver::new(SimulatedArm::default());
        let outcome = ReplanningLoop::new(2)
            .run(
                &model,
                &SchemaValidator::default(),
                &mut resolver,
                ModelRequest::new("pick the green ball"),
            )
            .await
            .unwrap();

        match outcome {
            ReplanOutcome::Exhausted {
                last_plan,
                last_reason,
                attempts,
            } => {
                assert_eq!(attempts.len(), 3);
                assert_eq!(last_reason, "step_0:tf_lookup_failed:green_ball");
                assert_eq!(last_plan.unwrap().describe(), "pick(green_ball)");
            }
            other => panic!("expected exhaustion, got {:?}", other),
        }
        assert_eq!(resolver.invocations(), 3);
    }

    #[tokio::test]
    async fn test_zero_retries_means_one_attempt() {
        let model = Scripted::new(vec![Ok(pick("nowhere")), Ok(pick("red_cube"))]);
        let mut resolver = ActionResolver::new(SimulatedArm::default());
        let outcome = ReplanningLoop::new(0)
            .run(&model, &SchemaValidator::default(), &mut resolver, ModelRequest::new("pick"))
            .await
            .unwrap();
        assert!(matches!(outcome, ReplanOutcome::Exhausted { .. }));
        assert_eq!(outcome.attempts().len(), 1);
    }
}
