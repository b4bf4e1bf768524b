//! Action resolution - runs validated plans on the motion backend

use crate::backend::{ExecutionResult, ExecutionStatus, MotionBackend};
use crate::schema::Plan;

/// Drives a backend through a plan, one step at a time
pub struct ActionResolver<B> {
    backend: B,
    invocations: usize,
}

impl<B: MotionBackend> ActionResolver<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            invocations: 0,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn into_backend(self) -> B {
        self.backend
    }

    /// Plans handed to `resolve` so far
    pub fn invocations(&self) -> usize {
        self.invocations
    }

    /// Execute a plan, stopping at the first failing step
    ///
    /// The failure reason is prefixed with the step index, e.g.
    /// `step_1:place_plan_failed`.
    pub async fn resolve(&mut self, plan: &Plan) -> ExecutionResult {
        self.invocations += 1;
        self.backend.apply_globals(plan.globals());

        for (i, step) in plan.steps().iter().enumerate() {
            let result = self.backend.execute(step).await;
            if result.is_success() {
                tracing::debug!("step {} ({}) done on {}", i, step.name(), self.backend.name());
                continue;
            }

            let reason = match result.reason() {
                "" => "unknown_failure",
                r => r,
            };
            tracing::warn!("step {} ({}) failed: {}", i, step.name(), reason);
            return ExecutionResult {
                status: ExecutionStatus::Failure,
                failure_reason: Some(format!("step_{}:{}", i, reason)),
                failed_step: Some(i),
            };
        }

        ExecutionResult::success()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::SimulatedArm;
    use crate::schema::{CandidateAction, CandidatePlan, SchemaValidator};

    fn plan(steps: Vec<CandidateAction>) -> Plan {
        SchemaValidator::default()
            .validate_plan(&CandidatePlan {
                steps,
                globals: Default::default(),
            })
            .unwrap()
    }

    #[tokio::test]
    async fn test_resolve_pick_and_place() {
        let mut resolver = ActionResolver::new(SimulatedArm::default());
        let result = resolver
            .resolve(&plan(vec![
                CandidateAction::new("pick").with("object", "red_cube"),
                CandidateAction::new("place").with("target", "blue_box"),
            ]))
            .await;
        assert!(result.is_success());
        assert_eq!(resolver.invocations(), 1);
        assert!(resolver.backend().holding().is_none());
    }

    #[tokio::test]
    async fn test_failure_names_the_step() {
        let mut resolver = ActionResolver::new(SimulatedArm::default());
        let result = resolver
            .resolve(&plan(vec![
                CandidateAction::new("pick").with("object", "red_cube"),
                CandidateAction::new("place").with("target", "shelf"),
            ]))
            .await;
        assert_eq!(result.status, ExecutionStatus::Failure);
        assert_eq!(result.failed_step, Some(1));
        assert_eq!(result.reason(), "step_1:tf_lookup_failed:shelf");
    }

    #[tokio::test]
    async fn test_steps_after_failure_are_skipped() {
        let mut resolver = ActionResolver::new(SimulatedArm::default());
        resolver
            .resolve(&plan(vec![
                CandidateAction::new("place").with("target", "blue_box"),
                CandidateAction::new("pick").with("object", "red_cube"),
            ]))
            .await;
        assert!(resolver.backend().motions().is_empty());
        assert!(resolver.backend().holding().is_none());
    }
}
