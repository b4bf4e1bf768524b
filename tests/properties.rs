//! Property tests for the validator, context store and replanning loop

use armctl::backend::{ExecutionResult, SimulatedArm};
use armctl::command::{ActionResolver, ReplanningLoop};
use armctl::core::error::Result;
use armctl::llm::{ActionModel, ContextEntry, ContextStore, ModelRequest};
use armctl::schema::{CandidateAction, CandidatePlan, RejectionCode, SchemaValidator};
use async_trait::async_trait;
use proptest::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Proposes a valid plan that fails on the arm, or an invalid one, per script
struct Alternating {
    script: Mutex<Vec<bool>>,
    calls: AtomicUsize,
}

impl Alternating {
    fn new(valid_per_attempt: Vec<bool>) -> Self {
        let mut script = valid_per_attempt;
        script.reverse();
        Self {
            script: Mutex::new(script),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ActionModel for Alternating {
    fn name(&self) -> &str {
        "alternating"
    }

    async fn propose(&self, _request: &ModelRequest) -> Result<CandidatePlan> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let valid = self.script.lock().unwrap().pop().unwrap_or(false);
        let step = if valid {
            CandidateAction::new("pick").with("object", "not_in_scene")
        } else {
            CandidateAction::new("teleport")
        };
        Ok(CandidatePlan::single(step))
    }
}

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
        .block_on(future)
}

proptest! {
    #[test]
    fn unknown_action_names_are_rejected(name in "[a-z_]{1,12}") {
        prop_assume!(!matches!(name.as_str(), "pick" | "place" | "move_ee"));
        let rejection = SchemaValidator::default()
            .validate_action(&CandidateAction::new(name))
            .unwrap_err();
        prop_assert_eq!(rejection.code, RejectionCode::InvalidAction);
    }

    #[test]
    fn context_never_exceeds_capacity(capacity in 0usize..10, turns in 0usize..30) {
        let mut store = ContextStore::new(capacity);
        for i in 0..turns {
            store.record(ContextEntry::new(format!("command {}", i), None, ExecutionResult::success()));
            prop_assert!(store.len() <= store.capacity());
        }
        prop_assert_eq!(store.len(), turns.min(capacity.max(1)));
    }

    #[test]
    fn model_calls_bounded_by_retries(max_retries in 0usize..6) {
        let model = Alternating::new(Vec::new());
        let mut resolver = ActionResolver::new(SimulatedArm::default());
        let outcome = block_on(ReplanningLoop::new(max_retries).run(
            &model,
            &SchemaValidator::default(),
            &mut resolver,
            ModelRequest::new("teleport home"),
        ))
        .unwrap();
        prop_assert_eq!(model.calls.load(Ordering::SeqCst), max_retries + 1);
        prop_assert_eq!(outcome.attempts().len(), max_retries + 1);
    }

    #[test]
    fn resolver_runs_once_per_valid_attempt(
        script in prop::collection::vec(any::<bool>(), 1..8),
        max_retries in 0usize..8,
    ) {
        let scripted = script.len().min(max_retries + 1);
        let expected = script[..scripted].iter().filter(|v| **v).count();

        let model = Alternating::new(script);
        let mut resolver = ActionResolver::new(SimulatedArm::default());
        let outcome = block_on(ReplanningLoop::new(max_retries).run(
            &model,
            &SchemaValidator::default(),
            &mut resolver,
            ModelRequest::new("pick something"),
        ))
        .unwrap();

        prop_assert_eq!(resolver.invocations(), expected);
        let executed = outcome.attempts().iter().filter(|a| a.executed()).count();
        prop_assert_eq!(executed, expected);
    }
}
