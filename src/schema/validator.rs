//! Schema validation of model output
//!
//! Pure checks, no side effects. A candidate plan either becomes a [`Plan`]
//! or is turned away with a [`Rejection`] whose rendered text goes back to
//! the model on the next attempt.

use crate::safety::SafetyPolicy;
use crate::schema::action::{Action, CandidateAction, CandidatePlan, Plan};
use crate::schema::vocabulary::ActionVocabulary;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Why a candidate was turned away
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionCode {
    EmptyPlan,
    InvalidAction,
    DisallowedAction,
    MissingArgument,
    WrongType,
    UnknownArgument,
    MissingAlternative,
    OutOfWorkspace,
    VelTooHigh,
    AccelTooHigh,
    InvalidScale,
}

impl RejectionCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectionCode::EmptyPlan => "empty_plan",
            RejectionCode::InvalidAction => "invalid_action",
            RejectionCode::DisallowedAction => "disallowed_action",
            RejectionCode::MissingArgument => "missing_argument",
            RejectionCode::WrongType => "wrong_type",
            RejectionCode::UnknownArgument => "unknown_argument",
            RejectionCode::MissingAlternative => "missing_alternative",
            RejectionCode::OutOfWorkspace => "out_of_workspace",
            RejectionCode::VelTooHigh => "vel_too_high",
            RejectionCode::AccelTooHigh => "accel_too_high",
            RejectionCode::InvalidScale => "invalid_scale",
        }
    }
}

/// A validation failure with a hint for the model
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rejection {
    pub code: RejectionCode,
    /// Index of the offending step, `None` for plan-level problems
    pub step: Option<usize>,
    pub hint: String,
}

impl Rejection {
    pub fn new(code: RejectionCode, hint: impl Into<String>) -> Self {
        Self {
            code,
            step: None,
            hint: hint.into(),
        }
    }

    pub fn at_step(mut self, step: usize) -> Self {
        self.step = Some(step);
        self
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(step) = self.step {
            write!(f, "step_{}:", step)?;
        }
        write!(f, "{}: {}", self.code.as_str(), self.hint)
    }
}

/// Checks candidates against the vocabulary and the safety policy
#[derive(Debug, Clone)]
pub struct SchemaValidator {
    vocabulary: ActionVocabulary,
    policy: SafetyPolicy,
}

impl SchemaValidator {
    pub fn new(vocabulary: ActionVocabulary, policy: SafetyPolicy) -> Self {
        Self { vocabulary, policy }
    }

    pub fn vocabulary(&self) -> &ActionVocabulary {
        &self.vocabulary
    }

    pub fn policy(&self) -> &SafetyPolicy {
        &self.policy
    }

    /// Validate a whole plan; the first problem found wins
    pub fn validate_plan(&self, candidate: &CandidatePlan) -> Result<Plan, Rejection> {
        if candidate.steps.is_empty() {
            return Err(Rejection::new(
                RejectionCode::EmptyPlan,
                "the plan has no steps; emit at least one action",
            ));
        }

        let mut steps = Vec::with_capacity(candidate.steps.len());
        for (i, step) in candidate.steps.iter().enumerate() {
            let action = self.validate_action(step).map_err(|r| r.at_step(i))?;
            steps.push(action);
        }

        self.policy.check_globals(&candidate.globals)?;

        Ok(Plan::new(steps, candidate.globals))
    }

    /// Validate one step: name, arguments, then safety
    pub fn validate_action(&self, candidate: &CandidateAction) -> Result<Action, Rejection> {
        let signature = self.vocabulary.lookup(&candidate.name).ok_or_else(|| {
            let names: Vec<&str> = self.vocabulary.names().iter().map(|n| n.as_str()).collect();
            Rejection::new(
                RejectionCode::InvalidAction,
                format!("'{}' is not an action; use one of {:?}", candidate.name, names),
            )
        })?;

        self.policy.check_allowed(signature.name)?;

        for key in candidate.arguments.keys() {
            if signature.param(key).is_none() {
                return Err(Rejection::new(
                    RejectionCode::UnknownArgument,
                    format!("{} does not take '{}'", signature.name, key),
                ));
            }
        }

        let mut arguments = BTreeMap::new();
        for spec in &signature.params {
            match candidate.arguments.get(spec.name) {
                None | Some(serde_json::Value::Null) => {
                    if spec.required {
                        return Err(Rejection::new(
                            RejectionCode::MissingArgument,
                            format!("{} requires '{}'", signature.name, spec.name),
                        ));
                    }
                }
                Some(value) => {
                    let typed = spec.kind.coerce(value).map_err(|why| {
                        Rejection::new(
                            RejectionCode::WrongType,
                            format!("{}.{}: {}", signature.name, spec.name, why),
                        )
                    })?;
                    arguments.insert(spec.name.to_string(), typed);
                }
            }
        }

        if !signature.any_of.is_empty()
            && !signature
                .any_of
                .iter()
                .any(|group| group.iter().all(|k| arguments.contains_key(*k)))
        {
            let groups: Vec<String> = signature.any_of.iter().map(|g| g.join(" + ")).collect();
            return Err(Rejection::new(
                RejectionCode::MissingAlternative,
                format!("{} needs one of: {}", signature.name, groups.join(" or ")),
            ));
        }

        let action = Action::new(signature.name, arguments);
        self.policy.check_action(&action)?;
        Ok(action)
    }
}

impl Default for SchemaValidator {
    fn default() -> Self {
        Self::new(ActionVocabulary::standard(), SafetyPolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::action::{ActionName, MotionGlobals};
    use serde_json::json;

    fn pick_and_place() -> CandidatePlan {
        CandidatePlan {
            steps: vec![
                CandidateAction::new("pick")
                    .with("object", "red_cube")
                    .with("grasp", json!({"approach_axis": "z-"})),
                CandidateAction::new("place")
                    .with("target", "blue_box")
                    .with("constraints", json!({"keep_vertical": true})),
            ],
            globals: MotionGlobals::default(),
        }
    }

    #[test]
    fn test_pick_and_place_is_valid() {
        let plan = SchemaValidator::default()
            .validate_plan(&pick_and_place())
            .unwrap();
        assert_eq!(plan.steps().len(), 2);
        assert_eq!(plan.steps()[0].name(), ActionName::Pick);
        assert_eq!(plan.steps()[0].text("object"), Some("red_cube"));
        assert!(plan.steps()[1].constraints().unwrap().keep_vertical);
    }

    #[test]
    fn test_out_of_workspace_move() {
        let plan = CandidatePlan::single(
            CandidateAction::new("move_ee").with("pose_xyzrpy", json!([1.2, 0.8, 0.7, 0, 0, 0])),
        );
        let rejection = SchemaValidator::default().validate_plan(&plan).unwrap_err();
        assert_eq!(rejection.code, RejectionCode::OutOfWorkspace);
        assert_eq!(rejection.step, Some(0));
    }

    #[test]
    fn test_unknown_action_rejected() {
        let plan = CandidatePlan::single(CandidateAction::new("throw").with("object", "cube"));
        let rejection = SchemaValidator::default().validate_plan(&plan).unwrap_err();
        assert_eq!(rejection.code, RejectionCode::InvalidAction);
        assert!(rejection.hint.contains("move_ee"));
    }

    #[test]
    fn test_missing_required_argument() {
        let plan = CandidatePlan::single(CandidateAction::new("pick"));
        let rejection = SchemaValidator::default().validate_plan(&plan).unwrap_err();
        assert_eq!(rejection.code, RejectionCode::MissingArgument);
    }

    #[test]
    fn test_null_required_argument_is_missing() {
        let plan = CandidatePlan::single(CandidateAction::new("place").with("target", json!(null)));
        let rejection = SchemaValidator::default().validate_plan(&plan).unwrap_err();
        assert_eq!(rejection.code, RejectionCode::MissingArgument);
    }

    #[test]
    fn test_null_optional_argument_is_absent() {
        let plan = CandidatePlan::single(
            CandidateAction::new("pick")
                .with("object", "red_cube")
                .with("frame", json!(null)),
        );
        let plan = SchemaValidator::default().validate_plan(&plan).unwrap();
        assert!(plan.steps()[0].get("frame").is_none());
    }

    #[test]
    fn test_mistyped_argument() {
        let plan = CandidatePlan::single(
            CandidateAction::new("move_ee").with("pose_xyzrpy", "not_a_list"),
        );
        let rejection = SchemaValidator::default().validate_plan(&plan).unwrap_err();
        assert_eq!(rejection.code, RejectionCode::WrongType);
    }

    #[test]
    fn test_undeclared_argument() {
        let plan = CandidatePlan::single(
            CandidateAction::new("pick")
                .with("object", "red_cube")
                .with("speed", 3),
        );
        let rejection = SchemaValidator::default().validate_plan(&plan).unwrap_err();
        assert_eq!(rejection.code, RejectionCode::UnknownArgument);
    }

    #[test]
    fn test_move_needs_pose_or_frame_offset() {
        let validator = SchemaValidator::default();

        let bare = CandidatePlan::single(CandidateAction::new("move_ee").with("frame", "table"));
        let rejection = validator.validate_plan(&bare).unwrap_err();
        assert_eq!(rejection.code, RejectionCode::MissingAlternative);

        let relative = CandidatePlan::single(
            CandidateAction::new("move_ee")
                .with("frame", "table")
                .with("offset_xyz", json!([0.0, 0.0, 0.2])),
        );
        assert!(validator.validate_plan(&relative).is_ok());
    }

    #[test]
    fn test_empty_plan_rejected() {
        let rejection = SchemaValidator::default()
            .validate_plan(&CandidatePlan::default())
            .unwrap_err();
        assert_eq!(rejection.code, RejectionCode::EmptyPlan);
        assert_eq!(rejection.step, None);
    }

    #[test]
    fn test_globals_over_cap() {
        let mut plan = pick_and_place();
        plan.globals.vel_scale = 0.9;
        let rejection = SchemaValidator::default().validate_plan(&plan).unwrap_err();
        assert_eq!(rejection.code, RejectionCode::VelTooHigh);

        let mut plan = pick_and_place();
        plan.globals.accel_scale = 0.61;
        let rejection = SchemaValidator::default().validate_plan(&plan).unwrap_err();
        assert_eq!(rejection.code, RejectionCode::AccelTooHigh);
    }

    #[test]
    fn test_first_failing_step_is_reported() {
        let mut plan = pick_and_place();
        plan.steps.push(CandidateAction::new("dance"));
        let rejection = SchemaValidator::default().validate_plan(&plan).unwrap_err();
        assert_eq!(rejection.step, Some(2));
        assert!(rejection.to_string().starts_with("step_2:invalid_action: "));
    }

    #[test]
    fn test_plan_level_rejection_has_no_step_prefix() {
        let rejection = SchemaValidator::default()
            .validate_plan(&CandidatePlan::default())
            .unwrap_err();
        assert_eq!(rejection.step, None);
        assert!(rejection.to_string().starts_with("empty_plan: "));
    }
}
