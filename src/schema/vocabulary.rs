//! The fixed action vocabulary and argument typing

use crate::schema::action::{ActionName, ArgValue, Constraints, Grasp};
use serde_json::Value;

const APPROACH_AXES: [&str; 6] = ["x+", "x-", "y+", "y-", "z+", "z-"];

/// Declared type of an action parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Text,
    Number,
    Flag,
    Vec3,
    Pose,
    Grasp,
    Constraints,
}

impl ParamKind {
    /// What a well-typed value looks like, for rejection hints
    pub fn expected(&self) -> &'static str {
        match self {
            ParamKind::Text => "a string",
            ParamKind::Number => "a number",
            ParamKind::Flag => "a boolean",
            ParamKind::Vec3 => "an array of 3 numbers",
            ParamKind::Pose => "an array of 6 numbers [x, y, z, roll, pitch, yaw]",
            ParamKind::Grasp => "an object {approach_axis, pregrasp_m}",
            ParamKind::Constraints => "an object {keep_vertical, clearance_m}",
        }
    }

    /// Convert a JSON value into a typed argument, or explain why not
    pub fn coerce(&self, value: &Value) -> Result<ArgValue, String> {
        let mismatch = || format!("expected {}, got {}", self.expected(), value);
        match self {
            ParamKind::Text => match value.as_str() {
                Some(s) if !s.trim().is_empty() => Ok(ArgValue::Text(s.trim().to_string())),
                Some(_) => Err("expected a non-empty string".into()),
                None => Err(mismatch()),
            },
            ParamKind::Number => value.as_f64().map(ArgValue::Number).ok_or_else(mismatch),
            ParamKind::Flag => value.as_bool().map(ArgValue::Flag).ok_or_else(mismatch),
            ParamKind::Vec3 => {
                let v = numbers(value).ok_or_else(mismatch)?;
                let arr: [f64; 3] = v.try_into().map_err(|_| mismatch())?;
                Ok(ArgValue::Vector(arr))
            }
            ParamKind::Pose => {
                let v = numbers(value).ok_or_else(mismatch)?;
                let arr: [f64; 6] = v.try_into().map_err(|_| mismatch())?;
                Ok(ArgValue::Pose(arr))
            }
            ParamKind::Grasp => {
                let grasp: Grasp =
                    serde_json::from_value(value.clone()).map_err(|e| e.to_string())?;
                if !APPROACH_AXES.contains(&grasp.approach_axis.as_str()) {
                    return Err(format!(
                        "approach_axis '{}' is not one of {:?}",
                        grasp.approach_axis, APPROACH_AXES
                    ));
                }
                if grasp.pregrasp_m < 0.0 {
                    return Err("pregrasp_m must not be negative".into());
                }
                Ok(ArgValue::Grasp(grasp))
            }
            ParamKind::Constraints => {
                let constraints: Constraints =
                    serde_json::from_value(value.clone()).map_err(|e| e.to_string())?;
                if constraints.clearance_m < 0.0 {
                    return Err("clearance_m must not be negative".into());
                }
                Ok(ArgValue::Constraints(constraints))
            }
        }
    }
}

fn numbers(value: &Value) -> Option<Vec<f64>> {
    value.as_array()?.iter().map(Value::as_f64).collect()
}

/// One declared parameter of an action
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub required: bool,
}

impl ParamSpec {
    pub fn required(name: &'static str, kind: ParamKind) -> Self {
        Self {
            name,
            kind,
            required: true,
        }
    }

    pub fn optional(name: &'static str, kind: ParamKind) -> Self {
        Self {
            name,
            kind,
            required: false,
        }
    }
}

/// Parameters an action accepts
#[derive(Debug, Clone, PartialEq)]
pub struct ActionSignature {
    pub name: ActionName,
    pub params: Vec<ParamSpec>,
    /// At least one of these groups must be fully present (empty = no rule)
    pub any_of: Vec<Vec<&'static str>>,
}

impl ActionSignature {
    pub fn param(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }
}

/// The closed set of actions and their signatures
#[derive(Debug, Clone)]
pub struct ActionVocabulary {
    signatures: Vec<ActionSignature>,
}

impl ActionVocabulary {
    /// pick / place / move_ee as understood by the motion backends
    pub fn standard() -> Self {
        use ParamKind as K;

        let pick = ActionSignature {
            name: ActionName::Pick,
            params: vec![
                ParamSpec::required("object", K::Text),
                ParamSpec::optional("frame", K::Text),
                ParamSpec::optional("pose_xyzrpy", K::Pose),
                ParamSpec::optional("grasp", K::Grasp),
                ParamSpec::optional("constraints", K::Constraints),
                ParamSpec::optional("cartesian", K::Flag),
            ],
            any_of: Vec::new(),
        };

        let place = ActionSignature {
            name: ActionName::Place,
            params: vec![
                ParamSpec::required("target", K::Text),
                ParamSpec::optional("offset_xyz", K::Vec3),
                ParamSpec::optional("frame", K::Text),
                ParamSpec::optional("pose_xyzrpy", K::Pose),
                ParamSpec::optional("constraints", K::Constraints),
                ParamSpec::optional("cartesian", K::Flag),
            ],
            any_of: Vec::new(),
        };

        let move_ee = ActionSignature {
            name: ActionName::MoveEe,
            params: vec![
                ParamSpec::optional("frame", K::Text),
                ParamSpec::optional("pose_xyzrpy", K::Pose),
                ParamSpec::optional("offset_xyz", K::Vec3),
                ParamSpec::optional("constraints", K::Constraints),
                ParamSpec::optional("cartesian", K::Flag),
            ],
            any_of: vec![vec!["pose_xyzrpy"], vec!["frame", "offset_xyz"]],
        };

        Self {
            signatures: vec![pick, place, move_ee],
        }
    }

    pub fn signature(&self, name: ActionName) -> Option<&ActionSignature> {
        self.signatures.iter().find(|s| s.name == name)
    }

    /// Exact, case-sensitive lookup of a raw action name
    pub fn lookup(&self, raw: &str) -> Option<&ActionSignature> {
        let name: ActionName = raw.parse().ok()?;
        self.signature(name)
    }

    pub fn names(&self) -> Vec<ActionName> {
        self.signatures.iter().map(|s| s.name).collect()
    }

    /// Compact description of every signature, for model prompts
    pub fn describe(&self) -> String {
        let mut s = String::new();
        for sig in &self.signatures {
            let params: Vec<String> = sig
                .params
                .iter()
                .map(|p| {
                    format!(
                        "{}{}: {}",
                        p.name,
                        if p.required { "" } else { "?" },
                        p.kind.expected()
                    )
                })
                .collect();
            s.push_str(&format!("- {}({})", sig.name, params.join(", ")));
            if !sig.any_of.is_empty() {
                let groups: Vec<String> = sig.any_of.iter().map(|g| g.join("+")).collect();
                s.push_str(&format!(" requires one of: {}", groups.join(" | ")));
            }
            s.push('\n');
        }
        s
    }
}

impl Default for ActionVocabulary {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_standard_vocabulary_names() {
        let vocab = ActionVocabulary::standard();
        assert_eq!(
            vocab.names(),
            vec![ActionName::Pick, ActionName::Place, ActionName::MoveEe]
        );
        assert!(vocab.lookup("move_ee").is_some());
        assert!(vocab.lookup("wave").is_none());
    }

    #[test]
    fn test_coerce_integers_as_numbers() {
        let v = ParamKind::Vec3.coerce(&json!([0, 0, 1])).unwrap();
        assert_eq!(v, ArgValue::Vector([0.0, 0.0, 1.0]));
    }

    #[test]
    fn test_coerce_wrong_length_pose() {
        let err = ParamKind::Pose.coerce(&json!([0.5, 0.1, 0.2])).unwrap_err();
        assert!(err.contains("6 numbers"));
    }

    #[test]
    fn test_coerce_string_as_pose_fails() {
        assert!(ParamKind::Pose.coerce(&json!("not_a_list")).is_err());
    }

    #[test]
    fn test_coerce_blank_text_fails() {
        assert!(ParamKind::Text.coerce(&json!("   ")).is_err());
    }

    #[test]
    fn test_coerce_grasp_checks_axis() {
        assert!(ParamKind::Grasp.coerce(&json!({"approach_axis": "z-"})).is_ok());
        let err = ParamKind::Grasp
            .coerce(&json!({"approach_axis": "down"}))
            .unwrap_err();
        assert!(err.contains("approach_axis"));
    }

    #[test]
    fn test_describe_mentions_alternatives() {
        let text = ActionVocabulary::standard().describe();
        assert!(text.contains("pick(object: a string"));
        assert!(text.contains("requires one of: pose_xyzrpy | frame+offset_xyz"));
    }
}
