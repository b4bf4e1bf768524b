//! Action and plan types
//!
//! `CandidateAction`/`CandidatePlan` are untrusted model output exactly as it
//! arrived. `Action`/`Plan` are only built by the schema validator, so holding
//! one means the vocabulary, argument types and safety policy all passed.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Verbs the arm understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionName {
    /// Grasp a named object
    Pick,
    /// Release the held object at a named target
    Place,
    /// Move the end effector to a pose
    MoveEe,
}

impl ActionName {
    pub const ALL: [ActionName; 3] = [ActionName::Pick, ActionName::Place, ActionName::MoveEe];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionName::Pick => "pick",
            ActionName::Place => "place",
            ActionName::MoveEe => "move_ee",
        }
    }
}

impl fmt::Display for ActionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ActionName::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| format!("unknown action '{}'", s))
    }
}

/// How the gripper approaches an object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Grasp {
    /// Approach direction, e.g. "z-" for top-down
    pub approach_axis: String,
    /// Stand-off distance before closing the gripper
    #[serde(default = "default_pregrasp_m")]
    pub pregrasp_m: f64,
}

fn default_pregrasp_m() -> f64 {
    0.08
}

impl Grasp {
    pub fn top_down() -> Self {
        Self {
            approach_axis: "z-".into(),
            pregrasp_m: default_pregrasp_m(),
        }
    }
}

/// Motion restrictions for one step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Constraints {
    /// Keep the gripper upright for the whole motion
    #[serde(default)]
    pub keep_vertical: bool,
    /// Safety buffer around obstacles (meters)
    #[serde(default = "default_clearance_m")]
    pub clearance_m: f64,
}

fn default_clearance_m() -> f64 {
    0.03
}

impl Default for Constraints {
    fn default() -> Self {
        Self {
            keep_vertical: false,
            clearance_m: default_clearance_m(),
        }
    }
}

/// Motion parameters applied to every step of a plan
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionGlobals {
    /// Fraction of max joint velocity
    #[serde(default = "default_vel_scale")]
    pub vel_scale: f64,
    /// Fraction of max acceleration
    #[serde(default = "default_accel_scale")]
    pub accel_scale: f64,
}

fn default_vel_scale() -> f64 {
    0.5
}

fn default_accel_scale() -> f64 {
    0.3
}

impl Default for MotionGlobals {
    fn default() -> Self {
        Self {
            vel_scale: default_vel_scale(),
            accel_scale: default_accel_scale(),
        }
    }
}

/// A typed argument value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ArgValue {
    Text(String),
    Number(f64),
    Flag(bool),
    /// Translation `[x, y, z]`
    Vector([f64; 3]),
    /// Position and orientation `[x, y, z, roll, pitch, yaw]`
    Pose([f64; 6]),
    Grasp(Grasp),
    Constraints(Constraints),
}

/// Raw step as proposed by a model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateAction {
    #[serde(rename = "action", alias = "name")]
    pub name: String,
    #[serde(flatten)]
    pub arguments: Map<String, Value>,
}

impl CandidateAction {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arguments: Map::new(),
        }
    }

    /// Builder-style argument insertion
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.arguments.insert(key.into(), value.into());
        self
    }
}

/// Raw plan as proposed by a model
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CandidatePlan {
    pub steps: Vec<CandidateAction>,
    #[serde(default)]
    pub globals: MotionGlobals,
}

impl CandidatePlan {
    pub fn single(action: CandidateAction) -> Self {
        Self {
            steps: vec![action],
            globals: MotionGlobals::default(),
        }
    }
}

/// A validated robot instruction
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Action {
    #[serde(rename = "action")]
    name: ActionName,
    #[serde(flatten)]
    arguments: BTreeMap<String, ArgValue>,
}

impl Action {
    pub(crate) fn new(name: ActionName, arguments: BTreeMap<String, ArgValue>) -> Self {
        Self { name, arguments }
    }

    pub fn name(&self) -> ActionName {
        self.name
    }

    pub fn arguments(&self) -> &BTreeMap<String, ArgValue> {
        &self.arguments
    }

    pub fn get(&self, key: &str) -> Option<&ArgValue> {
        self.arguments.get(key)
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        match self.arguments.get(key) {
            Some(ArgValue::Text(s)) => Some(s),
            _ => None,
        }
    }

    pub fn flag(&self, key: &str) -> Option<bool> {
        match self.arguments.get(key) {
            Some(ArgValue::Flag(b)) => Some(*b),
            _ => None,
        }
    }

    pub fn vector(&self, key: &str) -> Option<[f64; 3]> {
        match self.arguments.get(key) {
            Some(ArgValue::Vector(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn pose(&self, key: &str) -> Option<[f64; 6]> {
        match self.arguments.get(key) {
            Some(ArgValue::Pose(p)) => Some(*p),
            _ => None,
        }
    }

    pub fn grasp(&self) -> Option<&Grasp> {
        match self.arguments.get("grasp") {
            Some(ArgValue::Grasp(g)) => Some(g),
            _ => None,
        }
    }

    pub fn constraints(&self) -> Option<&Constraints> {
        match self.arguments.get("constraints") {
            Some(ArgValue::Constraints(c)) => Some(c),
            _ => None,
        }
    }

    /// The object or target this step is about, if it names one
    pub fn referent(&self) -> Option<&str> {
        match self.name {
            ActionName::Pick => self.text("object"),
            ActionName::Place => self.text("target"),
            ActionName::MoveEe => self.text("frame"),
        }
    }
}

/// A validated, executable sequence of actions
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Plan {
    steps: Vec<Action>,
    globals: MotionGlobals,
}

impl Plan {
    pub(crate) fn new(steps: Vec<Action>, globals: MotionGlobals) -> Self {
        Self { steps, globals }
    }

    pub fn steps(&self) -> &[Action] {
        &self.steps
    }

    pub fn globals(&self) -> MotionGlobals {
        self.globals
    }

    /// Short one-line rendering, e.g. "pick(red_cube) -> place(blue_box)"
    pub fn describe(&self) -> String {
        self.steps
            .iter()
            .map(|step| match step.referent() {
                Some(r) => format!("{}({})", step.name(), r),
                None => step.name().to_string(),
            })
            .collect::<Vec<_>>()
            .join(" -> ")
    }
}
