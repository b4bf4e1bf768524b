//! Safety policy applied after schema checks
//!
//! Bounds the workspace, caps motion scaling and restricts the verbs the arm
//! will accept even when the vocabulary knows them.

use crate::core::config::SafetyConfig;
use crate::core::types::Aabb;
use crate::schema::action::{Action, ActionName, MotionGlobals};
use crate::schema::validator::{Rejection, RejectionCode};
use glam::DVec3;

#[derive(Debug, Clone, PartialEq)]
pub struct SafetyPolicy {
    pub workspace: Aabb,
    pub vel_cap: f64,
    pub accel_cap: f64,
    pub allowed_actions: Vec<ActionName>,
}

impl SafetyPolicy {
    pub fn from_config(config: &SafetyConfig) -> Self {
        Self {
            workspace: config.workspace,
            vel_cap: config.vel_cap,
            accel_cap: config.accel_cap,
            allowed_actions: config.allowed_actions.clone(),
        }
    }

    pub fn is_allowed(&self, name: ActionName) -> bool {
        self.allowed_actions.contains(&name)
    }

    pub fn check_allowed(&self, name: ActionName) -> Result<(), Rejection> {
        if self.is_allowed(name) {
            return Ok(());
        }
        let allowed: Vec<&str> = self.allowed_actions.iter().map(|a| a.as_str()).collect();
        Err(Rejection::new(
            RejectionCode::DisallowedAction,
            format!("{} is disabled here; use one of {:?}", name, allowed),
        ))
    }

    /// Pose positions must fall inside the workspace box
    pub fn check_action(&self, action: &Action) -> Result<(), Rejection> {
        self.check_allowed(action.name())?;

        if let Some(pose) = action.pose("pose_xyzrpy") {
            let position = DVec3::new(pose[0], pose[1], pose[2]);
            if !self.workspace.contains(position) {
                return Err(Rejection::new(
                    RejectionCode::OutOfWorkspace,
                    format!(
                        "target [{}, {}, {}] outside workspace {}",
                        pose[0], pose[1], pose[2], self.workspace
                    ),
                ));
            }
        }
        Ok(())
    }

    pub fn check_globals(&self, globals: &MotionGlobals) -> Result<(), Rejection> {
        for (label, value) in [
            ("vel_scale", globals.vel_scale),
            ("accel_scale", globals.accel_scale),
        ] {
            if value.is_nan() || value <= 0.0 {
                return Err(Rejection::new(
                    RejectionCode::InvalidScale,
                    format!("{} must be positive, got {}", label, value),
                ));
            }
        }
        if globals.vel_scale > self.vel_cap {
            return Err(Rejection::new(
                RejectionCode::VelTooHigh,
                format!("max vel_scale={}", self.vel_cap),
            ));
        }
        if globals.accel_scale > self.accel_cap {
            return Err(Rejection::new(
                RejectionCode::AccelTooHigh,
                format!("max accel_scale={}", self.accel_cap),
            ));
        }
        Ok(())
    }
}

impl Default for SafetyPolicy {
    fn default() -> Self {
        Self::from_config(&SafetyConfig::default())
    }
}
