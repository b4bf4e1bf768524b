//! Interpreter configuration with documented defaults
//!
//! All tunable limits live here. Every section is optional in the TOML file;
//! missing fields fall back to the defaults below.

use crate::core::error::{ArmError, Result};
use crate::core::types::Aabb;
use crate::schema::ActionName;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Top-level configuration, one field per TOML table
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ArmConfig {
    pub interpreter: InterpreterConfig,
    pub safety: SafetyConfig,
    pub llm: LlmConfig,
    pub scene: SceneConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpreterConfig {
    /// Revised candidates requested after the first attempt fails
    ///
    /// Total attempts per command are `1 + max_retries`. Each attempt costs
    /// one model call, so this bounds latency as much as it bounds loops.
    pub max_retries: usize,

    /// Number of past turns kept for reference resolution
    ///
    /// Oldest turns are evicted first. Must be at least 1.
    pub context_capacity: usize,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            context_capacity: 8,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyConfig {
    /// Box every commanded pose position must stay inside (base frame, meters)
    pub workspace: Aabb,

    /// Upper bound on `globals.vel_scale` (fraction of max joint velocity)
    pub vel_cap: f64,

    /// Upper bound on `globals.accel_scale` (fraction of max acceleration)
    pub accel_cap: f64,

    /// Verbs the arm may execute; vocabulary entries outside this set are refused
    pub allowed_actions: Vec<ActionName>,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            workspace: Aabb::new([-0.4, -0.4, 0.0], [0.6, 0.6, 0.6]),
            vel_cap: 0.6,
            accel_cap: 0.6,
            allowed_actions: vec![ActionName::Pick, ActionName::Place, ActionName::MoveEe],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Completion endpoint; anthropic.com URLs use the Anthropic format
    pub api_url: String,
    pub model: String,

    /// Upper bound on reply length; plans are short JSON documents
    pub max_tokens: u32,

    /// Seconds before a completion request is abandoned
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.anthropic.com/v1/messages".into(),
            model: "claude-3-haiku-20240307".into(),
            max_tokens: 1024,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Named frames known to the simulated arm, position in the base frame
    pub frames: BTreeMap<String, [f64; 3]>,

    /// Maximum distance from the base origin the end effector can reach
    pub reach_m: f64,
}

impl Default for SceneConfig {
    fn default() -> Self {
        let mut frames = BTreeMap::new();
        frames.insert("red_cube".to_string(), [0.45, 0.10, 0.02]);
        frames.insert("blue_box".to_string(), [0.20, -0.25, 0.05]);
        frames.insert("bin_a".to_string(), [-0.20, 0.30, 0.0]);
        Self {
            frames,
            reach_m: 0.85,
        }
    }
}

impl ArmConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: ArmConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints serde cannot express
    pub fn validate(&self) -> Result<()> {
        if self.interpreter.context_capacity == 0 {
            return Err(ArmError::Config(
                "interpreter.context_capacity must be at least 1".into(),
            ));
        }
        if !self.safety.workspace.is_well_formed() {
            return Err(ArmError::Config(format!(
                "safety.workspace min exceeds max: {}",
                self.safety.workspace
            )));
        }
        for (name, cap) in [
            ("vel_cap", self.safety.vel_cap),
            ("accel_cap", self.safety.accel_cap),
        ] {
            if cap.is_nan() || cap <= 0.0 || cap > 1.0 {
                return Err(ArmError::Config(format!(
                    "safety.{} must be in (0, 1], got {}",
                    name, cap
                )));
            }
        }
        if self.llm.max_tokens == 0 || self.llm.timeout_secs == 0 {
            return Err(ArmError::Config(
                "llm.max_tokens and llm.timeout_secs must be positive".into(),
            ));
        }
        if self.scene.reach_m.is_nan() || self.scene.reach_m <= 0.0 {
            return Err(ArmError::Config("scene.reach_m must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ArmConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.interpreter.max_retries, 2);
        assert_eq!(config.safety.allowed_actions.len(), 3);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let toml_str = r#"
[interpreter]
max_retries = 5

[safety]
vel_cap = 0.4
"#;
        let config = ArmConfig::from_toml_str(toml_str).unwrap();
        assert_eq!(config.interpreter.max_retries, 5);
        assert_eq!(config.interpreter.context_capacity, 8);
        assert!((config.safety.vel_cap - 0.4).abs() < 1e-9);
        assert!((config.safety.accel_cap - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_allowed_actions_parse_snake_case() {
        let toml_str = r#"
[safety]
allowed_actions = ["pick", "move_ee"]
"#;
        let config = ArmConfig::from_toml_str(toml_str).unwrap();
        assert_eq!(
            config.safety.allowed_actions,
            vec![ActionName::Pick, ActionName::MoveEe]
        );
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let result = ArmConfig::from_toml_str("[interpreter]\ncontext_capacity = 0\n");
        assert!(matches!(result, Err(ArmError::Config(_))));
    }

    #[test]
    fn test_inverted_workspace_rejected() {
        let toml_str = r#"
[safety.workspace]
min = [0.5, 0.0, 0.0]
max = [0.1, 0.5, 0.5]
"#;
        assert!(ArmConfig::from_toml_str(toml_str).is_err());
    }

    #[test]
    fn test_caps_outside_unit_interval_rejected() {
        for toml_str in [
            "[safety]\nvel_cap = 0.0\n",
            "[safety]\nvel_cap = 1.5\n",
            "[safety]\naccel_cap = -0.2\n",
            "[safety]\naccel_cap = 2.0\n",
        ] {
            let result = ArmConfig::from_toml_str(toml_str);
            assert!(matches!(result, Err(ArmError::Config(_))), "{}", toml_str);
        }
        assert!(ArmConfig::from_toml_str("[safety]\nvel_cap = 1.0\n").is_ok());
    }

    #[test]
    fn test_non_positive_reach_rejected() {
        for toml_str in ["[scene]\nreach_m = 0.0\n", "[scene]\nreach_m = -0.5\n"] {
            let result = ArmConfig::from_toml_str(toml_str);
            assert!(matches!(result, Err(ArmError::Config(_))), "{}", toml_str);
        }
    }

    #[test]
    fn test_zero_llm_limits_rejected() {
        for toml_str in ["[llm]\nmax_tokens = 0\n", "[llm]\ntimeout_secs = 0\n"] {
            let result = ArmConfig::from_toml_str(toml_str);
            assert!(matches!(result, Err(ArmError::Config(_))), "{}", toml_str);
        }
        let config = ArmConfig::from_toml_str("[llm]\nmax_tokens = 256\ntimeout_secs = 5\n").unwrap();
        assert_eq!(config.llm.max_tokens, 256);
        assert_eq!(config.llm.timeout_secs, 5);
    }

    #[test]
    fn test_scene_frames_from_toml() {
        let toml_str = r#"
[scene]
reach_m = 0.7

[scene.frames]
mug = [0.3, 0.1, 0.0]
"#;
        let config = ArmConfig::from_toml_str(toml_str).unwrap();
        assert_eq!(config.scene.frames.len(), 1);
        assert_eq!(config.scene.frames["mug"], [0.3, 0.1, 0.0]);
    }
}
