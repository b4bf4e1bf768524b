//! Kinematic stand-in for a MoveIt-style arm
//!
//! Knows a table of named frames, a spherical reach limit and which object
//! the gripper holds. Pick approaches from a pregrasp height, descends, closes
//! and lifts; place moves above the target with an offset and releases.
//! Failure reasons use the same vocabulary a real planner bridge reports.

use crate::backend::{ExecutionResult, MotionBackend};
use crate::core::config::SceneConfig;
use crate::schema::{Action, ActionName, MotionGlobals};
use ahash::AHashMap;
use async_trait::async_trait;
use glam::DVec3;

const DEFAULT_PREGRASP_M: f64 = 0.08;
/// Height above the object frame where the gripper closes
const TOUCH_DOWN_M: f64 = 0.01;
const LIFT_M: f64 = 0.10;
const DEFAULT_PLACE_OFFSET: [f64; 3] = [0.0, 0.0, 0.10];
/// Most recent motions kept in the log; older ones are dropped first
pub const MOTION_LOG_CAP: usize = 256;

/// One executed end-effector motion
#[derive(Debug, Clone, PartialEq)]
pub struct Motion {
    pub action: ActionName,
    pub position: DVec3,
    pub keep_vertical: bool,
    pub vel_scale: f64,
}

pub struct SimulatedArm {
    frames: AHashMap<String, DVec3>,
    reach_m: f64,
    end_effector: DVec3,
    holding: Option<String>,
    globals: MotionGlobals,
    motions: Vec<Motion>,
}

impl SimulatedArm {
    pub fn new(reach_m: f64) -> Self {
        Self {
            frames: AHashMap::new(),
            reach_m,
            end_effector: DVec3::new(0.3, 0.0, 0.4),
            holding: None,
            globals: MotionGlobals::default(),
            motions: Vec::new(),
        }
    }

    pub fn from_scene(scene: &SceneConfig) -> Self {
        let mut arm = Self::new(scene.reach_m);
        for (name, position) in &scene.frames {
            arm.add_frame(name.clone(), DVec3::from_array(*position));
        }
        arm
    }

    pub fn add_frame(&mut self, name: impl Into<String>, position: DVec3) {
        self.frames.insert(name.into(), position);
    }

    pub fn frame(&self, name: &str) -> Option<DVec3> {
        self.frames.get(name).copied()
    }

    /// Frame names sorted for stable prompts
    pub fn frame_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.frames.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn holding(&self) -> Option<&str> {
        self.holding.as_deref()
    }

    pub fn end_effector(&self) -> DVec3 {
        self.end_effector
    }

    /// Recent motions, oldest first, at most [`MOTION_LOG_CAP`]
    pub fn motions(&self) -> &[Motion] {
        &self.motions
    }

    fn reachable(&self, p: DVec3) -> bool {
        p.z >= 0.0 && p.length() <= self.reach_m
    }

    fn lookup(&self, frame: &str) -> Result<DVec3, String> {
        self.frame(frame)
            .ok_or_else(|| format!("tf_lookup_failed:{}", frame))
    }

    fn move_to(&mut self, action: &Action, position: DVec3) {
        self.end_effector = position;
        if self.motions.len() >= MOTION_LOG_CAP {
            let excess = self.motions.len() + 1 - MOTION_LOG_CAP;
            self.motions.drain(..excess);
        }
        self.motions.push(Motion {
            action: action.name(),
            position,
            keep_vertical: action.constraints().map_or(false, |c| c.keep_vertical),
            vel_scale: self.globals.vel_scale,
        });
    }

    fn pick(&mut self, action: &Action) -> Result<(), String> {
        let object = action.text("object").ok_or("object_missing")?;
        if let Some(held) = &self.holding {
            return Err(format!("gripper_occupied:{}", held));
        }

        let base = match action.pose("pose_xyzrpy") {
            Some(p) => DVec3::new(p[0], p[1], p[2]),
            None => self.lookup(object)?,
        };
        let pregrasp_m = action.grasp().map_or(DEFAULT_PREGRASP_M, |g| g.pregrasp_m);

        let pregrasp = base + DVec3::Z * pregrasp_m;
        if !self.reachable(pregrasp) {
            return Err("pregrasp_plan_failed".into());
        }
        self.move_to(action, pregrasp);

        let touch = base + DVec3::Z * TOUCH_DOWN_M;
        if !self.reachable(touch) {
            return Err("cartesian_descend_failed".into());
        }
        self.move_to(action, touch);

        let lift = touch + DVec3::Z * LIFT_M;
        if !self.reachable(lift) {
            return Err("cartesian_lift_failed".into());
        }
        self.move_to(action, lift);

        self.holding = Some(object.to_string());
        Ok(())
    }

    fn place(&mut self, action: &Action) -> Result<(), String> {
        let target = action.text("target").ok_or("target_missing")?;
        let held = self.holding.clone().ok_or("nothing_held")?;

        let base = match action.pose("pose_xyzrpy") {
            Some(p) => DVec3::new(p[0], p[1], p[2]),
            None => self.lookup(target)?,
        };
        let offset = DVec3::from_array(action.vector("offset_xyz").unwrap_or(DEFAULT_PLACE_OFFSET));
        let goal = base + offset;
        if !self.reachable(goal) {
            return Err("place_plan_failed".into());
        }
        self.move_to(action, goal);

        self.frames.insert(held, goal - DVec3::Z * TOUCH_DOWN_M);
        self.holding = None;
        Ok(())
    }

    fn move_ee(&mut self, action: &Action) -> Result<(), String> {
        let goal = if let Some(p) = action.pose("pose_xyzrpy") {
            DVec3::new(p[0], p[1], p[2])
        } else if let (Some(frame), Some(offset)) = (action.text("frame"), action.vector("offset_xyz")) {
            self.lookup(frame)? + DVec3::from_array(offset)
        } else {
            return Err("pose_missing".into());
        };

        if !self.reachable(goal) {
            return Err("plan_failed".into());
        }
        self.move_to(action, goal);
        Ok(())
    }
}

impl Default for SimulatedArm {
    fn default() -> Self {
        Self::from_scene(&SceneConfig::default())
    }
}

#[async_trait]
impl MotionBackend for SimulatedArm {
    fn name(&self) -> &str {
        "simulated_arm"
    }

    fn apply_globals(&mut self, globals: MotionGlobals) {
        self.globals = globals;
    }

    async fn execute(&mut self, action: &Action) -> ExecutionResult {
        let outcome = match action.name() {
            ActionName::Pick => self.pick(action),
            ActionName::Place => self.place(action),
            ActionName::MoveEe => self.move_ee(action),
        };
        match outcome {
            Ok(()) => ExecutionResult::success(),
            Err(reason) => {
                tracing::debug!("{} failed: {}", action.name(), reason);
                ExecutionResult::failure(reason)
            }
        }
    }
}
