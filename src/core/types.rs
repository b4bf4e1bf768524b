//! Core type definitions used throughout the codebase

use chrono::{DateTime, Utc};
use glam::DVec3;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for one interpreter turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TurnId(pub Uuid);

impl TurnId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TurnId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TurnId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Wall-clock time of a context entry
pub type Timestamp = DateTime<Utc>;

/// Axis-aligned box in the robot base frame (meters)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: [f64; 3],
    pub max: [f64; 3],
}

impl Aabb {
    pub fn new(min: [f64; 3], max: [f64; 3]) -> Self {
        Self { min, max }
    }

    /// Inclusive containment on every axis
    pub fn contains(&self, point: DVec3) -> bool {
        let p = point.to_array();
        (0..3).all(|i| self.min[i] <= p[i] && p[i] <= self.max[i])
    }

    pub fn is_well_formed(&self) -> bool {
        (0..3).all(|i| self.min[i] <= self.max[i])
    }
}

impl std::fmt::Display for Aabb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "x[{}, {}] y[{}, {}] z[{}, {}]",
            self.min[0], self.max[0], self.min[1], self.max[1], self.min[2], self.max[2]
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aabb_contains_is_inclusive() {
        let aabb = Aabb::new([-0.4, -0.4, 0.0], [0.6, 0.6, 0.6]);
        assert!(aabb.contains(DVec3::new(0.6, -0.4, 0.0)));
        assert!(aabb.contains(DVec3::new(0.1, 0.1, 0.3)));
        assert!(!aabb.contains(DVec3::new(1.2, 0.8, 0.7)));
        assert!(!aabb.contains(DVec3::new(0.0, 0.0, -0.01)));
    }

    #[test]
    fn test_turn_ids_are_unique() {
        assert_ne!(TurnId::new(), TurnId::new());
    }
}
