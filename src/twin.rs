//! Kinematic Twin: the orchestrator's single source of truth for the
//! robot's current joint configuration.
//!
//! Ground truth: `mcp_robot/simulation/kinematic_sim.py` (a persistent
//! joint-state holder mutated only by successful execution or explicit
//! teleport) generalized into a plain Rust struct. Mutation is gated by
//! the orchestrator's mutex (SPEC_FULL.md §4.8) rather than by any
//! locking internal to this type, matching `horus_core`'s preference
//! for coarse-grained `parking_lot::Mutex<T>` wrapping over fine-grained
//! interior mutability.

use serde::{Deserialize, Serialize};

use crate::contracts::RobotStateSnapshot;
use crate::error::PipelineResult;

/// The robot's live joint configuration plus the base/payload context
/// T5's stability checks need.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KinematicTwin {
    joint_names: Vec<String>,
    joint_positions: Vec<f64>,
    base_velocity: f64,
    payload_mass: f64,
    last_update: f64,
}

impl KinematicTwin {
    /// Construct a twin parked at `home_positions` (SPEC_FULL.md's home
    /// pose, also used by `stabilize()`).
    pub fn at_home(joint_names: Vec<String>, home_positions: Vec<f64>, timestamp: f64) -> Self {
        Self {
            joint_names,
            joint_positions: home_positions,
            base_velocity: 0.0,
            payload_mass: 0.0,
            last_update: timestamp,
        }
    }

    pub fn joint_names(&self) -> &[String] {
        &self.joint_names
    }

    pub fn joint_positions(&self) -> &[f64] {
        &self.joint_positions
    }

    pub fn base_velocity(&self) -> f64 {
        self.base_velocity
    }

    pub fn payload_mass(&self) -> f64 {
        self.payload_mass
    }

    /// Snapshot the twin's current state. Called by T4 to seed
    /// `current_joints` for the first chunk of a plan and by the
    /// orchestrator to answer `status()` queries.
    pub fn snapshot(&self, schema_version: &str) -> PipelineResult<RobotStateSnapshot> {
        RobotStateSnapshot::new(
            self.joint_names.clone(),
            self.joint_positions.clone(),
            self.base_velocity,
            self.payload_mass,
            self.last_update,
            schema_version,
        )
    }

    /// Advance the twin to `positions` after a successful execution.
    /// Only the orchestrator calls this, and only after T6 reports
    /// success (SPEC_FULL.md §4.8): the twin never reflects a chunk
    /// that failed to execute.
    pub fn advance(&mut self, positions: Vec<f64>, base_velocity: f64, timestamp: f64) {
        debug_assert_eq!(positions.len(), self.joint_names.len());
        self.joint_positions = positions;
        self.base_velocity = base_velocity;
        self.last_update = timestamp;
    }

    /// Teleport directly to a pose, bypassing any execution adapter.
    /// Used by `stabilize()` to force the home pose after a fault, and
    /// by test fixtures.
    pub fn teleport(&mut self, positions: Vec<f64>, timestamp: f64) {
        self.joint_positions = positions;
        self.base_velocity = 0.0;
        self.last_update = timestamp;
    }

    pub fn set_payload_mass(&mut self, mass: f64) {
        self.payload_mass = mass;
    }

    pub fn set_base_velocity(&mut self, velocity: f64) {
        self.base_velocity = velocity;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names() -> Vec<String> {
        vec!["j1".into(), "j2".into(), "j3".into(), "j4".into(), "j5".into(), "j6".into(), "j7".into()]
    }

    #[test]
    fn at_home_snapshot_round_trips() {
        let twin = KinematicTwin::at_home(names(), vec![0.0; 7], 1000.0);
        let snap = twin.snapshot("1.0.0").unwrap();
        assert_eq!(snap.joint_positions, vec![0.0; 7]);
        assert_eq!(snap.base_velocity, 0.0);
    }

    #[test]
    fn advance_updates_positions_and_velocity() {
        let mut twin = KinematicTwin::at_home(names(), vec![0.0; 7], 1000.0);
        twin.advance(vec![0.1; 7], 0.25, 1001.0);
        assert_eq!(twin.joint_positions(), &vec![0.1; 7][..]);
        assert_eq!(twin.base_velocity(), 0.25);
    }

    #[test]
    fn teleport_resets_velocity() {
        let mut twin = KinematicTwin::at_home(names(), vec![0.0; 7], 1000.0);
        twin.advance(vec![0.1; 7], 0.5, 1001.0);
        twin.teleport(vec![0.0; 7], 1002.0);
        assert_eq!(twin.base_velocity(), 0.0);
        assert_eq!(twin.joint_positions(), &vec![0.0; 7][..]);
    }
}
