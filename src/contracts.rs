//! Typed snapshot and chunk records with structural invariants.
//!
//! Every value that crosses a stage boundary in this crate is a tagged
//! Rust struct or enum with explicit fields — never an untyped map —
//! per SPEC_FULL.md §9 ("Dynamic maps → typed records"). Each
//! constructor validates its own invariants and returns
//! [`PipelineError::Validation`] rather than panicking.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{PipelineError, PipelineResult};

/// A single snapshot of joint configuration: names and positions must
/// stay aligned, and velocities (when present) must match too.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JointState {
    pub names: Vec<String>,
    pub positions: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub velocities: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effort: Option<Vec<f64>>,
}

impl JointState {
    pub fn new(names: Vec<String>, positions: Vec<f64>) -> PipelineResult<Self> {
        if names.is_empty() {
            return Err(PipelineError::validation("joint names cannot be empty"));
        }
        if names.len() != positions.len() {
            return Err(PipelineError::validation(format!(
                "position count {} must match name count {}",
                positions.len(),
                names.len()
            )));
        }
        Ok(Self {
            names,
            positions,
            velocities: None,
            effort: None,
        })
    }

    pub fn as_map(&self) -> HashMap<String, f64> {
        self.names
            .iter()
            .cloned()
            .zip(self.positions.iter().copied())
            .collect()
    }
}

/// Immutable snapshot of the robot's joint state plus base/payload
/// context, produced by the Twin on demand.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RobotStateSnapshot {
    pub joint_names: Vec<String>,
    pub joint_positions: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub joint_velocities: Option<Vec<f64>>,
    pub base_velocity: f64,
    pub payload_mass: f64,
    pub timestamp: f64,
    pub schema_version: String,
}

impl RobotStateSnapshot {
    pub fn new(
        joint_names: Vec<String>,
        joint_positions: Vec<f64>,
        base_velocity: f64,
        payload_mass: f64,
        timestamp: f64,
        schema_version: impl Into<String>,
    ) -> PipelineResult<Self> {
        if joint_names.len() != joint_positions.len() {
            return Err(PipelineError::validation(format!(
                "position count {} must match name count {}",
                joint_positions.len(),
                joint_names.len()
            )));
        }
        Ok(Self {
            joint_names,
            joint_positions,
            joint_velocities: None,
            base_velocity,
            payload_mass,
            timestamp,
            schema_version: schema_version.into(),
        })
    }

    /// Ordered `name -> position` map, used by T5 continuity checks.
    pub fn to_ordered_dict(&self) -> HashMap<String, f64> {
        self.joint_names
            .iter()
            .cloned()
            .zip(self.joint_positions.iter().copied())
            .collect()
    }
}

/// A detected object in the perception snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DetectedObject {
    #[serde(rename = "type")]
    pub object_type: String,
    pub mass: f64,
    pub friction_coefficient: f64,
}

/// Immutable snapshot of the environment, produced by the caller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PerceptionSnapshot {
    pub camera_frame_digest: String,
    pub detected_objects: Vec<DetectedObject>,
    #[serde(default)]
    pub tactile_summary: HashMap<String, f64>,
    pub timestamp: f64,
}

/// Closed set of subtask kinds the decomposer can emit.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SubtaskType {
    WalkTo,
    ScanWorkspace,
    GraspApproach,
    GraspClose,
    Lift,
    Release,
    MoveTo,
    Idle,
}

impl SubtaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubtaskType::WalkTo => "walk_to",
            SubtaskType::ScanWorkspace => "scan_workspace",
            SubtaskType::GraspApproach => "grasp_approach",
            SubtaskType::GraspClose => "grasp_close",
            SubtaskType::Lift => "lift",
            SubtaskType::Release => "release",
            SubtaskType::MoveTo => "move_to",
            SubtaskType::Idle => "idle",
        }
    }
}

/// Closed set of criticality levels.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Criticality {
    Low,
    Medium,
    High,
}

/// Force profile the subtask nominally requires, from
/// `task_decomposer.py`'s `force_requirements` field.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ForceRequirement {
    Gentle,
    Normal,
}

/// T1 output: one ordered unit of work before chunking.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Subtask {
    #[serde(rename = "type")]
    pub subtask_type: SubtaskType,
    pub target_object: String,
    pub estimated_duration: f64,
    pub criticality: Criticality,
    pub force_requirements: ForceRequirement,
}

/// T2 output: a seed-derived latent chunk with normalized waypoints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LatentChunk {
    pub ordinal: usize,
    pub subtask_type: SubtaskType,
    pub target_object: String,
    pub latent_vector: Vec<f64>,
    /// Exactly 50 (x, y, z) waypoints normalized into `[0, 1]`.
    pub position_waypoints: Vec<[f64; 3]>,
    pub force_profile: Vec<f64>,
    pub duration_s: f64,
    pub criticality: Criticality,
    pub estimated_force: f64,
}

pub const TIMESTEPS_PER_CHUNK: usize = 50;

impl LatentChunk {
    pub fn validate(&self) -> PipelineResult<()> {
        if self.position_waypoints.len() != TIMESTEPS_PER_CHUNK {
            return Err(PipelineError::validation(format!(
                "expected {} waypoints, got {}",
                TIMESTEPS_PER_CHUNK,
                self.position_waypoints.len()
            )));
        }
        Ok(())
    }
}

/// Predicted zero-moment-point shift for a single waypoint.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PredictedZmp {
    pub x: f64,
    pub y: f64,
}

/// Tactile metadata attached to a single waypoint by T3.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TactileWaypoint {
    pub position: [f64; 3],
    pub grip_force_n: f64,
    pub predicted_friction: f64,
    pub slip_threshold: f64,
    pub predicted_zmp: PredictedZmp,
}

/// T3 output: a [`LatentChunk`] augmented with per-waypoint tactile data.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TactileAugmentedChunk {
    pub ordinal: usize,
    pub subtask_type: SubtaskType,
    pub target_object: String,
    pub position_waypoints: Vec<[f64; 3]>,
    pub duration_s: f64,
    pub criticality: Criticality,
    pub estimated_force: f64,
    pub tactile_waypoints: Vec<TactileWaypoint>,
    pub is_tactile_critical: bool,
}

/// Discriminated union of execution units. Only `Trajectory` is
/// produced by the core pipeline today; `Servo`/`Gripper` are closed
/// variants reserved for future tiers so the union never needs an
/// untyped escape hatch (SPEC_FULL.md §3, §9).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionChunk {
    Trajectory(JointTrajectoryChunk),
    Servo(CartesianServoChunk),
    Gripper(GripperCommandChunk),
}

/// End-effector servo command. Not exercised by the core pipeline;
/// retained as a closed-union variant per SPEC_FULL.md §9.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CartesianServoChunk {
    pub id: String,
    pub frame_id: String,
    pub target_pose: HashMap<String, f64>,
    pub speed_scale: f64,
}

/// Binary or scalar gripper command. Not exercised by the core
/// pipeline; retained as a closed-union variant per SPEC_FULL.md §9.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GripperCommandChunk {
    pub id: String,
    pub width: f64,
    pub max_force: f64,
}

/// T4/Orchestrator output: a single executable joint-space trajectory
/// segment, immutable once finalized.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JointTrajectoryChunk {
    pub chunk_id: String,
    pub plan_id: String,
    pub ordinal: usize,
    pub description: String,
    pub joint_names: Vec<String>,
    /// First waypoint is the chunk's start, last is its target.
    pub waypoints: Vec<JointState>,
    pub duration_s: f64,
    pub max_force_est: f64,
    pub stability_score: f64,
    pub timestamp: f64,
}

impl JointTrajectoryChunk {
    pub fn validate(&self) -> PipelineResult<()> {
        if self.waypoints.is_empty() {
            return Err(PipelineError::validation("trajectory has no waypoints"));
        }
        for (i, wp) in self.waypoints.iter().enumerate() {
            if wp.names != self.joint_names {
                return Err(PipelineError::validation(format!(
                    "waypoint {} joint names mismatch",
                    i
                )));
            }
        }
        Ok(())
    }

    /// Stable digest of this chunk's content, excluding the id fields
    /// that are themselves derived from this digest
    /// (`chunk_id = H({plan_id, ordinal, payload_digest})`).
    pub fn payload_digest(&self, float_round: i32) -> PipelineResult<String> {
        #[derive(Serialize)]
        struct Payload<'a> {
            description: &'a str,
            joint_names: &'a [String],
            waypoints: &'a [JointState],
            duration_s: f64,
            max_force_est: f64,
            stability_score: f64,
        }
        crate::determinism::stable_hash_json(
            &Payload {
                description: &self.description,
                joint_names: &self.joint_names,
                waypoints: &self.waypoints,
                duration_s: self.duration_s,
                max_force_est: self.max_force_est,
                stability_score: self.stability_score,
            },
            float_round,
        )
    }
}

/// A fully planned, content-addressed sequence of chunks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskPlan {
    pub plan_id: String,
    pub instruction: String,
    pub input_digest: String,
    pub config_digest: String,
    pub chunks: Vec<JointTrajectoryChunk>,
    pub created_at: f64,
}

impl TaskPlan {
    /// Canonical-JSON serialization, stable across hosts/runs for the
    /// same content (SPEC_FULL.md §6 persisted state layout).
    pub fn to_canonical_json(&self, float_round: i32) -> PipelineResult<String> {
        crate::determinism::to_canonical_json_string(self, float_round)
    }

    pub fn from_canonical_json(s: &str) -> PipelineResult<Self> {
        Ok(serde_json::from_str(s)?)
    }
}

/// Outcome of a single T5 certification call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CertificationReport {
    pub safe: bool,
    pub reason: String,
    pub chunk_id: String,
    pub timestamp: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joint_state_rejects_empty_names() {
        let err = JointState::new(vec![], vec![]).unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)));
    }

    #[test]
    fn joint_state_rejects_length_mismatch() {
        let err = JointState::new(vec!["joint_1".into()], vec![0.0, 1.0]).unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)));
    }

    #[test]
    fn joint_trajectory_validates_waypoint_names() {
        let good = JointState::new(vec!["j1".into()], vec![0.0]).unwrap();
        let mismatched = JointState {
            names: vec!["j2".into()],
            positions: vec![0.0],
            velocities: None,
            effort: None,
        };
        let traj = JointTrajectoryChunk {
            chunk_id: "c".into(),
            plan_id: "p".into(),
            ordinal: 0,
            description: "d".into(),
            joint_names: vec!["j1".into()],
            waypoints: vec![good, mismatched],
            duration_s: 1.0,
            max_force_est: 0.0,
            stability_score: 1.0,
            timestamp: 0.0,
        };
        assert!(traj.validate().is_err());
    }
}
