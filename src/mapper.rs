//! T4: Universal Mapper.
//!
//! Deterministic geometric inverse kinematics for a 7-DOF arm. Ground
//! truth: `mcp_robot/action_encoder/universal_action_encoder.py`. Not
//! a numerical solver — a closed-form two-link planar solution (`q4`
//! from the law of cosines, `q2` from the sum of two angles) extended
//! to 7 joints by fixing the wrist/redundant joints at values derived
//! from the shoulder/elbow pair. Each call chains from the previous
//! waypoint's joint state so a trajectory stays continuous.

use crate::contracts::{JointState, TactileAugmentedChunk};
use crate::error::{PipelineError, PipelineResult};

/// Upper-arm and forearm link lengths, in meters.
const L1: f64 = 0.4;
const L2: f64 = 0.4;
/// Base height offset subtracted from world-frame `z` before solving.
const BASE_HEIGHT: f64 = 0.2;

const ROUND_PLACES: i32 = 6;

fn round6(value: f64) -> f64 {
    let factor = 10f64.powi(ROUND_PLACES);
    (value * factor).round() / factor
}

/// Denormalize a `[0, 1]`-normalized waypoint into world-frame
/// coordinates within the robot's workspace bounds.
pub fn denormalize(waypoint: [f64; 3], workspace_half_extent: f64) -> [f64; 3] {
    [
        (waypoint[0] - 0.5) * 2.0 * workspace_half_extent,
        (waypoint[1] - 0.5) * 2.0 * workspace_half_extent,
        waypoint[2] * workspace_half_extent,
    ]
}

/// Solve inverse kinematics for a single world-frame `(x, y, z)`
/// target, returning the 7 joint angles `[q1..q7]`. `q3`, `q5`, `q7`
/// are fixed at zero (the encoder does not resolve wrist orientation);
/// `q6` is set to close the end-effector's pitch against `q2`/`q4` so
/// the gripper stays level. Targets beyond the arm's reach are not
/// rejected here — `cos_q4` is clamped to `[-1, 1]`, same as the
/// source this was ported from, and T5 is what catches the resulting
/// joint-limit violation.
pub fn solve_ik(target: [f64; 3]) -> PipelineResult<[f64; 7]> {
    let [x, y, z] = target;
    let q1 = y.atan2(x);
    let r = (x * x + y * y).sqrt();
    let h = z - BASE_HEIGHT;
    let dist = (r * r + h * h).sqrt();

    let cos_q4 = ((dist * dist - L1 * L1 - L2 * L2) / (2.0 * L1 * L2)).clamp(-1.0, 1.0);
    let q4 = -cos_q4.acos();

    let phi1 = h.atan2(r);
    let phi2 = (L2 * (-q4).sin()).atan2(L1 + L2 * (-q4).cos());
    let q2 = phi1 + phi2;

    let q3 = 0.0;
    let q5 = 0.0;
    let q7 = 0.0;
    let q6 = -q2 - q4;

    Ok([
        round6(q1),
        round6(q2),
        round6(q3),
        round6(q4),
        round6(q5),
        round6(q6),
        round6(q7),
    ])
}

/// Map a tactile-augmented chunk into a two-waypoint joint-space
/// trajectory: the chunk's *last* position waypoint is the only
/// task-space target solved (SPEC_FULL.md §4.5 step 1), and
/// `current_joints` becomes the trajectory's start waypoint so
/// adjacent chunks chain continuously. Returns `(waypoints,
/// next_current_joints)`, the latter threaded into the next chunk.
pub fn map_chunk(
    chunk: &TactileAugmentedChunk,
    joint_names: &[String],
    current_joints: [f64; 7],
    workspace_half_extent: f64,
) -> PipelineResult<(Vec<JointState>, [f64; 7])> {
    let target_waypoint = *chunk
        .position_waypoints
        .last()
        .ok_or_else(|| PipelineError::validation("chunk has no position waypoints"))?;
    let world = denormalize(target_waypoint, workspace_half_extent);
    let target_joints = solve_ik(world)?;

    let start = JointState::new(joint_names.to_vec(), current_joints.to_vec())?;
    let target = JointState::new(joint_names.to_vec(), target_joints.to_vec())?;

    Ok((vec![start, target], target_joints))
}
