//! T3: Tactile Encoder.
//!
//! Augments each waypoint of a latent chunk with a predicted grip
//! force, slip threshold, and zero-moment-point shift. Ground truth:
//! `mcp_robot/action_encoder/visio_tactile_action_encoder.py`. Purely
//! a function of the chunk's own content plus the target object's
//! mass/friction — no external state, so it is trivially safe to
//! re-run.

use crate::contracts::{
    DetectedObject, LatentChunk, PredictedZmp, TactileAugmentedChunk, TactileWaypoint,
};

const GRAVITY: f64 = 9.81;
const GRIP_FORCE_SAFETY_FACTOR: f64 = 1.5;
const SLIP_THRESHOLD_RATIO: f64 = 0.2;

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Estimate grip force for lifting `mass` against `friction`, clamped
/// to `[0, 0.8 * max_force_n]`.
fn grip_force_n(mass: f64, friction_coefficient: f64, max_force_n: f64) -> f64 {
    let friction = if friction_coefficient.abs() < f64::EPSILON {
        f64::EPSILON
    } else {
        friction_coefficient
    };
    let raw = (mass * GRAVITY) / (friction * 2.0) * GRIP_FORCE_SAFETY_FACTOR;
    round_to(raw, 4).clamp(0.0, 0.8 * max_force_n)
}

fn predicted_zmp(waypoint: [f64; 3]) -> PredictedZmp {
    PredictedZmp {
        x: round_to((waypoint[0] - 0.5) * 0.1, 4),
        y: round_to((waypoint[1] - 0.5) * 0.1, 4),
    }
}

/// Augment a latent chunk with per-waypoint tactile predictions for
/// the given target object (falling back to a nominal 0.2 kg / 0.5
/// friction object when the target is not in the perception snapshot's
/// detected object list — mirrors the original's default object
/// profile).
pub fn encode(chunk: &LatentChunk, target: Option<&DetectedObject>, max_force_n: f64) -> TactileAugmentedChunk {
    let (mass, friction) = target
        .map(|o| (o.mass, o.friction_coefficient))
        .unwrap_or((0.2, 0.5));

    let force = grip_force_n(mass, friction, max_force_n);
    let slip_threshold = round_to(force * SLIP_THRESHOLD_RATIO, 4);

    let tactile_waypoints: Vec<TactileWaypoint> = chunk
        .position_waypoints
        .iter()
        .map(|&wp| TactileWaypoint {
            position: wp,
            grip_force_n: force,
            predicted_friction: friction,
            slip_threshold,
            predicted_zmp: predicted_zmp(wp),
        })
        .collect();

    let is_tactile_critical = matches!(
        chunk.criticality,
        crate::contracts::Criticality::High | crate::contracts::Criticality::Medium
    );

    TactileAugmentedChunk {
        ordinal: chunk.ordinal,
        subtask_type: chunk.subtask_type,
        target_object: chunk.target_object.clone(),
        position_waypoints: chunk.position_waypoints.clone(),
        duration_s: chunk.duration_s,
        criticality: chunk.criticality,
        estimated_force: chunk.estimated_force,
        tactile_waypoints,
        is_tactile_critical,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::{Criticality, SubtaskType};

    fn sample_chunk() -> LatentChunk {
        LatentChunk {
            ordinal: 0,
            subtask_type: SubtaskType::Lift,
            target_object: "apple".into(),
            latent_vector: vec![0.1, 0.2, 0.3, 0.4, 0.5],
            position_waypoints: vec![[0.1, 0.2, 0.3]; crate::contracts::TIMESTEPS_PER_CHUNK],
            force_profile: vec![8.0; crate::contracts::TIMESTEPS_PER_CHUNK],
            duration_s: 50.0 / 30.0,
            criticality: Criticality::High,
            estimated_force: 50.0,
        }
    }

    #[test]
    fn grip_force_scales_with_mass() {
        let heavy = DetectedObject {
            object_type: "apple".into(),
            mass: 2.0,
            friction_coefficient: 0.5,
        };
        let light = DetectedObject {
            object_type: "apple".into(),
            mass: 0.1,
            friction_coefficient: 0.5,
        };
        let a = encode(&sample_chunk(), Some(&heavy), 50.0);
        let b = encode(&sample_chunk(), Some(&light), 50.0);
        assert!(a.tactile_waypoints[0].grip_force_n > b.tactile_waypoints[0].grip_force_n);
    }

    #[test]
    fn grip_force_is_clamped_to_gripper_max() {
        let very_heavy = DetectedObject {
            object_type: "boulder".into(),
            mass: 500.0,
            friction_coefficient: 0.1,
        };
        let chunk = encode(&sample_chunk(), Some(&very_heavy), 50.0);
        assert!(chunk.tactile_waypoints[0].grip_force_n <= 0.8 * 50.0);
    }

    #[test]
    fn slip_threshold_is_fifth_of_grip_force() {
        let obj = DetectedObject {
            object_type: "apple".into(),
            mass: 0.3,
            friction_coefficient: 0.6,
        };
        let chunk = encode(&sample_chunk(), Some(&obj), 50.0);
        let wp = &chunk.tactile_waypoints[0];
        assert_eq!(round_to(wp.grip_force_n * 0.2, 4), wp.slip_threshold);
    }

    #[test]
    fn high_criticality_chunk_is_tactile_critical() {
        let chunk = encode(&sample_chunk(), None, 50.0);
        assert!(chunk.is_tactile_critical);
    }

    #[test]
    fn low_criticality_chunk_is_not_tactile_critical() {
        let mut low = sample_chunk();
        low.criticality = Criticality::Low;
        let chunk = encode(&low, None, 50.0);
        assert!(!chunk.is_tactile_critical);
    }

    #[test]
    fn missing_target_falls_back_to_nominal_object() {
        let chunk = encode(&sample_chunk(), None, 50.0);
        assert!(chunk.tactile_waypoints[0].grip_force_n > 0.0);
    }
}
