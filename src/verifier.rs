//! T5: Physics Verifier.
//!
//! Stateless certification of a single trajectory chunk against
//! continuity, joint limits, stability, and force. Ground truth:
//! `mcp_robot/safety/physics_engine.py` and `safety_chip.py`, merged
//! into one pure `verify` entrypoint — the source's `SafetyChip`
//! DEGRADED tier is not carried forward; the spec commits to a binary
//! valid/invalid gate (SPEC_FULL.md §4.6). Checks run in a fixed order
//! and short-circuit on first failure, so `reason` always names the
//! single cause closest to root.

use std::collections::HashMap;

use crate::config::SafetyThresholds;
use crate::contracts::{CertificationReport, JointTrajectoryChunk, RobotStateSnapshot};

/// Certify `trajectory` against the robot's current state and joint
/// table. Pure function: no I/O, no mutation, safe to call
/// concurrently from any number of callers.
pub fn verify(
    trajectory: &JointTrajectoryChunk,
    current_state: &RobotStateSnapshot,
    joint_limits: &HashMap<String, (f64, f64)>,
    thresholds: &SafetyThresholds,
) -> CertificationReport {
    let report = |safe: bool, reason: String| CertificationReport {
        safe,
        reason,
        chunk_id: trajectory.chunk_id.clone(),
        timestamp: current_state.timestamp,
    };

    // 1. Continuity: the first waypoint must be close to where the
    // robot actually is.
    let current_positions = current_state.to_ordered_dict();
    let Some(first_waypoint) = trajectory.waypoints.first() else {
        return report(false, "Continuity Error: trajectory has no waypoints".into());
    };
    for (name, position) in first_waypoint.names.iter().zip(first_waypoint.positions.iter()) {
        if let Some(&current) = current_positions.get(name) {
            let delta = (current - position).abs();
            if delta > thresholds.continuity_tolerance_rad {
                return report(
                    false,
                    format!("Continuity Error: {} jumps by {:.6}", name, delta),
                );
            }
        }
    }

    // 2. Waypoint consistency: every waypoint must share the
    // trajectory's declared joint_names, in order.
    for (i, waypoint) in trajectory.waypoints.iter().enumerate() {
        if waypoint.names != trajectory.joint_names {
            return report(false, format!("Waypoint {} joint names mismatch", i));
        }
    }

    // 3. Joint limits: every position, at every waypoint, within its
    // joint's closed interval.
    for (i, waypoint) in trajectory.waypoints.iter().enumerate() {
        for (name, &position) in waypoint.names.iter().zip(waypoint.positions.iter()) {
            if let Some(&(min, max)) = joint_limits.get(name) {
                if position < min || position > max {
                    return report(false, format!("Limit Error: {} at waypoint {}", name, i));
                }
            }
        }
    }

    // 4. Stability: a scalar ZMP-style score derived from base
    // velocity and payload, must clear the configured floor.
    let zmp_score = (1.0
        - thresholds.zmp_base_velocity_coeff * current_state.base_velocity.abs()
        - thresholds.zmp_payload_coeff * current_state.payload_mass * thresholds.zmp_extension)
        .clamp(0.0, 1.0);
    if zmp_score < thresholds.zmp_min_valid {
        return report(
            false,
            format!("Stability Error: zmp_score {:.4} below floor {:.4}", zmp_score, thresholds.zmp_min_valid),
        );
    }

    // 5. Force ceiling.
    if trajectory.max_force_est > thresholds.max_force_n {
        return report(
            false,
            format!(
                "Force Error: max_force_est {:.2}N exceeds {:.2}N",
                trajectory.max_force_est, thresholds.max_force_n
            ),
        );
    }

    report(true, "Certified Safe".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::JointState;

    fn joint_names() -> Vec<String> {
        (1..=7).map(|i| format!("joint_{}", i)).collect()
    }

    fn joint_limits() -> HashMap<String, (f64, f64)> {
        joint_names()
            .into_iter()
            .map(|n| (n, (-3.14, 3.14)))
            .collect()
    }

    fn state_at(positions: Vec<f64>, base_velocity: f64, payload_mass: f64) -> RobotStateSnapshot {
        RobotStateSnapshot::new(joint_names(), positions, base_velocity, payload_mass, 1000.0, "1.0.0").unwrap()
    }

    fn trajectory_to(positions: Vec<f64>, max_force_est: f64) -> JointTrajectoryChunk {
        let names = joint_names();
        let start = JointState::new(names.clone(), vec![0.0; 7]).unwrap();
        let target = JointState::new(names.clone(), positions).unwrap();
        JointTrajectoryChunk {
            chunk_id: "c0".into(),
            plan_id: "p0".into(),
            ordinal: 0,
            description: "test".into(),
            joint_names: names,
            waypoints: vec![start, target],
            duration_s: 1.0,
            max_force_est,
            stability_score: 1.0,
            timestamp: 1000.0,
        }
    }

    #[test]
    fn certifies_a_clean_trajectory() {
        let state = state_at(vec![0.0; 7], 0.0, 0.0);
        let traj = trajectory_to(vec![0.05; 7], 10.0);
        let report = verify(&traj, &state, &joint_limits(), &SafetyThresholds::default());
        assert!(report.safe);
        assert_eq!(report.reason, "Certified Safe");
    }

    #[test]
    fn continuity_jump_is_rejected() {
        let state = state_at(vec![0.0; 7], 0.0, 0.0);
        let mut traj = trajectory_to(vec![0.05; 7], 10.0);
        traj.waypoints[0] = JointState::new(joint_names(), vec![1.0; 7]).unwrap();
        let report = verify(&traj, &state, &joint_limits(), &SafetyThresholds::default());
        assert!(!report.safe);
        assert!(report.reason.contains("Continuity Error"));
    }

    #[test]
    fn waypoint_name_mismatch_is_rejected() {
        let state = state_at(vec![0.0; 7], 0.0, 0.0);
        let mut traj = trajectory_to(vec![0.05; 7], 10.0);
        traj.waypoints[1].names[0] = "wrong_joint".into();
        let report = verify(&traj, &state, &joint_limits(), &SafetyThresholds::default());
        assert!(!report.safe);
        assert!(report.reason.contains("joint names mismatch"));
    }

    #[test]
    fn out_of_limit_position_is_rejected() {
        let state = state_at(vec![0.0; 7], 0.0, 0.0);
        let traj = trajectory_to(vec![10.0; 7], 10.0);
        let report = verify(&traj, &state, &joint_limits(), &SafetyThresholds::default());
        assert!(!report.safe);
        assert!(report.reason.contains("Limit Error"));
    }

    #[test]
    fn high_base_velocity_fails_stability() {
        let state = state_at(vec![0.0; 7], 3.0, 0.0);
        let traj = trajectory_to(vec![0.05; 7], 10.0);
        let report = verify(&traj, &state, &joint_limits(), &SafetyThresholds::default());
        assert!(!report.safe);
        assert!(report.reason.contains("Stability"));
    }

    #[test]
    fn excessive_force_is_rejected() {
        let state = state_at(vec![0.0; 7], 0.0, 0.0);
        let traj = trajectory_to(vec![0.05; 7], 150.0);
        let report = verify(&traj, &state, &joint_limits(), &SafetyThresholds::default());
        assert!(!report.safe);
        assert!(report.reason.contains("Force Error"));
    }

    #[test]
    fn raising_payload_can_only_turn_certified_into_rejected() {
        let traj = trajectory_to(vec![0.05; 7], 10.0);
        let limits = joint_limits();
        let thresholds = SafetyThresholds::default();
        let light = state_at(vec![0.0; 7], 0.0, 0.0);
        let heavy = state_at(vec![0.0; 7], 0.0, 50.0);
        let light_report = verify(&traj, &light, &limits, &thresholds);
        let heavy_report = verify(&traj, &heavy, &limits, &thresholds);
        assert!(light_report.safe);
        assert!(!heavy_report.safe);
    }
}
