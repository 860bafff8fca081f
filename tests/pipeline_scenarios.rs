// End-to-end scenario coverage for the plan -> verify -> execute pipeline,
// mirroring the scenario table in SPEC_FULL.md §8.

use std::collections::HashMap;

use manipulator_pipeline::adapter::ExecutionAdapter;
use manipulator_pipeline::config::{PipelineConfig, RobotProfile, SafetyThresholds};
use manipulator_pipeline::contracts::{
    DetectedObject, JointState, JointTrajectoryChunk, PerceptionSnapshot, RobotStateSnapshot,
};
use manipulator_pipeline::determinism::DeterminismConfig;
use manipulator_pipeline::orchestrator::{ExecutionStatus, PipelineOrchestrator};

fn frozen_orchestrator(schema_version: &str) -> PipelineOrchestrator {
    let config = PipelineConfig {
        determinism: DeterminismConfig {
            seed: 42,
            float_round: 6,
            schema_version: schema_version.to_string(),
        },
        robot: RobotProfile::default_arm(),
        thresholds: SafetyThresholds::default(),
    };
    let orchestrator = PipelineOrchestrator::new(config, ExecutionAdapter::Sim).unwrap();
    orchestrator.freeze_clock(123456789.0);
    orchestrator
}

fn home_state(joint_names: Vec<String>, schema_version: &str) -> RobotStateSnapshot {
    let n = joint_names.len();
    RobotStateSnapshot::new(joint_names, vec![0.0; n], 0.0, 0.0, 123456789.0, schema_version).unwrap()
}

fn perception_with(object_type: &str, mass: f64, friction: f64) -> PerceptionSnapshot {
    PerceptionSnapshot {
        camera_frame_digest: "deadbeef".into(),
        detected_objects: vec![DetectedObject {
            object_type: object_type.into(),
            mass,
            friction_coefficient: friction,
        }],
        tactile_summary: HashMap::new(),
        timestamp: 123456789.0,
    }
}

// Scenario 1: "pick up the apple" decomposes to 5 subtasks, expands to >= 5
// chunks, and the plan_id is reproducible across independently constructed
// orchestrators given identical inputs.
#[test]
fn scenario_pick_up_the_apple_is_reproducible() {
    let a = frozen_orchestrator("2.0.0");
    let b = frozen_orchestrator("2.0.0");
    let perception = perception_with("apple", 0.2, 0.5);
    let state_a = home_state(RobotProfile::default_arm().joint_names, "2.0.0");
    let state_b = home_state(RobotProfile::default_arm().joint_names, "2.0.0");

    let plan_a = a.plan("pick up the apple", &perception, &state_a).unwrap();
    let plan_b = b.plan("pick up the apple", &perception, &state_b).unwrap();

    assert!(plan_a.chunks.len() >= 5);
    assert_eq!(plan_a.plan_id, plan_b.plan_id);
    assert_eq!(
        plan_a.to_canonical_json(6).unwrap(),
        plan_b.to_canonical_json(6).unwrap()
    );
}

// Scenario 2: executing the same chunk twice is idempotent by value,
// including an identical executed_at timestamp under a frozen clock.
#[tokio::test]
async fn scenario_repeated_execution_is_idempotent() {
    let orchestrator = frozen_orchestrator("2.0.0");
    let perception = perception_with("apple", 0.2, 0.5);
    let state = home_state(RobotProfile::default_arm().joint_names, "2.0.0");
    let plan = orchestrator.plan("pick up the apple", &perception, &state).unwrap();
    let chunk_id = plan.chunks[0].chunk_id.clone();

    let first = orchestrator.execute(&plan.plan_id, &chunk_id).await.unwrap();
    let second = orchestrator.execute(&plan.plan_id, &chunk_id).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first.status, ExecutionStatus::Success);
    assert_eq!(first.executed_at, second.executed_at);
}

// Scenario 3: a trajectory whose max_force_est exceeds the force ceiling is
// rejected with a reason naming the force error, not silently clamped.
#[test]
fn scenario_excess_force_is_rejected() {
    let joint_names = RobotProfile::default_arm().joint_names;
    let twin_snapshot = home_state(joint_names.clone(), "2.0.0");
    let start = JointState::new(joint_names.clone(), vec![0.0; 7]).unwrap();
    let target = JointState::new(joint_names.clone(), vec![0.05; 7]).unwrap();
    let overloaded = JointTrajectoryChunk {
        chunk_id: "c0".into(),
        plan_id: "p0".into(),
        ordinal: 0,
        description: "grip with excess force".into(),
        joint_names: joint_names.clone(),
        waypoints: vec![start, target],
        duration_s: 1.0,
        max_force_est: 150.0,
        stability_score: 1.0,
        timestamp: 123456789.0,
    };
    let joint_limits = joint_names
        .into_iter()
        .map(|n| (n, (-std::f64::consts::PI, std::f64::consts::PI)))
        .collect();

    let report = manipulator_pipeline::verifier::verify(
        &overloaded,
        &twin_snapshot,
        &joint_limits,
        &SafetyThresholds::default(),
    );
    assert!(!report.safe);
    assert!(report.reason.contains("Force Error"));
}

// Scenario 4: a Twin with a high base velocity fails stability, with a
// ZMP score of 1 - 0.9 = 0.1, below the 0.4 floor.
#[test]
fn scenario_sprinting_base_fails_stability() {
    let joint_names = RobotProfile::default_arm().joint_names;
    let state = RobotStateSnapshot::new(joint_names.clone(), vec![0.0; 7], 3.0, 0.0, 123456789.0, "2.0.0")
        .unwrap();
    let start = JointState::new(joint_names.clone(), vec![0.0; 7]).unwrap();
    let target = JointState::new(joint_names.clone(), vec![0.05; 7]).unwrap();
    let chunk = JointTrajectoryChunk {
        chunk_id: "c0".into(),
        plan_id: "p0".into(),
        ordinal: 0,
        description: "sprint".into(),
        joint_names: joint_names.clone(),
        waypoints: vec![start, target],
        duration_s: 1.0,
        max_force_est: 10.0,
        stability_score: 1.0,
        timestamp: 123456789.0,
    };
    let joint_limits = joint_names
        .into_iter()
        .map(|n| (n, (-std::f64::consts::PI, std::f64::consts::PI)))
        .collect();

    let report = manipulator_pipeline::verifier::verify(&chunk, &state, &joint_limits, &SafetyThresholds::default());
    assert!(!report.safe);
    assert!(report.reason.contains("Stability"));
}

// Scenario 5: an unrecognized instruction falls back to a single Idle
// subtask and still produces exactly one executable chunk.
#[tokio::test]
async fn scenario_unrecognized_instruction_still_executes() {
    let orchestrator = frozen_orchestrator("2.0.0");
    let perception = perception_with("object", 0.2, 0.5);
    let state = home_state(RobotProfile::default_arm().joint_names, "2.0.0");
    let plan = orchestrator.plan("xyz", &perception, &state).unwrap();

    assert_eq!(plan.chunks.len(), 1);
    let outcome = orchestrator
        .execute(&plan.plan_id, &plan.chunks[0].chunk_id)
        .await
        .unwrap();
    assert_eq!(outcome.status, ExecutionStatus::Success);
}

// Scenario 6: executing against an unknown plan_id reports a not-found
// error rather than a panic or a silent no-op.
#[tokio::test]
async fn scenario_unknown_plan_id_is_reported_not_found() {
    let orchestrator = frozen_orchestrator("2.0.0");
    let err = orchestrator.execute("unknown-plan", "unknown-chunk").await.unwrap_err();
    assert!(err.is_not_found());
    assert!(err.to_string().contains("not found"));
}

// Safety monotonicity: raising payload on an otherwise-identical Twin can
// only turn a certified chunk into a rejected one, never the reverse. Both
// orchestrators plan from the same home state, so the trajectory itself is
// held fixed; only the heavy orchestrator's Twin payload is raised
// afterward, via the same setter the original's benchmark harness drives.
#[tokio::test]
async fn scenario_raising_payload_only_turns_certified_into_rejected() {
    let light = frozen_orchestrator("2.0.0");
    let heavy = frozen_orchestrator("2.0.0");
    let perception = perception_with("apple", 0.2, 0.5);
    let state = home_state(RobotProfile::default_arm().joint_names, "2.0.0");

    let plan_light = light.plan("pick up the apple", &perception, &state).unwrap();
    let plan_heavy = heavy.plan("pick up the apple", &perception, &state).unwrap();
    assert_eq!(plan_light.plan_id, plan_heavy.plan_id);

    heavy.update_payload(80.0);

    let light_outcome = light
        .execute(&plan_light.plan_id, &plan_light.chunks[0].chunk_id)
        .await
        .unwrap();
    let heavy_outcome = heavy
        .execute(&plan_heavy.plan_id, &plan_heavy.chunks[0].chunk_id)
        .await
        .unwrap();

    assert_eq!(light_outcome.status, ExecutionStatus::Success);
    assert_eq!(heavy_outcome.status, ExecutionStatus::Rejected);
}
