//! Pipeline Orchestrator.
//!
//! The single coordinator that threads T1->T2->T3->T4 into a
//! content-addressed [`TaskPlan`], gates each chunk through T5 before
//! handing it to T6, and keeps the [`KinematicTwin`] in lockstep.
//! Ground truth: `mcp_robot/orchestrator.py`'s `ManipulatorOrchestrator`,
//! rebuilt around a single `parking_lot::Mutex` guarding every piece of
//! mutable state (`active_plans`, `execution_results`, the Twin) so
//! `plan()` and `execute()` serialize exactly as SPEC_FULL.md §5
//! requires, matching the teacher's lock-per-shared-resource discipline
//! in `scheduling/`.

use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::adapter::{AdapterResult, ExecutionAdapter};
use crate::config::{PipelineConfig, RobotProfile, SafetyThresholds};
use crate::contracts::{
    JointState, JointTrajectoryChunk, PerceptionSnapshot, RobotStateSnapshot, TaskPlan,
};
use crate::decomposer;
use crate::determinism::{stable_hash_json, Clock, DeterminismConfig};
use crate::error::{PipelineError, PipelineResult};
use crate::mapper;
use crate::planner;
use crate::tactile;
use crate::twin::KinematicTwin;
use crate::verifier;

const LOG_TAIL_CAPACITY: usize = 200;

/// Outcome status for an `execute()` or `stabilize()` call
/// (SPEC_FULL.md §6's tool-surface result shape).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExecutionStatus {
    Success,
    Failed,
    Rejected,
    Error,
}

/// Uniform result of one `execute(plan_id, chunk_id)` or `stabilize()`
/// call, cached verbatim for idempotent re-submission.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecutionOutcome {
    pub status: ExecutionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adapter_result: Option<AdapterResult>,
    pub executed_at: f64,
}

/// Advisory balance telemetry, previewing (without enforcing) the
/// stability margin the next `execute` call would be checked against.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct BalanceTelemetry {
    pub zmp_x: f64,
    pub zmp_y: f64,
    pub status: &'static str,
}

/// Advisory robot status resource.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RobotStatus {
    pub robot_id: String,
    pub mode: &'static str,
    pub battery: f64,
    pub is_stabilized: bool,
}

struct OrchestratorState {
    twin: KinematicTwin,
    active_plans: HashMap<String, TaskPlan>,
    execution_results: HashMap<(String, String), ExecutionOutcome>,
    log_tail: VecDeque<String>,
    max_ordinal_executed: HashMap<String, usize>,
}

impl OrchestratorState {
    fn log(&mut self, line: String) {
        log::info!("{}", line);
        if self.log_tail.len() == LOG_TAIL_CAPACITY {
            self.log_tail.pop_front();
        }
        self.log_tail.push_back(line);
    }
}

/// Single coordinator owning `active_plans`, `execution_results`, and
/// the Twin (SPEC_FULL.md §3 ownership rules). Construct one per
/// process; clone the adapter/config cheaply if multiple handles are
/// needed (all share the same underlying mutex via `Arc` at the
/// caller's discretion).
pub struct PipelineOrchestrator {
    determinism: DeterminismConfig,
    robot: RobotProfile,
    thresholds: SafetyThresholds,
    clock: Clock,
    adapter: ExecutionAdapter,
    state: Mutex<OrchestratorState>,
}

impl PipelineOrchestrator {
    pub fn new(config: PipelineConfig, adapter: ExecutionAdapter) -> PipelineResult<Self> {
        config.robot.validate()?;
        let home = vec![0.0; config.robot.joint_names.len()];
        let clock = Clock::new();
        let twin = KinematicTwin::at_home(config.robot.joint_names.clone(), home, clock.now());
        Ok(Self {
            determinism: config.determinism,
            robot: config.robot,
            thresholds: config.thresholds,
            clock,
            adapter,
            state: Mutex::new(OrchestratorState {
                twin,
                active_plans: HashMap::new(),
                execution_results: HashMap::new(),
                log_tail: VecDeque::with_capacity(LOG_TAIL_CAPACITY),
                max_ordinal_executed: HashMap::new(),
            }),
        })
    }

    /// Freeze the process clock, for reproducible tests
    /// (SPEC_FULL.md §3: Clock may be frozen in tests).
    pub fn freeze_clock(&self, value: f64) {
        self.clock.freeze(value);
    }

    fn config_digest(&self) -> PipelineResult<String> {
        #[derive(Serialize)]
        struct ConfigKey<'a> {
            determinism: &'a DeterminismConfig,
            robot: &'a RobotProfile,
            thresholds: &'a SafetyThresholds,
        }
        stable_hash_json(
            &ConfigKey {
                determinism: &self.determinism,
                robot: &self.robot,
                thresholds: &self.thresholds,
            },
            self.determinism.float_round,
        )
    }

    /// `Orchestrator.plan(instruction, perception, state)`
    /// (SPEC_FULL.md §4.8). Idempotent: re-submitting the same
    /// `(instruction, perception, state, config)` tuple returns the
    /// cached plan rather than re-running T1-T4.
    pub fn plan(
        &self,
        instruction: &str,
        perception: &PerceptionSnapshot,
        robot_state: &RobotStateSnapshot,
    ) -> PipelineResult<TaskPlan> {
        #[derive(Serialize)]
        struct InputKey<'a> {
            instruction: &'a str,
            perception: &'a PerceptionSnapshot,
            state: &'a RobotStateSnapshot,
        }
        let input_digest = stable_hash_json(
            &InputKey {
                instruction,
                perception,
                state: robot_state,
            },
            self.determinism.float_round,
        )?;
        let config_digest = self.config_digest()?;

        #[derive(Serialize)]
        struct PlanIdKey<'a> {
            input_digest: &'a str,
            config_digest: &'a str,
            schema_version: &'a str,
        }
        let plan_id = stable_hash_json(
            &PlanIdKey {
                input_digest: &input_digest,
                config_digest: &config_digest,
                schema_version: &self.determinism.schema_version,
            },
            self.determinism.float_round,
        )?;

        let mut state = self.state.lock();
        if let Some(cached) = state.active_plans.get(&plan_id) {
            state.log(format!("plan {} already cached, returning", plan_id));
            return Ok(cached.clone());
        }

        let task_digest = input_digest.clone();
        let subtasks = decomposer::decompose(instruction, perception);
        if subtasks.is_empty() {
            return Err(PipelineError::Internal(
                "decomposer produced no subtasks and no idle fallback".into(),
            ));
        }

        let latent_chunks = planner::plan_chunks(&subtasks, &task_digest, self.determinism.float_round)?;

        let target_lookup: HashMap<&str, &crate::contracts::DetectedObject> = perception
            .detected_objects
            .iter()
            .map(|o| (o.object_type.as_str(), o))
            .collect();

        let mut current_joints = [0.0f64; 7];
        for (i, &p) in robot_state.joint_positions.iter().take(7).enumerate() {
            current_joints[i] = p;
        }

        let created_at = self.clock.now();
        let mut chunks = Vec::with_capacity(latent_chunks.len());
        for latent in &latent_chunks {
            let augmented = tactile::encode(
                latent,
                target_lookup.get(latent.target_object.as_str()).copied(),
                self.robot.gripper_max_force_n,
            );
            let (waypoints, next_joints) = mapper::map_chunk(
                &augmented,
                &self.robot.joint_names,
                current_joints,
                self.robot.workspace_half_extent,
            )?;
            current_joints = next_joints;

            let start = waypoints
                .first()
                .cloned()
                .ok_or_else(|| PipelineError::validation("mapper produced no waypoints"))?;
            let target = waypoints
                .last()
                .cloned()
                .ok_or_else(|| PipelineError::validation("mapper produced no waypoints"))?;

            let mut chunk = JointTrajectoryChunk {
                chunk_id: String::new(),
                plan_id: plan_id.clone(),
                ordinal: latent.ordinal,
                description: format!("{} chunk {}", latent.subtask_type.as_str(), latent.ordinal),
                joint_names: self.robot.joint_names.clone(),
                waypoints: vec![start, target],
                duration_s: latent.duration_s,
                max_force_est: latent.estimated_force,
                stability_score: 1.0,
                timestamp: created_at,
            };
            let payload_digest = chunk.payload_digest(self.determinism.float_round)?;

            #[derive(Serialize)]
            struct ChunkIdKey<'a> {
                plan_id: &'a str,
                ordinal: usize,
                payload_digest: &'a str,
            }
            chunk.chunk_id = stable_hash_json(
                &ChunkIdKey {
                    plan_id: &plan_id,
                    ordinal: chunk.ordinal,
                    payload_digest: &payload_digest,
                },
                self.determinism.float_round,
            )?;
            chunk.validate()?;
            chunks.push(chunk);
        }

        let task_plan = TaskPlan {
            plan_id: plan_id.clone(),
            instruction: instruction.to_string(),
            input_digest,
            config_digest,
            chunks,
            created_at,
        };

        state.active_plans.insert(plan_id.clone(), task_plan.clone());
        state.log(format!(
            "plan {} generated: {} chunks from instruction {:?}",
            plan_id,
            task_plan.chunks.len(),
            instruction
        ));
        Ok(task_plan)
    }

    /// `Orchestrator.execute(plan_id, chunk_id)` (SPEC_FULL.md §4.8).
    /// Idempotent: a repeated call with the same ids returns the
    /// cached outcome by value rather than re-running T5/T6.
    pub async fn execute(&self, plan_id: &str, chunk_id: &str) -> PipelineResult<ExecutionOutcome> {
        let key = (plan_id.to_string(), chunk_id.to_string());

        // Phase 1 (under lock, no suspension): cache check, chunk
        // resolution, T5 certification against the Twin's current
        // snapshot.
        let chunk = {
            let mut state = self.state.lock();
            if let Some(cached) = state.execution_results.get(&key) {
                state.log(format!("execute {}/{} cache hit", plan_id, chunk_id));
                return Ok(cached.clone());
            }

            let plan = state
                .active_plans
                .get(plan_id)
                .ok_or_else(|| PipelineError::not_found(format!("plan {} not found", plan_id)))?;
            let chunk = plan
                .chunks
                .iter()
                .find(|c| c.chunk_id == chunk_id)
                .ok_or_else(|| PipelineError::not_found(format!("chunk {} not found", chunk_id)))?
                .clone();

            let highest = state.max_ordinal_executed.get(plan_id).copied();
            if let Some(highest) = highest {
                if chunk.ordinal > highest + 1 {
                    state.log(format!(
                        "execute {}/{} is out of order (ordinal {}, last executed {})",
                        plan_id, chunk_id, chunk.ordinal, highest
                    ));
                }
            }

            let twin_snapshot = state.twin.snapshot(&self.determinism.schema_version)?;
            let report = verifier::verify(
                &chunk,
                &twin_snapshot,
                &self.robot.joint_limits_map(),
                &self.thresholds,
            );
            if !report.safe {
                let outcome = ExecutionOutcome {
                    status: ExecutionStatus::Rejected,
                    reason: Some(report.reason.clone()),
                    adapter_result: None,
                    executed_at: self.clock.now(),
                };
                state.execution_results.insert(key, outcome.clone());
                state.log(format!(
                    "execute {}/{} REJECTED: {}",
                    plan_id, chunk_id, report.reason
                ));
                return Ok(outcome);
            }

            chunk
        };

        // Phase 2 (no lock held): T6 may suspend in HARDWARE mode.
        let adapter_result = self.adapter.execute(&chunk).await?;

        // Phase 3 (re-acquire lock): advance the Twin on SIM success,
        // build and cache the final outcome.
        let mut state = self.state.lock();
        if adapter_result.success {
            if matches!(self.adapter, ExecutionAdapter::Sim) {
                if let Some(last) = chunk.waypoints.last() {
                    state
                        .twin
                        .advance(last.positions.clone(), state.twin.base_velocity(), self.clock.now());
                }
            }
            state
                .max_ordinal_executed
                .entry(plan_id.to_string())
                .and_modify(|m| *m = (*m).max(chunk.ordinal))
                .or_insert(chunk.ordinal);
        }

        let status = if adapter_result.success {
            ExecutionStatus::Success
        } else {
            ExecutionStatus::Failed
        };
        let outcome = ExecutionOutcome {
            reason: if adapter_result.success {
                None
            } else {
                Some(adapter_result.reason.clone())
            },
            adapter_result: Some(adapter_result),
            status,
            executed_at: self.clock.now(),
        };
        state
            .execution_results
            .insert((plan_id.to_string(), chunk_id.to_string()), outcome.clone());
        state.log(format!(
            "execute {}/{} -> {:?}",
            plan_id, chunk_id, outcome.status
        ));
        Ok(outcome)
    }

    /// Synthesize a trajectory from the Twin's current state to the
    /// all-zero home pose and drive it through T6 directly, bypassing
    /// the plan cache — the only sanctioned bypass (SPEC_FULL.md
    /// §4.8, §9: committed to home-pose drive, not an emergency stop).
    pub async fn stabilize(&self) -> PipelineResult<ExecutionOutcome> {
        let chunk = {
            let state = self.state.lock();
            let names = state.twin.joint_names().to_vec();
            let current = state.twin.joint_positions().to_vec();
            let home = vec![0.0; names.len()];
            let start = JointState::new(names.clone(), current)?;
            let target = JointState::new(names.clone(), home)?;
            let mut chunk = JointTrajectoryChunk {
                chunk_id: String::new(),
                plan_id: "stabilize".into(),
                ordinal: 0,
                description: "stabilize to home pose".into(),
                joint_names: names,
                waypoints: vec![start, target],
                duration_s: 1.0,
                max_force_est: 0.0,
                stability_score: 1.0,
                timestamp: self.clock.now(),
            };
            chunk.chunk_id = chunk.payload_digest(self.determinism.float_round)?;
            chunk
        };

        let adapter_result = self.adapter.execute(&chunk).await?;

        let mut state = self.state.lock();
        if adapter_result.success {
            if let Some(last) = chunk.waypoints.last() {
                state.twin.teleport(last.positions.clone(), self.clock.now());
            }
            state.log("stabilize: drove to home pose".to_string());
        } else {
            state.log(format!("stabilize FAILED: {}", adapter_result.reason));
        }

        let status = if adapter_result.success {
            ExecutionStatus::Success
        } else {
            ExecutionStatus::Failed
        };
        Ok(ExecutionOutcome {
            reason: if adapter_result.success {
                None
            } else {
                Some(adapter_result.reason.clone())
            },
            adapter_result: Some(adapter_result),
            status,
            executed_at: self.clock.now(),
        })
    }

    /// Directly set the Twin's payload mass, mirroring the original
    /// `KinematicSimulator.update_payload` — drives T5's stability and
    /// force checks without going through a planned trajectory, e.g.
    /// when a gripper has just closed around an object of known mass.
    pub fn update_payload(&self, mass: f64) {
        let mut state = self.state.lock();
        state.twin.set_payload_mass(mass);
        state.log(format!("twin payload set to {} kg", mass));
    }

    /// Directly set the Twin's base velocity, mirroring the original
    /// `KinematicSimulator.update_base_velocity`.
    pub fn update_base_velocity(&self, velocity: f64) {
        let mut state = self.state.lock();
        state.twin.set_base_velocity(velocity);
        state.log(format!("twin base velocity set to {} m/s", velocity));
    }

    /// Advisory balance telemetry resource (SPEC_FULL.md §6):
    /// previews the ZMP-style stability score the Twin's current
    /// state would be checked against, without enforcing it.
    pub fn balance(&self) -> BalanceTelemetry {
        let state = self.state.lock();
        let zmp_score = (1.0
            - self.thresholds.zmp_base_velocity_coeff * state.twin.base_velocity().abs()
            - self.thresholds.zmp_payload_coeff * state.twin.payload_mass() * self.thresholds.zmp_extension)
            .clamp(0.0, 1.0);
        BalanceTelemetry {
            zmp_x: 0.0,
            zmp_y: 0.0,
            status: if zmp_score >= self.thresholds.zmp_min_valid {
                "stable"
            } else {
                "unstable"
            },
        }
    }

    /// Advisory robot status resource.
    pub fn robot_status(&self) -> RobotStatus {
        let state = self.state.lock();
        let is_stabilized = state.twin.joint_positions().iter().all(|&p| p.abs() < 1e-9);
        RobotStatus {
            robot_id: "manipulator-0".to_string(),
            mode: match self.adapter {
                ExecutionAdapter::Sim => "SIM",
                ExecutionAdapter::Hardware { .. } => "HARDWARE",
            },
            battery: 1.0,
            is_stabilized,
        }
    }

    /// Tail of the in-memory execution log, bounded to
    /// `LOG_TAIL_CAPACITY` lines (SPEC_FULL.md §6).
    pub fn log_tail(&self) -> Vec<String> {
        self.state.lock().log_tail.iter().cloned().collect()
    }

    pub fn active_plan_count(&self) -> usize {
        self.state.lock().active_plans.len()
    }

    /// Register a previously planned (and persisted) [`TaskPlan`] so
    /// `execute()` can resolve it without re-running T1-T4. Used by
    /// the CLI binary to recover `active_plans` across process
    /// invocations, since this crate does not mandate any particular
    /// persisted state layout (SPEC_FULL.md §6).
    pub fn hydrate_plan(&self, plan: TaskPlan) {
        let mut state = self.state.lock();
        state.active_plans.entry(plan.plan_id.clone()).or_insert(plan);
    }

    pub fn schema_version(&self) -> &str {
        &self.determinism.schema_version
    }
}
