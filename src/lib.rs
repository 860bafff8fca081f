//! # Manipulator Pipeline
//!
//! A deterministic, safety-gated control pipeline that turns a
//! high-level natural-language instruction plus environment snapshots
//! into a validated sequence of joint-space trajectories for a 7-DOF
//! manipulator, executed one chunk at a time under a pluggable
//! actuator interface.
//!
//! Seven stages compose the pipeline, leaves first:
//!
//! - [`determinism`] — stable canonical hashing, frozen clock, seeded RNG.
//! - [`contracts`] — typed snapshot and chunk records with structural invariants.
//! - [`twin`] — the kinematic digital twin: where the robot actually is.
//! - [`decomposer`] (T1) — instruction -> ordered subtask list.
//! - [`planner`] (T2) — subtasks -> seed-derived latent chunks.
//! - [`tactile`] (T3) — per-waypoint grip force and stability metadata.
//! - [`mapper`] (T4) — deterministic geometric IK -> joint trajectories.
//! - [`verifier`] (T5) — stateless safety certification.
//! - [`adapter`] (T6) — SIM/HARDWARE execution.
//!
//! [`orchestrator::PipelineOrchestrator`] is the single coordinator
//! that threads T1-T4 into a content-addressed [`contracts::TaskPlan`],
//! gates each chunk through T5 before handing it to T6, and keeps the
//! twin in lockstep.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use manipulator_pipeline::adapter::ExecutionAdapter;
//! use manipulator_pipeline::config::PipelineConfig;
//! use manipulator_pipeline::contracts::{PerceptionSnapshot, RobotStateSnapshot};
//! use manipulator_pipeline::orchestrator::PipelineOrchestrator;
//! use std::collections::HashMap;
//!
//! # async fn run() -> manipulator_pipeline::error::PipelineResult<()> {
//! let config = PipelineConfig::default();
//! let joint_names = config.robot.joint_names.clone();
//! let orchestrator = PipelineOrchestrator::new(config, ExecutionAdapter::Sim)?;
//!
//! let perception = PerceptionSnapshot {
//!     camera_frame_digest: "deadbeef".into(),
//!     detected_objects: vec![],
//!     tactile_summary: HashMap::new(),
//!     timestamp: 0.0,
//! };
//! let state = RobotStateSnapshot::new(joint_names, vec![0.0; 7], 0.0, 0.0, 0.0, "1.0.0")?;
//!
//! let plan = orchestrator.plan("pick up the apple", &perception, &state)?;
//! let outcome = orchestrator.execute(&plan.plan_id, &plan.chunks[0].chunk_id).await?;
//! # let _ = outcome;
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod config;
pub mod contracts;
pub mod decomposer;
pub mod determinism;
pub mod error;
pub mod mapper;
pub mod orchestrator;
pub mod planner;
pub mod tactile;
pub mod twin;
pub mod verifier;

pub use adapter::{AdapterResult, ExecutionAdapter, HardwareLink};
pub use config::{PipelineConfig, RobotProfile, SafetyThresholds};
pub use contracts::{JointState, JointTrajectoryChunk, TaskPlan};
pub use error::{PipelineError, PipelineResult};
pub use orchestrator::{ExecutionOutcome, ExecutionStatus, PipelineOrchestrator};
pub use twin::KinematicTwin;
