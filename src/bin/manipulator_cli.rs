//! `manipulator-cli` — a thin front door over [`manipulator_pipeline`],
//! exposing the tool surface of SPEC_FULL.md §6 as subcommands against
//! an in-process [`PipelineOrchestrator`]. Plays the role the
//! teacher's `horus` binary plays for the wider HORUS framework: an
//! ergonomic CLI over the library crate, not a protocol server.
//!
//! Plans are persisted as canonical JSON under `~/.manipulator/plans/`
//! so `execute-chunk` in a later invocation can resolve a plan
//! submitted earlier (SPEC_FULL.md §6's optional persisted state
//! layout). The Twin itself is not persisted — each invocation starts
//! from the robot's home pose — so a realistic session issues
//! `submit-task` and `execute-chunk` calls back to back within one
//! process, or a caller that genuinely needs cross-process continuity
//! should embed the library directly.

use std::collections::HashMap;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use colored::Colorize;

use manipulator_pipeline::adapter::ExecutionAdapter;
use manipulator_pipeline::config::PipelineConfig;
use manipulator_pipeline::contracts::{PerceptionSnapshot, RobotStateSnapshot, TaskPlan};
use manipulator_pipeline::error::PipelineResult;
use manipulator_pipeline::orchestrator::{ExecutionStatus, PipelineOrchestrator};

#[derive(Parser)]
#[command(name = "manipulator-cli")]
#[command(about = "Planning-verification-execution pipeline for a 7-DOF manipulator")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decompose and plan a natural-language instruction (`submit_task`).
    SubmitTask {
        /// Instruction text, e.g. "pick up the apple"
        instruction: String,
    },
    /// Certify and execute a single chunk of a plan (`execute_chunk`).
    ExecuteChunk { plan_id: String, chunk_id: String },
    /// Drive the twin to the all-zero home pose (`stabilize`).
    Stabilize,
    /// Advisory robot status resource.
    Status,
    /// Advisory balance telemetry resource.
    Balance,
    /// Tail of the in-memory execution log.
    LogTail,
}

fn plans_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".manipulator")
        .join("plans")
}

fn persist_plan(plan: &TaskPlan, float_round: i32) -> PipelineResult<()> {
    let dir = plans_dir();
    std::fs::create_dir_all(&dir)?;
    let path = dir.join(format!("{}.json", plan.plan_id));
    std::fs::write(path, plan.to_canonical_json(float_round)?)?;
    Ok(())
}

fn hydrate_plans(orchestrator: &PipelineOrchestrator) {
    let dir = plans_dir();
    let Ok(entries) = std::fs::read_dir(&dir) else {
        return;
    };
    for entry in entries.flatten() {
        if let Ok(contents) = std::fs::read_to_string(entry.path()) {
            if let Ok(plan) = TaskPlan::from_canonical_json(&contents) {
                orchestrator.hydrate_plan(plan);
            }
        }
    }
}

fn home_snapshot(config: &PipelineConfig) -> PipelineResult<RobotStateSnapshot> {
    let joint_count = config.robot.joint_names.len();
    RobotStateSnapshot::new(
        config.robot.joint_names.clone(),
        vec![0.0; joint_count],
        0.0,
        0.0,
        0.0,
        &config.determinism.schema_version,
    )
}

fn empty_perception() -> PerceptionSnapshot {
    PerceptionSnapshot {
        camera_frame_digest: "none".to_string(),
        detected_objects: vec![],
        tactile_summary: HashMap::new(),
        timestamp: 0.0,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger_init();
    let cli = Cli::parse();
    let config = PipelineConfig::find_and_load();
    let float_round = config.determinism.float_round;
    let orchestrator = PipelineOrchestrator::new(config.clone(), ExecutionAdapter::Sim)?;
    hydrate_plans(&orchestrator);

    match cli.command {
        Commands::SubmitTask { instruction } => {
            let state = home_snapshot(&config)?;
            let plan = orchestrator.plan(&instruction, &empty_perception(), &state)?;
            persist_plan(&plan, float_round)?;
            println!(
                "{}",
                serde_json::json!({
                    "plan_id": plan.plan_id,
                    "instruction": plan.instruction,
                    "total_chunks": plan.chunks.len(),
                    "status": "PLAN_GENERATED",
                    "digest": plan.input_digest,
                })
            );
        }
        Commands::ExecuteChunk { plan_id, chunk_id } => {
            let outcome = orchestrator.execute(&plan_id, &chunk_id).await;
            match outcome {
                Ok(outcome) => {
                    let color_line = match outcome.status {
                        ExecutionStatus::Success => "SUCCESS".green(),
                        ExecutionStatus::Failed => "FAILED".red(),
                        ExecutionStatus::Rejected => "REJECTED".yellow(),
                        ExecutionStatus::Error => "ERROR".red(),
                    };
                    eprintln!("{}", color_line);
                    println!("{}", serde_json::to_string(&outcome)?);
                }
                Err(err) if err.is_not_found() => {
                    println!(
                        "{}",
                        serde_json::json!({"status": "ERROR", "reason": err.to_string()})
                    );
                }
                Err(err) => return Err(err.into()),
            }
        }
        Commands::Stabilize => {
            let outcome = orchestrator.stabilize().await?;
            let status = if outcome.status == ExecutionStatus::Success {
                "STABILIZED"
            } else {
                "FAILED"
            };
            println!(
                "{}",
                serde_json::json!({"status": status, "final_state": [0.0; 7]})
            );
        }
        Commands::Status => {
            let status = orchestrator.robot_status();
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        Commands::Balance => {
            let balance = orchestrator.balance();
            println!("{}", serde_json::to_string_pretty(&balance)?);
        }
        Commands::LogTail => {
            for line in orchestrator.log_tail() {
                println!("{}", line);
            }
        }
    }

    Ok(())
}

fn env_logger_init() {
    let _ = log::set_boxed_logger(Box::new(ColoredLogger)).map(|_| log::set_max_level(log::LevelFilter::Info));
}

/// Minimal `colored`-formatted human log backend, matching the
/// teacher's `colored::Colorize` usage in `scheduler.rs` rather than
/// pulling in a separate logging-init crate for one CLI binary.
struct ColoredLogger;

impl log::Log for ColoredLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::Level::Info
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let level = match record.level() {
            log::Level::Error => record.level().to_string().red(),
            log::Level::Warn => record.level().to_string().yellow(),
            log::Level::Info => record.level().to_string().cyan(),
            log::Level::Debug | log::Level::Trace => record.level().to_string().normal(),
        };
        eprintln!("[{}] {}", level, record.args());
    }

    fn flush(&self) {}
}
