//! T6: Execution Adapter.
//!
//! Two modes selected at construction (SPEC_FULL.md §4.7). Ground
//! truth: `mcp_robot/execution/action_server_adapter.py`'s
//! SIM/HARDWARE split, narrowed to the only suspension point the spec
//! sanctions — the HARDWARE path's action-server round trip — per the
//! "cooperative async with suspension only at I/O" design note
//! (SPEC_FULL.md §9). SIM never awaits.
//!
//! The real action-server wire protocol is an out-of-scope external
//! collaborator (SPEC_FULL.md §1); HARDWARE mode here is a thin,
//! test-injectable stand-in: connection presence and mid-execution
//! cancellation are flags a caller (or test) sets directly rather than
//! a live network client.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::contracts::JointTrajectoryChunk;
use crate::error::PipelineResult;

/// Uniform result both adapter modes return (SPEC_FULL.md §4.7).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AdapterResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    pub reason: String,
}

impl AdapterResult {
    fn ok(reason: impl Into<String>) -> Self {
        Self {
            success: true,
            error_code: None,
            reason: reason.into(),
        }
    }

    fn failed(error_code: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            success: false,
            error_code: Some(error_code.into()),
            reason: reason.into(),
        }
    }
}

/// One translated action-server waypoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActionPoint {
    pub positions: Vec<f64>,
    pub time_from_start: f64,
}

/// Shared, clonable handles a test harness (or an operator CLI) can
/// flip to simulate the action server's observable states:
/// `{Rejected, Accepted -> Executing, Succeeded, Cancelled}`.
#[derive(Debug, Clone)]
pub struct HardwareLink {
    connected: Arc<AtomicBool>,
    cancel_requested: Arc<AtomicBool>,
}

impl HardwareLink {
    /// A link with no server present — every `execute()` call against
    /// it times out, the safe default for a crate with no real driver
    /// wired up.
    pub fn disconnected() -> Self {
        Self {
            connected: Arc::new(AtomicBool::new(false)),
            cancel_requested: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn connect(&self) {
        self.connected.store(true, Ordering::Release);
    }

    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::Release);
    }

    /// Request cancellation of the in-flight (or next) goal.
    pub fn cancel(&self) {
        self.cancel_requested.store(true, Ordering::Release);
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    fn take_cancel(&self) -> bool {
        self.cancel_requested.swap(false, Ordering::AcqRel)
    }
}

impl Default for HardwareLink {
    fn default() -> Self {
        Self::disconnected()
    }
}

/// Execution mode, selected once at pipeline construction.
#[derive(Debug, Clone)]
pub enum ExecutionAdapter {
    /// Deterministic instantaneous advance; never suspends.
    Sim,
    /// Asynchronous action-server call against `link`.
    Hardware {
        link: HardwareLink,
        connect_timeout: Duration,
    },
}

impl ExecutionAdapter {
    pub fn hardware(link: HardwareLink) -> Self {
        ExecutionAdapter::Hardware {
            link,
            connect_timeout: Duration::from_secs(5),
        }
    }

    /// Execute `trajectory`. SIM resolves immediately with no
    /// suspension; HARDWARE awaits server presence (bounded by
    /// `connect_timeout`) and then the synthesized goal result.
    pub async fn execute(&self, trajectory: &JointTrajectoryChunk) -> PipelineResult<AdapterResult> {
        match self {
            ExecutionAdapter::Sim => Ok(AdapterResult::ok("Simulated execution complete")),
            ExecutionAdapter::Hardware { link, connect_timeout } => {
                self.execute_hardware(link, *connect_timeout, trajectory).await
            }
        }
    }

    async fn execute_hardware(
        &self,
        link: &HardwareLink,
        connect_timeout: Duration,
        trajectory: &JointTrajectoryChunk,
    ) -> PipelineResult<AdapterResult> {
        let connected = tokio::time::timeout(connect_timeout, wait_for_connection(link))
            .await
            .unwrap_or(false);
        if !connected {
            return Ok(AdapterResult::failed(
                "ACTION_SERVER_TIMEOUT",
                "Action Server Timeout",
            ));
        }

        let points: Vec<ActionPoint> = trajectory
            .waypoints
            .iter()
            .map(|wp| ActionPoint {
                positions: wp.positions.clone(),
                time_from_start: trajectory.duration_s,
            })
            .collect();
        log::debug!(
            "goal accepted for chunk {}: {} action points",
            trajectory.chunk_id,
            points.len()
        );

        // Accepted -> Executing. Yield once so a concurrent cancel()
        // call has a chance to land before we check for it.
        tokio::task::yield_now().await;

        if link.take_cancel() {
            return Ok(AdapterResult::failed("GOAL_CANCELLED", "Goal Cancelled"));
        }

        Ok(AdapterResult::ok("Succeeded"))
    }
}

/// Poll until the link reports a connected server, matching the
/// "waits for server connection" contract (SPEC_FULL.md §4.7). Yields
/// between polls so cooperative callers can interleave.
async fn wait_for_connection(link: &HardwareLink) -> bool {
    if link.is_connected() {
        return true;
    }
    tokio::task::yield_now().await;
    if link.is_connected() {
        return true;
    }
    // Nothing will flip this on its own; a caller holding an
    // un-connected link is expected to time out.
    std::future::pending::<bool>().await
}
