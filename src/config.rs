//! Ambient: layered configuration.
//!
//! Two TOML-serializable structs, loadable from a file or built
//! programmatically, shaped like `horus_core::driver::DriversConfig`'s
//! load/save conventions (ground truth: `driver.rs`'s
//! `from_file`/`find_and_load`/`save` trio):
//!
//! - [`RobotProfile`] — the physical arm: workspace bounds, gripper,
//!   joint table. `RobotProfile::default_arm()` is the zero-config
//!   default, playing the role `SingleDriverConfig::simulation()` plays
//!   for drivers.
//! - [`SafetyThresholds`] — the named constants T5 checks against,
//!   so they are configuration rather than magic numbers scattered
//!   through `verifier.rs` (SPEC_FULL.md §9).

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::determinism::DeterminismConfig;
use crate::error::{PipelineError, PipelineResult};

/// The 7-DOF arm's physical envelope: joint table, workspace bounds,
/// and gripper force ceiling.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RobotProfile {
    pub joint_names: Vec<String>,
    /// Per-joint `(min, max)` closed interval, aligned with `joint_names`.
    pub joint_limits: Vec<(f64, f64)>,
    /// Half-extent of the symmetric x/y workspace and the ceiling of
    /// the z workspace (`x, y ∈ [-half_extent, half_extent]`,
    /// `z ∈ [0, half_extent]`) — the specific instance of the general
    /// per-axis min/max workspace model this crate's IK denormalizer
    /// uses (see `mapper::denormalize`; documented in DESIGN.md).
    pub workspace_half_extent: f64,
    pub gripper_max_force_n: f64,
}

impl RobotProfile {
    /// The default 7-DOF arm profile usable without a config file,
    /// matching `SingleDriverConfig::simulation()`'s role as a
    /// zero-config default.
    pub fn default_arm() -> Self {
        let joint_names: Vec<String> = (1..=7).map(|i| format!("joint_{}", i)).collect();
        let joint_limits = vec![(-std::f64::consts::PI, std::f64::consts::PI); 7];
        Self {
            joint_names,
            joint_limits,
            workspace_half_extent: 1.0,
            gripper_max_force_n: 50.0,
        }
    }

    pub fn validate(&self) -> PipelineResult<()> {
        if self.joint_names.len() != self.joint_limits.len() {
            return Err(PipelineError::validation(format!(
                "joint_names has {} entries but joint_limits has {}",
                self.joint_names.len(),
                self.joint_limits.len()
            )));
        }
        if self.joint_names.is_empty() {
            return Err(PipelineError::validation("robot profile has no joints"));
        }
        Ok(())
    }

    /// Joint limits keyed by name, the shape T5's joint-limit check needs.
    pub fn joint_limits_map(&self) -> HashMap<String, (f64, f64)> {
        self.joint_names
            .iter()
            .cloned()
            .zip(self.joint_limits.iter().copied())
            .collect()
    }
}

/// Named safety thresholds T5 checks against (SPEC_FULL.md §4.6/§9).
/// Defaults match the spec exactly; callers may override per
/// deployment without touching `verifier.rs`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SafetyThresholds {
    /// Max per-joint jump (radians) allowed between current state and
    /// a trajectory's first waypoint.
    pub continuity_tolerance_rad: f64,
    /// ZMP penalty coefficient applied to `|base_velocity|`.
    pub zmp_base_velocity_coeff: f64,
    /// ZMP penalty coefficient applied to `payload_mass * extension`.
    pub zmp_payload_coeff: f64,
    /// Fixed arm-extension factor used by the ZMP payload term.
    pub zmp_extension: f64,
    /// Minimum `zmp_score` to remain certified.
    pub zmp_min_valid: f64,
    /// Maximum `max_force_est` (N) a trajectory may carry.
    pub max_force_n: f64,
}

impl Default for SafetyThresholds {
    fn default() -> Self {
        Self {
            continuity_tolerance_rad: 0.1,
            zmp_base_velocity_coeff: 0.3,
            zmp_payload_coeff: 0.05,
            zmp_extension: 0.5,
            zmp_min_valid: 0.4,
            max_force_n: 100.0,
        }
    }
}

/// Top-level pipeline configuration: determinism settings, the robot's
/// physical profile, and safety thresholds, all in one TOML document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipelineConfig {
    pub determinism: DeterminismConfig,
    pub robot: RobotProfile,
    #[serde(default)]
    pub thresholds: SafetyThresholds,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            determinism: DeterminismConfig::default(),
            robot: RobotProfile::default_arm(),
            thresholds: SafetyThresholds::default(),
        }
    }
}

impl PipelineConfig {
    /// Load config from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> PipelineResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::config(format!("failed to read pipeline config {:?}: {}", path, e))
        })?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> PipelineResult<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Find and load config from standard search paths, falling back
    /// to [`PipelineConfig::default`] if none is found.
    ///
    /// Search order:
    /// 1. `./manipulator.toml`
    /// 2. `~/.manipulator/config.toml`
    pub fn find_and_load() -> Self {
        let mut candidates = vec![std::path::PathBuf::from("manipulator.toml")];
        if let Some(home) = dirs::home_dir() {
            candidates.push(home.join(".manipulator").join("config.toml"));
        }
        for path in candidates {
            if path.exists() {
                if let Ok(config) = Self::from_file(&path) {
                    return config;
                }
            }
        }
        Self::default()
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> PipelineResult<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| PipelineError::config(format!("failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_arm_has_seven_joints() {
        let profile = RobotProfile::default_arm();
        assert_eq!(profile.joint_names.len(), 7);
        profile.validate().unwrap();
    }

    #[test]
    fn joint_limits_map_is_keyed_by_name() {
        let profile = RobotProfile::default_arm();
        let map = profile.joint_limits_map();
        assert_eq!(map.len(), 7);
        assert!(map.contains_key("joint_1"));
    }

    #[test]
    fn mismatched_joint_arrays_fail_validation() {
        let mut profile = RobotProfile::default_arm();
        profile.joint_limits.pop();
        assert!(profile.validate().is_err());
    }

    #[test]
    fn default_config_round_trips_through_toml() {
        let config = PipelineConfig::default();
        let serialized = toml::to_string_pretty(&config).unwrap();
        let parsed: PipelineConfig = toml::from_str(&serialized).unwrap();
        assert_eq!(config, parsed);
    }

    #[test]
    fn safety_thresholds_default_matches_spec() {
        let thresholds = SafetyThresholds::default();
        assert_eq!(thresholds.zmp_min_valid, 0.4);
        assert_eq!(thresholds.max_force_n, 100.0);
    }
}
