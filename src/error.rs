//! Unified error handling for the manipulator control pipeline
//!
//! Centralizes the five error kinds the pipeline can surface (see
//! SPEC_FULL.md §7) into a single type so every stage returns the same
//! `Result` alias and the orchestrator can match on variant instead of
//! parsing strings.

use thiserror::Error;

/// Main error type for pipeline operations
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Structural invariant violated on a snapshot or chunk (length
    /// mismatch, empty joint names, unknown joint name, ...).
    #[error("Validation error: {0}")]
    Validation(String),

    /// Canonicalization or hashing failed (non-finite float, unhashable
    /// input). Fatal — aborts the operation.
    #[error("Determinism violation: {0}")]
    Determinism(String),

    /// Configuration parsing or validation errors.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Unknown plan_id or chunk_id.
    #[error("Not found: {0}")]
    NotFound(String),

    /// T6 adapter failure (timeout, rejection, cancellation, driver error).
    #[error("Adapter error: {0}")]
    Adapter(String),

    /// Serialization/Deserialization errors.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O related errors (config file loads, log tail persistence).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal errors (use sparingly).
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenience type alias for Results using PipelineError
pub type PipelineResult<T> = Result<T, PipelineError>;

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        PipelineError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for PipelineError {
    fn from(err: toml::de::Error) -> Self {
        PipelineError::Config(format!("TOML parse error: {}", err))
    }
}

impl From<toml::ser::Error> for PipelineError {
    fn from(err: toml::ser::Error) -> Self {
        PipelineError::Serialization(format!("TOML serialization error: {}", err))
    }
}

impl<T> From<std::sync::PoisonError<T>> for PipelineError {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        PipelineError::Internal("Lock poisoned".to_string())
    }
}

impl From<&str> for PipelineError {
    fn from(msg: &str) -> Self {
        PipelineError::Internal(msg.to_string())
    }
}

impl From<String> for PipelineError {
    fn from(msg: String) -> Self {
        PipelineError::Internal(msg)
    }
}

// Helper constructors, matching the teacher's `HorusError::config(...)` style.
impl PipelineError {
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        PipelineError::Validation(msg.into())
    }

    pub fn determinism<S: Into<String>>(msg: S) -> Self {
        PipelineError::Determinism(msg.into())
    }

    pub fn config<S: Into<String>>(msg: S) -> Self {
        PipelineError::Config(msg.into())
    }

    pub fn not_found<S: Into<String>>(resource: S) -> Self {
        PipelineError::NotFound(resource.into())
    }

    pub fn adapter<S: Into<String>>(msg: S) -> Self {
        PipelineError::Adapter(msg.into())
    }

    /// Check if this is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, PipelineError::NotFound(_))
    }

    /// Check if this is a determinism violation (fatal, never cached)
    pub fn is_determinism(&self) -> bool {
        matches!(self, PipelineError::Determinism(_))
    }
}
