//! Determinism Kernel
//!
//! Every other stage in this crate depends on exactly three primitives,
//! all defined here and nowhere else:
//!
//! - **Stable hash**: canonical-JSON SHA-256, the only sanctioned identity
//!   function in the system (`stable_hash_json`).
//! - **Clock**: wall time that can be frozen for reproducible tests.
//! - **Seeded RNG**: a per-chunk generator derived from a stable hash,
//!   never a single global stream, so chunk generation stays
//!   order-independent.
//!
//! Ground truth: `horus_core::scheduling::deterministic` (the virtual
//! clock / xorshift RNG shape) generalized from a tick-based scheduler
//! clock into a value-addressed hashing kernel.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::error::{PipelineError, PipelineResult};

/// Global configuration for deterministic execution.
///
/// Immutable after pipeline construction (SPEC_FULL.md §3).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeterminismConfig {
    /// Seed for deterministic RNG streams derived downstream.
    pub seed: u64,
    /// Decimal places floats are rounded to during canonicalization.
    pub float_round: i32,
    /// Schema version folded into every plan_id; bumping it invalidates
    /// previously cached plans.
    pub schema_version: String,
}

impl Default for DeterminismConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            float_round: 6,
            schema_version: "1.0.0".to_string(),
        }
    }
}

/// Canonicalize a JSON value per SPEC_FULL.md §4.1: maps sorted by key,
/// sequences preserve order, floats rounded to `float_round` places, no
/// whitespace. Returns `NonCanonicalizable` (mapped to
/// [`PipelineError::Determinism`]) for non-finite floats.
fn canonicalize(value: &Value, float_round: i32, out: &mut Value) -> PipelineResult<()> {
    match value {
        Value::Null | Value::Bool(_) | Value::String(_) => {
            *out = value.clone();
            Ok(())
        }
        Value::Number(n) => {
            if let Some(f) = n.as_f64() {
                if !f.is_finite() {
                    return Err(PipelineError::determinism(format!(
                        "non-finite float cannot be canonicalized: {}",
                        f
                    )));
                }
                if n.is_f64() {
                    let factor = 10f64.powi(float_round);
                    let rounded = (f * factor).round() / factor;
                    *out = serde_json::json!(rounded);
                    return Ok(());
                }
            }
            *out = value.clone();
            Ok(())
        }
        Value::Array(items) => {
            let mut canon = Vec::with_capacity(items.len());
            for item in items {
                let mut slot = Value::Null;
                canonicalize(item, float_round, &mut slot)?;
                canon.push(slot);
            }
            *out = Value::Array(canon);
            Ok(())
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut canon = serde_json::Map::with_capacity(map.len());
            for key in keys {
                let mut slot = Value::Null;
                canonicalize(&map[key], float_round, &mut slot)?;
                canon.insert(key.clone(), slot);
            }
            *out = Value::Object(canon);
            Ok(())
        }
    }
}

/// Canonicalize `obj` and return the lowercase hex SHA-256 digest of its
/// canonical-JSON serialization. The *only* sanctioned identity function
/// in the system — plan IDs, chunk IDs, and per-chunk seeds all derive
/// from this.
pub fn stable_hash_json<T: Serialize>(obj: &T, float_round: i32) -> PipelineResult<String> {
    let value = serde_json::to_value(obj)?;
    let mut canon = Value::Null;
    canonicalize(&value, float_round, &mut canon)?;
    let json_str = serde_json::to_string(&canon)?;
    let mut hasher = Sha256::new();
    hasher.update(json_str.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}

/// Convenience wrapper using the default `float_round = 6`, matching the
/// teacher's preference for a zero-ceremony default (cf.
/// `SingleDriverConfig::simulation()`).
pub fn stable_hash_json_default<T: Serialize>(obj: &T) -> PipelineResult<String> {
    stable_hash_json(obj, 6)
}

/// Canonical-JSON serialization of `obj`, for persisted state that must
/// byte-for-byte match across runs (SPEC_FULL.md §6).
pub fn to_canonical_json_string<T: Serialize>(obj: &T, float_round: i32) -> PipelineResult<String> {
    let value = serde_json::to_value(obj)?;
    let mut canon = Value::Null;
    canonicalize(&value, float_round, &mut canon)?;
    Ok(serde_json::to_string(&canon)?)
}

/// Robust clock that can be frozen process-wide for reproducible tests.
///
/// Freezing is permitted; production code must never depend on wall
/// time for pipeline correctness (SPEC_FULL.md §4.1).
#[derive(Debug)]
pub struct Clock {
    frozen: AtomicBool,
    frozen_value_bits: AtomicU64,
}

impl Clock {
    pub fn new() -> Self {
        Self {
            frozen: AtomicBool::new(false),
            frozen_value_bits: AtomicU64::new(0),
        }
    }

    /// Current time in seconds since the epoch, or the frozen value if set.
    pub fn now(&self) -> f64 {
        if self.frozen.load(Ordering::Acquire) {
            return f64::from_bits(self.frozen_value_bits.load(Ordering::Acquire));
        }
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs_f64()
    }

    /// Freeze the clock to return exactly `value` from `now()`.
    pub fn freeze(&self, value: f64) {
        self.frozen_value_bits.store(value.to_bits(), Ordering::Release);
        self.frozen.store(true, Ordering::Release);
    }

    pub fn unfreeze(&self) {
        self.frozen.store(false, Ordering::Release);
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen.load(Ordering::Acquire)
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

/// Deterministic per-chunk random generator.
///
/// Each planner invocation derives its own instance from
/// `hash({task_digest, subtask_type, ordinal})` rather than drawing from
/// a single global stream, so chunks can be regenerated independently
/// of execution order. Uses the same xorshift64 construction as
/// `horus_core::scheduling::deterministic::DeterministicClock::random_u64`.
pub struct ChunkRng {
    state: u64,
}

impl ChunkRng {
    /// Seed from the first 8 hex characters (32 bits) of a stable hash,
    /// per SPEC_FULL.md §4.1/§4.3.
    pub fn from_digest(digest: &str) -> Self {
        let prefix = &digest[..8.min(digest.len())];
        let seed = u64::from_str_radix(prefix, 16).unwrap_or(0x9E3779B9);
        // xorshift64 requires a nonzero seed.
        Self::from_seed(if seed == 0 { 1 } else { seed })
    }

    pub fn from_seed(seed: u64) -> Self {
        Self { state: seed }
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }

    /// Next value in `[0, 1)`.
    pub fn next_f64(&mut self) -> f64 {
        (self.next_u64() as f64) / (u64::MAX as f64)
    }

    /// Sample `count` values in `[0, 1)`.
    pub fn sample_vec(&mut self, count: usize) -> Vec<f64> {
        (0..count).map(|_| self.next_f64()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn canonicalization_sorts_map_keys() {
        let a = json!({"b": 1, "a": 2});
        let b = json!({"a": 2, "b": 1});
        assert_eq!(
            stable_hash_json_default(&a).unwrap(),
            stable_hash_json_default(&b).unwrap()
        );
    }

    #[test]
    fn canonicalization_rounds_floats() {
        let a = json!({"x": 1.0000001});
        let b = json!({"x": 1.0000002});
        assert_eq!(
            stable_hash_json(&a, 6).unwrap(),
            stable_hash_json(&b, 6).unwrap()
        );
    }

    #[test]
    fn canonicalization_preserves_sequence_order() {
        let a = json!([1, 2, 3]);
        let b = json!([3, 2, 1]);
        assert_ne!(
            stable_hash_json_default(&a).unwrap(),
            stable_hash_json_default(&b).unwrap()
        );
    }

    #[test]
    fn non_finite_float_is_rejected() {
        let a = json!({"x": f64::NAN});
        let err = stable_hash_json_default(&a).unwrap_err();
        assert!(err.is_determinism());
    }

    #[test]
    fn clock_freeze_returns_exact_value() {
        let clock = Clock::new();
        clock.freeze(123456789.0);
        assert_eq!(clock.now(), 123456789.0);
        assert_eq!(clock.now(), 123456789.0);
        clock.unfreeze();
        assert!(clock.now() != 123456789.0 || !clock.is_frozen());
    }

    #[test]
    fn chunk_rng_is_seed_stable() {
        let digest = stable_hash_json_default(&json!({
            "task_digest": "abc", "subtask_type": "lift", "ordinal": 3
        }))
        .unwrap();
        let mut rng1 = ChunkRng::from_digest(&digest);
        let mut rng2 = ChunkRng::from_digest(&digest);
        let seq1 = rng1.sample_vec(10);
        let seq2 = rng2.sample_vec(10);
        assert_eq!(seq1, seq2);
    }

    #[test]
    fn chunk_rng_is_order_independent() {
        // Same (task_digest, subtask_type, ordinal) always derives the
        // same seed regardless of when the chunk is generated.
        let digest_a = stable_hash_json_default(&json!({
            "task_digest": "xyz", "subtask_type": "walk_to", "ordinal": 0
        }))
        .unwrap();
        let digest_b = stable_hash_json_default(&json!({
            "task_digest": "xyz", "subtask_type": "walk_to", "ordinal": 1
        }))
        .unwrap();
        assert_ne!(digest_a, digest_b);
    }
}
