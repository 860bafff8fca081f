//! T2: Long-Horizon Planner.
//!
//! Expands each subtask into one or more fixed-length latent chunks.
//! Ground truth: `mcp_robot/planning/long_horizon_planner.py`. The
//! "latent vector" is not a learned embedding here — it is 64
//! RNG-sampled scalars seeded from a stable hash of
//! `(task_digest, subtask_type, ordinal)` (only the first five entries
//! are consumed downstream), which is what makes chunk generation both
//! reproducible and independent of generation order.

use crate::contracts::{Criticality, LatentChunk, Subtask, TIMESTEPS_PER_CHUNK};
use crate::determinism::{stable_hash_json, ChunkRng};
use crate::error::PipelineResult;

pub const HZ: f64 = 30.0;
pub const CHUNK_DURATION_S: f64 = TIMESTEPS_PER_CHUNK as f64 / HZ;

/// Per-subtask-type positional delta applied across the chunk's 50
/// waypoints, layered on top of the latent-derived base position.
fn subtask_delta(subtask_type: crate::contracts::SubtaskType) -> [f64; 3] {
    use crate::contracts::SubtaskType::*;
    match subtask_type {
        Lift => [0.0, 0.0, 0.2],
        WalkTo => [0.3, 0.0, 0.0],
        GraspApproach => [0.0, 0.0, -0.1],
        _ => [0.0, 0.0, 0.0],
    }
}

/// Expand a single subtask into its latent chunks. `task_digest` is
/// the stable hash of the whole task plan's input (instruction +
/// perception + config), shared by every subtask so chunk seeds are
/// scoped to this plan. `start_idx` is this subtask's offset into the
/// plan's single global chunk ordinal space, so the seed key never
/// needs to know about subtask boundaries.
pub fn plan_subtask(
    subtask: &Subtask,
    start_idx: usize,
    task_digest: &str,
    float_round: i32,
) -> PipelineResult<Vec<LatentChunk>> {
    let num_chunks = ((subtask.estimated_duration / CHUNK_DURATION_S).floor() as usize).max(1);
    let mut chunks = Vec::with_capacity(num_chunks);

    for i in 0..num_chunks {
        let ordinal = start_idx + i;
        #[derive(serde::Serialize)]
        struct SeedKey<'a> {
            task_digest: &'a str,
            subtask_type: &'a str,
            ordinal: usize,
        }
        let seed_digest = stable_hash_json(
            &SeedKey {
                task_digest,
                subtask_type: subtask.subtask_type.as_str(),
                ordinal,
            },
            float_round,
        )?;
        let mut rng = ChunkRng::from_digest(&seed_digest);
        let latent_vector = rng.sample_vec(64);

        let base = [latent_vector[0] * 0.5, latent_vector[1] * 0.5, latent_vector[2] * 0.5];
        let delta = subtask_delta(subtask.subtask_type);
        let target = [base[0] + delta[0], base[1] + delta[1], base[2] + delta[2]];

        let mut position_waypoints = Vec::with_capacity(TIMESTEPS_PER_CHUNK);
        for t in 0..TIMESTEPS_PER_CHUNK {
            let frac = t as f64 / (TIMESTEPS_PER_CHUNK - 1) as f64;
            position_waypoints.push([
                base[0] + (target[0] - base[0]) * frac,
                base[1] + (target[1] - base[1]) * frac,
                base[2] + (target[2] - base[2]) * frac,
            ]);
        }

        let force_profile = vec![latent_vector[3] * 20.0; TIMESTEPS_PER_CHUNK];
        let estimated_force = latent_vector[4] * 100.0;

        chunks.push(LatentChunk {
            ordinal,
            subtask_type: subtask.subtask_type,
            target_object: subtask.target_object.clone(),
            latent_vector,
            position_waypoints,
            force_profile,
            duration_s: CHUNK_DURATION_S,
            criticality: subtask.criticality,
            estimated_force,
        });
    }

    Ok(chunks)
}

/// Expand a full subtask list into a flat, globally-ordered chunk
/// list. Each subtask's chunks continue the ordinal sequence left off
/// by the previous one, so downstream stages see one linear sequence
/// and the per-chunk RNG seed is scoped to the plan, not the subtask.
pub fn plan_chunks(
    subtasks: &[Subtask],
    task_digest: &str,
    float_round: i32,
) -> PipelineResult<Vec<LatentChunk>> {
    let mut all_chunks = Vec::new();
    let mut next_ordinal = 0usize;
    for subtask in subtasks {
        let chunks = plan_subtask(subtask, next_ordinal, task_digest, float_round)?;
        next_ordinal += chunks.len();
        all_chunks.extend(chunks);
    }
    Ok(all_chunks)
}
