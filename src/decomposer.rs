//! T1: Task Decomposer.
//!
//! Rule-based, purely syntactic instruction decomposition. No NLP
//! model — a keyword table and a handful of fallbacks, exactly
//! mirroring `mcp_robot/planning/task_decomposer.py`. Deterministic by
//! construction: the same instruction and perception snapshot always
//! produce the same subtask list in the same order.

use crate::contracts::{Criticality, ForceRequirement, PerceptionSnapshot, Subtask, SubtaskType};

/// Literal fallback targets tried when no detected object's `type`
/// appears in the instruction text.
const FALLBACK_TARGETS: [&str; 3] = ["cube", "apple", "bin"];

fn duration_for(subtask_type: SubtaskType) -> f64 {
    match subtask_type {
        SubtaskType::WalkTo => 4.0,
        SubtaskType::GraspApproach => 2.0,
        SubtaskType::GraspClose => 0.5,
        SubtaskType::Lift => 1.0,
        SubtaskType::Release => 0.5,
        SubtaskType::ScanWorkspace => 1.0,
        SubtaskType::Idle => 0.0,
        SubtaskType::MoveTo => 1.0,
    }
}

fn criticality_for(subtask_type: SubtaskType) -> Criticality {
    match subtask_type {
        SubtaskType::GraspClose | SubtaskType::Lift | SubtaskType::Release => Criticality::High,
        SubtaskType::GraspApproach | SubtaskType::MoveTo | SubtaskType::WalkTo => {
            Criticality::Medium
        }
        _ => Criticality::Low,
    }
}

fn force_requirement_for(subtask_type: SubtaskType) -> ForceRequirement {
    match subtask_type {
        SubtaskType::GraspClose => ForceRequirement::Gentle,
        _ => ForceRequirement::Normal,
    }
}

/// Keyword -> subtask expansion table, checked in this order. Every
/// keyword that appears in the lowercased instruction contributes its
/// expansion; an instruction matching more than one keyword gets all
/// of their expansions concatenated, not just the first match's.
const KEYWORD_TABLE: &[(&str, &[SubtaskType])] = {
    use SubtaskType::*;
    &[
        ("pick", &[WalkTo, ScanWorkspace, GraspApproach, GraspClose, Lift]),
        ("place", &[WalkTo, Release]),
        ("move", &[GraspApproach, GraspClose, Lift, MoveTo, Release]),
    ]
};

fn sequence_for_keyword(instruction_lower: &str) -> Vec<SubtaskType> {
    let mut sequence = Vec::new();
    for (keyword, expansion) in KEYWORD_TABLE {
        if instruction_lower.contains(keyword) {
            sequence.extend_from_slice(expansion);
        }
    }
    sequence
}

/// Resolve the subtask's target object: first a detected object whose
/// `object_type` literally appears in the instruction, else a literal
/// fallback keyword match, else the generic `"object"`.
fn resolve_target(instruction_lower: &str, perception: &PerceptionSnapshot) -> String {
    for obj in &perception.detected_objects {
        if instruction_lower.contains(&obj.object_type.to_lowercase()) {
            return obj.object_type.clone();
        }
    }
    for candidate in FALLBACK_TARGETS {
        if instruction_lower.contains(candidate) {
            return candidate.to_string();
        }
    }
    "object".to_string()
}

/// Decompose a natural-language instruction into an ordered list of
/// subtasks. Falls back to a single `Idle` subtask when no keyword
/// matches (SPEC_FULL.md §4.4).
pub fn decompose(instruction: &str, perception: &PerceptionSnapshot) -> Vec<Subtask> {
    let instruction_lower = instruction.to_lowercase();
    let target_object = resolve_target(&instruction_lower, perception);

    let matched = sequence_for_keyword(&instruction_lower);
    let sequence: &[SubtaskType] = if matched.is_empty() { &[SubtaskType::Idle] } else { &matched };

    sequence
        .iter()
        .map(|&subtask_type| Subtask {
            subtask_type,
            target_object: target_object.clone(),
            estimated_duration: duration_for(subtask_type),
            criticality: criticality_for(subtask_type),
            force_requirements: force_requirement_for(subtask_type),
        })
        .collect()
}
