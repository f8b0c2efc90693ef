//! Referential integrity checks and deterministic repairs.
//!
//! Every pass is idempotent: running it again on its own output repairs
//! nothing. Repairs only reset a reference to a safe value; no pass invents
//! data.

use std::collections::BTreeMap;

use itertools::Itertools;
use tracing::{info, warn};

use crate::level::Level;
use crate::level_types::Category;

/// Largest group id the instance layouts can store; the sign bit is the
/// "no group" sentinel.
pub const MAX_GROUP_ID: u32 = i32::MAX as u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Severity {
    Error,
    Warning,
    Info,
}

/// A single finding, repaired or not.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ValidationIssue {
    pub severity: Severity,
    pub code: &'static str,
    pub message: String,
}

impl ValidationIssue {
    fn error(code: &'static str, message: String) -> Self {
        warn!("{message}");
        Self {
            severity: Severity::Error,
            code,
            message,
        }
    }

    fn warning(code: &'static str, message: String) -> Self {
        warn!("{message}");
        Self {
            severity: Severity::Warning,
            code,
            message,
        }
    }

    fn info(code: &'static str, message: String) -> Self {
        info!("{message}");
        Self {
            severity: Severity::Info,
            code,
            message,
        }
    }
}

/// Before/after of one group reassignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct GroupRemap {
    pub category: Category,
    pub model_id: i32,
    pub from: u32,
    pub to: u32,
}

/// A spatial group mixing several models. `model_ids` is in first-seen order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupConflict {
    pub category: Category,
    pub group_id: u32,
    pub model_ids: Vec<i32>,
}

#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ValidationReport {
    pub issues: Vec<ValidationIssue>,
    pub param_indices_cleared: usize,
    pub param_blocks_padded: usize,
    pub group_conflicts: usize,
    pub group_remaps: Vec<GroupRemap>,
    pub texture_ids_clamped: usize,
    pub class_indices_relinked: usize,
    pub unresolved_models: usize,
}

impl ValidationReport {
    /// Number of references that were changed.
    pub fn repairs(&self) -> usize {
        self.param_indices_cleared
            + self.param_blocks_padded
            + self.group_remaps.len()
            + self.texture_ids_clamped
            + self.class_indices_relinked
    }

    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Clear every ParamBlock index outside the table to `None`.
pub fn validate_param_indices(level: &mut Level, report: &mut ValidationReport) {
    let len = level.param_blocks.len();
    for category in Category::ALL {
        for inst in level.instances_mut(category) {
            let Some(index) = inst.param_index else {
                continue;
            };
            if (index as usize) < len {
                continue;
            }
            inst.param_index = None;
            report.param_indices_cleared += 1;
            report.issues.push(ValidationIssue::warning(
                "param-index-cleared",
                format!(
                    "{category} instance {} pointed at ParamBlock {index} of {len}, cleared",
                    inst.uid
                ),
            ));
        }
    }
}

/// Zero pad every referenced ParamBlock shorter than the level's minimum.
pub fn pad_param_blocks(level: &mut Level, report: &mut ValidationReport) {
    let min = level.generation.min_param_block_len();
    let referenced: Vec<u32> = level
        .all_instances()
        .filter_map(|(_, inst)| inst.param_index)
        .unique()
        .collect();
    for index in referenced {
        let Some(block) = level.param_blocks.get_mut(index as usize) else {
            continue;
        };
        if block.len() >= min {
            continue;
        }
        let before = block.len();
        block.data.resize(min, 0);
        report.param_blocks_padded += 1;
        report.issues.push(ValidationIssue::warning(
            "param-block-padded",
            format!("ParamBlock {index} padded from 0x{before:X} to 0x{min:X} bytes"),
        ));
    }
}

/// Groups that mix more than one model id, per category, in ascending group id.
pub fn find_group_conflicts(level: &Level) -> Vec<GroupConflict> {
    let mut conflicts = Vec::new();
    for category in Category::ALL {
        let mut groups: BTreeMap<u32, Vec<i32>> = BTreeMap::new();
        for inst in level.instances(category) {
            if let Some(group) = inst.group_id {
                groups.entry(group).or_default().push(inst.model_id);
            }
        }
        for (group_id, models) in groups {
            let model_ids: Vec<i32> = models.into_iter().unique().collect();
            if model_ids.len() > 1 {
                conflicts.push(GroupConflict {
                    category,
                    group_id,
                    model_ids,
                });
            }
        }
    }
    conflicts
}

/// Report spatial group conflicts and, when `fix` is set, move every model
/// but the first in a conflicting group to a fresh group id.
///
/// Fresh ids count up from one past the largest group id in the level and
/// never exceed [`MAX_GROUP_ID`]. Models that find no id left stay where they
/// are and are reported as errors.
pub fn resolve_group_conflicts(level: &mut Level, fix: bool, report: &mut ValidationReport) {
    let conflicts = find_group_conflicts(level);
    report.group_conflicts += conflicts.len();
    if conflicts.is_empty() {
        return;
    }

    let mut next = level
        .all_instances()
        .filter_map(|(_, inst)| inst.group_id)
        .max()
        .map_or(Some(0), |max| max.checked_add(1))
        .filter(|id| *id <= MAX_GROUP_ID);

    for conflict in conflicts {
        let message = format!(
            "{} group {} mixes models {:?}",
            conflict.category, conflict.group_id, conflict.model_ids
        );
        if !fix {
            report
                .issues
                .push(ValidationIssue::warning("group-conflict", message));
            continue;
        }
        report
            .issues
            .push(ValidationIssue::info("group-conflict-fixed", message));
        for model_id in conflict.model_ids.iter().skip(1) {
            let Some(to) = next else {
                report.issues.push(ValidationIssue::error(
                    "group-id-exhausted",
                    format!(
                        "{} model {model_id} left in group {}: no group id below {MAX_GROUP_ID} is free",
                        conflict.category, conflict.group_id
                    ),
                ));
                continue;
            };
            next = to.checked_add(1).filter(|id| *id <= MAX_GROUP_ID);
            let remap = GroupRemap {
                category: conflict.category,
                model_id: *model_id,
                from: conflict.group_id,
                to,
            };
            level
                .instances_mut(conflict.category)
                .iter_mut()
                .filter(|inst| inst.group_id == Some(remap.from) && inst.model_id == *model_id)
                .for_each(|inst| inst.group_id = Some(remap.to));
            info!(
                "{} model {} moved from group {} to {}",
                remap.category, remap.model_id, remap.from, remap.to
            );
            report.group_remaps.push(remap);
        }
    }
}

/// Clamp texture-config ids into the texture table. `-1` means no texture and
/// is left alone; with an empty table every id becomes `-1`.
pub fn clamp_texture_ids(level: &mut Level, report: &mut ValidationReport) {
    let len = level.textures.len() as i32;
    let mut issues = Vec::new();
    for model in level.all_models_mut() {
        for config in &mut model.texture_configs {
            let id = config.texture_id;
            let clamped = if len == 0 {
                -1
            } else if id == -1 {
                continue;
            } else {
                id.clamp(0, len - 1)
            };
            if clamped == id {
                continue;
            }
            config.texture_id = clamped;
            issues.push(ValidationIssue::warning(
                "texture-id-clamped",
                format!("model {} texture id {id} clamped to {clamped}", model.id),
            ));
        }
    }
    report.texture_ids_clamped += issues.len();
    report.issues.extend(issues);
}

/// Point every moby's class index at the header row of its own model, or
/// clear it when that model has no row.
pub fn relink_class_indices(level: &mut Level, report: &mut ValidationReport) {
    let rows: Vec<i32> = level.class_headers.iter().map(|e| e.model_id).collect();
    for inst in level.instances_mut(Category::Moby) {
        let current = inst.class_index.and_then(|i| rows.get(i as usize)).copied();
        if current == Some(inst.model_id) {
            continue;
        }
        let expected = rows
            .iter()
            .position(|id| *id == inst.model_id)
            .map(|i| i as u32);
        if expected == inst.class_index {
            continue;
        }
        report.issues.push(ValidationIssue::warning(
            "class-index-relinked",
            format!(
                "moby instance {} class index {:?} relinked to {:?}",
                inst.uid, inst.class_index, expected
            ),
        ));
        inst.class_index = expected;
        report.class_indices_relinked += 1;
    }
}

/// Mark instances whose model does not resolve for review.
pub fn check_model_references(level: &mut Level, report: &mut ValidationReport) {
    for category in Category::ALL {
        let missing: Vec<usize> = level
            .instances(category)
            .iter()
            .positions(|inst| level.model(category, inst.model_id).is_none())
            .collect();
        for i in missing {
            let inst = &mut level.instances_mut(category)[i];
            inst.needs_review = true;
            report.unresolved_models += 1;
            report.issues.push(ValidationIssue::warning(
                "model-unresolved",
                format!(
                    "{category} instance {} references missing model {}",
                    inst.uid, inst.model_id
                ),
            ));
        }
    }
}

/// Run every pass once.
pub fn validate_level(level: &mut Level, auto_fix_groups: bool) -> ValidationReport {
    let mut report = ValidationReport::default();
    validate_param_indices(level, &mut report);
    pad_param_blocks(level, &mut report);
    resolve_group_conflicts(level, auto_fix_groups, &mut report);
    clamp_texture_ids(level, &mut report);
    relink_class_indices(level, &mut report);
    check_model_references(level, &mut report);
    info!(
        "validation: {} issues, {} repairs, {} group conflicts",
        report.issues.len(),
        report.repairs(),
        report.group_conflicts
    );
    report
}
