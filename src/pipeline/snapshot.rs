//! Deep copies of the collections a store may clear while saving.
//!
//! Occlusion entries are keyed by instance uid rather than list position so
//! they can be relinked after the collections have been reordered. Uids are
//! not unique after a merge, so each entry also keeps the position of the
//! instance it belonged to; among entries sharing a uid the nearest unclaimed
//! one wins.

use std::collections::HashMap;

use glam::Vec3;
use tracing::{info, warn};

use crate::level::{Level, OcclusionEntry, PathSpline};
use crate::level_types::Category;
use crate::spatial::{RebuildConfig, synthesize_entry};

#[derive(Debug, Clone, Copy, PartialEq)]
struct CapturedEntry {
    uid: i32,
    position: Vec3,
    entry: OcclusionEntry,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    paths: Vec<PathSpline>,
    occlusion: [Vec<CapturedEntry>; 3],
}

/// What [`Snapshot::restore`] had to put back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct RestoreOutcome {
    pub paths_restored: usize,
    pub occlusion_lists_restored: usize,
    /// Instances with no snapshot entry under their uid.
    pub unmatched: usize,
}

impl RestoreOutcome {
    pub fn is_empty(&self) -> bool {
        self.paths_restored == 0 && self.occlusion_lists_restored == 0
    }
}

impl Snapshot {
    pub fn capture(level: &Level) -> Self {
        let occlusion: [Vec<CapturedEntry>; 3] = Category::ALL.map(|category| {
            level
                .instances(category)
                .iter()
                .zip(level.occlusion.list(category))
                .map(|(inst, entry)| CapturedEntry {
                    uid: inst.uid,
                    position: inst.position(),
                    entry: *entry,
                })
                .collect()
        });
        Self {
            paths: level.paths.clone(),
            occlusion,
        }
    }

    fn path_damaged(&self, level: &Level, path: &PathSpline) -> bool {
        match level.paths.iter().find(|p| p.id == path.id) {
            None => true,
            Some(current) => current.points.len() < path.points.len(),
        }
    }

    fn occlusion_damaged(&self, level: &Level, category: Category) -> bool {
        !level.occlusion_aligned(category)
            || (level.occlusion.list(category).is_empty()
                && !self.occlusion[category.index()].is_empty())
    }

    /// Whether anything captured is missing or undersized in `level`.
    pub fn is_intact(&self, level: &Level) -> bool {
        self.paths.iter().all(|p| !self.path_damaged(level, p))
            && Category::ALL
                .into_iter()
                .all(|c| !self.occlusion_damaged(level, c))
    }

    /// Put back every path missing from `level` and rebuild every occlusion list
    /// that no longer matches its collection, matching entries by uid.
    pub fn restore(&self, level: &mut Level, config: &RebuildConfig) -> RestoreOutcome {
        let mut outcome = RestoreOutcome::default();

        for path in &self.paths {
            if !self.path_damaged(level, path) {
                continue;
            }
            match level.paths.iter_mut().find(|p| p.id == path.id) {
                Some(current) => *current = path.clone(),
                None => level.paths.push(path.clone()),
            }
            outcome.paths_restored += 1;
        }

        for category in Category::ALL {
            if !self.occlusion_damaged(level, category) {
                continue;
            }
            let captured = &self.occlusion[category.index()];
            let mut by_uid: HashMap<i32, Vec<usize>> = HashMap::new();
            for (i, c) in captured.iter().enumerate() {
                by_uid.entry(c.uid).or_default().push(i);
            }
            let mut claimed = vec![false; captured.len()];
            let mut unmatched = 0;
            let list = level
                .instances(category)
                .iter()
                .map(|inst| {
                    let nearest = by_uid
                        .get(&inst.uid)
                        .into_iter()
                        .flatten()
                        .copied()
                        .filter(|i| !claimed[*i])
                        .min_by(|a, b| {
                            let da = captured[*a].position.distance(inst.position());
                            let db = captured[*b].position.distance(inst.position());
                            da.total_cmp(&db)
                        });
                    match nearest {
                        Some(i) => {
                            claimed[i] = true;
                            captured[i].entry
                        }
                        None => {
                            unmatched += 1;
                            synthesize_entry(level, category, inst, config)
                        }
                    }
                })
                .collect();
            level.occlusion.set_list(category, list);
            outcome.occlusion_lists_restored += 1;
            outcome.unmatched += unmatched;
        }

        if outcome.unmatched > 0 {
            warn!(
                "restored occlusion with {} entries resynthesized, fidelity is degraded",
                outcome.unmatched
            );
        }
        if !outcome.is_empty() {
            info!(
                "restored {} paths and {} occlusion lists from snapshot",
                outcome.paths_restored, outcome.occlusion_lists_restored
            );
        }
        outcome
    }
}
