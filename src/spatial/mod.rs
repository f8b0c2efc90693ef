//! Occlusion table rebuilding.
//!
//! Each target instance gets its entry from the first of:
//!
//! 1. an entry whose instance carries the same engine-assigned cull key,
//! 2. the nearest entry whose instance sits within `match_tolerance`,
//! 3. a freshly synthesized entry: spatial hash of the instance's grid cell and
//!    visibility flags from its distance band and model complexity.
//!
//! Known entries come from the target's own (possibly stale) table paired
//! positionally with its instances, then from the source level's table.

pub mod hash;
pub mod transform;

use bon::Builder;
use glam::Vec3;
use tracing::{debug, info, warn};

use crate::level::{Instance, Level, OcclusionEntry, OcclusionTable};
use crate::level_types::Category;

use self::hash::{VIS_ALL_BANDS, spatial_hash, visibility_flags};

/// Heuristic rebuild constants.
#[derive(Debug, Clone, PartialEq, Builder)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RebuildConfig {
    /// Maximum distance for an approximate position match.
    #[builder(default = 1.0)]
    pub match_tolerance: f32,
    #[builder(default = 40.0)]
    pub moby_cell: f32,
    #[builder(default = 64.0)]
    pub tie_cell: f32,
    #[builder(default = 40.0)]
    pub shrub_cell: f32,
    #[builder(default = 64.0)]
    pub near_band: f32,
    #[builder(default = 256.0)]
    pub mid_band: f32,
    #[builder(default = 3072)]
    pub complex_vertex_threshold: usize,
}

impl Default for RebuildConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl RebuildConfig {
    pub fn cell_size(&self, category: Category) -> f32 {
        match category {
            Category::Moby => self.moby_cell,
            Category::Tie => self.tie_cell,
            Category::Shrub => self.shrub_cell,
        }
    }
}

/// How each rebuilt entry was obtained.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct RebuildStats {
    pub matched_by_key: usize,
    pub matched_by_position: usize,
    pub synthesized: usize,
}

impl RebuildStats {
    pub fn merge(&mut self, other: RebuildStats) {
        self.matched_by_key += other.matched_by_key;
        self.matched_by_position += other.matched_by_position;
        self.synthesized += other.synthesized;
    }
}

struct KnownEntry {
    cull_key: Option<u32>,
    position: Vec3,
    entry: OcclusionEntry,
}

fn known_entries(level: &Level, category: Category) -> impl Iterator<Item = KnownEntry> + '_ {
    level
        .instances(category)
        .iter()
        .zip(level.occlusion.list(category))
        .map(|(inst, entry)| KnownEntry {
            cull_key: inst.cull_key,
            position: inst.position(),
            entry: *entry,
        })
}

/// Fallback entry for a category with nothing to copy from.
pub fn default_entry(_category: Category) -> OcclusionEntry {
    OcclusionEntry {
        spatial_hash: 0,
        visibility: VIS_ALL_BANDS,
    }
}

/// Synthesize the entry for `inst` from its position alone.
pub fn synthesize_entry(
    level: &Level,
    category: Category,
    inst: &Instance,
    config: &RebuildConfig,
) -> OcclusionEntry {
    let vertex_count = level
        .model(category, inst.model_id)
        .map(|m| m.vertex_count())
        .unwrap_or(0);
    OcclusionEntry {
        spatial_hash: spatial_hash(inst.position(), config.cell_size(category)),
        visibility: visibility_flags(
            inst.position(),
            vertex_count,
            config.near_band,
            config.mid_band,
            config.complex_vertex_threshold,
        ),
    }
}

/// Rebuild one category's list, one entry per target instance.
pub fn rebuild_list(
    target: &Level,
    source: Option<&Level>,
    category: Category,
    config: &RebuildConfig,
) -> (Vec<OcclusionEntry>, RebuildStats) {
    let known: Vec<KnownEntry> = known_entries(target, category)
        .chain(source.into_iter().flat_map(|s| known_entries(s, category)))
        .collect();

    let mut stats = RebuildStats::default();
    let entries = target
        .instances(category)
        .iter()
        .map(|inst| {
            if let Some(key) = inst.cull_key {
                if let Some(hit) = known.iter().find(|k| k.cull_key == Some(key)) {
                    stats.matched_by_key += 1;
                    return hit.entry;
                }
            }

            let nearest = known
                .iter()
                .map(|k| (k.position.distance(inst.position()), k))
                .filter(|(d, _)| *d <= config.match_tolerance)
                .min_by(|a, b| a.0.total_cmp(&b.0));
            if let Some((_, hit)) = nearest {
                stats.matched_by_position += 1;
                return hit.entry;
            }

            stats.synthesized += 1;
            synthesize_entry(target, category, inst, config)
        })
        .collect();
    (entries, stats)
}

/// Rebuild every list so it matches `target`'s current collections.
pub fn rebuild(
    target: &Level,
    source: Option<&Level>,
    config: &RebuildConfig,
) -> (OcclusionTable, RebuildStats) {
    let mut table = OcclusionTable::default();
    let mut stats = RebuildStats::default();
    for category in Category::ALL {
        let (entries, list_stats) = rebuild_list(target, source, category, config);
        debug!(
            "{category} occlusion: {} by key, {} by position, {} synthesized",
            list_stats.matched_by_key, list_stats.matched_by_position, list_stats.synthesized
        );
        table.set_list(category, entries);
        stats.merge(list_stats);
    }
    (table, stats)
}

/// Rebuild `level`'s occlusion table in place.
pub fn rebuild_level(level: &mut Level, source: Option<&Level>, config: &RebuildConfig) -> RebuildStats {
    let (table, stats) = rebuild(level, source, config);
    level.occlusion = table;
    info!(
        "occlusion rebuilt: {} by key, {} by position, {} synthesized",
        stats.matched_by_key, stats.matched_by_position, stats.synthesized
    );
    stats
}

/// Force every list to its collection's length: excess entries are trimmed,
/// missing ones repeat the last entry or the category default.
///
/// Returns the number of lists that had to change.
pub fn reconcile_lengths(level: &mut Level) -> usize {
    let mut changed = 0;
    for category in Category::ALL {
        let want = level.instances(category).len();
        let list = level.occlusion.list_mut(category);
        if list.len() == want {
            continue;
        }
        warn!(
            "{category} occlusion list has {} entries for {want} instances, reconciling",
            list.len()
        );
        let fill = list.last().copied().unwrap_or_else(|| default_entry(category));
        list.resize(want, fill);
        changed += 1;
    }
    changed
}
