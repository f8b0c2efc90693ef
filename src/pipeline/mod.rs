//! Conversion pipeline.
//!
//! Every operation runs the same sequence against an exclusively borrowed
//! target level:
//!
//! 1. apply the operation (merge resources, convert instances),
//! 2. validate and repair the result once,
//! 3. rebuild the occlusion table against the final collections,
//! 4. snapshot the collections a store may clear and save,
//! 5. restore whatever the save cleared, relinked by stable id.
//!
//! A failed save leaves the level exactly as it was before saving.

pub mod operations;
pub mod snapshot;

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use bon::Builder;
use rootcause::prelude::*;
use thiserror::Error;
use tracing::{info, warn};

use crate::convert::ConversionReport;
use crate::data::LevelStore;
use crate::level::Level;
use crate::level_types::{Category, Generation};
use crate::merge::MergeConfig;
use crate::spatial::{RebuildConfig, RebuildStats, rebuild_level};
use crate::validate::validate_level;

use self::operations::MergeSummary;
use self::snapshot::{RestoreOutcome, Snapshot};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{operation} needs {what}")]
    MissingInput {
        operation: Operation,
        what: &'static str,
    },
    #[error("resource merge failed")]
    Merge,
    #[error("class header conversion failed")]
    Convert,
    #[error("saving the level failed")]
    Save,
}

/// A named pipeline operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Operation {
    /// Import every category of the source into the target.
    Convert,
    ImportInstances(Category),
    SwapSkybox,
    SwapVendor,
    /// Rebuild occlusion without a source level.
    FixCulling,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Convert => write!(f, "convert"),
            Operation::ImportInstances(category) => write!(f, "import-{category}s"),
            Operation::SwapSkybox => write!(f, "swap-skybox"),
            Operation::SwapVendor => write!(f, "swap-vendor"),
            Operation::FixCulling => write!(f, "fix-culling"),
        }
    }
}

impl FromStr for Operation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "convert" => Ok(Operation::Convert),
            "import-mobys" => Ok(Operation::ImportInstances(Category::Moby)),
            "import-ties" => Ok(Operation::ImportInstances(Category::Tie)),
            "import-shrubs" => Ok(Operation::ImportInstances(Category::Shrub)),
            "swap-skybox" => Ok(Operation::SwapSkybox),
            "swap-vendor" => Ok(Operation::SwapVendor),
            "fix-culling" => Ok(Operation::FixCulling),
            other => Err(format!("unknown operation '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Builder)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PipelineConfig {
    /// Generation of the level `convert` builds when no target is given.
    #[builder(default = Generation::V2)]
    pub target: Generation,
    #[builder(default)]
    pub merge: MergeConfig,
    #[builder(default)]
    pub rebuild: RebuildConfig,
    /// Renumber conflicting spatial groups instead of only reporting them.
    #[builder(default = true)]
    pub auto_fix_groups: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

#[cfg(feature = "json")]
impl PipelineConfig {
    /// Read a JSON configuration file. Missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> crate::error::IResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// End-of-operation counters.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct OperationSummary {
    pub operation: Operation,
    pub generation: Generation,
    pub instances: ConversionReport,
    pub merge: MergeSummary,
    pub group_conflicts: usize,
    pub group_remaps: usize,
    pub repairs: usize,
    pub unresolved_models: usize,
    pub issues: usize,
    pub occlusion: RebuildStats,
    pub restored: RestoreOutcome,
}

impl fmt::Display for OperationSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} -> {}", self.operation, self.generation)?;
        writeln!(
            f,
            "  instances: {} succeeded ({} templated, {} synthesized), {} skipped as placeholders ({} after errors)",
            self.instances.succeeded(),
            self.instances.templated,
            self.instances.synthesized,
            self.instances.placeholders,
            self.instances.errors
        )?;
        writeln!(
            f,
            "  models: {} added, {} reused, {} replaced, {} failed",
            self.merge.models_added,
            self.merge.models_reused,
            self.merge.models_replaced,
            self.merge.models_failed.len()
        )?;
        for remap in &self.merge.model_remaps {
            writeln!(f, "    {} model {} -> {}", remap.category, remap.from, remap.to)?;
        }
        writeln!(
            f,
            "  textures: {} added, {} deduplicated",
            self.merge.textures_added, self.merge.textures_deduplicated
        )?;
        writeln!(f, "  paths: {} added", self.merge.paths_added)?;
        for (from, to) in &self.merge.path_remaps {
            writeln!(f, "    path {from} -> {to}")?;
        }
        writeln!(
            f,
            "  groups: {} conflicts, {} remapped",
            self.group_conflicts, self.group_remaps
        )?;
        writeln!(
            f,
            "  repairs: {}, unresolved models: {}, issues: {}",
            self.repairs, self.unresolved_models, self.issues
        )?;
        writeln!(
            f,
            "  occlusion: {} by key, {} by position, {} synthesized",
            self.occlusion.matched_by_key, self.occlusion.matched_by_position, self.occlusion.synthesized
        )?;
        write!(
            f,
            "  restored: {} paths, {} occlusion lists",
            self.restored.paths_restored, self.restored.occlusion_lists_restored
        )
    }
}

/// Runs operations against levels and persists them through a [`LevelStore`].
pub struct Pipeline<S> {
    config: PipelineConfig,
    store: S,
}

impl<S: LevelStore> Pipeline<S> {
    pub fn new(config: PipelineConfig, store: S) -> Self {
        Self { config, store }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Run `operation` on `target` and save it into `out_dir`.
    ///
    /// Per-entity failures only show up in the summary. The run aborts when a
    /// required input is missing, the operation itself fails, or the save
    /// fails. An aborted operation leaves `target` untouched; a failed save
    /// leaves it as it was right before saving.
    pub fn run(
        &self,
        target: &mut Level,
        source: Option<&Level>,
        operation: Operation,
        out_dir: &Path,
    ) -> Result<OperationSummary, Report<PipelineError>> {
        let mut staged = target.clone();
        let step = operations::apply(operation, &mut staged, source, &self.config.merge)?;
        *target = staged;

        let validation = validate_level(target, self.config.auto_fix_groups);
        let rebuild_source = match operation {
            Operation::FixCulling => None,
            _ => source,
        };
        let occlusion = rebuild_level(target, rebuild_source, &self.config.rebuild);

        let snapshot = Snapshot::capture(target);
        let pre_save = target.clone();
        if let Err(err) = self.store.save(target, out_dir) {
            *target = pre_save;
            return Err(err.context(PipelineError::Save));
        }

        let restored = if snapshot.is_intact(target) {
            RestoreOutcome::default()
        } else {
            warn!("save cleared protected collections, restoring from snapshot");
            let restored = snapshot.restore(target, &self.config.rebuild);
            if !snapshot.is_intact(target) {
                warn!("snapshot restore left the level incomplete, continuing with degraded data");
            }
            restored
        };

        let summary = OperationSummary {
            operation,
            generation: target.generation,
            instances: step.instances,
            merge: step.merge,
            group_conflicts: validation.group_conflicts,
            group_remaps: validation.group_remaps.len(),
            repairs: validation.repairs(),
            unresolved_models: validation.unresolved_models,
            issues: validation.issues.len(),
            occlusion,
            restored,
        };
        info!(
            "{operation} finished: {} instances succeeded, {} placeholders, {} repairs",
            summary.instances.succeeded(),
            summary.instances.placeholders,
            summary.repairs
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::path::Path;

    use glam::{Vec3, Vec4};

    use super::*;
    use crate::data::{BlobStore, LevelStoreWithCallback, StoreError};
    use crate::level::{
        ClassHeader, ClassHeaderEntry, ClassHeaderV1, Instance, Model, OcclusionEntry, ParamBlock,
        PathKind, PathSpline, Texture, TextureConfig, Transform,
    };

    fn noop_store() -> LevelStoreWithCallback<
        impl Fn(&Path) -> Result<Level, Report<StoreError>>,
        impl Fn(&mut Level, &Path) -> Result<(), Report<StoreError>>,
    > {
        LevelStoreWithCallback::new(
            |_path: &Path| Ok(Level::new(Generation::V2)),
            |_level: &mut Level, _dir: &Path| Ok(()),
        )
    }

    fn v1_single_instance() -> Level {
        let mut source = Level::new(Generation::V1);
        source.models_mut(Category::Moby).push(Model::new(1000, Generation::V1));
        source.class_headers.push(ClassHeaderEntry {
            model_id: 1000,
            header: ClassHeader::V1(ClassHeaderV1 {
                slots: [3; 8],
                param_size: 0x10,
                mode_flags: 1,
            }),
        });
        source.param_blocks.push(ParamBlock::new((1..=0x10).collect()));
        source.instances_mut(Category::Moby).push(Instance {
            uid: 500,
            model_id: 1000,
            param_index: Some(0),
            transform: Transform {
                position: Vec3::new(10.0, 20.0, 30.0),
                rotation: Vec3::new(0.1, 0.2, 0.3),
                scale: Vec3::splat(2.0),
            },
            ..Instance::default()
        });
        source
    }

    #[test]
    fn v1_to_v2_single_instance_import() {
        let source = v1_single_instance();
        let mut target = Level::new(Generation::V2);
        target.param_blocks.push(ParamBlock::new(vec![0xEE; 0x80]));
        target.param_blocks.push(ParamBlock::new(vec![0xDD; 0x80]));
        let previous_len = target.param_blocks.len() as u32;

        let pipeline = Pipeline::new(PipelineConfig::default(), noop_store());
        let summary = pipeline
            .run(
                &mut target,
                Some(&source),
                Operation::ImportInstances(Category::Moby),
                Path::new("unused"),
            )
            .unwrap();

        assert_eq!(summary.merge.models_added, 1);
        assert!(target.model(Category::Moby, 1000).is_some());
        let Some(ClassHeader::V2(header)) = target.class_header(1000) else {
            panic!("model 1000 should carry a wide class header");
        };
        assert_eq!(header.slots[8], 0);
        let bytes = crate::codec::class_header::encode_class_header(
            &ClassHeader::V2(*header),
            Generation::V2,
        )
        .unwrap();
        assert_eq!(bytes.len(), 0x30);

        let moby = &target.instances(Category::Moby)[0];
        assert_eq!(moby.uid, 500);
        assert_eq!(moby.transform.position, Vec3::new(10.0, 20.0, 30.0));
        assert_eq!(moby.transform.scale, Vec3::splat(2.0));
        assert_eq!(moby.param_index, Some(previous_len));
        let block = &target.param_blocks[previous_len as usize];
        assert_eq!(block.len(), 0x80);
        assert_eq!(&block.data[..0x10], &source.param_blocks[0].data[..]);
        assert!(block.data[0x10..].iter().all(|b| *b == 0));
        assert_eq!(target.occlusion.list(Category::Moby).len(), 1);
    }

    #[test]
    fn identical_textures_from_two_sources_are_stored_once() {
        let shared = Texture::new(64, 64, vec![0x42; 64 * 64]);
        let source_with = |model_id: i32| {
            let mut source = Level::new(Generation::V2);
            source.textures.push(shared.clone());
            let mut model = Model::new(model_id, Generation::V2);
            model.bounds = Vec4::new(0.0, 0.0, 0.0, 1.0);
            model.texture_configs = vec![TextureConfig {
                texture_id: 0,
                shader: 0,
                uv_flags: 0,
            }];
            source.models_mut(Category::Tie).push(model);
            source.instances_mut(Category::Tie).push(Instance {
                uid: model_id,
                model_id,
                ..Instance::default()
            });
            source
        };
        let first = source_with(1);
        let second = source_with(2);

        let mut target = Level::new(Generation::V2);
        target.textures.push(Texture::new(2, 2, vec![0; 4]));
        let before = target.textures.len();

        let pipeline = Pipeline::new(PipelineConfig::default(), noop_store());
        let op = Operation::ImportInstances(Category::Tie);
        pipeline.run(&mut target, Some(&first), op, Path::new("out")).unwrap();
        let summary = pipeline.run(&mut target, Some(&second), op, Path::new("out")).unwrap();

        assert_eq!(target.textures.len(), before + 1);
        assert_eq!(summary.merge.textures_deduplicated, 1);
        let ids: Vec<i32> = target
            .models(Category::Tie)
            .iter()
            .map(|m| m.texture_configs[0].texture_id)
            .collect();
        assert_eq!(ids, vec![1, 1]);
    }

    #[test]
    fn collections_cleared_by_save_are_restored() {
        let mut source = v1_single_instance();
        source.paths.push(PathSpline {
            id: 0,
            kind: PathKind::Path,
            points: vec![Vec4::ONE; 5],
        });
        let saves = Cell::new(0);
        let store = LevelStoreWithCallback::new(
            |_path: &Path| Ok(Level::new(Generation::V2)),
            |level: &mut Level, _dir: &Path| {
                saves.set(saves.get() + 1);
                level.paths.clear();
                for category in Category::ALL {
                    level.occlusion.list_mut(category).clear();
                }
                Ok(())
            },
        );

        let mut target = Level::new(Generation::V2);
        let pipeline = Pipeline::new(PipelineConfig::default(), store);
        let summary = pipeline
            .run(&mut target, Some(&source), Operation::Convert, Path::new("out"))
            .unwrap();

        assert_eq!(saves.get(), 1);
        assert_eq!(summary.restored.paths_restored, 1);
        assert_eq!(summary.restored.occlusion_lists_restored, 1);
        assert_eq!(target.paths.len(), 1);
        assert_eq!(target.paths[0].points.len(), 5);
        for category in Category::ALL {
            assert!(target.occlusion_aligned(category));
        }
    }

    #[test]
    fn failed_save_leaves_level_as_before_saving() {
        let source = v1_single_instance();
        let store = LevelStoreWithCallback::new(
            |_path: &Path| Ok(Level::new(Generation::V2)),
            |level: &mut Level, _dir: &Path| {
                level.paths.clear();
                level.param_blocks.clear();
                Err(Report::new(StoreError::Rejected("disk full".to_string())))
            },
        );

        // Same run against a store that succeeds, to know the pre-save state.
        let mut expected = Level::new(Generation::V2);
        Pipeline::new(PipelineConfig::default(), noop_store())
            .run(&mut expected, Some(&source), Operation::Convert, Path::new("out"))
            .unwrap();

        let mut target = Level::new(Generation::V2);
        let pipeline = Pipeline::new(PipelineConfig::default(), store);
        let result = pipeline.run(&mut target, Some(&source), Operation::Convert, Path::new("out"));
        assert!(result.is_err());
        assert_eq!(target, expected);
    }

    #[test]
    fn missing_source_aborts_before_touching_the_level() {
        let mut target = Level::new(Generation::V3);
        let before = target.clone();
        let pipeline = Pipeline::new(PipelineConfig::default(), noop_store());
        assert!(
            pipeline
                .run(&mut target, None, Operation::SwapSkybox, Path::new("out"))
                .is_err()
        );
        assert_eq!(target, before);
    }

    #[test]
    fn operation_failing_midway_leaves_the_level_untouched() {
        let mut source = Level::new(Generation::V2);
        source.models_mut(Category::Moby).push(Model::new(3, Generation::V2));
        source.instances_mut(Category::Moby).push(Instance {
            uid: 1,
            model_id: 3,
            ..Instance::default()
        });
        // A shrub with no shrub model table to import from.
        source.instances_mut(Category::Shrub).push(Instance {
            uid: 2,
            model_id: 9,
            ..Instance::default()
        });

        let mut target = Level::new(Generation::V2);
        target.textures.push(Texture::new(2, 2, vec![1; 4]));
        let before = target.clone();
        let pipeline = Pipeline::new(PipelineConfig::default(), noop_store());
        let result = pipeline.run(&mut target, Some(&source), Operation::Convert, Path::new("out"));
        assert!(result.is_err());
        assert_eq!(target, before);
    }

    #[test]
    fn duplicate_uids_keep_their_own_culling_after_a_clearing_save() {
        let tie_at = |x: f32| Instance {
            uid: 1,
            model_id: 1,
            transform: Transform {
                position: Vec3::new(x, 0.0, 0.0),
                ..Transform::default()
            },
            ..Instance::default()
        };
        let mut target = Level::new(Generation::V2);
        target.models_mut(Category::Tie).push(Model::new(1, Generation::V2));
        target.instances_mut(Category::Tie).push(tie_at(0.0));
        target.occlusion.list_mut(Category::Tie).push(OcclusionEntry {
            spatial_hash: 0,
            visibility: 1,
        });
        let mut source = Level::new(Generation::V2);
        source.models_mut(Category::Tie).push(Model::new(1, Generation::V2));
        source.instances_mut(Category::Tie).push(tie_at(5000.0));

        let saved = RefCell::new(Vec::new());
        let store = LevelStoreWithCallback::new(
            |_path: &Path| Ok(Level::new(Generation::V2)),
            |level: &mut Level, _dir: &Path| {
                *saved.borrow_mut() = level.occlusion.list(Category::Tie).to_vec();
                level.occlusion.list_mut(Category::Tie).clear();
                Ok(())
            },
        );
        let pipeline = Pipeline::new(PipelineConfig::default(), store);
        let summary = pipeline
            .run(
                &mut target,
                Some(&source),
                Operation::ImportInstances(Category::Tie),
                Path::new("out"),
            )
            .unwrap();

        let saved = saved.borrow().clone();
        assert_eq!(saved.len(), 2);
        assert_ne!(saved[0], saved[1]);
        assert_eq!(summary.restored.occlusion_lists_restored, 1);
        assert_eq!(target.occlusion.list(Category::Tie), &saved[..]);
    }

    #[test]
    fn fix_culling_rebuilds_stale_lists() {
        let mut level = Level::new(Generation::V2);
        level.models_mut(Category::Tie).push(Model::new(1, Generation::V2));
        for uid in 0..4 {
            level.instances_mut(Category::Tie).push(Instance {
                uid,
                model_id: 1,
                ..Instance::default()
            });
        }
        let pipeline = Pipeline::new(PipelineConfig::default(), noop_store());
        let summary = pipeline
            .run(&mut level, None, Operation::FixCulling, Path::new("out"))
            .unwrap();
        assert_eq!(level.occlusion.list(Category::Tie).len(), 4);
        assert_eq!(summary.occlusion.synthesized, 4);
    }

    #[test]
    fn blob_store_run_writes_a_loadable_level() {
        let dir = tempfile::tempdir().unwrap();
        let source = v1_single_instance();
        let mut target = Level::new(Generation::V2);
        let pipeline = Pipeline::new(PipelineConfig::default(), BlobStore::new());
        pipeline
            .run(&mut target, Some(&source), Operation::Convert, dir.path())
            .unwrap();

        let loaded = pipeline.store().load(dir.path()).unwrap();
        assert_eq!(loaded, target);
    }

    #[cfg(feature = "json")]
    #[test]
    fn config_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{ "target": "v3", "merge": { "special_models": { "vendor": 11 } }, "rebuild": { "tie_cell": 32.0 } }"#,
        )
        .unwrap();
        let config = PipelineConfig::from_json_file(&path).unwrap();
        assert_eq!(config.target, Generation::V3);
        assert_eq!(config.merge.special_models.vendor, Some(11));
        assert_eq!(config.rebuild.tie_cell, 32.0);
        assert_eq!(config.rebuild.match_tolerance, 1.0);
        assert!(config.auto_fix_groups);

        assert!(PipelineConfig::from_json_file(&dir.path().join("missing.json")).is_err());
    }

    #[test]
    fn operation_names_round_trip() {
        for op in [
            Operation::Convert,
            Operation::ImportInstances(Category::Moby),
            Operation::ImportInstances(Category::Tie),
            Operation::ImportInstances(Category::Shrub),
            Operation::SwapSkybox,
            Operation::SwapVendor,
            Operation::FixCulling,
        ] {
            assert_eq!(op.to_string().parse::<Operation>(), Ok(op));
        }
        assert!("import-lights".parse::<Operation>().is_err());
    }
}
