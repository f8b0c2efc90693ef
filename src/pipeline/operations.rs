//! The named operations. Each one only mutates the target level; validation,
//! the occlusion rebuild and saving are left to [`super::Pipeline::run`].

use rootcause::prelude::*;
use tracing::info;

use super::{Operation, PipelineError};
use crate::convert::model_import::{adapt_class_header, adapt_model};
use crate::convert::{ConversionReport, InstanceConverter};
use crate::level::{ClassHeaderEntry, Level};
use crate::level_types::Category;
use crate::merge::textures::remap_model_textures;
use crate::merge::{
    IdMap, MergeConfig, MergeError, ModelImport, TextureImport, import_models, import_paths,
    import_textures,
};

/// A model that had to take a different id in the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ModelRemap {
    pub category: Category,
    pub from: i32,
    pub to: i32,
}

/// Resource counters gathered across every merge an operation performed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct MergeSummary {
    pub models_added: usize,
    pub models_reused: usize,
    pub models_replaced: usize,
    pub models_failed: Vec<(Category, i32)>,
    pub model_remaps: Vec<ModelRemap>,
    pub textures_added: usize,
    pub textures_deduplicated: usize,
    pub paths_added: usize,
    /// Path ids that collided, before and after.
    pub path_remaps: Vec<(i32, i32)>,
}

impl MergeSummary {
    fn record_models(&mut self, category: Category, import: &ModelImport) {
        self.models_added += import.added;
        self.models_reused += import.reused;
        self.models_failed
            .extend(import.failed.iter().map(|id| (category, *id)));
        self.model_remaps
            .extend(import.map.remapped().map(|(from, to)| ModelRemap { category, from, to }));
        self.record_textures(&import.textures);
    }

    fn record_textures(&mut self, import: &TextureImport) {
        self.textures_added += import.added;
        self.textures_deduplicated += import.deduplicated;
    }

    fn record_paths(&mut self, map: &IdMap) {
        self.paths_added += map.len();
        self.path_remaps.extend(map.remapped());
    }
}

/// What one operation did to the target before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepOutcome {
    pub instances: ConversionReport,
    pub merge: MergeSummary,
}

impl StepOutcome {
    fn absorb(&mut self, other: StepOutcome) {
        self.instances.merge(other.instances);
        let merge = other.merge;
        self.merge.models_added += merge.models_added;
        self.merge.models_reused += merge.models_reused;
        self.merge.models_replaced += merge.models_replaced;
        self.merge.models_failed.extend(merge.models_failed);
        self.merge.model_remaps.extend(merge.model_remaps);
        self.merge.textures_added += merge.textures_added;
        self.merge.textures_deduplicated += merge.textures_deduplicated;
        self.merge.paths_added += merge.paths_added;
        self.merge.path_remaps.extend(merge.path_remaps);
    }
}

fn require_source(operation: Operation, source: Option<&Level>) -> Result<&Level, Report<PipelineError>> {
    source.ok_or_else(|| {
        Report::new(PipelineError::MissingInput {
            operation,
            what: "a source level",
        })
    })
}

/// Dispatch `operation` against `target`.
pub fn apply(
    operation: Operation,
    target: &mut Level,
    source: Option<&Level>,
    config: &MergeConfig,
) -> Result<StepOutcome, Report<PipelineError>> {
    match operation {
        Operation::Convert => convert_level(target, require_source(operation, source)?, config),
        Operation::ImportInstances(category) => {
            import_instances(target, require_source(operation, source)?, category, config)
        }
        Operation::SwapSkybox => swap_skybox(target, require_source(operation, source)?, config),
        Operation::SwapVendor => swap_vendor(target, require_source(operation, source)?, config),
        Operation::FixCulling => Ok(StepOutcome::default()),
    }
}

/// Bring every `category` instance of `source` over, importing the models they
/// reference first.
pub fn import_instances(
    target: &mut Level,
    source: &Level,
    category: Category,
    config: &MergeConfig,
) -> Result<StepOutcome, Report<PipelineError>> {
    let ids = source.instances(category).iter().map(|i| i.model_id);
    let import = import_models(target, source, category, ids, config).context(PipelineError::Merge)?;

    let converter = InstanceConverter::new(target, source, category, &import.map);
    let instances = converter.convert_all(target, source.instances(category));
    info!(
        "{category} instances: {} templated, {} synthesized, {} placeholders",
        instances.templated, instances.synthesized, instances.placeholders
    );

    let mut outcome = StepOutcome {
        instances,
        ..StepOutcome::default()
    };
    outcome.merge.record_models(category, &import);
    Ok(outcome)
}

/// Import every category, the paths and, when the target has none, the skybox.
pub fn convert_level(
    target: &mut Level,
    source: &Level,
    config: &MergeConfig,
) -> Result<StepOutcome, Report<PipelineError>> {
    let mut outcome = StepOutcome::default();
    for category in Category::ALL {
        outcome.absorb(import_instances(target, source, category, config)?);
    }

    let paths = import_paths(target, &source.paths);
    outcome.merge.record_paths(&paths);

    if target.skybox.is_none() && source.skybox.is_some() {
        outcome.absorb(swap_skybox(target, source, config)?);
    }
    Ok(outcome)
}

/// Replace the target's skybox with the source's, adapted to the target
/// generation. The configured skybox id, if any, is stamped on the new model.
pub fn swap_skybox(
    target: &mut Level,
    source: &Level,
    config: &MergeConfig,
) -> Result<StepOutcome, Report<PipelineError>> {
    let Some(skybox) = &source.skybox else {
        return Err(Report::new(PipelineError::MissingInput {
            operation: Operation::SwapSkybox,
            what: "a skybox in the source level",
        }));
    };

    let mut model = adapt_model(skybox, target.generation);
    if let Some(id) = config.special_models.skybox {
        model.id = id;
    }
    let used: Vec<i32> = model.texture_ids().collect();
    let textures = import_textures(target, source, used);
    remap_model_textures(&mut model, &textures.map);

    let mut outcome = StepOutcome::default();
    outcome.merge.record_textures(&textures);
    if target.skybox.replace(model).is_some() {
        outcome.merge.models_replaced += 1;
    } else {
        outcome.merge.models_added += 1;
    }
    info!("skybox swapped, {} textures added", textures.added);
    Ok(outcome)
}

/// Replace the target's vendor model with the source's.
///
/// The model keeps its id and its position in the target table, so existing
/// vendor instances keep resolving. When the target has no vendor instance
/// the source's are converted over.
pub fn swap_vendor(
    target: &mut Level,
    source: &Level,
    config: &MergeConfig,
) -> Result<StepOutcome, Report<PipelineError>> {
    let Some(id) = config.special_models.vendor else {
        return Err(Report::new(PipelineError::MissingInput {
            operation: Operation::SwapVendor,
            what: "a vendor model id",
        }));
    };
    let category = Category::Moby;
    let Some(vendor) = source.model(category, id) else {
        return Err(Report::new(MergeError::ModelNotFound { category, id }).context(PipelineError::Merge));
    };

    let mut outcome = StepOutcome::default();
    let slot = target.models(category).iter().position(|m| m.id == id);
    let map = match slot {
        Some(slot) => {
            let header = match source.class_header(id) {
                Some(header) => Some(
                    adapt_class_header(id, header, target.generation)
                        .context(PipelineError::Convert)?,
                ),
                None => None,
            };
            let mut model = adapt_model(vendor, target.generation);
            let used: Vec<i32> = model.texture_ids().collect();
            let textures = import_textures(target, source, used);
            remap_model_textures(&mut model, &textures.map);
            outcome.merge.record_textures(&textures);

            target.models_mut(category)[slot] = model;
            if let Some(header) = header {
                match target.class_headers.iter_mut().find(|e| e.model_id == id) {
                    Some(entry) => entry.header = header,
                    None => target.class_headers.push(ClassHeaderEntry { model_id: id, header }),
                }
            }
            outcome.merge.models_replaced += 1;
            let mut map = IdMap::new();
            map.insert(id, id);
            map
        }
        None => {
            let import =
                import_models(target, source, category, [id], config).context(PipelineError::Merge)?;
            outcome.merge.record_models(category, &import);
            import.map
        }
    };

    let Some(target_id) = map.get(id) else {
        return Err(Report::new(MergeError::ModelNotFound { category, id }).context(PipelineError::Merge));
    };
    if !target.instances(category).iter().any(|i| i.model_id == target_id) {
        let converter = InstanceConverter::new(target, source, category, &map);
        let vendors = source.instances(category).iter().filter(|i| i.model_id == id);
        outcome.instances = converter.convert_all(target, vendors);
    }
    info!("vendor model {id} swapped in as {target_id}");
    Ok(outcome)
}
