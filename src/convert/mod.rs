//! Instance conversion between generations.
//!
//! Each source instance takes exactly one of three paths:
//!
//! - **Templated**: the target already has a native instance of the same
//!   model. It is cloned, keeping its target-only fields, and the source's
//!   identity and placement are laid over it.
//! - **Synthesized**: the model resolves but no template exists. The instance
//!   is built from defaults plus the source's placement.
//! - **Placeholder**: the model does not resolve, or any step failed. Only
//!   identity and placement are kept and the instance is marked for review.
//!
//! Failures never leave the batch; they only change the path taken.

pub mod model_import;
pub mod param_block;

use std::fmt;

use rootcause::Report;
use thiserror::Error;
use tracing::{debug, warn};

use crate::level::instance::{PLACEMENT_FIELDS, SPAWN_ON_LOAD};
use crate::level::{Instance, InstanceField, Level, ParamBlock};
use crate::level_types::Category;
use crate::merge::IdMap;
use crate::spatial::transform::{convert_transform, cull_bounds};

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("instance {uid} has a non-finite transform")]
    NonFiniteTransform { uid: i32 },
    #[error("instance {uid} points at ParamBlock {index}, which does not exist")]
    DanglingParamIndex { uid: i32, index: u32 },
    #[error("class header of model {model_id} cannot be converted")]
    ClassHeader { model_id: i32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum ConversionPath {
    Templated,
    Synthesized,
    Placeholder,
}

impl fmt::Display for ConversionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConversionPath::Templated => write!(f, "templated"),
            ConversionPath::Synthesized => write!(f, "synthesized"),
            ConversionPath::Placeholder => write!(f, "placeholder"),
        }
    }
}

/// Counters for one converted batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ConversionReport {
    pub templated: usize,
    pub synthesized: usize,
    pub placeholders: usize,
    /// Placeholders caused by a failure rather than a missing model.
    pub errors: usize,
}

impl ConversionReport {
    pub fn succeeded(&self) -> usize {
        self.templated + self.synthesized
    }

    pub fn total(&self) -> usize {
        self.succeeded() + self.placeholders
    }

    pub fn merge(&mut self, other: ConversionReport) {
        self.templated += other.templated;
        self.synthesized += other.synthesized;
        self.placeholders += other.placeholders;
        self.errors += other.errors;
    }

    fn record(&mut self, path: ConversionPath) {
        match path {
            ConversionPath::Templated => self.templated += 1,
            ConversionPath::Synthesized => self.synthesized += 1,
            ConversionPath::Placeholder => self.placeholders += 1,
        }
    }
}

/// Converts instances of one category from `source` into a target level.
///
/// Templates are looked up only among the instances the target held when the
/// converter was created, so earlier conversions in a batch never serve as
/// templates for later ones.
pub struct InstanceConverter<'a> {
    source: &'a Level,
    category: Category,
    models: &'a IdMap,
    native_len: usize,
}

impl<'a> InstanceConverter<'a> {
    pub fn new(target: &Level, source: &'a Level, category: Category, models: &'a IdMap) -> Self {
        Self {
            source,
            category,
            models,
            native_len: target.instances(category).len(),
        }
    }

    /// Convert one instance. Never fails: errors fall back to a placeholder.
    pub fn convert(&self, target: &mut Level, inst: &Instance) -> (Instance, ConversionPath) {
        match self.try_convert(target, inst) {
            Ok(converted) => converted,
            Err(err) => {
                warn!(
                    "{} instance {} replaced by a placeholder: {err}",
                    self.category, inst.uid
                );
                let transform = if inst.transform.is_finite() {
                    convert_transform(&inst.transform, self.source.generation, target.generation)
                } else {
                    inst.transform
                };
                let model_id = self.models.get(inst.model_id).unwrap_or(inst.model_id);
                (
                    Instance::placeholder(inst.uid, model_id, transform),
                    ConversionPath::Placeholder,
                )
            }
        }
    }

    /// Convert every instance and append the results to the target collection.
    pub fn convert_all<'i>(
        &self,
        target: &mut Level,
        instances: impl IntoIterator<Item = &'i Instance>,
    ) -> ConversionReport {
        let mut report = ConversionReport::default();
        for inst in instances {
            let ok = inst.transform.is_finite() && self.source_param_block(inst).is_ok();
            let (converted, path) = self.convert(target, inst);
            if path == ConversionPath::Placeholder && !ok {
                report.errors += 1;
            }
            report.record(path);
            target.instances_mut(self.category).push(converted);
        }
        report
    }

    fn try_convert(
        &self,
        target: &mut Level,
        inst: &Instance,
    ) -> Result<(Instance, ConversionPath), Report<ConvertError>> {
        if !inst.transform.is_finite() {
            return Err(Report::new(ConvertError::NonFiniteTransform { uid: inst.uid }));
        }
        let source_block = self.source_param_block(inst)?;

        let mut placed = inst.clone();
        placed.transform =
            convert_transform(&inst.transform, self.source.generation, target.generation);

        let model_id = self.models.get(inst.model_id);
        let Some(model_id) = model_id.filter(|id| target.model(self.category, *id).is_some())
        else {
            warn!(
                "{} instance {} references model {} which does not resolve in the target",
                self.category, inst.uid, inst.model_id
            );
            let mut out = Instance::placeholder(inst.uid, inst.model_id, placed.transform);
            out.copy_fields(&placed, &[InstanceField::Color, InstanceField::Light]);
            return Ok((out, ConversionPath::Placeholder));
        };

        let template = target.instances(self.category)[..self.native_len]
            .iter()
            .find(|t| t.model_id == model_id && !t.needs_review)
            .cloned();

        let (mut out, path) = match template {
            Some(template) => {
                debug!(
                    "{} instance {} cloned from template {}",
                    self.category, inst.uid, template.uid
                );
                let template_block = template
                    .param_index
                    .and_then(|i| target.param_block(i))
                    .cloned();
                let mut out = template;
                out.copy_fields(&placed, PLACEMENT_FIELDS);
                out.param_index = source_block
                    .or(template_block.as_ref())
                    .map(|block| param_block::attach(target, block));
                (out, ConversionPath::Templated)
            }
            None => {
                let mut out = Instance {
                    spawn_flags: SPAWN_ON_LOAD,
                    ..Instance::default()
                };
                out.copy_fields(&placed, PLACEMENT_FIELDS);
                out.copy_fields(&placed, &[InstanceField::DrawDistance]);
                out.param_index = source_block.map(|block| param_block::attach(target, block));
                (out, ConversionPath::Synthesized)
            }
        };

        // Matrix layouts carry non-uniform scale the placement overlay drops.
        out.transform = placed.transform;
        out.model_id = model_id;
        out.cull_key = inst.cull_key;
        out.needs_review = false;
        out.class_index = if self.category.has_behavior() {
            target.class_header_index(model_id)
        } else {
            None
        };
        if self.category != Category::Moby {
            if let Some(model) = target.model(self.category, model_id) {
                out.cull_bounds = cull_bounds(model.bounds, &out.transform);
            }
        }
        Ok((out, path))
    }

    fn source_param_block(&self, inst: &Instance) -> Result<Option<&'a ParamBlock>, ConvertError> {
        match inst.param_index {
            None => Ok(None),
            Some(index) => self
                .source
                .param_block(index)
                .map(Some)
                .ok_or(ConvertError::DanglingParamIndex {
                    uid: inst.uid,
                    index,
                }),
        }
    }
}

#[cfg(test)]
mod tests {
    use glam::{Vec3, Vec4};

    use super::*;
    use crate::level::instance::TEMPLATE_FIELDS;
    use crate::level::{Model, Transform};
    use crate::level_types::{Generation, Rgb};

    fn identity_map(ids: &[i32]) -> IdMap {
        let mut map = IdMap::new();
        for id in ids {
            map.insert(*id, *id);
        }
        map
    }

    fn source_instance() -> Instance {
        Instance {
            uid: 77,
            model_id: 1000,
            param_index: Some(0),
            transform: Transform {
                position: Vec3::new(1.0, 2.0, 3.0),
                rotation: Vec3::new(0.5, 0.25, -0.5),
                scale: Vec3::ONE,
            },
            color: Rgb { r: 10, g: 20, b: 30 },
            light: 4,
            group_id: Some(2),
            ..Instance::default()
        }
    }

    fn v1_source() -> Level {
        let mut source = Level::new(Generation::V1);
        source.models_mut(Category::Moby).push(Model::new(1000, Generation::V1));
        source.param_blocks.push(ParamBlock::new(vec![0x5A; 0x10]));
        source.instances_mut(Category::Moby).push(source_instance());
        source
    }

    fn v2_target_with_model() -> Level {
        let mut target = Level::new(Generation::V2);
        target.models_mut(Category::Moby).push(Model::new(1000, Generation::V2));
        target
    }

    #[test]
    fn synthesized_without_template() {
        let source = v1_source();
        let mut target = v2_target_with_model();
        let map = identity_map(&[1000]);
        let converter = InstanceConverter::new(&target, &source, Category::Moby, &map);

        let (out, path) = converter.convert(&mut target, &source_instance());
        assert_eq!(path, ConversionPath::Synthesized);
        assert_eq!(out.uid, 77);
        assert_eq!(out.spawn_flags, SPAWN_ON_LOAD);
        assert_eq!(out.transform.rotation, Vec3::new(-0.5, 0.25, 0.5));
        assert_eq!(out.param_index, Some(0));
        assert_eq!(target.param_blocks[0].len(), 0x80);
        assert!(!out.needs_review);
    }

    #[test]
    fn templated_keeps_target_only_fields() {
        let source = v1_source();
        let mut target = v2_target_with_model();
        target.param_blocks.push(ParamBlock::new(vec![1; 0x80]));
        let template = Instance {
            uid: 1,
            model_id: 1000,
            spawn_flags: 0x30,
            draw_distance: 500.0,
            reserved: [7; 16],
            param_index: Some(0),
            ..Instance::default()
        };
        target.instances_mut(Category::Moby).push(template.clone());
        let map = identity_map(&[1000]);
        let converter = InstanceConverter::new(&target, &source, Category::Moby, &map);

        let (out, path) = converter.convert(&mut target, &source_instance());
        assert_eq!(path, ConversionPath::Templated);
        for field in TEMPLATE_FIELDS {
            assert_eq!(field.get(&out), field.get(&template), "{field:?}");
        }
        assert_eq!(out.uid, 77);
        assert_eq!(out.color, Rgb { r: 10, g: 20, b: 30 });
        assert_eq!(out.group_id, Some(2));
        // Source block appended at the trailing index, template block untouched.
        assert_eq!(out.param_index, Some(1));
        assert_eq!(&target.param_blocks[1].data[..0x10], &[0x5A; 0x10]);
        assert_eq!(target.param_blocks[0].data, vec![1; 0x80]);
    }

    #[test]
    fn template_block_is_cloned_not_shared() {
        let mut source = v1_source();
        source.instances_mut(Category::Moby)[0].param_index = None;
        let mut target = v2_target_with_model();
        target.param_blocks.push(ParamBlock::new(vec![3; 0x80]));
        target.instances_mut(Category::Moby).push(Instance {
            uid: 1,
            model_id: 1000,
            param_index: Some(0),
            ..Instance::default()
        });
        let map = identity_map(&[1000]);
        let converter = InstanceConverter::new(&target, &source, Category::Moby, &map);
        let inst = source.instances(Category::Moby)[0].clone();

        let (out, _) = converter.convert(&mut target, &inst);
        assert_eq!(out.param_index, Some(1));
        assert_eq!(target.param_blocks[1], target.param_blocks[0]);
    }

    #[test]
    fn unresolved_model_becomes_placeholder() {
        let source = v1_source();
        let mut target = Level::new(Generation::V2);
        let map = IdMap::new();
        let converter = InstanceConverter::new(&target, &source, Category::Moby, &map);

        let (out, path) = converter.convert(&mut target, &source_instance());
        assert_eq!(path, ConversionPath::Placeholder);
        assert!(out.needs_review);
        assert_eq!(out.uid, 77);
        assert_eq!(out.model_id, 1000);
        assert_eq!(out.param_index, None);
        assert!(target.param_blocks.is_empty());
    }

    #[test]
    fn failures_fall_back_without_aborting_the_batch() {
        let mut source = v1_source();
        let mut broken = source_instance();
        broken.uid = 78;
        broken.param_index = Some(9);
        let mut nan = source_instance();
        nan.uid = 79;
        nan.transform.position.x = f32::NAN;
        source.instances_mut(Category::Moby).push(broken);
        source.instances_mut(Category::Moby).push(nan);

        let mut target = v2_target_with_model();
        let map = identity_map(&[1000]);
        let converter = InstanceConverter::new(&target, &source, Category::Moby, &map);
        let report = converter.convert_all(&mut target, source.instances(Category::Moby));

        assert_eq!(report.synthesized, 1);
        assert_eq!(report.placeholders, 2);
        assert_eq!(report.errors, 2);
        assert_eq!(target.instances(Category::Moby).len(), 3);
        assert_eq!(target.param_blocks.len(), 1);
        let uids: Vec<i32> = target.instances(Category::Moby).iter().map(|i| i.uid).collect();
        assert_eq!(uids, vec![77, 78, 79]);
    }

    #[test]
    fn tie_cull_bounds_follow_converted_transform() {
        let mut source = Level::new(Generation::V2);
        source.models_mut(Category::Tie).push(Model::new(5, Generation::V2));
        let mut target = Level::new(Generation::V3);
        let mut model = Model::new(5, Generation::V3);
        model.bounds = Vec4::new(0.0, 1.0, 0.0, 3.0);
        target.models_mut(Category::Tie).push(model);
        let inst = Instance {
            uid: 1,
            model_id: 5,
            transform: Transform {
                position: Vec3::new(50.0, 0.0, 0.0),
                ..Transform::default()
            },
            ..Instance::default()
        };
        let map = identity_map(&[5]);
        let converter = InstanceConverter::new(&target, &source, Category::Tie, &map);

        let (out, _) = converter.convert(&mut target, &inst);
        assert!(out.cull_bounds.abs_diff_eq(Vec4::new(50.0, 1.0, 0.0, 3.0), 1e-5));
        assert_eq!(out.class_index, None);
    }
}
