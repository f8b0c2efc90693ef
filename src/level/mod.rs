//! In-memory entity graph of a level.
//!
//! A [`Level`] exclusively owns all of its buffers. Nothing in this module
//! enforces cross-references; that is the job of [`crate::validate`].

pub mod class_header;
pub mod instance;
pub mod model;
pub mod occlusion;
pub mod path;
pub mod texture;

pub use class_header::{ClassHeader, ClassHeaderEntry, ClassHeaderV1, ClassHeaderV2};
pub use instance::{FieldValue, Instance, InstanceField, Transform};
pub use model::{AnimationEntry, Model, TextureConfig};
pub use occlusion::{OcclusionEntry, OcclusionTable};
pub use path::{PathKind, PathSpline};
pub use texture::Texture;

use crate::level_types::{Category, Generation};

/// Minimum ParamBlock length for V2/V3 instances.
pub const MIN_PARAM_BLOCK_LEN: usize = 0x80;

/// Raw per-instance behavior parameters, addressed by table index.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ParamBlock {
    pub data: Vec<u8>,
}

impl ParamBlock {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Aggregate root of a level.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Level {
    pub generation: Generation,
    instances: [Vec<Instance>; 3],
    models: [Vec<Model>; 3],
    pub textures: Vec<Texture>,
    pub param_blocks: Vec<ParamBlock>,
    pub class_headers: Vec<ClassHeaderEntry>,
    pub occlusion: OcclusionTable,
    pub paths: Vec<PathSpline>,
    pub skybox: Option<Model>,
}

impl Level {
    pub fn new(generation: Generation) -> Self {
        Self {
            generation,
            instances: Default::default(),
            models: Default::default(),
            textures: Vec::new(),
            param_blocks: Vec::new(),
            class_headers: Vec::new(),
            occlusion: OcclusionTable::default(),
            paths: Vec::new(),
            skybox: None,
        }
    }

    pub fn instances(&self, category: Category) -> &[Instance] {
        &self.instances[category.index()]
    }

    pub fn instances_mut(&mut self, category: Category) -> &mut Vec<Instance> {
        &mut self.instances[category.index()]
    }

    pub fn all_instances(&self) -> impl Iterator<Item = (Category, &Instance)> {
        Category::ALL
            .into_iter()
            .flat_map(move |category| self.instances(category).iter().map(move |i| (category, i)))
    }

    pub fn models(&self, category: Category) -> &[Model] {
        &self.models[category.index()]
    }

    pub fn models_mut(&mut self, category: Category) -> &mut Vec<Model> {
        &mut self.models[category.index()]
    }

    /// Every model of every category, then the skybox.
    pub fn all_models_mut(&mut self) -> impl Iterator<Item = &mut Model> {
        self.models.iter_mut().flatten().chain(self.skybox.iter_mut())
    }

    pub fn model(&self, category: Category, id: i32) -> Option<&Model> {
        self.models(category).iter().find(|m| m.id == id)
    }

    /// Whether `id` is taken in any category sharing `category`'s namespace.
    pub fn model_id_in_use(&self, category: Category, id: i32) -> bool {
        category
            .namespace()
            .iter()
            .any(|c| self.models(*c).iter().any(|m| m.id == id))
    }

    /// First id, scanning upward from 0, unused in `category`'s namespace and
    /// absent from `reserved`.
    pub fn first_unused_model_id(&self, category: Category, reserved: &[i32]) -> Option<i32> {
        (0..i32::MAX).find(|id| !self.model_id_in_use(category, *id) && !reserved.contains(id))
    }

    pub fn param_block(&self, index: u32) -> Option<&ParamBlock> {
        self.param_blocks.get(index as usize)
    }

    /// Append a ParamBlock and return its index.
    pub fn push_param_block(&mut self, block: ParamBlock) -> u32 {
        self.param_blocks.push(block);
        (self.param_blocks.len() - 1) as u32
    }

    /// Index of the class header row belonging to `model_id`.
    pub fn class_header_index(&self, model_id: i32) -> Option<u32> {
        self.class_headers
            .iter()
            .position(|entry| entry.model_id == model_id)
            .map(|i| i as u32)
    }

    pub fn class_header(&self, model_id: i32) -> Option<&ClassHeader> {
        self.class_headers
            .iter()
            .find(|entry| entry.model_id == model_id)
            .map(|entry| &entry.header)
    }

    pub fn path_id_in_use(&self, id: i32) -> bool {
        self.paths.iter().any(|p| p.id == id)
    }

    pub fn first_unused_path_id(&self) -> i32 {
        (0..).find(|id| !self.path_id_in_use(*id)).unwrap_or(i32::MAX)
    }

    /// Whether the occlusion list for `category` is aligned with its collection.
    pub fn occlusion_aligned(&self, category: Category) -> bool {
        self.occlusion.list(category).len() == self.instances(category).len()
    }
}
