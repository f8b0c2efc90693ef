//! Resource merging: appends textures, models and paths from a source level
//! into a target level and reports how ids moved.
//!
//! Merging never overwrites or reorders anything already in the target, so
//! every index that resolved before a merge still resolves to the same bytes
//! afterwards.

pub mod models;
pub mod paths;
pub mod textures;

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use bon::Builder;
use thiserror::Error;

use crate::level_types::Category;

pub use models::{ModelImport, import_models};
pub use paths::import_paths;
pub use textures::{TextureImport, import_textures};

#[derive(Debug, Error)]
pub enum MergeError {
    #[error("source level has no {category} models")]
    MissingModelTable { category: Category },
    #[error("{category} model {id} not found in the source level")]
    ModelNotFound { category: Category, id: i32 },
    #[error("no free {category} model id left")]
    IdSpaceExhausted { category: Category },
}

/// Source id to target id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct IdMap {
    entries: BTreeMap<i32, i32>,
}

impl IdMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, from: i32, to: i32) {
        self.entries.insert(from, to);
    }

    pub fn get(&self, from: i32) -> Option<i32> {
        self.entries.get(&from).copied()
    }

    pub fn contains(&self, from: i32) -> bool {
        self.entries.contains_key(&from)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (i32, i32)> + '_ {
        self.entries.iter().map(|(from, to)| (*from, *to))
    }

    /// Only the entries whose id actually changed.
    pub fn remapped(&self) -> impl Iterator<Item = (i32, i32)> + '_ {
        self.iter().filter(|(from, to)| from != to)
    }

    pub fn extend(&mut self, other: &IdMap) {
        self.entries.extend(other.iter());
    }
}

/// Model ids with special handling, passed in explicitly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Builder)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SpecialModels {
    pub skybox: Option<i32>,
    pub vendor: Option<i32>,
    pub player: Option<i32>,
    /// Models the target always keeps its own copy of.
    #[builder(default)]
    pub never_import: BTreeSet<i32>,
}

impl SpecialModels {
    /// Whether `id` must be served by the target's own model instead of a clone.
    pub fn is_protected(&self, id: i32) -> bool {
        self.player == Some(id) || self.never_import.contains(&id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Builder)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct MergeConfig {
    #[builder(default)]
    pub special_models: SpecialModels,
}
