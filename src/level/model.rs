use glam::{Vec3, Vec4};

use crate::level_types::Generation;

/// Shared geometry plus its texture-reference table.
///
/// Every model is owned by exactly one level. Copies between levels are
/// always full clones.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Model {
    /// Id in the per-category namespace.
    pub id: i32,
    /// Generation the model data was authored for.
    pub generation: Generation,
    /// Local-space bounding sphere (center, radius).
    pub bounds: Vec4,
    /// Packed xyz vertex positions.
    pub vertices: Vec<f32>,
    pub indices: Vec<u16>,
    pub texture_configs: Vec<TextureConfig>,
    /// Only populated for V2/V3 models.
    pub animations: Vec<AnimationEntry>,
}

/// One texture slot of a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TextureConfig {
    /// Index into the level's texture table.
    pub texture_id: i32,
    pub shader: u32,
    pub uv_flags: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AnimationEntry {
    pub frame_count: u16,
    pub flags: u16,
    pub speed: f32,
    /// Sound cue fired by the animation. Only V3 tables carry it.
    pub sound: Option<i32>,
}

impl Model {
    pub fn new(id: i32, generation: Generation) -> Self {
        Self {
            id,
            generation,
            bounds: Vec4::ZERO,
            vertices: Vec::new(),
            indices: Vec::new(),
            texture_configs: Vec::new(),
            animations: Vec::new(),
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / 3
    }

    pub fn positions(&self) -> impl Iterator<Item = Vec3> + '_ {
        self.vertices
            .chunks_exact(3)
            .map(|v| Vec3::new(v[0], v[1], v[2]))
    }

    /// Recompute `bounds` from the vertex positions: AABB center and the
    /// farthest vertex distance from it.
    pub fn compute_bounds(&self) -> Vec4 {
        let mut positions = self.positions().peekable();
        if positions.peek().is_none() {
            return Vec4::ZERO;
        }
        let (min, max) = self.positions().fold(
            (Vec3::splat(f32::MAX), Vec3::splat(f32::MIN)),
            |(min, max), p| (min.min(p), max.max(p)),
        );
        let center = (min + max) * 0.5;
        let radius = positions
            .map(|p| p.distance(center))
            .fold(0.0f32, f32::max);
        center.extend(radius)
    }

    /// Texture ids referenced by this model, in slot order, duplicates kept.
    pub fn texture_ids(&self) -> impl Iterator<Item = i32> + '_ {
        self.texture_configs.iter().map(|config| config.texture_id)
    }
}
