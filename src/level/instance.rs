//! Placed instances and the enumerated field table used to copy subsets of
//! their properties between instances of different generations.

use glam::{EulerRot, Mat4, Quat, Vec3, Vec4};

use crate::level_types::Rgb;

/// Position, Euler rotation (radians, XYZ order) and per-axis scale.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Vec3,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn rotation_quat(&self) -> Quat {
        Quat::from_euler(EulerRot::XYZ, self.rotation.x, self.rotation.y, self.rotation.z)
    }

    /// Compose as scale, then rotation, then translation.
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation_quat(), self.position)
    }

    pub fn from_matrix(matrix: &Mat4) -> Self {
        let (scale, rotation, position) = matrix.to_scale_rotation_translation();
        let (x, y, z) = rotation.to_euler(EulerRot::XYZ);
        Self {
            position,
            rotation: Vec3::new(x, y, z),
            scale,
        }
    }

    /// Layouts that store a single scale scalar use the X component.
    pub fn uniform_scale(&self) -> f32 {
        self.scale.x
    }

    pub fn is_finite(&self) -> bool {
        self.position.is_finite() && self.rotation.is_finite() && self.scale.is_finite()
    }
}

/// A placed occurrence of a model.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Instance {
    /// Stable author-assigned id.
    pub uid: i32,
    /// Foreign key into the owning level's model table for this category.
    pub model_id: i32,
    pub transform: Transform,
    pub draw_distance: f32,
    pub light: i32,
    pub spawn_flags: u32,
    /// Spatial group; `None` is the "no group" sentinel (`-1` on disk).
    pub group_id: Option<u32>,
    /// Index into the level's ParamBlock table; `None` is `-1` on disk.
    pub param_index: Option<u32>,
    /// Index into the level's class header table.
    pub class_index: Option<u32>,
    pub color: Rgb,
    /// Engine-assigned occlusion key, distinct from `uid`.
    pub cull_key: Option<u32>,
    /// World-space culling sphere (center, radius).
    pub cull_bounds: Vec4,
    /// Opaque per-instance bytes only present in newer layouts.
    pub reserved: [u8; 16],
    /// Set on best-effort placeholders that need a human to look at them.
    pub needs_review: bool,
}

impl Default for Instance {
    fn default() -> Self {
        Self {
            uid: 0,
            model_id: 0,
            transform: Transform::default(),
            draw_distance: DEFAULT_DRAW_DISTANCE,
            light: 0,
            spawn_flags: 0,
            group_id: None,
            param_index: None,
            class_index: None,
            color: Rgb::WHITE,
            cull_key: None,
            cull_bounds: Vec4::ZERO,
            reserved: [0; 16],
            needs_review: false,
        }
    }
}

pub const DEFAULT_DRAW_DISTANCE: f32 = 64.0;

/// Spawn flag set on every synthesized instance: spawn on level load.
pub const SPAWN_ON_LOAD: u32 = 0x1;

impl Instance {
    /// Minimal reviewable stand-in carrying identity and placement only.
    pub fn placeholder(uid: i32, model_id: i32, transform: Transform) -> Self {
        Self {
            uid,
            model_id,
            transform,
            needs_review: true,
            ..Self::default()
        }
    }

    pub fn position(&self) -> Vec3 {
        self.transform.position
    }

    /// Copy the listed fields from `source` onto `self`.
    pub fn copy_fields(&mut self, source: &Instance, fields: &[InstanceField]) {
        for field in fields {
            field.set(self, field.get(source));
        }
    }
}

/// Every serializable property of an [`Instance`].
///
/// Layout tables map these to byte offsets, and the template overlay copies
/// named subsets of them, so the set of "compatibility fields" is a constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstanceField {
    Uid,
    ModelId,
    GroupId,
    ParamIndex,
    ClassIndex,
    DrawDistance,
    Light,
    SpawnFlags,
    /// Single scalar scale (X component of the transform scale).
    Scale,
    Position,
    Rotation,
    /// Full transform as a column-major matrix.
    Matrix,
    Color,
    CullKey,
    CullBounds,
    Reserved,
}

/// A single field's value, typed by its on-disk representation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue {
    I32(i32),
    U32(u32),
    F32(f32),
    Index(Option<u32>),
    Vec3(Vec3),
    Vec4(Vec4),
    Mat4(Mat4),
    Rgb(Rgb),
    Bytes16([u8; 16]),
}

impl InstanceField {
    /// Encoded width in bytes.
    pub fn width(self) -> usize {
        match self {
            InstanceField::Uid
            | InstanceField::ModelId
            | InstanceField::GroupId
            | InstanceField::ParamIndex
            | InstanceField::ClassIndex
            | InstanceField::DrawDistance
            | InstanceField::Light
            | InstanceField::SpawnFlags
            | InstanceField::Scale
            | InstanceField::Color
            | InstanceField::CullKey => 4,
            InstanceField::Position | InstanceField::Rotation => 12,
            InstanceField::CullBounds | InstanceField::Reserved => 16,
            InstanceField::Matrix => 64,
        }
    }

    pub fn get(self, inst: &Instance) -> FieldValue {
        match self {
            InstanceField::Uid => FieldValue::I32(inst.uid),
            InstanceField::ModelId => FieldValue::I32(inst.model_id),
            InstanceField::GroupId => FieldValue::Index(inst.group_id),
            InstanceField::ParamIndex => FieldValue::Index(inst.param_index),
            InstanceField::ClassIndex => FieldValue::Index(inst.class_index),
            InstanceField::DrawDistance => FieldValue::F32(inst.draw_distance),
            InstanceField::Light => FieldValue::I32(inst.light),
            InstanceField::SpawnFlags => FieldValue::U32(inst.spawn_flags),
            InstanceField::Scale => FieldValue::F32(inst.transform.uniform_scale()),
            InstanceField::Position => FieldValue::Vec3(inst.transform.position),
            InstanceField::Rotation => FieldValue::Vec3(inst.transform.rotation),
            InstanceField::Matrix => FieldValue::Mat4(inst.transform.to_matrix()),
            InstanceField::Color => FieldValue::Rgb(inst.color),
            InstanceField::CullKey => FieldValue::Index(inst.cull_key),
            InstanceField::CullBounds => FieldValue::Vec4(inst.cull_bounds),
            InstanceField::Reserved => FieldValue::Bytes16(inst.reserved),
        }
    }

    /// Store `value` into `inst`. Mismatched value kinds are ignored.
    pub fn set(self, inst: &mut Instance, value: FieldValue) {
        match (self, value) {
            (InstanceField::Uid, FieldValue::I32(v)) => inst.uid = v,
            (InstanceField::ModelId, FieldValue::I32(v)) => inst.model_id = v,
            (InstanceField::GroupId, FieldValue::Index(v)) => inst.group_id = v,
            (InstanceField::ParamIndex, FieldValue::Index(v)) => inst.param_index = v,
            (InstanceField::ClassIndex, FieldValue::Index(v)) => inst.class_index = v,
            (InstanceField::DrawDistance, FieldValue::F32(v)) => inst.draw_distance = v,
            (InstanceField::Light, FieldValue::I32(v)) => inst.light = v,
            (InstanceField::SpawnFlags, FieldValue::U32(v)) => inst.spawn_flags = v,
            (InstanceField::Scale, FieldValue::F32(v)) => inst.transform.scale = Vec3::splat(v),
            (InstanceField::Position, FieldValue::Vec3(v)) => inst.transform.position = v,
            (InstanceField::Rotation, FieldValue::Vec3(v)) => inst.transform.rotation = v,
            (InstanceField::Matrix, FieldValue::Mat4(m)) => {
                inst.transform = Transform::from_matrix(&m)
            }
            (InstanceField::Color, FieldValue::Rgb(v)) => inst.color = v,
            (InstanceField::CullKey, FieldValue::Index(v)) => inst.cull_key = v,
            (InstanceField::CullBounds, FieldValue::Vec4(v)) => inst.cull_bounds = v,
            (InstanceField::Reserved, FieldValue::Bytes16(v)) => inst.reserved = v,
            _ => {}
        }
    }
}

/// Identity and placement fields carried from a source instance onto a
/// template clone.
pub const PLACEMENT_FIELDS: &[InstanceField] = &[
    InstanceField::Uid,
    InstanceField::Position,
    InstanceField::Rotation,
    InstanceField::Scale,
    InstanceField::Color,
    InstanceField::Light,
    InstanceField::GroupId,
];

/// Target-only fields a template clone keeps verbatim.
pub const TEMPLATE_FIELDS: &[InstanceField] = &[
    InstanceField::SpawnFlags,
    InstanceField::DrawDistance,
    InstanceField::Reserved,
];
