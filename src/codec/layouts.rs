//! Fixed instance record layouts for every (generation, category) pair.
//!
//! Each layout is a byte length plus a table of `(field, offset)` pairs.
//! Bytes not covered by a field are zero on encode and ignored on decode.
//! Fields a layout does not list keep their [`Instance::default`] value.

use winnow::Parser;
use winnow::binary::{le_f32, le_i32, le_u32};
use winnow::token::take;

use crate::data::parser_utils::{
    ByteWriter, ParseError, WResult, ensure_len, parse_at, parse_mat4, parse_optional_index,
    parse_rgb, parse_vec3, parse_vec4,
};
use crate::level::{FieldValue, Instance, InstanceField};
use crate::level_types::{Category, Generation};

use InstanceField::*;

#[derive(Debug)]
pub struct InstanceLayout {
    pub size: usize,
    pub fields: &'static [(InstanceField, usize)],
}

impl InstanceLayout {
    pub fn offset_of(&self, field: InstanceField) -> Option<usize> {
        self.fields
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, offset)| *offset)
    }
}

pub const MOBY_V1: InstanceLayout = InstanceLayout {
    size: 0x48,
    fields: &[
        (Uid, 0x00),
        (ModelId, 0x04),
        (GroupId, 0x08),
        (ParamIndex, 0x0C),
        (DrawDistance, 0x10),
        (Light, 0x14),
        (SpawnFlags, 0x18),
        (Scale, 0x1C),
        (Position, 0x20),
        (Rotation, 0x2C),
        (Color, 0x38),
        (ClassIndex, 0x3C),
    ],
};

pub const MOBY_V2: InstanceLayout = InstanceLayout {
    size: 0x58,
    fields: &[
        (Uid, 0x00),
        (ModelId, 0x04),
        (GroupId, 0x08),
        (ParamIndex, 0x0C),
        (DrawDistance, 0x10),
        (Light, 0x14),
        (SpawnFlags, 0x18),
        (Scale, 0x1C),
        (Position, 0x20),
        (Rotation, 0x2C),
        (Color, 0x38),
        (ClassIndex, 0x3C),
        (CullKey, 0x40),
        (Reserved, 0x44),
    ],
};

pub const MOBY_V3: InstanceLayout = InstanceLayout {
    size: 0x60,
    fields: &[
        (ModelId, 0x00),
        (Uid, 0x04),
        (GroupId, 0x08),
        (ParamIndex, 0x0C),
        (DrawDistance, 0x10),
        (Light, 0x14),
        (SpawnFlags, 0x18),
        (Scale, 0x1C),
        (Position, 0x20),
        (Rotation, 0x2C),
        (Color, 0x38),
        (ClassIndex, 0x3C),
        (CullKey, 0x40),
        (Reserved, 0x44),
    ],
};

pub const TIE_V1: InstanceLayout = InstanceLayout {
    size: 0x60,
    fields: &[
        (ModelId, 0x00),
        (Uid, 0x04),
        (Light, 0x08),
        (DrawDistance, 0x0C),
        (Matrix, 0x10),
        (Color, 0x50),
        (GroupId, 0x54),
        (SpawnFlags, 0x58),
    ],
};

pub const TIE_V2: InstanceLayout = InstanceLayout {
    size: 0x80,
    fields: &[
        (ModelId, 0x00),
        (Uid, 0x04),
        (Light, 0x08),
        (DrawDistance, 0x0C),
        (Matrix, 0x10),
        (Color, 0x50),
        (GroupId, 0x54),
        (SpawnFlags, 0x58),
        (CullKey, 0x5C),
        (Reserved, 0x60),
        (CullBounds, 0x70),
    ],
};

pub const SHRUB_V1: InstanceLayout = InstanceLayout {
    size: 0x50,
    fields: &[
        (ModelId, 0x00),
        (Uid, 0x04),
        (DrawDistance, 0x08),
        (Color, 0x0C),
        (Matrix, 0x10),
    ],
};

pub const SHRUB_V2: InstanceLayout = InstanceLayout {
    size: 0x80,
    fields: &[
        (ModelId, 0x00),
        (Uid, 0x04),
        (DrawDistance, 0x08),
        (Color, 0x0C),
        (Matrix, 0x10),
        (Light, 0x50),
        (GroupId, 0x54),
        (CullKey, 0x58),
        (SpawnFlags, 0x5C),
        (Reserved, 0x60),
        (CullBounds, 0x70),
    ],
};

pub fn instance_layout(generation: Generation, category: Category) -> &'static InstanceLayout {
    match (generation, category) {
        (Generation::V1, Category::Moby) => &MOBY_V1,
        (Generation::V2, Category::Moby) => &MOBY_V2,
        (Generation::V3, Category::Moby) => &MOBY_V3,
        (Generation::V1, Category::Tie) => &TIE_V1,
        (Generation::V2 | Generation::V3, Category::Tie) => &TIE_V2,
        (Generation::V1, Category::Shrub) => &SHRUB_V1,
        (Generation::V2 | Generation::V3, Category::Shrub) => &SHRUB_V2,
    }
}

fn parse_reserved(input: &mut &[u8]) -> WResult<[u8; 16]> {
    let bytes = take(16usize).parse_next(input)?;
    let mut out = [0u8; 16];
    out.copy_from_slice(bytes);
    Ok(out)
}

fn parse_field(field: InstanceField, input: &mut &[u8]) -> WResult<FieldValue> {
    Ok(match field {
        Uid | ModelId | Light => FieldValue::I32(le_i32.parse_next(input)?),
        SpawnFlags => FieldValue::U32(le_u32.parse_next(input)?),
        DrawDistance | Scale => FieldValue::F32(le_f32.parse_next(input)?),
        GroupId | ParamIndex | ClassIndex | CullKey => {
            FieldValue::Index(parse_optional_index(input)?)
        }
        Position | Rotation => FieldValue::Vec3(parse_vec3(input)?),
        Matrix => FieldValue::Mat4(parse_mat4(input)?),
        Color => FieldValue::Rgb(parse_rgb(input)?),
        CullBounds => FieldValue::Vec4(parse_vec4(input)?),
        Reserved => FieldValue::Bytes16(parse_reserved(input)?),
    })
}

fn encode_field(value: FieldValue) -> Vec<u8> {
    let mut w = ByteWriter::with_capacity(16);
    match value {
        FieldValue::I32(v) => w.put_i32(v),
        FieldValue::U32(v) => w.put_u32(v),
        FieldValue::F32(v) => w.put_f32(v),
        FieldValue::Index(v) => w.put_optional_index(v),
        FieldValue::Vec3(v) => w.put_vec3(v),
        FieldValue::Vec4(v) => w.put_vec4(v),
        FieldValue::Mat4(m) => w.put_mat4(&m),
        FieldValue::Rgb(c) => w.put_rgb(c),
        FieldValue::Bytes16(b) => w.put_bytes(&b),
    }
    w.into_inner()
}

/// Decode one fixed-size instance record.
pub fn decode_instance(data: &[u8], layout: &InstanceLayout) -> Result<Instance, ParseError> {
    ensure_len(data, 0, layout.size)?;
    let mut inst = Instance::default();
    for (field, offset) in layout.fields {
        let value = parse_at(data, *offset, |input| parse_field(*field, input))?;
        field.set(&mut inst, value);
    }
    Ok(inst)
}

/// Encode one instance into exactly `layout.size` bytes.
pub fn encode_instance(inst: &Instance, layout: &InstanceLayout) -> Vec<u8> {
    let mut w = ByteWriter::with_capacity(layout.size);
    w.pad_to(layout.size);
    for (field, offset) in layout.fields {
        w.patch(*offset, &encode_field(field.get(inst)));
    }
    w.into_inner()
}

#[cfg(test)]
mod tests {
    use glam::{Vec3, Vec4};

    use super::*;
    use crate::level::Transform;
    use crate::level_types::Rgb;

    fn fields_fit(layout: &InstanceLayout) -> bool {
        let mut spans: Vec<(usize, usize)> = layout
            .fields
            .iter()
            .map(|(f, o)| (*o, *o + f.width()))
            .collect();
        spans.sort();
        spans.windows(2).all(|w| w[0].1 <= w[1].0)
            && spans.last().map(|s| s.1 <= layout.size).unwrap_or(true)
    }

    #[test]
    fn layouts_do_not_overlap() {
        for generation in Generation::ALL {
            for category in Category::ALL {
                let layout = instance_layout(generation, category);
                assert!(fields_fit(layout), "{generation} {category}");
            }
        }
    }

    #[test]
    fn layout_sizes() {
        assert_eq!(instance_layout(Generation::V1, Category::Moby).size, 0x48);
        assert_eq!(instance_layout(Generation::V2, Category::Moby).size, 0x58);
        assert_eq!(instance_layout(Generation::V3, Category::Moby).size, 0x60);
        assert_eq!(instance_layout(Generation::V1, Category::Tie).size, 0x60);
        assert_eq!(instance_layout(Generation::V3, Category::Tie).size, 0x80);
        assert_eq!(instance_layout(Generation::V1, Category::Shrub).size, 0x50);
    }

    #[test]
    fn v1_moby_offsets() {
        let inst = Instance {
            uid: 0x11223344,
            model_id: 1000,
            param_index: Some(3),
            transform: Transform {
                position: Vec3::new(1.0, 2.0, 3.0),
                ..Transform::default()
            },
            ..Instance::default()
        };
        let bytes = encode_instance(&inst, &MOBY_V1);
        assert_eq!(bytes.len(), 0x48);
        assert_eq!(&bytes[0x00..0x04], &0x11223344i32.to_le_bytes());
        assert_eq!(&bytes[0x04..0x08], &1000i32.to_le_bytes());
        assert_eq!(&bytes[0x08..0x0C], &(-1i32).to_le_bytes());
        assert_eq!(&bytes[0x0C..0x10], &3i32.to_le_bytes());
        assert_eq!(&bytes[0x20..0x24], &1.0f32.to_le_bytes());
        assert!(bytes[0x40..].iter().all(|b| *b == 0));
    }

    #[test]
    fn v3_moby_swaps_identity_fields() {
        let inst = Instance {
            uid: 7,
            model_id: 9,
            ..Instance::default()
        };
        let bytes = encode_instance(&inst, &MOBY_V3);
        assert_eq!(&bytes[0..4], &9i32.to_le_bytes());
        assert_eq!(&bytes[4..8], &7i32.to_le_bytes());
        let decoded = decode_instance(&bytes, &MOBY_V3).unwrap();
        assert_eq!(decoded.uid, 7);
        assert_eq!(decoded.model_id, 9);
    }

    #[test]
    fn tie_v2_keeps_bounds_and_key() {
        let inst = Instance {
            uid: 5,
            model_id: 12,
            cull_key: Some(99),
            cull_bounds: Vec4::new(1.0, 2.0, 3.0, 10.0),
            color: Rgb { r: 4, g: 5, b: 6 },
            transform: Transform {
                position: Vec3::new(100.0, -5.0, 40.0),
                rotation: Vec3::new(0.0, 0.5, 0.0),
                scale: Vec3::splat(1.5),
            },
            ..Instance::default()
        };
        let decoded = decode_instance(&encode_instance(&inst, &TIE_V2), &TIE_V2).unwrap();
        assert_eq!(decoded.cull_key, Some(99));
        assert_eq!(decoded.cull_bounds, inst.cull_bounds);
        assert_eq!(decoded.color, inst.color);
        assert!(decoded.transform.position.abs_diff_eq(inst.transform.position, 1e-4));
        assert!(decoded.transform.scale.abs_diff_eq(inst.transform.scale, 1e-4));
        // Not part of tie layouts.
        assert_eq!(decoded.param_index, None);
    }

    #[test]
    fn short_record_is_rejected() {
        let bytes = vec![0u8; 0x47];
        assert!(decode_instance(&bytes, &MOBY_V1).is_err());
    }
}
