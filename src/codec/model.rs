//! Variable-length model records.
//!
//! ```text
//! +0x00 i32  id
//! +0x04 u32  vertex_float_count
//! +0x08 u32  index_count
//! +0x0C u32  texture_config_count
//! +0x10 u32  animation_count      (always 0 in V1)
//! +0x14 vec4 bounds               (local sphere)
//! +0x24 f32[vertex_float_count]
//!       u16[index_count], zero padded to 4
//!       texture configs, 0x0C each: texture_id i32, shader u32, uv_flags u32
//!       animations, V2: 0x08 each (frame_count u16, flags u16, speed f32)
//!                   V3: 0x0C each (... , sound i32)
//! ```

use rootcause::Report;
use winnow::Parser;
use winnow::binary::{le_f32, le_i32, le_u16, le_u32};
use winnow::combinator::repeat;

use super::CodecError;
use crate::data::parser_utils::{ByteWriter, WResult, align4, parse_vec4};
use crate::level::{AnimationEntry, Model, TextureConfig};
use crate::level_types::Generation;

pub const MODEL_HEADER_SIZE: usize = 0x24;
pub const TEXTURE_CONFIG_SIZE: usize = 0x0C;

pub fn animation_entry_size(generation: Generation) -> usize {
    match generation {
        Generation::V1 => 0,
        Generation::V2 => 0x08,
        Generation::V3 => 0x0C,
    }
}

struct ModelHeader {
    id: i32,
    vertex_float_count: u32,
    index_count: u32,
    texture_config_count: u32,
    animation_count: u32,
}

fn parse_model_header(input: &mut &[u8]) -> WResult<ModelHeader> {
    let id = le_i32.parse_next(input)?;
    let vertex_float_count = le_u32.parse_next(input)?;
    let index_count = le_u32.parse_next(input)?;
    let texture_config_count = le_u32.parse_next(input)?;
    let animation_count = le_u32.parse_next(input)?;
    Ok(ModelHeader {
        id,
        vertex_float_count,
        index_count,
        texture_config_count,
        animation_count,
    })
}

fn parse_texture_config(input: &mut &[u8]) -> WResult<TextureConfig> {
    let texture_id = le_i32.parse_next(input)?;
    let shader = le_u32.parse_next(input)?;
    let uv_flags = le_u32.parse_next(input)?;
    Ok(TextureConfig {
        texture_id,
        shader,
        uv_flags,
    })
}

fn parse_animation(generation: Generation) -> impl FnMut(&mut &[u8]) -> WResult<AnimationEntry> {
    move |input: &mut &[u8]| {
        let frame_count = le_u16.parse_next(input)?;
        let flags = le_u16.parse_next(input)?;
        let speed = le_f32.parse_next(input)?;
        let sound = if generation == Generation::V3 {
            Some(le_i32.parse_next(input)?)
        } else {
            None
        };
        Ok(AnimationEntry {
            frame_count,
            flags,
            speed,
            sound,
        })
    }
}

/// Total encoded size implied by a header, used to reject truncated records
/// before allocating.
fn encoded_len(header: &ModelHeader, generation: Generation) -> Option<usize> {
    let vertices = (header.vertex_float_count as usize).checked_mul(4)?;
    let indices = align4((header.index_count as usize).checked_mul(2)?);
    let configs = (header.texture_config_count as usize).checked_mul(TEXTURE_CONFIG_SIZE)?;
    let animations =
        (header.animation_count as usize).checked_mul(animation_entry_size(generation))?;
    MODEL_HEADER_SIZE
        .checked_add(vertices)?
        .checked_add(indices)?
        .checked_add(configs)?
        .checked_add(animations)
}

/// Decode a model record. Returns the model and the number of bytes consumed.
pub fn decode_model(
    data: &[u8],
    generation: Generation,
) -> Result<(Model, usize), Report<CodecError>> {
    let malformed = |e: winnow::error::ErrMode<winnow::error::ContextError>| CodecError::Malformed {
        what: "model",
        detail: format!("{e}"),
    };

    let input = &mut &data[..];
    let header = parse_model_header(input).map_err(|_| CodecError::DataTooShort {
        what: "model header",
        need: MODEL_HEADER_SIZE,
        have: data.len(),
    })?;

    if generation == Generation::V1 && header.animation_count != 0 {
        return Err(Report::new(CodecError::Malformed {
            what: "model",
            detail: format!(
                "V1 model {} declares {} animations",
                header.id, header.animation_count
            ),
        }));
    }

    let total = encoded_len(&header, generation).ok_or(CodecError::Malformed {
        what: "model",
        detail: "record length overflows".to_string(),
    })?;
    if total > data.len() {
        return Err(Report::new(CodecError::DataTooShort {
            what: "model",
            need: total,
            have: data.len(),
        }));
    }

    let bounds = parse_vec4(input).map_err(malformed)?;
    let vertices: Vec<f32> = repeat(header.vertex_float_count as usize, le_f32)
        .parse_next(input)
        .map_err(malformed)?;
    let indices: Vec<u16> = repeat(header.index_count as usize, le_u16)
        .parse_next(input)
        .map_err(malformed)?;
    if header.index_count % 2 == 1 {
        le_u16.parse_next(input).map_err(malformed)?;
    }
    let texture_configs: Vec<TextureConfig> =
        repeat(header.texture_config_count as usize, parse_texture_config)
            .parse_next(input)
            .map_err(malformed)?;
    let animations: Vec<AnimationEntry> =
        repeat(header.animation_count as usize, parse_animation(generation))
            .parse_next(input)
            .map_err(malformed)?;

    Ok((
        Model {
            id: header.id,
            generation,
            bounds,
            vertices,
            indices,
            texture_configs,
            animations,
        },
        total,
    ))
}

/// Encode `model` in `generation`'s layout.
///
/// V2 animation entries have no sound field; it is not written. V1 has no
/// animation table at all, so a model with animations cannot be encoded as V1.
pub fn encode_model(model: &Model, generation: Generation) -> Result<Vec<u8>, Report<CodecError>> {
    if generation == Generation::V1 && !model.animations.is_empty() {
        return Err(Report::new(CodecError::LossyDowngrade {
            what: "model",
            detail: format!(
                "model {} has {} animations, V1 has no animation table",
                model.id,
                model.animations.len()
            ),
        }));
    }

    let mut w = ByteWriter::with_capacity(
        MODEL_HEADER_SIZE + model.vertices.len() * 4 + model.indices.len() * 2,
    );
    w.put_i32(model.id);
    w.put_u32(model.vertices.len() as u32);
    w.put_u32(model.indices.len() as u32);
    w.put_u32(model.texture_configs.len() as u32);
    w.put_u32(model.animations.len() as u32);
    w.put_vec4(model.bounds);
    model.vertices.iter().for_each(|v| w.put_f32(*v));
    model.indices.iter().for_each(|i| w.put_u16(*i));
    w.pad4();
    for config in &model.texture_configs {
        w.put_i32(config.texture_id);
        w.put_u32(config.shader);
        w.put_u32(config.uv_flags);
    }
    for anim in &model.animations {
        w.put_u16(anim.frame_count);
        w.put_u16(anim.flags);
        w.put_f32(anim.speed);
        if generation == Generation::V3 {
            w.put_i32(anim.sound.unwrap_or(-1));
        }
    }
    Ok(w.into_inner())
}
