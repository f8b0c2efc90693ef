//! Class header records (behavior dispatch tables).
//!
//! ```text
//! V1 (0x28):   +0x00 slots[8] u32   +0x20 param_size   +0x24 mode_flags
//! V2/V3 (0x30): +0x00 slots[9] u32  +0x24 collision_ptr +0x28 param_size +0x2C mode_flags
//! ```

use rootcause::Report;
use winnow::Parser;
use winnow::binary::le_u32;
use winnow::combinator::repeat;

use super::CodecError;
use crate::data::parser_utils::{ByteWriter, WResult, ensure_len};
use crate::level::class_header::{V1_SLOT_COUNT, V2_SLOT_COUNT};
use crate::level::{ClassHeader, ClassHeaderV1, ClassHeaderV2, MIN_PARAM_BLOCK_LEN};
use crate::level_types::Generation;

pub const CLASS_HEADER_V1_SIZE: usize = 0x28;
pub const CLASS_HEADER_V2_SIZE: usize = 0x30;

pub fn class_header_size(generation: Generation) -> usize {
    if generation.has_wide_class_header() {
        CLASS_HEADER_V2_SIZE
    } else {
        CLASS_HEADER_V1_SIZE
    }
}

fn parse_v1(input: &mut &[u8]) -> WResult<ClassHeaderV1> {
    let slots: Vec<u32> = repeat(V1_SLOT_COUNT, le_u32).parse_next(input)?;
    let param_size = le_u32.parse_next(input)?;
    let mode_flags = le_u32.parse_next(input)?;
    let mut out = ClassHeaderV1 {
        param_size,
        mode_flags,
        ..Default::default()
    };
    out.slots.copy_from_slice(&slots);
    Ok(out)
}

fn parse_v2(input: &mut &[u8]) -> WResult<ClassHeaderV2> {
    let slots: Vec<u32> = repeat(V2_SLOT_COUNT, le_u32).parse_next(input)?;
    let collision_ptr = le_u32.parse_next(input)?;
    let param_size = le_u32.parse_next(input)?;
    let mode_flags = le_u32.parse_next(input)?;
    let mut out = ClassHeaderV2 {
        collision_ptr,
        param_size,
        mode_flags,
        ..Default::default()
    };
    out.slots.copy_from_slice(&slots);
    Ok(out)
}

pub fn decode_class_header(
    data: &[u8],
    generation: Generation,
) -> Result<ClassHeader, Report<CodecError>> {
    let size = class_header_size(generation);
    ensure_len(data, 0, size).map_err(CodecError::from)?;
    let input = &mut &data[..size];
    let header = if generation.has_wide_class_header() {
        ClassHeader::V2(parse_v2(input).map_err(|e| CodecError::Malformed {
            what: "class header",
            detail: format!("{e}"),
        })?)
    } else {
        ClassHeader::V1(parse_v1(input).map_err(|e| CodecError::Malformed {
            what: "class header",
            detail: format!("{e}"),
        })?)
    };
    Ok(header)
}

/// Encode `header` in `generation`'s layout, converting first when needed.
pub fn encode_class_header(
    header: &ClassHeader,
    generation: Generation,
) -> Result<Vec<u8>, Report<CodecError>> {
    let header = to_generation(header, generation)?;
    let mut w = ByteWriter::with_capacity(class_header_size(generation));
    match header {
        ClassHeader::V1(h) => {
            h.slots.iter().for_each(|s| w.put_u32(*s));
            w.put_u32(h.param_size);
            w.put_u32(h.mode_flags);
        }
        ClassHeader::V2(h) => {
            h.slots.iter().for_each(|s| w.put_u32(*s));
            w.put_u32(h.collision_ptr);
            w.put_u32(h.param_size);
            w.put_u32(h.mode_flags);
        }
    }
    Ok(w.into_inner())
}

/// Widen a V1 header.
///
/// Slots are copied positionally, the ninth slot and the collision pointer
/// are zero. Classes whose V1 behavior relied on a routine that moved into
/// the ninth slot lose it; that is accepted, not repaired.
///
/// The parameter size is raised to the V2 ParamBlock minimum.
pub fn convert(header: &ClassHeaderV1) -> ClassHeaderV2 {
    let mut slots = [0u32; V2_SLOT_COUNT];
    slots[..V1_SLOT_COUNT].copy_from_slice(&header.slots);
    ClassHeaderV2 {
        slots,
        collision_ptr: 0,
        param_size: header.param_size.max(MIN_PARAM_BLOCK_LEN as u32),
        mode_flags: header.mode_flags,
    }
}

/// Narrow a V2 header. Fails when the ninth slot or the collision pointer
/// would be dropped.
pub fn narrow(header: &ClassHeaderV2) -> Result<ClassHeaderV1, CodecError> {
    if header.slots[V1_SLOT_COUNT] != 0 || header.collision_ptr != 0 {
        return Err(CodecError::LossyDowngrade {
            what: "class header",
            detail: format!(
                "slot 9 = 0x{:X}, collision_ptr = 0x{:X}",
                header.slots[V1_SLOT_COUNT], header.collision_ptr
            ),
        });
    }
    let mut slots = [0u32; V1_SLOT_COUNT];
    slots.copy_from_slice(&header.slots[..V1_SLOT_COUNT]);
    Ok(ClassHeaderV1 {
        slots,
        param_size: header.param_size,
        mode_flags: header.mode_flags,
    })
}

/// Bring `header` into the layout `generation` stores.
pub fn to_generation(
    header: &ClassHeader,
    generation: Generation,
) -> Result<ClassHeader, Report<CodecError>> {
    Ok(match (header, generation.has_wide_class_header()) {
        (ClassHeader::V1(h), true) => ClassHeader::V2(convert(h)),
        (ClassHeader::V2(h), false) => ClassHeader::V1(narrow(h)?),
        (same, _) => *same,
    })
}
