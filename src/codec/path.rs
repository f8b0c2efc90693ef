//! Path spline records: `id i32, kind u16, point_count u16`, then one vec4
//! per control point.

use glam::Vec4;
use rootcause::Report;
use winnow::Parser;
use winnow::binary::{le_i32, le_u16};
use winnow::combinator::repeat;
use winnow::error::{ContextError, ErrMode};

use super::CodecError;
use crate::data::parser_utils::{ByteWriter, parse_vec4};
use crate::level::{PathKind, PathSpline};

pub const PATH_HEADER_SIZE: usize = 0x08;

pub fn decode_path(data: &[u8]) -> Result<(PathSpline, usize), Report<CodecError>> {
    let input = &mut &data[..];
    let (id, kind_tag, point_count) = (le_i32, le_u16, le_u16)
        .parse_next(input)
        .map_err(|_: ErrMode<ContextError>| CodecError::DataTooShort {
            what: "path header",
            need: PATH_HEADER_SIZE,
            have: data.len(),
        })?;

    let kind = PathKind::from_tag(kind_tag).ok_or_else(|tag| CodecError::UnknownTag {
        what: "path kind",
        tag: tag as u32,
    })?;

    let need = PATH_HEADER_SIZE + point_count as usize * 16;
    let points: Vec<Vec4> = repeat(point_count as usize, parse_vec4)
        .parse_next(input)
        .map_err(|_: ErrMode<ContextError>| CodecError::DataTooShort {
            what: "path points",
            need,
            have: data.len(),
        })?;

    Ok((PathSpline { id, kind, points }, need))
}

pub fn encode_path(path: &PathSpline) -> Result<Vec<u8>, Report<CodecError>> {
    let point_count = u16::try_from(path.points.len()).map_err(|_| CodecError::Malformed {
        what: "path",
        detail: format!("path {} has {} points", path.id, path.points.len()),
    })?;
    let mut w = ByteWriter::with_capacity(PATH_HEADER_SIZE + path.points.len() * 16);
    w.put_i32(path.id);
    w.put_u16(path.kind.tag());
    w.put_u16(point_count);
    path.points.iter().for_each(|p| w.put_vec4(*p));
    Ok(w.into_inner())
}
