//! Occlusion table block.
//!
//! ```text
//! +0x00 i32 moby_count
//! +0x04 i32 tie_count
//! +0x08 i32 shrub_count
//! +0x0C (spatial_hash i32, visibility i32) x moby_count,
//!       then x tie_count, then x shrub_count
//! ```

use rootcause::Report;
use winnow::Parser;
use winnow::binary::le_i32;
use winnow::combinator::repeat;

use super::CodecError;
use crate::data::parser_utils::{ByteWriter, WResult};
use crate::level::{OcclusionEntry, OcclusionTable};
use crate::level_types::Category;

pub const OCCLUSION_HEADER_SIZE: usize = 0x0C;
pub const OCCLUSION_ENTRY_SIZE: usize = 0x08;

fn parse_entry(input: &mut &[u8]) -> WResult<OcclusionEntry> {
    let spatial_hash = le_i32.parse_next(input)?;
    let visibility = le_i32.parse_next(input)?;
    Ok(OcclusionEntry {
        spatial_hash,
        visibility,
    })
}

fn parse_counts(input: &mut &[u8]) -> WResult<[i32; 3]> {
    let mobys = le_i32.parse_next(input)?;
    let ties = le_i32.parse_next(input)?;
    let shrubs = le_i32.parse_next(input)?;
    Ok([mobys, ties, shrubs])
}

pub fn decode_occlusion(data: &[u8]) -> Result<OcclusionTable, Report<CodecError>> {
    let input = &mut &data[..];
    let counts = parse_counts(input).map_err(|_| CodecError::DataTooShort {
        what: "occlusion header",
        need: OCCLUSION_HEADER_SIZE,
        have: data.len(),
    })?;

    if let Some(negative) = counts.iter().find(|c| **c < 0) {
        return Err(Report::new(CodecError::Malformed {
            what: "occlusion table",
            detail: format!("negative count {negative}"),
        }));
    }
    let total: usize = counts.iter().map(|c| *c as usize).sum();
    let need = OCCLUSION_HEADER_SIZE + total * OCCLUSION_ENTRY_SIZE;
    if data.len() < need {
        return Err(Report::new(CodecError::DataTooShort {
            what: "occlusion entries",
            need,
            have: data.len(),
        }));
    }

    let mut table = OcclusionTable::default();
    for (category, count) in Category::ALL.into_iter().zip(counts) {
        let entries: Vec<OcclusionEntry> = repeat(count as usize, parse_entry)
            .parse_next(input)
            .map_err(|e| CodecError::Malformed {
                what: "occlusion entries",
                detail: format!("{e}"),
            })?;
        table.set_list(category, entries);
    }
    Ok(table)
}

pub fn encode_occlusion(table: &OcclusionTable) -> Vec<u8> {
    let mut w = ByteWriter::with_capacity(
        OCCLUSION_HEADER_SIZE + table.total_len() * OCCLUSION_ENTRY_SIZE,
    );
    for category in Category::ALL {
        w.put_i32(table.list(category).len() as i32);
    }
    for category in Category::ALL {
        for entry in table.list(category) {
            w.put_i32(entry.spatial_hash);
            w.put_i32(entry.visibility);
        }
    }
    w.into_inner()
}
