//! Count-prefixed record tables.
//!
//! ```text
//! +0x00 u32 count
//! count x (u32 len, u8[len], zero pad to 4)
//! ```
//!
//! A record that fails to decode is skipped and counted; only a broken frame
//! (a length running past the end of the table) fails the whole table.

use rootcause::Report;
use tracing::warn;
use winnow::Parser;
use winnow::binary::le_u32;
use winnow::error::{ContextError, ErrMode};
use winnow::token::take;

use super::CodecError;
use crate::data::parser_utils::{ByteWriter, align4};

/// Per-table decode counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct DecodeStats {
    pub decoded: usize,
    pub skipped: usize,
}

impl DecodeStats {
    pub fn merge(&mut self, other: DecodeStats) {
        self.decoded += other.decoded;
        self.skipped += other.skipped;
    }
}

/// Split a table into its raw record payloads.
pub fn split_records(data: &[u8]) -> Result<Vec<&[u8]>, Report<CodecError>> {
    let input = &mut &data[..];
    let frame_error = |need: usize| CodecError::DataTooShort {
        what: "record table",
        need,
        have: data.len(),
    };

    let count = le_u32
        .parse_next(input)
        .map_err(|_: ErrMode<ContextError>| frame_error(4))?;

    let mut records = Vec::with_capacity((count as usize).min(data.len() / 4));
    for _ in 0..count {
        let consumed = data.len() - input.len();
        let len = le_u32
            .parse_next(input)
            .map_err(|_: ErrMode<ContextError>| frame_error(consumed + 4))?
            as usize;
        let padded = align4(len);
        let record: &[u8] = take(padded)
            .parse_next(input)
            .map_err(|_: ErrMode<ContextError>| frame_error(consumed + 4 + padded))?;
        records.push(&record[..len]);
    }
    Ok(records)
}

/// Decode every record with `decode_one`, skipping the ones that fail.
pub fn decode_table<T>(
    data: &[u8],
    what: &'static str,
    mut decode_one: impl FnMut(&[u8]) -> Result<T, Report<CodecError>>,
) -> Result<(Vec<T>, DecodeStats), Report<CodecError>> {
    let mut stats = DecodeStats::default();
    let mut out = Vec::new();
    for (index, record) in split_records(data)?.into_iter().enumerate() {
        match decode_one(record) {
            Ok(value) => {
                out.push(value);
                stats.decoded += 1;
            }
            Err(err) => {
                warn!("skipping malformed {what} record {index}: {err}");
                stats.skipped += 1;
            }
        }
    }
    Ok((out, stats))
}

pub fn encode_table<I>(records: I) -> Vec<u8>
where
    I: IntoIterator,
    I::Item: AsRef<[u8]>,
{
    let records: Vec<I::Item> = records.into_iter().collect();
    let mut w = ByteWriter::new();
    w.put_u32(records.len() as u32);
    for record in &records {
        let bytes = record.as_ref();
        w.put_u32(bytes.len() as u32);
        w.put_bytes(bytes);
        w.pad4();
    }
    w.into_inner()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_are_padded_and_split() {
        let table = encode_table([vec![1u8, 2, 3], vec![], vec![4, 5, 6, 7, 8]]);
        assert_eq!(table.len(), 4 + (4 + 4) + 4 + (4 + 8));
        let records = split_records(&table).unwrap();
        assert_eq!(records, vec![&[1u8, 2, 3][..], &[][..], &[4, 5, 6, 7, 8][..]]);
    }

    #[test]
    fn bad_record_is_skipped_not_fatal() {
        let table = encode_table([vec![1u8], vec![2u8, 2], vec![3u8]]);
        let (values, stats) = decode_table(&table, "test", |record| {
            if record.len() == 1 {
                Ok(record[0])
            } else {
                Err(Report::new(CodecError::Malformed {
                    what: "test",
                    detail: "two bytes".to_string(),
                }))
            }
        })
        .unwrap();
        assert_eq!(values, vec![1, 3]);
        assert_eq!(
            stats,
            DecodeStats {
                decoded: 2,
                skipped: 1
            }
        );
    }

    #[test]
    fn broken_frame_fails_the_table() {
        let mut table = encode_table([vec![1u8, 2, 3, 4]]);
        table.truncate(table.len() - 2);
        assert!(split_records(&table).is_err());
    }
}
