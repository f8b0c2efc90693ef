//! Shared winnow parsers and little-endian writers used by every record codec.

use glam::{Mat4, Vec3, Vec4};
use thiserror::Error;
use winnow::Parser;
use winnow::binary::{le_f32, le_i32, le_u8};
use winnow::combinator::repeat;
use winnow::error::ContextError;

use crate::level_types::Rgb;

/// Common result type for winnow parsers.
pub type WResult<T> = Result<T, winnow::error::ErrMode<ContextError>>;

/// Errors that can occur during shared parsing operations.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("data too short: need {need} bytes at offset 0x{offset:X}, have {have}")]
    DataTooShort {
        offset: usize,
        need: usize,
        have: usize,
    },
    #[error("winnow parse error at 0x{offset:X}: {detail}")]
    WinnowError { offset: usize, detail: String },
}

/// Check that `data[offset..offset + need]` exists.
pub fn ensure_len(data: &[u8], offset: usize, need: usize) -> Result<(), ParseError> {
    match offset.checked_add(need) {
        Some(end) if end <= data.len() => Ok(()),
        _ => Err(ParseError::DataTooShort {
            offset,
            need,
            have: data.len(),
        }),
    }
}

/// Run `parser` against `data` starting at `offset`.
pub fn parse_at<T>(
    data: &[u8],
    offset: usize,
    mut parser: impl FnMut(&mut &[u8]) -> WResult<T>,
) -> Result<T, ParseError> {
    let mut input = data.get(offset..).ok_or(ParseError::DataTooShort {
        offset,
        need: 1,
        have: data.len(),
    })?;
    parser(&mut input).map_err(|e| ParseError::WinnowError {
        offset,
        detail: format!("{e}"),
    })
}

pub fn parse_vec3(input: &mut &[u8]) -> WResult<Vec3> {
    let x = le_f32.parse_next(input)?;
    let y = le_f32.parse_next(input)?;
    let z = le_f32.parse_next(input)?;
    Ok(Vec3::new(x, y, z))
}

pub fn parse_vec4(input: &mut &[u8]) -> WResult<Vec4> {
    let x = le_f32.parse_next(input)?;
    let y = le_f32.parse_next(input)?;
    let z = le_f32.parse_next(input)?;
    let w = le_f32.parse_next(input)?;
    Ok(Vec4::new(x, y, z, w))
}

/// Column-major 4x4 matrix, translation in the last column.
pub fn parse_mat4(input: &mut &[u8]) -> WResult<Mat4> {
    let cols: Vec<f32> = repeat(16, le_f32).parse_next(input)?;
    let mut array = [0f32; 16];
    array.copy_from_slice(&cols);
    Ok(Mat4::from_cols_array(&array))
}

/// Three color bytes followed by one pad byte.
pub fn parse_rgb(input: &mut &[u8]) -> WResult<Rgb> {
    let r = le_u8.parse_next(input)?;
    let g = le_u8.parse_next(input)?;
    let b = le_u8.parse_next(input)?;
    let _pad = le_u8.parse_next(input)?;
    Ok(Rgb { r, g, b })
}

/// Signed index where `-1` means "none".
pub fn parse_optional_index(input: &mut &[u8]) -> WResult<Option<u32>> {
    let raw = le_i32.parse_next(input)?;
    Ok(u32::try_from(raw).ok())
}

pub fn align4(len: usize) -> usize {
    (len + 3) & !3
}

/// Little-endian byte sink used by the encoders.
#[derive(Debug, Default)]
pub struct ByteWriter {
    buf: Vec<u8>,
}

impl ByteWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn put_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn put_u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn put_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn put_i32(&mut self, v: i32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn put_f32(&mut self, v: f32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn put_vec3(&mut self, v: Vec3) {
        self.put_f32(v.x);
        self.put_f32(v.y);
        self.put_f32(v.z);
    }

    pub fn put_vec4(&mut self, v: Vec4) {
        self.put_f32(v.x);
        self.put_f32(v.y);
        self.put_f32(v.z);
        self.put_f32(v.w);
    }

    pub fn put_mat4(&mut self, m: &Mat4) {
        for v in m.to_cols_array() {
            self.put_f32(v);
        }
    }

    pub fn put_rgb(&mut self, c: Rgb) {
        self.buf.extend_from_slice(&c.to_bytes());
    }

    pub fn put_optional_index(&mut self, v: Option<u32>) {
        self.put_i32(v.map(|v| v as i32).unwrap_or(-1));
    }

    pub fn put_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Zero-fill up to the next multiple of four.
    pub fn pad4(&mut self) {
        let target = align4(self.buf.len());
        self.buf.resize(target, 0);
    }

    /// Zero-fill up to exactly `len` bytes. Never truncates.
    pub fn pad_to(&mut self, len: usize) {
        if self.buf.len() < len {
            self.buf.resize(len, 0);
        }
    }

    /// Overwrite bytes at `offset`, growing the buffer with zeros when needed.
    pub fn patch(&mut self, offset: usize, bytes: &[u8]) {
        let end = offset + bytes.len();
        if self.buf.len() < end {
            self.buf.resize(end, 0);
        }
        self.buf[offset..end].copy_from_slice(bytes);
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mat4_is_column_major() {
        let m = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));
        let mut w = ByteWriter::new();
        w.put_mat4(&m);
        let bytes = w.into_inner();
        assert_eq!(bytes.len(), 64);
        // Translation lives in the last column: floats 12, 13, 14.
        assert_eq!(f32::from_le_bytes(bytes[48..52].try_into().unwrap()), 1.0);
        let parsed = parse_at(&bytes, 0, parse_mat4).unwrap();
        assert_eq!(parsed, m);
    }

    #[test]
    fn optional_index_sentinel() {
        let bytes = (-1i32).to_le_bytes();
        assert_eq!(parse_at(&bytes, 0, parse_optional_index).unwrap(), None);
        let bytes = 7i32.to_le_bytes();
        assert_eq!(parse_at(&bytes, 0, parse_optional_index).unwrap(), Some(7));
    }

    #[test]
    fn ensure_len_reports_shortfall() {
        let data = [0u8; 8];
        assert!(ensure_len(&data, 4, 4).is_ok());
        assert!(matches!(
            ensure_len(&data, 6, 4),
            Err(ParseError::DataTooShort {
                offset: 6,
                need: 4,
                have: 8
            })
        ));
    }

    #[test]
    fn patch_grows_buffer() {
        let mut w = ByteWriter::new();
        w.put_u32(1);
        w.patch(8, &[0xAA, 0xBB]);
        let bytes = w.into_inner();
        assert_eq!(bytes.len(), 10);
        assert_eq!(&bytes[4..8], &[0, 0, 0, 0]);
        assert_eq!(&bytes[8..], &[0xAA, 0xBB]);
    }
}
