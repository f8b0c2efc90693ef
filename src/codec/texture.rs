//! Texture records: a 0x10 byte header followed by the pixel bytes.
//!
//! The layout is identical in every generation.

use rootcause::Report;
use winnow::Parser;
use winnow::binary::{le_i32, le_u8, le_u16, le_u32};
use winnow::token::take;

use super::CodecError;
use crate::data::parser_utils::{ByteWriter, WResult};
use crate::level::Texture;

pub const TEXTURE_HEADER_SIZE: usize = 0x10;

struct TextureHeader {
    width: u16,
    height: u16,
    format: u8,
    mip_count: u8,
    flags: u16,
    palette_id: i32,
    data_len: u32,
}

fn parse_texture_header(input: &mut &[u8]) -> WResult<TextureHeader> {
    let width = le_u16.parse_next(input)?;
    let height = le_u16.parse_next(input)?;
    let format = le_u8.parse_next(input)?;
    let mip_count = le_u8.parse_next(input)?;
    let flags = le_u16.parse_next(input)?;
    let palette_id = le_i32.parse_next(input)?;
    let data_len = le_u32.parse_next(input)?;
    Ok(TextureHeader {
        width,
        height,
        format,
        mip_count,
        flags,
        palette_id,
        data_len,
    })
}

pub fn decode_texture(data: &[u8]) -> Result<(Texture, usize), Report<CodecError>> {
    let input = &mut &data[..];
    let header = parse_texture_header(input).map_err(|_| CodecError::DataTooShort {
        what: "texture header",
        need: TEXTURE_HEADER_SIZE,
        have: data.len(),
    })?;
    let need = TEXTURE_HEADER_SIZE + header.data_len as usize;
    let pixels = take(header.data_len as usize)
        .parse_next(input)
        .map_err(|_: winnow::error::ErrMode<winnow::error::ContextError>| {
            CodecError::DataTooShort {
                what: "texture pixels",
                need,
                have: data.len(),
            }
        })?;

    Ok((
        Texture {
            width: header.width,
            height: header.height,
            data: pixels.to_vec(),
            format: header.format,
            mip_count: header.mip_count,
            flags: header.flags,
            palette_id: header.palette_id,
        },
        need,
    ))
}

pub fn encode_texture(texture: &Texture) -> Vec<u8> {
    let mut w = ByteWriter::with_capacity(TEXTURE_HEADER_SIZE + texture.data.len());
    w.put_u16(texture.width);
    w.put_u16(texture.height);
    w.put_u8(texture.format);
    w.put_u8(texture.mip_count);
    w.put_u16(texture.flags);
    w.put_i32(texture.palette_id);
    w.put_u32(texture.data.len() as u32);
    w.put_bytes(&texture.data);
    w.into_inner()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_is_sixteen_bytes() {
        let tex = Texture::new(64, 64, vec![0xAB; 64 * 64]);
        let bytes = encode_texture(&tex);
        assert_eq!(bytes.len(), TEXTURE_HEADER_SIZE + 4096);
        assert_eq!(&bytes[0..2], &64u16.to_le_bytes());
        assert_eq!(&bytes[12..16], &4096u32.to_le_bytes());
        let (decoded, used) = decode_texture(&bytes).unwrap();
        assert_eq!(used, bytes.len());
        assert_eq!(decoded, tex);
    }

    #[test]
    fn missing_pixels_are_an_error() {
        let bytes = encode_texture(&Texture::new(2, 2, vec![1, 2, 3, 4]));
        assert!(decode_texture(&bytes[..bytes.len() - 2]).is_err());
    }
}
