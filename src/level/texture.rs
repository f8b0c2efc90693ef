/// A texture table entry. Its id is its position in the level's table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Texture {
    pub width: u16,
    pub height: u16,
    pub data: Vec<u8>,
    /// Opaque compatibility fields, see [`TEXTURE_COMPAT_FIELDS`].
    pub format: u8,
    pub mip_count: u8,
    pub flags: u16,
    pub palette_id: i32,
}

/// Texture properties the merger copies verbatim when cloning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureCompatField {
    Format,
    MipCount,
    Flags,
    PaletteId,
}

pub const TEXTURE_COMPAT_FIELDS: &[TextureCompatField] = &[
    TextureCompatField::Format,
    TextureCompatField::MipCount,
    TextureCompatField::Flags,
    TextureCompatField::PaletteId,
];

impl Texture {
    pub fn new(width: u16, height: u16, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            data,
            format: 0,
            mip_count: 1,
            flags: 0,
            palette_id: -1,
        }
    }

    /// Duplicate test: dimensions, byte length and byte content.
    pub fn is_duplicate_of(&self, other: &Texture) -> bool {
        self.width == other.width
            && self.height == other.height
            && self.data.len() == other.data.len()
            && self.data == other.data
    }

    /// Independent copy: pixel data plus the compatibility fields.
    pub fn deep_clone(&self) -> Texture {
        let mut out = Texture::new(self.width, self.height, self.data.clone());
        for field in TEXTURE_COMPAT_FIELDS {
            match field {
                TextureCompatField::Format => out.format = self.format,
                TextureCompatField::MipCount => out.mip_count = self.mip_count,
                TextureCompatField::Flags => out.flags = self.flags,
                TextureCompatField::PaletteId => out.palette_id = self.palette_id,
            }
        }
        out
    }
}
