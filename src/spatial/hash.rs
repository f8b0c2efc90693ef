//! Default spatial hash and synthesized visibility flags.

use glam::Vec3;

pub const P1: i64 = 73_856_093;
pub const P2: i64 = 19_349_663;
pub const P3: i64 = 83_492_791;

pub const VIS_NEAR: i32 = 0x1;
pub const VIS_MID: i32 = 0x2;
pub const VIS_FAR: i32 = 0x4;
pub const VIS_COMPLEX: i32 = 0x10;

/// Visible in every distance band.
pub const VIS_ALL_BANDS: i32 = VIS_NEAR | VIS_MID | VIS_FAR;

/// `((x*P1) ^ (y*P2) ^ (z*P3)) & 0x7FFFFFFF` over the grid cell containing
/// `position`.
pub fn spatial_hash(position: Vec3, cell_size: f32) -> i32 {
    let cell = if cell_size > 0.0 { cell_size } else { 1.0 };
    let x = (position.x / cell).floor() as i64;
    let y = (position.y / cell).floor() as i64;
    let z = (position.z / cell).floor() as i64;
    ((x.wrapping_mul(P1) ^ y.wrapping_mul(P2) ^ z.wrapping_mul(P3)) & 0x7FFF_FFFF) as i32
}

/// Distance band from the origin, plus the complexity bit for heavy models.
pub fn visibility_flags(
    position: Vec3,
    vertex_count: usize,
    near_band: f32,
    mid_band: f32,
    complex_vertex_threshold: usize,
) -> i32 {
    let distance = position.length();
    let band = if distance <= near_band {
        VIS_NEAR
    } else if distance <= mid_band {
        VIS_MID
    } else {
        VIS_FAR
    };
    if vertex_count >= complex_vertex_threshold {
        band | VIS_COMPLEX
    } else {
        band
    }
}
