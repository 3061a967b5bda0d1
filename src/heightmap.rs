//! Packing of heights and normals into heightmap texels.
//!
//! R and G store the high and low byte of a 16-bit height, B and A the x and y components of
//! the surface normal, mapped from `-1..=1` to `0..=255`.

use crate::{
    geometry::TileGeometry,
    region::TexelRect,
    texture::{LandscapeTexture, Texel},
};
use bevy::math::{IVec2, Vec3};

/// The height that represents zero.
pub const MID_HEIGHT: u16 = 32768;

/// A flat surface at zero height.
pub const FLAT_TEXEL: Texel = encode_height(MID_HEIGHT, [128, 128]);

#[inline]
pub const fn encode_height(height: u16, normal: [u8; 2]) -> Texel {
    [(height >> 8) as u8, (height & 0xFF) as u8, normal[0], normal[1]]
}

#[inline]
pub const fn decode_height(texel: Texel) -> u16 {
    ((texel[0] as u16) << 8) | texel[1] as u16
}

#[inline]
pub fn set_height(texel: &mut Texel, height: u16) {
    texel[0] = (height >> 8) as u8;
    texel[1] = (height & 0xFF) as u8;
}

pub fn encode_normal(normal: Vec3) -> [u8; 2] {
    let pack = |value: f32| (value * 127.5 + 127.5).round().clamp(0.0, 255.0) as u8;
    [pack(normal.x), pack(normal.y)]
}

pub fn decode_normal(texel: Texel) -> Vec3 {
    let unpack = |value: u8| value as f32 / 127.5 - 1.0;
    let x = unpack(texel[2]);
    let y = unpack(texel[3]);
    Vec3::new(x, y, (1.0 - x * x - y * y).max(0.0).sqrt())
}

/// Reads the mip 0 height of a vertex.
pub fn vertex_height(texture: &LandscapeTexture, geometry: TileGeometry, vertex: IVec2) -> u16 {
    let (x, _) = geometry.vertex_to_texels(vertex.x as u32);
    let (y, _) = geometry.vertex_to_texels(vertex.y as u32);
    decode_height(texture.texel(0, x, y))
}

/// Recomputes the packed normals of all vertices in `region` (vertex space) from the mip 0
/// heights, using central differences.
/// `z_scale` converts one height step into quad units (`height_scale / quad_scale`).
pub fn update_normals(
    texture: &mut LandscapeTexture,
    geometry: TileGeometry,
    region: TexelRect,
    z_scale: f32,
) {
    let max = geometry.component_size_quads() as i32;

    let normals: Vec<(IVec2, [u8; 2])> = region
        .iter()
        .map(|vertex| {
            let vertex = vertex.as_ivec2();
            let height = |offset: IVec2| {
                let sample = (vertex + offset).clamp(IVec2::ZERO, IVec2::splat(max));
                vertex_height(texture, geometry, sample) as f32
            };

            let dx = (height(IVec2::X) - height(IVec2::NEG_X)) * z_scale;
            let dy = (height(IVec2::Y) - height(IVec2::NEG_Y)) * z_scale;
            let normal = Vec3::new(-dx, -dy, 2.0).normalize();

            (vertex, encode_normal(normal))
        })
        .collect();

    for (vertex, normal) in normals {
        let (x1, x2) = geometry.vertex_to_texels(vertex.x as u32);
        let (y1, y2) = geometry.vertex_to_texels(vertex.y as u32);

        for (x, y) in [(x1, y1), (x2, y1), (x1, y2), (x2, y2)] {
            let mut texel = texture.texel(0, x, y);
            texel[2] = normal[0];
            texel[3] = normal[1];
            texture.set_texel(0, x, y, texel);
        }
    }
}
