//! The static layout of a single landscape tile.
//!
//! A tile is split into `num_subsections` x `num_subsections` independently tessellated
//! subsections. Each subsection owns `subsection_size_quads + 1` texels per side, which means that
//! vertices on a boundary between two subsections are stored twice in every texture.
//! Tile edits are addressed in *vertex space* (`0..=component_size_quads`), while textures are
//! addressed in *texel space* (`0..verts_per_side`).

use crate::{
    error::{LandscapeError, LandscapeResult},
    region::TexelRect,
};
use bevy::math::IVec2;
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileGeometry {
    pub num_subsections: u32,
    pub subsection_size_quads: u32,
}

impl TileGeometry {
    pub fn new(num_subsections: u32, subsection_size_quads: u32) -> LandscapeResult<Self> {
        if !(1..=2).contains(&num_subsections) {
            return Err(LandscapeError::InvalidSubsectionCount(num_subsections));
        }

        if !(1..=255).contains(&subsection_size_quads)
            || !(subsection_size_quads + 1).is_power_of_two()
        {
            return Err(LandscapeError::InvalidSubsectionSize(subsection_size_quads));
        }

        Ok(Self {
            num_subsections,
            subsection_size_quads,
        })
    }

    #[inline]
    pub fn component_size_quads(self) -> u32 {
        self.num_subsections * self.subsection_size_quads
    }

    #[inline]
    pub fn subsection_size_verts(self) -> u32 {
        self.subsection_size_quads + 1
    }

    #[inline]
    pub fn verts_per_side(self) -> u32 {
        self.num_subsections * self.subsection_size_verts()
    }

    /// The side length of height- and weightmap textures, always a power of two.
    #[inline]
    pub fn texture_size(self) -> u32 {
        self.verts_per_side()
    }

    /// The number of mips down to and including the 1x1 mip.
    pub fn mip_count(self) -> u32 {
        self.texture_size().ilog2() + 1
    }

    pub fn mip_size(self, mip: u32) -> u32 {
        (self.texture_size() >> mip).max(1)
    }

    pub fn mip_subsection_size_verts(self, mip: u32) -> u32 {
        self.subsection_size_verts() >> mip
    }

    pub fn mip_subsection_size_quads(self, mip: u32) -> u32 {
        self.mip_subsection_size_verts(mip).saturating_sub(1)
    }

    /// The last mip, that still contains at least one quad per subsection.
    /// All coarser mips are box filtered over the whole texture.
    pub fn max_whole_subsection_mip(self) -> u32 {
        self.subsection_size_verts().ilog2() - 1
    }

    pub fn max_collision_mip(self) -> u32 {
        self.max_whole_subsection_mip()
    }

    pub fn collision_size_quads(self, collision_mip: u32) -> u32 {
        self.num_subsections * self.mip_subsection_size_quads(collision_mip)
    }

    pub fn collision_size_verts(self, collision_mip: u32) -> u32 {
        self.collision_size_quads(collision_mip) + 1
    }

    /// Returns the first and the last texel storing the vertex along one axis.
    /// Both are equal, unless the vertex lies on a boundary between two subsections.
    pub fn vertex_to_texels(self, vertex: u32) -> (u32, u32) {
        let quads = self.subsection_size_quads;
        let subsection = (vertex / quads).min(self.num_subsections - 1);
        let texel = subsection * self.subsection_size_verts() + vertex - subsection * quads;

        if vertex % quads == 0 && vertex > 0 && vertex / quads < self.num_subsections {
            let previous = (vertex / quads - 1) * self.subsection_size_verts() + quads;
            (previous, texel)
        } else {
            (texel, texel)
        }
    }

    /// The vertex stored at a mip 0 texel along one axis.
    pub fn texel_to_vertex(self, texel: u32) -> u32 {
        let verts = self.subsection_size_verts();
        (texel / verts) * self.subsection_size_quads + texel % verts
    }

    /// The texel rectangle that stores every copy of the vertices in `region`.
    pub fn vertex_rect_to_texels(self, region: TexelRect) -> TexelRect {
        let (min_x, _) = self.vertex_to_texels(region.min.x as u32);
        let (min_y, _) = self.vertex_to_texels(region.min.y as u32);
        let (_, max_x) = self.vertex_to_texels(region.max.x as u32);
        let (_, max_y) = self.vertex_to_texels(region.max.y as u32);

        TexelRect::new(min_x as i32, min_y as i32, max_x as i32, max_y as i32)
    }

    /// The full vertex range of a tile.
    pub fn vertex_rect(self) -> TexelRect {
        let max = self.component_size_quads() as i32;
        TexelRect {
            min: IVec2::ZERO,
            max: IVec2::splat(max),
        }
    }

    /// Maps a vertex space region onto the collision grid of `collision_mip`, conservatively
    /// including every collision vertex whose source texels may have changed.
    pub fn vertex_rect_to_collision(self, region: TexelRect, collision_mip: u32) -> TexelRect {
        let quads = self.subsection_size_quads as i32;
        let collision_quads = self.mip_subsection_size_quads(collision_mip) as i32;
        let max = self.collision_size_quads(collision_mip) as i32;

        let lower = |v: i32| ((v * collision_quads).div_euclid(quads) - 1).clamp(0, max);
        let upper = |v: i32| ((v * collision_quads + quads - 1).div_euclid(quads) + 1).clamp(0, max);

        TexelRect::new(
            lower(region.min.x),
            lower(region.min.y),
            upper(region.max.x),
            upper(region.max.y),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_invalid_layouts() {
        assert!(matches!(
            TileGeometry::new(3, 7),
            Err(LandscapeError::InvalidSubsectionCount(3))
        ));
        assert!(matches!(
            TileGeometry::new(1, 8),
            Err(LandscapeError::InvalidSubsectionSize(8))
        ));
        assert!(TileGeometry::new(2, 63).is_ok());
    }

    #[test]
    fn derived_sizes() {
        let geometry = TileGeometry::new(1, 7).unwrap();

        assert_eq!(geometry.component_size_quads(), 7);
        assert_eq!(geometry.verts_per_side(), 8);
        assert_eq!(geometry.mip_count(), 4);
        assert_eq!(geometry.max_whole_subsection_mip(), 2);
        assert_eq!(geometry.mip_subsection_size_quads(1), 3);
        assert_eq!(geometry.mip_subsection_size_quads(2), 1);
        assert_eq!(geometry.collision_size_verts(1), 4);

        let geometry = TileGeometry::new(2, 7).unwrap();

        assert_eq!(geometry.component_size_quads(), 14);
        assert_eq!(geometry.verts_per_side(), 16);
        assert_eq!(geometry.mip_count(), 5);
        assert_eq!(geometry.mip_size(3), 2);
        assert_eq!(geometry.collision_size_verts(0), 15);
    }

    #[test]
    fn boundary_vertices_map_to_two_texels() {
        let geometry = TileGeometry::new(2, 7).unwrap();

        assert_eq!(geometry.vertex_to_texels(0), (0, 0));
        assert_eq!(geometry.vertex_to_texels(6), (6, 6));
        assert_eq!(geometry.vertex_to_texels(7), (7, 8));
        assert_eq!(geometry.vertex_to_texels(8), (9, 9));
        assert_eq!(geometry.vertex_to_texels(14), (15, 15));

        for texel in 0..16 {
            let (first, last) = geometry.vertex_to_texels(geometry.texel_to_vertex(texel));
            assert!(first == texel || last == texel);
        }
    }
}
