//! Mip chain generation that never blends across subsection boundaries.
//!
//! As long as a mip still has at least one quad per subsection, every subsection is resampled on
//! its own: the corners of a subsection map exactly onto the corners of its lower resolution
//! version and the texels in between are interpolated bilinearly from the previous mip.
//! Coarser mips are plain 2x2 box filters of the whole texture.

use crate::{
    geometry::TileGeometry,
    heightmap::{decode_height, set_height},
    region::{merge, TexelRect},
    texture::{ChannelMask, LandscapeTexture, Texel},
};
use bevy::math::IVec2;
use itertools::iproduct;

/// The channels a mip update touches.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MipChannels {
    /// R,G hold a 16-bit height, that is filtered as one value. B,A are filtered per byte.
    Height,
    /// Only the given channels are filtered, all others are left untouched.
    Weight(ChannelMask),
}

impl MipChannels {
    /// Blends `samples` with integer weights, rounding to nearest.
    fn blend(self, samples: [Texel; 4], weights: [u64; 4], destination: &mut Texel) {
        let total: u64 = weights.iter().sum();
        let blend = |value: &dyn Fn(Texel) -> u64| {
            let sum: u64 = samples
                .iter()
                .zip(weights)
                .map(|(&sample, weight)| value(sample) * weight)
                .sum();
            (sum + total / 2) / total
        };

        match self {
            MipChannels::Height => {
                set_height(destination, blend(&|texel| decode_height(texel) as u64) as u16);
                destination[2] = blend(&|texel| texel[2] as u64) as u8;
                destination[3] = blend(&|texel| texel[3] as u64) as u8;
            }
            MipChannels::Weight(mask) => {
                for channel in mask.channels() {
                    destination[channel] = blend(&|texel| texel[channel] as u64) as u8;
                }
            }
        }
    }
}

/// Regenerates the mips of height- and weightmaps from mip 0.
#[derive(Copy, Clone, Debug)]
pub struct MipGenerator {
    geometry: TileGeometry,
}

impl MipGenerator {
    pub fn new(geometry: TileGeometry) -> Self {
        Self { geometry }
    }

    /// Regenerates the whole mip chain.
    pub fn generate_all(
        &self,
        texture: &mut LandscapeTexture,
        channels: MipChannels,
    ) -> Vec<(u32, TexelRect)> {
        self.generate(texture, TexelRect::square(texture.size()), channels)
    }

    /// Updates all mips affected by a change of `region` (mip 0 texels).
    ///
    /// Returns the rectangle that was written for every mip and marks it dirty on the texture.
    pub fn generate(
        &self,
        texture: &mut LandscapeTexture,
        region: TexelRect,
        channels: MipChannels,
    ) -> Vec<(u32, TexelRect)> {
        let Some(mut region) = region.clamp_to(texture.size()) else {
            return Vec::new();
        };

        let max_whole_subsection_mip = self.geometry.max_whole_subsection_mip();
        let mut regions = Vec::new();

        for mip in 1..texture.mip_count() {
            let updated = if mip <= max_whole_subsection_mip {
                self.resample_subsections(texture, mip, region, channels)
            } else {
                Self::box_filter(texture, mip, region, channels)
            };

            let Some(updated) = updated else {
                break;
            };

            texture.mark_dirty(mip, updated);
            regions.push((mip, updated));
            region = updated;
        }

        regions
    }

    fn resample_subsections(
        &self,
        texture: &mut LandscapeTexture,
        mip: u32,
        region: TexelRect,
        channels: MipChannels,
    ) -> Option<TexelRect> {
        let previous_verts = self.geometry.mip_subsection_size_verts(mip - 1) as i32;
        let previous_quads = previous_verts - 1;
        let verts = self.geometry.mip_subsection_size_verts(mip) as i32;
        let quads = verts - 1;

        let previous_size = texture.mip_size(mip - 1);
        let size = texture.mip_size(mip);
        let (previous, current) = texture.mip_pair_mut(mip);

        let mut updated = None;

        let subsections = self.geometry.num_subsections;

        for (sub_y, sub_x) in iproduct!(0..subsections, 0..subsections) {
            let subsection = IVec2::new(sub_x as i32, sub_y as i32);
            let previous_base = subsection * previous_verts;
            let base = subsection * verts;

            let bounds = TexelRect {
                min: previous_base,
                max: previous_base + previous_quads,
            };
            let Some(local) = region.intersect(&bounds) else {
                continue;
            };
            let local = local.offset(-previous_base);

            // Every destination texel, whose 2x2 source footprint overlaps the dirty region.
            let lower = |v: i32| ((v - 1).max(0) * quads).div_euclid(previous_quads);
            let upper = |v: i32| {
                ((v + 1) * quads + previous_quads - 1)
                    .div_euclid(previous_quads)
                    .min(quads)
            };
            let destination = TexelRect::new(
                lower(local.min.x),
                lower(local.min.y),
                upper(local.max.x),
                upper(local.max.y),
            );

            for point in destination.iter() {
                let point = point.as_ivec2();
                let scaled = point * previous_quads;
                let source = scaled / quads;
                let (fraction_x, fraction_y) = ((scaled.x % quads) as u64, (scaled.y % quads) as u64);
                let next = (source + 1).min(IVec2::splat(previous_quads));

                let sample = |x: i32, y: i32| {
                    let texel = previous_base + IVec2::new(x, y);
                    previous[(texel.y as u32 * previous_size + texel.x as u32) as usize]
                };

                let q = quads as u64;
                let samples = [
                    sample(source.x, source.y),
                    sample(next.x, source.y),
                    sample(source.x, next.y),
                    sample(next.x, next.y),
                ];
                let weights = [
                    (q - fraction_x) * (q - fraction_y),
                    fraction_x * (q - fraction_y),
                    (q - fraction_x) * fraction_y,
                    fraction_x * fraction_y,
                ];

                let texel = base + point;
                let index = (texel.y as u32 * size + texel.x as u32) as usize;
                channels.blend(samples, weights, &mut current[index]);
            }

            merge(&mut updated, destination.offset(base));
        }

        updated
    }

    fn box_filter(
        texture: &mut LandscapeTexture,
        mip: u32,
        region: TexelRect,
        channels: MipChannels,
    ) -> Option<TexelRect> {
        let previous_size = texture.mip_size(mip - 1);
        let size = texture.mip_size(mip);
        let (previous, current) = texture.mip_pair_mut(mip);

        let destination = TexelRect {
            min: region.min / 2,
            max: region.max / 2,
        }
        .clamp_to(size)?;

        for point in destination.iter() {
            let sample = |dx: u32, dy: u32| {
                previous[((point.y * 2 + dy) * previous_size + point.x * 2 + dx) as usize]
            };

            channels.blend(
                [sample(0, 0), sample(1, 0), sample(0, 1), sample(1, 1)],
                [1; 4],
                &mut current[(point.y * size + point.x) as usize],
            );
        }

        Some(destination)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        heightmap::encode_height,
        texture::{TextureKind, TextureState},
    };

    fn weightmap(size: u32, value: impl Fn(u32, u32) -> u8) -> LandscapeTexture {
        let mut texture = LandscapeTexture::new(TextureKind::Weightmap, size, TextureState::Ready);
        for (x, y) in iproduct!(0..size, 0..size) {
            texture.set_channel(0, x, y, 0, value(x, y));
        }
        texture
    }

    fn heightmap(size: u32, height: impl Fn(u32, u32) -> u16) -> LandscapeTexture {
        let mut texture = LandscapeTexture::new(TextureKind::Heightmap, size, TextureState::Ready);
        for (x, y) in iproduct!(0..size, 0..size) {
            texture.set_texel(0, x, y, encode_height(height(x, y), [128, 128]));
        }
        texture
    }

    #[test]
    fn subsections_never_blend() {
        let geometry = TileGeometry::new(2, 7).unwrap();
        let generator = MipGenerator::new(geometry);

        let pattern = |x: u32, y: u32| (x * 3000 + y * 500) as u16;
        let mut first = heightmap(16, |x, y| if x < 8 { pattern(x, y) } else { 60000 });
        let mut second = heightmap(16, |x, y| if x < 8 { pattern(x, y) } else { 7 });

        generator.generate_all(&mut first, MipChannels::Height);
        generator.generate_all(&mut second, MipChannels::Height);

        for mip in 1..=geometry.max_whole_subsection_mip() {
            let verts = geometry.mip_subsection_size_verts(mip);
            for (x, y) in iproduct!(0..verts, 0..geometry.mip_size(mip)) {
                assert_eq!(
                    first.texel(mip, x, y),
                    second.texel(mip, x, y),
                    "mip {mip} texel ({x}, {y}) was blended with its neighbour"
                );
            }
            for (x, y) in iproduct!(verts..2 * verts, 0..geometry.mip_size(mip)) {
                assert_eq!(decode_height(first.texel(mip, x, y)), 60000);
            }
        }
    }

    #[test]
    fn subsection_corners_are_preserved() {
        let geometry = TileGeometry::new(1, 7).unwrap();
        let mut texture = weightmap(8, |x, y| (x * 30 + y) as u8);

        MipGenerator::new(geometry).generate_all(&mut texture, MipChannels::Weight(ChannelMask::R));

        assert_eq!(texture.channel(1, 0, 0, 0), 0);
        assert_eq!(texture.channel(1, 3, 0, 0), 210);
        assert_eq!(texture.channel(1, 3, 3, 0), 217);
        assert_eq!(texture.channel(2, 1, 1, 0), 217);
    }

    #[test]
    fn regeneration_is_idempotent() {
        let geometry = TileGeometry::new(2, 15).unwrap();
        let generator = MipGenerator::new(geometry);
        let mut texture = weightmap(32, |x, y| ((x * 7 + y * 13) % 256) as u8);

        generator.generate_all(&mut texture, MipChannels::Weight(ChannelMask::R));
        let mips = (1..texture.mip_count())
            .map(|mip| texture.mip(mip).to_vec())
            .collect::<Vec<_>>();

        generator.generate_all(&mut texture, MipChannels::Weight(ChannelMask::R));

        for mip in 1..texture.mip_count() {
            assert_eq!(texture.mip(mip), mips[mip as usize - 1].as_slice());
        }
    }

    #[test]
    fn coarse_mips_are_box_filtered() {
        let geometry = TileGeometry::new(1, 7).unwrap();
        let mut texture = weightmap(8, |x, y| (x * 20 + y * 10) as u8);

        MipGenerator::new(geometry).generate_all(&mut texture, MipChannels::Weight(ChannelMask::R));

        let sum: u32 = iproduct!(0..2, 0..2)
            .map(|(x, y)| texture.channel(2, x, y, 0) as u32)
            .sum();
        assert_eq!(texture.channel(3, 0, 0, 0) as u32, (sum + 2) / 4);
    }

    #[test]
    fn unmasked_channels_are_untouched() {
        let geometry = TileGeometry::new(1, 7).unwrap();
        let mut texture = LandscapeTexture::new(TextureKind::Weightmap, 8, TextureState::Ready);
        texture.fill([0, 99, 0, 0]);
        for (x, y) in iproduct!(0..8, 0..8) {
            texture.set_channel(0, x, y, 0, 200);
            texture.set_channel(0, x, y, 1, 0);
        }

        MipGenerator::new(geometry).generate_all(&mut texture, MipChannels::Weight(ChannelMask::R));

        for mip in 1..texture.mip_count() {
            assert!(texture.mip(mip).iter().all(|&texel| texel == [200, 99, 0, 0]));
        }
    }

    #[test]
    fn partial_update_matches_full_regeneration() {
        let geometry = TileGeometry::new(2, 7).unwrap();
        let generator = MipGenerator::new(geometry);
        let value = |x: u32, y: u32| ((x * 11 + y * 17) % 256) as u8;

        let mut partial = weightmap(16, value);
        generator.generate_all(&mut partial, MipChannels::Weight(ChannelMask::R));
        for (x, y) in iproduct!(4..6, 9..11) {
            partial.set_channel(0, x, y, 0, 255);
        }
        let regions = generator.generate(
            &mut partial,
            TexelRect::new(4, 9, 5, 10),
            MipChannels::Weight(ChannelMask::R),
        );

        let mut full = weightmap(16, |x, y| {
            if (4..6).contains(&x) && (9..11).contains(&y) {
                255
            } else {
                value(x, y)
            }
        });
        generator.generate_all(&mut full, MipChannels::Weight(ChannelMask::R));

        assert_eq!(regions.len(), 4);
        for mip in 1..full.mip_count() {
            assert_eq!(partial.mip(mip), full.mip(mip), "mip {mip} differs");
        }
    }
}
