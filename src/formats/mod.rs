//! Import of authored heights and weights, and PNG export of texture mips and collision.
//!
//! Heightmaps are 16-bit grayscale images, either TIFF or PNG. Weight masks are 8-bit grayscale
//! PNGs, one per layer. Both are stored as a [`SampleGrid`] covering the whole landscape, from
//! which the vertices of a single tile are cut out.

mod png;
mod tiff;

pub use self::{
    png::{
        decode_png_heights, decode_png_weights, encode_collision_png, encode_texture_mip_png,
        save_collision_png, save_texture_mip_png,
    },
    tiff::decode_tiff_heights,
};

use crate::{error::LandscapeResult, region::TexelRect};
use bevy::math::{IVec2, UVec2};
use ndarray::Array2;
use std::{fs, path::Path};

/// A grid of samples indexed `[[y, x]]`.
#[derive(Clone, Debug, PartialEq)]
pub struct SampleGrid<T> {
    samples: Array2<T>,
}

pub type HeightField = SampleGrid<u16>;
pub type WeightField = SampleGrid<u8>;

impl<T: Copy> SampleGrid<T> {
    pub fn new(samples: Array2<T>) -> Self {
        Self { samples }
    }

    pub fn size(&self) -> UVec2 {
        let (height, width) = self.samples.dim();
        UVec2::new(width as u32, height as u32)
    }

    pub fn samples(&self) -> &Array2<T> {
        &self.samples
    }

    /// The sample at a position, clamped to the edge of the grid.
    pub fn sample_clamped(&self, position: IVec2) -> T {
        let max = self.size().as_ivec2() - 1;
        let position = position.clamp(IVec2::ZERO, max);
        self.samples[[position.y as usize, position.x as usize]]
    }

    /// Cuts out `region`, row by row, clamping positions outside of the grid to its edge.
    pub fn region(&self, region: TexelRect) -> Vec<T> {
        region
            .iter()
            .map(|position| self.sample_clamped(position.as_ivec2()))
            .collect()
    }
}

impl HeightField {
    /// Loads a 16-bit heightmap, the format is picked by the file extension.
    pub fn load_file<P: AsRef<Path>>(path: P) -> LandscapeResult<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path)?;

        match extension(path).as_deref() {
            Some("tif" | "tiff") => decode_tiff_heights(&bytes),
            _ => decode_png_heights(&bytes),
        }
    }
}

impl WeightField {
    pub fn load_file<P: AsRef<Path>>(path: P) -> LandscapeResult<Self> {
        decode_png_weights(&fs::read(path)?)
    }

    /// Whether any sample in `region` carries weight.
    pub fn has_weight_in(&self, region: TexelRect) -> bool {
        region
            .iter()
            .any(|position| self.sample_clamped(position.as_ivec2()) > 0)
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|extension| extension.to_str())
        .map(str::to_ascii_lowercase)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regions_clamp_to_the_edge() {
        let field = WeightField::new(Array2::from_shape_fn((2, 3), |(y, x)| (y * 3 + x) as u8));

        assert_eq!(field.size(), UVec2::new(3, 2));
        assert_eq!(field.region(TexelRect::new(1, 0, 3, 0)), vec![1, 2, 2]);
        assert_eq!(field.region(TexelRect::new(-1, 1, 0, 2)), vec![3, 3, 3, 3]);
        assert!(field.has_weight_in(TexelRect::new(0, 0, 1, 0)));
        assert!(!field.has_weight_in(TexelRect::new(-4, -4, 0, 0)));
    }
}
