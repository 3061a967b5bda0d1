use crate::{layers::LayerHandle, region::TexelRect, tile::TileId};
use bevy::math::IVec2;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LandscapeError {
    #[error("a tile has 1 or 2 subsections per side, got {0}")]
    InvalidSubsectionCount(u32),
    #[error("subsection size must be a power of two minus one in 1..=255 quads, got {0}")]
    InvalidSubsectionSize(u32),
    #[error("collision mip {collision} must not be coarser than simple collision mip {simple}")]
    CollisionMipOrder { collision: u32, simple: u32 },
    #[error("collision mip {mip} exceeds the maximum of {max} for this subsection size")]
    CollisionMipOutOfRange { mip: u32, max: u32 },
    #[error("unknown tile {0}")]
    UnknownTile(TileId),
    #[error("a tile already exists at grid position {0}")]
    TileExists(IVec2),
    #[error("tile {0} is streaming and its data is not resident")]
    TileNotResident(TileId),
    #[error("layer {0} has no layer info")]
    UnknownLayer(LayerHandle),
    #[error("region {region:?} lies outside of the tile's vertex range 0..={max}")]
    RegionOutOfBounds { region: TexelRect, max: u32 },
    #[error("edit carries {actual} values, but its region needs {expected}")]
    EditSizeMismatch { expected: usize, actual: usize },
    #[error("unsupported image data: {0}")]
    UnsupportedImage(String),
    #[error("I/O error")]
    Io(#[from] std::io::Error),
    #[error("TIFF decoding error")]
    Tiff(#[from] tiff::TiffError),
    #[error("image error")]
    Image(#[from] image::ImageError),
}

pub type LandscapeResult<T> = Result<T, LandscapeError>;
