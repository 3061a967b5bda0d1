//! This crate manages the CPU side data of tiled height-field landscapes.
//!
//! # Background
//! A landscape is split into square tiles. Every tile owns a heightmap texture and shares
//! RGBA8 weightmap textures with its neighbours, where each channel stores the weights of one
//! paint layer of one tile. Tiles are further split into 1x1 or 2x2 subsections, each of which
//! stores its own copy of the shared boundary vertices.
//!
//! ## How are the paint layers of a tile stored?
//! The [`WeightmapAllocator`](weightmap::WeightmapAllocator) packs the requested layers of
//! a tile into weightmap channels. New layers fill free channels of the textures the tile
//! already uses, otherwise the tile is moved into a texture shared with the closest tiles.
//! See the [`weightmap`] module for more information.
//!
//! ## How are the derived data kept in sync?
//! Mip 0 of every texture is authoritative. After an edit, the
//! [`MipGenerator`](mips::MipGenerator) regenerates the affected area of all other mips without
//! blending across subsection seams, and [`CollisionSync`](collision::CollisionSync) resamples
//! the heights, dominant layers and holes of the tile's collision.
//! The [`Landscape`](landscape::Landscape) runs this pipeline for every edit and notifies
//! renderers and physics of the changed data.

pub mod collision;
pub mod config;
pub mod edit;
pub mod error;
pub mod formats;
pub mod geometry;
pub mod heightmap;
pub mod holes;
pub mod landscape;
pub mod layers;
pub mod mips;
pub mod notify;
pub mod plugin;
pub mod region;
pub mod texture;
pub mod tile;
pub mod weightmap;

#[allow(missing_docs)]
pub mod prelude {
    #[doc(hidden)]
    pub use crate::{
        collision::{CollisionBuffer, CollisionSettings},
        config::LandscapeConfig,
        edit::{EditFlags, HeightEdit, ScopedEdit, WeightEdit},
        error::{LandscapeError, LandscapeResult},
        geometry::TileGeometry,
        landscape::Landscape,
        layers::{LayerHandle, LayerInfo},
        notify::{ChangeListener, LandscapeChange, PhysicalMaterialId, PhysicalMaterialLookup},
        plugin::LandscapePlugin,
        region::TexelRect,
        tile::{TileId, TileRole},
        weightmap::EditContext,
    };
}
