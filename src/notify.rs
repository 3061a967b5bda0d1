//! The narrow interfaces to renderers and physics.

use crate::{layers::LayerHandle, region::TexelRect, texture::TextureHandle, tile::TileId};
use bevy::{log::debug, prelude::Event, utils::HashMap};
use derive_more::derive::{Display, From};
use std::ops::RangeInclusive;

/// A rectangle of a texture, that changed in the given mips.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirtyRegion {
    pub texture: TextureHandle,
    /// The changed texels of mip 0.
    pub rect: TexelRect,
    pub mips: RangeInclusive<u32>,
    /// The changed texels of every mip in `mips`, in ascending mip order.
    pub mip_rects: Vec<(u32, TexelRect)>,
}

#[derive(Event, Clone, Debug, PartialEq, Eq)]
pub enum LandscapeChange {
    /// Texture data has to be reuploaded.
    TextureRegion(DirtyRegion),
    /// A texture was destroyed, because none of its channels are used anymore.
    TextureDestroyed(TextureHandle),
    /// The collision of a tile changed. `None` means the whole buffer was rebuilt.
    Collision {
        tile: TileId,
        region: Option<TexelRect>,
    },
    /// The weightmap allocations of a tile changed, materials have to be rebuilt.
    LayersReallocated { tile: TileId },
}

/// Receives the changes of a [`Landscape`](crate::landscape::Landscape).
pub trait ChangeListener: Send + Sync {
    fn notify(&self, change: LandscapeChange);
}

impl ChangeListener for async_channel::Sender<LandscapeChange> {
    fn notify(&self, change: LandscapeChange) {
        if self.try_send(change).is_err() {
            debug!("Dropped a landscape change, because the receiver is gone.");
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, From, Display)]
#[display("material#{_0}")]
pub struct PhysicalMaterialId(u32);

impl PhysicalMaterialId {
    pub const DEFAULT: PhysicalMaterialId = PhysicalMaterialId(0);
}

/// Resolves the physical material of a dominant layer.
pub trait PhysicalMaterialLookup: Send + Sync {
    /// `None` if no layer is dominant at a vertex.
    fn physical_material(&self, layer: Option<LayerHandle>) -> PhysicalMaterialId;
}

impl PhysicalMaterialLookup for HashMap<LayerHandle, PhysicalMaterialId> {
    fn physical_material(&self, layer: Option<LayerHandle>) -> PhysicalMaterialId {
        layer
            .and_then(|layer| self.get(&layer).copied())
            .unwrap_or(PhysicalMaterialId::DEFAULT)
    }
}

/// Uses the default material everywhere.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoPhysicalMaterials;

impl PhysicalMaterialLookup for NoPhysicalMaterials {
    fn physical_material(&self, _layer: Option<LayerHandle>) -> PhysicalMaterialId {
        PhysicalMaterialId::DEFAULT
    }
}
