//! Edit deltas and scoped batches of edits.

use crate::{
    collision::CollisionRequest,
    error::LandscapeResult,
    landscape::Landscape,
    layers::LayerHandle,
    mips::MipChannels,
    notify::LandscapeChange,
    region::TexelRect,
    texture::TextureHandle,
    tile::TileId,
    weightmap::{EditContext, ReallocationReport},
};
use std::{
    collections::BTreeMap,
    mem,
    ops::{Deref, DerefMut},
};

/// New weights of one layer for a rectangle of tile vertices.
#[derive(Clone, Debug)]
pub struct WeightEdit {
    pub tile: TileId,
    pub layer: LayerHandle,
    pub edit_context: EditContext,
    /// Vertex space, inclusive.
    pub region: TexelRect,
    /// One weight per vertex of `region`, row by row.
    pub values: Vec<u8>,
}

impl WeightEdit {
    pub fn new(tile: TileId, layer: LayerHandle, region: TexelRect, values: Vec<u8>) -> Self {
        Self {
            tile,
            layer,
            edit_context: EditContext::Base,
            region,
            values,
        }
    }

    /// Sets every vertex of `region` to the same weight.
    pub fn fill(tile: TileId, layer: LayerHandle, region: TexelRect, value: u8) -> Self {
        Self::new(tile, layer, region, vec![value; region.area()])
    }

    pub fn with_edit_context(mut self, edit_context: EditContext) -> Self {
        self.edit_context = edit_context;
        self
    }
}

/// New heights for a rectangle of tile vertices.
#[derive(Clone, Debug)]
pub struct HeightEdit {
    pub tile: TileId,
    /// Vertex space, inclusive.
    pub region: TexelRect,
    /// One height per vertex of `region`, row by row.
    pub heights: Vec<u16>,
}

impl HeightEdit {
    pub fn new(tile: TileId, region: TexelRect, heights: Vec<u16>) -> Self {
        Self {
            tile,
            region,
            heights,
        }
    }
}

bitflags::bitflags! {
    /// The follow up work an edit runs immediately.
    /// Suppressed work is collected in [`DeferredWork`].
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct EditFlags: u8 {
        const REGENERATE_MIPS = 1 << 0;
        const UPDATE_COLLISION = 1 << 1;
        const NOTIFY = 1 << 2;
    }
}

impl Default for EditFlags {
    fn default() -> Self {
        Self::all()
    }
}

/// Pending mip regeneration of one texture.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MipWork {
    pub channels: MipChannels,
    /// Changed mip 0 texels.
    pub region: TexelRect,
}

impl MipWork {
    fn merge(&mut self, other: MipWork) {
        self.region = self.region.union(&other.region);
        self.channels = match (self.channels, other.channels) {
            (MipChannels::Weight(a), MipChannels::Weight(b)) => MipChannels::Weight(a | b),
            _ => MipChannels::Height,
        };
    }
}

/// Work that was suppressed by the [`EditFlags`] of an edit.
///
/// Mips have to be regenerated before the collision is updated, and notifications are sent
/// last.
#[derive(Default, Debug)]
pub struct DeferredWork {
    pub mips: BTreeMap<TextureHandle, MipWork>,
    pub collision: BTreeMap<TileId, CollisionRequest>,
    pub changes: Vec<LandscapeChange>,
}

impl DeferredWork {
    pub fn is_empty(&self) -> bool {
        self.mips.is_empty() && self.collision.is_empty() && self.changes.is_empty()
    }

    pub fn add_mips(&mut self, texture: TextureHandle, work: MipWork) {
        self.mips
            .entry(texture)
            .and_modify(|pending| pending.merge(work))
            .or_insert(work);
    }

    pub fn add_collision(&mut self, tile: TileId, request: CollisionRequest) {
        self.collision
            .entry(tile)
            .and_modify(|pending| *pending = pending.merge(request))
            .or_insert(request);
    }

    pub fn append(&mut self, other: DeferredWork) {
        for (texture, work) in other.mips {
            self.add_mips(texture, work);
        }
        for (tile, request) in other.collision {
            self.add_collision(tile, request);
        }
        self.changes.extend(other.changes);
    }
}

/// A batch of edits sharing the same [`EditFlags`].
///
/// Work suppressed by the flags is collected while the scope is alive and flushed when it is
/// dropped. [`ScopedEdit::into_deferred`] hands the collected work to the caller instead.
pub struct ScopedEdit<'a> {
    landscape: &'a mut Landscape,
    flags: EditFlags,
    deferred: Option<DeferredWork>,
}

impl<'a> ScopedEdit<'a> {
    pub(crate) fn new(landscape: &'a mut Landscape, flags: EditFlags) -> Self {
        Self {
            landscape,
            flags,
            deferred: Some(DeferredWork::default()),
        }
    }

    pub fn flags(&self) -> EditFlags {
        self.flags
    }

    fn deferred(&mut self) -> &mut DeferredWork {
        self.deferred.get_or_insert_with(DeferredWork::default)
    }

    pub fn apply_weight_edit(&mut self, edit: &WeightEdit) -> LandscapeResult<()> {
        let mut deferred = mem::take(self.deferred());
        let result = self
            .landscape
            .apply_weight_edit_with(edit, self.flags, &mut deferred);
        self.deferred = Some(deferred);
        result
    }

    pub fn apply_height_edit(&mut self, edit: &HeightEdit) -> LandscapeResult<()> {
        let mut deferred = mem::take(self.deferred());
        let result = self
            .landscape
            .apply_height_edit_with(edit, self.flags, &mut deferred);
        self.deferred = Some(deferred);
        result
    }

    pub fn set_tile_layers(
        &mut self,
        tile: TileId,
        layers: &[LayerHandle],
        force: bool,
    ) -> LandscapeResult<ReallocationReport> {
        let mut deferred = mem::take(self.deferred());
        let result = self.landscape.set_tile_layers_with(
            tile,
            EditContext::Base,
            layers,
            force,
            self.flags,
            &mut deferred,
        );
        self.deferred = Some(deferred);
        result
    }

    /// Ends the scope without running the collected work.
    /// Pass the work to [`Landscape::complete_deferred`] once it should run.
    pub fn into_deferred(mut self) -> DeferredWork {
        self.deferred.take().unwrap_or_default()
    }
}

impl Deref for ScopedEdit<'_> {
    type Target = Landscape;

    fn deref(&self) -> &Landscape {
        self.landscape
    }
}

impl DerefMut for ScopedEdit<'_> {
    fn deref_mut(&mut self) -> &mut Landscape {
        self.landscape
    }
}

impl Drop for ScopedEdit<'_> {
    fn drop(&mut self) {
        if let Some(deferred) = self.deferred.take() {
            self.landscape.complete_deferred(deferred);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::texture::ChannelMask;

    #[test]
    fn mip_work_merges_channels_and_regions() {
        let mut deferred = DeferredWork::default();
        let texture = TextureHandle::from(0);

        deferred.add_mips(
            texture,
            MipWork {
                channels: MipChannels::Weight(ChannelMask::R),
                region: TexelRect::new(0, 0, 1, 1),
            },
        );
        deferred.add_mips(
            texture,
            MipWork {
                channels: MipChannels::Weight(ChannelMask::B),
                region: TexelRect::new(4, 4, 5, 5),
            },
        );

        assert_eq!(
            deferred.mips[&texture],
            MipWork {
                channels: MipChannels::Weight(ChannelMask::R | ChannelMask::B),
                region: TexelRect::new(0, 0, 5, 5),
            }
        );
    }

    #[test]
    fn full_collision_requests_absorb_regions() {
        let mut deferred = DeferredWork::default();
        let tile = TileId::from(1);

        deferred.add_collision(tile, CollisionRequest::Region(TexelRect::new(0, 0, 1, 1)));
        deferred.add_collision(tile, CollisionRequest::Region(TexelRect::new(3, 3, 4, 4)));
        assert_eq!(
            deferred.collision[&tile],
            CollisionRequest::Region(TexelRect::new(0, 0, 4, 4))
        );

        deferred.add_collision(tile, CollisionRequest::Full);
        assert_eq!(deferred.collision[&tile], CollisionRequest::Full);
    }
}
