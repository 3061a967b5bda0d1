//! CPU copies of the landscape textures.
//!
//! Every heightmap and weightmap lives in the [`TexturePool`] and is referenced by an opaque
//! [`TextureHandle`]. Mip 0 is the authoritative data; all other mips are derived by the
//! [`MipGenerator`](crate::mips::MipGenerator). Uploading to the GPU is left to whoever
//! listens to [`LandscapeChange`](crate::notify::LandscapeChange)s, and can use the dirty
//! rectangles recorded per mip to issue partial updates.

use crate::region::{merge, TexelRect};
use bytemuck::cast_slice;
use derive_more::derive::{Display, From};
use itertools::Itertools;
use slab::Slab;

/// Four 8-bit channels (R, G, B, A).
pub type Texel = [u8; 4];

pub const CHANNEL_COUNT: usize = 4;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, From, Display)]
#[display("texture#{_0}")]
pub struct TextureHandle(usize);

impl TextureHandle {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TextureKind {
    /// R,G store a 16-bit height, B,A a packed normal.
    Heightmap,
    /// Every channel stores the weight of one paint layer.
    Weightmap,
}

/// Whether the data of a texture can be used.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TextureState {
    /// The texture is streaming in and its data is not valid yet.
    Loading,
    /// The texture data is resident and can be read and written.
    Ready,
}

bitflags::bitflags! {
    /// A set of texture channels.
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
    pub struct ChannelMask: u8 {
        const R = 1 << 0;
        const G = 1 << 1;
        const B = 1 << 2;
        const A = 1 << 3;
    }
}

impl ChannelMask {
    pub fn channel(channel: usize) -> Self {
        Self::from_bits_truncate(1 << channel)
    }

    pub fn contains_channel(self, channel: usize) -> bool {
        self.contains(Self::channel(channel))
    }

    pub fn channels(self) -> impl Iterator<Item = usize> {
        (0..CHANNEL_COUNT).filter(move |&channel| self.contains_channel(channel))
    }
}

pub struct LandscapeTexture {
    pub(crate) kind: TextureKind,
    pub(crate) size: u32,
    pub(crate) state: TextureState,
    pub(crate) mips: Vec<Vec<Texel>>,
    pub(crate) dirty: Vec<Option<TexelRect>>,
}

impl LandscapeTexture {
    pub fn new(kind: TextureKind, size: u32, state: TextureState) -> Self {
        let mip_count = size.ilog2() + 1;
        let mips = (0..mip_count)
            .map(|mip| vec![[0; 4]; ((size >> mip) * (size >> mip)) as usize])
            .collect_vec();

        Self {
            kind,
            size,
            state,
            dirty: vec![None; mips.len()],
            mips,
        }
    }

    pub fn kind(&self) -> TextureKind {
        self.kind
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn state(&self) -> TextureState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == TextureState::Ready
    }

    pub fn mip_count(&self) -> u32 {
        self.mips.len() as u32
    }

    pub fn mip_size(&self, mip: u32) -> u32 {
        (self.size >> mip).max(1)
    }

    pub fn mip(&self, mip: u32) -> &[Texel] {
        &self.mips[mip as usize]
    }

    pub fn mip_mut(&mut self, mip: u32) -> &mut [Texel] {
        &mut self.mips[mip as usize]
    }

    /// Borrows the previous mip immutably and `mip` mutably at the same time.
    pub(crate) fn mip_pair_mut(&mut self, mip: u32) -> (&[Texel], &mut [Texel]) {
        let (previous, current) = self.mips.split_at_mut(mip as usize);
        (&previous[mip as usize - 1], &mut current[0])
    }

    pub fn mip_bytes(&self, mip: u32) -> &[u8] {
        cast_slice(&self.mips[mip as usize])
    }

    pub fn texel(&self, mip: u32, x: u32, y: u32) -> Texel {
        self.mips[mip as usize][(y * self.mip_size(mip) + x) as usize]
    }

    pub fn set_texel(&mut self, mip: u32, x: u32, y: u32, texel: Texel) {
        let size = self.mip_size(mip);
        self.mips[mip as usize][(y * size + x) as usize] = texel;
    }

    pub fn channel(&self, mip: u32, x: u32, y: u32, channel: usize) -> u8 {
        self.texel(mip, x, y)[channel]
    }

    pub fn set_channel(&mut self, mip: u32, x: u32, y: u32, channel: usize, value: u8) {
        let size = self.mip_size(mip);
        self.mips[mip as usize][(y * size + x) as usize][channel] = value;
    }

    /// Fills every mip with the same texel.
    pub fn fill(&mut self, texel: Texel) {
        for mip in &mut self.mips {
            mip.fill(texel);
        }
        self.mark_dirty_all();
    }

    /// Zeroes a single channel of mip 0, leaving the other channels untouched.
    pub fn zero_channel(&mut self, channel: usize) {
        for texel in &mut self.mips[0] {
            texel[channel] = 0;
        }
        self.mark_dirty(0, TexelRect::square(self.size));
    }

    /// Copies a channel of mip 0 from another texture of the same size.
    pub fn copy_channel_from(&mut self, channel: usize, source: &[Texel], source_channel: usize) {
        for (texel, source) in self.mips[0].iter_mut().zip(source) {
            texel[channel] = source[source_channel];
        }
        self.mark_dirty(0, TexelRect::square(self.size));
    }

    /// Copies a channel within mip 0 of this texture.
    pub fn copy_channel(&mut self, channel: usize, source_channel: usize) {
        for texel in &mut self.mips[0] {
            texel[channel] = texel[source_channel];
        }
        self.mark_dirty(0, TexelRect::square(self.size));
    }

    pub fn mark_dirty(&mut self, mip: u32, rect: TexelRect) {
        merge(&mut self.dirty[mip as usize], rect);
    }

    pub fn mark_dirty_all(&mut self) {
        for mip in 0..self.mip_count() {
            self.mark_dirty(mip, TexelRect::square(self.mip_size(mip)));
        }
    }

    pub fn dirty_rect(&self, mip: u32) -> Option<TexelRect> {
        self.dirty[mip as usize]
    }

    /// Returns and clears the dirty rectangle of every mip that changed since the last call.
    pub fn take_dirty_rects(&mut self) -> Vec<(u32, TexelRect)> {
        self.dirty
            .iter_mut()
            .enumerate()
            .filter_map(|(mip, rect)| rect.take().map(|rect| (mip as u32, rect)))
            .collect_vec()
    }
}

/// The arena owning all landscape textures.
#[derive(Default)]
pub struct TexturePool {
    textures: Slab<LandscapeTexture>,
}

impl TexturePool {
    pub fn create(&mut self, kind: TextureKind, size: u32, state: TextureState) -> TextureHandle {
        TextureHandle(self.textures.insert(LandscapeTexture::new(kind, size, state)))
    }

    pub fn release(&mut self, handle: TextureHandle) -> Option<LandscapeTexture> {
        self.textures.try_remove(handle.0)
    }

    pub fn get(&self, handle: TextureHandle) -> Option<&LandscapeTexture> {
        self.textures.get(handle.0)
    }

    pub fn get_mut(&mut self, handle: TextureHandle) -> Option<&mut LandscapeTexture> {
        self.textures.get_mut(handle.0)
    }

    pub fn get2_mut(
        &mut self,
        first: TextureHandle,
        second: TextureHandle,
    ) -> Option<(&mut LandscapeTexture, &mut LandscapeTexture)> {
        if first == second {
            return None;
        }
        self.textures.get2_mut(first.0, second.0)
    }

    /// Locks a mip for reading. The lock is released when the borrow ends.
    pub fn lock_mip(&self, handle: TextureHandle, mip: u32) -> Option<&[Texel]> {
        let texture = self.get(handle)?;
        (mip < texture.mip_count()).then(|| texture.mip(mip))
    }

    /// Locks a mip for writing. The lock is released when the borrow ends.
    pub fn lock_mip_mut(&mut self, handle: TextureHandle, mip: u32) -> Option<&mut [Texel]> {
        let texture = self.get_mut(handle)?;
        (mip < texture.mip_count()).then(|| texture.mip_mut(mip))
    }

    pub fn is_ready(&self, handle: TextureHandle) -> bool {
        self.get(handle).is_some_and(LandscapeTexture::is_ready)
    }

    pub fn set_state(&mut self, handle: TextureHandle, state: TextureState) {
        if let Some(texture) = self.get_mut(handle) {
            texture.state = state;
        }
    }

    pub fn contains(&self, handle: TextureHandle) -> bool {
        self.textures.contains(handle.0)
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (TextureHandle, &LandscapeTexture)> {
        self.textures
            .iter()
            .map(|(key, texture)| (TextureHandle(key), texture))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (TextureHandle, &mut LandscapeTexture)> {
        self.textures
            .iter_mut()
            .map(|(key, texture)| (TextureHandle(key), texture))
    }
}
