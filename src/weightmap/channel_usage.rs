use crate::{
    texture::{ChannelMask, CHANNEL_COUNT},
    tile::TileId,
};

/// Distinguishes the base weight data from layered edit overlays.
/// Allocations of different contexts never share a texture.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EditContext {
    #[default]
    Base,
    Layer(u32),
}

/// Records which tile owns each of the four channels of a shared weightmap texture.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelUsage {
    owners: [Option<TileId>; CHANNEL_COUNT],
    pub(crate) edit_context: EditContext,
}

impl ChannelUsage {
    pub fn new(edit_context: EditContext) -> Self {
        Self {
            owners: [None; CHANNEL_COUNT],
            edit_context,
        }
    }

    pub fn edit_context(&self) -> EditContext {
        self.edit_context
    }

    pub fn owner(&self, channel: usize) -> Option<TileId> {
        self.owners[channel]
    }

    pub fn is_free(&self, channel: usize) -> bool {
        self.owners[channel].is_none()
    }

    pub fn free_channel_count(&self) -> usize {
        self.owners.iter().filter(|owner| owner.is_none()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.free_channel_count() == CHANNEL_COUNT
    }

    pub fn owners(&self) -> impl Iterator<Item = TileId> + '_ {
        self.owners.iter().flatten().copied()
    }

    /// The channels claimed by `tile`.
    pub fn channels_of(&self, tile: TileId) -> ChannelMask {
        (0..CHANNEL_COUNT)
            .filter(|&channel| self.owners[channel] == Some(tile))
            .fold(ChannelMask::empty(), |mask, channel| {
                mask | ChannelMask::channel(channel)
            })
    }

    /// Claims a free channel for `tile`.
    ///
    /// # Panics
    /// Claiming a channel owned by another tile is an allocator bug.
    pub fn claim(&mut self, channel: usize, tile: TileId) {
        if let Some(owner) = self.owners[channel] {
            panic!("Weightmap channel {channel} is already claimed by tile {owner}, tile {tile} can not claim it.");
        }
        self.owners[channel] = Some(tile);
    }

    /// Releases a channel claimed by `tile`.
    ///
    /// # Panics
    /// Releasing a channel owned by another tile is an allocator bug.
    pub fn release(&mut self, channel: usize, tile: TileId) {
        assert_eq!(
            self.owners[channel],
            Some(tile),
            "Tile {tile} released weightmap channel {channel}, which it does not own."
        );
        self.owners[channel] = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claim_and_release() {
        let mut usage = ChannelUsage::new(EditContext::Base);
        let tile = TileId::from(3);

        usage.claim(1, tile);
        usage.claim(3, tile);

        assert_eq!(usage.free_channel_count(), 2);
        assert_eq!(usage.channels_of(tile), ChannelMask::G | ChannelMask::A);

        usage.release(1, tile);
        usage.release(3, tile);

        assert!(usage.is_empty());
    }

    #[test]
    #[should_panic(expected = "already claimed")]
    fn double_claim_is_fatal() {
        let mut usage = ChannelUsage::new(EditContext::Base);
        usage.claim(0, TileId::from(1));
        usage.claim(0, TileId::from(2));
    }
}
