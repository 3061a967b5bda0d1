//! Packing of paint layers into the channels of shared weightmap textures.

mod allocator;
mod channel_usage;

pub use allocator::{
    AllocationSet, AllocationTarget, ChannelMove, LayerAllocationInfo, ReallocationKind,
    ReallocationReport, WeightmapAllocator,
};
pub use channel_usage::{ChannelUsage, EditContext};
