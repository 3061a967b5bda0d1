use crate::{
    layers::{LayerHandle, LayerRegistry},
    texture::{ChannelMask, TextureHandle, TextureKind, TexturePool, TextureState, CHANNEL_COUNT},
    tile::TileId,
    weightmap::{ChannelUsage, EditContext},
};
use bevy::{
    log::{debug, warn},
    math::IVec2,
    utils::HashMap,
};
use itertools::Itertools;
use std::collections::BTreeMap;

/// The channel of a tile's weightmap texture that stores one layer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct LayerAllocationInfo {
    pub layer: LayerHandle,
    /// Index into [`AllocationSet::textures`].
    pub texture_index: usize,
    pub channel: usize,
}

/// The weightmap allocations of one tile in one edit context.
///
/// Allocations are kept in the order they were requested in, which is also the order the
/// dominant layer pass of the collision scans them in.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AllocationSet {
    pub(crate) textures: Vec<TextureHandle>,
    pub(crate) allocations: Vec<LayerAllocationInfo>,
}

impl AllocationSet {
    pub fn textures(&self) -> &[TextureHandle] {
        &self.textures
    }

    pub fn allocations(&self) -> &[LayerAllocationInfo] {
        &self.allocations
    }

    pub fn is_empty(&self) -> bool {
        self.allocations.is_empty()
    }

    pub fn layers(&self) -> impl Iterator<Item = LayerHandle> + '_ {
        self.allocations.iter().map(|allocation| allocation.layer)
    }

    pub fn contains(&self, layer: LayerHandle) -> bool {
        self.allocations.iter().any(|allocation| allocation.layer == layer)
    }

    /// Resolves the texture and channel storing `layer`.
    pub fn find(&self, layer: LayerHandle) -> Option<(TextureHandle, usize)> {
        self.allocations
            .iter()
            .find(|allocation| allocation.layer == layer)
            .map(|allocation| (self.textures[allocation.texture_index], allocation.channel))
    }

    /// Iterates over all allocations with their resolved textures.
    pub fn iter(&self) -> impl Iterator<Item = (LayerHandle, TextureHandle, usize)> + '_ {
        self.allocations.iter().map(|allocation| {
            (
                allocation.layer,
                self.textures[allocation.texture_index],
                allocation.channel,
            )
        })
    }

    fn from_placements(placements: &[(LayerHandle, TextureHandle, usize)]) -> Self {
        let textures = placements
            .iter()
            .map(|&(_, texture, _)| texture)
            .unique()
            .collect_vec();

        let allocations = placements
            .iter()
            .map(|&(layer, texture, channel)| LayerAllocationInfo {
                layer,
                texture_index: textures
                    .iter()
                    .position(|&candidate| candidate == texture)
                    .unwrap_or_default(),
                channel,
            })
            .collect_vec();

        Self {
            textures,
            allocations,
        }
    }
}

/// Describes the tile a reallocation runs for.
#[derive(Copy, Clone, Debug)]
pub struct AllocationTarget {
    pub tile: TileId,
    pub grid: IVec2,
    pub edit_context: EditContext,
    pub texture_size: u32,
    /// The state newly created weightmaps start in.
    pub texture_state: TextureState,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ReallocationKind {
    /// Every requested layer was already allocated, only the order of the allocations changed.
    Unchanged,
    /// The new layers fit into free channels of the tile's textures.
    InPlace,
    /// Layers were repacked, possibly into shared or newly created textures.
    Full,
}

/// A layer, whose weights were copied to another channel.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ChannelMove {
    pub layer: LayerHandle,
    pub from: (TextureHandle, usize),
    pub to: (TextureHandle, usize),
}

#[derive(Clone, Debug)]
pub struct ReallocationReport {
    pub kind: ReallocationKind,
    pub added: Vec<LayerHandle>,
    pub removed: Vec<LayerHandle>,
    pub moves: Vec<ChannelMove>,
    pub created: Vec<TextureHandle>,
    pub destroyed: Vec<TextureHandle>,
    /// The channels, whose mip 0 was written and whose mips have to be regenerated.
    pub touched: BTreeMap<TextureHandle, ChannelMask>,
}

impl ReallocationReport {
    fn unchanged() -> Self {
        Self {
            kind: ReallocationKind::Unchanged,
            added: Vec::new(),
            removed: Vec::new(),
            moves: Vec::new(),
            created: Vec::new(),
            destroyed: Vec::new(),
            touched: BTreeMap::new(),
        }
    }

    /// Whether the set of allocated layers changed.
    pub fn layers_changed(&self) -> bool {
        !self.added.is_empty() || !self.removed.is_empty()
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum TextureSlot {
    Existing(TextureHandle),
    /// A texture, that is created when the transaction commits.
    Pending(usize),
}

#[derive(Copy, Clone, Debug)]
enum ChannelOp {
    Zero {
        texture: TextureSlot,
        channel: usize,
    },
    Move {
        layer: LayerHandle,
        from: (TextureHandle, usize),
        to: (TextureSlot, usize),
    },
}

/// A reallocation plan, staged against a copy-on-write overlay of the channel usage table.
///
/// Nothing outside of the transaction is touched until [`StagedChanges::commit`] runs,
/// so an invariant violation during planning leaves the usage table and all textures intact.
struct AllocationTransaction<'a> {
    base: &'a BTreeMap<TextureHandle, ChannelUsage>,
    overlay: BTreeMap<TextureSlot, ChannelUsage>,
    pending: usize,
    ops: Vec<ChannelOp>,
    edit_context: EditContext,
}

impl<'a> AllocationTransaction<'a> {
    fn new(base: &'a BTreeMap<TextureHandle, ChannelUsage>, edit_context: EditContext) -> Self {
        Self {
            base,
            overlay: BTreeMap::new(),
            pending: 0,
            ops: Vec::new(),
            edit_context,
        }
    }

    fn usage(&self, slot: TextureSlot) -> &ChannelUsage {
        if let Some(usage) = self.overlay.get(&slot) {
            return usage;
        }

        match slot {
            TextureSlot::Existing(handle) => self.base.get(&handle).unwrap_or_else(|| {
                panic!("Weightmap {handle} is allocated, but has no channel usage.")
            }),
            TextureSlot::Pending(_) => unreachable!("pending textures always live in the overlay"),
        }
    }

    fn usage_mut(&mut self, slot: TextureSlot) -> &mut ChannelUsage {
        let base = self.base;

        self.overlay.entry(slot).or_insert_with(|| match slot {
            TextureSlot::Existing(handle) => base.get(&handle).cloned().unwrap_or_else(|| {
                panic!("Weightmap {handle} is allocated, but has no channel usage.")
            }),
            TextureSlot::Pending(_) => unreachable!("pending textures always live in the overlay"),
        })
    }

    fn create_texture(&mut self) -> TextureSlot {
        let slot = TextureSlot::Pending(self.pending);
        self.pending += 1;
        self.overlay.insert(slot, ChannelUsage::new(self.edit_context));
        slot
    }

    fn first_free_channel(&self, slot: TextureSlot) -> Option<usize> {
        let usage = self.usage(slot);
        (0..CHANNEL_COUNT).find(|&channel| usage.is_free(channel))
    }

    /// Claims a free channel for a layer, that has no weights yet.
    fn claim_zeroed(&mut self, slot: TextureSlot, channel: usize, tile: TileId) {
        self.usage_mut(slot).claim(channel, tile);
        self.ops.push(ChannelOp::Zero {
            texture: slot,
            channel,
        });
    }

    /// Claims a free channel and moves the weights of `layer` into it.
    fn claim_moved(
        &mut self,
        slot: TextureSlot,
        channel: usize,
        tile: TileId,
        layer: LayerHandle,
        from: (TextureHandle, usize),
    ) {
        self.usage_mut(slot).claim(channel, tile);
        self.usage_mut(TextureSlot::Existing(from.0))
            .release(from.1, tile);
        self.ops.push(ChannelOp::Move {
            layer,
            from,
            to: (slot, channel),
        });
    }

    fn release(&mut self, texture: TextureHandle, channel: usize, tile: TileId) {
        let slot = TextureSlot::Existing(texture);
        self.usage_mut(slot).release(channel, tile);
        self.ops.push(ChannelOp::Zero {
            texture: slot,
            channel,
        });
    }

    /// Finds the shared texture, that can hold all of `layers` and whose channels belong to
    /// the tiles closest to the target.
    /// Candidates are scanned in ascending handle order and only a strictly closer candidate
    /// replaces the current best one.
    fn find_candidate(
        &self,
        pool: &TexturePool,
        target: &AllocationTarget,
        layers: &[LayerHandle],
        current: &HashMap<LayerHandle, (TextureHandle, usize)>,
        tile_grid: &impl Fn(TileId) -> Option<IVec2>,
    ) -> Option<TextureHandle> {
        let mut best: Option<(TextureHandle, i32)> = None;

        for &handle in self.base.keys() {
            let usage = self.usage(TextureSlot::Existing(handle));

            if usage.edit_context() != target.edit_context || usage.is_empty() {
                continue;
            }

            match pool.get(handle) {
                Some(texture) if texture.is_ready() && texture.size() == target.texture_size => {}
                _ => continue,
            }

            let resident = layers
                .iter()
                .filter(|&&layer| current.get(&layer).is_some_and(|&(texture, _)| texture == handle))
                .count();

            if usage.free_channel_count() + resident < layers.len() {
                continue;
            }

            let distance = usage
                .owners()
                .filter_map(|owner| tile_grid(owner))
                .map(|grid| (grid - target.grid).length_squared())
                .min();

            if let Some(distance) = distance {
                if best.map_or(true, |(_, best_distance)| distance < best_distance) {
                    best = Some((handle, distance));
                }
            }
        }

        best.map(|(handle, _)| handle)
    }

    /// Ends the planning phase, releasing the borrow of the usage table.
    fn stage(self) -> StagedChanges {
        StagedChanges {
            overlay: self.overlay,
            pending: self.pending,
            ops: self.ops,
        }
    }
}

struct StagedChanges {
    overlay: BTreeMap<TextureSlot, ChannelUsage>,
    pending: usize,
    ops: Vec<ChannelOp>,
}

impl StagedChanges {
    /// Creates the pending textures, replays the channel operations in order and writes the
    /// overlay back into the usage table. Textures left without owners are destroyed.
    fn commit(
        self,
        allocator: &mut WeightmapAllocator,
        pool: &mut TexturePool,
        target: &AllocationTarget,
        placements: &[(LayerHandle, TextureSlot, usize)],
        report: &mut ReallocationReport,
    ) -> AllocationSet {
        let created = (0..self.pending)
            .map(|_| {
                pool.create(
                    TextureKind::Weightmap,
                    target.texture_size,
                    target.texture_state,
                )
            })
            .collect_vec();

        let resolve = |slot: TextureSlot| match slot {
            TextureSlot::Existing(handle) => handle,
            TextureSlot::Pending(index) => created[index],
        };

        let mut touched: BTreeMap<TextureHandle, ChannelMask> = BTreeMap::new();
        let mut touch = |texture: TextureHandle, channel: usize| {
            *touched.entry(texture).or_insert(ChannelMask::empty()) |= ChannelMask::channel(channel);
        };

        for op in self.ops {
            match op {
                ChannelOp::Zero { texture, channel } => {
                    let texture = resolve(texture);
                    if let Some(data) = pool.get_mut(texture) {
                        data.zero_channel(channel);
                    }
                    touch(texture, channel);
                }
                ChannelOp::Move { layer, from, to } => {
                    let to = (resolve(to.0), to.1);

                    if from.0 == to.0 {
                        if let Some(data) = pool.get_mut(from.0) {
                            data.copy_channel(to.1, from.1);
                            data.zero_channel(from.1);
                        }
                    } else if let Some((source, destination)) = pool.get2_mut(from.0, to.0) {
                        destination.copy_channel_from(to.1, source.mip(0), from.1);
                        source.zero_channel(from.1);
                    }

                    touch(from.0, from.1);
                    touch(to.0, to.1);
                    report.moves.push(ChannelMove { layer, from, to });
                }
            }
        }

        for (slot, usage) in self.overlay {
            let handle = resolve(slot);

            if usage.is_empty() {
                allocator.usage.remove(&handle);
                pool.release(handle);
                touched.remove(&handle);
                report.destroyed.push(handle);
            } else {
                allocator.usage.insert(handle, usage);
            }
        }

        let placements = placements
            .iter()
            .map(|&(layer, slot, channel)| (layer, resolve(slot), channel))
            .collect_vec();

        // Textures created and released within the same transaction never existed for callers.
        report.created = created
            .into_iter()
            .filter(|handle| !report.destroyed.contains(handle))
            .collect();
        report.touched = touched;

        AllocationSet::from_placements(&placements)
    }
}

/// Owns the channel usage of every weightmap texture and assigns paint layers to channels.
#[derive(Default)]
pub struct WeightmapAllocator {
    usage: BTreeMap<TextureHandle, ChannelUsage>,
}

impl WeightmapAllocator {
    pub fn usage(&self, texture: TextureHandle) -> Option<&ChannelUsage> {
        self.usage.get(&texture)
    }

    pub fn iter(&self) -> impl Iterator<Item = (TextureHandle, &ChannelUsage)> {
        self.usage.iter().map(|(&handle, usage)| (handle, usage))
    }

    pub fn texture_count(&self) -> usize {
        self.usage.len()
    }

    /// Assigns every layer of `layers` to a channel of a weightmap texture.
    ///
    /// The requested layers are the complete desired set of the tile: allocated layers missing
    /// from it are released, and layers without a [`LayerInfo`](crate::layers::LayerInfo) are
    /// dropped with a warning.
    /// Afterwards `set` lists the allocations in request order.
    ///
    /// Unless `force` is set, layers that are already allocated stay in their channels, and new
    /// layers are packed into free channels of the tile's textures if possible.
    /// Otherwise all layers are repacked, preferring textures shared with nearby tiles.
    ///
    /// The returned report lists the channels that were written, whose mips are stale now.
    ///
    /// # Panics
    /// Panics on an inconsistent usage table, e.g. a channel claimed twice.
    #[allow(clippy::too_many_arguments)]
    pub fn reallocate(
        &mut self,
        pool: &mut TexturePool,
        registry: &LayerRegistry,
        target: &AllocationTarget,
        set: &mut AllocationSet,
        layers: &[LayerHandle],
        force: bool,
        tile_grid: impl Fn(TileId) -> Option<IVec2>,
    ) -> ReallocationReport {
        let requested = layers
            .iter()
            .copied()
            .unique()
            .filter(|&layer| {
                let known = registry.contains(layer);
                if !known {
                    warn!(
                        "Layer {layer} of tile {} has no layer info and is removed.",
                        target.tile
                    );
                }
                known
            })
            .collect_vec();

        let current: HashMap<LayerHandle, (TextureHandle, usize)> = set
            .iter()
            .map(|(layer, texture, channel)| (layer, (texture, channel)))
            .collect();

        let removed = set
            .layers()
            .filter(|layer| !requested.contains(layer))
            .collect_vec();
        let added = requested
            .iter()
            .copied()
            .filter(|layer| !current.contains_key(layer))
            .collect_vec();

        if !force && removed.is_empty() && added.is_empty() {
            let placements = requested
                .iter()
                .filter_map(|&layer| current.get(&layer).map(|&(t, c)| (layer, t, c)))
                .collect_vec();
            *set = AllocationSet::from_placements(&placements);

            return ReallocationReport::unchanged();
        }

        let mut transaction = AllocationTransaction::new(&self.usage, target.edit_context);

        for &layer in &removed {
            let (texture, channel) = current[&layer];
            transaction.release(texture, channel, target.tile);
        }

        let free_channels: usize = set
            .textures
            .iter()
            .map(|&texture| {
                transaction
                    .usage(TextureSlot::Existing(texture))
                    .free_channel_count()
            })
            .sum();

        let kind = if !force && added.len() <= free_channels {
            ReallocationKind::InPlace
        } else {
            ReallocationKind::Full
        };

        let mut placements: Vec<(LayerHandle, TextureSlot, usize)> = Vec::new();

        match kind {
            ReallocationKind::InPlace => {
                for &layer in &requested {
                    if let Some(&(texture, channel)) = current.get(&layer) {
                        placements.push((layer, TextureSlot::Existing(texture), channel));
                        continue;
                    }

                    let (slot, channel) = set
                        .textures
                        .iter()
                        .map(|&texture| TextureSlot::Existing(texture))
                        .find_map(|slot| {
                            transaction
                                .first_free_channel(slot)
                                .map(|channel| (slot, channel))
                        })
                        .unwrap_or_else(|| unreachable!("free channels were counted"));

                    transaction.claim_zeroed(slot, channel, target.tile);
                    placements.push((layer, slot, channel));
                }
            }
            ReallocationKind::Full => {
                for run in requested.chunks(CHANNEL_COUNT) {
                    let remaining = requested.len() - placements.len();

                    let slot = if remaining <= CHANNEL_COUNT {
                        transaction
                            .find_candidate(pool, target, run, &current, &tile_grid)
                            .map(TextureSlot::Existing)
                    } else {
                        None
                    }
                    .unwrap_or_else(|| transaction.create_texture());

                    // Layers, that already live in the chosen texture, keep their channel.
                    let (resident, moving): (Vec<_>, Vec<_>) =
                        run.iter().copied().partition(|layer| {
                            current
                                .get(layer)
                                .is_some_and(|&(texture, _)| slot == TextureSlot::Existing(texture))
                        });

                    let mut run_placements = resident
                        .iter()
                        .map(|layer| (*layer, slot, current[layer].1))
                        .collect_vec();

                    for layer in moving {
                        let channel = transaction.first_free_channel(slot).unwrap_or_else(|| {
                            panic!("Weightmap candidate has no free channel left for {layer}.")
                        });

                        match current.get(&layer) {
                            Some(&from) => {
                                transaction.claim_moved(slot, channel, target.tile, layer, from)
                            }
                            None => transaction.claim_zeroed(slot, channel, target.tile),
                        }

                        run_placements.push((layer, slot, channel));
                    }

                    placements.extend(
                        run.iter()
                            .filter_map(|layer| run_placements.iter().find(|p| p.0 == *layer)),
                    );
                }
            }
            ReallocationKind::Unchanged => unreachable!(),
        }

        let mut report = ReallocationReport {
            kind,
            added,
            removed,
            ..ReallocationReport::unchanged()
        };

        let staged = transaction.stage();
        *set = staged.commit(self, pool, target, &placements, &mut report);

        debug!(
            "Reallocated the weightmaps of tile {} ({:?}): {} added, {} removed, {} moved, {} created, {} destroyed.",
            target.tile,
            report.kind,
            report.added.len(),
            report.removed.len(),
            report.moves.len(),
            report.created.len(),
            report.destroyed.len()
        );

        report
    }

    /// Releases every channel of a tile, destroying textures that become empty.
    pub fn release_tile(
        &mut self,
        pool: &mut TexturePool,
        registry: &LayerRegistry,
        target: &AllocationTarget,
        set: &mut AllocationSet,
    ) -> ReallocationReport {
        self.reallocate(pool, registry, target, set, &[], false, |_| None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::LayerInfo;
    use rand::{rngs::StdRng, Rng, SeedableRng};
    use std::panic::{catch_unwind, AssertUnwindSafe};

    struct Fixture {
        pool: TexturePool,
        registry: LayerRegistry,
        allocator: WeightmapAllocator,
        grids: HashMap<TileId, IVec2>,
        sets: HashMap<TileId, AllocationSet>,
        layers: Vec<LayerHandle>,
    }

    impl Fixture {
        fn new(layer_count: usize) -> Self {
            let mut registry = LayerRegistry::default();
            let layers = (0..layer_count)
                .map(|index| registry.register(LayerInfo::new(format!("Layer {index}"))))
                .collect_vec();

            Self {
                pool: TexturePool::default(),
                registry,
                allocator: WeightmapAllocator::default(),
                grids: HashMap::default(),
                sets: HashMap::default(),
                layers,
            }
        }

        fn target(&self, tile: TileId) -> AllocationTarget {
            AllocationTarget {
                tile,
                grid: self.grids[&tile],
                edit_context: EditContext::Base,
                texture_size: 8,
                texture_state: TextureState::Ready,
            }
        }

        fn reallocate(
            &mut self,
            tile: TileId,
            grid: IVec2,
            layers: &[LayerHandle],
            force: bool,
        ) -> ReallocationReport {
            self.grids.insert(tile, grid);
            let target = self.target(tile);
            let mut set = self.sets.remove(&tile).unwrap_or_default();
            let grids = self.grids.clone();

            let report = self.allocator.reallocate(
                &mut self.pool,
                &self.registry,
                &target,
                &mut set,
                layers,
                force,
                |owner| grids.get(&owner).copied(),
            );

            self.sets.insert(tile, set);
            report
        }

        fn paint(&mut self, tile: TileId, layer: LayerHandle, value: u8) {
            let (texture, channel) = self.sets[&tile].find(layer).unwrap();
            let texture = self.pool.get_mut(texture).unwrap();
            for (x, y) in itertools::iproduct!(0..8, 0..8) {
                texture.set_channel(0, x, y, channel, value);
            }
        }

        fn weight(&self, tile: TileId, layer: LayerHandle) -> u8 {
            let (texture, channel) = self.sets[&tile].find(layer).unwrap();
            self.pool.get(texture).unwrap().channel(0, 5, 5, channel)
        }

        fn assert_consistent(&self) {
            let mut slots = HashMap::default();

            for (&tile, set) in &self.sets {
                for (layer, texture, channel) in set.iter() {
                    assert_eq!(
                        self.allocator.usage(texture).unwrap().owner(channel),
                        Some(tile),
                        "{layer} of {tile} is not owned"
                    );
                    assert!(
                        slots.insert((texture, channel), layer).is_none(),
                        "slot {texture}:{channel} is used twice"
                    );
                }
            }

            for (texture, usage) in self.allocator.iter() {
                assert!(!usage.is_empty());
                assert!(self.pool.contains(texture));
                for channel in 0..CHANNEL_COUNT {
                    if usage.owner(channel).is_some() {
                        assert!(slots.contains_key(&(texture, channel)));
                    }
                }
            }
        }
    }

    #[test]
    fn second_reallocation_is_a_no_op() {
        let mut fixture = Fixture::new(3);
        let layers = fixture.layers.clone();
        let tile = TileId::from(0);

        let report = fixture.reallocate(tile, IVec2::ZERO, &layers, false);
        assert_eq!(report.kind, ReallocationKind::Full);
        assert_eq!(report.created.len(), 1);

        let allocations = fixture.sets[&tile].clone();
        let report = fixture.reallocate(tile, IVec2::ZERO, &layers, false);

        assert_eq!(report.kind, ReallocationKind::Unchanged);
        assert!(report.moves.is_empty());
        assert!(report.touched.is_empty());
        assert_eq!(fixture.sets[&tile], allocations);
    }

    #[test]
    fn new_layers_fill_free_channels_in_place() {
        let mut fixture = Fixture::new(3);
        let layers = fixture.layers.clone();
        let tile = TileId::from(0);

        fixture.reallocate(tile, IVec2::ZERO, &layers[..1], false);
        fixture.paint(tile, layers[0], 77);

        let report = fixture.reallocate(tile, IVec2::ZERO, &layers, false);

        assert_eq!(report.kind, ReallocationKind::InPlace);
        assert_eq!(report.added, layers[1..].to_vec());
        assert!(report.moves.is_empty());
        assert_eq!(fixture.sets[&tile].textures().len(), 1);
        assert_eq!(fixture.weight(tile, layers[0]), 77);
        assert_eq!(fixture.weight(tile, layers[1]), 0);
        fixture.assert_consistent();
    }

    #[test]
    fn full_reallocation_moves_weights() {
        let mut fixture = Fixture::new(5);
        let layers = fixture.layers.clone();
        let tile = TileId::from(0);

        fixture.reallocate(tile, IVec2::ZERO, &layers[..4], false);
        for (index, &layer) in layers[..4].iter().enumerate() {
            fixture.paint(tile, layer, 10 * (index as u8 + 1));
        }

        let report = fixture.reallocate(tile, IVec2::ZERO, &layers, false);

        assert_eq!(report.kind, ReallocationKind::Full);
        assert_eq!(fixture.sets[&tile].textures().len(), 2);
        for (index, &layer) in layers[..4].iter().enumerate() {
            assert_eq!(fixture.weight(tile, layer), 10 * (index as u8 + 1));
        }
        assert_eq!(fixture.weight(tile, layers[4]), 0);
        assert_eq!(
            fixture.sets[&tile].layers().collect_vec(),
            layers,
            "allocations follow the request order"
        );
        fixture.assert_consistent();
    }

    #[test]
    fn shared_texture_prefers_the_closest_tiles() {
        let mut fixture = Fixture::new(3);
        let layers = fixture.layers.clone();

        // Two textures with one free channel each, one far away and one next to the new tile.
        fixture.reallocate(TileId::from(0), IVec2::new(10, 10), &layers, false);
        fixture.reallocate(TileId::from(1), IVec2::new(1, 0), &layers, false);
        let far = fixture.sets[&TileId::from(0)].textures()[0];
        let near = fixture.sets[&TileId::from(1)].textures()[0];
        assert_ne!(far, near);

        let report = fixture.reallocate(TileId::from(2), IVec2::ZERO, &layers[..1], false);

        assert!(report.created.is_empty());
        assert_eq!(fixture.sets[&TileId::from(2)].textures(), &[near]);
        assert_eq!(fixture.allocator.usage(far).unwrap().free_channel_count(), 1);
        assert_eq!(fixture.allocator.usage(near).unwrap().free_channel_count(), 0);
        fixture.assert_consistent();
    }

    #[test]
    fn edit_contexts_never_share_textures() {
        let mut fixture = Fixture::new(1);
        let layers = fixture.layers.clone();
        fixture.reallocate(TileId::from(0), IVec2::ZERO, &layers, false);

        let mut target = fixture.target(TileId::from(0));
        target.edit_context = EditContext::Layer(1);
        let mut set = AllocationSet::default();
        let report = fixture.allocator.reallocate(
            &mut fixture.pool,
            &fixture.registry,
            &target,
            &mut set,
            &layers,
            false,
            |_| Some(IVec2::ZERO),
        );

        assert_eq!(report.created.len(), 1);
        assert_ne!(set.textures(), fixture.sets[&TileId::from(0)].textures());
    }

    #[test]
    fn removed_layers_release_their_textures() {
        let mut fixture = Fixture::new(6);
        let layers = fixture.layers.clone();
        let tile = TileId::from(0);

        fixture.reallocate(tile, IVec2::ZERO, &layers, false);
        assert_eq!(fixture.pool.len(), 2);

        let report = fixture.reallocate(tile, IVec2::ZERO, &layers[..4], false);

        assert_eq!(report.removed, layers[4..].to_vec());
        assert_eq!(report.destroyed.len(), 1);
        assert_eq!(fixture.pool.len(), 1);
        assert_eq!(fixture.sets[&tile].textures().len(), 1);
        fixture.assert_consistent();
    }

    #[test]
    fn layers_without_info_are_dropped() {
        let mut fixture = Fixture::new(2);
        let layers = fixture.layers.clone();
        let tile = TileId::from(0);

        fixture.reallocate(tile, IVec2::ZERO, &layers, false);
        fixture.registry.remove(layers[1]);

        let report = fixture.reallocate(tile, IVec2::ZERO, &layers, false);

        assert_eq!(report.removed, vec![layers[1]]);
        assert!(!fixture.sets[&tile].contains(layers[1]));
        fixture.assert_consistent();
    }

    #[test]
    fn panicking_plan_leaves_state_untouched() {
        let mut fixture = Fixture::new(4);
        let layers = fixture.layers.clone();
        let (first, second) = (TileId::from(0), TileId::from(1));

        fixture.reallocate(first, IVec2::ZERO, &layers[..2], false);
        fixture.reallocate(second, IVec2::X, &layers[2..3], false);
        fixture.paint(first, layers[0], 40);
        let shared = fixture.sets[&first].textures()[0];
        assert_eq!(fixture.sets[&second].textures(), &[shared]);
        assert_eq!(fixture.allocator.usage(shared).unwrap().owner(2), Some(second));

        // The last allocation points at a channel of the other tile, so releasing it panics
        // after both valid channels were already released in the plan.
        let mut corrupted = fixture.sets[&first].clone();
        corrupted.allocations.push(LayerAllocationInfo {
            layer: layers[3],
            texture_index: 0,
            channel: 2,
        });
        let allocations = corrupted.clone();
        let usage = fixture.allocator.usage(shared).cloned();
        let texture_count = fixture.pool.len();
        let target = fixture.target(first);

        let result = catch_unwind(AssertUnwindSafe(|| {
            fixture.allocator.reallocate(
                &mut fixture.pool,
                &fixture.registry,
                &target,
                &mut corrupted,
                &[],
                false,
                |_| None,
            )
        }));

        assert!(result.is_err());
        assert_eq!(fixture.allocator.usage(shared).cloned(), usage);
        assert_eq!(fixture.allocator.texture_count(), 1);
        assert_eq!(fixture.pool.len(), texture_count);
        assert_eq!(corrupted, allocations);
        assert_eq!(fixture.weight(first, layers[0]), 40);
        fixture.assert_consistent();
    }

    #[test]
    fn random_reallocations_keep_slots_unique() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut fixture = Fixture::new(9);
        let layers = fixture.layers.clone();

        for _ in 0..200 {
            let tile = TileId::from(rng.random_range(0..6u32));
            let grid = IVec2::new(tile.index() as i32 % 3, tile.index() as i32 / 3);
            let requested = layers
                .iter()
                .copied()
                .filter(|_| rng.random_bool(0.4))
                .collect_vec();

            fixture.reallocate(tile, grid, &requested, rng.random_bool(0.1));
            fixture.assert_consistent();
        }
    }

    #[test]
    fn released_tile_frees_shared_channels() {
        let mut fixture = Fixture::new(2);
        let layers = fixture.layers.clone();

        fixture.reallocate(TileId::from(0), IVec2::ZERO, &layers, false);
        fixture.reallocate(TileId::from(1), IVec2::X, &layers, false);
        let shared = fixture.sets[&TileId::from(0)].textures()[0];
        assert_eq!(fixture.sets[&TileId::from(1)].textures(), &[shared]);

        let target = fixture.target(TileId::from(1));
        let mut set = fixture.sets.remove(&TileId::from(1)).unwrap();
        let report =
            fixture
                .allocator
                .release_tile(&mut fixture.pool, &fixture.registry, &target, &mut set);

        assert!(set.is_empty());
        assert!(report.destroyed.is_empty());
        assert_eq!(
            fixture.allocator.usage(shared).unwrap().free_channel_count(),
            2
        );
        fixture.assert_consistent();
    }
}
