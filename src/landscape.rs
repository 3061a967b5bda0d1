//! The landscape owns all tiles and textures and runs the edit pipeline:
//! allocate channels, write mip 0, regenerate mips, resample collision and notify listeners.

use crate::{
    collision::{CollisionRequest, CollisionSources, CollisionSync, CollisionUpdate},
    config::LandscapeConfig,
    edit::{DeferredWork, EditFlags, HeightEdit, MipWork, ScopedEdit, WeightEdit},
    error::{LandscapeError, LandscapeResult},
    geometry::TileGeometry,
    heightmap::{decode_height, set_height, update_normals, FLAT_TEXEL},
    holes::{hole_lod_table, HoleSegmenter},
    layers::{LayerHandle, LayerInfo, LayerRegistry},
    mips::{MipChannels, MipGenerator},
    notify::{
        ChangeListener, DirtyRegion, LandscapeChange, NoPhysicalMaterials, PhysicalMaterialLookup,
    },
    region::TexelRect,
    texture::{ChannelMask, TextureHandle, TextureKind, TexturePool, TextureState},
    tile::{Tile, TileId, TileRole},
    weightmap::{
        AllocationSet, AllocationTarget, EditContext, ReallocationKind, ReallocationReport,
        WeightmapAllocator,
    },
};
use bevy::{
    log::{debug, info},
    math::{IVec2, Vec2},
    prelude::Resource,
    utils::HashMap,
};
use itertools::Itertools;
use ndarray::Array2;
use slab::Slab;

/// Reports the completion (`0..=1`) of a long running operation.
/// Returning `false` stops the operation at the next opportunity.
pub type ProgressCallback<'a> = dyn Fn(f64) -> bool + Sync + 'a;

#[derive(Resource)]
pub struct Landscape {
    config: LandscapeConfig,
    geometry: TileGeometry,
    mip_generator: MipGenerator,
    collision_sync: CollisionSync,
    hole_segmenter: HoleSegmenter,
    pool: TexturePool,
    registry: LayerRegistry,
    allocator: WeightmapAllocator,
    tiles: Slab<Tile>,
    grid: HashMap<IVec2, TileId>,
    listener: Option<Box<dyn ChangeListener>>,
    materials: Box<dyn PhysicalMaterialLookup>,
}

impl Landscape {
    pub fn new(config: LandscapeConfig) -> LandscapeResult<Self> {
        let geometry = config.geometry()?;
        let settings = config.collision_settings()?;
        let hole_segmenter = HoleSegmenter::new(config.hole_threshold);

        Ok(Self {
            geometry,
            mip_generator: MipGenerator::new(geometry),
            collision_sync: CollisionSync::new(geometry, settings)
                .with_hole_segmenter(hole_segmenter),
            hole_segmenter,
            config,
            pool: TexturePool::default(),
            registry: LayerRegistry::default(),
            allocator: WeightmapAllocator::default(),
            tiles: Slab::new(),
            grid: HashMap::default(),
            listener: None,
            materials: Box::new(NoPhysicalMaterials),
        })
    }

    pub fn with_listener(mut self, listener: impl ChangeListener + 'static) -> Self {
        self.listener = Some(Box::new(listener));
        self
    }

    pub fn with_physical_materials(
        mut self,
        materials: impl PhysicalMaterialLookup + 'static,
    ) -> Self {
        self.materials = Box::new(materials);
        self
    }

    pub fn config(&self) -> &LandscapeConfig {
        &self.config
    }

    pub fn geometry(&self) -> TileGeometry {
        self.geometry
    }

    pub fn mip_generator(&self) -> MipGenerator {
        self.mip_generator
    }

    pub fn textures(&self) -> &TexturePool {
        &self.pool
    }

    /// Direct access to the texture data, e.g. to regenerate deferred mips in parallel.
    pub fn textures_mut(&mut self) -> &mut TexturePool {
        &mut self.pool
    }

    pub fn allocator(&self) -> &WeightmapAllocator {
        &self.allocator
    }

    pub fn layers(&self) -> &LayerRegistry {
        &self.registry
    }

    pub fn register_layer(&mut self, info: LayerInfo) -> LayerHandle {
        self.registry.register(info)
    }

    /// Removes the info of a layer.
    /// Tiles drop their allocation of the layer the next time their layers are set, until then
    /// their collision ignores it.
    pub fn remove_layer(&mut self, layer: LayerHandle) -> Option<LayerInfo> {
        let info = self.registry.remove(layer)?;

        let mut deferred = DeferredWork::default();
        for (_, tile) in &self.tiles {
            if tile
                .base_allocations()
                .is_some_and(|allocations| allocations.contains(layer))
            {
                deferred.add_collision(tile.id, CollisionRequest::Full);
            }
        }
        self.complete_deferred(deferred);

        info!("Removed paint layer {} ({layer}).", info.name);
        Some(info)
    }

    pub fn tile(&self, id: TileId) -> LandscapeResult<&Tile> {
        self.tiles
            .get(id.index() as usize)
            .ok_or(LandscapeError::UnknownTile(id))
    }

    fn tile_mut(&mut self, id: TileId) -> LandscapeResult<&mut Tile> {
        self.tiles
            .get_mut(id.index() as usize)
            .ok_or(LandscapeError::UnknownTile(id))
    }

    fn resident_tile(&self, id: TileId) -> LandscapeResult<&Tile> {
        let tile = self.tile(id)?;

        if tile.role.is_resident() {
            Ok(tile)
        } else {
            Err(LandscapeError::TileNotResident(id))
        }
    }

    pub fn tile_at(&self, grid: IVec2) -> Option<TileId> {
        self.grid.get(&grid).copied()
    }

    pub fn tiles(&self) -> impl Iterator<Item = &Tile> {
        self.tiles.iter().map(|(_, tile)| tile)
    }

    /// Creates a flat tile at a grid position.
    /// Streaming tiles, that are not resident, start with loading textures.
    pub fn add_tile(&mut self, grid: IVec2, role: TileRole) -> LandscapeResult<TileId> {
        if self.grid.contains_key(&grid) {
            return Err(LandscapeError::TileExists(grid));
        }

        let state = if role.is_resident() {
            TextureState::Ready
        } else {
            TextureState::Loading
        };

        let heightmap = self
            .pool
            .create(TextureKind::Heightmap, self.geometry.texture_size(), state);
        if let Some(texture) = self.pool.get_mut(heightmap) {
            texture.fill(FLAT_TEXEL);
        }

        let entry = self.tiles.vacant_entry();
        let id = TileId::from(entry.key() as u32);
        entry.insert(Tile::new(id, grid, role, heightmap));
        self.grid.insert(grid, id);

        info!("Added landscape tile {id} at {grid} ({role:?}).");

        let mut deferred = DeferredWork::default();
        deferred.add_collision(id, CollisionRequest::Full);
        self.complete_deferred(deferred);

        Ok(id)
    }

    /// Removes a tile, releasing its heightmap and all of its weightmap channels.
    pub fn remove_tile(&mut self, id: TileId) -> LandscapeResult<()> {
        let tile = self.tile_mut(id)?;
        let grid = tile.grid;
        let heightmap = tile.heightmap;
        let weightmaps = tile.weightmaps.drain().collect_vec();
        let shared = weightmaps
            .iter()
            .flat_map(|(_, set)| set.textures.clone())
            .collect_vec();

        let mut deferred = DeferredWork::default();

        for (edit_context, mut set) in weightmaps {
            let target = self.allocation_target(id, grid, edit_context);
            let report =
                self.allocator
                    .release_tile(&mut self.pool, &self.registry, &target, &mut set);
            Self::queue_reallocation(
                id,
                edit_context,
                target.texture_size,
                &report,
                &mut deferred,
            );
        }

        deferred.collision.remove(&id);
        deferred.changes.retain(
            |change| !matches!(change, LandscapeChange::LayersReallocated { tile } if *tile == id),
        );

        self.pool.release(heightmap);
        deferred
            .changes
            .push(LandscapeChange::TextureDestroyed(heightmap));

        self.tiles.remove(id.index() as usize);
        self.grid.remove(&grid);
        self.refresh_weightmap_states(shared);

        info!("Removed landscape tile {id} at {grid}.");

        self.complete_deferred(deferred);
        Ok(())
    }

    /// Marks a streaming tile as resident, once its data has been streamed in, and retries its
    /// pending collision update.
    pub fn mark_resident(&mut self, id: TileId) -> LandscapeResult<()> {
        self.set_resident(id, true)?;

        let tile = self.tile_mut(id)?;
        if let Some(request) = tile.pending_collision.take() {
            let mut deferred = DeferredWork::default();
            deferred.add_collision(id, request);
            self.complete_deferred(deferred);
        }

        Ok(())
    }

    /// Marks a streaming tile as streamed out. Its data can't be edited until it is resident again.
    pub fn mark_evicted(&mut self, id: TileId) -> LandscapeResult<()> {
        self.set_resident(id, false)
    }

    fn set_resident(&mut self, id: TileId, resident: bool) -> LandscapeResult<()> {
        let tile = self.tile_mut(id)?;

        if tile.role == TileRole::Authoritative {
            return Ok(());
        }

        tile.role = TileRole::Streaming { resident };

        let heightmap = tile.heightmap;
        let weightmaps = tile
            .weightmaps
            .values()
            .flat_map(|set| set.textures.clone())
            .collect_vec();

        let state = if resident {
            TextureState::Ready
        } else {
            TextureState::Loading
        };
        self.pool.set_state(heightmap, state);
        self.refresh_weightmap_states(weightmaps);

        debug!("Tile {id} is now {}.", if resident { "resident" } else { "evicted" });
        Ok(())
    }

    /// Weightmaps are shared, so they are only loading while none of their owners is resident.
    fn refresh_weightmap_states(&mut self, textures: impl IntoIterator<Item = TextureHandle>) {
        for texture in textures {
            let Some(usage) = self.allocator.usage(texture) else {
                continue;
            };

            let resident = usage.owners().any(|owner| {
                self.tiles
                    .get(owner.index() as usize)
                    .is_some_and(|tile| tile.role.is_resident())
            });
            let state = if resident {
                TextureState::Ready
            } else {
                TextureState::Loading
            };

            self.pool.set_state(texture, state);
        }
    }

    /// Opens a batch of edits, that only runs the work allowed by `flags` immediately.
    pub fn scoped(&mut self, flags: EditFlags) -> ScopedEdit<'_> {
        ScopedEdit::new(self, flags)
    }

    /// Sets the complete list of base layers of a tile, see [`WeightmapAllocator::reallocate`].
    pub fn set_tile_layers(
        &mut self,
        tile: TileId,
        layers: &[LayerHandle],
        force: bool,
    ) -> LandscapeResult<ReallocationReport> {
        let mut deferred = DeferredWork::default();
        let report = self.set_tile_layers_with(
            tile,
            EditContext::Base,
            layers,
            force,
            EditFlags::all(),
            &mut deferred,
        )?;
        Ok(report)
    }

    pub(crate) fn set_tile_layers_with(
        &mut self,
        id: TileId,
        edit_context: EditContext,
        layers: &[LayerHandle],
        force: bool,
        flags: EditFlags,
        deferred: &mut DeferredWork,
    ) -> LandscapeResult<ReallocationReport> {
        let grid = self.resident_tile(id)?.grid;
        let target = self.allocation_target(id, grid, edit_context);

        let tile = self.tile_mut(id)?;
        let mut set = tile.weightmaps.remove(&edit_context).unwrap_or_default();

        let tiles = &self.tiles;
        let report = self.allocator.reallocate(
            &mut self.pool,
            &self.registry,
            &target,
            &mut set,
            layers,
            force,
            |owner| tiles.get(owner.index() as usize).map(Tile::grid),
        );

        if let Some(tile) = self.tiles.get_mut(id.index() as usize) {
            if !set.is_empty() {
                tile.weightmaps.insert(edit_context, set);
            }
        }

        Self::queue_reallocation(id, edit_context, target.texture_size, &report, deferred);
        self.process(flags, deferred);

        Ok(report)
    }

    /// Reallocates the base layers of many tiles, in chunks of the configured size.
    /// The follow up work of a chunk runs before `progress` is called for it.
    ///
    /// Returns the number of reallocated tiles, which is less than the number of requests if
    /// `progress` cancelled the operation.
    pub fn reallocate_tiles(
        &mut self,
        requests: &[(TileId, Vec<LayerHandle>)],
        force: bool,
        progress: &ProgressCallback,
    ) -> LandscapeResult<usize> {
        let chunk_size = self.config.reallocation_chunk_size.max(1);
        let mut done = 0;

        for chunk in requests.chunks(chunk_size) {
            {
                let mut scope = self.scoped(EditFlags::empty());
                for (tile, layers) in chunk {
                    scope.set_tile_layers(*tile, layers, force)?;
                }
            }

            done += chunk.len();

            if !progress(done as f64 / requests.len() as f64) {
                info!(
                    "Cancelled the reallocation after {done} of {} tiles.",
                    requests.len()
                );
                break;
            }
        }

        Ok(done)
    }

    pub fn apply_weight_edit(&mut self, edit: &WeightEdit) -> LandscapeResult<()> {
        let mut deferred = DeferredWork::default();
        self.apply_weight_edit_with(edit, EditFlags::all(), &mut deferred)
    }

    pub(crate) fn apply_weight_edit_with(
        &mut self,
        edit: &WeightEdit,
        flags: EditFlags,
        deferred: &mut DeferredWork,
    ) -> LandscapeResult<()> {
        let tile = self.resident_tile(edit.tile)?;
        self.validate_region(edit.region, edit.values.len())?;

        if !self.registry.contains(edit.layer) {
            return Err(LandscapeError::UnknownLayer(edit.layer));
        }

        let allocated = tile
            .allocations(edit.edit_context)
            .is_some_and(|set| set.contains(edit.layer));

        if !allocated {
            let layers = tile
                .allocations(edit.edit_context)
                .into_iter()
                .flat_map(AllocationSet::layers)
                .chain(std::iter::once(edit.layer))
                .collect_vec();

            self.set_tile_layers_with(
                edit.tile,
                edit.edit_context,
                &layers,
                false,
                flags,
                deferred,
            )?;
        }

        let (texture, channel) = self
            .tile(edit.tile)?
            .allocations(edit.edit_context)
            .and_then(|set| set.find(edit.layer))
            .ok_or(LandscapeError::UnknownLayer(edit.layer))?;

        let geometry = self.geometry;
        let data = self
            .pool
            .get_mut(texture)
            .ok_or(LandscapeError::UnknownTile(edit.tile))?;

        for (vertex, &value) in edit.region.iter().zip(&edit.values) {
            for (x, y) in Self::vertex_texels(geometry, vertex.as_ivec2()) {
                data.set_channel(0, x, y, channel, value);
            }
        }

        let texels = geometry.vertex_rect_to_texels(edit.region);
        data.mark_dirty(0, texels);

        deferred.add_mips(
            texture,
            MipWork {
                channels: MipChannels::Weight(ChannelMask::channel(channel)),
                region: texels,
            },
        );

        if edit.edit_context == EditContext::Base {
            deferred.add_collision(edit.tile, CollisionRequest::Region(edit.region));
        }

        self.process(flags, deferred);
        Ok(())
    }

    pub fn apply_height_edit(&mut self, edit: &HeightEdit) -> LandscapeResult<()> {
        let mut deferred = DeferredWork::default();
        self.apply_height_edit_with(edit, EditFlags::all(), &mut deferred)
    }

    pub(crate) fn apply_height_edit_with(
        &mut self,
        edit: &HeightEdit,
        flags: EditFlags,
        deferred: &mut DeferredWork,
    ) -> LandscapeResult<()> {
        let heightmap = self.resident_tile(edit.tile)?.heightmap;
        self.validate_region(edit.region, edit.heights.len())?;

        let geometry = self.geometry;
        let z_scale = self.config.z_scale();
        let data = self
            .pool
            .get_mut(heightmap)
            .ok_or(LandscapeError::UnknownTile(edit.tile))?;

        for (vertex, &height) in edit.region.iter().zip(&edit.heights) {
            for (x, y) in Self::vertex_texels(geometry, vertex.as_ivec2()) {
                let mut texel = data.texel(0, x, y);
                set_height(&mut texel, height);
                data.set_texel(0, x, y, texel);
            }
        }

        // Normals of the neighbouring vertices depend on the edited heights as well.
        let region = edit
            .region
            .expand(1)
            .intersect(&geometry.vertex_rect())
            .unwrap_or(edit.region);
        update_normals(data, geometry, region, z_scale);

        let texels = geometry.vertex_rect_to_texels(region);
        data.mark_dirty(0, texels);

        deferred.add_mips(
            heightmap,
            MipWork {
                channels: MipChannels::Height,
                region: texels,
            },
        );
        deferred.add_collision(edit.tile, CollisionRequest::Region(region));

        self.process(flags, deferred);
        Ok(())
    }

    /// Runs all of `work`, regardless of any flags.
    pub fn complete_deferred(&mut self, mut work: DeferredWork) {
        self.process(EditFlags::all(), &mut work);
    }

    /// Runs the deferred work allowed by `flags`, in pipeline order.
    fn process(&mut self, flags: EditFlags, deferred: &mut DeferredWork) {
        if flags.contains(EditFlags::REGENERATE_MIPS) {
            for (texture, work) in std::mem::take(&mut deferred.mips) {
                let Some(data) = self.pool.get_mut(texture) else {
                    continue;
                };

                if let Some(region) = work.region.clamp_to(data.size()) {
                    data.mark_dirty(0, region);
                }
                self.mip_generator.generate(data, work.region, work.channels);

                // Listeners receive every dirty rect, so the texture starts clean again.
                let mip_rects = data.take_dirty_rects();
                let rect = mip_rects
                    .first()
                    .filter(|&&(mip, _)| mip == 0)
                    .map_or(work.region, |&(_, rect)| rect);
                let last_mip = mip_rects.last().map_or(0, |&(mip, _)| mip);

                deferred
                    .changes
                    .push(LandscapeChange::TextureRegion(DirtyRegion {
                        texture,
                        rect,
                        mips: 0..=last_mip,
                        mip_rects,
                    }));
            }
        }

        // Collision samples the generated mips, so it has to wait for them.
        if flags.contains(EditFlags::UPDATE_COLLISION) && deferred.mips.is_empty() {
            for (tile, request) in std::mem::take(&mut deferred.collision) {
                if let Some(change) = self.update_collision(tile, request) {
                    deferred.changes.push(change);
                }
            }
        }

        if flags.contains(EditFlags::NOTIFY) {
            for change in deferred.changes.drain(..) {
                if let Some(listener) = &self.listener {
                    listener.notify(change);
                }
            }
        }
    }

    fn update_collision(
        &mut self,
        id: TileId,
        request: CollisionRequest,
    ) -> Option<LandscapeChange> {
        let tile = self.tiles.get_mut(id.index() as usize)?;

        let request = match tile.pending_collision.take() {
            Some(pending) => pending.merge(request),
            None => request,
        };

        if !tile.role.is_resident() {
            debug!("Deferred the collision update of tile {id}, it is not resident.");
            tile.pending_collision = Some(request);
            return None;
        }

        let empty = AllocationSet::default();
        let sources = CollisionSources {
            heightmap: tile.heightmap,
            allocations: tile.weightmaps.get(&EditContext::Base).unwrap_or(&empty),
        };
        let region = match request {
            CollisionRequest::Full => None,
            CollisionRequest::Region(region) => Some(region),
        };

        match self.collision_sync.update(
            &mut tile.collision,
            &self.pool,
            &self.registry,
            sources,
            region,
            self.materials.as_ref(),
        ) {
            CollisionUpdate::Rebuilt => Some(LandscapeChange::Collision {
                tile: id,
                region: None,
            }),
            CollisionUpdate::Updated(rect) => Some(LandscapeChange::Collision {
                tile: id,
                region: Some(rect),
            }),
            CollisionUpdate::Deferred => {
                tile.pending_collision = Some(request);
                None
            }
        }
    }

    /// Retries the collision updates, that were skipped because of missing source data.
    /// Returns the number of tiles, whose collision is still pending.
    pub fn retry_pending_collision(&mut self) -> usize {
        let mut deferred = DeferredWork::default();

        for (_, tile) in &mut self.tiles {
            if tile.role.is_resident() {
                if let Some(request) = tile.pending_collision.take() {
                    deferred.add_collision(tile.id, request);
                }
            }
        }

        if !deferred.is_empty() {
            self.complete_deferred(deferred);
        }

        self.tiles
            .iter()
            .filter(|(_, tile)| tile.has_pending_collision())
            .count()
    }

    /// Rebuilds the collision of every tile from scratch.
    pub fn rebuild_all_collision(&mut self) {
        let mut deferred = DeferredWork::default();
        for (_, tile) in &self.tiles {
            deferred.add_collision(tile.id, CollisionRequest::Full);
        }
        self.complete_deferred(deferred);
    }

    /// The mip 0 weight of a layer at a tile vertex, zero if the layer is not allocated.
    pub fn weight_at(&self, id: TileId, layer: LayerHandle, vertex: IVec2) -> LandscapeResult<u8> {
        let tile = self.resident_tile(id)?;
        self.validate_region(TexelRect::from_point(vertex), 1)?;

        let Some((texture, channel)) = tile.base_allocations().and_then(|set| set.find(layer))
        else {
            return Ok(0);
        };

        let (x, y) = Self::vertex_texels(self.geometry, vertex)[0];
        Ok(self
            .pool
            .get(texture)
            .map_or(0, |data| data.channel(0, x, y, channel)))
    }

    /// The mip 0 height of a tile vertex.
    pub fn height_at(&self, id: TileId, vertex: IVec2) -> LandscapeResult<u16> {
        let tile = self.resident_tile(id)?;
        self.validate_region(TexelRect::from_point(vertex), 1)?;

        let (x, y) = Self::vertex_texels(self.geometry, vertex)[0];
        let data = self
            .pool
            .get(tile.heightmap)
            .ok_or(LandscapeError::UnknownTile(id))?;

        Ok(decode_height(data.texel(0, x, y)))
    }

    /// Samples the weight of a layer at the vertex closest to a world position.
    /// `None` if there is no resident tile at that position.
    pub fn sample_weight(&self, position: Vec2, layer: LayerHandle) -> Option<u8> {
        let quads = self.geometry.component_size_quads() as i32;
        let vertex = (position / self.config.quad_scale).round().as_ivec2();
        let grid = IVec2::new(vertex.x.div_euclid(quads), vertex.y.div_euclid(quads));

        let tile = self.tile_at(grid)?;
        self.weight_at(tile, layer, vertex - grid * quads).ok()
    }

    /// For every vertex of a tile (indexed `[[y, x]]`), the first lod at which the vertex lies in
    /// the expanded bounds of a hole, or the number of lods if no hole is close.
    pub fn hole_lods(&self, id: TileId) -> LandscapeResult<Array2<u8>> {
        let tile = self.resident_tile(id)?;
        let size = self.geometry.component_size_quads() + 1;
        let num_lods = self.geometry.max_whole_subsection_mip() + 1;

        let visibility = tile
            .base_allocations()
            .and_then(|set| set.find(LayerHandle::VISIBILITY))
            .and_then(|(texture, channel)| Some((self.pool.get(texture)?, channel)));

        let Some((texture, channel)) = visibility else {
            return Ok(Array2::from_elem(
                (size as usize, size as usize),
                num_lods as u8,
            ));
        };

        let mask = Array2::from_shape_fn((size as usize, size as usize), |(y, x)| {
            let (x, y) = Self::vertex_texels(self.geometry, IVec2::new(x as i32, y as i32))[0];
            texture.channel(0, x, y, channel)
        });

        let bounds = self.hole_segmenter.segment(mask.view());
        Ok(hole_lod_table(&bounds, size, num_lods))
    }

    fn allocation_target(
        &self,
        tile: TileId,
        grid: IVec2,
        edit_context: EditContext,
    ) -> AllocationTarget {
        AllocationTarget {
            tile,
            grid,
            edit_context,
            texture_size: self.geometry.texture_size(),
            texture_state: TextureState::Ready,
        }
    }

    fn queue_reallocation(
        tile: TileId,
        edit_context: EditContext,
        texture_size: u32,
        report: &ReallocationReport,
        deferred: &mut DeferredWork,
    ) {
        for (&texture, &mask) in &report.touched {
            deferred.add_mips(
                texture,
                MipWork {
                    channels: MipChannels::Weight(mask),
                    region: TexelRect::square(texture_size),
                },
            );
        }

        deferred.changes.extend(
            report
                .destroyed
                .iter()
                .map(|&texture| LandscapeChange::TextureDestroyed(texture)),
        );

        if report.kind != ReallocationKind::Unchanged {
            deferred
                .changes
                .push(LandscapeChange::LayersReallocated { tile });
        }

        if edit_context == EditContext::Base && (report.layers_changed() || !report.moves.is_empty())
        {
            deferred.add_collision(tile, CollisionRequest::Full);
        }
    }

    fn validate_region(&self, region: TexelRect, values: usize) -> LandscapeResult<()> {
        let max = self.geometry.component_size_quads();

        if !region.is_valid() || region.intersect(&self.geometry.vertex_rect()) != Some(region) {
            return Err(LandscapeError::RegionOutOfBounds { region, max });
        }

        if region.area() != values {
            return Err(LandscapeError::EditSizeMismatch {
                expected: region.area(),
                actual: values,
            });
        }

        Ok(())
    }

    /// Every texel storing a vertex, the first one is always the texel of the lower subsection.
    fn vertex_texels(geometry: TileGeometry, vertex: IVec2) -> Vec<(u32, u32)> {
        let (x1, x2) = geometry.vertex_to_texels(vertex.x as u32);
        let (y1, y2) = geometry.vertex_to_texels(vertex.y as u32);

        [(x1, y1), (x2, y1), (x1, y2), (x2, y2)]
            .into_iter()
            .unique()
            .collect()
    }
}
