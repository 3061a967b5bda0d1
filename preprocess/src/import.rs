use crate::{
    cli::CountingProgressCallback,
    context::PreprocessContext,
    result::{PreprocessError, PreprocessResult},
};
use bevy_landscape::{
    edit::{DeferredWork, EditFlags, HeightEdit, WeightEdit},
    formats::WeightField,
    landscape::{Landscape, ProgressCallback},
    layers::{LayerHandle, LayerInfo},
    region::TexelRect,
    tile::{TileId, TileRole},
};
use glam::IVec2;
use itertools::{iproduct, Itertools};

/// A created tile and the part of the source images it covers.
pub(crate) struct ImportTile {
    pub(crate) id: TileId,
    /// Source pixels, one per tile vertex.
    pub(crate) source: TexelRect,
}

/// Creates one tile per `ComponentSizeQuads` of the source heightmap, rounding up.
pub(crate) fn create_tiles(
    landscape: &mut Landscape,
    context: &PreprocessContext,
) -> PreprocessResult<Vec<ImportTile>> {
    let quads = landscape.geometry().component_size_quads() as i32;
    let size = context.heights.size().as_ivec2();
    let tile_count = ((size - 2).max(IVec2::ZERO) / quads) + 1;

    iproduct!(0..tile_count.y, 0..tile_count.x)
        .map(|(y, x)| {
            let grid = IVec2::new(x, y);
            let id = landscape.add_tile(grid, TileRole::Authoritative)?;
            let source = landscape.geometry().vertex_rect().offset(grid * quads);

            Ok(ImportTile { id, source })
        })
        .collect()
}

/// Registers all layers and allocates, per tile, only the layers that carry weight there.
pub(crate) fn allocate_layers(
    landscape: &mut Landscape,
    context: &PreprocessContext,
    tiles: &[ImportTile],
    progress_callback: Option<&ProgressCallback>,
) -> PreprocessResult<Vec<(LayerHandle, usize)>> {
    let layers = context
        .layers
        .iter()
        .enumerate()
        .map(|(index, (name, _))| (landscape.register_layer(LayerInfo::new(name)), index))
        .collect_vec();

    let requests = tiles
        .iter()
        .map(|tile| {
            let mut requested = layers
                .iter()
                .filter(|&&(_, index)| context.layers[index].1.has_weight_in(tile.source))
                .map(|&(layer, _)| layer)
                .collect_vec();

            if has_holes(context.visibility.as_ref(), tile.source) {
                requested.push(LayerHandle::VISIBILITY);
            }

            (tile.id, requested)
        })
        .collect_vec();

    let done = landscape.reallocate_tiles(&requests, false, &|completion: f64| {
        progress_callback.map_or(true, |callback| callback(completion))
    })?;

    if done < requests.len() {
        return Err(PreprocessError::Cancelled);
    }

    Ok(layers)
}

fn has_holes(visibility: Option<&WeightField>, source: TexelRect) -> bool {
    visibility.is_some_and(|mask| mask.has_weight_in(source))
}

/// Writes mip 0 of every tile. Mips and collision are left to the returned work.
pub(crate) fn import_data(
    landscape: &mut Landscape,
    context: &PreprocessContext,
    tiles: &[ImportTile],
    layers: &[(LayerHandle, usize)],
    progress_callback: Option<&ProgressCallback>,
) -> PreprocessResult<DeferredWork> {
    let progress_callback = CountingProgressCallback::new(tiles.len(), progress_callback);
    let vertices = landscape.geometry().vertex_rect();

    let mut scope = landscape.scoped(EditFlags::empty());

    for tile in tiles {
        scope.apply_height_edit(&HeightEdit::new(
            tile.id,
            vertices,
            context.heights.region(tile.source),
        ))?;

        let allocated = scope
            .tile(tile.id)?
            .base_allocations()
            .map(|set| set.layers().collect_vec())
            .unwrap_or_default();

        for &(layer, index) in layers {
            if allocated.contains(&layer) {
                let weights = context.layers[index].1.region(tile.source);
                scope.apply_weight_edit(&WeightEdit::new(tile.id, layer, vertices, weights))?;
            }
        }

        if let Some(visibility) = &context.visibility {
            if allocated.contains(&LayerHandle::VISIBILITY) {
                let weights = visibility.region(tile.source);
                scope.apply_weight_edit(&WeightEdit::new(
                    tile.id,
                    LayerHandle::VISIBILITY,
                    vertices,
                    weights,
                ))?;
            }
        }

        if !progress_callback.increment() {
            return Err(PreprocessError::Cancelled);
        }
    }

    Ok(scope.into_deferred())
}
