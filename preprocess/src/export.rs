use crate::{
    cli::CountingProgressCallback,
    result::{PreprocessError, PreprocessResult},
};
use bevy_landscape::{
    config::LandscapeConfig,
    formats::{save_collision_png, save_texture_mip_png},
    landscape::{Landscape, ProgressCallback},
    layers::LayerHandle,
    texture::{TextureHandle, TextureKind},
};
use itertools::Itertools;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub struct AllocationSummary {
    pub layer: String,
    pub texture: String,
    pub channel: usize,
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub struct TileSummary {
    pub grid: (i32, i32),
    pub heightmap: String,
    pub allocations: Vec<AllocationSummary>,
    pub collision: Option<String>,
    pub simple_collision: Option<String>,
}

/// The index of all written files, stored as `landscape.ron`.
#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub struct LandscapeSummary {
    pub config: LandscapeConfig,
    pub layers: Vec<String>,
    pub tiles: Vec<TileSummary>,
}

fn texture_name(handle: TextureHandle, kind: TextureKind) -> String {
    match kind {
        TextureKind::Heightmap => format!("heightmaps/{}", handle.index()),
        TextureKind::Weightmap => format!("weightmaps/{}", handle.index()),
    }
}

/// Writes every mip of every texture as PNG.
pub(crate) fn export_textures(
    landscape: &Landscape,
    output_path: &Path,
    progress_callback: Option<&ProgressCallback>,
) -> PreprocessResult<()> {
    fs::create_dir_all(output_path.join("heightmaps"))?;
    fs::create_dir_all(output_path.join("weightmaps"))?;

    let progress_callback =
        CountingProgressCallback::new(landscape.textures().len(), progress_callback);

    landscape
        .textures()
        .iter()
        .par_bridge()
        .try_for_each(|(handle, texture)| {
            let name = texture_name(handle, texture.kind());

            for mip in 0..texture.mip_count() {
                let path = output_path.join(format!("{name}_mip{mip}.png"));
                save_texture_mip_png(texture, mip, path)?;
            }

            if progress_callback.increment() {
                Ok(())
            } else {
                Err(PreprocessError::Cancelled)
            }
        })
}

/// Writes the collision heights of every tile and the summary of the landscape.
pub(crate) fn export_collision_and_summary(
    landscape: &Landscape,
    output_path: &Path,
) -> PreprocessResult<LandscapeSummary> {
    fs::create_dir_all(output_path.join("collision"))?;

    let layer_name = |layer: LayerHandle| {
        landscape
            .layers()
            .get(layer)
            .map_or_else(|| layer.to_string(), |info| info.name.clone())
    };

    let tiles = landscape
        .tiles()
        .map(|tile| {
            let grid = tile.grid();
            let mut summary = TileSummary {
                grid: (grid.x, grid.y),
                heightmap: texture_name(tile.heightmap(), TextureKind::Heightmap),
                allocations: tile
                    .base_allocations()
                    .into_iter()
                    .flat_map(|set| set.iter())
                    .map(|(layer, texture, channel)| AllocationSummary {
                        layer: layer_name(layer),
                        texture: texture_name(texture, TextureKind::Weightmap),
                        channel,
                    })
                    .collect_vec(),
                collision: None,
                simple_collision: None,
            };

            if let Some(collision) = tile.collision() {
                let name = format!("collision/{}_{}", grid.x, grid.y);
                save_collision_png(&collision.collision, output_path.join(format!("{name}.png")))?;
                summary.collision = Some(name.clone());

                if let Some(simple) = &collision.simple {
                    let name = format!("{name}_simple");
                    save_collision_png(simple, output_path.join(format!("{name}.png")))?;
                    summary.simple_collision = Some(name);
                }
            }

            Ok(summary)
        })
        .collect::<PreprocessResult<Vec<_>>>()?;

    let summary = LandscapeSummary {
        config: landscape.config().clone(),
        layers: landscape
            .layers()
            .iter()
            .sorted_by_key(|&(handle, _)| handle)
            .map(|(_, info)| info.name.clone())
            .collect(),
        tiles,
    };

    let encoded = ron::ser::to_string_pretty(&summary, ron::ser::PrettyConfig::default())?;
    fs::write(output_path.join("landscape.ron"), encoded)?;

    Ok(summary)
}
