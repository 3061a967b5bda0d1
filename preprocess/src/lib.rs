mod cli;
mod context;
mod export;
mod import;
mod result;

use crate::{
    cli::{CountingProgressCallback, PreprocessBar},
    context::PreprocessContext,
    export::{export_collision_and_summary, export_textures, LandscapeSummary},
    import::{allocate_layers, create_tiles, import_data},
    result::PreprocessResult,
};
use bevy_landscape::{
    edit::DeferredWork,
    landscape::{Landscape, ProgressCallback},
};
use rayon::prelude::*;
use std::{mem, time::Instant};

pub mod prelude {
    pub use crate::{
        cli::{Cli, LayerSource},
        context::PreprocessContext,
        export::{AllocationSummary, LandscapeSummary, TileSummary},
        preprocess,
        result::{PreprocessError, PreprocessResult},
    };
}

/// Regenerates the deferred mips of all textures in parallel.
fn generate_mips(
    landscape: &mut Landscape,
    deferred: &mut DeferredWork,
    progress_callback: Option<&ProgressCallback>,
) {
    let mips = mem::take(&mut deferred.mips);
    let generator = landscape.mip_generator();
    let progress_callback = CountingProgressCallback::new(mips.len(), progress_callback);

    landscape
        .textures_mut()
        .iter_mut()
        .par_bridge()
        .for_each(|(handle, texture)| {
            if let Some(work) = mips.get(&handle) {
                generator.generate(texture, work.region, work.channels);
                progress_callback.increment();
            }
        });
}

/// Imports the heightmap and weight masks of `context` into a new landscape, bakes mips and
/// collision and writes everything to the output directory.
pub fn preprocess(context: &PreprocessContext) -> PreprocessResult<LandscapeSummary> {
    let start_preprocessing = Instant::now();
    let mut landscape = Landscape::new(context.config.clone())?;

    let tiles = create_tiles(&mut landscape, context)?;

    let progress_bar = PreprocessBar::new("Allocating");
    let layers = allocate_layers(&mut landscape, context, &tiles, Some(progress_bar.callback()))?;
    progress_bar.finish();

    let progress_bar = PreprocessBar::new("Importing");
    let mut deferred = import_data(
        &mut landscape,
        context,
        &tiles,
        &layers,
        Some(progress_bar.callback()),
    )?;
    progress_bar.finish();

    let progress_bar = PreprocessBar::new("Generating mips");
    generate_mips(&mut landscape, &mut deferred, Some(progress_bar.callback()));
    progress_bar.finish();

    let progress_bar = PreprocessBar::new("Building collision");
    landscape.complete_deferred(deferred);
    progress_bar.finish();

    let progress_bar = PreprocessBar::new("Exporting");
    export_textures(&landscape, &context.output_path, Some(progress_bar.callback()))?;
    let summary = export_collision_and_summary(&landscape, &context.output_path)?;
    progress_bar.finish();

    println!(
        "Preprocessing {} tiles took: {:?}",
        summary.tiles.len(),
        start_preprocessing.elapsed()
    );

    Ok(summary)
}
