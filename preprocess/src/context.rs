use crate::{
    cli::{Cli, LayerSource},
    result::{PreprocessError, PreprocessResult},
};
use bevy_landscape::{
    config::LandscapeConfig,
    formats::{HeightField, WeightField},
};
use std::{
    fs,
    path::{Path, PathBuf},
};

/// All inputs of a preprocessing run, loaded and validated.
pub struct PreprocessContext {
    pub(crate) config: LandscapeConfig,
    pub(crate) heights: HeightField,
    pub(crate) layers: Vec<(String, WeightField)>,
    pub(crate) visibility: Option<WeightField>,
    pub(crate) output_path: PathBuf,
}

impl PreprocessContext {
    pub fn from_cli(args: Cli) -> PreprocessResult<Self> {
        let Cli {
            heightmap,
            output_path,
            layers,
            visibility,
            config,
            overwrite,
            num_subsections,
            subsection_size_quads,
        } = args;

        let config = match config {
            Some(path) => LandscapeConfig::load_file(&path)
                .map_err(|error| PreprocessError::Config(format!("{path:?}: {error}")))?,
            None => LandscapeConfig {
                num_subsections,
                subsection_size_quads,
                ..Default::default()
            },
        };

        prepare_output(&output_path, overwrite)?;

        let heights = HeightField::load_file(&heightmap)?;

        let load_mask = |path: PathBuf| -> PreprocessResult<WeightField> {
            let mask = WeightField::load_file(&path)?;

            if mask.size() != heights.size() {
                return Err(PreprocessError::SizeMismatch {
                    path,
                    expected: heights.size(),
                    actual: mask.size(),
                });
            }

            Ok(mask)
        };

        let layers = layers
            .into_iter()
            .map(|LayerSource { name, path }| Ok((name, load_mask(path)?)))
            .collect::<PreprocessResult<Vec<_>>>()?;
        let visibility = visibility.map(load_mask).transpose()?;

        Ok(Self::new(config, heights, layers, visibility, output_path))
    }

    pub fn new(
        config: LandscapeConfig,
        heights: HeightField,
        layers: Vec<(String, WeightField)>,
        visibility: Option<WeightField>,
        output_path: PathBuf,
    ) -> Self {
        Self {
            config,
            heights,
            layers,
            visibility,
            output_path,
        }
    }
}

fn prepare_output(path: &Path, overwrite: bool) -> PreprocessResult<()> {
    if path.exists() && fs::read_dir(path)?.next().is_some() {
        if !overwrite {
            return Err(PreprocessError::OutputExists(path.to_path_buf()));
        }

        fs::remove_dir_all(path)?;
    }

    fs::create_dir_all(path)?;
    Ok(())
}
