use bevy_landscape::error::LandscapeError;
use glam::UVec2;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PreprocessError {
    #[error("layer sources are given as NAME=PATH, got {0}")]
    InvalidLayerSource(String),
    #[error("{path:?} is {actual} pixels, but the heightmap is {expected}")]
    SizeMismatch {
        path: PathBuf,
        expected: UVec2,
        actual: UVec2,
    },
    #[error("the output directory {0:?} is not empty, pass --overwrite to replace it")]
    OutputExists(PathBuf),
    #[error("the configuration could not be loaded: {0}")]
    Config(String),
    #[error("preprocessing was cancelled")]
    Cancelled,
    #[error("landscape error")]
    Landscape(#[from] LandscapeError),
    #[error("I/O error")]
    Io(#[from] std::io::Error),
    #[error("RON error")]
    Ron(#[from] ron::Error),
}

pub type PreprocessResult<T> = Result<T, PreprocessError>;
