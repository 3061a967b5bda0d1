use crate::result::PreprocessError;
use bevy_landscape::landscape::ProgressCallback;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::{
    path::PathBuf,
    str::FromStr,
    sync::atomic::{AtomicU64, Ordering},
};

const BAR_SIZE: u64 = 10000;

/// A paint layer and the weight mask it is imported from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LayerSource {
    pub name: String,
    pub path: PathBuf,
}

impl FromStr for LayerSource {
    type Err = PreprocessError;

    fn from_str(source: &str) -> Result<Self, Self::Err> {
        match source.split_once('=') {
            Some((name, path)) if !name.is_empty() && !path.is_empty() => Ok(Self {
                name: name.to_string(),
                path: PathBuf::from(path),
            }),
            _ => Err(PreprocessError::InvalidLayerSource(source.to_string())),
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "blpp", author, version, about)]
pub struct Cli {
    /// A 16-bit grayscale heightmap (TIFF or PNG) covering the whole landscape.
    #[arg(required = true)]
    pub heightmap: PathBuf,
    #[arg(required = true)]
    pub output_path: PathBuf,

    /// An 8-bit weight mask of a paint layer, as NAME=PATH.
    #[arg(short, long = "layer")]
    pub layers: Vec<LayerSource>,
    /// An 8-bit mask, where white marks holes.
    #[arg(long)]
    pub visibility: Option<PathBuf>,
    /// A RON landscape configuration, the subsection arguments are ignored if given.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[arg(short, long, default_value_t = false)]
    pub overwrite: bool,
    #[arg(short = 'n', long = "subsections", default_value_t = 1)]
    pub num_subsections: u32,
    #[arg(short = 'q', long = "quads", default_value_t = 63)]
    pub subsection_size_quads: u32,
}

pub(crate) struct PreprocessBar<'a> {
    name: String,
    bar: ProgressBar,
    callback: Box<ProgressCallback<'a>>,
}

impl PreprocessBar<'_> {
    pub(crate) fn new(name: &str) -> Self {
        let style = ProgressStyle::with_template(
            &(name.to_string() + ": {wide_bar} {percent} % [{elapsed}/{duration}]"),
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar());
        let bar = ProgressBar::new(BAR_SIZE).with_style(style);

        let callback = Box::new({
            let progress_bar = bar.clone();
            move |completion| {
                progress_bar.set_position((completion * BAR_SIZE as f64) as u64);
                true
            }
        });

        Self {
            name: name.to_string(),
            bar,
            callback,
        }
    }

    pub(crate) fn callback(&self) -> &ProgressCallback {
        self.callback.as_ref()
    }

    pub(crate) fn finish(&self) {
        self.bar.finish_and_clear();
        println!("{} took: {:?}", self.name, self.bar.elapsed());
    }
}

/// Reports the completion of a fixed number of steps, that may finish on any thread.
pub(crate) struct CountingProgressCallback<'a> {
    count: f64,
    counter: AtomicU64,
    progress_callback: Option<&'a ProgressCallback<'a>>,
}

impl<'a> CountingProgressCallback<'a> {
    pub(crate) fn new(count: usize, progress_callback: Option<&'a ProgressCallback<'a>>) -> Self {
        Self {
            count: count.max(1) as f64,
            counter: AtomicU64::new(1),
            progress_callback,
        }
    }

    pub(crate) fn increment(&self) -> bool {
        match self.progress_callback {
            Some(progress_callback) => {
                progress_callback(self.counter.fetch_add(1, Ordering::Relaxed) as f64 / self.count)
            }
            None => true,
        }
    }
}
