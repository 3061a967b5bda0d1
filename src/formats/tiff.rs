use crate::{
    error::{LandscapeError, LandscapeResult},
    formats::HeightField,
};
use ndarray::Array2;
use std::io::Cursor;
use tiff::decoder::{Decoder, DecodingResult};

/// Decodes a single channel TIFF into 16-bit heights.
/// 8-bit data is widened and floating point data is expected in `0..=1`.
pub fn decode_tiff_heights(bytes: &[u8]) -> LandscapeResult<HeightField> {
    let mut decoder = Decoder::new(Cursor::new(bytes))?;
    let (width, height) = decoder.dimensions()?;

    let heights = match decoder.read_image()? {
        DecodingResult::U16(data) => data,
        DecodingResult::U8(data) => data.into_iter().map(|value| value as u16 * 257).collect(),
        DecodingResult::F32(data) => data
            .into_iter()
            .map(|value| (value.clamp(0.0, 1.0) * u16::MAX as f32).round() as u16)
            .collect(),
        _ => {
            return Err(LandscapeError::UnsupportedImage(
                "heightmap TIFFs store 8-bit, 16-bit or 32-bit float samples".into(),
            ))
        }
    };

    let samples = Array2::from_shape_vec((height as usize, width as usize), heights).map_err(
        |_| LandscapeError::UnsupportedImage("heightmap TIFFs have a single channel".into()),
    )?;

    Ok(HeightField::new(samples))
}
