use crate::{
    collision::CollisionLevel,
    error::{LandscapeError, LandscapeResult},
    formats::{HeightField, WeightField},
    texture::LandscapeTexture,
};
use image::{DynamicImage, ImageBuffer, ImageFormat, Luma, RgbaImage};
use ndarray::Array2;
use std::{fs, io::Cursor, path::Path};

fn decode(bytes: &[u8]) -> LandscapeResult<DynamicImage> {
    Ok(image::load_from_memory_with_format(bytes, ImageFormat::Png)?)
}

fn shape_error(_: ndarray::ShapeError) -> LandscapeError {
    LandscapeError::UnsupportedImage("image size does not match its data".into())
}

/// Decodes a PNG into 16-bit heights, color images are converted to luma first.
pub fn decode_png_heights(bytes: &[u8]) -> LandscapeResult<HeightField> {
    let image = decode(bytes)?.into_luma16();
    let (width, height) = image.dimensions();

    let samples = Array2::from_shape_vec((height as usize, width as usize), image.into_raw())
        .map_err(shape_error)?;
    Ok(HeightField::new(samples))
}

/// Decodes an 8-bit weight mask.
pub fn decode_png_weights(bytes: &[u8]) -> LandscapeResult<WeightField> {
    let image = decode(bytes)?.into_luma8();
    let (width, height) = image.dimensions();

    let samples = Array2::from_shape_vec((height as usize, width as usize), image.into_raw())
        .map_err(shape_error)?;
    Ok(WeightField::new(samples))
}

/// Encodes one mip of a texture as an RGBA8 PNG, channels are written as stored.
pub fn encode_texture_mip_png(texture: &LandscapeTexture, mip: u32) -> LandscapeResult<Vec<u8>> {
    let size = texture.mip_size(mip);
    let image = RgbaImage::from_raw(size, size, texture.mip_bytes(mip).to_vec())
        .ok_or_else(|| LandscapeError::UnsupportedImage(format!("mip {mip} is incomplete")))?;

    let mut bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(bytes)
}

/// Encodes the heights of a collision level as a 16-bit grayscale PNG.
pub fn encode_collision_png(level: &CollisionLevel) -> LandscapeResult<Vec<u8>> {
    let size = level.size();
    let heights = level.heights.iter().copied().collect();
    let image = ImageBuffer::<Luma<u16>, Vec<u16>>::from_raw(size, size, heights)
        .ok_or_else(|| LandscapeError::UnsupportedImage("collision heights are incomplete".into()))?;

    let mut bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(bytes)
}

pub fn save_texture_mip_png<P: AsRef<Path>>(
    texture: &LandscapeTexture,
    mip: u32,
    path: P,
) -> LandscapeResult<()> {
    fs::write(path, encode_texture_mip_png(texture, mip)?)?;
    Ok(())
}

pub fn save_collision_png<P: AsRef<Path>>(level: &CollisionLevel, path: P) -> LandscapeResult<()> {
    fs::write(path, encode_collision_png(level)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::texture::{TextureKind, TextureState};

    #[test]
    fn texture_mips_export_as_stored() {
        let mut texture = LandscapeTexture::new(TextureKind::Weightmap, 4, TextureState::Ready);
        texture.set_texel(1, 1, 0, [1, 2, 3, 4]);

        let bytes = encode_texture_mip_png(&texture, 1).unwrap();
        let image = image::load_from_memory(&bytes).unwrap().into_rgba8();

        assert_eq!(image.dimensions(), (2, 2));
        assert_eq!(image.get_pixel(1, 0).0, [1, 2, 3, 4]);
        assert_eq!(image.into_raw(), texture.mip_bytes(1));
    }

    #[test]
    fn sixteen_bit_pngs_decode_to_heights() {
        let image = ImageBuffer::<Luma<u16>, Vec<u16>>::from_raw(2, 1, vec![513, 40000]).unwrap();
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();

        let field = decode_png_heights(&bytes).unwrap();

        assert_eq!(field.samples().as_slice().unwrap(), &[513, 40000]);
    }

    #[test]
    fn weight_masks_decode_as_luma() {
        let image = image::GrayImage::from_raw(1, 2, vec![0, 200]).unwrap();
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();

        let field = decode_png_weights(&bytes).unwrap();

        assert_eq!(field.size(), bevy::math::UVec2::new(1, 2));
        assert_eq!(field.samples()[[1, 0]], 200);
    }
}
