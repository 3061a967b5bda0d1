use crate::{
    collision::{CollisionSettings, DEFAULT_VISIBILITY_THRESHOLD},
    error::LandscapeResult,
    geometry::TileGeometry,
    holes::DEFAULT_HOLE_THRESHOLD,
};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

/// The persistent configuration of a landscape, stored as RON.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LandscapeConfig {
    pub num_subsections: u32,
    pub subsection_size_quads: u32,
    pub collision_mip_level: u32,
    /// Equal to `collision_mip_level` if there is no simple collision.
    pub simple_collision_mip_level: u32,
    /// World units per quad.
    pub quad_scale: f32,
    /// World units per height step.
    pub height_scale: f32,
    pub visibility_threshold: u8,
    pub hole_threshold: u8,
    /// The number of tiles reallocated between two progress reports.
    pub reallocation_chunk_size: usize,
}

impl Default for LandscapeConfig {
    fn default() -> Self {
        Self {
            num_subsections: 1,
            subsection_size_quads: 63,
            collision_mip_level: 0,
            simple_collision_mip_level: 0,
            quad_scale: 1.0,
            height_scale: 1.0 / 128.0,
            visibility_threshold: DEFAULT_VISIBILITY_THRESHOLD,
            hole_threshold: DEFAULT_HOLE_THRESHOLD,
            reallocation_chunk_size: 16,
        }
    }
}

impl LandscapeConfig {
    pub fn geometry(&self) -> LandscapeResult<TileGeometry> {
        TileGeometry::new(self.num_subsections, self.subsection_size_quads)
    }

    pub fn collision_settings(&self) -> LandscapeResult<CollisionSettings> {
        Ok(CollisionSettings::new(
            self.geometry()?,
            self.collision_mip_level,
            self.simple_collision_mip_level,
        )?
        .with_visibility_threshold(self.visibility_threshold))
    }

    /// Converts one height step into quads, as needed for normals.
    pub fn z_scale(&self) -> f32 {
        self.height_scale / self.quad_scale
    }

    pub fn decode_alloc(encoded: &str) -> Result<Self> {
        Ok(ron::from_str(encoded)?)
    }

    pub fn encode_alloc(&self) -> Result<String> {
        Ok(ron::ser::to_string_pretty(
            self,
            ron::ser::PrettyConfig::default(),
        )?)
    }

    pub fn load_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let encoded = fs::read_to_string(path)?;
        Self::decode_alloc(&encoded)
    }

    pub fn save_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let encoded = self.encode_alloc()?;
        fs::write(path, encoded)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LandscapeError;

    #[test]
    fn missing_fields_use_defaults() {
        let config = LandscapeConfig::decode_alloc("(num_subsections: 2, subsection_size_quads: 7)")
            .unwrap();

        assert_eq!(config.num_subsections, 2);
        assert_eq!(config.quad_scale, 1.0);
        assert_eq!(config.reallocation_chunk_size, 16);
        assert_eq!(config.geometry().unwrap().verts_per_side(), 16);
    }

    #[test]
    fn encoded_config_decodes_to_the_same_value() {
        let config = LandscapeConfig {
            collision_mip_level: 1,
            simple_collision_mip_level: 2,
            ..Default::default()
        };

        let decoded = LandscapeConfig::decode_alloc(&config.encode_alloc().unwrap()).unwrap();

        assert_eq!(decoded, config);
    }

    #[test]
    fn invalid_collision_mips_are_rejected() {
        let config = LandscapeConfig {
            collision_mip_level: 3,
            simple_collision_mip_level: 2,
            ..Default::default()
        };

        assert!(matches!(
            config.collision_settings(),
            Err(LandscapeError::CollisionMipOrder { .. })
        ));
    }
}
