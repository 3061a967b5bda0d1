//! The collision representation of a tile.
//!
//! Heights and weights are resampled from an already generated mip (the collision mip) of the
//! render textures. Every collision vertex additionally stores its dominant paint layer and the
//! physical material of that layer. An optional coarser simple collision level is kept for
//! cheap queries.

use crate::{
    error::{LandscapeError, LandscapeResult},
    geometry::TileGeometry,
    heightmap::decode_height,
    holes::HoleSegmenter,
    layers::{LayerHandle, LayerRegistry},
    notify::{PhysicalMaterialId, PhysicalMaterialLookup},
    region::TexelRect,
    texture::{LandscapeTexture, TextureHandle, TexturePool},
    weightmap::AllocationSet,
};
use bevy::{
    log::{debug, warn},
    math::IVec2,
};
use itertools::Itertools;
use ndarray::Array2;

/// Marks collision vertices without any relevant layer.
pub const NO_DOMINANT_LAYER: u8 = u8::MAX;

/// Visibility weights above this value turn a collision vertex into a hole.
pub const DEFAULT_VISIBILITY_THRESHOLD: u8 = 170;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CollisionSettings {
    collision_mip: u32,
    simple_collision_mip: u32,
    visibility_threshold: u8,
}

impl CollisionSettings {
    /// Validates the collision mips against the subsection size of `geometry`.
    /// A `simple_collision_mip` equal to `collision_mip` disables simple collision.
    pub fn new(
        geometry: TileGeometry,
        collision_mip: u32,
        simple_collision_mip: u32,
    ) -> LandscapeResult<Self> {
        if collision_mip > simple_collision_mip {
            return Err(LandscapeError::CollisionMipOrder {
                collision: collision_mip,
                simple: simple_collision_mip,
            });
        }

        let max = geometry.max_collision_mip();
        if simple_collision_mip > max {
            return Err(LandscapeError::CollisionMipOutOfRange {
                mip: simple_collision_mip,
                max,
            });
        }

        Ok(Self {
            collision_mip,
            simple_collision_mip,
            visibility_threshold: DEFAULT_VISIBILITY_THRESHOLD,
        })
    }

    pub fn with_visibility_threshold(mut self, threshold: u8) -> Self {
        self.visibility_threshold = threshold;
        self
    }

    pub fn collision_mip(&self) -> u32 {
        self.collision_mip
    }

    pub fn simple_collision_mip(&self) -> u32 {
        self.simple_collision_mip
    }

    pub fn has_simple_collision(&self) -> bool {
        self.simple_collision_mip > self.collision_mip
    }
}

/// The collision data of one mip, all arrays are indexed `[[y, x]]`.
#[derive(Clone, Debug)]
pub struct CollisionLevel {
    pub mip: u32,
    pub heights: Array2<u16>,
    /// Index into [`CollisionBuffer::layers`], or [`NO_DOMINANT_LAYER`].
    pub dominant_layers: Array2<u8>,
    pub physical_materials: Array2<PhysicalMaterialId>,
    pub holes: Array2<bool>,
    /// The bounds of all connected hole regions, in collision vertices.
    pub hole_bounds: Vec<TexelRect>,
}

impl CollisionLevel {
    fn new(geometry: TileGeometry, mip: u32) -> Self {
        let size = geometry.collision_size_verts(mip) as usize;

        Self {
            mip,
            heights: Array2::zeros((size, size)),
            dominant_layers: Array2::from_elem((size, size), NO_DOMINANT_LAYER),
            physical_materials: Array2::from_elem((size, size), PhysicalMaterialId::DEFAULT),
            holes: Array2::from_elem((size, size), false),
            hole_bounds: Vec::new(),
        }
    }

    pub fn size(&self) -> u32 {
        self.heights.nrows() as u32
    }
}

#[derive(Clone, Debug)]
pub struct CollisionBuffer {
    /// The layers the dominant layer indices refer to, in allocation order.
    pub layers: Vec<LayerHandle>,
    pub collision: CollisionLevel,
    pub simple: Option<CollisionLevel>,
}

impl CollisionBuffer {
    pub fn height_at(&self, vertex: IVec2) -> Option<u16> {
        self.collision
            .heights
            .get([vertex.y as usize, vertex.x as usize])
            .copied()
    }

    pub fn dominant_layer_at(&self, vertex: IVec2) -> Option<LayerHandle> {
        let index = *self
            .collision
            .dominant_layers
            .get([vertex.y as usize, vertex.x as usize])?;
        self.layers.get(index as usize).copied()
    }

    pub fn is_hole(&self, vertex: IVec2) -> bool {
        self.collision
            .holes
            .get([vertex.y as usize, vertex.x as usize])
            .copied()
            .unwrap_or(false)
    }
}

/// Collision work of a tile.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CollisionRequest {
    Full,
    /// A region in vertex space.
    Region(TexelRect),
}

impl CollisionRequest {
    pub fn merge(self, other: CollisionRequest) -> CollisionRequest {
        match (self, other) {
            (CollisionRequest::Region(a), CollisionRequest::Region(b)) => {
                CollisionRequest::Region(a.union(&b))
            }
            _ => CollisionRequest::Full,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CollisionUpdate {
    /// The whole buffer was recomputed.
    Rebuilt,
    /// Only the given collision vertices were recomputed.
    Updated(TexelRect),
    /// The source data is not available yet, the buffer was left untouched.
    Deferred,
}

/// The source data of a tile's collision.
pub struct CollisionSources<'a> {
    pub heightmap: TextureHandle,
    pub allocations: &'a AllocationSet,
}

struct WeightSource<'a> {
    layer: LayerHandle,
    texture: &'a LandscapeTexture,
    channel: usize,
    /// `None` for layers without layer info, which never become dominant.
    min_weight: Option<u8>,
}

/// Keeps collision buffers in sync with the render textures.
#[derive(Copy, Clone, Debug)]
pub struct CollisionSync {
    geometry: TileGeometry,
    settings: CollisionSettings,
    segmenter: HoleSegmenter,
}

impl CollisionSync {
    pub fn new(geometry: TileGeometry, settings: CollisionSettings) -> Self {
        Self {
            geometry,
            settings,
            segmenter: HoleSegmenter::default(),
        }
    }

    pub fn with_hole_segmenter(mut self, segmenter: HoleSegmenter) -> Self {
        self.segmenter = segmenter;
        self
    }

    pub fn settings(&self) -> &CollisionSettings {
        &self.settings
    }

    /// Updates `buffer` after the vertices in `region` changed (`None` for the whole tile).
    ///
    /// The buffer is rebuilt from scratch if it was never populated or the allocated layers
    /// changed. If any source texture is not ready, the buffer is left stale and
    /// [`CollisionUpdate::Deferred`] is returned.
    pub fn update(
        &self,
        buffer: &mut Option<CollisionBuffer>,
        pool: &TexturePool,
        registry: &LayerRegistry,
        sources: CollisionSources,
        region: Option<TexelRect>,
        materials: &dyn PhysicalMaterialLookup,
    ) -> CollisionUpdate {
        let Some(heightmap) = pool.get(sources.heightmap).filter(|t| t.is_ready()) else {
            debug!("Deferred collision update, the heightmap is not ready.");
            return CollisionUpdate::Deferred;
        };

        let weights: Option<Vec<WeightSource>> = sources
            .allocations
            .iter()
            .map(|(layer, texture, channel)| {
                let texture = pool.get(texture).filter(|t| t.is_ready())?;
                let min_weight = registry.get(layer).map(|info| info.min_collision_weight());

                Some(WeightSource {
                    layer,
                    texture,
                    channel,
                    min_weight,
                })
            })
            .collect();

        let Some(weights) = weights else {
            debug!("Deferred collision update, a weightmap is not ready.");
            return CollisionUpdate::Deferred;
        };

        for source in weights.iter().filter(|source| source.min_weight.is_none()) {
            warn!(
                "Layer {} has no layer info, it is ignored by the collision.",
                source.layer
            );
        }

        let layers = sources.allocations.layers().collect_vec();
        let rebuild = region.is_none()
            || buffer
                .as_ref()
                .map_or(true, |buffer| buffer.layers != layers);

        if rebuild {
            let mut collision = CollisionLevel::new(self.geometry, self.settings.collision_mip);
            let mut simple = self
                .settings
                .has_simple_collision()
                .then(|| CollisionLevel::new(self.geometry, self.settings.simple_collision_mip));

            for level in std::iter::once(&mut collision).chain(simple.as_mut()) {
                let full = TexelRect::square(level.size());
                self.resample(level, full, heightmap, &weights, materials);
            }

            *buffer = Some(CollisionBuffer {
                layers,
                collision,
                simple,
            });

            return CollisionUpdate::Rebuilt;
        }

        let (Some(buffer), Some(region)) = (buffer.as_mut(), region) else {
            unreachable!("checked by the rebuild condition");
        };

        let mut updated = None;
        for level in std::iter::once(&mut buffer.collision).chain(buffer.simple.as_mut()) {
            let rect = self.geometry.vertex_rect_to_collision(region, level.mip);
            self.resample(level, rect, heightmap, &weights, materials);
            updated.get_or_insert(rect);
        }

        updated.map_or(CollisionUpdate::Rebuilt, CollisionUpdate::Updated)
    }

    /// The texel of `mip`, that stores a collision vertex along one axis.
    fn collision_to_texel(&self, mip: u32, vertex: u32) -> u32 {
        let quads = self.geometry.mip_subsection_size_quads(mip);
        let subsection = (vertex / quads).min(self.geometry.num_subsections - 1);
        subsection * (quads + 1) + vertex - subsection * quads
    }

    fn resample(
        &self,
        level: &mut CollisionLevel,
        rect: TexelRect,
        heightmap: &LandscapeTexture,
        weights: &[WeightSource],
        materials: &dyn PhysicalMaterialLookup,
    ) {
        let Some(rect) = rect.clamp_to(level.size()) else {
            return;
        };
        let mip = level.mip;

        for vertex in rect.iter() {
            let x = self.collision_to_texel(mip, vertex.x);
            let y = self.collision_to_texel(mip, vertex.y);
            let index = [vertex.y as usize, vertex.x as usize];

            let mut best = 0;
            let mut dominant = None;
            let mut hole = false;

            for (position, source) in weights.iter().enumerate() {
                let weight = source.texture.channel(mip, x, y, source.channel);

                if source.layer.is_visibility() {
                    hole |= weight > self.settings.visibility_threshold;
                } else if weight > best && source.min_weight.is_some_and(|min| weight >= min) {
                    best = weight;
                    dominant = Some(position);
                }
            }

            // Holes override every other layer.
            if hole {
                dominant = weights.iter().position(|source| source.layer.is_visibility());
            }

            level.heights[index] = decode_height(heightmap.texel(mip, x, y));
            level.holes[index] = hole;
            level.dominant_layers[index] = dominant_layer_index(dominant);
            level.physical_materials[index] =
                materials.physical_material(dominant.map(|d| weights[d].layer));
        }

        let mask = level.holes.mapv(|hole| if hole { u8::MAX } else { 0 });
        level.hole_bounds = self.segmenter.segment(mask.view());
    }
}

/// Converts the position of the dominant weight source into a stored layer index.
/// Positions, that don't fit below [`NO_DOMINANT_LAYER`], are stored as no dominant layer.
fn dominant_layer_index(position: Option<usize>) -> u8 {
    position
        .and_then(|position| u8::try_from(position).ok())
        .filter(|&index| index != NO_DOMINANT_LAYER)
        .unwrap_or(NO_DOMINANT_LAYER)
}
