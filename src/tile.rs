use crate::{
    collision::{CollisionBuffer, CollisionRequest},
    texture::TextureHandle,
    weightmap::{AllocationSet, EditContext},
};
use bevy::{math::IVec2, utils::HashMap};
use derive_more::derive::{Display, From};
use itertools::Itertools;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, From, Display)]
#[display("tile#{_0}")]
pub struct TileId(u32);

impl TileId {
    pub fn index(self) -> u32 {
        self.0
    }
}

/// Who owns the data of a tile.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TileRole {
    /// The tile data is always resident and can be edited.
    Authoritative,
    /// The tile data is streamed in, it can only be edited while resident.
    Streaming { resident: bool },
}

impl TileRole {
    pub fn is_resident(self) -> bool {
        match self {
            TileRole::Authoritative => true,
            TileRole::Streaming { resident } => resident,
        }
    }
}

pub struct Tile {
    pub(crate) id: TileId,
    pub(crate) grid: IVec2,
    pub(crate) role: TileRole,
    pub(crate) heightmap: TextureHandle,
    pub(crate) weightmaps: HashMap<EditContext, AllocationSet>,
    pub(crate) collision: Option<CollisionBuffer>,
    /// Collision work, that was skipped because source data was not available.
    pub(crate) pending_collision: Option<CollisionRequest>,
}

impl Tile {
    pub(crate) fn new(id: TileId, grid: IVec2, role: TileRole, heightmap: TextureHandle) -> Self {
        Self {
            id,
            grid,
            role,
            heightmap,
            weightmaps: HashMap::default(),
            collision: None,
            pending_collision: None,
        }
    }

    pub fn id(&self) -> TileId {
        self.id
    }

    /// The position of the tile in the landscape grid, in tiles.
    pub fn grid(&self) -> IVec2 {
        self.grid
    }

    pub fn role(&self) -> TileRole {
        self.role
    }

    pub fn heightmap(&self) -> TextureHandle {
        self.heightmap
    }

    pub fn allocations(&self, edit_context: EditContext) -> Option<&AllocationSet> {
        self.weightmaps.get(&edit_context)
    }

    /// The base allocations, which the collision is derived from.
    pub fn base_allocations(&self) -> Option<&AllocationSet> {
        self.allocations(EditContext::Base)
    }

    /// All weightmaps the tile has channels in, over all edit contexts.
    pub fn weightmaps(&self) -> impl Iterator<Item = TextureHandle> + '_ {
        self.weightmaps
            .values()
            .flat_map(|set| set.textures().iter().copied())
            .unique()
    }

    pub fn collision(&self) -> Option<&CollisionBuffer> {
        self.collision.as_ref()
    }

    pub fn has_pending_collision(&self) -> bool {
        self.pending_collision.is_some()
    }
}
