//! Block entities and the occupancy index
//!
//! The store owns every placed tile. Entities are never reindexed after
//! packing, so an entity's array position doubles as its render slot.

use glam::{IVec2, Vec2};
use serde::{Deserialize, Serialize};

use crate::cell_to_world;
use crate::contestants::ContestantId;

/// Stable, monotonic block identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockId(pub u32);

/// Integer rectangle over grid cells, `max` exclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridBox {
    pub min: IVec2,
    pub max: IVec2,
}

impl GridBox {
    pub fn new(min: IVec2, max: IVec2) -> Self {
        Self { min, max }
    }

    #[inline]
    pub fn size(&self) -> IVec2 {
        self.max - self.min
    }

    #[inline]
    pub fn area(&self) -> i32 {
        let s = self.size();
        s.x * s.y
    }

    /// Center in cell coordinates
    pub fn center(&self) -> Vec2 {
        (self.min + self.max).as_vec2() * 0.5
    }

    pub fn contains(&self, cell: IVec2) -> bool {
        cell.cmpge(self.min).all() && cell.cmplt(self.max).all()
    }

    pub fn is_square(&self) -> bool {
        let s = self.size();
        s.x == s.y
    }

    /// Clip this box to the bounds of another
    pub fn clamp_to(&self, other: &GridBox) -> GridBox {
        GridBox::new(self.min.max(other.min), self.max.min(other.max))
    }
}

/// Mesh shape on top of a block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TopShape {
    #[default]
    Flat,
    Bevel,
    Dome,
    Pyramid,
    Studs,
    Ridge,
}

impl TopShape {
    pub const ALL: [TopShape; 6] = [
        TopShape::Flat,
        TopShape::Bevel,
        TopShape::Dome,
        TopShape::Pyramid,
        TopShape::Studs,
        TopShape::Ridge,
    ];

    /// The bottom shape this top sits on
    pub fn bottom(self) -> BottomShape {
        match self {
            TopShape::Flat | TopShape::Studs => BottomShape::Pillar,
            TopShape::Bevel | TopShape::Ridge => BottomShape::Chamfered,
            TopShape::Dome | TopShape::Pyramid => BottomShape::Tapered,
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TopShape::Flat => "top/flat",
            TopShape::Bevel => "top/bevel",
            TopShape::Dome => "top/dome",
            TopShape::Pyramid => "top/pyramid",
            TopShape::Studs => "top/studs",
            TopShape::Ridge => "top/ridge",
        }
    }
}

/// Mesh shape under a block's top
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BottomShape {
    #[default]
    Pillar,
    Chamfered,
    Tapered,
}

impl BottomShape {
    pub const ALL: [BottomShape; 3] = [BottomShape::Pillar, BottomShape::Chamfered, BottomShape::Tapered];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BottomShape::Pillar => "bottom/pillar",
            BottomShape::Chamfered => "bottom/chamfered",
            BottomShape::Tapered => "bottom/tapered",
        }
    }
}

/// One placed tile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockEntity {
    pub id: BlockId,
    pub grid_box: GridBox,
    pub top: TopShape,
    pub bottom: BottomShape,
    /// Current rendered top height (never negative)
    pub height: f32,
    /// Height change applied in the last frame
    pub height_velocity: f32,
    /// Height the block eases toward while the wave field is frozen
    pub target_height: f32,
    /// Yaw in radians (multiple of π/2 for squares, π otherwise)
    pub rotation: f32,
    pub top_color_index: usize,
    pub highlighted: bool,
    /// Tile came from the forced-square branch of the packer
    pub forced_square: bool,
    /// Weak reference into the contestant roster
    pub contestant: Option<ContestantId>,
    /// World-space ground center, cached at packing time
    pub center: Vec2,
    /// Footprint in cells, cached at packing time
    pub size: Vec2,
}

impl BlockEntity {
    pub fn new(id: BlockId, grid_box: GridBox, top: TopShape, zone: IVec2) -> Self {
        Self {
            id,
            grid_box,
            top,
            bottom: top.bottom(),
            height: crate::consts::BASE_HEIGHT,
            height_velocity: 0.0,
            target_height: crate::consts::BASE_HEIGHT,
            rotation: 0.0,
            top_color_index: 0,
            highlighted: false,
            forced_square: false,
            contestant: None,
            center: cell_to_world(grid_box.center(), zone),
            size: grid_box.size().as_vec2(),
        }
    }
}

/// Owner of all block entities plus the cell → owner index
#[derive(Debug, Clone, Default)]
pub struct BlockStore {
    zone: IVec2,
    blocks: Vec<BlockEntity>,
    occupancy: Vec<Option<BlockId>>,
    next_id: u32,
}

impl BlockStore {
    pub fn new(zone: IVec2) -> Self {
        let cells = zone.x.max(0) as usize * zone.y.max(0) as usize;
        Self {
            zone,
            blocks: Vec::new(),
            occupancy: vec![None; cells],
            next_id: 1,
        }
    }

    pub fn zone(&self) -> IVec2 {
        self.zone
    }

    pub fn zone_box(&self) -> GridBox {
        GridBox::new(IVec2::ZERO, self.zone)
    }

    /// Allocate a new block ID
    pub fn next_block_id(&mut self) -> BlockId {
        let id = BlockId(self.next_id);
        self.next_id += 1;
        id
    }

    fn cell_index(&self, cell: IVec2) -> Option<usize> {
        if cell.x < 0 || cell.y < 0 || cell.x >= self.zone.x || cell.y >= self.zone.y {
            return None;
        }
        Some(cell.y as usize * self.zone.x as usize + cell.x as usize)
    }

    /// Owner of a cell (None when free or outside the zone)
    pub fn owner(&self, cell: IVec2) -> Option<BlockId> {
        self.cell_index(cell).and_then(|i| self.occupancy[i])
    }

    pub fn is_free(&self, cell: IVec2) -> bool {
        self.cell_index(cell).is_some_and(|i| self.occupancy[i].is_none())
    }

    /// Insert a block and claim every cell under its box.
    ///
    /// The box is clamped to the zone; the packer guarantees the cells are free.
    pub fn insert(&mut self, mut block: BlockEntity) -> usize {
        block.grid_box = block.grid_box.clamp_to(&self.zone_box());
        block.center = cell_to_world(block.grid_box.center(), self.zone);
        block.size = block.grid_box.size().as_vec2();
        let b = block.grid_box;
        for y in b.min.y..b.max.y {
            for x in b.min.x..b.max.x {
                if let Some(i) = self.cell_index(IVec2::new(x, y)) {
                    debug_assert!(self.occupancy[i].is_none(), "cell ({x},{y}) claimed twice");
                    self.occupancy[i] = Some(block.id);
                }
            }
        }
        self.blocks.push(block);
        self.blocks.len() - 1
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&BlockEntity> {
        self.blocks.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut BlockEntity> {
        self.blocks.get_mut(index)
    }

    /// Array position of a block (IDs are monotonic, so this is a binary search)
    pub fn index_of(&self, id: BlockId) -> Option<usize> {
        self.blocks.binary_search_by_key(&id, |b| b.id).ok()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BlockEntity> {
        self.blocks.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut BlockEntity> {
        self.blocks.iter_mut()
    }

    pub fn as_slice(&self) -> &[BlockEntity] {
        &self.blocks
    }

    pub fn as_mut_slice(&mut self) -> &mut [BlockEntity] {
        &mut self.blocks
    }

    /// Check the packing post-condition: every cell is owned by exactly the
    /// block whose box covers it, and box areas sum to the zone area.
    pub fn verify_coverage(&self) -> bool {
        let total: i64 = self.blocks.iter().map(|b| b.grid_box.area() as i64).sum();
        if total != (self.zone.x as i64) * (self.zone.y as i64) {
            return false;
        }
        for block in &self.blocks {
            let b = block.grid_box;
            if !(b.max.cmpgt(b.min).all()) {
                return false;
            }
            for y in b.min.y..b.max.y {
                for x in b.min.x..b.max.x {
                    if self.owner(IVec2::new(x, y)) != Some(block.id) {
                        return false;
                    }
                }
            }
        }
        self.occupancy.iter().all(Option::is_some)
    }

    /// Drop every block and free the occupancy index
    pub fn clear(&mut self) {
        self.blocks.clear();
        self.occupancy.iter_mut().for_each(|c| *c = None);
    }
}
