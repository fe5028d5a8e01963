use std::collections::HashMap;
use std::fmt;

use bitflags::bitflags;
use glam::Vec2;
use serde::{Deserialize, Serialize};

pub const MAX_LIGHT: u8 = 15;
pub const MAX_BLOCK_DEFS: usize = 256;

const SPRITE_SHEET_UNITS_X: u32 = 32;
const SPRITE_SHEET_UNITS_Y: u32 = 32;
const SPRITE_UNIT_U: f32 = 1.0 / SPRITE_SHEET_UNITS_X as f32;
const SPRITE_UNIT_V: f32 = 1.0 / SPRITE_SHEET_UNITS_Y as f32;

const INDOOR_MASK: u8 = 0x0f;
const OUTDOOR_MASK: u8 = 0xf0;

#[repr(transparent)]
#[derive(
    Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct BlockId(pub u8);

impl BlockId {
    pub const AIR: Self = Self(0);
    pub const GRASS: Self = Self(1);
    pub const DUST: Self = Self(2);
    pub const STONE: Self = Self(3);
    pub const LIGHT: Self = Self(4);
}

/// Which sprite of a block def a face uses.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BlockFace {
    Top,
    Side,
    Bottom,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct UvRect {
    pub min: Vec2,
    pub max: Vec2,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockDef {
    id: BlockId,
    name: String,
    opaque: bool,
    emission: u8,
    /// Sprite sheet cells for top, side and bottom faces.
    sprites: [u32; 3],
}

impl BlockDef {
    pub fn id(&self) -> BlockId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn opaque(&self) -> bool {
        self.opaque
    }

    pub fn emission(&self) -> u8 {
        self.emission
    }

    pub fn sprite(&self, face: BlockFace) -> u32 {
        match face {
            BlockFace::Top => self.sprites[0],
            BlockFace::Side => self.sprites[1],
            BlockFace::Bottom => self.sprites[2],
        }
    }

    /// UV rectangle of the face's sprite; `min.v` is the bottom edge of the cell.
    pub fn uvs(&self, face: BlockFace) -> UvRect {
        let (x, y) = sprite_index_to_coords(self.sprite(face));
        let min = Vec2::new(
            SPRITE_UNIT_U * x as f32,
            SPRITE_UNIT_V * y as f32 + SPRITE_UNIT_V,
        );
        let max = min + Vec2::new(SPRITE_UNIT_U, -SPRITE_UNIT_V);
        UvRect { min, max }
    }
}

pub const fn sprite_coords_to_index(x: u32, y: u32) -> u32 {
    x + y * SPRITE_SHEET_UNITS_X
}

pub fn sprite_index_to_coords(index: u32) -> (u32, u32) {
    (index % SPRITE_SHEET_UNITS_X, index / SPRITE_SHEET_UNITS_X)
}

/// Description of a def before it is given an id.
#[derive(Clone, Debug)]
pub struct BlockDefDesc {
    pub name: String,
    pub opaque: bool,
    pub emission: u8,
    pub sprites: [u32; 3],
}

impl BlockDefDesc {
    pub fn new(name: &str, opaque: bool, emission: u8, sprites: [u32; 3]) -> Self {
        Self {
            name: name.to_string(),
            opaque,
            emission,
            sprites,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    DuplicateName(String),
    TableFull,
    UnknownName(String),
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateName(name) => write!(f, "block def '{name}' is already registered"),
            Self::TableFull => write!(f, "block def table is full ({MAX_BLOCK_DEFS} entries)"),
            Self::UnknownName(name) => write!(f, "no block def named '{name}'"),
        }
    }
}

impl std::error::Error for RegistryError {}

/// What `get` hands out before anything is registered.
static UNREGISTERED_AIR: BlockDef = BlockDef {
    id: BlockId::AIR,
    name: String::new(),
    opaque: false,
    emission: 0,
    sprites: [0; 3],
};

/// Fixed table of block defs. A def's id is its index in the table.
#[derive(Default, Debug, Clone)]
pub struct BlockRegistry {
    defs: Vec<BlockDef>,
    by_name: HashMap<String, BlockId>,
}

impl BlockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, desc: BlockDefDesc) -> Result<BlockId, RegistryError> {
        if self.by_name.contains_key(desc.name.as_str()) {
            return Err(RegistryError::DuplicateName(desc.name));
        }
        let id = u8::try_from(self.defs.len())
            .map(BlockId)
            .map_err(|_| RegistryError::TableFull)?;

        self.by_name.insert(desc.name.clone(), id);
        self.defs.push(BlockDef {
            id,
            name: desc.name,
            opaque: desc.opaque,
            emission: desc.emission.min(MAX_LIGHT),
            sprites: desc.sprites,
        });
        Ok(id)
    }

    /// Def for `id`; unknown ids read as air so hot paths never branch on it.
    /// An empty table still answers with a transparent, unlit air def.
    pub fn get(&self, id: BlockId) -> &BlockDef {
        self.defs
            .get(usize::from(id.0))
            .or_else(|| self.defs.get(usize::from(BlockId::AIR.0)))
            .unwrap_or(&UNREGISTERED_AIR)
    }

    pub fn try_get(&self, id: BlockId) -> Option<&BlockDef> {
        self.defs.get(usize::from(id.0))
    }

    pub fn id_by_name(&self, name: &str) -> Result<BlockId, RegistryError> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| RegistryError::UnknownName(name.to_string()))
    }

    pub fn by_name(&self, name: &str) -> Option<&BlockDef> {
        self.by_name.get(name).map(|id| self.get(*id))
    }

    pub fn contains(&self, id: BlockId) -> bool {
        usize::from(id.0) < self.defs.len()
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BlockDef> {
        self.defs.iter()
    }
}

pub fn register_default_blocks() -> BlockRegistry {
    const CI: fn(u32, u32) -> u32 = sprite_coords_to_index;

    let defaults = [
        BlockDefDesc::new("air", false, 0, [CI(0, 0), CI(0, 0), CI(0, 0)]),
        BlockDefDesc::new("grass", true, 0, [CI(21, 0), CI(3, 3), CI(4, 3)]),
        BlockDefDesc::new("dust", true, 0, [CI(4, 3), CI(4, 3), CI(4, 3)]),
        BlockDefDesc::new("stone", true, 0, [CI(1, 4), CI(1, 4), CI(1, 4)]),
        BlockDefDesc::new("light", true, MAX_LIGHT, [CI(9, 6), CI(9, 6), CI(9, 6)]),
    ];

    let mut registry = BlockRegistry::new();
    for desc in defaults {
        // The default names are distinct and well under the table limit.
        if let Err(err) = registry.register(desc) {
            tracing::warn!("Skipping default block def: {err}");
        }
    }
    registry
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BlockFlags: u8 {
        /// Copy of the def's opacity taken at reset.
        const OPAQUE      = 0b0000_0001;
        /// Queued for light re-evaluation.
        const LIGHT_DIRTY = 0b0000_0010;
    }
}

/// One voxel: type, two light nibbles and status bits.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Block {
    id: BlockId,
    light: u8,
    flags: BlockFlags,
}

impl Default for Block {
    fn default() -> Self {
        Self {
            id: BlockId::AIR,
            light: 0,
            flags: BlockFlags::OPAQUE,
        }
    }
}

impl Block {
    pub fn from_def(def: &BlockDef) -> Self {
        let mut block = Self::default();
        block.reset(def);
        block
    }

    pub fn reset(&mut self, def: &BlockDef) {
        self.id = def.id();
        self.light = 0;
        self.flags = if def.opaque() {
            BlockFlags::OPAQUE
        } else {
            BlockFlags::empty()
        };
    }

    pub fn id(&self) -> BlockId {
        self.id
    }

    pub fn opaque(&self) -> bool {
        self.flags.contains(BlockFlags::OPAQUE)
    }

    pub fn light_dirty(&self) -> bool {
        self.flags.contains(BlockFlags::LIGHT_DIRTY)
    }

    pub fn set_light_dirty(&mut self) {
        self.flags.insert(BlockFlags::LIGHT_DIRTY);
    }

    pub fn clear_light_dirty(&mut self) {
        self.flags.remove(BlockFlags::LIGHT_DIRTY);
    }

    pub fn indoor_light(&self) -> u8 {
        self.light & INDOOR_MASK
    }

    pub fn outdoor_light(&self) -> u8 {
        (self.light & OUTDOOR_MASK) >> 4
    }

    pub fn set_indoor_light(&mut self, amount: u8) {
        self.light = (amount.min(MAX_LIGHT) & INDOOR_MASK) | (self.light & OUTDOOR_MASK);
    }

    pub fn set_outdoor_light(&mut self, amount: u8) {
        self.light = ((amount.min(MAX_LIGHT) << 4) & OUTDOOR_MASK) | (self.light & INDOOR_MASK);
    }

    pub fn set_sky(&mut self) {
        self.set_outdoor_light(MAX_LIGHT);
    }

    pub fn exposed_to_sky(&self) -> bool {
        self.outdoor_light() == MAX_LIGHT
    }

    /// Both nibbles as stored: indoor low, outdoor high.
    pub fn packed_light(&self) -> u8 {
        self.light
    }
}

#[cfg(test)]
mod tests {
    use super::{
        register_default_blocks, sprite_coords_to_index, Block, BlockDefDesc, BlockId,
        BlockRegistry, BlockFace, RegistryError, MAX_LIGHT,
    };

    #[test]
    fn default_table_ids_match_indices() {
        let registry = register_default_blocks();
        for (index, def) in registry.iter().enumerate() {
            assert_eq!(usize::from(def.id().0), index);
        }
        assert_eq!(registry.id_by_name("air"), Ok(BlockId::AIR));
        assert_eq!(registry.id_by_name("grass"), Ok(BlockId::GRASS));
        assert_eq!(registry.id_by_name("dust"), Ok(BlockId::DUST));
        assert_eq!(registry.id_by_name("stone"), Ok(BlockId::STONE));
        assert_eq!(registry.id_by_name("light"), Ok(BlockId::LIGHT));

        let air = registry.get(BlockId::AIR);
        assert!(!air.opaque());
        assert_eq!(air.emission(), 0);
        assert_eq!(registry.get(BlockId::LIGHT).emission(), MAX_LIGHT);
    }

    #[test]
    fn unknown_ids_read_as_air_but_try_get_reports_them() {
        let registry = register_default_blocks();
        assert_eq!(registry.get(BlockId(200)).id(), BlockId::AIR);
        assert!(registry.try_get(BlockId(200)).is_none());
        assert!(!registry.contains(BlockId(200)));
    }

    #[test]
    fn empty_registry_reads_every_id_as_unlit_air() {
        let registry = BlockRegistry::new();
        assert!(registry.is_empty());
        let def = registry.get(BlockId::STONE);
        assert_eq!(def.id(), BlockId::AIR);
        assert!(!def.opaque());
        assert_eq!(def.emission(), 0);
        assert!(registry.try_get(BlockId::AIR).is_none());
    }

    #[test]
    fn registry_rejects_duplicates_and_overflow() {
        let mut registry = BlockRegistry::new();
        registry
            .register(BlockDefDesc::new("air", false, 0, [0; 3]))
            .expect("first air");
        assert_eq!(
            registry.register(BlockDefDesc::new("air", false, 0, [0; 3])),
            Err(RegistryError::DuplicateName("air".to_string()))
        );

        for i in 1..256 {
            registry
                .register(BlockDefDesc::new(&format!("block_{i}"), true, 0, [0; 3]))
                .expect("room in table");
        }
        assert_eq!(
            registry.register(BlockDefDesc::new("one_too_many", true, 0, [0; 3])),
            Err(RegistryError::TableFull)
        );
    }

    #[test]
    fn uvs_follow_the_sprite_sheet_grid() {
        let registry = register_default_blocks();
        let grass = registry.get(BlockId::GRASS);
        assert_eq!(grass.sprite(BlockFace::Top), sprite_coords_to_index(21, 0));

        let uv = grass.uvs(BlockFace::Side);
        let unit = 1.0 / 32.0;
        assert!((uv.min.x - 3.0 * unit).abs() < 1e-6);
        assert!((uv.min.y - 4.0 * unit).abs() < 1e-6);
        assert!((uv.max.x - 4.0 * unit).abs() < 1e-6);
        assert!((uv.max.y - 3.0 * unit).abs() < 1e-6);
    }

    #[test]
    fn light_nibbles_are_independent() {
        let registry = register_default_blocks();
        let mut block = Block::from_def(registry.get(BlockId::AIR));
        block.set_indoor_light(9);
        block.set_outdoor_light(4);
        assert_eq!(block.indoor_light(), 9);
        assert_eq!(block.outdoor_light(), 4);

        block.set_indoor_light(40);
        assert_eq!(block.indoor_light(), MAX_LIGHT);
        assert_eq!(block.outdoor_light(), 4);

        block.set_sky();
        assert!(block.exposed_to_sky());
        assert_eq!(block.packed_light(), 0xff);
    }

    #[test]
    fn reset_copies_opacity_and_clears_state() {
        let registry = register_default_blocks();
        let mut block = Block::default();
        assert!(block.opaque());

        block.reset(registry.get(BlockId::AIR));
        assert!(!block.opaque());

        block.set_sky();
        block.set_light_dirty();
        block.reset(registry.get(BlockId::STONE));
        assert!(block.opaque());
        assert!(!block.light_dirty());
        assert_eq!(block.packed_light(), 0);
        assert_eq!(block.id(), BlockId::STONE);
    }
}
