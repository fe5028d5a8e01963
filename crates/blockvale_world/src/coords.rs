use std::cmp::Ordering;
use std::ops::{Add, AddAssign, Sub, SubAssign};

use glam::{IVec3, Vec3};
use serde::{Deserialize, Serialize};

pub const CHUNK_BITS_X: u32 = 4;
pub const CHUNK_BITS_Y: u32 = 4;
pub const CHUNK_BITS_Z: u32 = 8;

pub const CHUNK_SIZE_X: usize = 1 << CHUNK_BITS_X;
pub const CHUNK_SIZE_Y: usize = 1 << CHUNK_BITS_Y;
pub const CHUNK_SIZE_Z: usize = 1 << CHUNK_BITS_Z;
pub const CHUNK_VOLUME: usize = CHUNK_SIZE_X * CHUNK_SIZE_Y * CHUNK_SIZE_Z;
/// Cells in one vertical chunk face (a 16 x 256 plane).
pub const CHUNK_FACE_AREA: usize = CHUNK_SIZE_X * CHUNK_SIZE_Z;

const SHIFT_Y: u32 = CHUNK_BITS_X;
const SHIFT_Z: u32 = CHUNK_BITS_X + CHUNK_BITS_Y;

const MASK_X: u16 = (1 << CHUNK_BITS_X) - 1;
const MASK_Y: u16 = ((1 << (CHUNK_BITS_X + CHUNK_BITS_Y)) - 1) ^ MASK_X;
const MASK_Z: u16 = !(MASK_X | MASK_Y);

const STEP_X: u16 = 1;
const STEP_Y: u16 = 1 << SHIFT_Y;
const STEP_Z: u16 = 1 << SHIFT_Z;

/// Packed cell address inside a chunk: x in bits 0..4, y in 4..8, z in 8..16.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockIndex(pub u16);

impl BlockIndex {
    pub fn as_usize(self) -> usize {
        usize::from(self.0)
    }

    pub fn x(self) -> u8 {
        (self.0 & MASK_X) as u8
    }

    pub fn y(self) -> u8 {
        ((self.0 & MASK_Y) >> SHIFT_Y) as u8
    }

    pub fn z(self) -> u8 {
        ((self.0 & MASK_Z) >> SHIFT_Z) as u8
    }

    /// One cell further along `dir` inside the same chunk column.
    ///
    /// Lateral steps wrap to the opposite edge and report `crossed = true` so the
    /// caller can re-home onto the neighbouring chunk. Vertical steps past the
    /// world floor or ceiling have no answer.
    pub fn step(self, dir: Direction) -> Option<(BlockIndex, bool)> {
        let i = self.0;
        let stepped = match dir {
            Direction::PosX if i & MASK_X == MASK_X => (i & !MASK_X, true),
            Direction::PosX => (i + STEP_X, false),
            Direction::NegX if i & MASK_X == 0 => (i | MASK_X, true),
            Direction::NegX => (i - STEP_X, false),
            Direction::PosY if i & MASK_Y == MASK_Y => (i & !MASK_Y, true),
            Direction::PosY => (i + STEP_Y, false),
            Direction::NegY if i & MASK_Y == 0 => (i | MASK_Y, true),
            Direction::NegY => (i - STEP_Y, false),
            Direction::PosZ if i & MASK_Z == MASK_Z => return None,
            Direction::PosZ => (i + STEP_Z, false),
            Direction::NegZ if i & MASK_Z == 0 => return None,
            Direction::NegZ => (i - STEP_Z, false),
        };
        Some((BlockIndex(stepped.0), stepped.1))
    }

    pub fn is_on_face(self, dir: LateralDirection) -> bool {
        match dir {
            LateralDirection::PosX => self.0 & MASK_X == MASK_X,
            LateralDirection::NegX => self.0 & MASK_X == 0,
            LateralDirection::PosY => self.0 & MASK_Y == MASK_Y,
            LateralDirection::NegY => self.0 & MASK_Y == 0,
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockCoords {
    pub x: u8,
    pub y: u8,
    pub z: u8,
}

impl BlockCoords {
    pub fn new(x: u8, y: u8, z: u8) -> Self {
        Self { x, y, z }
    }

    /// Packs the cell into a column index. Lateral components must be
    /// below the chunk size.
    pub fn to_index(self) -> BlockIndex {
        debug_assert!(
            usize::from(self.x) < CHUNK_SIZE_X && usize::from(self.y) < CHUNK_SIZE_Y,
            "block coords ({}, {}, {}) lie outside the chunk",
            self.x,
            self.y,
            self.z
        );
        let x = u16::from(self.x) & MASK_X;
        let y = (u16::from(self.y) << SHIFT_Y) & MASK_Y;
        let z = u16::from(self.z) << SHIFT_Z;
        BlockIndex(x | y | z)
    }

    pub fn from_index(index: BlockIndex) -> Self {
        Self {
            x: index.x(),
            y: index.y(),
            z: index.z(),
        }
    }

    /// Checked construction from signed local coordinates.
    pub fn try_from_ivec3(local: IVec3) -> Option<Self> {
        let in_range = (0..CHUNK_SIZE_X as i32).contains(&local.x)
            && (0..CHUNK_SIZE_Y as i32).contains(&local.y)
            && (0..CHUNK_SIZE_Z as i32).contains(&local.z);
        in_range.then(|| Self::new(local.x as u8, local.y as u8, local.z as u8))
    }

    pub fn as_ivec3(self) -> IVec3 {
        IVec3::new(i32::from(self.x), i32::from(self.y), i32::from(self.z))
    }

    /// Chunk-local centre of the cell.
    pub fn center_position(self) -> Vec3 {
        self.as_ivec3().as_vec3() + Vec3::splat(0.5)
    }
}

/// Position of a chunk column in the infinite lateral grid.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkCoords {
    pub x: i32,
    pub y: i32,
}

impl ChunkCoords {
    pub const ZERO: Self = Self { x: 0, y: 0 };

    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn from_world(position: Vec3) -> Self {
        Self {
            x: (position.x.floor() as i32).div_euclid(CHUNK_SIZE_X as i32),
            y: (position.y.floor() as i32).div_euclid(CHUNK_SIZE_Y as i32),
        }
    }

    /// World-space origin of the chunk's (0, 0, 0) cell.
    pub fn pivot(self) -> Vec3 {
        Vec3::new(
            (self.x * CHUNK_SIZE_X as i32) as f32,
            (self.y * CHUNK_SIZE_Y as i32) as f32,
            0.0,
        )
    }

    pub fn neighbor(self, dir: LateralDirection) -> Self {
        self + dir.offset()
    }

    pub fn magnitude2(self) -> i64 {
        let x = i64::from(self.x);
        let y = i64::from(self.y);
        x * x + y * y
    }

    /// Visiting-pattern order: nearer to the origin first, ties broken by x then y.
    pub fn cmp_by_distance(&self, other: &Self) -> Ordering {
        self.magnitude2()
            .cmp(&other.magnitude2())
            .then(self.x.cmp(&other.x))
            .then(self.y.cmp(&other.y))
    }
}

impl Add for ChunkCoords {
    type Output = ChunkCoords;

    fn add(self, rhs: Self) -> Self::Output {
        ChunkCoords {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
        }
    }
}

impl AddAssign for ChunkCoords {
    fn add_assign(&mut self, rhs: Self) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl Sub for ChunkCoords {
    type Output = ChunkCoords;

    fn sub(self, rhs: Self) -> Self::Output {
        ChunkCoords {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
        }
    }
}

impl SubAssign for ChunkCoords {
    fn sub_assign(&mut self, rhs: Self) {
        self.x -= rhs.x;
        self.y -= rhs.y;
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    PosX,
    NegX,
    PosY,
    NegY,
    PosZ,
    NegZ,
}

impl Direction {
    pub const ALL: [Direction; 6] = [
        Direction::PosX,
        Direction::NegX,
        Direction::PosY,
        Direction::NegY,
        Direction::PosZ,
        Direction::NegZ,
    ];

    pub fn offset(self) -> IVec3 {
        match self {
            Direction::PosX => IVec3::X,
            Direction::NegX => IVec3::NEG_X,
            Direction::PosY => IVec3::Y,
            Direction::NegY => IVec3::NEG_Y,
            Direction::PosZ => IVec3::Z,
            Direction::NegZ => IVec3::NEG_Z,
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Direction::PosX => Direction::NegX,
            Direction::NegX => Direction::PosX,
            Direction::PosY => Direction::NegY,
            Direction::NegY => Direction::PosY,
            Direction::PosZ => Direction::NegZ,
            Direction::NegZ => Direction::PosZ,
        }
    }

    pub fn lateral(self) -> Option<LateralDirection> {
        match self {
            Direction::PosX => Some(LateralDirection::PosX),
            Direction::NegX => Some(LateralDirection::NegX),
            Direction::PosY => Some(LateralDirection::PosY),
            Direction::NegY => Some(LateralDirection::NegY),
            Direction::PosZ | Direction::NegZ => None,
        }
    }

    /// Direction of a single-axis unit step, if `delta` is one.
    pub fn from_axis_step(delta: IVec3) -> Option<Self> {
        Direction::ALL.into_iter().find(|dir| dir.offset() == delta)
    }
}

/// The four sides through which chunk columns touch each other.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum LateralDirection {
    PosX,
    NegX,
    PosY,
    NegY,
}

impl LateralDirection {
    pub const ALL: [LateralDirection; 4] = [
        LateralDirection::PosX,
        LateralDirection::NegX,
        LateralDirection::PosY,
        LateralDirection::NegY,
    ];

    pub fn offset(self) -> ChunkCoords {
        match self {
            LateralDirection::PosX => ChunkCoords::new(1, 0),
            LateralDirection::NegX => ChunkCoords::new(-1, 0),
            LateralDirection::PosY => ChunkCoords::new(0, 1),
            LateralDirection::NegY => ChunkCoords::new(0, -1),
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            LateralDirection::PosX => LateralDirection::NegX,
            LateralDirection::NegX => LateralDirection::PosX,
            LateralDirection::PosY => LateralDirection::NegY,
            LateralDirection::NegY => LateralDirection::PosY,
        }
    }

    pub fn as_direction(self) -> Direction {
        match self {
            LateralDirection::PosX => Direction::PosX,
            LateralDirection::NegX => Direction::NegX,
            LateralDirection::PosY => Direction::PosY,
            LateralDirection::NegY => Direction::NegY,
        }
    }

    pub fn slot(self) -> usize {
        match self {
            LateralDirection::PosX => 0,
            LateralDirection::NegX => 1,
            LateralDirection::PosY => 2,
            LateralDirection::NegY => 3,
        }
    }

    /// Index of the boundary cell at (`along`, `z`) on this face of a chunk.
    ///
    /// `along` runs over y for the X faces and over x for the Y faces.
    pub fn face_cell(self, along: u8, z: u8) -> BlockIndex {
        let edge = (CHUNK_SIZE_X - 1) as u8;
        let coords = match self {
            LateralDirection::PosX => BlockCoords::new(edge, along, z),
            LateralDirection::NegX => BlockCoords::new(0, along, z),
            LateralDirection::PosY => BlockCoords::new(along, edge, z),
            LateralDirection::NegY => BlockCoords::new(along, 0, z),
        };
        coords.to_index()
    }

    /// Position of `index` inside the face plane: `along * 256 + z`.
    pub fn face_slot(self, index: BlockIndex) -> usize {
        let along = match self {
            LateralDirection::PosX | LateralDirection::NegX => index.y(),
            LateralDirection::PosY | LateralDirection::NegY => index.x(),
        };
        usize::from(along) * CHUNK_SIZE_Z + usize::from(index.z())
    }
}

/// Splits a world cell position into its chunk column and local cell.
///
/// Cells above or below the fixed vertical range belong to no chunk.
pub fn world_to_chunk(world: IVec3) -> Option<(ChunkCoords, BlockCoords)> {
    if !(0..CHUNK_SIZE_Z as i32).contains(&world.z) {
        return None;
    }
    let chunk = ChunkCoords {
        x: world.x.div_euclid(CHUNK_SIZE_X as i32),
        y: world.y.div_euclid(CHUNK_SIZE_Y as i32),
    };
    let local = BlockCoords {
        x: world.x.rem_euclid(CHUNK_SIZE_X as i32) as u8,
        y: world.y.rem_euclid(CHUNK_SIZE_Y as i32) as u8,
        z: world.z as u8,
    };
    Some((chunk, local))
}

pub fn chunk_to_world(chunk: ChunkCoords, local: BlockCoords) -> IVec3 {
    IVec3::new(
        chunk.x * CHUNK_SIZE_X as i32 + i32::from(local.x),
        chunk.y * CHUNK_SIZE_Y as i32 + i32::from(local.y),
        i32::from(local.z),
    )
}

#[cfg(test)]
mod tests {
    use glam::{IVec3, Vec3};

    use super::{
        chunk_to_world, world_to_chunk, BlockCoords, BlockIndex, ChunkCoords, Direction,
        LateralDirection, CHUNK_SIZE_X, CHUNK_SIZE_Y, CHUNK_SIZE_Z, CHUNK_VOLUME,
    };

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "outside the chunk")]
    fn out_of_range_lateral_coords_do_not_wrap_into_another_cell() {
        BlockCoords::new(CHUNK_SIZE_X as u8, 0, 0).to_index();
    }

    #[test]
    fn index_round_trips_for_every_cell() {
        for z in 0..CHUNK_SIZE_Z {
            for y in 0..CHUNK_SIZE_Y {
                for x in 0..CHUNK_SIZE_X {
                    let coords = BlockCoords::new(x as u8, y as u8, z as u8);
                    let index = coords.to_index();
                    assert_eq!(BlockCoords::from_index(index), coords);
                }
            }
        }
    }

    #[test]
    fn index_packs_x_low_then_y_then_z() {
        assert_eq!(BlockCoords::new(1, 0, 0).to_index(), BlockIndex(1));
        assert_eq!(BlockCoords::new(0, 1, 0).to_index(), BlockIndex(16));
        assert_eq!(BlockCoords::new(0, 0, 1).to_index(), BlockIndex(256));
        assert_eq!(
            BlockCoords::new(15, 15, 255).to_index().as_usize(),
            CHUNK_VOLUME - 1
        );
    }

    #[test]
    fn lateral_steps_wrap_and_flag_the_crossing() {
        let east_edge = BlockCoords::new(15, 7, 40).to_index();
        let (wrapped, crossed) = east_edge.step(Direction::PosX).expect("lateral step");
        assert!(crossed);
        assert_eq!(BlockCoords::from_index(wrapped), BlockCoords::new(0, 7, 40));

        let west_edge = BlockCoords::new(0, 7, 40).to_index();
        let (wrapped, crossed) = west_edge.step(Direction::NegX).expect("lateral step");
        assert!(crossed);
        assert_eq!(BlockCoords::from_index(wrapped), BlockCoords::new(15, 7, 40));

        let south_edge = BlockCoords::new(3, 0, 9).to_index();
        let (wrapped, crossed) = south_edge.step(Direction::NegY).expect("lateral step");
        assert!(crossed);
        assert_eq!(BlockCoords::from_index(wrapped), BlockCoords::new(3, 15, 9));

        let inner = BlockCoords::new(3, 4, 9).to_index();
        let (next, crossed) = inner.step(Direction::PosY).expect("lateral step");
        assert!(!crossed);
        assert_eq!(BlockCoords::from_index(next), BlockCoords::new(3, 5, 9));
    }

    #[test]
    fn vertical_steps_stop_at_world_bounds() {
        assert!(BlockCoords::new(2, 2, 255).to_index().step(Direction::PosZ).is_none());
        assert!(BlockCoords::new(2, 2, 0).to_index().step(Direction::NegZ).is_none());
        let (up, crossed) = BlockCoords::new(2, 2, 10)
            .to_index()
            .step(Direction::PosZ)
            .expect("vertical step");
        assert!(!crossed);
        assert_eq!(up.z(), 11);
    }

    #[test]
    fn chunk_coords_from_world_floors_negative_positions() {
        assert_eq!(ChunkCoords::from_world(Vec3::new(-0.5, 0.5, 3.0)), ChunkCoords::new(-1, 0));
        assert_eq!(ChunkCoords::from_world(Vec3::new(16.0, -16.0, 0.0)), ChunkCoords::new(1, -1));
        assert_eq!(ChunkCoords::from_world(Vec3::new(15.99, -16.01, 0.0)), ChunkCoords::new(0, -2));
    }

    #[test]
    fn world_to_chunk_rejects_cells_outside_the_column() {
        assert!(world_to_chunk(IVec3::new(0, 0, -1)).is_none());
        assert!(world_to_chunk(IVec3::new(0, 0, 256)).is_none());

        let world = IVec3::new(-17, 33, 200);
        let (chunk, local) = world_to_chunk(world).expect("cell inside column");
        assert_eq!(chunk, ChunkCoords::new(-2, 2));
        assert_eq!(local, BlockCoords::new(15, 1, 200));
        assert_eq!(chunk_to_world(chunk, local), world);
    }

    #[test]
    fn face_cells_sit_on_their_face() {
        for dir in LateralDirection::ALL {
            let index = dir.face_cell(5, 77);
            assert!(index.is_on_face(dir));
            assert!(!index.is_on_face(dir.opposite()));
            assert_eq!(dir.face_slot(index), 5 * CHUNK_SIZE_Z + 77);
        }
    }

    #[test]
    fn chunk_coords_arithmetic_is_component_wise() {
        let a = ChunkCoords::new(10, -2);
        let b = ChunkCoords::new(-3, 8);
        assert_eq!(a + b, ChunkCoords::new(7, 6));
        assert_eq!(a - b, ChunkCoords::new(13, -10));
        let mut c = a;
        c += b;
        c -= b;
        assert_eq!(c, a);
        assert_eq!(ChunkCoords::new(3, -4).magnitude2(), 25);
    }
}
