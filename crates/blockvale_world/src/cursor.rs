use std::collections::HashMap;
use std::hash::BuildHasher;

use glam::{IVec3, Vec3};

use crate::block::Block;
use crate::chunk::Chunk;
use crate::coords::{chunk_to_world, world_to_chunk, BlockCoords, BlockIndex, ChunkCoords, Direction};
use crate::physics::Aabb3;

/// Anything that can answer "which chunk is resident at these coordinates".
pub trait ChunkSource {
    fn chunk(&self, coords: ChunkCoords) -> Option<&Chunk>;

    fn block(&self, cursor: BlockCursor) -> Option<&Block> {
        let coords = cursor.chunk()?;
        self.chunk(coords).map(|chunk| chunk.block(cursor.index()))
    }

    fn cursor_at(&self, world: IVec3) -> BlockCursor {
        match world_to_chunk(world) {
            Some((coords, local)) if self.chunk(coords).is_some() => {
                BlockCursor::new(coords, local.to_index())
            }
            _ => BlockCursor::INVALID,
        }
    }
}

impl<S: BuildHasher> ChunkSource for HashMap<ChunkCoords, Chunk, S> {
    fn chunk(&self, coords: ChunkCoords) -> Option<&Chunk> {
        self.get(&coords)
    }
}

/// A cell address that can walk across chunk seams.
///
/// A cursor without a chunk is invalid; stepping it keeps it invalid.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct BlockCursor {
    chunk: Option<ChunkCoords>,
    index: BlockIndex,
}

impl BlockCursor {
    pub const INVALID: Self = Self {
        chunk: None,
        index: BlockIndex(0),
    };

    pub fn new(chunk: ChunkCoords, index: BlockIndex) -> Self {
        Self {
            chunk: Some(chunk),
            index,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.chunk.is_some()
    }

    pub fn chunk(&self) -> Option<ChunkCoords> {
        self.chunk
    }

    pub fn index(&self) -> BlockIndex {
        self.index
    }

    pub fn coords(&self) -> BlockCoords {
        BlockCoords::from_index(self.index)
    }

    /// One cell along `dir`. Crossing into a chunk that `source` does not hold,
    /// or leaving the vertical range, yields an invalid cursor.
    pub fn step<S: ChunkSource + ?Sized>(self, source: &S, dir: Direction) -> Self {
        let Some(chunk) = self.chunk else {
            return Self::INVALID;
        };
        let Some((index, crossed)) = self.index.step(dir) else {
            return Self::INVALID;
        };
        if !crossed {
            return Self::new(chunk, index);
        }
        match dir.lateral() {
            Some(lateral) => {
                let next = chunk.neighbor(lateral);
                if source.chunk(next).is_some() {
                    Self::new(next, index)
                } else {
                    Self::INVALID
                }
            }
            None => Self::INVALID,
        }
    }

    /// Applies `delta` one unit step at a time, x then y then z.
    pub fn next<S: ChunkSource + ?Sized>(self, source: &S, delta: IVec3) -> Self {
        let mut cursor = self;
        for (amount, positive, negative) in [
            (delta.x, Direction::PosX, Direction::NegX),
            (delta.y, Direction::PosY, Direction::NegY),
            (delta.z, Direction::PosZ, Direction::NegZ),
        ] {
            let dir = if amount >= 0 { positive } else { negative };
            for _ in 0..amount.unsigned_abs() {
                cursor = cursor.step(source, dir);
                if !cursor.is_valid() {
                    return cursor;
                }
            }
        }
        cursor
    }

    pub fn block<'a, S: ChunkSource + ?Sized>(&self, source: &'a S) -> Option<&'a Block> {
        source.block(*self)
    }

    pub fn world_position(&self) -> Option<IVec3> {
        self.chunk.map(|chunk| chunk_to_world(chunk, self.coords()))
    }

    /// World-space box of the cell.
    pub fn bounds(&self) -> Option<Aabb3> {
        self.world_position().map(|min| {
            let min = min.as_vec3();
            Aabb3::new(min, min + Vec3::ONE)
        })
    }

    pub fn center(&self) -> Option<Vec3> {
        self.world_position()
            .map(|min| min.as_vec3() + Vec3::splat(0.5))
    }
}

#[cfg(test)]
mod tests {
    use glam::{IVec3, Vec3};
    use rustc_hash::FxHashMap;

    use super::{BlockCursor, ChunkSource};
    use crate::block::{register_default_blocks, BlockId};
    use crate::chunk::Chunk;
    use crate::coords::{BlockCoords, ChunkCoords, Direction};

    fn air_chunks(coords: &[ChunkCoords]) -> FxHashMap<ChunkCoords, Chunk> {
        let registry = register_default_blocks();
        coords
            .iter()
            .map(|c| (*c, Chunk::filled(*c, registry.get(BlockId::AIR))))
            .collect()
    }

    #[test]
    fn stepping_off_the_east_edge_lands_on_the_neighbour() {
        let chunks = air_chunks(&[ChunkCoords::ZERO, ChunkCoords::new(1, 0)]);
        let edge = BlockCursor::new(ChunkCoords::ZERO, BlockCoords::new(15, 6, 30).to_index());

        let east = edge.step(&chunks, Direction::PosX);
        assert_eq!(east.chunk(), Some(ChunkCoords::new(1, 0)));
        assert_eq!(east.coords(), BlockCoords::new(0, 6, 30));

        let back = east.step(&chunks, Direction::NegX);
        assert_eq!(back, edge);
    }

    #[test]
    fn stepping_into_a_missing_neighbour_invalidates() {
        let chunks = air_chunks(&[ChunkCoords::ZERO]);
        let west_edge = BlockCursor::new(ChunkCoords::ZERO, BlockCoords::new(0, 2, 2).to_index());
        let gone = west_edge.step(&chunks, Direction::NegX);
        assert!(!gone.is_valid());
        assert!(gone.block(&chunks).is_none());
        assert!(!gone.step(&chunks, Direction::PosX).is_valid());
    }

    #[test]
    fn vertical_bounds_invalidate() {
        let chunks = air_chunks(&[ChunkCoords::ZERO]);
        let top = BlockCursor::new(ChunkCoords::ZERO, BlockCoords::new(1, 1, 255).to_index());
        assert!(!top.step(&chunks, Direction::PosZ).is_valid());
        let bottom = BlockCursor::new(ChunkCoords::ZERO, BlockCoords::new(1, 1, 0).to_index());
        assert!(!bottom.step(&chunks, Direction::NegZ).is_valid());
    }

    #[test]
    fn multi_axis_next_walks_through_seams() {
        let chunks = air_chunks(&[
            ChunkCoords::ZERO,
            ChunkCoords::new(-1, 0),
            ChunkCoords::new(-1, 1),
        ]);
        let start = chunks.cursor_at(IVec3::new(2, 14, 40));
        let moved = start.next(&chunks, IVec3::new(-5, 3, -10));
        assert_eq!(moved.world_position(), Some(IVec3::new(-3, 17, 30)));
        assert_eq!(moved.chunk(), Some(ChunkCoords::new(-1, 1)));

        let blocked = start.next(&chunks, IVec3::new(0, 3, 0));
        assert!(!blocked.is_valid());
    }

    #[test]
    fn bounds_and_center_are_in_world_space() {
        let chunks = air_chunks(&[ChunkCoords::new(-1, 2)]);
        let cursor = chunks.cursor_at(IVec3::new(-3, 40, 7));
        assert!(cursor.is_valid());
        let bounds = cursor.bounds().expect("valid cursor");
        assert_eq!(bounds.min, Vec3::new(-3.0, 40.0, 7.0));
        assert_eq!(bounds.max, Vec3::new(-2.0, 41.0, 8.0));
        assert_eq!(cursor.center(), Some(Vec3::new(-2.5, 40.5, 7.5)));

        assert!(!chunks.cursor_at(IVec3::new(100, 0, 0)).is_valid());
        assert!(!chunks.cursor_at(IVec3::new(-3, 40, 300)).is_valid());
    }
}
