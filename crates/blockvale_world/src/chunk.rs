use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::block::{Block, BlockDef, BlockId, BlockRegistry};
use crate::coords::{
    BlockCoords, BlockIndex, ChunkCoords, LateralDirection, CHUNK_SIZE_X, CHUNK_SIZE_Y,
    CHUNK_SIZE_Z, CHUNK_VOLUME,
};
use crate::mesh::{
    border_plane, build_mesh_output, ChunkMesh, MeshInput, MeshOutput, VolumeSnapshot,
};
use crate::worldgen::TerrainGenerator;

/// A mesh rebuild was asked for before every lateral neighbour was resident.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotReady {
    pub coords: ChunkCoords,
    pub missing: LateralDirection,
}

impl fmt::Display for NotReady {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "chunk ({}, {}) cannot mesh yet: {:?} neighbour is not resident",
            self.coords.x, self.coords.y, self.missing
        )
    }
}

impl std::error::Error for NotReady {}

static NEXT_REVISION: AtomicU64 = AtomicU64::new(1);

/// Revisions are unique across every chunk, so output built for an evicted
/// chunk can never match a later chunk at the same coordinates.
fn next_revision() -> u64 {
    NEXT_REVISION.fetch_add(1, Ordering::Relaxed)
}

/// One 16 x 16 x 256 column of blocks.
pub struct Chunk {
    coords: ChunkCoords,
    blocks: Box<[Block]>,
    dirty: bool,
    save_pending: bool,
    revision: u64,
    in_flight: Option<u64>,
    mesh: Option<ChunkMesh>,
    volume: Option<VolumeSnapshot>,
}

impl Chunk {
    /// Every cell starts as the unstamped default block.
    pub fn new(coords: ChunkCoords) -> Self {
        Self {
            coords,
            blocks: vec![Block::default(); CHUNK_VOLUME].into_boxed_slice(),
            dirty: true,
            save_pending: false,
            revision: next_revision(),
            in_flight: None,
            mesh: None,
            volume: None,
        }
    }

    /// A chunk with every cell stamped from `def`.
    pub fn filled(coords: ChunkCoords, def: &BlockDef) -> Self {
        let mut chunk = Self::new(coords);
        chunk.blocks.fill(Block::from_def(def));
        chunk
    }

    pub fn coords(&self) -> ChunkCoords {
        self.coords
    }

    pub fn pivot(&self) -> glam::Vec3 {
        self.coords.pivot()
    }

    /// Populates the column from the height field; see [`TerrainGenerator::layer_at`].
    pub fn generate_blocks(&mut self, generator: &TerrainGenerator, registry: &BlockRegistry) {
        let heights = generator.chunk_heights(self.coords);
        for y in 0..CHUNK_SIZE_Y {
            for x in 0..CHUNK_SIZE_X {
                let height = heights[x + y * CHUNK_SIZE_X];
                for z in 0..CHUNK_SIZE_Z {
                    let id = TerrainGenerator::layer_at(height, z as i32);
                    let index = BlockCoords::new(x as u8, y as u8, z as u8).to_index();
                    self.blocks[index.as_usize()].reset(registry.get(id));
                }
            }
        }
        self.mark_dirty();
    }

    pub fn block(&self, index: BlockIndex) -> &Block {
        &self.blocks[index.as_usize()]
    }

    pub fn block_mut(&mut self, index: BlockIndex) -> &mut Block {
        &mut self.blocks[index.as_usize()]
    }

    pub fn block_at(&self, coords: BlockCoords) -> &Block {
        self.block(coords.to_index())
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn block_id(&self, index: BlockIndex) -> BlockId {
        self.block(index).id()
    }

    /// Stamps a cell from `def` and flags the mesh for rebuild.
    pub fn reset_block(&mut self, index: BlockIndex, def: &BlockDef) {
        self.blocks[index.as_usize()].reset(def);
        self.mark_dirty();
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
        self.revision = next_revision();
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn save_pending(&self) -> bool {
        self.save_pending
    }

    pub fn mark_save_pending(&mut self) {
        self.save_pending = true;
    }

    pub fn clear_save_pending(&mut self) {
        self.save_pending = false;
    }

    pub fn mesh(&self) -> Option<&ChunkMesh> {
        self.mesh.as_ref()
    }

    pub fn volume(&self) -> Option<&VolumeSnapshot> {
        self.volume.as_ref()
    }

    pub(crate) fn in_flight(&self) -> Option<u64> {
        self.in_flight
    }

    pub(crate) fn set_in_flight(&mut self, revision: Option<u64>) {
        self.in_flight = revision;
    }

    /// Snapshot of what a rebuild reads. `neighbors` is indexed by
    /// [`LateralDirection::slot`].
    pub fn mesh_input(&self, neighbors: [Option<&Chunk>; 4]) -> Result<MeshInput, NotReady> {
        let mut borders: [Box<[Block]>; 4] = Default::default();
        for dir in LateralDirection::ALL {
            let neighbor = neighbors[dir.slot()].ok_or(NotReady {
                coords: self.coords,
                missing: dir,
            })?;
            borders[dir.slot()] = border_plane(&neighbor.blocks, dir.opposite());
        }
        Ok(MeshInput {
            coords: self.coords,
            revision: self.revision,
            blocks: self.blocks.clone(),
            borders,
        })
    }

    /// Builds new geometry on the calling thread. The chunk is unchanged until
    /// the output is handed to [`Chunk::install_mesh`].
    pub fn reconstruct_mesh(
        &self,
        neighbors: [Option<&Chunk>; 4],
        registry: &BlockRegistry,
    ) -> Result<MeshOutput, NotReady> {
        let input = self.mesh_input(neighbors)?;
        Ok(build_mesh_output(&input, registry))
    }

    /// Swaps in a finished rebuild. Output built from an older revision is
    /// refused and the chunk stays dirty.
    pub fn install_mesh(&mut self, output: MeshOutput) -> bool {
        if self.in_flight == Some(output.revision) {
            self.in_flight = None;
        }
        if output.coords != self.coords || output.revision != self.revision {
            return false;
        }
        self.mesh = Some(output.mesh);
        self.volume = Some(output.volume);
        self.dirty = false;
        true
    }
}

impl fmt::Debug for Chunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chunk")
            .field("coords", &self.coords)
            .field("dirty", &self.dirty)
            .field("save_pending", &self.save_pending)
            .field("revision", &self.revision)
            .field("has_mesh", &self.mesh.is_some())
            .finish()
    }
}
