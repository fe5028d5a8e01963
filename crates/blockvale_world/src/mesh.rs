use bitvec::prelude::BitVec;
use bytemuck::{Pod, Zeroable};

use crate::block::{Block, BlockFace, BlockRegistry, MAX_LIGHT};
use crate::coords::{
    BlockCoords, BlockIndex, ChunkCoords, Direction, LateralDirection, CHUNK_FACE_AREA,
    CHUNK_VOLUME,
};

const LIGHT_TINT_SCALE: u8 = 16;

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct ChunkVertex {
    /// Chunk-local; the renderer places it with the chunk pivot.
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
    /// Indoor light in red, outdoor light in green.
    pub color: [u8; 4],
}
const _: [(); 36] = [(); std::mem::size_of::<ChunkVertex>()];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChunkMesh {
    pub vertices: Vec<ChunkVertex>,
    pub indices: Vec<u32>,
}

impl ChunkMesh {
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn quad_count(&self) -> usize {
        self.vertices.len() / 4
    }
}

/// CPU mirror of the per-chunk volume the deferred renderer samples.
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeSnapshot {
    opacity: BitVec,
    light: Box<[u8]>,
}

impl VolumeSnapshot {
    pub fn from_blocks(blocks: &[Block]) -> Self {
        let mut opacity = BitVec::repeat(false, blocks.len());
        let mut light = vec![0u8; blocks.len()].into_boxed_slice();
        for (index, block) in blocks.iter().enumerate() {
            opacity.set(index, block.opaque());
            light[index] = block.packed_light();
        }
        Self { opacity, light }
    }

    pub fn is_opaque(&self, index: BlockIndex) -> bool {
        self.opacity
            .get(index.as_usize())
            .map(|bit| *bit)
            .unwrap_or(false)
    }

    pub fn packed_light(&self, index: BlockIndex) -> u8 {
        self.light.get(index.as_usize()).copied().unwrap_or(0)
    }

    pub fn opaque_count(&self) -> usize {
        self.opacity.count_ones()
    }
}

/// Owned copy of everything a mesh rebuild reads: the chunk's cells and the
/// facing plane of each lateral neighbour.
#[derive(Clone)]
pub struct MeshInput {
    pub coords: ChunkCoords,
    pub revision: u64,
    pub blocks: Box<[Block]>,
    /// Indexed by [`LateralDirection::slot`]; each plane is addressed by
    /// [`LateralDirection::face_slot`].
    pub borders: [Box<[Block]>; 4],
}

#[derive(Debug)]
pub struct MeshOutput {
    pub coords: ChunkCoords,
    pub revision: u64,
    pub mesh: ChunkMesh,
    pub volume: VolumeSnapshot,
}

enum Across {
    Cell(Block),
    Sky,
    Floor,
}

impl MeshInput {
    fn across(&self, index: BlockIndex, dir: Direction) -> Across {
        let Some((next, crossed)) = index.step(dir) else {
            return if dir == Direction::PosZ {
                Across::Sky
            } else {
                Across::Floor
            };
        };
        if !crossed {
            return Across::Cell(self.blocks[next.as_usize()]);
        }
        match dir.lateral() {
            Some(lateral) => {
                let plane = &self.borders[lateral.slot()];
                plane
                    .get(lateral.face_slot(next))
                    .copied()
                    .map(Across::Cell)
                    .unwrap_or(Across::Floor)
            }
            None => Across::Floor,
        }
    }
}

#[derive(Copy, Clone)]
struct FaceLayout {
    dir: Direction,
    face: BlockFace,
    normal: [f32; 3],
    /// Counter-clockwise seen from outside, starting bottom-left.
    corners: [[f32; 3]; 4],
}

const FACE_LAYOUTS: [FaceLayout; 6] = [
    FaceLayout {
        dir: Direction::PosX,
        face: BlockFace::Side,
        normal: [1.0, 0.0, 0.0],
        corners: [[1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [1.0, 1.0, 1.0], [1.0, 0.0, 1.0]],
    },
    FaceLayout {
        dir: Direction::NegX,
        face: BlockFace::Side,
        normal: [-1.0, 0.0, 0.0],
        corners: [[0.0, 1.0, 0.0], [0.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 1.0]],
    },
    FaceLayout {
        dir: Direction::PosY,
        face: BlockFace::Side,
        normal: [0.0, 1.0, 0.0],
        corners: [[1.0, 1.0, 0.0], [0.0, 1.0, 0.0], [0.0, 1.0, 1.0], [1.0, 1.0, 1.0]],
    },
    FaceLayout {
        dir: Direction::NegY,
        face: BlockFace::Side,
        normal: [0.0, -1.0, 0.0],
        corners: [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 0.0, 1.0], [0.0, 0.0, 1.0]],
    },
    FaceLayout {
        dir: Direction::PosZ,
        face: BlockFace::Top,
        normal: [0.0, 0.0, 1.0],
        corners: [[0.0, 0.0, 1.0], [1.0, 0.0, 1.0], [1.0, 1.0, 1.0], [0.0, 1.0, 1.0]],
    },
    FaceLayout {
        dir: Direction::NegZ,
        face: BlockFace::Bottom,
        normal: [0.0, 0.0, -1.0],
        corners: [[0.0, 0.0, 0.0], [0.0, 1.0, 0.0], [1.0, 1.0, 0.0], [1.0, 0.0, 0.0]],
    },
];

fn light_tint(indoor: u8, outdoor: u8) -> [u8; 4] {
    [indoor * LIGHT_TINT_SCALE, outdoor * LIGHT_TINT_SCALE, 0, 255]
}

/// Emits one quad for every solid-cell face that borders a non-opaque cell.
pub fn build_chunk_mesh(input: &MeshInput, registry: &BlockRegistry) -> ChunkMesh {
    let mut mesh = ChunkMesh {
        vertices: Vec::with_capacity(8_192),
        indices: Vec::with_capacity(12_288),
    };

    for raw in 0..CHUNK_VOLUME {
        let block = input.blocks[raw];
        if !block.opaque() {
            continue;
        }
        let index = BlockIndex(raw as u16);
        let origin = BlockCoords::from_index(index).as_ivec3().as_vec3();
        let def = registry.get(block.id());

        for layout in &FACE_LAYOUTS {
            let color = match input.across(index, layout.dir) {
                Across::Cell(neighbor) if neighbor.opaque() => continue,
                Across::Cell(neighbor) => {
                    light_tint(neighbor.indoor_light(), neighbor.outdoor_light())
                }
                Across::Sky => light_tint(0, MAX_LIGHT),
                Across::Floor => continue,
            };

            let uv = def.uvs(layout.face);
            let uvs = [
                [uv.min.x, uv.min.y],
                [uv.max.x, uv.min.y],
                [uv.max.x, uv.max.y],
                [uv.min.x, uv.max.y],
            ];
            let base = mesh.vertices.len() as u32;
            for (corner, uv) in layout.corners.iter().zip(uvs) {
                mesh.vertices.push(ChunkVertex {
                    position: [
                        origin.x + corner[0],
                        origin.y + corner[1],
                        origin.z + corner[2],
                    ],
                    normal: layout.normal,
                    uv,
                    color,
                });
            }
            mesh.indices
                .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }
    }

    mesh
}

/// Full rebuild job: geometry plus the volume snapshot, both from the same input.
pub fn build_mesh_output(input: &MeshInput, registry: &BlockRegistry) -> MeshOutput {
    MeshOutput {
        coords: input.coords,
        revision: input.revision,
        mesh: build_chunk_mesh(input, registry),
        volume: VolumeSnapshot::from_blocks(&input.blocks),
    }
}

/// An all-air border plane, for fixtures and for seams that face open space.
pub fn empty_border(registry: &BlockRegistry) -> Box<[Block]> {
    let air = Block::from_def(registry.get(crate::block::BlockId::AIR));
    vec![air; CHUNK_FACE_AREA].into_boxed_slice()
}

pub(crate) fn border_plane(blocks: &[Block], face: LateralDirection) -> Box<[Block]> {
    let mut plane = Vec::with_capacity(CHUNK_FACE_AREA);
    for along in 0..16u8 {
        for z in 0..=255u8 {
            plane.push(blocks[face.face_cell(along, z).as_usize()]);
        }
    }
    plane.into_boxed_slice()
}

#[cfg(test)]
mod tests {
    use super::{build_chunk_mesh, build_mesh_output, empty_border, MeshInput};
    use crate::block::{register_default_blocks, Block, BlockId, BlockRegistry};
    use crate::coords::{BlockCoords, ChunkCoords, LateralDirection, CHUNK_VOLUME};

    fn air_input(registry: &BlockRegistry) -> MeshInput {
        let air = Block::from_def(registry.get(BlockId::AIR));
        MeshInput {
            coords: ChunkCoords::ZERO,
            revision: 1,
            blocks: vec![air; CHUNK_VOLUME].into_boxed_slice(),
            borders: [
                empty_border(registry),
                empty_border(registry),
                empty_border(registry),
                empty_border(registry),
            ],
        }
    }

    fn place(input: &mut MeshInput, registry: &BlockRegistry, at: BlockCoords, id: BlockId) {
        input.blocks[at.to_index().as_usize()] = Block::from_def(registry.get(id));
    }

    #[test]
    fn lone_block_emits_six_quads() {
        let registry = register_default_blocks();
        let mut input = air_input(&registry);
        place(&mut input, &registry, BlockCoords::new(4, 4, 100), BlockId::STONE);

        let mesh = build_chunk_mesh(&input, &registry);
        assert_eq!(mesh.quad_count(), 6);
        assert_eq!(mesh.vertices.len(), 24);
        assert_eq!(mesh.indices.len(), 36);
    }

    #[test]
    fn shared_faces_are_culled() {
        let registry = register_default_blocks();
        let mut input = air_input(&registry);
        place(&mut input, &registry, BlockCoords::new(4, 4, 100), BlockId::STONE);
        place(&mut input, &registry, BlockCoords::new(5, 4, 100), BlockId::DUST);

        let mesh = build_chunk_mesh(&input, &registry);
        assert_eq!(mesh.quad_count(), 10);
    }

    #[test]
    fn floor_faces_are_skipped_and_sky_faces_fully_lit() {
        let registry = register_default_blocks();
        let mut input = air_input(&registry);
        place(&mut input, &registry, BlockCoords::new(0, 0, 0), BlockId::STONE);
        place(&mut input, &registry, BlockCoords::new(8, 8, 255), BlockId::STONE);

        let mesh = build_chunk_mesh(&input, &registry);
        // 5 faces for the floor block, 6 for the ceiling block.
        assert_eq!(mesh.quad_count(), 11);
        let top = mesh
            .vertices
            .iter()
            .find(|v| v.normal == [0.0, 0.0, 1.0] && v.position[2] == 256.0)
            .expect("ceiling top face");
        assert_eq!(top.color, [0, 240, 0, 255]);
    }

    #[test]
    fn opaque_border_planes_cull_edge_faces() {
        let registry = register_default_blocks();
        let mut input = air_input(&registry);
        place(&mut input, &registry, BlockCoords::new(15, 3, 20), BlockId::STONE);
        let stone = Block::from_def(registry.get(BlockId::STONE));
        let plane = &mut input.borders[LateralDirection::PosX.slot()];
        plane[LateralDirection::PosX.face_slot(BlockCoords::new(0, 3, 20).to_index())] = stone;

        let mesh = build_chunk_mesh(&input, &registry);
        assert_eq!(mesh.quad_count(), 5);
        assert!(mesh.vertices.iter().all(|v| v.normal != [1.0, 0.0, 0.0]));
    }

    #[test]
    fn face_tint_comes_from_the_neighbouring_cell() {
        let registry = register_default_blocks();
        let mut input = air_input(&registry);
        let solid = BlockCoords::new(6, 6, 50);
        place(&mut input, &registry, solid, BlockId::STONE);
        let above = BlockCoords::new(6, 6, 51).to_index().as_usize();
        input.blocks[above].set_indoor_light(3);
        input.blocks[above].set_outdoor_light(15);

        let mesh = build_chunk_mesh(&input, &registry);
        let top: Vec<_> = mesh
            .vertices
            .iter()
            .filter(|v| v.normal == [0.0, 0.0, 1.0])
            .collect();
        assert_eq!(top.len(), 4);
        assert!(top.iter().all(|v| v.color == [48, 240, 0, 255]));
        let side = mesh
            .vertices
            .iter()
            .find(|v| v.normal == [1.0, 0.0, 0.0])
            .expect("side face");
        assert_eq!(side.color, [0, 0, 0, 255]);
    }

    #[test]
    fn output_carries_revision_and_volume() {
        let registry = register_default_blocks();
        let mut input = air_input(&registry);
        input.revision = 7;
        place(&mut input, &registry, BlockCoords::new(1, 2, 3), BlockId::STONE);

        let output = build_mesh_output(&input, &registry);
        assert_eq!(output.revision, 7);
        assert_eq!(output.volume.opaque_count(), 1);
        assert!(output.volume.is_opaque(BlockCoords::new(1, 2, 3).to_index()));
        assert!(!output.volume.is_opaque(BlockCoords::new(1, 2, 4).to_index()));
    }
}
