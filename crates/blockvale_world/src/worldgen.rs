use noise::{NoiseFn, Perlin};

use crate::block::BlockId;
use crate::coords::{ChunkCoords, CHUNK_SIZE_X, CHUNK_SIZE_Y, CHUNK_SIZE_Z};

pub const DEFAULT_SEED: u32 = 0x5EED;
pub const DEFAULT_NOISE_FREQUENCY: f64 = 1.0 / 64.0;
pub const DEFAULT_BASE_HEIGHT: f64 = 100.0;
pub const DEFAULT_HEIGHT_AMPLITUDE: f64 = 24.0;

const DUST_DEPTH: i32 = 3;
const GRASS_DEPTH: i32 = 1;

/// Column height field sampled from 2D Perlin noise.
#[derive(Clone)]
pub struct TerrainGenerator {
    seed: u32,
    noise: Perlin,
    frequency: f64,
    base_height: f64,
    amplitude: f64,
}

impl TerrainGenerator {
    pub fn new(seed: u32, frequency: f64, base_height: f64, amplitude: f64) -> Self {
        Self {
            seed,
            noise: Perlin::new(seed),
            frequency,
            base_height,
            amplitude,
        }
    }

    pub fn seed(&self) -> u32 {
        self.seed
    }

    /// First empty cell of the column at world (`x`, `y`); everything below is ground.
    pub fn column_height(&self, world_x: i32, world_y: i32) -> i32 {
        let sample = self.noise.get([
            f64::from(world_x) * self.frequency,
            f64::from(world_y) * self.frequency,
        ]);
        let height = (self.base_height + sample * self.amplitude).round() as i32;
        height.clamp(1, CHUNK_SIZE_Z as i32)
    }

    /// Block type of a cell `z` in a column whose threshold is `height`.
    pub fn layer_at(height: i32, z: i32) -> BlockId {
        if z >= height {
            BlockId::AIR
        } else if z >= height - GRASS_DEPTH {
            BlockId::GRASS
        } else if z >= height - DUST_DEPTH {
            BlockId::DUST
        } else {
            BlockId::STONE
        }
    }

    /// Thresholds for the 256 columns of `coords`, indexed `x + y * 16`.
    pub fn chunk_heights(&self, coords: ChunkCoords) -> [i32; CHUNK_SIZE_X * CHUNK_SIZE_Y] {
        let mut heights = [0; CHUNK_SIZE_X * CHUNK_SIZE_Y];
        let origin_x = coords.x * CHUNK_SIZE_X as i32;
        let origin_y = coords.y * CHUNK_SIZE_Y as i32;
        for y in 0..CHUNK_SIZE_Y {
            for x in 0..CHUNK_SIZE_X {
                heights[x + y * CHUNK_SIZE_X] =
                    self.column_height(origin_x + x as i32, origin_y + y as i32);
            }
        }
        heights
    }
}

impl Default for TerrainGenerator {
    fn default() -> Self {
        Self::new(
            DEFAULT_SEED,
            DEFAULT_NOISE_FREQUENCY,
            DEFAULT_BASE_HEIGHT,
            DEFAULT_HEIGHT_AMPLITUDE,
        )
    }
}
