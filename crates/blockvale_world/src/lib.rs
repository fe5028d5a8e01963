pub mod block;
pub mod chunk;
pub mod config;
pub mod coords;
pub mod cursor;
pub mod lighting;
pub mod mesh;
pub mod mesh_worker;
pub mod pattern;
pub mod physics;
pub mod store;
pub mod world;
pub mod worldgen;

pub use block::{register_default_blocks, Block, BlockDef, BlockId, BlockRegistry};
pub use chunk::Chunk;
pub use config::{LightMode, WorldConfig};
pub use coords::{BlockCoords, ChunkCoords};
pub use cursor::{BlockCursor, ChunkSource};
pub use store::ChunkStore;
pub use world::{FrameStats, Viewpoint, World, WorldError};
