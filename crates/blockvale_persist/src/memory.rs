use std::io;

use rustc_hash::FxHashMap;

use blockvale_world::block::BlockRegistry;
use blockvale_world::chunk::Chunk;
use blockvale_world::coords::ChunkCoords;
use blockvale_world::store::ChunkStore;

use crate::codec::{decode_into, encode};

/// Keeps encoded chunks in memory. Nothing outlives the process.
#[derive(Debug, Default)]
pub struct MemoryChunkStore {
    blobs: FxHashMap<ChunkCoords, Vec<u8>>,
}

impl MemoryChunkStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }

    pub fn contains(&self, coords: ChunkCoords) -> bool {
        self.blobs.contains_key(&coords)
    }

    pub fn blob(&self, coords: ChunkCoords) -> Option<&[u8]> {
        self.blobs.get(&coords).map(Vec::as_slice)
    }

    /// Stores raw bytes as if they had been saved for `coords`.
    pub fn insert_blob(&mut self, coords: ChunkCoords, bytes: Vec<u8>) {
        self.blobs.insert(coords, bytes);
    }
}

impl ChunkStore for MemoryChunkStore {
    fn load(
        &mut self,
        coords: ChunkCoords,
        chunk: &mut Chunk,
        registry: &BlockRegistry,
    ) -> io::Result<bool> {
        let Some(bytes) = self.blobs.get(&coords) else {
            return Ok(false);
        };
        decode_into(bytes, chunk, registry).map_err(|err| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("failed to decode chunk ({}, {}): {err}", coords.x, coords.y),
            )
        })?;
        Ok(true)
    }

    fn save(&mut self, chunk: &Chunk) -> io::Result<()> {
        self.blobs.insert(chunk.coords(), encode(chunk));
        Ok(())
    }
}
