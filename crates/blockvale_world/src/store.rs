use std::io;

use crate::block::BlockRegistry;
use crate::chunk::Chunk;
use crate::coords::ChunkCoords;

/// Where evicted chunks go and where activated chunks come from.
pub trait ChunkStore {
    /// Fills `chunk` from storage. `Ok(false)` means nothing is stored for
    /// `coords`; an error means something was stored but could not be read.
    fn load(
        &mut self,
        coords: ChunkCoords,
        chunk: &mut Chunk,
        registry: &BlockRegistry,
    ) -> io::Result<bool>;

    fn save(&mut self, chunk: &Chunk) -> io::Result<()>;
}
