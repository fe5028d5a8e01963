pub mod codec;
pub mod file_cache;
pub mod memory;
pub mod versioning;

pub use codec::{decode_into, encode, summarize, BlobSummary, CodecError};
pub use file_cache::ChunkFileCache;
pub use memory::MemoryChunkStore;
