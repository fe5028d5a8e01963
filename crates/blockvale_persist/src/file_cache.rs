use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use rustc_hash::FxHashSet;
use tracing::{debug, info};

use blockvale_world::block::BlockRegistry;
use blockvale_world::chunk::Chunk;
use blockvale_world::coords::ChunkCoords;
use blockvale_world::store::ChunkStore;

use crate::codec::{decode_into, encode};

const FILE_PREFIX: &str = "Chunk_";
const FILE_EXTENSION: &str = ".chunk";

/// One file per chunk in a flat directory.
///
/// The directory is listed once on open; loads for coordinates that were
/// never indexed do not touch the file system.
pub struct ChunkFileCache {
    dir: PathBuf,
    index: FxHashSet<ChunkCoords>,
}

impl ChunkFileCache {
    pub fn open(dir: impl AsRef<Path>) -> io::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        let mut index = FxHashSet::default();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name();
            if let Some(coords) = name.to_str().and_then(parse_file_name) {
                index.insert(coords);
            }
        }

        info!("Indexed {} chunk files in {:?}", index.len(), dir);
        Ok(Self { dir, index })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn exists(&self, coords: ChunkCoords) -> bool {
        self.index.contains(&coords)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn path_for(&self, coords: ChunkCoords) -> PathBuf {
        self.dir.join(file_name(coords))
    }
}

impl ChunkStore for ChunkFileCache {
    fn load(
        &mut self,
        coords: ChunkCoords,
        chunk: &mut Chunk,
        registry: &BlockRegistry,
    ) -> io::Result<bool> {
        if !self.exists(coords) {
            return Ok(false);
        }
        let path = self.path_for(coords);
        let bytes = fs::read(&path)?;
        decode_into(&bytes, chunk, registry).map_err(|err| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("failed to decode chunk file {path:?}: {err}"),
            )
        })?;
        debug!("Loaded chunk ({}, {}) from {:?}", coords.x, coords.y, path);
        Ok(true)
    }

    fn save(&mut self, chunk: &Chunk) -> io::Result<()> {
        let coords = chunk.coords();
        let path = self.path_for(coords);
        fs::write(&path, encode(chunk))?;
        self.index.insert(coords);
        debug!("Saved chunk ({}, {}) to {:?}", coords.x, coords.y, path);
        Ok(())
    }
}

pub fn file_name(coords: ChunkCoords) -> String {
    format!("{FILE_PREFIX}{},{}{FILE_EXTENSION}", coords.x, coords.y)
}

/// Inverse of [`file_name`]; anything else in the directory is ignored.
pub fn parse_file_name(name: &str) -> Option<ChunkCoords> {
    let coords = name.strip_prefix(FILE_PREFIX)?.strip_suffix(FILE_EXTENSION)?;
    let (x, y) = coords.split_once(',')?;
    Some(ChunkCoords::new(x.parse().ok()?, y.parse().ok()?))
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::io;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    use glam::IVec3;

    use super::{file_name, parse_file_name, ChunkFileCache};
    use blockvale_world::block::{register_default_blocks, BlockId};
    use blockvale_world::chunk::Chunk;
    use blockvale_world::config::WorldConfig;
    use blockvale_world::coords::{BlockCoords, ChunkCoords};
    use blockvale_world::cursor::ChunkSource;
    use blockvale_world::store::ChunkStore;
    use blockvale_world::world::World;

    fn temp_dir(label: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock after epoch")
            .as_nanos();
        std::env::temp_dir().join(format!(
            "blockvale_{label}_{}_{nanos}",
            std::process::id()
        ))
    }

    #[test]
    fn file_names_round_trip() {
        let coords = ChunkCoords::new(-12, 40);
        assert_eq!(file_name(coords), "Chunk_-12,40.chunk");
        assert_eq!(parse_file_name(&file_name(coords)), Some(coords));
        assert_eq!(parse_file_name("Chunk_1,2.tmp"), None);
        assert_eq!(parse_file_name("Chunk_1;2.chunk"), None);
        assert_eq!(parse_file_name("notes.txt"), None);
    }

    #[test]
    fn saved_chunks_are_indexed_and_reload() {
        let dir = temp_dir("file_cache_reload");
        let registry = register_default_blocks();
        let coords = ChunkCoords::new(3, -4);
        let mut chunk = Chunk::filled(coords, registry.get(BlockId::AIR));
        chunk.reset_block(BlockCoords::new(5, 6, 7).to_index(), registry.get(BlockId::LIGHT));

        {
            let mut cache = ChunkFileCache::open(&dir).expect("open empty dir");
            assert!(cache.is_empty());
            cache.save(&chunk).expect("save chunk");
            assert!(cache.exists(coords));
        }
        fs::write(dir.join("readme.txt"), b"not a chunk").expect("write stray file");

        let mut cache = ChunkFileCache::open(&dir).expect("reopen dir");
        assert_eq!(cache.len(), 1);
        assert!(cache.exists(coords));
        assert!(!cache.exists(ChunkCoords::ZERO));

        let mut loaded = Chunk::new(coords);
        assert!(cache.load(coords, &mut loaded, &registry).expect("load chunk"));
        assert_eq!(loaded.block_at(BlockCoords::new(5, 6, 7)).id(), BlockId::LIGHT);
        assert_eq!(loaded.block_at(BlockCoords::new(5, 6, 8)).id(), BlockId::AIR);

        let mut untouched = Chunk::new(ChunkCoords::ZERO);
        assert!(!cache
            .load(ChunkCoords::ZERO, &mut untouched, &registry)
            .expect("unindexed load"));

        fs::remove_dir_all(&dir).expect("clean up temp dir");
    }

    #[test]
    fn corrupt_file_is_invalid_data_and_world_regenerates() {
        let dir = temp_dir("file_cache_corrupt");
        fs::create_dir_all(&dir).expect("create temp dir");
        fs::write(dir.join(file_name(ChunkCoords::ZERO)), b"BVCK\x09garbage").expect("write file");

        let registry = register_default_blocks();
        let mut cache = ChunkFileCache::open(&dir).expect("open dir");
        let mut chunk = Chunk::new(ChunkCoords::ZERO);
        let err = cache
            .load(ChunkCoords::ZERO, &mut chunk, &registry)
            .expect_err("corrupt header");
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);

        let mut world = World::new(WorldConfig::default(), register_default_blocks())
            .with_store(Box::new(cache));
        world.activate_chunk(ChunkCoords::ZERO).expect("activate");
        assert_eq!(world.block_id_at(IVec3::ZERO), Some(BlockId::STONE));
        assert!(world.chunk(ChunkCoords::ZERO).is_some());

        fs::remove_dir_all(&dir).expect("clean up temp dir");
    }

    #[test]
    fn evicted_edits_survive_a_restart() {
        let dir = temp_dir("file_cache_world");
        let edit = IVec3::new(4, 9, 250);

        {
            let cache = ChunkFileCache::open(&dir).expect("open dir");
            let mut world = World::new(WorldConfig::default(), register_default_blocks())
                .with_store(Box::new(cache));
            world.activate_chunk(ChunkCoords::ZERO).expect("activate");
            let cursor = world.cursor_at(edit);
            world.reset_block(cursor, BlockId::LIGHT).expect("edit");
            world.mark_save_pending(ChunkCoords::ZERO).expect("resident");
            world.deactivate_chunk(ChunkCoords::ZERO).expect("evict");
        }

        let cache = ChunkFileCache::open(&dir).expect("reopen dir");
        assert!(cache.exists(ChunkCoords::ZERO));
        let mut world = World::new(WorldConfig::default(), register_default_blocks())
            .with_store(Box::new(cache));
        world.activate_chunk(ChunkCoords::ZERO).expect("activate");
        assert_eq!(world.block_id_at(edit), Some(BlockId::LIGHT));

        fs::remove_dir_all(&dir).expect("clean up temp dir");
    }
}
