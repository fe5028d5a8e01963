use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use blockvale_core::jobs::JobSystem;
use glam::{IVec3, Vec3};
use rustc_hash::FxHashMap;
use tracing::{debug, info, warn};

use crate::block::{BlockId, BlockRegistry};
use crate::chunk::Chunk;
use crate::config::WorldConfig;
use crate::coords::{ChunkCoords, Direction, LateralDirection};
use crate::cursor::{BlockCursor, ChunkSource};
use crate::mesh::build_mesh_output;
use crate::mesh_worker::MeshWorker;
use crate::pattern::VisitingPattern;
use crate::physics::{self, Body, CollisionSphere, RaycastResult};
use crate::store::ChunkStore;
use crate::worldgen::TerrainGenerator;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorldError {
    AlreadyResident(ChunkCoords),
    NotResident(ChunkCoords),
    /// No resident chunk holds this cell, or it is outside the vertical range.
    OutOfWorld(IVec3),
    UnknownBlock(BlockId),
    InvalidCursor,
    /// The store refused an evicted chunk; it is still resident.
    SaveFailed { coords: ChunkCoords, reason: String },
}

impl fmt::Display for WorldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyResident(c) => write!(f, "chunk ({}, {}) is already resident", c.x, c.y),
            Self::NotResident(c) => write!(f, "chunk ({}, {}) is not resident", c.x, c.y),
            Self::OutOfWorld(p) => {
                write!(f, "cell ({}, {}, {}) is not in a resident chunk", p.x, p.y, p.z)
            }
            Self::UnknownBlock(id) => write!(f, "block id {} is not registered", id.0),
            Self::InvalidCursor => write!(f, "cursor does not point into a chunk"),
            Self::SaveFailed { coords, reason } => write!(
                f,
                "chunk ({}, {}) could not be saved: {reason}",
                coords.x, coords.y
            ),
        }
    }
}

impl std::error::Error for WorldError {}

/// Supplies the point the resident window is centred on.
pub trait Viewpoint {
    fn position(&self) -> Vec3;
}

impl Viewpoint for Vec3 {
    fn position(&self) -> Vec3 {
        *self
    }
}

/// What one [`World::update`] call did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub activated: usize,
    pub deactivated: usize,
    /// Meshes installed this frame, from either path.
    pub meshes_rebuilt: usize,
    /// Rebuilds handed to the mesh worker this frame.
    pub meshes_scheduled: usize,
    pub light_cells: usize,
    pub pending_light: usize,
    pub resident: usize,
    /// A per-frame budget ran out with work still waiting.
    pub catching_up: bool,
}

pub struct World {
    config: WorldConfig,
    pub(crate) registry: Arc<BlockRegistry>,
    generator: TerrainGenerator,
    pub(crate) chunks: FxHashMap<ChunkCoords, Chunk>,
    pub(crate) light_queue: VecDeque<BlockCursor>,
    pattern: VisitingPattern,
    store: Option<Box<dyn ChunkStore>>,
    mesh_worker: Option<MeshWorker>,
    catching_up: bool,
}

impl World {
    pub fn new(config: WorldConfig, registry: BlockRegistry) -> Self {
        let config = config.sanitize();
        let registry = Arc::new(registry);
        let pattern = VisitingPattern::new(
            config.max_activate_distance,
            config.min_deactivate_distance,
        );

        let mesh_worker = if config.async_meshing {
            match JobSystem::new(config.worker_threads) {
                Ok(jobs) => Some(MeshWorker::new(jobs, Arc::clone(&registry))),
                Err(err) => {
                    warn!("Failed to start mesh workers, meshing on the main thread: {err}");
                    None
                }
            }
        } else {
            None
        };

        Self {
            generator: config.terrain_generator(),
            config,
            registry,
            chunks: FxHashMap::default(),
            light_queue: VecDeque::new(),
            pattern,
            store: None,
            mesh_worker,
            catching_up: false,
        }
    }

    pub fn with_store(mut self, store: Box<dyn ChunkStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    pub fn registry(&self) -> &BlockRegistry {
        &self.registry
    }

    pub fn pattern(&self) -> &VisitingPattern {
        &self.pattern
    }

    pub fn is_async(&self) -> bool {
        self.mesh_worker.is_some()
    }

    pub fn chunk_mut(&mut self, coords: ChunkCoords) -> Option<&mut Chunk> {
        self.chunks.get_mut(&coords)
    }

    pub fn is_resident(&self, coords: ChunkCoords) -> bool {
        self.chunks.contains_key(&coords)
    }

    pub fn resident_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.chunks.values()
    }

    fn neighbors(&self, coords: ChunkCoords) -> [Option<&Chunk>; 4] {
        LateralDirection::ALL.map(|dir| self.chunks.get(&coords.neighbor(dir)))
    }

    /// Inserts a chunk and seeds its light. Neighbours that already have a mesh
    /// rebuild it, since their seam faces now sample this chunk.
    pub fn register_chunk(&mut self, chunk: Chunk) -> Result<(), WorldError> {
        let coords = chunk.coords();
        if self.chunks.contains_key(&coords) {
            return Err(WorldError::AlreadyResident(coords));
        }
        self.chunks.insert(coords, chunk);
        for dir in LateralDirection::ALL {
            if let Some(neighbor) = self.chunks.get_mut(&coords.neighbor(dir)) {
                if neighbor.mesh().is_some() {
                    neighbor.mark_dirty();
                }
            }
        }
        self.init_lights(coords);
        Ok(())
    }

    /// Removes a chunk without persisting it. Queued light cursors into it go
    /// stale and are dropped when popped.
    pub fn unregister_chunk(&mut self, coords: ChunkCoords) -> Result<Chunk, WorldError> {
        self.chunks
            .remove(&coords)
            .ok_or(WorldError::NotResident(coords))
    }

    /// Loads `coords` from the store, generating it when nothing usable is
    /// stored, and registers it.
    pub fn activate_chunk(&mut self, coords: ChunkCoords) -> Result<(), WorldError> {
        if self.chunks.contains_key(&coords) {
            return Err(WorldError::AlreadyResident(coords));
        }

        let mut chunk = Chunk::new(coords);
        let loaded = match self.store.as_mut() {
            Some(store) => match store.load(coords, &mut chunk, &self.registry) {
                Ok(loaded) => loaded,
                Err(err) => {
                    warn!(
                        "Failed to load chunk ({}, {}), regenerating: {}",
                        coords.x, coords.y, err
                    );
                    false
                }
            },
            None => false,
        };
        if !loaded {
            chunk.generate_blocks(&self.generator, &self.registry);
        }
        self.register_chunk(chunk)
    }

    /// Persists the chunk if it has unsaved edits, then drops it. A chunk whose
    /// save fails stays resident with its edits so a later frame can retry.
    pub fn deactivate_chunk(&mut self, coords: ChunkCoords) -> Result<(), WorldError> {
        let chunk = self
            .chunks
            .get(&coords)
            .ok_or(WorldError::NotResident(coords))?;
        if chunk.save_pending() {
            if let Some(store) = self.store.as_mut() {
                if let Err(err) = store.save(chunk) {
                    warn!(
                        "Failed to save chunk ({}, {}), keeping it resident: {}",
                        coords.x, coords.y, err
                    );
                    return Err(WorldError::SaveFailed {
                        coords,
                        reason: err.to_string(),
                    });
                }
            }
        }
        self.unregister_chunk(coords)?;
        Ok(())
    }

    /// Writes every chunk with unsaved edits. Returns how many were written.
    pub fn flush_saves(&mut self) -> usize {
        let Some(store) = self.store.as_mut() else {
            return 0;
        };
        let mut saved = 0;
        for chunk in self.chunks.values_mut() {
            if !chunk.save_pending() {
                continue;
            }
            match store.save(chunk) {
                Ok(()) => {
                    chunk.clear_save_pending();
                    saved += 1;
                }
                Err(err) => {
                    let coords = chunk.coords();
                    warn!("Failed to save chunk ({}, {}): {}", coords.x, coords.y, err);
                }
            }
        }
        saved
    }

    pub fn mark_save_pending(&mut self, coords: ChunkCoords) -> Result<(), WorldError> {
        self.chunks
            .get_mut(&coords)
            .map(Chunk::mark_save_pending)
            .ok_or(WorldError::NotResident(coords))
    }

    /// Stamps the cell under `cursor` and flags every mesh that shows it.
    pub fn reset_block(&mut self, cursor: BlockCursor, id: BlockId) -> Result<(), WorldError> {
        let def = self
            .registry
            .try_get(id)
            .ok_or(WorldError::UnknownBlock(id))?;
        let coords = cursor.chunk().ok_or(WorldError::InvalidCursor)?;
        let chunk = self
            .chunks
            .get_mut(&coords)
            .ok_or(WorldError::NotResident(coords))?;
        chunk.reset_block(cursor.index(), def);

        for dir in LateralDirection::ALL {
            if cursor.index().is_on_face(dir) {
                if let Some(neighbor) = self.chunks.get_mut(&coords.neighbor(dir)) {
                    neighbor.mark_dirty();
                }
            }
        }
        Ok(())
    }

    /// The gameplay edit: stamp, re-light the cell and its neighbours, and
    /// remember to persist the chunk.
    pub fn set_block(&mut self, world: IVec3, id: BlockId) -> Result<(), WorldError> {
        let cursor = self.cursor_at(world);
        let coords = cursor.chunk().ok_or(WorldError::OutOfWorld(world))?;
        self.reset_block(cursor, id)?;
        self.mark_light_dirty(cursor);
        for dir in Direction::ALL {
            let neighbor = cursor.step(&self.chunks, dir);
            self.mark_light_dirty(neighbor);
        }
        self.mark_save_pending(coords)
    }

    pub fn block_id_at(&self, world: IVec3) -> Option<BlockId> {
        self.block(self.cursor_at(world)).map(|block| block.id())
    }

    pub fn raycast(&self, start: Vec3, dir: Vec3, max_dist: f32) -> RaycastResult {
        physics::raycast(&self.chunks, start, dir, max_dist)
    }

    pub fn collide(&self, sphere: &CollisionSphere) -> Option<Vec3> {
        physics::collide(&self.chunks, sphere)
    }

    pub fn collide_body(&self, body: &mut Body) -> bool {
        physics::collide_body(&self.chunks, body)
    }

    /// Clears the cell a ray hit. `Ok(false)` when the ray hit nothing.
    pub fn break_block(&mut self, hit: &RaycastResult) -> Result<bool, WorldError> {
        if !hit.impacted() {
            return Ok(false);
        }
        let Some(cell) = hit.contact.block.world_position() else {
            return Ok(false);
        };
        self.set_block(cell, BlockId::AIR)?;
        Ok(true)
    }

    /// Places `id` in the cell in front of the face a ray hit. Refused when the
    /// ray started inside a solid cell or the target is already solid.
    pub fn place_block(&mut self, hit: &RaycastResult, id: BlockId) -> Result<bool, WorldError> {
        if !hit.impacted() || hit.contact.distance <= 0.0 {
            return Ok(false);
        }
        let Some(cell) = hit.contact.block.world_position() else {
            return Ok(false);
        };
        let target = cell + hit.contact.normal.round().as_ivec3();
        let occupied = self
            .block(self.cursor_at(target))
            .map(|block| block.opaque())
            .unwrap_or(true);
        if occupied {
            return Ok(false);
        }
        self.set_block(target, id)?;
        Ok(true)
    }

    /// Resident chunks that have a mesh, nearest to the viewpoint first.
    pub fn render_list(&self, viewpoint: &impl Viewpoint) -> Vec<&Chunk> {
        let center = ChunkCoords::from_world(viewpoint.position());
        let mut list: Vec<&Chunk> = self
            .chunks
            .values()
            .filter(|chunk| chunk.mesh().is_some())
            .collect();
        list.sort_by(|lhs, rhs| {
            (lhs.coords() - center).cmp_by_distance(&(rhs.coords() - center))
        });
        list
    }

    /// Rebuilds one chunk's mesh on the calling thread. `Ok(false)` when it was
    /// already clean.
    pub fn reconstruct_mesh(&mut self, coords: ChunkCoords) -> Result<bool, WorldError> {
        let chunk = self
            .chunks
            .get(&coords)
            .ok_or(WorldError::NotResident(coords))?;
        if !chunk.is_dirty() {
            return Ok(false);
        }
        let output = match chunk.reconstruct_mesh(self.neighbors(coords), &self.registry) {
            Ok(output) => output,
            Err(not_ready) => {
                debug!("{not_ready}");
                return Ok(false);
            }
        };
        Ok(self
            .chunks
            .get_mut(&coords)
            .map(|chunk| chunk.install_mesh(output))
            .unwrap_or(false))
    }

    /// One frame of residency, light and mesh work around `viewpoint`.
    pub fn update(&mut self, viewpoint: &impl Viewpoint) -> FrameStats {
        let center = ChunkCoords::from_world(viewpoint.position());
        let mut stats = FrameStats {
            meshes_rebuilt: self.poll_meshes(),
            ..FrameStats::default()
        };

        let activation_backlog = self.activate_around(center, &mut stats);
        stats.light_cells = self.propagate_light(self.config.light_mode);
        let mesh_backlog = self.rebuild_meshes(center, &mut stats);
        let deactivation_backlog = self.deactivate_around(center, &mut stats);

        stats.pending_light = self.light_queue.len();
        stats.resident = self.chunks.len();
        stats.catching_up = activation_backlog || mesh_backlog || deactivation_backlog;

        if stats.catching_up != self.catching_up {
            if stats.catching_up {
                info!(
                    "World is catching up: activation={} meshing={} deactivation={}",
                    activation_backlog, mesh_backlog, deactivation_backlog
                );
            } else {
                info!("World caught up with {} resident chunks", stats.resident);
            }
            self.catching_up = stats.catching_up;
        }
        if stats.activated > 0 || stats.deactivated > 0 {
            debug!(
                "Frame at ({}, {}): activated {}, deactivated {}, resident {}",
                center.x, center.y, stats.activated, stats.deactivated, stats.resident
            );
        }

        stats
    }

    fn activate_around(&mut self, center: ChunkCoords, stats: &mut FrameStats) -> bool {
        let budget = self.config.max_chunk_activations_per_frame;
        for i in 0..self.pattern.activation().len() {
            let coords = center + self.pattern.activation()[i];
            if self.chunks.contains_key(&coords) {
                continue;
            }
            if stats.activated == budget {
                return true;
            }
            if self.activate_chunk(coords).is_ok() {
                stats.activated += 1;
            }
        }
        false
    }

    fn rebuild_meshes(&mut self, center: ChunkCoords, stats: &mut FrameStats) -> bool {
        let budget = self.config.max_mesh_rebuilds_per_frame;
        let mut spent = 0;
        for i in 0..self.pattern.activation().len() {
            let coords = center + self.pattern.activation()[i];
            let input = {
                let Some(chunk) = self.chunks.get(&coords) else {
                    continue;
                };
                if !chunk.is_dirty() || chunk.in_flight() == Some(chunk.revision()) {
                    continue;
                }
                let neighbors = self.neighbors(coords);
                if neighbors.iter().any(Option::is_none) {
                    continue;
                }
                if spent == budget {
                    return true;
                }
                match chunk.mesh_input(neighbors) {
                    Ok(input) => input,
                    Err(_) => continue,
                }
            };
            spent += 1;

            match self.mesh_worker.as_mut() {
                Some(worker) => {
                    let revision = input.revision;
                    worker.submit(input);
                    if let Some(chunk) = self.chunks.get_mut(&coords) {
                        chunk.set_in_flight(Some(revision));
                    }
                    stats.meshes_scheduled += 1;
                }
                None => {
                    let output = build_mesh_output(&input, &self.registry);
                    if let Some(chunk) = self.chunks.get_mut(&coords) {
                        if chunk.install_mesh(output) {
                            stats.meshes_rebuilt += 1;
                        }
                    }
                }
            }
        }
        false
    }

    /// Installs finished worker meshes whose chunk is still resident and
    /// unchanged since the job was submitted.
    fn poll_meshes(&mut self) -> usize {
        let Some(worker) = self.mesh_worker.as_mut() else {
            return 0;
        };
        let mut installed = 0;
        for output in worker.poll() {
            let coords = output.coords;
            let revision = output.revision;
            match self.chunks.get_mut(&coords) {
                Some(chunk) => {
                    if chunk.install_mesh(output) {
                        installed += 1;
                    } else {
                        debug!(
                            "Discarding stale mesh for chunk ({}, {}) at revision {}",
                            coords.x, coords.y, revision
                        );
                    }
                }
                None => debug!(
                    "Discarding mesh for evicted chunk ({}, {})",
                    coords.x, coords.y
                ),
            }
        }
        installed
    }

    fn deactivate_around(&mut self, center: ChunkCoords, stats: &mut FrameStats) -> bool {
        let budget = self.config.max_chunk_deactivations_per_frame;
        // Chunks whose save failed stay resident and are retried next frame.
        let mut retry = false;
        for i in 0..self.pattern.deactivation().len() {
            let coords = center + self.pattern.deactivation()[i];
            if !self.chunks.contains_key(&coords) {
                continue;
            }
            if stats.deactivated == budget {
                return true;
            }
            match self.deactivate_chunk(coords) {
                Ok(()) => stats.deactivated += 1,
                Err(_) => retry = true,
            }
        }

        // Chunks left outside the pattern square, e.g. after a teleport.
        let mut orphans: Vec<ChunkCoords> = self
            .chunks
            .keys()
            .copied()
            .filter(|coords| !self.pattern.covers(*coords - center))
            .collect();
        orphans.sort_by(|lhs, rhs| (*rhs - center).cmp_by_distance(&(*lhs - center)));
        for coords in orphans {
            if stats.deactivated == budget {
                return true;
            }
            match self.deactivate_chunk(coords) {
                Ok(()) => stats.deactivated += 1,
                Err(_) => retry = true,
            }
        }
        false
    }
}

impl ChunkSource for World {
    fn chunk(&self, coords: ChunkCoords) -> Option<&Chunk> {
        self.chunks.get(&coords)
    }
}
