use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use glam::{Vec2, Vec3};
use tracing::{debug, info, warn};

use blockvale_persist::{ChunkFileCache, MemoryChunkStore};
use blockvale_world::block::{register_default_blocks, BlockId};
use blockvale_world::coords::ChunkCoords;
use blockvale_world::physics::{Body, PhysicsMode};
use blockvale_world::store::ChunkStore;
use blockvale_world::{FrameStats, World, WorldConfig};

const TICK_RATE: u32 = 20;
const TICK_DURATION: Duration = Duration::from_millis(1000 / TICK_RATE as u64);
const FRAME_DT: f32 = 1.0 / TICK_RATE as f32;
const STATS_INTERVAL_FRAMES: u64 = (TICK_RATE as u64) * 5;
const EDIT_INTERVAL_FRAMES: u64 = (TICK_RATE as u64) * 2;
const GRAVITY: f32 = 20.0;
const HOP_SPEED: f32 = 8.0;
const WALKER_RADIUS: f32 = 0.4;
const EDIT_REACH: f32 = 6.0;
const SPAWN: Vec3 = Vec3::new(8.5, 8.5, 200.0);

#[derive(Debug, Clone)]
pub struct HostConfig {
    pub world_path: PathBuf,
    pub config_path: Option<PathBuf>,
    pub frames: Option<u64>,
    pub speed: f32,
    pub persist: bool,
}

/// Walks a body across the terrain at a fixed tick rate, dropping a light
/// block under it now and then, until `running` clears or the frame limit hits.
pub fn run(config: HostConfig, running: Arc<AtomicBool>) -> io::Result<()> {
    let world_config = load_world_config(&config)?;
    let store: Box<dyn ChunkStore> = if config.persist {
        Box::new(ChunkFileCache::open(config.world_path.join("chunks"))?)
    } else {
        Box::new(MemoryChunkStore::new())
    };

    let mut world = World::new(world_config, register_default_blocks()).with_store(store);
    info!(
        "Host started: world={:?}, persist={}, async meshing={}",
        config.world_path,
        config.persist,
        world.is_async()
    );

    let mut walker = Body::new(SPAWN, WALKER_RADIUS, PhysicsMode::Walk);
    let mut frame: u64 = 0;
    let mut edits = 0usize;
    let mut totals = FrameStats::default();

    while running.load(Ordering::SeqCst) {
        if config.frames.is_some_and(|limit| frame >= limit) {
            break;
        }
        let tick_start = Instant::now();

        let stats = world.update(&walker.transform.translation);
        accumulate(&mut totals, &stats);
        step_walker(&world, &mut walker, config.speed);

        frame += 1;
        if frame % EDIT_INTERVAL_FRAMES == 0 && drop_light(&mut world, &walker) {
            edits += 1;
        }
        if frame % STATS_INTERVAL_FRAMES == 0 {
            info!(
                "frame {frame}: resident={} activated={} deactivated={} meshes={} light cells={} pending light={} catching up={}",
                stats.resident,
                totals.activated,
                totals.deactivated,
                totals.meshes_rebuilt,
                totals.light_cells,
                stats.pending_light,
                stats.catching_up
            );
            totals = FrameStats::default();
        }

        let elapsed = tick_start.elapsed();
        if elapsed < TICK_DURATION {
            std::thread::sleep(TICK_DURATION - elapsed);
        }
    }

    info!("Host shutting down after {frame} frames and {edits} edits, saving world...");
    let saved = world.flush_saves();
    info!("Saved {saved} chunks. Goodbye!");
    Ok(())
}

fn load_world_config(config: &HostConfig) -> io::Result<WorldConfig> {
    let Some(path) = config.config_path.as_ref() else {
        return Ok(WorldConfig::default());
    };
    if path.exists() {
        return WorldConfig::load(path);
    }
    let defaults = WorldConfig::default();
    if let Err(err) = defaults.save(path) {
        warn!("Failed to write default world config to {:?}: {}", path, err);
    } else {
        info!("Wrote default world config to {:?}", path);
    }
    Ok(defaults)
}

fn accumulate(totals: &mut FrameStats, frame: &FrameStats) {
    totals.activated += frame.activated;
    totals.deactivated += frame.deactivated;
    totals.meshes_rebuilt += frame.meshes_rebuilt;
    totals.light_cells += frame.light_cells;
}

/// Gravity plus constant forward motion. A sideways push from the terrain
/// means a wall, so the walker hops.
fn step_walker(world: &World, walker: &mut Body, speed: f32) {
    if !world.is_resident(ChunkCoords::from_world(walker.transform.translation)) {
        return;
    }
    walker.velocity.x = speed;
    walker.velocity.z -= GRAVITY * FRAME_DT;
    walker.integrate(FRAME_DT);

    let before = walker.transform.translation;
    if world.collide_body(walker) {
        let pushed = walker.transform.translation - before;
        if pushed.z <= 0.0 && pushed.truncate() != Vec2::ZERO {
            walker.velocity.z = HOP_SPEED;
        }
    }
}

fn drop_light(world: &mut World, walker: &Body) -> bool {
    let hit = world.raycast(walker.transform.translation, Vec3::NEG_Z, EDIT_REACH);
    match world.place_block(&hit, BlockId::LIGHT) {
        Ok(placed) => {
            if placed {
                debug!("Placed light at {:?}", hit.contact.position);
            }
            placed
        }
        Err(err) => {
            warn!("Edit failed: {err}");
            false
        }
    }
}
