use crate::block::MAX_LIGHT;
use crate::config::LightMode;
use crate::coords::{
    BlockCoords, BlockIndex, ChunkCoords, Direction, LateralDirection, CHUNK_SIZE_X,
    CHUNK_SIZE_Y, CHUNK_SIZE_Z,
};
use crate::cursor::{BlockCursor, ChunkSource};
use crate::world::World;

impl World {
    /// Queues one cell for light re-evaluation. Cells already queued, and
    /// cursors that point nowhere, are ignored.
    pub fn mark_light_dirty(&mut self, cursor: BlockCursor) -> bool {
        let Some(coords) = cursor.chunk() else {
            return false;
        };
        let Some(chunk) = self.chunks.get_mut(&coords) else {
            return false;
        };
        let block = chunk.block_mut(cursor.index());
        if block.light_dirty() {
            return false;
        }
        block.set_light_dirty();
        self.light_queue.push_back(cursor);
        true
    }

    pub fn pending_light(&self) -> usize {
        self.light_queue.len()
    }

    /// Seeds light for a freshly registered chunk: opens sky columns, queues
    /// cells where sky light bleeds sideways, both sides of every resident
    /// seam, and every emitter.
    pub fn init_lights(&mut self, coords: ChunkCoords) {
        let Some(chunk) = self.chunks.get_mut(&coords) else {
            return;
        };

        for y in 0..CHUNK_SIZE_Y as u8 {
            for x in 0..CHUNK_SIZE_X as u8 {
                for z in (0..CHUNK_SIZE_Z).rev() {
                    let block = chunk.block_mut(BlockCoords::new(x, y, z as u8).to_index());
                    if block.opaque() {
                        break;
                    }
                    block.set_sky();
                }
            }
        }

        let mut seeds = Vec::new();
        let Some(chunk) = self.chunks.get(&coords) else {
            return;
        };

        for y in 0..CHUNK_SIZE_Y as u8 {
            for x in 0..CHUNK_SIZE_X as u8 {
                for z in (0..CHUNK_SIZE_Z).rev() {
                    let index = BlockCoords::new(x, y, z as u8).to_index();
                    if !chunk.block(index).exposed_to_sky() {
                        break;
                    }
                    let cursor = BlockCursor::new(coords, index);
                    for dir in LateralDirection::ALL {
                        let side = cursor.step(&self.chunks, dir.as_direction());
                        if let Some(block) = self.chunks.block(side) {
                            if !block.opaque() && !block.exposed_to_sky() {
                                seeds.push(side);
                            }
                        }
                    }
                }
            }
        }

        for dir in LateralDirection::ALL {
            let neighbor_coords = coords.neighbor(dir);
            let Some(neighbor) = self.chunks.get(&neighbor_coords) else {
                continue;
            };
            for along in 0..CHUNK_SIZE_X as u8 {
                for z in 0..CHUNK_SIZE_Z {
                    let ours = dir.face_cell(along, z as u8);
                    if !chunk.block(ours).opaque() {
                        seeds.push(BlockCursor::new(coords, ours));
                    }
                    let theirs = dir.opposite().face_cell(along, z as u8);
                    if !neighbor.block(theirs).opaque() {
                        seeds.push(BlockCursor::new(neighbor_coords, theirs));
                    }
                }
            }
        }

        for (raw, block) in chunk.blocks().iter().enumerate() {
            if self.registry.get(block.id()).emission() > 0 {
                seeds.push(BlockCursor::new(coords, BlockIndex(raw as u16)));
            }
        }

        for seed in seeds {
            self.mark_light_dirty(seed);
        }
    }

    /// Runs the light queue. [`LightMode::Drain`] empties it; [`LightMode::Step`]
    /// only processes what was queued when the call started. Returns the number
    /// of cells evaluated.
    pub fn propagate_light(&mut self, mode: LightMode) -> usize {
        let budget = match mode {
            LightMode::Drain => usize::MAX,
            LightMode::Step => self.light_queue.len(),
        };
        let mut popped = 0;
        let mut evaluated = 0;
        while popped < budget {
            let Some(cursor) = self.light_queue.pop_front() else {
                break;
            };
            popped += 1;
            if self.relight(cursor) {
                evaluated += 1;
            }
        }
        evaluated
    }

    /// Recomputes one cell from its floor values and its neighbours. Returns
    /// false for a cursor whose chunk has gone away.
    fn relight(&mut self, cursor: BlockCursor) -> bool {
        let Some(coords) = cursor.chunk() else {
            return false;
        };
        let Some(block) = self.chunks.block(cursor).copied() else {
            return false;
        };

        let neighbors = Direction::ALL.map(|dir| cursor.step(&self.chunks, dir));
        let mut indoor = self.registry.get(block.id()).emission();
        let mut outdoor = 0;

        if !block.opaque() {
            let above = cursor.step(&self.chunks, Direction::PosZ);
            let open_above = self
                .chunks
                .block(above)
                .map(|above| above.exposed_to_sky())
                .unwrap_or(!above.is_valid());
            if open_above {
                outdoor = MAX_LIGHT;
            }

            for neighbor in neighbors {
                if let Some(side) = self.chunks.block(neighbor) {
                    indoor = indoor.max(side.indoor_light().saturating_sub(1));
                    outdoor = outdoor.max(side.outdoor_light().saturating_sub(1));
                }
            }
        }

        let changed = indoor != block.indoor_light() || outdoor != block.outdoor_light();
        let Some(chunk) = self.chunks.get_mut(&coords) else {
            return false;
        };
        let cell = chunk.block_mut(cursor.index());
        cell.clear_light_dirty();
        if !changed {
            return true;
        }
        cell.set_indoor_light(indoor);
        cell.set_outdoor_light(outdoor);
        chunk.mark_dirty();

        for neighbor in neighbors {
            let Some(neighbor_coords) = neighbor.chunk() else {
                continue;
            };
            if neighbor_coords != coords {
                // Its seam faces sample this cell's light.
                if let Some(other) = self.chunks.get_mut(&neighbor_coords) {
                    other.mark_dirty();
                }
            }
            let receptive = self
                .chunks
                .block(neighbor)
                .map(|side| !side.opaque())
                .unwrap_or(false);
            if receptive {
                self.mark_light_dirty(neighbor);
            }
        }
        true
    }
}
