use std::sync::Arc;

use blockvale_core::events::{self, EventReceiver, EventSender};
use blockvale_core::jobs::JobSystem;

use crate::block::BlockRegistry;
use crate::mesh::{build_mesh_output, MeshInput, MeshOutput};

/// Builds chunk meshes off the main thread.
///
/// Outputs are only collected by [`MeshWorker::poll`]; installing them into a
/// chunk is the caller's job.
pub struct MeshWorker {
    jobs: JobSystem,
    registry: Arc<BlockRegistry>,
    completed_tx: EventSender<MeshOutput>,
    completed_rx: EventReceiver<MeshOutput>,
    in_flight: usize,
}

impl MeshWorker {
    pub fn new(jobs: JobSystem, registry: Arc<BlockRegistry>) -> Self {
        let (completed_tx, completed_rx) = events::channel();
        Self {
            jobs,
            registry,
            completed_tx,
            completed_rx,
            in_flight: 0,
        }
    }

    pub fn submit(&mut self, input: MeshInput) {
        let registry = Arc::clone(&self.registry);
        self.in_flight += 1;
        self.jobs.spawn_then(
            move || build_mesh_output(&input, &registry),
            self.completed_tx.clone(),
        );
    }

    pub fn poll(&mut self) -> Vec<MeshOutput> {
        let completed = self.completed_rx.drain();
        self.in_flight = self.in_flight.saturating_sub(completed.len());
        completed
    }

    /// Jobs submitted whose output has not been polled yet.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn thread_count(&self) -> usize {
        self.jobs.thread_count()
    }
}
