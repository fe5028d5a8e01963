use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::coords::CHUNK_SIZE_X;
use crate::worldgen::{
    TerrainGenerator, DEFAULT_BASE_HEIGHT, DEFAULT_HEIGHT_AMPLITUDE, DEFAULT_NOISE_FREQUENCY,
    DEFAULT_SEED,
};

const MIN_ACTIVATE_DISTANCE: f32 = 16.0;
const MAX_ACTIVATE_DISTANCE: f32 = 1024.0;
const MAX_FRAME_BUDGET: usize = 4096;
const MIN_NOISE_FREQUENCY: f64 = 1.0 / 4096.0;
const MAX_NOISE_FREQUENCY: f64 = 1.0;
const MAX_WORKER_THREADS: usize = 64;

/// How much of the light queue one frame processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LightMode {
    /// Run until the queue is empty.
    #[default]
    Drain,
    /// Process only the cells queued before this frame's pass started.
    Step,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldConfig {
    #[serde(default = "default_max_activate_distance")]
    pub max_activate_distance: f32,
    #[serde(default = "default_min_deactivate_distance")]
    pub min_deactivate_distance: f32,
    #[serde(default = "default_max_chunk_activations_per_frame")]
    pub max_chunk_activations_per_frame: usize,
    #[serde(default = "default_max_chunk_deactivations_per_frame")]
    pub max_chunk_deactivations_per_frame: usize,
    #[serde(default = "default_max_mesh_rebuilds_per_frame")]
    pub max_mesh_rebuilds_per_frame: usize,
    #[serde(default)]
    pub light_mode: LightMode,
    #[serde(default = "default_seed")]
    pub seed: u32,
    #[serde(default = "default_noise_frequency")]
    pub noise_frequency: f64,
    #[serde(default = "default_base_height")]
    pub base_height: f64,
    #[serde(default = "default_height_amplitude")]
    pub height_amplitude: f64,
    #[serde(default)]
    pub async_meshing: bool,
    #[serde(default)]
    pub worker_threads: Option<usize>,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            max_activate_distance: default_max_activate_distance(),
            min_deactivate_distance: default_min_deactivate_distance(),
            max_chunk_activations_per_frame: default_max_chunk_activations_per_frame(),
            max_chunk_deactivations_per_frame: default_max_chunk_deactivations_per_frame(),
            max_mesh_rebuilds_per_frame: default_max_mesh_rebuilds_per_frame(),
            light_mode: LightMode::default(),
            seed: default_seed(),
            noise_frequency: default_noise_frequency(),
            base_height: default_base_height(),
            height_amplitude: default_height_amplitude(),
            async_meshing: false,
            worker_threads: None,
        }
    }
}

impl WorldConfig {
    pub fn sanitize(mut self) -> Self {
        self.max_activate_distance = self
            .max_activate_distance
            .clamp(MIN_ACTIVATE_DISTANCE, MAX_ACTIVATE_DISTANCE);
        let min_gap = self.max_activate_distance + CHUNK_SIZE_X as f32;
        if self.min_deactivate_distance.is_nan() || self.min_deactivate_distance < min_gap {
            self.min_deactivate_distance = min_gap;
        }
        self.max_chunk_activations_per_frame =
            self.max_chunk_activations_per_frame.clamp(1, MAX_FRAME_BUDGET);
        self.max_chunk_deactivations_per_frame =
            self.max_chunk_deactivations_per_frame.clamp(1, MAX_FRAME_BUDGET);
        self.max_mesh_rebuilds_per_frame =
            self.max_mesh_rebuilds_per_frame.clamp(1, MAX_FRAME_BUDGET);
        self.noise_frequency = self
            .noise_frequency
            .clamp(MIN_NOISE_FREQUENCY, MAX_NOISE_FREQUENCY);
        self.base_height = self.base_height.clamp(1.0, 255.0);
        self.height_amplitude = self.height_amplitude.clamp(0.0, 128.0);
        self.worker_threads = self
            .worker_threads
            .map(|threads| threads.clamp(1, MAX_WORKER_THREADS));
        self
    }

    pub fn terrain_generator(&self) -> TerrainGenerator {
        TerrainGenerator::new(
            self.seed,
            self.noise_frequency,
            self.base_height,
            self.height_amplitude,
        )
    }

    pub fn load(path: &Path) -> io::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let parsed = toml::from_str::<Self>(&contents).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("failed to deserialize world config: {e}"),
            )
        })?;
        Ok(parsed.sanitize())
    }

    pub fn save(&self, path: &Path) -> io::Result<()> {
        let config = self.clone().sanitize();
        let serialized = toml::to_string_pretty(&config).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("failed to serialize world config: {e}"),
            )
        })?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serialized)
    }
}

fn default_max_activate_distance() -> f32 {
    200.0
}

fn default_min_deactivate_distance() -> f32 {
    250.0
}

fn default_max_chunk_activations_per_frame() -> usize {
    100
}

fn default_max_chunk_deactivations_per_frame() -> usize {
    1
}

fn default_max_mesh_rebuilds_per_frame() -> usize {
    20
}

fn default_seed() -> u32 {
    DEFAULT_SEED
}

fn default_noise_frequency() -> f64 {
    DEFAULT_NOISE_FREQUENCY
}

fn default_base_height() -> f64 {
    DEFAULT_BASE_HEIGHT
}

fn default_height_amplitude() -> f64 {
    DEFAULT_HEIGHT_AMPLITUDE
}
