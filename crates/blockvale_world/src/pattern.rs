use crate::coords::{ChunkCoords, CHUNK_SIZE_X, CHUNK_SIZE_Y};

/// Chunk offsets around the viewpoint, in the order they are visited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisitingPattern {
    half_range: i32,
    activation: Vec<ChunkCoords>,
    deactivation: Vec<ChunkCoords>,
}

impl VisitingPattern {
    /// Offsets inside the `[-half_range, half_range]` square whose distance is
    /// within the activation radius are activated nearest first; the rest of
    /// the square is deactivated farthest first.
    pub fn new(max_activate_distance: f32, min_deactivate_distance: f32) -> Self {
        let chunk_width = CHUNK_SIZE_X.max(CHUNK_SIZE_Y) as f32;
        let half_range = ((min_deactivate_distance / chunk_width).floor() as i32).max(1);
        let radius = ((max_activate_distance / chunk_width).floor() as i64).max(0);
        let radius2 = radius * radius;

        let side = (2 * half_range + 1) as usize;
        let mut activation = Vec::with_capacity(side * side);
        let mut deactivation = Vec::with_capacity(side * side);
        for y in -half_range..=half_range {
            for x in -half_range..=half_range {
                let offset = ChunkCoords::new(x, y);
                if offset.magnitude2() <= radius2 {
                    activation.push(offset);
                } else {
                    deactivation.push(offset);
                }
            }
        }

        activation.sort_by(ChunkCoords::cmp_by_distance);
        deactivation.sort_by(|lhs, rhs| rhs.cmp_by_distance(lhs));

        tracing::info!(
            "Built visiting pattern: {} activation offsets, {} deactivation offsets (half range {})",
            activation.len(),
            deactivation.len(),
            half_range
        );

        Self {
            half_range,
            activation,
            deactivation,
        }
    }

    pub fn half_range(&self) -> i32 {
        self.half_range
    }

    pub fn activation(&self) -> &[ChunkCoords] {
        &self.activation
    }

    pub fn deactivation(&self) -> &[ChunkCoords] {
        &self.deactivation
    }

    /// Whether `offset` from the viewpoint chunk lies inside the pattern square.
    pub fn covers(&self, offset: ChunkCoords) -> bool {
        offset.x.abs() <= self.half_range && offset.y.abs() <= self.half_range
    }
}
