// ============================================================================
// metrics.rs — lifegrid
// Population statistics from a cell-buffer readback.
// ============================================================================

use crate::grid::Grid;

/// Population summary for one generation.
#[derive(Clone, Debug, PartialEq)]
pub struct GridStats {
    pub generation: u64,
    pub alive: u32,
    pub cell_count: u32,
    pub alive_fraction: f32,
    /// Alive cells per row band (top quarter to bottom quarter of the
    /// buffer), a cheap view of where the population sits.
    pub quarter_counts: [u32; 4],
}

impl GridStats {
    pub fn from_cells(grid: &Grid, generation: u64, cells: &[u32]) -> Self {
        let mut alive = 0u32;
        let mut quarter_counts = [0u32; 4];
        for (i, &c) in cells.iter().enumerate() {
            if c == 0 {
                continue;
            }
            alive += 1;
            let row = i as u64 / grid.width as u64;
            let band = (row * 4 / grid.height as u64).min(3) as usize;
            quarter_counts[band] += 1;
        }

        let cell_count = grid.cell_count();
        GridStats {
            generation,
            alive,
            cell_count,
            alive_fraction: alive as f32 / cell_count as f32,
            quarter_counts,
        }
    }

    pub fn is_extinct(&self) -> bool {
        self.alive == 0
    }

    /// Log at INFO level, with the change from the previous sample if any.
    pub fn log(&self, prev: Option<&GridStats>) {
        let trend = match prev {
            Some(p) => format!(
                " | Δalive={:+} over {} gens",
                self.alive as i64 - p.alive as i64,
                self.generation.saturating_sub(p.generation)
            ),
            None => String::new(),
        };
        log::info!(
            "Generation {}: alive={}/{} ({:.1}%) bands={:?}{}",
            self.generation,
            self.alive,
            self.cell_count,
            self.alive_fraction * 100.0,
            self.quarter_counts,
            trend,
        );
        if self.is_extinct() {
            log::info!("Population extinct at generation {}", self.generation);
        }
    }
}
