// ============================================================================
// cpu.rs — lifegrid
// CPU backend: the same ping-pong buffers and tick stages without a GPU.
// Used for headless reference runs and GPU verification.
// ============================================================================

use crate::compute::step_cells;
use crate::error::{LifeError, Result};
use crate::frame_loop::{CellReadback, TickStages};
use crate::grid::{BufferRole, Grid};
use crate::render::DrawCall;

pub struct CpuStages {
    grid: Grid,
    cells: [Vec<u32>; 2],
}

impl CpuStages {
    /// Buffer A takes `initial`; buffer B starts dead and is always written
    /// before it is read.
    pub fn new(grid: Grid, initial: Vec<u32>) -> Result<Self> {
        if initial.len() != grid.cell_count() as usize {
            return Err(LifeError::config(format!(
                "initial state has {} cells, grid {}x{} needs {}",
                initial.len(),
                grid.width,
                grid.height,
                grid.cell_count()
            )));
        }
        let back = vec![0; initial.len()];
        Ok(Self {
            grid,
            cells: [initial, back],
        })
    }

    /// Contents of the buffer that is input under `role`.
    pub fn cells(&self, role: BufferRole) -> &[u32] {
        &self.cells[role.input()]
    }
}

impl TickStages for CpuStages {
    fn compute(&mut self, role: BufferRole) -> Result<()> {
        let [a, b] = &mut self.cells;
        let (input, output) = match role {
            BufferRole::AIsInput => (&*a, b),
            BufferRole::BIsInput => (&*b, a),
        };
        step_cells(&self.grid, input, output);
        Ok(())
    }

    /// Nothing to rasterize; only the draw's shape is checked.
    fn render(&mut self, draw: DrawCall) -> Result<()> {
        debug_assert_eq!(draw.instances as usize, self.cells[draw.source].len());
        Ok(())
    }

    fn submit(&mut self) -> Result<()> {
        Ok(())
    }
}

impl CellReadback for CpuStages {
    fn read_cells(&mut self, role: BufferRole) -> Result<Vec<u32>> {
        Ok(self.cells(role).to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_mismatched_initial_state() {
        let grid = Grid::new(3, 3).unwrap();
        assert!(matches!(
            CpuStages::new(grid, vec![0; 8]),
            Err(LifeError::Config(_))
        ));
    }

    #[test]
    fn compute_alternates_buffers() {
        let grid = Grid::new(3, 3).unwrap();
        let mut stages = CpuStages::new(grid, vec![1; 9]).unwrap();

        stages.compute(BufferRole::AIsInput).unwrap();
        assert_eq!(stages.cells(BufferRole::AIsInput), &[1; 9]);
        assert_eq!(stages.cells(BufferRole::BIsInput), &[0; 9]);

        stages.cells[1] = vec![1; 9];
        stages.compute(BufferRole::BIsInput).unwrap();
        assert_eq!(stages.cells(BufferRole::AIsInput), &[0; 9]);
        assert_eq!(stages.cells(BufferRole::BIsInput), &[1; 9]);
    }
}
