// ============================================================================
// compute.rs — lifegrid
// ComputeStage: the Life rule as a GPU compute pass, plus the CPU reference
// used for verification and the CPU backend.
// ============================================================================

use crate::grid::{BufferRole, Grid};
use crate::pipeline::Pipelines;

/// Offsets of the eight Moore neighbours.
pub const NEIGHBOR_OFFSETS: [(i64, i64); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

// ======================== CPU Reference ========================

/// Alive neighbours of (x, y) with toroidal wrap. On grids narrower than
/// three cells several offsets land on the same cell (or the cell itself)
/// and each one counts.
pub fn count_neighbors(grid: &Grid, cells: &[u32], x: u32, y: u32) -> u32 {
    NEIGHBOR_OFFSETS
        .iter()
        .map(|&(dx, dy)| cells[grid.index(x as i64 + dx, y as i64 + dy)])
        .sum()
}

/// Conway's rule: born on 3, survives on 2 or 3.
pub fn next_state(alive: u32, neighbors: u32) -> u32 {
    match (alive, neighbors) {
        (_, 3) => 1,
        (1, 2) => 1,
        _ => 0,
    }
}

/// One generation from `input` into `output`. `output` is fully overwritten.
pub fn step_cells(grid: &Grid, input: &[u32], output: &mut [u32]) {
    let n = grid.cell_count() as usize;
    assert_eq!(input.len(), n, "input buffer length must match grid");
    assert_eq!(output.len(), n, "output buffer length must match grid");

    for y in 0..grid.height {
        for x in 0..grid.width {
            let i = (y * grid.width + x) as usize;
            output[i] = next_state(input[i], count_neighbors(grid, input, x, y));
        }
    }
}

// ======================== GPU Dispatch ========================

/// Record the Life compute pass: reads `cells[role.input()]`, writes
/// `cells[role.output()]`.
pub fn encode_compute_pass(
    encoder: &mut wgpu::CommandEncoder,
    pipelines: &Pipelines,
    role: BufferRole,
    dispatch: (u32, u32),
) {
    let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
        label: Some("life_compute_pass"),
        timestamp_writes: None,
    });
    pass.set_pipeline(&pipelines.compute_pipeline);
    pass.set_bind_group(0, &pipelines.compute_bind_groups[role.input()], &[]);
    pass.dispatch_workgroups(dispatch.0, dispatch.1, 1);
}
