// ============================================================================
// world.rs — lifegrid
// WorldState: the two cell-state storage buffers (ping-pong pair), the grid
// uniform, initialization from a seed policy and CPU readback.
// ============================================================================

use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use crate::error::{LifeError, Result};
use crate::grid::Grid;

// ======================== Uniform Structs ========================

/// Grid dimensions bound as a runtime uniform for both shaders.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct GridParams {
    pub width: u32,
    pub height: u32,
    pub _pad0: u32,
    pub _pad1: u32,
}

impl GridParams {
    pub fn new(grid: &Grid) -> Self {
        Self {
            width: grid.width,
            height: grid.height,
            _pad0: 0,
            _pad1: 0,
        }
    }
}

// ======================== WorldState ========================

pub struct WorldState {
    pub grid: Grid,
    /// Cell buffers A and B. Which one is input is decided by the frame
    /// loop's `BufferRole`.
    pub cells: [wgpu::Buffer; 2],
    pub grid_params_buffer: wgpu::Buffer,
}

impl WorldState {
    /// Allocate both buffers with `initial` in A. B starts zeroed; it is
    /// always written by a compute pass before it is read.
    pub fn with_cells(device: &wgpu::Device, grid: Grid, initial: &[u32]) -> Result<Self> {
        check_cells(&grid, initial)?;

        let max_binding = device.limits().max_storage_buffer_binding_size as u64;
        if grid.byte_len() > max_binding {
            return Err(LifeError::config(format!(
                "grid {}x{} needs {} bytes per buffer, device allows {}",
                grid.width,
                grid.height,
                grid.byte_len(),
                max_binding
            )));
        }

        let usage = wgpu::BufferUsages::STORAGE
            | wgpu::BufferUsages::COPY_SRC
            | wgpu::BufferUsages::COPY_DST;

        let create_cell_buffer = |label: &str, data: &[u32]| -> wgpu::Buffer {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: bytemuck::cast_slice(data),
                usage,
            })
        };

        let zeros = vec![0u32; initial.len()];
        let cells = [
            create_cell_buffer("cells_a", initial),
            create_cell_buffer("cells_b", &zeros),
        ];

        let grid_params_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("grid_params"),
            contents: bytemuck::bytes_of(&GridParams::new(&grid)),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        Ok(WorldState {
            grid,
            cells,
            grid_params_buffer,
        })
    }

    /// Replace the whole grid: A gets `cells`, B is cleared. The caller
    /// resets the frame loop so A is input again.
    pub fn reinitialize(&self, queue: &wgpu::Queue, cells: &[u32]) -> Result<()> {
        check_cells(&self.grid, cells)?;
        queue.write_buffer(&self.cells[0], 0, bytemuck::cast_slice(cells));
        let zeros = vec![0u32; cells.len()];
        queue.write_buffer(&self.cells[1], 0, bytemuck::cast_slice(&zeros));
        Ok(())
    }

    /// Copy buffer `index` back to the CPU. Blocks until the GPU is done.
    pub fn readback_cells(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        index: usize,
    ) -> Result<Vec<u32>> {
        let size = self.grid.byte_len();
        let staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("cells_staging"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("readback_encoder"),
        });
        encoder.copy_buffer_to_buffer(&self.cells[index], 0, &staging, 0, size);
        queue.submit(std::iter::once(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        device.poll(wgpu::Maintain::Wait);

        rx.recv()
            .map_err(|_| LifeError::Device("readback callback dropped".to_string()))??;

        let data = slice.get_mapped_range();
        let cells = bytemuck::cast_slice::<u8, u32>(&data).to_vec();
        drop(data);
        staging.unmap();
        Ok(cells)
    }
}

fn check_cells(grid: &Grid, cells: &[u32]) -> Result<()> {
    if cells.len() != grid.cell_count() as usize {
        return Err(LifeError::config(format!(
            "cell state has {} entries, grid {}x{} needs {}",
            cells.len(),
            grid.width,
            grid.height,
            grid.cell_count()
        )));
    }
    if cells.iter().any(|&c| c > 1) {
        return Err(LifeError::config("cell state values must be 0 or 1"));
    }
    Ok(())
}
