// ============================================================================
// render.rs — lifegrid
// RenderStage: one instanced quad per cell, read from the buffer the compute
// pass just wrote. Includes a CPU mirror of the vertex placement.
// ============================================================================

use bytemuck::{Pod, Zeroable};

use crate::grid::{BufferRole, Grid};
use crate::pipeline::Pipelines;
use crate::renderer::HudRenderer;

// ======================== Geometry ========================

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 2],
}

impl Vertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x2];

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

const fn v(x: f32, y: f32) -> Vertex {
    Vertex { position: [x, y] }
}

/// Cell quad as two triangles. The 0.8 extent leaves a gap between tiles.
pub const CELL_QUAD: [Vertex; 6] = [
    v(-0.8, -0.8),
    v(0.8, -0.8),
    v(0.8, 0.8),
    v(-0.8, -0.8),
    v(0.8, 0.8),
    v(-0.8, 0.8),
];

/// Color target is cleared to this before the cells are drawn.
pub const BACKGROUND: wgpu::Color = wgpu::Color {
    r: 0.0,
    g: 0.0,
    b: 0.4,
    a: 1.0,
};

// ======================== Draw Description ========================

/// The single draw issued per tick.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DrawCall {
    pub vertices: u32,
    pub instances: u32,
    /// Cell buffer bound as instance state.
    pub source: usize,
}

impl DrawCall {
    /// Draw of the current generation: the buffer that is input for the
    /// next compute pass is the one the last compute pass wrote.
    pub fn for_grid(grid: &Grid, role: BufferRole) -> Self {
        Self {
            vertices: CELL_QUAD.len() as u32,
            instances: grid.cell_count(),
            source: role.input(),
        }
    }
}

// ======================== CPU Mirror ========================
// Used by tests to check placement without a device.

/// Clip-space vertices of instance `index`, matching `vs_main` in
/// `cells.wgsl`. Dead cells collapse every vertex onto the tile's centre,
/// a zero-area quad that rasterizes nothing.
#[cfg(test)]
pub fn cell_vertices(grid: &Grid, index: u32, alive: bool) -> [[f32; 2]; 6] {
    let (cx, cy) = grid.coords(index);
    let dims = [grid.width as f32, grid.height as f32];
    let cell = [cx as f32, cy as f32];
    let state = if alive { 1.0 } else { 0.0 };

    CELL_QUAD.map(|vertex| {
        let mut out = [0.0; 2];
        for axis in 0..2 {
            let offset = cell[axis] / dims[axis] * 2.0;
            out[axis] = (vertex.position[axis] * state + 1.0) / dims[axis] - 1.0 + offset;
        }
        out
    })
}

/// Instance color, matching `fs_main`.
#[cfg(test)]
pub fn cell_color(grid: &Grid, index: u32) -> [f32; 4] {
    let (cx, cy) = grid.coords(index);
    let c = [cx as f32 / grid.width as f32, cy as f32 / grid.height as f32];
    [c[0], c[1], 1.0 - c[0], 1.0]
}

// ======================== GPU Pass ========================

/// Record the cell render pass into `view`: clear, draw every instance,
/// then the optional HUD overlay.
pub fn encode_render_pass(
    encoder: &mut wgpu::CommandEncoder,
    view: &wgpu::TextureView,
    pipelines: &Pipelines,
    draw: DrawCall,
    hud: Option<&HudRenderer>,
) {
    let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some("cells_render_pass"),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view,
            resolve_target: None,
            ops: wgpu::Operations {
                load: wgpu::LoadOp::Clear(BACKGROUND),
                store: wgpu::StoreOp::Store,
            },
        })],
        depth_stencil_attachment: None,
        timestamp_writes: None,
        occlusion_query_set: None,
    });
    pass.set_pipeline(&pipelines.render_pipeline);
    pass.set_bind_group(0, &pipelines.render_bind_groups[draw.source], &[]);
    pass.set_vertex_buffer(0, pipelines.vertex_buffer.slice(..));
    pass.draw(0..draw.vertices, 0..draw.instances);

    if let Some(hud) = hud {
        hud.render(&mut pass);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-6;

    fn bounds(verts: &[[f32; 2]; 6]) -> ([f32; 2], [f32; 2]) {
        let mut lo = [f32::MAX; 2];
        let mut hi = [f32::MIN; 2];
        for p in verts {
            for axis in 0..2 {
                lo[axis] = lo[axis].min(p[axis]);
                hi[axis] = hi[axis].max(p[axis]);
            }
        }
        (lo, hi)
    }

    #[test]
    fn draw_covers_every_cell() {
        let grid = Grid::new(32, 16).unwrap();
        let draw = DrawCall::for_grid(&grid, BufferRole::BIsInput);
        assert_eq!(draw.vertices, 6);
        assert_eq!(draw.instances, 512);
        assert_eq!(draw.source, 1);
    }

    #[test]
    fn origin_cell_is_bottom_left_tile() {
        let grid = Grid::new(4, 4).unwrap();
        let (lo, hi) = bounds(&cell_vertices(&grid, 0, true));
        // Tile spans [-1, -0.5]; the quad is 80% of it around the centre.
        assert!((lo[0] - (-0.95)).abs() < EPS && (lo[1] - (-0.95)).abs() < EPS);
        assert!((hi[0] - (-0.55)).abs() < EPS && (hi[1] - (-0.55)).abs() < EPS);
    }

    #[test]
    fn last_cell_is_top_right_tile() {
        let grid = Grid::new(4, 4).unwrap();
        let (lo, hi) = bounds(&cell_vertices(&grid, 15, true));
        assert!(lo[0] > 0.5 && lo[1] > 0.5);
        assert!(hi[0] <= 1.0 && hi[1] <= 1.0);
    }

    #[test]
    fn instance_maps_row_major() {
        let grid = Grid::new(3, 2).unwrap();
        // Instance 4 is (1, 1): middle column, top row.
        let (lo, hi) = bounds(&cell_vertices(&grid, 4, true));
        let centre = [(lo[0] + hi[0]) / 2.0, (lo[1] + hi[1]) / 2.0];
        assert!(centre[0].abs() < EPS);
        assert!((centre[1] - 0.5).abs() < EPS);
    }

    #[test]
    fn dead_cell_collapses_to_tile_centre() {
        let grid = Grid::new(4, 4).unwrap();
        let verts = cell_vertices(&grid, 5, false);
        for p in &verts {
            assert!((p[0] - verts[0][0]).abs() < EPS);
            assert!((p[1] - verts[0][1]).abs() < EPS);
        }
        let (lo, hi) = bounds(&cell_vertices(&grid, 5, true));
        assert!((verts[0][0] - (lo[0] + hi[0]) / 2.0).abs() < EPS);
    }

    #[test]
    fn tiles_do_not_overlap() {
        let grid = Grid::new(5, 3).unwrap();
        for i in 0..grid.cell_count() - 1 {
            let (_, hi_a) = bounds(&cell_vertices(&grid, i, true));
            let (lo_b, _) = bounds(&cell_vertices(&grid, i + 1, true));
            if grid.coords(i).1 == grid.coords(i + 1).1 {
                assert!(hi_a[0] < lo_b[0]);
            }
        }
    }

    #[test]
    fn color_gradient() {
        let grid = Grid::new(4, 4).unwrap();
        assert_eq!(cell_color(&grid, 0), [0.0, 0.0, 1.0, 1.0]);
        assert_eq!(cell_color(&grid, 6), [0.5, 0.25, 0.5, 1.0]);
    }
}
