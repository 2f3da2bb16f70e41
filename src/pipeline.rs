// ============================================================================
// pipeline.rs — lifegrid
// GPU pipeline creation (compute & render) and bind-group-layout helpers.
// ============================================================================

use std::collections::HashMap;

use wgpu::util::DeviceExt;

use crate::render::{Vertex, CELL_QUAD};
use crate::world::WorldState;

/// Name of the WGSL `override` that sizes the compute workgroup.
pub const WORKGROUP_SIZE_CONSTANT: &str = "WORKGROUP_SIZE";

const LIFE_WGSL: &str = include_str!("shaders/life.wgsl");
const CELLS_WGSL: &str = include_str!("shaders/cells.wgsl");

// ======================== Pipelines ========================

/// All GPU pipelines and their associated bind groups.
pub struct Pipelines {
    pub compute_pipeline: wgpu::ComputePipeline,
    /// Index `i`: read cells[i], write cells[1 - i].
    pub compute_bind_groups: [wgpu::BindGroup; 2],

    pub render_pipeline: wgpu::RenderPipeline,
    /// Index `i`: draw from cells[i].
    pub render_bind_groups: [wgpu::BindGroup; 2],

    pub vertex_buffer: wgpu::Buffer,
}

// ======================== Pipeline Creation ========================

pub fn create_pipelines(
    device: &wgpu::Device,
    world: &WorldState,
    surface_format: wgpu::TextureFormat,
    workgroup_size: u32,
) -> Pipelines {
    // ---- Load shaders ----
    let life_shader = load_shader(device, "life", LIFE_WGSL);
    let cells_shader = load_shader(device, "cells", CELLS_WGSL);

    // ================================================================
    // COMPUTE PIPELINE
    // ================================================================
    let compute_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("life_bgl"),
        entries: &[bgl_uniform(0), bgl_storage_ro(1), bgl_storage_rw(2)],
    });

    let constants = HashMap::from([(WORKGROUP_SIZE_CONSTANT.to_string(), workgroup_size as f64)]);
    let compute_pipeline =
        create_compute_pipeline(device, "life", &compute_bgl, &life_shader, "main", &constants);

    let compute_bind_groups = [
        // A is input: read [0], write [1]
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("life_bg_0"),
            layout: &compute_bgl,
            entries: &[
                bg_buffer(0, &world.grid_params_buffer),
                bg_buffer(1, &world.cells[0]),
                bg_buffer(2, &world.cells[1]),
            ],
        }),
        // B is input: read [1], write [0]
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("life_bg_1"),
            layout: &compute_bgl,
            entries: &[
                bg_buffer(0, &world.grid_params_buffer),
                bg_buffer(1, &world.cells[1]),
                bg_buffer(2, &world.cells[0]),
            ],
        }),
    ];

    // ================================================================
    // RENDER PIPELINE
    // ================================================================
    let render_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("cells_bgl"),
        entries: &[bgl_uniform(0), bgl_storage_ro(1)],
    });

    let render_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("cells_pipeline_layout"),
        bind_group_layouts: &[&render_bgl],
        push_constant_ranges: &[],
    });

    let render_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("cells_pipeline"),
        layout: Some(&render_pipeline_layout),
        vertex: wgpu::VertexState {
            module: &cells_shader,
            entry_point: Some("vs_main"),
            buffers: &[Vertex::layout()],
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: &cells_shader,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format: surface_format,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            ..Default::default()
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    });

    let render_bind_groups = [
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("cells_bg_0"),
            layout: &render_bgl,
            entries: &[
                bg_buffer(0, &world.grid_params_buffer),
                bg_buffer(1, &world.cells[0]),
            ],
        }),
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("cells_bg_1"),
            layout: &render_bgl,
            entries: &[
                bg_buffer(0, &world.grid_params_buffer),
                bg_buffer(1, &world.cells[1]),
            ],
        }),
    ];

    let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("cell_quad_vertices"),
        contents: bytemuck::cast_slice(&CELL_QUAD),
        usage: wgpu::BufferUsages::VERTEX,
    });

    Pipelines {
        compute_pipeline,
        compute_bind_groups,
        render_pipeline,
        render_bind_groups,
        vertex_buffer,
    }
}

// ======================== Helpers ========================

fn load_shader(device: &wgpu::Device, label: &str, source: &str) -> wgpu::ShaderModule {
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    })
}

fn create_compute_pipeline(
    device: &wgpu::Device,
    name: &str,
    bgl: &wgpu::BindGroupLayout,
    module: &wgpu::ShaderModule,
    entry_point: &str,
    constants: &HashMap<String, f64>,
) -> wgpu::ComputePipeline {
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(&format!("{name}_pipeline_layout")),
        bind_group_layouts: &[bgl],
        push_constant_ranges: &[],
    });
    device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
        label: Some(&format!("{name}_pipeline")),
        layout: Some(&layout),
        module,
        entry_point: Some(entry_point),
        compilation_options: wgpu::PipelineCompilationOptions {
            constants,
            zero_initialize_workgroup_memory: false,
        },
        cache: None,
    })
}

fn bgl_uniform(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE | wgpu::ShaderStages::VERTEX_FRAGMENT,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn bgl_storage_ro(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE | wgpu::ShaderStages::VERTEX,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only: true },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn bgl_storage_rw(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only: false },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn bg_buffer(binding: u32, buffer: &wgpu::Buffer) -> wgpu::BindGroupEntry<'_> {
    wgpu::BindGroupEntry {
        binding,
        resource: buffer.as_entire_binding(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validate(label: &str, source: &str) -> (naga::Module, naga::valid::ModuleInfo) {
        let module = naga::front::wgsl::parse_str(source)
            .unwrap_or_else(|err| panic!("{label} WGSL parse failed: {err}"));
        let mut validator = naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::empty(),
        );
        let info = validator
            .validate(&module)
            .unwrap_or_else(|err| panic!("{label} WGSL validation failed: {err:?}"));
        (module, info)
    }

    fn bindings(module: &naga::Module) -> Vec<(u32, u32)> {
        let mut out: Vec<(u32, u32)> = module
            .global_variables
            .iter()
            .filter_map(|(_, var)| var.binding.as_ref().map(|b| (b.group, b.binding)))
            .collect();
        out.sort();
        out
    }

    #[test]
    fn life_kernel_resolves_workgroup_override() {
        let (module, info) = validate("life", LIFE_WGSL);
        assert_eq!(bindings(&module), [(0, 0), (0, 1), (0, 2)]);

        for size in [1u32, 4, 8, 16] {
            let mut constants = naga::back::PipelineConstants::default();
            constants.insert(WORKGROUP_SIZE_CONSTANT.to_string(), size as f64);
            let (resolved, _) =
                naga::back::pipeline_constants::process_overrides(&module, &info, &constants)
                    .unwrap_or_else(|err| panic!("workgroup {size}: {err}"));

            let entry = resolved
                .entry_points
                .iter()
                .find(|ep| ep.name == "main")
                .expect("compute entry point");
            assert_eq!(entry.stage, naga::ShaderStage::Compute);
            assert_eq!(entry.workgroup_size, [size, size, 1]);
        }
    }

    #[test]
    fn cells_shader_has_both_stages() {
        let (module, _) = validate("cells", CELLS_WGSL);
        assert_eq!(bindings(&module), [(0, 0), (0, 1)]);

        let stages: Vec<(&str, naga::ShaderStage)> = module
            .entry_points
            .iter()
            .map(|ep| (ep.name.as_str(), ep.stage))
            .collect();
        assert!(stages.contains(&("vs_main", naga::ShaderStage::Vertex)));
        assert!(stages.contains(&("fs_main", naga::ShaderStage::Fragment)));
    }
}
