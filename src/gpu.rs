// ============================================================================
// gpu.rs — lifegrid
// Device bootstrap, surface configuration, and the wgpu implementation of the
// tick stages (one command encoder per tick, bounded frames in flight).
// ============================================================================

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use crate::compute::encode_compute_pass;
use crate::config::LifeConfig;
use crate::error::{LifeError, Result};
use crate::frame_loop::{CellReadback, TickStages};
use crate::grid::BufferRole;
use crate::pipeline::{create_pipelines, Pipelines};
use crate::render::{encode_render_pass, DrawCall};
use crate::renderer::HudRenderer;
use crate::world::WorldState;

/// Offscreen target edge for headless rendering.
const OFFSCREEN_SIZE: u32 = 512;
const OFFSCREEN_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

// ======================== Device Bootstrap ========================

pub fn create_instance() -> wgpu::Instance {
    wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        ..Default::default()
    })
}

pub async fn request_device(
    instance: &wgpu::Instance,
    compatible_surface: Option<&wgpu::Surface<'_>>,
) -> Result<(wgpu::Adapter, wgpu::Device, wgpu::Queue)> {
    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface,
            force_fallback_adapter: false,
        })
        .await
        .ok_or(LifeError::NoDevice)?;

    let info = adapter.get_info();
    log::info!("GPU: {} ({:?})", info.name, info.backend);

    let (device, queue) = adapter
        .request_device(
            &wgpu::DeviceDescriptor {
                label: Some("lifegrid_device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits {
                    max_storage_buffer_binding_size: adapter
                        .limits()
                        .max_storage_buffer_binding_size,
                    ..Default::default()
                },
                memory_hints: Default::default(),
            },
            None,
        )
        .await?;

    Ok((adapter, device, queue))
}

/// Preferred sRGB format, FIFO presentation.
pub fn configure_surface(
    surface: &wgpu::Surface<'_>,
    adapter: &wgpu::Adapter,
    device: &wgpu::Device,
    width: u32,
    height: u32,
) -> Result<wgpu::SurfaceConfiguration> {
    let caps = surface.get_capabilities(adapter);
    let format = caps
        .formats
        .iter()
        .find(|f| f.is_srgb())
        .or_else(|| caps.formats.first())
        .copied()
        .ok_or_else(|| LifeError::SurfaceConfig("surface reports no supported formats".into()))?;
    let alpha_mode = caps
        .alpha_modes
        .first()
        .copied()
        .ok_or_else(|| LifeError::SurfaceConfig("surface reports no alpha modes".into()))?;

    let config = wgpu::SurfaceConfiguration {
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        format,
        width: width.max(1),
        height: height.max(1),
        present_mode: wgpu::PresentMode::Fifo,
        alpha_mode,
        view_formats: vec![],
        desired_maximum_frame_latency: 2,
    };
    surface.configure(device, &config);
    log::info!("Surface: {:?} {}x{}", format, config.width, config.height);
    Ok(config)
}

// ======================== Device Faults ========================

/// First uncaptured device error, held until the next submit checks it.
#[derive(Clone, Default)]
pub struct DeviceFaults(Arc<Mutex<Option<String>>>);

impl DeviceFaults {
    pub fn install(device: &wgpu::Device) -> Self {
        let faults = Self::default();
        let slot = faults.0.clone();
        device.on_uncaptured_error(Box::new(move |err: wgpu::Error| {
            if let Ok(mut first) = slot.lock() {
                if first.is_none() {
                    *first = Some(err.to_string());
                }
            }
        }));
        faults
    }

    pub fn take(&self) -> Option<String> {
        self.0.lock().ok().and_then(|mut first| first.take())
    }
}

// ======================== Render Target ========================

pub enum RenderTarget {
    Surface {
        surface: wgpu::Surface<'static>,
        config: wgpu::SurfaceConfiguration,
    },
    Offscreen {
        _texture: wgpu::Texture,
        view: wgpu::TextureView,
    },
}

impl RenderTarget {
    pub fn offscreen(device: &wgpu::Device) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("offscreen_target"),
            size: wgpu::Extent3d {
                width: OFFSCREEN_SIZE,
                height: OFFSCREEN_SIZE,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: OFFSCREEN_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        RenderTarget::Offscreen {
            _texture: texture,
            view,
        }
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        match self {
            RenderTarget::Surface { config, .. } => config.format,
            RenderTarget::Offscreen { .. } => OFFSCREEN_FORMAT,
        }
    }

    pub fn size(&self) -> (u32, u32) {
        match self {
            RenderTarget::Surface { config, .. } => (config.width, config.height),
            RenderTarget::Offscreen { .. } => (OFFSCREEN_SIZE, OFFSCREEN_SIZE),
        }
    }
}

// ======================== GpuStages ========================

pub struct GpuStages {
    device: wgpu::Device,
    queue: wgpu::Queue,
    world: WorldState,
    pipelines: Pipelines,
    target: RenderTarget,
    dispatch: (u32, u32),

    // Per-tick recording state
    encoder: Option<wgpu::CommandEncoder>,
    frame: Option<wgpu::SurfaceTexture>,

    faults: DeviceFaults,
    in_flight: Arc<AtomicU32>,
    max_in_flight: u32,

    hud: Option<HudRenderer>,
    pub show_hud: bool,
}

impl GpuStages {
    pub fn new(
        device: wgpu::Device,
        queue: wgpu::Queue,
        target: RenderTarget,
        config: &LifeConfig,
        initial: &[u32],
        with_hud: bool,
    ) -> Result<Self> {
        let grid = config.validate()?;
        let faults = DeviceFaults::install(&device);
        let world = WorldState::with_cells(&device, grid, initial)?;
        let pipelines = create_pipelines(&device, &world, target.format(), config.workgroup_size);
        let hud = with_hud.then(|| HudRenderer::new(&device, &queue, target.format()));

        // Shader or pipeline validation errors surface through the handler.
        if let Some(msg) = faults.take() {
            return Err(LifeError::Device(msg));
        }

        log::info!(
            "Pipelines ready: {}x{} grid, workgroup {}x{}, dispatch {:?}",
            grid.width,
            grid.height,
            config.workgroup_size,
            config.workgroup_size,
            grid.dispatch_size(config.workgroup_size)
        );

        Ok(Self {
            dispatch: grid.dispatch_size(config.workgroup_size),
            device,
            queue,
            world,
            pipelines,
            target,
            encoder: None,
            frame: None,
            faults,
            in_flight: Arc::new(AtomicU32::new(0)),
            max_in_flight: config.max_frames_in_flight,
            hud,
            show_hud: with_hud,
        })
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        if let RenderTarget::Surface { surface, config } = &mut self.target {
            config.width = width;
            config.height = height;
            surface.configure(&self.device, config);
        }
    }

    pub fn prepare_hud(&mut self, text: &str) {
        let (w, h) = self.target.size();
        if let Some(hud) = &mut self.hud {
            hud.prepare(&self.device, &self.queue, text, w, h);
        }
    }

    /// Reinitialize both buffers. The frame loop must be reset alongside.
    pub fn reinitialize(&mut self, cells: &[u32]) -> Result<()> {
        self.world.reinitialize(&self.queue, cells)
    }

    fn check_faults(&self) -> Result<()> {
        match self.faults.take() {
            Some(msg) => Err(LifeError::Device(msg)),
            None => Ok(()),
        }
    }
}

impl TickStages for GpuStages {
    fn compute(&mut self, role: BufferRole) -> Result<()> {
        let encoder = tick_encoder(&mut self.encoder, &self.device);
        encode_compute_pass(encoder, &self.pipelines, role, self.dispatch);
        Ok(())
    }

    fn render(&mut self, draw: DrawCall) -> Result<()> {
        let view = match &self.target {
            RenderTarget::Offscreen { view, .. } => view.clone(),
            RenderTarget::Surface { surface, config } => match surface.get_current_texture() {
                Ok(frame) => {
                    let view = frame
                        .texture
                        .create_view(&wgpu::TextureViewDescriptor::default());
                    self.frame = Some(frame);
                    view
                }
                Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                    log::warn!("Surface lost or outdated; reconfiguring, skipping draw");
                    surface.configure(&self.device, config);
                    return Ok(());
                }
                Err(wgpu::SurfaceError::OutOfMemory) => {
                    return Err(LifeError::Device("out of memory acquiring surface".into()));
                }
                Err(e) => {
                    log::warn!("Surface error: {:?}; skipping draw", e);
                    return Ok(());
                }
            },
        };

        let hud = if self.show_hud { self.hud.as_ref() } else { None };
        let encoder = tick_encoder(&mut self.encoder, &self.device);
        encode_render_pass(encoder, &view, &self.pipelines, draw, hud);
        Ok(())
    }

    fn submit(&mut self) -> Result<()> {
        if let Some(encoder) = self.encoder.take() {
            self.queue.submit(std::iter::once(encoder.finish()));

            let in_flight = self.in_flight.clone();
            in_flight.fetch_add(1, Ordering::AcqRel);
            self.queue.on_submitted_work_done(move || {
                in_flight.fetch_sub(1, Ordering::AcqRel);
            });

            self.device.poll(wgpu::Maintain::Poll);
            if self.in_flight.load(Ordering::Acquire) > self.max_in_flight {
                log::debug!("Frames in flight above {}; waiting", self.max_in_flight);
                self.device.poll(wgpu::Maintain::Wait);
            }
        }

        if let Some(frame) = self.frame.take() {
            frame.present();
        }
        if let Some(hud) = &mut self.hud {
            hud.trim();
        }
        self.check_faults()
    }
}

impl CellReadback for GpuStages {
    fn read_cells(&mut self, role: BufferRole) -> Result<Vec<u32>> {
        let cells = self
            .world
            .readback_cells(&self.device, &self.queue, role.input())?;
        self.check_faults()?;
        Ok(cells)
    }
}

/// The encoder collecting this tick's passes, created on first use.
fn tick_encoder<'a>(
    slot: &'a mut Option<wgpu::CommandEncoder>,
    device: &wgpu::Device,
) -> &'a mut wgpu::CommandEncoder {
    slot.get_or_insert_with(|| {
        device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("tick_encoder"),
        })
    })
}
