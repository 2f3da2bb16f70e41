// ============================================================================
// app.rs — lifegrid
// Windowed mode: winit event-loop handler driving the frame loop against the
// window surface, keyboard controls and the HUD.
// ============================================================================

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use winit::{
    application::ApplicationHandler,
    event::{KeyEvent, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{Key, NamedKey},
    window::{Window, WindowAttributes},
};

use crate::config::{CliOptions, SimulationParams};
use crate::error::{LifeError, Result};
use crate::frame_loop::{CellReadback, FrameLoop, LoopState};
use crate::gpu::{configure_surface, create_instance, request_device, GpuStages, RenderTarget};
use crate::grid::Grid;
use crate::metrics::GridStats;
use crate::renderer::build_hud_text;
use crate::state_io::{self, Snapshot};

/// Open a window and run until it closes. Returns the error that ended the
/// session, if any.
pub fn run_windowed(options: CliOptions) -> Result<()> {
    let event_loop = EventLoop::new().map_err(|e| LifeError::SurfaceConfig(e.to_string()))?;
    let mut app = App::new(options);
    event_loop
        .run_app(&mut app)
        .map_err(|e| LifeError::SurfaceConfig(e.to_string()))?;
    match app.take_error() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

// ======================== Application ========================

pub struct App {
    options: CliOptions,
    state: Option<AppState>,
    error: Option<LifeError>,
}

struct AppState {
    window: Arc<Window>,
    stages: GpuStages,
    frame_loop: FrameLoop,
    params: SimulationParams,
    grid: Grid,
    /// Generation of the loaded snapshot; 0 for a seeded grid.
    base_generation: u64,
    alive: Option<u32>,
    /// Log stats every N generations. 0 disables.
    stats_interval: u64,
    last_stats: Option<GridStats>,
}

impl App {
    pub fn new(options: CliOptions) -> Self {
        Self {
            options,
            state: None,
            error: None,
        }
    }

    pub fn take_error(&mut self) -> Option<LifeError> {
        self.error.take()
    }

    /// Keep the first error for `main` and shut the event loop down.
    fn fail(&mut self, event_loop: &ActiveEventLoop, err: LifeError) {
        if self.error.is_none() {
            self.error = Some(err);
        }
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }
        match init_state(event_loop, &self.options) {
            Ok(state) => {
                // Initial redraw — required on macOS with winit 0.30
                state.window.request_redraw();
                self.state = Some(state);
            }
            Err(err) => self.fail(event_loop, err),
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        let Some(state) = &self.state else {
            return;
        };
        match state.frame_loop.next_deadline() {
            Some(deadline) => {
                if Instant::now() >= deadline {
                    state.window.request_redraw();
                }
                event_loop.set_control_flow(ControlFlow::WaitUntil(deadline));
            }
            None => event_loop.set_control_flow(ControlFlow::Wait),
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        let Some(state) = &mut self.state else {
            return;
        };

        let result = match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
                Ok(())
            }
            WindowEvent::KeyboardInput { event, .. } => {
                handle_keyboard(state, event_loop, &event, &self.options)
            }
            WindowEvent::Resized(new_size) => {
                state.stages.resize(new_size.width, new_size.height);
                state.window.request_redraw();
                Ok(())
            }
            WindowEvent::RedrawRequested => redraw(state),
            _ => Ok(()),
        };

        if let Err(err) = result {
            self.fail(event_loop, err);
        }
    }
}

// ======================== Initialization ========================

fn init_state(event_loop: &ActiveEventLoop, options: &CliOptions) -> Result<AppState> {
    let config = &options.config;
    let grid = config.validate()?;

    let window_attrs = WindowAttributes::default()
        .with_title(format!("lifegrid — {}x{}", grid.width, grid.height))
        .with_inner_size(winit::dpi::LogicalSize::new(800u32, 800u32));
    let window = Arc::new(
        event_loop
            .create_window(window_attrs)
            .map_err(|e| LifeError::SurfaceConfig(e.to_string()))?,
    );

    let instance = create_instance();
    let surface = instance
        .create_surface(window.clone())
        .map_err(|e| LifeError::SurfaceConfig(e.to_string()))?;
    let (adapter, device, queue) = pollster::block_on(request_device(&instance, Some(&surface)))?;

    let size = window.inner_size();
    let surface_config = configure_surface(&surface, &adapter, &device, size.width, size.height)?;
    let target = RenderTarget::Surface {
        surface,
        config: surface_config,
    };

    let (cells, base_generation) = state_io::initial_state(
        &grid,
        &config.seed,
        options.load_state_path.as_deref(),
    )?;
    let alive = cells.iter().sum::<u32>();
    let stages = GpuStages::new(device, queue, target, config, &cells, true)?;

    let params = SimulationParams::new(config);
    let mut frame_loop = FrameLoop::new(grid, params.tick_interval());
    frame_loop.start(Instant::now());

    log::info!(
        "lifegrid initialized: {}x{}, tick {} ms",
        grid.width,
        grid.height,
        params.tick_interval_ms
    );

    Ok(AppState {
        window,
        stages,
        frame_loop,
        params,
        grid,
        base_generation,
        alive: Some(alive),
        stats_interval: config.stats_interval,
        last_stats: None,
    })
}

// ======================== Keyboard Handling ========================

fn handle_keyboard(
    state: &mut AppState,
    event_loop: &ActiveEventLoop,
    event: &KeyEvent,
    options: &CliOptions,
) -> Result<()> {
    if !event.state.is_pressed() {
        return Ok(());
    }

    match &event.logical_key {
        Key::Named(NamedKey::Escape) => event_loop.exit(),

        Key::Named(NamedKey::Space) => {
            match state.frame_loop.state() {
                LoopState::Ticking => {
                    state.frame_loop.stop();
                    state.params.paused = true;
                    state.refresh_alive()?;
                }
                LoopState::Idle => {
                    state.frame_loop.start(Instant::now());
                    state.params.paused = false;
                }
                LoopState::Halted => {}
            }
            log::info!("{}", if state.params.paused { "Paused" } else { "Resumed" });
            state.window.request_redraw();
        }

        Key::Named(NamedKey::ArrowUp) => {
            state.params.faster();
            state.retime();
        }
        Key::Named(NamedKey::ArrowDown) => {
            state.params.slower();
            state.retime();
        }

        Key::Character(c) => match c.as_str() {
            "n" | "N" if state.frame_loop.state() == LoopState::Idle => {
                state.prepare_hud(state.generation() + 1);
                state.frame_loop.step_once(&mut state.stages)?;
                state.refresh_alive()?;
                state.window.request_redraw();
            }
            "r" | "R" => {
                let cells = options.config.seed.seed_cells(&state.grid);
                state.stages.reinitialize(&cells)?;
                state.frame_loop.reset();
                state.base_generation = 0;
                state.last_stats = None;
                state.alive = Some(cells.iter().sum());
                log::info!("Reseeded: {}", options.config.seed.describe());
                state.window.request_redraw();
            }
            "s" | "S" => state.save_snapshot()?,
            "h" | "H" => {
                state.params.show_hud = !state.params.show_hud;
                state.stages.show_hud = state.params.show_hud;
                state.window.request_redraw();
            }
            _ => {}
        },

        _ => {}
    }
    Ok(())
}

// ======================== Frame Rendering ========================

fn redraw(state: &mut AppState) -> Result<()> {
    let now = Instant::now();
    let due = state.frame_loop.next_deadline().is_some_and(|d| now >= d);

    // HUD text describes the generation about to be drawn.
    let shown = state.generation() + u64::from(due);
    state.prepare_hud(shown);

    if state.frame_loop.poll(&mut state.stages, now)? {
        let interval = state.stats_interval;
        if interval > 0 && state.frame_loop.generation() % interval == 0 {
            let stats = state.refresh_alive()?;
            stats.log(state.last_stats.as_ref());
            state.last_stats = Some(stats);
        }
    } else {
        state.frame_loop.redraw(&mut state.stages)?;
    }
    Ok(())
}

impl AppState {
    fn generation(&self) -> u64 {
        self.base_generation + self.frame_loop.generation()
    }

    fn prepare_hud(&mut self, generation: u64) {
        if !self.params.show_hud {
            return;
        }
        let text = build_hud_text(
            &self.params,
            self.frame_loop.state(),
            generation,
            &self.grid,
            self.alive,
        );
        self.stages.prepare_hud(&text);
    }

    fn retime(&mut self) {
        self.frame_loop
            .set_interval(self.params.tick_interval(), Instant::now());
        log::info!("Tick interval: {:?}", self.frame_loop.interval());
        self.window.request_redraw();
    }

    /// Read the current generation back and update the HUD's alive count.
    fn refresh_alive(&mut self) -> Result<GridStats> {
        let cells = self.stages.read_cells(self.frame_loop.role())?;
        let stats = GridStats::from_cells(&self.grid, self.generation(), &cells);
        self.alive = Some(stats.alive);
        Ok(stats)
    }

    /// Snapshot I/O failures are reported and the session continues.
    fn save_snapshot(&mut self) -> Result<()> {
        let generation = self.generation();
        let cells = self.stages.read_cells(self.frame_loop.role())?;
        let name = state_io::default_snapshot_name(generation);
        let snapshot = Snapshot::new(&self.grid, generation, cells);
        match state_io::save_snapshot(Path::new(&name), &snapshot) {
            Ok(()) => log::info!("Saved snapshot {}", name),
            Err(err) => log::warn!("Failed to save snapshot {}: {}", name, err),
        }
        Ok(())
    }
}
