// ============================================================================
// frame_loop.rs — lifegrid
// FrameLoop: fixed-period driver that runs compute → advance → render →
// submit once per tick over any backend implementing `TickStages`.
// ============================================================================

use std::time::{Duration, Instant};

use crate::error::{LifeError, Result};
use crate::grid::{BufferRole, GenerationCursor, Grid};
use crate::render::DrawCall;

/// The per-tick work a backend records. Calls arrive in the order
/// `compute`, `render`, `submit`; `render` and `submit` may also arrive
/// alone for a redraw.
pub trait TickStages {
    /// Read `cells[role.input()]`, write `cells[role.output()]`.
    fn compute(&mut self, role: BufferRole) -> Result<()>;

    fn render(&mut self, draw: DrawCall) -> Result<()>;

    /// Hand everything recorded since the last submit to the device.
    fn submit(&mut self) -> Result<()>;
}

/// CPU access to a cell buffer, for stats, verification and snapshots.
pub trait CellReadback {
    /// Contents of the buffer that is input under `role`.
    fn read_cells(&mut self, role: BufferRole) -> Result<Vec<u32>>;
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Ticking,
    /// Terminal: a stage reported a fault.
    Halted,
}

pub struct FrameLoop {
    state: LoopState,
    cursor: GenerationCursor,
    grid: Grid,
    interval: Duration,
    next_deadline: Option<Instant>,
}

impl FrameLoop {
    pub fn new(grid: Grid, interval: Duration) -> Self {
        Self {
            state: LoopState::Idle,
            cursor: GenerationCursor::default(),
            grid,
            interval,
            next_deadline: None,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn generation(&self) -> u64 {
        self.cursor.step()
    }

    /// Role for the next compute pass. `role().input()` holds the current
    /// generation.
    pub fn role(&self) -> BufferRole {
        self.cursor.role()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        match self.state {
            LoopState::Ticking => self.next_deadline,
            _ => None,
        }
    }

    pub fn start(&mut self, now: Instant) {
        if self.state == LoopState::Idle {
            self.state = LoopState::Ticking;
            self.next_deadline = Some(now + self.interval);
            log::debug!("Frame loop started at generation {}", self.generation());
        }
    }

    /// Stop issuing ticks. Work already submitted still executes.
    pub fn stop(&mut self) {
        if self.state == LoopState::Ticking {
            self.state = LoopState::Idle;
            self.next_deadline = None;
            log::debug!("Frame loop stopped at generation {}", self.generation());
        }
    }

    pub fn set_interval(&mut self, interval: Duration, now: Instant) {
        self.interval = interval;
        if self.state == LoopState::Ticking {
            self.next_deadline = Some(now + interval);
        }
    }

    /// Back to generation 0 with buffer A as input, after the cell buffers
    /// were reinitialized.
    pub fn reset(&mut self) {
        self.cursor.reset();
    }

    /// Run one tick if the loop is ticking and the deadline has passed.
    /// Returns whether a tick ran.
    pub fn poll<S: TickStages>(&mut self, stages: &mut S, now: Instant) -> Result<bool> {
        let Some(deadline) = self.next_deadline() else {
            return Ok(false);
        };
        if now < deadline {
            return Ok(false);
        }

        self.tick(stages)?;

        // Keep the fixed cadence, but drop missed periods instead of
        // bursting to catch up.
        let next = deadline + self.interval;
        self.next_deadline = Some(if next <= now { now + self.interval } else { next });
        Ok(true)
    }

    /// Run one tick immediately, regardless of the timer.
    pub fn step_once<S: TickStages>(&mut self, stages: &mut S) -> Result<()> {
        self.tick(stages)
    }

    /// Re-render the current generation without advancing.
    pub fn redraw<S: TickStages>(&mut self, stages: &mut S) -> Result<()> {
        self.ensure_live()?;
        let draw = DrawCall::for_grid(&self.grid, self.cursor.role());
        let result = stages.render(draw).and_then(|()| stages.submit());
        result.map_err(|err| self.halt(err))
    }

    fn tick<S: TickStages>(&mut self, stages: &mut S) -> Result<()> {
        self.ensure_live()?;
        let role = self.cursor.role();

        if let Err(err) = stages.compute(role) {
            return Err(self.halt(err));
        }
        self.cursor.advance();

        // After the advance, the input role names the buffer just written.
        let draw = DrawCall::for_grid(&self.grid, self.cursor.role());
        debug_assert_eq!(draw.source, role.output());

        let result = stages.render(draw).and_then(|()| stages.submit());
        if let Err(err) = result {
            return Err(self.halt(err));
        }

        log::trace!(
            "Tick {}: read buffer {}, wrote buffer {}",
            self.generation(),
            role.input(),
            role.output()
        );
        Ok(())
    }

    fn ensure_live(&self) -> Result<()> {
        if self.state == LoopState::Halted {
            return Err(LifeError::Device(
                "frame loop halted after an earlier fault".to_string(),
            ));
        }
        Ok(())
    }

    fn halt(&mut self, err: LifeError) -> LifeError {
        log::error!(
            "Frame loop halted at generation {}: {}",
            self.generation(),
            err
        );
        self.state = LoopState::Halted;
        self.next_deadline = None;
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::CpuStages;
    use crate::grid::SeedPolicy;

    #[derive(Debug, PartialEq, Eq)]
    enum Event {
        Compute { input: usize, output: usize },
        Render(DrawCall),
        Submit,
    }

    #[derive(Default)]
    struct Recorder {
        events: Vec<Event>,
        fail_compute_at: Option<usize>,
        computes: usize,
    }

    impl TickStages for Recorder {
        fn compute(&mut self, role: BufferRole) -> Result<()> {
            self.computes += 1;
            if self.fail_compute_at == Some(self.computes) {
                return Err(LifeError::Device("device lost".into()));
            }
            self.events.push(Event::Compute {
                input: role.input(),
                output: role.output(),
            });
            Ok(())
        }

        fn render(&mut self, draw: DrawCall) -> Result<()> {
            self.events.push(Event::Render(draw));
            Ok(())
        }

        fn submit(&mut self) -> Result<()> {
            self.events.push(Event::Submit);
            Ok(())
        }
    }

    fn grid() -> Grid {
        Grid::new(4, 4).unwrap()
    }

    #[test]
    fn tick_orders_compute_render_submit() {
        let mut frame_loop = FrameLoop::new(grid(), Duration::from_millis(100));
        let mut stages = Recorder::default();

        for _ in 0..3 {
            frame_loop.step_once(&mut stages).unwrap();
        }

        let draw = |source| {
            Event::Render(DrawCall {
                vertices: 6,
                instances: 16,
                source,
            })
        };
        assert_eq!(
            stages.events,
            vec![
                Event::Compute { input: 0, output: 1 },
                draw(1),
                Event::Submit,
                Event::Compute { input: 1, output: 0 },
                draw(0),
                Event::Submit,
                Event::Compute { input: 0, output: 1 },
                draw(1),
                Event::Submit,
            ]
        );
        assert_eq!(frame_loop.generation(), 3);
    }

    #[test]
    fn poll_respects_period() {
        let t0 = Instant::now();
        let period = Duration::from_millis(200);
        let mut frame_loop = FrameLoop::new(grid(), period);
        let mut stages = Recorder::default();

        // Idle: nothing runs.
        assert!(!frame_loop.poll(&mut stages, t0 + period * 5).unwrap());

        frame_loop.start(t0);
        assert_eq!(frame_loop.state(), LoopState::Ticking);
        assert_eq!(frame_loop.next_deadline(), Some(t0 + period));
        assert!(!frame_loop.poll(&mut stages, t0 + period / 2).unwrap());
        assert!(frame_loop.poll(&mut stages, t0 + period).unwrap());
        assert!(!frame_loop.poll(&mut stages, t0 + period).unwrap());
        assert_eq!(frame_loop.next_deadline(), Some(t0 + period * 2));
        assert_eq!(frame_loop.generation(), 1);
    }

    #[test]
    fn late_poll_does_not_burst() {
        let t0 = Instant::now();
        let period = Duration::from_millis(100);
        let mut frame_loop = FrameLoop::new(grid(), period);
        let mut stages = Recorder::default();
        frame_loop.start(t0);

        let late = t0 + period * 10;
        assert!(frame_loop.poll(&mut stages, late).unwrap());
        assert!(!frame_loop.poll(&mut stages, late).unwrap());
        assert_eq!(frame_loop.next_deadline(), Some(late + period));
        assert_eq!(frame_loop.generation(), 1);
    }

    #[test]
    fn stop_halts_issuance() {
        let t0 = Instant::now();
        let period = Duration::from_millis(10);
        let mut frame_loop = FrameLoop::new(grid(), period);
        let mut stages = Recorder::default();
        frame_loop.start(t0);
        frame_loop.poll(&mut stages, t0 + period).unwrap();
        frame_loop.stop();

        assert_eq!(frame_loop.state(), LoopState::Idle);
        assert_eq!(frame_loop.next_deadline(), None);
        assert!(!frame_loop.poll(&mut stages, t0 + period * 100).unwrap());
        assert_eq!(frame_loop.generation(), 1);

        // Single-stepping while idle still works.
        frame_loop.step_once(&mut stages).unwrap();
        assert_eq!(frame_loop.generation(), 2);
    }

    #[test]
    fn fault_halts_permanently() {
        let t0 = Instant::now();
        let period = Duration::from_millis(10);
        let mut frame_loop = FrameLoop::new(grid(), period);
        let mut stages = Recorder {
            fail_compute_at: Some(2),
            ..Default::default()
        };
        frame_loop.start(t0);

        assert!(frame_loop.poll(&mut stages, t0 + period).unwrap());
        let err = frame_loop.poll(&mut stages, t0 + period * 2).unwrap_err();
        assert!(matches!(err, LifeError::Device(_)));
        assert_eq!(frame_loop.state(), LoopState::Halted);
        assert_eq!(frame_loop.generation(), 1);

        // No render or submit for the failed tick, and nothing afterwards.
        let before = stages.events.len();
        assert!(!frame_loop.poll(&mut stages, t0 + period * 3).unwrap());
        assert!(frame_loop.step_once(&mut stages).is_err());
        assert!(frame_loop.redraw(&mut stages).is_err());
        frame_loop.start(t0);
        assert_eq!(frame_loop.state(), LoopState::Halted);
        assert_eq!(stages.events.len(), before);
    }

    #[test]
    fn redraw_does_not_advance() {
        let mut frame_loop = FrameLoop::new(grid(), Duration::from_millis(10));
        let mut stages = Recorder::default();
        frame_loop.step_once(&mut stages).unwrap();
        stages.events.clear();

        frame_loop.redraw(&mut stages).unwrap();
        assert_eq!(frame_loop.generation(), 1);
        assert_eq!(
            stages.events,
            vec![
                Event::Render(DrawCall {
                    vertices: 6,
                    instances: 16,
                    source: 1
                }),
                Event::Submit
            ]
        );
    }

    #[test]
    fn reset_restores_generation_zero() {
        let mut frame_loop = FrameLoop::new(grid(), Duration::from_millis(10));
        let mut stages = Recorder::default();
        frame_loop.step_once(&mut stages).unwrap();
        frame_loop.reset();
        assert_eq!(frame_loop.generation(), 0);
        assert_eq!(frame_loop.role(), BufferRole::AIsInput);
    }

    #[test]
    fn end_to_end_on_cpu_backend() {
        let grid = grid();
        let seed = SeedPolicy::Modulo {
            modulus: 3,
            residue: 0,
        };
        let mut stages = CpuStages::new(grid, seed.seed_cells(&grid)).unwrap();
        let mut frame_loop = FrameLoop::new(grid, Duration::from_millis(200));

        frame_loop.step_once(&mut stages).unwrap();

        #[rustfmt::skip]
        let expected = vec![
            1, 1, 1, 0,
            1, 1, 1, 1,
            1, 1, 1, 1,
            0, 1, 1, 1,
        ];
        assert_eq!(stages.cells(frame_loop.role()), expected.as_slice());
        assert_eq!(frame_loop.role().input(), 1);
    }
}
