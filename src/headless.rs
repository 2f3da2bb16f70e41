// ============================================================================
// headless.rs — lifegrid
// Headless runner: fixed generation count on the GPU (offscreen target) or
// the CPU backend, with optional lockstep verification against the CPU.
// ============================================================================

use std::time::Instant;

use crate::config::CliOptions;
use crate::cpu::CpuStages;
use crate::error::{LifeError, Result};
use crate::frame_loop::{CellReadback, FrameLoop, TickStages};
use crate::gpu::{create_instance, request_device, GpuStages, RenderTarget};
use crate::grid::Grid;
use crate::metrics::GridStats;
use crate::state_io::{self, Snapshot};

/// Progress lines per run, independent of the generation count.
const PROGRESS_REPORTS: u64 = 10;

pub fn run_headless(options: &CliOptions) -> Result<()> {
    let config = &options.config;
    let grid = config.validate()?;
    let (cells, base_generation) = state_io::initial_state(
        &grid,
        &config.seed,
        options.load_state_path.as_deref(),
    )?;

    if options.cpu {
        log::info!("Backend: CPU");
        let mut stages = CpuStages::new(grid, cells)?;
        return drive(options, grid, base_generation, &mut stages, None);
    }

    let instance = create_instance();
    let (_adapter, device, queue) = pollster::block_on(request_device(&instance, None))?;
    let target = RenderTarget::offscreen(&device);

    let reference = if options.verify {
        log::info!("Verifying every generation against the CPU backend");
        Some(CpuStages::new(grid, cells.clone())?)
    } else {
        None
    };
    let mut stages = GpuStages::new(device, queue, target, config, &cells, false)?;
    drive(options, grid, base_generation, &mut stages, reference)
}

fn drive<S: TickStages + CellReadback>(
    options: &CliOptions,
    grid: Grid,
    base_generation: u64,
    stages: &mut S,
    mut reference: Option<CpuStages>,
) -> Result<()> {
    let config = &options.config;
    let total = options.generations;
    let mut frame_loop = FrameLoop::new(grid, config.tick_interval());
    let mut reference_loop = FrameLoop::new(grid, config.tick_interval());

    log::info!(
        "Headless run started: {} generations on {}x{}",
        total,
        grid.width,
        grid.height
    );

    let progress_interval = (total / PROGRESS_REPORTS).max(1);
    let started = Instant::now();
    let mut last_report = Instant::now();
    let mut last_report_gen = 0u64;
    let mut last_stats: Option<GridStats> = None;

    for _ in 0..total {
        frame_loop.step_once(stages)?;
        let done = frame_loop.generation();
        let generation = base_generation + done;

        if let Some(cpu) = reference.as_mut() {
            reference_loop.step_once(cpu)?;
            let expected = cpu.read_cells(reference_loop.role())?;
            let actual = stages.read_cells(frame_loop.role())?;
            compare_generation(&grid, generation, &expected, &actual)?;
        }

        if config.stats_interval > 0 && done % config.stats_interval == 0 {
            let cells = stages.read_cells(frame_loop.role())?;
            let stats = GridStats::from_cells(&grid, generation, &cells);
            stats.log(last_stats.as_ref());
            last_stats = Some(stats);
        }

        if done % progress_interval == 0 {
            let total_elapsed = started.elapsed().as_secs_f64().max(1e-6);
            let total_gps = done as f64 / total_elapsed;

            let window_elapsed = last_report.elapsed().as_secs_f64().max(1e-6);
            let window_gps = (done - last_report_gen) as f64 / window_elapsed;

            let eta_secs = total.saturating_sub(done) as f64 / total_gps.max(1e-6);

            log::info!(
                "Headless progress: {}/{} | gen/s={:.0} (window {:.0}) | ETA={:.1} s",
                done,
                total,
                total_gps,
                window_gps,
                eta_secs,
            );

            last_report = Instant::now();
            last_report_gen = done;
        }
    }

    let final_generation = base_generation + frame_loop.generation();
    let cells = stages.read_cells(frame_loop.role())?;
    GridStats::from_cells(&grid, final_generation, &cells).log(last_stats.as_ref());
    log::info!(
        "Headless run finished in {:.2} s{}",
        started.elapsed().as_secs_f64(),
        if reference.is_some() { ", GPU matched CPU" } else { "" }
    );

    if let Some(path) = &options.save_state_path {
        let snapshot = Snapshot::new(&grid, final_generation, cells);
        state_io::save_snapshot(path, &snapshot)?;
        log::info!("Saved final state to {}", path.display());
    }

    Ok(())
}

/// First differing cell between the reference and the backend under test.
fn compare_generation(grid: &Grid, generation: u64, expected: &[u32], actual: &[u32]) -> Result<()> {
    if expected.len() != actual.len() {
        return Err(LifeError::Mismatch(format!(
            "generation {}: {} cells read back, expected {}",
            generation,
            actual.len(),
            expected.len()
        )));
    }
    match expected.iter().zip(actual).position(|(e, a)| e != a) {
        None => Ok(()),
        Some(i) => {
            let (x, y) = grid.coords(i as u32);
            Err(LifeError::Mismatch(format!(
                "generation {}: cell ({}, {}) is {}, expected {}",
                generation, x, y, actual[i], expected[i]
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    use crate::config::Cli;
    use crate::grid::SeedPolicy;

    fn options(args: &[&str]) -> CliOptions {
        Cli::try_parse_from(std::iter::once("lifegrid").chain(args.iter().copied()))
            .unwrap()
            .into_options()
            .unwrap()
    }

    fn cpu_options(extra: &[&str]) -> CliOptions {
        let mut args = vec!["--headless", "--cpu", "--size", "8", "--seed-glider"];
        args.extend_from_slice(extra);
        options(&args)
    }

    #[test]
    fn compare_names_first_differing_cell() {
        let grid = Grid::new(3, 2).unwrap();
        assert!(compare_generation(&grid, 4, &[0, 1, 0, 0, 1, 0], &[0, 1, 0, 0, 1, 0]).is_ok());

        let err = compare_generation(&grid, 4, &[0, 1, 0, 0, 1, 0], &[0, 1, 0, 0, 0, 0])
            .unwrap_err();
        match err {
            LifeError::Mismatch(msg) => {
                assert!(msg.contains("generation 4"));
                assert!(msg.contains("cell (1, 1)"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn cpu_run_saves_translated_glider() {
        let path = std::env::temp_dir().join(format!("lifegrid_headless_{}.life", std::process::id()));
        let path_arg = path.to_string_lossy().into_owned();
        let options = cpu_options(&["--generations", "8", "--save", &path_arg]);

        run_headless(&options).unwrap();

        let grid = Grid::new(8, 8).unwrap();
        let snapshot = state_io::load_snapshot(&path, &grid).unwrap();
        assert_eq!(snapshot.generation, 8);
        // Two full glider periods: shifted by (2, 2).
        let expected = SeedPolicy::Glider { x: 3, y: 3 }.seed_cells(&grid);
        assert_eq!(snapshot.cells, expected);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn loaded_snapshot_continues_generation_count() {
        let grid = Grid::new(8, 8).unwrap();
        let start = std::env::temp_dir().join(format!("lifegrid_start_{}.life", std::process::id()));
        let end = std::env::temp_dir().join(format!("lifegrid_end_{}.life", std::process::id()));
        let cells = SeedPolicy::Glider { x: 1, y: 1 }.seed_cells(&grid);
        state_io::save_snapshot(&start, &Snapshot::new(&grid, 100, cells)).unwrap();

        let start_arg = start.to_string_lossy().into_owned();
        let end_arg = end.to_string_lossy().into_owned();
        let options = cpu_options(&["--generations", "4", "--load", &start_arg, "--save", &end_arg]);
        run_headless(&options).unwrap();

        let snapshot = state_io::load_snapshot(&end, &grid).unwrap();
        assert_eq!(snapshot.generation, 104);
        assert_eq!(snapshot.cells, SeedPolicy::Glider { x: 2, y: 2 }.seed_cells(&grid));
        std::fs::remove_file(&start).ok();
        std::fs::remove_file(&end).ok();
    }

    #[test]
    fn gpu_matches_cpu_on_odd_sized_grids() {
        // Row 0 and column 0 read across the wrap seam; sizes that are not a
        // power of two catch a kernel modulo that is wrong for negative x.
        let cases: [&[&str]; 4] = [
            &["--size", "5", "--seed-random", "0.4", "--workgroup", "4"],
            &["--size", "33", "--seed-modulo", "3", "--workgroup", "1"],
            &["--width", "8", "--height", "5", "--seed-random", "0.5", "--rng-seed", "11"],
            &["--size", "7", "--seed-glider", "--workgroup", "8"],
        ];
        for case in cases {
            let mut args = vec!["--headless", "--verify", "--generations", "6"];
            args.extend_from_slice(case);
            match run_headless(&options(&args)) {
                Err(LifeError::NoDevice) => {
                    eprintln!("no GPU adapter available; skipping");
                    return;
                }
                result => result.unwrap_or_else(|err| panic!("{args:?}: {err}")),
            }
        }
    }
}
