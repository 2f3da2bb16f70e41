// ============================================================================
// main.rs — lifegrid
// Entry point. Initializes logging, parses the command line and runs either
// the windowed or the headless frame loop.
// ============================================================================

mod app;
mod compute;
mod config;
mod cpu;
mod error;
mod frame_loop;
mod gpu;
mod grid;
mod headless;
mod metrics;
mod pipeline;
mod render;
mod renderer;
mod state_io;
mod world;

use std::process::ExitCode;

use clap::Parser;

use config::Cli;

fn main() -> ExitCode {
    env_logger::init();

    let options = match Cli::parse().into_options() {
        Ok(options) => options,
        Err(err) => {
            log::error!("Startup failed: {}", err);
            return ExitCode::FAILURE;
        }
    };

    let result = if options.headless {
        headless::run_headless(&options)
    } else {
        app::run_windowed(options)
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) if err.is_startup() => {
            log::error!("Startup failed: {}", err);
            ExitCode::FAILURE
        }
        Err(err) => {
            log::error!("Run aborted: {}", err);
            ExitCode::FAILURE
        }
    }
}
