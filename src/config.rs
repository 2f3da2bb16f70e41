// ============================================================================
// config.rs — lifegrid
// Simulation configuration (JSON file + command-line overrides) and the
// runtime parameters adjustable from the keyboard.
// ============================================================================

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{ArgGroup, Parser};
use serde::{Deserialize, Serialize};

use crate::error::{LifeError, Result};
use crate::grid::{Grid, SeedPolicy, DEFAULT_RNG_SEED};

// ======================== Constants ========================

pub const DEFAULT_GRID_SIZE: u32 = 32;
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 200;
pub const DEFAULT_WORKGROUP_SIZE: u32 = 8;
/// 16 x 16 = 256 invocations, the default `max_compute_invocations_per_workgroup`.
pub const MAX_WORKGROUP_SIZE: u32 = 16;
pub const MIN_TICK_INTERVAL_MS: u64 = 10;
pub const MAX_TICK_INTERVAL_MS: u64 = 5_000;

// ======================== LifeConfig ========================

/// Startup configuration. Fixed for the lifetime of a session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifeConfig {
    pub width: u32,
    pub height: u32,
    pub tick_interval_ms: u64,
    pub workgroup_size: u32,
    pub seed: SeedPolicy,
    pub max_frames_in_flight: u32,
    /// Log grid stats every N generations. 0 disables.
    pub stats_interval: u64,
}

impl Default for LifeConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_GRID_SIZE,
            height: DEFAULT_GRID_SIZE,
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            workgroup_size: DEFAULT_WORKGROUP_SIZE,
            seed: SeedPolicy::default(),
            max_frames_in_flight: 2,
            stats_interval: 0,
        }
    }
}

impl LifeConfig {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: LifeConfig = serde_json::from_str(&text)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<Grid> {
        let grid = Grid::new(self.width, self.height)?;
        if self.workgroup_size == 0 || self.workgroup_size > MAX_WORKGROUP_SIZE {
            return Err(LifeError::config(format!(
                "workgroup size {} outside 1..={}",
                self.workgroup_size, MAX_WORKGROUP_SIZE
            )));
        }
        if self.tick_interval_ms == 0 {
            return Err(LifeError::config("tick interval must be at least 1 ms"));
        }
        if self.max_frames_in_flight == 0 {
            return Err(LifeError::config("max_frames_in_flight must be >= 1"));
        }
        self.seed.validate()?;
        Ok(grid)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

// ======================== Runtime Parameters ========================

/// Runtime parameters adjustable via keyboard.
#[derive(Clone, Debug)]
pub struct SimulationParams {
    pub paused: bool,
    pub show_hud: bool,
    pub tick_interval_ms: u64,
}

impl SimulationParams {
    pub fn new(config: &LifeConfig) -> Self {
        Self {
            paused: false,
            show_hud: true,
            tick_interval_ms: config.tick_interval_ms,
        }
    }

    pub fn faster(&mut self) {
        self.tick_interval_ms = (self.tick_interval_ms / 2).max(MIN_TICK_INTERVAL_MS);
    }

    pub fn slower(&mut self) {
        self.tick_interval_ms = (self.tick_interval_ms * 2).min(MAX_TICK_INTERVAL_MS);
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

// ======================== Command Line ========================

/// Resolved run options: the merged config plus the mode flags.
#[derive(Clone, Debug, PartialEq)]
pub struct CliOptions {
    pub config: LifeConfig,
    pub headless: bool,
    pub generations: u64,
    pub cpu: bool,
    pub verify: bool,
    pub load_state_path: Option<PathBuf>,
    pub save_state_path: Option<PathBuf>,
}

#[derive(Parser, Debug)]
#[command(
    name = "lifegrid",
    about = "Conway's Game of Life on the GPU: ping-pong compute passes feeding an instanced render pass."
)]
#[command(group(
    ArgGroup::new("seed_policy").args(["seed_random", "seed_modulo", "seed_glider", "seed_empty"])
))]
pub struct Cli {
    /// JSON config file; flags override its values
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    #[arg(long, value_name = "N")]
    width: Option<u32>,

    #[arg(long, value_name = "N")]
    height: Option<u32>,

    /// Square grid; sets both width and height
    #[arg(long, value_name = "N", conflicts_with_all = ["width", "height"])]
    size: Option<u32>,

    /// Tick period in milliseconds
    #[arg(long, value_name = "MS")]
    interval_ms: Option<u64>,

    /// Compute workgroup edge (1..=16)
    #[arg(long, value_name = "N")]
    workgroup: Option<u32>,

    /// Random seed with alive probability P
    #[arg(long, value_name = "P")]
    seed_random: Option<f64>,

    /// RNG seed for the random seed policy
    #[arg(long, value_name = "S")]
    rng_seed: Option<u64>,

    /// Cell i alive iff i % M == 0
    #[arg(long, value_name = "M")]
    seed_modulo: Option<u32>,

    /// Single glider
    #[arg(long, action = clap::ArgAction::SetTrue)]
    seed_glider: bool,

    /// All cells dead
    #[arg(long, action = clap::ArgAction::SetTrue)]
    seed_empty: bool,

    /// Start from a snapshot file
    #[arg(long, value_name = "PATH")]
    load: Option<PathBuf>,

    /// Run without a window
    #[arg(long, action = clap::ArgAction::SetTrue)]
    headless: bool,

    /// Generations to run in headless mode
    #[arg(long, value_name = "N", default_value_t = 1000)]
    generations: u64,

    /// Use the CPU backend (headless only)
    #[arg(long, action = clap::ArgAction::SetTrue, requires = "headless", conflicts_with = "verify")]
    cpu: bool,

    /// Check every GPU generation against the CPU backend (headless only)
    #[arg(long, action = clap::ArgAction::SetTrue, requires = "headless")]
    verify: bool,

    /// Write the final state to a snapshot (headless only)
    #[arg(long, value_name = "PATH", requires = "headless")]
    save: Option<PathBuf>,

    /// Log grid stats every N generations (0 disables)
    #[arg(long, value_name = "N")]
    stats_interval: Option<u64>,
}

impl Cli {
    /// Load the config file (if any), apply flag overrides and validate.
    pub fn into_options(self) -> Result<CliOptions> {
        let mut config = match &self.config {
            Some(path) => LifeConfig::from_json_file(path)?,
            None => LifeConfig::default(),
        };

        if let Some(n) = self.size {
            config.width = n;
            config.height = n;
        }
        if let Some(w) = self.width {
            config.width = w;
        }
        if let Some(h) = self.height {
            config.height = h;
        }
        if let Some(ms) = self.interval_ms {
            config.tick_interval_ms = ms;
        }
        if let Some(wg) = self.workgroup {
            config.workgroup_size = wg;
        }
        if let Some(n) = self.stats_interval {
            config.stats_interval = n;
        }

        if let Some(probability) = self.seed_random {
            let seed = match config.seed {
                SeedPolicy::Random { seed, .. } => seed,
                _ => DEFAULT_RNG_SEED,
            };
            config.seed = SeedPolicy::Random { probability, seed };
        } else if let Some(modulus) = self.seed_modulo {
            config.seed = SeedPolicy::Modulo {
                modulus,
                residue: 0,
            };
        } else if self.seed_glider {
            config.seed = SeedPolicy::Glider { x: 1, y: 1 };
        } else if self.seed_empty {
            config.seed = SeedPolicy::Empty;
        }

        // The random policy may also come from the config file.
        if let Some(s) = self.rng_seed {
            match &mut config.seed {
                SeedPolicy::Random { seed, .. } => *seed = s,
                _ => return Err(LifeError::config("--rng-seed requires a random seed policy")),
            }
        }

        config.validate()?;
        Ok(CliOptions {
            config,
            headless: self.headless,
            generations: self.generations,
            cpu: self.cpu,
            verify: self.verify,
            load_state_path: self.load,
            save_state_path: self.save,
        })
    }
}
