// ============================================================================
// grid.rs — lifegrid
// Grid dimensions, ping-pong buffer roles, generation cursor and seed policies.
// ============================================================================

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::{LifeError, Result};

// ======================== Grid ========================

/// Immutable grid dimensions. Both sides are at least one cell.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Grid {
    pub width: u32,
    pub height: u32,
}

impl Grid {
    pub fn new(width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(LifeError::config(format!(
                "grid dimensions must be positive, got {}x{}",
                width, height
            )));
        }
        if width.checked_mul(height).is_none() {
            return Err(LifeError::config(format!(
                "grid {}x{} has too many cells",
                width, height
            )));
        }
        Ok(Self { width, height })
    }

    pub fn cell_count(&self) -> u32 {
        self.width * self.height
    }

    /// Size in bytes of one cell-state buffer (one `u32` per cell).
    pub fn byte_len(&self) -> u64 {
        self.cell_count() as u64 * std::mem::size_of::<u32>() as u64
    }

    /// Toroidal index: coordinates wrap with true modulo, so -1 maps to the
    /// last column/row.
    pub fn index(&self, x: i64, y: i64) -> usize {
        let wx = x.rem_euclid(self.width as i64);
        let wy = y.rem_euclid(self.height as i64);
        (wy * self.width as i64 + wx) as usize
    }

    /// Cell coordinates of a linear (instance) index.
    pub fn coords(&self, index: u32) -> (u32, u32) {
        (index % self.width, index / self.width)
    }

    /// Workgroup counts covering the grid with square `workgroup` tiles.
    pub fn dispatch_size(&self, workgroup: u32) -> (u32, u32) {
        (
            self.width.div_ceil(workgroup),
            self.height.div_ceil(workgroup),
        )
    }
}

// ======================== Buffer Roles ========================

/// Which of the two cell buffers is read this tick. The other is written.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum BufferRole {
    #[default]
    AIsInput,
    BIsInput,
}

impl BufferRole {
    pub fn for_step(step: u64) -> Self {
        match buffer_index_for(step) {
            0 => BufferRole::AIsInput,
            _ => BufferRole::BIsInput,
        }
    }

    pub fn input(self) -> usize {
        match self {
            BufferRole::AIsInput => 0,
            BufferRole::BIsInput => 1,
        }
    }

    pub fn output(self) -> usize {
        1 - self.input()
    }

    pub fn toggled(self) -> Self {
        match self {
            BufferRole::AIsInput => BufferRole::BIsInput,
            BufferRole::BIsInput => BufferRole::AIsInput,
        }
    }
}

/// Input buffer index for `step`. The output index is `(step + 1) % 2`.
pub fn buffer_index_for(step: u64) -> usize {
    (step % 2) as usize
}

/// Step counter plus the buffer role it implies. Only the frame loop
/// advances it; reinitialization resets it.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct GenerationCursor {
    step: u64,
    role: BufferRole,
}

impl GenerationCursor {
    pub fn step(&self) -> u64 {
        self.step
    }

    pub fn role(&self) -> BufferRole {
        self.role
    }

    pub fn advance(&mut self) {
        self.step += 1;
        self.role = self.role.toggled();
        debug_assert_eq!(self.role, BufferRole::for_step(self.step));
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

// ======================== Seed Policies ========================

/// How buffer A is filled at initialization.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SeedPolicy {
    Empty,
    /// Cell `i` is alive iff `i % modulus == residue`.
    Modulo { modulus: u32, residue: u32 },
    /// Each cell is alive with `probability`, drawn from a `StdRng` seeded
    /// with `seed`.
    Random { probability: f64, seed: u64 },
    /// A single glider whose 3x3 bounding box starts at (x, y).
    Glider { x: u32, y: u32 },
}

pub const DEFAULT_RNG_SEED: u64 = 0x5EED;

impl Default for SeedPolicy {
    fn default() -> Self {
        SeedPolicy::Random {
            probability: 0.4,
            seed: DEFAULT_RNG_SEED,
        }
    }
}

pub const GLIDER: [(i64, i64); 5] = [(1, 0), (2, 1), (0, 2), (1, 2), (2, 2)];

impl SeedPolicy {
    pub fn validate(&self) -> Result<()> {
        match *self {
            SeedPolicy::Modulo { modulus, .. } if modulus == 0 => {
                Err(LifeError::config("seed modulus must be >= 1"))
            }
            SeedPolicy::Random { probability, .. } if !(0.0..=1.0).contains(&probability) => {
                Err(LifeError::config(format!(
                    "seed probability {} outside [0, 1]",
                    probability
                )))
            }
            _ => Ok(()),
        }
    }

    /// Initial contents of buffer A.
    pub fn seed_cells(&self, grid: &Grid) -> Vec<u32> {
        let n = grid.cell_count() as usize;
        match *self {
            SeedPolicy::Empty => vec![0; n],
            SeedPolicy::Modulo { modulus, residue } => (0..n as u32)
                .map(|i| u32::from(modulus > 0 && i % modulus == residue))
                .collect(),
            SeedPolicy::Random { probability, seed } => {
                let mut rng = StdRng::seed_from_u64(seed);
                (0..n)
                    .map(|_| u32::from(rng.gen::<f64>() < probability))
                    .collect()
            }
            SeedPolicy::Glider { x, y } => {
                let mut cells = vec![0; n];
                for (dx, dy) in GLIDER {
                    cells[grid.index(x as i64 + dx, y as i64 + dy)] = 1;
                }
                cells
            }
        }
    }

    pub fn describe(&self) -> String {
        match self {
            SeedPolicy::Empty => "empty".to_string(),
            SeedPolicy::Modulo { modulus, residue } => {
                format!("i % {} == {}", modulus, residue)
            }
            SeedPolicy::Random { probability, seed } => {
                format!("random p={:.2} seed={:#x}", probability, seed)
            }
            SeedPolicy::Glider { x, y } => format!("glider at ({}, {})", x, y),
        }
    }
}
