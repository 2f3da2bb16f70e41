// ============================================================================
// state_io.rs — lifegrid
// Binary snapshot save/load of a grid generation.
// ============================================================================

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use chrono::Local;

use crate::error::{LifeError, Result};
use crate::grid::{Grid, SeedPolicy};

const MAGIC: &[u8; 8] = b"LIFESNP1";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Snapshot {
    pub width: u32,
    pub height: u32,
    pub generation: u64,
    pub cells: Vec<u32>,
}

impl Snapshot {
    pub fn new(grid: &Grid, generation: u64, cells: Vec<u32>) -> Self {
        Self {
            width: grid.width,
            height: grid.height,
            generation,
            cells,
        }
    }
}

pub fn save_snapshot(path: &Path, snapshot: &Snapshot) -> Result<()> {
    let mut file = BufWriter::new(File::create(path)?);
    write_snapshot(&mut file, snapshot)?;
    file.flush()?;
    Ok(())
}

/// Load a snapshot and check it fits `grid`.
pub fn load_snapshot(path: &Path, grid: &Grid) -> Result<Snapshot> {
    let mut file = BufReader::new(File::open(path)?);
    read_snapshot(&mut file, grid)
}

pub fn write_snapshot<W: Write>(out: &mut W, snapshot: &Snapshot) -> Result<()> {
    out.write_all(MAGIC)?;
    out.write_all(&snapshot.width.to_le_bytes())?;
    out.write_all(&snapshot.height.to_le_bytes())?;
    out.write_all(&snapshot.generation.to_le_bytes())?;
    out.write_all(&(snapshot.cells.len() as u64).to_le_bytes())?;
    let bytes: Vec<u8> = snapshot.cells.iter().map(|&c| u8::from(c != 0)).collect();
    out.write_all(&bytes)?;
    Ok(())
}

/// Read a snapshot for `grid`. The header is checked before the payload is
/// allocated.
pub fn read_snapshot<R: Read>(input: &mut R, grid: &Grid) -> Result<Snapshot> {
    let mut magic = [0u8; 8];
    input.read_exact(&mut magic)?;
    if &magic != MAGIC {
        return Err(LifeError::Snapshot("invalid snapshot magic".to_string()));
    }

    let width = read_u32(input)?;
    let height = read_u32(input)?;
    let generation = read_u64(input)?;
    let count = read_u64(input)?;

    if width != grid.width || height != grid.height {
        return Err(LifeError::Snapshot(format!(
            "snapshot dimensions {}x{} incompatible with current grid {}x{}",
            width, height, grid.width, grid.height
        )));
    }
    if count != grid.cell_count() as u64 {
        return Err(LifeError::Snapshot(format!(
            "snapshot holds {} cells, header says {}x{}",
            count, width, height
        )));
    }

    let mut bytes = vec![0u8; count as usize];
    input.read_exact(&mut bytes)?;
    let mut cells = Vec::with_capacity(bytes.len());
    for (i, b) in bytes.into_iter().enumerate() {
        if b > 1 {
            return Err(LifeError::Snapshot(format!(
                "cell {} has invalid state {}",
                i, b
            )));
        }
        cells.push(b as u32);
    }

    Ok(Snapshot {
        width,
        height,
        generation,
        cells,
    })
}

/// Starting cells for a run: the snapshot at `load_path` if given, else the
/// configured seed. Returns the cells and the generation they belong to.
pub fn initial_state(
    grid: &Grid,
    seed: &SeedPolicy,
    load_path: Option<&Path>,
) -> Result<(Vec<u32>, u64)> {
    match load_path {
        Some(path) => {
            let snapshot = load_snapshot(path, grid)?;
            log::info!(
                "Loaded snapshot {} (generation {})",
                path.display(),
                snapshot.generation
            );
            Ok((snapshot.cells, snapshot.generation))
        }
        None => {
            log::info!("Seeding {}x{} grid: {}", grid.width, grid.height, seed.describe());
            Ok((seed.seed_cells(grid), 0))
        }
    }
}

/// `snapshot_<timestamp>_gen<generation>.life`
pub fn default_snapshot_name(generation: u64) -> String {
    format!(
        "snapshot_{}_gen{:06}.life",
        Local::now().format("%Y%m%d_%H%M%S"),
        generation
    )
}

fn read_u32<R: Read>(input: &mut R) -> Result<u32> {
    let mut bytes = [0u8; 4];
    input.read_exact(&mut bytes)?;
    Ok(u32::from_le_bytes(bytes))
}

fn read_u64<R: Read>(input: &mut R) -> Result<u64> {
    let mut bytes = [0u8; 8];
    input.read_exact(&mut bytes)?;
    Ok(u64::from_le_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_grid() -> Grid {
        Grid::new(5, 3).unwrap()
    }

    fn sample() -> Snapshot {
        let grid = sample_grid();
        let cells = SeedPolicy::Glider { x: 0, y: 0 }.seed_cells(&grid);
        Snapshot::new(&grid, 42, cells)
    }

    fn encode(snapshot: &Snapshot) -> Vec<u8> {
        let mut bytes = Vec::new();
        write_snapshot(&mut bytes, snapshot).unwrap();
        bytes
    }

    #[test]
    fn header_layout() {
        let bytes = encode(&sample());
        assert_eq!(&bytes[0..8], MAGIC);
        assert_eq!(&bytes[8..12], &5u32.to_le_bytes());
        assert_eq!(&bytes[12..16], &3u32.to_le_bytes());
        assert_eq!(&bytes[16..24], &42u64.to_le_bytes());
        assert_eq!(&bytes[24..32], &15u64.to_le_bytes());
        assert_eq!(bytes.len(), 32 + 15);
    }

    #[test]
    fn file_round_trip_checks_grid() {
        let snapshot = sample();
        let path = std::env::temp_dir().join(format!("lifegrid_snap_{}.life", std::process::id()));
        save_snapshot(&path, &snapshot).unwrap();

        let loaded = load_snapshot(&path, &Grid::new(5, 3).unwrap()).unwrap();
        assert_eq!(loaded, snapshot);

        let err = load_snapshot(&path, &Grid::new(3, 5).unwrap()).unwrap_err();
        assert!(matches!(err, LifeError::Snapshot(_)));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn rejects_corruption() {
        let grid = sample_grid();
        let good = encode(&sample());

        let mut bad_magic = good.clone();
        bad_magic[0] = b'X';
        assert!(matches!(
            read_snapshot(&mut bad_magic.as_slice(), &grid),
            Err(LifeError::Snapshot(_))
        ));

        let mut bad_count = good.clone();
        bad_count[24] = 14;
        assert!(matches!(
            read_snapshot(&mut bad_count.as_slice(), &grid),
            Err(LifeError::Snapshot(_))
        ));

        let mut bad_cell = good.clone();
        let last = bad_cell.len() - 1;
        bad_cell[last] = 2;
        assert!(matches!(
            read_snapshot(&mut bad_cell.as_slice(), &grid),
            Err(LifeError::Snapshot(_))
        ));

        let truncated = &good[..good.len() - 1];
        assert!(matches!(
            read_snapshot(&mut &truncated[..], &grid),
            Err(LifeError::Io(_))
        ));
    }

    #[test]
    fn oversized_header_rejected_before_payload() {
        let mut bytes = MAGIC.to_vec();
        bytes.extend_from_slice(&65_535u32.to_le_bytes());
        bytes.extend_from_slice(&65_535u32.to_le_bytes());
        bytes.extend_from_slice(&0u64.to_le_bytes());
        bytes.extend_from_slice(&(65_535u64 * 65_535).to_le_bytes());

        // No payload follows; a Snapshot error (not Io) shows nothing was read.
        let err = read_snapshot(&mut bytes.as_slice(), &sample_grid()).unwrap_err();
        match err {
            LifeError::Snapshot(msg) => assert!(msg.contains("65535x65535")),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn initial_state_prefers_snapshot() {
        let grid = Grid::new(5, 3).unwrap();
        let seed = SeedPolicy::Empty;

        let (cells, generation) = initial_state(&grid, &seed, None).unwrap();
        assert_eq!(cells, vec![0; 15]);
        assert_eq!(generation, 0);

        let snapshot = sample();
        let path = std::env::temp_dir().join(format!("lifegrid_init_{}.life", std::process::id()));
        save_snapshot(&path, &snapshot).unwrap();
        let (cells, generation) = initial_state(&grid, &seed, Some(&path)).unwrap();
        assert_eq!(cells, snapshot.cells);
        assert_eq!(generation, 42);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn default_name_has_generation() {
        let name = default_snapshot_name(7);
        assert!(name.starts_with("snapshot_"));
        assert!(name.ends_with("_gen000007.life"));
    }
}
