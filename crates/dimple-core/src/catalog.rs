//! Loading the golf-ball catalog from a comma-delimited file.
//!
//! Columns are positional: a header line, then
//! `ignored,manufacturer,usga_lot_num,pole_marking,colour,constCode,ballSpecs,dimples,spin,pole_2,seam_marking,imageUrl`.
//! Quoting is off, so a comma inside a value shifts every later column.

use std::fs::File;
use std::path::{Path, PathBuf};

use crate::record::GolfBall;

/// Number of columns a data line must have (column 0 included).
pub const COLUMN_COUNT: usize = 12;

const DIMPLES_COLUMN: usize = 7;

/// Upper bound of the index's `Edm.Int32` dimples field.
pub const MAX_DIMPLES: u32 = i32::MAX as u32;

/// Reads `path` and returns one record per data line, in file order.
/// Every record gets a freshly generated id and an empty vector.
pub fn load_catalog(path: &Path) -> Result<Vec<GolfBall>, LoadError> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(LoadError::EmptyDataset(path.to_path_buf()));
        }
        Err(e) => return Err(LoadError::Read(path.to_path_buf(), e)),
    };
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(b',')
        .quoting(false)
        .flexible(true)
        .from_reader(file);

    let mut balls = Vec::new();
    for result in reader.records() {
        let row = result.map_err(|e| csv_error(path, e))?;
        let line = row.position().map_or(0, |p| p.line() as usize);
        balls.push(parse_row(&row, line)?);
    }
    if balls.is_empty() {
        return Err(LoadError::EmptyDataset(path.to_path_buf()));
    }
    tracing::debug!(path = %path.display(), records = balls.len(), "parsed catalog");
    Ok(balls)
}

fn parse_row(row: &csv::StringRecord, line: usize) -> Result<GolfBall, LoadError> {
    if row.len() < COLUMN_COUNT {
        return Err(LoadError::RowParse {
            line,
            message: format!("expected {} columns, found {}", COLUMN_COUNT, row.len()),
        });
    }
    let col = |i: usize| row.get(i).unwrap_or_default().to_string();
    let raw_dimples = row.get(DIMPLES_COLUMN).unwrap_or_default();
    let dimples = raw_dimples
        .trim()
        .parse::<u32>()
        .map_err(|e| LoadError::RowParse {
            line,
            message: format!("dimples {:?} is not a non-negative integer: {}", raw_dimples, e),
        })?;
    if dimples > MAX_DIMPLES {
        return Err(LoadError::RowParse {
            line,
            message: format!("dimples {} exceeds the index maximum of {}", dimples, MAX_DIMPLES),
        });
    }

    Ok(GolfBall {
        id: GolfBall::generate_id(),
        manufacturer: col(1),
        usga_lot_num: col(2),
        pole_marking: col(3),
        colour: col(4),
        const_code: col(5),
        ball_specs: col(6),
        dimples,
        spin: col(8),
        pole_2: col(9),
        seam_marking: col(10),
        image_url: col(11),
        vector_content: Vec::new(),
    })
}

fn csv_error(path: &Path, err: csv::Error) -> LoadError {
    let line = err.position().map_or(0, |p| p.line() as usize);
    let message = err.to_string();
    match err.into_kind() {
        csv::ErrorKind::Io(source) => LoadError::Read(path.to_path_buf(), source),
        _ => LoadError::RowParse { line, message },
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("no catalog data found in {0} (file missing or has no data lines)")]
    EmptyDataset(PathBuf),
    #[error("line {line}: {message}")]
    RowParse { line: usize, message: String },
    #[error("read error for {0}: {1}")]
    Read(PathBuf, std::io::Error),
}
