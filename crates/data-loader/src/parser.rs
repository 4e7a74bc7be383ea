//! Parsers that turn source files into [`Table`]s.
//!
//! Two formats are supported:
//! - headered CSV files (`movies.csv`, `ratings.csv` from MovieLens "small")
//! - `::`-separated .dat files without a header (MovieLens 1M), where the
//!   caller supplies the column names
//!
//! Empty fields become missing cells in both formats.

use crate::error::{DataLoadError, Result};
use crate::types::Table;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::debug;

/// Column names of the MovieLens 1M movies.dat file
pub const MOVIELENS_MOVIE_COLUMNS: [&str; 3] = ["movieId", "title", "genres"];

/// Column names of the MovieLens 1M ratings.dat file
pub const MOVIELENS_RATING_COLUMNS: [&str; 4] = ["userId", "movieId", "rating", "timestamp"];

/// Read a headered CSV file into a table
pub fn read_csv(path: &Path) -> Result<Table> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let mut table = Table::new(headers);

    for record in reader.records() {
        let record = record?;
        let row = record.iter().map(to_cell).collect();
        table.push_row(row)?;
    }

    debug!("Read {} rows from {}", table.len(), path.display());
    Ok(table)
}

/// Read a `::`-separated .dat file into a table with the given column names
pub fn read_dat(path: &Path, headers: &[&str]) -> Result<Table> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let lines = read_lines_latin1(path)?;
    let mut table = Table::new(headers.iter().copied());

    for (idx, line) in lines.iter().enumerate() {
        let line_no = idx + 1;
        let line_trimmed = line.trim();
        if line_trimmed.is_empty() {
            continue; // Skip empty lines
        }

        let row: Vec<Option<String>> = line_trimmed.split("::").map(to_cell).collect();
        if row.len() != headers.len() {
            return Err(DataLoadError::ParseError {
                file: file_name,
                line: line_no,
                reason: format!("expected {} fields, found {}", headers.len(), row.len()),
            });
        }
        table.push_row(row)?;
    }

    debug!("Read {} rows from {}", table.len(), path.display());
    Ok(table)
}

/// Parse a rating cell as a number
pub fn parse_rating(field: &str, raw: &str) -> Result<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| DataLoadError::InvalidValue {
            field: field.to_string(),
            value: raw.to_string(),
        })
}

/// Read a file encoded as ISO-8859-1 (Latin-1) line by line.
///
/// The MovieLens 1M files are Latin-1; every byte maps directly to the
/// Unicode code point of the same value.
fn read_lines_latin1(path: &Path) -> Result<Vec<String>> {
    let mut file = File::open(path)?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;

    let content: String = bytes.iter().map(|&b| b as char).collect();
    Ok(content.lines().map(|s| s.to_string()).collect())
}

fn to_cell(raw: &str) -> Option<String> {
    if raw.is_empty() {
        None
    } else {
        Some(raw.to_string())
    }
}
