//! Persistence port for rating matrices.
//!
//! The recommenders never touch the filesystem themselves; callers hand
//! matrices to a [`MatrixStore`]. [`FsStore`] is the directory-backed
//! implementation used by the CLI, and other crates add their own
//! artifacts (models, latent factors) under the same directory.

use crate::error::{DataLoadError, Result};
use crate::parser::parse_rating;
use crate::types::RatingMatrix;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// File name of the persisted rating matrix
pub const RATING_MATRIX_FILE: &str = "rating_matrix.csv";

/// Header of the first column of a persisted rating matrix
const USER_HEADER: &str = "user";

/// Save/load operations for the sparse rating matrix
pub trait MatrixStore {
    fn save_rating_matrix(&self, matrix: &RatingMatrix) -> Result<()>;

    fn load_rating_matrix(&self) -> Result<RatingMatrix>;
}

/// Stores artifacts as files inside one directory
#[derive(Debug, Clone)]
pub struct FsStore {
    dir: PathBuf,
}

impl FsStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of an artifact inside the store directory
    pub fn path_for(&self, file: &str) -> PathBuf {
        self.dir.join(file)
    }

    /// Create the store directory if needed and return the artifact path
    pub fn prepare(&self, file: &str) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        Ok(self.path_for(file))
    }
}

impl MatrixStore for FsStore {
    /// Write the matrix as CSV: header `user,<items…>`, empty cell for absent ratings
    fn save_rating_matrix(&self, matrix: &RatingMatrix) -> Result<()> {
        let path = self.prepare(RATING_MATRIX_FILE)?;
        let mut writer = csv::Writer::from_path(&path)?;

        let mut header = vec![USER_HEADER.to_string()];
        header.extend(matrix.items().iter().cloned());
        writer.write_record(&header)?;

        for (idx, user) in matrix.users().iter().enumerate() {
            let mut record = vec![user.clone()];
            record.extend(
                matrix
                    .row(idx)
                    .iter()
                    .map(|cell| cell.map(|r| r.to_string()).unwrap_or_default()),
            );
            writer.write_record(&record)?;
        }
        writer.flush()?;

        info!("Saved rating matrix to {}", path.display());
        Ok(())
    }

    fn load_rating_matrix(&self) -> Result<RatingMatrix> {
        let path = self.path_for(RATING_MATRIX_FILE);
        let mut reader = csv::Reader::from_path(&path)?;

        let headers = reader.headers()?.clone();
        if headers.get(0) != Some(USER_HEADER) {
            return Err(DataLoadError::ParseError {
                file: RATING_MATRIX_FILE.to_string(),
                line: 1,
                reason: format!("first column must be '{}'", USER_HEADER),
            });
        }
        let items: Vec<String> = headers.iter().skip(1).map(str::to_string).collect();

        let mut users = Vec::new();
        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            let mut fields = record.iter();
            let user = fields.next().unwrap_or_default().to_string();
            let row = fields
                .map(|raw| {
                    if raw.is_empty() {
                        Ok(None)
                    } else {
                        parse_rating("rating", raw).map(Some)
                    }
                })
                .collect::<Result<Vec<Option<f64>>>>()?;
            users.push(user);
            rows.push(row);
        }

        info!("Loaded rating matrix from {}", path.display());
        RatingMatrix::from_rows(users, items, rows)
    }
}
