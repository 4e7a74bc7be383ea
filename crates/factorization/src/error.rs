//! Error types for the factorization crate.

use data_loader::DataLoadError;
use thiserror::Error;

/// Errors raised while fitting, querying or persisting a factorization
#[derive(Error, Debug)]
pub enum FactorizationError {
    /// Requested rank is zero or exceeds the matrix dimensions
    #[error("Invalid rank {components} for a {rows}x{columns} matrix")]
    InvalidRank {
        components: usize,
        rows: usize,
        columns: usize,
    },

    /// A query referenced an item that is not a latent factor column
    #[error("Unknown item: {item}")]
    UnknownItem { item: String },

    /// Vector or matrix dimensions do not line up
    #[error("Shape mismatch: expected {expected}, found {found}")]
    ShapeMismatch { expected: usize, found: usize },

    /// Non-negative factorization was given a negative or non-finite value
    #[error("Invalid input value {value}: factorization requires finite non-negative values")]
    NegativeValue { value: f64 },

    /// Latent factors differ from the components of the model they are paired with
    #[error("Latent factors do not match the model components")]
    MismatchedFactors,

    /// Loading or saving tabular data failed
    #[error(transparent)]
    Data(#[from] DataLoadError),

    /// The model blob could not be (de)serialized
    #[error("Model serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for Results in this crate
pub type Result<T> = std::result::Result<T, FactorizationError>;
