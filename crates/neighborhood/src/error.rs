//! Error types for the neighborhood crate.

use thiserror::Error;

/// Errors raised while scoring items for a known user
#[derive(Error, Debug)]
pub enum NeighborhoodError {
    /// The user is not a row of the rating matrix
    #[error("Unknown user: {user}")]
    UnknownUser { user: String },

    /// The raw, imputed and similarity matrices disagree on users or items
    #[error("Matrices are not aligned: {reason}")]
    ShapeMismatch { reason: String },
}

pub type Result<T> = std::result::Result<T, NeighborhoodError>;
