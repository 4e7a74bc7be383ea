//! # Data Loader Crate
//!
//! This crate turns raw tables into the rating matrices the recommenders
//! work on.
//!
//! ## Main Components
//!
//! - **types**: Core domain types (Table, RatingMatrix, ImputedRatingMatrix, Recommendation)
//! - **parser**: Read CSV and MovieLens .dat files into tables
//! - **builder**: Join, pivot and impute (the matrix builder)
//! - **store**: Persistence port for rating matrices
//! - **error**: Error types for data loading
//!
//! ## Example Usage
//!
//! ```ignore
//! use data_loader::{parser, MatrixBuilder};
//! use std::path::Path;
//!
//! let movies = parser::read_csv(Path::new("data/movies.csv"))?;
//! let ratings = parser::read_csv(Path::new("data/ratings.csv"))?;
//!
//! let built = MatrixBuilder::new("movieId", "userId", "rating", "title")
//!     .build(&movies, &ratings)?;
//!
//! println!("{} users x {} items", built.ratings.shape().0, built.items.len());
//! ```

// Public modules
pub mod error;
pub mod types;
pub mod parser;
pub mod builder;
pub mod store;

// Re-export commonly used types for convenience
pub use error::{DataLoadError, Result};
pub use types::{
    // Type aliases
    UserId,
    ItemId,
    // Core types
    Table,
    RatingMatrix,
    ImputedRatingMatrix,
    Recommendation,
    Aggregation,
};
pub use builder::{BuiltMatrices, MatrixBuilder};
pub use store::{FsStore, MatrixStore};
