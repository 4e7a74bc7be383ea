//! # Neighborhood Crate
//!
//! Recommendations for a known user from the users whose imputed rating
//! vectors point the same way.
//!
//! ## Components
//!
//! - **similarity**: pairwise cosine similarity between users
//! - **recommender**: similarity-weighted scoring of unseen items
//!
//! ## Example Usage
//!
//! ```ignore
//! use neighborhood::NeighborhoodRecommender;
//!
//! let recommender = NeighborhoodRecommender::new().with_neighbor_count(5);
//! let recs = recommender.recommend("42", &built.ratings, &built.imputed, 3.5)?;
//! ```

pub mod error;
pub mod recommender;
pub mod similarity;

pub use error::{NeighborhoodError, Result};
pub use recommender::{NeighborhoodRecommender, RatingPolicy};
pub use similarity::{cosine_similarity, SimilarityMatrix};
