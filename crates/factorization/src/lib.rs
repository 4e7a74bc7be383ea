//! # Factorization Crate
//!
//! Cold-start recommendations through non-negative matrix factorization.
//!
//! ## Components
//!
//! - **nmf**: `Factorizer`/`FactorizationModel` traits and the bundled
//!   multiplicative-update solver
//! - **latent**: the item-labelled latent factor matrix Q
//! - **random**: injectable source of synthetic ratings
//! - **recommender**: fit once, then score anonymous queries
//! - **store**: persistence of the model and of Q
//!
//! ## Example Usage
//!
//! ```ignore
//! use factorization::{FactorizationConfig, FactorizationRecommender, RngSource};
//!
//! let recommender = FactorizationRecommender::fit(&built.imputed, &FactorizationConfig::default())?;
//! let mut rng = RngSource::from_entropy();
//! let recs = recommender.recommend(&["Toy Story (1995)", "Heat (1995)"], &mut rng, Some(10))?;
//! ```

pub mod error;
pub mod latent;
pub mod nmf;
pub mod random;
pub mod recommender;
pub mod store;

// Re-export commonly used types
pub use error::{FactorizationError, Result};
pub use latent::LatentFactors;
pub use nmf::{FactorizationModel, Factorizer, Nmf, NmfModel};
pub use random::{RandomSource, RngSource};
pub use recommender::{
    recommend, synthesize_ratings, FactorizationConfig, FactorizationRecommender,
};
pub use store::ModelStore;
