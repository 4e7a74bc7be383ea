//! Cold-start recommendations from a fitted factorization.
//!
//! ## Algorithm
//! 1. Give every queried item a random rating in 1..=5 and every other
//!    item one shared random rating in 0..=3
//! 2. Project that vector into latent space with `model.transform`
//! 3. Reconstruct a predicted score per item as `p · Q`
//! 4. Drop the queried items and rank the rest by score, highest first

use crate::error::{FactorizationError, Result};
use crate::latent::LatentFactors;
use crate::nmf::{FactorizationModel, Factorizer, Nmf, NmfModel};
use crate::random::RandomSource;
use crate::store::ModelStore;
use data_loader::{ImputedRatingMatrix, Recommendation};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info, instrument};

/// Rating range drawn for each queried item
pub const QUERY_RATING_RANGE: (u32, u32) = (1, 5);

/// Rating range of the single value shared by every other item
pub const FILL_RATING_RANGE: (u32, u32) = (0, 3);

/// Fit parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorizationConfig {
    /// Number of latent factors
    pub components: usize,
    /// Upper bound on solver iterations
    pub max_iterations: usize,
    /// Relative error improvement below which the solver stops
    pub tolerance: f64,
    /// Seed for the random initialization
    pub seed: Option<u64>,
}

impl Default for FactorizationConfig {
    fn default() -> Self {
        Self {
            components: 50,
            max_iterations: 1000,
            tolerance: 1e-4,
            seed: None,
        }
    }
}

/// A fitted model together with its item-labelled latent factors.
///
/// Read-only after construction, so it can be shared across threads and
/// queried concurrently.
#[derive(Debug, Clone)]
pub struct FactorizationRecommender<M = NmfModel> {
    model: M,
    latent: LatentFactors,
}

impl FactorizationRecommender<NmfModel> {
    /// Fit the bundled NMF solver
    pub fn fit(matrix: &ImputedRatingMatrix, config: &FactorizationConfig) -> Result<Self> {
        let mut nmf = Nmf::new().with_tolerance(config.tolerance);
        if let Some(seed) = config.seed {
            nmf = nmf.with_seed(seed);
        }
        Self::fit_with(&nmf, matrix, config.components, config.max_iterations)
    }
}

impl<M: FactorizationModel> FactorizationRecommender<M> {
    /// Fit with any solver.
    ///
    /// Fails with `InvalidRank` unless `1 <= components <= min(rows, columns)`.
    #[instrument(skip(factorizer, matrix), fields(shape = ?matrix.shape()))]
    pub fn fit_with<F>(
        factorizer: &F,
        matrix: &ImputedRatingMatrix,
        components: usize,
        max_iterations: usize,
    ) -> Result<Self>
    where
        F: Factorizer<Model = M>,
    {
        let (rows, columns) = matrix.shape();
        if components == 0 || components > rows.min(columns) {
            return Err(FactorizationError::InvalidRank {
                components,
                rows,
                columns,
            });
        }

        let model = factorizer.fit(matrix, components, max_iterations)?;
        let latent = LatentFactors::from_model(&model, matrix.items())?;
        info!(
            "Fitted {} latent factors over {} items",
            latent.n_components(),
            latent.items().len()
        );
        Self::from_parts(model, latent)
    }

    /// Pair a model with previously saved latent factors.
    ///
    /// The factors must be exactly the model's components, so a query is
    /// projected and reconstructed through the same Q.
    pub fn from_parts(model: M, latent: LatentFactors) -> Result<Self> {
        if model.n_components() != latent.n_components() {
            return Err(FactorizationError::ShapeMismatch {
                expected: model.n_components(),
                found: latent.n_components(),
            });
        }
        if model.n_items() != latent.items().len() {
            return Err(FactorizationError::ShapeMismatch {
                expected: model.n_items(),
                found: latent.items().len(),
            });
        }
        if model.components() != latent.factors() {
            return Err(FactorizationError::MismatchedFactors);
        }
        Ok(Self { model, latent })
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn latent_factors(&self) -> &LatentFactors {
        &self.latent
    }

    /// Predicted score for every item, in latent factor column order
    pub fn predict<S, R>(&self, query: &[S], rng: &mut R) -> Result<Vec<f64>>
    where
        S: AsRef<str>,
        R: RandomSource + ?Sized,
    {
        let ratings = synthesize_ratings(query, &self.latent, rng)?;
        let latent = self.model.transform(&ratings)?;
        self.latent.reconstruct(&latent)
    }

    /// Ranked recommendations for an anonymous user who liked `query`
    pub fn recommend<S, R>(
        &self,
        query: &[S],
        rng: &mut R,
        limit: Option<usize>,
    ) -> Result<Vec<Recommendation>>
    where
        S: AsRef<str>,
        R: RandomSource + ?Sized,
    {
        recommend(query, &self.model, &self.latent, rng, limit)
    }

    /// Persist the model blob and the latent factor table
    pub fn save<T: ModelStore>(&self, store: &T) -> Result<()>
    where
        M: Serialize,
    {
        store.save_model(&self.model)?;
        store.save_latent_factors(&self.latent)
    }

    /// Restore a recommender saved with [`FactorizationRecommender::save`]
    pub fn load<T: ModelStore>(store: &T) -> Result<Self>
    where
        M: DeserializeOwned,
    {
        let model = store.load_model()?;
        let latent = store.load_latent_factors()?;
        Self::from_parts(model, latent)
    }
}

/// Build the synthetic rating vector of an anonymous user.
///
/// Queried items draw from [`QUERY_RATING_RANGE`] one by one, in query
/// order; afterwards a single draw from [`FILL_RATING_RANGE`] fills every
/// other item. Fails with `UnknownItem` before drawing anything if a
/// queried item is not a latent factor column.
pub fn synthesize_ratings<S, R>(query: &[S], latent: &LatentFactors, rng: &mut R) -> Result<Vec<f64>>
where
    S: AsRef<str>,
    R: RandomSource + ?Sized,
{
    let positions = query_positions(query, latent)?;

    let mut drawn: Vec<Option<f64>> = vec![None; latent.items().len()];
    for pos in positions {
        let (low, high) = QUERY_RATING_RANGE;
        drawn[pos] = Some(rng.draw(low, high) as f64);
    }

    let (low, high) = FILL_RATING_RANGE;
    let fill = rng.draw(low, high) as f64;
    Ok(drawn.into_iter().map(|r| r.unwrap_or(fill)).collect())
}

/// Rank every item not in `query` by its reconstructed score.
///
/// Scores are non-increasing along the result; equal scores keep the
/// latent factor column order. `limit` truncates the ranking.
#[instrument(skip_all, fields(query_len = query.len()))]
pub fn recommend<S, M, R>(
    query: &[S],
    model: &M,
    latent: &LatentFactors,
    rng: &mut R,
    limit: Option<usize>,
) -> Result<Vec<Recommendation>>
where
    S: AsRef<str>,
    M: FactorizationModel + ?Sized,
    R: RandomSource + ?Sized,
{
    let excluded: HashSet<usize> = query_positions(query, latent)?.into_iter().collect();

    let ratings = synthesize_ratings(query, latent, rng)?;
    let factors = model.transform(&ratings)?;
    let predicted = latent.reconstruct(&factors)?;

    let mut ranked: Vec<(usize, f64)> = predicted
        .into_iter()
        .enumerate()
        .filter(|(pos, _)| !excluded.contains(pos))
        .collect();
    // Stable sort keeps column order among equal scores
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    if let Some(limit) = limit {
        ranked.truncate(limit);
    }

    debug!("Ranked {} items for a {}-item query", ranked.len(), excluded.len());
    Ok(ranked
        .into_iter()
        .map(|(pos, score)| Recommendation::new(latent.items()[pos].clone(), score))
        .collect())
}

fn query_positions<S: AsRef<str>>(query: &[S], latent: &LatentFactors) -> Result<Vec<usize>> {
    query
        .iter()
        .map(|item| {
            let item = item.as_ref();
            latent
                .item_index(item)
                .ok_or_else(|| FactorizationError::UnknownItem {
                    item: item.to_string(),
                })
        })
        .collect()
}
