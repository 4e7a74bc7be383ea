//! Non-negative matrix factorization.
//!
//! The recommender only depends on the [`Factorizer`] and
//! [`FactorizationModel`] traits; [`Nmf`] is the bundled solver.
//!
//! Given the dense rating matrix X (users × items) the solver finds
//! non-negative W (users × k) and H (k × items) with X ≈ W · H using the
//! Lee & Seung multiplicative update rules:
//!
//! ```text
//! H ← H ⊙ (Wᵀ X) ⊘ (Wᵀ W H)
//! W ← W ⊙ (X Hᵀ) ⊘ (W H Hᵀ)
//! ```
//!
//! Every 10 iterations the Frobenius reconstruction error is checked and
//! the loop stops once its relative improvement drops below `tolerance`.

use crate::error::{FactorizationError, Result};
use data_loader::ImputedRatingMatrix;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

/// Added to every denominator of the update rules
const EPSILON: f64 = 1e-10;

/// Iterations between two convergence checks
const CHECK_INTERVAL: usize = 10;

/// A fitted factorization.
///
/// `Send + Sync` so one model can serve concurrent queries.
pub trait FactorizationModel: Send + Sync {
    /// Latent factor matrix, one row per component, one column per item
    fn components(&self) -> &[Vec<f64>];

    /// Project a full item rating vector into the latent space
    fn transform(&self, ratings: &[f64]) -> Result<Vec<f64>>;

    fn n_components(&self) -> usize {
        self.components().len()
    }

    fn n_items(&self) -> usize {
        self.components().first().map_or(0, Vec::len)
    }
}

/// A numeric solver that fits a [`FactorizationModel`]
pub trait Factorizer {
    type Model: FactorizationModel;

    fn fit(
        &self,
        matrix: &ImputedRatingMatrix,
        components: usize,
        max_iterations: usize,
    ) -> Result<Self::Model>;
}

/// Multiplicative-update NMF solver.
///
/// Initialization is random; pass a seed for reproducible fits.
#[derive(Debug, Clone)]
pub struct Nmf {
    tolerance: f64,
    seed: Option<u64>,
}

impl Nmf {
    pub fn new() -> Self {
        Self {
            tolerance: 1e-4,
            seed: None,
        }
    }

    /// Stop when the relative error improvement falls below this (default: 1e-4, 0 disables)
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Fix the initialization seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        }
    }
}

impl Default for Nmf {
    fn default() -> Self {
        Self::new()
    }
}

impl Factorizer for Nmf {
    type Model = NmfModel;

    #[instrument(skip(self, matrix), fields(shape = ?matrix.shape()))]
    fn fit(
        &self,
        matrix: &ImputedRatingMatrix,
        components: usize,
        max_iterations: usize,
    ) -> Result<NmfModel> {
        let (rows, columns) = matrix.shape();
        if components == 0 || components > rows.min(columns) {
            return Err(FactorizationError::InvalidRank {
                components,
                rows,
                columns,
            });
        }

        let x: Vec<Vec<f64>> = matrix.rows().map(<[f64]>::to_vec).collect();
        for row in &x {
            check_non_negative(row)?;
        }

        // Scale the random start so W·H has roughly the magnitude of X
        let scale = (matrix.mean() / components as f64).sqrt();
        let mut rng = self.rng();
        let mut w = random_matrix(&mut rng, rows, components, scale);
        let mut h = random_matrix(&mut rng, components, columns, scale);

        let initial_error = reconstruction_error(&x, &w, &h);
        let mut previous_error = initial_error;
        let mut iterations = 0;

        for iter in 1..=max_iterations {
            iterations = iter;

            // H update
            let wt_x = transpose_mul(&w, &x, columns);
            let wt_w = transpose_mul(&w, &w, components);
            let wt_w_h = mul(&wt_w, &h);
            apply_update(&mut h, &wt_x, &wt_w_h);

            // W update
            let x_ht = mul_transpose(&x, &h);
            let h_ht = mul_transpose(&h, &h);
            let w_h_ht = mul(&w, &h_ht);
            apply_update(&mut w, &x_ht, &w_h_ht);

            if self.tolerance > 0.0 && iter % CHECK_INTERVAL == 0 {
                let error = reconstruction_error(&x, &w, &h);
                debug!("Iteration {}: reconstruction error {:.6}", iter, error);
                if initial_error > 0.0 && (previous_error - error) / initial_error < self.tolerance {
                    break;
                }
                previous_error = error;
            }
        }

        let error = reconstruction_error(&x, &w, &h);
        info!(
            "Fitted NMF with {} components in {} iterations (error {:.4})",
            components, iterations, error
        );

        Ok(NmfModel {
            components: h,
            user_factors: w,
            max_iterations,
            tolerance: self.tolerance,
            iterations,
            reconstruction_error: error,
        })
    }
}

/// State learned by [`Nmf`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NmfModel {
    /// H: components × items
    components: Vec<Vec<f64>>,
    /// W: training users × components
    user_factors: Vec<Vec<f64>>,
    max_iterations: usize,
    tolerance: f64,
    iterations: usize,
    reconstruction_error: f64,
}

impl NmfModel {
    /// Per-user factors of the training matrix
    pub fn user_factors(&self) -> &[Vec<f64>] {
        &self.user_factors
    }

    /// Iterations the fit actually ran
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Frobenius norm of X - W·H at the end of the fit
    pub fn reconstruction_error(&self) -> f64 {
        self.reconstruction_error
    }

    /// W · H, the predicted rating matrix of the training users
    pub fn reconstruct(&self) -> Vec<Vec<f64>> {
        mul(&self.user_factors, &self.components)
    }
}

impl FactorizationModel for NmfModel {
    fn components(&self) -> &[Vec<f64>] {
        &self.components
    }

    /// Solve min ‖v - w·H‖ for w ≥ 0 with H fixed
    fn transform(&self, ratings: &[f64]) -> Result<Vec<f64>> {
        let k = self.n_components();
        if ratings.len() != self.n_items() {
            return Err(FactorizationError::ShapeMismatch {
                expected: self.n_items(),
                found: ratings.len(),
            });
        }
        check_non_negative(ratings)?;

        let mean = ratings.iter().sum::<f64>() / ratings.len().max(1) as f64;
        if k == 0 || mean == 0.0 {
            return Ok(vec![0.0; k]);
        }

        let h_v: Vec<f64> = self.components.iter().map(|row| dot(row, ratings)).collect();
        let h_ht = mul_transpose(&self.components, &self.components);
        let mut w = vec![(mean / k as f64).sqrt(); k];

        for iter in 1..=self.max_iterations {
            let denominators: Vec<f64> = h_ht.iter().map(|row| dot(row, &w)).collect();
            let mut change = 0.0;
            let mut norm = 0.0;
            for j in 0..k {
                let updated = w[j] * h_v[j] / (denominators[j] + EPSILON);
                change += (updated - w[j]).abs();
                norm += updated.abs();
                w[j] = updated;
            }

            if self.tolerance > 0.0 && iter % CHECK_INTERVAL == 0 && change <= self.tolerance * norm {
                break;
            }
        }

        Ok(w)
    }
}

pub(crate) fn check_non_negative(values: &[f64]) -> Result<()> {
    match values.iter().find(|v| !v.is_finite() || **v < 0.0) {
        Some(&value) => Err(FactorizationError::NegativeValue { value }),
        None => Ok(()),
    }
}

/// Strictly positive random matrix; zero entries would never move under multiplicative updates
fn random_matrix(rng: &mut StdRng, rows: usize, cols: usize, scale: f64) -> Vec<Vec<f64>> {
    (0..rows)
        .map(|_| {
            (0..cols)
                .map(|_| scale * (0.5 + rng.random::<f64>()))
                .collect()
        })
        .collect()
}

fn apply_update(target: &mut [Vec<f64>], numerator: &[Vec<f64>], denominator: &[Vec<f64>]) {
    target
        .par_iter_mut()
        .zip(numerator.par_iter().zip(denominator.par_iter()))
        .for_each(|(row, (num, den))| {
            for ((value, n), d) in row.iter_mut().zip(num).zip(den) {
                *value *= n / (d + EPSILON);
            }
        });
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// A · B with A (r × p) and B (p × q)
pub(crate) fn mul(a: &[Vec<f64>], b: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let q = b.first().map_or(0, Vec::len);
    a.par_iter()
        .map(|row| {
            let mut out = vec![0.0; q];
            for (value, b_row) in row.iter().zip(b) {
                if *value == 0.0 {
                    continue;
                }
                for (o, bv) in out.iter_mut().zip(b_row) {
                    *o += value * bv;
                }
            }
            out
        })
        .collect()
}

/// A · Bᵀ with A (r × p) and B (q × p)
fn mul_transpose(a: &[Vec<f64>], b: &[Vec<f64>]) -> Vec<Vec<f64>> {
    a.par_iter()
        .map(|row| b.iter().map(|b_row| dot(row, b_row)).collect())
        .collect()
}

/// Aᵀ · B with A (r × p) and B (r × q); `q` is the column count of B.
///
/// Each output row sums over A's rows in order, so results do not depend
/// on how rayon splits the work.
fn transpose_mul(a: &[Vec<f64>], b: &[Vec<f64>], q: usize) -> Vec<Vec<f64>> {
    let p = a.first().map_or(0, Vec::len);
    (0..p)
        .into_par_iter()
        .map(|i| {
            let mut out = vec![0.0; q];
            for (a_row, b_row) in a.iter().zip(b) {
                let av = a_row[i];
                if av == 0.0 {
                    continue;
                }
                for (o, bv) in out.iter_mut().zip(b_row) {
                    *o += av * bv;
                }
            }
            out
        })
        .collect()
}

fn reconstruction_error(x: &[Vec<f64>], w: &[Vec<f64>], h: &[Vec<f64>]) -> f64 {
    let w_h = mul(w, h);
    x.iter()
        .zip(&w_h)
        .flat_map(|(x_row, r_row)| x_row.iter().zip(r_row).map(|(a, b)| (a - b) * (a - b)))
        .sum::<f64>()
        .sqrt()
}
