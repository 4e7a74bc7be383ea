//! User-user cosine similarity over the imputed rating matrix.

use data_loader::{ImputedRatingMatrix, UserId};
use rayon::prelude::*;
use tracing::{debug, instrument};

/// Cosine of the angle between two rating vectors.
///
/// Returns 0.0 when either vector has zero norm.
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    cosine_with_norms(a, b, norm(a), norm(b))
}

/// Cosine of two vectors whose norms are already known
fn cosine_with_norms(a: &[f64], b: &[f64], norm_a: f64, norm_b: f64) -> f64 {
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot(a, b) / (norm_a * norm_b)).clamp(-1.0, 1.0)
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn norm(a: &[f64]) -> f64 {
    dot(a, a).sqrt()
}

/// Symmetric u × u matrix of cosine similarities, rows in user order.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityMatrix {
    users: Vec<UserId>,
    values: Vec<f64>,
}

impl SimilarityMatrix {
    /// Compute every pairwise similarity in parallel.
    ///
    /// Each cell depends only on its two rows, so the result does not
    /// depend on thread scheduling. The diagonal is exactly 1.0; a user
    /// with an all-zero vector has similarity 0.0 with everyone else.
    #[instrument(skip(matrix), fields(users = matrix.users().len()))]
    pub fn cosine(matrix: &ImputedRatingMatrix) -> Self {
        let n = matrix.users().len();
        let norms: Vec<f64> = (0..n).map(|i| norm(matrix.row(i))).collect();

        let rows: Vec<Vec<f64>> = (0..n)
            .into_par_iter()
            .map(|i| {
                (0..n)
                    .map(|j| {
                        if i == j {
                            1.0
                        } else {
                            cosine_with_norms(matrix.row(i), matrix.row(j), norms[i], norms[j])
                        }
                    })
                    .collect()
            })
            .collect();

        debug!("Computed {}x{} similarity matrix", n, n);
        Self {
            users: matrix.users().to_vec(),
            values: rows.into_iter().flatten().collect(),
        }
    }

    pub fn users(&self) -> &[UserId] {
        &self.users
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    pub fn get(&self, a: usize, b: usize) -> f64 {
        self.values[a * self.users.len() + b]
    }

    pub fn row(&self, user_idx: usize) -> &[f64] {
        let n = self.users.len();
        &self.values[user_idx * n..(user_idx + 1) * n]
    }

    /// The `n` users most similar to `user_idx`, most similar first.
    ///
    /// The user itself is never included, even when another user has the
    /// same similarity. Ties keep row order. Fewer than `n` are returned
    /// when the matrix is small.
    pub fn top_neighbors(&self, user_idx: usize, n: usize) -> Vec<(usize, f64)> {
        let mut ranked: Vec<(usize, f64)> = self
            .row(user_idx)
            .iter()
            .copied()
            .enumerate()
            .filter(|&(other, _)| other != user_idx)
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked.truncate(n);
        ranked
    }
}
