//! Neighborhood recommendations for a known user.
//!
//! ## Algorithm
//! 1. Rank every other user by cosine similarity of imputed rating vectors
//!    and keep the top `neighbor_count`
//! 2. For each item the user has not rated, collect the neighbours who
//!    did rate it
//! 3. Accumulate `num += rating * sim` and `den += sim + epsilon` over them
//! 4. Keep the item when `num / den > threshold`, scored as the ratio
//!    rounded to one decimal

use crate::error::{NeighborhoodError, Result};
use crate::similarity::SimilarityMatrix;
use data_loader::{ImputedRatingMatrix, RatingMatrix, Recommendation};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

/// Neighbours consulted per user unless configured otherwise
pub const DEFAULT_NEIGHBOR_COUNT: usize = 5;

/// Added to the denominator once per contributing neighbour
pub const DEFAULT_EPSILON: f64 = 1e-4;

/// Which rating a contributing neighbour adds to the numerator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RatingPolicy {
    /// The target user's own imputed rating of the item. Every neighbour
    /// contributes the same value, so the ratio stays just below the
    /// column mean.
    #[default]
    TargetImputed,
    /// The neighbour's observed rating of the item (classic user-based CF)
    NeighborObserved,
}

impl RatingPolicy {
    /// Rating contributed for `item` when `neighbor` is consulted on behalf of `user`.
    ///
    /// Only called for neighbours with an observed rating of `item`.
    pub fn rating(
        self,
        ratings: &RatingMatrix,
        imputed: &ImputedRatingMatrix,
        user: usize,
        neighbor: usize,
        item: usize,
    ) -> f64 {
        match self {
            RatingPolicy::TargetImputed => imputed.get(user, item),
            RatingPolicy::NeighborObserved => ratings
                .get(neighbor, item)
                .unwrap_or_else(|| imputed.get(neighbor, item)),
        }
    }
}

/// Scores unseen items for a user from their nearest neighbours
#[derive(Debug, Clone)]
pub struct NeighborhoodRecommender {
    neighbor_count: usize,
    epsilon: f64,
    rating_policy: RatingPolicy,
}

impl Default for NeighborhoodRecommender {
    fn default() -> Self {
        Self::new()
    }
}

impl NeighborhoodRecommender {
    pub fn new() -> Self {
        Self {
            neighbor_count: DEFAULT_NEIGHBOR_COUNT,
            epsilon: DEFAULT_EPSILON,
            rating_policy: RatingPolicy::default(),
        }
    }

    /// Configure how many neighbours are consulted (default: 5)
    pub fn with_neighbor_count(mut self, count: usize) -> Self {
        self.neighbor_count = count;
        self
    }

    /// Configure the per-neighbour denominator smoothing (default: 1e-4)
    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    /// Configure which rating neighbours contribute (default: target imputed)
    pub fn with_rating_policy(mut self, policy: RatingPolicy) -> Self {
        self.rating_policy = policy;
        self
    }

    pub fn neighbor_count(&self) -> usize {
        self.neighbor_count
    }

    pub fn rating_policy(&self) -> RatingPolicy {
        self.rating_policy
    }

    /// Items `user` has not rated whose predicted score exceeds `threshold`.
    ///
    /// Sorted by score (highest first), equal scores in column order.
    /// Computes the similarity matrix on every call; use
    /// [`NeighborhoodRecommender::recommend_with`] to reuse one across users.
    pub fn recommend(
        &self,
        user: &str,
        ratings: &RatingMatrix,
        imputed: &ImputedRatingMatrix,
        threshold: f64,
    ) -> Result<Vec<Recommendation>> {
        // Fail before the quadratic similarity computation
        let user_idx = check_user(user, ratings)?;
        check_alignment(ratings, imputed)?;
        let similarity = SimilarityMatrix::cosine(imputed);
        Ok(self.score_unseen(user, user_idx, ratings, imputed, &similarity, threshold))
    }

    /// Same as [`NeighborhoodRecommender::recommend`] with a precomputed similarity matrix
    pub fn recommend_with(
        &self,
        user: &str,
        ratings: &RatingMatrix,
        imputed: &ImputedRatingMatrix,
        similarity: &SimilarityMatrix,
        threshold: f64,
    ) -> Result<Vec<Recommendation>> {
        let user_idx = check_user(user, ratings)?;
        check_alignment(ratings, imputed)?;
        if similarity.users() != ratings.users() {
            return Err(NeighborhoodError::ShapeMismatch {
                reason: "similarity matrix users differ from rating matrix users".to_string(),
            });
        }
        Ok(self.score_unseen(user, user_idx, ratings, imputed, similarity, threshold))
    }

    #[instrument(skip(self, user_idx, ratings, imputed, similarity), fields(user = %user))]
    fn score_unseen(
        &self,
        user: &str,
        user_idx: usize,
        ratings: &RatingMatrix,
        imputed: &ImputedRatingMatrix,
        similarity: &SimilarityMatrix,
        threshold: f64,
    ) -> Vec<Recommendation> {
        let neighbors = similarity.top_neighbors(user_idx, self.neighbor_count);
        if neighbors.len() < self.neighbor_count {
            warn!(
                "Only {} neighbours available for user {} (wanted {})",
                neighbors.len(),
                user,
                self.neighbor_count
            );
        }

        let mut scored: Vec<Recommendation> = Vec::new();
        let mut unseen = 0;
        for (item_idx, item) in ratings.items().iter().enumerate() {
            if ratings.get(user_idx, item_idx).is_some() {
                continue;
            }
            unseen += 1;

            let mut numerator = 0.0;
            let mut denominator = 0.0;
            let mut contributors = 0;
            for &(neighbor, sim) in &neighbors {
                if ratings.get(neighbor, item_idx).is_none() {
                    continue;
                }
                let rating = self
                    .rating_policy
                    .rating(ratings, imputed, user_idx, neighbor, item_idx);
                numerator += rating * sim;
                denominator += sim + self.epsilon;
                contributors += 1;
            }

            // No neighbour rated the item, so there is nothing to predict from
            if contributors == 0 || denominator == 0.0 {
                continue;
            }
            let ratio = numerator / denominator;
            if ratio > threshold {
                scored.push(Recommendation::new(item.clone(), round_to_tenth(ratio)));
            }
        }

        // Stable sort keeps column order among equal scores
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));

        debug!(
            "Scored {} of {} unseen items above threshold {}",
            scored.len(),
            unseen,
            threshold
        );
        scored
    }
}

fn check_user(user: &str, ratings: &RatingMatrix) -> Result<usize> {
    ratings
        .user_index(user)
        .ok_or_else(|| NeighborhoodError::UnknownUser {
            user: user.to_string(),
        })
}

fn check_alignment(ratings: &RatingMatrix, imputed: &ImputedRatingMatrix) -> Result<()> {
    if imputed.is_aligned_with(ratings) {
        Ok(())
    } else {
        Err(NeighborhoodError::ShapeMismatch {
            reason: format!(
                "rating matrix is {:?} but imputed matrix is {:?}",
                ratings.shape(),
                imputed.shape()
            ),
        })
    }
}

fn round_to_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrices(
        users: &[&str],
        items: &[&str],
        rows: Vec<Vec<Option<f64>>>,
    ) -> (RatingMatrix, ImputedRatingMatrix) {
        let ratings = RatingMatrix::from_rows(
            users.iter().map(|s| s.to_string()).collect(),
            items.iter().map(|s| s.to_string()).collect(),
            rows,
        )
        .unwrap();
        let imputed = ratings.impute().unwrap();
        (ratings, imputed)
    }

    /// Users A, B, C over items X, Y, Z; A has not rated Z, B has not rated Y
    fn abc() -> (RatingMatrix, ImputedRatingMatrix) {
        matrices(
            &["A", "B", "C"],
            &["X", "Y", "Z"],
            vec![
                vec![Some(5.0), Some(3.0), None],
                vec![Some(4.0), None, Some(2.0)],
                vec![None, Some(5.0), Some(4.0)],
            ],
        )
    }

    #[test]
    fn test_ratio_sits_just_below_target_imputed_rating() {
        let (ratings, imputed) = abc();
        let recommender = NeighborhoodRecommender::new();

        // Imputed A.Z is 3.0; the smoothing pulls the ratio to about 2.9997
        let recs = recommender.recommend("A", &ratings, &imputed, 2.5).unwrap();
        assert_eq!(recs, vec![Recommendation::new("Z", 3.0)]);

        let recs = recommender.recommend("A", &ratings, &imputed, 3.0).unwrap();
        assert!(recs.is_empty());
    }

    #[test]
    fn test_rating_policies_differ() {
        // T is close to N1 (who loves Y) and far from N2 (who dislikes it)
        let (ratings, imputed) = matrices(
            &["T", "N1", "N2"],
            &["X", "Y"],
            vec![
                vec![Some(1.0), None],
                vec![Some(1.0), Some(5.0)],
                vec![Some(5.0), Some(1.0)],
            ],
        );

        let target = NeighborhoodRecommender::new()
            .recommend("T", &ratings, &imputed, 0.0)
            .unwrap();
        assert_eq!(target, vec![Recommendation::new("Y", 3.0)]);

        let observed = NeighborhoodRecommender::new()
            .with_rating_policy(RatingPolicy::NeighborObserved)
            .recommend("T", &ratings, &imputed, 0.0)
            .unwrap();
        assert_eq!(observed, vec![Recommendation::new("Y", 3.7)]);
    }

    #[test]
    fn test_neighbor_count_limits_contributors() {
        let (ratings, imputed) = matrices(
            &["T", "N1", "N2"],
            &["X", "Y"],
            vec![
                vec![Some(1.0), None],
                vec![Some(1.0), Some(5.0)],
                vec![Some(5.0), Some(1.0)],
            ],
        );

        // Only N1 is consulted: 5 * s / (s + 1e-4) rounds to 5.0
        let recs = NeighborhoodRecommender::new()
            .with_neighbor_count(1)
            .with_rating_policy(RatingPolicy::NeighborObserved)
            .recommend("T", &ratings, &imputed, 0.0)
            .unwrap();
        assert_eq!(recs, vec![Recommendation::new("Y", 5.0)]);
    }

    #[test]
    fn test_unknown_user() {
        let (ratings, imputed) = abc();
        let result = NeighborhoodRecommender::new().recommend("Nobody", &ratings, &imputed, 0.0);
        assert!(matches!(
            result,
            Err(NeighborhoodError::UnknownUser { user }) if user == "Nobody"
        ));
    }

    #[test]
    fn test_misaligned_matrices() {
        let (ratings, _) = abc();
        let (_, other) = matrices(&["A", "B"], &["X"], vec![vec![Some(1.0)], vec![Some(2.0)]]);
        assert!(matches!(
            NeighborhoodRecommender::new().recommend("A", &ratings, &other, 0.0),
            Err(NeighborhoodError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_similarity_from_other_users() {
        let (ratings, imputed) = abc();
        let (_, other) = matrices(
            &["A", "B"],
            &["X", "Y", "Z"],
            vec![
                vec![Some(1.0), Some(2.0), Some(3.0)],
                vec![Some(3.0), Some(2.0), Some(1.0)],
            ],
        );
        let similarity = SimilarityMatrix::cosine(&other);

        let result = NeighborhoodRecommender::new().recommend_with("A", &ratings, &imputed, &similarity, 0.0);
        assert!(matches!(result, Err(NeighborhoodError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_round_to_tenth() {
        assert_eq!(round_to_tenth(2.99969), 3.0);
        assert_eq!(round_to_tenth(3.666), 3.7);
        assert_eq!(round_to_tenth(4.04), 4.0);
    }
}
