//! Integration tests for neighbourhood recommendations.
//!
//! Matrices are built through the data loader from small in-memory tables,
//! the same path the CLI takes after parsing files.

use data_loader::{BuiltMatrices, MatrixBuilder, Table};
use neighborhood::{NeighborhoodError, NeighborhoodRecommender, RatingPolicy, SimilarityMatrix};

const TITLES: [&str; 6] = [
    "Toy Story (1995)",
    "Jumanji (1995)",
    "Heat (1995)",
    "Casino (1995)",
    "Sabrina (1995)",
    "GoldenEye (1995)",
];

/// Eight users over six movies; user 8 has rated everything
fn built() -> BuiltMatrices {
    let mut movies = Table::new(["movieId", "title"]);
    for (id, title) in TITLES.iter().enumerate() {
        movies
            .push_row(vec![Some((id + 1).to_string()), Some(title.to_string())])
            .unwrap();
    }

    let observed: [(u32, u32, f64); 30] = [
        (1, 1, 5.0), (1, 2, 4.0), (1, 3, 1.0),
        (2, 1, 4.0), (2, 2, 5.0), (2, 4, 2.0), (2, 6, 1.0),
        (3, 3, 5.0), (3, 4, 4.0), (3, 5, 1.0),
        (4, 1, 1.0), (4, 3, 4.0), (4, 4, 5.0), (4, 6, 4.0),
        (5, 2, 4.5), (5, 5, 3.0), (5, 6, 2.0),
        (6, 1, 3.5), (6, 4, 3.0), (6, 5, 4.0),
        (7, 1, 4.0), (7, 2, 3.0), (7, 5, 5.0), (7, 6, 0.5),
        (8, 1, 2.0), (8, 2, 3.0), (8, 3, 4.0), (8, 4, 2.5), (8, 5, 3.5), (8, 6, 4.5),
    ];
    let mut ratings = Table::new(["userId", "movieId", "rating"]);
    for (user, movie, rating) in observed {
        ratings
            .push_row(vec![
                Some(user.to_string()),
                Some(movie.to_string()),
                Some(rating.to_string()),
            ])
            .unwrap();
    }

    MatrixBuilder::new("movieId", "userId", "rating", "title")
        .build(&movies, &ratings)
        .unwrap()
}

#[test]
fn test_only_unseen_items_are_recommended() {
    let built = built();
    let recommender = NeighborhoodRecommender::new();

    for user in built.ratings.users() {
        let recs = recommender
            .recommend(user, &built.ratings, &built.imputed, 0.0)
            .unwrap();
        for rec in &recs {
            assert_eq!(built.ratings.rating(user, &rec.item), None);
        }
        assert!(recs.windows(2).all(|w| w[0].score >= w[1].score));
    }
}

#[test]
fn test_threshold_above_rating_scale_is_empty() {
    let built = built();
    let recs = NeighborhoodRecommender::new()
        .recommend("1", &built.ratings, &built.imputed, 10.0)
        .unwrap();
    assert!(recs.is_empty());
}

#[test]
fn test_user_with_no_unseen_items() {
    let built = built();
    let recs = NeighborhoodRecommender::new()
        .recommend("8", &built.ratings, &built.imputed, 0.0)
        .unwrap();
    assert!(recs.is_empty());
}

#[test]
fn test_lower_threshold_returns_superset() {
    let built = built();
    let similarity = SimilarityMatrix::cosine(&built.imputed);

    for policy in [RatingPolicy::TargetImputed, RatingPolicy::NeighborObserved] {
        let recommender = NeighborhoodRecommender::new().with_rating_policy(policy);
        for user in built.ratings.users() {
            let strict = recommender
                .recommend_with(user, &built.ratings, &built.imputed, &similarity, 3.0)
                .unwrap();
            let loose = recommender
                .recommend_with(user, &built.ratings, &built.imputed, &similarity, 1.0)
                .unwrap();
            assert!(loose.len() >= strict.len());
            for rec in &strict {
                assert!(
                    loose.contains(rec),
                    "{:?} missing for user {} with {:?}",
                    rec,
                    user,
                    policy
                );
            }
        }
    }
}

#[test]
fn test_precomputed_similarity_matches() {
    let built = built();
    let recommender = NeighborhoodRecommender::new();
    let similarity = SimilarityMatrix::cosine(&built.imputed);

    let direct = recommender
        .recommend("3", &built.ratings, &built.imputed, 2.0)
        .unwrap();
    let reused = recommender
        .recommend_with("3", &built.ratings, &built.imputed, &similarity, 2.0)
        .unwrap();
    assert_eq!(direct, reused);
}

#[test]
fn test_unknown_user() {
    let built = built();
    let result = NeighborhoodRecommender::new().recommend("99", &built.ratings, &built.imputed, 0.0);
    assert!(matches!(result, Err(NeighborhoodError::UnknownUser { .. })));
}
