//! End-to-end tests: build a matrix, fit it, and score cold-start queries.

use data_loader::{FsStore, ImputedRatingMatrix, RatingMatrix};
use factorization::{
    FactorizationConfig, FactorizationError, FactorizationRecommender, LatentFactors, ModelStore,
    NmfModel, RngSource,
};
use std::collections::HashSet;
use tempfile::tempdir;

fn scenario_matrix() -> ImputedRatingMatrix {
    // A rates X=5, Y=3; B rates X=4, Z=2; C rates Y=5, Z=4
    RatingMatrix::from_rows(
        vec!["A".into(), "B".into(), "C".into()],
        vec!["X".into(), "Y".into(), "Z".into()],
        vec![
            vec![Some(5.0), Some(3.0), None],
            vec![Some(4.0), None, Some(2.0)],
            vec![None, Some(5.0), Some(4.0)],
        ],
    )
    .unwrap()
    .impute()
    .unwrap()
}

fn movie_matrix() -> ImputedRatingMatrix {
    let items: Vec<String> = (0..8).map(|i| format!("Movie {}", i)).collect();
    let users: Vec<String> = (0..10).map(|u| u.to_string()).collect();
    let rows = (0..10)
        .map(|u| {
            (0..8)
                .map(|i| {
                    // Two taste groups: even users like the first half
                    let liked = (u % 2 == 0) == (i < 4);
                    if liked { 4.0 + ((u + i) % 2) as f64 } else { 1.0 + (i % 2) as f64 }
                })
                .collect()
        })
        .collect();
    ImputedRatingMatrix::from_rows(users, items, rows).unwrap()
}

fn config(components: usize) -> FactorizationConfig {
    FactorizationConfig {
        components,
        max_iterations: 500,
        seed: Some(17),
        ..FactorizationConfig::default()
    }
}

#[test]
fn test_query_returns_only_remaining_item() {
    let recommender = FactorizationRecommender::fit(&scenario_matrix(), &config(2)).unwrap();
    let mut rng = RngSource::seeded(3);

    let recs = recommender.recommend(&["X", "Y"], &mut rng, None).unwrap();

    assert_eq!(recs.len(), 1);
    assert_eq!(recs[0].item, "Z");
}

#[test]
fn test_rank_exceeding_dimensions() {
    let result = FactorizationRecommender::fit(&scenario_matrix(), &config(4));
    assert!(matches!(
        result,
        Err(FactorizationError::InvalidRank {
            components: 4,
            rows: 3,
            columns: 3
        })
    ));
}

#[test]
fn test_latent_factors_align_with_items() {
    let matrix = movie_matrix();
    let recommender = FactorizationRecommender::fit(&matrix, &config(3)).unwrap();
    let latent = recommender.latent_factors();

    assert_eq!(latent.items(), matrix.items());
    assert_eq!(latent.n_components(), 3);
    assert!(latent.factors().iter().flatten().all(|v| *v >= 0.0));
}

#[test]
fn test_recommendations_exclude_query_and_are_sorted() {
    let matrix = movie_matrix();
    let recommender = FactorizationRecommender::fit(&matrix, &config(2)).unwrap();
    let mut rng = RngSource::seeded(99);

    let queries: [&[&str]; 4] = [
        &["Movie 0"],
        &["Movie 1", "Movie 2"],
        &["Movie 7", "Movie 5", "Movie 4"],
        &[],
    ];
    for query in queries {
        let recs = recommender.recommend(query, &mut rng, None).unwrap();
        let returned: HashSet<&str> = recs.iter().map(|r| r.item.as_str()).collect();

        assert_eq!(recs.len(), 8 - query.len());
        assert!(query.iter().all(|q| !returned.contains(q)));
        assert!(recs.windows(2).all(|w| w[0].score >= w[1].score));
    }
}

#[test]
fn test_unknown_query_item() {
    let recommender = FactorizationRecommender::fit(&scenario_matrix(), &config(1)).unwrap();
    let result = recommender.recommend(&["X", "Missing"], &mut RngSource::seeded(1), None);
    assert!(matches!(result, Err(FactorizationError::UnknownItem { .. })));
}

#[test]
fn test_recommender_survives_store() {
    let dir = tempdir().unwrap();
    let store = FsStore::new(dir.path());
    let recommender = FactorizationRecommender::fit(&movie_matrix(), &config(2)).unwrap();

    recommender.save(&store).unwrap();
    let loaded: FactorizationRecommender = FactorizationRecommender::load(&store).unwrap();

    assert_eq!(loaded.latent_factors(), recommender.latent_factors());

    // Same draws give the same ranking
    let query = ["Movie 3"];
    let before = recommender.recommend(&query, &mut RngSource::seeded(5), Some(3)).unwrap();
    let after = loaded.recommend(&query, &mut RngSource::seeded(5), Some(3)).unwrap();
    assert_eq!(before, after);
}

#[test]
fn test_stale_latent_factors_rejected_on_load() {
    let dir = tempdir().unwrap();
    let store = FsStore::new(dir.path());
    let matrix = movie_matrix();
    FactorizationRecommender::fit(&matrix, &config(2))
        .unwrap()
        .save(&store)
        .unwrap();

    // Same shape, different values: factors left over from another fit
    let stale = LatentFactors::new(matrix.items().to_vec(), vec![vec![1.0; 8], vec![0.5; 8]]).unwrap();
    store.save_latent_factors(&stale).unwrap();

    let result = FactorizationRecommender::<NmfModel>::load(&store);
    assert!(matches!(result, Err(FactorizationError::MismatchedFactors)));
}
