//! Integration tests for the matrix builder.
//!
//! These tests read real files from disk, build the matrices and push the
//! raw matrix through the filesystem store.

use data_loader::parser::{self, MOVIELENS_MOVIE_COLUMNS, MOVIELENS_RATING_COLUMNS};
use data_loader::{FsStore, MatrixBuilder, MatrixStore};
use std::fs;
use tempfile::tempdir;

#[test]
fn test_build_from_csv_and_store() {
    let dir = tempdir().unwrap();
    let movies = dir.path().join("movies.csv");
    let ratings = dir.path().join("ratings.csv");

    fs::write(
        &movies,
        "movieId,title,genres\n\
         1,Toy Story (1995),Animation|Children's|Comedy\n\
         2,Jumanji (1995),Adventure|Children's|Fantasy\n\
         3,Heat (1995),Action|Crime|Thriller\n",
    )
    .unwrap();
    fs::write(
        &ratings,
        "userId,movieId,rating,timestamp\n\
         1,1,4.0,964982703\n\
         1,3,4.0,964981247\n\
         2,2,3.5,964982224\n\
         2,3,5.0,964983815\n\
         3,1,3.0,964982931\n",
    )
    .unwrap();

    let movies = parser::read_csv(&movies).unwrap();
    let ratings = parser::read_csv(&ratings).unwrap();
    let built = MatrixBuilder::new("movieId", "userId", "rating", "title")
        .build(&movies, &ratings)
        .unwrap();

    assert_eq!(built.items, ["Heat (1995)", "Jumanji (1995)", "Toy Story (1995)"]);
    assert_eq!(built.ratings.users(), ["1", "2", "3"]);
    assert_eq!(built.ratings.rating("3", "Heat (1995)"), None);
    // Heat is rated 4.0 and 5.0
    assert_eq!(built.imputed.get(2, 0), 4.5);

    let store = FsStore::new(dir.path().join("store"));
    store.save_rating_matrix(&built.ratings).unwrap();
    let loaded = store.load_rating_matrix().unwrap();
    assert_eq!(loaded, built.ratings);
    assert_eq!(loaded.impute().unwrap(), built.imputed);
}

#[test]
fn test_build_from_movielens_dat() {
    let dir = tempdir().unwrap();
    let movies = dir.path().join("movies.dat");
    let ratings = dir.path().join("ratings.dat");

    fs::write(
        &movies,
        "1::Toy Story (1995)::Animation|Children's|Comedy\n\
         1193::One Flew Over the Cuckoo's Nest (1975)::Drama\n",
    )
    .unwrap();
    fs::write(
        &ratings,
        "1::1193::5::978300760\n\
         1::1::4::978824291\n\
         2::1193::3::978298413\n",
    )
    .unwrap();

    let movies = parser::read_dat(&movies, &MOVIELENS_MOVIE_COLUMNS).unwrap();
    let ratings = parser::read_dat(&ratings, &MOVIELENS_RATING_COLUMNS).unwrap();
    let built = MatrixBuilder::new("movieId", "userId", "rating", "title")
        .build(&movies, &ratings)
        .unwrap();

    assert_eq!(built.ratings.shape(), (2, 2));
    assert_eq!(built.ratings.rating("2", "Toy Story (1995)"), None);
    assert_eq!(built.imputed.get(1, 1), 4.0);
}
