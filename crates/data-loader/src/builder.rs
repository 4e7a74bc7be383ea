//! Matrix building: join, pivot and impute.
//!
//! `MatrixBuilder` turns two tables sharing a key column (for MovieLens:
//! movies and ratings joined on `movieId`) into a user × item
//! [`RatingMatrix`], then fills its gaps with column means to produce the
//! [`ImputedRatingMatrix`] both recommenders consume.
//!
//! ## Algorithm
//! 1. Index the user table by the join key
//! 2. Walk the feature table in order and emit one joined row per match
//!    (inner join, unmatched rows are dropped)
//! 3. Group joined rows by (user, item label), combining duplicates with
//!    the configured [`Aggregation`]
//! 4. Sort users and items (numeric-aware) and lay the cells out densely
//! 5. Impute each column with the mean of its observed ratings

use crate::error::{DataLoadError, Result};
use crate::parser::parse_rating;
use crate::types::{Aggregation, ImputedRatingMatrix, ItemId, RatingMatrix, Table};
use rayon::prelude::*;
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::{debug, info, instrument};

/// The three matrices produced by a build
#[derive(Debug, Clone)]
pub struct BuiltMatrices {
    /// Sparse matrix with absent cells preserved
    pub ratings: RatingMatrix,
    /// Dense matrix with column-mean imputation
    pub imputed: ImputedRatingMatrix,
    /// Ordered item ids; latent factor columns must follow this order
    pub items: Vec<ItemId>,
}

/// Builds rating matrices from a feature table and a user table.
///
/// ## Usage
/// ```ignore
/// let built = MatrixBuilder::new("movieId", "userId", "rating", "title")
///     .with_aggregation(Aggregation::Mean)
///     .build(&movies, &ratings)?;
/// ```
#[derive(Debug, Clone)]
pub struct MatrixBuilder {
    feature_key: String,
    user_key: String,
    value_column: String,
    feature_label: String,
    aggregation: Aggregation,
}

/// Which joined table a column comes from
#[derive(Debug, Clone, Copy)]
enum Side {
    Feature,
    User,
}

impl MatrixBuilder {
    /// Create a builder.
    ///
    /// # Arguments
    /// * `feature_key` - Join column present in both tables
    /// * `user_key` - Column whose values become matrix rows
    /// * `value_column` - Column holding the numeric rating
    /// * `feature_label` - Column whose values become matrix columns
    pub fn new(
        feature_key: impl Into<String>,
        user_key: impl Into<String>,
        value_column: impl Into<String>,
        feature_label: impl Into<String>,
    ) -> Self {
        Self {
            feature_key: feature_key.into(),
            user_key: user_key.into(),
            value_column: value_column.into(),
            feature_label: feature_label.into(),
            aggregation: Aggregation::default(),
        }
    }

    /// Configure how duplicate (user, item) pairs are combined (default: mean)
    pub fn with_aggregation(mut self, aggregation: Aggregation) -> Self {
        self.aggregation = aggregation;
        self
    }

    /// Join, pivot and impute in one step
    #[instrument(skip_all, fields(key = %self.feature_key))]
    pub fn build(&self, features: &Table, users: &Table) -> Result<BuiltMatrices> {
        let ratings = self.pivot(features, users)?;
        let imputed = ratings.impute()?;
        let items = ratings.items().to_vec();

        let (rows, cols) = ratings.shape();
        info!(
            "Built {}x{} rating matrix ({} observed, density {:.4})",
            rows,
            cols,
            ratings.observed_count(),
            ratings.density()
        );

        Ok(BuiltMatrices {
            ratings,
            imputed,
            items,
        })
    }

    /// Inner-join the tables and pivot them into a sparse rating matrix
    pub fn pivot(&self, features: &Table, users: &Table) -> Result<RatingMatrix> {
        let feature_key = features.column_index(&self.feature_key)?;
        let user_table_key = users.column_index(&self.feature_key)?;
        let user_col = self.resolve(features, users, &self.user_key)?;
        let label_col = self.resolve(features, users, &self.feature_label)?;
        let value_col = self.resolve(features, users, &self.value_column)?;

        // Rows with a missing key never match anything
        let mut by_key: HashMap<&str, Vec<usize>> = HashMap::new();
        for row in 0..users.len() {
            if let Some(key) = users.value(row, user_table_key) {
                by_key.entry(key).or_default().push(row);
            }
        }

        let mut joined = 0usize;
        let mut cells: HashMap<(&str, &str), Accumulator> = HashMap::new();

        for f_row in 0..features.len() {
            let Some(key) = features.value(f_row, feature_key) else {
                continue;
            };
            let Some(matches) = by_key.get(key) else {
                continue;
            };

            for &u_row in matches {
                joined += 1;
                let pick = |(side, col): (Side, usize)| match side {
                    Side::Feature => features.value(f_row, col),
                    Side::User => users.value(u_row, col),
                };

                // Missing ids or ratings are dropped by the pivot
                let (Some(user), Some(item), Some(raw)) =
                    (pick(user_col), pick(label_col), pick(value_col))
                else {
                    continue;
                };
                let rating = parse_rating(&self.value_column, raw)?;
                cells.entry((user, item)).or_default().push(rating);
            }
        }

        if joined == 0 {
            return Err(DataLoadError::JoinProducedEmptyResult {
                key: self.feature_key.clone(),
            });
        }
        if cells.is_empty() {
            return Err(DataLoadError::EmptyMatrix);
        }
        debug!("Joined {} rows into {} (user, item) cells", joined, cells.len());

        let mut user_ids: Vec<&str> = cells.keys().map(|(u, _)| *u).collect();
        let mut item_ids: Vec<&str> = cells.keys().map(|(_, i)| *i).collect();
        user_ids.sort_by(|a, b| compare_keys(a, b));
        user_ids.dedup();
        item_ids.sort_by(|a, b| compare_keys(a, b));
        item_ids.dedup();

        let user_pos: HashMap<&str, usize> =
            user_ids.iter().enumerate().map(|(i, u)| (*u, i)).collect();
        let item_pos: HashMap<&str, usize> =
            item_ids.iter().enumerate().map(|(i, m)| (*m, i)).collect();

        let mut rows = vec![vec![None; item_ids.len()]; user_ids.len()];
        for ((user, item), acc) in &cells {
            rows[user_pos[user]][item_pos[item]] = Some(acc.value(self.aggregation));
        }

        RatingMatrix::from_rows(
            user_ids.into_iter().map(str::to_string).collect(),
            item_ids.into_iter().map(str::to_string).collect(),
            rows,
        )
    }

    /// Locate a non-key column in exactly one of the two tables
    fn resolve(&self, features: &Table, users: &Table, name: &str) -> Result<(Side, usize)> {
        if name == self.feature_key {
            return Ok((Side::Feature, features.column_index(name)?));
        }
        match (features.find_column(name), users.find_column(name)) {
            (Some(col), None) => Ok((Side::Feature, col)),
            (None, Some(col)) => Ok((Side::User, col)),
            (Some(_), Some(_)) => Err(DataLoadError::AmbiguousColumn {
                column: name.to_string(),
            }),
            (None, None) => Err(DataLoadError::MissingColumn {
                column: name.to_string(),
            }),
        }
    }
}

impl RatingMatrix {
    /// Mean of the observed ratings in each column; `None` for empty columns
    pub fn column_means(&self) -> Vec<Option<f64>> {
        let (rows, cols) = self.shape();
        (0..cols)
            .into_par_iter()
            .map(|item| {
                let (sum, count) = (0..rows)
                    .filter_map(|user| self.get(user, item))
                    .fold((0.0, 0usize), |(s, c), r| (s + r, c + 1));
                (count > 0).then(|| sum / count as f64)
            })
            .collect()
    }

    /// Fill every absent cell with its column mean.
    ///
    /// Fails with `EmptyColumn` when a column has no observed rating.
    pub fn impute(&self) -> Result<ImputedRatingMatrix> {
        let means = self
            .column_means()
            .into_iter()
            .zip(self.items())
            .map(|(mean, item)| mean.ok_or_else(|| DataLoadError::EmptyColumn { item: item.clone() }))
            .collect::<Result<Vec<f64>>>()?;

        let rows = (0..self.shape().0)
            .map(|user| {
                self.row(user)
                    .iter()
                    .zip(&means)
                    .map(|(cell, mean)| cell.unwrap_or(*mean))
                    .collect()
            })
            .collect();

        ImputedRatingMatrix::from_rows(self.users().to_vec(), self.items().to_vec(), rows)
    }
}

/// Running state for one (user, item) cell
#[derive(Debug, Default)]
struct Accumulator {
    sum: f64,
    count: usize,
    first: Option<f64>,
    last: f64,
}

impl Accumulator {
    fn push(&mut self, rating: f64) {
        self.sum += rating;
        self.count += 1;
        self.first.get_or_insert(rating);
        self.last = rating;
    }

    fn value(&self, aggregation: Aggregation) -> f64 {
        match aggregation {
            Aggregation::Mean => self.sum / self.count as f64,
            Aggregation::First => self.first.unwrap_or(self.last),
            Aggregation::Last => self.last,
        }
    }
}

/// Order ids numerically when both parse as integers, textually otherwise.
///
/// Integers sort before text so mixed columns still have a total order.
fn compare_keys(a: &str, b: &str) -> Ordering {
    match (a.parse::<i64>(), b.parse::<i64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}
