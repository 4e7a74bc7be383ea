//! Core domain types for rating data.
//!
//! This module defines the structures shared by every recommender:
//! - `Table`: a named-column table as read from a source file
//! - `RatingMatrix`: the sparse user × item matrix (absent cells are `None`)
//! - `ImputedRatingMatrix`: the dense variant with every gap filled
//! - `Recommendation`: an (item, score) pair returned to callers

use crate::error::{DataLoadError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// =============================================================================
// Type Aliases
// =============================================================================

/// Identifier of a user row (the pivot index)
pub type UserId = String;

/// Identifier of an item column (the pivot column label, e.g. a movie title)
pub type ItemId = String;

// =============================================================================
// Tables
// =============================================================================

/// A table of optional text cells with named columns.
///
/// Cells are kept as text until a consumer asks for a typed value, so
/// the same table can serve as a join key source and a rating source.
/// `None` marks a missing value.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
}

impl Table {
    /// Create an empty table with the given column names
    pub fn new<S: Into<String>>(headers: impl IntoIterator<Item = S>) -> Self {
        Self {
            headers: headers.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Append a row; its length must match the header count
    pub fn push_row(&mut self, row: Vec<Option<String>>) -> Result<()> {
        if row.len() != self.headers.len() {
            return Err(DataLoadError::FieldCountMismatch {
                expected: self.headers.len(),
                found: row.len(),
                line: self.rows.len() + 1,
            });
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<Option<String>>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a column by name, if present
    pub fn find_column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Position of a column by name, failing with `MissingColumn`
    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.find_column(name)
            .ok_or_else(|| DataLoadError::MissingColumn {
                column: name.to_string(),
            })
    }

    /// Cell at (row, column), `None` when missing
    pub fn value(&self, row: usize, column: usize) -> Option<&str> {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .and_then(|cell| cell.as_deref())
    }
}

// =============================================================================
// Rating Matrices
// =============================================================================

/// Sparse user × item rating matrix.
///
/// Rows are users and columns are items, both in a fixed order. A cell
/// is `None` when no rating was recorded, which is distinct from a
/// rating of `0.0`.
#[derive(Debug, Clone, PartialEq)]
pub struct RatingMatrix {
    users: Vec<UserId>,
    items: Vec<ItemId>,
    /// Row-major cells, `users.len() * items.len()` long
    cells: Vec<Option<f64>>,
    user_index: HashMap<UserId, usize>,
    item_index: HashMap<ItemId, usize>,
}

impl RatingMatrix {
    /// Build a matrix from row vectors, one per user.
    ///
    /// Fails if a row length differs from the item count or an id repeats.
    pub fn from_rows(
        users: Vec<UserId>,
        items: Vec<ItemId>,
        rows: Vec<Vec<Option<f64>>>,
    ) -> Result<Self> {
        check_row_count(users.len(), rows.len())?;
        let user_index = index_labels(&users, "user")?;
        let item_index = index_labels(&items, "item")?;

        let mut cells = Vec::with_capacity(users.len() * items.len());
        for row in rows {
            check_row_width(items.len(), row.len())?;
            cells.extend(row);
        }

        Ok(Self {
            users,
            items,
            cells,
            user_index,
            item_index,
        })
    }

    pub fn users(&self) -> &[UserId] {
        &self.users
    }

    pub fn items(&self) -> &[ItemId] {
        &self.items
    }

    /// (rows, columns)
    pub fn shape(&self) -> (usize, usize) {
        (self.users.len(), self.items.len())
    }

    pub fn user_index(&self, user: &str) -> Option<usize> {
        self.user_index.get(user).copied()
    }

    pub fn item_index(&self, item: &str) -> Option<usize> {
        self.item_index.get(item).copied()
    }

    /// All cells of one user row
    pub fn row(&self, user_idx: usize) -> &[Option<f64>] {
        let width = self.items.len();
        &self.cells[user_idx * width..(user_idx + 1) * width]
    }

    /// Cell by position
    pub fn get(&self, user_idx: usize, item_idx: usize) -> Option<f64> {
        self.cells[user_idx * self.items.len() + item_idx]
    }

    /// Cell by id, `None` when either id is unknown or the cell is absent
    pub fn rating(&self, user: &str, item: &str) -> Option<f64> {
        let u = self.user_index(user)?;
        let i = self.item_index(item)?;
        self.get(u, i)
    }

    /// Observed (item, rating) pairs of one user, in column order
    pub fn user_ratings(&self, user: &str) -> Vec<(&str, f64)> {
        let Some(u) = self.user_index(user) else {
            return Vec::new();
        };
        self.row(u)
            .iter()
            .zip(&self.items)
            .filter_map(|(cell, item)| cell.map(|r| (item.as_str(), r)))
            .collect()
    }

    /// Number of observed cells
    pub fn observed_count(&self) -> usize {
        self.cells.iter().filter(|c| c.is_some()).count()
    }

    /// Fraction of observed cells (0.0 for an empty matrix)
    pub fn density(&self) -> f64 {
        if self.cells.is_empty() {
            0.0
        } else {
            self.observed_count() as f64 / self.cells.len() as f64
        }
    }
}

/// Dense user × item matrix with every cell filled.
///
/// Produced from a [`RatingMatrix`] by column-mean imputation; it keeps
/// the same user and item order as its source.
#[derive(Debug, Clone, PartialEq)]
pub struct ImputedRatingMatrix {
    users: Vec<UserId>,
    items: Vec<ItemId>,
    values: Vec<f64>,
    user_index: HashMap<UserId, usize>,
    item_index: HashMap<ItemId, usize>,
}

impl ImputedRatingMatrix {
    /// Build a dense matrix from row vectors, one per user
    pub fn from_rows(users: Vec<UserId>, items: Vec<ItemId>, rows: Vec<Vec<f64>>) -> Result<Self> {
        check_row_count(users.len(), rows.len())?;
        let user_index = index_labels(&users, "user")?;
        let item_index = index_labels(&items, "item")?;

        let mut values = Vec::with_capacity(users.len() * items.len());
        for row in rows {
            check_row_width(items.len(), row.len())?;
            values.extend(row);
        }

        Ok(Self {
            users,
            items,
            values,
            user_index,
            item_index,
        })
    }

    pub fn users(&self) -> &[UserId] {
        &self.users
    }

    pub fn items(&self) -> &[ItemId] {
        &self.items
    }

    /// (rows, columns)
    pub fn shape(&self) -> (usize, usize) {
        (self.users.len(), self.items.len())
    }

    pub fn user_index(&self, user: &str) -> Option<usize> {
        self.user_index.get(user).copied()
    }

    pub fn item_index(&self, item: &str) -> Option<usize> {
        self.item_index.get(item).copied()
    }

    pub fn row(&self, user_idx: usize) -> &[f64] {
        let width = self.items.len();
        &self.values[user_idx * width..(user_idx + 1) * width]
    }

    pub fn get(&self, user_idx: usize, item_idx: usize) -> f64 {
        self.values[user_idx * self.items.len() + item_idx]
    }

    /// Iterate user rows in order
    pub fn rows(&self) -> impl Iterator<Item = &[f64]> {
        (0..self.users.len()).map(move |user_idx| self.row(user_idx))
    }

    /// Mean over all cells (0.0 for an empty matrix)
    pub fn mean(&self) -> f64 {
        if self.values.is_empty() {
            0.0
        } else {
            self.values.iter().sum::<f64>() / self.values.len() as f64
        }
    }

    /// True when both matrices carry the same users and items in the same order
    pub fn is_aligned_with(&self, ratings: &RatingMatrix) -> bool {
        self.users == ratings.users && self.items == ratings.items
    }
}

// =============================================================================
// Recommendation
// =============================================================================

/// A single recommended item with its predicted score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub item: ItemId,
    pub score: f64,
}

impl Recommendation {
    pub fn new(item: impl Into<ItemId>, score: f64) -> Self {
        Self {
            item: item.into(),
            score,
        }
    }
}

/// How repeated (user, item) pairs are combined when pivoting
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Aggregation {
    /// Average of all ratings for the pair
    #[default]
    Mean,
    /// First rating encountered in join order
    First,
    /// Last rating encountered in join order
    Last,
}

// =============================================================================
// Helpers
// =============================================================================

fn index_labels(labels: &[String], field: &str) -> Result<HashMap<String, usize>> {
    let mut index = HashMap::with_capacity(labels.len());
    for (pos, label) in labels.iter().enumerate() {
        if index.insert(label.clone(), pos).is_some() {
            return Err(DataLoadError::InvalidValue {
                field: format!("duplicate {}", field),
                value: label.clone(),
            });
        }
    }
    Ok(index)
}

fn check_row_count(expected: usize, found: usize) -> Result<()> {
    if expected != found {
        return Err(DataLoadError::ShapeMismatch {
            expected: format!("{} rows", expected),
            found: format!("{} rows", found),
        });
    }
    Ok(())
}

fn check_row_width(expected: usize, found: usize) -> Result<()> {
    if expected != found {
        return Err(DataLoadError::ShapeMismatch {
            expected: format!("{} columns", expected),
            found: format!("{} columns", found),
        });
    }
    Ok(())
}
