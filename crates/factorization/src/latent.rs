//! Latent factor matrix Q with item-labelled columns.

use crate::error::{FactorizationError, Result};
use crate::nmf::{check_non_negative, FactorizationModel};
use data_loader::ItemId;
use std::collections::HashMap;

/// Non-negative k × n matrix, one row per latent factor.
///
/// Column `j` belongs to `items[j]`, in the same order as the imputed
/// matrix the model was fitted on. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct LatentFactors {
    items: Vec<ItemId>,
    factors: Vec<Vec<f64>>,
    item_index: HashMap<ItemId, usize>,
}

impl LatentFactors {
    /// Label factor rows with item ids.
    ///
    /// Every row must have one finite, non-negative value per item.
    pub fn new(items: Vec<ItemId>, factors: Vec<Vec<f64>>) -> Result<Self> {
        for row in &factors {
            if row.len() != items.len() {
                return Err(FactorizationError::ShapeMismatch {
                    expected: items.len(),
                    found: row.len(),
                });
            }
            check_non_negative(row)?;
        }
        let item_index = items
            .iter()
            .enumerate()
            .map(|(pos, item)| (item.clone(), pos))
            .collect();

        Ok(Self {
            items,
            factors,
            item_index,
        })
    }

    /// Take the components of a fitted model, aligned to `items`
    pub fn from_model<M: FactorizationModel + ?Sized>(model: &M, items: &[ItemId]) -> Result<Self> {
        Self::new(items.to_vec(), model.components().to_vec())
    }

    pub fn items(&self) -> &[ItemId] {
        &self.items
    }

    pub fn factors(&self) -> &[Vec<f64>] {
        &self.factors
    }

    pub fn n_components(&self) -> usize {
        self.factors.len()
    }

    pub fn item_index(&self, item: &str) -> Option<usize> {
        self.item_index.get(item).copied()
    }

    /// Predicted score per item: `latent · Q`
    pub fn reconstruct(&self, latent: &[f64]) -> Result<Vec<f64>> {
        if latent.len() != self.factors.len() {
            return Err(FactorizationError::ShapeMismatch {
                expected: self.factors.len(),
                found: latent.len(),
            });
        }

        let mut scores = vec![0.0; self.items.len()];
        for (weight, row) in latent.iter().zip(&self.factors) {
            for (score, value) in scores.iter_mut().zip(row) {
                *score += weight * value;
            }
        }
        Ok(scores)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn latent() -> LatentFactors {
        LatentFactors::new(
            vec!["X".into(), "Y".into(), "Z".into()],
            vec![vec![1.0, 0.0, 2.0], vec![0.5, 1.0, 0.0]],
        )
        .unwrap()
    }

    #[test]
    fn test_reconstruct() {
        let scores = latent().reconstruct(&[2.0, 4.0]).unwrap();
        assert_eq!(scores, vec![4.0, 4.0, 4.0]);
    }

    #[test]
    fn test_item_lookup() {
        let q = latent();
        assert_eq!(q.n_components(), 2);
        assert_eq!(q.item_index("Z"), Some(2));
        assert_eq!(q.item_index("W"), None);
    }

    #[test]
    fn test_shape_checks() {
        let ragged = LatentFactors::new(vec!["X".into()], vec![vec![1.0, 2.0]]);
        assert!(matches!(ragged, Err(FactorizationError::ShapeMismatch { .. })));

        assert!(matches!(
            latent().reconstruct(&[1.0]),
            Err(FactorizationError::ShapeMismatch { expected: 2, found: 1 })
        ));
    }

    #[test]
    fn test_negative_factors_rejected() {
        let negative = LatentFactors::new(vec!["X".into(), "Y".into()], vec![vec![-1.0, 2.0]]);
        assert!(matches!(
            negative,
            Err(FactorizationError::NegativeValue { value }) if value == -1.0
        ));

        let not_finite = LatentFactors::new(vec!["X".into()], vec![vec![f64::NAN]]);
        assert!(matches!(not_finite, Err(FactorizationError::NegativeValue { .. })));
    }
}
