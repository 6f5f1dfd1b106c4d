//! Feature/label tables and the train/test split handed to the tuner.

use serde::{Deserialize, Serialize};

use crate::errors::{ModelError, TuneResult};

/// A row-major feature matrix with one label per row.
///
/// Classification labels are class ids stored as `f64` (`0.0`, `1.0`, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub features: Vec<Vec<f64>>,
    pub labels: Vec<f64>,
}

impl Dataset {
    /// Build a dataset, checking that rows and labels line up and that every
    /// row has the same width.
    pub fn new(features: Vec<Vec<f64>>, labels: Vec<f64>) -> TuneResult<Self> {
        if features.len() != labels.len() {
            return Err(ModelError::ShapeMismatch {
                expected: features.len(),
                actual: labels.len(),
            }
            .into());
        }
        if let Some(first) = features.first() {
            let width = first.len();
            if let Some(row) = features.iter().find(|row| row.len() != width) {
                return Err(ModelError::ShapeMismatch {
                    expected: width,
                    actual: row.len(),
                }
                .into());
            }
        }
        Ok(Self { features, labels })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Number of feature columns (0 for an empty dataset).
    pub fn n_features(&self) -> usize {
        self.features.first().map_or(0, Vec::len)
    }

    /// Rows at `indices`, in that order.
    pub fn select(&self, indices: &[usize]) -> Dataset {
        Dataset {
            features: indices.iter().map(|&i| self.features[i].clone()).collect(),
            labels: indices.iter().map(|&i| self.labels[i]).collect(),
        }
    }

    /// Rows of `self` followed by rows of `other`.
    pub fn concat(&self, other: &Dataset) -> Dataset {
        let mut features = self.features.clone();
        features.extend(other.features.iter().cloned());
        let mut labels = self.labels.clone();
        labels.extend_from_slice(&other.labels);
        Dataset { features, labels }
    }

    /// Split off the last `test_fraction` of rows as a test set without
    /// shuffling. At least one row stays on each side when possible.
    pub fn split_tail(&self, test_fraction: f64) -> TrainTestSplit {
        let n = self.len();
        let mut n_test = (n as f64 * test_fraction.clamp(0.0, 1.0)).round() as usize;
        if n >= 2 {
            n_test = n_test.clamp(1, n - 1);
        }
        let cut = n - n_test.min(n);
        let train_idx: Vec<usize> = (0..cut).collect();
        let test_idx: Vec<usize> = (cut..n).collect();
        TrainTestSplit {
            train: self.select(&train_idx),
            test: self.select(&test_idx),
        }
    }
}

/// The data a tuning run works on.
///
/// Grid and randomized search cross-validate over [`TrainTestSplit::combined`];
/// sequential search fits on `train` only. Every strategy re-scores its winner
/// on `test`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainTestSplit {
    pub train: Dataset,
    pub test: Dataset,
}

impl TrainTestSplit {
    pub fn new(train: Dataset, test: Dataset) -> TuneResult<Self> {
        if !train.is_empty() && !test.is_empty() && train.n_features() != test.n_features() {
            return Err(ModelError::ShapeMismatch {
                expected: train.n_features(),
                actual: test.n_features(),
            }
            .into());
        }
        Ok(Self { train, test })
    }

    /// Train rows followed by test rows.
    pub fn combined(&self) -> Dataset {
        self.train.concat(&self.test)
    }
}
