//! K-fold cross-validation used to rank grid and randomized candidates.

use serde::{Deserialize, Serialize};

use ft_types::{ConfigError, Dataset, Estimator, ModelError, ParamSet, TuneResult};

use crate::metrics::EvalMetric;

/// Row indices of one train/validation split.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoldSplit {
    pub train: Vec<usize>,
    pub validation: Vec<usize>,
}

/// Contiguous k-fold splitter without shuffling. The first `n % k` folds get
/// one extra row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KFold {
    folds: usize,
}

impl KFold {
    pub fn new(folds: usize) -> TuneResult<Self> {
        if folds < 2 {
            return Err(ConfigError::InvalidFolds { folds }.into());
        }
        Ok(Self { folds })
    }

    pub fn folds(&self) -> usize {
        self.folds
    }

    pub fn splits(&self, n_rows: usize) -> TuneResult<Vec<FoldSplit>> {
        if n_rows < self.folds {
            return Err(ModelError::EmptyInput {
                message: format!(
                    "cannot split {n_rows} rows into {} folds",
                    self.folds
                ),
            }
            .into());
        }

        let base = n_rows / self.folds;
        let extra = n_rows % self.folds;
        let mut start = 0;
        let mut splits = Vec::with_capacity(self.folds);
        for fold in 0..self.folds {
            let size = base + usize::from(fold < extra);
            let end = start + size;
            splits.push(FoldSplit {
                train: (0..start).chain(end..n_rows).collect(),
                validation: (start..end).collect(),
            });
            start = end;
        }
        Ok(splits)
    }
}

/// Per-candidate cross-validation outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CvScore {
    pub params: ParamSet,
    /// Greater-is-better fold scores (error metrics negated).
    pub fold_scores: Vec<f64>,
    pub mean: f64,
    pub std: f64,
}

/// Fit an unfitted clone of `base` with `params` on each training fold and
/// score it on the matching validation fold.
pub fn cross_val_score(
    base: &dyn Estimator,
    params: &ParamSet,
    data: &Dataset,
    kfold: &KFold,
    metric: EvalMetric,
) -> TuneResult<CvScore> {
    let splits = kfold.splits(data.len())?;
    let mut fold_scores = Vec::with_capacity(splits.len());

    for split in &splits {
        let train = data.select(&split.train);
        let validation = data.select(&split.validation);

        let mut model = base.clone_unfitted();
        model.set_params(params)?;
        model.fit(&train.features, &train.labels)?;
        let predictions = model.predict(&validation.features)?;
        fold_scores.push(metric.cv_score(&validation.labels, &predictions)?);
    }

    let n = fold_scores.len() as f64;
    let mean = fold_scores.iter().sum::<f64>() / n;
    let std = (fold_scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n).sqrt();

    Ok(CvScore {
        params: params.clone(),
        fold_scores,
        mean,
        std,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimators::RidgeRegression;
    use ft_types::{ParamValue, TuneError};

    #[test]
    fn folds_cover_every_row_once() {
        let splits = KFold::new(3).unwrap().splits(10).unwrap();
        assert_eq!(splits.len(), 3);
        let sizes: Vec<usize> = splits.iter().map(|s| s.validation.len()).collect();
        assert_eq!(sizes, vec![4, 3, 3]);

        let mut seen: Vec<usize> = splits.iter().flat_map(|s| s.validation.clone()).collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..10).collect::<Vec<_>>());

        for split in &splits {
            assert_eq!(split.train.len() + split.validation.len(), 10);
            assert!(split.train.iter().all(|i| !split.validation.contains(i)));
        }
    }

    #[test]
    fn rejects_fewer_than_two_folds() {
        assert!(matches!(
            KFold::new(1),
            Err(TuneError::Config(ConfigError::InvalidFolds { folds: 1 }))
        ));
    }

    #[test]
    fn rejects_more_folds_than_rows() {
        let err = KFold::new(5).unwrap().splits(3).unwrap_err();
        assert!(!err.is_config());
    }

    #[test]
    fn cross_val_on_noise_free_line() {
        let data = Dataset::new(
            (0..12).map(|i| vec![i as f64]).collect(),
            (0..12).map(|i| 2.0 * i as f64 - 1.0).collect(),
        )
        .unwrap();
        let mut params = ParamSet::new();
        params.insert("alpha".into(), ParamValue::Float(1e-9));

        let cv = cross_val_score(
            &RidgeRegression::default(),
            &params,
            &data,
            &KFold::new(3).unwrap(),
            EvalMetric::MeanSquaredError,
        )
        .unwrap();

        assert_eq!(cv.fold_scores.len(), 3);
        // Negated MSE of a perfect fit is ~0 from below.
        assert!(cv.mean <= 0.0 && cv.mean > -1e-6, "mean {}", cv.mean);
    }

    #[test]
    fn invalid_params_surface_as_model_errors() {
        let data = Dataset::new(
            (0..6).map(|i| vec![i as f64]).collect(),
            (0..6).map(|i| i as f64).collect(),
        )
        .unwrap();
        let mut params = ParamSet::new();
        params.insert("depth".into(), ParamValue::Int(3));
        let err = cross_val_score(
            &RidgeRegression::default(),
            &params,
            &data,
            &KFold::new(2).unwrap(),
            EvalMetric::R2,
        )
        .unwrap_err();
        assert!(matches!(err, TuneError::Model(_)));
    }
}
