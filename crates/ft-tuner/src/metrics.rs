//! Evaluation metrics and the held-out test-split evaluator.
//!
//! [`EvalMetric`] names one of the seven supported scoring functions and knows
//! whether it is maximized or minimized. [`MetricEvaluator`] scores a fitted
//! [`Estimator`] on the test split a tuning run was given.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use ft_types::{ConfigError, Dataset, Estimator, ModelError, TuneError, TuneResult};

use crate::trial::ObjectiveDirection;

/// Positive class for precision, recall and F1.
const POSITIVE_LABEL: f64 = 1.0;

/// Supported evaluation metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvalMetric {
    R2,
    MeanAbsoluteError,
    MeanSquaredError,
    Accuracy,
    Precision,
    Recall,
    F1,
}

/// Which kind of problem a metric is meant for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetricTask {
    Regression,
    Classification,
}

impl EvalMetric {
    pub const ALL: [EvalMetric; 7] = [
        EvalMetric::R2,
        EvalMetric::MeanAbsoluteError,
        EvalMetric::MeanSquaredError,
        EvalMetric::Accuracy,
        EvalMetric::Precision,
        EvalMetric::Recall,
        EvalMetric::F1,
    ];

    /// Canonical selector key.
    pub fn key(&self) -> &'static str {
        match self {
            Self::R2 => "r2",
            Self::MeanAbsoluteError => "mean_absolute_error",
            Self::MeanSquaredError => "mean_squared_error",
            Self::Accuracy => "accuracy",
            Self::Precision => "precision",
            Self::Recall => "recall",
            Self::F1 => "f1",
        }
    }

    /// Error metrics are minimized, score metrics maximized.
    pub fn direction(&self) -> ObjectiveDirection {
        match self {
            Self::MeanAbsoluteError | Self::MeanSquaredError => ObjectiveDirection::Minimize,
            _ => ObjectiveDirection::Maximize,
        }
    }

    pub fn task(&self) -> MetricTask {
        match self {
            Self::R2 | Self::MeanAbsoluteError | Self::MeanSquaredError => MetricTask::Regression,
            _ => MetricTask::Classification,
        }
    }

    /// Comma-separated list of the accepted selectors, for error messages.
    pub fn allowed_keys() -> String {
        Self::ALL
            .iter()
            .map(|m| format!("'{}'", m.key()))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Compute the metric for `y_pred` against `y_true`.
    ///
    /// Precision, recall and F1 are binary with positive label `1`; labels
    /// spanning more than two classes are rejected.
    pub fn score(&self, y_true: &[f64], y_pred: &[f64]) -> TuneResult<f64> {
        if y_true.len() != y_pred.len() {
            return Err(ModelError::ShapeMismatch {
                expected: y_true.len(),
                actual: y_pred.len(),
            }
            .into());
        }
        if y_true.is_empty() {
            return Err(ModelError::EmptyInput {
                message: format!("cannot compute {} on zero samples", self.key()),
            }
            .into());
        }

        if matches!(self, Self::Precision | Self::Recall | Self::F1) {
            let classes = distinct_labels(y_true.iter().chain(y_pred));
            if classes.len() > 2 {
                return Err(ModelError::UnsupportedTarget {
                    metric: self.key().to_string(),
                    message: format!(
                        "binary average needs at most two classes, found {classes:?}"
                    ),
                }
                .into());
            }
        }

        let value = match self {
            Self::R2 => r2_score(y_true, y_pred),
            Self::MeanAbsoluteError => mean_absolute_error(y_true, y_pred),
            Self::MeanSquaredError => mean_squared_error(y_true, y_pred),
            Self::Accuracy => accuracy_score(y_true, y_pred),
            Self::Precision => {
                let c = BinaryCounts::tally(y_true, y_pred);
                ratio(c.tp, c.tp + c.fp)
            }
            Self::Recall => {
                let c = BinaryCounts::tally(y_true, y_pred);
                ratio(c.tp, c.tp + c.fn_)
            }
            Self::F1 => {
                let c = BinaryCounts::tally(y_true, y_pred);
                ratio(2 * c.tp, 2 * c.tp + c.fp + c.fn_)
            }
        };
        Ok(value)
    }

    /// Score oriented so that greater is always better; error metrics are
    /// negated. Used to rank cross-validation candidates.
    pub fn cv_score(&self, y_true: &[f64], y_pred: &[f64]) -> TuneResult<f64> {
        let raw = self.score(y_true, y_pred)?;
        Ok(match self.direction() {
            ObjectiveDirection::Maximize => raw,
            ObjectiveDirection::Minimize => -raw,
        })
    }
}

impl fmt::Display for EvalMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for EvalMetric {
    type Err = TuneError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "r2" => Ok(Self::R2),
            "mae" | "mean_absolute_error" => Ok(Self::MeanAbsoluteError),
            "mse" | "mean_squared_error" => Ok(Self::MeanSquaredError),
            "accuracy" => Ok(Self::Accuracy),
            "precision" => Ok(Self::Precision),
            "recall" => Ok(Self::Recall),
            "f1" => Ok(Self::F1),
            _ => Err(ConfigError::InvalidArgument {
                message: format!(
                    "unknown evaluation metric '{s}', expected one of: {}",
                    Self::allowed_keys()
                ),
            }
            .into()),
        }
    }
}

fn labels_match(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

fn distinct_labels<'a>(labels: impl Iterator<Item = &'a f64>) -> Vec<f64> {
    let mut seen: Vec<f64> = Vec::new();
    for &label in labels {
        if !seen.iter().any(|s| labels_match(*s, label)) {
            seen.push(label);
        }
    }
    seen
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

fn r2_score(y_true: &[f64], y_pred: &[f64]) -> f64 {
    let mean = y_true.iter().sum::<f64>() / y_true.len() as f64;
    let ss_res: f64 = y_true
        .iter()
        .zip(y_pred)
        .map(|(t, p)| (t - p).powi(2))
        .sum();
    let ss_tot: f64 = y_true.iter().map(|t| (t - mean).powi(2)).sum();
    if ss_tot == 0.0 {
        // Constant target: perfect predictions score 1, anything else 0.
        return if ss_res == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}

fn mean_absolute_error(y_true: &[f64], y_pred: &[f64]) -> f64 {
    y_true
        .iter()
        .zip(y_pred)
        .map(|(t, p)| (t - p).abs())
        .sum::<f64>()
        / y_true.len() as f64
}

fn mean_squared_error(y_true: &[f64], y_pred: &[f64]) -> f64 {
    y_true
        .iter()
        .zip(y_pred)
        .map(|(t, p)| (t - p).powi(2))
        .sum::<f64>()
        / y_true.len() as f64
}

fn accuracy_score(y_true: &[f64], y_pred: &[f64]) -> f64 {
    let hits = y_true
        .iter()
        .zip(y_pred)
        .filter(|(t, p)| labels_match(**t, **p))
        .count();
    hits as f64 / y_true.len() as f64
}

struct BinaryCounts {
    tp: usize,
    fp: usize,
    fn_: usize,
}

impl BinaryCounts {
    fn tally(y_true: &[f64], y_pred: &[f64]) -> Self {
        let mut counts = Self { tp: 0, fp: 0, fn_: 0 };
        for (t, p) in y_true.iter().zip(y_pred) {
            let actual = labels_match(*t, POSITIVE_LABEL);
            let predicted = labels_match(*p, POSITIVE_LABEL);
            match (actual, predicted) {
                (true, true) => counts.tp += 1,
                (false, true) => counts.fp += 1,
                (true, false) => counts.fn_ += 1,
                (false, false) => {}
            }
        }
        counts
    }
}

/// Scores fitted models on a held-out split.
#[derive(Debug, Clone, Copy)]
pub struct MetricEvaluator<'a> {
    test: &'a Dataset,
}

impl<'a> MetricEvaluator<'a> {
    pub fn new(test: &'a Dataset) -> Self {
        Self { test }
    }

    /// Predict on the test split and compute `metric`.
    pub fn evaluate(&self, model: &dyn Estimator, metric: EvalMetric) -> TuneResult<f64> {
        if self.test.is_empty() {
            return Err(ModelError::EmptyInput {
                message: "test split has no rows".to_string(),
            }
            .into());
        }
        let predictions = model.predict(&self.test.features)?;
        metric.score(&self.test.labels, &predictions)
    }

    /// Parse `selector` first, so an unknown metric is reported before any
    /// prediction is made.
    pub fn evaluate_named(&self, model: &dyn Estimator, selector: &str) -> TuneResult<f64> {
        let metric: EvalMetric = selector.parse()?;
        self.evaluate(model, metric)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimators::{KNearestNeighbors, RidgeRegression};

    const Y_TRUE: [f64; 8] = [1.0, 0.0, 1.0, 1.0, 0.0, 0.0, 1.0, 0.0];
    const Y_PRED: [f64; 8] = [1.0, 0.0, 0.0, 1.0, 1.0, 0.0, 1.0, 0.0];

    #[test]
    fn parses_keys_and_aliases() {
        assert_eq!("r2".parse::<EvalMetric>().unwrap(), EvalMetric::R2);
        assert_eq!("MAE".parse::<EvalMetric>().unwrap(), EvalMetric::MeanAbsoluteError);
        assert_eq!(
            "mean_squared_error".parse::<EvalMetric>().unwrap(),
            EvalMetric::MeanSquaredError
        );
        assert_eq!(" F1 ".parse::<EvalMetric>().unwrap(), EvalMetric::F1);
    }

    #[test]
    fn unknown_selector_lists_all_seven() {
        let err = "roc_auc".parse::<EvalMetric>().unwrap_err();
        assert!(err.is_config());
        let msg = err.to_string();
        assert!(msg.contains("roc_auc"));
        for metric in EvalMetric::ALL {
            assert!(msg.contains(metric.key()), "missing {} in {msg}", metric.key());
        }
    }

    #[test]
    fn directions() {
        assert_eq!(EvalMetric::MeanSquaredError.direction(), ObjectiveDirection::Minimize);
        assert_eq!(EvalMetric::MeanAbsoluteError.direction(), ObjectiveDirection::Minimize);
        for metric in [
            EvalMetric::R2,
            EvalMetric::Accuracy,
            EvalMetric::Precision,
            EvalMetric::Recall,
            EvalMetric::F1,
        ] {
            assert_eq!(metric.direction(), ObjectiveDirection::Maximize);
        }
    }

    #[test]
    fn classification_scores() {
        // tp=3 fp=1 fn=1 tn=3
        let acc = EvalMetric::Accuracy.score(&Y_TRUE, &Y_PRED).unwrap();
        assert!((acc - 0.75).abs() < 1e-12);
        let p = EvalMetric::Precision.score(&Y_TRUE, &Y_PRED).unwrap();
        assert!((p - 0.75).abs() < 1e-12);
        let r = EvalMetric::Recall.score(&Y_TRUE, &Y_PRED).unwrap();
        assert!((r - 0.75).abs() < 1e-12);
        let f1 = EvalMetric::F1.score(&Y_TRUE, &Y_PRED).unwrap();
        assert!((f1 - 0.75).abs() < 1e-12);
    }

    #[test]
    fn binary_metrics_reject_multiclass_labels() {
        let y_true = [0.0, 1.0, 2.0, 1.0];
        let y_pred = [0.0, 1.0, 1.0, 1.0];
        for metric in [EvalMetric::Precision, EvalMetric::Recall, EvalMetric::F1] {
            let err = metric.score(&y_true, &y_pred).unwrap_err();
            assert!(matches!(
                err,
                TuneError::Model(ModelError::UnsupportedTarget { metric: ref name, .. })
                    if name == metric.key()
            ));
        }
        // A third class only in the predictions counts as well.
        assert!(EvalMetric::F1.score(&[0.0, 1.0], &[0.0, 3.0]).is_err());
        // Accuracy is defined for any number of classes.
        let acc = EvalMetric::Accuracy.score(&y_true, &y_pred).unwrap();
        assert!((acc - 0.75).abs() < 1e-12);
    }

    #[test]
    fn precision_without_positive_predictions_is_zero() {
        let p = EvalMetric::Precision.score(&[1.0, 0.0], &[0.0, 0.0]).unwrap();
        assert_eq!(p, 0.0);
    }

    #[test]
    fn regression_scores() {
        let y_true = [3.0, -0.5, 2.0, 7.0];
        let y_pred = [2.5, 0.0, 2.0, 8.0];
        let mae = EvalMetric::MeanAbsoluteError.score(&y_true, &y_pred).unwrap();
        assert!((mae - 0.5).abs() < 1e-12);
        let mse = EvalMetric::MeanSquaredError.score(&y_true, &y_pred).unwrap();
        assert!((mse - 0.375).abs() < 1e-12);
        let r2 = EvalMetric::R2.score(&y_true, &y_pred).unwrap();
        assert!((r2 - 0.948_608_137_044_967_9).abs() < 1e-9);
    }

    #[test]
    fn r2_constant_target() {
        assert_eq!(EvalMetric::R2.score(&[2.0, 2.0], &[2.0, 2.0]).unwrap(), 1.0);
        assert_eq!(EvalMetric::R2.score(&[2.0, 2.0], &[1.0, 2.0]).unwrap(), 0.0);
    }

    #[test]
    fn cv_score_negates_errors() {
        let s = EvalMetric::MeanSquaredError.cv_score(&[1.0, 2.0], &[2.0, 2.0]).unwrap();
        assert!((s + 0.5).abs() < 1e-12);
        let s = EvalMetric::Accuracy.cv_score(&[1.0, 2.0], &[1.0, 2.0]).unwrap();
        assert_eq!(s, 1.0);
    }

    #[test]
    fn score_rejects_empty_and_mismatched() {
        assert!(EvalMetric::R2.score(&[], &[]).is_err());
        assert!(EvalMetric::R2.score(&[1.0], &[1.0, 2.0]).is_err());
    }

    #[test]
    fn evaluator_returns_finite_scores_for_every_metric() {
        let train = Dataset::new(
            (0..20).map(|i| vec![i as f64]).collect(),
            (0..20).map(|i| if i >= 10 { 1.0 } else { 0.0 }).collect(),
        )
        .unwrap();
        let test = Dataset::new(
            vec![vec![2.0], vec![8.0], vec![12.0], vec![17.0]],
            vec![0.0, 0.0, 1.0, 1.0],
        )
        .unwrap();

        let mut knn = KNearestNeighbors::classifier();
        knn.fit(&train.features, &train.labels).unwrap();
        let mut ridge = RidgeRegression::default();
        ridge.fit(&train.features, &train.labels).unwrap();

        let evaluator = MetricEvaluator::new(&test);
        for metric in EvalMetric::ALL {
            let model: &dyn Estimator = match metric.task() {
                MetricTask::Classification => &knn,
                MetricTask::Regression => &ridge,
            };
            let score = evaluator.evaluate(model, metric).unwrap();
            assert!(score.is_finite(), "{metric} produced {score}");
        }
        assert_eq!(evaluator.evaluate(&knn, EvalMetric::Accuracy).unwrap(), 1.0);
    }

    #[test]
    fn evaluate_named_propagates_unknown_metric() {
        let test = Dataset::new(vec![vec![1.0]], vec![1.0]).unwrap();
        let knn = KNearestNeighbors::classifier();
        let err = MetricEvaluator::new(&test)
            .evaluate_named(&knn, "logloss")
            .unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn evaluator_rejects_empty_test_split() {
        let empty = Dataset::default();
        let knn = KNearestNeighbors::classifier();
        assert!(MetricEvaluator::new(&empty)
            .evaluate(&knn, EvalMetric::Accuracy)
            .is_err());
    }
}
