//! The result record returned by every tuning strategy.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use ft_types::{ConfigError, Estimator, ParamGrid, ParamSet, TuneError};

use crate::metrics::EvalMetric;
use crate::trial::{IncumbentUpdate, ObjectiveDirection, Trial, TrialStatus};

/// Which strategy produced a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TuningMethod {
    Grid,
    Randomized,
    Sequential,
}

impl TuningMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Grid => "grid",
            Self::Randomized => "randomized",
            Self::Sequential => "sequential",
        }
    }
}

impl fmt::Display for TuningMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TuningMethod {
    type Err = TuneError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "grid" | "grid_search" => Ok(Self::Grid),
            "randomized" | "random" | "random_search" | "randomized_search" => {
                Ok(Self::Randomized)
            }
            "sequential" | "bayesian" => Ok(Self::Sequential),
            _ => Err(ConfigError::InvalidArgument {
                message: format!(
                    "unknown tuning method '{s}', expected 'grid', 'randomized' or 'sequential'"
                ),
            }
            .into()),
        }
    }
}

/// The winning model together with its held-out score.
#[derive(Debug)]
pub struct TunedModel {
    pub model: Box<dyn Estimator>,
    pub score: f64,
    pub params: ParamSet,
}

/// Outcome of one tuning call.
///
/// `tuned` holds the model and its score together, so either both are set or
/// neither is.
#[derive(Debug)]
pub struct TuningReport {
    pub tuning_method: TuningMethod,
    pub tuning_param_grid: ParamGrid,
    /// Fold count; `None` for sequential search, which does no cross-validation.
    pub cv: Option<usize>,
    pub n_jobs: i32,
    /// The metric selector exactly as the caller passed it.
    pub tuned_model_evaluation_metric: String,
    pub metric: EvalMetric,
    pub tuned: Option<TunedModel>,
    /// Evaluated candidates (grid/randomized) or trials (sequential).
    pub trials: Vec<Trial>,
    /// Incumbent changes in arrival order (sequential only).
    pub incumbent_history: Vec<IncumbentUpdate>,
}

impl TuningReport {
    pub fn new(
        tuning_method: TuningMethod,
        tuning_param_grid: ParamGrid,
        cv: Option<usize>,
        n_jobs: i32,
        metric_name: &str,
        metric: EvalMetric,
    ) -> Self {
        Self {
            tuning_method,
            tuning_param_grid,
            cv,
            n_jobs,
            tuned_model_evaluation_metric: metric_name.to_string(),
            metric,
            tuned: None,
            trials: Vec::new(),
            incumbent_history: Vec::new(),
        }
    }

    pub fn is_tuned(&self) -> bool {
        self.tuned.is_some()
    }

    pub fn tuned_model(&self) -> Option<&dyn Estimator> {
        self.tuned.as_ref().map(|t| t.model.as_ref())
    }

    pub fn tuned_model_score(&self) -> Option<f64> {
        self.tuned.as_ref().map(|t| t.score)
    }

    pub fn best_params(&self) -> Option<&ParamSet> {
        self.tuned.as_ref().map(|t| &t.params)
    }

    /// Take ownership of the fitted model.
    pub fn into_tuned_model(self) -> Option<Box<dyn Estimator>> {
        self.tuned.map(|t| t.model)
    }

    pub fn direction(&self) -> ObjectiveDirection {
        self.metric.direction()
    }

    pub fn trials_completed(&self) -> usize {
        self.trials
            .iter()
            .filter(|t| t.status == TrialStatus::Completed)
            .count()
    }

    pub fn trials_failed(&self) -> usize {
        self.trials
            .iter()
            .filter(|t| t.status == TrialStatus::Failed)
            .count()
    }

    /// Serializable view without the model itself.
    pub fn summary(&self) -> TuningSummary {
        TuningSummary {
            tuning_method: self.tuning_method,
            tuning_param_grid: self.tuning_param_grid.clone(),
            cv: self.cv,
            n_jobs: self.n_jobs,
            tuned_model: self.tuned_model().map(|m| m.name().to_string()),
            tuned_model_params: self.best_params().cloned(),
            tuned_model_score: self.tuned_model_score(),
            tuned_model_evaluation_metric: self.tuned_model_evaluation_metric.clone(),
            direction: self.direction(),
            trials_completed: self.trials_completed(),
            trials_failed: self.trials_failed(),
        }
    }
}

/// JSON-friendly projection of a [`TuningReport`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TuningSummary {
    pub tuning_method: TuningMethod,
    pub tuning_param_grid: ParamGrid,
    pub cv: Option<usize>,
    pub n_jobs: i32,
    pub tuned_model: Option<String>,
    pub tuned_model_params: Option<ParamSet>,
    pub tuned_model_score: Option<f64>,
    pub tuned_model_evaluation_metric: String,
    pub direction: ObjectiveDirection,
    pub trials_completed: usize,
    pub trials_failed: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimators::RidgeRegression;
    use ft_types::ParamValue;

    fn report() -> TuningReport {
        TuningReport::new(
            TuningMethod::Grid,
            ParamGrid::new().with("alpha", [0.1, 1.0]),
            Some(3),
            -1,
            "MSE",
            EvalMetric::MeanSquaredError,
        )
    }

    #[test]
    fn method_names() {
        assert_eq!(TuningMethod::Grid.to_string(), "grid");
        assert_eq!("Bayesian".parse::<TuningMethod>().unwrap(), TuningMethod::Sequential);
        assert_eq!("Random".parse::<TuningMethod>().unwrap(), TuningMethod::Randomized);
        assert!("hyperband".parse::<TuningMethod>().unwrap_err().is_config());
    }

    #[test]
    fn empty_report_has_neither_model_nor_score() {
        let r = report();
        assert!(!r.is_tuned());
        assert!(r.tuned_model().is_none());
        assert!(r.tuned_model_score().is_none());
        assert_eq!(r.direction(), ObjectiveDirection::Minimize);
    }

    #[test]
    fn summary_serializes_without_model() {
        let mut r = report();
        let mut params = ParamSet::new();
        params.insert("alpha".into(), ParamValue::Float(0.1));
        r.tuned = Some(TunedModel {
            model: Box::new(RidgeRegression::default()),
            score: 0.25,
            params,
        });

        let json = serde_json::to_value(r.summary()).unwrap();
        assert_eq!(json["tuning_method"], "grid");
        assert_eq!(json["cv"], 3);
        assert_eq!(json["n_jobs"], -1);
        assert_eq!(json["tuned_model"], "RidgeRegression");
        assert_eq!(json["tuned_model_score"], 0.25);
        assert_eq!(json["tuned_model_evaluation_metric"], "MSE");
        assert_eq!(json["direction"], "minimize");
        assert_eq!(json["tuning_param_grid"]["alpha"][1], 1.0);
    }
}
