//! Tuning run configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use ft_types::{ConfigError, TuneResult};

use crate::metrics::EvalMetric;
use crate::report::TuningMethod;

/// Settings shared by every strategy. Fields a strategy does not use are
/// ignored by it (`cv` by sequential search, `n_trials` by grid search, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TuningConfig {
    /// Which search strategy to use: "grid", "randomized" or "sequential".
    pub method: TuningMethod,

    /// Metric selector, e.g. "accuracy" or "mean_squared_error".
    pub metric: String,

    /// Number of cross-validation folds for grid/randomized search.
    pub cv: usize,

    /// Parallel workers; zero or negative means all available cores.
    pub n_jobs: i32,

    /// Candidates for randomized search, trial budget for sequential search.
    pub n_trials: usize,

    /// Wall-clock limit for sequential search.
    pub timeout_secs: Option<u64>,

    /// Uniform warm-up trials before the sequential sampler starts exploiting.
    pub startup_trials: usize,

    /// Probability of a uniform draw once warm-up is over.
    pub exploration_weight: f64,

    /// Seed for randomized sampling and the sequential sampler.
    pub seed: Option<u64>,
}

impl Default for TuningConfig {
    fn default() -> Self {
        Self {
            method: TuningMethod::Grid,
            metric: EvalMetric::Accuracy.key().to_string(),
            cv: 3,
            n_jobs: -1,
            n_trials: 10,
            timeout_secs: None,
            startup_trials: 3,
            exploration_weight: 0.3,
            seed: None,
        }
    }
}

impl TuningConfig {
    pub fn new(method: TuningMethod, metric: &str) -> Self {
        Self {
            method,
            metric: metric.to_string(),
            ..Self::default()
        }
    }

    pub fn with_cv(mut self, folds: usize) -> Self {
        self.cv = folds;
        self
    }

    pub fn with_n_jobs(mut self, n_jobs: i32) -> Self {
        self.n_jobs = n_jobs;
        self
    }

    pub fn with_n_trials(mut self, n: usize) -> Self {
        self.n_trials = n;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = Some(timeout.as_secs().max(1));
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_exploration(mut self, startup_trials: usize, exploration_weight: f64) -> Self {
        self.startup_trials = startup_trials;
        self.exploration_weight = exploration_weight;
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    /// Parse the metric selector.
    pub fn eval_metric(&self) -> TuneResult<EvalMetric> {
        self.metric.parse()
    }

    pub fn validate(&self) -> TuneResult<()> {
        self.eval_metric()?;
        if self.method != TuningMethod::Sequential && self.cv < 2 {
            return Err(ConfigError::InvalidFolds { folds: self.cv }.into());
        }
        if self.method != TuningMethod::Grid && self.n_trials == 0 {
            return Err(ConfigError::InvalidArgument {
                message: "n_trials must be at least 1".to_string(),
            }
            .into());
        }
        if !(0.0..=1.0).contains(&self.exploration_weight) {
            return Err(ConfigError::InvalidArgument {
                message: format!(
                    "exploration_weight must be within [0, 1], got {}",
                    self.exploration_weight
                ),
            }
            .into());
        }
        Ok(())
    }

    pub fn from_json_str(json: &str) -> TuneResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> TuneResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ft_types::TuneError;
    use std::io::Write;

    #[test]
    fn defaults_match_documented_values() {
        let config = TuningConfig::default();
        assert_eq!(config.cv, 3);
        assert_eq!(config.n_jobs, -1);
        assert_eq!(config.n_trials, 10);
        assert!(config.timeout().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_json_uses_defaults() {
        let json = r#"{"method": "sequential", "metric": "mse", "timeout_secs": 30}"#;
        let config = TuningConfig::from_json_str(json).unwrap();
        assert_eq!(config.method, TuningMethod::Sequential);
        assert_eq!(config.eval_metric().unwrap(), EvalMetric::MeanSquaredError);
        assert_eq!(config.timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.n_trials, 10);
    }

    #[test]
    fn rejects_unknown_metric() {
        let err = TuningConfig::from_json_str(r#"{"metric": "auc"}"#).unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn rejects_single_fold_for_cross_validated_methods() {
        let config = TuningConfig::new(TuningMethod::Randomized, "r2").with_cv(1);
        assert!(matches!(
            config.validate(),
            Err(TuneError::Config(ConfigError::InvalidFolds { folds: 1 }))
        ));
        // Sequential search does not cross-validate.
        let config = TuningConfig::new(TuningMethod::Sequential, "r2").with_cv(1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn malformed_json_is_a_serialization_error() {
        let err = TuningConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, TuneError::Serialization(_)));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"method": "grid", "metric": "f1", "cv": 4, "n_jobs": 2}}"#).unwrap();
        let config = TuningConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.cv, 4);
        assert_eq!(config.n_jobs, 2);
        assert_eq!(config.metric, "f1");
    }
}
