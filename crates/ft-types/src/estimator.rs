//! The train/predict capability the tuner works against.

use std::fmt;

use crate::errors::TuneResult;
use crate::params::ParamSet;

/// A tunable model.
///
/// Implementations must be `Send + Sync` so candidates can be fitted on worker
/// threads.
pub trait Estimator: Send + Sync {
    /// Model type name, e.g. `"KNearestNeighbors"`.
    fn name(&self) -> &str;

    /// Fit on row-major features and labels, replacing any previous fit.
    fn fit(&mut self, features: &[Vec<f64>], labels: &[f64]) -> TuneResult<()>;

    /// Predict one label per row.
    fn predict(&self, features: &[Vec<f64>]) -> TuneResult<Vec<f64>>;

    /// Apply hyperparameters. Unknown names or wrongly typed values fail with
    /// `ModelError::InvalidParameter`.
    fn set_params(&mut self, params: &ParamSet) -> TuneResult<()>;

    /// Current hyperparameters.
    fn params(&self) -> ParamSet;

    /// Same type and hyperparameters, no fitted state.
    fn clone_unfitted(&self) -> Box<dyn Estimator>;

    /// Default-constructed instance of the same type.
    fn fresh(&self) -> Box<dyn Estimator>;
}

impl fmt::Debug for dyn Estimator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Estimator")
            .field("name", &self.name())
            .field("params", &self.params())
            .finish()
    }
}
