//! # ft-tuner
//!
//! Hyperparameter tuning for FlexTune models.
//!
//! Provides exhaustive grid search and randomized search (both k-fold
//! cross-validated), a sequential suggest/report search with an
//! explore/exploit sampler, the held-out metric evaluator, and the
//! [`TuningReport`] every strategy returns.

mod config;
mod cv;
mod estimators;
mod logging;
mod metrics;
mod report;
mod sampler;
mod search;
mod trial;
mod tuner;

pub use config::TuningConfig;
pub use cv::{cross_val_score, CvScore, FoldSplit, KFold};
pub use estimators::{KNearestNeighbors, KnnTask, NeighborWeights, RidgeRegression};
pub use logging::init_tracing;
pub use metrics::{EvalMetric, MetricEvaluator, MetricTask};
pub use report::{TunedModel, TuningMethod, TuningReport, TuningSummary};
pub use sampler::SequentialSampler;
pub use search::{
    make_rng, validate_param_grid, GridSearch, ParameterDef, RandomSearch, SearchSpace,
    SearchStrategy, SuggestionRule,
};
pub use trial::{Incumbent, IncumbentUpdate, ObjectiveDirection, Trial, TrialStatus};
pub use tuner::{resolve_n_jobs, ModelTuner, ProblemType};

pub use ft_types::{
    Dataset, Estimator, ParamGrid, ParamSet, ParamValue, TrainTestSplit, TuneError, TuneResult,
};
