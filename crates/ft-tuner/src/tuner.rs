//! The tuning orchestrator.
//!
//! [`ModelTuner`] owns a train/test split and runs one of three strategies per
//! call:
//!
//! * grid search: every combination, k-fold cross-validated on train+test;
//! * randomized search: `n_trials` distinct combinations, same scoring;
//! * sequential search: `n_trials` sampled assignments, each fitted on a fresh
//!   default model on the train rows and scored on the test rows.
//!
//! Every strategy re-scores its winner on the held-out test split and returns
//! a [`TuningReport`].

use crossbeam_channel::{unbounded, Sender};
use parking_lot::Mutex;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use ft_types::{
    execution_error, format_params, ConfigError, Dataset, Estimator, ParamGrid, ParamSet,
    TrainTestSplit, TuneError, TuneResult,
};

use crate::config::TuningConfig;
use crate::cv::{cross_val_score, CvScore, KFold};
use crate::metrics::{EvalMetric, MetricEvaluator, MetricTask};
use crate::report::{TunedModel, TuningMethod, TuningReport};
use crate::sampler::SequentialSampler;
use crate::search::{GridSearch, RandomSearch, SearchSpace, SearchStrategy};
use crate::trial::{Incumbent, ObjectiveDirection, Trial};

/// The kind of problem the caller is solving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProblemType {
    Classification,
    Regression,
}

impl ProblemType {
    pub fn default_metric(&self) -> EvalMetric {
        match self {
            Self::Classification => EvalMetric::Accuracy,
            Self::Regression => EvalMetric::R2,
        }
    }

    fn accepts(&self, metric: EvalMetric) -> bool {
        matches!(
            (self, metric.task()),
            (Self::Classification, MetricTask::Classification)
                | (Self::Regression, MetricTask::Regression)
        )
    }
}

impl fmt::Display for ProblemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Classification => f.write_str("Classification"),
            Self::Regression => f.write_str("Regression"),
        }
    }
}

impl FromStr for ProblemType {
    type Err = TuneError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "classification" => Ok(Self::Classification),
            "regression" => Ok(Self::Regression),
            _ => Err(ConfigError::InvalidArgument {
                message: format!(
                    "unknown problem type '{s}', expected 'classification' or 'regression'"
                ),
            }
            .into()),
        }
    }
}

/// Worker count for `n_jobs`; zero or negative means every available core.
pub fn resolve_n_jobs(n_jobs: i32) -> usize {
    if n_jobs > 0 {
        n_jobs as usize
    } else {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }
}

fn build_pool(method: TuningMethod, threads: usize) -> TuneResult<ThreadPool> {
    ThreadPoolBuilder::new()
        .num_threads(threads.max(1))
        .thread_name(move |i| format!("ft-{method}-{i}"))
        .build()
        .map_err(|e| execution_error!(method, "failed to start worker pool: {e}"))
}

/// Sampler knobs for sequential search.
#[derive(Debug, Clone, Copy, PartialEq)]
struct SamplerOptions {
    seed: Option<u64>,
    startup_trials: usize,
    exploration_weight: f64,
}

/// Hyperparameter tuner over a fixed train/test split.
#[derive(Debug, Clone)]
pub struct ModelTuner {
    problem_type: ProblemType,
    split: TrainTestSplit,
    combined: Dataset,
    options: SamplerOptions,
}

impl ModelTuner {
    pub fn new(problem_type: ProblemType, split: TrainTestSplit) -> Self {
        let combined = split.combined();
        Self {
            problem_type,
            split,
            combined,
            options: SamplerOptions {
                seed: None,
                startup_trials: 3,
                exploration_weight: 0.3,
            },
        }
    }

    /// Seed randomized sampling and the sequential sampler.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.options.seed = Some(seed);
        self
    }

    /// Warm-up trial count and exploration probability for sequential search.
    pub fn with_exploration(mut self, startup_trials: usize, exploration_weight: f64) -> Self {
        self.options.startup_trials = startup_trials;
        self.options.exploration_weight = exploration_weight;
        self
    }

    pub fn problem_type(&self) -> ProblemType {
        self.problem_type
    }

    pub fn split(&self) -> &TrainTestSplit {
        &self.split
    }

    /// Score a fitted model on the test split.
    pub fn evaluate(&self, model: &dyn Estimator, metric: &str) -> TuneResult<f64> {
        MetricEvaluator::new(&self.split.test).evaluate_named(model, metric)
    }

    fn resolve_metric(&self, selector: &str) -> TuneResult<EvalMetric> {
        let metric: EvalMetric = selector.parse().map_err(|e: TuneError| {
            error!("Error while evaluating the model during tuning: {e}");
            e
        })?;
        if !self.problem_type.accepts(metric) {
            warn!(
                metric = %metric,
                problem_type = %self.problem_type,
                "metric does not match the problem type"
            );
        }
        Ok(metric)
    }

    /// Run the strategy named in `config`.
    pub fn tune(
        &self,
        model: &dyn Estimator,
        grid: &ParamGrid,
        config: &TuningConfig,
    ) -> TuneResult<TuningReport> {
        config.validate()?;
        match config.method {
            TuningMethod::Grid => {
                self.grid_search(model, grid, &config.metric, config.cv, config.n_jobs)
            }
            TuningMethod::Randomized => self.random_search_with(
                model,
                grid,
                &config.metric,
                config.n_trials,
                config.cv,
                config.n_jobs,
                config.seed.or(self.options.seed),
            ),
            TuningMethod::Sequential => self.sequential_search_with(
                model,
                grid,
                &config.metric,
                config.n_trials,
                config.timeout(),
                config.n_jobs,
                SamplerOptions {
                    seed: config.seed.or(self.options.seed),
                    startup_trials: config.startup_trials,
                    exploration_weight: config.exploration_weight,
                },
            ),
        }
    }

    // ---- grid / randomized ----

    /// Exhaustive cross-validated search over every combination in `grid`.
    ///
    /// Configuration problems (unknown metric, empty grid, fewer than two
    /// folds) are returned as [`TuneError::Config`]. Any failure while
    /// fitting candidates is logged and returned as [`TuneError::Execution`].
    pub fn grid_search(
        &self,
        model: &dyn Estimator,
        grid: &ParamGrid,
        metric: &str,
        cv: usize,
        n_jobs: i32,
    ) -> TuneResult<TuningReport> {
        let eval_metric = self.resolve_metric(metric)?;
        let kfold = KFold::new(cv)?;
        let mut strategy = GridSearch::new(grid.clone())?;
        let candidates = strategy.suggest(strategy.len());
        debug!(strategy = strategy.name(), planned = candidates.len(), "candidates planned");

        let mut report = TuningReport::new(
            TuningMethod::Grid,
            grid.clone(),
            Some(cv),
            n_jobs,
            metric,
            eval_metric,
        );
        self.run_cross_validated(&mut report, model, candidates, &kfold, eval_metric, n_jobs)?;
        Ok(report)
    }

    /// Cross-validated search over `n_trials` distinct combinations drawn
    /// from `grid`. An `n_trials` at or above the grid size evaluates the
    /// whole grid once.
    pub fn random_search(
        &self,
        model: &dyn Estimator,
        grid: &ParamGrid,
        metric: &str,
        n_trials: usize,
        cv: usize,
        n_jobs: i32,
    ) -> TuneResult<TuningReport> {
        self.random_search_with(model, grid, metric, n_trials, cv, n_jobs, self.options.seed)
    }

    #[allow(clippy::too_many_arguments)]
    fn random_search_with(
        &self,
        model: &dyn Estimator,
        grid: &ParamGrid,
        metric: &str,
        n_trials: usize,
        cv: usize,
        n_jobs: i32,
        seed: Option<u64>,
    ) -> TuneResult<TuningReport> {
        let eval_metric = self.resolve_metric(metric)?;
        let kfold = KFold::new(cv)?;
        if n_trials == 0 {
            return Err(ConfigError::InvalidArgument {
                message: "n_trials must be at least 1".to_string(),
            }
            .into());
        }
        let mut strategy = RandomSearch::new(grid.clone(), n_trials, seed)?;
        let candidates = strategy.suggest(strategy.planned());
        debug!(strategy = strategy.name(), planned = candidates.len(), "candidates planned");

        let mut report = TuningReport::new(
            TuningMethod::Randomized,
            grid.clone(),
            Some(cv),
            n_jobs,
            metric,
            eval_metric,
        );
        self.run_cross_validated(&mut report, model, candidates, &kfold, eval_metric, n_jobs)?;
        Ok(report)
    }

    /// Score `candidates`, refit the winner on train+test and re-score it on
    /// the test split. Non-configuration failures are logged and converted
    /// to execution errors.
    fn run_cross_validated(
        &self,
        report: &mut TuningReport,
        model: &dyn Estimator,
        candidates: Vec<ParamSet>,
        kfold: &KFold,
        metric: EvalMetric,
        n_jobs: i32,
    ) -> TuneResult<()> {
        let method = report.tuning_method;
        info!(
            "Fitting {} folds for each of {} candidates, totalling {} fits ({} search on {})",
            kfold.folds(),
            candidates.len(),
            kfold.folds() * candidates.len(),
            method,
            model.name()
        );

        match self.search_candidates(model, candidates, kfold, metric, n_jobs, method) {
            Ok((tuned, trials)) => {
                info!(
                    "{method} search finished: best params {} scored {metric}={:.6} on test",
                    format_params(&tuned.params),
                    tuned.score
                );
                report.tuned = Some(tuned);
                report.trials = trials;
                Ok(())
            }
            Err(e) if e.is_config() => Err(e),
            Err(e) => {
                error!("Error while tuning the model with {method} search, Error: {e}");
                Err(e.into_execution(method.as_str()))
            }
        }
    }

    fn search_candidates(
        &self,
        model: &dyn Estimator,
        candidates: Vec<ParamSet>,
        kfold: &KFold,
        metric: EvalMetric,
        n_jobs: i32,
        method: TuningMethod,
    ) -> TuneResult<(TunedModel, Vec<Trial>)> {
        let pool = build_pool(method, resolve_n_jobs(n_jobs).min(candidates.len()))?;
        let data = &self.combined;

        let scored: Vec<TuneResult<CvScore>> = pool.install(|| {
            candidates
                .par_iter()
                .map(|params| cross_val_score(model, params, data, kfold, metric))
                .collect()
        });

        let mut trials = Vec::with_capacity(scored.len());
        let mut best: Option<CvScore> = None;
        for (number, result) in scored.into_iter().enumerate() {
            let cv = result?;
            debug!(
                "candidate {number}: {} mean={:.6} std={:.6}",
                format_params(&cv.params),
                cv.mean,
                cv.std
            );

            let mut trial = Trial::new(number, cv.params.clone());
            trial.mark_completed(match metric.direction() {
                ObjectiveDirection::Maximize => cv.mean,
                ObjectiveDirection::Minimize => -cv.mean,
            });
            trials.push(trial);

            // cv.mean is greater-is-better; earliest candidate wins ties.
            let better = best.as_ref().map_or(true, |b| cv.mean > b.mean);
            if better {
                best = Some(cv);
            }
        }

        let best = best.ok_or_else(|| execution_error!(method, "no candidate was evaluated"))?;
        let mut refit = model.clone_unfitted();
        refit.set_params(&best.params)?;
        refit.fit(&data.features, &data.labels)?;
        let score = MetricEvaluator::new(&self.split.test).evaluate(refit.as_ref(), metric)?;

        Ok((
            TunedModel {
                model: refit,
                score,
                params: best.params,
            },
            trials,
        ))
    }

    // ---- sequential ----

    /// Iterative suggest/report search.
    ///
    /// Each trial fits `model.fresh()` with sampled parameters on the train
    /// rows and scores it on the test rows. Failing trials are logged and
    /// skipped. The run ends after `n_trials` trials or once `timeout` has
    /// elapsed, whichever comes first; trials already running finish.
    pub fn sequential_search(
        &self,
        model: &dyn Estimator,
        grid: &ParamGrid,
        metric: &str,
        n_trials: usize,
        timeout: Option<Duration>,
        n_jobs: i32,
    ) -> TuneResult<TuningReport> {
        self.sequential_search_with(model, grid, metric, n_trials, timeout, n_jobs, self.options)
    }

    #[allow(clippy::too_many_arguments)]
    fn sequential_search_with(
        &self,
        model: &dyn Estimator,
        grid: &ParamGrid,
        metric: &str,
        n_trials: usize,
        timeout: Option<Duration>,
        n_jobs: i32,
        options: SamplerOptions,
    ) -> TuneResult<TuningReport> {
        let eval_metric = self.resolve_metric(metric)?;
        let space = SearchSpace::infer(grid).map_err(|e| {
            error!("Unsupported parameter grid for sequential tuning: {e}");
            e
        })?;
        if n_trials == 0 {
            return Err(ConfigError::InvalidArgument {
                message: "n_trials must be at least 1".to_string(),
            }
            .into());
        }

        let direction = eval_metric.direction();
        let sampler = Mutex::new(
            SequentialSampler::new(space, direction)
                .with_seed(options.seed)
                .with_startup_trials(options.startup_trials)
                .with_exploration_weight(options.exploration_weight),
        );
        let workers = resolve_n_jobs(n_jobs).min(n_trials);
        let pool = build_pool(TuningMethod::Sequential, workers)?;

        info!(
            "Starting {} search on {}: {} trials, {} workers, direction={}",
            sampler.lock().name(),
            model.name(),
            n_trials,
            workers,
            direction.as_str()
        );

        let ctx = TrialContext {
            model,
            train: &self.split.train,
            evaluator: MetricEvaluator::new(&self.split.test),
            metric: eval_metric,
            sampler: &sampler,
            next_trial: AtomicUsize::new(0),
            n_trials,
            deadline: timeout.map(|t| Instant::now() + t),
        };

        let (tx, rx) = unbounded::<TrialOutcome>();
        let mut incumbent = Incumbent::new(direction);
        let mut trials = Vec::new();

        pool.in_place_scope(|scope| {
            for worker in 0..workers {
                let tx = tx.clone();
                let ctx = &ctx;
                scope.spawn(move |_| ctx.run_worker(worker, tx));
            }
            drop(tx);

            // Single owner of the incumbent; outcomes arrive in completion order.
            for outcome in rx.iter() {
                let TrialOutcome { trial, model } = outcome;
                if let (Some(model), Some(score)) = (model, trial.score) {
                    let number = trial.trial_number;
                    if incumbent.offer(number, score, trial.parameters.clone(), model) {
                        info!(
                            "Trial {number} is the new best: {eval_metric}={score:.6} with {}",
                            format_params(&trial.parameters)
                        );
                    }
                }
                trials.push(trial);
            }
        });

        let mut report = TuningReport::new(
            TuningMethod::Sequential,
            grid.clone(),
            None,
            n_jobs,
            metric,
            eval_metric,
        );
        report.incumbent_history = incumbent.history().to_vec();
        report.trials = trials;
        report.tuned = incumbent.into_best();

        if report.tuned.is_none() {
            let err = execution_error!(
                TuningMethod::Sequential,
                "none of the {} started trials completed",
                report.trials.len()
            );
            error!("{err}");
            return Err(err);
        }

        info!(
            "Sequential search finished: {} completed, {} failed, best {eval_metric}={:.6}",
            report.trials_completed(),
            report.trials_failed(),
            report.tuned_model_score().unwrap_or(f64::NAN)
        );
        Ok(report)
    }
}

struct TrialOutcome {
    trial: Trial,
    model: Option<Box<dyn Estimator>>,
}

/// State shared by sequential-search workers.
struct TrialContext<'a> {
    model: &'a dyn Estimator,
    train: &'a Dataset,
    evaluator: MetricEvaluator<'a>,
    metric: EvalMetric,
    sampler: &'a Mutex<SequentialSampler>,
    next_trial: AtomicUsize,
    n_trials: usize,
    deadline: Option<Instant>,
}

impl TrialContext<'_> {
    fn run_worker(&self, worker: usize, tx: Sender<TrialOutcome>) {
        loop {
            if self.deadline.is_some_and(|d| Instant::now() >= d) {
                debug!(worker, "timeout reached, worker stopping");
                break;
            }
            let number = self.next_trial.fetch_add(1, Ordering::SeqCst);
            if number >= self.n_trials {
                break;
            }

            let params = self
                .sampler
                .lock()
                .suggest(1)
                .into_iter()
                .next()
                .unwrap_or_default();
            let mut trial = Trial::new(number, params);
            trial.mark_running(Some(format!("worker-{worker}")));

            let model = match self.fit_and_score(&trial.parameters) {
                Ok((model, score)) => {
                    self.sampler.lock().report(&trial.parameters, score);
                    trial.mark_completed(score);
                    debug!(trial = number, score, "trial completed");
                    Some(model)
                }
                Err(e) => {
                    warn!(
                        "Trial {number} failed with {}: {e}",
                        format_params(&trial.parameters)
                    );
                    trial.mark_failed(e.to_string());
                    None
                }
            };

            if tx.send(TrialOutcome { trial, model }).is_err() {
                break;
            }
        }
    }

    fn fit_and_score(&self, params: &ParamSet) -> TuneResult<(Box<dyn Estimator>, f64)> {
        let mut model = self.model.fresh();
        model.set_params(params)?;
        model.fit(&self.train.features, &self.train.labels)?;
        let score = self.evaluator.evaluate(model.as_ref(), self.metric)?;
        Ok((model, score))
    }
}
