//! Trial tracking and incumbent (best-so-far) management.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use ft_types::{Estimator, ParamSet};

use crate::report::TunedModel;

/// Whether we are maximizing or minimizing the objective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectiveDirection {
    Maximize,
    Minimize,
}

impl Default for ObjectiveDirection {
    fn default() -> Self {
        Self::Maximize
    }
}

impl ObjectiveDirection {
    /// Strict improvement: equal scores never count.
    pub fn improves(&self, candidate: f64, incumbent: f64) -> bool {
        match self {
            Self::Maximize => candidate > incumbent,
            Self::Minimize => candidate < incumbent,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Maximize => "maximize",
            Self::Minimize => "minimize",
        }
    }
}

// ---------------------------------------------------------------------------
// Individual trial
// ---------------------------------------------------------------------------

/// A single evaluated parameter assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trial {
    pub id: Uuid,
    pub trial_number: usize,
    pub parameters: ParamSet,
    pub status: TrialStatus,
    pub score: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub worker_id: Option<String>,
    pub error: Option<String>,
}

impl Trial {
    pub fn new(trial_number: usize, parameters: ParamSet) -> Self {
        Self {
            id: Uuid::new_v4(),
            trial_number,
            parameters,
            status: TrialStatus::Pending,
            score: None,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
            worker_id: None,
            error: None,
        }
    }

    pub fn mark_running(&mut self, worker_id: Option<String>) {
        self.status = TrialStatus::Running;
        self.started_at = Some(Utc::now());
        self.worker_id = worker_id;
    }

    pub fn mark_completed(&mut self, score: f64) {
        self.status = TrialStatus::Completed;
        self.finished_at = Some(Utc::now());
        self.score = Some(score);
    }

    pub fn mark_failed(&mut self, error: String) {
        self.status = TrialStatus::Failed;
        self.finished_at = Some(Utc::now());
        self.error = Some(error);
    }

    pub fn duration_ms(&self) -> Option<i64> {
        match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrialStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

// ---------------------------------------------------------------------------
// Incumbent
// ---------------------------------------------------------------------------

/// One change of the incumbent, in arrival order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IncumbentUpdate {
    pub trial_number: usize,
    pub score: f64,
}

/// Best-so-far tracker.
///
/// Owned by a single aggregator; candidates are offered in arrival order and
/// only a strict improvement replaces the current best, so the earliest of
/// equally scoring candidates is kept.
#[derive(Debug)]
pub struct Incumbent {
    direction: ObjectiveDirection,
    best: Option<TunedModel>,
    best_trial: Option<usize>,
    history: Vec<IncumbentUpdate>,
}

impl Incumbent {
    pub fn new(direction: ObjectiveDirection) -> Self {
        Self {
            direction,
            best: None,
            best_trial: None,
            history: Vec::new(),
        }
    }

    pub fn direction(&self) -> ObjectiveDirection {
        self.direction
    }

    pub fn best_score(&self) -> Option<f64> {
        self.best.as_ref().map(|b| b.score)
    }

    pub fn best_trial(&self) -> Option<usize> {
        self.best_trial
    }

    /// Offer a scored model. Returns `true` when it became the incumbent.
    pub fn offer(
        &mut self,
        trial_number: usize,
        score: f64,
        params: ParamSet,
        model: Box<dyn Estimator>,
    ) -> bool {
        if score.is_nan() {
            return false;
        }
        let replace = match &self.best {
            None => true,
            Some(current) => self.direction.improves(score, current.score),
        };
        if replace {
            self.best = Some(TunedModel {
                model,
                score,
                params,
            });
            self.best_trial = Some(trial_number);
            self.history.push(IncumbentUpdate {
                trial_number,
                score,
            });
        }
        replace
    }

    /// Incumbent changes in the order they happened.
    pub fn history(&self) -> &[IncumbentUpdate] {
        &self.history
    }

    pub fn into_best(self) -> Option<TunedModel> {
        self.best
    }
}
