//! Search space definitions and parameter sweep strategies.
//!
//! A declared [`ParamGrid`] is consumed two ways: grid and randomized search
//! enumerate (a subset of) its Cartesian product, while sequential search
//! turns each parameter into a [`SuggestionRule`] via [`SearchSpace::infer`].

use rand::seq::index;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::warn;

use ft_types::{config_error, ConfigError, ParamGrid, ParamSet, ParamValue, TuneResult};

/// Seeded generator when `seed` is set, entropy-seeded otherwise.
pub fn make_rng(seed: Option<u64>) -> ChaCha8Rng {
    match seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    }
}

/// Check a declared grid before searching it.
///
/// The grid must declare at least one parameter and every parameter needs at
/// least one candidate. The grid is returned as-is: no "quick" reduction of
/// the candidate lists is applied.
pub fn validate_param_grid(grid: &ParamGrid) -> TuneResult<&ParamGrid> {
    if grid.is_empty() {
        return Err(ConfigError::EmptyGrid.into());
    }
    if let Some((name, _)) = grid.iter().find(|(_, values)| values.is_empty()) {
        return Err(ConfigError::EmptyCandidates {
            parameter: name.to_string(),
        }
        .into());
    }
    Ok(grid)
}

// ---------------------------------------------------------------------------
// Suggestion rules for sequential search
// ---------------------------------------------------------------------------

/// Describes how a parameter is sampled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SuggestionRule {
    /// Pick one of the declared values.
    Categorical { values: Vec<ParamValue> },
    /// Integer range [low, high] inclusive.
    IntRange { low: i64, high: i64 },
    /// Continuous uniform range [low, high].
    FloatRange { low: f64, high: f64 },
}

impl SuggestionRule {
    /// Infer the rule from the first (and for ranges, the last) declared
    /// value. Interior values of numeric candidates only matter through the
    /// endpoints.
    pub fn infer(name: &str, values: &[ParamValue]) -> TuneResult<Self> {
        let (first, last) = match (values.first(), values.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => {
                return Err(ConfigError::EmptyCandidates {
                    parameter: name.to_string(),
                }
                .into())
            }
        };

        let unsupported = |message: String| ConfigError::UnsupportedParameterType {
            parameter: name.to_string(),
            message,
        };

        let rule = match first {
            ParamValue::Str(_) | ParamValue::Bool(_) => Self::Categorical {
                values: values.to_vec(),
            },
            ParamValue::Int(low) => match last {
                ParamValue::Int(high) => Self::IntRange {
                    low: *low,
                    high: *high,
                },
                other => {
                    return Err(unsupported(format!(
                        "integer range must end with an int, found {}",
                        other.type_name()
                    ))
                    .into())
                }
            },
            ParamValue::Float(low) => match last.as_f64() {
                Some(high) => Self::FloatRange { low: *low, high },
                None => {
                    return Err(unsupported(format!(
                        "float range must end with a number, found {}",
                        last.type_name()
                    ))
                    .into())
                }
            },
            ParamValue::Null => {
                return Err(unsupported(
                    "expected one of 'str', 'bool', 'int', 'float', found null".to_string(),
                )
                .into())
            }
        };

        match &rule {
            Self::IntRange { low, high } if low > high => {
                Err(unsupported(format!("range is inverted: {low} > {high}")).into())
            }
            // The width must be finite too, or uniform sampling overflows.
            Self::FloatRange { low, high } if !(high - low).is_finite() || low > high => {
                Err(unsupported(format!("invalid range [{low}, {high}]")).into())
            }
            _ => Ok(rule),
        }
    }

    /// Draw one value.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> ParamValue {
        match self {
            Self::Categorical { values } => values[rng.gen_range(0..values.len())].clone(),
            Self::IntRange { low, high } => ParamValue::Int(rng.gen_range(*low..=*high)),
            Self::FloatRange { low, high } => {
                if low == high {
                    ParamValue::Float(*low)
                } else {
                    ParamValue::Float(rng.gen_range(*low..=*high))
                }
            }
        }
    }

    /// Whether `value` could have been produced by this rule.
    pub fn contains(&self, value: &ParamValue) -> bool {
        match (self, value) {
            (Self::Categorical { values }, v) => values.contains(v),
            (Self::IntRange { low, high }, ParamValue::Int(v)) => low <= v && v <= high,
            (Self::FloatRange { low, high }, ParamValue::Float(v)) => low <= v && v <= high,
            _ => false,
        }
    }
}

/// A single parameter dimension in the search space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDef {
    pub name: String,
    pub rule: SuggestionRule,
}

/// The sequential search space: one rule per parameter, in declaration order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SearchSpace {
    pub parameters: Vec<ParameterDef>,
}

impl SearchSpace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build rules for every declared parameter. Fails on the first
    /// unsupported declaration, before anything is sampled.
    pub fn infer(grid: &ParamGrid) -> TuneResult<Self> {
        let grid = validate_param_grid(grid)?;
        let parameters = grid
            .iter()
            .map(|(name, values)| {
                Ok(ParameterDef {
                    name: name.to_string(),
                    rule: SuggestionRule::infer(name, values)?,
                })
            })
            .collect::<TuneResult<Vec<_>>>()?;
        Ok(Self { parameters })
    }

    pub fn add_int(mut self, name: impl Into<String>, low: i64, high: i64) -> Self {
        self.parameters.push(ParameterDef {
            name: name.into(),
            rule: SuggestionRule::IntRange { low, high },
        });
        self
    }

    pub fn add_float(mut self, name: impl Into<String>, low: f64, high: f64) -> Self {
        self.parameters.push(ParameterDef {
            name: name.into(),
            rule: SuggestionRule::FloatRange { low, high },
        });
        self
    }

    pub fn add_choice(mut self, name: impl Into<String>, values: Vec<ParamValue>) -> Self {
        self.parameters.push(ParameterDef {
            name: name.into(),
            rule: SuggestionRule::Categorical { values },
        });
        self
    }

    pub fn rule(&self, name: &str) -> Option<&SuggestionRule> {
        self.parameters
            .iter()
            .find(|p| p.name == name)
            .map(|p| &p.rule)
    }

    /// One independent draw per parameter.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> ParamSet {
        self.parameters
            .iter()
            .map(|p| (p.name.clone(), p.rule.sample(rng)))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Search strategies
// ---------------------------------------------------------------------------

/// Common trait for all search strategies.
pub trait SearchStrategy: Send {
    /// Generate the next batch of parameter combinations to evaluate.
    fn suggest(&mut self, count: usize) -> Vec<ParamSet>;

    /// Report completed trial results so adaptive strategies can learn.
    fn report(&mut self, _params: &ParamSet, _objective: f64) {}

    /// Human-readable strategy name.
    fn name(&self) -> &str;
}

// ---- Grid search ----

/// Exhaustive walk over the Cartesian product of a grid. The last declared
/// parameter varies fastest.
#[derive(Debug, Clone)]
pub struct GridSearch {
    grid: ParamGrid,
    total: usize,
    cursor: usize,
}

impl GridSearch {
    pub fn new(grid: ParamGrid) -> TuneResult<Self> {
        validate_param_grid(&grid)?;
        let total = grid
            .combination_count()
            .ok_or_else(|| config_error!("parameter grid is too large to enumerate"))?;
        Ok(Self {
            grid,
            total,
            cursor: 0,
        })
    }

    /// Number of combinations in the grid.
    pub fn len(&self) -> usize {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// The combination at `index` in enumeration order.
    pub fn combination_at(&self, mut index: usize) -> ParamSet {
        let axes: Vec<(&str, &[ParamValue])> = self.grid.iter().collect();
        let mut combo = ParamSet::new();
        for (name, values) in axes.iter().rev() {
            combo.insert(name.to_string(), values[index % values.len()].clone());
            index /= values.len();
        }
        combo
    }

    /// Every combination, in enumeration order.
    pub fn combinations(&self) -> Vec<ParamSet> {
        (0..self.total).map(|i| self.combination_at(i)).collect()
    }
}

impl SearchStrategy for GridSearch {
    fn suggest(&mut self, count: usize) -> Vec<ParamSet> {
        let end = (self.cursor + count).min(self.total);
        let batch = (self.cursor..end).map(|i| self.combination_at(i)).collect();
        self.cursor = end;
        batch
    }

    fn name(&self) -> &str {
        "grid"
    }
}

// ---- Random search ----

/// Random draws from a grid without replacement.
#[derive(Debug, Clone)]
pub struct RandomSearch {
    grid: GridSearch,
    remaining: Vec<usize>,
}

impl RandomSearch {
    /// Plan `n_iter` distinct combinations. If the grid has fewer
    /// combinations, every combination is planned once.
    pub fn new(grid: ParamGrid, n_iter: usize, seed: Option<u64>) -> TuneResult<Self> {
        let grid = GridSearch::new(grid)?;
        let total = grid.len();
        if n_iter >= total {
            if n_iter > total {
                warn!(
                    n_iter,
                    grid_size = total,
                    "n_trials exceeds the grid size; evaluating the full grid instead"
                );
            }
            return Ok(Self {
                remaining: (0..total).collect(),
                grid,
            });
        }
        let mut rng = make_rng(seed);
        let remaining = index::sample(&mut rng, total, n_iter).into_vec();
        Ok(Self { grid, remaining })
    }

    /// Number of combinations still to be suggested.
    pub fn planned(&self) -> usize {
        self.remaining.len()
    }
}

impl SearchStrategy for RandomSearch {
    fn suggest(&mut self, count: usize) -> Vec<ParamSet> {
        let take = count.min(self.remaining.len());
        self.remaining
            .drain(..take)
            .map(|i| self.grid.combination_at(i))
            .collect::<Vec<_>>()
    }

    fn name(&self) -> &str {
        "randomized"
    }
}
