//! Suggest/report sampler driving sequential search.
//!
//! The sampler keeps every reported `(params, score)` pair. After a few
//! uniform warm-up draws it either explores (uniform draw) or exploits by
//! perturbing the best observed assignment within each parameter's bounds.

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use std::cmp::Ordering;

use ft_types::{ParamSet, ParamValue};

use crate::search::{make_rng, SearchSpace, SearchStrategy, SuggestionRule};
use crate::trial::ObjectiveDirection;

#[derive(Debug, Clone)]
pub struct SequentialSampler {
    space: SearchSpace,
    direction: ObjectiveDirection,
    observations: Vec<(ParamSet, f64)>,
    exploration_weight: f64,
    startup_trials: usize,
    rng: ChaCha8Rng,
}

impl SequentialSampler {
    pub fn new(space: SearchSpace, direction: ObjectiveDirection) -> Self {
        Self {
            space,
            direction,
            observations: Vec::new(),
            exploration_weight: 0.3,
            startup_trials: 3,
            rng: make_rng(None),
        }
    }

    pub fn with_exploration_weight(mut self, weight: f64) -> Self {
        self.exploration_weight = weight.clamp(0.0, 1.0);
        self
    }

    pub fn with_startup_trials(mut self, n: usize) -> Self {
        self.startup_trials = n;
        self
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.rng = make_rng(seed);
        self
    }

    pub fn direction(&self) -> ObjectiveDirection {
        self.direction
    }

    pub fn observations(&self) -> &[(ParamSet, f64)] {
        &self.observations
    }

    /// Best reported assignment according to the direction.
    fn best_observation(&self) -> Option<&ParamSet> {
        let cmp = |a: &&(ParamSet, f64), b: &&(ParamSet, f64)| {
            a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal)
        };
        let best = match self.direction {
            ObjectiveDirection::Maximize => self.observations.iter().max_by(cmp),
            ObjectiveDirection::Minimize => self.observations.iter().min_by(cmp),
        };
        best.map(|(params, _)| params)
    }

    /// Pure exploration sample.
    fn explore(&mut self) -> ParamSet {
        self.space.sample(&mut self.rng)
    }

    /// Exploitation: perturb the best-known point.
    fn exploit(&mut self) -> ParamSet {
        let base = match self.best_observation().cloned() {
            Some(params) => params,
            None => return self.explore(),
        };

        let mut perturbed = ParamSet::new();
        for param in &self.space.parameters {
            let value = match (&param.rule, base.get(&param.name)) {
                (SuggestionRule::FloatRange { low, high }, Some(ParamValue::Float(v))) => {
                    let range = high - low;
                    let noise = if range > 0.0 {
                        self.rng.gen_range(-0.1..0.1) * range
                    } else {
                        0.0
                    };
                    ParamValue::Float((v + noise).clamp(*low, *high))
                }
                (SuggestionRule::IntRange { low, high }, Some(ParamValue::Int(v))) => {
                    let step = (high.saturating_sub(*low) / 10).max(1);
                    let delta: i64 = self.rng.gen_range(-step..=step);
                    ParamValue::Int(v.saturating_add(delta).clamp(*low, *high))
                }
                // Fall back to random for choices or missing base
                (rule, _) => rule.sample(&mut self.rng),
            };
            perturbed.insert(param.name.clone(), value);
        }
        perturbed
    }

    fn next(&mut self) -> ParamSet {
        let warming_up = self.observations.len() < self.startup_trials;
        if warming_up || self.rng.gen::<f64>() < self.exploration_weight {
            self.explore()
        } else {
            self.exploit()
        }
    }
}

impl SearchStrategy for SequentialSampler {
    fn suggest(&mut self, count: usize) -> Vec<ParamSet> {
        (0..count).map(|_| self.next()).collect()
    }

    fn report(&mut self, params: &ParamSet, objective: f64) {
        if objective.is_finite() {
            self.observations.push((params.clone(), objective));
        }
    }

    fn name(&self) -> &str {
        "sequential"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ft_types::ParamGrid;

    fn space() -> SearchSpace {
        SearchSpace::infer(
            &ParamGrid::new()
                .with("n_estimators", [10, 50, 100])
                .with("learning_rate", [0.01, 0.3])
                .with("criterion", ["gini", "entropy"]),
        )
        .unwrap()
    }

    #[test]
    fn starts_with_exploration() {
        let mut sampler = SequentialSampler::new(space(), ObjectiveDirection::Maximize)
            .with_seed(Some(1));
        let suggestions = sampler.suggest(10);
        assert_eq!(suggestions.len(), 10);
        for params in &suggestions {
            assert_eq!(params.len(), 3);
        }
    }

    #[test]
    fn suggestions_respect_rules() {
        let space = space();
        let mut sampler = SequentialSampler::new(space.clone(), ObjectiveDirection::Minimize)
            .with_seed(Some(5))
            .with_startup_trials(0)
            .with_exploration_weight(0.0);
        let mut seed_params = ParamSet::new();
        seed_params.insert("n_estimators".into(), ParamValue::Int(100));
        seed_params.insert("learning_rate".into(), ParamValue::Float(0.3));
        seed_params.insert("criterion".into(), "gini".into());
        sampler.report(&seed_params, 0.1);

        for params in sampler.suggest(100) {
            for def in &space.parameters {
                let value = &params[&def.name];
                assert!(def.rule.contains(value), "{} = {value:?}", def.name);
            }
        }
    }

    #[test]
    fn exploits_around_best_for_direction() {
        let space = SearchSpace::new().add_float("lr", 0.0, 1.0);
        let mut sampler = SequentialSampler::new(space, ObjectiveDirection::Minimize)
            .with_seed(Some(11))
            .with_startup_trials(0)
            .with_exploration_weight(0.0);

        let mut good = ParamSet::new();
        good.insert("lr".into(), ParamValue::Float(0.2));
        let mut bad = ParamSet::new();
        bad.insert("lr".into(), ParamValue::Float(0.9));
        sampler.report(&good, 0.05);
        sampler.report(&bad, 0.50);

        for params in sampler.suggest(20) {
            let v = params["lr"].as_f64().unwrap();
            assert!((0.1..=0.3).contains(&v), "expected a value near 0.2, got {v}");
        }
    }

    fn exploit_only(space: SearchSpace, best: i64) -> SequentialSampler {
        let mut sampler = SequentialSampler::new(space, ObjectiveDirection::Maximize)
            .with_seed(Some(17))
            .with_startup_trials(0)
            .with_exploration_weight(0.0);
        let mut params = ParamSet::new();
        params.insert("k".into(), ParamValue::Int(best));
        sampler.report(&params, 1.0);
        sampler
    }

    #[test]
    fn exploit_handles_full_width_int_range() {
        let space = SearchSpace::new().add_int("k", i64::MIN, i64::MAX);
        let mut sampler = exploit_only(space, 0);
        assert_eq!(sampler.suggest(50).len(), 50);
    }

    #[test]
    fn exploit_saturates_at_int_bounds() {
        let space = SearchSpace::new().add_int("k", i64::MAX - 1, i64::MAX);
        let mut sampler = exploit_only(space.clone(), i64::MAX);
        for params in sampler.suggest(50) {
            let k = params["k"].as_i64().unwrap();
            assert!(k >= i64::MAX - 1);
        }

        let space = SearchSpace::new().add_int("k", i64::MIN, i64::MIN + 1);
        let mut sampler = exploit_only(space, i64::MIN);
        for params in sampler.suggest(50) {
            assert!(params["k"].as_i64().unwrap() <= i64::MIN + 1);
        }
    }

    #[test]
    fn ignores_non_finite_reports() {
        let mut sampler = SequentialSampler::new(space(), ObjectiveDirection::Maximize);
        sampler.report(&ParamSet::new(), f64::NAN);
        assert!(sampler.observations().is_empty());
    }
}
