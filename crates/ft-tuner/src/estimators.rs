//! Reference estimators implementing [`Estimator`].
//!
//! These are small, dependency-free baselines so the tuner can be exercised
//! end to end: k-nearest neighbors (classification or regression) and ridge
//! regression solved in closed form.

use std::cmp::Ordering;

use ft_types::{Estimator, ModelError, ParamSet, ParamValue, TuneResult};

fn invalid_param(model: &str, parameter: &str, message: impl Into<String>) -> ModelError {
    ModelError::InvalidParameter {
        model: model.to_string(),
        parameter: parameter.to_string(),
        message: message.into(),
    }
}

fn check_fit_input(features: &[Vec<f64>], labels: &[f64]) -> TuneResult<()> {
    if features.is_empty() {
        return Err(ModelError::EmptyInput {
            message: "no training rows".to_string(),
        }
        .into());
    }
    if features.len() != labels.len() {
        return Err(ModelError::ShapeMismatch {
            expected: features.len(),
            actual: labels.len(),
        }
        .into());
    }
    Ok(())
}

fn check_width(expected: usize, rows: &[Vec<f64>]) -> TuneResult<()> {
    match rows.iter().find(|row| row.len() != expected) {
        Some(row) => Err(ModelError::ShapeMismatch {
            expected,
            actual: row.len(),
        }
        .into()),
        None => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// k-nearest neighbors
// ---------------------------------------------------------------------------

/// How neighbors are combined into a prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NeighborWeights {
    Uniform,
    Distance,
}

impl NeighborWeights {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Uniform => "uniform",
            Self::Distance => "distance",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KnnTask {
    Classification,
    Regression,
}

/// Brute-force k-nearest neighbors over Euclidean distance.
///
/// Parameters: `n_neighbors` (int ≥ 1, default 5) and `weights`
/// (`"uniform"` or `"distance"`).
#[derive(Debug, Clone)]
pub struct KNearestNeighbors {
    n_neighbors: usize,
    weights: NeighborWeights,
    task: KnnTask,
    train_x: Vec<Vec<f64>>,
    train_y: Vec<f64>,
}

impl KNearestNeighbors {
    const NAME: &'static str = "KNearestNeighbors";

    pub fn new(task: KnnTask) -> Self {
        Self {
            n_neighbors: 5,
            weights: NeighborWeights::Uniform,
            task,
            train_x: Vec::new(),
            train_y: Vec::new(),
        }
    }

    pub fn classifier() -> Self {
        Self::new(KnnTask::Classification)
    }

    pub fn regressor() -> Self {
        Self::new(KnnTask::Regression)
    }

    pub fn with_neighbors(mut self, n_neighbors: usize) -> Self {
        self.n_neighbors = n_neighbors;
        self
    }

    pub fn n_neighbors(&self) -> usize {
        self.n_neighbors
    }

    pub fn is_fitted(&self) -> bool {
        !self.train_y.is_empty()
    }

    /// Indices and distances of the `k` closest training rows.
    fn neighbors(&self, row: &[f64]) -> Vec<(usize, f64)> {
        let mut dists: Vec<(usize, f64)> = self
            .train_x
            .iter()
            .enumerate()
            .map(|(i, x)| {
                let d = x
                    .iter()
                    .zip(row)
                    .map(|(a, b)| (a - b).powi(2))
                    .sum::<f64>()
                    .sqrt();
                (i, d)
            })
            .collect();
        dists.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));
        dists.truncate(self.n_neighbors);
        dists
    }

    /// Per-neighbor weights. With distance weighting, exact matches take all
    /// the weight.
    fn neighbor_weights(&self, neighbors: &[(usize, f64)]) -> Vec<f64> {
        match self.weights {
            NeighborWeights::Uniform => vec![1.0; neighbors.len()],
            NeighborWeights::Distance => {
                if neighbors.iter().any(|(_, d)| *d == 0.0) {
                    neighbors
                        .iter()
                        .map(|(_, d)| if *d == 0.0 { 1.0 } else { 0.0 })
                        .collect()
                } else {
                    neighbors.iter().map(|(_, d)| 1.0 / d).collect()
                }
            }
        }
    }

    fn predict_row(&self, row: &[f64]) -> f64 {
        let neighbors = self.neighbors(row);
        let weights = self.neighbor_weights(&neighbors);

        match self.task {
            KnnTask::Regression => {
                let total: f64 = weights.iter().sum();
                neighbors
                    .iter()
                    .zip(&weights)
                    .map(|((i, _), w)| self.train_y[*i] * w)
                    .sum::<f64>()
                    / total
            }
            KnnTask::Classification => {
                // Votes per label; ties go to the smallest label.
                let mut votes: Vec<(f64, f64)> = Vec::new();
                for ((i, _), w) in neighbors.iter().zip(&weights) {
                    let label = self.train_y[*i];
                    match votes.iter_mut().find(|(l, _)| *l == label) {
                        Some(entry) => entry.1 += w,
                        None => votes.push((label, *w)),
                    }
                }
                votes.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));
                let mut best = votes[0];
                for vote in &votes[1..] {
                    if vote.1 > best.1 {
                        best = *vote;
                    }
                }
                best.0
            }
        }
    }
}

impl Estimator for KNearestNeighbors {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn fit(&mut self, features: &[Vec<f64>], labels: &[f64]) -> TuneResult<()> {
        check_fit_input(features, labels)?;
        check_width(features[0].len(), features)?;
        if self.n_neighbors > features.len() {
            return Err(ModelError::FitFailed {
                model: Self::NAME.to_string(),
                message: format!(
                    "n_neighbors={} exceeds the {} training rows",
                    self.n_neighbors,
                    features.len()
                ),
            }
            .into());
        }
        self.train_x = features.to_vec();
        self.train_y = labels.to_vec();
        Ok(())
    }

    fn predict(&self, features: &[Vec<f64>]) -> TuneResult<Vec<f64>> {
        if !self.is_fitted() {
            return Err(ModelError::NotFitted {
                model: Self::NAME.to_string(),
            }
            .into());
        }
        check_width(self.train_x[0].len(), features)?;
        Ok(features.iter().map(|row| self.predict_row(row)).collect())
    }

    fn set_params(&mut self, params: &ParamSet) -> TuneResult<()> {
        for (name, value) in params {
            match name.as_str() {
                "n_neighbors" => match value.as_i64() {
                    Some(k) if k >= 1 => self.n_neighbors = k as usize,
                    _ => {
                        return Err(invalid_param(
                            Self::NAME,
                            name,
                            format!("expected an integer >= 1, got {value}"),
                        )
                        .into())
                    }
                },
                "weights" => {
                    self.weights = match value.as_str() {
                        Some("uniform") => NeighborWeights::Uniform,
                        Some("distance") => NeighborWeights::Distance,
                        _ => {
                            return Err(invalid_param(
                                Self::NAME,
                                name,
                                format!("expected 'uniform' or 'distance', got {value}"),
                            )
                            .into())
                        }
                    }
                }
                _ => return Err(invalid_param(Self::NAME, name, "unknown parameter").into()),
            }
        }
        Ok(())
    }

    fn params(&self) -> ParamSet {
        let mut params = ParamSet::new();
        params.insert("n_neighbors".into(), ParamValue::Int(self.n_neighbors as i64));
        params.insert("weights".into(), self.weights.as_str().into());
        params
    }

    fn clone_unfitted(&self) -> Box<dyn Estimator> {
        Box::new(Self {
            n_neighbors: self.n_neighbors,
            weights: self.weights,
            task: self.task,
            train_x: Vec::new(),
            train_y: Vec::new(),
        })
    }

    fn fresh(&self) -> Box<dyn Estimator> {
        Box::new(Self::new(self.task))
    }
}

// ---------------------------------------------------------------------------
// Ridge regression
// ---------------------------------------------------------------------------

/// L2-regularized least squares.
///
/// Parameters: `alpha` (float ≥ 0, default 1.0) and `fit_intercept`
/// (bool, default true). The intercept is not penalized.
#[derive(Debug, Clone)]
pub struct RidgeRegression {
    alpha: f64,
    fit_intercept: bool,
    coefficients: Option<Vec<f64>>,
    intercept: f64,
}

impl Default for RidgeRegression {
    fn default() -> Self {
        Self {
            alpha: 1.0,
            fit_intercept: true,
            coefficients: None,
            intercept: 0.0,
        }
    }
}

impl RidgeRegression {
    const NAME: &'static str = "RidgeRegression";

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn coefficients(&self) -> Option<&[f64]> {
        self.coefficients.as_deref()
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }
}

/// Solve `a · x = b` in place by Gaussian elimination with partial pivoting.
/// Returns `None` for a (numerically) singular system.
fn solve_linear_system(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Option<Vec<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n).max_by(|&i, &j| {
            a[i][col]
                .abs()
                .partial_cmp(&a[j][col].abs())
                .unwrap_or(Ordering::Equal)
        })?;
        if a[pivot][col].abs() < 1e-12 {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        for row in (col + 1)..n {
            let factor = a[row][col] / a[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                let delta = factor * a[col][k];
                a[row][k] -= delta;
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = ((row + 1)..n).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }
    Some(x)
}

impl Estimator for RidgeRegression {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn fit(&mut self, features: &[Vec<f64>], labels: &[f64]) -> TuneResult<()> {
        check_fit_input(features, labels)?;
        let width = features[0].len();
        check_width(width, features)?;

        let n = features.len() as f64;
        let (x_mean, y_mean) = if self.fit_intercept {
            let x_mean: Vec<f64> = (0..width)
                .map(|j| features.iter().map(|row| row[j]).sum::<f64>() / n)
                .collect();
            (x_mean, labels.iter().sum::<f64>() / n)
        } else {
            (vec![0.0; width], 0.0)
        };

        // Normal equations on centered data: (XᵀX + αI) w = Xᵀy
        let mut gram = vec![vec![0.0; width]; width];
        let mut rhs = vec![0.0; width];
        for (row, y) in features.iter().zip(labels) {
            let yc = y - y_mean;
            for i in 0..width {
                let xi = row[i] - x_mean[i];
                rhs[i] += xi * yc;
                for j in i..width {
                    gram[i][j] += xi * (row[j] - x_mean[j]);
                }
            }
        }
        for i in 0..width {
            for j in 0..i {
                gram[i][j] = gram[j][i];
            }
            gram[i][i] += self.alpha;
        }

        let coefficients =
            solve_linear_system(gram, rhs).ok_or_else(|| ModelError::FitFailed {
                model: Self::NAME.to_string(),
                message: "singular system; increase alpha".to_string(),
            })?;

        self.intercept = y_mean
            - coefficients
                .iter()
                .zip(&x_mean)
                .map(|(w, m)| w * m)
                .sum::<f64>();
        self.coefficients = Some(coefficients);
        Ok(())
    }

    fn predict(&self, features: &[Vec<f64>]) -> TuneResult<Vec<f64>> {
        let coefficients = self.coefficients.as_ref().ok_or_else(|| ModelError::NotFitted {
            model: Self::NAME.to_string(),
        })?;
        check_width(coefficients.len(), features)?;
        Ok(features
            .iter()
            .map(|row| {
                self.intercept
                    + row
                        .iter()
                        .zip(coefficients)
                        .map(|(x, w)| x * w)
                        .sum::<f64>()
            })
            .collect())
    }

    fn set_params(&mut self, params: &ParamSet) -> TuneResult<()> {
        for (name, value) in params {
            match name.as_str() {
                "alpha" => match value.as_f64() {
                    Some(a) if a >= 0.0 && a.is_finite() => self.alpha = a,
                    _ => {
                        return Err(invalid_param(
                            Self::NAME,
                            name,
                            format!("expected a non-negative number, got {value}"),
                        )
                        .into())
                    }
                },
                "fit_intercept" => match value.as_bool() {
                    Some(b) => self.fit_intercept = b,
                    None => {
                        return Err(invalid_param(
                            Self::NAME,
                            name,
                            format!("expected a boolean, got {value}"),
                        )
                        .into())
                    }
                },
                _ => return Err(invalid_param(Self::NAME, name, "unknown parameter").into()),
            }
        }
        Ok(())
    }

    fn params(&self) -> ParamSet {
        let mut params = ParamSet::new();
        params.insert("alpha".into(), ParamValue::Float(self.alpha));
        params.insert("fit_intercept".into(), ParamValue::Bool(self.fit_intercept));
        params
    }

    fn clone_unfitted(&self) -> Box<dyn Estimator> {
        Box::new(Self {
            alpha: self.alpha,
            fit_intercept: self.fit_intercept,
            coefficients: None,
            intercept: 0.0,
        })
    }

    fn fresh(&self) -> Box<dyn Estimator> {
        Box::new(Self::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ft_types::{TuneError, TuneResult};

    fn line(n: usize) -> (Vec<Vec<f64>>, Vec<f64>) {
        let x: Vec<Vec<f64>> = (0..n).map(|i| vec![i as f64]).collect();
        let y: Vec<f64> = (0..n).map(|i| 3.0 * i as f64 + 2.0).collect();
        (x, y)
    }

    #[test]
    fn ridge_recovers_a_line_with_small_alpha() -> TuneResult<()> {
        let (x, y) = line(20);
        let mut ridge = RidgeRegression::default().with_alpha(1e-9);
        ridge.fit(&x, &y)?;
        let w = ridge.coefficients().unwrap()[0];
        assert!((w - 3.0).abs() < 1e-6, "slope {w}");
        assert!((ridge.intercept() - 2.0).abs() < 1e-6);
        let pred = ridge.predict(&[vec![100.0]])?;
        assert!((pred[0] - 302.0).abs() < 1e-4);
        Ok(())
    }

    #[test]
    fn ridge_shrinks_with_large_alpha() -> TuneResult<()> {
        let (x, y) = line(10);
        let mut ridge = RidgeRegression::default().with_alpha(1e6);
        ridge.fit(&x, &y)?;
        assert!(ridge.coefficients().unwrap()[0].abs() < 0.1);
        Ok(())
    }

    #[test]
    fn ridge_singular_without_penalty() {
        // Two identical columns and alpha = 0
        let x: Vec<Vec<f64>> = (0..5).map(|i| vec![i as f64, i as f64]).collect();
        let y: Vec<f64> = (0..5).map(|i| i as f64).collect();
        let mut ridge = RidgeRegression::default().with_alpha(0.0);
        let err = ridge.fit(&x, &y).unwrap_err();
        assert!(matches!(err, TuneError::Model(ModelError::FitFailed { .. })));
    }

    #[test]
    fn ridge_predict_before_fit_fails() {
        let ridge = RidgeRegression::default();
        assert!(matches!(
            ridge.predict(&[vec![1.0]]),
            Err(TuneError::Model(ModelError::NotFitted { .. }))
        ));
    }

    #[test]
    fn ridge_params_round_trip() -> TuneResult<()> {
        let mut ridge = RidgeRegression::default();
        let mut params = ParamSet::new();
        params.insert("alpha".into(), ParamValue::Float(0.25));
        params.insert("fit_intercept".into(), ParamValue::Bool(false));
        ridge.set_params(&params)?;
        assert_eq!(ridge.params(), params);
        Ok(())
    }

    #[test]
    fn ridge_rejects_bad_params() {
        let mut ridge = RidgeRegression::default();
        let mut params = ParamSet::new();
        params.insert("alpha".into(), ParamValue::Float(-1.0));
        assert!(ridge.set_params(&params).is_err());

        let mut params = ParamSet::new();
        params.insert("max_depth".into(), ParamValue::Int(3));
        assert!(matches!(
            ridge.set_params(&params),
            Err(TuneError::Model(ModelError::InvalidParameter { .. }))
        ));
    }

    #[test]
    fn knn_classifies_two_clusters() -> TuneResult<()> {
        let x = vec![
            vec![0.0, 0.0],
            vec![0.1, 0.2],
            vec![0.2, 0.1],
            vec![5.0, 5.0],
            vec![5.1, 4.9],
            vec![4.8, 5.2],
        ];
        let y = vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        let mut knn = KNearestNeighbors::classifier().with_neighbors(3);
        knn.fit(&x, &y)?;
        let pred = knn.predict(&[vec![0.05, 0.05], vec![5.0, 5.1]])?;
        assert_eq!(pred, vec![0.0, 1.0]);
        Ok(())
    }

    #[test]
    fn knn_regression_distance_weights() -> TuneResult<()> {
        let x = vec![vec![0.0], vec![1.0], vec![10.0]];
        let y = vec![0.0, 10.0, 100.0];
        let mut knn = KNearestNeighbors::regressor().with_neighbors(2);
        let mut params = ParamSet::new();
        params.insert("weights".into(), "distance".into());
        knn.set_params(&params)?;
        knn.fit(&x, &y)?;
        // Exact match takes all the weight.
        assert_eq!(knn.predict(&[vec![1.0]])?, vec![10.0]);
        // 0.25 from 0.0 and 0.75 from 1.0 → weights 4 and 4/3.
        let p = knn.predict(&[vec![0.25]])?[0];
        assert!((p - 2.5).abs() < 1e-9, "got {p}");
        Ok(())
    }

    #[test]
    fn knn_uniform_tie_goes_to_smallest_label() -> TuneResult<()> {
        let x = vec![vec![-1.0], vec![1.0]];
        let y = vec![1.0, 0.0];
        let mut knn = KNearestNeighbors::classifier().with_neighbors(2);
        knn.fit(&x, &y)?;
        assert_eq!(knn.predict(&[vec![0.0]])?, vec![0.0]);
        Ok(())
    }

    #[test]
    fn knn_rejects_too_many_neighbors() {
        let mut knn = KNearestNeighbors::classifier().with_neighbors(10);
        let err = knn.fit(&[vec![0.0], vec![1.0]], &[0.0, 1.0]).unwrap_err();
        assert!(matches!(err, TuneError::Model(ModelError::FitFailed { .. })));
    }

    #[test]
    fn knn_rejects_bad_params() {
        let mut knn = KNearestNeighbors::classifier();
        let mut params = ParamSet::new();
        params.insert("n_neighbors".into(), ParamValue::Int(0));
        assert!(knn.set_params(&params).is_err());

        let mut params = ParamSet::new();
        params.insert("weights".into(), "manhattan".into());
        assert!(knn.set_params(&params).is_err());
    }

    #[test]
    fn clone_unfitted_keeps_params_fresh_resets() -> TuneResult<()> {
        let mut knn = KNearestNeighbors::regressor().with_neighbors(2);
        knn.fit(&[vec![0.0], vec![1.0]], &[0.0, 1.0])?;

        let clone = knn.clone_unfitted();
        assert_eq!(clone.params(), knn.params());
        assert!(clone.predict(&[vec![0.5]]).is_err());

        let fresh = knn.fresh();
        assert_eq!(fresh.params()["n_neighbors"], ParamValue::Int(5));
        assert_eq!(fresh.name(), "KNearestNeighbors");
        Ok(())
    }
}
