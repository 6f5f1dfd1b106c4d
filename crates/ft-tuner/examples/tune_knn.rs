//! Tune a k-nearest-neighbors classifier with all three strategies.
//!
//! Run with `RUST_LOG=ft_tuner=debug` for per-trial output.

use anyhow::Result;
use std::time::Duration;

use ft_tuner::{
    init_tracing, Dataset, KNearestNeighbors, ModelTuner, ParamGrid, ProblemType, TuningConfig,
    TuningMethod,
};

fn synthetic_split() -> Result<ft_tuner::TrainTestSplit> {
    let features: Vec<Vec<f64>> = (0..200)
        .map(|i| {
            let x = ((i * 37) % 100) as f64 / 10.0;
            let y = ((i * 11) % 50) as f64 / 5.0;
            vec![x, y]
        })
        .collect();
    let labels = features
        .iter()
        .map(|p| if p[0] + p[1] > 10.0 { 1.0 } else { 0.0 })
        .collect();
    Ok(Dataset::new(features, labels)?.split_tail(0.2))
}

fn main() -> Result<()> {
    init_tracing("ft_tuner=info");

    let tuner = ModelTuner::new(ProblemType::Classification, synthetic_split()?).with_seed(7);
    let model = KNearestNeighbors::classifier();
    let grid = ParamGrid::new()
        .with("n_neighbors", [1, 3, 5, 9, 15])
        .with("weights", ["uniform", "distance"]);

    let grid_report = tuner.grid_search(&model, &grid, "accuracy", 5, -1)?;
    println!("{}", serde_json::to_string_pretty(&grid_report.summary())?);

    let random_report = tuner.random_search(&model, &grid, "f1", 4, 3, -1)?;
    println!("{}", serde_json::to_string_pretty(&random_report.summary())?);

    let config = TuningConfig::new(TuningMethod::Sequential, "accuracy")
        .with_n_trials(25)
        .with_timeout(Duration::from_secs(30))
        .with_n_jobs(2);
    let sequential_report = tuner.tune(&model, &grid, &config)?;
    println!("{}", serde_json::to_string_pretty(&sequential_report.summary())?);

    Ok(())
}
