use std::time::Instant;

use hysweep_core::{EvaluationResult, PercentUnits, Series, SweepConfig, SweepError};
use hysweep_strategy::{HysteresisStrategy, SimulationPath, Simulator};

use crate::candidates::CandidateSpace;
use crate::metrics::{MetricsCalculator, PathMetrics};
use crate::parallel::{CancelToken, ParallelSweepDriver};
use crate::reducer::SweepResult;

/// Sweep orchestrator: runs a candidate space through the hysteresis
/// strategy on a worker pool and reduces the scores.
///
///   1. Partition candidates across workers
///   2. Simulate each candidate against the shared series
///   3. Concatenate per-worker results in candidate order
///   4. Pick the best score, earliest candidate on ties
pub struct SweepEngine {
    strategy: HysteresisStrategy,
    driver: ParallelSweepDriver,
}

impl SweepEngine {
    pub fn new(strategy: HysteresisStrategy, workers: usize) -> Result<Self, SweepError> {
        Ok(Self {
            strategy,
            driver: ParallelSweepDriver::new(workers)?,
        })
    }

    /// Build from config. `default_workers` is used when the config leaves
    /// the worker count unset.
    pub fn from_config(config: &SweepConfig, default_workers: usize) -> Result<Self, SweepError> {
        let strategy = HysteresisStrategy::new(config.policy()?, config.units()?);
        Self::new(strategy, config.resolve_workers(default_workers)?)
    }

    pub fn strategy(&self) -> &HysteresisStrategy {
        &self.strategy
    }

    pub fn workers(&self) -> usize {
        self.driver.workers()
    }

    pub fn run(&self, series: &Series, space: &CandidateSpace) -> Result<SweepResult, SweepError> {
        self.execute(series, space, None)
    }

    pub fn run_with_cancel(
        &self,
        series: &Series,
        space: &CandidateSpace,
        cancel: &CancelToken,
    ) -> Result<SweepResult, SweepError> {
        self.execute(series, space, Some(cancel))
    }

    fn execute(
        &self,
        series: &Series,
        space: &CandidateSpace,
        cancel: Option<&CancelToken>,
    ) -> Result<SweepResult, SweepError> {
        let start = Instant::now();
        tracing::info!(
            simulator = self.strategy.id(),
            policy = self.strategy.policy().as_str(),
            candidates = space.len(),
            days = series.len(),
            workers = self.driver.effective_workers(space.len()),
            "sweep started"
        );

        // Convert units once for the whole sweep; workers share the fractions.
        let fractions = series.to_fractions(self.strategy.units());
        let simulator = HysteresisStrategy::new(self.strategy.policy(), PercentUnits::Fraction);
        let results = match self.driver.run(&simulator, &fractions, space, cancel) {
            Ok(results) => results,
            Err(SweepError::Cancelled) => {
                tracing::warn!("sweep cancelled");
                return Err(SweepError::Cancelled);
            }
            Err(e) => return Err(e),
        };
        let result = SweepResult::from_results(results)?;

        tracing::info!(
            best_score = result.best.score,
            best = %result.best.params,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "sweep finished"
        );
        Ok(result)
    }

    /// Re-simulate one result keeping the full path, with its metrics.
    pub fn best_path(
        &self,
        series: &Series,
        result: &EvaluationResult,
    ) -> Result<(SimulationPath, PathMetrics), SweepError> {
        let path = self.strategy.simulate_path(series, &result.params)?;
        let metrics = MetricsCalculator::calculate(&path);
        Ok((path, metrics))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hysweep_core::{ErrorKind, HyperparameterSet, OutOfMarketPolicy};

    fn make_series(n: usize) -> Series {
        let values = (0..n)
            .map(|i| if i == 0 { 0.0 } else { ((i as f64) * 0.21).cos() * 0.015 + 0.0005 })
            .collect();
        Series::new(values).unwrap()
    }

    fn flat_engine(workers: usize) -> SweepEngine {
        let strategy = HysteresisStrategy::new(OutOfMarketPolicy::Flat, PercentUnits::Fraction);
        SweepEngine::new(strategy, workers).unwrap()
    }

    fn make_space() -> CandidateSpace {
        CandidateSpace::cartesian(
            &[1.0, 2.0],
            &[None],
            &[0.9, 0.95, 0.99],
            &[1.0, 1.02],
            &[0, 2, 5, 10],
        )
        .unwrap()
    }

    #[test]
    fn test_engine_best_is_max() {
        let series = make_series(200);
        let result = flat_engine(4).run(&series, &make_space()).unwrap();
        assert_eq!(result.results.len(), 48);
        let max = result
            .results
            .iter()
            .map(|r| r.score)
            .fold(f64::NEG_INFINITY, f64::max);
        assert_eq!(result.best.score, max);
    }

    #[test]
    fn test_engine_worker_count_independent() {
        let series = make_series(150);
        let space = make_space();
        let one = flat_engine(1).run(&series, &space).unwrap();
        let eight = flat_engine(8).run(&series, &space).unwrap();
        assert_eq!(one.best, eight.best);
        assert_eq!(one.results, eight.results);
    }

    #[test]
    fn test_engine_empty_space() {
        let series = make_series(10);
        let err = flat_engine(2).run(&series, &CandidateSpace::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EmptyInput);
    }

    #[test]
    fn test_engine_from_config() {
        let config = SweepConfig::from_toml_str(
            r#"
[sweep]
policy = "scaled"
units = "percent"

[[candidates]]
multiplier = 1.0
out_multiplier = 0.5
pullout_threshold = 0.9
backin_threshold = 1.1
lookback_days = 1
"#,
        )
        .unwrap();
        let engine = SweepEngine::from_config(&config, 3).unwrap();
        assert_eq!(engine.workers(), 3);
        assert_eq!(engine.strategy().policy(), OutOfMarketPolicy::Scaled);
        assert_eq!(engine.strategy().units(), PercentUnits::Percent);

        let series = Series::new(vec![0.0, -20.0, 0.0, 50.0, 10.0]).unwrap();
        let space = CandidateSpace::from_config(&config, engine.strategy().policy()).unwrap();
        let result = engine.run(&series, &space).unwrap();
        assert!((result.best.score - 1.1).abs() < 1e-12);
    }

    #[test]
    fn test_engine_percent_units_match_per_candidate() {
        let fractions = make_series(90);
        let percent = Series::new(fractions.as_slice().iter().map(|v| v * 100.0).collect()).unwrap();
        let strategy = HysteresisStrategy::new(OutOfMarketPolicy::Flat, PercentUnits::Percent);
        let engine = SweepEngine::new(strategy, 4).unwrap();
        let space = make_space();

        let swept = engine.run(&percent, &space).unwrap();
        let reference = flat_engine(4).run(&fractions, &space).unwrap();
        for ((a, b), params) in swept.results.iter().zip(&reference.results).zip(space.iter()) {
            assert!((a.score - b.score).abs() < 1e-12);
            // Same score as simulating the percent series directly.
            let direct = strategy.simulate(&percent, params).unwrap();
            assert!((a.score - direct).abs() < 1e-12);
        }
    }

    #[test]
    fn test_engine_scaled_missing_out_multiplier_names_candidate() {
        let strategy = HysteresisStrategy::new(OutOfMarketPolicy::Scaled, PercentUnits::Fraction);
        let engine = SweepEngine::new(strategy, 2).unwrap();
        let space = CandidateSpace::from_list(vec![
            HyperparameterSet::new(1.0, 0.9, 1.1, 1).with_out_multiplier(0.2),
            HyperparameterSet::new(2.0, 0.9, 1.1, 1),
        ]);
        let err = engine.run(&make_series(20), &space).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert_eq!(err.candidate().map(|(i, _)| i), Some(1));
    }

    #[test]
    fn test_engine_cancel() {
        let token = CancelToken::new();
        token.cancel();
        let err = flat_engine(2)
            .run_with_cancel(&make_series(30), &make_space(), &token)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);
    }

    #[test]
    fn test_best_path_matches_score() {
        let series = make_series(120);
        let engine = flat_engine(3);
        let result = engine.run(&series, &make_space()).unwrap();
        let (path, metrics) = engine.best_path(&series, &result.best).unwrap();
        assert_eq!(path.values.len(), series.len());
        assert_eq!(path.terminal_value(), result.best.score);
        assert_eq!(metrics.terminal_value, result.best.score);
        assert!(metrics.days_in_market_pct >= 0.0 && metrics.days_in_market_pct <= 1.0);
    }
}
