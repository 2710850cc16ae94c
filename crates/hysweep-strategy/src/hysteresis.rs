use serde::Serialize;

use hysweep_core::{
    Exposure, GrowthWindow, HyperparameterSet, OutOfMarketPolicy, PercentUnits, Series,
    SweepError,
};

use crate::traits::{Simulator, SimulatorId};

/// Daily portfolio values and the exposure each day was held under.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationPath {
    pub values: Vec<f64>,
    pub exposures: Vec<Exposure>,
}

impl SimulationPath {
    pub fn terminal_value(&self) -> f64 {
        self.values.last().copied().unwrap_or(1.0)
    }

    /// Number of days whose exposure differs from the previous day.
    pub fn switches(&self) -> usize {
        self.exposures.windows(2).filter(|w| w[0] != w[1]).count()
    }
}

/// Hysteresis exposure strategy over a percent-change series.
///
/// Starts in the market with value `1.0`. Each day `i >= 1`:
///   1. Value moves by `multiplier * change` in the market, or by the
///      out-of-market policy otherwise
///   2. Once `i > lookback_days`, the compounded growth over
///      `[i - lookback_days, i]` is checked: `min <= pullout` exits the
///      market, then `max >= backin` re-enters. The second check runs last,
///      so re-entry wins when both fire on the same day.
#[derive(Debug, Clone, Copy, Default)]
pub struct HysteresisStrategy {
    policy: OutOfMarketPolicy,
    units: PercentUnits,
}

impl HysteresisStrategy {
    pub fn new(policy: OutOfMarketPolicy, units: PercentUnits) -> Self {
        Self { policy, units }
    }

    pub fn policy(&self) -> OutOfMarketPolicy {
        self.policy
    }

    pub fn units(&self) -> PercentUnits {
        self.units
    }

    /// Simulate and keep the whole daily path.
    pub fn simulate_path(
        &self,
        series: &Series,
        params: &HyperparameterSet,
    ) -> Result<SimulationPath, SweepError> {
        let mut path = SimulationPath {
            values: Vec::with_capacity(series.len()),
            exposures: Vec::with_capacity(series.len()),
        };
        self.run(series, params, |value, exposure| {
            path.values.push(value);
            path.exposures.push(exposure);
        })?;
        Ok(path)
    }

    fn run(
        &self,
        series: &Series,
        params: &HyperparameterSet,
        mut on_day: impl FnMut(f64, Exposure),
    ) -> Result<f64, SweepError> {
        params.validate(self.policy)?;
        let series = self.units_applied(series);
        let lookback = params.lookback_days as usize;

        let mut value = 1.0;
        let mut exposure = Exposure::InMarket;
        on_day(value, exposure);

        for i in 1..series.len() {
            value *= 1.0 + self.effective_multiplier(exposure, params) * series[i];
            on_day(value, exposure);

            // Warm-up: no decisions until the window is full.
            if i <= lookback {
                continue;
            }
            let window = GrowthWindow::compute(&series, i.saturating_sub(lookback), i)?;
            exposure = next_exposure(exposure, &window, params);
        }

        Ok(value)
    }

    fn units_applied<'a>(&self, series: &'a Series) -> std::borrow::Cow<'a, Series> {
        series.to_fractions(self.units)
    }

    #[inline]
    fn effective_multiplier(&self, exposure: Exposure, params: &HyperparameterSet) -> f64 {
        match (exposure, self.policy) {
            (Exposure::InMarket, _) => params.multiplier,
            (Exposure::OutOfMarket, OutOfMarketPolicy::Flat) => 0.0,
            // validate() guarantees the field is present under Scaled.
            (Exposure::OutOfMarket, OutOfMarketPolicy::Scaled) => {
                params.out_multiplier.unwrap_or(0.0)
            }
        }
    }
}

/// Pullout first, back-in second: the later check overwrites the state.
#[inline]
fn next_exposure(current: Exposure, window: &GrowthWindow, params: &HyperparameterSet) -> Exposure {
    let mut next = current;
    if window.min <= params.pullout_threshold {
        next = Exposure::OutOfMarket;
    }
    if window.max >= params.backin_threshold {
        next = Exposure::InMarket;
    }
    next
}

impl Simulator for HysteresisStrategy {
    fn simulate(&self, series: &Series, params: &HyperparameterSet) -> Result<f64, SweepError> {
        self.run(series, params, |_, _| {})
    }

    fn id(&self) -> SimulatorId {
        "hysteresis"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hysweep_core::ErrorKind;

    fn series(values: &[f64]) -> Series {
        Series::new(values.to_vec()).unwrap()
    }

    fn flat() -> HysteresisStrategy {
        HysteresisStrategy::new(OutOfMarketPolicy::Flat, PercentUnits::Fraction)
    }

    #[test]
    fn test_single_day_series_is_one() {
        let s = series(&[0.3]);
        for params in [
            HyperparameterSet::new(3.0, 0.8, 1.2, 0),
            HyperparameterSet::new(1.0, 1.5, 0.5, 20),
        ] {
            assert_eq!(flat().simulate(&s, &params).unwrap(), 1.0);
        }
    }

    #[test]
    fn test_golden_fixture() {
        let s = series(&[0.0, 0.01, -0.05, 0.02, 0.03]);
        let params = HyperparameterSet::new(1.0, 0.9, 1.1, 2);
        let value = flat().simulate(&s, &params).unwrap();
        // Growth never leaves (0.9, 1.1): in the market every day.
        let expected = 1.01 * 0.95 * 1.02 * 1.03;
        assert!((value - expected).abs() < 1e-12, "got {value}");
        assert!((value - 1.0080507).abs() < 1e-9);
    }

    #[test]
    fn test_golden_fixture_percent_units() {
        let s = series(&[0.0, 1.0, -5.0, 2.0, 3.0]);
        let params = HyperparameterSet::new(1.0, 0.9, 1.1, 2);
        let strategy = HysteresisStrategy::new(OutOfMarketPolicy::Flat, PercentUnits::Percent);
        let value = strategy.simulate(&s, &params).unwrap();
        assert!((value - 1.0080507).abs() < 1e-9);
    }

    #[test]
    fn test_warm_up_suppresses_early_pullout() {
        // An immediate 50% drop would trigger pullout on day 1 if checked early.
        let s = series(&[0.0, -0.5, 0.0, 0.0, 0.1]);
        let params = HyperparameterSet::new(1.0, 0.9, 10.0, 3);
        let value = flat().simulate(&s, &params).unwrap();
        assert!((value - 0.55).abs() < 1e-12, "got {value}");

        let path = flat().simulate_path(&s, &params).unwrap();
        assert!(path.exposures.iter().all(|e| e.is_in_market()));
    }

    #[test]
    fn test_pullout_then_backin_flat() {
        let s = series(&[0.0, -0.2, 0.0, 0.5, 0.1]);
        let params = HyperparameterSet::new(1.0, 0.9, 1.1, 1);
        let path = flat().simulate_path(&s, &params).unwrap();
        assert!((path.terminal_value() - 0.88).abs() < 1e-12);
        assert_eq!(
            path.exposures,
            vec![
                Exposure::InMarket,
                Exposure::InMarket,
                Exposure::InMarket,
                Exposure::OutOfMarket,
                Exposure::InMarket,
            ]
        );
        assert_eq!(path.switches(), 2);
    }

    #[test]
    fn test_pullout_then_backin_scaled() {
        let s = series(&[0.0, -0.2, 0.0, 0.5, 0.1]);
        let params = HyperparameterSet::new(1.0, 0.9, 1.1, 1).with_out_multiplier(0.5);
        let strategy = HysteresisStrategy::new(OutOfMarketPolicy::Scaled, PercentUnits::Fraction);
        let value = strategy.simulate(&s, &params).unwrap();
        // Day 3 is out of the market: 0.8 * (1 + 0.5 * 0.5) = 1.0, then 1.1.
        assert!((value - 1.1).abs() < 1e-12, "got {value}");
    }

    #[test]
    fn test_backin_wins_tie() {
        // Growth of exactly 1.0 satisfies both pullout (<= 1.0) and back-in (>= 1.0).
        let s = series(&[0.0, 0.0, 0.1]);
        let params = HyperparameterSet::new(1.0, 1.0, 1.0, 0);
        let value = flat().simulate(&s, &params).unwrap();
        assert!((value - 1.1).abs() < 1e-12, "got {value}");
    }

    #[test]
    fn test_constant_growth_closed_form() {
        let n = 50;
        let r = 0.001;
        let multiplier = 2.0;
        let mut values = vec![0.0];
        values.extend(std::iter::repeat(r).take(n - 1));
        let s = series(&values);
        // Growth always exceeds 1: never pulls out, always backs in.
        let params = HyperparameterSet::new(multiplier, 0.5, 1.0, 5);
        let value = flat().simulate(&s, &params).unwrap();
        let expected = (1.0 + multiplier * r).powi((n - 1) as i32);
        assert!((value - expected).abs() < 1e-9, "got {value}, expected {expected}");
    }

    #[test]
    fn test_simulate_matches_path() {
        let s = series(&[0.0, 0.03, -0.07, -0.04, 0.02, 0.06, -0.01, 0.05]);
        let params = HyperparameterSet::new(2.0, 0.95, 1.03, 2);
        let value = flat().simulate(&s, &params).unwrap();
        let path = flat().simulate_path(&s, &params).unwrap();
        assert_eq!(path.values.len(), s.len());
        assert_eq!(value, path.terminal_value());
    }

    #[test]
    fn test_scaled_without_out_multiplier_fails() {
        let s = series(&[0.0, 0.1]);
        let params = HyperparameterSet::new(1.0, 0.9, 1.1, 1);
        let strategy = HysteresisStrategy::new(OutOfMarketPolicy::Scaled, PercentUnits::Fraction);
        let err = strategy.simulate(&s, &params).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_lookback_longer_than_series() {
        let s = series(&[0.0, -0.5, -0.5]);
        let params = HyperparameterSet::new(1.0, 0.9, 1.1, 100);
        let value = flat().simulate(&s, &params).unwrap();
        assert!((value - 0.25).abs() < 1e-12);
    }
}
