use serde::Serialize;

use hysweep_strategy::SimulationPath;

const ANNUALIZATION_FACTOR: f64 = 15.874507866; // sqrt(252)

/// Descriptive statistics for a single simulated path.
#[derive(Debug, Clone, Serialize)]
pub struct PathMetrics {
    pub terminal_value: f64,
    pub total_return_pct: f64,
    pub max_drawdown_pct: f64,
    pub sharpe_ratio: f64,
    pub days_in_market_pct: f64,
    pub switches: usize,
}

pub struct MetricsCalculator;

impl MetricsCalculator {
    pub fn calculate(path: &SimulationPath) -> PathMetrics {
        let returns = Self::compute_returns(&path.values);

        PathMetrics {
            terminal_value: path.terminal_value(),
            total_return_pct: Self::total_return(&path.values),
            max_drawdown_pct: Self::max_drawdown(&path.values),
            sharpe_ratio: Self::sharpe_ratio(&returns),
            days_in_market_pct: Self::days_in_market(path),
            switches: path.switches(),
        }
    }

    fn compute_returns(values: &[f64]) -> Vec<f64> {
        if values.len() < 2 {
            return Vec::new();
        }
        values
            .windows(2)
            .map(|w| {
                if w[0] == 0.0 {
                    0.0
                } else {
                    (w[1] - w[0]) / w[0]
                }
            })
            .collect()
    }

    fn sharpe_ratio(returns: &[f64]) -> f64 {
        if returns.len() < 2 {
            return 0.0;
        }
        let mean = returns.iter().sum::<f64>() / returns.len() as f64;
        let std = std_dev(returns);
        if std == 0.0 {
            return 0.0;
        }
        mean / std * ANNUALIZATION_FACTOR
    }

    fn max_drawdown(values: &[f64]) -> f64 {
        if values.len() < 2 {
            return 0.0;
        }
        let mut peak = values[0];
        let mut max_dd = 0.0f64;
        for &value in &values[1..] {
            if value > peak {
                peak = value;
            }
            if peak > 0.0 {
                max_dd = max_dd.max((peak - value) / peak);
            }
        }
        max_dd
    }

    fn total_return(values: &[f64]) -> f64 {
        match (values.first(), values.last()) {
            (Some(&first), Some(&last)) if values.len() >= 2 && first != 0.0 => {
                (last - first) / first
            }
            _ => 0.0,
        }
    }

    /// Share of days after the first held in the market. Day 0 is always in.
    fn days_in_market(path: &SimulationPath) -> f64 {
        let days = path.exposures.get(1..).unwrap_or_default();
        if days.is_empty() {
            return 1.0;
        }
        let held = days.iter().filter(|e| e.is_in_market()).count();
        held as f64 / days.len() as f64
    }
}

fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}
