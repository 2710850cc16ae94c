use serde::Serialize;

use crate::error::SweepError;
use crate::series::Series;

/// Compounded growth over a trailing sub-range of a [`Series`].
///
/// The range is inclusive on both ends, `[lower_bound, upper_bound]`, so a
/// window always contains the current day. Growth at offset `k` is
/// `prod(1 + series[lower_bound..=lower_bound + k])`.
///
/// Only the extremes and the final value are retained; use
/// [`GrowthWindow::sequence`] when the full curve is needed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GrowthWindow {
    /// First day in the window (inclusive).
    pub lower_bound: usize,
    /// Last day in the window (inclusive).
    pub upper_bound: usize,
    pub min: f64,
    pub max: f64,
    /// Growth over the whole window.
    pub last: f64,
}

impl GrowthWindow {
    pub fn compute(
        series: &Series,
        lower_bound: usize,
        upper_bound: usize,
    ) -> Result<Self, SweepError> {
        let slice = checked_range(series, lower_bound, upper_bound)?;

        let mut growth = 1.0;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for &change in slice {
            growth *= 1.0 + change;
            min = min.min(growth);
            max = max.max(growth);
        }

        Ok(Self {
            lower_bound,
            upper_bound,
            min,
            max,
            last: growth,
        })
    }

    /// Full compounded-growth curve over `[lower_bound, upper_bound]`.
    pub fn sequence(
        series: &Series,
        lower_bound: usize,
        upper_bound: usize,
    ) -> Result<Vec<f64>, SweepError> {
        let slice = checked_range(series, lower_bound, upper_bound)?;
        Ok(slice
            .iter()
            .scan(1.0, |acc, &change| {
                *acc *= 1.0 + change;
                Some(*acc)
            })
            .collect())
    }

    /// Number of days covered by the window.
    #[inline]
    pub fn len(&self) -> usize {
        self.upper_bound - self.lower_bound + 1
    }
}

fn checked_range(
    series: &Series,
    lower_bound: usize,
    upper_bound: usize,
) -> Result<&[f64], SweepError> {
    if lower_bound > upper_bound {
        return Err(SweepError::InvalidInput(format!(
            "empty growth window: lower bound {lower_bound} is past upper bound {upper_bound}"
        )));
    }
    if upper_bound >= series.len() {
        return Err(SweepError::InvalidInput(format!(
            "growth window upper bound {upper_bound} out of range for series of length {}",
            series.len()
        )));
    }
    Ok(&series.as_slice()[lower_bound..=upper_bound])
}
