use std::borrow::Cow;
use std::ops::Index;

use serde::{Deserialize, Serialize};

use crate::error::SweepError;

/// Unit convention of the values stored in a [`Series`].
///
/// Strategy code always works on fractional changes; `Percent` series are
/// divided by 100 before use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PercentUnits {
    /// `0.01` means +1%.
    #[default]
    Fraction,
    /// `1.0` means +1%.
    Percent,
}

impl PercentUnits {
    pub fn parse(s: &str) -> Result<Self, SweepError> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fraction" => Ok(Self::Fraction),
            "percent" => Ok(Self::Percent),
            other => Err(SweepError::Configuration(format!(
                "unsupported percent units: {other}"
            ))),
        }
    }

    #[inline]
    pub fn scale(self) -> f64 {
        match self {
            Self::Fraction => 1.0,
            Self::Percent => 100.0,
        }
    }
}

/// Ordered, immutable sequence of per-period percent changes.
///
/// Always holds at least one finite value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    values: Vec<f64>,
}

impl Series {
    pub fn new(values: Vec<f64>) -> Result<Self, SweepError> {
        if values.is_empty() {
            return Err(SweepError::InvalidInput("series must not be empty".into()));
        }
        if let Some(i) = values.iter().position(|v| !v.is_finite()) {
            return Err(SweepError::InvalidInput(format!(
                "series value at index {i} is not finite: {}",
                values[i]
            )));
        }
        Ok(Self { values })
    }

    /// Build a change series from raw prices: `(p[i] / p[i-1] - 1) * scale`.
    ///
    /// Day 0 has no predecessor and is set to `0.0`, so the result has the
    /// same length as `prices`.
    pub fn from_prices(prices: &[f64], units: PercentUnits) -> Result<Self, SweepError> {
        if prices.is_empty() {
            return Err(SweepError::InvalidInput("price series must not be empty".into()));
        }
        let mut values = Vec::with_capacity(prices.len());
        values.push(0.0);
        for (i, w) in prices.windows(2).enumerate() {
            if w[0] == 0.0 {
                return Err(SweepError::InvalidInput(format!(
                    "zero price at index {i}, cannot compute change"
                )));
            }
            values.push((w[1] / w[0] - 1.0) * units.scale());
        }
        Self::new(values)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[inline]
    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    /// View this series as fractional changes, converting only when needed.
    pub fn to_fractions(&self, units: PercentUnits) -> Cow<'_, Series> {
        match units {
            PercentUnits::Fraction => Cow::Borrowed(self),
            PercentUnits::Percent => {
                let scale = units.scale();
                Cow::Owned(Series {
                    values: self.values.iter().map(|v| v / scale).collect(),
                })
            }
        }
    }
}

impl Index<usize> for Series {
    type Output = f64;

    #[inline]
    fn index(&self, i: usize) -> &f64 {
        &self.values[i]
    }
}

impl<'de> Deserialize<'de> for Series {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let values = Vec::<f64>::deserialize(deserializer)?;
        Series::new(values).map_err(serde::de::Error::custom)
    }
}
