use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::error::SweepError;

/// Market exposure of the simulated portfolio on a given day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Exposure {
    InMarket,
    OutOfMarket,
}

impl Exposure {
    #[inline]
    pub fn is_in_market(self) -> bool {
        matches!(self, Exposure::InMarket)
    }
}

/// What happens to the portfolio value while out of the market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutOfMarketPolicy {
    /// Value is carried forward unchanged.
    #[default]
    Flat,
    /// Value moves by `out_multiplier * change`.
    Scaled,
}

impl OutOfMarketPolicy {
    pub fn parse(s: &str) -> Result<Self, SweepError> {
        match s.trim().to_ascii_lowercase().as_str() {
            "flat" => Ok(Self::Flat),
            "scaled" => Ok(Self::Scaled),
            other => Err(SweepError::Configuration(format!(
                "unsupported out-of-market policy: {other}"
            ))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Flat => "flat",
            Self::Scaled => "scaled",
        }
    }
}

/// One candidate combination of strategy hyperparameters.
///
/// `out_multiplier` only matters under [`OutOfMarketPolicy::Scaled`]; the
/// policy itself is a sweep-level switch and is never inferred from whether
/// the field is present.
///
/// Equality, hashing and ordering are bitwise over the float fields so the
/// record can be deduplicated and used as a map key.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HyperparameterSet {
    pub multiplier: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub out_multiplier: Option<f64>,
    pub pullout_threshold: f64,
    pub backin_threshold: f64,
    pub lookback_days: u32,
}

impl HyperparameterSet {
    pub fn new(
        multiplier: f64,
        pullout_threshold: f64,
        backin_threshold: f64,
        lookback_days: u32,
    ) -> Self {
        Self {
            multiplier,
            out_multiplier: None,
            pullout_threshold,
            backin_threshold,
            lookback_days,
        }
    }

    pub fn with_out_multiplier(mut self, out_multiplier: f64) -> Self {
        self.out_multiplier = Some(out_multiplier);
        self
    }

    /// Check that the record can be simulated under `policy`.
    pub fn validate(&self, policy: OutOfMarketPolicy) -> Result<(), SweepError> {
        let fields = [
            ("multiplier", self.multiplier),
            ("pullout_threshold", self.pullout_threshold),
            ("backin_threshold", self.backin_threshold),
        ];
        for (name, value) in fields {
            if !value.is_finite() {
                return Err(SweepError::InvalidInput(format!(
                    "{name} must be finite, got {value}"
                )));
            }
        }
        match (policy, self.out_multiplier) {
            (OutOfMarketPolicy::Scaled, None) => Err(SweepError::Configuration(
                "scaled out-of-market policy requires out_multiplier".into(),
            )),
            (OutOfMarketPolicy::Scaled, Some(m)) if !m.is_finite() => Err(
                SweepError::InvalidInput(format!("out_multiplier must be finite, got {m}")),
            ),
            _ => Ok(()),
        }
    }

    fn key(&self) -> (u64, Option<u64>, u64, u64, u32) {
        (
            self.multiplier.to_bits(),
            self.out_multiplier.map(f64::to_bits),
            self.pullout_threshold.to_bits(),
            self.backin_threshold.to_bits(),
            self.lookback_days,
        )
    }
}

impl PartialEq for HyperparameterSet {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for HyperparameterSet {}

impl Hash for HyperparameterSet {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl PartialOrd for HyperparameterSet {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HyperparameterSet {
    fn cmp(&self, other: &Self) -> Ordering {
        let out_cmp = match (self.out_multiplier, other.out_multiplier) {
            (Some(a), Some(b)) => a.total_cmp(&b),
            (a, b) => a.is_some().cmp(&b.is_some()),
        };
        self.multiplier
            .total_cmp(&other.multiplier)
            .then(out_cmp)
            .then(self.pullout_threshold.total_cmp(&other.pullout_threshold))
            .then(self.backin_threshold.total_cmp(&other.backin_threshold))
            .then(self.lookback_days.cmp(&other.lookback_days))
    }
}

impl fmt::Display for HyperparameterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "multiplier={:.4}", self.multiplier)?;
        if let Some(out) = self.out_multiplier {
            write!(f, " out_multiplier={:.4}", out)?;
        }
        write!(
            f,
            " pullout={:.4} backin={:.4} lookback={}",
            self.pullout_threshold, self.backin_threshold, self.lookback_days
        )
    }
}

/// A candidate together with its terminal portfolio value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub params: HyperparameterSet,
    pub score: f64,
}

impl EvaluationResult {
    pub fn new(params: HyperparameterSet, score: f64) -> Self {
        Self { params, score }
    }
}
