use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

use crate::error::SweepError;
use crate::params::{HyperparameterSet, OutOfMarketPolicy};
use crate::series::PercentUnits;

/// Top-level sweep config, parsed from one or more TOML files.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct SweepConfig {
    #[serde(default)]
    pub sweep: SweepSection,
    #[serde(default)]
    pub ranges: Option<RangeSection>,
    #[serde(default)]
    pub random: Option<RandomSection>,
    #[serde(default)]
    pub candidates: Vec<CandidateEntry>,
}

impl SweepConfig {
    /// Load config from a TOML file path.
    pub fn from_toml(path: &Path) -> Result<Self, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    /// Parse config from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Load and merge multiple TOML files (later files override earlier).
    pub fn from_toml_files(paths: &[&Path]) -> Result<Self, ConfigError> {
        let (first, rest) = paths
            .split_first()
            .ok_or_else(|| ConfigError::Parse("no config files provided".into()))?;

        let content =
            std::fs::read_to_string(first).map_err(|e| ConfigError::Io(e.to_string()))?;
        let mut base: toml::Value =
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;

        for path in rest {
            let content =
                std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
            let overlay: toml::Value =
                toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;
            merge_toml(&mut base, overlay);
        }

        let merged = toml::to_string(&base).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Self::from_toml_str(&merged)
    }

    pub fn policy(&self) -> Result<OutOfMarketPolicy, SweepError> {
        OutOfMarketPolicy::parse(&self.sweep.policy)
    }

    pub fn units(&self) -> Result<PercentUnits, SweepError> {
        PercentUnits::parse(&self.sweep.units)
    }

    /// Worker count from config, falling back to `default` (typically the
    /// machine's available parallelism, supplied by the caller).
    pub fn resolve_workers(&self, default: usize) -> Result<usize, SweepError> {
        match self.sweep.workers {
            Some(n) if n <= 0 => Err(SweepError::Configuration(format!(
                "worker count must be positive, got {n}"
            ))),
            Some(n) => Ok(n as usize),
            None if default == 0 => Err(SweepError::Configuration(
                "default worker count must be positive".into(),
            )),
            None => Ok(default),
        }
    }
}

fn merge_toml(base: &mut toml::Value, overlay: toml::Value) {
    if let (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) = (base, overlay) {
        for (key, value) in overlay_table {
            if let Some(base_value) = base_table.get_mut(&key) {
                if base_value.is_table() && value.is_table() {
                    merge_toml(base_value, value);
                    continue;
                }
            }
            base_table.insert(key, value);
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SweepSection {
    #[serde(default)]
    pub workers: Option<i64>,
    #[serde(default = "default_policy")]
    pub policy: String,
    #[serde(default = "default_units")]
    pub units: String,
    #[serde(default = "default_10")]
    pub top: usize,
}

impl Default for SweepSection {
    fn default() -> Self {
        Self {
            workers: None,
            policy: default_policy(),
            units: default_units(),
            top: 10,
        }
    }
}

/// Per-field value ranges; their cartesian product is the candidate space.
#[derive(Debug, Clone, Deserialize)]
pub struct RangeSection {
    pub multiplier: FieldRange,
    #[serde(default)]
    pub out_multiplier: Option<FieldRange>,
    pub pullout_threshold: FieldRange,
    pub backin_threshold: FieldRange,
    pub lookback_days: FieldRange,
}

/// Discrete values for one hyperparameter.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum FieldRange {
    /// `steps` evenly spaced points from `low` to `high`, both included.
    Linear { low: f64, high: f64, steps: usize },
    /// An explicit list.
    Values { values: Vec<f64> },
}

impl FieldRange {
    pub fn expand(&self, field: &str) -> Result<Vec<f64>, SweepError> {
        let values = match self {
            FieldRange::Linear { low, high, steps } => param_range(*low, *high, *steps),
            FieldRange::Values { values } => values.clone(),
        };
        if values.is_empty() {
            return Err(SweepError::InvalidInput(format!(
                "value range for {field} is empty"
            )));
        }
        if let Some(v) = values.iter().find(|v| !v.is_finite()) {
            return Err(SweepError::InvalidInput(format!(
                "value range for {field} contains non-finite value {v}"
            )));
        }
        Ok(values)
    }

    /// Expand as whole days: values are rounded and consecutive repeats dropped.
    pub fn expand_days(&self, field: &str) -> Result<Vec<u32>, SweepError> {
        let mut days = Vec::new();
        for v in self.expand(field)? {
            if v < 0.0 {
                return Err(SweepError::InvalidInput(format!(
                    "{field} must be non-negative, got {v}"
                )));
            }
            if v > u32::MAX as f64 {
                return Err(SweepError::InvalidInput(format!("{field} too large: {v}")));
            }
            days.push(v.round() as u32);
        }
        days.dedup();
        Ok(days)
    }
}

/// `num` evenly spaced values from `low` to `high`. The last point is
/// exactly `high`; `num == 1` yields `[high]`.
pub fn param_range(low: f64, high: f64, num: usize) -> Vec<f64> {
    if num == 0 {
        return Vec::new();
    }
    let mut range = Vec::with_capacity(num);
    if num > 1 {
        let delta = (high - low) / (num - 1) as f64;
        range.extend((0..num - 1).map(|i| low + delta * i as f64));
    }
    range.push(high);
    range
}

/// One `[[candidates]]` entry as written in the config file.
///
/// `lookback_days` is read as a signed integer so that a negative value is
/// reported as invalid input rather than a parse failure.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CandidateEntry {
    pub multiplier: f64,
    #[serde(default)]
    pub out_multiplier: Option<f64>,
    pub pullout_threshold: f64,
    pub backin_threshold: f64,
    pub lookback_days: i64,
}

impl CandidateEntry {
    /// `index` is the entry's position in the file, used in error messages.
    pub fn to_params(&self, index: usize) -> Result<HyperparameterSet, SweepError> {
        let lookback_days = u32::try_from(self.lookback_days).map_err(|_| {
            SweepError::InvalidInput(format!(
                "candidates[{index}].lookback_days must be a non-negative day count, got {}",
                self.lookback_days
            ))
        })?;
        Ok(HyperparameterSet {
            multiplier: self.multiplier,
            out_multiplier: self.out_multiplier,
            pullout_threshold: self.pullout_threshold,
            backin_threshold: self.backin_threshold,
            lookback_days,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RandomSection {
    pub count: usize,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_policy() -> String { "flat".into() }
fn default_units() -> String { "fraction".into() }
fn default_10() -> usize { 10 }
fn default_seed() -> u64 { 42 }

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(String),
    #[error("config parse error: {0}")]
    Parse(String),
}

impl From<ConfigError> for SweepError {
    fn from(e: ConfigError) -> Self {
        SweepError::Configuration(e.to_string())
    }
}
