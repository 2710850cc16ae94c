use std::collections::HashSet;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use hysweep_core::config::{RandomSection, RangeSection};
use hysweep_core::{HyperparameterSet, OutOfMarketPolicy, SweepConfig, SweepError};

/// Finite, ordered collection of candidates to evaluate.
///
/// Order carries no meaning for scoring, but it is stable: partitioning and
/// tie-breaking both follow it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidateSpace {
    candidates: Vec<HyperparameterSet>,
}

impl CandidateSpace {
    /// Use an externally produced list as-is.
    pub fn from_list(candidates: Vec<HyperparameterSet>) -> Self {
        Self { candidates }
    }

    /// Cartesian product in nested-loop order, outermost field first:
    /// multiplier, out_multiplier, pullout, back-in, lookback.
    pub fn cartesian(
        multipliers: &[f64],
        out_multipliers: &[Option<f64>],
        pullout_thresholds: &[f64],
        backin_thresholds: &[f64],
        lookback_days: &[u32],
    ) -> Result<Self, SweepError> {
        let fields = [
            ("multiplier", multipliers.len()),
            ("out_multiplier", out_multipliers.len()),
            ("pullout_threshold", pullout_thresholds.len()),
            ("backin_threshold", backin_thresholds.len()),
            ("lookback_days", lookback_days.len()),
        ];
        if let Some((name, _)) = fields.iter().find(|(_, len)| *len == 0) {
            return Err(SweepError::InvalidInput(format!(
                "value range for {name} is empty"
            )));
        }

        let total = fields.iter().map(|(_, len)| len).product();
        let mut candidates = Vec::with_capacity(total);
        for &multiplier in multipliers {
            for &out_multiplier in out_multipliers {
                for &pullout_threshold in pullout_thresholds {
                    for &backin_threshold in backin_thresholds {
                        for &lookback in lookback_days {
                            candidates.push(HyperparameterSet {
                                multiplier,
                                out_multiplier,
                                pullout_threshold,
                                backin_threshold,
                                lookback_days: lookback,
                            });
                        }
                    }
                }
            }
        }
        Ok(Self { candidates })
    }

    /// Expand configured per-field ranges.
    ///
    /// Under the flat policy an `out_multiplier` range would only duplicate
    /// candidates, so it is ignored; the scaled policy requires one.
    pub fn from_ranges(
        ranges: &RangeSection,
        policy: OutOfMarketPolicy,
    ) -> Result<Self, SweepError> {
        let out_multipliers: Vec<Option<f64>> = match (policy, &ranges.out_multiplier) {
            (OutOfMarketPolicy::Scaled, Some(range)) => range
                .expand("out_multiplier")?
                .into_iter()
                .map(Some)
                .collect(),
            (OutOfMarketPolicy::Scaled, None) => {
                return Err(SweepError::Configuration(
                    "scaled out-of-market policy requires an out_multiplier range".into(),
                ))
            }
            (OutOfMarketPolicy::Flat, Some(_)) => {
                tracing::warn!("out_multiplier range ignored under flat out-of-market policy");
                vec![None]
            }
            (OutOfMarketPolicy::Flat, None) => vec![None],
        };

        Self::cartesian(
            &ranges.multiplier.expand("multiplier")?,
            &out_multipliers,
            &ranges.pullout_threshold.expand("pullout_threshold")?,
            &ranges.backin_threshold.expand("backin_threshold")?,
            &ranges.lookback_days.expand_days("lookback_days")?,
        )
    }

    /// Uniform random search, reproducible for a given seed.
    pub fn random(
        bounds: &RandomBounds,
        count: usize,
        seed: u64,
        policy: OutOfMarketPolicy,
    ) -> Result<Self, SweepError> {
        bounds.validate()?;
        let mut rng = StdRng::seed_from_u64(seed);
        let candidates = (0..count)
            .map(|_| {
                let multiplier =
                    rng.gen_range(bounds.multiplier.0..=bounds.multiplier.1) as f64;
                let out_multiplier = match policy {
                    OutOfMarketPolicy::Scaled => {
                        Some(rng.gen_range(bounds.out_multiplier.0..bounds.out_multiplier.1))
                    }
                    OutOfMarketPolicy::Flat => None,
                };
                HyperparameterSet {
                    multiplier,
                    out_multiplier,
                    pullout_threshold: rng.gen_range(bounds.threshold.0..bounds.threshold.1),
                    backin_threshold: rng.gen_range(bounds.threshold.0..bounds.threshold.1),
                    lookback_days: rng.gen_range(bounds.lookback_days.0..=bounds.lookback_days.1),
                }
            })
            .collect();
        Ok(Self { candidates })
    }

    /// Build from config. An explicit list wins over random search, which
    /// wins over ranges.
    pub fn from_config(
        config: &SweepConfig,
        policy: OutOfMarketPolicy,
    ) -> Result<Self, SweepError> {
        if !config.candidates.is_empty() {
            let mut candidates = config
                .candidates
                .iter()
                .enumerate()
                .map(|(i, entry)| entry.to_params(i))
                .collect::<Result<Vec<_>, _>>()?;
            if policy == OutOfMarketPolicy::Flat {
                let stripped = candidates
                    .iter_mut()
                    .filter_map(|c| c.out_multiplier.take())
                    .count();
                if stripped > 0 {
                    tracing::warn!(
                        stripped,
                        "out_multiplier ignored on candidates under flat out-of-market policy"
                    );
                }
            }
            return Ok(Self::from_list(candidates));
        }
        if let Some(RandomSection { count, seed }) = &config.random {
            return Self::random(&RandomBounds::default(), *count, *seed, policy);
        }
        match &config.ranges {
            Some(ranges) => Self::from_ranges(ranges, policy),
            None => Err(SweepError::Configuration(
                "no candidates, random or ranges section configured".into(),
            )),
        }
    }

    /// Drop repeated candidates, keeping the first occurrence of each.
    pub fn dedup(mut self) -> Self {
        let mut seen = HashSet::with_capacity(self.candidates.len());
        self.candidates.retain(|c| seen.insert(*c));
        self
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    #[inline]
    pub fn as_slice(&self) -> &[HyperparameterSet] {
        &self.candidates
    }

    pub fn iter(&self) -> std::slice::Iter<'_, HyperparameterSet> {
        self.candidates.iter()
    }
}

impl From<Vec<HyperparameterSet>> for CandidateSpace {
    fn from(candidates: Vec<HyperparameterSet>) -> Self {
        Self::from_list(candidates)
    }
}

/// Sampling bounds for [`CandidateSpace::random`].
///
/// Integer bounds are inclusive; float bounds are half-open.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RandomBounds {
    pub multiplier: (i32, i32),
    pub out_multiplier: (f64, f64),
    pub threshold: (f64, f64),
    pub lookback_days: (u32, u32),
}

impl RandomBounds {
    fn validate(&self) -> Result<(), SweepError> {
        let float_ok = |(lo, hi): (f64, f64)| lo.is_finite() && hi.is_finite() && lo < hi;
        if self.multiplier.0 > self.multiplier.1
            || self.lookback_days.0 > self.lookback_days.1
            || !float_ok(self.out_multiplier)
            || !float_ok(self.threshold)
        {
            return Err(SweepError::InvalidInput(format!(
                "invalid random bounds: {self:?}"
            )));
        }
        Ok(())
    }
}

impl Default for RandomBounds {
    fn default() -> Self {
        Self {
            multiplier: (1, 3),
            out_multiplier: (0.0, 1.0),
            threshold: (0.8, 1.2),
            lookback_days: (0, 20),
        }
    }
}
