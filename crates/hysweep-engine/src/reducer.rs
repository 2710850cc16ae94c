use serde::Serialize;

use hysweep_core::{EvaluationResult, SweepError};

/// Outcome of a sweep: the winning candidate plus every evaluation in
/// candidate order.
#[derive(Debug, Clone, Serialize)]
pub struct SweepResult {
    pub best: EvaluationResult,
    pub results: Vec<EvaluationResult>,
}

impl SweepResult {
    pub fn from_results(results: Vec<EvaluationResult>) -> Result<Self, SweepError> {
        let best = ResultReducer::best(&results)?;
        Ok(Self { best, results })
    }

    /// The `k` highest scores, best first. Equal scores keep candidate order.
    pub fn top(&self, k: usize) -> Vec<EvaluationResult> {
        let mut ranked = self.results.clone();
        // Stable sort; NaN scores sink to the bottom.
        ranked.sort_by(|a, b| match (a.score.is_nan(), b.score.is_nan()) {
            (false, false) => b.score.total_cmp(&a.score),
            (x, y) => x.cmp(&y),
        });
        ranked.truncate(k);
        ranked
    }
}

pub struct ResultReducer;

impl ResultReducer {
    /// Highest-scoring result. Ties keep the earliest result, and a NaN score
    /// never beats a real one.
    pub fn best(results: &[EvaluationResult]) -> Result<EvaluationResult, SweepError> {
        let mut best: Option<&EvaluationResult> = None;
        for result in results {
            let replace = match best {
                None => true,
                Some(current) => {
                    result.score > current.score
                        || (current.score.is_nan() && !result.score.is_nan())
                }
            };
            if replace {
                best = Some(result);
            }
        }
        best.copied()
            .ok_or_else(|| SweepError::EmptyInput("no results to reduce".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hysweep_core::{ErrorKind, HyperparameterSet};

    fn params(lookback: u32) -> HyperparameterSet {
        HyperparameterSet::new(1.0, 0.9, 1.1, lookback)
    }

    #[test]
    fn test_best_earliest_tie() {
        let results = vec![
            EvaluationResult::new(params(1), 0.5),
            EvaluationResult::new(params(2), 2.0),
            EvaluationResult::new(params(3), 2.0),
        ];
        let best = ResultReducer::best(&results).unwrap();
        assert_eq!(best.params, params(2));
        assert_eq!(best.score, 2.0);
    }

    #[test]
    fn test_best_empty() {
        let err = ResultReducer::best(&[]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EmptyInput);
    }

    #[test]
    fn test_best_all_non_positive() {
        // A zero-initialized running best would report nothing useful here.
        let results = vec![
            EvaluationResult::new(params(1), -0.3),
            EvaluationResult::new(params(2), -0.1),
            EvaluationResult::new(params(3), 0.0),
            EvaluationResult::new(params(4), -0.2),
        ];
        let best = ResultReducer::best(&results).unwrap();
        assert_eq!(best.params, params(3));

        let negative = vec![EvaluationResult::new(params(9), -1.0)];
        assert_eq!(ResultReducer::best(&negative).unwrap().params, params(9));
    }

    #[test]
    fn test_best_skips_nan() {
        let results = vec![
            EvaluationResult::new(params(1), f64::NAN),
            EvaluationResult::new(params(2), 0.7),
            EvaluationResult::new(params(3), f64::NAN),
        ];
        assert_eq!(ResultReducer::best(&results).unwrap().params, params(2));
    }

    #[test]
    fn test_top_k() {
        let result = SweepResult::from_results(vec![
            EvaluationResult::new(params(1), 1.0),
            EvaluationResult::new(params(2), 3.0),
            EvaluationResult::new(params(3), f64::NAN),
            EvaluationResult::new(params(4), 3.0),
            EvaluationResult::new(params(5), 2.0),
        ])
        .unwrap();
        assert_eq!(result.best.params, params(2));

        let top: Vec<u32> = result.top(4).iter().map(|r| r.params.lookback_days).collect();
        assert_eq!(top, vec![2, 4, 5, 1]);
        assert_eq!(result.top(100).len(), 5);
    }
}
