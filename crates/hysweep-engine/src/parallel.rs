use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use rayon::prelude::*;

use hysweep_core::{EvaluationResult, HyperparameterSet, Series, SweepError};
use hysweep_strategy::Simulator;

use crate::candidates::CandidateSpace;
use crate::partition::partition;

/// Cooperative cancellation flag shared between a caller and a running sweep.
///
/// Workers check it before every candidate evaluation.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

enum ChunkFailure {
    Failed(SweepError),
    /// Stopped because an earlier candidate in another chunk failed.
    Aborted,
}

/// Evaluate a candidate space across a fixed number of workers.
///
/// Candidates are split into `workers` contiguous chunks of near-equal
/// size. Each chunk runs as its own task on a dedicated rayon pool and
/// results are concatenated in chunk order once every task has finished,
/// so the output order always matches the candidate order.
pub struct ParallelSweepDriver {
    workers: usize,
}

impl ParallelSweepDriver {
    pub fn new(workers: usize) -> Result<Self, SweepError> {
        if workers == 0 {
            return Err(SweepError::Configuration(
                "worker count must be positive".into(),
            ));
        }
        Ok(Self { workers })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Workers actually used for `length` candidates.
    pub fn effective_workers(&self, length: usize) -> usize {
        if length == 0 {
            self.workers
        } else {
            self.workers.min(length)
        }
    }

    /// Evaluate every candidate. The first failure in candidate order fails
    /// the whole run; no partial results are returned.
    pub fn run(
        &self,
        simulator: &dyn Simulator,
        series: &Series,
        space: &CandidateSpace,
        cancel: Option<&CancelToken>,
    ) -> Result<Vec<EvaluationResult>, SweepError> {
        let candidates = space.as_slice();
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let workers = self.effective_workers(candidates.len());
        let chunks = partition(candidates, workers);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("sweep-worker-{i}"))
            .build()
            .map_err(|e| SweepError::Configuration(format!("failed to start workers: {e}")))?;

        // Lowest failing candidate index seen so far. Workers keep going
        // while they are below it so the earliest failure is always found.
        let first_failure = AtomicUsize::new(usize::MAX);
        let outcomes: Vec<Result<Vec<EvaluationResult>, ChunkFailure>> = pool.install(|| {
            chunks
                .par_iter()
                .enumerate()
                .map(|(worker, &(offset, chunk))| {
                    tracing::debug!(worker, offset, size = chunk.len(), "worker started");
                    evaluate_chunk(simulator, series, offset, chunk, cancel, &first_failure)
                })
                .collect()
        });

        let mut results = Vec::with_capacity(candidates.len());
        let mut aborted = false;
        for outcome in outcomes {
            match outcome {
                Ok(chunk_results) => results.extend(chunk_results),
                Err(ChunkFailure::Failed(e)) => return Err(e),
                Err(ChunkFailure::Aborted) => aborted = true,
            }
        }
        if aborted {
            // An abort implies a recorded failure, which returned above.
            return Err(SweepError::Cancelled);
        }
        Ok(results)
    }
}

fn evaluate_chunk(
    simulator: &dyn Simulator,
    series: &Series,
    offset: usize,
    chunk: &[HyperparameterSet],
    cancel: Option<&CancelToken>,
    first_failure: &AtomicUsize,
) -> Result<Vec<EvaluationResult>, ChunkFailure> {
    let mut results = Vec::with_capacity(chunk.len());
    for (k, params) in chunk.iter().enumerate() {
        let index = offset + k;
        if index > first_failure.load(Ordering::Relaxed) {
            return Err(ChunkFailure::Aborted);
        }
        let outcome = if cancel.is_some_and(CancelToken::is_cancelled) {
            Err(SweepError::Cancelled)
        } else {
            simulator.simulate(series, params)
        };
        match outcome {
            Ok(score) => results.push(EvaluationResult::new(*params, score)),
            Err(e) => {
                first_failure.fetch_min(index, Ordering::Relaxed);
                return Err(ChunkFailure::Failed(e.for_candidate(index, *params)));
            }
        }
    }
    Ok(results)
}
