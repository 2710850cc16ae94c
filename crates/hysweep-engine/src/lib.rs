pub mod candidates;
pub mod engine;
pub mod metrics;
pub mod parallel;
pub mod partition;
pub mod reducer;

pub use candidates::{CandidateSpace, RandomBounds};
pub use engine::SweepEngine;
pub use metrics::{MetricsCalculator, PathMetrics};
pub use parallel::{CancelToken, ParallelSweepDriver};
pub use partition::{partition, split_sizes};
pub use reducer::{ResultReducer, SweepResult};
