use hysweep_core::{HyperparameterSet, Series, SweepError};

/// Unique simulator identifier.
pub type SimulatorId = &'static str;

/// Pure-function evaluation of one candidate against a series.
///
/// Implementations must be Send + Sync so a single instance can be shared
/// by every sweep worker without locking.
pub trait Simulator: Send + Sync {
    /// Terminal portfolio value for `params`, starting from `1.0` on day 0.
    fn simulate(&self, series: &Series, params: &HyperparameterSet) -> Result<f64, SweepError>;

    fn id(&self) -> SimulatorId;
}
