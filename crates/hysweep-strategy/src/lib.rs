pub mod hysteresis;
pub mod traits;

pub use hysteresis::{HysteresisStrategy, SimulationPath};
pub use traits::{Simulator, SimulatorId};
