pub mod config;
pub mod error;
pub mod params;
pub mod series;
pub mod table;
pub mod window;

pub use config::{CandidateEntry, ConfigError, FieldRange, RangeSection, SweepConfig};
pub use error::{ErrorKind, SweepError};
pub use params::{EvaluationResult, Exposure, HyperparameterSet, OutOfMarketPolicy};
pub use series::{PercentUnits, Series};
pub use table::{load_cached, NumericTable, TableError};
pub use window::GrowthWindow;
