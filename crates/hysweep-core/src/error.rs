use thiserror::Error;

use crate::params::HyperparameterSet;

/// Category of a sweep failure, independent of which candidate caused it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    Configuration,
    EmptyInput,
    Cancelled,
}

#[derive(Debug, Error)]
pub enum SweepError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("empty input: {0}")]
    EmptyInput(String),

    #[error("sweep cancelled")]
    Cancelled,

    /// A single candidate evaluation failed and aborted the sweep.
    #[error("candidate #{index} ({params}) failed: {source}")]
    Candidate {
        index: usize,
        params: HyperparameterSet,
        #[source]
        source: Box<SweepError>,
    },
}

impl SweepError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SweepError::InvalidInput(_) => ErrorKind::InvalidInput,
            SweepError::Configuration(_) => ErrorKind::Configuration,
            SweepError::EmptyInput(_) => ErrorKind::EmptyInput,
            SweepError::Cancelled => ErrorKind::Cancelled,
            SweepError::Candidate { source, .. } => source.kind(),
        }
    }

    /// Wrap an evaluation failure with the candidate that produced it.
    pub fn for_candidate(self, index: usize, params: HyperparameterSet) -> Self {
        match self {
            already @ SweepError::Candidate { .. } => already,
            SweepError::Cancelled => SweepError::Cancelled,
            other => SweepError::Candidate {
                index,
                params,
                source: Box::new(other),
            },
        }
    }

    /// The failing candidate, when the error can be attributed to one.
    pub fn candidate(&self) -> Option<(usize, &HyperparameterSet)> {
        match self {
            SweepError::Candidate { index, params, .. } => Some((*index, params)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_wrapper_keeps_kind() {
        let params = HyperparameterSet::new(1.0, 0.9, 1.1, 3);
        let err = SweepError::InvalidInput("bad".into()).for_candidate(7, params);
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        let (index, p) = err.candidate().unwrap();
        assert_eq!(index, 7);
        assert_eq!(*p, params);
        assert!(err.to_string().contains("candidate #7"));
    }

    #[test]
    fn test_cancelled_is_not_attributed() {
        let params = HyperparameterSet::new(1.0, 0.9, 1.1, 3);
        let err = SweepError::Cancelled.for_candidate(0, params);
        assert!(matches!(err, SweepError::Cancelled));
    }
}
