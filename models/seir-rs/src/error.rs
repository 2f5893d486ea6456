use epiproj_mrp::ProtocolError;
use thiserror::Error;

/// Rejections raised before a projection starts.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProjectionError {
    #[error("invalid parameter {name}: {value} is not {expected}")]
    InvalidParameter {
        name: &'static str,
        value: f64,
        expected: &'static str,
    },

    #[error("initialCases ({initial_cases}) exceeds populationSize ({population_size})")]
    InitialCasesExceedPopulation {
        initial_cases: u64,
        population_size: u64,
    },
}

impl ProjectionError {
    pub(crate) fn invalid(name: &'static str, value: f64, expected: &'static str) -> Self {
        Self::InvalidParameter {
            name,
            value,
            expected,
        }
    }
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error("run request has no model input")]
    MissingInput,

    #[error(transparent)]
    Projection(#[from] ProjectionError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}
