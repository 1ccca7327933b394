use std::fmt;

use crate::approx::ApproximationError;
use crate::config::ConfigError;
use crate::solve::SolverError;

/// Any failure of a pipeline stage.
#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    Config(ConfigError),
    Approximation(ApproximationError),
    Solver(SolverError),
    /// The degree schedule ran out before the fit met its tolerance.
    ToleranceNotMet {
        tolerance: f64,
        achieved: f64,
        degree: u32,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Config(err) => write!(f, "configuration: {err}"),
            Error::Approximation(err) => write!(f, "approximation: {err}"),
            Error::Solver(err) => write!(f, "solver: {err}"),
            Error::ToleranceNotMet {
                tolerance,
                achieved,
                degree,
            } => write!(
                f,
                "l2 error {achieved:.3e} above tolerance {tolerance:.3e} at \
                 maximum degree {degree}"
            ),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Config(err) => Some(err),
            Error::Approximation(err) => Some(err),
            Error::Solver(err) => Some(err),
            Error::ToleranceNotMet { .. } => None,
        }
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::Config(err)
    }
}

impl From<ApproximationError> for Error {
    fn from(err: ApproximationError) -> Self {
        match err {
            ApproximationError::Config(err) => Error::Config(err),
            err => Error::Approximation(err),
        }
    }
}

impl From<SolverError> for Error {
    fn from(err: SolverError) -> Self {
        Error::Solver(err)
    }
}
