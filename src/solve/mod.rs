//! Backends for finding the isolated real solutions of polynomial systems.
//!
//! Extraction only sees the [`PolynomialSolver`] trait. The homotopy backend
//! runs in-process and returns floating coordinates. The algebraic backend
//! drives an external process and may return exact rational coordinates.

mod algebraic;
mod homotopy;
mod output;

use std::fmt;
use std::time::Duration;

use malachite::Rational;

pub use algebraic::AlgebraicSolver;
pub use homotopy::{HomotopySolver, TrackerOptions};
pub use output::{parse_output, Coordinate, ParseError, SolverOutput};

use crate::poly::{PolynomialSystem, Structure};
use crate::utils::process::ProcessError;

/// A real solution of a polynomial system.
#[derive(Clone, Debug, PartialEq)]
pub struct Solution {
    pub coordinates: Vec<f64>,
    /// Exact coordinates, when the backend produced them.
    pub exact: Option<Vec<Rational>>,
    /// Largest absolute equation value at `coordinates`.
    pub residual: f64,
}

impl Solution {
    pub fn numeric(
        coordinates: Vec<f64>,
        system: &PolynomialSystem,
    ) -> Solution {
        let residual = system.residual(&coordinates);

        Solution {
            coordinates,
            exact: None,
            residual,
        }
    }

    pub fn is_exact(&self) -> bool {
        self.exact.is_some()
    }
}

pub trait PolynomialSolver: Send + Sync {
    fn name(&self) -> &'static str;

    /// Returns every isolated real solution of `system`.
    ///
    /// A system with no real solutions yields an empty list, not an error.
    fn solve(
        &self,
        system: &PolynomialSystem,
    ) -> Result<Vec<Solution>, SolverError>;
}

/// Screens out systems whose solution set is known from their shape.
///
/// Returns `Ok(false)` when the system cannot have solutions.
fn check_structure(system: &PolynomialSystem) -> Result<bool, SolverError> {
    match system.structure() {
        Structure::Square => Ok(true),
        Structure::Inconsistent => Ok(false),
        Structure::Underdetermined => {
            Err(SolverError::NotZeroDimensional { dimension: None })
        }
    }
}

#[derive(Debug)]
#[non_exhaustive]
pub enum SolverError {
    /// The solution set is not a finite set of points. The dimension is
    /// known when the backend reported it.
    NotZeroDimensional { dimension: Option<i64> },
    TooManyPaths { paths: u64, limit: u64 },
    /// Every homotopy path failed before reaching the target system.
    Tracking { failed: usize },
    Timeout(Duration),
    Process(ProcessError),
    Parse(ParseError),
}

impl fmt::Display for SolverError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SolverError::NotZeroDimensional {
                dimension: Some(dimension),
            } => write!(f, "solution set has dimension {dimension}"),
            SolverError::NotZeroDimensional { dimension: None } => {
                write!(f, "system is not zero-dimensional")
            }
            SolverError::TooManyPaths { paths, limit } => {
                write!(f, "{paths} homotopy paths exceed the limit of {limit}")
            }
            SolverError::Tracking { failed } => {
                write!(f, "all {failed} homotopy paths failed")
            }
            SolverError::Timeout(duration) => {
                write!(f, "solver timed out after {duration:?}")
            }
            SolverError::Process(err) => write!(f, "solver process: {err}"),
            SolverError::Parse(err) => write!(f, "solver output: {err}"),
        }
    }
}

impl std::error::Error for SolverError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SolverError::Process(err) => Some(err),
            SolverError::Parse(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ProcessError> for SolverError {
    fn from(err: ProcessError) -> Self {
        match err {
            ProcessError::Timeout(duration) => SolverError::Timeout(duration),
            err => SolverError::Process(err),
        }
    }
}

impl From<ParseError> for SolverError {
    fn from(err: ParseError) -> Self {
        SolverError::Parse(err)
    }
}
