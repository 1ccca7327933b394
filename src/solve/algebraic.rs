//! Driver for an external Groebner-basis solver.
//!
//! The system is written to the solver's standard input as a line of
//! variable names, the field characteristic `0`, and one polynomial per
//! line, comma-terminated except the last. The solver's standard output is
//! parsed by [`parse_output`].

use std::ffi::OsString;
use std::fmt::Write;
use std::time::Duration;

use super::output::{parse_output, Coordinate, SolverOutput};
use super::{check_structure, PolynomialSolver, Solution, SolverError};
use crate::poly::PolynomialSystem;
use crate::utils::process;
use crate::utils::rational::to_f64;

#[derive(Clone, Debug)]
pub struct AlgebraicSolver {
    program: OsString,
    args: Vec<OsString>,
    timeout: Option<Duration>,
}

impl AlgebraicSolver {
    pub fn new<P: Into<OsString>>(program: P) -> AlgebraicSolver {
        AlgebraicSolver {
            program: program.into(),
            args: Vec::new(),
            timeout: None,
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> AlgebraicSolver
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Kills the solver and fails the solve after `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> AlgebraicSolver {
        self.timeout = Some(timeout);
        self
    }

    /// Renders `system` in the solver's input format.
    pub fn render(system: &PolynomialSystem) -> String {
        let mut input = system.variable_names().join(",");

        input.push_str("\n0\n");

        let count = system.equations().len();

        for (i, equation) in system.equations().iter().enumerate() {
            let separator = if i + 1 < count { "," } else { "" };

            // Writing to a String cannot fail.
            let _ = writeln!(input, "{equation}{separator}");
        }

        input
    }
}

impl PolynomialSolver for AlgebraicSolver {
    fn name(&self) -> &'static str {
        "algebraic"
    }

    fn solve(
        &self,
        system: &PolynomialSystem,
    ) -> Result<Vec<Solution>, SolverError> {
        if !check_structure(system)? {
            return Ok(Vec::new());
        }

        let input = AlgebraicSolver::render(system);

        log::debug!(
            "running {} on {} equations",
            self.program.to_string_lossy(),
            system.equations().len()
        );

        let output = process::run(
            &self.program,
            &self.args,
            input.as_bytes(),
            self.timeout,
        )?;

        let points = match parse_output(&output, system.nvars())? {
            SolverOutput::Empty => return Ok(Vec::new()),
            SolverOutput::PositiveDimensional(dimension) => {
                return Err(SolverError::NotZeroDimensional {
                    dimension: Some(dimension),
                })
            }
            SolverOutput::Points(points) => points,
        };

        let solutions = points
            .into_iter()
            .map(|point| {
                let coordinates: Vec<f64> =
                    point.iter().map(Coordinate::to_f64).collect();
                let exact = point
                    .iter()
                    .map(|c| c.exact().cloned())
                    .collect::<Option<Vec<_>>>();

                let residual = match &exact {
                    Some(exact) => system
                        .equations()
                        .iter()
                        .map(|p| to_f64(&p.eval_exact(exact)).abs())
                        .fold(0.0, f64::max),
                    None => system.residual(&coordinates),
                };

                Solution {
                    coordinates,
                    exact,
                    residual,
                }
            })
            .collect();

        Ok(solutions)
    }
}

#[cfg(test)]
mod tests {
    use malachite::Rational;

    use super::*;
    use crate::poly::Polynomial;
    use crate::solve::ParseError;

    fn system() -> PolynomialSystem {
        // grad(x0^2 - x0 + x1^2 / 2) = (2 x0 - 1, x1)
        let p = Polynomial::from_terms(
            2,
            [
                ([2u32, 0], Rational::from(1)),
                ([1, 0], Rational::from(-1)),
                ([0, 2], Rational::from_signeds(1, 2)),
            ],
        );

        PolynomialSystem::gradient(&p)
    }

    #[test]
    fn renders_input() {
        assert_eq!(
            AlgebraicSolver::render(&system()),
            "x0,x1\n0\n2*x0-1,\nx1\n"
        );
    }

    #[cfg(unix)]
    fn scripted(output: &str) -> AlgebraicSolver {
        let script = format!("cat >/dev/null; printf '{output}'");

        AlgebraicSolver::new("sh").with_args(["-c", script.as_str()])
    }

    #[cfg(unix)]
    #[test]
    fn exact_solutions() {
        let solver = scripted("dimension 0\\nsolutions 1\\n1/2 0\\n");
        let solutions = solver.solve(&system()).unwrap();

        assert_eq!(solutions.len(), 1);
        assert_eq!(solutions[0].coordinates, vec![0.5, 0.0]);
        assert_eq!(
            solutions[0].exact,
            Some(vec![Rational::from_signeds(1, 2), Rational::from(0)])
        );
        assert_eq!(solutions[0].residual, 0.0);
    }

    #[cfg(unix)]
    #[test]
    fn reports_malformed_output() {
        let solver = scripted("dimension 0\\nsolutions 1\\n0.5\\n");

        assert!(matches!(
            solver.solve(&system()),
            Err(SolverError::Parse(_))
        ));

        let solver = scripted("");

        assert!(matches!(
            solver.solve(&system()),
            Err(SolverError::Parse(ParseError::Empty))
        ));

        let solver = scripted("dimension 1\\n");

        assert!(matches!(
            solver.solve(&system()),
            Err(SolverError::NotZeroDimensional { dimension: Some(1) })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn times_out() {
        let solver = AlgebraicSolver::new("sh")
            .with_args(["-c", "exec sleep 5"])
            .with_timeout(Duration::from_millis(50));

        assert!(matches!(
            solver.solve(&system()),
            Err(SolverError::Timeout(_))
        ));
    }
}
