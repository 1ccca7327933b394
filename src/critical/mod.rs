//! Candidate critical points from the gradient of an approximant.

use std::fmt;

use malachite::Rational;
use strum_macros::IntoStaticStr;

use crate::approx::Approximant;
use crate::config::Partition;
use crate::domain::{Domain, SubdomainId};
use crate::error::Error;
use crate::poly::PolynomialSystem;
use crate::solve::{PolynomialSolver, Solution};
use crate::utils::rational::exact_rational;

#[derive(Clone, Copy, Debug)]
pub struct ExtractorConfig {
    /// Relative magnitude below which expansion coefficients are dropped
    /// before differentiation.
    pub coefficient_cutoff: f64,
    /// Allowed excursion outside the subdomain, in reference coordinates.
    pub boundary_tolerance: f64,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        ExtractorConfig {
            coefficient_cutoff: 1e-10,
            boundary_tolerance: 1e-6,
        }
    }
}

/// Identifies a candidate by the pass that produced it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CandidateId {
    /// Index of the tolerance level.
    pub level: usize,
    pub subdomain: SubdomainId,
    pub index: usize,
}

impl fmt::Display for CandidateId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}{}/{}", self.level, self.subdomain, self.index)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum CandidateStatus {
    /// Not yet refined.
    Pending,
    /// Refinement converged near the candidate.
    Captured,
    /// Refined onto a point already found from another candidate.
    Merged,
    /// Refinement failed or wandered off.
    Uncaptured,
}

#[derive(Clone, Debug)]
pub struct CriticalCandidate {
    pub id: CandidateId,
    /// Physical coordinates.
    pub coordinates: Vec<f64>,
    /// Exact physical coordinates, when the solver produced exact ones.
    pub exact: Option<Vec<Rational>>,
    /// Residual of the gradient system at the candidate.
    pub residual: f64,
    pub status: CandidateStatus,
}

impl CriticalCandidate {
    pub fn subdomain(&self) -> SubdomainId {
        self.id.subdomain
    }

    pub fn is_exact(&self) -> bool {
        self.exact.is_some()
    }
}

/// Finds the critical points of approximants with a chosen backend.
pub struct Extractor<'a> {
    solver: &'a dyn PolynomialSolver,
    config: ExtractorConfig,
    region: Option<(&'a Domain, Partition)>,
}

impl<'a> Extractor<'a> {
    pub fn new(
        solver: &'a dyn PolynomialSolver,
        config: ExtractorConfig,
    ) -> Extractor<'a> {
        Extractor {
            solver,
            config,
            region: None,
        }
    }

    /// Keeps only the candidates that `partition` of `domain` assigns to the
    /// subdomain being extracted.
    pub fn within(
        mut self,
        domain: &'a Domain,
        partition: Partition,
    ) -> Extractor<'a> {
        self.region = Some((domain, partition));
        self
    }

    /// The gradient of the approximant's monomial expansion, in reference
    /// coordinates.
    pub fn gradient_system(
        &self,
        approximant: &Approximant,
    ) -> Result<PolynomialSystem, Error> {
        let polynomial =
            approximant.to_polynomial(self.config.coefficient_cutoff)?;

        Ok(PolynomialSystem::gradient(&polynomial))
    }

    /// Solves the gradient system and keeps the solutions inside the
    /// approximant's domain.
    pub fn extract(
        &self,
        approximant: &Approximant,
        level: usize,
        subdomain: SubdomainId,
    ) -> Result<Vec<CriticalCandidate>, Error> {
        let system = self.gradient_system(approximant)?;

        log::debug!(
            "subdomain {subdomain}: solving gradient system of degrees {:?} \
             with {}",
            system.degrees(),
            self.solver.name()
        );

        let solutions = self.solver.solve(&system)?;
        let total = solutions.len();
        let limit = 1.0 + self.config.boundary_tolerance;

        let tolerance = self.config.boundary_tolerance;
        let domain = approximant.domain();

        let candidates: Vec<CriticalCandidate> = solutions
            .into_iter()
            .filter(|s| s.coordinates.iter().all(|xi| xi.abs() <= limit))
            .map(|solution| {
                (domain.to_physical(&solution.coordinates), solution)
            })
            .filter(|(x, _)| match self.region {
                Some((parent, partition)) => {
                    parent.claims(partition, subdomain, x, tolerance)
                }
                None => true,
            })
            .enumerate()
            .map(|(index, (coordinates, solution))| {
                to_candidate(
                    domain,
                    coordinates,
                    solution,
                    CandidateId {
                        level,
                        subdomain,
                        index,
                    },
                )
            })
            .collect();

        log::debug!(
            "subdomain {subdomain}: {} of {total} solutions inside",
            candidates.len()
        );

        Ok(candidates)
    }
}

fn to_candidate(
    domain: &Domain,
    coordinates: Vec<f64>,
    solution: Solution,
    id: CandidateId,
) -> CriticalCandidate {
    let exact = solution.exact.and_then(|xi| exact_physical(domain, &xi));

    CriticalCandidate {
        id,
        coordinates,
        exact,
        residual: solution.residual,
        status: CandidateStatus::Pending,
    }
}

/// Maps exact reference coordinates through the domain's affine map.
fn exact_physical(domain: &Domain, xi: &[Rational]) -> Option<Vec<Rational>> {
    itertools::izip!(xi, domain.center(), domain.scale())
        .map(|(xi, &c, &s)| Some(exact_rational(c)? + exact_rational(s)? * xi))
        .collect()
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;
    use crate::approx::PrecisionKind;
    use crate::basis::{BasisKind, SampleGrid};
    use crate::solve::{HomotopySolver, SolverError};

    fn fit(domain: &Domain, f: &dyn Fn(&[f64]) -> f64) -> Approximant {
        let grid =
            SampleGrid::new(domain, BasisKind::Chebyshev, &[4, 4], 0).unwrap();
        let values = grid.sample(f);

        Approximant::fit(domain, grid, &[4, 4], &values, PrecisionKind::Float64)
            .unwrap()
    }

    #[test]
    fn finds_shifted_minimum() {
        let domain = Domain::new(vec![1.0, -1.0], vec![2.0, 2.0]).unwrap();
        let f = |x: &[f64]| (x[0] - 1.5).powi(2) + (x[1] + 0.5).powi(2);
        let approximant = fit(&domain, &f);

        let solver = HomotopySolver::new();
        let extractor = Extractor::new(&solver, ExtractorConfig::default());
        let candidates =
            extractor.extract(&approximant, 0, SubdomainId(0)).unwrap();

        assert_eq!(candidates.len(), 1);
        assert_abs_diff_eq!(candidates[0].coordinates[0], 1.5, epsilon = 1e-8);
        assert_abs_diff_eq!(candidates[0].coordinates[1], -0.5, epsilon = 1e-8);
        assert_eq!(candidates[0].status, CandidateStatus::Pending);
    }

    #[test]
    fn drops_points_outside() {
        let domain = Domain::cube(vec![0.0, 0.0], 1.0).unwrap();
        // Minimum at (2, 0), outside the box.
        let f = |x: &[f64]| (x[0] - 2.0).powi(2) + x[1] * x[1];
        let approximant = fit(&domain, &f);

        let solver = HomotopySolver::new();
        let extractor = Extractor::new(&solver, ExtractorConfig::default());

        assert!(extractor
            .extract(&approximant, 0, SubdomainId(0))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn constant_direction_is_not_zero_dimensional() {
        let domain = Domain::cube(vec![0.0, 0.0], 1.0).unwrap();
        let f = |x: &[f64]| x[0] * x[0];
        let approximant = fit(&domain, &f);

        let solver = HomotopySolver::new();
        let extractor = Extractor::new(&solver, ExtractorConfig::default());

        assert!(matches!(
            extractor.extract(&approximant, 0, SubdomainId(0)),
            Err(Error::Solver(SolverError::NotZeroDimensional { .. }))
        ));
    }

    #[test]
    fn exact_coordinates_follow_the_domain() {
        let domain = Domain::new(vec![1.0, 0.0], vec![0.5, 2.0]).unwrap();
        let xi = [Rational::from_signeds(1, 2), Rational::from(-1)];

        assert_eq!(
            exact_physical(&domain, &xi),
            Some(vec![Rational::from_signeds(5, 4), Rational::from(-2)])
        );
    }

    #[test]
    fn boundary_point_belongs_to_one_orthant() {
        let whole = Domain::cube(vec![0.0, 0.0], 1.0).unwrap();
        let f = |x: &[f64]| x[0] * x[0] + x[1] * x[1];
        let solver = HomotopySolver::new();

        let counts: Vec<usize> = whole
            .orthants()
            .iter()
            .map(|orthant| {
                let approximant = fit(&orthant.domain, &f);

                Extractor::new(&solver, ExtractorConfig::default())
                    .within(&whole, Partition::Orthants)
                    .extract(&approximant, 0, orthant.id)
                    .unwrap()
                    .len()
            })
            .collect();

        assert_eq!(counts, vec![1, 0, 0, 0]);
    }
}
