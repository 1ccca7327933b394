//! The full pipeline over every (subdomain, tolerance) pair.
//!
//! Pairs are independent: each one approximates, extracts and refines on its
//! own, and a failure stops only that pair. Results are merged by a single
//! pass once every pair has finished.

mod result;

use std::fmt;

use rayon::prelude::*;
use strum_macros::IntoStaticStr;

pub use result::{CoverageStats, MultiToleranceResult, ToleranceLevel};

use crate::approx::{Approximant, ErrorReport};
use crate::basis::SampleGrid;
use crate::config::{ConfigError, PipelineConfig};
use crate::critical::{CandidateStatus, CriticalCandidate, Extractor};
use crate::domain::{Domain, OrthantSubdomain, SubdomainId};
use crate::error::Error;
use crate::refine::{
    ApproximantHessian, Classification, HessianSource, RefinedPoint, Refiner,
};
use crate::solve::PolynomialSolver;

/// Progress of one pair through the pipeline.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, IntoStaticStr,
)]
#[strum(serialize_all = "lowercase")]
pub enum Stage {
    Pending,
    Approximated,
    Extracted,
    Refined,
    Merged,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str((*self).into())
    }
}

/// A pair that did not finish, with the last stage it completed.
#[derive(Clone, Debug, PartialEq)]
pub struct StageFailure {
    pub level: usize,
    pub tolerance: f64,
    pub subdomain: SubdomainId,
    pub reached: Stage,
    pub error: String,
}

impl fmt::Display for StageFailure {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "subdomain {} at tolerance {:.1e} failed after {}: {}",
            self.subdomain, self.tolerance, self.reached, self.error
        )
    }
}

/// The outcome of one successful pair.
#[derive(Clone, Debug)]
pub struct PairResult {
    pub level: usize,
    pub tolerance: f64,
    pub subdomain: SubdomainId,
    pub stage: Stage,
    /// Degrees of the approximant that was used.
    pub degrees: Vec<u32>,
    pub error: ErrorReport,
    pub candidates: Vec<CriticalCandidate>,
    /// One refined point per candidate, in candidate order.
    pub points: Vec<RefinedPoint>,
}

impl PairResult {
    /// Whether a minimizer was refined from a candidate close to it.
    pub fn has_captured_minimizer(&self) -> bool {
        self.candidates.iter().zip(&self.points).any(|(c, p)| {
            p.label == Classification::Minimum
                && matches!(
                    c.status,
                    CandidateStatus::Captured | CandidateStatus::Merged
                )
        })
    }
}

/// Runs the pipeline for one objective over one domain.
pub struct Orchestrator<'a, F: ?Sized> {
    domain: &'a Domain,
    config: &'a PipelineConfig,
    solver: &'a dyn PolynomialSolver,
    objective: &'a F,
}

impl<'a, F> Orchestrator<'a, F>
where
    F: Fn(&[f64]) -> f64 + Sync + ?Sized,
{
    /// Checks `config` against `domain`; nothing is sampled on failure.
    pub fn new(
        domain: &'a Domain,
        config: &'a PipelineConfig,
        solver: &'a dyn PolynomialSolver,
        objective: &'a F,
    ) -> Result<Orchestrator<'a, F>, ConfigError> {
        config.validate(domain.dim())?;

        Ok(Orchestrator {
            domain,
            config,
            solver,
            objective,
        })
    }

    /// Fits `domain`, raising the degree until the fit meets `tolerance`.
    pub fn approximate(
        &self,
        domain: &Domain,
        tolerance: f64,
    ) -> Result<(Approximant, ErrorReport), Error> {
        let grid_spec = &self.config.grid;
        let schedule = &grid_spec.degrees;
        let mut degrees = schedule.start.resolve(domain.dim())?;

        loop {
            let grid = SampleGrid::new(
                domain,
                grid_spec.basis,
                &degrees,
                grid_spec.oversample,
            )?;
            let values = grid.sample(self.objective);
            let approximant = Approximant::fit(
                domain,
                grid,
                &degrees,
                &values,
                self.config.precision,
            )?;

            let report = if grid_spec.oversample == 0 {
                ErrorReport::on_validation_grid(&approximant, self.objective)
            } else {
                ErrorReport::on_fit_samples(&approximant, &values)
            };

            if report.meets(tolerance) {
                return Ok((approximant, report));
            }

            let exhausted = schedule.step == 0
                || degrees.iter().all(|&d| d >= schedule.max);

            if exhausted {
                let degree = degrees.iter().copied().max().unwrap_or(0);

                if self.config.require_tolerance {
                    return Err(Error::ToleranceNotMet {
                        tolerance,
                        achieved: report.l2,
                        degree,
                    });
                }

                log::warn!(
                    "{report} misses tolerance {tolerance:.1e} at maximum \
                     degree {degree}"
                );

                return Ok((approximant, report));
            }

            for d in &mut degrees {
                *d = (*d + schedule.step).min(schedule.max).max(*d);
            }

            log::debug!("{report} above {tolerance:.1e}, degrees {degrees:?}");
        }
    }

    /// Runs one pair to completion or to its first failing stage.
    pub fn run_pair(
        &self,
        level: usize,
        tolerance: f64,
        subdomain: &OrthantSubdomain,
    ) -> Result<PairResult, StageFailure> {
        let mut stage = Stage::Pending;

        let fail = |reached: Stage, error: Error| StageFailure {
            level,
            tolerance,
            subdomain: subdomain.id,
            reached,
            error: error.to_string(),
        };

        let (approximant, report) = self
            .approximate(&subdomain.domain, tolerance)
            .map_err(|err| fail(stage, err))?;

        stage = Stage::Approximated;

        let extractor = Extractor::new(self.solver, self.config.extractor)
            .within(self.domain, self.config.partition);
        let mut candidates = extractor
            .extract(&approximant, level, subdomain.id)
            .map_err(|err| fail(stage, err))?;

        stage = Stage::Extracted;

        let model = match self.config.refine.hessian {
            HessianSource::Approximant => Some(
                ApproximantHessian::new(
                    &approximant,
                    self.config.extractor.coefficient_cutoff,
                )
                .map_err(|err| fail(stage, err.into()))?,
            ),
            HessianSource::TrueFunction => None,
        };

        let refiner = Refiner::new(self.config.refine);
        let radius = self.config.refine.capture_radius;

        let points = candidates
            .iter_mut()
            .map(|candidate| {
                let point = refiner.refine_candidate(
                    self.objective,
                    candidate,
                    model.as_ref(),
                );

                let travelled = subdomain
                    .domain
                    .to_reference(&point.coordinates)
                    .iter()
                    .zip(subdomain.domain.to_reference(&candidate.coordinates))
                    .fold(0.0, |m: f64, (a, b)| m.max((a - b).abs()));

                candidate.status = if point.converged() && travelled <= radius
                {
                    CandidateStatus::Captured
                } else {
                    CandidateStatus::Uncaptured
                };

                point
            })
            .collect();

        stage = Stage::Refined;

        log::debug!(
            "subdomain {} at {tolerance:.1e}: {} candidates, {report}",
            subdomain.id,
            candidates.len()
        );

        Ok(PairResult {
            level,
            tolerance,
            subdomain: subdomain.id,
            stage,
            degrees: approximant.degrees().to_vec(),
            error: report,
            candidates,
            points,
        })
    }

    /// Runs every pair and merges the results.
    pub fn run(&self) -> MultiToleranceResult {
        let subdomains = self.domain.partition(self.config.partition);
        let tolerances = &self.config.tolerances;

        log::info!(
            "{} subdomains, {} tolerance levels, {} solver",
            subdomains.len(),
            tolerances.len(),
            self.solver.name()
        );

        let pairs: Vec<(usize, f64, &OrthantSubdomain)> = tolerances
            .iter()
            .enumerate()
            .flat_map(|(level, &tolerance)| {
                subdomains.iter().map(move |sub| (level, tolerance, sub))
            })
            .collect();

        let outcomes = pairs
            .par_iter()
            .map(|&(level, tolerance, subdomain)| {
                self.run_pair(level, tolerance, subdomain)
            })
            .collect();

        MultiToleranceResult::assemble(
            self.domain,
            tolerances,
            subdomains.len(),
            outcomes,
            self.config.merge.tolerance,
            self.config.extractor.boundary_tolerance,
        )
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;
    use crate::config::{DegreeSchedule, DegreeSpec, Partition};
    use crate::poly::PolynomialSystem;
    use crate::solve::{HomotopySolver, Solution, SolverError};

    fn bowl(x: &[f64]) -> f64 {
        (x[0] - 0.3).powi(2) + 2.0 * (x[1] + 0.2).powi(2)
    }

    #[test]
    fn escalates_degree_until_tolerance() {
        let domain = Domain::cube(vec![0.0, 0.0], 1.0).unwrap();
        let mut config = PipelineConfig::default();

        config.grid.degrees = DegreeSchedule {
            start: DegreeSpec::Uniform(2),
            step: 2,
            max: 14,
        };

        let f = |x: &[f64]| (2.0 * x[0]).sin() + x[1] * x[1];
        let solver = HomotopySolver::new();
        let run = Orchestrator::new(&domain, &config, &solver, &f).unwrap();

        let (approximant, report) = run.approximate(&domain, 1e-6).unwrap();

        assert!(report.l2 <= 1e-6);
        assert!(approximant.degrees()[0] > 2);
    }

    #[test]
    fn required_tolerance_fails_pair() {
        let domain = Domain::cube(vec![0.0, 0.0], 1.0).unwrap();
        let mut config = PipelineConfig::default();

        config.grid.degrees = DegreeSchedule {
            start: DegreeSpec::Uniform(2),
            step: 2,
            max: 4,
        };
        config.tolerances = vec![1e-12];
        config.require_tolerance = true;

        let f = |x: &[f64]| (3.0 * x[0]).cos() * x[1].exp();
        let solver = HomotopySolver::new();
        let run = Orchestrator::new(&domain, &config, &solver, &f).unwrap();
        let result = run.run();

        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].reached, Stage::Pending);
        assert!(result.merged.is_empty());
        assert!(result.levels[0].pairs.is_empty());
    }

    #[test]
    fn single_minimum() {
        let domain = Domain::cube(vec![0.0, 0.0], 1.0).unwrap();
        let config = PipelineConfig::default();
        let solver = HomotopySolver::new();
        let run =
            Orchestrator::new(&domain, &config, &solver, &bowl).unwrap();
        let result = run.run();

        assert!(result.failures.is_empty());
        assert_eq!(result.merged.len(), 1);

        let best = result.best_minimum().unwrap();

        assert_abs_diff_eq!(best.coordinates[0], 0.3, epsilon = 1e-7);
        assert_abs_diff_eq!(best.coordinates[1], -0.2, epsilon = 1e-7);
        assert_eq!(result.levels[0].pairs[0].stage, Stage::Merged);
        assert_eq!(
            result.levels[0].pairs[0].candidates[0].status,
            CandidateStatus::Captured
        );
        assert_eq!(result.coverage.subdomains_with_minimizer, 1);
    }

    #[test]
    fn levels_merge_into_one_point() {
        let domain = Domain::cube(vec![0.0, 0.0], 1.0).unwrap();
        let config = PipelineConfig {
            tolerances: vec![1e-2, 1e-6],
            ..PipelineConfig::default()
        };
        let solver = HomotopySolver::new();
        let run =
            Orchestrator::new(&domain, &config, &solver, &bowl).unwrap();
        let result = run.run();

        assert_eq!(result.merged.len(), 1);
        assert_eq!(result.coverage.duplicate_merges, 1);
        assert_eq!(
            result.coverage.points_per_tolerance,
            vec![(1e-2, 1), (1e-6, 1)]
        );

        let statuses: Vec<CandidateStatus> = result
            .levels
            .iter()
            .flat_map(|level| level.candidates())
            .map(|c| c.status)
            .collect();

        assert!(statuses.contains(&CandidateStatus::Merged));
        assert!(statuses.contains(&CandidateStatus::Captured));
    }

    struct Failing;

    impl PolynomialSolver for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn solve(
            &self,
            _: &PolynomialSystem,
        ) -> Result<Vec<Solution>, SolverError> {
            Err(SolverError::Tracking { failed: 4 })
        }
    }

    #[test]
    fn solver_failure_is_recorded_per_pair() {
        let domain = Domain::cube(vec![0.0, 0.0], 1.0).unwrap();
        let config = PipelineConfig {
            partition: Partition::Orthants,
            ..PipelineConfig::default()
        };
        let run =
            Orchestrator::new(&domain, &config, &Failing, &bowl).unwrap();
        let result = run.run();

        assert_eq!(result.failures.len(), 4);
        assert!(result
            .failures
            .iter()
            .all(|failure| failure.reached == Stage::Approximated));
        assert_eq!(result.coverage.subdomains, 4);
        assert_eq!(result.coverage.minimizer_coverage, 0.0);
    }

    #[test]
    fn rejects_bad_configuration() {
        let domain = Domain::cube(vec![0.0, 0.0], 1.0).unwrap();
        let mut config = PipelineConfig::default();

        config.grid.degrees.start = DegreeSpec::Uniform(-1);

        let solver = HomotopySolver::new();

        assert!(matches!(
            Orchestrator::new(&domain, &config, &solver, &bowl),
            Err(ConfigError::NegativeDegree { .. })
        ));
    }
}
