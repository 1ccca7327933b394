//! Local refinement of candidates against the true objective, and
//! classification of the points found.

mod dedup;
mod derivatives;
mod newton;

use strum_macros::{EnumString, IntoStaticStr};

pub use dedup::{deduplicate, Deduplication};
pub use derivatives::{gradient, hessian, ApproximantHessian};

use crate::critical::{CandidateId, CriticalCandidate};

/// Where the Hessian used for Newton steps and classification comes from.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, EnumString, IntoStaticStr,
)]
#[strum(serialize_all = "lowercase")]
pub enum HessianSource {
    /// Finite differences of the objective.
    #[default]
    #[strum(serialize = "function")]
    TrueFunction,
    /// Second derivatives of the approximant the candidate came from.
    Approximant,
}

#[derive(Clone, Copy, Debug)]
pub struct RefineConfig {
    pub max_iterations: usize,
    /// Gradient norm at which a point counts as stationary.
    pub gradient_tolerance: f64,
    /// Relative step length below which a run without a small gradient is
    /// stalled.
    pub step_tolerance: f64,
    /// Eigenvalues at most this large in magnitude count as zero.
    pub zero_eigenvalue_tolerance: f64,
    /// Largest distance, in reference units of the candidate's subdomain,
    /// between a candidate and its refined point for the candidate to count
    /// as captured.
    pub capture_radius: f64,
    pub hessian: HessianSource,
}

impl Default for RefineConfig {
    fn default() -> Self {
        RefineConfig {
            max_iterations: 50,
            gradient_tolerance: 1e-8,
            step_tolerance: 1e-12,
            zero_eigenvalue_tolerance: 1e-6,
            capture_radius: 0.1,
            hessian: HessianSource::default(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum Classification {
    Minimum,
    Maximum,
    Saddle,
    /// Some Hessian eigenvalue is too close to zero to tell.
    Indeterminate,
}

impl Classification {
    /// Classifies a stationary point by the signs of its Hessian's
    /// eigenvalues.
    pub fn from_eigenvalues(
        eigenvalues: &[f64],
        zero: f64,
    ) -> Classification {
        if eigenvalues.iter().any(|l| !(l.abs() > zero)) {
            Classification::Indeterminate
        } else if eigenvalues.iter().all(|&l| l > 0.0) {
            Classification::Minimum
        } else if eigenvalues.iter().all(|&l| l < 0.0) {
            Classification::Maximum
        } else {
            Classification::Saddle
        }
    }
}

/// Why refinement stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, IntoStaticStr)]
#[strum(serialize_all = "kebab-case")]
pub enum ConvergenceReason {
    /// The gradient norm fell below the tolerance.
    Converged,
    /// Steps became too small, or stopped reducing the gradient, first.
    Stalled,
    MaxIterations,
}

#[derive(Clone, Debug)]
pub struct RefinedPoint {
    pub candidate: CandidateId,
    pub coordinates: Vec<f64>,
    pub value: f64,
    pub gradient_norm: f64,
    /// Hessian eigenvalues in ascending order.
    pub eigenvalues: Vec<f64>,
    pub label: Classification,
    pub reason: ConvergenceReason,
    pub iterations: usize,
}

impl RefinedPoint {
    pub fn converged(&self) -> bool {
        self.reason == ConvergenceReason::Converged
    }

    /// Euclidean distance to another point.
    pub fn distance(&self, other: &[f64]) -> f64 {
        self.coordinates
            .iter()
            .zip(other)
            .map(|(a, b)| (a - b) * (a - b))
            .sum::<f64>()
            .sqrt()
    }
}

/// Refines candidates and classifies the results.
pub struct Refiner {
    config: RefineConfig,
}

impl Refiner {
    pub fn new(config: RefineConfig) -> Refiner {
        Refiner { config }
    }

    pub fn config(&self) -> &RefineConfig {
        &self.config
    }

    /// Refines from `start` against `f`.
    ///
    /// `approximant` supplies the Hessian when the configuration asks for
    /// it; without one, finite differences of `f` are used.
    pub fn refine<F>(
        &self,
        f: &F,
        start: &[f64],
        candidate: CandidateId,
        approximant: Option<&ApproximantHessian>,
    ) -> RefinedPoint
    where
        F: Fn(&[f64]) -> f64 + ?Sized,
    {
        let model = match self.config.hessian {
            HessianSource::Approximant => approximant,
            HessianSource::TrueFunction => None,
        };

        let hess = |x: &[f64]| match model {
            Some(model) => model.at(x),
            None => hessian(f, x),
        };

        let run = newton::iterate(
            start,
            &self.config,
            f,
            |x: &[f64]| gradient(f, x),
            &hess,
        );

        let eigenvalues = {
            let mut values = newton::eigenvalues(&hess(&run.point));

            values.sort_by(f64::total_cmp);
            values
        };

        let label = Classification::from_eigenvalues(
            &eigenvalues,
            self.config.zero_eigenvalue_tolerance,
        );

        if run.reason != ConvergenceReason::Converged {
            log::debug!(
                "candidate {candidate}: {} after {} iterations",
                <&'static str>::from(run.reason),
                run.iterations
            );
        }

        RefinedPoint {
            candidate,
            value: f(&run.point),
            gradient_norm: newton::norm(&run.gradient),
            coordinates: run.point,
            eigenvalues,
            label,
            reason: run.reason,
            iterations: run.iterations,
        }
    }

    /// Refines an extracted candidate.
    pub fn refine_candidate<F>(
        &self,
        f: &F,
        candidate: &CriticalCandidate,
        approximant: Option<&ApproximantHessian>,
    ) -> RefinedPoint
    where
        F: Fn(&[f64]) -> f64 + ?Sized,
    {
        self.refine(f, &candidate.coordinates, candidate.id, approximant)
    }
}
