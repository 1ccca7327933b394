//! Newton iteration on the gradient.
//!
//! Minima, maxima and saddles are all zeros of the gradient, so the step
//! solves `H d = -g` with the Hessian's eigenvalues pushed away from zero
//! but keeping their signs. Steps are accepted when they decrease `|g|`.

use nalgebra::{DMatrix, DVector};

use super::{ConvergenceReason, RefineConfig};

/// Halvings tried before a step is declared stalled.
const MAX_BACKTRACKS: usize = 30;

/// The end state of a refinement run.
#[derive(Clone, Debug)]
pub(super) struct Trajectory {
    pub point: Vec<f64>,
    pub gradient: Vec<f64>,
    pub iterations: usize,
    pub reason: ConvergenceReason,
}

pub(super) fn norm(v: &[f64]) -> f64 {
    v.iter().map(|x| x * x).sum::<f64>().sqrt()
}

pub(super) fn eigenvalues(hessian: &[Vec<f64>]) -> Vec<f64> {
    let n = hessian.len();

    DMatrix::from_fn(n, n, |i, j| hessian[i][j])
        .symmetric_eigenvalues()
        .iter()
        .copied()
        .collect()
}

/// Solves `H d = -g` with every eigenvalue of `H` at least `floor` in
/// magnitude.
fn newton_step(
    hessian: &[Vec<f64>],
    gradient: &[f64],
    floor: f64,
) -> Vec<f64> {
    let n = gradient.len();
    let eigen =
        DMatrix::from_fn(n, n, |i, j| hessian[i][j]).symmetric_eigen();
    let largest = eigen.eigenvalues.amax();
    let floor = floor.max(largest * f64::EPSILON).max(f64::MIN_POSITIVE);

    let g = DVector::from_column_slice(gradient);
    let projected = eigen.eigenvectors.transpose() * g;

    let scaled = DVector::from_iterator(
        n,
        projected.iter().zip(eigen.eigenvalues.iter()).map(|(p, &lambda)| {
            let magnitude = lambda.abs().max(floor);

            -p / magnitude.copysign(lambda)
        }),
    );

    (eigen.eigenvectors * scaled).iter().copied().collect()
}

pub(super) fn iterate<F, G, H>(
    start: &[f64],
    config: &RefineConfig,
    f: &F,
    grad: G,
    hess: H,
) -> Trajectory
where
    F: Fn(&[f64]) -> f64 + ?Sized,
    G: Fn(&[f64]) -> Vec<f64>,
    H: Fn(&[f64]) -> Vec<Vec<f64>>,
{
    let mut x = start.to_vec();
    let mut g = grad(&x);

    for iteration in 0..config.max_iterations {
        let residual = norm(&g);

        if residual <= config.gradient_tolerance {
            return Trajectory {
                point: x,
                gradient: g,
                iterations: iteration,
                reason: ConvergenceReason::Converged,
            };
        }

        let step =
            newton_step(&hess(&x), &g, config.zero_eigenvalue_tolerance);

        let mut t = 1.0;
        let mut accepted = None;

        for _ in 0..MAX_BACKTRACKS {
            let candidate: Vec<f64> =
                x.iter().zip(&step).map(|(x, d)| x + t * d).collect();

            if f(&candidate).is_finite() {
                let candidate_gradient = grad(&candidate);

                if norm(&candidate_gradient) < residual {
                    accepted = Some((candidate, candidate_gradient));
                    break;
                }
            }

            t /= 2.0;
        }

        let Some((next, next_gradient)) = accepted else {
            return Trajectory {
                point: x,
                gradient: g,
                iterations: iteration,
                reason: ConvergenceReason::Stalled,
            };
        };

        let moved = t * norm(&step);
        let size = 1.0 + norm(&x);

        x = next;
        g = next_gradient;

        if moved <= config.step_tolerance * size
            && norm(&g) > config.gradient_tolerance
        {
            return Trajectory {
                point: x,
                gradient: g,
                iterations: iteration + 1,
                reason: ConvergenceReason::Stalled,
            };
        }
    }

    let reason = if norm(&g) <= config.gradient_tolerance {
        ConvergenceReason::Converged
    } else {
        ConvergenceReason::MaxIterations
    };

    Trajectory {
        point: x,
        gradient: g,
        iterations: config.max_iterations,
        reason,
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    fn saddle_gradient(x: &[f64]) -> Vec<f64> {
        vec![2.0 * (x[0] - 1.0), -2.0 * x[1]]
    }

    fn saddle_hessian(_: &[f64]) -> Vec<Vec<f64>> {
        vec![vec![2.0, 0.0], vec![0.0, -2.0]]
    }

    fn saddle(x: &[f64]) -> f64 {
        (x[0] - 1.0).powi(2) - x[1] * x[1]
    }

    #[test]
    fn converges_to_saddle() {
        let config = RefineConfig::default();
        let run = iterate(
            &[0.3, 0.4],
            &config,
            &saddle,
            saddle_gradient,
            saddle_hessian,
        );

        assert_eq!(run.reason, ConvergenceReason::Converged);
        assert_abs_diff_eq!(run.point[0], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(run.point[1], 0.0, epsilon = 1e-12);
        assert_eq!(run.iterations, 1);
    }

    #[test]
    fn degenerate_minimum_converges() {
        let f = |x: &[f64]| x[0].powi(4);
        let grad = |x: &[f64]| vec![4.0 * x[0].powi(3)];
        let hess = |x: &[f64]| vec![vec![12.0 * x[0] * x[0]]];

        let config = RefineConfig {
            gradient_tolerance: 1e-10,
            zero_eigenvalue_tolerance: 1e-12,
            ..RefineConfig::default()
        };
        let run = iterate(&[0.5], &config, &f, grad, hess);

        assert_eq!(run.reason, ConvergenceReason::Converged);
        assert!(run.point[0].abs() < 1e-3);
    }

    #[test]
    fn runs_out_of_iterations() {
        let f = |x: &[f64]| x[0].powi(4);
        let grad = |x: &[f64]| vec![4.0 * x[0].powi(3)];
        let hess = |x: &[f64]| vec![vec![12.0 * x[0] * x[0]]];

        let config = RefineConfig {
            max_iterations: 2,
            gradient_tolerance: 1e-12,
            ..RefineConfig::default()
        };
        let run = iterate(&[0.5], &config, &f, grad, hess);

        assert_eq!(run.reason, ConvergenceReason::MaxIterations);
        assert_eq!(run.iterations, 2);
    }

    #[test]
    fn no_descent_stalls() {
        // The gradient model points the wrong way everywhere.
        let f = |x: &[f64]| x[0] * x[0];
        let grad = |x: &[f64]| vec![2.0 * x[0] + 1.0];
        let hess = |_: &[f64]| vec![vec![-2.0]];

        let run = iterate(&[0.0], &RefineConfig::default(), &f, grad, hess);

        assert_eq!(run.reason, ConvergenceReason::Stalled);
    }
}
