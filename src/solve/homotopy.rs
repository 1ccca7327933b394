//! Total-degree homotopy continuation.
//!
//! Each equation `f_i` of total degree `d_i` is paired with the start
//! equation `g_i = x_i^d_i - 1`, whose solutions are tuples of roots of
//! unity. The paths of `H(x, t) = (1 - t) * gamma * G(x) + t * F(x)` are
//! tracked from `t = 0` to `t = 1` with an Euler predictor and a Newton
//! corrector. A generic complex `gamma` keeps the paths away from
//! singularities with probability one.

use std::f64::consts::PI;

use itertools::Itertools;
use nalgebra::{Complex, DMatrix, DVector};
use rayon::prelude::*;

use super::{check_structure, PolynomialSolver, Solution, SolverError};
use crate::poly::{Polynomial, PolynomialSystem};
use crate::utils::rational::{exact_rational, to_f64};

type C64 = Complex<f64>;

#[derive(Clone, Debug)]
pub struct TrackerOptions {
    pub initial_step: f64,
    pub max_step: f64,
    pub min_step: f64,
    pub max_steps: usize,
    pub corrector_iterations: usize,
    pub corrector_tolerance: f64,
    /// Paths whose norm exceeds this are going to infinity.
    pub divergence_bound: f64,
    /// Paths failing beyond this `t` are still handed to the endgame.
    pub endgame_start: f64,
    /// Endpoints with a larger imaginary part are not real solutions.
    pub imaginary_tolerance: f64,
    pub max_paths: u64,
}

impl Default for TrackerOptions {
    fn default() -> Self {
        TrackerOptions {
            initial_step: 0.01,
            max_step: 0.05,
            min_step: 1e-9,
            max_steps: 20_000,
            corrector_iterations: 3,
            corrector_tolerance: 1e-10,
            divergence_bound: 1e7,
            endgame_start: 0.9,
            imaginary_tolerance: 1e-6,
            max_paths: 100_000,
        }
    }
}

#[derive(Clone, Debug)]
pub struct HomotopySolver {
    gamma: C64,
    options: TrackerOptions,
}

impl Default for HomotopySolver {
    fn default() -> Self {
        HomotopySolver::new()
    }
}

impl HomotopySolver {
    pub fn new() -> HomotopySolver {
        // Unit modulus, off the real axis.
        HomotopySolver {
            gamma: C64::from_polar(1.0, 2.0 * PI * 0.618_033_988_749_895),
            options: TrackerOptions::default(),
        }
    }

    /// Uses a different start parameter, e.g. to retry after path failures.
    pub fn with_gamma(mut self, gamma: C64) -> HomotopySolver {
        self.gamma = gamma;
        self
    }

    pub fn with_options(mut self, options: TrackerOptions) -> HomotopySolver {
        self.options = options;
        self
    }

    pub fn gamma(&self) -> C64 {
        self.gamma
    }

    pub fn options(&self) -> &TrackerOptions {
        &self.options
    }
}

impl PolynomialSolver for HomotopySolver {
    fn name(&self) -> &'static str {
        "homotopy"
    }

    fn solve(
        &self,
        system: &PolynomialSystem,
    ) -> Result<Vec<Solution>, SolverError> {
        if !check_structure(system)? {
            return Ok(Vec::new());
        }

        let target = Target::new(system);
        let degrees = system.degrees();

        let paths = degrees
            .iter()
            .try_fold(1u64, |acc, &d| acc.checked_mul(u64::from(d)))
            .unwrap_or(u64::MAX);

        if paths > self.options.max_paths {
            return Err(SolverError::TooManyPaths {
                paths,
                limit: self.options.max_paths,
            });
        }

        let starts = start_points(&degrees);
        let tracker = Tracker {
            target: &target,
            degrees: &degrees,
            gamma: self.gamma,
            options: &self.options,
        };

        log::debug!("tracking {} paths", starts.len());

        let endpoints: Vec<Option<Vec<C64>>> =
            starts.into_par_iter().map(|start| tracker.run(start)).collect();

        let failed = endpoints.iter().filter(|e| e.is_none()).count();

        if failed > 0 {
            log::debug!("{failed} of {} paths failed", endpoints.len());
        }

        if failed == endpoints.len() && failed > 0 {
            return Err(SolverError::Tracking { failed });
        }

        let mut solutions: Vec<Solution> = endpoints
            .into_iter()
            .flatten()
            .filter(|z| {
                z.iter().all(|zi| {
                    zi.im.abs()
                        <= self.options.imaginary_tolerance * zi.norm().max(1.0)
                })
            })
            .map(|z| {
                let x = z.iter().map(|zi| zi.re).collect();

                Solution::numeric(target.polish_real(x), system)
            })
            .collect();

        if let Some(solution) = solutions
            .iter()
            .find(|s| target.on_solution_curve(&s.coordinates))
        {
            log::debug!(
                "endpoint {:?} is not isolated",
                solution.coordinates
            );

            return Err(SolverError::NotZeroDimensional { dimension: None });
        }

        dedup(&mut solutions);

        Ok(solutions)
    }
}

/// The target system in floating point, with each equation scaled to unit
/// largest coefficient.
struct Target {
    equations: Vec<Vec<(Vec<u32>, f64)>>,
    jacobian: Vec<Vec<Vec<(Vec<u32>, f64)>>>,
}

impl Target {
    fn new(system: &PolynomialSystem) -> Target {
        let scaled: Vec<Polynomial> = system
            .equations()
            .iter()
            .map(|p| {
                let largest = p.max_coefficient();

                match exact_rational(1.0 / largest) {
                    Some(factor) if largest > 0.0 => p.scale(&factor),
                    _ => p.clone(),
                }
            })
            .collect();

        let numeric = |p: &Polynomial| -> Vec<(Vec<u32>, f64)> {
            p.terms().map(|(e, c)| (e.to_vec(), to_f64(c))).collect()
        };

        let jacobian = scaled
            .iter()
            .map(|p| {
                (0..system.nvars())
                    .map(|j| numeric(&p.derivative(j)))
                    .collect()
            })
            .collect();

        Target {
            equations: scaled.iter().map(numeric).collect(),
            jacobian,
        }
    }

    fn eval(&self, z: &[C64]) -> DVector<C64> {
        DVector::from_iterator(
            self.equations.len(),
            self.equations.iter().map(|terms| eval_terms(terms, z)),
        )
    }

    fn jacobian(&self, z: &[C64]) -> DMatrix<C64> {
        let n = self.equations.len();

        DMatrix::from_fn(n, n, |i, j| eval_terms(&self.jacobian[i][j], z))
    }

    fn eval_real(&self, x: &[f64]) -> DVector<f64> {
        let z: Vec<C64> = x.iter().map(|&xi| C64::new(xi, 0.0)).collect();

        self.eval(&z).map(|v| v.re)
    }

    fn jacobian_real(&self, x: &[f64]) -> DMatrix<f64> {
        let z: Vec<C64> = x.iter().map(|&xi| C64::new(xi, 0.0)).collect();

        self.jacobian(&z).map(|v| v.re)
    }

    /// Newton's method on the target system, in complex arithmetic.
    fn polish(&self, mut z: Vec<C64>) -> (Vec<C64>, bool) {
        const ITERATIONS: usize = 30;

        for _ in 0..ITERATIONS {
            let Some(delta) = self.jacobian(&z).lu().solve(&-self.eval(&z))
            else {
                return (z, false);
            };

            for (zi, di) in z.iter_mut().zip(delta.iter()) {
                *zi += di;
            }

            if delta.norm() <= 1e-13 * (1.0 + norm(&z)) {
                return (z, true);
            }
        }

        (z, false)
    }

    /// Newton's method restricted to real points.
    fn polish_real(&self, mut x: Vec<f64>) -> Vec<f64> {
        const ITERATIONS: usize = 10;

        for _ in 0..ITERATIONS {
            let Some(delta) =
                self.jacobian_real(&x).lu().solve(&-self.eval_real(&x))
            else {
                break;
            };

            let candidate: Vec<f64> =
                x.iter().zip(delta.iter()).map(|(xi, di)| xi + di).collect();

            if !candidate.iter().all(|c| c.is_finite()) {
                break;
            }

            let small = delta.norm() <= 1e-15 * (1.0 + l2(&candidate));

            x = candidate;

            if small {
                break;
            }
        }

        x
    }

    /// Whether the real root `x` lies on a positive-dimensional component.
    ///
    /// At a singular root, the point is moved along the Jacobian's null
    /// direction and projected back onto the zero set with minimum-norm
    /// Newton steps. An isolated root pulls the point back to `x`; a
    /// component lets it settle about as far away as it was moved.
    fn on_solution_curve(&self, x: &[f64]) -> bool {
        const ITERATIONS: usize = 50;

        let svd = self.jacobian_real(x).svd(false, true);
        let sv = &svd.singular_values;

        if sv.is_empty() || sv.min() > 1e-8 * sv.max().max(1.0) {
            return false;
        }

        let Some(v_t) = &svd.v_t else {
            return false;
        };

        let offset = 1e-3 * (1.0 + l2(x));
        let origin = DVector::from_column_slice(x);
        let mut y = &origin + v_t.row(sv.imin()).transpose() * offset;

        for _ in 0..ITERATIONS {
            let jacobian = self.jacobian_real(y.as_slice());
            let rhs = -self.eval_real(y.as_slice());

            let Ok(delta) = jacobian.svd(true, true).solve(&rhs, 1e-12) else {
                return false;
            };

            y += &delta;

            if delta.norm() <= 1e-15 * (1.0 + y.norm()) {
                break;
            }
        }

        self.eval_real(y.as_slice()).amax() <= 1e-10
            && (y - origin).norm() >= offset / 2.0
    }

    fn residual(&self, z: &[C64]) -> f64 {
        self.eval(z).iter().map(|v| v.norm()).fold(0.0, f64::max)
    }
}

fn eval_terms(terms: &[(Vec<u32>, f64)], z: &[C64]) -> C64 {
    terms
        .iter()
        .map(|(exponents, c)| {
            exponents
                .iter()
                .zip(z)
                .fold(C64::new(*c, 0.0), |acc, (&k, zi)| acc * zi.powu(k))
        })
        .sum()
}

fn norm(z: &[C64]) -> f64 {
    z.iter().map(|zi| zi.norm_sqr()).sum::<f64>().sqrt()
}

fn l2(x: &[f64]) -> f64 {
    x.iter().map(|xi| xi * xi).sum::<f64>().sqrt()
}

/// All tuples of roots of unity solving the start system.
fn start_points(degrees: &[u32]) -> Vec<Vec<C64>> {
    degrees
        .iter()
        .map(|&d| {
            (0..d)
                .map(|k| {
                    let angle = 2.0 * PI * f64::from(k) / f64::from(d);

                    C64::from_polar(1.0, angle)
                })
                .collect::<Vec<_>>()
        })
        .multi_cartesian_product()
        .collect()
}

struct Tracker<'a> {
    target: &'a Target,
    degrees: &'a [u32],
    gamma: C64,
    options: &'a TrackerOptions,
}

impl Tracker<'_> {
    fn start_eval(&self, z: &[C64]) -> DVector<C64> {
        DVector::from_iterator(
            z.len(),
            z.iter()
                .zip(self.degrees)
                .map(|(zi, &d)| zi.powu(d) - C64::new(1.0, 0.0)),
        )
    }

    fn homotopy(&self, z: &[C64], t: f64) -> DVector<C64> {
        let start = self.start_eval(z) * (self.gamma * (1.0 - t));

        start + self.target.eval(z) * C64::new(t, 0.0)
    }

    /// `dH/dx` at `(z, t)`.
    fn jacobian(&self, z: &[C64], t: f64) -> DMatrix<C64> {
        let mut jacobian = self.target.jacobian(z) * C64::new(t, 0.0);
        let weight = self.gamma * (1.0 - t);

        for (i, (zi, &d)) in z.iter().zip(self.degrees).enumerate() {
            let derivative = zi.powu(d.saturating_sub(1)) * f64::from(d);

            jacobian[(i, i)] += weight * derivative;
        }

        jacobian
    }

    /// Solves `dH/dx * delta = rhs`.
    fn step(
        &self,
        z: &[C64],
        t: f64,
        rhs: DVector<C64>,
    ) -> Option<DVector<C64>> {
        self.jacobian(z, t).lu().solve(&rhs)
    }

    fn correct(&self, mut z: Vec<C64>, t: f64) -> Option<Vec<C64>> {
        for _ in 0..self.options.corrector_iterations {
            let delta = self.step(&z, t, -self.homotopy(&z, t))?;

            for (zi, di) in z.iter_mut().zip(delta.iter()) {
                *zi += di;
            }

            let scale = 1.0 + norm(&z);

            if delta.norm() <= self.options.corrector_tolerance * scale {
                return Some(z);
            }
        }

        None
    }

    /// Tracks one path and returns its polished endpoint, or `None` if the
    /// path diverged or failed.
    fn run(&self, start: Vec<C64>) -> Option<Vec<C64>> {
        let options = self.options;
        let mut z = start;
        let mut t = 0.0;
        let mut h = options.initial_step;
        let mut successes = 0;
        let mut reached = false;

        for _ in 0..options.max_steps {
            if t >= 1.0 {
                reached = true;
                break;
            }

            h = h.min(1.0 - t);

            // dH/dt = F(z) - gamma * G(z)
            let rate = self.target.eval(&z) - self.start_eval(&z) * self.gamma;
            let corrected = self.step(&z, t, -rate).and_then(|tangent| {
                let predicted = z
                    .iter()
                    .zip(tangent.iter())
                    .map(|(zi, dz)| *zi + *dz * h)
                    .collect();

                self.correct(predicted, t + h)
            });

            match corrected {
                Some(next) => {
                    z = next;
                    t = if 1.0 - (t + h) < f64::EPSILON { 1.0 } else { t + h };

                    if norm(&z) > options.divergence_bound {
                        return None;
                    }

                    successes += 1;

                    if successes >= 3 {
                        h = (2.0 * h).min(options.max_step);
                        successes = 0;
                    }
                }
                None => {
                    h /= 2.0;
                    successes = 0;

                    if h < options.min_step {
                        break;
                    }
                }
            }
        }

        if !reached && t < 1.0 && t < options.endgame_start {
            return None;
        }

        let (z, converged) = self.target.polish(z);

        if converged || self.target.residual(&z) <= 1e-8 {
            Some(z)
        } else {
            log::debug!("dropping path ending at t = {t:.6}");
            None
        }
    }
}

/// Removes solutions that agree to within rounding, keeping the one with
/// the smaller residual.
fn dedup(solutions: &mut Vec<Solution>) {
    solutions.sort_by(|a, b| a.residual.total_cmp(&b.residual));

    let mut kept: Vec<Solution> = Vec::with_capacity(solutions.len());

    for solution in solutions.drain(..) {
        let scale = 1.0 + l2(&solution.coordinates);
        let duplicate = kept.iter().any(|k| {
            let distance = k
                .coordinates
                .iter()
                .zip(&solution.coordinates)
                .map(|(a, b)| (a - b).abs())
                .fold(0.0, f64::max);

            distance <= 1e-8 * scale
        });

        if !duplicate {
            kept.push(solution);
        }
    }

    kept.sort_by(|a, b| {
        a.coordinates
            .iter()
            .zip(&b.coordinates)
            .map(|(x, y)| x.total_cmp(y))
            .find(|o| o.is_ne())
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    *solutions = kept;
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use malachite::Rational;

    use super::*;

    fn poly(nvars: usize, terms: &[(&[u32], i64)]) -> Polynomial {
        Polynomial::from_terms(
            nvars,
            terms.iter().map(|&(e, c)| (e, Rational::from(c))),
        )
    }

    #[test]
    fn cubic_in_one_variable() {
        // x^3 - x = 0
        let cubic = poly(1, &[(&[3], 1), (&[1], -1)]);
        let system = PolynomialSystem::new(1, vec![cubic]);
        let solutions = HomotopySolver::new().solve(&system).unwrap();
        let roots: Vec<f64> =
            solutions.iter().map(|s| s.coordinates[0]).collect();

        assert_eq!(roots.len(), 3);

        for (root, expected) in roots.iter().zip([-1.0, 0.0, 1.0]) {
            assert_abs_diff_eq!(*root, expected, epsilon = 1e-10);
        }
    }

    #[test]
    fn gradient_of_double_well() {
        // grad(x^4/4 - x^2/2 + y^2/2) = (x^3 - x, y)
        let system = PolynomialSystem::new(
            2,
            vec![
                poly(2, &[(&[3, 0], 1), (&[1, 0], -1)]),
                poly(2, &[(&[0, 1], 1)]),
            ],
        );

        let solutions = HomotopySolver::new().solve(&system).unwrap();

        assert_eq!(solutions.len(), 3);

        for solution in &solutions {
            assert!(solution.residual < 1e-10);
            assert_abs_diff_eq!(solution.coordinates[1], 0.0, epsilon = 1e-10);
        }
    }

    #[test]
    fn complex_solutions_are_dropped() {
        // x^2 + 1 = 0, y - 2 = 0
        let system = PolynomialSystem::new(
            2,
            vec![
                poly(2, &[(&[2, 0], 1), (&[0, 0], 1)]),
                poly(2, &[(&[0, 1], 1), (&[0, 0], -2)]),
            ],
        );

        assert!(HomotopySolver::new().solve(&system).unwrap().is_empty());
    }

    #[test]
    fn coupled_system() {
        // x^2 + y^2 = 4, x y = 1
        let system = PolynomialSystem::new(
            2,
            vec![
                poly(2, &[(&[2, 0], 1), (&[0, 2], 1), (&[0, 0], -4)]),
                poly(2, &[(&[1, 1], 1), (&[0, 0], -1)]),
            ],
        );

        let gamma = C64::from_polar(1.0, 0.7);
        let solver = HomotopySolver::new().with_gamma(gamma);
        let solutions = solver.solve(&system).unwrap();

        assert_eq!(solutions.len(), 4);

        for s in &solutions {
            let (x, y) = (s.coordinates[0], s.coordinates[1]);

            assert_abs_diff_eq!(x * x + y * y, 4.0, epsilon = 1e-9);
            assert_abs_diff_eq!(x * y, 1.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn rejects_positive_dimensional_systems() {
        let system = PolynomialSystem::new(2, vec![poly(2, &[(&[1, 0], 1)])]);

        assert!(matches!(
            HomotopySolver::new().solve(&system),
            Err(SolverError::NotZeroDimensional { dimension: None })
        ));
    }

    #[test]
    fn rejects_curve_of_solutions() {
        // grad((x + y)^2) = (2x + 2y, 2x + 2y)
        let line = poly(2, &[(&[1, 0], 2), (&[0, 1], 2)]);
        let system = PolynomialSystem::new(2, vec![line.clone(), line]);

        assert!(matches!(
            HomotopySolver::new().solve(&system),
            Err(SolverError::NotZeroDimensional { dimension: None })
        ));
    }

    #[test]
    fn singular_isolated_root_is_not_a_curve() {
        // (x^3, y) has a triple root at the origin.
        let system = PolynomialSystem::new(
            2,
            vec![poly(2, &[(&[3, 0], 1)]), poly(2, &[(&[0, 1], 1)])],
        );
        let target = Target::new(&system);

        assert!(!target.on_solution_curve(&[0.0, 0.0]));
        assert!(!target.on_solution_curve(&[1e-6, 0.0]));

        let line = poly(2, &[(&[1, 0], 1), (&[0, 1], -1)]);
        let curve = PolynomialSystem::new(2, vec![line.clone(), line]);

        assert!(Target::new(&curve).on_solution_curve(&[0.3, 0.3]));
    }
}
