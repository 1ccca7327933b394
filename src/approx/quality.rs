use std::fmt;

use super::Approximant;
use crate::basis::validation_points;

/// Discrete error between an approximant and sampled truth.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ErrorReport {
    /// `sqrt(sum r^2 / N)` over the residuals.
    pub l2: f64,
    /// Largest absolute residual.
    pub max: f64,
    pub samples: usize,
}

impl ErrorReport {
    pub fn from_residuals<I>(residuals: I) -> ErrorReport
    where
        I: IntoIterator<Item = f64>,
    {
        let (sum, max, samples) = residuals.into_iter().fold(
            (0.0, 0.0, 0),
            |(sum, max, count), r: f64| {
                (sum + r * r, f64::max(max, r.abs()), count + 1)
            },
        );

        let l2 = if samples == 0 {
            0.0
        } else {
            (sum / samples as f64).sqrt()
        };

        ErrorReport { l2, max, samples }
    }

    /// Error on the nodes the approximant was fit on.
    pub fn on_fit_samples(
        approximant: &Approximant,
        values: &[f64],
    ) -> ErrorReport {
        let residuals = approximant
            .grid()
            .physical()
            .iter()
            .zip(values)
            .map(|(x, y)| approximant.eval(x) - y);

        ErrorReport::from_residuals(residuals)
    }

    /// Error against fresh evaluations of `f` at the given points.
    pub fn on_points<F>(
        approximant: &Approximant,
        points: &[Vec<f64>],
        f: &F,
    ) -> ErrorReport
    where
        F: Fn(&[f64]) -> f64 + ?Sized,
    {
        let residuals = points.iter().map(|x| approximant.eval(x) - f(x));

        ErrorReport::from_residuals(residuals)
    }

    /// Error on an equispaced grid with `degree + 2` points per axis.
    ///
    /// Interpolants reproduce their own nodes up to rounding, so their
    /// quality has to be judged elsewhere.
    pub fn on_validation_grid<F>(
        approximant: &Approximant,
        f: &F,
    ) -> ErrorReport
    where
        F: Fn(&[f64]) -> f64 + ?Sized,
    {
        let per_axis = approximant
            .degrees()
            .iter()
            .max()
            .map_or(2, |&d| d as usize + 2);
        let points = validation_points(approximant.domain(), per_axis);

        ErrorReport::on_points(approximant, &points, f)
    }

    pub fn meets(&self, tolerance: f64) -> bool {
        self.l2 <= tolerance
    }
}

impl fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "l2 {:.3e}, max {:.3e} over {} samples",
            self.l2, self.max, self.samples
        )
    }
}
