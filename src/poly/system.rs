use std::fmt;

use super::Polynomial;

/// A square system of polynomial equations `p_i(x) = 0`.
#[derive(Clone, Debug, PartialEq)]
pub struct PolynomialSystem {
    nvars: usize,
    equations: Vec<Polynomial>,
}

/// What can be said about a system's solution set from its shape alone.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Structure {
    /// As many equations as unknowns, each unknown constrained.
    Square,
    /// Some equation is a nonzero constant, so nothing solves it.
    Inconsistent,
    /// Some unknown is unconstrained, so solutions are not isolated.
    Underdetermined,
}

impl PolynomialSystem {
    pub fn new(nvars: usize, equations: Vec<Polynomial>) -> PolynomialSystem {
        debug_assert!(equations.iter().all(|p| p.nvars() == nvars));

        PolynomialSystem { nvars, equations }
    }

    /// The system `grad p = 0`.
    pub fn gradient(polynomial: &Polynomial) -> PolynomialSystem {
        let nvars = polynomial.nvars();
        let equations = (0..nvars).map(|i| polynomial.derivative(i)).collect();

        PolynomialSystem::new(nvars, equations)
    }

    pub fn nvars(&self) -> usize {
        self.nvars
    }

    pub fn equations(&self) -> &[Polynomial] {
        &self.equations
    }

    pub fn variable_names(&self) -> Vec<String> {
        (0..self.nvars).map(|i| format!("x{i}")).collect()
    }

    /// Total degree of each equation.
    pub fn degrees(&self) -> Vec<u32> {
        self.equations.iter().map(Polynomial::degree).collect()
    }

    /// Classifies the system structurally.
    ///
    /// An identically zero equation, a missing equation, or an unknown that
    /// appears nowhere all leave a positive-dimensional solution set if any
    /// solution exists.
    pub fn structure(&self) -> Structure {
        if self.equations.iter().any(Polynomial::is_nonzero_constant) {
            return Structure::Inconsistent;
        }

        let underdetermined = self.equations.len() < self.nvars
            || self.equations.iter().any(Polynomial::is_zero)
            || (0..self.nvars)
                .any(|var| !self.equations.iter().any(|p| p.depends_on(var)));

        if underdetermined {
            Structure::Underdetermined
        } else {
            Structure::Square
        }
    }

    pub fn residual(&self, x: &[f64]) -> f64 {
        self.equations
            .iter()
            .map(|p| p.eval(x).abs())
            .fold(0.0, f64::max)
    }
}

impl fmt::Display for PolynomialSystem {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (i, equation) in self.equations.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }

            write!(f, "{equation} = 0")?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use malachite::Rational;

    use super::*;

    fn poly(terms: &[([u32; 2], i64)]) -> Polynomial {
        Polynomial::from_terms(
            2,
            terms.iter().map(|&(e, c)| (e, Rational::from(c))),
        )
    }

    #[test]
    fn gradient_of_quadratic() {
        // x0^2 + x0 x1 + x1^2
        let p = poly(&[([2, 0], 1), ([1, 1], 1), ([0, 2], 1)]);
        let system = PolynomialSystem::gradient(&p);

        assert_eq!(system.degrees(), vec![1, 1]);
        assert_eq!(system.structure(), Structure::Square);
        assert_eq!(system.residual(&[0.0, 0.0]), 0.0);
        assert_eq!(system.to_string(), "2*x0+x1 = 0\nx0+2*x1 = 0");
    }

    #[test]
    fn structural_classification() {
        // Depends on x0 only.
        let p = poly(&[([2, 0], 1)]);

        assert_eq!(
            PolynomialSystem::gradient(&p).structure(),
            Structure::Underdetermined
        );

        // Linear: the gradient is a nonzero constant.
        let p = poly(&[([1, 0], 3), ([0, 2], 1)]);

        assert_eq!(
            PolynomialSystem::gradient(&p).structure(),
            Structure::Inconsistent
        );
    }
}
