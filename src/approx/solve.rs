//! Least-squares solves of the design system, one per precision kind.

use malachite::num::arithmetic::traits::{Abs, PowerOf2};
use malachite::num::basic::traits::Zero;
use malachite::{Integer, Rational};
use nalgebra::{DMatrix, DVector};

use super::ApproximationError;
use crate::utils::rational::round_significant;

/// Solves `a * c ~= b` in floating point through the SVD.
pub fn solve_float(
    a: DMatrix<f64>,
    b: DVector<f64>,
) -> Result<Vec<f64>, ApproximationError> {
    let (rows, cols) = a.shape();
    let svd = a.svd(true, true);

    let largest = svd.singular_values.max();
    let threshold = largest * rows.max(cols) as f64 * f64::EPSILON;

    let rank = svd.singular_values.iter().filter(|&&s| s > threshold).count();

    if rank < cols {
        return Err(ApproximationError::RankDeficient { rank, basis: cols });
    }

    let solution = svd
        .solve(&b, threshold)
        .map_err(|reason| ApproximationError::Numerical(reason.to_string()))?;

    Ok(solution.iter().copied().collect())
}

/// Solves the design system over the rationals, rounding every intermediate
/// result with `round`.
///
/// Square systems are solved directly. Overdetermined ones go through the
/// normal equations.
pub fn solve_rational<R>(
    a: &[Vec<Rational>],
    b: &[Rational],
    round: R,
    pivot_floor: &Rational,
) -> Result<Vec<Rational>, ApproximationError>
where
    R: Fn(Rational) -> Rational,
{
    let augmented = normal_system(a, b, &round);

    eliminate(augmented, &round, pivot_floor)
}

/// Solves an integer design system with fraction-free elimination.
pub fn solve_integer(
    a: &[Vec<Integer>],
    b: &[Integer],
) -> Result<Vec<Rational>, ApproximationError> {
    let augmented = normal_system(a, b, |x| x);

    bareiss(augmented)
}

/// Rounds to `bits` significant bits, the arithmetic of the arbitrary float
/// mode.
pub fn significant(bits: u32) -> impl Fn(Rational) -> Rational {
    move |x| round_significant(x, bits)
}

/// Pivots below `2^-bits` times the largest entry are treated as zero.
pub fn relative_floor(a: &[Vec<Rational>], bits: u32) -> Rational {
    let largest = a
        .iter()
        .flatten()
        .map(|x| x.abs())
        .max()
        .unwrap_or(Rational::ZERO);

    largest * Rational::power_of_2(-i64::from(bits))
}

/// Builds the augmented square system `[a | b]`, or `[a^T a | a^T b]` when
/// there are more rows than columns.
fn normal_system<T, R>(a: &[Vec<T>], b: &[T], round: R) -> Vec<Vec<T>>
where
    T: Clone + Zero + std::ops::Add<T, Output = T>,
    for<'x> &'x T: std::ops::Mul<&'x T, Output = T>,
    R: Fn(T) -> T,
{
    let cols = a.first().map_or(0, Vec::len);

    if a.len() == cols {
        return a
            .iter()
            .zip(b)
            .map(|(row, rhs)| {
                let mut row = row.clone();
                row.push(rhs.clone());
                row
            })
            .collect();
    }

    let mut system = Vec::with_capacity(cols);

    for i in 0..cols {
        let mut row = Vec::with_capacity(cols + 1);

        for j in 0..cols {
            let sum = a
                .iter()
                .fold(T::ZERO, |acc, r| round(acc + round(&r[i] * &r[j])));

            row.push(sum);
        }

        let rhs = a
            .iter()
            .zip(b)
            .fold(T::ZERO, |acc, (r, y)| round(acc + round(&r[i] * y)));

        row.push(rhs);
        system.push(row);
    }

    system
}

/// Gaussian elimination with partial pivoting on an augmented `n x (n + 1)`
/// system.
fn eliminate<R>(
    mut rows: Vec<Vec<Rational>>,
    round: &R,
    pivot_floor: &Rational,
) -> Result<Vec<Rational>, ApproximationError>
where
    R: Fn(Rational) -> Rational,
{
    let n = rows.len();
    let mut rank = 0;

    for col in 0..n {
        let pivot = (rank..n)
            .map(|r| (r, (&rows[r][col]).abs()))
            .filter(|(_, magnitude)| magnitude > pivot_floor)
            .max_by(|(_, x), (_, y)| x.cmp(y))
            .map(|(r, _)| r);

        let Some(pivot) = pivot else {
            continue;
        };

        rows.swap(rank, pivot);

        let (upper, lower) = rows.split_at_mut(rank + 1);
        let pivot_row = &upper[rank];

        for row in lower {
            if row[col] == Rational::ZERO {
                continue;
            }

            let factor = round(&row[col] / &pivot_row[col]);

            row[col] = Rational::ZERO;

            for c in col + 1..=n {
                row[c] = round(&row[c] - &factor * &pivot_row[c]);
            }
        }

        rank += 1;
    }

    if rank < n {
        return Err(ApproximationError::RankDeficient { rank, basis: n });
    }

    let mut solution = vec![Rational::ZERO; n];

    for i in (0..n).rev() {
        let tail = (i + 1..n)
            .fold(Rational::ZERO, |acc, j| acc + &rows[i][j] * &solution[j]);

        solution[i] = round(round(&rows[i][n] - tail) / &rows[i][i]);
    }

    Ok(solution)
}

/// Bareiss fraction-free elimination on an augmented integer system,
/// followed by exact back substitution.
fn bareiss(
    mut rows: Vec<Vec<Integer>>,
) -> Result<Vec<Rational>, ApproximationError> {
    let n = rows.len();
    let mut previous = Integer::from(1);

    for k in 0..n {
        let Some(pivot) = (k..n).find(|&r| rows[r][k] != Integer::ZERO) else {
            let rank = integer_rank(&rows);

            return Err(ApproximationError::RankDeficient { rank, basis: n });
        };

        rows.swap(k, pivot);

        let (upper, lower) = rows.split_at_mut(k + 1);
        let pivot_row = &upper[k];

        for row in lower {
            for j in k + 1..=n {
                let cross = &row[j] * &pivot_row[k] - &row[k] * &pivot_row[j];

                // Exact by Sylvester's identity.
                row[j] = cross / &previous;
            }

            row[k] = Integer::ZERO;
        }

        previous = pivot_row[k].clone();
    }

    let mut solution = vec![Rational::ZERO; n];

    for i in (0..n).rev() {
        let tail = (i + 1..n).fold(Rational::ZERO, |acc, j| {
            acc + Rational::from(&rows[i][j]) * &solution[j]
        });

        solution[i] =
            (Rational::from(&rows[i][n]) - tail) / Rational::from(&rows[i][i]);
    }

    Ok(solution)
}

/// The rank of the coefficient part of an integer augmented system.
fn integer_rank(rows: &[Vec<Integer>]) -> usize {
    let n = rows.len();
    let exact = rows
        .iter()
        .map(|row| row.iter().map(Rational::from).collect())
        .collect();

    match eliminate(exact, &|x| x, &Rational::ZERO) {
        Ok(_) => n,
        Err(ApproximationError::RankDeficient { rank, .. }) => rank,
        Err(_) => 0,
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;
    use crate::utils::rational::to_f64;

    fn rationals(rows: &[&[i64]]) -> Vec<Vec<Rational>> {
        rows.iter()
            .map(|row| row.iter().map(|&x| Rational::from(x)).collect())
            .collect()
    }

    fn integers(rows: &[&[i64]]) -> Vec<Vec<Integer>> {
        rows.iter()
            .map(|row| row.iter().map(|&x| Integer::from(x)).collect())
            .collect()
    }

    #[test]
    fn exact_square_solve() {
        let a = rationals(&[&[2, 1, 0], &[1, 3, 1], &[0, 1, 4]]);
        let b = [3, 5, 5].map(Rational::from);

        let x = solve_rational(&a, &b, |x| x, &Rational::ZERO).unwrap();

        assert_eq!(x, vec![Rational::from(1); 3]);
    }

    #[test]
    fn exact_least_squares() {
        // Fit y = c0 + c1 t to (0, 1), (1, 2), (2, 4).
        let a = rationals(&[&[1, 0], &[1, 1], &[1, 2]]);
        let b = [1, 2, 4].map(Rational::from);

        let x = solve_rational(&a, &b, |x| x, &Rational::ZERO).unwrap();

        assert_eq!(
            x,
            vec![Rational::from_signeds(5, 6), Rational::from_signeds(3, 2)]
        );
    }

    #[test]
    fn bareiss_matches_rational() {
        let a = integers(&[&[4, -2, 1], &[-2, 4, -2], &[1, -2, 4]]);
        let b = [11, -16, 17].map(Integer::from);

        let x = solve_integer(&a, &b).unwrap();

        assert_eq!(x, [1, -2, 3].map(Rational::from).to_vec());
    }

    #[test]
    fn singular_systems_are_rejected() {
        let a = rationals(&[&[1, 2], &[2, 4]]);
        let b = [1, 2].map(Rational::from);

        assert!(matches!(
            solve_rational(&a, &b, |x| x, &Rational::ZERO),
            Err(ApproximationError::RankDeficient { rank: 1, basis: 2 })
        ));

        let a = integers(&[&[1, 2], &[2, 4]]);
        let b = [1, 2].map(Integer::from);

        assert!(matches!(
            solve_integer(&a, &b),
            Err(ApproximationError::RankDeficient { rank: 1, basis: 2 })
        ));

        let a = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 2.0, 4.0]);
        let b = DVector::from_vec(vec![1.0, 2.0]);

        assert!(matches!(
            solve_float(a, b),
            Err(ApproximationError::RankDeficient { rank: 1, basis: 2 })
        ));
    }

    #[test]
    fn rounded_solve_is_close() {
        let a = rationals(&[&[3, 1], &[1, 3]]);
        let b = [1, 0].map(Rational::from);

        let floor = relative_floor(&a, 24);
        let x = solve_rational(&a, &b, significant(24), &floor).unwrap();

        assert_abs_diff_eq!(to_f64(&x[0]), 0.375, epsilon = 1e-6);
        assert_abs_diff_eq!(to_f64(&x[1]), -0.125, epsilon = 1e-6);
    }
}
