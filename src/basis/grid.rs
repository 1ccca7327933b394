//! Tensor-product sample grids.

use itertools::Itertools;

use super::BasisKind;
use crate::config::ConfigError;
use crate::domain::Domain;

/// Sample nodes for one approximation pass.
///
/// Nodes are stored in tensor-product order with the first axis varying
/// slowest, both in reference coordinates and mapped into the domain.
#[derive(Clone, Debug)]
pub struct SampleGrid {
    basis: BasisKind,
    degrees: Vec<u32>,
    reference: Vec<Vec<f64>>,
    physical: Vec<Vec<f64>>,
}

impl SampleGrid {
    /// Builds the grid for `basis` at the given per-axis degrees, using
    /// `degree + 1 + oversample` nodes per axis.
    pub fn new(
        domain: &Domain,
        basis: BasisKind,
        degrees: &[u32],
        oversample: u32,
    ) -> Result<SampleGrid, ConfigError> {
        if degrees.len() != domain.dim() {
            return Err(ConfigError::DegreeArity {
                expected: domain.dim(),
                found: degrees.len(),
            });
        }

        let axes: Vec<Vec<f64>> = degrees
            .iter()
            .map(|&d| basis.nodes(d as usize + 1 + oversample as usize))
            .collect();

        let reference: Vec<Vec<f64>> =
            axes.into_iter().multi_cartesian_product().collect();

        let physical =
            reference.iter().map(|xi| domain.to_physical(xi)).collect();

        Ok(SampleGrid {
            basis,
            degrees: degrees.to_vec(),
            reference,
            physical,
        })
    }

    pub fn basis(&self) -> BasisKind {
        self.basis
    }

    pub fn degrees(&self) -> &[u32] {
        &self.degrees
    }

    pub fn len(&self) -> usize {
        self.reference.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reference.is_empty()
    }

    pub fn reference(&self) -> &[Vec<f64>] {
        &self.reference
    }

    pub fn physical(&self) -> &[Vec<f64>] {
        &self.physical
    }

    /// Evaluates `f` at every physical node.
    pub fn sample<F>(&self, f: &F) -> Vec<f64>
    where
        F: Fn(&[f64]) -> f64 + ?Sized,
    {
        self.physical.iter().map(|x| f(x)).collect()
    }
}

/// Equispaced points, endpoints included, for checking a fit away from its
/// own nodes.
pub fn validation_points(domain: &Domain, per_axis: usize) -> Vec<Vec<f64>> {
    let per_axis = per_axis.max(2);
    let step = 2.0 / (per_axis - 1) as f64;

    let axis: Vec<f64> =
        (0..per_axis).map(|i| -1.0 + step * i as f64).collect();

    std::iter::repeat(axis)
        .take(domain.dim())
        .multi_cartesian_product()
        .map(|xi| domain.to_physical(&xi))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_count_is_tensor_product() {
        let domain = Domain::cube(vec![0.0, 1.0, -1.0], 2.0).unwrap();

        for basis in [BasisKind::Chebyshev, BasisKind::Legendre] {
            for degrees in [[0, 0, 0], [1, 2, 3], [4, 0, 2]] {
                let grid =
                    SampleGrid::new(&domain, basis, &degrees, 0).unwrap();
                let expected: usize =
                    degrees.iter().map(|&d| d as usize + 1).product();

                assert_eq!(grid.len(), expected);
                assert_eq!(grid.physical().len(), expected);
            }
        }
    }

    #[test]
    fn oversampling_adds_nodes() {
        let domain = Domain::cube(vec![0.0, 0.0], 1.0).unwrap();
        let grid =
            SampleGrid::new(&domain, BasisKind::Chebyshev, &[2, 3], 1).unwrap();

        assert_eq!(grid.len(), 4 * 5);
    }

    #[test]
    fn nodes_are_mapped_into_domain() {
        let domain = Domain::new(vec![3.0, -1.0], vec![0.5, 2.0]).unwrap();
        let grid =
            SampleGrid::new(&domain, BasisKind::Legendre, &[3, 2], 0).unwrap();

        for (xi, x) in grid.reference().iter().zip(grid.physical()) {
            assert_eq!(&domain.to_physical(xi), x);
            assert!(domain.contains(x, 0.0));
        }

        // First axis varies slowest.
        assert_eq!(grid.reference()[0][0], grid.reference()[2][0]);
        assert_ne!(grid.reference()[0][1], grid.reference()[1][1]);
    }

    #[test]
    fn rejects_mismatched_degrees() {
        let domain = Domain::cube(vec![0.0, 0.0], 1.0).unwrap();

        assert!(matches!(
            SampleGrid::new(&domain, BasisKind::Chebyshev, &[2], 0),
            Err(ConfigError::DegreeArity { .. })
        ));
    }

    #[test]
    fn validation_grid_covers_corners() {
        let domain = Domain::cube(vec![0.0, 0.0], 1.0).unwrap();
        let points = validation_points(&domain, 3);

        assert_eq!(points.len(), 9);
        assert_eq!(points[0], vec![-1.0, -1.0]);
        assert_eq!(points[8], vec![1.0, 1.0]);
    }
}
