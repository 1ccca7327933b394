//! Boxes in physical space and their orthant partitions.

use std::fmt;

use itertools::Itertools;
use smallvec::SmallVec;

use crate::config::{ConfigError, Partition};

/// An axis-aligned box given by its center and per-axis half-widths.
///
/// The domain defines the affine map between the reference cube `[-1, 1]^n`
/// and physical coordinates: `x = center + scale * xi`.
#[derive(Clone, Debug, PartialEq)]
pub struct Domain {
    center: Vec<f64>,
    scale: Vec<f64>,
}

impl Domain {
    pub fn new(
        center: Vec<f64>,
        scale: Vec<f64>,
    ) -> Result<Domain, ConfigError> {
        if center.is_empty() {
            return Err(ConfigError::EmptyDomain);
        }

        if center.len() != scale.len() {
            return Err(ConfigError::DimensionMismatch {
                expected: center.len(),
                found: scale.len(),
            });
        }

        if let Some((axis, &value)) =
            center.iter().find_position(|c| !c.is_finite())
        {
            return Err(ConfigError::InvalidCenter { axis, value });
        }

        if let Some((axis, &value)) =
            scale.iter().find_position(|s| !(s.is_finite() && **s > 0.0))
        {
            return Err(ConfigError::InvalidScale { axis, value });
        }

        Ok(Domain { center, scale })
    }

    /// The cube of half-width `radius` around `center`.
    pub fn cube(center: Vec<f64>, radius: f64) -> Result<Domain, ConfigError> {
        let scale = vec![radius; center.len()];

        Domain::new(center, scale)
    }

    /// The box with the given `(lower, upper)` bounds per axis.
    pub fn from_bounds(bounds: &[(f64, f64)]) -> Result<Domain, ConfigError> {
        let (center, scale) = bounds
            .iter()
            .map(|&(lo, hi)| ((lo + hi) / 2.0, (hi - lo) / 2.0))
            .unzip();

        Domain::new(center, scale)
    }

    pub fn dim(&self) -> usize {
        self.center.len()
    }

    pub fn center(&self) -> &[f64] {
        &self.center
    }

    pub fn scale(&self) -> &[f64] {
        &self.scale
    }

    pub fn bounds(&self) -> Vec<(f64, f64)> {
        self.center
            .iter()
            .zip(&self.scale)
            .map(|(c, s)| (c - s, c + s))
            .collect()
    }

    pub fn to_physical(&self, reference: &[f64]) -> Vec<f64> {
        itertools::izip!(reference, &self.center, &self.scale)
            .map(|(xi, c, s)| c + s * xi)
            .collect()
    }

    pub fn to_reference(&self, physical: &[f64]) -> Vec<f64> {
        itertools::izip!(physical, &self.center, &self.scale)
            .map(|(x, c, s)| (x - c) / s)
            .collect()
    }

    /// Tests whether a physical point lies in the domain, allowing an
    /// excursion of `tolerance` measured in reference coordinates.
    pub fn contains(&self, point: &[f64], tolerance: f64) -> bool {
        point.len() == self.dim()
            && self
                .to_reference(point)
                .iter()
                .all(|xi| xi.abs() <= 1.0 + tolerance)
    }

    /// Enumerates the `2^n` orthants of the domain.
    ///
    /// Subdomain `k` takes the negative half of axis `i` exactly when bit `i`
    /// of `k` is set, so the ids agree with [`Domain::orthant_of`].
    pub fn orthants(&self) -> Vec<OrthantSubdomain> {
        let dim = self.dim();

        (0..1usize << dim)
            .map(|id| {
                let signs: SmallVec<[i8; 4]> = (0..dim)
                    .map(|axis| if id >> axis & 1 == 1 { -1 } else { 1 })
                    .collect();

                let half: Vec<f64> =
                    self.scale.iter().map(|s| s / 2.0).collect();
                let center = itertools::izip!(&self.center, &half, &signs)
                    .map(|(c, h, &sign)| c + f64::from(sign) * h)
                    .collect();

                OrthantSubdomain {
                    id: SubdomainId(id),
                    signs,
                    domain: Domain {
                        center,
                        scale: half,
                    },
                }
            })
            .collect()
    }

    /// Returns the id of the orthant owning `point`.
    ///
    /// A coordinate equal to the center belongs to the positive side, so
    /// points on shared boundaries have exactly one owner.
    pub fn orthant_of(&self, point: &[f64]) -> SubdomainId {
        let id = point
            .iter()
            .zip(&self.center)
            .enumerate()
            .filter(|(_, (x, c))| x < c)
            .fold(0, |id, (axis, _)| id | 1 << axis);

        SubdomainId(id)
    }

    /// Splits the domain according to `partition`.
    pub fn partition(&self, partition: Partition) -> Vec<OrthantSubdomain> {
        match partition {
            Partition::Whole => vec![OrthantSubdomain::whole(self)],
            Partition::Orthants => self.orthants(),
        }
    }

    /// Returns the id of the subdomain of `partition` owning `point`.
    ///
    /// Coordinates within `tolerance` of the center, in reference units, are
    /// taken to lie on it.
    pub fn owner(
        &self,
        partition: Partition,
        point: &[f64],
        tolerance: f64,
    ) -> SubdomainId {
        match partition {
            Partition::Whole => SubdomainId(0),
            Partition::Orthants => {
                let snapped: Vec<f64> = self
                    .to_reference(point)
                    .iter()
                    .map(|&xi| if xi.abs() <= tolerance { 0.0 } else { xi })
                    .collect();

                self.orthant_of(&self.to_physical(&snapped))
            }
        }
    }

    /// Whether `point` lies in the domain and is owned by `subdomain`.
    pub fn claims(
        &self,
        partition: Partition,
        subdomain: SubdomainId,
        point: &[f64],
        tolerance: f64,
    ) -> bool {
        self.contains(point, tolerance)
            && self.owner(partition, point, tolerance) == subdomain
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubdomainId(pub usize);

impl fmt::Display for SubdomainId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A piece of a partitioned domain.
///
/// The sign pattern is empty for the unpartitioned domain.
#[derive(Clone, Debug)]
pub struct OrthantSubdomain {
    pub id: SubdomainId,
    pub signs: SmallVec<[i8; 4]>,
    pub domain: Domain,
}

impl OrthantSubdomain {
    fn whole(domain: &Domain) -> OrthantSubdomain {
        OrthantSubdomain {
            id: SubdomainId(0),
            signs: SmallVec::new(),
            domain: domain.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Domain {
        Domain::new(vec![1.0, -2.0], vec![2.0, 4.0]).unwrap()
    }

    #[test]
    fn affine_map() {
        let domain = square();

        assert_eq!(domain.to_physical(&[1.0, -0.5]), vec![3.0, -4.0]);
        assert_eq!(domain.to_reference(&[3.0, -4.0]), vec![1.0, -0.5]);
        assert_eq!(domain.bounds(), vec![(-1.0, 3.0), (-6.0, 2.0)]);
    }

    #[test]
    fn rejects_degenerate_boxes() {
        assert_eq!(
            Domain::new(vec![0.0], vec![0.0]),
            Err(ConfigError::InvalidScale {
                axis: 0,
                value: 0.0
            })
        );
        assert_eq!(
            Domain::new(vec![0.0, 0.0], vec![1.0]),
            Err(ConfigError::DimensionMismatch {
                expected: 2,
                found: 1
            })
        );
        assert_eq!(Domain::new(vec![], vec![]), Err(ConfigError::EmptyDomain));
    }

    #[test]
    fn orthants_tile_the_domain() {
        let domain = square();
        let orthants = domain.orthants();

        assert_eq!(orthants.len(), 4);

        let total: f64 = orthants
            .iter()
            .map(|o| o.domain.scale().iter().product::<f64>())
            .sum();

        assert_eq!(total, domain.scale().iter().product::<f64>());

        for orthant in &orthants {
            let center = orthant.domain.center();

            assert_eq!(domain.orthant_of(center), orthant.id);
            assert!(domain.contains(center, 0.0));
        }
    }

    #[test]
    fn every_point_has_one_owner() {
        let domain = square();
        let orthants = domain.orthants();

        let points = [
            vec![1.0, -2.0],
            vec![1.0, 0.0],
            vec![-1.0, -2.0],
            vec![2.5, -5.0],
            vec![0.0, 1.0],
        ];

        for point in &points {
            let owner = domain.orthant_of(point);
            let owning: Vec<_> = orthants
                .iter()
                .filter(|o| {
                    itertools::izip!(point, domain.center(), &o.signs).all(
                        |(x, c, &sign)| {
                            if sign > 0 {
                                x >= c
                            } else {
                                x < c
                            }
                        },
                    )
                })
                .map(|o| o.id)
                .collect();

            assert_eq!(owning, vec![owner]);
        }

        // The center belongs to the all-positive orthant.
        assert_eq!(domain.orthant_of(&[1.0, -2.0]), SubdomainId(0));
    }

    #[test]
    fn boundary_noise_keeps_one_owner() {
        let domain = Domain::cube(vec![0.0, 0.0], 1.0).unwrap();
        let claimants = |point: &[f64]| {
            domain
                .orthants()
                .iter()
                .filter(|o| {
                    domain.claims(Partition::Orthants, o.id, point, 1e-6)
                })
                .count()
        };

        assert_eq!(
            domain.owner(Partition::Orthants, &[-1e-12, 1e-12], 1e-6),
            SubdomainId(0)
        );
        assert_eq!(
            domain.owner(Partition::Orthants, &[-0.5, 1e-12], 1e-6),
            SubdomainId(1)
        );
        assert_eq!(claimants(&[-1e-12, 3e-13]), 1);
        assert_eq!(claimants(&[0.5, -0.25]), 1);
        assert_eq!(claimants(&[1.5, 0.0]), 0);
        assert_eq!(
            domain.owner(Partition::Whole, &[-0.5, -0.5], 1e-6),
            SubdomainId(0)
        );
    }
}
