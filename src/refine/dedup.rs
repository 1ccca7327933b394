//! Merging of refined points that found the same critical point.

use std::cmp::Ordering;

use super::RefinedPoint;
use crate::critical::CandidateId;

/// The outcome of [`deduplicate`].
#[derive(Clone, Debug, Default)]
pub struct Deduplication {
    /// Surviving points, best first.
    pub kept: Vec<RefinedPoint>,
    /// Candidates whose points were absorbed, paired with the candidate
    /// that absorbed them.
    pub merged: Vec<(CandidateId, CandidateId)>,
}

/// A total order on points: smaller gradient residual first, then
/// coordinates, then candidate id.
fn canonical(a: &RefinedPoint, b: &RefinedPoint) -> Ordering {
    a.gradient_norm
        .total_cmp(&b.gradient_norm)
        .then_with(|| {
            a.coordinates
                .iter()
                .zip(&b.coordinates)
                .map(|(x, y)| x.total_cmp(y))
                .find(|o| o.is_ne())
                .unwrap_or(Ordering::Equal)
        })
        .then_with(|| a.candidate.cmp(&b.candidate))
}

/// Merges points closer than `tolerance` to each other.
///
/// Of two points that are the same, the one with the smaller gradient
/// residual survives. Points are visited in a canonical order, so the
/// result does not depend on the order of `points`.
pub fn deduplicate(
    mut points: Vec<RefinedPoint>,
    tolerance: f64,
) -> Deduplication {
    points.sort_by(canonical);

    let mut result = Deduplication::default();

    for point in points {
        let owner = result
            .kept
            .iter()
            .find(|kept| kept.distance(&point.coordinates) < tolerance);

        match owner {
            Some(owner) => {
                result.merged.push((point.candidate, owner.candidate));
            }
            None => result.kept.push(point),
        }
    }

    result
}
