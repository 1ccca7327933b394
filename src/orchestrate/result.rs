//! Aggregated results of a multi-tolerance run.

use std::collections::HashSet;
use std::fmt;

use super::{PairResult, Stage, StageFailure};
use crate::critical::{CandidateId, CandidateStatus, CriticalCandidate};
use crate::domain::{Domain, SubdomainId};
use crate::refine::{deduplicate, Classification, RefinedPoint};

/// Every pair run at one tolerance.
#[derive(Clone, Debug)]
pub struct ToleranceLevel {
    pub tolerance: f64,
    /// Successful pairs, in subdomain order.
    pub pairs: Vec<PairResult>,
}

impl ToleranceLevel {
    pub fn candidates(&self) -> impl Iterator<Item = &CriticalCandidate> {
        self.pairs.iter().flat_map(|pair| &pair.candidates)
    }

    pub fn points(&self) -> impl Iterator<Item = &RefinedPoint> {
        self.pairs.iter().flat_map(|pair| &pair.points)
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct CoverageStats {
    pub subdomains: usize,
    /// Subdomains in which at least one minimizer was captured.
    pub subdomains_with_minimizer: usize,
    /// `subdomains_with_minimizer / subdomains`.
    pub minimizer_coverage: f64,
    /// Points absorbed by the cross-level, cross-subdomain merge.
    pub duplicate_merges: usize,
    /// Distinct converged points found at each tolerance.
    pub points_per_tolerance: Vec<(f64, usize)>,
    /// Converged points that left the domain.
    pub escaped: usize,
}

/// Everything a run produced, failures included.
#[derive(Clone, Debug)]
pub struct MultiToleranceResult {
    pub levels: Vec<ToleranceLevel>,
    /// Distinct critical points across all levels and subdomains, smallest
    /// gradient residual first.
    pub merged: Vec<RefinedPoint>,
    pub failures: Vec<StageFailure>,
    pub coverage: CoverageStats,
}

impl MultiToleranceResult {
    /// Merges the pair results of a run.
    pub(super) fn assemble(
        domain: &Domain,
        tolerances: &[f64],
        subdomains: usize,
        outcomes: Vec<Result<PairResult, StageFailure>>,
        merge_tolerance: f64,
        boundary_tolerance: f64,
    ) -> MultiToleranceResult {
        let mut levels: Vec<ToleranceLevel> = tolerances
            .iter()
            .map(|&tolerance| ToleranceLevel {
                tolerance,
                pairs: Vec::new(),
            })
            .collect();
        let mut failures = Vec::new();

        for outcome in outcomes {
            match outcome {
                Ok(pair) => levels[pair.level].pairs.push(pair),
                Err(failure) => {
                    log::warn!("{failure}");
                    failures.push(failure);
                }
            }
        }

        let inside = |p: &RefinedPoint| {
            p.converged() && domain.contains(&p.coordinates, boundary_tolerance)
        };

        let escaped = levels
            .iter()
            .flat_map(|level| level.points())
            .filter(|p| p.converged() && !inside(p))
            .count();

        let points_per_tolerance = levels
            .iter()
            .map(|level| {
                let points = level.points().filter(|p| inside(p)).cloned();
                let distinct =
                    deduplicate(points.collect(), merge_tolerance).kept.len();

                (level.tolerance, distinct)
            })
            .collect();

        let all = levels
            .iter()
            .flat_map(|level| level.points())
            .filter(|p| inside(p))
            .cloned()
            .collect();
        let merge = deduplicate(all, merge_tolerance);
        let absorbed: HashSet<CandidateId> =
            merge.merged.iter().map(|&(absorbed, _)| absorbed).collect();

        for pair in levels.iter_mut().flat_map(|level| &mut level.pairs) {
            for candidate in &mut pair.candidates {
                if absorbed.contains(&candidate.id) {
                    candidate.status = CandidateStatus::Merged;
                }
            }

            pair.stage = Stage::Merged;
        }

        let with_minimizer: HashSet<SubdomainId> = levels
            .iter()
            .flat_map(|level| &level.pairs)
            .filter(|pair| pair.has_captured_minimizer())
            .map(|pair| pair.subdomain)
            .collect();

        let coverage = CoverageStats {
            subdomains,
            subdomains_with_minimizer: with_minimizer.len(),
            minimizer_coverage: if subdomains == 0 {
                0.0
            } else {
                with_minimizer.len() as f64 / subdomains as f64
            },
            duplicate_merges: merge.merged.len(),
            points_per_tolerance,
            escaped,
        };

        log::info!(
            "merged {} points into {}, {} escaped, {} failed pairs",
            merge.merged.len() + merge.kept.len(),
            merge.kept.len(),
            escaped,
            failures.len()
        );

        MultiToleranceResult {
            levels,
            merged: merge.kept,
            failures,
            coverage,
        }
    }

    /// Number of merged points with the given label.
    pub fn count(&self, label: Classification) -> usize {
        self.merged.iter().filter(|p| p.label == label).count()
    }

    pub fn label_counts(&self) -> [(Classification, usize); 4] {
        [
            Classification::Minimum,
            Classification::Maximum,
            Classification::Saddle,
            Classification::Indeterminate,
        ]
        .map(|label| (label, self.count(label)))
    }

    /// The merged minimizer with the lowest objective value.
    pub fn best_minimum(&self) -> Option<&RefinedPoint> {
        self.merged
            .iter()
            .filter(|p| p.label == Classification::Minimum)
            .min_by(|a, b| a.value.total_cmp(&b.value))
    }

    /// Merged points sorted by objective value.
    pub fn by_value(&self) -> Vec<&RefinedPoint> {
        let mut points: Vec<&RefinedPoint> = self.merged.iter().collect();

        points.sort_by(|a, b| a.value.total_cmp(&b.value));
        points
    }
}

impl fmt::Display for MultiToleranceResult {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (tolerance, count) in &self.coverage.points_per_tolerance {
            writeln!(f, "tolerance {tolerance:.1e}: {count} points")?;
        }

        let counts = self
            .label_counts()
            .iter()
            .filter(|(_, n)| *n > 0)
            .map(|(label, n)| format!("{n} {}", <&'static str>::from(*label)))
            .collect::<Vec<_>>();

        writeln!(
            f,
            "merged: {} ({})",
            self.merged.len(),
            if counts.is_empty() {
                "none".to_string()
            } else {
                counts.join(", ")
            }
        )?;

        write!(
            f,
            "coverage: {}/{} subdomains with a minimizer, {} duplicates, \
             {} escaped, {} failures",
            self.coverage.subdomains_with_minimizer,
            self.coverage.subdomains,
            self.coverage.duplicate_merges,
            self.coverage.escaped,
            self.failures.len()
        )
    }
}
