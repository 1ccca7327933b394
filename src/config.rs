//! Pipeline configuration.
//!
//! Everything here is plain data. Loading it from files is left to callers;
//! [`PipelineConfig::validate`] is the single place where combinations are
//! checked before any sampling happens.

use std::fmt;

use strum_macros::{EnumString, IntoStaticStr};

use crate::approx::PrecisionKind;
use crate::basis::BasisKind;
use crate::critical::ExtractorConfig;
use crate::refine::RefineConfig;

/// A requested polynomial degree, either shared by every axis or given per
/// axis.
///
/// Degrees are signed so that a negative request can be reported as a
/// configuration error instead of being unrepresentable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DegreeSpec {
    Uniform(i64),
    PerAxis(Vec<i64>),
}

impl DegreeSpec {
    /// Resolves the specification into one degree per axis.
    pub fn resolve(&self, dim: usize) -> Result<Vec<u32>, ConfigError> {
        let degrees = match self {
            DegreeSpec::Uniform(degree) => vec![*degree; dim],
            DegreeSpec::PerAxis(degrees) => {
                if degrees.len() != dim {
                    return Err(ConfigError::DegreeArity {
                        expected: dim,
                        found: degrees.len(),
                    });
                }

                degrees.clone()
            }
        };

        degrees
            .into_iter()
            .enumerate()
            .map(|(axis, degree)| {
                u32::try_from(degree)
                    .map_err(|_| ConfigError::NegativeDegree { axis, degree })
            })
            .collect()
    }
}

impl From<u32> for DegreeSpec {
    fn from(degree: u32) -> Self {
        DegreeSpec::Uniform(i64::from(degree))
    }
}

/// Degree escalation used to meet a tolerance level.
#[derive(Clone, Debug)]
pub struct DegreeSchedule {
    pub start: DegreeSpec,
    pub step: u32,
    pub max: u32,
}

impl Default for DegreeSchedule {
    fn default() -> Self {
        DegreeSchedule {
            start: DegreeSpec::Uniform(4),
            step: 2,
            max: 12,
        }
    }
}

/// How the domain is split before approximation.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, EnumString, IntoStaticStr,
)]
#[strum(serialize_all = "lowercase")]
pub enum Partition {
    #[default]
    Whole,
    Orthants,
}

/// Sampling parameters for one approximation pass.
#[derive(Clone, Debug, Default)]
pub struct GridSpec {
    pub basis: BasisKind,
    pub degrees: DegreeSchedule,
    /// Extra sample nodes per axis beyond `degree + 1`. Zero gives exact
    /// interpolation.
    pub oversample: u32,
}

#[derive(Clone, Copy, Debug)]
pub struct MergeConfig {
    /// Distance below which two refined points are the same critical point.
    pub tolerance: f64,
}

impl Default for MergeConfig {
    fn default() -> Self {
        MergeConfig { tolerance: 1e-4 }
    }
}

#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub grid: GridSpec,
    pub precision: PrecisionKind,
    /// L2 targets, one pipeline pass per entry.
    pub tolerances: Vec<f64>,
    /// Fail a pass whose degree schedule runs out before meeting its
    /// tolerance, instead of continuing with the best fit.
    pub require_tolerance: bool,
    pub partition: Partition,
    pub extractor: ExtractorConfig,
    pub refine: RefineConfig,
    pub merge: MergeConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            grid: GridSpec::default(),
            precision: PrecisionKind::default(),
            tolerances: vec![1e-3],
            require_tolerance: false,
            partition: Partition::default(),
            extractor: ExtractorConfig::default(),
            refine: RefineConfig::default(),
            merge: MergeConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Checks the configuration against a domain of dimension `dim`.
    pub fn validate(&self, dim: usize) -> Result<(), ConfigError> {
        if dim == 0 {
            return Err(ConfigError::EmptyDomain);
        }

        let schedule = &self.grid.degrees;
        let start = schedule.start.resolve(dim)?;

        if let Some(&degree) = start.iter().find(|&&d| d > schedule.max) {
            return Err(ConfigError::DegreeAboveMax {
                degree,
                max: schedule.max,
            });
        }

        if self.tolerances.is_empty() {
            return Err(ConfigError::NoTolerances);
        }

        if let Some(&tolerance) =
            self.tolerances.iter().find(|t| !(t.is_finite() && **t > 0.0))
        {
            return Err(ConfigError::InvalidTolerance(tolerance));
        }

        self.precision.validate()?;

        let parameters = [
            ("merge_tolerance", self.merge.tolerance),
            ("boundary_tolerance", self.extractor.boundary_tolerance),
            ("coefficient_cutoff", self.extractor.coefficient_cutoff),
            ("gradient_tolerance", self.refine.gradient_tolerance),
            ("step_tolerance", self.refine.step_tolerance),
            ("zero_eigenvalue", self.refine.zero_eigenvalue_tolerance),
            ("capture_radius", self.refine.capture_radius),
        ];

        for (name, value) in parameters {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ConfigError::InvalidParameter { name, value });
            }
        }

        if self.refine.max_iterations == 0 {
            return Err(ConfigError::InvalidParameter {
                name: "max_iterations",
                value: 0.0,
            });
        }

        Ok(())
    }
}

/// An invalid degree, dimension, or precision combination.
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub enum ConfigError {
    EmptyDomain,
    NegativeDegree { axis: usize, degree: i64 },
    DegreeArity { expected: usize, found: usize },
    DegreeAboveMax { degree: u32, max: u32 },
    DimensionMismatch { expected: usize, found: usize },
    InvalidCenter { axis: usize, value: f64 },
    InvalidScale { axis: usize, value: f64 },
    NoTolerances,
    InvalidTolerance(f64),
    InvalidPrecision(&'static str),
    InvalidParameter { name: &'static str, value: f64 },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConfigError::EmptyDomain => {
                write!(f, "domain must have at least one axis")
            }
            ConfigError::NegativeDegree { axis, degree } => {
                write!(f, "degree {degree} on axis {axis} is negative")
            }
            ConfigError::DegreeArity { expected, found } => write!(
                f,
                "expected {expected} per-axis degrees, found {found}"
            ),
            ConfigError::DegreeAboveMax { degree, max } => {
                write!(f, "starting degree {degree} exceeds maximum {max}")
            }
            ConfigError::DimensionMismatch { expected, found } => {
                write!(f, "expected dimension {expected}, found {found}")
            }
            ConfigError::InvalidCenter { axis, value } => {
                write!(f, "center {value} on axis {axis} is not finite")
            }
            ConfigError::InvalidScale { axis, value } => write!(
                f,
                "half-width {value} on axis {axis} is not a positive number"
            ),
            ConfigError::NoTolerances => {
                write!(f, "at least one tolerance level is required")
            }
            ConfigError::InvalidTolerance(value) => {
                write!(f, "tolerance {value} is not a positive number")
            }
            ConfigError::InvalidPrecision(reason) => {
                write!(f, "invalid precision: {reason}")
            }
            ConfigError::InvalidParameter { name, value } => {
                write!(f, "invalid value {value} for `{name}`")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_degrees() {
        assert_eq!(DegreeSpec::Uniform(3).resolve(2), Ok(vec![3, 3]));
        assert_eq!(
            DegreeSpec::PerAxis(vec![2, 0, 5]).resolve(3),
            Ok(vec![2, 0, 5])
        );
    }

    #[test]
    fn rejects_bad_degrees() {
        assert_eq!(
            DegreeSpec::Uniform(-1).resolve(2),
            Err(ConfigError::NegativeDegree {
                axis: 0,
                degree: -1
            })
        );
        assert_eq!(
            DegreeSpec::PerAxis(vec![2, 2]).resolve(3),
            Err(ConfigError::DegreeArity {
                expected: 3,
                found: 2
            })
        );
    }

    #[test]
    fn validates_pipeline() {
        let config = PipelineConfig::default();

        assert_eq!(config.validate(2), Ok(()));
        assert_eq!(config.validate(0), Err(ConfigError::EmptyDomain));

        let config = PipelineConfig {
            tolerances: vec![1e-3, -1.0],
            ..PipelineConfig::default()
        };

        assert_eq!(
            config.validate(2),
            Err(ConfigError::InvalidTolerance(-1.0))
        );

        let config = PipelineConfig {
            grid: GridSpec {
                degrees: DegreeSchedule {
                    start: DegreeSpec::Uniform(-1),
                    ..DegreeSchedule::default()
                },
                ..GridSpec::default()
            },
            ..PipelineConfig::default()
        };

        assert!(matches!(
            config.validate(2),
            Err(ConfigError::NegativeDegree { degree: -1, .. })
        ));
    }
}
