use std::path::PathBuf;
use std::time::Duration;

use argh::FromArgs;
use log::LevelFilter;
use strum_macros::{EnumString, IntoStaticStr};

use crate::approx::PrecisionKind;
use crate::basis::BasisKind;
use crate::config::{
    ConfigError, DegreeSchedule, DegreeSpec, GridSpec, MergeConfig, Partition,
    PipelineConfig,
};
use crate::critical::ExtractorConfig;
use crate::domain::Domain;
use crate::refine::{HessianSource, RefineConfig};
use crate::solve::{AlgebraicSolver, HomotopySolver, PolynomialSolver};

#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, EnumString, IntoStaticStr,
)]
#[strum(serialize_all = "lowercase")]
pub enum SolverKind {
    #[default]
    Homotopy,
    Algebraic,
}

/// Find and classify the critical points of a function on a box.
#[derive(FromArgs)]
pub struct Opts {
    /// objective over x0, x1, ... (read from --file or stdin if omitted)
    #[argh(positional)]
    pub expression: Option<String>,

    /// file containing the objective
    #[argh(option, short = 'f')]
    pub file: Option<PathBuf>,

    /// domain center as a comma-separated list (default: the origin)
    #[argh(option, from_str_fn(parse_list))]
    pub center: Option<Vec<f64>>,

    /// half-width of the domain, one value or one per axis (default: 1)
    #[argh(option, from_str_fn(parse_list))]
    pub radius: Option<Vec<f64>>,

    /// domain bounds as lo:hi pairs, overriding --center and --radius
    #[argh(option, from_str_fn(parse_bounds))]
    pub bounds: Option<Vec<(f64, f64)>>,

    /// initial polynomial degree
    #[argh(option, short = 'd', default = "4")]
    pub degree: i64,

    /// degree increment while a tolerance is not met
    #[argh(option, default = "2")]
    pub degree_step: u32,

    /// largest polynomial degree
    #[argh(option, default = "12")]
    pub max_degree: u32,

    /// orthogonal basis
    #[argh(option, default = "Default::default()")]
    pub basis: BasisKind,

    /// extra sample nodes per axis
    #[argh(option, default = "0")]
    pub oversample: u32,

    /// coefficient arithmetic: float64, rational, float:<bits> or
    /// integer:<bits>
    #[argh(option, default = "Default::default()")]
    pub precision: PrecisionKind,

    /// target L2 error of the fit (repeatable)
    #[argh(option, short = 't')]
    pub tolerance: Vec<f64>,

    /// fail a subdomain whose tolerance is not met at the largest degree
    #[argh(switch)]
    pub require_tolerance: bool,

    /// domain partitioning: whole or orthants
    #[argh(option, default = "Default::default()")]
    pub partition: Partition,

    /// hessian used in refinement: function or approximant
    #[argh(option, default = "Default::default()")]
    pub hessian: HessianSource,

    /// distance below which refined points are merged
    #[argh(option, default = "1e-4")]
    pub merge_tolerance: f64,

    /// polynomial system solver: homotopy or algebraic
    #[argh(option, default = "Default::default()")]
    pub solver: SolverKind,

    /// external program for the algebraic solver
    #[argh(option, default = "String::from(\"msolve-real\")")]
    pub program: String,

    /// argument passed to the external solver (repeatable)
    #[argh(option)]
    pub solver_arg: Vec<String>,

    /// seconds before the external solver is killed
    #[argh(option)]
    pub timeout: Option<f64>,

    /// logging level
    #[argh(option, long = "log", default = "LevelFilter::Warn")]
    pub log_level: LevelFilter,
}

impl Opts {
    /// Parse options from `env::args`.
    pub fn parse() -> Opts {
        argh::from_env()
    }

    /// The search domain; `arity` sets the dimension when neither bounds
    /// nor a center are given.
    pub fn domain(&self, arity: usize) -> Result<Domain, ConfigError> {
        if let Some(bounds) = &self.bounds {
            return Domain::from_bounds(bounds);
        }

        let center = self.center.clone().unwrap_or_else(|| vec![0.0; arity]);

        match self.radius.as_deref().unwrap_or(&[1.0]) {
            &[radius] => Domain::cube(center, radius),
            scale => Domain::new(center, scale.to_vec()),
        }
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        let tolerances = if self.tolerance.is_empty() {
            PipelineConfig::default().tolerances
        } else {
            self.tolerance.clone()
        };

        PipelineConfig {
            grid: GridSpec {
                basis: self.basis,
                degrees: DegreeSchedule {
                    start: DegreeSpec::Uniform(self.degree),
                    step: self.degree_step,
                    max: self.max_degree,
                },
                oversample: self.oversample,
            },
            precision: self.precision,
            tolerances,
            require_tolerance: self.require_tolerance,
            partition: self.partition,
            extractor: ExtractorConfig::default(),
            refine: RefineConfig {
                hessian: self.hessian,
                ..RefineConfig::default()
            },
            merge: MergeConfig {
                tolerance: self.merge_tolerance,
            },
        }
    }

    pub fn solver(&self) -> Box<dyn PolynomialSolver> {
        match self.solver {
            SolverKind::Homotopy => Box::new(HomotopySolver::new()),
            SolverKind::Algebraic => {
                let mut solver = AlgebraicSolver::new(&self.program)
                    .with_args(&self.solver_arg);

                if let Some(seconds) = self.timeout {
                    let timeout = Duration::from_secs_f64(seconds);

                    solver = solver.with_timeout(timeout);
                }

                Box::new(solver)
            }
        }
    }
}

fn parse_number(item: &str) -> Result<f64, String> {
    item.trim()
        .parse()
        .map_err(|_| format!("invalid number `{item}`"))
}

fn parse_list(value: &str) -> Result<Vec<f64>, String> {
    value.split(',').map(parse_number).collect()
}

fn parse_bounds(value: &str) -> Result<Vec<(f64, f64)>, String> {
    value
        .split(',')
        .map(|pair| {
            let (lo, hi) = pair
                .split_once(':')
                .ok_or_else(|| format!("expected lo:hi, found `{pair}`"))?;

            Ok((parse_number(lo)?, parse_number(hi)?))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(args: &[&str]) -> Opts {
        Opts::from_args(&["globtim"], args).unwrap()
    }

    #[test]
    fn defaults() {
        let opts = opts(&["x0^2"]);
        let config = opts.pipeline_config();

        assert_eq!(opts.expression.as_deref(), Some("x0^2"));
        assert_eq!(config.tolerances, vec![1e-3]);
        assert_eq!(config.grid.degrees.start, DegreeSpec::Uniform(4));
        assert_eq!(opts.domain(2), Domain::cube(vec![0.0, 0.0], 1.0));
        assert_eq!(opts.solver().name(), "homotopy");
        assert_eq!(opts.radius, None);
    }

    #[test]
    fn domain_options() {
        let domain = opts(&["--center", "1,2", "--radius", "0.5,3"])
            .domain(5)
            .unwrap();

        assert_eq!(domain.center(), &[1.0, 2.0]);
        assert_eq!(domain.scale(), &[0.5, 3.0]);

        let domain = opts(&["--bounds", "-1:3,0:2", "--center", "9"])
            .domain(1)
            .unwrap();

        assert_eq!(domain.center(), &[1.0, 1.0]);
        assert_eq!(domain.scale(), &[2.0, 1.0]);
    }

    #[test]
    fn pipeline_options() {
        let opts = opts(&[
            "-t",
            "1e-2",
            "-t",
            "1e-5",
            "--precision",
            "float:128",
            "--partition",
            "orthants",
            "--solver",
            "algebraic",
            "--timeout",
            "2.5",
        ]);
        let config = opts.pipeline_config();

        assert_eq!(config.tolerances, vec![1e-2, 1e-5]);
        assert_eq!(
            config.precision,
            PrecisionKind::ArbitraryFloat { bits: 128 }
        );
        assert_eq!(config.partition, Partition::Orthants);
        assert_eq!(opts.solver().name(), "algebraic");
    }

    #[test]
    fn rejects_malformed_lists() {
        assert!(parse_list("1,x").is_err());
        assert!(parse_bounds("1:2,3").is_err());
        assert_eq!(parse_bounds(" -1 : 1"), Ok(vec![(-1.0, 1.0)]));
    }
}
