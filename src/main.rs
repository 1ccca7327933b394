use std::borrow::Cow;
use std::fs;
use std::io;
use std::process::ExitCode;

use globtim::expr::Expression;
use globtim::opts::Opts;
use globtim::orchestrate::Orchestrator;
use globtim::refine::RefinedPoint;
use globtim::utils::{Diagnostic, Reporter};

fn read_input(opts: &Opts) -> io::Result<(Cow<'_, str>, String)> {
    if let Some(expression) = &opts.expression {
        Ok((Cow::from("<expression>"), expression.clone()))
    } else if let Some(file) = &opts.file {
        let filename = file.to_string_lossy();
        let src = fs::read_to_string(file)?;

        Ok((filename, src))
    } else {
        let filename = Cow::from("<stdin>");
        let src = io::read_to_string(io::stdin())?;

        Ok((filename, src))
    }
}

fn format_point(point: &RefinedPoint) -> String {
    let coordinates = point
        .coordinates
        .iter()
        .map(|x| format!("{x:.10}"))
        .collect::<Vec<_>>()
        .join(", ");
    let label: &'static str = point.label.into();

    format!(
        "{label:<13} f = {:<18.10e} x = [{coordinates}]  |g| = {:.1e}",
        point.value, point.gradient_norm
    )
}

fn main() -> ExitCode {
    let opts = Opts::parse();

    env_logger::Builder::new()
        .filter_level(opts.log_level)
        .format_timestamp(None)
        .init();

    let (filename, src) = match read_input(&opts) {
        Ok(result) => result,
        Err(err) => {
            Reporter::new("", "").emit(&Diagnostic::from(err));

            return ExitCode::FAILURE;
        }
    };

    let mut reporter = Reporter::new(&filename, &src);

    let objective = match Expression::parse(&src) {
        Ok(objective) => objective,
        Err(err) => {
            reporter.emit(&err.diagnostic());

            return ExitCode::FAILURE;
        }
    };

    let domain = match opts.domain(objective.arity()) {
        Ok(domain) => domain,
        Err(err) => {
            reporter.emit(&Diagnostic::error().with_message(err.to_string()));

            return ExitCode::FAILURE;
        }
    };

    if let Err(err) = objective.check_dimension(domain.dim()) {
        reporter.emit(&err.diagnostic());

        return ExitCode::FAILURE;
    }

    let config = opts.pipeline_config();
    let solver = opts.solver();
    let f = |x: &[f64]| objective.eval(x);

    let orchestrator =
        match Orchestrator::new(&domain, &config, solver.as_ref(), &f) {
            Ok(orchestrator) => orchestrator,
            Err(err) => {
                reporter.emit(
                    &Diagnostic::error()
                        .with_message(format!("invalid configuration: {err}")),
                );

                return ExitCode::FAILURE;
            }
        };

    let result = orchestrator.run();

    for point in result.by_value() {
        println!("{}", format_point(point));
    }

    println!("{result}");

    if result.levels.iter().all(|level| level.pairs.is_empty()) {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
