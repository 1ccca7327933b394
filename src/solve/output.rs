//! Parser for the algebraic solver's text output.
//!
//! The output is a `dimension` record, then for zero-dimensional systems a
//! `solutions` record followed by one line of coordinates per solution.

use std::fmt;

use malachite::Rational;
use pest::error::{Error, ErrorVariant, LineColLocation};
use pest_consume::{match_nodes, Parser};

use crate::utils::rational::{parse_exact, to_f64};

#[derive(Parser)]
#[grammar = "solve/output.pest"]
struct OutputParser;

type ParseResult<T> = Result<T, Error<Rule>>;
type Node<'i> = pest_consume::Node<'i, Rule, ()>;

/// A solution coordinate as printed by the solver.
#[derive(Clone, Debug, PartialEq)]
pub enum Coordinate {
    Exact(Rational),
    Float(f64),
}

impl Coordinate {
    pub fn to_f64(&self) -> f64 {
        match self {
            Coordinate::Exact(value) => to_f64(value),
            Coordinate::Float(value) => *value,
        }
    }

    pub fn exact(&self) -> Option<&Rational> {
        match self {
            Coordinate::Exact(value) => Some(value),
            Coordinate::Float(_) => None,
        }
    }
}

/// The solver's answer, validated against the number of unknowns.
#[derive(Clone, Debug, PartialEq)]
pub enum SolverOutput {
    /// The system has no solutions at all.
    Empty,
    /// The solution set has the given positive dimension.
    PositiveDimensional(i64),
    Points(Vec<Vec<Coordinate>>),
}

struct Record<T> {
    line: usize,
    value: T,
}

struct RawOutput {
    dimension: Record<i64>,
    solutions: Option<Record<i64>>,
    points: Vec<Record<Vec<Coordinate>>>,
}

#[pest_consume::parser]
impl OutputParser {
    fn EOI(_input: Node) -> ParseResult<()> {
        Ok(())
    }

    fn file(input: Node) -> ParseResult<RawOutput> {
        Ok(match_nodes!(input.into_children();
            [dimension(dimension), EOI(_)] => RawOutput {
                dimension,
                solutions: None,
                points: Vec::new(),
            },
            [dimension(dimension), solutions(solutions), point(points).., EOI(_)] => {
                RawOutput {
                    dimension,
                    solutions: Some(solutions),
                    points: points.collect(),
                }
            },
        ))
    }

    fn dimension(input: Node) -> ParseResult<Record<i64>> {
        let line = line_of(&input);

        Ok(match_nodes!(input.into_children();
            [count(value)] => Record { line, value },
        ))
    }

    fn solutions(input: Node) -> ParseResult<Record<i64>> {
        let line = line_of(&input);

        Ok(match_nodes!(input.into_children();
            [count(value)] => Record { line, value },
        ))
    }

    fn count(input: Node) -> ParseResult<i64> {
        input
            .as_str()
            .parse()
            .map_err(|_| input.error("count out of range"))
    }

    fn point(input: Node) -> ParseResult<Record<Vec<Coordinate>>> {
        let line = line_of(&input);

        Ok(match_nodes!(input.into_children();
            [coordinate(values)..] => Record {
                line,
                value: values.collect(),
            },
        ))
    }

    fn coordinate(input: Node) -> ParseResult<Coordinate> {
        Ok(match_nodes!(input.into_children();
            [ratio(value)] => Coordinate::Exact(value),
            [integer(value)] => Coordinate::Exact(value),
            [decimal(value)] => Coordinate::Float(value),
        ))
    }

    fn ratio(input: Node) -> ParseResult<Rational> {
        parse_exact(input.as_str())
            .ok_or_else(|| input.error("invalid rational literal"))
    }

    fn integer(input: Node) -> ParseResult<Rational> {
        parse_exact(input.as_str())
            .ok_or_else(|| input.error("invalid integer literal"))
    }

    fn decimal(input: Node) -> ParseResult<f64> {
        match input.as_str().parse::<f64>() {
            Ok(value) if value.is_finite() => Ok(value),
            _ => Err(input.error("invalid decimal literal")),
        }
    }
}

fn line_of(input: &Node) -> usize {
    input.as_span().start_pos().line_col().0
}

/// Parses and validates solver output for a system in `nvars` unknowns.
pub fn parse_output(
    text: &str,
    nvars: usize,
) -> Result<SolverOutput, ParseError> {
    if text.trim().is_empty() {
        return Err(ParseError::Empty);
    }

    let nodes = OutputParser::parse(Rule::file, text)?;
    let raw = OutputParser::file(nodes.single()?)?;

    let dimension = raw.dimension.value;

    match dimension {
        -1 => return Ok(SolverOutput::Empty),
        0 => {}
        d if d > 0 => return Ok(SolverOutput::PositiveDimensional(d)),
        d => {
            return Err(ParseError::Syntax {
                line: raw.dimension.line,
                message: format!("invalid dimension {d}"),
            })
        }
    }

    let Some(solutions) = raw.solutions else {
        return Err(ParseError::Syntax {
            line: raw.dimension.line + 1,
            message: "missing solutions record".to_string(),
        });
    };

    let expected = usize::try_from(solutions.value).map_err(|_| {
        ParseError::Syntax {
            line: solutions.line,
            message: format!("invalid solution count {}", solutions.value),
        }
    })?;

    if raw.points.len() != expected {
        return Err(ParseError::RecordCount {
            line: solutions.line,
            expected,
            found: raw.points.len(),
        });
    }

    let points = raw
        .points
        .into_iter()
        .map(|record| {
            if record.value.len() == nvars {
                Ok(record.value)
            } else {
                Err(ParseError::Arity {
                    line: record.line,
                    expected: nvars,
                    found: record.value.len(),
                })
            }
        })
        .collect::<Result<Vec<_>, _>>()?;

    if points.is_empty() {
        Ok(SolverOutput::Empty)
    } else {
        Ok(SolverOutput::Points(points))
    }
}

/// Malformed solver output.
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum ParseError {
    Empty,
    Syntax { line: usize, message: String },
    Arity { line: usize, expected: usize, found: usize },
    RecordCount { line: usize, expected: usize, found: usize },
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ParseError::Empty => write!(f, "empty output"),
            ParseError::Syntax { line, message } => {
                write!(f, "line {line}: {message}")
            }
            ParseError::Arity {
                line,
                expected,
                found,
            } => write!(
                f,
                "line {line}: expected {expected} coordinates, found {found}"
            ),
            ParseError::RecordCount {
                line,
                expected,
                found,
            } => write!(
                f,
                "line {line}: announced {expected} solutions, found {found}"
            ),
        }
    }
}

impl std::error::Error for ParseError {}

impl From<Error<Rule>> for ParseError {
    fn from(err: Error<Rule>) -> Self {
        let line = match err.line_col {
            LineColLocation::Pos((line, _)) => line,
            LineColLocation::Span((line, _), _) => line,
        };

        let message = match &err.variant {
            ErrorVariant::CustomError { message } => message.clone(),
            ErrorVariant::ParsingError { .. } => {
                "unexpected input".to_string()
            }
        };

        ParseError::Syntax { line, message }
    }
}
