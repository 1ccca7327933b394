//! Arithmetic expressions over `x0, x1, ...` used as objectives.

mod parser;

use std::fmt;
use std::ops::Range;
use std::str::FromStr;

use strum_macros::{EnumString, IntoStaticStr};

pub use parser::ExprParser;

use crate::utils::diagnostics::{location_span, Diagnostic};

#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumString, IntoStaticStr)]
pub enum BinOp {
    #[strum(serialize = "+")]
    Add,
    #[strum(serialize = "-")]
    Sub,
    #[strum(serialize = "*")]
    Mul,
    #[strum(serialize = "/")]
    Div,
    #[strum(serialize = "^")]
    Pow,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumString, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum Func {
    Sin,
    Cos,
    Tan,
    Tanh,
    Exp,
    Log,
    Sqrt,
    Abs,
}

impl Func {
    fn apply(self, x: f64) -> f64 {
        match self {
            Func::Sin => x.sin(),
            Func::Cos => x.cos(),
            Func::Tan => x.tan(),
            Func::Tanh => x.tanh(),
            Func::Exp => x.exp(),
            Func::Log => x.ln(),
            Func::Sqrt => x.sqrt(),
            Func::Abs => x.abs(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Num(f64),
    Var { index: usize, span: Range<usize> },
    Neg(Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Call(Func, Box<Expr>),
}

impl Expr {
    pub fn eval(&self, x: &[f64]) -> f64 {
        match self {
            Expr::Num(value) => *value,
            Expr::Var { index, .. } => {
                x.get(*index).copied().unwrap_or(f64::NAN)
            }
            Expr::Neg(arg) => -arg.eval(x),
            Expr::Binary(op, lhs, rhs) => {
                let (a, b) = (lhs.eval(x), rhs.eval(x));

                match op {
                    BinOp::Add => a + b,
                    BinOp::Sub => a - b,
                    BinOp::Mul => a * b,
                    BinOp::Div => a / b,
                    BinOp::Pow => a.powf(b),
                }
            }
            Expr::Call(func, arg) => func.apply(arg.eval(x)),
        }
    }

    fn visit_vars<'a>(
        &'a self,
        visit: &mut dyn FnMut(usize, &'a Range<usize>),
    ) {
        match self {
            Expr::Num(_) => {}
            Expr::Var { index, span } => visit(*index, span),
            Expr::Neg(arg) | Expr::Call(_, arg) => arg.visit_vars(visit),
            Expr::Binary(_, lhs, rhs) => {
                lhs.visit_vars(visit);
                rhs.visit_vars(visit);
            }
        }
    }
}

/// A parsed objective.
///
/// ```
/// use globtim::expr::Expression;
///
/// let f: Expression = "x0^2 + 3 * sin(x1)".parse().unwrap();
///
/// assert_eq!(f.arity(), 2);
/// assert_eq!(f.eval(&[2.0, 0.0]), 4.0);
/// ```
#[derive(Clone, Debug)]
pub struct Expression {
    root: Expr,
}

impl Expression {
    pub fn parse(source: &str) -> Result<Expression, ExprError> {
        let root = ExprParser::parse_expr(source).map_err(|err| {
            ExprError::Syntax {
                span: location_span(&err.location),
                message: err.variant.message().into_owned(),
            }
        })?;

        Ok(Expression { root })
    }

    pub fn root(&self) -> &Expr {
        &self.root
    }

    /// One more than the largest variable index used.
    pub fn arity(&self) -> usize {
        let mut arity = 0;

        self.root.visit_vars(&mut |index, _| arity = arity.max(index + 1));

        arity
    }

    /// Checks that every variable exists in a space of dimension `dim`.
    pub fn check_dimension(&self, dim: usize) -> Result<(), ExprError> {
        let mut unknown = None;

        self.root.visit_vars(&mut |index, span| {
            if index >= dim && unknown.is_none() {
                unknown = Some(ExprError::UnknownVariable {
                    index,
                    dim,
                    span: span.clone(),
                });
            }
        });

        unknown.map_or(Ok(()), Err)
    }

    pub fn eval(&self, x: &[f64]) -> f64 {
        self.root.eval(x)
    }
}

impl FromStr for Expression {
    type Err = ExprError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Expression::parse(s)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ExprError {
    Syntax {
        span: Range<usize>,
        message: String,
    },
    UnknownVariable {
        index: usize,
        dim: usize,
        span: Range<usize>,
    },
}

impl ExprError {
    pub fn diagnostic(&self) -> Diagnostic {
        match self {
            ExprError::Syntax { span, message } => Diagnostic::error()
                .with_message("syntax error")
                .with_primary(span.clone(), message.as_str()),
            ExprError::UnknownVariable { index, dim, span } => {
                Diagnostic::error()
                    .with_message(format!("unknown variable x{index}"))
                    .with_primary(span.clone(), "not a coordinate")
                    .with_note(format!(
                        "the domain has {dim} dimensions, x0 to x{}",
                        dim.saturating_sub(1)
                    ))
            }
        }
    }
}

impl fmt::Display for ExprError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ExprError::Syntax { message, .. } => {
                write!(f, "syntax error: {message}")
            }
            ExprError::UnknownVariable { index, dim, .. } => {
                write!(f, "variable x{index} outside {dim} dimensions")
            }
        }
    }
}

impl std::error::Error for ExprError {}
