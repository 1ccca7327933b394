//! Parser for objective expressions.

use itertools::Itertools;
use pest::error::Error;
use pest_consume::{match_nodes, Parser};

use super::{BinOp, Expr, Func};

#[derive(Parser)]
#[grammar = "expr/syntax.pest"]
pub struct ExprParser;

impl ExprParser {
    pub fn parse_expr(src: &str) -> Result<Expr, Box<Error<Rule>>> {
        let nodes = ExprParser::parse(Rule::file, src)?;

        ExprParser::file(nodes.single()?).map_err(Box::new)
    }
}

type ParseResult<T> = Result<T, Error<Rule>>;
type Node<'i> = pest_consume::Node<'i, Rule, ()>;

#[pest_consume::parser]
impl ExprParser {
    fn EOI(_input: Node) -> ParseResult<()> {
        Ok(())
    }

    fn file(input: Node) -> ParseResult<Expr> {
        Ok(match_nodes!(input.into_children();
            [expr(expr), EOI(_)] => expr,
        ))
    }

    fn expr(input: Node) -> ParseResult<Expr> {
        chain(input, ExprParser::term, ExprParser::add_op)
    }

    fn term(input: Node) -> ParseResult<Expr> {
        chain(input, ExprParser::factor, ExprParser::mul_op)
    }

    fn factor(input: Node) -> ParseResult<Expr> {
        Ok(match_nodes!(input.into_children();
            [neg(signs).., power(base)] => {
                signs.fold(base, |expr, _| Expr::Neg(Box::new(expr)))
            },
        ))
    }

    fn power(input: Node) -> ParseResult<Expr> {
        Ok(match_nodes!(input.into_children();
            [atom(base)] => base,
            [atom(base), factor(exponent)] => {
                Expr::Binary(BinOp::Pow, Box::new(base), Box::new(exponent))
            },
        ))
    }

    fn atom(input: Node) -> ParseResult<Expr> {
        Ok(match_nodes!(input.into_children();
            [number(value)] => Expr::Num(value),
            [call(call)] => call,
            [constant(value)] => Expr::Num(value),
            [variable(var)] => var,
            [expr(expr)] => expr,
        ))
    }

    fn call(input: Node) -> ParseResult<Expr> {
        Ok(match_nodes!(input.into_children();
            [function(func), expr(arg)] => Expr::Call(func, Box::new(arg)),
        ))
    }

    fn function(input: Node) -> ParseResult<Func> {
        input
            .as_str()
            .parse()
            .map_err(|_| input.error("unknown function"))
    }

    fn number(input: Node) -> ParseResult<f64> {
        match input.as_str().parse::<f64>() {
            Ok(value) if value.is_finite() => Ok(value),
            _ => Err(input.error("number out of range")),
        }
    }

    fn constant(_input: Node) -> ParseResult<f64> {
        Ok(std::f64::consts::PI)
    }

    fn variable(input: Node) -> ParseResult<Expr> {
        let index = input.as_str()[1..]
            .parse()
            .map_err(|_| input.error("variable index out of range"))?;
        let span = input.as_span();

        Ok(Expr::Var {
            index,
            span: span.start()..span.end(),
        })
    }

    fn neg(_input: Node) -> ParseResult<()> {
        Ok(())
    }

    fn add_op(input: Node) -> ParseResult<BinOp> {
        binop(&input)
    }

    fn mul_op(input: Node) -> ParseResult<BinOp> {
        binop(&input)
    }
}

fn binop(input: &Node) -> ParseResult<BinOp> {
    input
        .as_str()
        .parse()
        .map_err(|_| input.error("unknown operator"))
}

/// Folds `operand (operator operand)*` to the left.
fn chain(
    input: Node,
    operand: fn(Node) -> ParseResult<Expr>,
    operator: fn(Node) -> ParseResult<BinOp>,
) -> ParseResult<Expr> {
    let missing = input.error("missing operand");
    let mut children = input.into_children();

    let first = children.next().ok_or(missing)?;
    let mut lhs = operand(first)?;

    for (op, rhs) in children.tuples() {
        let op = operator(op)?;

        lhs = Expr::Binary(op, Box::new(lhs), Box::new(operand(rhs)?));
    }

    Ok(lhs)
}
