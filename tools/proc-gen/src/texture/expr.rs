//! Per-pixel math expressions over textures
//!
//! A small arithmetic language evaluated independently for every pixel. `x`
//! names the current buffer; any other identifier names an input texture that
//! the caller binds. Comparisons yield 1.0 or 0.0, `&` and `|` treat any
//! non-zero value as true.
//!
//! Source text is tokenized with `logos` and parsed with `chumsky`.
//!
//! ```
//! use proc_gen::texture::{Expr, TextureBuffer};
//!
//! let expr = Expr::parse("clip(x * 2 - mask, 0, 1)").unwrap();
//! assert_eq!(expr.variables(), ["mask"]);
//!
//! let x = TextureBuffer::filled(2, 2, 0.75);
//! let mask = TextureBuffer::filled(2, 2, 0.25);
//! let out = expr.evaluate(&x, &[&mask]).unwrap();
//! assert_eq!(out.get(0, 0), 1.0);
//! ```

use super::TextureBuffer;
use chumsky::prelude::*;
use logos::Logos;
use std::ops::Range;
use thiserror::Error;

/// Deepest parenthesis nesting accepted by the parser
const MAX_NESTING: usize = 32;

/// Deepest expression tree accepted after parsing
const MAX_DEPTH: usize = 256;

/// Expression parse or evaluation failure
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExprError {
    #[error("unexpected character '{ch}' at offset {offset}")]
    UnexpectedChar { ch: char, offset: usize },

    #[error("unexpected {found} at offset {offset}")]
    UnexpectedToken { found: String, offset: usize },

    #[error("expression nests deeper than {limit} levels at offset {offset}")]
    TooDeep { limit: usize, offset: usize },

    #[error("unknown function '{0}'")]
    UnknownFunction(String),

    #[error("function '{name}' takes {expected} argument(s), got {got}")]
    Arity {
        name: String,
        expected: usize,
        got: usize,
    },

    #[error("expected {expected} input texture(s), got {got}")]
    InputCount { expected: usize, got: usize },

    #[error("input texture '{name}' is {got_w}x{got_h}, expected {want_w}x{want_h}")]
    InputSize {
        name: String,
        got_w: u32,
        got_h: u32,
        want_w: u32,
        want_h: u32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Func {
    Abs,
    Sqrt,
    Exp,
    Log,
    Sin,
    Cos,
    Tan,
    Floor,
    Ceil,
    Round,
    Min,
    Max,
    Pow,
    Clip,
    Where,
}

impl Func {
    fn lookup(name: &str) -> Option<Self> {
        let name = name.strip_prefix("np.").unwrap_or(name);
        Some(match name {
            "abs" => Func::Abs,
            "sqrt" => Func::Sqrt,
            "exp" => Func::Exp,
            "log" => Func::Log,
            "sin" => Func::Sin,
            "cos" => Func::Cos,
            "tan" => Func::Tan,
            "floor" => Func::Floor,
            "ceil" => Func::Ceil,
            "round" => Func::Round,
            "min" | "minimum" => Func::Min,
            "max" | "maximum" => Func::Max,
            "pow" | "power" => Func::Pow,
            "clip" => Func::Clip,
            "where" => Func::Where,
            _ => return None,
        })
    }

    fn arity(self) -> usize {
        match self {
            Func::Min | Func::Max | Func::Pow => 2,
            Func::Clip | Func::Where => 3,
            _ => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Const(f32),
    Current,
    Var(usize),
    Neg(Box<Node>),
    Binary(BinaryOp, Box<Node>, Box<Node>),
    Call(Func, Vec<Node>),
}

/// A parsed per-pixel expression
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    root: Node,
    variables: Vec<String>,
}

impl Expr {
    /// Parse an expression.
    pub fn parse(source: &str) -> Result<Self, ExprError> {
        let (tokens, spans) = lex(source)?;
        check_nesting(&tokens, &spans)?;

        let syntax = expression()
            .then_ignore(end())
            .parse(tokens.as_slice())
            .into_result()
            .map_err(|errors| unexpected(&errors, &spans, source.len()))?;

        let mut variables = Vec::new();
        let root = lower(&syntax, &mut variables, 0)?;
        Ok(Self { root, variables })
    }

    /// Input texture names in order of first appearance (excluding `x`).
    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    /// Evaluate over every pixel of `current`.
    ///
    /// `inputs` must line up with [`Expr::variables`] and match the size of
    /// `current`.
    pub fn evaluate(
        &self,
        current: &TextureBuffer,
        inputs: &[&TextureBuffer],
    ) -> Result<TextureBuffer, ExprError> {
        if inputs.len() != self.variables.len() {
            return Err(ExprError::InputCount {
                expected: self.variables.len(),
                got: inputs.len(),
            });
        }
        for (name, input) in self.variables.iter().zip(inputs) {
            if !input.same_size(current) {
                return Err(ExprError::InputSize {
                    name: name.clone(),
                    got_w: input.width,
                    got_h: input.height,
                    want_w: current.width,
                    want_h: current.height,
                });
            }
        }

        let mut out = TextureBuffer::new(current.width, current.height);
        for (i, slot) in out.pixels.iter_mut().enumerate() {
            *slot = eval_node(&self.root, current.pixels[i], inputs, i);
        }
        Ok(out)
    }
}

fn truthy(v: f32) -> bool {
    v != 0.0
}

fn flag(b: bool) -> f32 {
    if b { 1.0 } else { 0.0 }
}

fn eval_node(node: &Node, x: f32, inputs: &[&TextureBuffer], i: usize) -> f32 {
    match node {
        Node::Const(v) => *v,
        Node::Current => x,
        Node::Var(slot) => inputs[*slot].pixels[i],
        Node::Neg(inner) => -eval_node(inner, x, inputs, i),
        Node::Binary(op, lhs, rhs) => {
            let a = eval_node(lhs, x, inputs, i);
            let b = eval_node(rhs, x, inputs, i);
            match op {
                BinaryOp::Add => a + b,
                BinaryOp::Sub => a - b,
                BinaryOp::Mul => a * b,
                BinaryOp::Div => a / b,
                BinaryOp::Rem => a - b * (a / b).floor(),
                BinaryOp::Pow => a.powf(b),
                BinaryOp::Lt => flag(a < b),
                BinaryOp::Le => flag(a <= b),
                BinaryOp::Gt => flag(a > b),
                BinaryOp::Ge => flag(a >= b),
                BinaryOp::Eq => flag(a == b),
                BinaryOp::Ne => flag(a != b),
                BinaryOp::And => flag(truthy(a) && truthy(b)),
                BinaryOp::Or => flag(truthy(a) || truthy(b)),
            }
        }
        Node::Call(func, args) => {
            let arg = |n: usize| eval_node(&args[n], x, inputs, i);
            match func {
                Func::Abs => arg(0).abs(),
                Func::Sqrt => arg(0).sqrt(),
                Func::Exp => arg(0).exp(),
                Func::Log => arg(0).ln(),
                Func::Sin => arg(0).sin(),
                Func::Cos => arg(0).cos(),
                Func::Tan => arg(0).tan(),
                Func::Floor => arg(0).floor(),
                Func::Ceil => arg(0).ceil(),
                Func::Round => arg(0).round(),
                Func::Min => arg(0).min(arg(1)),
                Func::Max => arg(0).max(arg(1)),
                Func::Pow => arg(0).powf(arg(1)),
                Func::Clip => arg(0).max(arg(1)).min(arg(2)),
                Func::Where => {
                    if truthy(arg(0)) {
                        arg(1)
                    } else {
                        arg(2)
                    }
                }
            }
        }
    }
}

#[derive(Logos, Debug, Clone, Copy, PartialEq)]
#[logos(skip r"[ \t\r\n\f]+")]
enum Token<'src> {
    #[regex(r"[0-9]+(\.[0-9]*)?([eE][+-]?[0-9]+)?", |lex| lex.slice().parse::<f32>().ok())]
    #[regex(r"\.[0-9]+([eE][+-]?[0-9]+)?", |lex| lex.slice().parse::<f32>().ok())]
    Number(f32),

    /// Names may carry a module prefix such as `np.clip`
    #[regex(r"[A-Za-z_][A-Za-z0-9_.]*", |lex| lex.slice())]
    Ident(&'src str),

    #[token("**")]
    Pow,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("<=")]
    Le,
    #[token(">=")]
    Ge,
    #[token("==")]
    EqEq,
    #[token("!=")]
    Ne,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("&")]
    Amp,
    #[token("|")]
    Pipe,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token(",")]
    Comma,
}

impl Token<'_> {
    fn describe(&self) -> String {
        match self {
            Token::Number(n) => format!("number {n}"),
            Token::Ident(name) => format!("identifier '{name}'"),
            Token::Pow => "'**'".to_string(),
            Token::Plus => "'+'".to_string(),
            Token::Minus => "'-'".to_string(),
            Token::Star => "'*'".to_string(),
            Token::Slash => "'/'".to_string(),
            Token::Percent => "'%'".to_string(),
            Token::Le => "'<='".to_string(),
            Token::Ge => "'>='".to_string(),
            Token::EqEq => "'=='".to_string(),
            Token::Ne => "'!='".to_string(),
            Token::Lt => "'<'".to_string(),
            Token::Gt => "'>'".to_string(),
            Token::Amp => "'&'".to_string(),
            Token::Pipe => "'|'".to_string(),
            Token::LParen => "'('".to_string(),
            Token::RParen => "')'".to_string(),
            Token::Comma => "','".to_string(),
        }
    }
}

/// Tokens with their byte ranges in the source
fn lex(source: &str) -> Result<(Vec<Token<'_>>, Vec<Range<usize>>), ExprError> {
    let mut tokens = Vec::new();
    let mut spans = Vec::new();
    for (token, span) in Token::lexer(source).spanned() {
        let token = token.map_err(|()| ExprError::UnexpectedChar {
            ch: source[span.start..].chars().next().unwrap_or(' '),
            offset: span.start,
        })?;
        tokens.push(token);
        spans.push(span);
    }
    Ok((tokens, spans))
}

/// The parser recurses once per open parenthesis, so nesting is bounded up front.
fn check_nesting(tokens: &[Token<'_>], spans: &[Range<usize>]) -> Result<(), ExprError> {
    let mut depth = 0usize;
    for (token, span) in tokens.iter().zip(spans) {
        match token {
            Token::LParen => {
                depth += 1;
                if depth > MAX_NESTING {
                    return Err(ExprError::TooDeep {
                        limit: MAX_NESTING,
                        offset: span.start,
                    });
                }
            }
            Token::RParen => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    Ok(())
}

fn unexpected(errors: &[Rich<'_, Token<'_>>], spans: &[Range<usize>], end: usize) -> ExprError {
    let Some(error) = errors.first() else {
        return ExprError::UnexpectedToken {
            found: "end of expression".to_string(),
            offset: end,
        };
    };
    ExprError::UnexpectedToken {
        found: error
            .found()
            .map_or_else(|| "end of expression".to_string(), |token| token.describe()),
        offset: spans.get(error.span().start).map_or(end, |span| span.start),
    }
}

/// Parsed syntax before names are bound to functions and input slots
#[derive(Debug, Clone, PartialEq)]
enum Syntax<'src> {
    Number(f32),
    Name(&'src str),
    Neg(Box<Syntax<'src>>),
    Binary(BinaryOp, Box<Syntax<'src>>, Box<Syntax<'src>>),
    Call(&'src str, Vec<Syntax<'src>>),
}

impl Syntax<'_> {
    fn binary(op: BinaryOp, lhs: Self, rhs: Self) -> Self {
        Syntax::Binary(op, Box::new(lhs), Box::new(rhs))
    }
}

type Extra<'t, 's> = extra::Err<Rich<'t, Token<'s>>>;

/// Left-associative chain of `operand (operator operand)*`
fn infix<'t, 's: 't>(
    operand: impl Parser<'t, &'t [Token<'s>], Syntax<'s>, Extra<'t, 's>> + Clone,
    operator: impl Parser<'t, &'t [Token<'s>], BinaryOp, Extra<'t, 's>> + Clone,
) -> impl Parser<'t, &'t [Token<'s>], Syntax<'s>, Extra<'t, 's>> + Clone {
    operand.clone().foldl(
        operator.then(operand).repeated(),
        |lhs, (op, rhs)| Syntax::binary(op, lhs, rhs),
    )
}

/// Precedence from loosest to tightest: `|`, `&`, comparisons, `+ -`,
/// `* / %`, unary sign, right-associative `**`.
fn expression<'t, 's: 't>() -> impl Parser<'t, &'t [Token<'s>], Syntax<'s>, Extra<'t, 's>> + Clone
{
    recursive(|expr| {
        let arguments = expr
            .clone()
            .separated_by(just(Token::Comma))
            .collect::<Vec<_>>()
            .delimited_by(just(Token::LParen), just(Token::RParen));

        let atom = choice((
            select! { Token::Number(value) => Syntax::Number(value) },
            select! { Token::Ident(name) => name }
                .then(arguments)
                .map(|(name, args)| Syntax::Call(name, args)),
            select! { Token::Ident(name) => Syntax::Name(name) },
            expr.delimited_by(just(Token::LParen), just(Token::RParen)),
        ));

        let unary = recursive(|unary| {
            let power = atom
                .then(just(Token::Pow).ignore_then(unary.clone()).or_not())
                .map(|(base, exponent)| match exponent {
                    Some(exponent) => Syntax::binary(BinaryOp::Pow, base, exponent),
                    None => base,
                });
            choice((
                just(Token::Minus)
                    .ignore_then(unary.clone())
                    .map(|operand| Syntax::Neg(Box::new(operand))),
                just(Token::Plus).ignore_then(unary),
                power,
            ))
        });

        let product = infix(
            unary,
            select! {
                Token::Star => BinaryOp::Mul,
                Token::Slash => BinaryOp::Div,
                Token::Percent => BinaryOp::Rem,
            },
        );
        let sum = infix(
            product,
            select! {
                Token::Plus => BinaryOp::Add,
                Token::Minus => BinaryOp::Sub,
            },
        );
        let comparison = infix(
            sum,
            select! {
                Token::Lt => BinaryOp::Lt,
                Token::Le => BinaryOp::Le,
                Token::Gt => BinaryOp::Gt,
                Token::Ge => BinaryOp::Ge,
                Token::EqEq => BinaryOp::Eq,
                Token::Ne => BinaryOp::Ne,
            },
        );
        let conjunction = infix(comparison, just(Token::Amp).to(BinaryOp::And));
        infix(conjunction, just(Token::Pipe).to(BinaryOp::Or))
    })
}

/// Bind names to functions and input slots; slots follow first appearance.
fn lower(syntax: &Syntax<'_>, variables: &mut Vec<String>, depth: usize) -> Result<Node, ExprError> {
    if depth > MAX_DEPTH {
        return Err(ExprError::TooDeep {
            limit: MAX_DEPTH,
            offset: 0,
        });
    }
    let next = depth + 1;
    Ok(match syntax {
        Syntax::Number(value) => Node::Const(*value),
        Syntax::Name("x") => Node::Current,
        Syntax::Name(name) => {
            let slot = match variables.iter().position(|v| v == name) {
                Some(slot) => slot,
                None => {
                    variables.push((*name).to_string());
                    variables.len() - 1
                }
            };
            Node::Var(slot)
        }
        Syntax::Neg(operand) => Node::Neg(Box::new(lower(operand, variables, next)?)),
        Syntax::Binary(op, lhs, rhs) => {
            let lhs = lower(lhs, variables, next)?;
            let rhs = lower(rhs, variables, next)?;
            Node::Binary(*op, Box::new(lhs), Box::new(rhs))
        }
        Syntax::Call(name, args) => {
            let func =
                Func::lookup(name).ok_or_else(|| ExprError::UnknownFunction((*name).to_string()))?;
            if args.len() != func.arity() {
                return Err(ExprError::Arity {
                    name: (*name).to_string(),
                    expected: func.arity(),
                    got: args.len(),
                });
            }
            let args = args
                .iter()
                .map(|arg| lower(arg, variables, next))
                .collect::<Result<Vec<_>, _>>()?;
            Node::Call(func, args)
        }
    })
}
