//! Formula expressions over other configuration entries
//!
//! Grammar, lowest precedence first:
//!
//! ```text
//! expr    := sum ('?' expr ':' expr)?
//! sum     := product (('+' | '-') product)*
//! product := unary (('*' | '/') unary)*
//! unary   := '-' unary | power
//! power   := postfix ('^' unary)?
//! postfix := primary ('[' expr ']')*
//! primary := number | ident | ident '(' args ')' | '(' expr (',' expr)* ')'
//! ```

use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{alpha1, alphanumeric1, char, digit0, digit1, multispace0},
    combinator::{cut, map, opt, recognize},
    error::{ErrorKind, ParseError},
    multi::{many0, separated_list0, separated_list1},
    sequence::{delimited, pair, preceded, separated_pair, tuple},
    IResult,
};

use crate::error::{ConfigError, Result};
use crate::value::{mismatch, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Func {
    Sum,
    Len,
    /// ceil(log2(x)): bits needed to index x distinct values
    Ln2,
    Log2,
    Ceil,
    Floor,
    Max,
    Min,
}

impl Func {
    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "sum" => Func::Sum,
            "len" => Func::Len,
            "ln2" => Func::Ln2,
            "log2" => Func::Log2,
            "ceil" => Func::Ceil,
            "floor" => Func::Floor,
            "max" => Func::Max,
            "min" => Func::Min,
            _ => return None,
        })
    }

    fn accepts(self, arity: usize) -> bool {
        match self {
            Func::Max | Func::Min => arity >= 1,
            _ => arity == 1,
        }
    }
}

/// Parsed formula
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Int(i64),
    Real(f64),
    Ref(String),
    Neg(Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Ternary(Box<Expr>, Box<Expr>, Box<Expr>),
    Index(Box<Expr>, Box<Expr>),
    Call(Func, Vec<Expr>),
    Tuple(Vec<Expr>),
}

impl Expr {
    pub fn parse(formula: &str) -> Result<Self> {
        match delimited(multispace0, parse_expr, multispace0)(formula) {
            Ok(("", expr)) => Ok(expr),
            Ok((rest, _)) => {
                Err(FormulaError::from_error_kind(rest, ErrorKind::Eof).into_config(formula))
            }
            Err(nom::Err::Error(e) | nom::Err::Failure(e)) => Err(e.into_config(formula)),
            Err(nom::Err::Incomplete(_)) => Err(ConfigError::Parse {
                formula: formula.to_string(),
                message: "incomplete formula".to_string(),
            }),
        }
    }

    /// Names referenced by this expression, in first-use order without duplicates
    pub fn references(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_refs(&mut out);
        out
    }

    fn collect_refs<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Expr::Int(_) | Expr::Real(_) => {}
            Expr::Ref(name) => {
                if !out.contains(&name.as_str()) {
                    out.push(name);
                }
            }
            Expr::Neg(e) => e.collect_refs(out),
            Expr::Binary(_, a, b) | Expr::Index(a, b) => {
                a.collect_refs(out);
                b.collect_refs(out);
            }
            Expr::Ternary(c, a, b) => {
                c.collect_refs(out);
                a.collect_refs(out);
                b.collect_refs(out);
            }
            Expr::Call(_, args) | Expr::Tuple(args) => {
                for arg in args {
                    arg.collect_refs(out);
                }
            }
        }
    }

    /// Evaluate with `lookup` supplying already-resolved referenced values
    pub fn eval<F>(&self, lookup: &F) -> Result<Value>
    where
        F: Fn(&str) -> Result<Value>,
    {
        match self {
            Expr::Int(v) => Ok(Value::Int(*v)),
            Expr::Real(v) => Ok(Value::Real(*v)),
            Expr::Ref(name) => lookup(name),
            Expr::Neg(e) => match e.eval(lookup)? {
                Value::Int(v) => v
                    .checked_neg()
                    .map(Value::Int)
                    .ok_or_else(|| ConfigError::Overflow("negation".to_string())),
                Value::Real(v) => Ok(Value::Real(-v)),
                other => Err(mismatch("negation", "number", &other)),
            },
            Expr::Binary(op, a, b) => binary(*op, a.eval(lookup)?, b.eval(lookup)?),
            Expr::Ternary(c, a, b) => {
                if c.eval(lookup)?.as_bool("ternary condition")? {
                    a.eval(lookup)
                } else {
                    b.eval(lookup)
                }
            }
            Expr::Index(a, i) => {
                let array = a.eval(lookup)?;
                let array = array.as_array("index target")?;
                let index = i.eval(lookup)?.as_int("index")?;
                let len = array.len();
                let pos = if index < 0 { len as i64 + index } else { index };
                if pos < 0 || pos >= len as i64 {
                    return Err(ConfigError::IndexOutOfRange { index, len });
                }
                Ok(Value::Int(array[pos as usize]))
            }
            Expr::Call(func, args) => {
                let values = args
                    .iter()
                    .map(|a| a.eval(lookup))
                    .collect::<Result<Vec<_>>>()?;
                call(*func, &values)
            }
            Expr::Tuple(items) => {
                let mut out = Vec::new();
                for item in items {
                    match item.eval(lookup)? {
                        Value::Int(v) => out.push(v),
                        Value::Array(v) => out.extend(v),
                        other => return Err(mismatch("tuple element", "int or array", &other)),
                    }
                }
                Ok(Value::Array(out))
            }
        }
    }
}

fn binary(op: BinOp, a: Value, b: Value) -> Result<Value> {
    let context = format!("{op:?}").to_lowercase();
    if let (Value::Int(x), Value::Int(y)) = (&a, &b) {
        let (x, y) = (*x, *y);
        let int = match op {
            BinOp::Add => x.checked_add(y),
            BinOp::Sub => x.checked_sub(y),
            BinOp::Mul => x.checked_mul(y),
            BinOp::Pow if y >= 0 => u32::try_from(y).ok().and_then(|e| x.checked_pow(e)),
            BinOp::Div | BinOp::Pow => None,
        };
        match (op, int) {
            (_, Some(v)) => return Ok(Value::Int(v)),
            (BinOp::Add | BinOp::Sub | BinOp::Mul, None) => {
                return Err(ConfigError::Overflow(context))
            }
            (BinOp::Pow, None) if y >= 0 => return Err(ConfigError::Overflow(context)),
            _ => {}
        }
    }

    let x = a.as_real(&context)?;
    let y = b.as_real(&context)?;
    let v = match op {
        BinOp::Add => x + y,
        BinOp::Sub => x - y,
        BinOp::Mul => x * y,
        BinOp::Div => {
            if y == 0.0 {
                return Err(ConfigError::Domain("division by zero".to_string()));
            }
            x / y
        }
        BinOp::Pow => x.powf(y),
    };
    Ok(Value::Real(v))
}

fn call(func: Func, args: &[Value]) -> Result<Value> {
    match func {
        Func::Sum => {
            let items = args[0].as_array("sum")?;
            items
                .iter()
                .try_fold(0i64, |acc, &v| acc.checked_add(v))
                .map(Value::Int)
                .ok_or_else(|| ConfigError::Overflow("sum".to_string()))
        }
        Func::Len => Ok(Value::Int(args[0].as_array("len")?.len() as i64)),
        Func::Ln2 => match &args[0] {
            Value::Int(v) if *v > 0 => Ok(Value::Int(bits_to_index(*v as u64))),
            Value::Real(v) if *v > 0.0 => Ok(Value::Int(v.log2().ceil() as i64)),
            Value::Int(_) | Value::Real(_) => Err(ConfigError::Domain(format!(
                "ln2 of non-positive value {}",
                args[0]
            ))),
            other => Err(mismatch("ln2", "number", other)),
        },
        Func::Log2 => {
            let v = args[0].as_real("log2")?;
            if v <= 0.0 {
                return Err(ConfigError::Domain(format!("log2 of non-positive value {v}")));
            }
            Ok(Value::Real(v.log2()))
        }
        Func::Ceil | Func::Floor => match &args[0] {
            Value::Int(v) => Ok(Value::Int(*v)),
            Value::Real(v) => {
                let r = if func == Func::Ceil { v.ceil() } else { v.floor() };
                Ok(Value::Int(r as i64))
            }
            other => Err(mismatch("ceil/floor", "number", other)),
        },
        Func::Max | Func::Min => {
            let pick_max = func == Func::Max;
            let numbers: Vec<Value> = match args {
                [Value::Array(items)] => items.iter().map(|&v| Value::Int(v)).collect(),
                _ => args.to_vec(),
            };
            let mut best: Option<Value> = None;
            for v in numbers {
                let candidate = v.as_real("max/min")?;
                best = match best {
                    Some(b) => {
                        let current = b.as_real("max/min")?;
                        let better = if pick_max {
                            candidate > current
                        } else {
                            candidate < current
                        };
                        Some(if better { v } else { b })
                    }
                    None => Some(v),
                };
            }
            best.ok_or_else(|| ConfigError::Domain("max/min of empty array".to_string()))
        }
    }
}

/// Smallest k with 2^k >= n
fn bits_to_index(n: u64) -> i64 {
    if n <= 1 {
        0
    } else {
        (64 - (n - 1).leading_zeros()) as i64
    }
}

type PResult<'a, T> = IResult<&'a str, T, FormulaError>;

/// Parse failure with the amount of input left where it happened
#[derive(Debug)]
struct FormulaError {
    remaining: usize,
    message: Option<String>,
}

impl FormulaError {
    fn failure(input: &str, message: String) -> nom::Err<Self> {
        nom::Err::Failure(Self {
            remaining: input.len(),
            message: Some(message),
        })
    }

    fn into_config(self, formula: &str) -> ConfigError {
        let offset = formula.len() - self.remaining;
        let message = match self.message {
            Some(message) => format!("{message} at offset {offset}"),
            None => format!("unexpected input {:?}", &formula[offset..]),
        };
        ConfigError::Parse {
            formula: formula.to_string(),
            message,
        }
    }
}

impl<'a> ParseError<&'a str> for FormulaError {
    fn from_error_kind(input: &'a str, _kind: ErrorKind) -> Self {
        Self {
            remaining: input.len(),
            message: None,
        }
    }

    fn append(_input: &'a str, _kind: ErrorKind, other: Self) -> Self {
        other
    }
}

fn sym<'a>(c: char) -> impl FnMut(&'a str) -> PResult<'a, char> {
    delimited(multispace0, char(c), multispace0)
}

fn fold_binary(first: Expr, rest: Vec<(BinOp, Expr)>) -> Expr {
    rest.into_iter().fold(first, |lhs, (op, rhs)| {
        Expr::Binary(op, Box::new(lhs), Box::new(rhs))
    })
}

fn parse_expr(input: &str) -> PResult<'_, Expr> {
    let (input, cond) = parse_sum(input)?;
    let (input, branches) = opt(preceded(
        sym('?'),
        cut(separated_pair(parse_expr, sym(':'), parse_expr)),
    ))(input)?;
    Ok((
        input,
        match branches {
            Some((a, b)) => Expr::Ternary(Box::new(cond), Box::new(a), Box::new(b)),
            None => cond,
        },
    ))
}

fn parse_sum(input: &str) -> PResult<'_, Expr> {
    let (input, first) = parse_product(input)?;
    let (input, rest) = many0(pair(
        alt((map(sym('+'), |_| BinOp::Add), map(sym('-'), |_| BinOp::Sub))),
        parse_product,
    ))(input)?;
    Ok((input, fold_binary(first, rest)))
}

fn parse_product(input: &str) -> PResult<'_, Expr> {
    let (input, first) = parse_unary(input)?;
    let (input, rest) = many0(pair(
        alt((map(sym('*'), |_| BinOp::Mul), map(sym('/'), |_| BinOp::Div))),
        parse_unary,
    ))(input)?;
    Ok((input, fold_binary(first, rest)))
}

fn parse_unary(input: &str) -> PResult<'_, Expr> {
    alt((
        map(preceded(sym('-'), parse_unary), |e| Expr::Neg(Box::new(e))),
        parse_power,
    ))(input)
}

/// Right-associative; the exponent may carry its own sign
fn parse_power(input: &str) -> PResult<'_, Expr> {
    let (input, base) = parse_postfix(input)?;
    let (input, exp) = opt(preceded(sym('^'), cut(parse_unary)))(input)?;
    Ok((
        input,
        match exp {
            Some(exp) => Expr::Binary(BinOp::Pow, Box::new(base), Box::new(exp)),
            None => base,
        },
    ))
}

fn parse_postfix(input: &str) -> PResult<'_, Expr> {
    let (input, base) = parse_primary(input)?;
    let (input, indices) =
        many0(delimited(sym('['), cut(parse_expr), cut(sym(']'))))(input)?;
    Ok((
        input,
        indices
            .into_iter()
            .fold(base, |acc, i| Expr::Index(Box::new(acc), Box::new(i))),
    ))
}

fn parse_primary(input: &str) -> PResult<'_, Expr> {
    delimited(
        multispace0,
        alt((
            parse_number,
            parse_call,
            map(parse_identifier, |name| Expr::Ref(name.to_string())),
            parse_group,
        )),
        multispace0,
    )(input)
}

fn parse_number(input: &str) -> PResult<'_, Expr> {
    let (rest, text) = alt((
        recognize(tuple((digit1, char('.'), digit0))),
        recognize(pair(char('.'), digit1)),
        digit1,
    ))(input)?;
    let parsed = if text.contains('.') {
        text.parse().ok().map(Expr::Real)
    } else {
        text.parse().ok().map(Expr::Int)
    };
    match parsed {
        Some(value) => Ok((rest, value)),
        None => Err(FormulaError::failure(input, format!("bad number {text}"))),
    }
}

fn parse_identifier(input: &str) -> PResult<'_, &str> {
    recognize(pair(
        alt((alpha1, tag("_"))),
        many0(alt((alphanumeric1, tag("_")))),
    ))(input)
}

fn parse_call(input: &str) -> PResult<'_, Expr> {
    let (rest, (name, args)) = pair(
        parse_identifier,
        delimited(sym('('), separated_list0(sym(','), parse_expr), sym(')')),
    )(input)?;
    let Some(func) = Func::from_name(name) else {
        return Err(FormulaError::failure(input, format!("unknown function {name}")));
    };
    if !func.accepts(args.len()) {
        return Err(FormulaError::failure(
            input,
            format!("{name} does not take {} argument(s)", args.len()),
        ));
    }
    Ok((rest, Expr::Call(func, args)))
}

/// Parenthesized expression, or a tuple when there is more than one item
fn parse_group(input: &str) -> PResult<'_, Expr> {
    let (rest, mut items) =
        delimited(char('('), separated_list1(sym(','), parse_expr), sym(')'))(input)?;
    let expr = if items.len() == 1 {
        items.remove(0)
    } else {
        Expr::Tuple(items)
    };
    Ok((rest, expr))
}
