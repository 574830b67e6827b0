//! Descriptor tables of the built-in primitive classes.

use std::collections::BTreeMap;
use std::fmt::Write;
use std::sync::Arc;

use chrono::{DateTime, Datelike, SecondsFormat, Utc};
use lazy_static::lazy_static;

use super::class::Class;
use super::descriptors::{DescriptorBuilder, Descriptors, Enumerable};
use super::value::{ErrorValue, Value};
use crate::ast::Token;
use crate::error::{ErrorCode, SymbolError, SymbolResult};

const NUMERIC: [Class; 4] = [Class::Number, Class::Double, Class::Float, Class::Integer];
const ARITHMETIC: [Token; 6] = [
    Token::Add,
    Token::Sub,
    Token::Mul,
    Token::Pwr,
    Token::Quo,
    Token::Rem,
];
const EQUALITY: [Token; 2] = [Token::Equals, Token::NotEquals];
const ORDERING: [Token; 6] = [
    Token::Equals,
    Token::NotEquals,
    Token::Less,
    Token::Greater,
    Token::LessEqual,
    Token::GreaterEqual,
];

lazy_static! {
    pub static ref NIL: Arc<Descriptors> = Arc::new(nil());
    pub static ref BOOLEAN: Arc<Descriptors> = Arc::new(boolean());
    pub static ref STRING: Arc<Descriptors> = Arc::new(string());
    pub static ref NUMBER: Arc<Descriptors> = Arc::new(numeric(Class::Number));
    pub static ref DOUBLE: Arc<Descriptors> = Arc::new(numeric(Class::Double));
    pub static ref FLOAT: Arc<Descriptors> = Arc::new(numeric(Class::Float));
    pub static ref INTEGER: Arc<Descriptors> = Arc::new(numeric(Class::Integer));
    pub static ref DATETIME: Arc<Descriptors> = Arc::new(datetime());
    pub static ref ERROR: Arc<Descriptors> = Arc::new(error());
    pub static ref ANY: Arc<Descriptors> = Arc::new(Descriptors::default());
}

/// Applies `token` to the truth of an ordering or equality test.
pub(crate) fn ordering(token: Token, order: Option<std::cmp::Ordering>) -> SymbolResult<bool> {
    use std::cmp::Ordering::*;
    Ok(match (token, order) {
        (Token::Equals, o) => o == Some(Equal),
        (Token::NotEquals, o) => o != Some(Equal),
        (Token::Less, o) => o == Some(Less),
        (Token::Greater, o) => o == Some(Greater),
        (Token::LessEqual, o) => matches!(o, Some(Less) | Some(Equal)),
        (Token::GreaterEqual, o) => matches!(o, Some(Greater) | Some(Equal)),
        (token, _) => {
            return Err(SymbolError::new(
                ErrorCode::UndefinedOperator,
                format!("{} is not an ordering comparator", token),
            ))
        }
    })
}

fn nil() -> Descriptors {
    let mut builder = DescriptorBuilder::new(Class::Nil);
    for token in EQUALITY {
        builder = builder.comparator(Class::Nil, token, move |_: Value, _: Value| {
            Ok(token == Token::Equals)
        });
    }
    builder.build_trusted()
}

fn boolean() -> Descriptors {
    let logic = |token: Token| {
        move |a: bool, b: bool| -> SymbolResult<bool> {
            Ok(match token {
                Token::And => a && b,
                Token::Or => a || b,
                Token::Equals => a == b,
                _ => a != b,
            })
        }
    };
    let mut builder = DescriptorBuilder::new(Class::Boolean);
    for token in [Token::And, Token::Or, Token::Equals, Token::NotEquals] {
        builder = builder.comparator(Class::Boolean, token, logic(token));
    }
    builder.build_trusted()
}

fn char_slice(value: &Value, start: i64, end: i64) -> SymbolResult<Value> {
    let chars: Vec<char> = value.as_str()?.chars().collect();
    let (start, end) = range_bounds(chars.len(), start, end)?;
    let text: String = if start > end {
        chars[end..start].iter().rev().collect()
    } else {
        chars[start..end].iter().collect()
    };
    Ok(Value::String(text))
}

/// Validates a `[start:end]` range over a sequence of `len` items.
pub(crate) fn range_bounds(len: usize, start: i64, end: i64) -> SymbolResult<(usize, usize)> {
    let check = |index: i64, which: &str| -> SymbolResult<usize> {
        if index < 0 || index as usize > len {
            return Err(SymbolError::new(
                ErrorCode::IndexOutOfRange,
                format!("{} index {} out of range", which, index),
            ));
        }
        Ok(index as usize)
    };
    Ok((check(start, "start")?, check(end, "end")?))
}

/// Validates a single index over a sequence of `len` items.
pub(crate) fn index_bound(len: usize, index: i64) -> SymbolResult<usize> {
    if index < 0 || index as usize >= len {
        return Err(SymbolError::new(
            ErrorCode::IndexOutOfRange,
            format!("index {} out of range", index),
        ));
    }
    Ok(index as usize)
}

fn string() -> Descriptors {
    let mut builder = DescriptorBuilder::new(Class::String);
    for token in EQUALITY {
        builder = builder.comparator(Class::String, token, move |a: String, b: String| {
            ordering(token, Some(a.cmp(&b)))
        });
    }
    builder
        .constructor(Class::Integer, |n: i64| Ok(n.to_string()))
        .constructor(Class::Number, |n: f64| Ok(n.to_string()))
        .constructor(Class::Double, |n: f64| Ok(n.to_string()))
        .constructor(Class::Float, |n: f64| Ok(n.to_string()))
        .constructor(Class::Boolean, |b: bool| Ok(b.to_string()))
        .constructor(Class::DateTime, |dt: DateTime<Utc>| {
            Ok(dt.to_rfc3339_opts(SecondsFormat::AutoSi, true))
        })
        .operator(Class::String, Token::Add, |a: String, b: String| Ok(a + &b))
        .method("length", vec![], Some(Class::Integer), |s: String| {
            Ok(s.chars().count() as i64)
        })
        .enumerable(Enumerable {
            item: Class::String,
            length: Arc::new(|value: &Value| Ok(value.as_str()?.chars().count() as i64)),
            get_index: Arc::new(|value: &Value, index: i64| {
                let text = value.as_str()?;
                let index = index_bound(text.chars().count(), index)?;
                Ok(Value::String(
                    text.chars().nth(index).map(String::from).unwrap_or_default(),
                ))
            }),
            set_index: None,
            get_range: Arc::new(char_slice),
            set_range: None,
        })
        .build_trusted()
}

fn numeric_value(class: &Class, n: f64) -> Value {
    match class {
        Class::Integer => Value::Integer(n as i64),
        Class::Double => Value::Double(n),
        Class::Float => Value::Float(n),
        _ => Value::Number(n),
    }
}

fn division_by_zero() -> SymbolError {
    SymbolError::new(ErrorCode::DivisionByZero, "division by zero")
}

fn integer_arithmetic(token: Token, a: i64, b: i64) -> SymbolResult<Value> {
    Ok(match token {
        Token::Add => Value::Integer(a.wrapping_add(b)),
        Token::Sub => Value::Integer(a.wrapping_sub(b)),
        Token::Mul => Value::Integer(a.wrapping_mul(b)),
        Token::Pwr => match u32::try_from(b) {
            Ok(exp) => Value::Integer(a.wrapping_pow(exp)),
            Err(_) => Value::Number((a as f64).powf(b as f64)),
        },
        Token::Quo if b == 0 => return Err(division_by_zero()),
        Token::Rem if b == 0 => return Err(division_by_zero()),
        Token::Quo => Value::Integer(a.wrapping_div(b)),
        Token::Rem => Value::Integer(a.wrapping_rem(b)),
        token => return Err(undefined(token)),
    })
}

fn undefined(token: Token) -> SymbolError {
    SymbolError::new(
        ErrorCode::UndefinedOperator,
        format!("{} is not an arithmetic operator", token),
    )
}

/// Shared arithmetic of every numeric class. Integer pairs stay integral,
/// every other pair is computed as `f64`.
pub(crate) fn arithmetic(token: Token, left: &Value, right: &Value) -> SymbolResult<Value> {
    if let (Value::Integer(a), Value::Integer(b)) = (left, right) {
        return integer_arithmetic(token, *a, *b);
    }
    let (a, b) = (left.as_f64()?, right.as_f64()?);
    Ok(Value::Number(match token {
        Token::Add => a + b,
        Token::Sub => a - b,
        Token::Mul => a * b,
        Token::Pwr => a.powf(b),
        Token::Quo => a / b,
        Token::Rem => a % b,
        token => return Err(undefined(token)),
    }))
}

fn numeric_compare(token: Token, left: &Value, right: &Value) -> SymbolResult<bool> {
    let order = match (left, right) {
        (Value::Integer(a), Value::Integer(b)) => Some(a.cmp(b)),
        _ => left.as_f64()?.partial_cmp(&right.as_f64()?),
    };
    ordering(token, order)
}

fn numeric(class: Class) -> Descriptors {
    let mut builder = DescriptorBuilder::new(class.clone());
    for source in NUMERIC.iter().filter(|source| **source != class) {
        let target = class.clone();
        builder = match source {
            Class::Integer => builder.constructor(source.clone(), move |n: i64| {
                Ok(numeric_value(&target, n as f64))
            }),
            _ => builder.constructor(source.clone(), move |n: f64| Ok(numeric_value(&target, n))),
        };
    }
    for right in NUMERIC.iter() {
        for token in ARITHMETIC {
            builder = builder.operator(right.clone(), token, move |a: Value, b: Value| {
                arithmetic(token, &a, &b)
            });
        }
        for token in ORDERING {
            builder = builder.comparator(right.clone(), token, move |a: Value, b: Value| {
                numeric_compare(token, &a, &b)
            });
        }
    }
    builder.build_trusted()
}

fn format_datetime(dt: DateTime<Utc>, pattern: String) -> SymbolResult<String> {
    let mut out = String::new();
    write!(out, "{}", dt.format(&pattern)).map_err(|_| {
        SymbolError::new(
            ErrorCode::InvalidClassConstruction,
            format!("invalid datetime format {:?}", pattern),
        )
    })?;
    Ok(out)
}

fn datetime() -> Descriptors {
    let mut builder = DescriptorBuilder::new(Class::DateTime);
    for token in ORDERING {
        builder = builder.comparator(
            Class::DateTime,
            token,
            move |a: DateTime<Utc>, b: DateTime<Utc>| ordering(token, Some(a.cmp(&b))),
        );
    }
    builder
        .constructor(Class::String, |s: String| {
            DateTime::parse_from_rfc3339(&s)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|err| {
                    SymbolError::new(
                        ErrorCode::CannotConstruct,
                        format!("cannot construct DateTime from {:?}: {}", s, err),
                    )
                })
        })
        .property("unix", Class::Integer, |dt: DateTime<Utc>| Ok(dt.timestamp()))
        .property("year", Class::Integer, |dt: DateTime<Utc>| Ok(dt.year() as i64))
        .property("month", Class::Integer, |dt: DateTime<Utc>| Ok(dt.month() as i64))
        .property("day", Class::Integer, |dt: DateTime<Utc>| Ok(dt.day() as i64))
        .method("format", vec![Class::String], Some(Class::String), format_datetime)
        .build_trusted()
}

fn error() -> Descriptors {
    DescriptorBuilder::new(Class::Error)
        .constructor(Class::String, |message: String| {
            Ok(ErrorValue::new("Error", &message))
        })
        .record_constructor(|mut fields: BTreeMap<String, Value>| {
            let mut take = |key: &str| match fields.remove(key) {
                Some(Value::String(s)) => s,
                _ => String::new(),
            };
            let name = take("name");
            let message = take("message");
            Ok(Value::Error(ErrorValue::new(&name, &message)))
        })
        .property("name", Class::String, |err: ErrorValue| Ok(err.name))
        .property("message", Class::String, |err: ErrorValue| Ok(err.message))
        .build_trusted()
}
