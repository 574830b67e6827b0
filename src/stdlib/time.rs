//! The `time` package: the current time and a `Duration` extension class
//! counted in microseconds.

use chrono::{DateTime, Utc};
use lazy_static::lazy_static;

use crate::ast::Token;
use crate::error::{ErrorCode, SymbolError, SymbolResult};
use crate::symbols::{arithmetic, ordering, Class, ClassRef, Function, Instance, Package, Value};

/// Duration constants in microseconds, by package member name.
pub const DURATION_UNITS: [(&str, i64); 5] = [
    ("Microsecond", 1),
    ("Millisecond", 1_000),
    ("Second", 1_000_000),
    ("Minute", 60_000_000),
    ("Hour", 3_600_000_000),
];

const COMPARATORS: [Token; 6] = [
    Token::Equals,
    Token::NotEquals,
    Token::Less,
    Token::Greater,
    Token::LessEqual,
    Token::GreaterEqual,
];

lazy_static! {
    static ref DURATION: SymbolResult<Class> = define_duration();
}

/// The `Duration` class.
pub fn duration() -> SymbolResult<Class> {
    DURATION.clone()
}

fn micros(instance: &Instance) -> SymbolResult<i64> {
    instance.payload.as_i64()
}

fn define_duration() -> SymbolResult<Class> {
    ClassRef::define("Duration", |this, builder| {
        let mut builder = builder.constructor(Class::Integer, {
            let this = this.clone();
            move |n: i64| Value::instance(&this, Value::Integer(n))
        });
        for token in [Token::Add, Token::Sub, Token::Mul] {
            let class = this.clone();
            builder = builder.operator(this.clone(), token, move |a: Instance, b: Instance| {
                let (a, b) = (Value::Integer(micros(&a)?), Value::Integer(micros(&b)?));
                Value::instance(&class, arithmetic(token, &a, &b)?)
            });
        }
        for token in [Token::Add, Token::Sub] {
            let class = this.clone();
            builder = builder.operator(Class::Integer, token, move |a: Instance, b: i64| {
                let a = Value::Integer(micros(&a)?);
                Value::instance(&class, arithmetic(token, &a, &Value::Integer(b))?)
            });
        }
        for token in COMPARATORS {
            builder = builder.comparator(this.clone(), token, move |a: Instance, b: Instance| {
                ordering(token, Some(micros(&a)?.cmp(&micros(&b)?)))
            });
        }
        builder.method(
            "toUnits",
            vec![this.clone()],
            Some(Class::Float),
            |d: Instance, unit: Instance| {
                let unit = micros(&unit)?;
                if unit == 0 {
                    return Err(SymbolError::new(ErrorCode::DivisionByZero, "division by zero"));
                }
                Ok(micros(&d)? as f64 / unit as f64)
            },
        )
    })
}

pub(super) fn package() -> SymbolResult<Package> {
    let duration = duration()?;
    let mut package = Package::new("time")
        .with("DateTime", Class::DateTime)
        .with("Duration", duration.clone())
        .with_callable(
            "now",
            Function::native(vec![], Some(Class::DateTime), || -> SymbolResult<DateTime<Utc>> {
                Ok(Utc::now())
            })?,
        );
    for (name, n) in DURATION_UNITS {
        package = package.with(name, Value::instance(&duration, Value::Integer(n))?);
    }
    Ok(package)
}
