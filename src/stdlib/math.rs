use crate::error::SymbolResult;
use crate::symbols::{Class, Function, Package};

fn unary<F>(returns: Class, handler: F) -> SymbolResult<Function>
where
    F: Fn(f64) -> f64 + Send + Sync + 'static,
{
    Function::native(vec![Class::Float], Some(returns), move |x: f64| Ok(handler(x)))
}

fn rounding<F>(handler: F) -> SymbolResult<Function>
where
    F: Fn(f64) -> f64 + Send + Sync + 'static,
{
    Function::native(vec![Class::Float], Some(Class::Integer), move |x: f64| {
        Ok(handler(x) as i64)
    })
}

fn binary<F>(handler: F) -> SymbolResult<Function>
where
    F: Fn(f64, f64) -> f64 + Send + Sync + 'static,
{
    Function::native(
        vec![Class::Float, Class::Float],
        Some(Class::Float),
        move |x: f64, y: f64| Ok(handler(x, y)),
    )
}

pub(super) fn package() -> SymbolResult<Package> {
    Ok(Package::new("math")
        .with_callable("Abs", unary(Class::Float, f64::abs)?)
        .with_callable("Sqrt", unary(Class::Float, f64::sqrt)?)
        .with_callable("Log", unary(Class::Float, f64::ln)?)
        .with_callable("Ceil", rounding(f64::ceil)?)
        .with_callable("Floor", rounding(f64::floor)?)
        .with_callable("Round", rounding(f64::round)?)
        .with_callable("Max", binary(f64::max)?)
        .with_callable("Min", binary(f64::min)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbols::{Callable, Object, ScopeValue, Value};

    fn call(key: &str, arguments: Vec<Value>) -> Value {
        match package().unwrap().get(key).unwrap() {
            Some(ScopeValue::Callable(callable)) => callable.call(arguments).unwrap().unwrap(),
            other => panic!("expected callable, got {:?}", other),
        }
    }

    #[test]
    fn test_rounding_returns_integers() {
        assert_eq!(call("Ceil", vec![Value::Float(1.2)]), Value::Integer(2));
        assert_eq!(call("Floor", vec![Value::Float(-1.2)]), Value::Integer(-2));
        assert_eq!(call("Round", vec![Value::Float(2.5)]), Value::Integer(3));
    }

    #[test]
    fn test_float_functions() {
        assert_eq!(
            call("Max", vec![Value::Float(1.5), Value::Float(-3.0)]),
            Value::Float(1.5)
        );
        assert_eq!(
            call("Min", vec![Value::Float(1.5), Value::Float(-3.0)]),
            Value::Float(-3.0)
        );
        assert_eq!(call("Log", vec![Value::Float(1.0)]), Value::Float(0.0));
        assert_eq!(call("Abs", vec![Value::Float(-4.0)]), Value::Float(4.0));
    }
}
