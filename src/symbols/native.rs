//! Native function adapter.
//!
//! Host closures are bound into the uniform calling convention through
//! [`FromValue`]/[`IntoValue`] conversions on their argument and result types.
//! The declared argument classes are checked against the closure's arity and
//! parameter types once, when the binding is registered:
//!
//! ```ignore
//! let max = Function::native(
//!     vec![Class::Float, Class::Float],
//!     Some(Class::Float),
//!     |a: f64, b: f64| Ok(a.max(b)),
//! )?;
//! ```

use core::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::class::Class;
use super::construct::construct;
use super::object::Callable;
use super::value::{ArrayValue, ErrorValue, Instance, MapValue, NilableValue, Value};
use crate::error::{ErrorCode, SymbolError, SymbolResult};

/// Host types a [`Value`] can be adapted into.
pub trait FromValue: Sized {
    /// Whether values of `class` can be adapted into this type.
    fn accepts(class: &Class) -> bool;
    fn from_value(value: Value) -> SymbolResult<Self>;
}

/// Host types that adapt back into a [`Value`]. `()` adapts to no value and
/// marks an effect-only binding.
pub trait IntoValue {
    const EFFECT_ONLY: bool = false;
    fn into_value(self) -> Option<Value>;
}

fn mismatch(expected: &str, value: &Value) -> SymbolError {
    SymbolError::new(
        ErrorCode::InvalidClass,
        format!("expected {}, got {}", expected, value.class()),
    )
}

impl FromValue for Value {
    fn accepts(_: &Class) -> bool {
        true
    }
    fn from_value(value: Value) -> SymbolResult<Self> {
        Ok(value)
    }
}

impl FromValue for bool {
    fn accepts(class: &Class) -> bool {
        *class == Class::Boolean
    }
    fn from_value(value: Value) -> SymbolResult<Self> {
        value.as_bool()
    }
}

impl FromValue for String {
    fn accepts(class: &Class) -> bool {
        *class == Class::String
    }
    fn from_value(value: Value) -> SymbolResult<Self> {
        match value {
            Value::String(s) => Ok(s),
            other => Err(mismatch("String", &other)),
        }
    }
}

impl FromValue for i64 {
    fn accepts(class: &Class) -> bool {
        *class == Class::Integer
    }
    fn from_value(value: Value) -> SymbolResult<Self> {
        value.as_i64()
    }
}

impl FromValue for f64 {
    fn accepts(class: &Class) -> bool {
        matches!(class, Class::Number | Class::Double | Class::Float)
    }
    fn from_value(value: Value) -> SymbolResult<Self> {
        match value {
            Value::Number(n) | Value::Double(n) | Value::Float(n) => Ok(n),
            other => Err(mismatch("a floating point number", &other)),
        }
    }
}

impl FromValue for DateTime<Utc> {
    fn accepts(class: &Class) -> bool {
        *class == Class::DateTime
    }
    fn from_value(value: Value) -> SymbolResult<Self> {
        match value {
            Value::DateTime(dt) => Ok(dt),
            other => Err(mismatch("DateTime", &other)),
        }
    }
}

impl FromValue for ErrorValue {
    fn accepts(class: &Class) -> bool {
        *class == Class::Error
    }
    fn from_value(value: Value) -> SymbolResult<Self> {
        match value {
            Value::Error(err) => Ok(err),
            other => Err(mismatch("Error", &other)),
        }
    }
}

impl FromValue for ArrayValue {
    fn accepts(class: &Class) -> bool {
        matches!(class, Class::Array(_))
    }
    fn from_value(value: Value) -> SymbolResult<Self> {
        match value {
            Value::Array(arr) => Ok(arr),
            other => Err(mismatch("an array", &other)),
        }
    }
}

impl FromValue for MapValue {
    fn accepts(class: &Class) -> bool {
        matches!(class, Class::Map(_))
    }
    fn from_value(value: Value) -> SymbolResult<Self> {
        match value {
            Value::Map(map) => Ok(map),
            other => Err(mismatch("Map", &other)),
        }
    }
}

impl FromValue for Instance {
    fn accepts(class: &Class) -> bool {
        matches!(class, Class::Extension(_))
    }
    fn from_value(value: Value) -> SymbolResult<Self> {
        match value {
            Value::Instance(instance) => Ok(instance),
            other => Err(mismatch("an extension instance", &other)),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn accepts(class: &Class) -> bool {
        match class {
            Class::Nilable(inner) => T::accepts(inner),
            _ => false,
        }
    }
    fn from_value(value: Value) -> SymbolResult<Self> {
        match value {
            Value::Nilable(NilableValue { value: None, .. }) | Value::Nil => Ok(None),
            Value::Nilable(NilableValue {
                value: Some(inner), ..
            }) => T::from_value(*inner).map(Some),
            other => T::from_value(other).map(Some),
        }
    }
}

impl IntoValue for () {
    const EFFECT_ONLY: bool = true;
    fn into_value(self) -> Option<Value> {
        None
    }
}

impl IntoValue for Value {
    fn into_value(self) -> Option<Value> {
        Some(self)
    }
}

impl IntoValue for bool {
    fn into_value(self) -> Option<Value> {
        Some(Value::Boolean(self))
    }
}

impl IntoValue for String {
    fn into_value(self) -> Option<Value> {
        Some(Value::String(self))
    }
}

impl IntoValue for i64 {
    fn into_value(self) -> Option<Value> {
        Some(Value::Integer(self))
    }
}

impl IntoValue for f64 {
    fn into_value(self) -> Option<Value> {
        Some(Value::Number(self))
    }
}

impl IntoValue for DateTime<Utc> {
    fn into_value(self) -> Option<Value> {
        Some(Value::DateTime(self))
    }
}

impl IntoValue for ErrorValue {
    fn into_value(self) -> Option<Value> {
        Some(Value::Error(self))
    }
}

impl IntoValue for ArrayValue {
    fn into_value(self) -> Option<Value> {
        Some(Value::Array(self))
    }
}

impl IntoValue for MapValue {
    fn into_value(self) -> Option<Value> {
        Some(Value::Map(self))
    }
}

impl IntoValue for Instance {
    fn into_value(self) -> Option<Value> {
        Some(Value::Instance(self))
    }
}

impl<T: IntoValue> IntoValue for Option<T> {
    fn into_value(self) -> Option<Value> {
        match self {
            Some(inner) => inner.into_value(),
            None => Some(Value::Nil),
        }
    }
}

/// A host closure usable as a native binding. Implemented for closures of
/// up to four arguments whose parameters implement [`FromValue`] and whose
/// result is a `SymbolResult` of an [`IntoValue`].
pub trait Handler<Args>: Send + Sync + 'static {
    /// Checks the declared argument classes and return shape.
    fn check(arguments: &[Class], returns: Option<&Class>) -> Result<(), String>;
    fn invoke(&self, arguments: Vec<Value>) -> SymbolResult<Option<Value>>;
}

fn check_shape(
    accepts: &[fn(&Class) -> bool],
    effect_only: bool,
    arguments: &[Class],
    returns: Option<&Class>,
) -> Result<(), String> {
    if accepts.len() != arguments.len() {
        return Err(format!(
            "handler takes {} arguments, {} declared",
            accepts.len(),
            arguments.len()
        ));
    }
    for (i, (accepts, class)) in accepts.iter().zip(arguments).enumerate() {
        if !accepts(class) {
            return Err(format!("argument {} cannot receive {}", i, class));
        }
    }
    match (effect_only, returns) {
        (true, Some(class)) => Err(format!("handler returns nothing, {} declared", class)),
        (false, None) => Err("handler returns a value, none declared".to_string()),
        _ => Ok(()),
    }
}

macro_rules! impl_handler {
    ($($arg:ident $var:ident),*) => {
        impl<F, R, $($arg,)*> Handler<($($arg,)*)> for F
        where
            F: Fn($($arg),*) -> SymbolResult<R> + Send + Sync + 'static,
            R: IntoValue,
            $($arg: FromValue,)*
        {
            fn check(arguments: &[Class], returns: Option<&Class>) -> Result<(), String> {
                check_shape(&[$($arg::accepts),*], R::EFFECT_ONLY, arguments, returns)
            }

            #[allow(unused_mut, unused_variables)]
            fn invoke(&self, arguments: Vec<Value>) -> SymbolResult<Option<Value>> {
                let mut arguments = arguments.into_iter();
                $(
                    let $var = match arguments.next() {
                        Some(value) => $arg::from_value(value)?,
                        None => {
                            return Err(SymbolError::new(
                                ErrorCode::InvalidArgumentLength,
                                "missing argument",
                            ))
                        }
                    };
                )*
                (self)($($var),*).map(IntoValue::into_value)
            }
        }
    };
}

impl_handler!();
impl_handler!(A a);
impl_handler!(A a, B b);
impl_handler!(A a, B b, C c);
impl_handler!(A a, B b, C c, D d);

pub type NativeFn = Arc<dyn Fn(Vec<Value>) -> SymbolResult<Option<Value>> + Send + Sync>;

/// A typed callable: argument classes, optional return class and a handler.
#[derive(Clone)]
pub struct Function {
    arguments: Vec<Class>,
    returns: Option<Class>,
    handler: NativeFn,
}

impl Function {
    /// Binds a host closure, checking its shape against the declaration.
    pub fn native<A, H: Handler<A>>(
        arguments: Vec<Class>,
        returns: Option<Class>,
        handler: H,
    ) -> SymbolResult<Self> {
        H::check(&arguments, returns.as_ref()).map_err(SymbolError::registration)?;
        Ok(Self {
            arguments,
            returns,
            handler: Arc::new(move |values| handler.invoke(values)),
        })
    }

    /// Builds a function from an already uniform handler.
    pub fn from_parts(arguments: Vec<Class>, returns: Option<Class>, handler: NativeFn) -> Self {
        Self {
            arguments,
            returns,
            handler,
        }
    }

    /// Runs the handler without arity checks or return construction.
    pub fn invoke(&self, arguments: Vec<Value>) -> SymbolResult<Option<Value>> {
        (self.handler)(arguments)
    }

    /// Like [`invoke`](Function::invoke), for handlers that always produce a value.
    pub fn invoke_value(&self, arguments: Vec<Value>) -> SymbolResult<Value> {
        self.invoke(arguments)?.ok_or_else(|| {
            SymbolError::new(ErrorCode::InvalidCallExpression, "handler returned no value")
        })
    }

    pub fn into_callable(self) -> Arc<dyn Callable> {
        Arc::new(self)
    }
}

impl Callable for Function {
    fn arguments(&self) -> &[Class] {
        &self.arguments
    }

    fn returns(&self) -> Option<&Class> {
        self.returns.as_ref()
    }

    fn call(&self, arguments: Vec<Value>) -> SymbolResult<Option<Value>> {
        if arguments.len() != self.arguments.len() {
            return Err(SymbolError::new(
                ErrorCode::InvalidArgumentLength,
                format!(
                    "expected {} arguments, got {}",
                    self.arguments.len(),
                    arguments.len()
                ),
            ));
        }
        let result = self.invoke(arguments)?;
        match (&self.returns, result) {
            (Some(class), Some(value)) => construct(class, value).map(Some),
            (Some(class), None) => Err(SymbolError::new(
                ErrorCode::InvalidReturnType,
                format!("should return {}, got nothing", class),
            )),
            (None, _) => Ok(None),
        }
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let arguments: Vec<String> = self.arguments.iter().map(ToString::to_string).collect();
        write!(f, "func({})", arguments.join(", "))?;
        if let Some(returns) = &self.returns {
            write!(f, ": {}", returns)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_call_adapts_arguments_and_result() {
        let add = Function::native(
            vec![Class::Integer, Class::Integer],
            Some(Class::Integer),
            |a: i64, b: i64| Ok(a + b),
        )
        .unwrap();
        let result = add
            .call(vec![Value::Integer(2), Value::Integer(3)])
            .unwrap();
        assert_eq!(result, Some(Value::Integer(5)));
    }

    #[test]
    fn test_result_constructed_into_declared_class() {
        let half = Function::native(vec![Class::Float], Some(Class::Float), |a: f64| Ok(a / 2.0))
            .unwrap();
        let result = half.call(vec![Value::Float(3.0)]).unwrap();
        assert_eq!(result, Some(Value::Float(1.5)));
    }

    #[test]
    fn test_arity_checked_before_handler_runs() {
        let never = Function::native(vec![Class::String], None, |_: String| -> SymbolResult<()> {
            panic!("handler must not run")
        })
        .unwrap();
        let err = never.call(vec![]).unwrap_err();
        assert_eq!(err.to_string(), "expected 1 arguments, got 0");
    }

    #[test]
    fn test_registration_rejects_wrong_class() {
        let err = Function::native(vec![Class::String], Some(Class::Integer), |n: i64| Ok(n))
            .unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::ExpectedCallbackSignature));
    }

    #[test]
    fn test_registration_rejects_effect_mismatch() {
        assert!(Function::native(vec![], Some(Class::Integer), || Ok(())).is_err());
        assert!(Function::native(vec![], None, || Ok(1i64)).is_err());
    }

    #[test]
    fn test_optional_arguments() {
        let or_zero = Function::native(
            vec![Class::nilable(Class::Integer)],
            Some(Class::Integer),
            |n: Option<i64>| Ok(n.unwrap_or(0)),
        )
        .unwrap();
        let absent = Value::Nilable(NilableValue::absent(Class::Integer));
        assert_eq!(or_zero.call(vec![absent]).unwrap(), Some(Value::Integer(0)));
    }
}
