//! The two interpretations of an expression.
//!
//! The expression walker is written once, generic over a [`Mode`]. The
//! [`Evaluate`] mode works on classes only and checks that an expression is
//! well typed. The [`Resolve`] mode computes values. Every rule accepted by
//! `Evaluate` has a `Resolve` counterpart built from the same class-model
//! primitives (`should_construct`/`construct`, `should_operate`/`operate`,
//! `should_compare`/`compare`).

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::Arc;

use crate::ast::Token;
use crate::error::{ErrorCode, SymbolError, SymbolResult};
use crate::symbols::{
    compare, construct, operate, should_compare, should_construct, should_operate, Callable,
    Class, Enumerable, MapValue, Object, ScopeValue, Value,
};

/// What a name or member path evaluates to.
pub enum Member<T> {
    Item(T),
    Class(Class),
    Object(Arc<dyn Object>),
    Callable(Arc<dyn Callable>),
}

impl<T> Member<T> {
    pub fn kind(&self) -> &'static str {
        match self {
            Member::Item(_) => "value",
            Member::Class(_) => "class",
            Member::Object(_) => "object",
            Member::Callable(_) => "callable",
        }
    }
}

pub trait Mode {
    /// What an expression produces: a class or a value.
    type Item: Clone + Debug;

    fn literal(value: Value) -> Self::Item;
    fn class_of(item: &Self::Item) -> Class;
    fn from_scope(value: ScopeValue) -> SymbolResult<Member<Self::Item>>;

    fn construct(target: &Class, item: Self::Item) -> SymbolResult<Self::Item>;
    fn operate(token: Token, left: Self::Item, right: Self::Item) -> SymbolResult<Self::Item>;
    fn compare(token: Token, left: Self::Item, right: Self::Item) -> SymbolResult<Self::Item>;
    /// Logical negation of a Boolean item.
    fn not(item: Self::Item) -> SymbolResult<Self::Item>;
    /// Unary `+`/`-` through the Number class.
    fn signed(token: Token, item: Self::Item) -> SymbolResult<Self::Item>;

    /// Template literal: every part converted to String and joined.
    fn concat(parts: Vec<Self::Item>) -> SymbolResult<Self::Item>;
    fn array(item: &Class, items: Vec<Self::Item>) -> SymbolResult<Self::Item>;
    fn record(fields: BTreeMap<String, Self::Item>) -> Self::Item;
    /// The properties of an item, to be merged into a record.
    fn spread(item: Self::Item) -> SymbolResult<BTreeMap<String, Self::Item>>;

    /// A property, or a method bound to the item.
    fn property(item: Self::Item, key: &str) -> SymbolResult<Member<Self::Item>>;
    /// Calls a callable whose arity was already checked.
    fn call(callable: &dyn Callable, arguments: Vec<Self::Item>) -> SymbolResult<Self::Item>;
    fn index(
        item: Self::Item,
        enumerable: &Enumerable,
        index: Self::Item,
    ) -> SymbolResult<Self::Item>;
    fn range(
        item: Self::Item,
        enumerable: &Enumerable,
        start: Option<Self::Item>,
        end: Option<Self::Item>,
    ) -> SymbolResult<Self::Item>;
}

fn unknown_property(class: &Class, key: &str) -> SymbolError {
    SymbolError::new(
        ErrorCode::UnknownProperty,
        format!("{} has no property {}", class, key),
    )
}

fn invalid_spread(class: &Class) -> SymbolError {
    SymbolError::new(
        ErrorCode::InvalidSpreadTarget,
        format!("cannot spread {}", class),
    )
}

fn invalid_operand(token: Token, class: &Class) -> SymbolError {
    SymbolError::new(
        ErrorCode::InvalidUnaryOperand,
        format!("invalid operand {} for unary {}", class, token),
    )
}

/// Static pass: every item is a class.
pub struct Evaluate;

impl Mode for Evaluate {
    type Item = Class;

    fn literal(value: Value) -> Class {
        value.class()
    }

    fn class_of(item: &Class) -> Class {
        item.clone()
    }

    fn from_scope(value: ScopeValue) -> SymbolResult<Member<Class>> {
        Ok(match value {
            ScopeValue::Value(value) => Member::Item(value.class()),
            ScopeValue::Expected(class) => Member::Item(class),
            ScopeValue::Class(class) => Member::Class(class),
            ScopeValue::Object(object) => Member::Object(object),
            ScopeValue::Callable(callable) => Member::Callable(callable),
        })
    }

    fn construct(target: &Class, item: Class) -> SymbolResult<Class> {
        should_construct(target, &item)?;
        Ok(target.clone())
    }

    fn operate(token: Token, left: Class, right: Class) -> SymbolResult<Class> {
        should_operate(token, &left, &right)
    }

    fn compare(token: Token, left: Class, right: Class) -> SymbolResult<Class> {
        should_compare(token, &left, &right)?;
        Ok(Class::Boolean)
    }

    fn not(item: Class) -> SymbolResult<Class> {
        if item != Class::Boolean {
            return Err(invalid_operand(Token::Not, &item));
        }
        Ok(item)
    }

    fn signed(token: Token, item: Class) -> SymbolResult<Class> {
        if should_construct(&Class::Number, &item).is_err()
            || should_construct(&item, &Class::Number).is_err()
        {
            return Err(invalid_operand(token, &item));
        }
        Ok(item)
    }

    fn concat(parts: Vec<Class>) -> SymbolResult<Class> {
        for part in &parts {
            should_construct(&Class::String, part)?;
        }
        Ok(Class::String)
    }

    fn array(item: &Class, items: Vec<Class>) -> SymbolResult<Class> {
        for class in &items {
            should_construct(item, class)?;
        }
        Ok(Class::array(item.clone()))
    }

    fn record(fields: BTreeMap<String, Class>) -> Class {
        Class::map(fields)
    }

    fn spread(item: Class) -> SymbolResult<BTreeMap<String, Class>> {
        let descriptors = item.descriptors();
        let properties = descriptors
            .properties
            .as_ref()
            .ok_or_else(|| invalid_spread(&item))?;
        Ok(properties
            .iter()
            .map(|(key, prop)| (key.clone(), prop.class.clone()))
            .collect())
    }

    fn property(item: Class, key: &str) -> SymbolResult<Member<Class>> {
        let descriptors = item.descriptors();
        if let Some(prop) = descriptors.property(key) {
            return Ok(Member::Item(prop.class.clone()));
        }
        match descriptors.prototype.get(key) {
            Some(method) => Ok(Member::Callable(method.signature(key).into_callable())),
            None => Err(unknown_property(&item, key)),
        }
    }

    fn call(callable: &dyn Callable, arguments: Vec<Class>) -> SymbolResult<Class> {
        callable.check(&arguments)?;
        for (expected, class) in callable.arguments().iter().zip(&arguments) {
            should_construct(expected, class)?;
        }
        Ok(callable.returns().cloned().unwrap_or(Class::Nil))
    }

    fn index(_: Class, enumerable: &Enumerable, _: Class) -> SymbolResult<Class> {
        Ok(enumerable.item.clone())
    }

    fn range(item: Class, _: &Enumerable, _: Option<Class>, _: Option<Class>) -> SymbolResult<Class> {
        Ok(item)
    }
}

/// Dynamic pass: every item is a value.
pub struct Resolve;

impl Mode for Resolve {
    type Item = Value;

    fn literal(value: Value) -> Value {
        value
    }

    fn class_of(item: &Value) -> Class {
        item.class()
    }

    fn from_scope(value: ScopeValue) -> SymbolResult<Member<Value>> {
        Ok(match value {
            ScopeValue::Value(value) => Member::Item(value),
            ScopeValue::Expected(class) => {
                return Err(SymbolError::new(
                    ErrorCode::InvalidValueExpression,
                    format!("no value of {} is bound yet", class),
                ))
            }
            ScopeValue::Class(class) => Member::Class(class),
            ScopeValue::Object(object) => Member::Object(object),
            ScopeValue::Callable(callable) => Member::Callable(callable),
        })
    }

    fn construct(target: &Class, item: Value) -> SymbolResult<Value> {
        construct(target, item)
    }

    fn operate(token: Token, left: Value, right: Value) -> SymbolResult<Value> {
        operate(token, left, right)
    }

    fn compare(token: Token, left: Value, right: Value) -> SymbolResult<Value> {
        compare(token, left, right).map(Value::Boolean)
    }

    fn not(item: Value) -> SymbolResult<Value> {
        match item {
            Value::Boolean(b) => Ok(Value::Boolean(!b)),
            other => Err(invalid_operand(Token::Not, &other.class())),
        }
    }

    fn signed(token: Token, item: Value) -> SymbolResult<Value> {
        if token != Token::Sub {
            return Ok(item);
        }
        match item {
            Value::Integer(n) => Ok(Value::Integer(n.wrapping_neg())),
            Value::Number(n) => Ok(Value::Number(-n)),
            Value::Double(n) => Ok(Value::Double(-n)),
            Value::Float(n) => Ok(Value::Float(-n)),
            // Other classes negate through their Number form.
            other => {
                let class = other.class();
                let number = construct(&Class::Number, other)?.as_f64()?;
                construct(&class, Value::Number(-number))
            }
        }
    }

    fn concat(parts: Vec<Value>) -> SymbolResult<Value> {
        let mut text = String::new();
        for part in parts {
            text.push_str(construct(&Class::String, part)?.as_str()?);
        }
        Ok(Value::String(text))
    }

    fn array(item: &Class, items: Vec<Value>) -> SymbolResult<Value> {
        let items = items
            .into_iter()
            .map(|value| construct(item, value))
            .collect::<SymbolResult<Vec<_>>>()?;
        Ok(Value::array(item.clone(), items))
    }

    fn record(fields: BTreeMap<String, Value>) -> Value {
        Value::Map(MapValue::new(fields))
    }

    fn spread(item: Value) -> SymbolResult<BTreeMap<String, Value>> {
        let class = item.class();
        let descriptors = class.descriptors();
        let properties = descriptors
            .properties
            .as_ref()
            .ok_or_else(|| invalid_spread(&class))?;
        properties
            .iter()
            .map(|(key, prop)| Ok((key.clone(), (prop.getter)(&item)?)))
            .collect()
    }

    fn property(item: Value, key: &str) -> SymbolResult<Member<Value>> {
        let class = item.class();
        let descriptors = class.descriptors();
        if let Some(prop) = descriptors.property(key) {
            return Ok(Member::Item((prop.getter)(&item)?));
        }
        match descriptors.prototype.get(key) {
            Some(method) => Ok(Member::Callable(method.bind(item).into_callable())),
            None => Err(unknown_property(&class, key)),
        }
    }

    fn call(callable: &dyn Callable, arguments: Vec<Value>) -> SymbolResult<Value> {
        let arguments = callable
            .arguments()
            .iter()
            .zip(arguments)
            .map(|(class, value)| construct(class, value))
            .collect::<SymbolResult<Vec<_>>>()?;
        Ok(callable.call(arguments)?.unwrap_or(Value::Nil))
    }

    fn index(item: Value, enumerable: &Enumerable, index: Value) -> SymbolResult<Value> {
        (enumerable.get_index)(&item, index.as_i64()?)
    }

    fn range(
        item: Value,
        enumerable: &Enumerable,
        start: Option<Value>,
        end: Option<Value>,
    ) -> SymbolResult<Value> {
        let start = match start {
            Some(start) => start.as_i64()?,
            None => 0,
        };
        let end = match end {
            Some(end) => end.as_i64()?,
            None => (enumerable.length)(&item)?,
        };
        (enumerable.get_range)(&item, start, end)
    }
}
