use core::fmt;
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use super::class::{Class, ClassRef, MapClass};
use crate::error::{ErrorCode, SymbolError, SymbolResult};

/// A runtime datum. Its class is derived from the payload.
///
/// Arrays, maps and extension instances share their contents between clones,
/// so setters and index assignments are visible through every binding of the
/// same value.
#[derive(Clone, Debug)]
pub enum Value {
    Nil,
    Boolean(bool),
    String(String),
    Number(f64),
    Double(f64),
    Float(f64),
    Integer(i64),
    DateTime(DateTime<Utc>),
    Error(ErrorValue),
    Array(ArrayValue),
    Map(MapValue),
    Nilable(NilableValue),
    Partial(PartialValue),
    Instance(Instance),
}

/// A first-class error, raised by `throw` and recovered by `try`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorValue {
    pub name: String,
    pub message: String,
    /// Field-level details, e.g. the offending fields of a validation failure.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub data: BTreeMap<String, String>,
}

impl ErrorValue {
    pub fn new(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            message: message.to_string(),
            data: BTreeMap::new(),
        }
    }

    pub fn validation(data: BTreeMap<String, String>) -> Self {
        let fields: Vec<&str> = data.keys().map(String::as_str).collect();
        Self {
            name: "ValidationError".to_string(),
            message: format!("invalid fields: {}", fields.join(", ")),
            data,
        }
    }
}

impl fmt::Display for ErrorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.message)?;
        if !self.data.is_empty() {
            let details: Vec<String> = self
                .data
                .iter()
                .map(|(key, msg)| format!("{}: {}", key, msg))
                .collect();
            write!(f, " ({})", details.join("; "))?;
        }
        Ok(())
    }
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Clone, Debug)]
pub struct ArrayValue {
    item: Class,
    items: Arc<RwLock<Vec<Value>>>,
}

impl ArrayValue {
    pub fn new(item: Class, items: Vec<Value>) -> Self {
        Self {
            item,
            items: Arc::new(RwLock::new(items)),
        }
    }

    pub fn item_class(&self) -> &Class {
        &self.item
    }

    pub fn len(&self) -> usize {
        read(&self.items).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A snapshot of the items.
    pub fn items(&self) -> Vec<Value> {
        read(&self.items).clone()
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        read(&self.items).get(index).cloned()
    }

    pub fn set(&self, index: usize, value: Value) -> bool {
        match write(&self.items).get_mut(index) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    pub fn push(&self, value: Value) {
        write(&self.items).push(value);
    }

    /// Replaces `start..end` with `values`.
    pub fn splice(&self, start: usize, end: usize, values: Vec<Value>) {
        write(&self.items).splice(start..end, values);
    }

    fn same(&self, other: &ArrayValue) -> bool {
        Arc::ptr_eq(&self.items, &other.items)
    }
}

/// A structural record. Its class is the set of its field classes.
#[derive(Clone, Debug, Default)]
pub struct MapValue {
    fields: Arc<RwLock<BTreeMap<String, Value>>>,
}

impl MapValue {
    pub fn new(fields: BTreeMap<String, Value>) -> Self {
        Self {
            fields: Arc::new(RwLock::new(fields)),
        }
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        read(&self.fields).get(key).cloned()
    }

    pub fn set(&self, key: &str, value: Value) {
        write(&self.fields).insert(key.to_string(), value);
    }

    pub fn contains(&self, key: &str) -> bool {
        read(&self.fields).contains_key(key)
    }

    /// A snapshot of the fields.
    pub fn fields(&self) -> BTreeMap<String, Value> {
        read(&self.fields).clone()
    }

    pub fn class(&self) -> MapClass {
        MapClass::new(
            read(&self.fields)
                .iter()
                .map(|(key, value)| (key.clone(), value.class()))
                .collect(),
        )
    }

    fn same(&self, other: &MapValue) -> bool {
        Arc::ptr_eq(&self.fields, &other.fields)
    }
}

/// A value of `X?`: either a present `X` or explicitly absent.
#[derive(Clone, Debug)]
pub struct NilableValue {
    pub class: Class,
    pub value: Option<Box<Value>>,
}

impl NilableValue {
    pub fn absent(class: Class) -> Self {
        Self { class, value: None }
    }

    pub fn present(class: Class, value: Value) -> Self {
        Self {
            class,
            value: Some(Box::new(value)),
        }
    }

    pub fn is_absent(&self) -> bool {
        self.value.is_none()
    }
}

/// A value of `Partial<X>`: `X`'s properties, each of them nilable.
#[derive(Clone, Debug)]
pub struct PartialValue {
    pub of: Class,
    pub fields: MapValue,
}

/// A value of an extension class.
#[derive(Clone, Debug)]
pub struct Instance {
    pub class: ClassRef,
    pub payload: Box<Value>,
}

impl Value {
    pub fn class(&self) -> Class {
        match self {
            Value::Nil => Class::Nil,
            Value::Boolean(_) => Class::Boolean,
            Value::String(_) => Class::String,
            Value::Number(_) => Class::Number,
            Value::Double(_) => Class::Double,
            Value::Float(_) => Class::Float,
            Value::Integer(_) => Class::Integer,
            Value::DateTime(_) => Class::DateTime,
            Value::Error(_) => Class::Error,
            Value::Array(arr) => Class::array(arr.item.clone()),
            Value::Map(map) => Class::Map(map.class()),
            Value::Nilable(nilable) => Class::nilable(nilable.class.clone()),
            Value::Partial(partial) => Class::partial(partial.of.clone()),
            Value::Instance(instance) => Class::Extension(instance.class.clone()),
        }
    }

    pub fn array(item: Class, items: Vec<Value>) -> Self {
        Value::Array(ArrayValue::new(item, items))
    }

    pub fn map<K: Into<String>>(fields: impl IntoIterator<Item = (K, Value)>) -> Self {
        Value::Map(MapValue::new(
            fields.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        ))
    }

    pub fn string<S: Into<String>>(value: S) -> Self {
        Value::String(value.into())
    }

    /// Wraps a payload as an instance of an extension class.
    pub fn instance(class: &Class, payload: Value) -> SymbolResult<Self> {
        match class {
            Class::Extension(class) => Ok(Value::Instance(Instance {
                class: class.clone(),
                payload: Box::new(payload),
            })),
            other => Err(SymbolError::new(
                ErrorCode::InvalidClass,
                format!("{} is not an extension class", other),
            )),
        }
    }

    /// The payload of an extension instance, or the value itself.
    pub fn payload(&self) -> &Value {
        match self {
            Value::Instance(instance) => &instance.payload,
            other => other,
        }
    }

    fn unexpected(&self, expected: &str) -> SymbolError {
        SymbolError::new(
            ErrorCode::InvalidClass,
            format!("expected {}, got {}", expected, self.class()),
        )
    }

    pub fn as_bool(&self) -> SymbolResult<bool> {
        match self {
            Value::Boolean(b) => Ok(*b),
            other => Err(other.unexpected("Boolean")),
        }
    }

    pub fn as_i64(&self) -> SymbolResult<i64> {
        match self {
            Value::Integer(n) => Ok(*n),
            other => Err(other.unexpected("Integer")),
        }
    }

    /// Any numeric value widened to `f64`.
    pub fn as_f64(&self) -> SymbolResult<f64> {
        match self {
            Value::Number(n) | Value::Double(n) | Value::Float(n) => Ok(*n),
            Value::Integer(n) => Ok(*n as f64),
            other => Err(other.unexpected("a number")),
        }
    }

    pub fn as_str(&self) -> SymbolResult<&str> {
        match self {
            Value::String(s) => Ok(s),
            other => Err(other.unexpected("String")),
        }
    }

    /// Serializes into the primitive tree shared with every external codec.
    pub fn to_primitive(&self) -> serde_json::Value {
        use serde_json::Value as Json;
        match self {
            Value::Nil => Json::Null,
            Value::Boolean(b) => Json::Bool(*b),
            Value::String(s) => Json::String(s.clone()),
            Value::Number(n) | Value::Double(n) | Value::Float(n) => {
                serde_json::Number::from_f64(*n).map_or(Json::Null, Json::Number)
            }
            Value::Integer(n) => Json::from(*n),
            Value::DateTime(dt) => Json::String(dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            Value::Error(err) => serde_json::to_value(err).unwrap_or(Json::Null),
            Value::Array(arr) => Json::Array(arr.items().iter().map(Value::to_primitive).collect()),
            Value::Map(map) => Json::Object(
                map.fields()
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_primitive()))
                    .collect(),
            ),
            Value::Nilable(nilable) => match &nilable.value {
                Some(inner) => inner.to_primitive(),
                None => Json::Null,
            },
            Value::Partial(partial) => Json::Object(
                partial
                    .fields
                    .fields()
                    .iter()
                    .filter(|(_, v)| !matches!(v, Value::Nilable(n) if n.is_absent()))
                    .map(|(k, v)| (k.clone(), v.to_primitive()))
                    .collect(),
            ),
            Value::Instance(instance) => instance.payload.to_primitive(),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Number(a), Value::Number(b))
            | (Value::Double(a), Value::Double(b))
            | (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::DateTime(a), Value::DateTime(b)) => a == b,
            (Value::Error(a), Value::Error(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => {
                a.same(b) || (a.item == b.item && a.items() == b.items())
            }
            (Value::Map(a), Value::Map(b)) => a.same(b) || a.fields() == b.fields(),
            (Value::Nilable(a), Value::Nilable(b)) => a.class == b.class && a.value == b.value,
            (Value::Partial(a), Value::Partial(b)) => a.of == b.of && a.fields == b.fields,
            (Value::Instance(a), Value::Instance(b)) => a.class == b.class && a.payload == b.payload,
            _ => false,
        }
    }
}

impl PartialEq for MapValue {
    fn eq(&self, other: &Self) -> bool {
        self.same(other) || self.fields() == other.fields()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{}", s),
            Value::Error(err) => write!(f, "{}", err),
            other => write!(f, "{}", other.to_primitive()),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<ErrorValue> for Value {
    fn from(value: ErrorValue) -> Self {
        Value::Error(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_class_follows_payload() {
        let value = Value::map([
            ("name", Value::string("a")),
            ("tags", Value::array(Class::String, vec![])),
        ]);
        assert_eq!(
            value.class(),
            Class::map([
                ("name", Class::String),
                ("tags", Class::array(Class::String)),
            ])
        );
    }

    #[test]
    fn test_primitive_tree() {
        let value = Value::map([
            ("id", Value::Integer(7)),
            ("score", Value::Float(0.5)),
            (
                "nick",
                Value::Nilable(NilableValue::absent(Class::String)),
            ),
            ("flags", Value::array(Class::Boolean, vec![true.into()])),
        ]);
        assert_eq!(
            value.to_primitive(),
            json!({"id": 7, "score": 0.5, "nick": null, "flags": [true]})
        );
    }

    #[test]
    fn test_arrays_share_contents() {
        let arr = ArrayValue::new(Class::Integer, vec![Value::Integer(1)]);
        let alias = Value::Array(arr.clone());
        arr.push(Value::Integer(2));
        assert_eq!(alias.to_primitive(), json!([1, 2]));
    }

    #[test]
    fn test_validation_error_display() {
        let mut data = BTreeMap::new();
        data.insert("age".to_string(), "missing property age".to_string());
        let err = ErrorValue::validation(data);
        assert_eq!(
            err.to_string(),
            "ValidationError: invalid fields: age (age: missing property age)"
        );
    }
}
