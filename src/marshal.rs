//! Conversion between external JSON payloads and values.
//!
//! Payloads are read into structural values first: objects become records,
//! arrays take the class of their items. Typed values are then materialized
//! through [`construct`], so an external payload is validated exactly like a
//! record literal in a program.

use std::collections::BTreeMap;

use serde_json::Value as Json;

use crate::error::{ErrorCode, SymbolError, SymbolResult};
use crate::symbols::{construct, Class, Value};

fn cannot_unmarshal<S: Into<String>>(message: S) -> SymbolError {
    SymbolError::new(ErrorCode::CannotUnmarshal, message)
}

/// Reads a JSON document into a structural value.
pub fn from_bytes(bytes: &[u8]) -> SymbolResult<Value> {
    let primitive: Json = serde_json::from_slice(bytes)
        .map_err(|err| cannot_unmarshal(format!("cannot unmarshal payload: {}", err)))?;
    value_from_primitive(primitive)
}

/// Converts a primitive tree into a structural value.
///
/// Integral numbers become `Integer`, every other number `Number`. An array
/// whose items share one class is an array of that class, any other array is
/// an array of `Any`.
pub fn value_from_primitive(primitive: Json) -> SymbolResult<Value> {
    Ok(match primitive {
        Json::Null => Value::Nil,
        Json::Bool(b) => Value::Boolean(b),
        Json::String(s) => Value::String(s),
        Json::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => Value::Integer(i),
            (None, Some(f)) => Value::Number(f),
            (None, None) => return Err(cannot_unmarshal(format!("number {} out of range", n))),
        },
        Json::Array(items) => {
            let items = items
                .into_iter()
                .map(value_from_primitive)
                .collect::<SymbolResult<Vec<_>>>()?;
            let item = match items.split_first() {
                Some((first, rest)) => {
                    let class = first.class();
                    if rest.iter().all(|item| item.class() == class) {
                        class
                    } else {
                        Class::Any
                    }
                }
                None => Class::Any,
            };
            Value::array(item, items)
        }
        Json::Object(fields) => {
            let fields = fields
                .into_iter()
                .map(|(key, value)| Ok((key, value_from_primitive(value)?)))
                .collect::<SymbolResult<BTreeMap<_, _>>>()?;
            Value::map(fields)
        }
    })
}

/// Serializes a value as JSON.
pub fn to_bytes(value: &Value) -> SymbolResult<Vec<u8>> {
    serde_json::to_vec(&value.to_primitive())
        .map_err(|err| cannot_unmarshal(format!("cannot marshal value: {}", err)))
}

/// Reads a JSON document and constructs it into `class`.
#[tracing::instrument(level = "debug", skip(bytes), fields(len = bytes.len()))]
pub fn construct_from_bytes(class: &Class, bytes: &[u8]) -> SymbolResult<Value> {
    let value = from_bytes(bytes)?;
    construct(class, value).map_err(|err| {
        tracing::debug!("payload rejected: {}", err);
        err
    })
}
