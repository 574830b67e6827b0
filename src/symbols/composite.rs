//! Descriptor tables of composite classes, built on first use.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::class::{Class, ClassRef, MapClass};
use super::descriptors::{DescriptorBuilder, Descriptors, Enumerable, Property};
use super::primitives::{index_bound, range_bounds};
use super::value::{ArrayValue, Instance, MapValue, NilableValue, PartialValue, Value};
use crate::ast::Token;
use crate::error::{ErrorCode, SymbolError, SymbolResult};

pub(crate) fn build(class: &Class) -> Descriptors {
    match class {
        Class::Array(item) => array(class, item),
        Class::Nilable(inner) => nilable(class, inner),
        Class::Map(map) => record(map),
        Class::Partial(of) => partial(class, of),
        _ => Descriptors::default(),
    }
}

fn as_array(value: &Value) -> SymbolResult<&ArrayValue> {
    match value {
        Value::Array(arr) => Ok(arr),
        other => Err(SymbolError::new(
            ErrorCode::InvalidClass,
            format!("expected an array, got {}", other.class()),
        )),
    }
}

/// Items `start..end`, or `end..start` reversed when `start > end`.
fn array_range(value: &Value, start: i64, end: i64) -> SymbolResult<Value> {
    let arr = as_array(value)?;
    let items = arr.items();
    let (start, end) = range_bounds(items.len(), start, end)?;
    let slice = if start > end {
        items[end..start].iter().rev().cloned().collect()
    } else {
        items[start..end].to_vec()
    };
    Ok(Value::array(arr.item_class().clone(), slice))
}

fn array(class: &Class, item: &Class) -> Descriptors {
    DescriptorBuilder::new(class.clone())
        .method("append", vec![item.clone()], None, |arr: ArrayValue, value: Value| {
            arr.push(value);
            Ok(())
        })
        .method("length", vec![], Some(Class::Integer), |arr: ArrayValue| {
            Ok(arr.len() as i64)
        })
        .enumerable(Enumerable {
            item: item.clone(),
            length: Arc::new(|value: &Value| Ok(as_array(value)?.len() as i64)),
            get_index: Arc::new(|value: &Value, index: i64| {
                let arr = as_array(value)?;
                let index = index_bound(arr.len(), index)?;
                arr.get(index).ok_or_else(|| {
                    SymbolError::new(ErrorCode::IndexOutOfRange, "index out of range")
                })
            }),
            set_index: Some(Arc::new(|value: &Value, index: i64, item: Value| {
                let arr = as_array(value)?;
                let index = index_bound(arr.len(), index)?;
                arr.set(index, item);
                Ok(())
            })),
            get_range: Arc::new(array_range),
            set_range: Some(Arc::new(|value: &Value, start: i64, end: i64, insert: Value| {
                let arr = as_array(value)?;
                let (start, end) = range_bounds(arr.len(), start, end)?;
                if start > end {
                    return Err(SymbolError::new(
                        ErrorCode::InvalidRangeIndices,
                        format!("invalid range {}:{}", start, end),
                    ));
                }
                arr.splice(start, end, as_array(&insert)?.items());
                Ok(())
            })),
        })
        .build_trusted()
}

fn nilable(class: &Class, inner: &Class) -> Descriptors {
    let mut builder = DescriptorBuilder::new(class.clone());
    for token in [Token::Equals, Token::NotEquals] {
        let same = move |a: Value, b: Value| {
            let equal = present(&a) == present(&b);
            Ok(equal == (token == Token::Equals))
        };
        builder = builder
            .comparator(Class::Nil, token, same)
            .comparator(class.clone(), token, same)
            .comparator(inner.clone(), token, same);
    }
    builder.build_trusted()
}

/// The present payload of a nilable value, `None` for absent or nil.
fn present(value: &Value) -> Option<&Value> {
    match value {
        Value::Nil => None,
        Value::Nilable(NilableValue { value, .. }) => value.as_deref(),
        other => Some(other),
    }
}

fn absent_or_nil(class: &Class) -> Value {
    match class {
        Class::Nilable(inner) => Value::Nilable(NilableValue::absent((**inner).clone())),
        _ => Value::Nil,
    }
}

fn fields_of(value: &Value) -> SymbolResult<&MapValue> {
    match value {
        Value::Map(map) => Ok(map),
        Value::Partial(partial) => Ok(&partial.fields),
        Value::Instance(Instance { payload, .. }) => match payload.as_ref() {
            Value::Map(map) => Ok(map),
            other => Err(SymbolError::new(
                ErrorCode::CannotAccessProperty,
                format!("{} has no fields", other.class()),
            )),
        },
        other => Err(SymbolError::new(
            ErrorCode::CannotAccessProperty,
            format!("{} has no fields", other.class()),
        )),
    }
}

/// A property reading and writing one field of a record-like value.
fn field_property(key: &str, class: &Class) -> Property {
    let (get_key, set_key) = (key.to_string(), key.to_string());
    let missing = class.clone();
    Property {
        class: class.clone(),
        getter: Arc::new(move |value: &Value| {
            Ok(fields_of(value)?
                .get(&get_key)
                .unwrap_or_else(|| absent_or_nil(&missing)))
        }),
        setter: Some(Arc::new(move |value: &Value, item: Value| {
            fields_of(value)?.set(&set_key, item);
            Ok(())
        })),
    }
}

fn with_fields(mut builder: DescriptorBuilder, properties: &BTreeMap<String, Class>) -> DescriptorBuilder {
    for (key, class) in properties {
        builder = builder.raw_property(key, field_property(key, class));
    }
    builder
}

fn record(map: &MapClass) -> Descriptors {
    let builder = DescriptorBuilder::new(Class::Map(map.clone()))
        .record_constructor(|fields| Ok(Value::Map(MapValue::new(fields))));
    let mut descriptors = with_fields(builder, &map.properties).build_trusted();
    descriptors.properties.get_or_insert_with(BTreeMap::new);
    descriptors
}

fn partial(class: &Class, of: &Class) -> Descriptors {
    let properties: BTreeMap<String, Class> = match &of.descriptors().properties {
        Some(properties) => properties
            .iter()
            .map(|(key, prop)| (key.clone(), Class::nilable(prop.class.clone())))
            .collect(),
        None => return Descriptors::default(),
    };
    let target = of.clone();
    let builder = DescriptorBuilder::new(class.clone()).record_constructor(move |fields| {
        Ok(Value::Partial(PartialValue {
            of: target.clone(),
            fields: MapValue::new(fields),
        }))
    });
    with_fields(builder, &properties).build_trusted()
}

/// Defines a named record class: an extension class whose instances carry
/// the given fields, constructible from any structurally matching record.
pub fn record_class<K: Into<String>>(
    name: &str,
    fields: impl IntoIterator<Item = (K, Class)>,
) -> SymbolResult<Class> {
    let fields: BTreeMap<String, Class> = fields.into_iter().map(|(k, c)| (k.into(), c)).collect();
    ClassRef::define(name, |this, builder| {
        let of = this.clone();
        let builder = builder.record_constructor(move |values| {
            Value::instance(&of, Value::Map(MapValue::new(values)))
        });
        with_fields(builder, &fields)
    })
}
