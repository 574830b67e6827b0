//! Structural construction.
//!
//! [`should_construct`] decides over classes whether a conversion exists and
//! [`construct`] performs it over values. Both apply the same rules in the
//! same order, so a conversion accepted statically never fails at run time
//! for want of a rule:
//!
//! 1. equal classes convert by identity
//! 2. anything converts into `Any`
//! 3. into `X?`: nil gives absent, otherwise convert into `X` and wrap
//! 4. from `X?`: absent fails, present converts its payload
//! 5. arrays convert elementwise
//! 6. records convert field by field into classes with properties
//! 7. a constructor registered on the target for the source class
//! 8. a source with properties converts as the record of its getters
//!
//! Anything else cannot be constructed.

use std::collections::BTreeMap;

use tracing::debug;

use super::class::{Class, MapClass};
use super::descriptors::Descriptors;
use super::value::{ErrorValue, MapValue, NilableValue, Value};
use crate::error::{ErrorCode, SymbolError, SymbolResult};

fn cannot_construct(target: &Class, source: &Class) -> SymbolError {
    SymbolError::new(
        ErrorCode::CannotConstruct,
        format!("cannot construct {} from {}", target, source),
    )
}

fn unknown_property(key: &str) -> SymbolError {
    SymbolError::new(ErrorCode::UnknownProperty, format!("unknown property {}", key))
}

fn missing_property(key: &str) -> SymbolError {
    SymbolError::new(ErrorCode::MissingProperty, format!("missing property {}", key))
}

/// Whether `target` accepts records, i.e. declares properties and a record constructor.
fn accepts_records(descriptors: &Descriptors) -> bool {
    descriptors.properties.is_some() && descriptors.record_constructor.is_some()
}

/// The record class equivalent to a class exposing properties.
fn record_of(descriptors: &Descriptors) -> Option<MapClass> {
    let properties = descriptors.properties.as_ref()?;
    Some(MapClass::new(
        properties
            .iter()
            .map(|(key, prop)| (key.clone(), prop.class.clone()))
            .collect(),
    ))
}

/// Checks that values of `source` can be constructed into `target`.
pub fn should_construct(target: &Class, source: &Class) -> SymbolResult<()> {
    if target == source || *target == Class::Any {
        return Ok(());
    }
    if let Class::Nilable(inner) = target {
        if *source == Class::Nil {
            return Ok(());
        }
        return should_construct(inner, source);
    }
    if let Class::Nilable(inner) = source {
        return should_construct(target, inner);
    }
    if let (Class::Array(target_item), Class::Array(source_item)) = (target, source) {
        return should_construct(target_item, source_item);
    }

    let descriptors = target.descriptors();
    if let Class::Map(record) = source {
        if accepts_records(&descriptors) {
            return should_construct_record(&descriptors, record);
        }
    }
    if descriptors.constructors.contains_key(source) {
        return Ok(());
    }
    if !matches!(source, Class::Map(_)) && accepts_records(&descriptors) {
        if let Some(record) = record_of(&source.descriptors()) {
            return should_construct(target, &Class::Map(record));
        }
    }
    Err(cannot_construct(target, source))
}

fn should_construct_record(target: &Descriptors, record: &MapClass) -> SymbolResult<()> {
    let properties = target.properties.as_ref().map_or_else(BTreeMap::new, Clone::clone);
    if let Some(key) = record.properties.keys().find(|key| !properties.contains_key(*key)) {
        return Err(unknown_property(key));
    }
    for (key, prop) in &properties {
        match record.properties.get(key) {
            Some(field) => should_construct(&prop.class, field).map_err(|err| {
                SymbolError::new(
                    err.code().unwrap_or(ErrorCode::CannotConstruct),
                    format!("property {}: {}", key, err.message()),
                )
            })?,
            None if prop.class.is_nilable() => {}
            None => return Err(missing_property(key)),
        }
    }
    Ok(())
}

/// Constructs `value` into `target`.
pub fn construct(target: &Class, value: Value) -> SymbolResult<Value> {
    let source = value.class();
    if *target == source || *target == Class::Any {
        return Ok(value);
    }
    if let Class::Nilable(inner) = target {
        return match value {
            Value::Nil => Ok(Value::Nilable(NilableValue::absent((**inner).clone()))),
            Value::Nilable(NilableValue { value: None, .. }) => {
                Ok(Value::Nilable(NilableValue::absent((**inner).clone())))
            }
            value => {
                let constructed = construct(inner, value)?;
                Ok(Value::Nilable(NilableValue::present(
                    (**inner).clone(),
                    constructed,
                )))
            }
        };
    }
    if let Value::Nilable(nilable) = value {
        return match nilable.value {
            Some(inner) => construct(target, *inner),
            None => Err(cannot_construct(target, &Class::Nil)),
        };
    }
    if let (Class::Array(target_item), Value::Array(arr)) = (target, &value) {
        let items = arr
            .items()
            .into_iter()
            .map(|item| construct(target_item, item))
            .collect::<SymbolResult<Vec<_>>>()?;
        return Ok(Value::array((**target_item).clone(), items));
    }

    let descriptors = target.descriptors();
    if let Value::Map(record) = &value {
        if accepts_records(&descriptors) {
            return construct_record(target, &descriptors, record);
        }
    }
    if let Some(constructor) = descriptors.constructors.get(&source) {
        return constructor(value);
    }
    if !matches!(value, Value::Map(_)) && accepts_records(&descriptors) {
        if let Some(properties) = source.descriptors().properties.as_ref() {
            let mut fields = BTreeMap::new();
            for (key, prop) in properties {
                fields.insert(key.clone(), (prop.getter)(&value)?);
            }
            return construct(target, Value::Map(MapValue::new(fields)));
        }
    }
    Err(cannot_construct(target, &source))
}

/// Field-by-field construction. Every failing field is reported together in
/// one `ValidationError`.
fn construct_record(
    target: &Class,
    descriptors: &Descriptors,
    record: &MapValue,
) -> SymbolResult<Value> {
    let (Some(properties), Some(record_constructor)) =
        (&descriptors.properties, &descriptors.record_constructor)
    else {
        return Err(cannot_construct(target, &Class::Map(record.class())));
    };

    let mut errors = BTreeMap::new();
    let mut fields = BTreeMap::new();
    let source = record.fields();
    for key in source.keys().filter(|key| !properties.contains_key(*key)) {
        errors.insert(key.clone(), unknown_property(key).to_string());
    }
    for (key, prop) in properties {
        match source.get(key) {
            Some(field) => match construct(&prop.class, field.clone()) {
                Ok(value) => {
                    fields.insert(key.clone(), value);
                }
                Err(err) => {
                    errors.insert(key.clone(), err.to_string());
                }
            },
            None => match &prop.class {
                Class::Nilable(inner) => {
                    fields.insert(
                        key.clone(),
                        Value::Nilable(NilableValue::absent((**inner).clone())),
                    );
                }
                _ => {
                    errors.insert(key.clone(), missing_property(key).to_string());
                }
            },
        }
    }

    if !errors.is_empty() {
        debug!("construction of {} failed: {:?}", target, errors);
        return Err(SymbolError::Application(ErrorValue::validation(errors)));
    }
    record_constructor(fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbols::composite::record_class;
    use pretty_assertions::assert_eq;

    fn user() -> Class {
        record_class(
            "User",
            [
                ("name", Class::String),
                ("age", Class::Integer),
                ("nick", Class::nilable(Class::String)),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_identity_returns_value() {
        let value = Value::Integer(4);
        assert_eq!(construct(&Class::Integer, value.clone()).unwrap(), value);
        assert!(should_construct(&Class::Integer, &Class::Integer).is_ok());
    }

    #[test]
    fn test_elementwise_array() {
        let source = Value::array(
            Class::Integer,
            vec![Value::Integer(1), Value::Integer(2), Value::Integer(3)],
        );
        let target = Class::array(Class::Number);
        assert!(should_construct(&target, &source.class()).is_ok());
        assert_eq!(
            construct(&target, source).unwrap(),
            Value::array(
                Class::Number,
                vec![Value::Number(1.0), Value::Number(2.0), Value::Number(3.0)]
            )
        );
    }

    #[test]
    fn test_nil_into_nilable_is_absent() {
        let target = Class::nilable(Class::Integer);
        assert_eq!(
            construct(&target, Value::Nil).unwrap(),
            Value::Nilable(NilableValue::absent(Class::Integer))
        );
        assert_eq!(
            construct(&target, Value::Float(2.0)).unwrap(),
            Value::Nilable(NilableValue::present(Class::Integer, Value::Integer(2)))
        );
    }

    #[test]
    fn test_absent_source_fails() {
        let absent = Value::Nilable(NilableValue::absent(Class::Integer));
        let err = construct(&Class::Integer, absent).unwrap_err();
        assert_eq!(err.to_string(), "cannot construct Integer from Nil");
    }

    #[test]
    fn test_missing_field_named() {
        let source = Value::map([("name", Value::string("a"))]);
        let err = construct(&user(), source).unwrap_err();
        let thrown = err.thrown().unwrap();
        assert_eq!(thrown.name, "ValidationError");
        assert_eq!(thrown.data.keys().collect::<Vec<_>>(), vec!["age"]);
        assert_eq!(thrown.data["age"], "missing property age");
    }

    #[test]
    fn test_every_failing_field_reported() {
        let source = Value::map([
            ("name", Value::array(Class::Integer, vec![])),
            ("extra", Value::Boolean(true)),
        ]);
        let err = construct(&user(), source).unwrap_err();
        let thrown = err.thrown().unwrap();
        assert_eq!(
            thrown.data.keys().cloned().collect::<Vec<_>>(),
            vec!["age".to_string(), "extra".to_string(), "name".to_string()]
        );
    }

    #[test]
    fn test_nilable_field_defaults_to_absent() {
        let source = Value::map([("name", Value::string("a")), ("age", Value::Integer(3))]);
        let value = construct(&user(), source).unwrap();
        let nick = value
            .class()
            .descriptors()
            .property("nick")
            .map(|prop| (prop.getter)(&value).unwrap())
            .unwrap();
        assert_eq!(nick, Value::Nilable(NilableValue::absent(Class::String)));
    }

    #[test]
    fn test_static_record_check_reports_first_problem() {
        let source = Class::map([("name", Class::String)]);
        let err = should_construct(&user(), &source).unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::MissingProperty));

        let source = Class::map([
            ("name", Class::String),
            ("age", Class::Integer),
            ("extra", Class::Integer),
        ]);
        let err = should_construct(&user(), &source).unwrap_err();
        assert_eq!(err.to_string(), "unknown property extra");
    }

    #[test]
    fn test_partial_relaxes_missing_fields_only() {
        let partial = Class::partial(user());
        assert!(should_construct(&partial, &Class::map([("age", Class::Integer)])).is_ok());
        assert!(should_construct(&partial, &Class::map([("other", Class::Integer)])).is_err());
    }

    #[test]
    fn test_structured_source_retried_as_record() {
        let other = record_class("Person", [("name", Class::String), ("age", Class::Integer)])
            .unwrap();
        let person = construct(
            &other,
            Value::map([("name", Value::string("b")), ("age", Value::Integer(9))]),
        )
        .unwrap();
        assert!(should_construct(&user(), &other).is_ok());
        let value = construct(&user(), person).unwrap();
        assert_eq!(value.class(), user());
        assert_eq!(
            value.to_primitive(),
            serde_json::json!({"name": "b", "age": 9, "nick": null})
        );
    }

    #[test]
    fn test_unrelated_classes() {
        let err = should_construct(&Class::Boolean, &Class::Integer).unwrap_err();
        assert_eq!(err.to_string(), "cannot construct Boolean from Integer");
        assert!(construct(&Class::Boolean, Value::Integer(1)).is_err());
    }
}
