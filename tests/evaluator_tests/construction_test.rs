use hyperlang::{
    symbols::{construct, record_class, should_construct, Class, NilableValue, Value},
    ErrorCode,
};
use pretty_assertions::assert_eq;

#[test]
fn test_identity_construction() {
    for value in [
        Value::Integer(7),
        Value::string("seven"),
        Value::Boolean(true),
        Value::Float(7.5),
    ] {
        let class = value.class();
        assert!(should_construct(&class, &class).is_ok());
        assert_eq!(construct(&class, value.clone()).unwrap(), value);
    }
}

#[test]
fn test_nilable_defaults_to_absent() {
    let class = Class::nilable(Class::Integer);
    assert!(should_construct(&class, &Class::Nil).is_ok());
    assert_eq!(
        construct(&class, Value::Nil).unwrap(),
        Value::Nilable(NilableValue::absent(Class::Integer))
    );
    assert_eq!(
        construct(&class, Value::Float(2.9)).unwrap(),
        Value::Nilable(NilableValue::present(Class::Integer, Value::Integer(2)))
    );
}

#[test]
fn test_array_converts_elementwise() {
    let ints = Value::array(Class::Integer, vec![Value::Integer(1), Value::Integer(2)]);
    let target = Class::array(Class::Float);
    assert!(should_construct(&target, &ints.class()).is_ok());
    assert_eq!(
        construct(&target, ints).unwrap(),
        Value::array(Class::Float, vec![Value::Float(1.0), Value::Float(2.0)])
    );
}

#[test]
fn test_static_and_dynamic_construction_agree() {
    let ints = Value::array(Class::Integer, vec![Value::Integer(1)]);
    let target = Class::array(Class::DateTime);
    let static_err = should_construct(&target, &ints.class()).unwrap_err();
    let dynamic_err = construct(&target, ints).unwrap_err();
    assert_eq!(static_err.code(), Some(ErrorCode::CannotConstruct));
    assert_eq!(dynamic_err.code(), Some(ErrorCode::CannotConstruct));
}

#[test]
fn test_record_validation_reports_every_field() {
    let point = record_class("Point", [("x", Class::Integer), ("y", Class::Integer)]).unwrap();
    let record = Value::map([("x", Value::string("left")), ("z", Value::Integer(1))]);
    let err = construct(&point, record).unwrap_err();
    let thrown = err.thrown().unwrap();
    assert_eq!(thrown.name, "ValidationError");
    assert_eq!(thrown.data.keys().collect::<Vec<_>>(), vec!["x", "y", "z"]);
}

#[test]
fn test_record_construction() {
    let point = record_class("Point", [("x", Class::Integer), ("y", Class::Integer)]).unwrap();
    let record = Value::map([("x", Value::Integer(1)), ("y", Value::Float(2.0))]);
    let value = construct(&point, record).unwrap();
    assert_eq!(value.class(), point);
    assert_eq!(
        value.payload(),
        &Value::map([("x", Value::Integer(1)), ("y", Value::Integer(2))])
    );
}

#[test]
fn test_classes_compare_structurally() {
    let a = Class::map([("name", Class::String), ("tags", Class::array(Class::String))]);
    let b = Class::map([("tags", Class::array(Class::String)), ("name", Class::String)]);
    assert_eq!(a, b);
    assert_ne!(a, Class::map([("name", Class::String)]));

    let first = record_class("User", [("name", Class::String)]).unwrap();
    let second = record_class("User", [("name", Class::String)]).unwrap();
    assert_eq!(first, second);
    let renamed = record_class("Account", [("name", Class::String)]).unwrap();
    assert_ne!(first, renamed);
}
