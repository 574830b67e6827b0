use hyperlang::{
    marshal::{construct_from_bytes, from_bytes, to_bytes},
    symbols::{record_class, Class, Value},
};
use pretty_assertions::assert_eq;

#[test]
fn test_payload_materializes_into_record() {
    let order = record_class(
        "Order",
        [
            ("id", Class::String),
            ("quantity", Class::Integer),
            ("notes", Class::nilable(Class::String)),
            ("lines", Class::array(Class::Float)),
        ],
    )
    .unwrap();
    let value =
        construct_from_bytes(&order, br#"{"id": "a1", "quantity": 2, "lines": [1, 2]}"#).unwrap();
    assert_eq!(value.class(), order);
    assert_eq!(
        String::from_utf8(to_bytes(&value).unwrap()).unwrap(),
        r#"{"id":"a1","lines":[1.0,2.0],"notes":null,"quantity":2}"#
    );
}

#[test]
fn test_structural_round_trip() {
    let payload = br#"{"flag":true,"name":"x","nested":{"n":1},"nothing":null}"#;
    let value = from_bytes(payload).unwrap();
    assert_eq!(
        value.class(),
        Class::map([
            ("flag", Class::Boolean),
            ("name", Class::String),
            ("nested", Class::map([("n", Class::Integer)])),
            ("nothing", Class::Nil),
        ])
    );
    assert_eq!(to_bytes(&value).unwrap(), payload.to_vec());
    if let Value::Map(map) = value {
        assert_eq!(map.get("nothing"), Some(Value::Nil));
    } else {
        panic!("expected a record");
    }
}
