use hyperlang::{
    symbols::{Class, Value},
    Expression, Token,
};
use proptest::prelude::*;

use super::table;

fn literal() -> impl Strategy<Value = Expression> {
    prop_oneof![
        (-1000i64..1000).prop_map(Expression::integer),
        (-1000.0f64..1000.0).prop_map(Expression::float),
    ]
}

fn arithmetic() -> impl Strategy<Value = Expression> {
    literal().prop_recursive(4, 32, 2, |inner| {
        (
            prop_oneof![Just(Token::Add), Just(Token::Sub), Just(Token::Mul)],
            inner.clone(),
            inner,
        )
            .prop_map(|(token, left, right)| Expression::binary(token, left, right))
    })
}

fn class() -> impl Strategy<Value = Class> {
    let leaf = prop_oneof![
        Just(Class::String),
        Just(Class::Integer),
        Just(Class::Float),
        Just(Class::Boolean),
    ];
    leaf.prop_recursive(3, 16, 3, |inner| {
        prop_oneof![
            inner.clone().prop_map(Class::array),
            inner.clone().prop_map(Class::nilable),
            prop::collection::btree_map("[a-z]{1,4}", inner, 1..3).prop_map(Class::map),
        ]
    })
}

proptest! {
    #[test]
    fn test_evaluate_and_resolve_agree(expr in arithmetic()) {
        let scope = table();
        let class = scope.evaluate_expression(&expr).unwrap();
        let value = scope.resolve_expression(&expr).unwrap();
        prop_assert_eq!(value.class(), class);
    }

    #[test]
    fn test_independently_built_classes_are_equal(class in class()) {
        let rebuilt = match &class {
            Class::Array(item) => Class::array((**item).clone()),
            Class::Nilable(inner) => Class::nilable((**inner).clone()),
            Class::Map(map) => Class::map(map.properties.clone()),
            other => other.clone(),
        };
        prop_assert_eq!(&rebuilt, &class);
        prop_assert_eq!(rebuilt.descriptors().shape(), class.descriptors().shape());
    }

    #[test]
    fn test_integer_values_survive_construction(n in any::<i64>()) {
        let value = hyperlang::symbols::construct(&Class::Integer, Value::Integer(n)).unwrap();
        prop_assert_eq!(value, Value::Integer(n));
    }
}
