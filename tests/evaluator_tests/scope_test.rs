use std::sync::Arc;

use hyperlang::{
    config::EvaluatorConfig,
    symbols::{Class, MockObject, Package, ScopeValue, Value},
    Block, ErrorCode, Expression, FunctionBlock, Statement, SymbolTable, Token, TypeExpression,
};
use pretty_assertions::assert_eq;

use super::compile;

fn mock_root() -> MockObject {
    let mut root = MockObject::new();
    root.expect_get().returning(|key| match key {
        "limit" => Ok(Some(ScopeValue::Value(Value::Integer(10)))),
        "env" => Ok(Some(ScopeValue::Object(Arc::new(
            Package::new("env").with("region", Value::string("eu")),
        )))),
        _ => Ok(None),
    });
    root
}

#[test]
fn test_root_object_lookup() {
    let table = SymbolTable::new(Some(Arc::new(mock_root())));
    let sum = Expression::binary(Token::Add, Expression::ident("limit"), Expression::integer(1));
    assert_eq!(table.evaluate_expression(&sum).unwrap(), Class::Integer);
    assert_eq!(table.resolve_expression(&sum).unwrap(), Value::Integer(11));
    assert_eq!(
        table.resolve_expression(&Expression::ident("env.region")).unwrap(),
        Value::string("eu")
    );

    let err = table
        .resolve_expression(&Expression::ident("missing"))
        .unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::UnknownSelector));
    let err = table
        .evaluate_expression(&Expression::ident("env.zone"))
        .unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::UnknownProperty));
}

#[test]
fn test_bindings_shadow_root() {
    let mut table = SymbolTable::new(Some(Arc::new(mock_root())));
    table.bind("limit", ScopeValue::Value(Value::Integer(1)));
    assert_eq!(
        table.resolve_expression(&Expression::ident("limit")).unwrap(),
        Value::Integer(1)
    );
}

#[test]
fn test_loop_limit_from_config() {
    let config = EvaluatorConfig {
        max_loop_iterations: Some(5),
        ..Default::default()
    };
    let block = FunctionBlock::new(
        vec![],
        None,
        vec![Statement::while_loop(
            Expression::boolean(true),
            Block::new(vec![]),
        )],
    );
    let function = SymbolTable::with_builtins(&config)
        .resolve_function_block(&block)
        .unwrap();
    let err = function.invoke(vec![]).unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::LoopLimitExceeded));
}

#[test]
fn test_range_variable_cannot_shadow_builtin() {
    // xs := [Int]{1, 2}; for i, len in xs {}
    let err = compile(
        vec![],
        None,
        vec![
            Statement::declare(
                "xs",
                Expression::array(
                    TypeExpression::named("Int"),
                    vec![Expression::integer(1), Expression::integer(2)],
                ),
            ),
            Statement::for_range("i", "len", Expression::ident("xs"), Block::new(vec![])),
        ],
    )
    .unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::CannotReassignImmutableValue));
}

#[test]
fn test_nested_block_cannot_redeclare_outer_local() {
    // x := 1; if true { x := 2 }
    let err = compile(
        vec![],
        None,
        vec![
            Statement::declare("x", Expression::integer(1)),
            Statement::if_else(
                Expression::boolean(true),
                Block::new(vec![Statement::declare("x", Expression::integer(2))]),
                None,
            ),
        ],
    )
    .unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::CannotRedeclareValue));
}

#[test]
fn test_len_of_non_enumerable_fails_check() {
    let err = compile(
        vec![],
        Some("Int"),
        vec![Statement::ret(Expression::call(
            "len",
            vec![Expression::integer(5)],
        ))],
    )
    .unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::CannotEnumerate));
}
