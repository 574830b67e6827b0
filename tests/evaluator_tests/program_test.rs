use std::thread;

use hyperlang::{
    symbols::{Callable, Class, Value},
    AssignmentMember, Error, ErrorCode, Expression, FunctionBlock, Program, PropertyItem, Statement,
    Token, TypeExpression,
};
use pretty_assertions::assert_eq;

use super::{arg, compile, table};

#[test]
fn test_redeclaration_is_rejected() {
    let err = compile(
        vec![],
        None,
        vec![
            Statement::declare("x", Expression::integer(1)),
            Statement::declare("x", Expression::integer(2)),
        ],
    )
    .unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::CannotRedeclareValue));
}

#[test]
fn test_builtins_cannot_be_shadowed() {
    let err = compile(
        vec![],
        None,
        vec![Statement::declare("len", Expression::integer(1))],
    )
    .unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::CannotReassignImmutableValue));
}

#[test]
fn test_concurrent_invocations_are_isolated() {
    // func(n: Int): Int { total := 0; total += n; return total }
    let function = compile(
        vec![arg("n", "Int")],
        Some("Int"),
        vec![
            Statement::declare("total", Expression::integer(0)),
            Statement::assign(
                vec![AssignmentMember::ident("total")],
                Token::AddAssign,
                Expression::ident("n"),
            ),
            Statement::ret(Expression::ident("total")),
        ],
    )
    .unwrap();

    thread::scope(|s| {
        for n in 0..8 {
            let function = &function;
            s.spawn(move || {
                for _ in 0..50 {
                    let result = function.call(vec![Value::Integer(n)]).unwrap();
                    assert_eq!(result, Some(Value::Integer(n)));
                }
            });
        }
    });
}

#[test]
fn test_functions_call_each_other() {
    let double = FunctionBlock::new(
        vec![arg("n", "Int")],
        Some(TypeExpression::named("Int")),
        vec![Statement::ret(Expression::binary(
            Token::Mul,
            Expression::ident("n"),
            Expression::integer(2),
        ))],
    );
    let quad = FunctionBlock::new(
        vec![arg("n", "Int")],
        Some(TypeExpression::named("Int")),
        vec![Statement::ret(Expression::call(
            "double",
            vec![Expression::call("double", vec![Expression::ident("n")])],
        ))],
    );
    let compiled = Program::new()
        .with_function("double", double)
        .with_function("quad", quad)
        .check(&table())
        .unwrap();
    assert_eq!(
        compiled.names().cloned().collect::<Vec<_>>(),
        vec!["double".to_string(), "quad".to_string()]
    );
    assert_eq!(
        compiled.invoke("quad", vec![Value::Integer(3)]).unwrap(),
        Some(Value::Integer(12))
    );
}

#[test]
fn test_package_functions() {
    // func(x: Float): Int { return math.Floor(x) }
    let function = compile(
        vec![arg("x", "Float")],
        Some("Int"),
        vec![Statement::ret(Expression::call(
            "math.Floor",
            vec![Expression::ident("x")],
        ))],
    )
    .unwrap();
    assert_eq!(function.returns(), Some(&Class::Integer));
    assert_eq!(
        function.call(vec![Value::Float(2.7)]).unwrap(),
        Some(Value::Integer(2))
    );
}

#[test]
fn test_package_class_properties_are_settable() {
    // d := units.Dimension{width: 2.0, height: 3.0}; d.width = 4.0; return d.area()
    let function = compile(
        vec![],
        Some("Float"),
        vec![
            Statement::declare(
                "d",
                Expression::instance(
                    "units.Dimension",
                    vec![
                        PropertyItem::property("width", Expression::float(2.0)),
                        PropertyItem::property("height", Expression::float(3.0)),
                    ],
                ),
            ),
            Statement::set("d.width", Expression::float(4.0)),
            Statement::ret(Expression::call("d.area", vec![])),
        ],
    )
    .unwrap();
    assert_eq!(function.call(vec![]).unwrap(), Some(Value::Float(12.0)));
}

#[test]
fn test_mime_type_rejects_unregistered_types() {
    // func(s: String): String { m := mime.MimeType(s); return m.subtype }
    let function = compile(
        vec![arg("s", "String")],
        Some("String"),
        vec![
            Statement::declare(
                "m",
                Expression::call("mime.MimeType", vec![Expression::ident("s")]),
            ),
            Statement::ret(Expression::ident("m.subtype")),
        ],
    )
    .unwrap();
    assert_eq!(
        function.call(vec![Value::String("text/html".to_string())]).unwrap(),
        Some(Value::String("html".to_string()))
    );
    let err = function
        .call(vec![Value::String("text/nope".to_string())])
        .unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::CannotConstruct));
}

#[test]
fn test_thrown_errors_reach_the_caller() {
    let function = compile(
        vec![],
        None,
        vec![Statement::throw(Expression::call(
            "errors.NotFound",
            vec![Expression::string("no such user")],
        ))],
    )
    .unwrap();
    let err = function.call(vec![]).unwrap_err();
    let thrown = err.thrown().unwrap();
    assert_eq!(thrown.name, "NotFound");
    assert_eq!(thrown.message, "no such user");
}

#[test]
fn test_check_reports_every_function() {
    let bad = FunctionBlock::new(
        vec![],
        Some(TypeExpression::named("Int")),
        vec![Statement::ret(Expression::boolean(true))],
    );
    let result = Program::new()
        .with_function("first", bad.clone())
        .with_function("second", bad)
        .check(&table());
    match result {
        Err(Error::Check(errors)) => {
            let names: Vec<&str> = errors.errors.iter().map(|(name, _)| name.as_str()).collect();
            assert_eq!(names, vec!["first", "second"]);
        }
        other => panic!("expected check errors, got {:?}", other.map(|_| ())),
    }
}
