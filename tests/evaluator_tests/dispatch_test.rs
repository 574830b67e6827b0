use hyperlang::{
    stdlib,
    symbols::{compare, operate, should_compare, should_operate, Class, Value},
    ErrorCode, Token,
};
use pretty_assertions::assert_eq;

fn second() -> Value {
    Value::instance(&stdlib::duration().unwrap(), Value::Integer(1_000_000)).unwrap()
}

#[test]
fn test_result_takes_left_operand_class() {
    let left = operate(Token::Add, Value::Integer(1), Value::Float(2.5)).unwrap();
    assert_eq!(left, Value::Integer(3));
    let right = operate(Token::Add, Value::Float(2.5), Value::Integer(1)).unwrap();
    assert_eq!(right, Value::Float(3.5));
    assert_eq!(
        should_operate(Token::Add, &Class::Integer, &Class::Float).unwrap(),
        Class::Integer
    );
}

#[test]
fn test_operators_are_not_commutative() {
    let duration = stdlib::duration().unwrap();
    assert!(should_operate(Token::Add, &duration, &Class::Integer).is_ok());
    let err = should_operate(Token::Add, &Class::Integer, &duration).unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::UndefinedOperator));

    let later = operate(Token::Add, second(), Value::Integer(5)).unwrap();
    assert_eq!(later.payload(), &Value::Integer(1_000_005));
    let err = operate(Token::Add, Value::Integer(5), second()).unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::UndefinedOperator));
}

#[test]
fn test_string_operators() {
    let joined = operate(Token::Add, Value::string("ab"), Value::string("cd")).unwrap();
    assert_eq!(joined, Value::string("abcd"));
    assert!(compare(Token::Equals, Value::string("a"), Value::string("a")).unwrap());
    let err = should_compare(Token::Less, &Class::String, &Class::String).unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::UndefinedOperator));
}

#[test]
fn test_comparators_are_not_operators() {
    let err = should_operate(Token::Equals, &Class::Integer, &Class::Integer).unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::InvalidOperator));
    let err = compare(Token::Add, Value::Integer(1), Value::Integer(1)).unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::InvalidOperator));
}

#[test]
fn test_division_by_zero() {
    let err = operate(Token::Quo, Value::Integer(1), Value::Integer(0)).unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::DivisionByZero));
}
