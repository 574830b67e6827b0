//! Operator and comparator dispatch.
//!
//! Only the left operand's class is consulted, keyed by the right operand's
//! class and the token. There is no operand-order normalization: `a + b`
//! being defined says nothing about `b + a`.

use super::class::Class;
use super::construct::construct;
use super::value::Value;
use crate::ast::Token;
use crate::error::{ErrorCode, SymbolError, SymbolResult};

fn undefined(token: Token, left: &Class, right: &Class) -> SymbolError {
    SymbolError::new(
        ErrorCode::UndefinedOperator,
        format!("operator {} is not defined for {} and {}", token, left, right),
    )
}

fn not_operator(token: Token) -> SymbolError {
    SymbolError::new(
        ErrorCode::InvalidOperator,
        format!("{} is not a binary operator", token),
    )
}

/// Checks an arithmetic operator and returns the class of its result, which
/// is always the left operand's class.
pub fn should_operate(token: Token, left: &Class, right: &Class) -> SymbolResult<Class> {
    if !token.is_operator() {
        return Err(not_operator(token));
    }
    match left.descriptors().operator(right, token) {
        Some(_) => Ok(left.clone()),
        None => Err(undefined(token, left, right)),
    }
}

/// Applies an arithmetic operator. The handler's result is constructed back
/// into the left operand's class.
pub fn operate(token: Token, left: Value, right: Value) -> SymbolResult<Value> {
    if !token.is_operator() {
        return Err(not_operator(token));
    }
    let (left_class, right_class) = (left.class(), right.class());
    let descriptors = left_class.descriptors();
    let handler = descriptors
        .operator(&right_class, token)
        .ok_or_else(|| undefined(token, &left_class, &right_class))?;
    let result = handler(left, right)?;
    construct(&left_class, result)
}

pub fn should_compare(token: Token, left: &Class, right: &Class) -> SymbolResult<()> {
    if !token.is_comparator() {
        return Err(not_operator(token));
    }
    match left.descriptors().comparator(right, token) {
        Some(_) => Ok(()),
        None => Err(undefined(token, left, right)),
    }
}

pub fn compare(token: Token, left: Value, right: Value) -> SymbolResult<bool> {
    if !token.is_comparator() {
        return Err(not_operator(token));
    }
    let (left_class, right_class) = (left.class(), right.class());
    let descriptors = left_class.descriptors();
    let handler = descriptors
        .comparator(&right_class, token)
        .ok_or_else(|| undefined(token, &left_class, &right_class))?;
    handler(left, right)
}
