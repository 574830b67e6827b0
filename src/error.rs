use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ast::Position;
use crate::eval::program::CheckErrors;
use crate::symbols::ErrorValue;

/// Identifies the exact nature of an interpreter error.
///
/// Codes are fine-grained enough to drive special handling by callers but
/// never expose evaluator internals. Names starting with "Bad" point at the
/// shape of the syntax tree, names starting with "Invalid" point at classes.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::AsRefStr,
    strum::EnumString,
)]
pub enum ErrorCode {
    InvalidSyntaxTree,
    ExpectedCallbackSignature,

    BadUnaryOperator,
    BadLoopControlStatement,
    InvalidCallExpression,
    InvalidClass,
    InvalidClassConstruction,
    InvalidInstanceableTarget,
    InvalidUnaryOperand,
    InvalidValueExpression,
    InvalidIndex,
    InvalidIndexTarget,
    InvalidAssignmentTarget,
    InvalidIfCondition,
    InvalidWhileCondition,
    InvalidForCondition,
    InvalidSwitchTarget,
    InvalidThrowValue,
    InvalidReturnType,
    InvalidSpreadTarget,
    InvalidArgumentLength,
    InvalidOperator,
    InvalidDestructuredArgument,
    InvalidSecondaryTarget,
    CannotAccessProperty,
    CannotSetProperty,
    CannotEnumerate,
    CannotReassignImmutableValue,
    CannotRedeclareValue,
    CannotConstruct,
    DuplicateDefaultSwitchStatements,
    MissingReturn,
    UnknownSelector,
    UnknownProperty,
    MissingProperty,
    UndefinedOperator,

    // Only raised while resolving
    IndexOutOfRange,
    InvalidRangeIndices,
    CannotUnmarshal,
    DivisionByZero,
    LoopLimitExceeded,
}

/// Errors raised by the class model and both evaluation passes.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SymbolError {
    /// A type, binding or runtime failure detected by the interpreter.
    #[error("{}{message}", position_prefix(.position))]
    Interpreter {
        code: ErrorCode,
        message: String,
        position: Option<Position>,
    },

    /// A first-class `Error` value raised by program logic.
    #[error("{0}")]
    Application(ErrorValue),

    /// A native binding whose shape does not match its declaration.
    #[error("registration failed: {message}")]
    Registration { code: ErrorCode, message: String },
}

fn position_prefix(position: &Option<Position>) -> String {
    match position {
        Some(position) => format!("({}) ", position),
        None => String::new(),
    }
}

pub type SymbolResult<T> = Result<T, SymbolError>;

impl SymbolError {
    pub fn new<S: Into<String>>(code: ErrorCode, message: S) -> Self {
        SymbolError::Interpreter {
            code,
            message: message.into(),
            position: None,
        }
    }

    pub fn at<S: Into<String>>(position: Position, code: ErrorCode, message: S) -> Self {
        SymbolError::Interpreter {
            code,
            message: message.into(),
            position: Some(position),
        }
    }

    pub fn registration<S: Into<String>>(message: S) -> Self {
        SymbolError::Registration {
            code: ErrorCode::ExpectedCallbackSignature,
            message: message.into(),
        }
    }

    pub fn syntax<S: Into<String>>(position: Position, message: S) -> Self {
        Self::at(position, ErrorCode::InvalidSyntaxTree, message)
    }

    /// Attaches a position to an interpreter error that has none yet.
    /// The innermost position wins, application errors pass through.
    pub fn with_position(self, at: Position) -> Self {
        match self {
            SymbolError::Interpreter {
                code,
                message,
                position: None,
            } => SymbolError::Interpreter {
                code,
                message,
                position: Some(at),
            },
            other => other,
        }
    }

    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            SymbolError::Interpreter { code, .. } => Some(*code),
            SymbolError::Registration { code, .. } => Some(*code),
            SymbolError::Application(_) => None,
        }
    }

    pub fn message(&self) -> String {
        match self {
            SymbolError::Interpreter { message, .. } => message.clone(),
            SymbolError::Registration { message, .. } => message.clone(),
            SymbolError::Application(value) => value.message.clone(),
        }
    }

    /// The thrown value when this error is an application error.
    pub fn thrown(&self) -> Option<&ErrorValue> {
        match self {
            SymbolError::Application(value) => Some(value),
            _ => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Symbol error: {0}")]
    Symbol(#[from] SymbolError),
    #[error("Check error: {0}")]
    Check(#[from] CheckErrors),
    #[error("Marshal error: {0}")]
    Marshal(#[from] serde_json::Error),
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type InternalResult<T> = Result<T, Error>;

impl Error {
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Error::Internal(message.into())
    }
}
