//! Function blocks: checked once, then bound into reusable callables.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, debug_span};

use super::scope::SymbolTable;
use crate::ast::{ArgumentNode, FunctionBlock, FunctionParameters, Node, Position};
use crate::error::{ErrorCode, SymbolError, SymbolResult};
use crate::symbols::{construct, Class, Function, NativeFn, ScopeValue, Value};

/// One positional parameter of a function.
#[derive(Debug, Clone)]
enum Parameter {
    Named {
        key: String,
        class: Class,
        pos: Position,
    },
    /// `{a: A, b: B}`: a record argument whose fields become locals.
    Destructured {
        fields: BTreeMap<String, Class>,
        class: Class,
        pos: Position,
    },
}

impl Parameter {
    fn class(&self) -> &Class {
        match self {
            Parameter::Named { class, .. } | Parameter::Destructured { class, .. } => class,
        }
    }

    /// Declares placeholders for the static pass.
    fn declare_expected(&self, scope: &mut SymbolTable) -> SymbolResult<()> {
        match self {
            Parameter::Named { key, class, pos } => {
                scope.declare(key, ScopeValue::Expected(class.clone()), *pos)
            }
            Parameter::Destructured { fields, pos, .. } => {
                for (key, class) in fields {
                    scope.declare(key, ScopeValue::Expected(class.clone()), *pos)?;
                }
                Ok(())
            }
        }
    }

    /// Binds an argument value for one invocation.
    fn bind(&self, scope: &mut SymbolTable, value: Value) -> SymbolResult<()> {
        let value = construct(self.class(), value)?;
        match self {
            Parameter::Named { key, pos, .. } => scope.declare(key, ScopeValue::Value(value), *pos),
            Parameter::Destructured { fields, pos, .. } => {
                let record = match value {
                    Value::Map(record) => record,
                    other => {
                        return Err(SymbolError::at(
                            *pos,
                            ErrorCode::InvalidDestructuredArgument,
                            format!("cannot destructure {}", other.class()),
                        ))
                    }
                };
                for key in fields.keys() {
                    let field = record.get(key).ok_or_else(|| {
                        SymbolError::at(
                            *pos,
                            ErrorCode::UnknownProperty,
                            format!("argument has no property {}", key),
                        )
                    })?;
                    scope.declare(key, ScopeValue::Value(field), *pos)?;
                }
                Ok(())
            }
        }
    }
}

impl SymbolTable {
    fn parameters(&self, parameters: &FunctionParameters) -> SymbolResult<Vec<Parameter>> {
        parameters
            .arguments
            .items
            .iter()
            .map(|node| match node {
                ArgumentNode::Item(item) => Ok(Parameter::Named {
                    key: item.key.clone(),
                    class: self.type_expression(&item.init)?,
                    pos: item.pos,
                }),
                ArgumentNode::Object(object) => {
                    let fields = object
                        .items
                        .iter()
                        .map(|item| Ok((item.key.clone(), self.type_expression(&item.init)?)))
                        .collect::<SymbolResult<BTreeMap<_, _>>>()?;
                    Ok(Parameter::Destructured {
                        class: Class::map(fields.clone()),
                        fields,
                        pos: object.pos,
                    })
                }
            })
            .collect()
    }

    /// Argument classes and return class declared by a function block.
    pub fn signature(&self, node: &FunctionBlock) -> SymbolResult<(Vec<Class>, Option<Class>)> {
        let arguments = self
            .parameters(&node.parameters)?
            .iter()
            .map(|parameter| parameter.class().clone())
            .collect();
        let returns = match &node.parameters.return_type {
            Some(return_type) => Some(self.type_expression(return_type)?),
            None => None,
        };
        Ok((arguments, returns))
    }

    /// Checks a function block with the static pass and binds it over this
    /// scope. Every invocation runs in its own copy of the captured scope.
    pub fn resolve_function_block(&self, node: &FunctionBlock) -> SymbolResult<Function> {
        node.validate()?;
        let captured = self.function_scope();
        let parameters = captured.parameters(&node.parameters)?;
        let returns = match &node.parameters.return_type {
            Some(return_type) => Some(captured.type_expression(return_type)?),
            None => None,
        };

        let mut definition = captured.clone();
        for parameter in &parameters {
            parameter.declare_expected(&mut definition)?;
        }
        let always_returns = definition.evaluate_block(&node.body, returns.as_ref())?;
        if returns.is_some() && !always_returns {
            return Err(SymbolError::at(node.pos, ErrorCode::MissingReturn, "missing return"));
        }

        let arguments = parameters.iter().map(|p| p.class().clone()).collect();
        let body = Arc::new(node.body.clone());
        let pos = node.pos;
        let handler: NativeFn = Arc::new(move |values: Vec<Value>| {
            let span = debug_span!("invoke", at = %pos);
            let _guard = span.enter();
            let mut scope = captured.clone();
            for (parameter, value) in parameters.iter().zip(values) {
                parameter.bind(&mut scope, value)?;
            }
            let result = scope.resolve_block(&body);
            if let Err(err) = &result {
                debug!("function failed: {}", err);
            }
            result
        });
        Ok(Function::from_parts(arguments, returns, handler))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{
        ArgumentItem, ArgumentObject, Block, Expression, Statement, Token, TypeExpression,
    };
    use crate::config::EvaluatorConfig;
    use crate::symbols::Callable;

    fn table() -> SymbolTable {
        SymbolTable::with_builtins(&EvaluatorConfig::default())
    }

    fn arg(key: &str, class: &str) -> ArgumentNode {
        ArgumentNode::Item(ArgumentItem::new(key, TypeExpression::named(class)))
    }

    #[test]
    fn test_function_round_trip() {
        // func(a: Int, b: Int): Int { return a * b }
        let block = FunctionBlock::new(
            vec![arg("a", "Int"), arg("b", "Int")],
            Some(TypeExpression::named("Int")),
            vec![Statement::ret(Expression::binary(
                Token::Mul,
                Expression::ident("a"),
                Expression::ident("b"),
            ))],
        );
        let function = table().resolve_function_block(&block).unwrap();
        assert_eq!(function.arguments(), &[Class::Integer, Class::Integer]);
        let result = function
            .call(vec![Value::Integer(6), Value::Integer(7)])
            .unwrap();
        assert_eq!(result, Some(Value::Integer(42)));
    }

    #[test]
    fn test_missing_return() {
        let block = FunctionBlock::new(
            vec![arg("flag", "Bool")],
            Some(TypeExpression::named("Int")),
            vec![Statement::if_else(
                Expression::ident("flag"),
                Block::new(vec![Statement::ret(Expression::integer(1))]),
                None,
            )],
        );
        let err = table().resolve_function_block(&block).unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::MissingReturn));
    }

    #[test]
    fn test_arguments_are_constructed() {
        let block = FunctionBlock::new(
            vec![arg("n", "Int")],
            Some(TypeExpression::named("Int")),
            vec![Statement::ret(Expression::ident("n"))],
        );
        let function = table().resolve_function_block(&block).unwrap();
        let result = function.call(vec![Value::Float(2.5)]).unwrap();
        assert_eq!(result, Some(Value::Integer(2)));
    }

    #[test]
    fn test_returns_are_constructed() {
        // func(): Float { return 1 }
        let block = FunctionBlock::new(
            vec![],
            Some(TypeExpression::named("Float")),
            vec![Statement::ret(Expression::integer(1))],
        );
        let function = table().resolve_function_block(&block).unwrap();
        assert_eq!(function.call(vec![]).unwrap(), Some(Value::Float(1.0)));

        // func(): Int { return true }
        let block = FunctionBlock::new(
            vec![],
            Some(TypeExpression::named("Int")),
            vec![Statement::ret(Expression::boolean(true))],
        );
        let err = table().resolve_function_block(&block).unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::InvalidReturnType));
    }

    #[test]
    fn test_destructured_argument() {
        let block = FunctionBlock::new(
            vec![ArgumentNode::Object(ArgumentObject {
                pos: Position::default(),
                items: vec![
                    ArgumentItem::new("x", TypeExpression::named("Int")),
                    ArgumentItem::new("y", TypeExpression::named("Int")),
                ],
            })],
            Some(TypeExpression::named("Int")),
            vec![Statement::ret(Expression::binary(
                Token::Add,
                Expression::ident("x"),
                Expression::ident("y"),
            ))],
        );
        let function = table().resolve_function_block(&block).unwrap();
        let point = Value::map([("x", Value::Integer(1)), ("y", Value::Integer(2))]);
        assert_eq!(function.call(vec![point]).unwrap(), Some(Value::Integer(3)));

        let err = function.call(vec![Value::Integer(1)]).unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::CannotConstruct));
    }

    #[test]
    fn test_effect_only_function_cannot_return() {
        let block = FunctionBlock::new(vec![], None, vec![Statement::ret(Expression::integer(1))]);
        let err = table().resolve_function_block(&block).unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::InvalidReturnType));
    }

    #[test]
    fn test_loop_control_does_not_cross_function_boundary() {
        let block = FunctionBlock::new(vec![], None, vec![Statement::Continue(Position::new(2, 3))]);
        let scope = table().start_loop();
        let err = scope.resolve_function_block(&block).unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::BadLoopControlStatement));
    }

    #[test]
    fn test_invocations_do_not_share_locals() {
        // func(n: Int): Int { total := 0; total += n; return total }
        let block = FunctionBlock::new(
            vec![arg("n", "Int")],
            Some(TypeExpression::named("Int")),
            vec![
                Statement::declare("total", Expression::integer(0)),
                Statement::assign(
                    vec![crate::ast::AssignmentMember::ident("total")],
                    Token::AddAssign,
                    Expression::ident("n"),
                ),
                Statement::ret(Expression::ident("total")),
            ],
        );
        let function = table().resolve_function_block(&block).unwrap();
        for n in 1..4 {
            assert_eq!(
                function.call(vec![Value::Integer(n)]).unwrap(),
                Some(Value::Integer(n))
            );
        }
    }
}
