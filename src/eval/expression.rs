//! Expression walker shared by both passes.

use std::collections::BTreeMap;

use super::mode::{Evaluate, Member, Mode, Resolve};
use super::scope::SymbolTable;
use crate::ast::{
    Expression, IndexExpression, InstanceExpression, LiteralValue, MemberInit, Node,
    PropertyItem, PropertyList, TemplatePart, Token, ValueExpression, ValueMember,
};
use crate::error::{ErrorCode, SymbolError, SymbolResult};
use crate::symbols::{Class, ScopeValue, Value};

fn literal(value: &LiteralValue) -> Value {
    match value {
        LiteralValue::String(s) => Value::String(s.clone()),
        LiteralValue::Integer(n) => Value::Integer(*n),
        LiteralValue::Float(n) => Value::Float(*n),
        LiteralValue::Boolean(b) => Value::Boolean(*b),
        LiteralValue::Nil => Value::Nil,
    }
}

fn not_an_identifier() -> SymbolError {
    SymbolError::new(
        ErrorCode::InvalidSyntaxTree,
        "value expression must start with an identifier",
    )
}

fn not_a_value<T>(path: &str, member: &Member<T>) -> SymbolError {
    SymbolError::new(
        ErrorCode::InvalidValueExpression,
        format!("{} is a {}, not a value", path, member.kind()),
    )
}

impl SymbolTable {
    /// The class an expression produces, without running it.
    pub fn evaluate_expression(&self, expr: &Expression) -> SymbolResult<Class> {
        self.expression::<Evaluate>(expr)
    }

    /// The value an expression produces.
    pub fn resolve_expression(&self, expr: &Expression) -> SymbolResult<Value> {
        self.expression::<Resolve>(expr)
    }

    pub fn expression<M: Mode>(&self, expr: &Expression) -> SymbolResult<M::Item> {
        self.walk::<M>(expr).map_err(|err| err.with_position(expr.pos()))
    }

    fn walk<M: Mode>(&self, expr: &Expression) -> SymbolResult<M::Item> {
        match expr {
            Expression::Literal(node) => Ok(M::literal(literal(&node.value))),
            Expression::Template(node) => {
                let parts = node
                    .parts
                    .iter()
                    .map(|part| match part {
                        TemplatePart::Text(text) => Ok(M::literal(Value::String(text.clone()))),
                        TemplatePart::Expression(expr) => self.expression::<M>(expr),
                    })
                    .collect::<SymbolResult<Vec<_>>>()?;
                M::concat(parts)
            }
            Expression::Array(node) => {
                let item = self.type_expression(&node.init)?;
                let elements = node
                    .elements
                    .iter()
                    .map(|element| self.expression::<M>(element))
                    .collect::<SymbolResult<Vec<_>>>()?;
                M::array(&item, elements)
            }
            Expression::Instance(node) => self.instance::<M>(node),
            Expression::Unary(node) => {
                let operand = self.expression::<M>(&node.init)?;
                match node.operator {
                    Token::Not => M::not(operand),
                    Token::Add | Token::Sub => M::signed(node.operator, operand),
                    other => Err(SymbolError::new(
                        ErrorCode::BadUnaryOperator,
                        format!("{} is not a unary operator", other),
                    )),
                }
            }
            Expression::Binary(node) => {
                let left = self.expression::<M>(&node.left)?;
                let right = self.expression::<M>(&node.right)?;
                if node.operator.is_comparator() {
                    M::compare(node.operator, left, right)
                } else if node.operator.is_operator() {
                    M::operate(node.operator, left, right)
                } else {
                    Err(SymbolError::new(
                        ErrorCode::InvalidOperator,
                        format!("{} is not a binary operator", node.operator),
                    ))
                }
            }
            Expression::Object(node) => Ok(M::record(self.properties::<M>(&node.properties)?)),
            Expression::Value(node) => self.value_expression::<M>(node),
        }
    }

    /// Record fields in source order. A later key overrides an earlier one,
    /// spread fields included.
    fn properties<M: Mode>(
        &self,
        properties: &PropertyList,
    ) -> SymbolResult<BTreeMap<String, M::Item>> {
        let mut fields = BTreeMap::new();
        for item in properties {
            match item {
                PropertyItem::Property(prop) => {
                    let value = self.expression::<M>(&prop.init)?;
                    fields.insert(prop.key.clone(), value);
                }
                PropertyItem::Spread(spread) => {
                    let source = self.expression::<M>(&spread.init)?;
                    let spread_fields =
                        M::spread(source).map_err(|err| err.with_position(spread.pos))?;
                    fields.extend(spread_fields);
                }
            }
        }
        Ok(fields)
    }

    fn instance<M: Mode>(&self, node: &InstanceExpression) -> SymbolResult<M::Item> {
        let class = match self.resolve_selector(&node.selector)? {
            ScopeValue::Class(class) => class,
            other => {
                return Err(SymbolError::at(
                    node.selector.pos,
                    ErrorCode::InvalidInstanceableTarget,
                    format!("cannot instantiate {} {}", other.kind(), node.selector.path()),
                ))
            }
        };
        let record = M::record(self.properties::<M>(&node.properties)?);
        M::construct(&class, record)
    }

    fn value_expression<M: Mode>(&self, node: &ValueExpression) -> SymbolResult<M::Item> {
        let (path, member) = self.members::<M>(&node.members)?;
        match member {
            Member::Item(item) => Ok(item),
            other => Err(not_a_value(&path, &other)),
        }
    }

    /// Walks a member chain, returning its printable path and what it ends in.
    pub(crate) fn members<M: Mode>(
        &self,
        members: &[ValueMember],
    ) -> SymbolResult<(String, Member<M::Item>)> {
        let (first, name, rest) = match members.split_first() {
            Some((first, rest)) => match &first.init {
                MemberInit::Identifier(name) => (first, name, rest),
                _ => return Err(not_an_identifier()),
            },
            None => return Err(not_an_identifier()),
        };
        let bound = self.get(name)?.ok_or_else(|| {
            SymbolError::at(
                first.pos,
                ErrorCode::UnknownSelector,
                format!("unknown selector {}", name),
            )
        })?;
        let mut current = M::from_scope(bound).map_err(|err| err.with_position(first.pos))?;
        let mut path = name.clone();
        for member in rest {
            current = self
                .member::<M>(current, member, &path)
                .map_err(|err| err.with_position(member.pos))?;
            match &member.init {
                MemberInit::Identifier(key) => {
                    path.push('.');
                    path.push_str(key);
                }
                MemberInit::Call(_) => path.push_str("()"),
                MemberInit::Index(_) => path.push_str("[]"),
            }
        }
        Ok((path, current))
    }

    fn member<M: Mode>(
        &self,
        current: Member<M::Item>,
        member: &ValueMember,
        path: &str,
    ) -> SymbolResult<Member<M::Item>> {
        match &member.init {
            MemberInit::Identifier(key) => match current {
                Member::Item(item) => M::property(item, key),
                Member::Object(object) => match object.get(key)? {
                    Some(found) => M::from_scope(found),
                    None => Err(SymbolError::new(
                        ErrorCode::UnknownProperty,
                        format!("{} has no member {}", path, key),
                    )),
                },
                Member::Class(_) => Err(SymbolError::new(
                    ErrorCode::UnknownProperty,
                    format!("{} has no member {}", path, key),
                )),
                Member::Callable(_) => Err(SymbolError::new(
                    ErrorCode::CannotAccessProperty,
                    format!("cannot access property {} on callable {}", key, path),
                )),
            },
            MemberInit::Call(call) => {
                let arguments = call
                    .arguments
                    .iter()
                    .map(|argument| self.expression::<M>(argument))
                    .collect::<SymbolResult<Vec<_>>>()?;
                match current {
                    Member::Class(class) => {
                        let mut arguments = arguments.into_iter();
                        match (arguments.next(), arguments.next()) {
                            (Some(argument), None) => M::construct(&class, argument).map(Member::Item),
                            _ => Err(SymbolError::new(
                                ErrorCode::InvalidClassConstruction,
                                format!("construction of {} takes exactly one argument", class),
                            )),
                        }
                    }
                    Member::Callable(callable) => {
                        let expected = callable.arguments().len();
                        if arguments.len() != expected {
                            return Err(SymbolError::new(
                                ErrorCode::InvalidArgumentLength,
                                format!(
                                    "expected {} arguments, got {}",
                                    expected,
                                    arguments.len()
                                ),
                            ));
                        }
                        M::call(callable.as_ref(), arguments).map(Member::Item)
                    }
                    other => Err(SymbolError::new(
                        ErrorCode::InvalidCallExpression,
                        format!("{} is a {}, not callable", path, other.kind()),
                    )),
                }
            }
            MemberInit::Index(index) => match current {
                Member::Item(item) => self.index::<M>(item, index).map(Member::Item),
                other => Err(SymbolError::new(
                    ErrorCode::InvalidIndexTarget,
                    format!("cannot index {} {}", other.kind(), path),
                )),
            },
        }
    }

    pub(super) fn index_operand<M: Mode>(&self, expr: &Expression) -> SymbolResult<M::Item> {
        let index = self.expression::<M>(expr)?;
        let class = M::class_of(&index);
        if class != Class::Integer {
            return Err(SymbolError::at(
                expr.pos(),
                ErrorCode::InvalidIndex,
                format!("index must be Integer, got {}", class),
            ));
        }
        Ok(index)
    }

    fn index<M: Mode>(&self, item: M::Item, node: &IndexExpression) -> SymbolResult<M::Item> {
        let class = M::class_of(&item);
        let descriptors = class.descriptors();
        let enumerable = descriptors.enumerable.as_ref().ok_or_else(|| {
            SymbolError::new(
                ErrorCode::InvalidIndexTarget,
                format!("{} cannot be indexed", class),
            )
        })?;
        let left = match &node.left {
            Some(left) => Some(self.index_operand::<M>(left)?),
            None => None,
        };
        if node.is_range {
            let right = match &node.right {
                Some(right) => Some(self.index_operand::<M>(right)?),
                None => None,
            };
            return M::range(item, enumerable, left, right);
        }
        let index = left.ok_or_else(|| {
            SymbolError::new(ErrorCode::InvalidSyntaxTree, "index expression has no index")
        })?;
        M::index(item, enumerable, index)
    }
}
