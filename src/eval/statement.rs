//! Statement handlers.
//!
//! Control flow differs between the passes, so statements have two handlers.
//! The static handlers return whether a statement always returns, the dynamic
//! ones return the value of a `return` that ended the walk.

use std::sync::Arc;

use tracing::debug;

use super::mode::{Evaluate, Resolve};
use super::scope::{LoopState, SymbolTable};
use crate::ast::{
    Alternate, AssignmentMember, AssignmentMemberInit, AssignmentStatement, Block,
    DeclarationStatement, Expression, ForCondition, ForStatement, ForUpdate, IfStatement,
    IndexExpression, Initializer, LoopCondition, Node, Position, RangeCondition, Statement,
    SwitchBlock, Token, WhileStatement,
};
use crate::error::{ErrorCode, SymbolError, SymbolResult};
use crate::symbols::{
    compare, construct, operate, should_compare, should_construct, should_operate, Class,
    Enumerable, ErrorValue, NilableValue, ScopeValue, Value,
};

/// The class a local binding currently holds.
fn class_of(binding: &ScopeValue) -> Option<Class> {
    match binding {
        ScopeValue::Value(value) => Some(value.class()),
        ScopeValue::Expected(class) => Some(class.clone()),
        _ => None,
    }
}

/// The `Error` value a failed `try` hands to its secondary target.
fn error_value(err: SymbolError) -> ErrorValue {
    match err {
        SymbolError::Application(value) => value,
        other => match other.code() {
            Some(code) => ErrorValue::new(code.as_ref(), &other.message()),
            None => ErrorValue::new("Error", &other.message()),
        },
    }
}

fn outside_loop(pos: Position, statement: &str) -> SymbolError {
    SymbolError::at(
        pos,
        ErrorCode::BadLoopControlStatement,
        format!("{} statement outside loop", statement),
    )
}

fn condition_error(pos: Position, code: ErrorCode, what: &str, class: &Class) -> SymbolError {
    SymbolError::at(
        pos,
        code,
        format!("{} condition must be Boolean, got {}", what, class),
    )
}

fn cannot_enumerate(class: &Class) -> SymbolError {
    SymbolError::new(
        ErrorCode::CannotEnumerate,
        format!("cannot enumerate {}", class),
    )
}

/// Outcome of running an initializer: the value, or the error a `try` caught.
enum Initialized {
    Value(Value),
    Caught(ErrorValue),
}

impl SymbolTable {
    // Static pass

    /// Checks a block in a nested scope. Returns whether the block always
    /// returns, which is what its last statement returns.
    pub fn evaluate_block(&self, block: &Block, returns: Option<&Class>) -> SymbolResult<bool> {
        let mut scope = self.clone();
        let mut always = false;
        for statement in &block.statements {
            always = scope.evaluate_statement(statement, returns)?;
        }
        Ok(always)
    }

    pub fn evaluate_statement(
        &mut self,
        statement: &Statement,
        returns: Option<&Class>,
    ) -> SymbolResult<bool> {
        self.evaluate_statement_inner(statement, returns)
            .map_err(|err| err.with_position(statement.pos()))
    }

    fn evaluate_statement_inner(
        &mut self,
        statement: &Statement,
        returns: Option<&Class>,
    ) -> SymbolResult<bool> {
        match statement {
            Statement::Expression(expr) => {
                self.evaluate_expression(expr)?;
                Ok(false)
            }
            Statement::Declaration(node) => {
                self.evaluate_declaration(node)?;
                Ok(false)
            }
            Statement::Assignment(node) => {
                self.evaluate_assignment(node)?;
                Ok(false)
            }
            Statement::If(node) => self.evaluate_if(node, returns),
            Statement::While(node) => self.evaluate_while(node, returns),
            Statement::For(node) => self.evaluate_for(node, returns),
            Statement::Switch(node) => self.evaluate_switch(node, returns),
            Statement::Guard(node) => {
                self.evaluate_expression(&node.init)?;
                Ok(false)
            }
            Statement::Return(node) => {
                let class = self.evaluate_expression(&node.init)?;
                match returns {
                    None => Err(SymbolError::at(
                        node.pos,
                        ErrorCode::InvalidReturnType,
                        format!("should return nothing, got {}", class),
                    )),
                    Some(expected) => {
                        should_construct(expected, &class).map_err(|_| {
                            SymbolError::at(
                                node.pos,
                                ErrorCode::InvalidReturnType,
                                format!("should return {}, got {}", expected, class),
                            )
                        })?;
                        Ok(true)
                    }
                }
            }
            Statement::Throw(node) => {
                let class = self.evaluate_expression(&node.init)?;
                if class != Class::Error {
                    return Err(SymbolError::at(
                        node.pos,
                        ErrorCode::InvalidThrowValue,
                        format!("can only throw Error, got {}", class),
                    ));
                }
                Ok(true)
            }
            Statement::Try(node) => {
                self.evaluate_expression(&node.init)?;
                Ok(false)
            }
            Statement::Continue(pos) => match self.loop_state() {
                Some(_) => Ok(false),
                None => Err(outside_loop(*pos, "continue")),
            },
            Statement::Break(pos) => match self.loop_state() {
                Some(_) => Ok(false),
                None => Err(outside_loop(*pos, "break")),
            },
        }
    }

    fn evaluate_initializer(&self, init: &Initializer) -> SymbolResult<Class> {
        match init {
            Initializer::Expression(expr) => self.evaluate_expression(expr),
            Initializer::Try(node) => self.evaluate_expression(&node.init),
        }
    }

    /// A secondary `try` target must be new, or already hold an `Error?`.
    fn check_secondary(&self, key: &str, pos: Position) -> SymbolResult<()> {
        if self.is_immutable(key) {
            return Err(SymbolError::at(
                pos,
                ErrorCode::CannotReassignImmutableValue,
                format!("cannot reassign immutable value {}", key),
            ));
        }
        let expected = Class::nilable(Class::Error);
        match self.local(key).map(class_of) {
            None => Ok(()),
            Some(Some(class)) if class == expected => Ok(()),
            Some(found) => Err(SymbolError::at(
                pos,
                ErrorCode::InvalidSecondaryTarget,
                format!(
                    "secondary target {} must be {}, got {}",
                    key,
                    expected,
                    found.map_or_else(|| "a non-value".to_string(), |class| class.to_string())
                ),
            )),
        }
    }

    /// Class of a declared name. A `try` may fail, leaving the name absent.
    fn declared_class(&self, init: &Initializer) -> SymbolResult<Class> {
        let class = self.evaluate_initializer(init)?;
        Ok(match init {
            Initializer::Try(_) => Class::nilable(class),
            Initializer::Expression(_) => class,
        })
    }

    fn evaluate_declaration(&mut self, node: &DeclarationStatement) -> SymbolResult<()> {
        let class = self.declared_class(&node.init)?;
        self.check_declare(&node.target, node.pos)?;
        if let Some(secondary) = &node.secondary_target {
            self.check_secondary(secondary, node.pos)?;
            self.set_local(secondary, ScopeValue::Expected(Class::nilable(Class::Error)));
        }
        self.set_local(&node.target, ScopeValue::Expected(class));
        Ok(())
    }

    /// The local a chain of assignment members starts from.
    fn assignable(
        &self,
        members: &[AssignmentMember],
        pos: Position,
    ) -> SymbolResult<(String, ScopeValue)> {
        let name = match members.first() {
            Some(AssignmentMember {
                init: AssignmentMemberInit::Identifier(name),
                ..
            }) => name,
            _ => {
                return Err(SymbolError::syntax(
                    pos,
                    "invalid assignment statement target",
                ))
            }
        };
        if self.is_immutable(name) {
            return Err(SymbolError::at(
                pos,
                ErrorCode::CannotReassignImmutableValue,
                format!("cannot reassign immutable value {}", name),
            ));
        }
        match self.local(name) {
            Some(binding) => Ok((name.clone(), binding.clone())),
            None => Err(SymbolError::at(
                pos,
                ErrorCode::UnknownSelector,
                format!("unknown selector {}", name),
            )),
        }
    }

    fn evaluate_assignment(&mut self, node: &AssignmentStatement) -> SymbolResult<()> {
        let value = self.evaluate_initializer(&node.init)?;
        let (name, binding) = self.assignable(&node.target.members, node.pos)?;
        let mut current = class_of(&binding).ok_or_else(|| {
            SymbolError::at(
                node.pos,
                ErrorCode::InvalidAssignmentTarget,
                format!("cannot assign to {} {}", binding.kind(), name),
            )
        })?;

        let rest = &node.target.members[1..];
        let target = match rest.split_last() {
            None => current,
            Some((last, intermediate)) => {
                for member in intermediate {
                    current = self
                        .evaluate_assignment_step(current, member)
                        .map_err(|err| err.with_position(member.pos))?;
                }
                self.evaluate_assignment_slot(current, last)
                    .map_err(|err| err.with_position(last.pos))?
            }
        };

        let produced = match node.operator.effect_operator() {
            Some(token) => should_operate(token, &target, &value)?,
            None => value,
        };
        should_construct(&target, &produced)?;

        if let Some(secondary) = &node.secondary_target {
            self.check_secondary(secondary, node.pos)?;
            self.set_local(secondary, ScopeValue::Expected(Class::nilable(Class::Error)));
        }
        Ok(())
    }

    /// Class reached by an intermediate member of an assignment target.
    fn evaluate_assignment_step(
        &self,
        current: Class,
        member: &AssignmentMember,
    ) -> SymbolResult<Class> {
        match &member.init {
            AssignmentMemberInit::Identifier(key) => {
                let descriptors = current.descriptors();
                let properties = descriptors.properties.as_ref().ok_or_else(|| {
                    SymbolError::new(
                        ErrorCode::CannotSetProperty,
                        format!("{} has no properties", current),
                    )
                })?;
                properties
                    .get(key)
                    .map(|prop| prop.class.clone())
                    .ok_or_else(|| unknown_property(&current, key))
            }
            AssignmentMemberInit::Index(index) => {
                let descriptors = current.descriptors();
                let enumerable = index_target(&current, descriptors.enumerable.as_ref())?;
                self.evaluate_indices(index)?;
                Ok(if index.is_range {
                    current.clone()
                } else {
                    enumerable.item.clone()
                })
            }
        }
    }

    /// Class a value assigned through the last member must construct into.
    fn evaluate_assignment_slot(
        &self,
        current: Class,
        member: &AssignmentMember,
    ) -> SymbolResult<Class> {
        match &member.init {
            AssignmentMemberInit::Identifier(key) => {
                let descriptors = current.descriptors();
                let prop = match &descriptors.properties {
                    Some(properties) => properties
                        .get(key)
                        .ok_or_else(|| unknown_property(&current, key))?,
                    None => {
                        return Err(SymbolError::new(
                            ErrorCode::CannotSetProperty,
                            format!("{} has no properties", current),
                        ))
                    }
                };
                if prop.setter.is_none() {
                    return Err(immutable_property(&current, key));
                }
                Ok(prop.class.clone())
            }
            AssignmentMemberInit::Index(index) => {
                let descriptors = current.descriptors();
                let enumerable = index_target(&current, descriptors.enumerable.as_ref())?;
                self.evaluate_indices(index)?;
                if index.is_range {
                    if enumerable.set_range.is_none() {
                        return Err(not_assignable(&current));
                    }
                    Ok(current.clone())
                } else {
                    if enumerable.set_index.is_none() {
                        return Err(not_assignable(&current));
                    }
                    Ok(enumerable.item.clone())
                }
            }
        }
    }

    fn evaluate_indices(&self, index: &IndexExpression) -> SymbolResult<()> {
        for operand in [&index.left, &index.right].into_iter().flatten() {
            self.index_operand::<Evaluate>(operand)?;
        }
        Ok(())
    }

    fn evaluate_condition(
        &self,
        expr: &Expression,
        code: ErrorCode,
        what: &str,
    ) -> SymbolResult<()> {
        let class = self.evaluate_expression(expr)?;
        if class != Class::Boolean {
            return Err(condition_error(expr.pos(), code, what, &class));
        }
        Ok(())
    }

    fn evaluate_if(&self, node: &IfStatement, returns: Option<&Class>) -> SymbolResult<bool> {
        self.evaluate_condition(&node.condition, ErrorCode::InvalidIfCondition, "if")?;
        let body = self.evaluate_block(&node.body, returns)?;
        let alternate = match &node.alternate {
            Some(Alternate::If(alternate)) => self.evaluate_if(alternate, returns)?,
            Some(Alternate::Block(block)) => self.evaluate_block(block, returns)?,
            None => false,
        };
        Ok(body && alternate)
    }

    fn evaluate_while(&self, node: &WhileStatement, returns: Option<&Class>) -> SymbolResult<bool> {
        let scope = self.start_loop();
        scope.evaluate_condition(&node.condition, ErrorCode::InvalidWhileCondition, "while")?;
        scope.evaluate_block(&node.body, returns)
    }

    fn evaluate_for(&self, node: &ForStatement, returns: Option<&Class>) -> SymbolResult<bool> {
        let mut scope = self.start_loop();
        match &node.condition {
            LoopCondition::For(condition) => {
                if let Some(init) = &condition.init {
                    scope.evaluate_declaration(init)?;
                }
                scope.evaluate_condition(
                    &condition.condition,
                    ErrorCode::InvalidForCondition,
                    "for",
                )?;
                match &condition.update {
                    Some(ForUpdate::Expression(expr)) => {
                        scope.evaluate_expression(expr)?;
                    }
                    Some(ForUpdate::Assignment(assignment)) => {
                        scope.evaluate_assignment(assignment)?;
                    }
                    None => {}
                }
            }
            LoopCondition::Range(condition) => {
                let class = scope.evaluate_expression(&condition.target)?;
                let descriptors = class.descriptors();
                let enumerable = descriptors
                    .enumerable
                    .as_ref()
                    .ok_or_else(|| cannot_enumerate(&class).with_position(condition.pos))?;
                scope.declare(
                    &condition.index,
                    ScopeValue::Expected(Class::Integer),
                    condition.pos,
                )?;
                scope.declare(
                    &condition.value,
                    ScopeValue::Expected(enumerable.item.clone()),
                    condition.pos,
                )?;
            }
        }
        scope.evaluate_block(&node.body, returns)
    }

    /// Every case is checked, but only the default block decides whether the
    /// switch always returns.
    fn evaluate_switch(&self, node: &SwitchBlock, returns: Option<&Class>) -> SymbolResult<bool> {
        let target = self.evaluate_expression(&node.target)?;
        if target.descriptors().comparators.is_none() {
            return Err(SymbolError::at(
                node.target.pos(),
                ErrorCode::InvalidSwitchTarget,
                format!("cannot switch over {}", target),
            ));
        }
        let mut default = None;
        for case in &node.cases {
            if case.is_default {
                if default.is_some() {
                    return Err(SymbolError::at(
                        case.pos,
                        ErrorCode::DuplicateDefaultSwitchStatements,
                        "duplicate default switch statements",
                    ));
                }
                default = Some(self.evaluate_block(&case.body, returns)?);
                continue;
            }
            if let Some(condition) = &case.condition {
                let class = self.evaluate_expression(condition)?;
                should_compare(Token::Equals, &target, &class)
                    .map_err(|err| err.with_position(condition.pos()))?;
            }
            self.evaluate_block(&case.body, returns)?;
        }
        Ok(default.unwrap_or(false))
    }

    // Dynamic pass

    /// Runs a block in a nested scope, then copies back values assigned to
    /// names this scope owns.
    pub fn resolve_block(&mut self, block: &Block) -> SymbolResult<Option<Value>> {
        let mut scope = self.clone();
        let result = scope.resolve_statements(&block.statements);
        self.write_back(&scope);
        result
    }

    fn resolve_statements(&mut self, statements: &[Statement]) -> SymbolResult<Option<Value>> {
        for statement in statements {
            if let Some(value) = self.resolve_statement(statement)? {
                return Ok(Some(value));
            }
            if self.loop_state().is_some_and(|state| state.interrupted()) {
                break;
            }
        }
        Ok(None)
    }

    pub fn resolve_statement(&mut self, statement: &Statement) -> SymbolResult<Option<Value>> {
        self.resolve_statement_inner(statement)
            .map_err(|err| err.with_position(statement.pos()))
    }

    fn resolve_statement_inner(&mut self, statement: &Statement) -> SymbolResult<Option<Value>> {
        match statement {
            Statement::Expression(expr) => {
                self.resolve_expression(expr)?;
                Ok(None)
            }
            Statement::Guard(node) => {
                self.resolve_expression(&node.init)?;
                Ok(None)
            }
            Statement::Declaration(node) => {
                self.resolve_declaration(node)?;
                Ok(None)
            }
            Statement::Assignment(node) => {
                self.resolve_assignment(node)?;
                Ok(None)
            }
            Statement::If(node) => self.resolve_if(node),
            Statement::While(node) => self.resolve_while(node),
            Statement::For(node) => self.resolve_for(node),
            Statement::Switch(node) => self.resolve_switch(node),
            Statement::Return(node) => self.resolve_expression(&node.init).map(Some),
            Statement::Throw(node) => match self.resolve_expression(&node.init)? {
                Value::Error(value) => Err(SymbolError::Application(value)),
                other => Err(SymbolError::at(
                    node.pos,
                    ErrorCode::InvalidThrowValue,
                    format!("can only throw Error, got {}", other.class()),
                )),
            },
            Statement::Try(node) => {
                if let Err(err) = self.resolve_expression(&node.init) {
                    debug!("try statement ignored error: {}", err);
                }
                Ok(None)
            }
            Statement::Continue(pos) => {
                self.loop_state()
                    .ok_or_else(|| outside_loop(*pos, "continue"))?
                    .request_continue();
                Ok(None)
            }
            Statement::Break(pos) => {
                self.loop_state()
                    .ok_or_else(|| outside_loop(*pos, "break"))?
                    .request_break();
                Ok(None)
            }
        }
    }

    fn resolve_initializer(&self, init: &Initializer) -> SymbolResult<Initialized> {
        match init {
            Initializer::Expression(expr) => self.resolve_expression(expr).map(Initialized::Value),
            Initializer::Try(node) => match self.resolve_expression(&node.init) {
                Ok(value) => Ok(Initialized::Value(value)),
                Err(err) => {
                    debug!("try caught error: {}", err);
                    Ok(Initialized::Caught(error_value(err)))
                }
            },
        }
    }

    /// Binds the secondary target of a `try` to the caught error, if any.
    fn resolve_secondary(
        &mut self,
        secondary: &Option<String>,
        caught: Option<ErrorValue>,
        pos: Position,
    ) -> SymbolResult<()> {
        if let Some(key) = secondary {
            self.check_secondary(key, pos)?;
            let value = match caught {
                Some(err) => NilableValue::present(Class::Error, Value::Error(err)),
                None => NilableValue::absent(Class::Error),
            };
            self.set_local(key, ScopeValue::Value(Value::Nilable(value)));
        }
        Ok(())
    }

    fn resolve_declaration(&mut self, node: &DeclarationStatement) -> SymbolResult<()> {
        let (value, caught) = match self.resolve_initializer(&node.init)? {
            Initialized::Value(value) => (value, None),
            Initialized::Caught(caught) => (Value::Nil, Some(caught)),
        };
        let value = match &node.init {
            Initializer::Try(_) => construct(&self.declared_class(&node.init)?, value)?,
            Initializer::Expression(_) => value,
        };
        self.declare(&node.target, ScopeValue::Value(value), node.pos)?;
        self.resolve_secondary(&node.secondary_target, caught, node.pos)
    }

    fn resolve_assignment(&mut self, node: &AssignmentStatement) -> SymbolResult<()> {
        let value = match self.resolve_initializer(&node.init)? {
            Initialized::Value(value) => value,
            Initialized::Caught(caught) => {
                return self.resolve_secondary(&node.secondary_target, Some(caught), node.pos)
            }
        };
        let (name, binding) = self.assignable(&node.target.members, node.pos)?;
        let mut current = match binding {
            ScopeValue::Value(value) => value,
            other => {
                return Err(SymbolError::at(
                    node.pos,
                    ErrorCode::InvalidAssignmentTarget,
                    format!("cannot assign to {} {}", other.kind(), name),
                ))
            }
        };

        let effect = node.operator.effect_operator();
        let rest = &node.target.members[1..];
        match rest.split_last() {
            None => {
                let class = current.class();
                let produced = match effect {
                    Some(token) => operate(token, current, value)?,
                    None => value,
                };
                let updated = construct(&class, produced)?;
                self.set_local(&name, ScopeValue::Value(updated));
            }
            Some((last, intermediate)) => {
                for member in intermediate {
                    current = self
                        .resolve_assignment_step(current, member)
                        .map_err(|err| err.with_position(member.pos))?;
                }
                self.resolve_assignment_slot(&current, last, effect, value)
                    .map_err(|err| err.with_position(last.pos))?;
            }
        }
        self.resolve_secondary(&node.secondary_target, None, node.pos)
    }

    fn resolve_range(
        &self,
        target: &Value,
        enumerable: &Enumerable,
        index: &IndexExpression,
    ) -> SymbolResult<(i64, i64)> {
        let start = match &index.left {
            Some(left) => self.index_operand::<Resolve>(left)?.as_i64()?,
            None => 0,
        };
        let end = match &index.right {
            Some(right) => self.index_operand::<Resolve>(right)?.as_i64()?,
            None => (enumerable.length)(target)?,
        };
        Ok((start, end))
    }

    fn resolve_index(&self, index: &IndexExpression) -> SymbolResult<i64> {
        match &index.left {
            Some(left) => self.index_operand::<Resolve>(left)?.as_i64(),
            None => Err(SymbolError::syntax(index.pos, "index expression has no index")),
        }
    }

    fn resolve_assignment_step(
        &self,
        current: Value,
        member: &AssignmentMember,
    ) -> SymbolResult<Value> {
        let class = current.class();
        let descriptors = class.descriptors();
        match &member.init {
            AssignmentMemberInit::Identifier(key) => {
                let properties = descriptors.properties.as_ref().ok_or_else(|| {
                    SymbolError::new(
                        ErrorCode::CannotSetProperty,
                        format!("{} has no properties", class),
                    )
                })?;
                let prop = properties
                    .get(key)
                    .ok_or_else(|| unknown_property(&class, key))?;
                (prop.getter)(&current)
            }
            AssignmentMemberInit::Index(index) => {
                let enumerable = index_target(&class, descriptors.enumerable.as_ref())?;
                if index.is_range {
                    let (start, end) = self.resolve_range(&current, enumerable, index)?;
                    (enumerable.get_range)(&current, start, end)
                } else {
                    (enumerable.get_index)(&current, self.resolve_index(index)?)
                }
            }
        }
    }

    fn resolve_assignment_slot(
        &self,
        target: &Value,
        member: &AssignmentMember,
        effect: Option<Token>,
        value: Value,
    ) -> SymbolResult<()> {
        let class = target.class();
        let descriptors = class.descriptors();
        match &member.init {
            AssignmentMemberInit::Identifier(key) => {
                let prop = descriptors
                    .property(key)
                    .ok_or_else(|| unknown_property(&class, key))?;
                let setter = prop
                    .setter
                    .as_ref()
                    .ok_or_else(|| immutable_property(&class, key))?;
                let produced = match effect {
                    Some(token) => operate(token, (prop.getter)(target)?, value)?,
                    None => value,
                };
                setter(target, construct(&prop.class, produced)?)
            }
            AssignmentMemberInit::Index(index) => {
                let enumerable = index_target(&class, descriptors.enumerable.as_ref())?;
                if index.is_range {
                    let set_range = enumerable
                        .set_range
                        .as_ref()
                        .ok_or_else(|| not_assignable(&class))?;
                    let (start, end) = self.resolve_range(target, enumerable, index)?;
                    let produced = match effect {
                        Some(token) => {
                            operate(token, (enumerable.get_range)(target, start, end)?, value)?
                        }
                        None => value,
                    };
                    set_range(target, start, end, construct(&class, produced)?)
                } else {
                    let set_index = enumerable
                        .set_index
                        .as_ref()
                        .ok_or_else(|| not_assignable(&class))?;
                    let at = self.resolve_index(index)?;
                    let produced = match effect {
                        Some(token) => operate(token, (enumerable.get_index)(target, at)?, value)?,
                        None => value,
                    };
                    set_index(target, at, construct(&enumerable.item, produced)?)
                }
            }
        }
    }

    fn resolve_condition(
        &self,
        expr: &Expression,
        code: ErrorCode,
        what: &str,
    ) -> SymbolResult<bool> {
        match self.resolve_expression(expr)? {
            Value::Boolean(b) => Ok(b),
            other => Err(condition_error(expr.pos(), code, what, &other.class())),
        }
    }

    fn resolve_if(&mut self, node: &IfStatement) -> SymbolResult<Option<Value>> {
        if self.resolve_condition(&node.condition, ErrorCode::InvalidIfCondition, "if")? {
            return self.resolve_block(&node.body);
        }
        match &node.alternate {
            Some(Alternate::If(alternate)) => self.resolve_if(alternate),
            Some(Alternate::Block(block)) => self.resolve_block(block),
            None => Ok(None),
        }
    }

    fn count_iteration(&self, count: &mut u64) -> SymbolResult<()> {
        *count += 1;
        match self.max_loop_iterations() {
            Some(max) if *count > max => Err(SymbolError::new(
                ErrorCode::LoopLimitExceeded,
                format!("loop exceeded {} iterations", max),
            )),
            _ => Ok(()),
        }
    }

    /// Runs `body` in a fresh loop scope and writes the scope back afterwards,
    /// whatever the outcome.
    fn in_loop<F>(&mut self, body: F) -> SymbolResult<Option<Value>>
    where
        F: FnOnce(&mut SymbolTable, &LoopState) -> SymbolResult<Option<Value>>,
    {
        let mut scope = self.start_loop();
        let state = match scope.loop_state() {
            Some(state) => Arc::clone(state),
            None => Arc::new(LoopState::default()),
        };
        let result = body(&mut scope, &state);
        self.write_back(&scope);
        result
    }

    fn resolve_while(&mut self, node: &WhileStatement) -> SymbolResult<Option<Value>> {
        self.in_loop(|scope, state| {
            let mut count = 0;
            while scope.resolve_condition(&node.condition, ErrorCode::InvalidWhileCondition, "while")? {
                scope.count_iteration(&mut count)?;
                if let Some(value) = scope.resolve_block(&node.body)? {
                    return Ok(Some(value));
                }
                if state.should_break() {
                    break;
                }
                state.next_iteration();
            }
            Ok(None)
        })
    }

    fn resolve_for(&mut self, node: &ForStatement) -> SymbolResult<Option<Value>> {
        match &node.condition {
            LoopCondition::For(condition) => self.resolve_for_condition(condition, &node.body),
            LoopCondition::Range(condition) => self.resolve_for_range(condition, &node.body),
        }
    }

    fn resolve_for_condition(
        &mut self,
        condition: &ForCondition,
        body: &Block,
    ) -> SymbolResult<Option<Value>> {
        self.in_loop(|scope, state| {
            if let Some(init) = &condition.init {
                scope.resolve_declaration(init)?;
            }
            let mut count = 0;
            while scope.resolve_condition(&condition.condition, ErrorCode::InvalidForCondition, "for")? {
                scope.count_iteration(&mut count)?;
                if let Some(value) = scope.resolve_block(body)? {
                    return Ok(Some(value));
                }
                if state.should_break() {
                    break;
                }
                state.next_iteration();
                match &condition.update {
                    Some(ForUpdate::Expression(expr)) => {
                        scope.resolve_expression(expr)?;
                    }
                    Some(ForUpdate::Assignment(assignment)) => scope.resolve_assignment(assignment)?,
                    None => {}
                }
            }
            Ok(None)
        })
    }

    fn resolve_for_range(
        &mut self,
        condition: &RangeCondition,
        body: &Block,
    ) -> SymbolResult<Option<Value>> {
        let target = self.resolve_expression(&condition.target)?;
        let class = target.class();
        let descriptors = class.descriptors();
        let enumerable = descriptors
            .enumerable
            .as_ref()
            .ok_or_else(|| cannot_enumerate(&class).with_position(condition.pos))?;
        let length = (enumerable.length)(&target)?;
        self.in_loop(|scope, state| {
            scope.declare(&condition.index, ScopeValue::Value(Value::Nil), condition.pos)?;
            scope.declare(&condition.value, ScopeValue::Value(Value::Nil), condition.pos)?;
            let mut count = 0;
            for index in 0..length {
                scope.count_iteration(&mut count)?;
                let item = (enumerable.get_index)(&target, index)?;
                scope.set_local(&condition.index, ScopeValue::Value(Value::Integer(index)));
                scope.set_local(&condition.value, ScopeValue::Value(item));
                if let Some(value) = scope.resolve_block(body)? {
                    return Ok(Some(value));
                }
                if state.should_break() {
                    break;
                }
                state.next_iteration();
            }
            Ok(None)
        })
    }

    /// Runs every case equal to the target, in order, until one returns. The
    /// default block runs only when no case matched.
    fn resolve_switch(&mut self, node: &SwitchBlock) -> SymbolResult<Option<Value>> {
        let target = self.resolve_expression(&node.target)?;
        let mut matched = false;
        for case in &node.cases {
            let Some(condition) = &case.condition else {
                continue;
            };
            let value = self.resolve_expression(condition)?;
            if compare(Token::Equals, target.clone(), value)
                .map_err(|err| err.with_position(condition.pos()))?
            {
                matched = true;
                if let Some(value) = self.resolve_block(&case.body)? {
                    return Ok(Some(value));
                }
                if self.loop_state().is_some_and(|state| state.interrupted()) {
                    return Ok(None);
                }
            }
        }
        if matched {
            return Ok(None);
        }
        match node.cases.iter().find(|case| case.is_default) {
            Some(default) => self.resolve_block(&default.body),
            None => Ok(None),
        }
    }
}

fn unknown_property(class: &Class, key: &str) -> SymbolError {
    SymbolError::new(
        ErrorCode::UnknownProperty,
        format!("{} has no property {}", class, key),
    )
}

fn immutable_property(class: &Class, key: &str) -> SymbolError {
    SymbolError::new(
        ErrorCode::CannotSetProperty,
        format!("cannot set immutable property {} on {}", key, class),
    )
}

fn not_assignable(class: &Class) -> SymbolError {
    SymbolError::new(
        ErrorCode::InvalidAssignmentTarget,
        format!("cannot assign into {}", class),
    )
}

fn index_target<'a>(
    class: &Class,
    enumerable: Option<&'a Enumerable>,
) -> SymbolResult<&'a Enumerable> {
    enumerable.ok_or_else(|| {
        SymbolError::new(
            ErrorCode::InvalidIndexTarget,
            format!("{} cannot be indexed", class),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{CaseBlock, IndexExpression, PropertyItem, TypeExpression, ValueMember};
    use crate::config::EvaluatorConfig;
    use crate::symbols::record_class;
    use pretty_assertions::assert_eq;

    fn table() -> SymbolTable {
        let mut table = SymbolTable::with_builtins(&EvaluatorConfig {
            max_loop_iterations: Some(1_000),
            ..Default::default()
        });
        let user = record_class("User", [("name", Class::String), ("age", Class::Integer)])
            .unwrap();
        table.bind("User", ScopeValue::Class(user));
        table
    }

    fn ident(name: &str) -> Expression {
        Expression::ident(name)
    }

    fn int(n: i64) -> Expression {
        Expression::integer(n)
    }

    /// Checks then runs `statements`, returning the value of `result`.
    fn run(statements: Vec<Statement>) -> Value {
        let mut body = statements;
        body.push(Statement::ret(ident("result")));
        let block = Block::new(body);
        let table = table();
        assert!(table.evaluate_block(&block, Some(&Class::Any)).unwrap());
        table.clone().resolve_block(&block).unwrap().unwrap()
    }

    #[test]
    fn test_compound_assignment() {
        let result = run(vec![
            Statement::declare("result", int(2)),
            Statement::assign(vec![AssignmentMember::ident("result")], Token::MulAssign, int(5)),
            Statement::assign(vec![AssignmentMember::ident("result")], Token::SubAssign, int(1)),
        ]);
        assert_eq!(result, Value::Integer(9));
    }

    #[test]
    fn test_assignment_keeps_declared_class() {
        let result = run(vec![
            Statement::declare("result", int(2)),
            Statement::set("result", Expression::float(3.9)),
        ]);
        assert_eq!(result, Value::Integer(3));
    }

    #[test]
    fn test_property_and_index_assignment() {
        let result = run(vec![
            Statement::declare(
                "u",
                Expression::instance(
                    "User",
                    vec![
                        PropertyItem::property("name", Expression::string("ann")),
                        PropertyItem::property("age", int(40)),
                    ],
                ),
            ),
            Statement::assign(
                vec![AssignmentMember::ident("u"), AssignmentMember::ident("age")],
                Token::AddAssign,
                int(2),
            ),
            Statement::declare(
                "xs",
                Expression::array(TypeExpression::named("Int"), vec![int(1), int(2)]),
            ),
            Statement::assign(
                vec![
                    AssignmentMember::ident("xs"),
                    AssignmentMember::index(IndexExpression::at(int(1))),
                ],
                Token::Assign,
                ident("u.age"),
            ),
            Statement::declare("result", ident("xs")),
        ]);
        assert_eq!(result.to_primitive(), serde_json::json!([1, 42]));
    }

    #[test]
    fn test_immutable_property_rejected() {
        let table = table();
        let block = Block::new(vec![
            Statement::declare("e", Expression::call("Error", vec![Expression::string("x")])),
            Statement::assign(
                vec![AssignmentMember::ident("e"), AssignmentMember::ident("name")],
                Token::Assign,
                Expression::string("y"),
            ),
        ]);
        let err = table.evaluate_block(&block, None).unwrap_err();
        assert_eq!(err.to_string(), "(0:0) cannot set immutable property name on Error");
    }

    #[test]
    fn test_redeclaration_rejected_in_both_passes() {
        let block = Block::new(vec![
            Statement::declare("a", int(1)),
            Statement::declare("a", int(2)),
        ]);
        let table = table();
        let err = table.evaluate_block(&block, None).unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::CannotRedeclareValue));
        let err = table.clone().resolve_block(&block).unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::CannotRedeclareValue));
    }

    #[test]
    fn test_nested_block_writes_back_assignments_only() {
        let result = run(vec![
            Statement::declare("result", int(0)),
            Statement::if_else(
                Expression::boolean(true),
                Block::new(vec![
                    Statement::declare("inner", int(5)),
                    Statement::set("result", ident("inner")),
                ]),
                None,
            ),
        ]);
        assert_eq!(result, Value::Integer(5));
    }

    #[test]
    fn test_for_loop_with_continue_runs_update() {
        // for i := 0; i < 5; i += 1 { if i == 2 { continue }; result += i }
        let result = run(vec![
            Statement::declare("result", int(0)),
            Statement::for_loop(
                Some(Statement::declare("i", int(0))),
                Expression::binary(Token::Less, ident("i"), int(5)),
                Some(Statement::assign(
                    vec![AssignmentMember::ident("i")],
                    Token::AddAssign,
                    int(1),
                )),
                Block::new(vec![
                    Statement::if_else(
                        Expression::binary(Token::Equals, ident("i"), int(2)),
                        Block::new(vec![Statement::Continue(Position::default())]),
                        None,
                    ),
                    Statement::assign(
                        vec![AssignmentMember::ident("result")],
                        Token::AddAssign,
                        ident("i"),
                    ),
                ]),
            ),
        ]);
        assert_eq!(result, Value::Integer(8));
    }

    #[test]
    fn test_while_with_break() {
        let result = run(vec![
            Statement::declare("result", int(0)),
            Statement::while_loop(
                Expression::boolean(true),
                Block::new(vec![
                    Statement::assign(
                        vec![AssignmentMember::ident("result")],
                        Token::AddAssign,
                        int(1),
                    ),
                    Statement::if_else(
                        Expression::binary(Token::GreaterEqual, ident("result"), int(3)),
                        Block::new(vec![Statement::Break(Position::default())]),
                        None,
                    ),
                ]),
            ),
        ]);
        assert_eq!(result, Value::Integer(3));
    }

    #[test]
    fn test_range_loop() {
        let result = run(vec![
            Statement::declare("result", Expression::string("")),
            Statement::for_range(
                "i",
                "c",
                Expression::string("abc"),
                Block::new(vec![Statement::assign(
                    vec![AssignmentMember::ident("result")],
                    Token::AddAssign,
                    Expression::binary(Token::Add, ident("c"), Expression::call("String", vec![ident("i")])),
                )]),
            ),
        ]);
        assert_eq!(result, Value::string("a0b1c2"));
    }

    #[test]
    fn test_range_over_non_enumerable() {
        let block = Block::new(vec![Statement::for_range("i", "v", int(3), Block::default())]);
        let err = table().evaluate_block(&block, None).unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::CannotEnumerate));
    }

    #[test]
    fn test_loop_limit() {
        let block = Block::new(vec![Statement::while_loop(
            Expression::boolean(true),
            Block::default(),
        )]);
        let err = table().resolve_block(&block).unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::LoopLimitExceeded));
    }

    #[test]
    fn test_loop_control_outside_loop() {
        let block = Block::new(vec![Statement::Break(Position::new(3, 5))]);
        let err = table().evaluate_block(&block, None).unwrap_err();
        assert_eq!(err.to_string(), "(3:5) break statement outside loop");
    }

    #[test]
    fn test_switch_runs_every_match() {
        let result = run(vec![
            Statement::declare("result", int(0)),
            Statement::switch(
                int(2),
                vec![
                    CaseBlock::case(int(2), Block::new(vec![Statement::set("result", int(1))])),
                    CaseBlock::case(int(3), Block::new(vec![Statement::set("result", int(9))])),
                    CaseBlock::case(int(2), Block::new(vec![Statement::set("result", int(2))])),
                    CaseBlock::default(Block::new(vec![Statement::set("result", int(3))])),
                ],
            ),
        ]);
        assert_eq!(result, Value::Integer(2));
    }

    #[test]
    fn test_switch_stops_at_returning_case() {
        let block = Block::new(vec![Statement::switch(
            int(2),
            vec![
                CaseBlock::case(int(2), Block::new(vec![Statement::ret(int(1))])),
                CaseBlock::case(int(2), Block::new(vec![Statement::ret(int(2))])),
                CaseBlock::default(Block::new(vec![Statement::ret(int(3))])),
            ],
        )]);
        let table = table();
        assert!(table.evaluate_block(&block, Some(&Class::Integer)).unwrap());
        assert_eq!(table.clone().resolve_block(&block).unwrap(), Some(Value::Integer(1)));
    }

    #[test]
    fn test_switch_default_only_without_match() {
        let result = run(vec![
            Statement::declare("result", int(0)),
            Statement::switch(
                int(5),
                vec![
                    CaseBlock::case(int(2), Block::new(vec![Statement::set("result", int(1))])),
                    CaseBlock::default(Block::new(vec![Statement::set("result", int(3))])),
                ],
            ),
        ]);
        assert_eq!(result, Value::Integer(3));
    }

    #[test]
    fn test_duplicate_default() {
        let block = Block::new(vec![Statement::switch(
            int(1),
            vec![CaseBlock::default(Block::default()), CaseBlock::default(Block::default())],
        )]);
        let err = table().evaluate_block(&block, None).unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::DuplicateDefaultSwitchStatements));
    }

    #[test]
    fn test_switch_case_class_checked() {
        let block = Block::new(vec![Statement::switch(
            int(1),
            vec![CaseBlock::case(Expression::string("1"), Block::default())],
        )]);
        let err = table().evaluate_block(&block, None).unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::UndefinedOperator));
    }

    #[test]
    fn test_try_binds_secondary() {
        let result = run(vec![
            Statement::declare_try(
                "n",
                "err",
                Expression::binary(Token::Quo, int(1), int(0)),
            ),
            Statement::declare(
                "result",
                Expression::chain(vec![ValueMember::ident("err")]),
            ),
        ]);
        match result {
            Value::Nilable(NilableValue { value: Some(inner), .. }) => match *inner {
                Value::Error(err) => assert_eq!(err.name, "DivisionByZero"),
                other => panic!("unexpected {:?}", other),
            },
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_try_declaration_is_nilable() {
        // n, err := try 1 / 0; result := n + 1
        let block = Block::new(vec![
            Statement::declare_try("n", "err", Expression::binary(Token::Quo, int(1), int(0))),
            Statement::declare("result", Expression::binary(Token::Add, ident("n"), int(1))),
        ]);
        let err = table().evaluate_block(&block, None).unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::UndefinedOperator));

        let caught = run(vec![
            Statement::declare_try("n", "err", Expression::binary(Token::Quo, int(1), int(0))),
            Statement::declare("result", ident("n")),
        ]);
        assert_eq!(caught, Value::Nilable(NilableValue::absent(Class::Integer)));

        let present = run(vec![
            Statement::declare_try("n", "err", Expression::binary(Token::Quo, int(6), int(3))),
            Statement::declare("result", Expression::call("Int", vec![ident("n")])),
        ]);
        assert_eq!(present, Value::Integer(2));
    }

    #[test]
    fn test_try_catches_thrown_error() {
        let mut table = table();
        let block = Block::new(vec![Statement::throw(Expression::call(
            "Error",
            vec![Expression::string("boom")],
        ))]);
        let err = table.resolve_block(&block).unwrap_err();
        assert_eq!(err.thrown().unwrap().message, "boom");
    }

    #[test]
    fn test_secondary_must_be_nilable_error() {
        let block = Block::new(vec![
            Statement::declare("err", int(1)),
            Statement::declare_try("n", "err", int(2)),
        ]);
        let err = table().evaluate_block(&block, None).unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::InvalidSecondaryTarget));
    }

    #[test]
    fn test_return_class_checked() {
        let block = Block::new(vec![Statement::ret(Expression::string("x"))]);
        let err = table()
            .evaluate_block(&block, Some(&Class::Boolean))
            .unwrap_err();
        assert_eq!(err.to_string(), "(0:0) should return Boolean, got String");
        let err = table().evaluate_block(&block, None).unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::InvalidReturnType));
    }

    #[test]
    fn test_if_conditions_must_be_boolean() {
        let block = Block::new(vec![Statement::if_else(int(1), Block::default(), None)]);
        let err = table().evaluate_block(&block, None).unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::InvalidIfCondition));
    }
}
