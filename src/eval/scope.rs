use core::fmt;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::debug;

use crate::ast::{Position, Selector, TypeExpression};
use crate::config::EvaluatorConfig;
use crate::error::{ErrorCode, SymbolError, SymbolResult};
use crate::stdlib;
use crate::symbols::{Callable, Class, Function, Object, ScopeValue, Value};

/// Continue/break flags shared by every block nested in one loop body.
#[derive(Debug, Default)]
pub struct LoopState {
    should_continue: AtomicBool,
    should_break: AtomicBool,
}

impl LoopState {
    pub fn request_continue(&self) {
        self.should_continue.store(true, Ordering::SeqCst);
    }

    pub fn request_break(&self) {
        self.should_break.store(true, Ordering::SeqCst);
    }

    pub fn should_continue(&self) -> bool {
        self.should_continue.load(Ordering::SeqCst)
    }

    pub fn should_break(&self) -> bool {
        self.should_break.load(Ordering::SeqCst)
    }

    /// Whether the rest of the current body must be skipped.
    pub fn interrupted(&self) -> bool {
        self.should_continue() || self.should_break()
    }

    /// Clears `continue` before the next iteration. `break` is never cleared.
    pub fn next_iteration(&self) {
        self.should_continue.store(false, Ordering::SeqCst);
    }
}

/// Name bindings of one scope.
///
/// Names resolve through `immutable`, then `local`, then the optional root
/// object. A nested block, loop or function body works on a clone, so the
/// table is cheap to copy: bindings are reference counted or shared handles.
#[derive(Clone, Default)]
pub struct SymbolTable {
    root: Option<Arc<dyn Object>>,
    immutable: HashMap<String, ScopeValue>,
    local: HashMap<String, ScopeValue>,
    loop_state: Option<Arc<LoopState>>,
    max_loop_iterations: Option<u64>,
}

impl SymbolTable {
    pub fn new(root: Option<Arc<dyn Object>>) -> Self {
        Self {
            root,
            ..Default::default()
        }
    }

    /// A root table with the built-in classes, functions and the packages
    /// enabled by `config`.
    pub fn with_builtins(config: &EvaluatorConfig) -> Self {
        let mut table = Self {
            max_loop_iterations: config.max_loop_iterations,
            ..Default::default()
        };
        for (name, class) in [
            ("String", Class::String),
            ("Double", Class::Double),
            ("Float", Class::Float),
            ("Int", Class::Integer),
            ("Bool", Class::Boolean),
            ("Number", Class::Number),
            ("DateTime", Class::DateTime),
            ("Error", Class::Error),
            ("Any", Class::Any),
        ] {
            table.bind(name, ScopeValue::Class(class));
        }
        table.bind("len", ScopeValue::Callable(Arc::new(Length(len()))));
        if config.print {
            table.bind("print", ScopeValue::Callable(Arc::new(print())));
        }
        for name in &config.packages {
            match stdlib::package(name) {
                Some(package) => table.bind(name, ScopeValue::Object(Arc::new(package))),
                None => tracing::warn!("unknown package {} in configuration", name),
            }
        }
        table
    }

    pub fn with_root(mut self, root: Arc<dyn Object>) -> Self {
        self.root = Some(root);
        self
    }

    pub fn max_loop_iterations(&self) -> Option<u64> {
        self.max_loop_iterations
    }

    /// Adds an immutable binding, replacing any previous one.
    pub fn bind(&mut self, key: &str, value: ScopeValue) {
        self.immutable.insert(key.to_string(), value);
    }

    pub fn get(&self, key: &str) -> SymbolResult<Option<ScopeValue>> {
        if let Some(value) = self.immutable.get(key) {
            return Ok(Some(value.clone()));
        }
        if let Some(value) = self.local.get(key) {
            return Ok(Some(value.clone()));
        }
        match &self.root {
            Some(root) => root.get(key),
            None => Ok(None),
        }
    }

    pub fn is_immutable(&self, key: &str) -> bool {
        self.immutable.contains_key(key)
    }

    pub fn local(&self, key: &str) -> Option<&ScopeValue> {
        self.local.get(key)
    }

    /// Overwrites a local binding without any redeclaration check.
    pub fn set_local(&mut self, key: &str, value: ScopeValue) {
        self.local.insert(key.to_string(), value);
    }

    /// Checks that `key` may be declared as a new local.
    pub fn check_declare(&self, key: &str, pos: Position) -> SymbolResult<()> {
        if self.is_immutable(key) {
            return Err(SymbolError::at(
                pos,
                ErrorCode::CannotReassignImmutableValue,
                format!("cannot reassign immutable value {}", key),
            ));
        }
        if self.local.contains_key(key) {
            return Err(SymbolError::at(
                pos,
                ErrorCode::CannotRedeclareValue,
                format!("cannot redeclare value {}", key),
            ));
        }
        Ok(())
    }

    pub fn declare(&mut self, key: &str, value: ScopeValue, pos: Position) -> SymbolResult<()> {
        self.check_declare(key, pos)?;
        self.set_local(key, value);
        Ok(())
    }

    pub fn loop_state(&self) -> Option<&Arc<LoopState>> {
        self.loop_state.as_ref()
    }

    /// A nested scope with fresh loop-control state.
    pub fn start_loop(&self) -> Self {
        let mut table = self.clone();
        table.loop_state = Some(Arc::new(LoopState::default()));
        table
    }

    /// A nested scope for a function body: loop control does not cross the
    /// function boundary.
    pub fn function_scope(&self) -> Self {
        let mut table = self.clone();
        table.loop_state = None;
        table
    }

    /// Copies back values a nested scope assigned to names this scope
    /// already binds. Names the nested scope declared itself stay behind.
    pub fn write_back(&mut self, child: &SymbolTable) {
        for (key, value) in self.local.iter_mut() {
            if let Some(updated) = child.local.get(key) {
                *value = updated.clone();
            }
        }
    }

    /// Follows a dotted selector through objects.
    pub fn resolve_selector(&self, selector: &Selector) -> SymbolResult<ScopeValue> {
        let (first, rest) = selector
            .members
            .split_first()
            .ok_or_else(|| SymbolError::syntax(selector.pos, "selector has no members"))?;
        let mut current = self.get(first)?.ok_or_else(|| {
            SymbolError::at(
                selector.pos,
                ErrorCode::UnknownSelector,
                format!("unknown selector {}", first),
            )
        })?;
        let mut path = first.clone();
        for member in rest {
            current = match current {
                ScopeValue::Object(object) => object.get(member)?.ok_or_else(|| {
                    SymbolError::at(
                        selector.pos,
                        ErrorCode::UnknownProperty,
                        format!("{} has no member {}", path, member),
                    )
                })?,
                ScopeValue::Class(_) => {
                    return Err(SymbolError::at(
                        selector.pos,
                        ErrorCode::UnknownProperty,
                        format!("{} has no member {}", path, member),
                    ))
                }
                other => {
                    return Err(SymbolError::at(
                        selector.pos,
                        ErrorCode::CannotAccessProperty,
                        format!("cannot access property {} on {}", member, other.kind()),
                    ))
                }
            };
            path.push('.');
            path.push_str(member);
        }
        Ok(current)
    }

    /// Resolves a type annotation. `[]Partial<X>?` nests as
    /// `Nilable(Array(Partial(X)))`.
    pub fn type_expression(&self, node: &TypeExpression) -> SymbolResult<Class> {
        let mut class = match self.resolve_selector(&node.selector)? {
            ScopeValue::Class(class) => class,
            other => {
                return Err(SymbolError::at(
                    node.pos,
                    ErrorCode::InvalidClass,
                    format!("{} is a {}, not a class", node.selector.path(), other.kind()),
                ))
            }
        };
        if node.is_partial {
            if class.descriptors().properties.is_none() {
                return Err(SymbolError::at(
                    node.pos,
                    ErrorCode::InvalidClass,
                    format!("{} has no properties to make partial", class),
                ));
            }
            class = Class::partial(class);
        }
        if node.is_array {
            class = Class::array(class);
        }
        if node.is_optional {
            class = Class::nilable(class);
        }
        Ok(class)
    }
}

impl fmt::Debug for SymbolTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut immutable: Vec<&String> = self.immutable.keys().collect();
        immutable.sort();
        let mut local: Vec<&String> = self.local.keys().collect();
        local.sort();
        f.debug_struct("SymbolTable")
            .field("immutable", &immutable)
            .field("local", &local)
            .field("root", &self.root.is_some())
            .field("in_loop", &self.loop_state.is_some())
            .finish()
    }
}

fn cannot_get_length(class: &Class) -> SymbolError {
    SymbolError::new(
        ErrorCode::CannotEnumerate,
        format!("cannot get length of {}", class),
    )
}

/// `len` takes any enumerable value, which no single argument class
/// describes. `Any` is left to the dynamic pass.
struct Length(Function);

impl Callable for Length {
    fn arguments(&self) -> &[Class] {
        self.0.arguments()
    }

    fn returns(&self) -> Option<&Class> {
        self.0.returns()
    }

    fn call(&self, arguments: Vec<Value>) -> SymbolResult<Option<Value>> {
        self.0.call(arguments)
    }

    fn check(&self, arguments: &[Class]) -> SymbolResult<()> {
        match arguments.first() {
            Some(class) if *class != Class::Any && class.descriptors().enumerable.is_none() => {
                Err(cannot_get_length(class))
            }
            _ => Ok(()),
        }
    }
}

fn len() -> Function {
    Function::from_parts(
        vec![Class::Any],
        Some(Class::Integer),
        Arc::new(|arguments: Vec<Value>| {
            let value = arguments.into_iter().next().unwrap_or(Value::Nil);
            let class = value.class();
            let descriptors = class.descriptors();
            match &descriptors.enumerable {
                Some(enumerable) => Ok(Some(Value::Integer((enumerable.length)(&value)?))),
                None => Err(cannot_get_length(&class)),
            }
        }),
    )
}

fn print() -> Function {
    Function::from_parts(
        vec![Class::Any],
        None,
        Arc::new(|arguments: Vec<Value>| {
            for value in arguments {
                debug!(target: "hyperlang::print", "{}", value);
                println!("{}", value);
            }
            Ok(None)
        }),
    )
}
