use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use super::scope::SymbolTable;
use crate::ast::FunctionBlock;
use crate::error::{ErrorCode, SymbolError, SymbolResult};
use crate::symbols::{Callable, Class, Function, ScopeValue, Value};
use crate::{Error, InternalResult};

/// Named function blocks checked and compiled together. Functions may call
/// each other, including themselves, by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub functions: BTreeMap<String, FunctionBlock>,
}

/// Every static error found in a program, tagged with its function.
#[derive(Error, Debug, Default)]
#[error("{}", display_errors(.errors))]
pub struct CheckErrors {
    pub errors: Vec<(String, SymbolError)>,
}

fn display_errors(errors: &[(String, SymbolError)]) -> String {
    errors
        .iter()
        .map(|(function, err)| format!("{}: {}", function, err))
        .collect::<Vec<_>>()
        .join("\n")
}

impl CheckErrors {
    /// Add an error to the list
    pub fn add_error(&mut self, function: &str, error: SymbolError) {
        self.errors.push((function.to_string(), error));
    }

    /// Check if there are any errors
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Take all errors, leaving the list empty
    pub fn take_errors(&mut self) -> Vec<(String, SymbolError)> {
        std::mem::take(&mut self.errors)
    }
}

/// A function known by signature while the program is checked, linked to
/// its compiled body afterwards.
struct Linked {
    name: String,
    arguments: Vec<Class>,
    returns: Option<Class>,
    target: OnceLock<Function>,
}

impl Callable for Linked {
    fn arguments(&self) -> &[Class] {
        &self.arguments
    }

    fn returns(&self) -> Option<&Class> {
        self.returns.as_ref()
    }

    fn call(&self, arguments: Vec<Value>) -> SymbolResult<Option<Value>> {
        match self.target.get() {
            Some(function) => function.call(arguments),
            None => Err(SymbolError::new(
                ErrorCode::InvalidCallExpression,
                format!("function {} is not compiled", self.name),
            )),
        }
    }
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_function(mut self, name: &str, block: FunctionBlock) -> Self {
        self.functions.insert(name.to_string(), block);
        self
    }

    pub fn from_json(json: &str) -> InternalResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Checks every function against `scope`, collecting all errors.
    #[tracing::instrument(
        level = "debug",
        skip(self, scope),
        fields(functions = self.functions.len())
    )]
    pub fn check(&self, scope: &SymbolTable) -> InternalResult<CompiledProgram> {
        let mut errors = CheckErrors::default();
        let mut table = scope.clone();
        let mut linked = BTreeMap::new();

        for (name, block) in &self.functions {
            if table.get(name).map_or(true, |found| found.is_some()) {
                errors.add_error(
                    name,
                    SymbolError::at(
                        block.pos,
                        ErrorCode::CannotRedeclareValue,
                        format!("cannot redeclare value {}", name),
                    ),
                );
                continue;
            }
            match table.signature(block) {
                Ok((arguments, returns)) => {
                    let link = Arc::new(Linked {
                        name: name.clone(),
                        arguments,
                        returns,
                        target: OnceLock::new(),
                    });
                    table.bind(name, ScopeValue::Callable(link.clone()));
                    linked.insert(name.clone(), link);
                }
                Err(err) => errors.add_error(name, err),
            }
        }

        let mut functions = BTreeMap::new();
        for (name, link) in &linked {
            let Some(block) = self.functions.get(name) else {
                continue;
            };
            match table.resolve_function_block(block) {
                Ok(function) => {
                    debug!("checked function {}", name);
                    let _ = link.target.set(function.clone());
                    functions.insert(name.clone(), function);
                }
                Err(err) => errors.add_error(name, err),
            }
        }

        if errors.has_errors() {
            info!("program check failed with {} errors", errors.errors.len());
            return Err(Error::Check(errors));
        }
        Ok(CompiledProgram { functions })
    }
}

/// The functions of a program that passed its check.
#[derive(Debug, Clone)]
pub struct CompiledProgram {
    functions: BTreeMap<String, Function>,
}

impl CompiledProgram {
    pub fn get(&self, name: &str) -> Option<&Function> {
        self.functions.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.functions.keys()
    }

    /// Calls a function by name. Arguments are constructed into the
    /// declared parameter classes.
    pub fn invoke(&self, name: &str, arguments: Vec<Value>) -> SymbolResult<Option<Value>> {
        let function = self.get(name).ok_or_else(|| {
            SymbolError::new(
                ErrorCode::UnknownSelector,
                format!("unknown function {}", name),
            )
        })?;
        function.call(arguments)
    }
}
