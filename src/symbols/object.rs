use core::fmt;
use std::collections::BTreeMap;
use std::sync::Arc;

use mockall::automock;

use super::class::Class;
use super::value::Value;
use crate::error::SymbolResult;

/// Anything supporting named-member lookup: packages, modules, namespaces.
#[automock]
pub trait Object: Send + Sync {
    /// Looks up a member. `Ok(None)` means the member does not exist.
    fn get(&self, key: &str) -> SymbolResult<Option<ScopeValue>>;
}

/// A typed, invocable capability.
pub trait Callable: Send + Sync {
    fn arguments(&self) -> &[Class];
    /// `None` for effect-only callables.
    fn returns(&self) -> Option<&Class>;
    /// Invokes with already constructed arguments.
    fn call(&self, arguments: Vec<Value>) -> SymbolResult<Option<Value>>;
    /// Static check of argument classes the declared classes cannot express.
    fn check(&self, _arguments: &[Class]) -> SymbolResult<()> {
        Ok(())
    }
}

/// Everything a name can be bound to in a symbol table.
#[derive(Clone)]
pub enum ScopeValue {
    /// A runtime value, seen by the dynamic pass.
    Value(Value),
    /// A placeholder carrying only the class of a value, seen by the static pass.
    Expected(Class),
    Class(Class),
    Object(Arc<dyn Object>),
    Callable(Arc<dyn Callable>),
}

impl ScopeValue {
    pub fn kind(&self) -> &'static str {
        match self {
            ScopeValue::Value(_) | ScopeValue::Expected(_) => "value",
            ScopeValue::Class(_) => "class",
            ScopeValue::Object(_) => "object",
            ScopeValue::Callable(_) => "callable",
        }
    }
}

impl fmt::Debug for ScopeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeValue::Value(value) => write!(f, "Value({:?})", value),
            ScopeValue::Expected(class) => write!(f, "Expected({})", class),
            ScopeValue::Class(class) => write!(f, "Class({})", class),
            ScopeValue::Object(_) => write!(f, "Object"),
            ScopeValue::Callable(callable) => {
                let arguments: Vec<String> =
                    callable.arguments().iter().map(ToString::to_string).collect();
                write!(f, "Callable({})", arguments.join(", "))
            }
        }
    }
}

impl From<Value> for ScopeValue {
    fn from(value: Value) -> Self {
        ScopeValue::Value(value)
    }
}

impl From<Class> for ScopeValue {
    fn from(class: Class) -> Self {
        ScopeValue::Class(class)
    }
}

/// A named set of members, used for native packages such as `math`.
#[derive(Clone, Default)]
pub struct Package {
    name: String,
    members: BTreeMap<String, ScopeValue>,
}

impl Package {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            members: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn with<V: Into<ScopeValue>>(mut self, key: &str, member: V) -> Self {
        self.members.insert(key.to_string(), member.into());
        self
    }

    pub fn with_callable<C: Callable + 'static>(self, key: &str, callable: C) -> Self {
        self.with(key, ScopeValue::Callable(Arc::new(callable)))
    }

    pub fn insert(&mut self, key: &str, member: ScopeValue) {
        self.members.insert(key.to_string(), member);
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.members.keys()
    }
}

impl Object for Package {
    fn get(&self, key: &str) -> SymbolResult<Option<ScopeValue>> {
        Ok(self.members.get(key).cloned())
    }
}

impl fmt::Debug for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Package")
            .field("name", &self.name)
            .field("members", &self.members.keys().collect::<Vec<_>>())
            .finish()
    }
}
