use core::fmt;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use lazy_static::lazy_static;

use super::composite;
use super::descriptors::{DescriptorBuilder, Descriptors};
use super::primitives;
use crate::error::SymbolResult;

/// A class of values.
///
/// The built-in classes form a closed sum type. Composite classes are built on
/// demand and compare structurally, so `Class::array(Class::Integer)` built in
/// two places is the same class. Classes defined outside the core are carried
/// by the `Extension` variant and own their descriptor table.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Class {
    Nil,
    Boolean,
    String,
    Number,
    Double,
    Float,
    Integer,
    DateTime,
    Error,
    Any,
    Array(Box<Class>),
    Nilable(Box<Class>),
    Map(MapClass),
    Partial(Box<Class>),
    Extension(ClassRef),
}

/// Structural record class: a name-keyed set of field classes.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct MapClass {
    pub properties: BTreeMap<String, Class>,
}

impl MapClass {
    pub fn new(properties: BTreeMap<String, Class>) -> Self {
        Self { properties }
    }
}

lazy_static! {
    static ref COMPOSITES: DashMap<Class, Arc<Descriptors>> = DashMap::new();
}

impl Class {
    pub fn array(item: Class) -> Self {
        Class::Array(Box::new(item))
    }

    /// Wraps a class as nilable. Wrapping twice is a no-op.
    pub fn nilable(inner: Class) -> Self {
        match inner {
            Class::Nilable(_) => inner,
            inner => Class::Nilable(Box::new(inner)),
        }
    }

    pub fn partial(of: Class) -> Self {
        Class::Partial(Box::new(of))
    }

    pub fn map<K: Into<String>>(properties: impl IntoIterator<Item = (K, Class)>) -> Self {
        Class::Map(MapClass::new(
            properties.into_iter().map(|(k, c)| (k.into(), c)).collect(),
        ))
    }

    pub fn name(&self) -> String {
        self.to_string()
    }

    pub fn is_nilable(&self) -> bool {
        matches!(self, Class::Nilable(_))
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Class::Number | Class::Double | Class::Float | Class::Integer
        )
    }

    /// The descriptor set attached to this class.
    pub fn descriptors(&self) -> Arc<Descriptors> {
        match self {
            Class::Nil => primitives::NIL.clone(),
            Class::Boolean => primitives::BOOLEAN.clone(),
            Class::String => primitives::STRING.clone(),
            Class::Number => primitives::NUMBER.clone(),
            Class::Double => primitives::DOUBLE.clone(),
            Class::Float => primitives::FLOAT.clone(),
            Class::Integer => primitives::INTEGER.clone(),
            Class::DateTime => primitives::DATETIME.clone(),
            Class::Error => primitives::ERROR.clone(),
            Class::Any => primitives::ANY.clone(),
            Class::Extension(class) => class.descriptors(),
            Class::Array(_) | Class::Nilable(_) | Class::Map(_) | Class::Partial(_) => {
                if let Some(found) = COMPOSITES.get(self) {
                    return found.clone();
                }
                // Built outside the map lock: building may look up other composites.
                let built = Arc::new(composite::build(self));
                COMPOSITES.entry(self.clone()).or_insert(built).clone()
            }
        }
    }
}

impl fmt::Display for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Class::Nil => write!(f, "Nil"),
            Class::Boolean => write!(f, "Boolean"),
            Class::String => write!(f, "String"),
            Class::Number => write!(f, "Number"),
            Class::Double => write!(f, "Double"),
            Class::Float => write!(f, "Float"),
            Class::Integer => write!(f, "Integer"),
            Class::DateTime => write!(f, "DateTime"),
            Class::Error => write!(f, "Error"),
            Class::Any => write!(f, "Any"),
            Class::Array(item) => write!(f, "[]{}", item),
            Class::Nilable(inner) => write!(f, "{}?", inner),
            Class::Map(_) => write!(f, "Map"),
            Class::Partial(of) => write!(f, "Partial<{}>", of),
            Class::Extension(class) => write!(f, "{}", class.name()),
        }
    }
}

/// Definition of an extension class.
///
/// The descriptor table and its shape token are filled exactly once while the
/// class is being defined, which lets descriptors refer back to the class
/// itself (a `Duration` operator keyed by `Duration`).
pub struct ClassDef {
    name: String,
    descriptors: OnceLock<Arc<Descriptors>>,
    shape: OnceLock<String>,
}

/// Shared handle to an extension class definition.
///
/// Equality compares the name and the descriptor shape token. Hashing only
/// uses the name, so a handle stays valid as a map key while its own
/// descriptors are being built.
#[derive(Clone)]
pub struct ClassRef(Arc<ClassDef>);

impl ClassRef {
    /// Defines an extension class. The closure receives the class being
    /// defined and a builder for its descriptors.
    pub fn define<F>(name: &str, build: F) -> SymbolResult<Class>
    where
        F: FnOnce(&Class, DescriptorBuilder) -> DescriptorBuilder,
    {
        let def = Arc::new(ClassDef {
            name: name.to_string(),
            descriptors: OnceLock::new(),
            shape: OnceLock::new(),
        });
        let this = Class::Extension(ClassRef(def.clone()));
        let descriptors = build(&this, DescriptorBuilder::new(this.clone())).build()?;
        let _ = def.shape.set(descriptors.shape());
        let _ = def.descriptors.set(Arc::new(descriptors));
        Ok(this)
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn shape(&self) -> &str {
        self.0.shape.get().map(String::as_str).unwrap_or_default()
    }

    pub fn descriptors(&self) -> Arc<Descriptors> {
        match self.0.descriptors.get() {
            Some(descriptors) => descriptors.clone(),
            None => Arc::new(Descriptors::default()),
        }
    }
}

impl PartialEq for ClassRef {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
            || (self.0.name == other.0.name && self.shape() == other.shape())
    }
}

impl Eq for ClassRef {}

impl Hash for ClassRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.name.hash(state);
    }
}

impl fmt::Debug for ClassRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClassRef({})", self.0.name)
    }
}
