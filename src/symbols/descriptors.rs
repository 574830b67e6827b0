//! Per-class capability tables.
//!
//! Every capability is optional. A class without an operator table cannot be
//! the left operand of any operator, a class without an enumerable cannot be
//! indexed, and so on. Tables are written once while the class is built and
//! are read-only afterwards.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use super::class::Class;
use super::native::{Function, Handler};
use super::value::Value;
use crate::ast::Token;
use crate::error::{ErrorCode, SymbolError, SymbolResult};

pub type ConstructorFn = Arc<dyn Fn(Value) -> SymbolResult<Value> + Send + Sync>;
pub type RecordConstructorFn =
    Arc<dyn Fn(BTreeMap<String, Value>) -> SymbolResult<Value> + Send + Sync>;
pub type OperatorFn = Arc<dyn Fn(Value, Value) -> SymbolResult<Value> + Send + Sync>;
pub type ComparatorFn = Arc<dyn Fn(Value, Value) -> SymbolResult<bool> + Send + Sync>;
pub type GetterFn = Arc<dyn Fn(&Value) -> SymbolResult<Value> + Send + Sync>;
pub type SetterFn = Arc<dyn Fn(&Value, Value) -> SymbolResult<()> + Send + Sync>;
pub type MethodFn = Arc<dyn Fn(Value, Vec<Value>) -> SymbolResult<Option<Value>> + Send + Sync>;

pub type LengthFn = Arc<dyn Fn(&Value) -> SymbolResult<i64> + Send + Sync>;
pub type GetIndexFn = Arc<dyn Fn(&Value, i64) -> SymbolResult<Value> + Send + Sync>;
pub type SetIndexFn = Arc<dyn Fn(&Value, i64, Value) -> SymbolResult<()> + Send + Sync>;
pub type GetRangeFn = Arc<dyn Fn(&Value, i64, i64) -> SymbolResult<Value> + Send + Sync>;
pub type SetRangeFn = Arc<dyn Fn(&Value, i64, i64, Value) -> SymbolResult<()> + Send + Sync>;

#[derive(Clone)]
pub struct Property {
    pub class: Class,
    pub getter: GetterFn,
    pub setter: Option<SetterFn>,
}

/// Indexing protocol. A range read returns a value of the owning class.
#[derive(Clone)]
pub struct Enumerable {
    pub item: Class,
    pub length: LengthFn,
    pub get_index: GetIndexFn,
    pub set_index: Option<SetIndexFn>,
    pub get_range: GetRangeFn,
    pub set_range: Option<SetRangeFn>,
}

/// Instance method. `handler` receives the receiver first.
#[derive(Clone)]
pub struct Method {
    pub arguments: Vec<Class>,
    pub returns: Option<Class>,
    pub handler: MethodFn,
}

impl Method {
    /// Binds the method to a receiver, producing a plain function.
    pub fn bind(&self, this: Value) -> Function {
        let handler = self.handler.clone();
        Function::from_parts(
            self.arguments.clone(),
            self.returns.clone(),
            Arc::new(move |arguments| handler(this.clone(), arguments)),
        )
    }

    /// The method's signature without a receiver, for the static pass.
    pub fn signature(&self, name: &str) -> Function {
        let name = name.to_string();
        Function::from_parts(
            self.arguments.clone(),
            self.returns.clone(),
            Arc::new(move |_| {
                Err(SymbolError::new(
                    ErrorCode::InvalidCallExpression,
                    format!("method {} called without a receiver", name),
                ))
            }),
        )
    }
}

#[derive(Clone, Default)]
pub struct Descriptors {
    pub constructors: HashMap<Class, ConstructorFn>,
    pub record_constructor: Option<RecordConstructorFn>,
    pub operators: Option<HashMap<(Class, Token), OperatorFn>>,
    pub comparators: Option<HashMap<(Class, Token), ComparatorFn>>,
    pub properties: Option<BTreeMap<String, Property>>,
    pub enumerable: Option<Enumerable>,
    pub prototype: BTreeMap<String, Method>,
}

impl Descriptors {
    pub fn operator(&self, right: &Class, token: Token) -> Option<&OperatorFn> {
        self.operators.as_ref()?.get(&(right.clone(), token))
    }

    pub fn comparator(&self, right: &Class, token: Token) -> Option<&ComparatorFn> {
        self.comparators.as_ref()?.get(&(right.clone(), token))
    }

    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.as_ref()?.get(name)
    }

    /// Canonical text of the descriptor shape, used as the identity token of
    /// extension classes.
    pub fn shape(&self) -> String {
        let mut constructors: Vec<String> =
            self.constructors.keys().map(ToString::to_string).collect();
        constructors.sort();

        let operators = keys_of(&self.operators);
        let comparators = keys_of(&self.comparators);

        let properties = match &self.properties {
            Some(properties) => properties
                .iter()
                .map(|(name, prop)| {
                    let access = if prop.setter.is_some() { "rw" } else { "r" };
                    format!("{}:{}:{}", name, prop.class, access)
                })
                .collect::<Vec<_>>()
                .join(","),
            None => "-".to_string(),
        };
        let enumerable = match &self.enumerable {
            Some(enumerable) => enumerable.item.to_string(),
            None => "-".to_string(),
        };
        let prototype = self.prototype.keys().cloned().collect::<Vec<_>>().join(",");

        format!(
            "new[{}]record[{}]op[{}]cmp[{}]props[{}]enum[{}]proto[{}]",
            constructors.join(","),
            self.record_constructor.is_some(),
            operators,
            comparators,
            properties,
            enumerable,
            prototype
        )
    }
}

fn keys_of<V>(table: &Option<HashMap<(Class, Token), V>>) -> String {
    match table {
        Some(table) => {
            let mut keys: Vec<String> = table
                .keys()
                .map(|(class, token)| format!("{}{}", token, class))
                .collect();
            keys.sort();
            keys.join(",")
        }
        None => "-".to_string(),
    }
}

/// Builds a descriptor table through the native adapter.
///
/// Registration mismatches are remembered and reported by [`build`], so a
/// whole table can be declared in one chain.
///
/// [`build`]: DescriptorBuilder::build
pub struct DescriptorBuilder {
    this: Class,
    descriptors: Descriptors,
    error: Option<SymbolError>,
}

impl DescriptorBuilder {
    pub fn new(this: Class) -> Self {
        Self {
            this,
            descriptors: Descriptors::default(),
            error: None,
        }
    }

    fn adapt<A, H: Handler<A>>(
        &mut self,
        what: &str,
        arguments: Vec<Class>,
        returns: Option<Class>,
        handler: H,
    ) -> Option<Function> {
        match Function::native(arguments, returns, handler) {
            Ok(function) => Some(function),
            Err(err) => {
                if self.error.is_none() {
                    self.error = Some(SymbolError::registration(format!(
                        "{} of {}: {}",
                        what,
                        self.this,
                        err.message()
                    )));
                }
                None
            }
        }
    }

    pub fn constructor<A, H: Handler<A>>(mut self, from: Class, handler: H) -> Self {
        let this = self.this.clone();
        if let Some(function) = self.adapt("constructor", vec![from.clone()], Some(this), handler)
        {
            self.descriptors.constructors.insert(
                from,
                Arc::new(move |value| function.invoke_value(vec![value])),
            );
        }
        self
    }

    pub fn record_constructor<F>(mut self, handler: F) -> Self
    where
        F: Fn(BTreeMap<String, Value>) -> SymbolResult<Value> + Send + Sync + 'static,
    {
        self.descriptors.record_constructor = Some(Arc::new(handler));
        self
    }

    pub fn operator<A, H: Handler<A>>(mut self, right: Class, token: Token, handler: H) -> Self {
        let arguments = vec![self.this.clone(), right.clone()];
        let returns = Some(Class::Any);
        if let Some(function) = self.adapt("operator", arguments, returns, handler) {
            self.descriptors.operators.get_or_insert_with(HashMap::new).insert(
                (right, token),
                Arc::new(move |left, right| function.invoke_value(vec![left, right])),
            );
        }
        self
    }

    pub fn comparator<A, H: Handler<A>>(mut self, right: Class, token: Token, handler: H) -> Self {
        let arguments = vec![self.this.clone(), right.clone()];
        if let Some(function) = self.adapt("comparator", arguments, Some(Class::Boolean), handler)
        {
            self.descriptors.comparators.get_or_insert_with(HashMap::new).insert(
                (right, token),
                Arc::new(move |left, right| function.invoke_value(vec![left, right])?.as_bool()),
            );
        }
        self
    }

    pub fn property<A, H: Handler<A>>(mut self, name: &str, class: Class, getter: H) -> Self {
        let arguments = vec![self.this.clone()];
        if let Some(function) = self.adapt("getter", arguments, Some(class.clone()), getter) {
            self.descriptors.properties.get_or_insert_with(BTreeMap::new).insert(
                name.to_string(),
                Property {
                    class,
                    getter: Arc::new(move |value: &Value| function.invoke_value(vec![value.clone()])),
                    setter: None,
                },
            );
        }
        self
    }

    /// Adds a setter to a property declared earlier with [`property`].
    ///
    /// [`property`]: DescriptorBuilder::property
    pub fn setter<A, H: Handler<A>>(mut self, name: &str, setter: H) -> Self {
        let class = match self.descriptors.property(name) {
            Some(prop) => prop.class.clone(),
            None => {
                self.error.get_or_insert_with(|| {
                    SymbolError::registration(format!("setter for undeclared property {}", name))
                });
                return self;
            }
        };
        let arguments = vec![self.this.clone(), class];
        if let Some(function) = self.adapt("setter", arguments, None, setter) {
            if let Some(prop) = self
                .descriptors
                .properties
                .as_mut()
                .and_then(|props| props.get_mut(name))
            {
                prop.setter = Some(Arc::new(move |target: &Value, value: Value| {
                    function.invoke(vec![target.clone(), value]).map(|_| ())
                }));
            }
        }
        self
    }

    /// Adds a property from raw getter and setter functions.
    pub fn raw_property(mut self, name: &str, property: Property) -> Self {
        self.descriptors
            .properties
            .get_or_insert_with(BTreeMap::new)
            .insert(name.to_string(), property);
        self
    }

    pub fn enumerable(mut self, enumerable: Enumerable) -> Self {
        self.descriptors.enumerable = Some(enumerable);
        self
    }

    pub fn method<A, H: Handler<A>>(
        mut self,
        name: &str,
        arguments: Vec<Class>,
        returns: Option<Class>,
        handler: H,
    ) -> Self {
        let mut full = vec![self.this.clone()];
        full.extend(arguments.iter().cloned());
        if let Some(function) = self.adapt("method", full, returns.clone(), handler) {
            self.descriptors.prototype.insert(
                name.to_string(),
                Method {
                    arguments,
                    returns,
                    handler: Arc::new(move |this, mut rest| {
                        rest.insert(0, this);
                        function.invoke(rest)
                    }),
                },
            );
        }
        self
    }

    pub fn build(self) -> SymbolResult<Descriptors> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.descriptors),
        }
    }

    /// Builds a table known to be well formed. Registration errors are logged
    /// and the offending entries are left out.
    pub(crate) fn build_trusted(self) -> Descriptors {
        if let Some(err) = &self.error {
            tracing::error!("built-in descriptors of {}: {}", self.this, err);
        }
        self.descriptors
    }
}
