//! # Class Model
//!
//! Classes, values and the capabilities attached to them.
//!
//! ## Core Components
//! - [`Class`]: a closed sum of built-in classes plus an extension variant
//! - [`Value`]: a runtime datum, serializable to a primitive tree
//! - [`Descriptors`]: constructors, operators, comparators, properties,
//!   enumerable protocol and instance methods of a class
//! - [`Object`] and [`Callable`]: member lookup and typed invocation
//!
//! ## Conversions
//! Values move between classes through [`construct`], which is mirrored by
//! [`should_construct`] over classes alone. Binary operators go through
//! [`operate`]/[`compare`] and their static counterparts.

mod class;
pub(crate) mod composite;
mod construct;
mod descriptors;
mod dispatch;
mod native;
mod object;
mod primitives;
mod value;

pub use class::{Class, ClassDef, ClassRef, MapClass};
pub use composite::record_class;
pub use construct::{construct, should_construct};
pub use descriptors::{
    ComparatorFn, ConstructorFn, DescriptorBuilder, Descriptors, Enumerable, GetterFn, Method,
    OperatorFn, Property, RecordConstructorFn, SetterFn,
};
pub use dispatch::{compare, operate, should_compare, should_operate};
pub use native::{FromValue, Function, Handler, IntoValue, NativeFn};
pub use object::{Callable, MockObject, Object, Package, ScopeValue};
pub(crate) use primitives::{arithmetic, ordering};
pub use value::{
    ArrayValue, ErrorValue, Instance, MapValue, NilableValue, PartialValue, Value,
};
