//! # hyperlang: a typed DSL evaluator
//!
//! hyperlang checks and runs programs written in a small statically typed
//! language whose classes, operators and conversions are all described by
//! data. Host code extends the language by registering native functions and
//! extension classes.
//!
//! ## Class Model
//!
//! The [`symbols`] module defines classes, values and descriptors:
//! - Built-in classes are variants of [`symbols::Class`]; extension classes
//!   point at a descriptor table built once with a
//!   [`symbols::DescriptorBuilder`]
//! - Conversions between classes go through [`symbols::construct`]
//! - Binary operators dispatch on the left operand's class
//!   ([`symbols::operate`], [`symbols::compare`])
//! - Host closures are adapted into typed callables by
//!   [`symbols::Function::native`]
//!
//! ## Evaluation Pipeline
//!
//! ```text
//! Syntax Tree → Static Pass (Evaluate) → Compiled Functions → Dynamic Pass (Resolve)
//! ```
//!
//! ### Stage 1: Syntax Tree
//!
//! The [`ast`] module holds the serializable syntax tree. Every node carries
//! a position and can validate its own shape.
//!
//! ### Stage 2: Static Pass
//!
//! [`Program::check`] walks every function with the [`Evaluate`] mode,
//! computing classes only. All errors of a program are collected into
//! [`CheckErrors`].
//!
//! ### Stage 3: Dynamic Pass
//!
//! Checked functions run with the [`Resolve`] mode. Each invocation gets its
//! own copy of the scope captured when the function was checked.
//!
//! ## Packages and Payloads
//!
//! Native packages (`errors`, `math`, `mime`, `time`, `units`) live in [`stdlib`] and are
//! selected by [`config::EvaluatorConfig`]. The [`marshal`] module turns
//! external JSON payloads into typed values.

pub mod ast;
pub mod config;
pub mod error;
pub mod eval;
pub mod marshal;
pub mod stdlib;
pub mod symbols;

// Re-exports
pub use ast::*;
pub use error::*;
pub use eval::*;
