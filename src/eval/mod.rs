//! # Evaluator
//!
//! Two walks over the same syntax tree. The static pass ([`Evaluate`])
//! computes classes and reports type errors before anything runs; the
//! dynamic pass ([`Resolve`]) computes values. Expressions share one walker
//! generic over [`Mode`], statements keep a handler per pass.

mod expression;
pub mod function;
pub mod mode;
pub mod program;
pub mod scope;
mod statement;

pub use mode::{Evaluate, Member, Mode, Resolve};
pub use program::{CheckErrors, CompiledProgram, Program};
pub use scope::{LoopState, SymbolTable};
