//! Core IR: the typed, origin-annotated representation consumed by the
//! analysis passes and downstream tools.
//!
//! Mirrors the AST with [`crate::base::Origin`] in place of spans, a
//! tightened shape (workflows become explicit steps, capability phrases
//! become the closed [`CapabilityKind`] set), a dedicated PII type, and
//! explicit `Scope` statements.

pub mod lower;
mod nodes;
mod ty;

pub use lower::{lower_module, LowerResult};
pub use nodes::*;
pub use ty::{CapabilityKind, EffectAtom, EffectSet, Type};
