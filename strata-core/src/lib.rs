//! Core utilities and types for the Strata resource compiler.
//!
//! This crate provides the small, dependency-light building blocks shared by
//! every other crate in the workspace: the primitive type vocabulary, case
//! conversion, pluralization and generated-file write rules.

mod file;
mod types;
mod utils;

// File operations
pub use file::{File, FileRules, GeneratedFile, WriteResult};
// Fundamental types
pub use types::Primitive;
// String utilities
pub use utils::{is_pascal_case, is_snake_case, to_pascal_case, to_plural, to_snake_case};
