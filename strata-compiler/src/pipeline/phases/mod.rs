//! Built-in pipeline phases.
//!
//! This module provides the standard phases that run in every pipeline:
//!
//! - [`ParsePhase`] - tokenizes and parses every source file
//! - [`CollectPhase`] - builds the symbol table and relationship graph
//! - [`LintPhase`] - reports convention warnings
//! - [`CheckPhase`] - type checks each resource into the typed IR

mod check;
mod collect;
mod lint;
mod parse;

pub use check::CheckPhase;
pub use collect::CollectPhase;
pub use lint::{
    FieldNamingLint, Lint, LintInfo, LintPhase, MissingPrimaryKeyLint, RedundantModifierLint,
    ResourceNamingLint,
};
pub use parse::ParsePhase;
