//! Compilation pipeline.
//!
//! A [`Pipeline`] runs the built-in phases over a set of source files:
//!
//! - parse: every file independently, in parallel
//! - collect: the single barrier that builds the symbol table and
//!   relationship graph
//! - lint: convention checks that only warn
//! - check: per-resource type checking into the typed IR, in parallel
//!
//! Every phase reports into the [`Diagnostics`] sink of a shared
//! [`CompilationContext`] and keeps going. Only a duplicate resource name
//! cancels the run, and even then the context comes back with everything
//! reported so far.
//!
//! # Example
//!
//! ```ignore
//! use strata_compiler::pipeline::Pipeline;
//!
//! let ctx = Pipeline::new().run(project.load_sources()?)?;
//! for diag in ctx.diagnostics.sorted() {
//!     eprintln!("{diag}");
//! }
//! ```

mod cancel;
mod context;
mod diagnostic;
mod phase;
pub mod phases;
mod plugin;
mod runner;

pub use cancel::CancellationToken;
pub use context::CompilationContext;
pub use diagnostic::{
    Category, Code, Diagnostic, Diagnostics, FileId, Fix, Location, ResolvedDiagnostic, Severity,
    codes,
};
pub use phase::{Phase, Stage};
pub use plugin::Plugin;
pub use runner::Pipeline;
