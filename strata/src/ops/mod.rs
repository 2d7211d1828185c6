//! Core operations.
//!
//! This module contains the business logic for strata commands,
//! separated from CLI argument parsing and output rendering.

pub mod build;
pub mod check;

pub use build::{BuildOptions, build};
pub use check::check;
use eyre::{Context, Result};
use strata_codegen_rust::NameCheckPhase;
use strata_compiler::pipeline::{CompilationContext, Pipeline};
use strata_syntax::SourceFile;

use crate::timing::TimingPlugin;

/// Run every compiler phase, plus the Rust name checks, over `sources`.
fn compile(sources: Vec<SourceFile>) -> Result<CompilationContext> {
    Pipeline::new()
        .phase(NameCheckPhase)
        .plugin(TimingPlugin::default())
        .run(sources)
        .wrap_err("Compilation failed")
}
