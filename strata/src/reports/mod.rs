//! Report data structures for commands.
//!
//! This module provides data structures that separate data collection from rendering.
//! Commands build reports, then render them to an Output target.

mod build;
mod check;
mod diagnostics;
mod output;

pub use build::{BuildReport, GenerationResult, PreviewFile, PreviewResult, WrittenResult};
pub use check::CheckReport;
pub use diagnostics::DiagnosticsReport;
pub use output::{Report, TerminalOutput};
