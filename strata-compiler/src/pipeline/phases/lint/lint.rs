//! Lint trait for convention checks.

use crate::{pipeline::Diagnostic, symbols::SymbolTable};

/// Information about a lint.
#[derive(Debug, Clone)]
pub struct LintInfo {
    pub name: &'static str,
    pub description: &'static str,
}

/// A lint that checks declared resources for convention issues.
///
/// Lints only ever report warnings; they never block generation.
pub trait Lint: Send + Sync {
    /// The name of this lint.
    fn name(&self) -> &'static str;

    /// A human-readable description of what this lint checks.
    fn description(&self) -> &'static str;

    /// Check the resources and add any diagnostics.
    fn check(&self, symbols: &SymbolTable, diagnostics: &mut Vec<Diagnostic>);

    fn info(&self) -> LintInfo {
        LintInfo {
            name: self.name(),
            description: self.description(),
        }
    }
}
