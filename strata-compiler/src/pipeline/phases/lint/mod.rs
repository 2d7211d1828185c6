//! Lint phase - convention warnings over the symbol table.

mod lint;
pub mod lints;

use eyre::Result;
pub use lint::{Lint, LintInfo};
pub use lints::{
    FieldNamingLint, MissingPrimaryKeyLint, RedundantModifierLint, ResourceNamingLint,
};

use crate::pipeline::{CompilationContext, Phase, Stage};

/// Phase that runs configurable lints over the collected resources.
pub struct LintPhase {
    lints: Vec<Box<dyn Lint>>,
}

impl LintPhase {
    /// Create a new lint phase with the default lints.
    pub fn new() -> Self {
        Self {
            lints: vec![
                Box::new(ResourceNamingLint),
                Box::new(FieldNamingLint),
                Box::new(MissingPrimaryKeyLint),
                Box::new(RedundantModifierLint),
            ],
        }
    }

    /// Create a lint phase with no lints.
    pub fn empty() -> Self {
        Self { lints: Vec::new() }
    }

    /// Add a custom lint.
    pub fn with_lint(mut self, lint: impl Lint + 'static) -> Self {
        self.lints.push(Box::new(lint));
        self
    }

    /// Get the names of all lints that will be run.
    pub fn lint_names(&self) -> Vec<&'static str> {
        self.lints.iter().map(|l| l.name()).collect()
    }

    /// Get information about all lints that will be run.
    pub fn lint_info(&self) -> Vec<LintInfo> {
        self.lints.iter().map(|l| l.info()).collect()
    }
}

impl Default for LintPhase {
    fn default() -> Self {
        Self::new()
    }
}

impl Phase for LintPhase {
    fn name(&self) -> &'static str {
        "lint"
    }

    fn description(&self) -> &'static str {
        "Report naming and convention warnings"
    }

    fn requires(&self) -> Stage {
        Stage::Collected
    }

    fn run(&self, ctx: &mut CompilationContext) -> Result<()> {
        let Some(symbols) = &ctx.symbols else {
            return Ok(());
        };
        let mut diagnostics = Vec::new();
        for lint in &self.lints {
            lint.check(symbols, &mut diagnostics);
        }
        ctx.diagnostics.extend(diagnostics);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use strata_syntax::parse_source;

    use super::*;
    use crate::{pipeline::Diagnostic, symbols::SymbolTable};

    fn context(src: &str) -> CompilationContext {
        let (program, _) = parse_source(src);
        let (symbols, _) = SymbolTable::build(std::slice::from_ref(&program));
        let mut ctx = CompilationContext::new(Vec::new());
        ctx.programs.push(program);
        ctx.symbols = symbols;
        ctx
    }

    #[test]
    fn test_default_lints() {
        let phase = LintPhase::new();
        assert_eq!(
            phase.lint_names(),
            [
                "resource-naming",
                "field-naming",
                "missing-primary-key",
                "redundant-modifier"
            ]
        );
        assert!(phase.lint_info().iter().all(|l| !l.description.is_empty()));
    }

    #[test]
    fn test_custom_lint_only_warns() {
        struct EveryResourceLint;
        impl Lint for EveryResourceLint {
            fn name(&self) -> &'static str {
                "every-resource"
            }
            fn description(&self) -> &'static str {
                "Reports every resource"
            }
            fn check(&self, symbols: &SymbolTable, diagnostics: &mut Vec<Diagnostic>) {
                for symbol in symbols.iter() {
                    diagnostics.push(Diagnostic::new(
                        crate::pipeline::codes::RESOURCE_NAMING,
                        format!("saw {}", symbol.name),
                    ));
                }
            }
        }

        let mut ctx = context("resource A { id: uuid! }\nresource B { id: uuid! }");
        let phase = LintPhase::empty().with_lint(EveryResourceLint);
        phase.run(&mut ctx).unwrap();

        assert_eq!(ctx.warning_count(), 2);
        assert!(!ctx.has_errors());
    }

    #[test]
    fn test_skipped_without_symbols() {
        let mut ctx = CompilationContext::new(Vec::new());
        LintPhase::new().run(&mut ctx).unwrap();
        assert!(ctx.diagnostics.is_empty());
    }
}
