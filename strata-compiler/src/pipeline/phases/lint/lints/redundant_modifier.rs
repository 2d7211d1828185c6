//! Lint for modifiers that have no effect.

use strata_syntax::ast::HookTiming;

use super::super::Lint;
use crate::{
    pipeline::{Diagnostic, codes},
    symbols::SymbolTable,
};

/// Lint that warns about `@transaction` on `@before` hooks, which always
/// run inside the write transaction.
pub struct RedundantModifierLint;

impl Lint for RedundantModifierLint {
    fn name(&self) -> &'static str {
        "redundant-modifier"
    }

    fn description(&self) -> &'static str {
        "Check for hook modifiers that have no effect"
    }

    fn check(&self, symbols: &SymbolTable, diagnostics: &mut Vec<Diagnostic>) {
        for symbol in symbols.iter() {
            for hook in &symbol.decl.hooks {
                if hook.timing != HookTiming::Before {
                    continue;
                }
                for modifier in hook.modifiers.iter().filter(|m| m.name == "transaction") {
                    diagnostics.push(
                        Diagnostic::new(
                            codes::REDUNDANT_MODIFIER,
                            format!(
                                "`@before {}` already runs inside the write transaction; `@transaction` has no effect",
                                hook.event.name
                            ),
                        )
                        .at(symbol.file, modifier.span),
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use strata_syntax::parse_source;

    use super::*;

    #[test]
    fn test_only_before_hooks() {
        let (program, _) = parse_source(
            "resource A {\n  @before create @transaction { }\n  @after create @transaction { }\n}",
        );
        let (symbols, _) = SymbolTable::build(&[program]);

        let mut diagnostics = Vec::new();
        RedundantModifierLint.check(&symbols.unwrap(), &mut diagnostics);

        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].code, codes::REDUNDANT_MODIFIER);
    }
}
