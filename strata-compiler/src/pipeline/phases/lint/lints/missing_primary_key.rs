//! Lint for resources without a primary key.

use super::super::Lint;
use crate::{
    pipeline::{Diagnostic, codes},
    symbols::SymbolTable,
};

/// Lint that warns when a resource has neither a `@primary` field nor a
/// required `id` field.
pub struct MissingPrimaryKeyLint;

impl Lint for MissingPrimaryKeyLint {
    fn name(&self) -> &'static str {
        "missing-primary-key"
    }

    fn description(&self) -> &'static str {
        "Check every resource has a primary key"
    }

    fn check(&self, symbols: &SymbolTable, diagnostics: &mut Vec<Diagnostic>) {
        for symbol in symbols.iter().filter(|s| s.primary_key.is_none()) {
            diagnostics.push(
                Diagnostic::new(
                    codes::MISSING_PRIMARY_KEY,
                    format!(
                        "resource `{}` has no primary key; add `id: uuid! @primary`",
                        symbol.name
                    ),
                )
                .at(symbol.file, symbol.decl.name.span),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use strata_syntax::parse_source;

    use super::*;

    #[test]
    fn test_implicit_id_counts() {
        let (program, _) = parse_source(
            "resource A { id: uuid! }\nresource B { key: int! @primary }\nresource C { name: string! }",
        );
        let (symbols, _) = SymbolTable::build(&[program]);

        let mut diagnostics = Vec::new();
        MissingPrimaryKeyLint.check(&symbols.unwrap(), &mut diagnostics);

        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].message.contains("`C`"));
    }
}
