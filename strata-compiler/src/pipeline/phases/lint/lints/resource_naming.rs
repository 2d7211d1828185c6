//! Lint for resource naming conventions.

use strata_core::{is_pascal_case, to_pascal_case};

use super::super::Lint;
use crate::{
    pipeline::{Diagnostic, codes},
    symbols::SymbolTable,
};

/// Lint that warns about resource names that aren't PascalCase.
///
/// Generated type names come straight from resource names, so `blog_post`
/// would produce a type Rust itself warns about.
pub struct ResourceNamingLint;

impl Lint for ResourceNamingLint {
    fn name(&self) -> &'static str {
        "resource-naming"
    }

    fn description(&self) -> &'static str {
        "Check resource names are PascalCase"
    }

    fn check(&self, symbols: &SymbolTable, diagnostics: &mut Vec<Diagnostic>) {
        for symbol in symbols.iter() {
            if is_pascal_case(&symbol.name) {
                continue;
            }
            let suggested = to_pascal_case(&symbol.name);
            let span = symbol.decl.name.span;
            diagnostics.push(
                Diagnostic::new(
                    codes::RESOURCE_NAMING,
                    format!("resource `{}` should be PascalCase, e.g. `{suggested}`", symbol.name),
                )
                .at(symbol.file, span)
                .with_fix(span, suggested),
            );
        }
    }
}
