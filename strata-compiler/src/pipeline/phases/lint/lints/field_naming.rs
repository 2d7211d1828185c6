//! Lint for member naming conventions.

use strata_core::{is_snake_case, to_snake_case};
use strata_syntax::ast::Ident;

use super::super::Lint;
use crate::{
    pipeline::{Diagnostic, FileId, codes},
    symbols::SymbolTable,
};

/// Lint that warns about field, computed and function names that aren't
/// snake_case.
pub struct FieldNamingLint;

impl Lint for FieldNamingLint {
    fn name(&self) -> &'static str {
        "field-naming"
    }

    fn description(&self) -> &'static str {
        "Check member names are snake_case"
    }

    fn check(&self, symbols: &SymbolTable, diagnostics: &mut Vec<Diagnostic>) {
        for symbol in symbols.iter() {
            let decl = &symbol.decl;
            let names = decl
                .fields
                .iter()
                .map(|f| &f.name)
                .chain(decl.computed.iter().map(|c| &c.name))
                .chain(decl.functions.iter().map(|f| &f.name));
            for name in names {
                check_name(name, symbol.file, &symbol.name, diagnostics);
            }
        }
    }
}

fn check_name(name: &Ident, file: FileId, resource: &str, diagnostics: &mut Vec<Diagnostic>) {
    if is_snake_case(&name.name) {
        return;
    }
    let suggested = to_snake_case(&name.name);
    diagnostics.push(
        Diagnostic::new(
            codes::FIELD_NAMING,
            format!(
                "`{resource}.{}` should be snake_case, e.g. `{suggested}`",
                name.name
            ),
        )
        .at(file, name.span)
        .with_fix(name.span, suggested),
    );
}
