//! Parse phase - one syntax tree per source file.

use eyre::Result;
use rayon::prelude::*;
use strata_syntax::{SyntaxError, parse_source};

use crate::{
    pipeline::{CompilationContext, Diagnostic, FileId, Phase, Stage, codes},
    stdlib,
};

/// Phase that tokenizes and parses every source file.
///
/// Files are parsed in parallel; results keep the order the files were
/// loaded in. Syntax errors never stop the phase, the recovered tree is
/// kept alongside them.
pub struct ParsePhase;

impl Phase for ParsePhase {
    fn name(&self) -> &'static str {
        "parse"
    }

    fn description(&self) -> &'static str {
        "Tokenize and parse source files"
    }

    fn requires(&self) -> Stage {
        Stage::Sources
    }

    fn run(&self, ctx: &mut CompilationContext) -> Result<()> {
        let token = ctx.cancellation.clone();
        let parsed: Vec<_> = ctx
            .sources
            .par_iter()
            .enumerate()
            .map(|(file, source)| {
                if token.is_cancelled() {
                    return None;
                }
                let (program, errors) = parse_source(source.text());
                tracing::trace!(file = %source.name(), errors = errors.len(), "parsed");
                Some((program, errors, file))
            })
            .collect();

        for (program, errors, file) in parsed.into_iter().flatten() {
            ctx.diagnostics
                .extend(errors.iter().map(|err| syntax_diagnostic(err, file)));
            ctx.programs.push(program);
        }
        Ok(())
    }
}

fn syntax_diagnostic(err: &SyntaxError, file: FileId) -> Diagnostic {
    let namespace = match err {
        SyntaxError::MethodCall { method, .. } => stdlib::namespace_for(method),
        _ => None,
    };
    let diagnostic = Diagnostic::new(codes::syntax(err.code()), err.to_string()).at(file, err.span());
    match err.suggestion(namespace) {
        Some(replacement) => diagnostic.with_fix(err.span(), replacement),
        None => diagnostic,
    }
}
