//! Check phase - typed IR per resource.

use eyre::{Result, eyre};
use rayon::prelude::*;

use crate::{
    pipeline::{CompilationContext, Phase, Stage},
    typeck::check_resource,
};

/// Phase that type checks every resource.
///
/// Resources are independent once the symbol table exists, so they are
/// checked in parallel. Output keeps declaration order.
///
/// This phase must run after `CollectPhase`; without a symbol table there
/// is nothing to check.
pub struct CheckPhase;

impl Phase for CheckPhase {
    fn name(&self) -> &'static str {
        "check"
    }

    fn description(&self) -> &'static str {
        "Type check resources into the typed IR"
    }

    fn requires(&self) -> Stage {
        Stage::Collected
    }

    fn run(&self, ctx: &mut CompilationContext) -> Result<()> {
        let Some(symbols) = &ctx.symbols else {
            return Ok(());
        };
        let sources = &ctx.sources;
        let token = ctx.cancellation.clone();

        let checked = symbols
            .iter()
            .collect::<Vec<_>>()
            .into_par_iter()
            .map(|symbol| {
                if token.is_cancelled() {
                    return Ok(None);
                }
                let source = sources
                    .get(symbol.file)
                    .ok_or_else(|| eyre!("no source loaded for resource `{}`", symbol.name))?;
                let _span = tracing::trace_span!("resource", name = %symbol.name).entered();
                Ok(Some(check_resource(symbols, symbol, source)))
            })
            .collect::<Result<Vec<_>>>()?;

        for (ir, diagnostics) in checked.into_iter().flatten() {
            ctx.diagnostics.extend(diagnostics);
            ctx.resources.push(ir);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use strata_syntax::SourceFile;

    use super::*;
    use crate::pipeline::{
        codes,
        phases::{CollectPhase, ParsePhase},
    };

    fn check(text: &str) -> CompilationContext {
        let mut ctx = CompilationContext::new(vec![SourceFile::new("main.strata", text)]);
        ParsePhase.run(&mut ctx).unwrap();
        CollectPhase.run(&mut ctx).unwrap();
        CheckPhase.run(&mut ctx).unwrap();
        ctx
    }

    #[test]
    fn test_resources_keep_declaration_order() {
        let ctx = check(
            "resource Zebra { id: uuid! }\nresource Apple { id: uuid! }\nresource Mango { id: uuid! }",
        );
        let names: Vec<&str> = ctx.resources.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["Zebra", "Apple", "Mango"]);
    }

    #[test]
    fn test_errors_block_only_their_resource() {
        let ctx = check(
            "resource Good { id: uuid! }\nresource Bad {\n  id: uuid!\n  @computed n: int! { \"text\" }\n}",
        );
        assert_eq!(ctx.error_count(), 1);
        let error = ctx.diagnostics.errors().next().unwrap();
        assert_eq!(error.code, codes::MISMATCH);
        let generable: Vec<&str> = ctx
            .generable_resources()
            .iter()
            .map(|r| r.name.as_str())
            .collect();
        assert_eq!(generable, ["Good"]);
    }
}
