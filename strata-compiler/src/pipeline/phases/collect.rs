//! Collect phase - symbol table and relationship graph.

use eyre::Result;

use crate::{
    graph::RelationshipGraph,
    pipeline::{CompilationContext, Phase, Stage},
    symbols::SymbolTable,
};

/// Phase that gathers every resource in the project.
///
/// A duplicate resource name leaves the project without a usable symbol
/// table, so the compilation is cancelled and later phases do not run.
pub struct CollectPhase;

impl Phase for CollectPhase {
    fn name(&self) -> &'static str {
        "collect"
    }

    fn description(&self) -> &'static str {
        "Build the symbol table and relationship graph"
    }

    fn requires(&self) -> Stage {
        Stage::Parsed
    }

    fn run(&self, ctx: &mut CompilationContext) -> Result<()> {
        let (symbols, diagnostics) = SymbolTable::build(&ctx.programs);
        ctx.diagnostics.extend(diagnostics);

        let Some(symbols) = symbols else {
            tracing::debug!("duplicate resource names, cancelling compilation");
            ctx.cancellation.cancel();
            return Ok(());
        };

        let graph = RelationshipGraph::build(&symbols);
        ctx.diagnostics.extend(graph.validate(&symbols));
        tracing::debug!(resources = symbols.len(), "collected symbols");

        ctx.symbols = Some(symbols);
        ctx.graph = Some(graph);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use strata_syntax::SourceFile;

    use super::*;
    use crate::pipeline::{codes, phases::ParsePhase};

    fn collect(sources: &[&str]) -> CompilationContext {
        let sources = sources
            .iter()
            .enumerate()
            .map(|(i, text)| SourceFile::new(format!("{i}.strata"), *text))
            .collect();
        let mut ctx = CompilationContext::new(sources);
        ParsePhase.run(&mut ctx).unwrap();
        CollectPhase.run(&mut ctx).unwrap();
        ctx
    }

    #[test]
    fn test_builds_symbols_and_graph() {
        let ctx = collect(&[
            "resource User {\n  id: uuid! @primary\n  posts: array<Post>!\n}",
            "resource Post {\n  id: uuid! @primary\n  user: User!\n}",
        ]);
        assert!(!ctx.has_errors(), "{:?}", ctx.diagnostics);
        assert_eq!(ctx.symbols.as_ref().map(SymbolTable::len), Some(2));
        let graph = ctx.graph.as_ref().unwrap();
        assert_eq!(graph.edges("Post").len(), 1);
    }

    #[test]
    fn test_duplicate_resource_cancels() {
        let ctx = collect(&["resource User { id: uuid! }", "resource User { id: uuid! }"]);
        assert!(ctx.is_cancelled());
        assert!(ctx.symbols.is_none());
        assert!(
            ctx.diagnostics
                .iter()
                .any(|d| d.code == codes::DUPLICATE_RESOURCE)
        );
    }
}
