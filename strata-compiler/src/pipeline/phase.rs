//! Pipeline phase trait.

use eyre::Result;

use super::CompilationContext;

/// How far a compilation has progressed. Each phase needs the context to
/// have reached some stage before it can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    /// Only source text is loaded.
    Sources,
    /// Every source file has a syntax tree.
    Parsed,
    /// The symbol table and relationship graph exist.
    Collected,
    /// Every resource in the symbol table has typed IR.
    Checked,
}

/// A phase in the compilation pipeline.
///
/// Built-in phases and the stage each one needs:
/// - `ParsePhase` - [`Stage::Sources`], tokenizes and parses every file
/// - `CollectPhase` - [`Stage::Parsed`], builds the symbol table and graph
/// - `LintPhase` - [`Stage::Collected`], reports convention warnings
/// - `CheckPhase` - [`Stage::Collected`], type checks every resource
///
/// Custom phases run after these and by default need [`Stage::Checked`].
pub trait Phase: Send + Sync {
    /// The name of this phase (used in logs and plugin hooks).
    fn name(&self) -> &'static str;

    /// A human-readable description of what this phase does.
    fn description(&self) -> &'static str;

    /// The stage the context must have reached for this phase to run.
    fn requires(&self) -> Stage {
        Stage::Checked
    }

    /// Whether this phase should run on `ctx`. A cancelled compilation runs
    /// nothing further, and a phase never sees a context missing what it
    /// reads.
    fn ready(&self, ctx: &CompilationContext) -> bool {
        !ctx.is_cancelled() && ctx.stage() >= self.requires()
    }

    /// Run this phase on the compilation context.
    ///
    /// # Errors
    ///
    /// Returns an error only for internal failures. Problems in the
    /// compiled sources are recorded as diagnostics instead.
    fn run(&self, ctx: &mut CompilationContext) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use strata_syntax::SourceFile;

    use super::*;
    use crate::pipeline::phases::{CheckPhase, CollectPhase, LintPhase, ParsePhase};

    fn context(text: &str) -> CompilationContext {
        CompilationContext::new(vec![SourceFile::new("app.strata", text)])
    }

    #[test]
    fn test_stage_advances_with_each_phase() {
        let mut ctx = context("resource Post { id: uuid! @primary }");
        assert_eq!(ctx.stage(), Stage::Sources);
        ParsePhase.run(&mut ctx).unwrap();
        assert_eq!(ctx.stage(), Stage::Parsed);
        CollectPhase.run(&mut ctx).unwrap();
        assert_eq!(ctx.stage(), Stage::Collected);
        CheckPhase.run(&mut ctx).unwrap();
        assert_eq!(ctx.stage(), Stage::Checked);
    }

    #[test]
    fn test_phase_waits_for_required_stage() {
        let mut ctx = context("resource Post { id: uuid! @primary }");
        assert!(ParsePhase.ready(&ctx));
        assert!(!CollectPhase.ready(&ctx));

        ParsePhase.run(&mut ctx).unwrap();
        assert!(CollectPhase.ready(&ctx));
        assert!(!CheckPhase.ready(&ctx));
        assert!(!LintPhase::new().ready(&ctx));
    }

    #[test]
    fn test_cancelled_context_is_never_ready() {
        let ctx = context("resource Post { id: uuid! @primary }");
        ctx.cancellation.cancel();
        assert!(!ParsePhase.ready(&ctx));
    }
}
