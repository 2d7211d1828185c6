//! Pipeline orchestrator.

use eyre::Result;
use strata_syntax::SourceFile;

use super::{
    CancellationToken, CompilationContext, Phase, Plugin,
    phases::{CheckPhase, CollectPhase, LintPhase, ParsePhase},
};

/// The compilation pipeline orchestrator.
///
/// The pipeline runs the built-in phases (parse, collect, lint, check)
/// followed by any user phases, calling plugin hooks before and after each
/// phase that is [ready](Phase::ready). A cancelled compilation skips the
/// remaining phases and still returns its context.
///
/// # Example
///
/// ```ignore
/// let pipeline = Pipeline::new()
///     .plugin(MyPlugin::new())
///     .phase(MyCustomPhase);
///
/// let ctx = pipeline.run(sources)?;
/// ```
pub struct Pipeline {
    phases: Vec<Box<dyn Phase>>,
    plugins: Vec<Box<dyn Plugin>>,
    cancellation: CancellationToken,
}

impl Pipeline {
    /// Create a new pipeline with default built-in phases.
    pub fn new() -> Self {
        Self {
            phases: Vec::new(),
            plugins: Vec::new(),
            cancellation: CancellationToken::new(),
        }
    }

    /// Add a phase to run after the built-in phases.
    pub fn phase(mut self, phase: impl Phase + 'static) -> Self {
        self.phases.push(Box::new(phase));
        self
    }

    /// Add a plugin to receive phase lifecycle hooks.
    pub fn plugin(mut self, plugin: impl Plugin + 'static) -> Self {
        self.plugins.push(Box::new(plugin));
        self
    }

    /// Use a token the caller can cancel from another thread.
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Run the pipeline over a set of source files.
    ///
    /// Executes all phases in order:
    /// 1. ParsePhase - one syntax tree per file
    /// 2. CollectPhase - symbol table and relationship graph
    /// 3. LintPhase - convention warnings
    /// 4. CheckPhase - typed IR per resource
    /// 5. User phases (if any)
    ///
    /// # Errors
    ///
    /// Returns an error if a phase or plugin fails internally. Diagnostics
    /// in the sources never make this fail.
    pub fn run(&self, sources: Vec<SourceFile>) -> Result<CompilationContext> {
        let mut ctx = CompilationContext::new(sources).with_cancellation(self.cancellation.clone());

        let builtin_phases: Vec<Box<dyn Phase>> = vec![
            Box::new(ParsePhase),
            Box::new(CollectPhase),
            Box::new(LintPhase::new()),
            Box::new(CheckPhase),
        ];

        for phase in builtin_phases.iter().chain(self.phases.iter()) {
            if !phase.ready(&ctx) {
                tracing::debug!(
                    phase = phase.name(),
                    stage = ?ctx.stage(),
                    cancelled = ctx.is_cancelled(),
                    "skipping phase"
                );
                continue;
            }
            self.run_phase(phase.as_ref(), &mut ctx)?;
        }

        Ok(ctx)
    }

    /// Run a single phase with plugin hooks.
    fn run_phase(&self, phase: &dyn Phase, ctx: &mut CompilationContext) -> Result<()> {
        let phase_name = phase.name();
        let _span = tracing::debug_span!("phase", name = phase_name).entered();

        for plugin in &self.plugins {
            plugin.on_before_phase(phase_name, ctx)?;
        }

        phase.run(ctx)?;

        for plugin in &self.plugins {
            plugin.on_after_phase(phase_name, ctx)?;
        }

        Ok(())
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use super::*;
    use crate::pipeline::codes;

    struct CountingPlugin {
        before_count: Arc<AtomicUsize>,
        after_count: Arc<AtomicUsize>,
    }

    impl CountingPlugin {
        fn new() -> (Self, Arc<AtomicUsize>, Arc<AtomicUsize>) {
            let before = Arc::new(AtomicUsize::new(0));
            let after = Arc::new(AtomicUsize::new(0));
            (
                Self {
                    before_count: before.clone(),
                    after_count: after.clone(),
                },
                before,
                after,
            )
        }
    }

    impl Plugin for CountingPlugin {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn on_before_phase(&self, _phase: &str, _ctx: &mut CompilationContext) -> Result<()> {
            self.before_count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn on_after_phase(&self, _phase: &str, _ctx: &mut CompilationContext) -> Result<()> {
            self.after_count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn sources(text: &str) -> Vec<SourceFile> {
        vec![SourceFile::new("app.strata", text)]
    }

    #[test]
    fn test_pipeline_runs_phases() {
        let ctx = Pipeline::new()
            .run(sources("resource Post {\n  id: uuid! @primary\n  title: string!\n}"))
            .expect("pipeline should succeed");

        assert_eq!(ctx.programs.len(), 1);
        assert!(ctx.symbols.is_some());
        assert!(ctx.graph.is_some());
        assert_eq!(ctx.resources.len(), 1);
        assert!(!ctx.has_errors());
    }

    #[test]
    fn test_pipeline_plugin_hooks() {
        let (plugin, before_count, after_count) = CountingPlugin::new();

        let pipeline = Pipeline::new().plugin(plugin);
        let _ = pipeline
            .run(sources("resource Post { id: uuid! @primary }"))
            .expect("pipeline should succeed");

        // 4 built-in phases = 4 before + 4 after hooks
        assert_eq!(before_count.load(Ordering::SeqCst), 4);
        assert_eq!(after_count.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_duplicate_resource_stops_pipeline() {
        let (plugin, before_count, _) = CountingPlugin::new();
        let ctx = Pipeline::new()
            .plugin(plugin)
            .run(sources(
                "resource Post { id: uuid! @primary }\nresource Post { id: uuid! @primary }",
            ))
            .expect("pipeline should succeed");

        assert!(ctx.is_cancelled());
        assert!(ctx.resources.is_empty());
        assert!(
            ctx.diagnostics
                .errors()
                .any(|d| d.code == codes::DUPLICATE_RESOURCE)
        );
        // parse and collect ran, lint and check did not
        assert_eq!(before_count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_cancelled_before_start_runs_nothing() {
        let token = CancellationToken::new();
        token.cancel();
        let ctx = Pipeline::new()
            .cancellation(token)
            .run(sources("resource Post { id: uuid! @primary }"))
            .expect("pipeline should succeed");
        assert!(ctx.programs.is_empty());
    }
}
