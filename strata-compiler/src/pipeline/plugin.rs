//! Pipeline plugin trait for extensibility.

use eyre::Result;

use super::CompilationContext;

/// A plugin that can hook into the compilation pipeline.
///
/// Plugins receive callbacks before and after each phase runs, allowing
/// them to inspect the compilation context. The `strata` binary uses one to
/// log phase timings.
///
/// # Example
///
/// ```ignore
/// struct CountingPlugin(AtomicUsize);
///
/// impl Plugin for CountingPlugin {
///     fn name(&self) -> &'static str { "counting" }
///
///     fn on_after_phase(&self, _phase: &str, _ctx: &mut CompilationContext) -> Result<()> {
///         self.0.fetch_add(1, Ordering::Relaxed);
///         Ok(())
///     }
/// }
/// ```
pub trait Plugin: Send + Sync {
    /// The name of this plugin (for debugging and logging).
    fn name(&self) -> &'static str;

    /// Called before a phase runs.
    ///
    /// # Errors
    ///
    /// Return an error to abort the pipeline.
    #[allow(unused_variables)]
    fn on_before_phase(&self, phase: &str, ctx: &mut CompilationContext) -> Result<()> {
        Ok(())
    }

    /// Called after a phase completes.
    ///
    /// # Errors
    ///
    /// Return an error to abort the pipeline.
    #[allow(unused_variables)]
    fn on_after_phase(&self, phase: &str, ctx: &mut CompilationContext) -> Result<()> {
        Ok(())
    }
}
