//! Pipeline plugin that logs how long each phase took.

use std::{sync::Mutex, time::Instant};

use eyre::Result;
use strata_compiler::pipeline::{CompilationContext, Plugin};

#[derive(Default)]
pub struct TimingPlugin {
    started: Mutex<Option<Instant>>,
}

impl Plugin for TimingPlugin {
    fn name(&self) -> &'static str {
        "timing"
    }

    fn on_before_phase(&self, _phase: &str, _ctx: &mut CompilationContext) -> Result<()> {
        if let Ok(mut started) = self.started.lock() {
            *started = Some(Instant::now());
        }
        Ok(())
    }

    fn on_after_phase(&self, phase: &str, ctx: &mut CompilationContext) -> Result<()> {
        let elapsed = self
            .started
            .lock()
            .ok()
            .and_then(|mut started| started.take())
            .map(|started| started.elapsed());
        tracing::info!(
            phase,
            files = ctx.sources.len(),
            resources = ctx.resources.len(),
            diagnostics = ctx.diagnostics.len(),
            elapsed_ms = elapsed.map_or(0.0, |e| e.as_secs_f64() * 1000.0),
            "phase complete"
        );
        Ok(())
    }
}
