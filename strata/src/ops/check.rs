//! Check operation - compile resources without generating code.

use eyre::Result;
use strata_syntax::{Project, SourceFile};

use crate::reports::{CheckReport, DiagnosticsReport};

/// Execute the check operation.
pub fn check(project: &Project, sources: Vec<SourceFile>) -> Result<CheckReport> {
    let file_count = sources.len();
    let ctx = super::compile(sources)?;

    Ok(CheckReport {
        project_name: project.name(),
        file_count,
        resources: ctx.resources.iter().map(|r| r.name.clone()).collect(),
        diagnostics: DiagnosticsReport::from_context(&ctx),
    })
}
