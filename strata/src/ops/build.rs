//! Build operation - compile resources and generate Rust code.

use eyre::{Context, Result};
use strata_codegen_rust::{Generator, LanguageCodegen};
use strata_syntax::{Project, SourceFile};

use crate::reports::{
    BuildReport, DiagnosticsReport, GenerationResult, PreviewFile, PreviewResult, WrittenResult,
};

/// Options for the build operation.
pub struct BuildOptions {
    /// Whether to preview without writing files.
    pub dry_run: bool,
}

/// Execute the build operation.
///
/// Resources free of errors are generated even when others fail.
pub fn build(project: &Project, sources: Vec<SourceFile>, opts: BuildOptions) -> Result<BuildReport> {
    let ctx = super::compile(sources)?;
    let diagnostics = DiagnosticsReport::from_context(&ctx);

    let config = project.config();
    let mut generator =
        Generator::from_context(&ctx).runtime_crate(&config.codegen.runtime_crate);
    if config.build.metadata.is_some() {
        generator = generator.metadata_path(project.metadata_path());
    }

    let result = if opts.dry_run {
        let files = generator
            .preview()?
            .into_iter()
            .map(|f| PreviewFile {
                path: f.path,
                content: f.content,
            })
            .collect();
        GenerationResult::Preview(PreviewResult { files })
    } else {
        let output_dir = project.output_dir();
        let generated = generator
            .generate(&output_dir)
            .wrap_err("Failed to generate code")?;
        GenerationResult::Written(WrittenResult {
            output_dir,
            written: generated.written,
            unchanged: generated.unchanged.len(),
            skipped: generated.skipped,
        })
    };

    Ok(BuildReport {
        project_name: project.name(),
        resource_count: ctx.resources.len(),
        diagnostics,
        result,
    })
}
