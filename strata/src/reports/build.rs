//! Build command report data structures.

use std::path::PathBuf;

use super::{
    DiagnosticsReport,
    output::{Output, Report},
};

/// Report data from code generation.
#[derive(Debug)]
pub struct BuildReport {
    /// Project name from strata.toml or the project directory.
    pub project_name: String,

    /// Number of resources that type checked.
    pub resource_count: usize,

    /// Diagnostics from compilation.
    pub diagnostics: DiagnosticsReport,

    /// Generation result (files written or preview).
    pub result: GenerationResult,
}

/// Result of code generation.
#[derive(Debug)]
pub enum GenerationResult {
    /// Files were written to disk.
    Written(WrittenResult),
    /// Dry-run preview.
    Preview(PreviewResult),
}

/// Result when files were written to disk.
#[derive(Debug)]
pub struct WrittenResult {
    /// Output directory.
    pub output_dir: PathBuf,
    /// Files written or rewritten.
    pub written: Vec<PathBuf>,
    /// Number of files already up to date.
    pub unchanged: usize,
    /// Resources left out because of errors.
    pub skipped: Vec<String>,
}

/// Result of a dry-run preview.
#[derive(Debug)]
pub struct PreviewResult {
    /// Files that would be generated.
    pub files: Vec<PreviewFile>,
}

/// A file in preview mode.
#[derive(Debug)]
pub struct PreviewFile {
    /// File path.
    pub path: String,
    /// File content.
    pub content: String,
}

impl Report for BuildReport {
    fn render(&self, out: &mut dyn Output) {
        self.diagnostics.render(out);
        match &self.result {
            GenerationResult::Written(written) => self.render_written(out, written),
            GenerationResult::Preview(preview) => self.render_preview(out, preview),
        }
    }
}

impl BuildReport {
    fn render_written(&self, out: &mut dyn Output, written: &WrittenResult) {
        out.preformatted(&format!(
            "{}: {} resource{}, {}",
            self.project_name,
            self.resource_count,
            if self.resource_count == 1 { "" } else { "s" },
            self.diagnostics.summary()
        ));
        out.newline();

        out.key_value("Generated", &written.output_dir.display().to_string());
        for path in &written.written {
            let shown = path.strip_prefix(&written.output_dir).unwrap_or(path);
            out.added_item(&shown.display().to_string());
        }
        if written.unchanged > 0 {
            out.preformatted(&format!("  {} unchanged", written.unchanged));
        }

        if !written.skipped.is_empty() {
            out.newline();
            out.section("Skipped (has errors)");
            for name in &written.skipped {
                out.removed_item(name);
            }
        }
    }

    fn render_preview(&self, out: &mut dyn Output, preview: &PreviewResult) {
        for file in &preview.files {
            out.divider(&file.path);
            out.preformatted(&file.content);
        }

        out.divider("Summary");
        out.preformatted(&format!("{} files would be generated", preview.files.len()));
    }
}

#[cfg(test)]
mod tests {
    use strata_compiler::pipeline::Pipeline;
    use strata_syntax::SourceFile;

    use super::*;
    use crate::reports::output::testing::RecordingOutput;

    fn report(result: GenerationResult) -> BuildReport {
        let ctx = Pipeline::new()
            .run(vec![SourceFile::new("post.strata", "resource Post {\n  id: uuid! @primary\n}")])
            .unwrap();
        BuildReport {
            project_name: "blog".to_string(),
            resource_count: 1,
            diagnostics: DiagnosticsReport::from_context(&ctx),
            result,
        }
    }

    #[test]
    fn test_written_lists_files_relative_to_output() {
        let report = report(GenerationResult::Written(WrittenResult {
            output_dir: PathBuf::from("src/generated"),
            written: vec![PathBuf::from("src/generated/post.rs")],
            unchanged: 1,
            skipped: vec!["Draft".to_string()],
        }));
        let mut out = RecordingOutput::default();
        report.render(&mut out);
        assert_eq!(out.stdout[0], "blog: 1 resource, 0 errors, 0 warnings");
        assert!(out.stdout.contains(&"  + post.rs".to_string()));
        assert!(out.stdout.contains(&"  1 unchanged".to_string()));
        assert!(out.stdout.contains(&"  - Draft".to_string()));
    }

    #[test]
    fn test_preview_prints_every_file() {
        let report = report(GenerationResult::Preview(PreviewResult {
            files: vec![PreviewFile {
                path: "post.rs".to_string(),
                content: "pub struct Post;".to_string(),
            }],
        }));
        let mut out = RecordingOutput::default();
        report.render(&mut out);
        assert_eq!(
            out.stdout,
            [
                "── post.rs ──",
                "pub struct Post;",
                "── Summary ──",
                "1 files would be generated"
            ]
        );
    }
}
