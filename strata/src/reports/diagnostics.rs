//! Compiler diagnostics as miette reports and JSON records.

use std::fmt;

use eyre::Result;
use miette::{GraphicalReportHandler, LabeledSpan, NamedSource, SourceSpan};
use strata_compiler::pipeline::{CompilationContext, Diagnostic, ResolvedDiagnostic, Severity};
use thiserror::Error;

use super::output::{Output, Report};

/// One diagnostic with enough source context for miette to render it.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct SourceDiagnostic {
    message: String,
    code: String,
    severity: Severity,
    src: Option<NamedSource<String>>,
    span: Option<SourceSpan>,
    help: Option<String>,
}

impl SourceDiagnostic {
    fn new(diagnostic: &Diagnostic, ctx: &CompilationContext) -> Self {
        let located = diagnostic
            .location
            .and_then(|loc| ctx.source(loc.file).map(|src| (src, loc.span)));
        Self {
            message: diagnostic.message.clone(),
            code: diagnostic.code.to_string(),
            severity: diagnostic.severity(),
            src: located.map(|(src, _)| src.named_source()),
            span: located.map(|(_, span)| SourceSpan::from((span.start, span.len()))),
            help: diagnostic
                .fix
                .as_ref()
                .map(|fix| format!("replace with `{}`", fix.replacement)),
        }
    }
}

impl miette::Diagnostic for SourceDiagnostic {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        Some(Box::new(&self.code))
    }

    fn severity(&self) -> Option<miette::Severity> {
        Some(match self.severity {
            Severity::Error => miette::Severity::Error,
            Severity::Warning => miette::Severity::Warning,
            Severity::Info => miette::Severity::Advice,
        })
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        self.help
            .as_ref()
            .map(|help| Box::new(help) as Box<dyn fmt::Display + 'a>)
    }

    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        self.src.as_ref().map(|src| src as &dyn miette::SourceCode)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        let span = self.span?;
        Some(Box::new(std::iter::once(LabeledSpan::new_with_span(None, span))))
    }
}

/// Every diagnostic of a compilation, sorted by file and position.
#[derive(Debug)]
pub struct DiagnosticsReport {
    items: Vec<SourceDiagnostic>,
    records: Vec<ResolvedDiagnostic>,
    errors: usize,
    warnings: usize,
}

impl DiagnosticsReport {
    pub fn from_context(ctx: &CompilationContext) -> Self {
        let sorted = ctx.diagnostics.sorted();
        Self {
            items: sorted.iter().map(|d| SourceDiagnostic::new(d, ctx)).collect(),
            records: sorted.iter().map(|d| d.resolve(&ctx.sources)).collect(),
            errors: ctx.error_count(),
            warnings: ctx.warning_count(),
        }
    }

    pub fn has_errors(&self) -> bool {
        self.errors > 0
    }

    /// The JSON diagnostic array.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.records)?)
    }

    /// "2 errors, 1 warning"
    pub fn summary(&self) -> String {
        format!(
            "{} error{}, {} warning{}",
            self.errors,
            if self.errors == 1 { "" } else { "s" },
            self.warnings,
            if self.warnings == 1 { "" } else { "s" },
        )
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl Report for DiagnosticsReport {
    fn render(&self, out: &mut dyn Output) {
        let handler = GraphicalReportHandler::new();
        for item in &self.items {
            let mut rendered = String::new();
            if handler.render_report(&mut rendered, item).is_err() {
                rendered = format!("{}[{}]: {}", item.severity, item.code, item.message);
            }
            out.diagnostic(rendered.trim_end());
        }
    }
}

#[cfg(test)]
mod tests {
    use strata_compiler::pipeline::Pipeline;
    use strata_syntax::SourceFile;

    use super::*;
    use crate::reports::output::testing::RecordingOutput;

    fn report(src: &str) -> DiagnosticsReport {
        let ctx = Pipeline::new()
            .run(vec![SourceFile::new("post.strata", src)])
            .unwrap();
        DiagnosticsReport::from_context(&ctx)
    }

    #[test]
    fn test_missing_marker_has_fix_in_json() {
        let report = report("resource Post {\n  title: string\n}");
        assert!(report.has_errors());
        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        let missing = json
            .as_array()
            .unwrap()
            .iter()
            .find(|d| d["code"] == "syntax::missing_nullability")
            .unwrap();
        assert_eq!(missing["severity"], "error");
        assert_eq!(missing["file"], "post.strata");
        assert_eq!(missing["line"], 2);
        assert!(missing["suggestion"].is_string());
    }

    #[test]
    fn test_clean_source_has_empty_json_array() {
        let report = report("resource Post {\n  id: uuid! @primary\n}");
        assert!(report.is_empty());
        assert_eq!(report.to_json().unwrap(), "[]");
        assert_eq!(report.summary(), "0 errors, 0 warnings");
    }

    #[test]
    fn test_renders_each_diagnostic_to_stderr() {
        let report = report("resource Post {\n  title: string\n}");
        let mut out = RecordingOutput::default();
        report.render(&mut out);
        assert!(out.stdout.is_empty());
        assert_eq!(out.stderr.len(), report.items.len());
        assert!(out.stderr.iter().any(|d| d.contains("missing_nullability")));
    }
}
