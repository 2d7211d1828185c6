//! Check command report data structures.

use super::{
    DiagnosticsReport,
    output::{Output, Report},
};

/// Report data from checking a project.
#[derive(Debug)]
pub struct CheckReport {
    /// Project name from strata.toml or the project directory.
    pub project_name: String,
    /// Number of source files compiled.
    pub file_count: usize,
    /// Resources that were type checked, in declaration order.
    pub resources: Vec<String>,
    /// Diagnostics from compilation.
    pub diagnostics: DiagnosticsReport,
}

impl Report for CheckReport {
    fn render(&self, out: &mut dyn Output) {
        self.diagnostics.render(out);
        if self.diagnostics.has_errors() {
            out.preformatted(&format!(
                "✗ {}: {}",
                self.project_name,
                self.diagnostics.summary()
            ));
            return;
        }

        out.preformatted(&format!("✓ {} is valid", self.project_name));
        out.newline();
        out.section(&format!(
            "  {} resource{} in {} file{}",
            self.resources.len(),
            if self.resources.len() == 1 { "" } else { "s" },
            self.file_count,
            if self.file_count == 1 { "" } else { "s" },
        ));
        for name in &self.resources {
            out.list_item(name);
        }
    }
}
