//! Compilation context passed through pipeline phases.

use std::collections::BTreeSet;

use strata_ir::ResourceIr;
use strata_syntax::{Program, SourceFile};

use super::{CancellationToken, Diagnostic, Diagnostics, FileId, Location, Stage};
use crate::{graph::RelationshipGraph, symbols::SymbolTable};

/// Context passed through all pipeline phases.
///
/// Owns everything one compilation produces. Nothing in it outlives the
/// compilation and nothing is shared between compilations.
#[derive(Debug)]
pub struct CompilationContext {
    /// Source files, in the order they were loaded.
    pub sources: Vec<SourceFile>,
    /// One syntax tree per source file (populated by ParsePhase).
    pub programs: Vec<Program>,
    /// Every declared resource by name (populated by CollectPhase).
    pub symbols: Option<SymbolTable>,
    /// Relationship edges between resources (populated by CollectPhase).
    pub graph: Option<RelationshipGraph>,
    /// Typed resources in declaration order (populated by CheckPhase).
    pub resources: Vec<ResourceIr>,
    /// Diagnostics collected during compilation.
    pub diagnostics: Diagnostics,
    pub cancellation: CancellationToken,
}

impl CompilationContext {
    /// Create a new compilation context over the given sources.
    pub fn new(sources: Vec<SourceFile>) -> Self {
        Self {
            sources,
            programs: Vec::new(),
            symbols: None,
            graph: None,
            resources: Vec::new(),
            diagnostics: Diagnostics::new(),
            cancellation: CancellationToken::new(),
        }
    }

    /// Share a cancellation token with the caller.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn report(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.report(diagnostic);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// The furthest stage whose results are all present.
    pub fn stage(&self) -> Stage {
        match &self.symbols {
            Some(symbols) if symbols.len() == self.resources.len() => Stage::Checked,
            Some(_) => Stage::Collected,
            None if self.programs.len() == self.sources.len() => Stage::Parsed,
            None => Stage::Sources,
        }
    }

    /// Check if any error diagnostics have been recorded.
    pub fn has_errors(&self) -> bool {
        self.diagnostics.has_errors()
    }

    /// Check if any warning diagnostics have been recorded.
    pub fn has_warnings(&self) -> bool {
        self.diagnostics.warnings().next().is_some()
    }

    /// Count the number of error diagnostics.
    pub fn error_count(&self) -> usize {
        self.diagnostics.error_count()
    }

    /// Count the number of warning diagnostics.
    pub fn warning_count(&self) -> usize {
        self.diagnostics.warning_count()
    }

    pub fn source(&self, file: FileId) -> Option<&SourceFile> {
        self.sources.get(file)
    }

    /// Name of the resource whose declaration contains `location`.
    pub fn resource_at(&self, location: Location) -> Option<&str> {
        self.programs
            .get(location.file)?
            .resources
            .iter()
            .find(|r| r.span.contains(location.span))
            .map(|r| r.name.name.as_str())
    }

    /// Resources with at least one error attributed to them.
    pub fn blocked_resources(&self) -> BTreeSet<String> {
        let mut blocked = BTreeSet::new();
        for diagnostic in self.diagnostics.errors() {
            blocked.extend(diagnostic.resources.iter().cloned());
            if let Some(name) = diagnostic.location.and_then(|loc| self.resource_at(loc)) {
                blocked.insert(name.to_string());
            }
        }
        blocked
    }

    /// Typed resources that are free of errors and can be generated.
    pub fn generable_resources(&self) -> Vec<&ResourceIr> {
        let blocked = self.blocked_resources();
        self.resources
            .iter()
            .filter(|r| !blocked.contains(&r.name))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use strata_syntax::Span;

    use super::*;
    use crate::pipeline::codes;

    #[test]
    fn test_context_creation() {
        let ctx = CompilationContext::new(vec![SourceFile::new("a.strata", "")]);
        assert!(ctx.programs.is_empty());
        assert!(ctx.symbols.is_none());
        assert!(ctx.graph.is_none());
        assert!(!ctx.has_errors());
        assert!(!ctx.is_cancelled());
    }

    #[test]
    fn test_context_diagnostics() {
        let mut ctx = CompilationContext::new(Vec::new());
        ctx.report(Diagnostic::new(codes::FIELD_NAMING, "warning 1"));
        ctx.report(Diagnostic::new(codes::MISMATCH, "error 1"));
        ctx.report(Diagnostic::new(codes::RESOURCE_NAMING, "warning 2"));

        assert!(ctx.has_errors());
        assert!(ctx.has_warnings());
        assert_eq!(ctx.error_count(), 1);
        assert_eq!(ctx.warning_count(), 2);
    }

    #[test]
    fn test_errors_block_containing_resource() {
        let text = "resource A { id: uuid! }\nresource B { id: uuid! }";
        let (program, errors) = strata_syntax::parse_source(text);
        assert!(errors.is_empty());

        let mut ctx = CompilationContext::new(vec![SourceFile::new("ab.strata", text)]);
        ctx.programs.push(program);
        ctx.report(Diagnostic::new(codes::MISMATCH, "in B").at(0, Span::new(38, 40)));
        ctx.report(Diagnostic::new(codes::FIELD_NAMING, "in A").at(0, Span::new(13, 15)));

        let blocked = ctx.blocked_resources();
        assert_eq!(blocked.into_iter().collect::<Vec<_>>(), ["B"]);
    }
}
