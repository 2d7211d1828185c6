//! Diagnostic types for the compilation pipeline.
//!
//! Every finding, from a stray character to a cascade cycle, is a
//! [`Diagnostic`] with a namespaced [`Code`]. Severity is a property of the
//! code, so the same problem is always reported the same way.

use std::fmt;

use serde::Serialize;
use strata_syntax::{SourceFile, Span};

/// Severity level for a diagnostic message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Blocks code generation for the affected resource.
    Error,
    /// A convention deviation; never blocks generation.
    Warning,
    /// Informational finding about the project.
    Info,
}

impl Severity {
    /// Returns true if this is an error severity.
    pub fn is_error(&self) -> bool {
        matches!(self, Severity::Error)
    }

    /// Returns true if this is a warning severity.
    pub fn is_warning(&self) -> bool {
        matches!(self, Severity::Warning)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Info => write!(f, "info"),
        }
    }
}

/// Diagnostic category, the first segment of a code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    Syntax,
    Type,
    Semantic,
    Relationship,
    Validation,
    Generation,
    Pattern,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Syntax => "syntax",
            Category::Type => "type",
            Category::Semantic => "semantic",
            Category::Relationship => "relationship",
            Category::Validation => "validation",
            Category::Generation => "generation",
            Category::Pattern => "pattern",
        }
    }
}

/// A diagnostic code such as `type::nullability`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Code {
    pub category: Category,
    pub name: &'static str,
    pub severity: Severity,
}

impl Code {
    pub const fn new(category: Category, name: &'static str, severity: Severity) -> Self {
        Self {
            category,
            name,
            severity,
        }
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.category.as_str(), self.name)
    }
}

impl Serialize for Code {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Every code the compiler can emit.
pub mod codes {
    use super::{Category::*, Code, Severity::*};

    pub const UNEXPECTED_CHARACTER: Code = Code::new(Syntax, "unexpected_character", Error);
    pub const UNTERMINATED_STRING: Code = Code::new(Syntax, "unterminated_string", Error);
    pub const UNTERMINATED_INTERPOLATION: Code =
        Code::new(Syntax, "unterminated_interpolation", Error);
    pub const INVALID_NUMBER: Code = Code::new(Syntax, "invalid_number", Error);
    pub const UNEXPECTED_TOKEN: Code = Code::new(Syntax, "unexpected_token", Error);
    pub const MISSING_NULLABILITY: Code = Code::new(Syntax, "missing_nullability", Error);
    pub const METHOD_CALL: Code = Code::new(Syntax, "method_call", Error);

    pub const MISMATCH: Code = Code::new(Type, "mismatch", Error);
    pub const NULLABILITY: Code = Code::new(Type, "nullability", Error);
    pub const UNRESOLVED_TYPE: Code = Code::new(Type, "unresolved_type", Error);
    pub const UNKNOWN_FIELD: Code = Code::new(Type, "unknown_field", Error);
    pub const NULLABLE_ACCESS: Code = Code::new(Type, "nullable_access", Error);
    pub const UNQUALIFIED_CALL: Code = Code::new(Type, "unqualified_call", Error);
    pub const UNKNOWN_FUNCTION: Code = Code::new(Type, "unknown_function", Error);
    pub const ARITY: Code = Code::new(Type, "arity", Error);
    pub const NON_EXHAUSTIVE_MATCH: Code = Code::new(Type, "non_exhaustive_match", Error);
    pub const UNKNOWN_ENUM_VALUE: Code = Code::new(Type, "unknown_enum_value", Error);
    pub const INVALID_OPERAND: Code = Code::new(Type, "invalid_operand", Error);
    pub const UNHANDLED_FAILURE: Code = Code::new(Type, "unhandled_failure", Error);
    pub const INVALID_CONTEXT: Code = Code::new(Type, "invalid_context", Error);

    pub const DUPLICATE_RESOURCE: Code = Code::new(Semantic, "duplicate_resource", Error);
    pub const DUPLICATE_FIELD: Code = Code::new(Semantic, "duplicate_field", Error);
    pub const UNDEFINED_LOCAL: Code = Code::new(Semantic, "undefined_local", Error);
    pub const INVALID_ASSIGNMENT: Code = Code::new(Semantic, "invalid_assignment", Error);

    pub const CYCLE: Code = Code::new(Relationship, "cycle", Info);
    pub const CASCADE_CYCLE: Code = Code::new(Relationship, "cascade_cycle", Error);
    pub const INVALID_CASCADE: Code = Code::new(Relationship, "invalid_cascade", Error);
    pub const DANGLING_FOREIGN_KEY: Code = Code::new(Relationship, "dangling_foreign_key", Error);

    pub const UNKNOWN_ANNOTATION: Code = Code::new(Validation, "unknown_annotation", Error);
    pub const INVALID_ANNOTATION: Code = Code::new(Validation, "invalid_annotation", Error);
    pub const UNKNOWN_HOOK_EVENT: Code = Code::new(Validation, "unknown_hook_event", Error);
    pub const INVALID_MODIFIER: Code = Code::new(Validation, "invalid_modifier", Error);
    pub const INVALID_PATTERN: Code = Code::new(Validation, "invalid_pattern", Error);
    pub const INVALID_ENUM_VALUE: Code = Code::new(Validation, "invalid_enum_value", Error);

    pub const NAME_COLLISION: Code = Code::new(Generation, "name_collision", Error);

    pub const RESOURCE_NAMING: Code = Code::new(Pattern, "resource_naming", Warning);
    pub const FIELD_NAMING: Code = Code::new(Pattern, "field_naming", Warning);
    pub const MISSING_PRIMARY_KEY: Code = Code::new(Pattern, "missing_primary_key", Warning);
    pub const REDUNDANT_MODIFIER: Code = Code::new(Pattern, "redundant_modifier", Warning);
    pub const UNNECESSARY_NARROWING: Code = Code::new(Pattern, "unnecessary_narrowing", Warning);
    pub const DUPLICATE_ARM: Code = Code::new(Pattern, "duplicate_arm", Warning);

    const SYNTAX: [Code; 7] = [
        UNEXPECTED_CHARACTER,
        UNTERMINATED_STRING,
        UNTERMINATED_INTERPOLATION,
        INVALID_NUMBER,
        UNEXPECTED_TOKEN,
        MISSING_NULLABILITY,
        METHOD_CALL,
    ];

    /// The syntax code with the given name.
    pub fn syntax(name: &str) -> Code {
        SYNTAX
            .into_iter()
            .find(|c| c.name == name)
            .unwrap_or(UNEXPECTED_TOKEN)
    }
}

/// Index of a source file within a compilation.
pub type FileId = usize;

/// Where a diagnostic points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Location {
    pub file: FileId,
    pub span: Span,
}

/// A literal replacement for a span of source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fix {
    pub span: Span,
    pub replacement: String,
}

/// A diagnostic message from a compilation phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub code: Code,
    pub message: String,
    pub location: Option<Location>,
    /// Machine-applicable fix, when the remedy is mechanical.
    pub fix: Option<Fix>,
    /// Resources this diagnostic is explicitly attributed to, in addition to
    /// the one whose source contains its location.
    pub resources: Vec<String>,
}

impl Diagnostic {
    /// Create a diagnostic; severity comes from the code.
    pub fn new(code: Code, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            location: None,
            fix: None,
            resources: Vec::new(),
        }
    }

    pub fn severity(&self) -> Severity {
        self.code.severity
    }

    /// Add a location to this diagnostic.
    pub fn at(mut self, file: FileId, span: Span) -> Self {
        self.location = Some(Location { file, span });
        self
    }

    /// Suggest replacing `span` with `replacement`.
    pub fn with_fix(mut self, span: Span, replacement: impl Into<String>) -> Self {
        self.fix = Some(Fix {
            span,
            replacement: replacement.into(),
        });
        self
    }

    /// Attribute this diagnostic to a resource.
    pub fn for_resource(mut self, name: impl Into<String>) -> Self {
        self.resources.push(name.into());
        self
    }

    /// Sort key: file, position, then code.
    fn sort_key(&self) -> (usize, usize, usize, Code) {
        match self.location {
            Some(loc) => (0, loc.file, loc.span.start, self.code),
            None => (1, 0, 0, self.code),
        }
    }

    /// Resolve the location to a rendered record against the compiled sources.
    pub fn resolve(&self, sources: &[SourceFile]) -> ResolvedDiagnostic {
        let (file, line, column) = self
            .location
            .and_then(|loc| sources.get(loc.file).map(|src| (src, loc.span.start)))
            .map_or((None, 0, 0), |(src, offset)| {
                let (line, column) = src.line_col(offset);
                (Some(src.name()), line, column)
            });
        ResolvedDiagnostic {
            code: self.code,
            severity: self.severity(),
            file,
            line,
            column,
            message: self.message.clone(),
            suggestion: self.fix.as_ref().map(|f| f.replacement.clone()),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]: {}", self.severity(), self.code, self.message)
    }
}

/// A diagnostic with its location resolved to file, line and column.
///
/// This is the record shape of the JSON diagnostic report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedDiagnostic {
    pub code: Code,
    pub severity: Severity,
    pub file: Option<String>,
    pub line: usize,
    pub column: usize,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

/// The shared diagnostic sink.
///
/// Stages report into it and keep going; nothing here ever fails.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&mut self, diagnostic: Diagnostic) {
        tracing::trace!(code = %diagnostic.code, "{}", diagnostic.message);
        self.items.push(diagnostic);
    }

    pub fn extend(&mut self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        for diagnostic in diagnostics {
            self.report(diagnostic);
        }
    }

    /// Get all error diagnostics.
    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter().filter(|d| d.severity().is_error())
    }

    /// Get all warning diagnostics.
    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter().filter(|d| d.severity().is_warning())
    }

    /// Get all informational diagnostics.
    pub fn infos(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items
            .iter()
            .filter(|d| matches!(d.severity(), Severity::Info))
    }

    pub fn has_errors(&self) -> bool {
        self.errors().next().is_some()
    }

    pub fn error_count(&self) -> usize {
        self.errors().count()
    }

    pub fn warning_count(&self) -> usize {
        self.warnings().count()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    /// Diagnostics ordered by file, line, column and code.
    pub fn sorted(&self) -> Vec<&Diagnostic> {
        let mut items: Vec<&Diagnostic> = self.items.iter().collect();
        items.sort_by_key(|d| d.sort_key());
        items
    }
}
