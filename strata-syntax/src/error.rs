use std::path::PathBuf;

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

use crate::Span;

/// Result type for loading sources and configuration (boxed to reduce size on stack)
pub type Result<T> = std::result::Result<T, Box<Error>>;

/// A recoverable lexing or parsing error.
///
/// These never abort a parse; they are collected and handed to the
/// compiler's diagnostic sink.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SyntaxError {
    #[error("unexpected character '{ch}'")]
    UnexpectedCharacter { ch: char, span: Span },

    #[error("unterminated string literal")]
    UnterminatedString { span: Span },

    #[error("unterminated interpolation `#{{` in string literal")]
    UnterminatedInterpolation { span: Span },

    #[error("invalid number literal '{lexeme}'")]
    InvalidNumber { lexeme: String, span: Span },

    #[error("expected {expected}, found {found}")]
    UnexpectedToken {
        expected: String,
        found: String,
        span: Span,
    },

    #[error("field `{field}` is missing a nullability marker (`!` or `?`)")]
    MissingNullability {
        field: String,
        span: Span,
        suggestion: String,
    },

    #[error("method-call syntax `.{method}(...)` is not supported")]
    MethodCall {
        method: String,
        /// Receiver followed by the call arguments, as source text.
        arguments: String,
        span: Span,
    },
}

impl SyntaxError {
    pub fn unexpected(expected: impl Into<String>, found: impl Into<String>, span: Span) -> Self {
        SyntaxError::UnexpectedToken {
            expected: expected.into(),
            found: found.into(),
            span,
        }
    }

    /// The diagnostic name within the `syntax` category.
    pub fn code(&self) -> &'static str {
        match self {
            SyntaxError::UnexpectedCharacter { .. } => "unexpected_character",
            SyntaxError::UnterminatedString { .. } => "unterminated_string",
            SyntaxError::UnterminatedInterpolation { .. } => "unterminated_interpolation",
            SyntaxError::InvalidNumber { .. } => "invalid_number",
            SyntaxError::UnexpectedToken { .. } => "unexpected_token",
            SyntaxError::MissingNullability { .. } => "missing_nullability",
            SyntaxError::MethodCall { .. } => "method_call",
        }
    }

    pub fn span(&self) -> Span {
        match self {
            SyntaxError::UnexpectedCharacter { span, .. }
            | SyntaxError::UnterminatedString { span }
            | SyntaxError::UnterminatedInterpolation { span }
            | SyntaxError::InvalidNumber { span, .. }
            | SyntaxError::UnexpectedToken { span, .. }
            | SyntaxError::MissingNullability { span, .. }
            | SyntaxError::MethodCall { span, .. } => *span,
        }
    }

    /// A literal replacement for [`SyntaxError::span`], when the fix is mechanical.
    ///
    /// Method calls are rewritten into the namespaced form; `namespace` names
    /// the namespace to use when the caller knows which one defines the method.
    pub fn suggestion(&self, namespace: Option<&str>) -> Option<String> {
        match self {
            SyntaxError::MissingNullability { suggestion, .. } => Some(suggestion.clone()),
            SyntaxError::MethodCall {
                method, arguments, ..
            } => Some(format!(
                "{}.{method}({arguments})",
                namespace.unwrap_or("Namespace")
            )),
            _ => None,
        }
    }
}

/// Errors loading project files.
#[derive(Debug, Error, Diagnostic)]
pub enum Error {
    #[error("failed to read '{path}'")]
    #[diagnostic(code(strata::io_error))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse strata.toml")]
    #[diagnostic(code(strata::config_error))]
    Config {
        #[source_code]
        src: NamedSource<String>,
        #[label("parse error here")]
        span: Option<SourceSpan>,
        #[source]
        source: toml::de::Error,
    },

    #[error("source directory '{path}' does not exist")]
    #[diagnostic(
        code(strata::missing_source_dir),
        help("set [build] source in strata.toml or pass --source")
    )]
    MissingSourceDir { path: PathBuf },
}

impl Error {
    /// Create a config error from a toml error with source context
    pub fn config(source: toml::de::Error, src: &str, filename: &str) -> Box<Self> {
        let span = source.span().map(SourceSpan::from);
        Box::new(Error::Config {
            src: NamedSource::new(filename, src.to_string()),
            span,
            source,
        })
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Box<Self> {
        Box::new(Error::Io {
            path: path.into(),
            source,
        })
    }
}
