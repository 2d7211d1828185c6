//! Front end for the Strata resource language.
//!
//! Turns `.strata` source text into a [`Program`] syntax tree. Lexing and
//! parsing never stop at the first problem: every [`SyntaxError`] is
//! collected and returned alongside whatever tree could be built.
//!
//! ```
//! let (program, errors) = strata_syntax::parse_source("resource Post { id: uuid! @primary }");
//! assert!(errors.is_empty());
//! assert_eq!(program.resources[0].name.name, "Post");
//! ```

// Miette's derive macro generates code that triggers these warnings
#![allow(unused_assignments)]

pub mod ast;
mod error;
mod lexer;
mod parser;
mod project;
mod span;
mod token;

pub use ast::{Expr, ExprKind, Program, Resource, TypeExpr, TypeExprKind};
pub use error::{Error, Result, SyntaxError};
pub use lexer::{tokenize, tokenize_fragment};
pub use parser::parse;
pub use project::{
    BuildSection, CONFIG_FILE, CodegenSection, Project, ProjectConfig, ProjectSection,
    SOURCE_EXTENSION,
};
pub use span::{SourceFile, Span};
pub use token::{LiteralValue, StringPart, Token, TokenKind, Trivia, TriviaKind};

/// Tokenize and parse a source string, returning lexer and parser errors together.
pub fn parse_source(source: &str) -> (Program, Vec<SyntaxError>) {
    let (tokens, mut errors) = tokenize(source);
    let (program, parse_errors) = parse(tokens);
    errors.extend(parse_errors);
    (program, errors)
}
