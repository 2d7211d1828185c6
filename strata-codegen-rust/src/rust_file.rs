//! Structured Rust source files: imports followed by items.

use strata_compiler::builder::{CodeBuilder, CodeFragment, Renderable};

/// A Rust use statement.
#[derive(Debug, Clone)]
pub struct Use {
    module: String,
    symbols: Vec<String>,
}

impl Use {
    pub fn new(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            symbols: Vec::new(),
        }
    }

    pub fn symbols(mut self, symbols: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.symbols.extend(symbols.into_iter().map(Into::into));
        self
    }

    fn format(&self) -> String {
        match self.symbols.as_slice() {
            [] => format!("use {};", self.module),
            [one] => format!("use {}::{one};", self.module),
            many => format!("use {}::{{{}}};", self.module, many.join(", ")),
        }
    }
}

impl Renderable for Use {
    fn to_fragments(&self) -> Vec<CodeFragment> {
        vec![CodeFragment::Line(self.format())]
    }
}

/// A Rust source file. Items are separated by one blank line.
///
/// ```ignore
/// let code = RustFile::new()
///     .use_stmt(Use::new("serde").symbols(["Deserialize", "Serialize"]))
///     .add(post_struct)
///     .add(post_impl)
///     .render();
/// ```
#[derive(Default)]
pub struct RustFile {
    uses: Vec<Use>,
    body: Vec<Vec<CodeFragment>>,
}

impl RustFile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn use_stmt(mut self, use_stmt: Use) -> Self {
        self.uses.push(use_stmt);
        self
    }

    #[allow(clippy::should_implement_trait)]
    pub fn add(mut self, node: impl Renderable) -> Self {
        self.body.push(node.to_fragments());
        self
    }

    pub fn render(&self) -> String {
        let mut builder = CodeBuilder::default();
        for use_stmt in &self.uses {
            builder.emit(use_stmt);
        }
        if !self.uses.is_empty() && !self.body.is_empty() {
            builder.push_blank();
        }
        for (i, fragments) in self.body.iter().enumerate() {
            if i > 0 {
                builder.push_blank();
            }
            builder.emit(fragments);
        }
        builder.build()
    }
}

/// Raw lines of code, emitted as-is.
#[derive(Debug, Clone)]
pub struct RawCode(Vec<String>);

impl RawCode {
    pub fn lines(lines: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self(lines.into_iter().map(Into::into).collect())
    }
}

impl Renderable for RawCode {
    fn to_fragments(&self) -> Vec<CodeFragment> {
        self.0.iter().map(CodeFragment::line).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_use_formats() {
        assert_eq!(Use::new("std::fmt").render(), "use std::fmt;\n");
        assert_eq!(
            Use::new("serde").symbols(["Serialize"]).render(),
            "use serde::Serialize;\n"
        );
        assert_eq!(
            Use::new("serde").symbols(["Deserialize", "Serialize"]).render(),
            "use serde::{Deserialize, Serialize};\n"
        );
    }

    #[test]
    fn test_items_are_separated_by_blank_lines() {
        let code = RustFile::new()
            .use_stmt(Use::new("serde").symbols(["Serialize"]))
            .add(RawCode::lines(["struct Foo;"]))
            .add(RawCode::lines(["struct Bar;"]))
            .render();
        assert_eq!(code, "use serde::Serialize;\n\nstruct Foo;\n\nstruct Bar;\n");
    }

    #[test]
    fn test_empty_file() {
        assert_eq!(RustFile::new().render(), "");
    }
}
