//! Code builder utility for generating properly indented code.

use super::{CodeFragment, Indent, Renderable};

/// Builds indented source text line by line.
///
/// ```
/// use strata_compiler::builder::CodeBuilder;
///
/// let mut builder = CodeBuilder::default();
/// builder
///     .push_line("fn main() {")
///     .push_indent()
///     .push_line("run();")
///     .push_dedent()
///     .push_line("}");
/// assert_eq!(builder.build(), "fn main() {\n    run();\n}\n");
/// ```
#[derive(Debug, Clone)]
pub struct CodeBuilder {
    level: usize,
    unit: String,
    buffer: String,
}

impl CodeBuilder {
    pub fn new(indent: Indent) -> Self {
        Self {
            level: 0,
            unit: indent.unit(),
            buffer: String::new(),
        }
    }

    /// Add a line at the current indentation. Empty lines carry no
    /// trailing whitespace.
    pub fn push_line(&mut self, s: &str) -> &mut Self {
        if !s.is_empty() {
            for _ in 0..self.level {
                self.buffer.push_str(&self.unit);
            }
            self.buffer.push_str(s);
        }
        self.buffer.push('\n');
        self
    }

    pub fn push_blank(&mut self) -> &mut Self {
        self.buffer.push('\n');
        self
    }

    pub fn push_indent(&mut self) -> &mut Self {
        self.level += 1;
        self
    }

    pub fn push_dedent(&mut self) -> &mut Self {
        self.level = self.level.saturating_sub(1);
        self
    }

    /// Add a `///` comment, one line per line of `text`.
    pub fn push_doc(&mut self, text: &str) -> &mut Self {
        for line in text.lines() {
            if line.trim().is_empty() {
                self.push_line("///");
            } else {
                self.push_line(&format!("/// {}", line.trim_end()));
            }
        }
        self
    }

    /// `header`, then whatever `body` adds one level deeper, then `close`.
    pub fn push_block(&mut self, header: &str, close: &str, body: impl FnOnce(&mut Self)) -> &mut Self {
        self.push_line(header).push_indent();
        body(self);
        self.push_dedent().push_line(close)
    }

    /// Emit a [`Renderable`] node.
    pub fn emit(&mut self, node: &(impl Renderable + ?Sized)) -> &mut Self {
        for fragment in node.to_fragments() {
            self.apply(fragment);
        }
        self
    }

    fn apply(&mut self, fragment: CodeFragment) {
        match fragment {
            CodeFragment::Line(s) => {
                self.push_line(&s);
            }
            CodeFragment::Blank => {
                self.push_blank();
            }
            CodeFragment::Block {
                header,
                body,
                close,
            } => {
                self.push_line(&header).push_indent();
                body.into_iter().for_each(|f| self.apply(f));
                self.push_dedent();
                if let Some(close) = close {
                    self.push_line(&close);
                }
            }
            CodeFragment::Doc(text) => {
                self.push_doc(&text);
            }
            CodeFragment::Sequence(fragments) => fragments.into_iter().for_each(|f| self.apply(f)),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.buffer
    }

    pub fn build(self) -> String {
        self.buffer
    }
}

impl Default for CodeBuilder {
    fn default() -> Self {
        Self::new(Indent::RUST)
    }
}
