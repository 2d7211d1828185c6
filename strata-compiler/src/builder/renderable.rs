//! Renderable trait and CodeFragment for decoupled code generation.
//!
//! Syntax nodes describe themselves as fragments; only [`CodeBuilder`]
//! knows about indentation.
//!
//! [`CodeBuilder`]: super::CodeBuilder

use super::CodeBuilder;

/// A fragment of generated code.
#[derive(Debug, Clone, PartialEq)]
pub enum CodeFragment {
    /// A single line (newline appended).
    Line(String),
    Blank,
    /// `header`, the body one level deeper, then `close` if any.
    Block {
        header: String,
        body: Vec<CodeFragment>,
        close: Option<String>,
    },
    /// A doc comment; each line of the text becomes one `///` line.
    Doc(String),
    Sequence(Vec<CodeFragment>),
}

impl CodeFragment {
    pub fn line(s: impl Into<String>) -> Self {
        Self::Line(s.into())
    }

    /// A `{ ... }` block closed by `}`.
    pub fn braced(header: impl Into<String>, body: Vec<CodeFragment>) -> Self {
        Self::Block {
            header: header.into(),
            body,
            close: Some("}".to_string()),
        }
    }

    pub fn doc(text: impl Into<String>) -> Self {
        Self::Doc(text.into())
    }
}

/// Something that can be rendered as code.
pub trait Renderable {
    fn to_fragments(&self) -> Vec<CodeFragment>;

    /// Render on its own with default indentation.
    fn render(&self) -> String {
        let mut builder = CodeBuilder::default();
        builder.emit(self);
        builder.build()
    }
}

impl Renderable for CodeFragment {
    fn to_fragments(&self) -> Vec<CodeFragment> {
        vec![self.clone()]
    }
}

impl Renderable for Vec<CodeFragment> {
    fn to_fragments(&self) -> Vec<CodeFragment> {
        self.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_braced_block_renders() {
        let block = CodeFragment::braced(
            "fn main() {",
            vec![CodeFragment::doc("Says hi."), CodeFragment::line("hi();")],
        );
        insta::assert_snapshot!(block.render(), @r"
        fn main() {
            /// Says hi.
            hi();
        }
        ");
    }
}
