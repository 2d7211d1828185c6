//! Indentation configuration for code generation.

/// Indentation style for generated code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Indent {
    Spaces(u8),
    Tab,
}

impl Indent {
    /// What `rustfmt` produces.
    pub const RUST: Self = Self::Spaces(4);

    /// The text for one indentation level.
    pub fn unit(&self) -> String {
        match self {
            Self::Spaces(width) => " ".repeat(usize::from(*width)),
            Self::Tab => "\t".to_string(),
        }
    }
}

impl Default for Indent {
    fn default() -> Self {
        Self::RUST
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indent_unit() {
        assert_eq!(Indent::Spaces(2).unit(), "  ");
        assert_eq!(Indent::RUST.unit(), "    ");
        assert_eq!(Indent::Tab.unit(), "\t");
        assert_eq!(Indent::default(), Indent::Spaces(4));
    }
}
