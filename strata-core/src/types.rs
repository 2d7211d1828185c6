//! Primitive type vocabulary shared by the parser, checker and generators.

use std::fmt;

/// A built-in scalar type name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Primitive {
    String,
    Text,
    Int,
    Float,
    Bool,
    Uuid,
    Timestamp,
    Date,
    Email,
    Url,
    Json,
}

impl Primitive {
    /// Every primitive, in declaration order.
    pub const ALL: [Primitive; 11] = [
        Primitive::String,
        Primitive::Text,
        Primitive::Int,
        Primitive::Float,
        Primitive::Bool,
        Primitive::Uuid,
        Primitive::Timestamp,
        Primitive::Date,
        Primitive::Email,
        Primitive::Url,
        Primitive::Json,
    ];

    /// Look up a primitive by its source name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.as_str() == name)
    }

    /// The source-level name of this primitive.
    pub fn as_str(&self) -> &'static str {
        match self {
            Primitive::String => "string",
            Primitive::Text => "text",
            Primitive::Int => "int",
            Primitive::Float => "float",
            Primitive::Bool => "bool",
            Primitive::Uuid => "uuid",
            Primitive::Timestamp => "timestamp",
            Primitive::Date => "date",
            Primitive::Email => "email",
            Primitive::Url => "url",
            Primitive::Json => "json",
        }
    }

    /// Returns true for primitives that hold text.
    pub fn is_string_like(&self) -> bool {
        matches!(
            self,
            Primitive::String | Primitive::Text | Primitive::Email | Primitive::Url
        )
    }

    /// Returns true for `int` and `float`.
    pub fn is_numeric(&self) -> bool {
        matches!(self, Primitive::Int | Primitive::Float)
    }

    /// Returns true for primitives with a total order usable in `<`/`>`.
    pub fn is_ordered(&self) -> bool {
        self.is_numeric()
            || self.is_string_like()
            || matches!(self, Primitive::Timestamp | Primitive::Date)
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_name_round_trips_every_primitive() {
        for primitive in Primitive::ALL {
            assert_eq!(Primitive::from_name(primitive.as_str()), Some(primitive));
        }
        assert_eq!(Primitive::from_name("User"), None);
    }

    #[test]
    fn test_families() {
        assert!(Primitive::Email.is_string_like());
        assert!(!Primitive::Uuid.is_string_like());
        assert!(Primitive::Float.is_numeric());
        assert!(Primitive::Date.is_ordered());
        assert!(!Primitive::Bool.is_ordered());
    }
}
