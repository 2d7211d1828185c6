//! Semantic types.
//!
//! Every [`Ty`] carries its nullability explicitly. A nullable type is never
//! implicitly treated as its non-null counterpart.

use std::fmt;

use strata_core::Primitive;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Ty {
    pub kind: TyKind,
    pub nullable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TyKind {
    Primitive(Primitive),
    Array(Box<Ty>),
    Hash(Box<Ty>, Box<Ty>),
    Enum(EnumTy),
    Struct(StructTy),
    /// A declared resource, referenced by name.
    Resource(String),
    /// Result of statements and procedures with no value.
    Unit,
    /// The type of the `nil` literal.
    Nil,
    /// `[]` before its element type is known.
    EmptyArray,
    /// `{}` before its key and value types are known.
    EmptyHash,
    /// Expressions that never produce a value, like `fail`.
    Never,
    /// Produced after a reported error; compatible with everything so one
    /// mistake does not cascade into many diagnostics.
    Error,
}

/// A named enum derived from an `enum[...]` field type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EnumTy {
    pub name: String,
    pub values: Vec<String>,
}

impl EnumTy {
    pub fn has_value(&self, value: &str) -> bool {
        self.values.iter().any(|v| v == value)
    }
}

/// A named record derived from an inline `{ ... }` field type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StructTy {
    pub name: String,
    pub fields: Vec<StructField>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StructField {
    pub name: String,
    pub ty: Ty,
}

impl StructTy {
    pub fn field(&self, name: &str) -> Option<&StructField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Field-by-field comparison of name, type and nullability.
    pub fn same_shape(&self, other: &StructTy) -> bool {
        self.fields.len() == other.fields.len()
            && self
                .fields
                .iter()
                .zip(&other.fields)
                .all(|(a, b)| a.name == b.name && a.ty == b.ty)
    }
}

impl Ty {
    pub fn new(kind: TyKind, nullable: bool) -> Self {
        Self { kind, nullable }
    }

    pub fn required(kind: TyKind) -> Self {
        Self::new(kind, false)
    }

    pub fn optional(kind: TyKind) -> Self {
        Self::new(kind, true)
    }

    pub fn primitive(p: Primitive) -> Self {
        Self::required(TyKind::Primitive(p))
    }

    pub fn string() -> Self {
        Self::primitive(Primitive::String)
    }

    pub fn int() -> Self {
        Self::primitive(Primitive::Int)
    }

    pub fn float() -> Self {
        Self::primitive(Primitive::Float)
    }

    pub fn bool() -> Self {
        Self::primitive(Primitive::Bool)
    }

    pub fn unit() -> Self {
        Self::required(TyKind::Unit)
    }

    pub fn nil() -> Self {
        Self::optional(TyKind::Nil)
    }

    pub fn never() -> Self {
        Self::required(TyKind::Never)
    }

    pub fn error() -> Self {
        Self::required(TyKind::Error)
    }

    pub fn array(elem: Ty) -> Self {
        Self::required(TyKind::Array(Box::new(elem)))
    }

    pub fn hash(key: Ty, value: Ty) -> Self {
        Self::required(TyKind::Hash(Box::new(key), Box::new(value)))
    }

    pub fn resource(name: impl Into<String>) -> Self {
        Self::required(TyKind::Resource(name.into()))
    }

    /// The same type with nullability set.
    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    pub fn as_nullable(&self) -> Self {
        self.clone().with_nullable(true)
    }

    pub fn as_required(&self) -> Self {
        self.clone().with_nullable(false)
    }

    pub fn is_error(&self) -> bool {
        matches!(self.kind, TyKind::Error)
    }

    pub fn is_never(&self) -> bool {
        matches!(self.kind, TyKind::Never)
    }

    pub fn is_unit(&self) -> bool {
        matches!(self.kind, TyKind::Unit)
    }

    pub fn is_nil(&self) -> bool {
        matches!(self.kind, TyKind::Nil)
    }

    pub fn as_primitive(&self) -> Option<Primitive> {
        match self.kind {
            TyKind::Primitive(p) => Some(p),
            _ => None,
        }
    }

    pub fn is_primitive(&self, p: Primitive) -> bool {
        self.as_primitive() == Some(p)
    }

    pub fn is_string_like(&self) -> bool {
        self.as_primitive().is_some_and(|p| p.is_string_like())
    }

    pub fn is_numeric(&self) -> bool {
        self.as_primitive().is_some_and(|p| p.is_numeric())
    }

    /// Element type of an array, if this is one.
    pub fn element(&self) -> Option<&Ty> {
        match &self.kind {
            TyKind::Array(elem) => Some(elem),
            _ => None,
        }
    }

    /// Returns true if values of this type are plain `Copy` data in
    /// generated code.
    pub fn is_copy(&self) -> bool {
        match &self.kind {
            TyKind::Primitive(p) => matches!(
                p,
                Primitive::Int
                    | Primitive::Float
                    | Primitive::Bool
                    | Primitive::Uuid
                    | Primitive::Timestamp
                    | Primitive::Date
            ),
            TyKind::Enum(_) | TyKind::Unit | TyKind::Nil | TyKind::Never => true,
            _ => false,
        }
    }
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            TyKind::Primitive(p) => write!(f, "{p}")?,
            TyKind::Array(elem) => write!(f, "array<{elem}>")?,
            TyKind::Hash(key, value) => write!(f, "hash<{key}, {value}>")?,
            TyKind::Enum(e) => {
                let values: Vec<String> = e.values.iter().map(|v| format!("{v:?}")).collect();
                write!(f, "enum[{}]", values.join(", "))?
            }
            TyKind::Struct(s) => {
                f.write_str("{")?;
                for field in &s.fields {
                    write!(f, " {}: {}", field.name, field.ty)?;
                }
                f.write_str(" }")?
            }
            TyKind::Resource(name) => f.write_str(name)?,
            TyKind::Unit => return f.write_str("unit"),
            TyKind::Nil => return f.write_str("nil"),
            TyKind::EmptyArray => f.write_str("array<_>")?,
            TyKind::EmptyHash => f.write_str("hash<_, _>")?,
            TyKind::Never => return f.write_str("never"),
            TyKind::Error => return f.write_str("{unknown}"),
        }
        if self.nullable {
            f.write_str("?")?;
        }
        Ok(())
    }
}
