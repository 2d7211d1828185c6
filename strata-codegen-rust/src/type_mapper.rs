//! Rust type mapper implementation.

use strata_compiler::language::TypeMapper;
use strata_core::Primitive;
use strata_ir::{Ty, TyKind};

/// Maps semantic types to Rust type syntax.
#[derive(Debug, Clone, Copy, Default)]
pub struct RustTypeMapper;

impl TypeMapper for RustTypeMapper {
    fn language(&self) -> &'static str {
        "rust"
    }

    fn map_primitive(&self, primitive: Primitive) -> &'static str {
        match primitive {
            Primitive::String | Primitive::Text | Primitive::Email | Primitive::Url => "String",
            Primitive::Int => "i64",
            Primitive::Float => "f64",
            Primitive::Bool => "bool",
            Primitive::Uuid => "uuid::Uuid",
            Primitive::Timestamp => "chrono::DateTime<chrono::Utc>",
            Primitive::Date => "chrono::NaiveDate",
            Primitive::Json => "serde_json::Value",
        }
    }

    fn map_type(&self, ty: &Ty) -> String {
        if ty.is_nil() {
            return "Option<()>".to_string();
        }
        let inner = match &ty.kind {
            TyKind::Primitive(p) => self.map_primitive(*p).to_string(),
            TyKind::Array(elem) => format!("Vec<{}>", self.map_type(elem)),
            TyKind::Hash(key, value) => format!(
                "std::collections::BTreeMap<{}, {}>",
                self.map_type(key),
                self.map_type(value)
            ),
            TyKind::Enum(e) => e.name.clone(),
            TyKind::Struct(s) => s.name.clone(),
            TyKind::Resource(name) => name.clone(),
            TyKind::Unit | TyKind::Nil | TyKind::Never | TyKind::Error => "()".to_string(),
            TyKind::EmptyArray => "Vec<()>".to_string(),
            TyKind::EmptyHash => "std::collections::BTreeMap<(), ()>".to_string(),
        };
        if ty.nullable {
            format!("Option<{inner}>")
        } else {
            inner
        }
    }
}
