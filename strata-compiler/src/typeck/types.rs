//! Type resolution and compatibility.

use strata_core::{Primitive, to_pascal_case};
use strata_ir::{EnumTy, StructField, StructTy, Ty, TyKind};
use strata_syntax::{
    Span, TypeExpr, TypeExprKind,
    ast::{Field, Nullability},
};

use crate::pipeline::{Diagnostic, FileId, codes};

/// Outcome of comparing an actual type against an expected one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compat {
    Exact,
    /// A required value where a nullable one is expected.
    Lift,
    /// A nullable value where a required one is expected.
    Nullability,
    Mismatch,
}

/// Can a value of type `actual` be used where `expected` is required?
pub fn compat(actual: &Ty, expected: &Ty) -> Compat {
    if actual.is_error() || expected.is_error() || actual.is_never() {
        return Compat::Exact;
    }
    if actual.is_nil() {
        return if expected.nullable {
            Compat::Exact
        } else {
            Compat::Nullability
        };
    }
    if !same_kind(actual, expected) {
        return Compat::Mismatch;
    }
    match (actual.nullable, expected.nullable) {
        (true, false) => Compat::Nullability,
        (false, true) => Compat::Lift,
        _ => Compat::Exact,
    }
}

/// Structural equality ignoring the outer nullability.
pub fn same_kind(a: &Ty, b: &Ty) -> bool {
    match (&a.kind, &b.kind) {
        (TyKind::Error, _) | (_, TyKind::Error) => true,
        (TyKind::Primitive(x), TyKind::Primitive(y)) => x == y,
        (TyKind::Array(x), TyKind::Array(y)) => elem_eq(x, y),
        (TyKind::EmptyArray, TyKind::Array(_) | TyKind::EmptyArray)
        | (TyKind::Array(_), TyKind::EmptyArray) => true,
        (TyKind::Hash(k1, v1), TyKind::Hash(k2, v2)) => elem_eq(k1, k2) && elem_eq(v1, v2),
        (TyKind::EmptyHash, TyKind::Hash(..) | TyKind::EmptyHash)
        | (TyKind::Hash(..), TyKind::EmptyHash) => true,
        (TyKind::Enum(x), TyKind::Enum(y)) => x == y,
        (TyKind::Struct(x), TyKind::Struct(y)) => x.same_shape(y),
        (TyKind::Resource(x), TyKind::Resource(y)) => x == y,
        (TyKind::Unit, TyKind::Unit) | (TyKind::Nil, TyKind::Nil) => true,
        (TyKind::Never, _) | (_, TyKind::Never) => true,
        _ => false,
    }
}

fn elem_eq(a: &Ty, b: &Ty) -> bool {
    a.nullable == b.nullable && same_kind(a, b)
}

/// Common type of two branches, if any.
pub fn join(a: &Ty, b: &Ty) -> Option<Ty> {
    if a.is_never() || a.is_error() {
        return Some(b.clone());
    }
    if b.is_never() || b.is_error() {
        return Some(a.clone());
    }
    if a.is_nil() {
        return Some(b.as_nullable());
    }
    if b.is_nil() {
        return Some(a.as_nullable());
    }
    if !same_kind(a, b) {
        return None;
    }
    // Prefer the side whose element type is known.
    let base = match (&a.kind, &b.kind) {
        (TyKind::EmptyArray | TyKind::EmptyHash, _) => b,
        _ => a,
    };
    Some(base.clone().with_nullable(a.nullable || b.nullable))
}

/// Turns syntactic types into semantic ones.
///
/// Inline enums and structs are named after the path that declares them
/// (`Post` + `seo` becomes `PostSeo`) and collected for generation.
pub struct TypeResolver<'a> {
    is_resource: &'a dyn Fn(&str) -> bool,
    file: FileId,
    /// Whether inline enum and struct types may appear.
    allow_inline: bool,
    pub enums: Vec<EnumTy>,
    pub structs: Vec<StructTy>,
    pub diagnostics: Vec<Diagnostic>,
}

impl<'a> TypeResolver<'a> {
    pub fn new(is_resource: &'a dyn Fn(&str) -> bool, file: FileId) -> Self {
        Self {
            is_resource,
            file,
            allow_inline: true,
            enums: Vec::new(),
            structs: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    /// A resolver for annotations inside expressions, where inline types
    /// have nowhere to be declared.
    pub fn expression(is_resource: &'a dyn Fn(&str) -> bool, file: FileId) -> Self {
        Self {
            allow_inline: false,
            ..Self::new(is_resource, file)
        }
    }

    /// Resolve a type with its marker. A missing marker was already reported
    /// by the parser and is treated as required.
    pub fn resolve(&mut self, ty: &TypeExpr, path: &str) -> Ty {
        let nullable = ty.nullability == Some(Nullability::Optional);
        self.resolve_kind(ty, path, true).with_nullable(nullable)
    }

    fn resolve_kind(&mut self, ty: &TypeExpr, path: &str, top: bool) -> Ty {
        match &ty.kind {
            TypeExprKind::Primitive(p) => Ty::primitive(*p),
            TypeExprKind::Resource(name) => {
                if !(self.is_resource)(name) {
                    self.unresolved(name, ty.span);
                    return Ty::error();
                }
                if !top {
                    self.report(
                        Diagnostic::new(
                            codes::MISMATCH,
                            format!("`{name}` can only be used directly as a field type or array element"),
                        )
                        .at(self.file, ty.span),
                    );
                    return Ty::error();
                }
                Ty::resource(name)
            }
            TypeExprKind::Array(elem) => {
                let is_relation = matches!(elem.kind, TypeExprKind::Resource(_));
                let elem = self.resolve_kind(elem, path, top && is_relation).with_nullable(elem.is_optional());
                Ty::array(elem)
            }
            TypeExprKind::Hash(key, value) => {
                let key_ty = self.resolve_kind(key, path, false).with_nullable(key.is_optional());
                let valid_key = key_ty.is_error()
                    || (!key_ty.nullable
                        && (key_ty.is_string_like() || key_ty.is_primitive(Primitive::Int)));
                if !valid_key {
                    self.report(
                        Diagnostic::new(
                            codes::MISMATCH,
                            format!("hash keys must be required strings or ints, found `{key_ty}`"),
                        )
                        .at(self.file, key.span),
                    );
                }
                let value = self.resolve_kind(value, path, false).with_nullable(value.is_optional());
                Ty::hash(key_ty, value)
            }
            TypeExprKind::Enum(values) => {
                if !self.inline_allowed(ty.span) {
                    return Ty::error();
                }
                let mut seen: Vec<String> = Vec::new();
                for value in values {
                    let variant = to_pascal_case(&value.name);
                    let problem = if !valid_enum_value(&value.name) {
                        Some(format!(
                            "enum value {:?} must start with a letter and contain only letters, digits, `_` or `-`",
                            value.name
                        ))
                    } else if seen.contains(&variant) {
                        Some(format!("enum value {:?} is listed more than once", value.name))
                    } else {
                        None
                    };
                    if let Some(message) = problem {
                        self.report(Diagnostic::new(codes::INVALID_ENUM_VALUE, message).at(self.file, value.span));
                    }
                    seen.push(variant);
                }
                let enum_ty = EnumTy {
                    name: path.to_string(),
                    values: values.iter().map(|v| v.name.clone()).collect(),
                };
                self.enums.push(enum_ty.clone());
                Ty::required(TyKind::Enum(enum_ty))
            }
            TypeExprKind::Struct(fields) => {
                if !self.inline_allowed(ty.span) {
                    return Ty::error();
                }
                let struct_ty = StructTy {
                    name: path.to_string(),
                    fields: self.struct_fields(fields, path),
                };
                self.structs.push(struct_ty.clone());
                Ty::required(TyKind::Struct(struct_ty))
            }
            TypeExprKind::Error => Ty::error(),
        }
    }

    fn struct_fields(&mut self, fields: &[Field], path: &str) -> Vec<StructField> {
        let mut out: Vec<StructField> = Vec::new();
        for field in fields {
            if out.iter().any(|f| f.name == field.name.name) {
                self.report(
                    Diagnostic::new(
                        codes::DUPLICATE_FIELD,
                        format!("field `{}` is declared more than once in `{path}`", field.name.name),
                    )
                    .at(self.file, field.name.span),
                );
                continue;
            }
            let nested = format!("{path}{}", to_pascal_case(&field.name.name));
            let nullable = field.ty.is_optional();
            let ty = self.resolve_kind(&field.ty, &nested, false).with_nullable(nullable);
            out.push(StructField {
                name: field.name.name.clone(),
                ty,
            });
        }
        out
    }

    fn inline_allowed(&mut self, span: Span) -> bool {
        if !self.allow_inline {
            self.report(
                Diagnostic::new(codes::MISMATCH, "inline enum and struct types are only allowed on declarations")
                    .at(self.file, span),
            );
        }
        self.allow_inline
    }

    fn unresolved(&mut self, name: &str, span: Span) {
        let mut diagnostic =
            Diagnostic::new(codes::UNRESOLVED_TYPE, format!("unknown type `{name}`")).at(self.file, span);
        let lower = name.to_ascii_lowercase();
        if Primitive::from_name(&lower).is_some() {
            diagnostic = diagnostic.with_fix(span, lower);
        }
        self.report(diagnostic);
    }

    fn report(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }
}

fn valid_enum_value(value: &str) -> bool {
    value.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}
