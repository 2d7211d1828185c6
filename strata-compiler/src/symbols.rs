//! Project-wide symbol table.
//!
//! Built once, after every file is parsed, from all resources in the
//! project. Resources refer to each other only by name; the table is the
//! arena those names index into.

use std::collections::HashMap;

use indexmap::IndexMap;
use regex::Regex;
use strata_core::{Primitive, to_pascal_case, to_snake_case};
use strata_ir::{
    CascadePolicy, EnumTy, FieldCheck, FieldOrigin, RelationKind, RelationshipIr, StructTy, Ty,
    TyKind,
};
use strata_syntax::{
    Expr, ExprKind, Program, Resource, Span, TypeExprKind,
    ast::{Annotation, Field, Literal, UnaryOp},
};

use crate::{
    pipeline::{Diagnostic, FileId, codes},
    typeck::TypeResolver,
};

const FIELD_ANNOTATIONS: &[&str] = &[
    "primary",
    "auto",
    "unique",
    "default",
    "min",
    "max",
    "pattern",
    "foreign_key",
    "on_delete",
];

#[derive(Debug, Default)]
pub struct SymbolTable {
    resources: IndexMap<String, ResourceSymbol>,
}

/// Everything known about one resource before its bodies are checked.
#[derive(Debug, Clone)]
pub struct ResourceSymbol {
    pub name: String,
    pub file: FileId,
    pub decl: Resource,
    pub primary_key: Option<String>,
    /// Stored columns in declaration order, foreign keys included.
    pub columns: Vec<Column>,
    /// Everything reachable as `self.<name>`.
    pub members: IndexMap<String, Member>,
    pub functions: IndexMap<String, FunctionSig>,
    pub relations: Vec<Relation>,
    pub middleware: Vec<String>,
    pub enums: Vec<EnumTy>,
    pub structs: Vec<StructTy>,
}

#[derive(Debug, Clone)]
pub struct Column {
    pub name: String,
    pub ty: Ty,
    pub doc: Option<String>,
    pub origin: FieldOrigin,
    pub primary: bool,
    pub auto: bool,
    pub unique: bool,
    pub checks: Vec<FieldCheck>,
    pub default: Option<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    pub ty: Ty,
    pub kind: MemberKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberKind {
    Column,
    BelongsTo { target: String, foreign_key: String },
    HasMany { target: String, foreign_key: String },
    Computed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionSig {
    pub name: String,
    pub params: Vec<(String, Ty)>,
    pub ret: Ty,
}

/// A relationship with the source locations needed to report on it.
#[derive(Debug, Clone)]
pub struct Relation {
    pub ir: RelationshipIr,
    pub span: Span,
    pub on_delete_span: Option<Span>,
}

impl SymbolTable {
    /// Build the table from every parsed program.
    ///
    /// Returns the table and its diagnostics. A duplicate resource name
    /// makes the table meaningless; in that case no table is returned.
    pub fn build(programs: &[Program]) -> (Option<Self>, Vec<Diagnostic>) {
        let mut diagnostics = Vec::new();
        let mut decls: IndexMap<String, (FileId, &Resource)> = IndexMap::new();
        let mut duplicate = false;

        for (file, program) in programs.iter().enumerate() {
            for resource in &program.resources {
                let name = &resource.name.name;
                if decls.contains_key(name) {
                    duplicate = true;
                    diagnostics.push(
                        Diagnostic::new(
                            codes::DUPLICATE_RESOURCE,
                            format!("resource `{name}` is declared more than once"),
                        )
                        .at(file, resource.name.span),
                    );
                } else {
                    decls.insert(name.clone(), (file, resource));
                }
            }
        }
        if duplicate {
            return (None, diagnostics);
        }

        let key_types: HashMap<&str, Ty> = decls
            .iter()
            .map(|(name, (_, decl))| (name.as_str(), primary_key_type(decl)))
            .collect();
        let is_resource = |name: &str| decls.contains_key(name);

        let mut table = SymbolTable::default();
        for (name, (file, decl)) in &decls {
            let mut builder = SymbolBuilder::new(*file, decl, &is_resource, &key_types);
            builder.fields();
            builder.computed();
            builder.functions();
            builder.resource_annotations();
            let (symbol, found) = builder.finish();
            diagnostics.extend(found);
            table.resources.insert(name.clone(), symbol);
        }
        (Some(table), diagnostics)
    }

    pub fn get(&self, name: &str) -> Option<&ResourceSymbol> {
        self.resources.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.resources.contains_key(name)
    }

    /// Resources in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &ResourceSymbol> {
        self.resources.values()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

impl ResourceSymbol {
    pub fn member(&self, name: &str) -> Option<&Member> {
        self.members.get(name)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn table(&self) -> String {
        strata_core::to_plural(&to_snake_case(&self.name))
    }
}

/// Type of a resource's primary key as seen by foreign keys pointing at it.
fn primary_key_type(decl: &Resource) -> Ty {
    decl.fields
        .iter()
        .find(|f| f.annotations.iter().any(|a| a.name.name == "primary"))
        .or_else(|| decl.fields.iter().find(|f| f.name.name == "id"))
        .and_then(|f| match f.ty.kind {
            TypeExprKind::Primitive(p) => Some(Ty::primitive(p)),
            _ => None,
        })
        .unwrap_or_else(|| Ty::primitive(Primitive::Uuid))
}

struct SymbolBuilder<'a> {
    file: FileId,
    decl: &'a Resource,
    resolver: TypeResolver<'a>,
    key_types: &'a HashMap<&'a str, Ty>,
    symbol: ResourceSymbol,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> SymbolBuilder<'a> {
    fn new(
        file: FileId,
        decl: &'a Resource,
        is_resource: &'a dyn Fn(&str) -> bool,
        key_types: &'a HashMap<&'a str, Ty>,
    ) -> Self {
        Self {
            file,
            decl,
            resolver: TypeResolver::new(is_resource, file),
            key_types,
            symbol: ResourceSymbol {
                name: decl.name.name.clone(),
                file,
                decl: decl.clone(),
                primary_key: None,
                columns: Vec::new(),
                members: IndexMap::new(),
                functions: IndexMap::new(),
                relations: Vec::new(),
                middleware: Vec::new(),
                enums: Vec::new(),
                structs: Vec::new(),
            },
            diagnostics: Vec::new(),
        }
    }

    fn finish(mut self) -> (ResourceSymbol, Vec<Diagnostic>) {
        if self.symbol.primary_key.is_none()
            && let Some(id) = self.symbol.columns.iter_mut().find(|c| c.name == "id" && !c.ty.nullable)
        {
            id.primary = true;
            self.symbol.primary_key = Some(id.name.clone());
        }
        self.symbol.enums = std::mem::take(&mut self.resolver.enums);
        self.symbol.structs = std::mem::take(&mut self.resolver.structs);
        self.diagnostics.append(&mut self.resolver.diagnostics);
        (self.symbol, self.diagnostics)
    }

    fn report(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    fn path(&self, member: &str) -> String {
        format!("{}{}", self.symbol.name, to_pascal_case(member))
    }

    /// Claim a member name, reporting a duplicate if it is taken.
    fn claim(&mut self, name: &str, span: Span, member: Member) -> bool {
        if self.symbol.members.contains_key(name) {
            self.report(
                Diagnostic::new(
                    codes::DUPLICATE_FIELD,
                    format!("`{name}` is declared more than once in `{}`", self.symbol.name),
                )
                .at(self.file, span),
            );
            return false;
        }
        self.symbol.members.insert(name.to_string(), member);
        true
    }

    fn fields(&mut self) {
        let decl = self.decl;
        for field in &decl.fields {
            let path = self.path(&field.name.name);
            let ty = self.resolver.resolve(&field.ty, &path);
            let annotations = self.field_annotations(field, &ty);

            match relation_target(&ty) {
                Some((target, RelationKind::BelongsTo)) => self.belongs_to(field, ty.clone(), target, annotations),
                Some((target, RelationKind::HasMany)) => self.has_many(field, ty.clone(), target, annotations),
                None => self.column(field, ty, annotations),
            }
        }
    }

    fn column(&mut self, field: &Field, ty: Ty, ann: FieldAnnotations) {
        for (name, span) in [("foreign_key", ann.foreign_key_span), ("on_delete", ann.on_delete.map(|(_, s)| s))] {
            if let Some(span) = span {
                self.report(
                    Diagnostic::new(
                        codes::INVALID_ANNOTATION,
                        format!("`@{name}` only applies to relationship fields"),
                    )
                    .at(self.file, span),
                );
            }
        }
        let name = field.name.name.clone();
        if !self.claim(&name, field.name.span, Member { ty: ty.clone(), kind: MemberKind::Column }) {
            return;
        }
        if ann.primary {
            self.symbol.primary_key = Some(name.clone());
        }
        self.symbol.columns.push(Column {
            name,
            ty,
            doc: field.doc.clone(),
            origin: FieldOrigin::Declared,
            primary: ann.primary,
            auto: ann.auto,
            unique: ann.unique,
            checks: ann.checks,
            default: field.default.clone(),
            span: field.span,
        });
    }

    fn belongs_to(&mut self, field: &Field, ty: Ty, target: String, ann: FieldAnnotations) {
        let name = field.name.name.clone();
        let foreign_key = ann.foreign_key.clone().unwrap_or_else(|| format!("{name}_id"));
        let on_delete = ann.on_delete.map_or(CascadePolicy::default(), |(policy, _)| policy);
        let on_delete_span = ann.on_delete.map(|(_, span)| span);
        if ann.primary {
            self.report(
                Diagnostic::new(codes::INVALID_ANNOTATION, "a relationship cannot be the primary key")
                    .at(self.file, field.span),
            );
        }

        if on_delete == CascadePolicy::SetNull && !ty.nullable {
            self.report(
                Diagnostic::new(
                    codes::INVALID_CASCADE,
                    format!("`set_null` on required relationship `{name}`; declare it as `{}?`", ty.as_required()),
                )
                .at(self.file, on_delete_span.unwrap_or(field.span)),
            );
        }

        let member = Member {
            ty: ty.clone(),
            kind: MemberKind::BelongsTo {
                target: target.clone(),
                foreign_key: foreign_key.clone(),
            },
        };
        if !self.claim(&name, field.name.span, member) {
            return;
        }
        let key_ty = self
            .key_types
            .get(target.as_str())
            .cloned()
            .unwrap_or_else(|| Ty::primitive(Primitive::Uuid))
            .with_nullable(ty.nullable);
        let key_member = Member {
            ty: key_ty.clone(),
            kind: MemberKind::Column,
        };
        if self.claim(&foreign_key, field.name.span, key_member) {
            self.symbol.columns.push(Column {
                name: foreign_key.clone(),
                ty: key_ty,
                doc: None,
                origin: FieldOrigin::ForeignKey {
                    relation: name.clone(),
                },
                primary: false,
                auto: false,
                unique: ann.unique,
                checks: Vec::new(),
                default: None,
                span: field.span,
            });
        }
        self.symbol.relations.push(Relation {
            ir: RelationshipIr {
                field: name,
                kind: RelationKind::BelongsTo,
                target,
                foreign_key,
                on_delete,
                nullable: ty.nullable,
                doc: field.doc.clone(),
            },
            span: field.span,
            on_delete_span,
        });
    }

    fn has_many(&mut self, field: &Field, ty: Ty, target: String, ann: FieldAnnotations) {
        if ann.primary {
            self.report(
                Diagnostic::new(codes::INVALID_ANNOTATION, "a relationship cannot be the primary key")
                    .at(self.file, field.span),
            );
        }
        if let Some((_, span)) = ann.on_delete {
            self.report(
                Diagnostic::new(
                    codes::INVALID_ANNOTATION,
                    "`@on_delete` belongs on the belongs-to side of a relationship",
                )
                .at(self.file, span),
            );
        }
        let name = field.name.name.clone();
        let foreign_key = ann
            .foreign_key
            .unwrap_or_else(|| format!("{}_id", to_snake_case(&self.symbol.name)));
        let member = Member {
            ty: ty.clone(),
            kind: MemberKind::HasMany {
                target: target.clone(),
                foreign_key: foreign_key.clone(),
            },
        };
        if !self.claim(&name, field.name.span, member) {
            return;
        }
        self.symbol.relations.push(Relation {
            ir: RelationshipIr {
                field: name,
                kind: RelationKind::HasMany,
                target,
                foreign_key,
                on_delete: CascadePolicy::default(),
                nullable: ty.nullable,
                doc: field.doc.clone(),
            },
            span: field.span,
            on_delete_span: None,
        });
    }

    fn field_annotations(&mut self, field: &Field, ty: &Ty) -> FieldAnnotations {
        let mut out = FieldAnnotations::default();
        for ann in &field.annotations {
            let name = ann.name.name.as_str();
            if !FIELD_ANNOTATIONS.contains(&name) {
                self.report(
                    Diagnostic::new(
                        codes::UNKNOWN_ANNOTATION,
                        format!("unknown field annotation `@{name}`"),
                    )
                    .at(self.file, ann.span),
                );
                continue;
            }
            let arity = match name {
                "primary" | "auto" | "unique" => 0,
                _ => 1,
            };
            if ann.args.len() != arity {
                self.invalid(ann, format!("`@{name}` takes {arity} argument{}", if arity == 1 { "" } else { "s" }));
                continue;
            }
            match name {
                "primary" => {
                    if self.symbol.primary_key.is_some() || out.primary {
                        self.invalid(ann, "a resource can only have one primary key".to_string());
                    } else if ty.nullable {
                        self.invalid(ann, format!("primary key `{}` must be required", field.name.name));
                    } else {
                        out.primary = true;
                    }
                }
                "auto" => out.auto = true,
                "unique" => out.unique = true,
                "min" | "max" => {
                    let Some(bound) = number_arg(&ann.args[0]) else {
                        self.invalid(ann, format!("`@{name}` expects a number"));
                        continue;
                    };
                    let sized = ty.is_numeric() || ty.is_string_like() || ty.element().is_some();
                    if !sized {
                        self.invalid(ann, format!("`@{name}` does not apply to `{ty}`"));
                        continue;
                    }
                    out.checks.push(if name == "min" { FieldCheck::Min(bound) } else { FieldCheck::Max(bound) });
                }
                "pattern" => {
                    let Some(pattern) = string_arg(&ann.args[0]) else {
                        self.invalid(ann, "`@pattern` expects a string literal".to_string());
                        continue;
                    };
                    if !ty.is_string_like() {
                        self.invalid(ann, format!("`@pattern` does not apply to `{ty}`"));
                        continue;
                    }
                    if let Err(err) = Regex::new(pattern) {
                        self.report(
                            Diagnostic::new(codes::INVALID_PATTERN, format!("invalid regex {pattern:?}: {err}"))
                                .at(self.file, ann.args[0].span),
                        );
                        continue;
                    }
                    out.checks.push(FieldCheck::Pattern(pattern.to_string()));
                }
                "foreign_key" => match string_arg(&ann.args[0]) {
                    Some(column) if strata_core::is_snake_case(column) => {
                        out.foreign_key = Some(column.to_string());
                        out.foreign_key_span = Some(ann.span);
                    }
                    _ => self.invalid(ann, "`@foreign_key` expects a snake_case column name".to_string()),
                },
                "on_delete" => {
                    let policy = match &ann.args[0].kind {
                        ExprKind::Identifier(name) => CascadePolicy::from_name(name),
                        ExprKind::Literal(Literal::String(name)) => CascadePolicy::from_name(name),
                        _ => None,
                    };
                    match policy {
                        Some(policy) => out.on_delete = Some((policy, ann.span)),
                        None => self.invalid(
                            ann,
                            "`@on_delete` expects one of restrict, cascade, set_null, no_action".to_string(),
                        ),
                    }
                }
                "default" => self.invalid(ann, "`@default` is given more than once".to_string()),
                _ => {}
            }
        }
        out
    }

    fn invalid(&mut self, ann: &Annotation, message: String) {
        self.report(Diagnostic::new(codes::INVALID_ANNOTATION, message).at(self.file, ann.span));
    }

    fn computed(&mut self) {
        let decl = self.decl;
        for computed in &decl.computed {
            let path = self.path(&computed.name.name);
            let ty = self.resolver.resolve(&computed.ty, &path);
            self.claim(&computed.name.name, computed.name.span, Member { ty, kind: MemberKind::Computed });
        }
    }

    fn functions(&mut self) {
        let decl = self.decl;
        for function in &decl.functions {
            let name = function.name.name.clone();
            let base = self.path(&name);
            let params = function
                .params
                .iter()
                .map(|p| {
                    let path = format!("{base}{}", to_pascal_case(&p.name.name));
                    (p.name.name.clone(), self.resolver.resolve(&p.ty, &path))
                })
                .collect();
            let ret = self.resolver.resolve(&function.ret, &base);
            if self.symbol.functions.contains_key(&name) {
                self.report(
                    Diagnostic::new(
                        codes::DUPLICATE_FIELD,
                        format!("function `{name}` is declared more than once in `{}`", self.symbol.name),
                    )
                    .at(self.file, function.name.span),
                );
                continue;
            }
            self.symbol.functions.insert(name.clone(), FunctionSig { name, params, ret });
        }
    }

    fn resource_annotations(&mut self) {
        let decl = self.decl;
        for ann in &decl.annotations {
            if ann.name.name != "middleware" {
                self.report(
                    Diagnostic::new(
                        codes::UNKNOWN_ANNOTATION,
                        format!("unknown resource annotation `@{}`", ann.name.name),
                    )
                    .at(self.file, ann.span),
                );
                continue;
            }
            for arg in &ann.args {
                match &arg.kind {
                    ExprKind::Identifier(name) | ExprKind::Literal(Literal::String(name)) => {
                        self.symbol.middleware.push(name.clone())
                    }
                    _ => self.report(
                        Diagnostic::new(codes::INVALID_ANNOTATION, "`@middleware` expects middleware names")
                            .at(self.file, arg.span),
                    ),
                }
            }
        }
    }
}

#[derive(Debug, Default)]
struct FieldAnnotations {
    primary: bool,
    auto: bool,
    unique: bool,
    checks: Vec<FieldCheck>,
    foreign_key: Option<String>,
    foreign_key_span: Option<Span>,
    on_delete: Option<(CascadePolicy, Span)>,
}

/// The resource a field type points at, and how.
fn relation_target(ty: &Ty) -> Option<(String, RelationKind)> {
    match &ty.kind {
        TyKind::Resource(name) => Some((name.clone(), RelationKind::BelongsTo)),
        TyKind::Array(elem) => match &elem.kind {
            TyKind::Resource(name) => Some((name.clone(), RelationKind::HasMany)),
            _ => None,
        },
        _ => None,
    }
}

fn number_arg(expr: &Expr) -> Option<f64> {
    match &expr.kind {
        ExprKind::Literal(Literal::Int(n)) => Some(*n as f64),
        ExprKind::Literal(Literal::Float(n)) => Some(*n),
        ExprKind::Unary {
            op: UnaryOp::Neg,
            operand,
        } => number_arg(operand).map(|n| -n),
        _ => None,
    }
}

fn string_arg(expr: &Expr) -> Option<&str> {
    match &expr.kind {
        ExprKind::Literal(Literal::String(s)) => Some(s),
        _ => None,
    }
}
