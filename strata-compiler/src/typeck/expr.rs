//! Expression checking.
//!
//! Bidirectional: an expected type flows down into literals (so `"draft"`
//! can become an enum value and `[]` an empty `array<int>`), and inferred
//! types flow up. Every use of a nullable value where a value is required
//! must go through `?.`, `??` or `!`; anything else is reported.

use indexmap::IndexMap;
use strata_core::Primitive;
use strata_ir::{
    AssignTarget, BinOp, Block, Callee, FieldAccess, InterpolationSegment, Lit, MatchArm,
    MatchPattern, TExpr, Ty, TyKind, TypedExpr, UnOp,
};
use strata_syntax::{
    Expr, ExprKind, SourceFile, Span,
    ast::{self, BinaryOp, Ident, InterpolationPart, Literal, Pattern, UnaryOp},
};

use super::types::{Compat, TypeResolver, compat, join, same_kind};
use crate::{
    pipeline::{Code, Diagnostic, FileId, codes},
    stdlib::{self, ArgPattern, Bindings},
    symbols::{MemberKind, ResourceSymbol, SymbolTable},
};

/// Where an expression is evaluated, which decides what it may do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalContext {
    Hook { is_async: bool },
    /// `@validate` blocks and `@constraint` expressions.
    Validation,
    /// `@computed` fields and `@function`s.
    Pure,
    /// `@default` values, evaluated before a record exists.
    Default,
}

impl EvalContext {
    fn has_self(self) -> bool {
        !matches!(self, EvalContext::Default)
    }

    fn can_assign_self(self) -> bool {
        matches!(self, EvalContext::Hook { is_async: false })
    }

    fn can_fail(self) -> bool {
        matches!(self, EvalContext::Hook { .. } | EvalContext::Validation)
    }

    fn describe(self) -> &'static str {
        match self {
            EvalContext::Hook { is_async: false } => "hooks",
            EvalContext::Hook { is_async: true } => "`@async` hooks",
            EvalContext::Validation => "validations",
            EvalContext::Pure => "computed fields and functions",
            EvalContext::Default => "`@default` values",
        }
    }
}

pub struct ExprChecker<'a> {
    symbols: &'a SymbolTable,
    resource: &'a ResourceSymbol,
    source: &'a SourceFile,
    file: FileId,
    context: EvalContext,
    scopes: Vec<IndexMap<String, Ty>>,
    rescue_depth: usize,
    nav_count: usize,
    pub diagnostics: Vec<Diagnostic>,
}

impl<'a> ExprChecker<'a> {
    pub fn new(
        symbols: &'a SymbolTable,
        resource: &'a ResourceSymbol,
        source: &'a SourceFile,
        context: EvalContext,
    ) -> Self {
        Self {
            symbols,
            resource,
            source,
            file: resource.file,
            context,
            scopes: vec![IndexMap::new()],
            rescue_depth: 0,
            nav_count: 0,
            diagnostics: Vec::new(),
        }
    }

    /// Bind function parameters as locals.
    pub fn with_params(mut self, params: &[(String, Ty)]) -> Self {
        if let Some(scope) = self.scopes.last_mut() {
            scope.extend(params.iter().cloned());
        }
        self
    }

    fn text(&self, span: Span) -> &'a str {
        self.source.slice(span)
    }

    fn report(&mut self, code: Code, message: impl Into<String>, span: Span) {
        self.diagnostics
            .push(Diagnostic::new(code, message).at(self.file, span));
    }

    fn report_fix(&mut self, code: Code, message: impl Into<String>, span: Span, fix: String) {
        self.diagnostics
            .push(Diagnostic::new(code, message).at(self.file, span).with_fix(span, fix));
    }

    fn may_fail(&self) -> bool {
        self.context.can_fail() || self.rescue_depth > 0
    }

    fn lookup_local(&self, name: &str) -> Option<&Ty> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    fn declare(&mut self, name: &str, ty: Ty) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), ty);
        }
    }

    /// Check a body block. With an expected type, its last expression must
    /// produce it.
    pub fn check_body(&mut self, block: &ast::Block, expected: Option<&Ty>) -> Block {
        self.block(block, expected)
    }

    /// Check an expression and coerce it to `expected`.
    pub fn check(&mut self, expr: &Expr, expected: Option<&Ty>) -> TypedExpr {
        let typed = self.infer(expr, expected);
        match expected {
            Some(expected) => self.coerce(typed, expected, expr.span),
            None => typed,
        }
    }

    fn coerce(&mut self, typed: TypedExpr, expected: &Ty, span: Span) -> TypedExpr {
        match compat(&typed.ty, expected) {
            Compat::Exact => settle(typed, expected),
            Compat::Lift => {
                let inner = settle(typed, &expected.as_required());
                TypedExpr::new(TExpr::Lift(Box::new(inner)), expected.clone())
            }
            Compat::Nullability => {
                let found = typed.ty.clone();
                let message = format!(
                    "expected `{expected}`, found nullable `{found}`; narrow it with `?.`, `??` or `!`"
                );
                if self.may_fail() && !found.is_nil() {
                    let fix = format!("{}!", self.text(span));
                    self.report_fix(codes::NULLABILITY, message, span, fix);
                } else {
                    self.report(codes::NULLABILITY, message, span);
                }
                TypedExpr::error()
            }
            Compat::Mismatch => {
                self.report(
                    codes::MISMATCH,
                    format!("expected `{expected}`, found `{}`", typed.ty),
                    span,
                );
                TypedExpr::error()
            }
        }
    }

    fn infer(&mut self, expr: &Expr, expected: Option<&Ty>) -> TypedExpr {
        let span = expr.span;
        match &expr.kind {
            ExprKind::Literal(lit) => self.literal(lit, expected, span),
            ExprKind::Interpolated(parts) => self.interpolation(parts, expected),
            ExprKind::Identifier(name) => self.identifier(name, span),
            ExprKind::SelfRef => {
                if !self.context.has_self() {
                    self.report(
                        codes::INVALID_CONTEXT,
                        format!("`self` is not available in {}", self.context.describe()),
                        span,
                    );
                    return TypedExpr::error();
                }
                TypedExpr::new(TExpr::SelfRef, Ty::resource(&self.resource.name))
            }
            ExprKind::FieldAccess { receiver, field } => {
                let recv = self.check(receiver, None);
                self.access(recv, field, receiver.span)
            }
            ExprKind::SafeNav { receiver, chain } => self.safe_nav(receiver, chain, span),
            ExprKind::Binary { op, lhs, rhs } => self.binary(*op, lhs, rhs, expected, span),
            ExprKind::Unary { op, operand } => self.unary(*op, operand, span),
            ExprKind::Call {
                namespace,
                name,
                args,
            } => self.call(namespace.as_ref(), name, args, span),
            ExprKind::Index { target, index } => self.index(target, index),
            ExprKind::Unwrap(inner) => self.unwrap(inner, span),
            ExprKind::Rescue {
                guarded,
                binding,
                body,
            } => self.rescue(guarded, binding.as_ref(), body, expected),
            ExprKind::If {
                cond,
                then_block,
                else_block,
            } => self.if_expr(cond, then_block, else_block.as_ref(), expected, span),
            ExprKind::Match { scrutinee, arms } => self.match_expr(scrutinee, arms, expected, span),
            ExprKind::Let { name, ty, value } => self.let_expr(name, ty.as_ref(), value),
            ExprKind::Assign { target, value } => self.assign(target, value),
            ExprKind::Array(items) => self.array(items, expected),
            ExprKind::Hash(entries) => self.hash(entries, expected),
            ExprKind::Block(block) => {
                let block = self.block(block, expected);
                let ty = block.ty.clone();
                TypedExpr::new(TExpr::Block(block), ty)
            }
            ExprKind::Fail(message) => self.fail(message, span),
            ExprKind::Error => TypedExpr::error(),
        }
    }

    fn literal(&mut self, lit: &Literal, expected: Option<&Ty>, span: Span) -> TypedExpr {
        match lit {
            Literal::Int(n) => TypedExpr::new(TExpr::Literal(Lit::Int(*n)), Ty::int()),
            Literal::Float(n) => TypedExpr::new(TExpr::Literal(Lit::Float(*n)), Ty::float()),
            Literal::Bool(b) => TypedExpr::new(TExpr::Literal(Lit::Bool(*b)), Ty::bool()),
            Literal::Nil => TypedExpr::new(TExpr::Literal(Lit::Nil), Ty::nil()),
            Literal::String(s) => {
                let lit = TExpr::Literal(Lit::String(s.clone()));
                match expected.map(|t| &t.kind) {
                    Some(TyKind::Primitive(p)) if p.is_string_like() => {
                        TypedExpr::new(lit, Ty::primitive(*p))
                    }
                    Some(TyKind::Enum(e)) => {
                        if e.has_value(s) {
                            let value = TExpr::EnumValue {
                                enum_name: e.name.clone(),
                                value: s.clone(),
                            };
                            TypedExpr::new(value, Ty::required(TyKind::Enum(e.clone())))
                        } else {
                            self.unknown_enum_value(s, &e.name, &e.values, span);
                            TypedExpr::error()
                        }
                    }
                    _ => TypedExpr::new(lit, Ty::string()),
                }
            }
        }
    }

    fn unknown_enum_value(&mut self, value: &str, enum_name: &str, values: &[String], span: Span) {
        let expected: Vec<String> = values.iter().map(|v| format!("{v:?}")).collect();
        self.report(
            codes::UNKNOWN_ENUM_VALUE,
            format!(
                "{value:?} is not a value of `{enum_name}`; expected one of {}",
                expected.join(", ")
            ),
            span,
        );
    }

    fn interpolation(&mut self, parts: &[InterpolationPart], expected: Option<&Ty>) -> TypedExpr {
        let mut segments = Vec::with_capacity(parts.len());
        for part in parts {
            match part {
                InterpolationPart::Text(text) => segments.push(InterpolationSegment::Text(text.clone())),
                InterpolationPart::Expr(expr) => {
                    let typed = self.check(expr, None);
                    let ty = &typed.ty;
                    if ty.is_error() {
                        segments.push(InterpolationSegment::Expr(typed));
                        continue;
                    }
                    if ty.nullable {
                        let message = format!("interpolated value `{}` may be nil", self.text(expr.span));
                        if ty.is_string_like() {
                            let fix = format!("{} ?? \"\"", self.text(expr.span));
                            self.report_fix(codes::NULLABILITY, message, expr.span, fix);
                        } else {
                            self.report(codes::NULLABILITY, message, expr.span);
                        }
                    } else if !matches!(ty.kind, TyKind::Primitive(_) | TyKind::Enum(_)) {
                        self.report(codes::INVALID_OPERAND, format!("cannot interpolate a value of type `{ty}`"), expr.span);
                    }
                    segments.push(InterpolationSegment::Expr(typed));
                }
            }
        }
        let ty = match expected.and_then(Ty::as_primitive) {
            Some(p) if p.is_string_like() => Ty::primitive(p),
            _ => Ty::string(),
        };
        TypedExpr::new(TExpr::Interpolation(segments), ty)
    }

    fn identifier(&mut self, name: &str, span: Span) -> TypedExpr {
        if let Some(ty) = self.lookup_local(name) {
            return TypedExpr::new(TExpr::Local(name.to_string()), ty.clone());
        }
        let message = format!("`{name}` is not defined");
        if self.context.has_self() && self.resource.member(name).is_some() {
            self.report_fix(codes::UNDEFINED_LOCAL, message, span, format!("self.{name}"));
        } else {
            self.report(codes::UNDEFINED_LOCAL, message, span);
        }
        TypedExpr::error()
    }

    /// `recv.field`, where `recv` came from the source text at `recv_span`.
    fn access(&mut self, recv: TypedExpr, field: &Ident, recv_span: Span) -> TypedExpr {
        if recv.ty.is_error() {
            return TypedExpr::error();
        }
        let whole = recv_span.to(field.span);
        if recv.ty.nullable {
            let recv_text = self.text(recv_span);
            self.report_fix(
                codes::NULLABLE_ACCESS,
                format!("`{recv_text}` may be nil; use `?.` to access `{}`", field.name),
                whole,
                format!("{recv_text}?.{}", field.name),
            );
            return TypedExpr::error();
        }

        let (access, ty) = match &recv.ty.kind {
            TyKind::Resource(name) => {
                let Some(member) = self.symbols.get(name).and_then(|s| s.member(&field.name)) else {
                    self.report(
                        codes::UNKNOWN_FIELD,
                        format!("`{name}` has no field `{}`", field.name),
                        field.span,
                    );
                    return TypedExpr::error();
                };
                let access = match &member.kind {
                    MemberKind::Column => FieldAccess::Column,
                    MemberKind::Computed => FieldAccess::Computed,
                    MemberKind::BelongsTo {
                        target,
                        foreign_key,
                    } => FieldAccess::BelongsTo {
                        target: target.clone(),
                        foreign_key: foreign_key.clone(),
                    },
                    MemberKind::HasMany {
                        target,
                        foreign_key,
                    } => FieldAccess::HasMany {
                        target: target.clone(),
                        foreign_key: foreign_key.clone(),
                        owner_key: self
                            .symbols
                            .get(name)
                            .and_then(|s| s.primary_key.clone())
                            .unwrap_or_else(|| "id".to_string()),
                    },
                };
                if access.is_navigation() && !self.context.can_fail() {
                    self.report(
                        codes::INVALID_CONTEXT,
                        format!(
                            "relationship `{}` cannot be loaded in {}",
                            field.name,
                            self.context.describe()
                        ),
                        whole,
                    );
                    return TypedExpr::error();
                }
                (access, member.ty.clone())
            }
            TyKind::Struct(s) => match s.field(&field.name) {
                Some(f) => (FieldAccess::StructField, f.ty.clone()),
                None => {
                    self.report(
                        codes::UNKNOWN_FIELD,
                        format!("`{}` has no field `{}`", s.name, field.name),
                        field.span,
                    );
                    return TypedExpr::error();
                }
            },
            _ => {
                self.report(
                    codes::UNKNOWN_FIELD,
                    format!("`{}` has no fields", recv.ty),
                    field.span,
                );
                return TypedExpr::error();
            }
        };
        TypedExpr::new(
            TExpr::Field {
                receiver: Box::new(recv),
                name: field.name.clone(),
                access,
            },
            ty,
        )
    }

    fn safe_nav(&mut self, receiver: &Expr, chain: &[Ident], span: Span) -> TypedExpr {
        let recv = self.check(receiver, None);
        if recv.ty.is_error() {
            return TypedExpr::error();
        }
        let recv = if recv.ty.nullable {
            recv
        } else {
            self.report(
                codes::UNNECESSARY_NARROWING,
                format!("`{}` is never nil; use `.` instead of `?.`", self.text(receiver.span)),
                span,
            );
            let ty = recv.ty.as_nullable();
            TypedExpr::new(TExpr::Lift(Box::new(recv)), ty)
        };

        let binding = format!("__nav{}", self.nav_count);
        self.nav_count += 1;
        let mut body = TypedExpr::new(TExpr::Local(binding.clone()), recv.ty.as_required());
        let mut recv_span = receiver.span;
        for ident in chain {
            body = self.access(body, ident, recv_span);
            if body.ty.is_error() {
                return TypedExpr::error();
            }
            recv_span = recv_span.to(ident.span);
        }
        let ty = body.ty.as_nullable();
        TypedExpr::new(
            TExpr::SafeNav {
                receiver: Box::new(recv),
                binding,
                body: Box::new(body),
            },
            ty,
        )
    }

    fn binary(&mut self, op: BinaryOp, lhs: &Expr, rhs: &Expr, expected: Option<&Ty>, span: Span) -> TypedExpr {
        let node = |op: BinOp, l: TypedExpr, r: TypedExpr, ty: Ty| {
            TypedExpr::new(
                TExpr::Binary {
                    op,
                    lhs: Box::new(l),
                    rhs: Box::new(r),
                },
                ty,
            )
        };

        match op {
            BinaryOp::And | BinaryOp::Or => {
                let l = self.check(lhs, Some(&Ty::bool()));
                let r = self.check(rhs, Some(&Ty::bool()));
                node(bin_op(op), l, r, Ty::bool())
            }
            BinaryOp::Coalesce => self.coalesce(lhs, rhs, expected),
            BinaryOp::Eq | BinaryOp::NotEq => {
                let (l, r) = self.operands(lhs, rhs);
                if l.ty.is_error() || r.ty.is_error() {
                    return node(bin_op(op), l, r, Ty::bool());
                }
                if (l.ty.is_nil() && !r.ty.nullable) || (r.ty.is_nil() && !l.ty.nullable) {
                    let value = if l.ty.is_nil() { rhs } else { lhs };
                    self.report(
                        codes::UNNECESSARY_NARROWING,
                        format!("`{}` is never nil, so this comparison is constant", self.text(value.span)),
                        span,
                    );
                }
                if !same_kind(&l.ty, &r.ty) && !l.ty.is_nil() && !r.ty.is_nil() {
                    self.report(
                        codes::MISMATCH,
                        format!("cannot compare `{}` with `{}`", l.ty, r.ty),
                        span,
                    );
                    return TypedExpr::error();
                }
                let (l, r) = match (l.ty.nullable, r.ty.nullable) {
                    (true, false) if !r.ty.is_nil() => {
                        let ty = r.ty.as_nullable();
                        (l, TypedExpr::new(TExpr::Lift(Box::new(r)), ty))
                    }
                    (false, true) if !l.ty.is_nil() => {
                        let ty = l.ty.as_nullable();
                        (TypedExpr::new(TExpr::Lift(Box::new(l)), ty), r)
                    }
                    _ => (l, r),
                };
                node(bin_op(op), l, r, Ty::bool())
            }
            _ => {
                let (l, r) = self.operands(lhs, rhs);
                if l.ty.is_error() || r.ty.is_error() {
                    return TypedExpr::error();
                }
                for (side, typed) in [(lhs, &l), (rhs, &r)] {
                    if typed.ty.nullable {
                        self.report(
                            codes::NULLABILITY,
                            format!(
                                "`{}` may be nil; `{}` needs a value",
                                self.text(side.span),
                                op.as_str()
                            ),
                            side.span,
                        );
                        return TypedExpr::error();
                    }
                }
                let result = if op.is_comparison() {
                    match (l.ty.as_primitive(), r.ty.as_primitive()) {
                        (Some(a), Some(b)) if a == b && a.is_ordered() => Some(Ty::bool()),
                        _ => None,
                    }
                } else if op == BinaryOp::Add && l.ty.is_string_like() && r.ty.is_string_like() {
                    Some(Ty::string())
                } else {
                    match (l.ty.as_primitive(), r.ty.as_primitive()) {
                        (Some(a), Some(b)) if a == b && a.is_numeric() => Some(Ty::primitive(a)),
                        _ => None,
                    }
                };
                match result {
                    Some(ty) => node(bin_op(op), l, r, ty),
                    None => {
                        self.report(
                            codes::INVALID_OPERAND,
                            format!("cannot apply `{}` to `{}` and `{}`", op.as_str(), l.ty, r.ty),
                            span,
                        );
                        TypedExpr::error()
                    }
                }
            }
        }
    }

    /// Check both operands, letting a literal on either side take its type
    /// from the other.
    fn operands(&mut self, lhs: &Expr, rhs: &Expr) -> (TypedExpr, TypedExpr) {
        if matches!(lhs.kind, ExprKind::Literal(_)) && !matches!(rhs.kind, ExprKind::Literal(_)) {
            let r = self.infer(rhs, None);
            let l = self.infer(lhs, Some(&r.ty));
            (l, r)
        } else {
            let l = self.infer(lhs, None);
            let r = self.infer(rhs, Some(&l.ty));
            (l, r)
        }
    }

    fn coalesce(&mut self, lhs: &Expr, rhs: &Expr, expected: Option<&Ty>) -> TypedExpr {
        let l = self.check(lhs, None);
        if l.ty.is_error() {
            self.check(rhs, None);
            return TypedExpr::error();
        }
        let hint = if l.ty.is_nil() {
            expected.cloned()
        } else {
            Some(l.ty.as_nullable())
        };
        let r = self.infer(rhs, hint.as_ref());
        if !l.ty.nullable {
            self.report(
                codes::UNNECESSARY_NARROWING,
                format!("`{}` is never nil; `??` has no effect", self.text(lhs.span)),
                lhs.span.to(rhs.span),
            );
            return l;
        }
        if l.ty.is_nil() {
            return r;
        }
        if r.ty.is_error() {
            return TypedExpr::error();
        }
        let base = l.ty.as_required();
        if !r.ty.is_nil() && !same_kind(&r.ty, &base) {
            self.report(
                codes::MISMATCH,
                format!("`??` fallback must be `{base}`, found `{}`", r.ty),
                rhs.span,
            );
            return TypedExpr::error();
        }
        let ty = base.with_nullable(r.ty.nullable);
        let r = settle(r, &ty);
        TypedExpr::new(
            TExpr::Coalesce {
                lhs: Box::new(l),
                rhs: Box::new(r),
            },
            ty,
        )
    }

    fn unary(&mut self, op: UnaryOp, operand: &Expr, span: Span) -> TypedExpr {
        match op {
            UnaryOp::Not => {
                let typed = self.check(operand, Some(&Ty::bool()));
                TypedExpr::new(
                    TExpr::Unary {
                        op: UnOp::Not,
                        operand: Box::new(typed),
                    },
                    Ty::bool(),
                )
            }
            UnaryOp::Neg => {
                let typed = self.check(operand, None);
                if typed.ty.is_error() {
                    return typed;
                }
                if typed.ty.nullable || !typed.ty.is_numeric() {
                    self.report(
                        codes::INVALID_OPERAND,
                        format!("cannot negate `{}`", typed.ty),
                        span,
                    );
                    return TypedExpr::error();
                }
                let ty = typed.ty.clone();
                TypedExpr::new(
                    TExpr::Unary {
                        op: UnOp::Neg,
                        operand: Box::new(typed),
                    },
                    ty,
                )
            }
        }
    }

    fn call(&mut self, namespace: Option<&Ident>, name: &Ident, args: &[Expr], span: Span) -> TypedExpr {
        let Some(namespace) = namespace else {
            let arguments: Vec<&str> = args.iter().map(|a| self.text(a.span)).collect();
            let resource = self.resource;
            let suggested = stdlib::namespace_for(&name.name).or_else(|| {
                resource
                    .functions
                    .contains_key(&name.name)
                    .then_some(resource.name.as_str())
            });
            let message = format!("call to `{}` must name its namespace", name.name);
            match suggested {
                Some(ns) => {
                    let fix = format!("{ns}.{}({})", name.name, arguments.join(", "));
                    self.report_fix(codes::UNQUALIFIED_CALL, message, span, fix);
                }
                None => self.report(codes::UNQUALIFIED_CALL, message, span),
            }
            for arg in args {
                self.check(arg, None);
            }
            return TypedExpr::error();
        };

        if namespace.name == self.resource.name {
            return self.custom_call(name, args, span);
        }
        if self.symbols.contains(&namespace.name) {
            self.report(
                codes::UNKNOWN_FUNCTION,
                format!(
                    "`{0}.{1}` can only be called from within `{0}`",
                    namespace.name, name.name
                ),
                span,
            );
            return TypedExpr::error();
        }
        let Some(sig) = stdlib::lookup(&namespace.name, &name.name) else {
            let message = if stdlib::is_namespace(&namespace.name) {
                format!("`{}` has no function `{}`", namespace.name, name.name)
            } else {
                format!("unknown namespace `{}`", namespace.name)
            };
            self.report(codes::UNKNOWN_FUNCTION, message, span);
            return TypedExpr::error();
        };
        if args.len() != sig.arity() {
            self.report(
                codes::ARITY,
                format!(
                    "`{}.{}` takes {} argument{}, found {}; signature is `{}`",
                    sig.namespace,
                    sig.name,
                    sig.arity(),
                    if sig.arity() == 1 { "" } else { "s" },
                    args.len(),
                    sig.describe()
                ),
                span,
            );
            return TypedExpr::error();
        }

        let mut bindings = Bindings::default();
        let mut typed_args = Vec::with_capacity(args.len());
        for (index, (arg, pattern)) in args.iter().zip(sig.params).enumerate() {
            typed_args.push(self.stdlib_arg(arg, *pattern, &mut bindings, index, sig.describe()));
        }
        if let Some(var) = bindings.unbound(sig.returns)
            && !typed_args.iter().any(|a| a.ty.is_error())
        {
            let collection = sig
                .params
                .iter()
                .position(|p| matches!(p, ArgPattern::Array | ArgPattern::Hash));
            let (at, example) = match collection.map(|i| (&args[i], sig.params[i])) {
                Some((arg, ArgPattern::Hash)) => (arg.span, "let entries: hash<string, string>! = {}"),
                Some((arg, _)) => (arg.span, "let items: array<string>! = []"),
                None => (span, "let items: array<string>! = []"),
            };
            self.report(
                codes::MISMATCH,
                format!(
                    "cannot infer the {var} type of `{}` from `{}`; bind it with a typed `let` first, e.g. `{example}`",
                    sig.describe(),
                    self.text(at)
                ),
                at,
            );
            return TypedExpr::error();
        }
        if sig.fallible && !self.may_fail() {
            self.report(
                codes::UNHANDLED_FAILURE,
                format!(
                    "`{}.{}` can fail, which is not allowed in {}; handle it with `rescue`",
                    sig.namespace,
                    sig.name,
                    self.context.describe()
                ),
                span,
            );
        }
        TypedExpr::new(
            TExpr::Call {
                callee: Callee::Stdlib {
                    namespace: sig.namespace.to_string(),
                    name: sig.name.to_string(),
                },
                args: typed_args,
                fallible: sig.fallible,
            },
            bindings.resolve(sig.returns),
        )
    }

    fn stdlib_arg(
        &mut self,
        arg: &Expr,
        pattern: ArgPattern,
        bindings: &mut Bindings,
        index: usize,
        signature: String,
    ) -> TypedExpr {
        let hint = match pattern {
            ArgPattern::Prim(p) => Some(Ty::primitive(p)),
            ArgPattern::ArrayOf(p) => Some(Ty::array(Ty::primitive(p))),
            ArgPattern::Elem => bindings.elem.clone(),
            ArgPattern::Key => bindings.key.clone(),
            _ => None,
        };
        let typed = self.infer(arg, hint.as_ref());
        if typed.ty.is_error() {
            return typed;
        }
        if typed.ty.nullable {
            let message = format!(
                "argument {} of `{signature}` must not be nil, found `{}`",
                index + 1,
                typed.ty
            );
            if self.may_fail() {
                let fix = format!("{}!", self.text(arg.span));
                self.report_fix(codes::NULLABILITY, message, arg.span, fix);
            } else {
                self.report(codes::NULLABILITY, message, arg.span);
            }
            return TypedExpr::error();
        }

        let ty = &typed.ty;
        let matches = match pattern {
            ArgPattern::Text => ty.is_string_like(),
            ArgPattern::Number => match ty.as_primitive() {
                Some(p) if p.is_numeric() => match bindings.number {
                    Some(bound) => bound == p,
                    None => {
                        bindings.number = Some(p);
                        true
                    }
                },
                _ => false,
            },
            ArgPattern::Prim(p) => {
                ty.is_primitive(p) || (p == Primitive::String && ty.is_string_like())
            }
            ArgPattern::Array => match &ty.kind {
                TyKind::Array(elem) => {
                    bindings.elem = Some((**elem).clone());
                    true
                }
                TyKind::EmptyArray => true,
                _ => false,
            },
            ArgPattern::ArrayOf(p) => match &ty.kind {
                TyKind::Array(elem) => elem.is_primitive(p) && !elem.nullable,
                TyKind::EmptyArray => true,
                _ => false,
            },
            ArgPattern::Hash => match &ty.kind {
                TyKind::Hash(key, value) => {
                    bindings.key = Some((**key).clone());
                    bindings.value = Some((**value).clone());
                    true
                }
                TyKind::EmptyHash => true,
                _ => false,
            },
            ArgPattern::Elem | ArgPattern::Key => {
                return match hint {
                    Some(bound) => self.coerce(typed, &bound, arg.span),
                    None => typed,
                };
            }
        };
        if !matches {
            self.report(
                codes::MISMATCH,
                format!(
                    "argument {} of `{signature}` expects `{}`, found `{ty}`",
                    index + 1,
                    pattern.describe()
                ),
                arg.span,
            );
            return TypedExpr::error();
        }
        typed
    }

    fn custom_call(&mut self, name: &Ident, args: &[Expr], span: Span) -> TypedExpr {
        let resource = self.resource;
        let Some(sig) = resource.functions.get(&name.name) else {
            self.report(
                codes::UNKNOWN_FUNCTION,
                format!("`{}` has no function `{}`", resource.name, name.name),
                span,
            );
            return TypedExpr::error();
        };
        if !self.context.has_self() {
            self.report(
                codes::INVALID_CONTEXT,
                format!(
                    "`{}.{}` needs a record and cannot be called in {}",
                    resource.name,
                    name.name,
                    self.context.describe()
                ),
                span,
            );
            return TypedExpr::error();
        }
        if args.len() != sig.params.len() {
            self.report(
                codes::ARITY,
                format!(
                    "`{}.{}` takes {} argument{}, found {}",
                    resource.name,
                    name.name,
                    sig.params.len(),
                    if sig.params.len() == 1 { "" } else { "s" },
                    args.len()
                ),
                span,
            );
            return TypedExpr::error();
        }
        let args = args
            .iter()
            .zip(&sig.params)
            .map(|(arg, (_, ty))| self.check(arg, Some(ty)))
            .collect();
        TypedExpr::new(
            TExpr::Call {
                callee: Callee::Function {
                    resource: resource.name.clone(),
                    name: name.name.clone(),
                },
                args,
                fallible: false,
            },
            sig.ret.clone(),
        )
    }

    fn index(&mut self, target: &Expr, index: &Expr) -> TypedExpr {
        let t = self.check(target, None);
        if t.ty.is_error() {
            self.check(index, None);
            return TypedExpr::error();
        }
        if t.ty.nullable {
            self.report(
                codes::NULLABLE_ACCESS,
                format!("`{}` may be nil and cannot be indexed", self.text(target.span)),
                target.span,
            );
            return TypedExpr::error();
        }
        let (index_ty, ty) = match &t.ty.kind {
            TyKind::Array(elem) => (Ty::int(), elem.as_nullable()),
            TyKind::Hash(key, value) => ((**key).clone(), value.as_nullable()),
            _ => {
                self.report(
                    codes::INVALID_OPERAND,
                    format!("cannot index into `{}`", t.ty),
                    target.span,
                );
                return TypedExpr::error();
            }
        };
        let i = self.check(index, Some(&index_ty));
        TypedExpr::new(
            TExpr::Index {
                target: Box::new(t),
                index: Box::new(i),
            },
            ty,
        )
    }

    fn unwrap(&mut self, inner: &Expr, span: Span) -> TypedExpr {
        let typed = self.check(inner, None);
        if typed.ty.is_error() {
            return typed;
        }
        if !typed.ty.nullable {
            self.report(
                codes::UNNECESSARY_NARROWING,
                format!("`{}` is never nil; `!` has no effect", self.text(inner.span)),
                span,
            );
            return typed;
        }
        if !self.may_fail() {
            self.report_fix(
                codes::UNHANDLED_FAILURE,
                format!(
                    "`!` fails when `{}` is nil, which is not allowed in {}",
                    self.text(inner.span),
                    self.context.describe()
                ),
                span,
                format!("{} ?? <fallback>", self.text(inner.span)),
            );
        }
        let ty = typed.ty.as_required();
        TypedExpr::new(TExpr::Unwrap(Box::new(typed)), ty)
    }

    fn rescue(
        &mut self,
        guarded: &Expr,
        binding: Option<&Ident>,
        body: &ast::Block,
        expected: Option<&Ty>,
    ) -> TypedExpr {
        self.rescue_depth += 1;
        let guarded = self.check(guarded, expected);
        self.rescue_depth -= 1;

        let ty = guarded.ty.clone();
        self.scopes.push(IndexMap::new());
        if let Some(binding) = binding {
            self.declare(&binding.name, Ty::string());
        }
        let body = if ty.is_error() {
            self.block(body, None)
        } else {
            self.block(body, Some(&ty))
        };
        self.scopes.pop();

        TypedExpr::new(
            TExpr::Rescue {
                guarded: Box::new(guarded),
                binding: binding.map(|b| b.name.clone()),
                body,
            },
            ty,
        )
    }

    fn if_expr(
        &mut self,
        cond: &Expr,
        then_block: &ast::Block,
        else_block: Option<&ast::Block>,
        expected: Option<&Ty>,
        span: Span,
    ) -> TypedExpr {
        let cond = self.check(cond, Some(&Ty::bool()));
        let Some(else_block) = else_block else {
            let then_block = self.block(then_block, None);
            return TypedExpr::new(
                TExpr::If {
                    cond: Box::new(cond),
                    then_block,
                    else_block: None,
                },
                Ty::unit(),
            );
        };

        let (then_block, else_block, ty) = match expected {
            Some(expected) => (
                self.block(then_block, Some(expected)),
                self.block(else_block, Some(expected)),
                expected.clone(),
            ),
            None => {
                let then_block = self.block(then_block, None);
                let else_block = self.block(else_block, None);
                match join(&then_block.ty, &else_block.ty) {
                    Some(ty) => (
                        self.settle_block(then_block, &ty),
                        self.settle_block(else_block, &ty),
                        ty,
                    ),
                    None => {
                        self.report(
                            codes::MISMATCH,
                            format!(
                                "`if` branches have different types: `{}` and `{}`",
                                then_block.ty, else_block.ty
                            ),
                            span,
                        );
                        return TypedExpr::error();
                    }
                }
            }
        };
        TypedExpr::new(
            TExpr::If {
                cond: Box::new(cond),
                then_block,
                else_block: Some(else_block),
            },
            ty,
        )
    }

    fn match_expr(
        &mut self,
        scrutinee: &Expr,
        arms: &[ast::MatchArm],
        expected: Option<&Ty>,
        span: Span,
    ) -> TypedExpr {
        let scrutinee = self.check(scrutinee, None);
        let scrutinee_ty = scrutinee.ty.clone();
        let mut typed_arms: Vec<MatchArm> = Vec::with_capacity(arms.len());
        let mut has_wildcard = false;

        for arm in arms {
            let pattern = self.pattern(&arm.pattern, &scrutinee_ty);
            let unreachable = has_wildcard
                || pattern.as_ref().is_some_and(|p| {
                    *p != MatchPattern::Wildcard && typed_arms.iter().any(|a| a.pattern == *p)
                });
            if unreachable {
                self.report(
                    codes::DUPLICATE_ARM,
                    format!(
                        "arm `{}` is unreachable; an earlier arm already matches it",
                        self.text(arm.pattern.span())
                    ),
                    arm.pattern.span(),
                );
            }
            has_wildcard |= pattern == Some(MatchPattern::Wildcard);
            let body = self.check(&arm.body, expected);
            if let Some(pattern) = pattern {
                typed_arms.push(MatchArm { pattern, body });
            }
        }

        if !has_wildcard && !scrutinee_ty.is_error() {
            let missing = missing_arms(&scrutinee_ty, &typed_arms);
            if !missing.is_empty() {
                self.report(
                    codes::NON_EXHAUSTIVE_MATCH,
                    format!(
                        "match on `{scrutinee_ty}` is not exhaustive: missing {}; add the missing arms or a `_` arm",
                        missing.join(", ")
                    ),
                    span,
                );
            }
        }

        let ty = match expected {
            Some(expected) => expected.clone(),
            None => {
                let mut ty = Ty::never();
                for arm in &typed_arms {
                    match join(&ty, &arm.body.ty) {
                        Some(joined) => ty = joined,
                        None => {
                            self.report(
                                codes::MISMATCH,
                                format!(
                                    "match arms have different types: `{ty}` and `{}`",
                                    arm.body.ty
                                ),
                                span,
                            );
                            return TypedExpr::error();
                        }
                    }
                }
                for arm in &mut typed_arms {
                    let body = std::mem::replace(&mut arm.body, TypedExpr::error());
                    arm.body = lift_to(body, &ty);
                }
                if typed_arms.is_empty() { Ty::unit() } else { ty }
            }
        };
        TypedExpr::new(
            TExpr::Match {
                scrutinee: Box::new(scrutinee),
                arms: typed_arms,
            },
            ty,
        )
    }

    fn pattern(&mut self, pattern: &Pattern, scrutinee: &Ty) -> Option<MatchPattern> {
        let (lit, span) = match pattern {
            Pattern::Wildcard(_) => return Some(MatchPattern::Wildcard),
            Pattern::Literal(lit, span) => (lit, *span),
        };
        if scrutinee.is_error() {
            return None;
        }
        let fits = match (lit, &scrutinee.kind) {
            (Literal::Nil, _) => scrutinee.nullable,
            (Literal::String(value), TyKind::Enum(e)) => {
                if !e.has_value(value) {
                    self.unknown_enum_value(value, &e.name, &e.values, span);
                    return None;
                }
                return Some(MatchPattern::EnumValue {
                    enum_name: e.name.clone(),
                    value: value.clone(),
                });
            }
            (Literal::String(_), TyKind::Primitive(p)) => p.is_string_like(),
            (Literal::Int(_), TyKind::Primitive(Primitive::Int))
            | (Literal::Float(_), TyKind::Primitive(Primitive::Float))
            | (Literal::Bool(_), TyKind::Primitive(Primitive::Bool)) => true,
            _ => false,
        };
        if !fits {
            self.report(
                codes::MISMATCH,
                format!("pattern `{}` can never match `{scrutinee}`", self.text(span)),
                span,
            );
            return None;
        }
        Some(MatchPattern::Literal(match lit {
            Literal::Int(n) => Lit::Int(*n),
            Literal::Float(n) => Lit::Float(*n),
            Literal::String(s) => Lit::String(s.clone()),
            Literal::Bool(b) => Lit::Bool(*b),
            Literal::Nil => Lit::Nil,
        }))
    }

    fn let_expr(&mut self, name: &Ident, ty: Option<&ast::TypeExpr>, value: &Expr) -> TypedExpr {
        let annotated = ty.map(|ty| {
            let symbols = self.symbols;
            let is_resource = |n: &str| symbols.contains(n);
            let mut resolver = TypeResolver::expression(&is_resource, self.file);
            let resolved = resolver.resolve(ty, &name.name);
            self.diagnostics.append(&mut resolver.diagnostics);
            resolved
        });
        let value = self.check(value, annotated.as_ref());
        let local_ty = match annotated {
            Some(ty) => ty,
            None => match value.ty.kind {
                TyKind::Nil | TyKind::EmptyArray | TyKind::EmptyHash => {
                    self.report(
                        codes::MISMATCH,
                        format!("cannot infer the type of `{}`; add a type annotation", name.name),
                        name.span,
                    );
                    Ty::error()
                }
                _ => value.ty.clone(),
            },
        };
        self.declare(&name.name, local_ty);
        TypedExpr::new(
            TExpr::Let {
                name: name.name.clone(),
                value: Box::new(value),
            },
            Ty::unit(),
        )
    }

    fn assign(&mut self, target: &Expr, value: &Expr) -> TypedExpr {
        let (target, ty) = match &target.kind {
            ExprKind::FieldAccess { receiver, field } if matches!(receiver.kind, ExprKind::SelfRef) => {
                if !self.context.can_assign_self() {
                    self.report(
                        codes::INVALID_ASSIGNMENT,
                        format!("cannot assign to `self.{}` in {}", field.name, self.context.describe()),
                        target.span,
                    );
                    self.check(value, None);
                    return TypedExpr::error();
                }
                match self.resource.column(&field.name) {
                    Some(column) => (AssignTarget::SelfField(field.name.clone()), column.ty.clone()),
                    None => {
                        let (code, message) = match self.resource.member(&field.name) {
                            Some(_) => (
                                codes::INVALID_ASSIGNMENT,
                                format!("`{}` is not a stored column and cannot be assigned", field.name),
                            ),
                            None => (
                                codes::UNKNOWN_FIELD,
                                format!("`{}` has no field `{}`", self.resource.name, field.name),
                            ),
                        };
                        self.report(code, message, field.span);
                        self.check(value, None);
                        return TypedExpr::error();
                    }
                }
            }
            ExprKind::Identifier(name) => match self.lookup_local(name) {
                Some(ty) => (AssignTarget::Local(name.clone()), ty.clone()),
                None => {
                    self.report(codes::UNDEFINED_LOCAL, format!("`{name}` is not defined"), target.span);
                    self.check(value, None);
                    return TypedExpr::error();
                }
            },
            _ => {
                self.report(
                    codes::INVALID_ASSIGNMENT,
                    "only `self.<field>` and local variables can be assigned",
                    target.span,
                );
                self.check(value, None);
                return TypedExpr::error();
            }
        };
        let value = self.check(value, Some(&ty));
        TypedExpr::new(
            TExpr::Assign {
                target,
                value: Box::new(value),
            },
            Ty::unit(),
        )
    }

    fn array(&mut self, items: &[Expr], expected: Option<&Ty>) -> TypedExpr {
        let hint = expected.and_then(Ty::element).cloned();
        let Some((first, rest)) = items.split_first() else {
            let ty = match hint {
                Some(elem) => Ty::array(elem),
                None => Ty::required(TyKind::EmptyArray),
            };
            return TypedExpr::new(TExpr::Array(Vec::new()), ty);
        };
        let first = self.check(first, hint.as_ref());
        let elem = hint.unwrap_or_else(|| first.ty.clone());
        let mut typed = vec![first];
        typed.extend(rest.iter().map(|item| self.check(item, Some(&elem))));
        TypedExpr::new(TExpr::Array(typed), Ty::array(elem))
    }

    fn hash(&mut self, entries: &[(Expr, Expr)], expected: Option<&Ty>) -> TypedExpr {
        let (mut key_hint, mut value_hint) = match expected.map(|t| &t.kind) {
            Some(TyKind::Hash(k, v)) => (Some((**k).clone()), Some((**v).clone())),
            _ => (None, None),
        };
        if entries.is_empty() {
            let ty = match (key_hint, value_hint) {
                (Some(k), Some(v)) => Ty::hash(k, v),
                _ => Ty::required(TyKind::EmptyHash),
            };
            return TypedExpr::new(TExpr::Hash(Vec::new()), ty);
        }
        let mut typed = Vec::with_capacity(entries.len());
        for (key, value) in entries {
            let k = self.check(key, key_hint.as_ref());
            let v = self.check(value, value_hint.as_ref());
            key_hint.get_or_insert_with(|| k.ty.clone());
            value_hint.get_or_insert_with(|| v.ty.clone());
            typed.push((k, v));
        }
        let key = key_hint.unwrap_or_else(Ty::error);
        let value = value_hint.unwrap_or_else(Ty::error);
        TypedExpr::new(TExpr::Hash(typed), Ty::hash(key, value))
    }

    fn fail(&mut self, message: &Expr, span: Span) -> TypedExpr {
        if !self.may_fail() {
            self.report(
                codes::UNHANDLED_FAILURE,
                format!("`fail` is not allowed in {}", self.context.describe()),
                span,
            );
        }
        let message = self.check(message, None);
        if !message.ty.is_error() && (message.ty.nullable || !message.ty.is_string_like()) {
            self.report(
                codes::MISMATCH,
                format!("`fail` needs a string message, found `{}`", message.ty),
                span,
            );
        }
        TypedExpr::new(TExpr::Fail(Box::new(message)), Ty::never())
    }

    fn block(&mut self, block: &ast::Block, expected: Option<&Ty>) -> Block {
        self.scopes.push(IndexMap::new());
        let count = block.exprs.len();
        let stmts: Vec<TypedExpr> = block
            .exprs
            .iter()
            .enumerate()
            .map(|(i, expr)| {
                if i + 1 == count {
                    self.check(expr, expected)
                } else {
                    self.infer(expr, None)
                }
            })
            .collect();
        self.scopes.pop();

        let last = stmts.last().map(|s| s.ty.clone());
        let ty = match (expected, last) {
            (Some(expected), Some(_)) => expected.clone(),
            (Some(expected), None) if !expected.is_unit() => {
                self.report(
                    codes::MISMATCH,
                    format!("empty block where `{expected}` is expected"),
                    block.span,
                );
                Ty::error()
            }
            (_, Some(ty)) => ty,
            (_, None) => Ty::unit(),
        };
        Block::new(stmts, ty)
    }

    fn settle_block(&mut self, mut block: Block, ty: &Ty) -> Block {
        if let Some(last) = block.stmts.pop() {
            block.stmts.push(lift_to(last, ty));
        }
        block.ty = ty.clone();
        block
    }
}

fn bin_op(op: BinaryOp) -> BinOp {
    match op {
        BinaryOp::Add => BinOp::Add,
        BinaryOp::Sub => BinOp::Sub,
        BinaryOp::Mul => BinOp::Mul,
        BinaryOp::Div => BinOp::Div,
        BinaryOp::Rem => BinOp::Rem,
        BinaryOp::Eq => BinOp::Eq,
        BinaryOp::NotEq => BinOp::NotEq,
        BinaryOp::Lt => BinOp::Lt,
        BinaryOp::Le => BinOp::Le,
        BinaryOp::Gt => BinOp::Gt,
        BinaryOp::Ge => BinOp::Ge,
        BinaryOp::And => BinOp::And,
        BinaryOp::Or => BinOp::Or,
        BinaryOp::Coalesce => unreachable!("`??` lowers to TExpr::Coalesce"),
    }
}

/// Give `nil`, `[]` and `{}` the concrete type they were used as.
fn settle(typed: TypedExpr, expected: &Ty) -> TypedExpr {
    match typed.ty.kind {
        TyKind::Nil | TyKind::EmptyArray | TyKind::EmptyHash => TypedExpr::new(typed.kind, expected.clone()),
        _ => typed,
    }
}

/// Lift a branch value to the nullable type of the whole expression.
fn lift_to(typed: TypedExpr, ty: &Ty) -> TypedExpr {
    match compat(&typed.ty, ty) {
        Compat::Lift => {
            let inner = settle(typed, &ty.as_required());
            TypedExpr::new(TExpr::Lift(Box::new(inner)), ty.clone())
        }
        _ => settle(typed, ty),
    }
}

/// Values a match over `ty` does not cover, rendered for a message.
fn missing_arms(ty: &Ty, arms: &[MatchArm]) -> Vec<String> {
    let covers = |pattern: &MatchPattern| arms.iter().any(|a| a.pattern == *pattern);
    let mut missing: Vec<String> = match &ty.kind {
        TyKind::Enum(e) => e
            .values
            .iter()
            .filter(|v| {
                !covers(&MatchPattern::EnumValue {
                    enum_name: e.name.clone(),
                    value: (*v).clone(),
                })
            })
            .map(|v| format!("{v:?}"))
            .collect(),
        TyKind::Primitive(Primitive::Bool) => [true, false]
            .into_iter()
            .filter(|b| !covers(&MatchPattern::Literal(Lit::Bool(*b))))
            .map(|b| b.to_string())
            .collect(),
        _ => vec!["`_`".to_string()],
    };
    if ty.nullable && !covers(&MatchPattern::Literal(Lit::Nil)) && !missing.iter().any(|m| m == "`_`") {
        missing.push("nil".to_string());
    }
    missing
}
