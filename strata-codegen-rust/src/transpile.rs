//! Lowering of typed expressions to Rust.
//!
//! The transpiler turns checked bodies into Rust source text. Nested
//! constructs are rendered with indentation relative to their first line, so
//! callers can splice the result into a function body with
//! [`Fn::body`](crate::ast::Fn::body).
//!
//! Values are owned: reading a stored field of a non-`Copy` type clones it.
//! Comparisons, formatting and standard library arguments borrow instead.

use std::collections::{BTreeSet, HashSet};

use strata_compiler::{
    language::TypeMapper,
    stdlib::{self, ArgPattern},
};
use strata_core::to_snake_case;
use strata_ir::{
    AssignTarget, BinOp, Block, Callee, FieldAccess, InterpolationSegment, Lit, MatchPattern,
    TExpr, Ty, TyKind, TypedExpr, UnOp,
};

use crate::{RUST_NAMING, RustTypeMapper};

/// Whether the body being lowered runs inside an `async` method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Hooks and validations, with a transaction `tx` in scope.
    Async,
    /// Computed fields, functions and defaults.
    Sync,
}

/// Names a generated file has to import.
#[derive(Debug, Default)]
pub struct Imports {
    /// Items from the runtime crate, e.g. `Error`.
    pub runtime: BTreeSet<&'static str>,
    /// Generated types referenced by name, e.g. `User` or `PostStatus`.
    pub types: BTreeSet<String>,
}

impl Imports {
    pub fn runtime(&mut self, name: &'static str) {
        self.runtime.insert(name);
    }
}

/// Lowered expression text.
struct Code {
    text: String,
    /// Can be used as a method receiver without parentheses.
    atomic: bool,
}

impl Code {
    fn atom(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            atomic: true,
        }
    }

    fn compound(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            atomic: false,
        }
    }

    fn wrapped(self) -> String {
        if self.atomic {
            self.text
        } else {
            format!("({})", self.text)
        }
    }
}

/// Lowers the bodies of one generated method.
pub struct Transpiler<'a> {
    runtime: &'a str,
    mode: Mode,
    imports: &'a mut Imports,
    /// Locals that are assigned after their declaration.
    mutable: HashSet<String>,
    uses_tx: bool,
    mutates_self: bool,
    temps: usize,
}

impl<'a> Transpiler<'a> {
    pub fn new(runtime: &'a str, mode: Mode, imports: &'a mut Imports) -> Self {
        Self {
            runtime,
            mode,
            imports,
            mutable: HashSet::new(),
            uses_tx: false,
            mutates_self: false,
            temps: 0,
        }
    }

    /// Whether any lowered code loaded records through `tx`.
    pub fn uses_tx(&self) -> bool {
        self.uses_tx
    }

    /// Whether any lowered code assigned to a field of `self`.
    pub fn mutates_self(&self) -> bool {
        self.mutates_self
    }

    /// Body of a function returning the block's value.
    pub fn body(&mut self, block: &Block) -> String {
        self.scan(&block.stmts);
        self.block_lines(block, !block.ty.is_unit()).join("\n")
    }

    /// Body of a method returning `Result<()>`.
    pub fn procedure(&mut self, block: &Block) -> String {
        self.scan(&block.stmts);
        let mut lines = self.block_lines(block, false);
        if !block.stmts.last().is_some_and(|s| s.ty.is_never()) {
            lines.push("Ok(())".to_string());
        }
        lines.join("\n")
    }

    /// A single expression as an owned value.
    pub fn value(&mut self, expr: &TypedExpr) -> String {
        self.scan(std::slice::from_ref(expr));
        self.expr(expr).text
    }

    /// A boolean expression, wrapped for a method returning `Result<bool>`.
    pub fn condition(&mut self, expr: &TypedExpr) -> String {
        self.scan(std::slice::from_ref(expr));
        format!("Ok({})", self.expr(expr).text)
    }

    /// A boolean expression whose result is negated.
    pub fn negated(&mut self, expr: &TypedExpr) -> String {
        self.scan(std::slice::from_ref(expr));
        format!("!{}", self.expr(expr).wrapped())
    }

    /// Rust syntax for `ty`, recording the generated types it names.
    pub fn ty(&mut self, ty: &Ty) -> String {
        record_types(ty, &mut self.imports.types);
        RustTypeMapper.map_type(ty)
    }

    fn scan(&mut self, stmts: &[TypedExpr]) {
        for stmt in stmts {
            visit(stmt, &mut |e| {
                if let TExpr::Assign {
                    target: AssignTarget::Local(name),
                    ..
                } = &e.kind
                {
                    self.mutable.insert(name.clone());
                }
            });
        }
    }

    fn block_lines(&mut self, block: &Block, want_value: bool) -> Vec<String> {
        let Some((last, init)) = block.stmts.split_last() else {
            return Vec::new();
        };
        let mut lines: Vec<String> = init.iter().map(|s| self.stmt(s)).collect();
        let tail = want_value && !last.ty.is_unit() && !matches!(last.kind, TExpr::Let { .. });
        lines.push(if tail {
            self.expr(last).text
        } else {
            self.stmt(last)
        });
        lines
    }

    /// A block expression; short single-line blocks stay on one line.
    fn block(&mut self, block: &Block, want_value: bool) -> String {
        let lines = self.block_lines(block, want_value);
        match lines.as_slice() {
            [] => "{}".to_string(),
            [line] if !line.contains('\n') && line.len() <= 60 => format!("{{ {line} }}"),
            _ => format!("{{\n{}\n}}", indent(&lines.join("\n"))),
        }
    }

    fn stmt(&mut self, expr: &TypedExpr) -> String {
        match &expr.kind {
            TExpr::Let { name, value } => {
                let binding = RUST_NAMING.binding_name(name);
                let mutability = if self.mutable.contains(name) { "mut " } else { "" };
                let code = self.expr(value).text;
                if annotated(&value.ty) {
                    let ty = self.ty(&value.ty);
                    format!("let {mutability}{binding}: {ty} = {code};")
                } else {
                    format!("let {mutability}{binding} = {code};")
                }
            }
            _ if expr.ty.is_unit() || expr.ty.is_never() => {
                let block_like = matches!(
                    expr.kind,
                    TExpr::If { .. } | TExpr::Match { .. } | TExpr::Block(_) | TExpr::Rescue { .. }
                );
                let code = self.expr(expr).text;
                if block_like { code } else { format!("{code};") }
            }
            _ => format!("let _ = {};", self.expr(expr).text),
        }
    }

    fn expr(&mut self, e: &TypedExpr) -> Code {
        if let Some(place) = place(e) {
            return if e.ty.is_copy() {
                Code::atom(place)
            } else {
                Code::atom(format!("{place}.clone()"))
            };
        }
        match &e.kind {
            TExpr::Literal(lit) => Code::atom(literal(lit)),
            TExpr::EnumValue { enum_name, value } => Code::atom(self.variant(enum_name, value)),
            TExpr::Local(_) | TExpr::SelfRef => Code::atom(place(e).unwrap_or_default()),
            TExpr::Field {
                receiver,
                name,
                access,
            } => self.field(receiver, name, access, e.ty.nullable),
            TExpr::SafeNav {
                receiver,
                binding,
                body,
            } => self.safe_nav(receiver, binding, body),
            TExpr::Binary { op, lhs, rhs } => self.binary(*op, lhs, rhs, &e.ty),
            TExpr::Unary { op, operand } => {
                let operand = self.expr(operand).wrapped();
                match op {
                    UnOp::Not => Code::compound(format!("!{operand}")),
                    UnOp::Neg => Code::compound(format!("-{operand}")),
                }
            }
            TExpr::Coalesce { lhs, rhs } => self.coalesce(lhs, rhs),
            TExpr::Call {
                callee,
                args,
                fallible,
            } => self.call(callee, args, *fallible),
            TExpr::If {
                cond,
                then_block,
                else_block,
            } => {
                let want = else_block.is_some() && !e.ty.is_unit();
                let cond = self.expr(cond).text;
                let mut text = format!("if {cond} {}", self.block(then_block, want));
                if let Some(else_block) = else_block {
                    let otherwise = match else_block.stmts.as_slice() {
                        [nested @ TypedExpr {
                            kind: TExpr::If { .. },
                            ..
                        }] => self.expr(nested).text,
                        _ => self.block(else_block, want),
                    };
                    text.push_str(" else ");
                    text.push_str(&otherwise);
                }
                Code::compound(text)
            }
            TExpr::Match { scrutinee, arms } => {
                let head = self.scrutinee(scrutinee);
                let mut lines = vec![format!("match {head} {{")];
                for arm in arms {
                    let pattern = self.pattern(&arm.pattern, &scrutinee.ty);
                    let body = match &arm.body.kind {
                        TExpr::Let { .. } => format!("{{ {} }}", self.stmt(&arm.body)),
                        _ => self.expr(&arm.body).text,
                    };
                    lines.push(format!("    {pattern} => {},", nest(&body)));
                }
                lines.push("}".to_string());
                Code::compound(lines.join("\n"))
            }
            TExpr::Let { .. } => Code::compound(format!("{{ {} }}", self.stmt(e))),
            TExpr::Assign { target, value } => {
                let value = self.expr(value).text;
                match target {
                    AssignTarget::SelfField(field) => {
                        self.mutates_self = true;
                        Code::compound(format!(
                            "self.{} = {value}",
                            RUST_NAMING.binding_name(field)
                        ))
                    }
                    AssignTarget::Local(name) => Code::compound(format!(
                        "{} = {value}",
                        RUST_NAMING.binding_name(name)
                    )),
                }
            }
            TExpr::Interpolation(segments) => self.interpolation(segments),
            TExpr::Unwrap(inner) => {
                self.imports.runtime("Error");
                let value = self.expr(inner).wrapped();
                Code::atom(format!(
                    "{value}.ok_or_else(|| Error::failed(\"unexpected nil value\"))?"
                ))
            }
            TExpr::Rescue {
                guarded,
                binding,
                body,
            } => self.rescue(guarded, binding.as_deref(), body),
            TExpr::Array(items) if items.is_empty() => Code::atom("Vec::new()"),
            TExpr::Array(items) => {
                let items: Vec<String> = items.iter().map(|i| self.expr(i).text).collect();
                Code::atom(format!("vec![{}]", items.join(", ")))
            }
            TExpr::Hash(entries) if entries.is_empty() => {
                Code::atom("std::collections::BTreeMap::new()")
            }
            TExpr::Hash(entries) => {
                let entries: Vec<String> = entries
                    .iter()
                    .map(|(k, v)| format!("({}, {})", self.expr(k).text, self.expr(v).text))
                    .collect();
                Code::atom(format!(
                    "std::collections::BTreeMap::from([{}])",
                    entries.join(", ")
                ))
            }
            TExpr::Index { target, index } => self.index(target, index),
            TExpr::Block(block) => Code::compound(self.block(block, !e.ty.is_unit())),
            TExpr::Fail(message) => {
                self.imports.runtime("Error");
                let message = self.text_arg(message);
                Code::compound(format!("return Err(Error::failed({message}))"))
            }
            TExpr::Lift(inner) => Code::atom(format!("Some({})", self.expr(inner).text)),
            TExpr::Error => Code::atom("unreachable!()"),
        }
    }

    /// `receiver` for a method call or field access, without cloning.
    fn receiver(&mut self, e: &TypedExpr) -> String {
        match place(e) {
            Some(place) => place,
            None => self.expr(e).wrapped(),
        }
    }

    fn variant(&mut self, enum_name: &str, value: &str) -> String {
        self.imports.types.insert(enum_name.to_string());
        format!("{enum_name}::{}", RUST_NAMING.variant_name(value))
    }

    fn field(&mut self, receiver: &TypedExpr, name: &str, access: &FieldAccess, nullable: bool) -> Code {
        match access {
            FieldAccess::Column | FieldAccess::StructField => {
                let recv = self.receiver(receiver);
                Code::atom(format!("{recv}.{}", RUST_NAMING.binding_name(name)))
            }
            FieldAccess::Computed => {
                let recv = self.receiver(receiver);
                Code::atom(format!("{recv}.{}()", RUST_NAMING.binding_name(name)))
            }
            FieldAccess::BelongsTo {
                target,
                foreign_key,
            } => {
                self.imports.types.insert(target.clone());
                let fk = RUST_NAMING.binding_name(foreign_key);
                self.navigate(receiver, |recv| {
                    if nullable {
                        format!("tx.load_optional::<{target}>({recv}.{fk}.as_ref()).await?")
                    } else {
                        format!("tx.load::<{target}>(&{recv}.{fk}).await?")
                    }
                })
            }
            FieldAccess::HasMany {
                target,
                foreign_key,
                owner_key,
            } => {
                self.imports.types.insert(target.clone());
                let key = RUST_NAMING.binding_name(owner_key);
                self.navigate(receiver, |recv| {
                    format!("tx.load_many::<{target}>({foreign_key:?}, &{recv}.{key}).await?")
                })
            }
        }
    }

    /// Load related records. A receiver that is not a place is bound to a
    /// temporary first so `tx` is not borrowed twice.
    fn navigate(&mut self, receiver: &TypedExpr, load: impl FnOnce(&str) -> String) -> Code {
        self.uses_tx = true;
        if let Some(place) = place(receiver) {
            return Code::atom(load(&place));
        }
        let temp = format!("__recv{}", self.temps);
        self.temps += 1;
        let value = self.expr(receiver).text;
        Code::compound(format!("{{ let {temp} = {value}; {} }}", load(&temp)))
    }

    fn safe_nav(&mut self, receiver: &TypedExpr, binding: &str, body: &TypedExpr) -> Code {
        let recv = match place(receiver) {
            Some(place) => Code::atom(format!("{place}.as_ref()")),
            None => self.expr(receiver),
        };
        let binding = RUST_NAMING.binding_name(binding);
        let inner = self.expr(body).text;
        if needs_control_flow(body) {
            let some = if body.ty.nullable {
                inner
            } else {
                format!("Some({inner})")
            };
            Code::compound(format!(
                "match {} {{\n    Some({binding}) => {},\n    None => None,\n}}",
                recv.text,
                nest(&some)
            ))
        } else {
            let method = if body.ty.nullable { "and_then" } else { "map" };
            Code::atom(format!("{}.{method}(|{binding}| {inner})", recv.wrapped()))
        }
    }

    fn binary(&mut self, op: BinOp, lhs: &TypedExpr, rhs: &TypedExpr, ty: &Ty) -> Code {
        match op {
            BinOp::Eq | BinOp::NotEq if lhs.ty.is_nil() || rhs.ty.is_nil() => {
                let value = if lhs.ty.is_nil() { rhs } else { lhs };
                let is_eq = op == BinOp::Eq;
                if value.ty.is_nil() || !value.ty.nullable {
                    let constant = value.ty.is_nil() == is_eq;
                    return Code::atom(constant.to_string());
                }
                let recv = self.receiver(value);
                let check = if is_eq { "is_none" } else { "is_some" };
                Code::atom(format!("{recv}.{check}()"))
            }
            BinOp::Eq | BinOp::NotEq => {
                let l = self.comparand(lhs, true);
                let r = self.comparand(rhs, true);
                Code::compound(format!("{l} {} {r}", op.as_str()))
            }
            BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
                let l = self.comparand(lhs, false);
                let r = self.comparand(rhs, false);
                Code::compound(format!("{l} {} {r}", op.as_str()))
            }
            BinOp::Add if ty.is_string_like() => {
                let l = self.display_arg(lhs);
                let r = self.display_arg(rhs);
                Code::atom(format!("format!(\"{{}}{{}}\", {l}, {r})"))
            }
            _ => {
                let l = self.expr(lhs).wrapped();
                let r = self.expr(rhs).wrapped();
                Code::compound(format!("{l} {} {r}", op.as_str()))
            }
        }
    }

    /// One side of a comparison. Places are compared in place; string
    /// literals compare directly against `String` for equality.
    fn comparand(&mut self, e: &TypedExpr, equality: bool) -> String {
        if let Some(place) = place(e) {
            return place;
        }
        match &e.kind {
            TExpr::Literal(Lit::String(s)) if equality => format!("{s:?}"),
            _ => self.expr(e).wrapped(),
        }
    }

    /// An argument to `format!`, which borrows its arguments.
    fn display_arg(&mut self, e: &TypedExpr) -> String {
        match place(e) {
            Some(place) => place,
            None => self.expr(e).text,
        }
    }

    /// A string argument that accepts `impl Into<String>`.
    fn text_arg(&mut self, e: &TypedExpr) -> String {
        match &e.kind {
            TExpr::Literal(Lit::String(s)) => format!("{s:?}"),
            _ => self.expr(e).text,
        }
    }

    fn coalesce(&mut self, lhs: &TypedExpr, rhs: &TypedExpr) -> Code {
        let left = self.expr(lhs);
        if needs_control_flow(rhs) {
            let right = self.expr(rhs).text;
            let some = if rhs.ty.nullable {
                "Some(value)"
            } else {
                "value"
            };
            return Code::compound(format!(
                "match {} {{\n    Some(value) => {some},\n    None => {},\n}}",
                left.text,
                nest(&right)
            ));
        }
        let left = left.wrapped();
        let right = self.expr(rhs).text;
        let lazy = !is_cheap(rhs);
        let method = match (rhs.ty.nullable, lazy) {
            (true, false) => "or",
            (true, true) => "or_else",
            (false, false) => "unwrap_or",
            (false, true) => "unwrap_or_else",
        };
        if lazy {
            Code::atom(format!("{left}.{method}(|| {right})"))
        } else {
            Code::atom(format!("{left}.{method}({right})"))
        }
    }

    fn call(&mut self, callee: &Callee, args: &[TypedExpr], fallible: bool) -> Code {
        match callee {
            Callee::Stdlib { namespace, name } => {
                let params = stdlib::lookup(namespace, name).map_or(&[][..], |sig| sig.params);
                let args: Vec<String> = args
                    .iter()
                    .enumerate()
                    .map(|(i, arg)| self.stdlib_arg(arg, params.get(i).copied()))
                    .collect();
                let call = format!(
                    "{}::stdlib::{}::{name}({})",
                    self.runtime,
                    to_snake_case(namespace),
                    args.join(", ")
                );
                Code::atom(if fallible { format!("{call}?") } else { call })
            }
            Callee::Function { name, .. } => {
                let args: Vec<String> = args.iter().map(|arg| self.expr(arg).text).collect();
                Code::atom(format!(
                    "self.{}({})",
                    RUST_NAMING.binding_name(name),
                    args.join(", ")
                ))
            }
        }
    }

    /// Standard library functions take text as `&str`, collections and
    /// element values by reference, and other `Copy` values by value.
    /// Integer literals are suffixed so generic number functions infer `i64`.
    fn stdlib_arg(&mut self, arg: &TypedExpr, pattern: Option<ArgPattern>) -> String {
        let by_ref = matches!(pattern, Some(ArgPattern::Elem | ArgPattern::Key));
        match &arg.kind {
            TExpr::Literal(Lit::String(s)) if !by_ref => return format!("{s:?}"),
            TExpr::Literal(Lit::Int(n)) if !by_ref => return format!("{n}_i64"),
            TExpr::Unary {
                op: UnOp::Neg,
                operand,
            } if !by_ref => {
                if let TExpr::Literal(Lit::Int(n)) = operand.kind {
                    return format!("-{n}_i64");
                }
            }
            _ => {}
        }
        if arg.ty.is_copy() && !by_ref {
            return self.expr(arg).text;
        }
        match place(arg) {
            Some(place) => format!("&{place}"),
            None => format!("&{}", self.expr(arg).wrapped()),
        }
    }

    fn scrutinee(&mut self, e: &TypedExpr) -> String {
        if e.ty.is_string_like() {
            let recv = self.receiver(e);
            let view = if e.ty.nullable { "as_deref" } else { "as_str" };
            return format!("{recv}.{view}()");
        }
        match place(e) {
            Some(place) => place,
            None => self.expr(e).text,
        }
    }

    fn pattern(&mut self, pattern: &MatchPattern, ty: &Ty) -> String {
        let inner = match pattern {
            MatchPattern::Wildcard => return "_".to_string(),
            MatchPattern::Literal(Lit::Nil) => return "None".to_string(),
            MatchPattern::Literal(Lit::String(s)) => format!("{s:?}"),
            MatchPattern::Literal(lit) => literal(lit),
            MatchPattern::EnumValue { enum_name, value } => self.variant(enum_name, value),
        };
        if ty.nullable {
            format!("Some({inner})")
        } else {
            inner
        }
    }

    fn interpolation(&mut self, segments: &[InterpolationSegment]) -> Code {
        let mut template = String::new();
        let mut args = Vec::new();
        for segment in segments {
            match segment {
                InterpolationSegment::Text(text) => {
                    template.push_str(&text.replace('{', "{{").replace('}', "}}"));
                }
                InterpolationSegment::Expr(e) => {
                    template.push_str("{}");
                    args.push(self.display_arg(e));
                }
            }
        }
        if args.is_empty() {
            let text: String = segments
                .iter()
                .filter_map(|s| match s {
                    InterpolationSegment::Text(text) => Some(text.as_str()),
                    InterpolationSegment::Expr(_) => None,
                })
                .collect();
            return Code::atom(format!("{text:?}.to_string()"));
        }
        Code::atom(format!("format!({template:?}, {})", args.join(", ")))
    }

    /// Lowers `guarded rescue binding { body }` so `body` runs only when
    /// `guarded` returns an error.
    fn rescue(&mut self, guarded: &TypedExpr, binding: Option<&str>, body: &Block) -> Code {
        self.imports.runtime("Error");
        let value = self.expr(guarded).text;
        let attempt = match self.mode {
            Mode::Async => format!("async {{ Ok::<_, Error>({}) }}.await", nest(&value)),
            Mode::Sync => {
                self.imports.runtime("Result");
                format!("(|| -> Result<_> {{ Ok({}) }})()", nest(&value))
            }
        };
        let mut lines = self.block_lines(body, !body.ty.is_unit());
        let error = match binding {
            Some(binding) => {
                let binding = RUST_NAMING.binding_name(binding);
                lines.insert(0, format!("let {binding} = error.to_string();"));
                "Err(error)"
            }
            None => "Err(_)",
        };
        let handler = if lines.is_empty() {
            "{}".to_string()
        } else {
            format!("{{\n{}\n}}", indent(&lines.join("\n")))
        };
        Code::compound(format!(
            "match {attempt} {{\n    Ok(value) => value,\n    {error} => {}\n}}",
            nest(&handler)
        ))
    }

    fn index(&mut self, target: &TypedExpr, index: &TypedExpr) -> Code {
        let recv = self.receiver(target);
        match &target.ty.kind {
            TyKind::Hash(..) => {
                let key = match (&index.kind, place(index)) {
                    (TExpr::Literal(Lit::String(s)), _) => format!("{s:?}"),
                    (_, Some(place)) => format!("&{place}"),
                    _ => format!("&{}", self.expr(index).wrapped()),
                };
                Code::atom(format!("{recv}.get({key}).cloned()"))
            }
            _ => {
                let i = self.expr(index).text;
                let lookup =
                    format!("{recv}.get(usize::try_from({i}).unwrap_or(usize::MAX)).cloned()");
                let nested = target.ty.element().is_some_and(|elem| elem.nullable);
                Code::atom(if nested {
                    format!("{lookup}.flatten()")
                } else {
                    lookup
                })
            }
        }
    }
}

fn literal(lit: &Lit) -> String {
    match lit {
        Lit::Int(n) => n.to_string(),
        Lit::Float(n) => format!("{n:?}"),
        Lit::String(s) => format!("{s:?}.to_string()"),
        Lit::Bool(b) => b.to_string(),
        Lit::Nil => "None".to_string(),
    }
}

/// A readable storage location: a local, `self`, or a chain of stored
/// fields on one.
fn place(e: &TypedExpr) -> Option<String> {
    match &e.kind {
        TExpr::Local(name) => Some(RUST_NAMING.binding_name(name)),
        TExpr::SelfRef => Some("self".to_string()),
        TExpr::Field {
            receiver,
            name,
            access: FieldAccess::Column | FieldAccess::StructField,
        } => Some(format!("{}.{}", place(receiver)?, RUST_NAMING.binding_name(name))),
        _ => None,
    }
}

/// Values that are free to compute eagerly.
fn is_cheap(e: &TypedExpr) -> bool {
    match &e.kind {
        TExpr::Literal(Lit::String(_)) => false,
        TExpr::Literal(_) | TExpr::EnumValue { .. } => true,
        TExpr::Lift(inner) => is_cheap(inner),
        _ => place(e).is_some() && e.ty.is_copy(),
    }
}

fn annotated(ty: &Ty) -> bool {
    !matches!(
        ty.kind,
        TyKind::Unit
            | TyKind::Never
            | TyKind::Error
            | TyKind::Nil
            | TyKind::EmptyArray
            | TyKind::EmptyHash
    )
}

/// Expressions that return early, await or propagate errors cannot be
/// lowered inside a closure.
fn needs_control_flow(e: &TypedExpr) -> bool {
    let mut found = false;
    visit(e, &mut |node| {
        found |= match &node.kind {
            TExpr::Call { fallible, .. } => *fallible,
            TExpr::Field { access, .. } => access.is_navigation(),
            TExpr::Unwrap(_) | TExpr::Fail(_) | TExpr::Rescue { .. } => true,
            _ => false,
        };
    });
    found
}

/// Visit `e` and every expression inside it, including `rescue` guards.
fn visit(e: &TypedExpr, f: &mut dyn FnMut(&TypedExpr)) {
    f(e);
    match &e.kind {
        TExpr::Literal(_)
        | TExpr::EnumValue { .. }
        | TExpr::Local(_)
        | TExpr::SelfRef
        | TExpr::Error => {}
        TExpr::Field { receiver, .. } => visit(receiver, f),
        TExpr::SafeNav { receiver, body, .. } => {
            visit(receiver, f);
            visit(body, f);
        }
        TExpr::Binary { lhs, rhs, .. }
        | TExpr::Coalesce { lhs, rhs }
        | TExpr::Index {
            target: lhs,
            index: rhs,
        } => {
            visit(lhs, f);
            visit(rhs, f);
        }
        TExpr::Unary { operand: inner, .. }
        | TExpr::Unwrap(inner)
        | TExpr::Fail(inner)
        | TExpr::Lift(inner)
        | TExpr::Let { value: inner, .. }
        | TExpr::Assign { value: inner, .. } => visit(inner, f),
        TExpr::Call { args: items, .. } | TExpr::Array(items) => {
            items.iter().for_each(|item| visit(item, f));
        }
        TExpr::Hash(entries) => {
            for (k, v) in entries {
                visit(k, f);
                visit(v, f);
            }
        }
        TExpr::If {
            cond,
            then_block,
            else_block,
        } => {
            visit(cond, f);
            visit_block(then_block, f);
            if let Some(else_block) = else_block {
                visit_block(else_block, f);
            }
        }
        TExpr::Match { scrutinee, arms } => {
            visit(scrutinee, f);
            arms.iter().for_each(|arm| visit(&arm.body, f));
        }
        TExpr::Interpolation(segments) => {
            for segment in segments {
                if let InterpolationSegment::Expr(e) = segment {
                    visit(e, f);
                }
            }
        }
        TExpr::Rescue { guarded, body, .. } => {
            visit(guarded, f);
            visit_block(body, f);
        }
        TExpr::Block(block) => visit_block(block, f),
    }
}

fn visit_block(block: &Block, f: &mut dyn FnMut(&TypedExpr)) {
    block.stmts.iter().for_each(|stmt| visit(stmt, f));
}

/// Collect the names of generated types `ty` refers to.
fn record_types(ty: &Ty, names: &mut BTreeSet<String>) {
    match &ty.kind {
        TyKind::Array(elem) => record_types(elem, names),
        TyKind::Hash(key, value) => {
            record_types(key, names);
            record_types(value, names);
        }
        TyKind::Enum(e) => {
            names.insert(e.name.clone());
        }
        TyKind::Struct(s) => {
            names.insert(s.name.clone());
        }
        TyKind::Resource(name) => {
            names.insert(name.clone());
        }
        _ => {}
    }
}

fn indent(text: &str) -> String {
    text.lines()
        .map(|line| {
            if line.is_empty() {
                String::new()
            } else {
                format!("    {line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Indent every line after the first, for text spliced after an indented
/// prefix.
fn nest(text: &str) -> String {
    match text.split_once('\n') {
        Some((first, rest)) => format!("{first}\n{}", indent(rest)),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use strata_ir::EnumTy;

    use super::*;

    fn expr(kind: TExpr, ty: Ty) -> TypedExpr {
        TypedExpr::new(kind, ty)
    }

    fn string(s: &str) -> TypedExpr {
        expr(TExpr::Literal(Lit::String(s.into())), Ty::string())
    }

    fn int(n: i64) -> TypedExpr {
        expr(TExpr::Literal(Lit::Int(n)), Ty::int())
    }

    fn column(name: &str, ty: Ty) -> TypedExpr {
        expr(
            TExpr::Field {
                receiver: Box::new(expr(TExpr::SelfRef, Ty::resource("Post"))),
                name: name.into(),
                access: FieldAccess::Column,
            },
            ty,
        )
    }

    fn binary(op: BinOp, lhs: TypedExpr, rhs: TypedExpr, ty: Ty) -> TypedExpr {
        expr(
            TExpr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
            ty,
        )
    }

    fn lower(mode: Mode, e: &TypedExpr) -> (String, Imports) {
        let mut imports = Imports::default();
        let code = Transpiler::new("strata_runtime", mode, &mut imports).value(e);
        (code, imports)
    }

    #[test]
    fn test_stored_fields_clone_unless_copy() {
        let (title, _) = lower(Mode::Sync, &column("title", Ty::string()));
        let (views, _) = lower(Mode::Sync, &column("viewCount", Ty::int()));
        assert_eq!(title, "self.title.clone()");
        assert_eq!(views, "self.view_count");
    }

    #[test]
    fn test_comparisons_borrow_places() {
        let e = binary(
            BinOp::Eq,
            column("title", Ty::string()),
            string("draft"),
            Ty::bool(),
        );
        assert_eq!(lower(Mode::Sync, &e).0, r#"self.title == "draft""#);

        let nil = expr(TExpr::Literal(Lit::Nil), Ty::nil());
        let e = binary(
            BinOp::NotEq,
            column("summary", Ty::string().as_nullable()),
            nil,
            Ty::bool(),
        );
        assert_eq!(lower(Mode::Sync, &e).0, "self.summary.is_some()");
    }

    #[test]
    fn test_nested_binary_operands_are_parenthesized() {
        let sum = binary(BinOp::Add, int(1), column("count", Ty::int()), Ty::int());
        let e = binary(BinOp::Mul, sum, int(2), Ty::int());
        assert_eq!(lower(Mode::Sync, &e).0, "(1 + self.count) * 2");
    }

    #[test]
    fn test_string_concatenation_formats() {
        let e = binary(
            BinOp::Add,
            column("first", Ty::string()),
            string(" "),
            Ty::string(),
        );
        assert_eq!(
            lower(Mode::Sync, &e).0,
            r#"format!("{}{}", self.first, " ".to_string())"#
        );
    }

    #[test]
    fn test_coalesce_picks_lazy_form_for_allocations() {
        let e = expr(
            TExpr::Coalesce {
                lhs: Box::new(column("summary", Ty::string().as_nullable())),
                rhs: Box::new(string("none")),
            },
            Ty::string(),
        );
        assert_eq!(
            lower(Mode::Sync, &e).0,
            r#"self.summary.clone().unwrap_or_else(|| "none".to_string())"#
        );

        let e = expr(
            TExpr::Coalesce {
                lhs: Box::new(column("rank", Ty::int().as_nullable())),
                rhs: Box::new(int(0)),
            },
            Ty::int(),
        );
        assert_eq!(lower(Mode::Sync, &e).0, "self.rank.unwrap_or(0)");
    }

    #[test]
    fn test_stdlib_calls_borrow_text_and_propagate_failure() {
        let e = expr(
            TExpr::Call {
                callee: Callee::Stdlib {
                    namespace: "String".into(),
                    name: "length".into(),
                },
                args: vec![column("title", Ty::string())],
                fallible: false,
            },
            Ty::int(),
        );
        assert_eq!(
            lower(Mode::Sync, &e).0,
            "strata_runtime::stdlib::string::length(&self.title)"
        );

        let e = expr(
            TExpr::Call {
                callee: Callee::Stdlib {
                    namespace: "Json".into(),
                    name: "parse".into(),
                },
                args: vec![string("{}")],
                fallible: true,
            },
            Ty::primitive(strata_core::Primitive::Json),
        );
        assert_eq!(
            lower(Mode::Sync, &e).0,
            r#"strata_runtime::stdlib::json::parse("{}")?"#
        );
    }

    #[test]
    fn test_belongs_to_loads_through_transaction() {
        let e = expr(
            TExpr::Field {
                receiver: Box::new(expr(TExpr::SelfRef, Ty::resource("Post"))),
                name: "author".into(),
                access: FieldAccess::BelongsTo {
                    target: "User".into(),
                    foreign_key: "author_id".into(),
                },
            },
            Ty::resource("User"),
        );
        let mut imports = Imports::default();
        let mut transpiler = Transpiler::new("strata_runtime", Mode::Async, &mut imports);
        let code = transpiler.value(&e);
        assert!(transpiler.uses_tx());
        assert_eq!(code, "tx.load::<User>(&self.author_id).await?");
        assert!(imports.types.contains("User"));
    }

    #[test]
    fn test_safe_navigation_maps_without_control_flow() {
        let binding = expr(TExpr::Local("__nav0".into()), Ty::resource("Profile"));
        let body = expr(
            TExpr::Field {
                receiver: Box::new(binding),
                name: "bio".into(),
                access: FieldAccess::Column,
            },
            Ty::string(),
        );
        let e = expr(
            TExpr::SafeNav {
                receiver: Box::new(column("profile", Ty::resource("Profile").as_nullable())),
                binding: "__nav0".into(),
                body: Box::new(body),
            },
            Ty::string().as_nullable(),
        );
        assert_eq!(
            lower(Mode::Sync, &e).0,
            "self.profile.as_ref().map(|__nav0| __nav0.bio.clone())"
        );
    }

    #[test]
    fn test_interpolation_escapes_braces() {
        let e = expr(
            TExpr::Interpolation(vec![
                InterpolationSegment::Text("{id} ".into()),
                InterpolationSegment::Expr(column("title", Ty::string())),
            ]),
            Ty::string(),
        );
        assert_eq!(
            lower(Mode::Sync, &e).0,
            r#"format!("{{id}} {}", self.title)"#
        );
    }

    #[test]
    fn test_match_on_enum_imports_type() {
        let status = Ty::required(TyKind::Enum(EnumTy {
            name: "PostStatus".into(),
            values: vec!["draft".into(), "published".into()],
        }));
        let e = expr(
            TExpr::Match {
                scrutinee: Box::new(column("status", status)),
                arms: vec![
                    strata_ir::MatchArm {
                        pattern: MatchPattern::EnumValue {
                            enum_name: "PostStatus".into(),
                            value: "draft".into(),
                        },
                        body: string("Draft"),
                    },
                    strata_ir::MatchArm {
                        pattern: MatchPattern::Wildcard,
                        body: string("Live"),
                    },
                ],
            },
            Ty::string(),
        );
        let (code, imports) = lower(Mode::Sync, &e);
        insta::assert_snapshot!(code, @r#"
        match self.status {
            PostStatus::Draft => "Draft".to_string(),
            _ => "Live".to_string(),
        }
        "#);
        assert!(imports.types.contains("PostStatus"));
    }

    #[test]
    fn test_procedure_declares_assigned_locals_mutable() {
        let declare = expr(
            TExpr::Let {
                name: "total".into(),
                value: Box::new(int(0)),
            },
            Ty::unit(),
        );
        let assign = expr(
            TExpr::Assign {
                target: AssignTarget::Local("total".into()),
                value: Box::new(int(1)),
            },
            Ty::unit(),
        );
        let store = expr(
            TExpr::Assign {
                target: AssignTarget::SelfField("viewCount".into()),
                value: Box::new(expr(TExpr::Local("total".into()), Ty::int())),
            },
            Ty::unit(),
        );
        let block = Block::new(vec![declare, assign, store], Ty::unit());
        let mut imports = Imports::default();
        let mut transpiler = Transpiler::new("strata_runtime", Mode::Async, &mut imports);
        let code = transpiler.procedure(&block);
        assert!(transpiler.mutates_self());
        insta::assert_snapshot!(code, @r"
        let mut total: i64 = 0;
        total = 1;
        self.view_count = total;
        Ok(())
        ");
    }

    #[test]
    fn test_rescue_binds_failure_message() {
        let parse = expr(
            TExpr::Call {
                callee: Callee::Stdlib {
                    namespace: "Json".into(),
                    name: "parse".into(),
                },
                args: vec![column("raw", Ty::string())],
                fallible: true,
            },
            Ty::primitive(strata_core::Primitive::Json),
        );
        let fallback = expr(
            TExpr::Call {
                callee: Callee::Stdlib {
                    namespace: "Json".into(),
                    name: "parse".into(),
                },
                args: vec![string("null")],
                fallible: false,
            },
            Ty::primitive(strata_core::Primitive::Json),
        );
        let e = expr(
            TExpr::Rescue {
                guarded: Box::new(parse),
                binding: Some("err".into()),
                body: Block::new(vec![fallback], Ty::primitive(strata_core::Primitive::Json)),
            },
            Ty::primitive(strata_core::Primitive::Json),
        );
        let (code, imports) = lower(Mode::Async, &e);
        insta::assert_snapshot!(code, @r#"
        match async { Ok::<_, Error>(strata_runtime::stdlib::json::parse(&self.raw)?) }.await {
            Ok(value) => value,
            Err(error) => {
                let err = error.to_string();
                strata_runtime::stdlib::json::parse("null")
            }
        }
        "#);
        assert!(imports.runtime.contains("Error"));
    }
}
