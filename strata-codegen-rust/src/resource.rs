//! Rendering of one resource into a Rust module.

use std::collections::{BTreeSet, HashSet};

use strata_compiler::language::TypeMapper;
use strata_core::to_snake_case;
use strata_ir::{
    ComputedIr, ConstraintIr, EnumTy, FieldCheck, FieldIr, FunctionIr, HookIr, HookTiming,
    Operation, ResourceIr, StructTy, TyKind, TypedExpr, ValidationIr,
};

use crate::{
    Enum, Field, Fn, Impl, Param, RUST_NAMING, RustFile, RustTypeMapper, Struct, Use, Variant,
    transpile::{Imports, Mode, Transpiler},
};

const RECORD_DERIVES: [&str; 5] = ["Debug", "Clone", "PartialEq", "Serialize", "Deserialize"];
const ENUM_DERIVES: [&str; 8] = [
    "Debug",
    "Clone",
    "Copy",
    "PartialEq",
    "Eq",
    "Hash",
    "Serialize",
    "Deserialize",
];

/// Render the module for `resource`. Runtime items are imported from the
/// `runtime` crate; types of other resources come from `super`.
pub fn render_resource(resource: &ResourceIr, runtime: &str) -> String {
    ResourceRenderer {
        resource,
        runtime,
        imports: Imports::default(),
        mutating_hooks: HashSet::new(),
    }
    .render()
}

/// Method names generated on the resource type, in declaration order.
pub fn method_names(resource: &ResourceIr) -> Vec<String> {
    let mut names: Vec<String> = resource
        .fields
        .iter()
        .filter(|f| f.default.is_some())
        .map(|f| default_fn_name(&f.name))
        .collect();
    names.extend(resource.computed.iter().map(|c| RUST_NAMING.binding_name(&c.name)));
    names.extend(resource.functions.iter().map(|f| RUST_NAMING.binding_name(&f.name)));
    names.push("validate".to_string());
    names.extend(resource.constraints.iter().map(|c| constraint_fn_name(&c.name)));
    names.extend(validation_fns(resource).into_iter().map(|(method, _, _)| method));
    names.extend(resource.hooks.iter().map(|h| RUST_NAMING.binding_name(&h.method)));
    names.extend(["create", "list"].map(String::from));
    if resource.primary_key.is_some() {
        names.extend(["find", "update", "delete"].map(String::from));
    }
    names
}

fn default_fn_name(field: &str) -> String {
    format!("default_{}", to_snake_case(field))
}

fn constraint_fn_name(constraint: &str) -> String {
    format!("constraint_{}", to_snake_case(constraint))
}

/// Method name and error label of every validation block.
fn validation_fns(resource: &ResourceIr) -> Vec<(String, String, &ValidationIr)> {
    let mut unnamed = 0;
    resource
        .validations
        .iter()
        .map(|v| match &v.name {
            Some(name) => (format!("validate_{}", to_snake_case(name)), name.clone(), v),
            None => {
                unnamed += 1;
                (format!("validation_{unnamed}"), resource.name.clone(), v)
            }
        })
        .collect()
}

struct ResourceRenderer<'a> {
    resource: &'a ResourceIr,
    runtime: &'a str,
    imports: Imports,
    /// Hooks whose method takes `&mut self`.
    mutating_hooks: HashSet<String>,
}

impl ResourceRenderer<'_> {
    fn render(mut self) -> String {
        let resource = self.resource;
        let mut file = RustFile::new().add(self.record_struct());
        for e in &resource.enums {
            file = file
                .add(enum_def(e))
                .add(enum_impl(e))
                .add(display_impl(&e.name));
        }
        for s in &resource.structs {
            file = file.add(self.inline_struct(s));
        }
        file = file.add(self.record_impl());
        let methods = self.methods();
        file = file.add(Impl::new(&resource.name).methods(methods));

        file = file.use_stmt(Use::new("serde").symbols(["Deserialize", "Serialize"]));
        file = file.use_stmt(Use::new(self.runtime).symbols(self.imports.runtime.iter().copied()));
        let owned: BTreeSet<&str> = std::iter::once(resource.name.as_str())
            .chain(resource.enums.iter().map(|e| e.name.as_str()))
            .chain(resource.structs.iter().map(|s| s.name.as_str()))
            .collect();
        let foreign: Vec<&String> = self
            .imports
            .types
            .iter()
            .filter(|name| !owned.contains(name.as_str()))
            .collect();
        if !foreign.is_empty() {
            file = file.use_stmt(Use::new("super").symbols(foreign));
        }
        file.render()
    }

    fn ty(&mut self, ty: &strata_ir::Ty) -> String {
        Transpiler::new(self.runtime, Mode::Sync, &mut self.imports).ty(ty)
    }

    fn record_struct(&mut self) -> Struct {
        let resource = self.resource;
        let mut record = Struct::new(&resource.name)
            .doc(resource.doc.as_deref())
            .derives(RECORD_DERIVES);
        for field in &resource.fields {
            let mut rendered = self.field(&field.name, &field.ty).doc(field.doc.as_deref());
            if field.default.is_some() {
                rendered = rendered.attr(format!(
                    "serde(default = \"{}::{}\")",
                    resource.name,
                    default_fn_name(&field.name)
                ));
            }
            record = record.field(rendered);
        }
        record
    }

    fn inline_struct(&mut self, s: &StructTy) -> Struct {
        let mut rendered = Struct::new(&s.name).derives(RECORD_DERIVES);
        for field in &s.fields {
            rendered = rendered.field(self.field(&field.name, &field.ty));
        }
        rendered
    }

    fn field(&mut self, name: &str, ty: &strata_ir::Ty) -> Field {
        let binding = RUST_NAMING.binding_name(name);
        let renamed = binding.trim_start_matches("r#") != name;
        let mut field = Field::new(&binding, self.ty(ty));
        if renamed {
            field = field.attr(format!("serde(rename = {name:?})"));
        }
        field
    }

    fn record_impl(&mut self) -> Impl {
        self.imports.runtime("Record");
        let resource = self.resource;
        let primary_key = match &resource.primary_key {
            Some(pk) => format!("Some({pk:?})"),
            None => "None".to_string(),
        };
        Impl::new(&resource.name)
            .for_trait("Record")
            .constant(format!("const RESOURCE: &'static str = {:?};", resource.name))
            .constant(format!("const TABLE: &'static str = {:?};", resource.table))
            .constant(format!(
                "const PRIMARY_KEY: Option<&'static str> = {primary_key};"
            ))
    }

    fn methods(&mut self) -> Vec<Fn> {
        let resource = self.resource;
        let mut methods = Vec::new();
        for field in &resource.fields {
            if let Some(default) = &field.default {
                methods.push(self.default_fn(field, default));
            }
        }
        for computed in &resource.computed {
            methods.push(self.computed_fn(computed));
        }
        for function in &resource.functions {
            methods.push(self.function_fn(function));
        }
        methods.extend(self.validate_fns());
        for hook in &resource.hooks {
            methods.push(self.hook_fn(hook));
        }
        methods.extend(self.crud_fns());
        methods
    }

    fn default_fn(&mut self, field: &FieldIr, default: &TypedExpr) -> Fn {
        let mut transpiler = Transpiler::new(self.runtime, Mode::Sync, &mut self.imports);
        let ret = transpiler.ty(&field.ty);
        let body = transpiler.value(default);
        Fn::new(default_fn_name(&field.name))
            .doc(Some(format!("Default value of `{}`.", field.name)))
            .returns(ret)
            .body(&body)
    }

    fn computed_fn(&mut self, computed: &ComputedIr) -> Fn {
        let mut transpiler = Transpiler::new(self.runtime, Mode::Sync, &mut self.imports);
        let ret = transpiler.ty(&computed.ty);
        let body = transpiler.body(&computed.body);
        Fn::new(RUST_NAMING.binding_name(&computed.name))
            .doc(computed.doc.as_deref())
            .param(Param::receiver("&self"))
            .returns(ret)
            .body(&body)
    }

    fn function_fn(&mut self, function: &FunctionIr) -> Fn {
        let mut transpiler = Transpiler::new(self.runtime, Mode::Sync, &mut self.imports);
        let mut rendered = Fn::new(RUST_NAMING.binding_name(&function.name))
            .doc(function.doc.as_deref())
            .param(Param::receiver("&self"));
        for param in &function.params {
            rendered = rendered.param(Param::new(
                RUST_NAMING.binding_name(&param.name),
                transpiler.ty(&param.ty),
            ));
        }
        if !function.ret.is_unit() {
            rendered = rendered.returns(transpiler.ty(&function.ret));
        }
        let body = transpiler.body(&function.body);
        rendered.body(&body)
    }

    /// `validate` plus one private method per constraint and validation
    /// block.
    fn validate_fns(&mut self) -> Vec<Fn> {
        for name in ["Operation", "Result", "Tx"] {
            self.imports.runtime(name);
        }
        let resource = self.resource;
        let mut lines = Vec::new();
        let mut helpers = Vec::new();

        let checks: Vec<String> = resource.fields.iter().flat_map(|f| self.checks(f)).collect();
        guarded(&mut lines, Some(not_delete()), checks);

        for constraint in &resource.constraints {
            let method = constraint_fn_name(&constraint.name);
            helpers.push(self.constraint_fn(&method, constraint));
            let label = format!("{:?}", constraint.name);
            let call = vec![
                format!("match self.{method}(tx).await {{"),
                "    Ok(true) => {}".to_string(),
                format!(
                    "    Ok(false) => errors.push(ValidationError::new({label}, {:?})),",
                    constraint.message
                ),
                format!(
                    "    Err(Error::Failed(message)) => errors.push(ValidationError::new({label}, message)),"
                ),
                "    Err(error) => return Err(error),".to_string(),
                "}".to_string(),
            ];
            guarded(&mut lines, operation_guard(constraint), call);
        }

        for (method, label, validation) in validation_fns(resource) {
            helpers.push(self.validation_fn(&method, validation));
            let call = vec![
                format!("match self.{method}(tx).await {{"),
                "    Ok(()) => {}".to_string(),
                format!(
                    "    Err(Error::Failed(message)) => errors.push(ValidationError::new({label:?}, message)),"
                ),
                "    Err(error) => return Err(error),".to_string(),
                "}".to_string(),
            ];
            guarded(&mut lines, Some(not_delete()), call);
        }

        let validate = Fn::new("validate")
            .doc(Some(
                "Runs every field check, constraint and validation block, collecting all failures.",
            ))
            .async_()
            .param(Param::receiver("&self"));
        let validate = if lines.is_empty() {
            validate
                .param(Param::new("_tx", "&mut Tx"))
                .param(Param::new("_operation", "Operation"))
                .returns("Result<()>")
                .body("Ok(())")
        } else {
            self.imports.runtime("Error");
            self.imports.runtime("ValidationError");
            let tx = if helpers.is_empty() { "_tx" } else { "tx" };
            let mut body = vec!["let mut errors = Vec::new();".to_string()];
            body.extend(lines);
            body.extend(
                [
                    "if errors.is_empty() {",
                    "    Ok(())",
                    "} else {",
                    "    Err(Error::Validation(errors))",
                    "}",
                ]
                .map(String::from),
            );
            validate
                .param(Param::new(tx, "&mut Tx"))
                .param(Param::new("operation", "Operation"))
                .returns("Result<()>")
                .body(&body.join("\n"))
        };

        let mut fns = vec![validate];
        fns.extend(helpers);
        fns
    }

    /// Field check statements pushing into `errors`.
    fn checks(&self, field: &FieldIr) -> Vec<String> {
        if field.checks.is_empty() {
            return Vec::new();
        }
        let binding = RUST_NAMING.binding_name(&field.name);
        let (value, open) = if field.ty.nullable {
            let source = if field.ty.is_copy() {
                format!("self.{binding}")
            } else {
                format!("&self.{binding}")
            };
            ("value".to_string(), Some(format!("if let Some(value) = {source} {{")))
        } else {
            (format!("self.{binding}"), None)
        };

        let mut lines = Vec::new();
        for check in &field.checks {
            let (condition, message) = match check {
                FieldCheck::Min(bound) => (
                    bound_violation(field, &value, "<", *bound),
                    bound_message(field, "least", *bound),
                ),
                FieldCheck::Max(bound) => (
                    bound_violation(field, &value, ">", *bound),
                    bound_message(field, "most", *bound),
                ),
                FieldCheck::Pattern(pattern) => {
                    let arg = if field.ty.nullable {
                        value.clone()
                    } else {
                        format!("&{value}")
                    };
                    (
                        format!("!{}::stdlib::string::matches({arg}, {pattern:?})", self.runtime),
                        format!("must match pattern {pattern}"),
                    )
                }
            };
            lines.push(format!("if {condition} {{"));
            lines.push(format!(
                "    errors.push(ValidationError::new({:?}, {message:?}));",
                field.name
            ));
            lines.push("}".to_string());
        }
        match open {
            Some(open) => {
                let mut wrapped = vec![open];
                wrapped.extend(lines.iter().map(|line| format!("    {line}")));
                wrapped.push("}".to_string());
                wrapped
            }
            None => lines,
        }
    }

    fn constraint_fn(&mut self, method: &str, constraint: &ConstraintIr) -> Fn {
        let mut transpiler = Transpiler::new(self.runtime, Mode::Async, &mut self.imports);
        let mut body = String::new();
        if let Some(when) = &constraint.when {
            body.push_str(&format!(
                "if {} {{\n    return Ok(true);\n}}\n",
                transpiler.negated(when)
            ));
        }
        body.push_str(&transpiler.condition(&constraint.condition));
        let tx = if transpiler.uses_tx() { "tx" } else { "_tx" };
        Fn::new(method)
            .doc(constraint.doc.as_deref())
            .private()
            .async_()
            .param(Param::receiver("&self"))
            .param(Param::new(tx, "&mut Tx"))
            .returns("Result<bool>")
            .body(&body)
    }

    fn validation_fn(&mut self, method: &str, validation: &ValidationIr) -> Fn {
        let mut transpiler = Transpiler::new(self.runtime, Mode::Async, &mut self.imports);
        let body = transpiler.procedure(&validation.body);
        let tx = if transpiler.uses_tx() { "tx" } else { "_tx" };
        Fn::new(method)
            .private()
            .async_()
            .param(Param::receiver("&self"))
            .param(Param::new(tx, "&mut Tx"))
            .returns("Result<()>")
            .body(&body)
    }

    fn hook_fn(&mut self, hook: &HookIr) -> Fn {
        let mut transpiler = Transpiler::new(self.runtime, Mode::Async, &mut self.imports);
        let body = transpiler.procedure(&hook.body);
        let tx = if transpiler.uses_tx() { "tx" } else { "_tx" };
        let receiver = if transpiler.mutates_self() {
            self.mutating_hooks.insert(hook.method.clone());
            "&mut self"
        } else {
            "&self"
        };
        Fn::new(RUST_NAMING.binding_name(&hook.method))
            .doc(hook.doc.as_deref())
            .async_()
            .param(Param::receiver(receiver))
            .param(Param::new(tx, "&mut Tx"))
            .returns("Result<()>")
            .body(&body)
    }

    fn crud_fns(&mut self) -> Vec<Fn> {
        self.imports.runtime("Db");
        let resource = self.resource;
        let mut fns = vec![self.save_fn(Operation::Create)];
        let key = resource
            .primary_field()
            .map(|pk| RustTypeMapper.map_type(&pk.ty.as_required()));
        if let Some(key) = &key {
            fns.push(
                Fn::new("find")
                    .doc(Some("Loads one record by primary key."))
                    .async_()
                    .param(Param::new("db", "&Db"))
                    .param(Param::new("id", format!("&{key}")))
                    .returns("Result<Option<Self>>")
                    .body("db.find::<Self>(id).await"),
            );
        }
        fns.push(
            Fn::new("list")
                .async_()
                .param(Param::new("db", "&Db"))
                .returns("Result<Vec<Self>>")
                .body("db.list::<Self>().await"),
        );
        if let Some(key) = &key {
            fns.push(self.save_fn(Operation::Update));
            fns.push(self.delete_fn(key));
        }
        fns
    }

    fn save_fn(&self, operation: Operation) -> Fn {
        let resource = self.resource;
        let (name, persist, doc) = match operation {
            Operation::Update => ("update", "update", "Validates and stores changes to a record."),
            _ => ("create", "insert", "Validates and inserts a new record."),
        };
        let before: Vec<&HookIr> = resource.hooks_for(HookTiming::Before, operation).collect();
        let param = if self.any_mutating(&before) {
            "mut record"
        } else {
            "record"
        };

        let mut lines = vec!["let mut tx = db.begin().await?;".to_string()];
        lines.extend(hook_calls(&before));
        lines.push(format!(
            "record.validate(&mut tx, Operation::{}).await?;",
            variant(operation)
        ));
        let binding = if self.mutating_after(operation) {
            "mut record"
        } else {
            "record"
        };
        lines.push(format!("let {binding} = tx.{persist}(&record).await?;"));
        lines.extend(self.after_persist(operation));
        lines.push("Ok(record)".to_string());

        Fn::new(name)
            .doc(Some(doc))
            .async_()
            .param(Param::new("db", "&Db"))
            .param(Param::new(param, "Self"))
            .returns("Result<Self>")
            .body(&lines.join("\n"))
    }

    fn delete_fn(&mut self, key: &str) -> Fn {
        self.imports.runtime("Error");
        let resource = self.resource;
        let before: Vec<&HookIr> = resource.hooks_for(HookTiming::Before, Operation::Delete).collect();
        let binding = if self.any_mutating(&before) || self.mutating_after(Operation::Delete) {
            "mut record"
        } else {
            "record"
        };

        let mut lines = vec![
            "let mut tx = db.begin().await?;".to_string(),
            format!("let Some({binding}) = tx.find::<Self>(id).await? else {{"),
            "    return Err(Error::not_found(Self::RESOURCE));".to_string(),
            "};".to_string(),
        ];
        lines.extend(hook_calls(&before));
        lines.push("record.validate(&mut tx, Operation::Delete).await?;".to_string());
        lines.push("tx.delete::<Self>(id).await?;".to_string());
        lines.extend(self.after_persist(Operation::Delete));
        lines.push("Ok(())".to_string());

        Fn::new("delete")
            .doc(Some("Deletes a record by primary key."))
            .async_()
            .param(Param::new("db", "&Db"))
            .param(Param::new("id", format!("&{key}")))
            .returns("Result<()>")
            .body(&lines.join("\n"))
    }

    /// Hook calls after persistence: `@transaction` hooks before commit,
    /// plain hooks in a fresh transaction, `@async` hooks in spawned tasks.
    fn after_persist(&self, operation: Operation) -> Vec<String> {
        let after: Vec<&HookIr> = self
            .resource
            .hooks_for(HookTiming::After, operation)
            .collect();
        let in_tx: Vec<&HookIr> = after
            .iter()
            .copied()
            .filter(|h| h.transactional && !h.is_async)
            .collect();
        let plain: Vec<&HookIr> = after
            .iter()
            .copied()
            .filter(|h| !h.transactional && !h.is_async)
            .collect();

        let mut lines = hook_calls(&in_tx);
        lines.push("tx.commit().await?;".to_string());
        if !plain.is_empty() {
            lines.push("let mut tx = db.begin().await?;".to_string());
            lines.extend(hook_calls(&plain));
            lines.push("tx.commit().await?;".to_string());
        }
        for hook in after.iter().filter(|h| h.is_async) {
            lines.extend(self.spawn(hook));
        }
        lines
    }

    fn spawn(&self, hook: &HookIr) -> Vec<String> {
        let method = RUST_NAMING.binding_name(&hook.method);
        [
            "{".to_string(),
            "    let db = db.clone();".to_string(),
            "    let record = record.clone();".to_string(),
            "    tokio::spawn(async move {".to_string(),
            "        let result: Result<()> = async {".to_string(),
            "            let mut tx = db.begin().await?;".to_string(),
            format!("            record.{method}(&mut tx).await?;"),
            "            tx.commit().await".to_string(),
            "        }".to_string(),
            "        .await;".to_string(),
            "        if let Err(error) = result {".to_string(),
            format!(
                "            tracing::error!(resource = {:?}, hook = {:?}, %error, \"async hook failed\");",
                self.resource.name, hook.method
            ),
            "        }".to_string(),
            "    });".to_string(),
            "}".to_string(),
        ]
        .into()
    }

    fn any_mutating(&self, hooks: &[&HookIr]) -> bool {
        hooks.iter().any(|h| self.mutating_hooks.contains(&h.method))
    }

    fn mutating_after(&self, operation: Operation) -> bool {
        let after: Vec<&HookIr> = self
            .resource
            .hooks_for(HookTiming::After, operation)
            .filter(|h| !h.is_async)
            .collect();
        self.any_mutating(&after)
    }
}

fn hook_calls(hooks: &[&HookIr]) -> Vec<String> {
    hooks
        .iter()
        .map(|h| format!("record.{}(&mut tx).await?;", RUST_NAMING.binding_name(&h.method)))
        .collect()
}

fn variant(operation: Operation) -> &'static str {
    match operation {
        Operation::Create => "Create",
        Operation::Update => "Update",
        Operation::Delete => "Delete",
    }
}

fn not_delete() -> String {
    "!matches!(operation, Operation::Delete)".to_string()
}

/// Condition selecting the operations a constraint runs on, or `None` when
/// it runs on all of them.
fn operation_guard(constraint: &ConstraintIr) -> Option<String> {
    let ops: Vec<String> = Operation::ALL
        .into_iter()
        .filter(|op| constraint.applies_to(*op))
        .map(|op| format!("Operation::{}", variant(op)))
        .collect();
    if ops.len() == Operation::ALL.len() {
        None
    } else {
        Some(format!("matches!(operation, {})", ops.join(" | ")))
    }
}

/// Append `body`, wrapped in `if guard { .. }` when there is a guard.
fn guarded(lines: &mut Vec<String>, guard: Option<String>, body: Vec<String>) {
    if body.is_empty() {
        return;
    }
    match guard {
        Some(guard) => {
            lines.push(format!("if {guard} {{"));
            lines.extend(body.into_iter().map(|line| format!("    {line}")));
            lines.push("}".to_string());
        }
        None => lines.extend(body),
    }
}

/// Condition that is true when `value` is out of bounds. Lengths count
/// characters for text and items for arrays.
fn bound_violation(field: &FieldIr, value: &str, op: &str, bound: f64) -> String {
    let integral = bound.fract() == 0.0;
    match &field.ty.kind {
        TyKind::Primitive(p) if p.is_numeric() => {
            if field.ty.is_primitive(strata_core::Primitive::Float) {
                format!("{value} {op} {bound:?}")
            } else if integral {
                format!("{value} {op} {}", bound as i64)
            } else {
                format!("({value} as f64) {op} {bound:?}")
            }
        }
        kind => {
            let length = match kind {
                TyKind::Array(_) => format!("{value}.len()"),
                _ => format!("{value}.chars().count()"),
            };
            if integral && bound >= 0.0 {
                format!("{length} {op} {}", bound as u64)
            } else {
                format!("({length} as f64) {op} {bound:?}")
            }
        }
    }
}

fn bound_message(field: &FieldIr, direction: &str, bound: f64) -> String {
    let bound = if bound.fract() == 0.0 {
        format!("{}", bound as i64)
    } else {
        bound.to_string()
    };
    match &field.ty.kind {
        TyKind::Array(_) => format!("must have at {direction} {bound} items"),
        _ if field.ty.is_string_like() => format!("must be at {direction} {bound} characters"),
        _ => format!("must be at {direction} {bound}"),
    }
}

fn enum_def(e: &EnumTy) -> Enum {
    e.values.iter().fold(
        Enum::new(&e.name).derives(ENUM_DERIVES),
        |rendered, value| {
            let mut variant = Variant::new(RUST_NAMING.variant_name(value));
            if variant.name != *value {
                variant = variant.attr(format!("serde(rename = {value:?})"));
            }
            rendered.variant(variant)
        },
    )
}

fn enum_impl(e: &EnumTy) -> Impl {
    let mut arms = vec!["match self {".to_string()];
    arms.extend(e.values.iter().map(|value| {
        format!(
            "    {}::{} => {value:?},",
            e.name,
            RUST_NAMING.variant_name(value)
        )
    }));
    arms.push("}".to_string());
    Impl::new(&e.name).method(
        Fn::new("as_str")
            .param(Param::receiver("&self"))
            .returns("&'static str")
            .body(&arms.join("\n")),
    )
}

fn display_impl(name: &str) -> Impl {
    Impl::new(name).for_trait("std::fmt::Display").method(
        Fn::new("fmt")
            .private()
            .param(Param::receiver("&self"))
            .param(Param::new("f", "&mut std::fmt::Formatter<'_>"))
            .returns("std::fmt::Result")
            .body("f.write_str(self.as_str())"),
    )
}

#[cfg(test)]
mod tests {
    use strata_compiler::pipeline::Pipeline;
    use strata_syntax::SourceFile;

    use super::*;

    fn render(src: &str, name: &str) -> String {
        let ctx = Pipeline::new()
            .run(vec![SourceFile::new("app.strata", src)])
            .expect("pipeline should succeed");
        assert!(!ctx.has_errors(), "{:?}", ctx.diagnostics);
        let resource = ctx.resources.iter().find(|r| r.name == name).unwrap();
        render_resource(resource, "strata_runtime")
    }

    const POST: &str = r#"resource Post {
  id: uuid! @primary
  title: string! @min(1) @max(200)
  subtitle: string? @max(80)
  views: int! @default(0) @min(0)
  status: enum["draft", "in_review"]! @default("draft")
  @before create { self.title = String.trim(self.title) }
  @after create @async { Logger.info("created #{self.title}") }
  @constraint unique_title {
    on: create
    condition: self.title != ""
    error: "title is taken"
  }
}"#;

    #[test]
    fn test_record_struct_and_record_impl() {
        let code = render(POST, "Post");
        assert!(code.contains("#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]\npub struct Post {"));
        assert!(code.contains("#[serde(default = \"Post::default_views\")]"));
        assert!(code.contains("impl Record for Post {"));
        assert!(code.contains("const TABLE: &'static str = \"posts\";"));
        assert!(code.contains("const PRIMARY_KEY: Option<&'static str> = Some(\"id\");"));
        assert!(code.contains("use serde::{Deserialize, Serialize};"));
    }

    #[test]
    fn test_enum_renames_variants_and_displays() {
        let code = render(POST, "Post");
        assert!(code.contains("pub enum PostStatus {"));
        assert!(code.contains("#[serde(rename = \"in_review\")]"));
        assert!(code.contains("PostStatus::InReview => \"in_review\","));
        assert!(code.contains("impl std::fmt::Display for PostStatus {"));
        assert!(code.contains("f.write_str(self.as_str())"));
    }

    #[test]
    fn test_field_checks_skip_delete() {
        let code = render(POST, "Post");
        assert!(code.contains("if !matches!(operation, Operation::Delete) {"));
        assert!(code.contains("if self.title.chars().count() < 1 {"));
        assert!(code.contains("errors.push(ValidationError::new(\"title\", \"must be at most 200 characters\"));"));
        assert!(code.contains("if let Some(value) = &self.subtitle {"));
        assert!(code.contains("if self.views < 0 {"));
    }

    #[test]
    fn test_constraint_runs_only_on_its_operations() {
        let code = render(POST, "Post");
        assert!(code.contains("if matches!(operation, Operation::Create) {"));
        assert!(code.contains("match self.constraint_unique_title(tx).await {"));
        assert!(code.contains("Ok(false) => errors.push(ValidationError::new(\"unique_title\", \"title is taken\")),"));
        assert!(code.contains("async fn constraint_unique_title(&self, _tx: &mut Tx) -> Result<bool> {"));
    }

    #[test]
    fn test_mutating_hook_takes_record_by_mut() {
        let code = render(POST, "Post");
        assert!(code.contains("pub async fn before_create(&mut self, _tx: &mut Tx) -> Result<()> {"));
        assert!(code.contains("pub async fn create(db: &Db, mut record: Self) -> Result<Self> {"));
        assert!(code.contains("record.before_create(&mut tx).await?;"));
        assert!(code.contains("let record = tx.insert(&record).await?;"));
    }

    #[test]
    fn test_async_hook_is_spawned_after_commit() {
        let code = render(POST, "Post");
        let commit = code.find("tx.commit().await?;").unwrap();
        let spawn = code.find("tokio::spawn(async move {").unwrap();
        assert!(commit < spawn);
        assert!(code.contains("record.after_create(&mut tx).await?;"));
        assert!(code.contains("tracing::error!(resource = \"Post\", hook = \"after_create\", %error, \"async hook failed\");"));
    }

    #[test]
    fn test_crud_by_primary_key() {
        let code = render(POST, "Post");
        assert!(code.contains("pub async fn find(db: &Db, id: &uuid::Uuid) -> Result<Option<Self>> {"));
        assert!(code.contains("pub async fn update(db: &Db, record: Self) -> Result<Self> {"));
        assert!(code.contains("pub async fn delete(db: &Db, id: &uuid::Uuid) -> Result<()> {"));
        assert!(code.contains("return Err(Error::not_found(Self::RESOURCE));"));
    }

    #[test]
    fn test_without_primary_key_only_create_and_list() {
        let code = render("resource Event {\n  name: string!\n}", "Event");
        assert!(code.contains("const PRIMARY_KEY: Option<&'static str> = None;"));
        assert!(code.contains("pub async fn create("));
        assert!(code.contains("pub async fn list(db: &Db) -> Result<Vec<Self>> {"));
        assert!(!code.contains("fn find("));
        assert!(!code.contains("fn delete("));
        assert!(code.contains("pub async fn validate(&self, _tx: &mut Tx, _operation: Operation) -> Result<()> {"));
    }

    #[test]
    fn test_rendering_is_deterministic() {
        assert_eq!(render(POST, "Post"), render(POST, "Post"));
    }

    #[test]
    fn test_method_names_follow_declaration_order() {
        let ctx = Pipeline::new()
            .run(vec![SourceFile::new("app.strata", POST)])
            .unwrap();
        let names = method_names(&ctx.resources[0]);
        assert_eq!(
            names,
            [
                "default_views",
                "default_status",
                "validate",
                "constraint_unique_title",
                "before_create",
                "after_create",
                "create",
                "list",
                "find",
                "update",
                "delete",
            ]
        );
    }
}
