//! Type checking.
//!
//! Runs per resource once the symbol table is complete. Produces the typed
//! [`ResourceIr`] together with every problem found; a resource with error
//! diagnostics is never generated.

mod expr;
mod types;

use std::collections::HashSet;

use strata_ir::{
    ComputedIr, ConstraintIr, FieldIr, FunctionIr, HookEvent, HookIr, HookTiming, Operation,
    ParamIr, ResourceIr, Ty, ValidationIr,
};
use strata_syntax::{
    ExprKind, SourceFile,
    ast::{self, Constraint, Literal},
};

pub use expr::{EvalContext, ExprChecker};
pub use types::{Compat, TypeResolver, compat, join, same_kind};

use crate::{
    pipeline::{Diagnostic, codes},
    symbols::{MemberKind, ResourceSymbol, SymbolTable},
};

const CONSTRAINT_KEYS: &[&str] = &["on", "when", "condition", "error"];

/// Check every body of `symbol` and assemble its IR.
pub fn check_resource(
    symbols: &SymbolTable,
    symbol: &ResourceSymbol,
    source: &SourceFile,
) -> (ResourceIr, Vec<Diagnostic>) {
    let mut checker = ResourceChecker {
        symbols,
        symbol,
        source,
        diagnostics: Vec::new(),
    };
    let ir = ResourceIr {
        name: symbol.name.clone(),
        doc: symbol.decl.doc.clone(),
        table: symbol.table(),
        primary_key: symbol.primary_key.clone(),
        fields: checker.fields(),
        relationships: symbol.relations.iter().map(|r| r.ir.clone()).collect(),
        hooks: checker.hooks(),
        computed: checker.computed(),
        functions: checker.functions(),
        constraints: checker.constraints(),
        validations: checker.validations(),
        middleware: symbol.middleware.clone(),
        enums: symbol.enums.clone(),
        structs: symbol.structs.clone(),
    };
    let diagnostics = checker
        .diagnostics
        .into_iter()
        .map(|d| d.for_resource(&symbol.name))
        .collect();
    (ir, diagnostics)
}

struct ResourceChecker<'a> {
    symbols: &'a SymbolTable,
    symbol: &'a ResourceSymbol,
    source: &'a SourceFile,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> ResourceChecker<'a> {
    fn checker(&self, context: EvalContext) -> ExprChecker<'a> {
        ExprChecker::new(self.symbols, self.symbol, self.source, context)
    }

    fn finish<T>(&mut self, checker: ExprChecker<'a>, value: T) -> T {
        self.diagnostics.extend(checker.diagnostics);
        value
    }

    fn fields(&mut self) -> Vec<FieldIr> {
        let symbol = self.symbol;
        symbol
            .columns
            .iter()
            .map(|column| {
                let default = column.default.as_ref().map(|expr| {
                    let mut checker = self.checker(EvalContext::Default);
                    let typed = checker.check(expr, Some(&column.ty));
                    self.finish(checker, typed)
                });
                FieldIr {
                    name: column.name.clone(),
                    ty: column.ty.clone(),
                    doc: column.doc.clone(),
                    origin: column.origin.clone(),
                    primary: column.primary,
                    auto: column.auto,
                    unique: column.unique,
                    default,
                    checks: column.checks.clone(),
                }
            })
            .collect()
    }

    fn hooks(&mut self) -> Vec<HookIr> {
        let symbol = self.symbol;
        let file = symbol.file;
        let mut methods: HashSet<String> = HashSet::new();
        let mut hooks = Vec::new();

        for hook in &symbol.decl.hooks {
            let Some(event) = HookEvent::from_name(&hook.event.name) else {
                self.diagnostics.push(
                    Diagnostic::new(
                        codes::UNKNOWN_HOOK_EVENT,
                        format!(
                            "unknown hook event `{}`; expected create, update, delete or save",
                            hook.event.name
                        ),
                    )
                    .at(file, hook.event.span),
                );
                continue;
            };
            let timing = match hook.timing {
                ast::HookTiming::Before => HookTiming::Before,
                ast::HookTiming::After => HookTiming::After,
            };

            let mut valid = true;
            for modifier in &hook.modifiers {
                let message = match modifier.name.as_str() {
                    "transaction" if hook.is_async => {
                        Some("`@async` hooks run after commit and cannot be `@transaction`".to_string())
                    }
                    "async" if timing == HookTiming::Before => {
                        Some("`@async` is only valid on `@after` hooks".to_string())
                    }
                    "transaction" | "async" => None,
                    other => Some(format!(
                        "unknown hook modifier `@{other}`; expected `@transaction` or `@async`"
                    )),
                };
                if let Some(message) = message {
                    valid = false;
                    self.diagnostics.push(
                        Diagnostic::new(codes::INVALID_MODIFIER, message).at(file, modifier.span),
                    );
                }
            }

            let is_async = hook.is_async && timing == HookTiming::After;
            let mut checker = self.checker(EvalContext::Hook { is_async });
            let body = checker.check_body(&hook.body, None);
            let body = self.finish(checker, body);
            if !valid {
                continue;
            }

            let base = format!("{}_{}", timing.as_str(), event.as_str());
            let mut method = base.clone();
            let mut n = 2;
            while !methods.insert(method.clone()) {
                method = format!("{base}_{n}");
                n += 1;
            }
            hooks.push(HookIr {
                timing,
                event,
                transactional: hook.transactional,
                is_async,
                method,
                body,
                doc: hook.doc.clone(),
            });
        }
        hooks
    }

    fn computed(&mut self) -> Vec<ComputedIr> {
        let symbol = self.symbol;
        let mut seen = HashSet::new();
        let mut computed = Vec::new();
        for decl in &symbol.decl.computed {
            let Some(member) = symbol.member(&decl.name.name) else {
                continue;
            };
            if !matches!(member.kind, MemberKind::Computed) || !seen.insert(decl.name.name.as_str()) {
                continue;
            }
            let mut checker = self.checker(EvalContext::Pure);
            let body = checker.check_body(&decl.body, Some(&member.ty));
            let body = self.finish(checker, body);
            computed.push(ComputedIr {
                name: decl.name.name.clone(),
                ty: member.ty.clone(),
                body,
                doc: decl.doc.clone(),
            });
        }
        computed
    }

    fn functions(&mut self) -> Vec<FunctionIr> {
        let symbol = self.symbol;
        let mut seen = HashSet::new();
        let mut functions = Vec::new();
        for decl in &symbol.decl.functions {
            let Some(sig) = symbol.functions.get(&decl.name.name) else {
                continue;
            };
            if !seen.insert(decl.name.name.as_str()) {
                continue;
            }
            let mut checker = self.checker(EvalContext::Pure).with_params(&sig.params);
            let body = checker.check_body(&decl.body, Some(&sig.ret));
            let body = self.finish(checker, body);
            functions.push(FunctionIr {
                name: sig.name.clone(),
                params: sig
                    .params
                    .iter()
                    .map(|(name, ty)| ParamIr {
                        name: name.clone(),
                        ty: ty.clone(),
                    })
                    .collect(),
                ret: sig.ret.clone(),
                body,
                doc: decl.doc.clone(),
            });
        }
        functions
    }

    fn constraints(&mut self) -> Vec<ConstraintIr> {
        let symbol = self.symbol;
        symbol
            .decl
            .constraints
            .iter()
            .filter_map(|constraint| self.constraint(constraint))
            .collect()
    }

    fn constraint(&mut self, constraint: &Constraint) -> Option<ConstraintIr> {
        let file = self.symbol.file;
        let name = &constraint.name.name;
        let mut valid = true;

        for entry in &constraint.entries {
            if !CONSTRAINT_KEYS.contains(&entry.key.name.as_str()) {
                valid = false;
                self.diagnostics.push(
                    Diagnostic::new(
                        codes::INVALID_ANNOTATION,
                        format!(
                            "unknown key `{}` in constraint `{name}`; expected on, when, condition or error",
                            entry.key.name
                        ),
                    )
                    .at(file, entry.key.span),
                );
            }
        }

        let on = match constraint.entry("on") {
            Some(entry) => match operations(&entry.value.kind) {
                Some(on) => on,
                None => {
                    valid = false;
                    self.diagnostics.push(
                        Diagnostic::new(
                            codes::INVALID_ANNOTATION,
                            "`on` takes an event or a list of events: create, update, delete or save",
                        )
                        .at(file, entry.value.span),
                    );
                    Vec::new()
                }
            },
            None => Vec::new(),
        };

        let message = match constraint.entry("error") {
            Some(entry) => match &entry.value.kind {
                ExprKind::Literal(Literal::String(message)) => message.clone(),
                _ => {
                    valid = false;
                    self.diagnostics.push(
                        Diagnostic::new(codes::INVALID_ANNOTATION, "`error` must be a string literal")
                            .at(file, entry.value.span),
                    );
                    String::new()
                }
            },
            None => format!("constraint `{name}` failed"),
        };

        let when = constraint.entry("when").map(|entry| {
            let mut checker = self.checker(EvalContext::Validation);
            let typed = checker.check(&entry.value, Some(&Ty::bool()));
            self.finish(checker, typed)
        });

        let Some(condition) = constraint.entry("condition") else {
            self.diagnostics.push(
                Diagnostic::new(
                    codes::INVALID_ANNOTATION,
                    format!("constraint `{name}` needs a `condition`"),
                )
                .at(file, constraint.name.span),
            );
            return None;
        };
        let mut checker = self.checker(EvalContext::Validation);
        let condition = checker.check(&condition.value, Some(&Ty::bool()));
        let condition = self.finish(checker, condition);

        valid.then(|| ConstraintIr {
            name: name.clone(),
            on,
            when,
            condition,
            message,
            doc: constraint.doc.clone(),
        })
    }

    fn validations(&mut self) -> Vec<ValidationIr> {
        let symbol = self.symbol;
        symbol
            .decl
            .validations
            .iter()
            .map(|validation| {
                let mut checker = self.checker(EvalContext::Validation);
                let body = checker.check_body(&validation.body, None);
                let body = self.finish(checker, body);
                ValidationIr {
                    name: validation.name.as_ref().map(|n| n.name.clone()),
                    body,
                }
            })
            .collect()
    }
}

/// Operations named by a constraint's `on` value; `save` means create and
/// update.
fn operations(value: &ExprKind) -> Option<Vec<Operation>> {
    let names: Vec<&str> = match value {
        ExprKind::Identifier(name) => vec![name.as_str()],
        ExprKind::Array(items) => items
            .iter()
            .map(|item| match &item.kind {
                ExprKind::Identifier(name) => Some(name.as_str()),
                _ => None,
            })
            .collect::<Option<_>>()?,
        _ => return None,
    };
    let mut on = Vec::new();
    for name in names {
        let event = HookEvent::from_name(name)?;
        for op in Operation::ALL {
            if event.applies_to(op) && !on.contains(&op) {
                on.push(op);
            }
        }
    }
    Some(on)
}

#[cfg(test)]
mod tests {
    use strata_ir::{FieldAccess, TExpr};
    use strata_syntax::parse_source;

    use super::*;
    use crate::pipeline::Severity;

    /// Check the last resource declared in `src`.
    fn check(src: &str) -> (ResourceIr, Vec<Diagnostic>) {
        let source = SourceFile::new("test.strata", src);
        let (program, errors) = parse_source(src);
        assert!(errors.is_empty(), "{errors:?}");
        let (symbols, diagnostics) = SymbolTable::build(&[program]);
        assert!(diagnostics.is_empty(), "{diagnostics:?}");
        let symbols = symbols.unwrap();
        let symbol = symbols.iter().last().unwrap();
        check_resource(&symbols, symbol, &source)
    }

    fn found(diagnostics: &[Diagnostic]) -> Vec<String> {
        diagnostics.iter().map(|d| d.code.to_string()).collect()
    }

    const USER: &str = "resource User {\n  id: uuid! @primary\n  name: string!\n}\n";

    #[test]
    fn test_well_typed_resource() {
        let (ir, diagnostics) = check(
            r#"resource Post {
  id: uuid! @primary
  title: string!
  slug: string?
  status: enum["draft", "published"]! @default("draft")
  views: int! @default(0)
  @before save { self.slug = self.slug ?? String.slugify(self.title) }
  @before save { Logger.info("saving #{self.title}") }
  @constraint title_length {
    on: save
    condition: String.length(self.title) <= 200
    error: "title is too long"
  }
  @computed is_draft: bool! { self.status == "draft" }
  @function excerpt(len: int!) -> string! { String.truncate(self.title, len) }
  @validate { if self.views < 0 { fail "views must be positive" } }
}"#,
        );
        assert!(diagnostics.is_empty(), "{diagnostics:?}");
        let methods: Vec<&str> = ir.hooks.iter().map(|h| h.method.as_str()).collect();
        assert_eq!(methods, ["before_save", "before_save_2"]);
        assert_eq!(ir.constraints[0].on, [Operation::Create, Operation::Update]);
        assert_eq!(ir.constraints[0].message, "title is too long");
        assert_eq!(ir.computed[0].ty, Ty::bool());
        assert_eq!(ir.functions[0].params[0].name, "len");
        assert!(matches!(
            ir.field("status").and_then(|f| f.default.as_ref()).map(|d| &d.kind),
            Some(TExpr::EnumValue { value, .. }) if value == "draft"
        ));
    }

    #[test]
    fn test_nullable_access_suggests_safe_navigation() {
        let src = format!(
            "{USER}resource Post {{\n  author: User?\n  @after create {{ Logger.info(self.author.name) }}\n}}"
        );
        let (_, diagnostics) = check(&src);
        assert_eq!(found(&diagnostics), ["type::nullable_access"]);
        let fix = diagnostics[0].fix.as_ref().unwrap();
        assert_eq!(fix.replacement, "self.author?.name");
        assert_eq!(diagnostics[0].resources, ["Post"]);
    }

    #[test]
    fn test_safe_navigation_binds_receiver() {
        let src = format!(
            "{USER}resource Post {{\n  author: User?\n  @after create {{ Logger.info(self.author?.name ?? \"anon\") }}\n}}"
        );
        let (ir, diagnostics) = check(&src);
        assert!(diagnostics.is_empty(), "{diagnostics:?}");
        let TExpr::Call { args, .. } = &ir.hooks[0].body.stmts[0].kind else {
            panic!("expected a call");
        };
        let TExpr::Coalesce { lhs, .. } = &args[0].kind else {
            panic!("expected ??");
        };
        let TExpr::SafeNav { binding, body, .. } = &lhs.kind else {
            panic!("expected ?.");
        };
        assert_eq!(binding, "__nav0");
        assert_eq!(lhs.ty, Ty::string().as_nullable());
        assert!(matches!(
            &body.kind,
            TExpr::Field { access: FieldAccess::Column, .. }
        ));
    }

    #[test]
    fn test_navigation_not_allowed_in_computed() {
        let src = format!(
            "{USER}resource Post {{\n  author: User!\n  @computed by: string! {{ self.author.name }}\n}}"
        );
        let (_, diagnostics) = check(&src);
        assert_eq!(found(&diagnostics), ["type::invalid_context"]);
    }

    #[test]
    fn test_nullable_argument() {
        let (_, diagnostics) = check(
            "resource Post {\n  subtitle: string?\n  @computed shout: string! { String.upcase(self.subtitle) }\n}",
        );
        assert_eq!(found(&diagnostics), ["type::nullability"]);
    }

    #[test]
    fn test_unqualified_call_fix() {
        let (_, diagnostics) = check(
            "resource Post {\n  title: string!\n  @computed shout: string! { upcase(self.title) }\n}",
        );
        assert_eq!(found(&diagnostics), ["type::unqualified_call"]);
        let fix = diagnostics[0].fix.as_ref().unwrap();
        assert_eq!(fix.replacement, "String.upcase(self.title)");
    }

    #[test]
    fn test_fallible_call_needs_rescue_outside_hooks() {
        let (_, diagnostics) = check(
            "resource Feed {\n  @computed body: string! { Http.get(\"https://example.com\") }\n}",
        );
        assert_eq!(found(&diagnostics), ["type::unhandled_failure"]);

        let (_, diagnostics) = check(
            "resource Feed {\n  @computed body: string! { Http.get(\"https://example.com\") rescue { \"\" } }\n}",
        );
        assert!(diagnostics.is_empty(), "{diagnostics:?}");
    }

    #[test]
    fn test_default_context() {
        let (_, diagnostics) = check(
            "resource Post {\n  title: string!\n  slug: string! @default(self.title)\n  status: enum[\"draft\"]! @default(\"archived\")\n}",
        );
        assert_eq!(
            found(&diagnostics),
            ["type::invalid_context", "type::unknown_enum_value"]
        );
    }

    #[test]
    fn test_non_exhaustive_match() {
        let (_, diagnostics) = check(
            r#"resource Post {
  status: enum["draft", "published"]!
  @computed label: string! { match self.status { "draft" => "Draft" } }
}"#,
        );
        assert_eq!(found(&diagnostics), ["type::non_exhaustive_match"]);
        assert!(diagnostics[0].message.contains("\"published\""));
    }

    #[test]
    fn test_assignment_contexts() {
        let (_, diagnostics) = check(
            r#"resource Post {
  title: string!
  @after create @async { self.title = "x" }
  @validate { self.title = "y" }
  @before create { self.missing = 1 }
}"#,
        );
        assert_eq!(
            found(&diagnostics),
            [
                "semantic::invalid_assignment",
                "semantic::invalid_assignment",
                "type::unknown_field"
            ]
        );
    }

    #[test]
    fn test_hook_modifiers_and_events() {
        let (ir, diagnostics) = check(
            "resource Post {\n  @before create @async { }\n  @before publish { }\n  @after create @async @transaction { }\n  @after create @async { }\n}",
        );
        assert_eq!(
            found(&diagnostics),
            [
                "validation::invalid_modifier",
                "validation::unknown_hook_event",
                "validation::invalid_modifier"
            ]
        );
        assert_eq!(ir.hooks.len(), 1);
        assert!(ir.hooks[0].is_async);
    }

    #[test]
    fn test_constraint_entries() {
        let (ir, diagnostics) = check(
            r#"resource Post {
  title: string!
  @constraint a { on: publish condition: true }
  @constraint b { error: "missing" }
  @constraint c { condition: true colour: "red" }
}"#,
        );
        assert_eq!(
            found(&diagnostics),
            [
                "validation::invalid_annotation",
                "validation::invalid_annotation",
                "validation::invalid_annotation"
            ]
        );
        assert!(ir.constraints.is_empty());
    }

    #[test]
    fn test_unnecessary_narrowing_is_a_warning() {
        let (_, diagnostics) = check(
            "resource Post {\n  title: string!\n  @computed t: string! { self.title ?? \"untitled\" }\n}",
        );
        assert_eq!(found(&diagnostics), ["pattern::unnecessary_narrowing"]);
        assert_eq!(diagnostics[0].severity(), Severity::Warning);
    }

    #[test]
    fn test_let_needs_annotation_for_empty_literals() {
        let (_, diagnostics) = check(
            "resource Post {\n  @before create {\n    let tags = []\n    let names: array<string>! = []\n  }\n}",
        );
        assert_eq!(found(&diagnostics), ["type::mismatch"]);
        assert!(diagnostics[0].message.contains("`tags`"));
    }

    #[test]
    fn test_empty_collection_argument_cannot_infer_result() {
        let (_, diagnostics) = check(
            "resource Post {\n  @computed label: string! { Array.first([]) ?? \"x\" }\n}",
        );
        assert_eq!(found(&diagnostics), ["type::mismatch"]);
        assert!(diagnostics[0].message.starts_with("cannot infer the element type"));
        assert!(diagnostics[0].message.contains("typed `let`"));

        let (_, diagnostics) = check(
            "resource Post {\n  @computed keys: array<string>! { Hash.keys({}) }\n}",
        );
        assert_eq!(found(&diagnostics), ["type::mismatch"]);
        assert!(diagnostics[0].message.starts_with("cannot infer the key type"));

        let (_, diagnostics) = check(
            "resource Post {\n  @computed label: string! {\n    let items: array<string>! = []\n    Array.first(items) ?? \"x\"\n  }\n}",
        );
        assert!(diagnostics.is_empty(), "{diagnostics:?}");
    }

    #[test]
    fn test_no_numeric_widening() {
        let (_, diagnostics) = check(
            "resource Item {\n  price: float!\n  @computed doubled: float! { self.price * 2 }\n}",
        );
        assert_eq!(found(&diagnostics), ["type::invalid_operand"]);
    }
}
