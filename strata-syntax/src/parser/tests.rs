use crate::{
    Span, SyntaxError,
    ast::{BinaryOp, ExprKind, HookTiming, InterpolationPart, Literal, Nullability, Pattern},
    parse_source,
};

fn parse_ok(src: &str) -> crate::Program {
    let (program, errors) = parse_source(src);
    assert!(errors.is_empty(), "unexpected errors: {errors:?}");
    program
}

/// Parse a single expression inside a hook body.
fn parse_expr(expr: &str) -> crate::Expr {
    let src = format!("resource A {{\n  @before create {{\n    {expr}\n  }}\n}}");
    let mut program = parse_ok(&src);
    let mut hook = program.resources.remove(0).hooks.remove(0);
    hook.body.exprs.remove(0)
}

#[test]
fn test_missing_nullability_reports_once_with_fix() {
    let (program, errors) = parse_source("resource Post { id: uuid! title: string }");
    assert_eq!(errors.len(), 1);
    let err = &errors[0];
    assert_eq!(err.code(), "missing_nullability");
    assert!(err.to_string().contains("title"));
    assert_eq!(err.suggestion(None).as_deref(), Some("title: string!"));
    assert_eq!(err.span(), Span::new(26, 39));

    let fields = &program.resources[0].fields;
    assert_eq!(fields.len(), 2);
    assert_eq!(fields[0].ty.nullability, Some(Nullability::Required));
    assert_eq!(fields[1].ty.nullability, None);
}

#[test]
fn test_independent_errors_are_all_reported() {
    let (program, errors) = parse_source(
        "resource A {\n  name: string\n  age: : int!\n  email: email?\n}\nresource B { id: uuid! }",
    );
    let codes: Vec<_> = errors.iter().map(SyntaxError::code).collect();
    assert_eq!(codes, ["missing_nullability", "unexpected_token"]);

    let a = &program.resources[0];
    let names: Vec<_> = a.fields.iter().map(|f| f.name.name.as_str()).collect();
    assert_eq!(names, ["name", "email"]);
    assert_eq!(program.resources[1].name.name, "B");
}

#[test]
fn test_recovery_inside_hook_body_keeps_later_statements() {
    let (program, errors) = parse_source(
        "resource A {\n  @before save {\n    self.a = )\n    self.b = 1\n  }\n  c: int!\n}",
    );
    assert_eq!(errors.len(), 1);
    let resource = &program.resources[0];
    let body = &resource.hooks[0].body.exprs;
    assert_eq!(body.len(), 2);
    assert_eq!(body[0].kind, ExprKind::Error);
    assert!(matches!(body[1].kind, ExprKind::Assign { .. }));
    assert_eq!(resource.fields.len(), 1);
}

#[test]
fn test_repeated_error_is_reported_each_time() {
    let (_, errors) = parse_source("resource A {\n  x: int! = )\n  y: int! = )\n}");
    assert_eq!(errors.len(), 2, "{errors:?}");
    assert!(errors[0].span().start < errors[1].span().start);

    let (_, errors) = parse_source(
        "resource A {\n  @before create { let = 1 }\n  @after create { let = 1 }\n}",
    );
    assert_eq!(errors.len(), 2, "{errors:?}");
    assert_ne!(errors[0].span(), errors[1].span());
}

#[test]
fn test_unclosed_resource_is_reported_and_next_resource_parsed() {
    let (program, errors) = parse_source("resource A {\n  id: uuid!\nresource B {\n  id: uuid!\n}");
    assert_eq!(errors.len(), 1);
    assert_eq!(program.resources.len(), 2);
}

#[test]
fn test_stray_top_level_tokens() {
    let (program, errors) = parse_source("field: int!\nresource A {}");
    assert_eq!(errors.len(), 1);
    assert_eq!(program.resources.len(), 1);
}

#[test]
fn test_field_annotations_and_default() {
    let program = parse_ok(
        "resource Post {\n  id: uuid! @primary @auto\n  views: int! @default(0) @min(0)\n  author: User! @on_delete(cascade)\n}",
    );
    let fields = &program.resources[0].fields;
    let names: Vec<_> = fields[0]
        .annotations
        .iter()
        .map(|a| a.name.name.as_str())
        .collect();
    assert_eq!(names, ["primary", "auto"]);
    assert_eq!(
        fields[1].default.as_ref().map(|e| &e.kind),
        Some(&ExprKind::Literal(Literal::Int(0)))
    );
    assert_eq!(fields[1].annotations.len(), 1);
    assert_eq!(
        fields[2].annotations[0].args[0].kind,
        ExprKind::Identifier("cascade".into())
    );
}

#[test]
fn test_doc_comments_are_kept() {
    let program = parse_ok(
        "/// A blog post.\nresource Post {\n  /// The headline.\n  title: string!\n  /// Slug it.\n  @before save { 1 }\n}",
    );
    let post = &program.resources[0];
    assert_eq!(post.doc.as_deref(), Some("A blog post."));
    assert_eq!(post.fields[0].doc.as_deref(), Some("The headline."));
    assert_eq!(post.hooks[0].doc.as_deref(), Some("Slug it."));
}

#[test]
fn test_members() {
    let program = parse_ok(
        r#"resource Post {
  title: string!
  @before create @transaction { self.title = String.trim(self.title) }
  @after update @async { Logger.info("updated") }
  @constraint title_length {
    on: [create, update]
    when: self.title != ""
    condition: String.length(self.title) <= 200
    error: "too long"
  }
  @computed shout: string! { String.upcase(self.title) }
  @function excerpt(len: int!) -> string! { String.truncate(self.title, len) }
  @validate { if self.title == "" { fail "empty" } }
  @validate named { true }
  @middleware(auth, rate_limit)
}"#,
    );
    let post = &program.resources[0];
    assert_eq!(post.hooks.len(), 2);
    assert_eq!(post.hooks[0].timing, HookTiming::Before);
    assert!(post.hooks[0].transactional);
    assert!(!post.hooks[0].is_async);
    assert_eq!(post.hooks[1].event.name, "update");
    assert!(post.hooks[1].is_async);

    let constraint = &post.constraints[0];
    assert_eq!(constraint.name.name, "title_length");
    assert_eq!(constraint.entries.len(), 4);
    assert!(matches!(
        constraint.entry("on").map(|e| &e.value.kind),
        Some(ExprKind::Array(items)) if items.len() == 2
    ));

    assert_eq!(post.computed[0].name.name, "shout");
    assert_eq!(post.functions[0].params[0].name.name, "len");
    assert_eq!(post.validations.len(), 2);
    assert_eq!(
        post.validations[1].name.as_ref().map(|n| n.name.as_str()),
        Some("named")
    );
    assert_eq!(post.annotations[0].name.name, "middleware");
    assert_eq!(post.annotations[0].args.len(), 2);
}

#[test]
fn test_precedence() {
    let expr = parse_expr("a || b && c == d + e * f");
    let ExprKind::Binary { op: BinaryOp::Or, rhs, .. } = expr.kind else {
        panic!("expected ||");
    };
    let ExprKind::Binary { op: BinaryOp::And, rhs, .. } = rhs.kind else {
        panic!("expected &&");
    };
    let ExprKind::Binary { op: BinaryOp::Eq, rhs, .. } = rhs.kind else {
        panic!("expected ==");
    };
    let ExprKind::Binary { op: BinaryOp::Add, rhs, .. } = rhs.kind else {
        panic!("expected +");
    };
    assert!(matches!(rhs.kind, ExprKind::Binary { op: BinaryOp::Mul, .. }));
}

#[test]
fn test_coalesce_is_right_associative_and_below_or() {
    let expr = parse_expr("a ?? b ?? c || d");
    let ExprKind::Binary {
        op: BinaryOp::Coalesce,
        lhs,
        rhs,
    } = expr.kind
    else {
        panic!("expected ??");
    };
    assert_eq!(lhs.kind, ExprKind::Identifier("a".into()));
    let ExprKind::Binary {
        op: BinaryOp::Coalesce,
        rhs,
        ..
    } = rhs.kind
    else {
        panic!("expected nested ??");
    };
    assert!(matches!(rhs.kind, ExprKind::Binary { op: BinaryOp::Or, .. }));
}

#[test]
fn test_assignment_is_lowest() {
    let expr = parse_expr("self.slug = self.slug ?? \"x\"");
    let ExprKind::Assign { target, value } = expr.kind else {
        panic!("expected assignment");
    };
    assert!(matches!(target.kind, ExprKind::FieldAccess { .. }));
    assert!(matches!(value.kind, ExprKind::Binary { op: BinaryOp::Coalesce, .. }));
}

#[test]
fn test_chained_comparison_is_rejected() {
    let (_, errors) = parse_source("resource A { @before save { a < b < c } }");
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].code(), "unexpected_token");
}

#[test]
fn test_safe_navigation_chain() {
    let expr = parse_expr("self.author?.profile.bio");
    let ExprKind::SafeNav { receiver, chain } = expr.kind else {
        panic!("expected safe navigation");
    };
    assert!(matches!(receiver.kind, ExprKind::FieldAccess { .. }));
    let names: Vec<_> = chain.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, ["profile", "bio"]);
}

#[test]
fn test_namespaced_and_bare_calls() {
    let expr = parse_expr("String.upcase(self.title)");
    let ExprKind::Call {
        namespace: Some(ns),
        name,
        args,
    } = expr.kind
    else {
        panic!("expected namespaced call");
    };
    assert_eq!((ns.name.as_str(), name.name.as_str()), ("String", "upcase"));
    assert_eq!(args.len(), 1);

    let expr = parse_expr("upcase(x)");
    assert!(matches!(expr.kind, ExprKind::Call { namespace: None, .. }));
}

#[test]
fn test_method_call_is_syntax_error_with_suggestion() {
    let (_, errors) =
        parse_source("resource A { @before save { self.title.truncate(10) } }");
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].code(), "method_call");
    assert_eq!(
        errors[0].suggestion(Some("String")).as_deref(),
        Some("String.truncate(self.title, 10)")
    );
}

#[test]
fn test_postfix_unwrap_index_and_rescue() {
    let expr = parse_expr("self.tags[0]!");
    let ExprKind::Unwrap(inner) = expr.kind else {
        panic!("expected unwrap");
    };
    assert!(matches!(inner.kind, ExprKind::Index { .. }));

    let expr = parse_expr("Json.parse(self.raw) rescue err { Logger.warn(err) }");
    let ExprKind::Rescue { binding, body, .. } = expr.kind else {
        panic!("expected rescue");
    };
    assert_eq!(binding.map(|b| b.name), Some("err".to_string()));
    assert_eq!(body.exprs.len(), 1);
}

#[test]
fn test_newline_ends_postfix_chain() {
    let src = "resource A {\n  @before create {\n    let x = a\n    !b\n  }\n}";
    let program = parse_ok(src);
    let body = &program.resources[0].hooks[0].body.exprs;
    assert_eq!(body.len(), 2);
    assert!(matches!(body[1].kind, ExprKind::Unary { .. }));
}

#[test]
fn test_interpolation_parses_embedded_expressions() {
    let src = "resource A {\n  @before create {\n    \"Hi #{self.name ?? \"anon\"}!\"\n  }\n}";
    let program = parse_ok(src);
    let expr = &program.resources[0].hooks[0].body.exprs[0];
    let ExprKind::Interpolated(parts) = &expr.kind else {
        panic!("expected interpolation");
    };
    assert_eq!(parts.len(), 3);
    let InterpolationPart::Expr(inner) = &parts[1] else {
        panic!("expected expression part");
    };
    assert!(matches!(inner.kind, ExprKind::Binary { op: BinaryOp::Coalesce, .. }));
    let start = src.find("self.name").unwrap();
    assert_eq!(inner.span.start, start);
}

#[test]
fn test_error_inside_interpolation_points_into_string() {
    let src = "resource A { @before create { \"x #{1 +}\" } }";
    let (_, errors) = parse_source(src);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].span().start > src.find('#').unwrap());
}

#[test]
fn test_match_with_blocks_and_wildcard() {
    let expr = parse_expr(
        "match self.status {\n      \"draft\" => { 1 }\n      \"published\" => 2,\n      -1 => 3\n      _ => 0\n    }",
    );
    let ExprKind::Match { arms, .. } = expr.kind else {
        panic!("expected match");
    };
    assert_eq!(arms.len(), 4);
    assert!(matches!(arms[0].body.kind, ExprKind::Block(_)));
    assert!(matches!(arms[2].pattern, Pattern::Literal(Literal::Int(-1), _)));
    assert!(matches!(arms[3].pattern, Pattern::Wildcard(_)));
}

#[test]
fn test_if_else_if_chain_and_let() {
    let expr = parse_expr("if a { 1 } else if b { 2 } else { 3 }");
    let ExprKind::If {
        else_block: Some(else_block),
        ..
    } = expr.kind
    else {
        panic!("expected if/else");
    };
    assert!(matches!(else_block.exprs[0].kind, ExprKind::If { .. }));

    let expr = parse_expr("let total: int = 1 + 2");
    let ExprKind::Let { name, ty, .. } = expr.kind else {
        panic!("expected let");
    };
    assert_eq!(name.name, "total");
    assert_eq!(ty.map(|t| t.nullability), Some(Some(Nullability::Required)));
}

#[test]
fn test_literals_and_collections() {
    let expr = parse_expr(r#"{ "a": [1, 2.5, true, nil], "b": {} }"#);
    let ExprKind::Hash(entries) = expr.kind else {
        panic!("expected hash");
    };
    assert_eq!(entries.len(), 2);
    let ExprKind::Array(items) = &entries[0].1.kind else {
        panic!("expected array");
    };
    assert_eq!(items[1].kind, ExprKind::Literal(Literal::Float(2.5)));
    assert_eq!(items[3].kind, ExprKind::Literal(Literal::Nil));
}

#[test]
fn test_type_display_round_trips() {
    let program = parse_ok(
        r#"resource A { meta: hash<string, int?>? status: enum["a", "b"]! seo: { t: string! }! }"#,
    );
    let fields = &program.resources[0].fields;
    insta::assert_snapshot!(fields[0].ty.to_string(), @"hash<string, int?>?");
    insta::assert_snapshot!(fields[1].ty.to_string(), @r#"enum["a", "b"]!"#);
    insta::assert_snapshot!(fields[2].ty.to_string(), @"{ t: string! }!");
}
