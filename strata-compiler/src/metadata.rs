//! Metadata document assembly.
//!
//! The runtime reads `metadata.json` to learn the shape of every generated
//! resource and the routes it serves. This module derives that document from
//! checked resources.

use strata_core::{to_plural, to_snake_case};
use strata_ir::{
    ComputedMetadata, FieldMetadata, HookMetadata, MetadataDocument, RelationshipMetadata,
    ResourceIr, ResourceMetadata, RouteMetadata, Ty, TyKind,
};

/// Build the metadata document for `resources`.
pub fn build_metadata<'a>(resources: impl IntoIterator<Item = &'a ResourceIr>) -> MetadataDocument {
    let mut document = MetadataDocument::default();
    for resource in resources {
        document
            .resources
            .insert(resource.name.clone(), resource_metadata(resource));
    }
    document
}

fn resource_metadata(resource: &ResourceIr) -> ResourceMetadata {
    ResourceMetadata {
        name: resource.name.clone(),
        doc: resource.doc.clone(),
        table: resource.table.clone(),
        primary_key: resource.primary_key.clone(),
        fields: resource
            .fields
            .iter()
            .map(|field| {
                let mut constraints = Vec::new();
                if field.primary {
                    constraints.push("primary".to_string());
                }
                if field.auto {
                    constraints.push("auto".to_string());
                }
                if field.unique {
                    constraints.push("unique".to_string());
                }
                constraints.extend(field.checks.iter().map(|c| c.describe()));
                FieldMetadata {
                    name: field.name.clone(),
                    ty: type_name(&field.ty),
                    nullable: field.ty.nullable,
                    constraints,
                }
            })
            .collect(),
        relationships: resource
            .relationships
            .iter()
            .map(|r| RelationshipMetadata {
                field: r.field.clone(),
                kind: r.kind.as_str().to_string(),
                target: r.target.clone(),
                foreign_key: r.foreign_key.clone(),
                on_delete: r.on_delete.as_str().to_string(),
            })
            .collect(),
        hooks: resource
            .hooks
            .iter()
            .map(|h| HookMetadata {
                timing: h.timing.as_str().to_string(),
                event: h.event.as_str().to_string(),
                transactional: h.transactional,
                is_async: h.is_async,
                method: h.method.clone(),
            })
            .collect(),
        computed: resource
            .computed
            .iter()
            .map(|c| ComputedMetadata {
                name: c.name.clone(),
                ty: type_name(&c.ty),
                nullable: c.ty.nullable,
            })
            .collect(),
        routes: routes(resource),
    }
}

/// REST-style routes; item routes need a primary key.
fn routes(resource: &ResourceIr) -> Vec<RouteMetadata> {
    let singular = to_snake_case(&resource.name);
    let plural = to_plural(&singular);
    let route = |method: &str, path: String, handler: String| RouteMetadata {
        method: method.to_string(),
        path,
        handler,
        middleware: resource.middleware.clone(),
    };

    let mut routes = vec![
        route("GET", format!("/{plural}"), format!("list_{plural}")),
        route("POST", format!("/{plural}"), format!("create_{singular}")),
    ];
    if let Some(pk) = &resource.primary_key {
        let item = format!("/{plural}/{{{pk}}}");
        routes.push(route("GET", item.clone(), format!("get_{singular}")));
        routes.push(route("PUT", item.clone(), format!("update_{singular}")));
        routes.push(route("DELETE", item, format!("delete_{singular}")));
    }
    routes
}

/// Type name without the nullability marker; enums and records use their
/// generated names.
fn type_name(ty: &Ty) -> String {
    match &ty.kind {
        TyKind::Primitive(p) => p.as_str().to_string(),
        TyKind::Enum(e) => e.name.clone(),
        TyKind::Struct(s) => s.name.clone(),
        TyKind::Resource(name) => name.clone(),
        TyKind::Array(elem) => format!("array<{}>", inner_name(elem)),
        TyKind::Hash(key, value) => format!("hash<{}, {}>", inner_name(key), inner_name(value)),
        _ => ty.to_string(),
    }
}

fn inner_name(ty: &Ty) -> String {
    let name = type_name(ty);
    if ty.nullable { format!("{name}?") } else { name }
}

#[cfg(test)]
mod tests {
    use strata_ir::{
        EnumTy, FieldCheck, FieldIr, FieldOrigin, HookEvent, HookIr, HookTiming, Block,
    };

    use super::*;

    fn resource(name: &str, primary_key: Option<&str>) -> ResourceIr {
        ResourceIr {
            name: name.into(),
            doc: None,
            table: to_plural(&to_snake_case(name)),
            primary_key: primary_key.map(Into::into),
            fields: Vec::new(),
            relationships: Vec::new(),
            hooks: Vec::new(),
            computed: Vec::new(),
            functions: Vec::new(),
            constraints: Vec::new(),
            validations: Vec::new(),
            middleware: Vec::new(),
            enums: Vec::new(),
            structs: Vec::new(),
        }
    }

    fn field(name: &str, ty: Ty) -> FieldIr {
        FieldIr {
            name: name.into(),
            ty,
            doc: None,
            origin: FieldOrigin::Declared,
            primary: false,
            auto: false,
            unique: false,
            default: None,
            checks: Vec::new(),
        }
    }

    #[test]
    fn test_routes_with_primary_key() {
        let mut post = resource("BlogPost", Some("id"));
        post.middleware = vec!["auth".into()];
        let routes = routes(&post);

        let lines: Vec<String> = routes
            .iter()
            .map(|r| format!("{} {} {}", r.method, r.path, r.handler))
            .collect();
        insta::assert_snapshot!(lines.join("\n"), @r"
        GET /blog_posts list_blog_posts
        POST /blog_posts create_blog_post
        GET /blog_posts/{id} get_blog_post
        PUT /blog_posts/{id} update_blog_post
        DELETE /blog_posts/{id} delete_blog_post
        ");
        assert!(routes.iter().all(|r| r.middleware == ["auth"]));
    }

    #[test]
    fn test_routes_without_primary_key() {
        let routes = routes(&resource("Event", None));
        assert_eq!(routes.len(), 2);
    }

    #[test]
    fn test_field_metadata() {
        let mut post = resource("Post", Some("id"));
        let mut id = field("id", Ty::primitive(strata_core::Primitive::Uuid));
        id.primary = true;
        id.auto = true;
        let mut title = field("title", Ty::string());
        title.checks = vec![FieldCheck::Min(1.0), FieldCheck::Max(200.0)];
        let status = field(
            "status",
            Ty::required(TyKind::Enum(EnumTy {
                name: "PostStatus".into(),
                values: vec!["draft".into()],
            })),
        );
        let tags = field("tags", Ty::array(Ty::string().as_nullable()).as_nullable());
        post.fields = vec![id, title, status, tags];
        post.hooks.push(HookIr {
            timing: HookTiming::After,
            event: HookEvent::Create,
            transactional: false,
            is_async: true,
            method: "after_create".into(),
            body: Block::new(Vec::new(), Ty::unit()),
            doc: None,
        });

        let document = build_metadata([&post]);
        let meta = &document.resources["Post"];
        assert_eq!(meta.fields[0].constraints, ["primary", "auto"]);
        assert_eq!(meta.fields[1].constraints, ["min(1)", "max(200)"]);
        assert_eq!(meta.fields[2].ty, "PostStatus");
        assert_eq!(meta.fields[3].ty, "array<string?>");
        assert!(meta.fields[3].nullable);
        assert_eq!(meta.hooks[0].method, "after_create");

        let json = serde_json::to_value(&document).unwrap();
        assert_eq!(json["version"], 1);
        assert_eq!(json["resources"]["Post"]["hooks"][0]["async"], true);
    }
}
