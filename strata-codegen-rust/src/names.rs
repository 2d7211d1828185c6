//! Collision checks for generated Rust names.
//!
//! Distinct source names can map to the same Rust identifier once case
//! conversion is applied (`viewCount` and `view_count`, or `HTTPLog` and
//! `HttpLog`). Such resources are reported before generation so the
//! generator never writes code that fails to compile.

use std::collections::{HashMap, HashSet};

use eyre::Result;
use strata_compiler::pipeline::{CompilationContext, Diagnostic, Phase, codes};
use strata_ir::ResourceIr;

use crate::{RUST_NAMING, resource::method_names};

/// Phase that reports `generation::name_collision` errors.
///
/// Runs after type checking, on the typed resources.
pub struct NameCheckPhase;

impl Phase for NameCheckPhase {
    fn name(&self) -> &'static str {
        "names"
    }

    fn description(&self) -> &'static str {
        "Check generated Rust names for collisions"
    }

    fn run(&self, ctx: &mut CompilationContext) -> Result<()> {
        for (resources, message) in collisions(&ctx.resources) {
            let mut diagnostic = Diagnostic::new(codes::NAME_COLLISION, message);
            let symbol = ctx
                .symbols
                .as_ref()
                .and_then(|symbols| symbols.get(&resources[0]));
            if let Some(symbol) = symbol {
                diagnostic = diagnostic.at(symbol.file, symbol.decl.name.span);
            }
            for resource in resources {
                diagnostic = diagnostic.for_resource(resource);
            }
            ctx.report(diagnostic);
        }
        Ok(())
    }
}

/// Every collision with the resources it affects.
fn collisions(resources: &[ResourceIr]) -> Vec<(Vec<String>, String)> {
    let mut found = Vec::new();
    let mut files: HashMap<String, &str> = HashMap::new();
    let mut types: HashMap<&str, &str> = resources
        .iter()
        .map(|r| (r.name.as_str(), r.name.as_str()))
        .collect();

    for resource in resources {
        let name = resource.name.as_str();
        let single = |message: String| (vec![name.to_string()], message);

        let mut methods = HashSet::new();
        for method in method_names(resource) {
            if !methods.insert(method.clone()) {
                found.push(single(format!(
                    "`{name}` would define the method `{method}` more than once"
                )));
            }
        }

        let mut fields: HashMap<String, &str> = HashMap::new();
        for field in &resource.fields {
            let binding = RUST_NAMING.binding_name(&field.name);
            if let Some(previous) = fields.insert(binding.clone(), &field.name) {
                found.push(single(format!(
                    "fields `{previous}` and `{}` of `{name}` both become `{binding}`",
                    field.name
                )));
            }
        }

        for e in &resource.enums {
            let mut variants: HashMap<String, &str> = HashMap::new();
            for value in &e.values {
                let variant = RUST_NAMING.variant_name(value);
                if let Some(previous) = variants.insert(variant.clone(), value) {
                    found.push(single(format!(
                        "values {previous:?} and {value:?} of `{}` both become `{variant}`",
                        e.name
                    )));
                }
            }
        }

        let file = RUST_NAMING.file_name(name);
        if file == "mod" {
            found.push(single(format!(
                "`{name}` would be generated as `mod.rs`, which declares the generated modules"
            )));
        } else if let Some(previous) = files.insert(file.clone(), name) {
            found.push((
                vec![previous.to_string(), name.to_string()],
                format!("`{previous}` and `{name}` would both be generated as `{file}.rs`"),
            ));
        }

        let owned = resource
            .enums
            .iter()
            .map(|e| e.name.as_str())
            .chain(resource.structs.iter().map(|s| s.name.as_str()));
        for type_name in owned {
            if let Some(owner) = types.insert(type_name, name) {
                let mut affected = vec![name.to_string()];
                if owner != name {
                    affected.insert(0, owner.to_string());
                }
                found.push((
                    affected,
                    format!("type `{type_name}` generated for `{name}` is already defined by `{owner}`"),
                ));
            }
        }
    }
    found
}
