//! Rust AST builders for generating structs, enums, impls, and functions.
//!
//! Each builder implements [`Renderable`](strata_compiler::builder::Renderable)
//! and is turned into text by a `CodeBuilder`.

mod enums;
mod fns;
mod impls;
mod structs;

pub use enums::{Enum, Variant};
pub use fns::{Fn, Param};
pub use impls::Impl;
pub use structs::{Field, Struct};

use strata_compiler::builder::CodeFragment;

/// Doc, derive and attribute lines shared by items.
fn item_header(doc: Option<&str>, derives: &[String], attrs: &[String]) -> Vec<CodeFragment> {
    let mut fragments = Vec::new();
    if let Some(doc) = doc {
        fragments.push(CodeFragment::doc(doc));
    }
    if !derives.is_empty() {
        fragments.push(CodeFragment::Line(format!("#[derive({})]", derives.join(", "))));
    }
    fragments.extend(attrs.iter().map(|attr| CodeFragment::Line(format!("#[{attr}]"))));
    fragments
}

fn visibility(is_public: bool) -> &'static str {
    if is_public { "pub " } else { "" }
}
