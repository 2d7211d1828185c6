//! Rust enum builder.

use strata_compiler::builder::{CodeFragment, Renderable};

use super::{item_header, visibility};

/// A unit variant in a Rust enum.
#[derive(Debug, Clone)]
pub struct Variant {
    pub name: String,
    pub attrs: Vec<String>,
}

impl Variant {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attrs: Vec::new(),
        }
    }

    /// Add an attribute to the variant, e.g. `serde(rename = "draft")`.
    pub fn attr(mut self, attr: impl Into<String>) -> Self {
        self.attrs.push(attr.into());
        self
    }
}

/// Builder for public Rust enums.
#[derive(Debug, Clone)]
pub struct Enum {
    name: String,
    doc: Option<String>,
    derives: Vec<String>,
    variants: Vec<Variant>,
}

impl Enum {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            doc: None,
            derives: Vec::new(),
            variants: Vec::new(),
        }
    }

    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    pub fn derives(mut self, derives: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.derives.extend(derives.into_iter().map(Into::into));
        self
    }

    pub fn variant(mut self, variant: Variant) -> Self {
        self.variants.push(variant);
        self
    }
}

impl Renderable for Enum {
    fn to_fragments(&self) -> Vec<CodeFragment> {
        let mut fragments = item_header(self.doc.as_deref(), &self.derives, &[]);
        let body = self
            .variants
            .iter()
            .flat_map(|variant| {
                let mut lines = item_header(None, &[], &variant.attrs);
                lines.push(CodeFragment::Line(format!("{},", variant.name)));
                lines
            })
            .collect();
        fragments.push(CodeFragment::braced(
            format!("{}enum {} {{", visibility(true), self.name),
            body,
        ));
        fragments
    }
}
