//! Rust struct builder.

use strata_compiler::builder::{CodeFragment, Renderable};

use super::{item_header, visibility};

/// A field in a Rust struct.
#[derive(Debug, Clone)]
pub struct Field {
    pub name: String,
    pub ty: String,
    pub doc: Option<String>,
    pub attrs: Vec<String>,
}

impl Field {
    pub fn new(name: impl Into<String>, ty: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: ty.into(),
            doc: None,
            attrs: Vec::new(),
        }
    }

    pub fn doc(mut self, doc: Option<impl Into<String>>) -> Self {
        self.doc = doc.map(Into::into);
        self
    }

    pub fn attr(mut self, attr: impl Into<String>) -> Self {
        self.attrs.push(attr.into());
        self
    }
}

/// Builder for Rust structs. Fields are always public.
#[derive(Debug, Clone)]
pub struct Struct {
    name: String,
    doc: Option<String>,
    derives: Vec<String>,
    attrs: Vec<String>,
    fields: Vec<Field>,
}

impl Struct {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            doc: None,
            derives: Vec::new(),
            attrs: Vec::new(),
            fields: Vec::new(),
        }
    }

    pub fn doc(mut self, doc: Option<impl Into<String>>) -> Self {
        self.doc = doc.map(Into::into);
        self
    }

    pub fn derives(mut self, derives: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.derives.extend(derives.into_iter().map(Into::into));
        self
    }

    pub fn attr(mut self, attr: impl Into<String>) -> Self {
        self.attrs.push(attr.into());
        self
    }

    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    fn fields_to_fragments(&self) -> Vec<CodeFragment> {
        self.fields
            .iter()
            .flat_map(|field| {
                let mut fragments = item_header(field.doc.as_deref(), &[], &field.attrs);
                fragments.push(CodeFragment::Line(format!("pub {}: {},", field.name, field.ty)));
                fragments
            })
            .collect()
    }
}

impl Renderable for Struct {
    fn to_fragments(&self) -> Vec<CodeFragment> {
        let mut fragments = item_header(self.doc.as_deref(), &self.derives, &self.attrs);
        let vis = visibility(true);
        if self.fields.is_empty() {
            fragments.push(CodeFragment::Line(format!("{vis}struct {} {{}}", self.name)));
        } else {
            fragments.push(CodeFragment::braced(
                format!("{vis}struct {} {{", self.name),
                self.fields_to_fragments(),
            ));
        }
        fragments
    }
}
