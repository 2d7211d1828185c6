//! Rust function builder.

use strata_compiler::builder::{CodeFragment, Renderable};

use super::{item_header, visibility};

/// A parameter in a Rust function. An empty type renders the name alone,
/// which is how receivers like `&self` are written.
#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub ty: String,
}

impl Param {
    pub fn new(name: impl Into<String>, ty: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: ty.into(),
        }
    }

    pub fn receiver(receiver: impl Into<String>) -> Self {
        Self::new(receiver, "")
    }

    fn format(&self) -> String {
        if self.ty.is_empty() {
            self.name.clone()
        } else {
            format!("{}: {}", self.name, self.ty)
        }
    }
}

/// Builder for Rust functions.
#[derive(Debug, Clone)]
pub struct Fn {
    name: String,
    doc: Option<String>,
    attrs: Vec<String>,
    is_public: bool,
    is_async: bool,
    params: Vec<Param>,
    return_type: Option<String>,
    body: Vec<CodeFragment>,
}

impl Fn {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            doc: None,
            attrs: Vec::new(),
            is_public: true,
            is_async: false,
            params: Vec::new(),
            return_type: None,
            body: Vec::new(),
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

    pub fn private(mut self) -> Self {
        self.is_public = false;
        self
    }

    pub fn async_(mut self) -> Self {
        self.is_async = true;
        self
    }

    pub fn param(mut self, param: Param) -> Self {
        self.params.push(param);
        self
    }

    pub fn returns(mut self, ty: impl Into<String>) -> Self {
        self.return_type = Some(ty.into());
        self
    }

    /// Append body lines; each line of `code` keeps its own relative
    /// indentation.
    pub fn body(mut self, code: &str) -> Self {
        self.body
            .extend(code.lines().map(|line| CodeFragment::Line(line.to_string())));
        self
    }

    fn signature(&self) -> String {
        let params = self
            .params
            .iter()
            .map(Param::format)
            .collect::<Vec<_>>()
            .join(", ");
        let vis = visibility(self.is_public);
        let async_kw = if self.is_async { "async " } else { "" };
        match &self.return_type {
            Some(ret) => format!("{vis}{async_kw}fn {}({params}) -> {ret} {{", self.name),
            None => format!("{vis}{async_kw}fn {}({params}) {{", self.name),
        }
    }
}

impl Renderable for Fn {
    fn to_fragments(&self) -> Vec<CodeFragment> {
        let mut fragments = item_header(self.doc.as_deref(), &[], &self.attrs);
        fragments.push(CodeFragment::braced(self.signature(), self.body.clone()));
        fragments
    }
}
