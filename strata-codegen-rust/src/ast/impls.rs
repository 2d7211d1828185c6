//! Rust impl block builder.

use strata_compiler::builder::{CodeFragment, Renderable};

use super::Fn;

/// Builder for Rust impl blocks.
#[derive(Debug, Clone)]
pub struct Impl {
    type_name: String,
    trait_name: Option<String>,
    consts: Vec<String>,
    methods: Vec<Fn>,
}

impl Impl {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            trait_name: None,
            consts: Vec::new(),
            methods: Vec::new(),
        }
    }

    /// Create an impl block for a trait.
    pub fn for_trait(mut self, trait_name: impl Into<String>) -> Self {
        self.trait_name = Some(trait_name.into());
        self
    }

    /// Add an associated constant, e.g. `const TABLE: &'static str = "posts";`.
    pub fn constant(mut self, line: impl Into<String>) -> Self {
        self.consts.push(line.into());
        self
    }

    pub fn method(mut self, method: Fn) -> Self {
        self.methods.push(method);
        self
    }

    pub fn methods(mut self, methods: impl IntoIterator<Item = Fn>) -> Self {
        self.methods.extend(methods);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.consts.is_empty() && self.methods.is_empty()
    }

    fn format_header(&self) -> String {
        match &self.trait_name {
            Some(trait_name) => format!("impl {} for {} {{", trait_name, self.type_name),
            None => format!("impl {} {{", self.type_name),
        }
    }
}

impl Renderable for Impl {
    fn to_fragments(&self) -> Vec<CodeFragment> {
        let mut body: Vec<CodeFragment> = self.consts.iter().map(CodeFragment::line).collect();
        for method in &self.methods {
            if !body.is_empty() {
                body.push(CodeFragment::Blank);
            }
            body.extend(method.to_fragments());
        }
        vec![CodeFragment::braced(self.format_header(), body)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Param;

    #[test]
    fn test_trait_impl_with_consts_and_methods() {
        let block = Impl::new("Post")
            .for_trait("Record")
            .constant("const TABLE: &'static str = \"posts\";")
            .method(
                Fn::new("table")
                    .private()
                    .param(Param::receiver("&self"))
                    .returns("&'static str")
                    .body("Self::TABLE"),
            );
        insta::assert_snapshot!(block.render(), @r#"
        impl Record for Post {
            const TABLE: &'static str = "posts";

            fn table(&self) -> &'static str {
                Self::TABLE
            }
        }
        "#);
    }
}
