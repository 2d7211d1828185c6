//! Naming conventions for generated code.

/// How a backend names the things a resource turns into.
#[derive(Debug, Clone, Copy)]
pub struct NamingConvention {
    /// Resource or nested type name to a type name (`blog_post` -> `BlogPost`).
    pub to_type: fn(&str) -> String,
    /// Resource name to a module/file stem (`BlogPost` -> `blog_post`).
    pub to_file: fn(&str) -> String,
    /// Field, function or local name to a binding name.
    pub to_binding: fn(&str) -> String,
    /// Enum value to a variant name (`in-review` -> `InReview`).
    pub to_variant: fn(&str) -> String,
    pub reserved_words: &'static [&'static str],
    /// Escape a reserved binding (`type` -> `r#type`).
    pub escape_reserved: fn(&str) -> String,
}

impl NamingConvention {
    pub fn is_reserved(&self, name: &str) -> bool {
        self.reserved_words.contains(&name)
    }

    fn safe(&self, name: String) -> String {
        if self.is_reserved(&name) {
            (self.escape_reserved)(&name)
        } else {
            name
        }
    }

    pub fn type_name(&self, name: &str) -> String {
        (self.to_type)(name)
    }

    pub fn file_name(&self, name: &str) -> String {
        (self.to_file)(name)
    }

    pub fn binding_name(&self, name: &str) -> String {
        self.safe((self.to_binding)(name))
    }

    /// Variant names can collide with keywords too (`Self`).
    pub fn variant_name(&self, value: &str) -> String {
        self.safe((self.to_variant)(value))
    }
}

#[cfg(test)]
mod tests {
    use strata_core::{to_pascal_case, to_snake_case};

    use super::*;

    const TEST: NamingConvention = NamingConvention {
        to_type: to_pascal_case,
        to_file: to_snake_case,
        to_binding: to_snake_case,
        to_variant: to_pascal_case,
        reserved_words: &["type", "match"],
        escape_reserved: |name| format!("r#{name}"),
    };

    #[test]
    fn test_reserved_bindings_are_escaped() {
        assert_eq!(TEST.binding_name("type"), "r#type");
        assert_eq!(TEST.binding_name("published_at"), "published_at");
        assert!(!TEST.is_reserved("title"));
    }

    #[test]
    fn test_type_and_file_names() {
        assert_eq!(TEST.type_name("blog_post"), "BlogPost");
        assert_eq!(TEST.file_name("BlogPost"), "blog_post");
        assert_eq!(TEST.variant_name("in_review"), "InReview");
    }
}
