//! Rust naming conventions.

use strata_compiler::language::NamingConvention;
use strata_core::{to_pascal_case, to_snake_case};

/// Keywords that cannot be raw identifiers get a trailing underscore.
fn escape_rust_reserved(name: &str) -> String {
    match name {
        "self" | "Self" | "super" | "crate" => format!("{name}_"),
        _ => format!("r#{name}"),
    }
}

/// Rust naming conventions.
pub const RUST_NAMING: NamingConvention = NamingConvention {
    to_type: to_pascal_case,
    to_file: to_snake_case,
    to_binding: to_snake_case,
    to_variant: to_pascal_case,
    reserved_words: &[
        "as", "async", "await", "break", "const", "continue", "crate", "dyn", "else", "enum",
        "extern", "false", "fn", "for", "gen", "if", "impl", "in", "let", "loop", "match", "mod",
        "move", "mut", "pub", "ref", "return", "self", "Self", "static", "struct", "super",
        "trait", "true", "type", "unsafe", "use", "where", "while", "abstract", "become", "box",
        "do", "final", "macro", "override", "priv", "try", "typeof", "unsized", "virtual",
        "yield",
    ],
    escape_reserved: escape_rust_reserved,
};
