//! Shared utility functions for naming generated items.

/// Convert a string to PascalCase (e.g., "hello_world" -> "HelloWorld")
pub fn to_pascal_case(s: &str) -> String {
    s.split(['_', '-'])
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                None => String::new(),
                Some(c) => c.to_uppercase().chain(chars).collect(),
            }
        })
        .collect()
}

/// Convert a string to snake_case (e.g., "HelloWorld" -> "hello_world")
///
/// Runs of capitals are kept together, so "HTTPServer" becomes "http_server".
pub fn to_snake_case(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut result = String::with_capacity(s.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        if c == '-' {
            result.push('_');
            continue;
        }
        if c.is_uppercase() && i > 0 {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            if prev.is_lowercase() || prev.is_ascii_digit() || (prev.is_uppercase() && next_is_lower)
            {
                result.push('_');
            }
        }
        result.extend(c.to_lowercase());
    }
    result
}

/// Pluralize a name (e.g., "post" -> "posts", "category" -> "categories").
pub fn to_plural(s: &str) -> String {
    let plural = pluralizer::pluralize(s, 2, false);
    if plural == s {
        // Force pluralization if the pluralizer returns the same string
        format!("{s}s")
    } else {
        plural
    }
}

/// Returns true if the name is PascalCase (starts uppercase, no separators).
pub fn is_pascal_case(s: &str) -> bool {
    s.chars().next().is_some_and(|c| c.is_ascii_uppercase())
        && s.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Returns true if the name is snake_case (lowercase, digits and underscores).
pub fn is_snake_case(s: &str) -> bool {
    s.chars().next().is_some_and(|c| c.is_ascii_lowercase() || c == '_')
        && s
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}
