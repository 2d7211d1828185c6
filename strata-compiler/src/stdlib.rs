//! Standard library signatures.
//!
//! Every `Namespace.name(...)` call resolves against [`SIGNATURES`]. A
//! signature states its argument patterns, its return type and whether the
//! call can fail. Arguments are never nullable.

use strata_core::Primitive;
use strata_ir::Ty;

/// Pattern an argument type must match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgPattern {
    /// Any string-like primitive.
    Text,
    /// `int` or `float`; every `Number` in one signature binds the same type.
    Number,
    /// Exactly this primitive. `string` also accepts other string-like values.
    Prim(Primitive),
    /// `array<T>`, binding `T`.
    Array,
    /// `array<p>`.
    ArrayOf(Primitive),
    /// `hash<K, V>`, binding `K` and `V`.
    Hash,
    /// The element type bound by an earlier `Array`.
    Elem,
    /// The key type bound by an earlier `Hash`.
    Key,
}

/// Return type of a signature, possibly in terms of bound variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Returns {
    Prim(Primitive),
    /// The bound number type.
    Number,
    /// The bound element type, nullable.
    OptionalElem,
    /// `array<p>`.
    ArrayOf(Primitive),
    KeyArray,
    ValueArray,
    /// The bound value type, nullable.
    OptionalValue,
    OptionalPrim(Primitive),
    Unit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    pub namespace: &'static str,
    pub name: &'static str,
    pub params: &'static [ArgPattern],
    pub returns: Returns,
    pub fallible: bool,
}

impl Signature {
    pub fn arity(&self) -> usize {
        self.params.len()
    }

    /// `String.truncate(s, int) -> string`
    pub fn describe(&self) -> String {
        let params: Vec<&str> = self.params.iter().map(ArgPattern::describe).collect();
        format!(
            "{}.{}({}) -> {}",
            self.namespace,
            self.name,
            params.join(", "),
            self.returns.describe()
        )
    }
}

impl ArgPattern {
    pub fn describe(&self) -> &'static str {
        match self {
            ArgPattern::Text => "string",
            ArgPattern::Number => "number",
            ArgPattern::Prim(p) => p.as_str(),
            ArgPattern::Array => "array<T>",
            ArgPattern::ArrayOf(Primitive::String) => "array<string>",
            ArgPattern::ArrayOf(_) => "array",
            ArgPattern::Hash => "hash<K, V>",
            ArgPattern::Elem => "T",
            ArgPattern::Key => "K",
        }
    }
}

impl Returns {
    pub fn describe(&self) -> String {
        match self {
            Returns::Prim(p) => p.to_string(),
            Returns::Number => "number".to_string(),
            Returns::OptionalElem => "T?".to_string(),
            Returns::ArrayOf(p) => format!("array<{p}>"),
            Returns::KeyArray => "array<K>".to_string(),
            Returns::ValueArray => "array<V>".to_string(),
            Returns::OptionalValue => "V?".to_string(),
            Returns::OptionalPrim(p) => format!("{p}?"),
            Returns::Unit => "unit".to_string(),
        }
    }
}

const fn sig(
    namespace: &'static str,
    name: &'static str,
    params: &'static [ArgPattern],
    returns: Returns,
) -> Signature {
    Signature {
        namespace,
        name,
        params,
        returns,
        fallible: false,
    }
}

const fn fallible(
    namespace: &'static str,
    name: &'static str,
    params: &'static [ArgPattern],
    returns: Returns,
) -> Signature {
    Signature {
        namespace,
        name,
        params,
        returns,
        fallible: true,
    }
}

use ArgPattern as A;
use Primitive as P;
use Returns as R;

pub static SIGNATURES: &[Signature] = &[
    sig("String", "length", &[A::Text], R::Prim(P::Int)),
    sig("String", "upcase", &[A::Text], R::Prim(P::String)),
    sig("String", "downcase", &[A::Text], R::Prim(P::String)),
    sig("String", "trim", &[A::Text], R::Prim(P::String)),
    sig("String", "slugify", &[A::Text], R::Prim(P::String)),
    sig("String", "truncate", &[A::Text, A::Prim(P::Int)], R::Prim(P::String)),
    sig("String", "contains", &[A::Text, A::Text], R::Prim(P::Bool)),
    sig("String", "starts_with", &[A::Text, A::Text], R::Prim(P::Bool)),
    sig("String", "ends_with", &[A::Text, A::Text], R::Prim(P::Bool)),
    sig("String", "replace", &[A::Text, A::Text, A::Text], R::Prim(P::String)),
    sig("String", "split", &[A::Text, A::Text], R::ArrayOf(P::String)),
    sig("String", "matches", &[A::Text, A::Text], R::Prim(P::Bool)),
    sig("Number", "abs", &[A::Number], R::Number),
    sig("Number", "min", &[A::Number, A::Number], R::Number),
    sig("Number", "max", &[A::Number, A::Number], R::Number),
    sig("Number", "round", &[A::Prim(P::Float)], R::Prim(P::Int)),
    sig("Number", "to_float", &[A::Prim(P::Int)], R::Prim(P::Float)),
    sig("Array", "length", &[A::Array], R::Prim(P::Int)),
    sig("Array", "is_empty", &[A::Array], R::Prim(P::Bool)),
    sig("Array", "contains", &[A::Array, A::Elem], R::Prim(P::Bool)),
    sig("Array", "first", &[A::Array], R::OptionalElem),
    sig("Array", "last", &[A::Array], R::OptionalElem),
    sig("Array", "join", &[A::ArrayOf(P::String), A::Prim(P::String)], R::Prim(P::String)),
    sig("Hash", "keys", &[A::Hash], R::KeyArray),
    sig("Hash", "values", &[A::Hash], R::ValueArray),
    sig("Hash", "has_key", &[A::Hash, A::Key], R::Prim(P::Bool)),
    sig("Hash", "get", &[A::Hash, A::Key], R::OptionalValue),
    sig("Time", "now", &[], R::Prim(P::Timestamp)),
    sig("Time", "today", &[], R::Prim(P::Date)),
    sig("UUID", "generate", &[], R::Prim(P::Uuid)),
    sig("Logger", "info", &[A::Prim(P::String)], R::Unit),
    sig("Logger", "warn", &[A::Prim(P::String)], R::Unit),
    sig("Logger", "error", &[A::Prim(P::String)], R::Unit),
    sig("Env", "get", &[A::Prim(P::String)], R::OptionalPrim(P::String)),
    fallible("Json", "parse", &[A::Prim(P::String)], R::Prim(P::Json)),
    sig("Json", "stringify", &[A::Prim(P::Json)], R::Prim(P::String)),
    fallible("Http", "get", &[A::Prim(P::String)], R::Prim(P::String)),
    fallible("Http", "post", &[A::Prim(P::String), A::Prim(P::Json)], R::Prim(P::String)),
    fallible(
        "Email",
        "send",
        &[A::Prim(P::Email), A::Prim(P::String), A::Prim(P::String)],
        R::Unit,
    ),
    sig("Crypto", "sha256", &[A::Prim(P::String)], R::Prim(P::String)),
    sig("Crypto", "random_token", &[A::Prim(P::Int)], R::Prim(P::String)),
];

pub fn lookup(namespace: &str, name: &str) -> Option<&'static Signature> {
    SIGNATURES
        .iter()
        .find(|s| s.namespace == namespace && s.name == name)
}

pub fn is_namespace(namespace: &str) -> bool {
    SIGNATURES.iter().any(|s| s.namespace == namespace)
}

/// The first namespace that defines `name`, used to suggest a qualified call.
pub fn namespace_for(name: &str) -> Option<&'static str> {
    SIGNATURES
        .iter()
        .find(|s| s.name == name)
        .map(|s| s.namespace)
}

/// Type variables bound while matching one call.
#[derive(Debug, Default)]
pub(crate) struct Bindings {
    pub number: Option<Primitive>,
    pub elem: Option<Ty>,
    pub key: Option<Ty>,
    pub value: Option<Ty>,
}

impl Bindings {
    /// The return type of `returns` under these bindings. Unbound variables
    /// yield the error type, which is compatible with everything.
    pub fn resolve(&self, returns: Returns) -> Ty {
        let bound = |ty: &Option<Ty>| ty.clone().unwrap_or_else(Ty::error);
        match returns {
            Returns::Prim(p) => Ty::primitive(p),
            Returns::Number => Ty::primitive(self.number.unwrap_or(Primitive::Int)),
            Returns::OptionalElem => bound(&self.elem).as_nullable(),
            Returns::ArrayOf(p) => Ty::array(Ty::primitive(p)),
            Returns::KeyArray => Ty::array(bound(&self.key)),
            Returns::ValueArray => Ty::array(bound(&self.value)),
            Returns::OptionalValue => bound(&self.value).as_nullable(),
            Returns::OptionalPrim(p) => Ty::primitive(p).as_nullable(),
            Returns::Unit => Ty::unit(),
        }
    }

    /// The type variable `returns` depends on that no argument bound, as
    /// when the only collection argument is an empty literal.
    pub fn unbound(&self, returns: Returns) -> Option<&'static str> {
        match returns {
            Returns::OptionalElem if self.elem.is_none() => Some("element"),
            Returns::KeyArray if self.key.is_none() => Some("key"),
            Returns::ValueArray | Returns::OptionalValue if self.value.is_none() => Some("value"),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        let truncate = lookup("String", "truncate").unwrap();
        assert_eq!(truncate.arity(), 2);
        assert!(!truncate.fallible);
        assert!(lookup("Http", "get").unwrap().fallible);
        assert!(lookup("String", "nope").is_none());
        assert!(lookup("string", "upcase").is_none());
    }

    #[test]
    fn test_namespace_for() {
        assert_eq!(namespace_for("upcase"), Some("String"));
        assert_eq!(namespace_for("round"), Some("Number"));
        assert_eq!(namespace_for("length"), Some("String"));
        assert_eq!(namespace_for("frobnicate"), None);
        assert!(is_namespace("Crypto"));
        assert!(!is_namespace("Post"));
    }

    #[test]
    fn test_describe() {
        assert_eq!(
            lookup("String", "truncate").unwrap().describe(),
            "String.truncate(string, int) -> string"
        );
        assert_eq!(lookup("Array", "first").unwrap().describe(), "Array.first(array<T>) -> T?");
    }

    #[test]
    fn test_bindings_resolve() {
        let bindings = Bindings {
            elem: Some(Ty::int()),
            ..Default::default()
        };
        assert_eq!(bindings.resolve(Returns::OptionalElem), Ty::int().as_nullable());
        assert!(bindings.resolve(Returns::OptionalValue).is_error());
        assert_eq!(bindings.resolve(Returns::Number), Ty::int());
    }

    #[test]
    fn test_bindings_unbound() {
        let bindings = Bindings {
            elem: Some(Ty::int()),
            ..Default::default()
        };
        assert_eq!(bindings.unbound(Returns::OptionalElem), None);
        assert_eq!(bindings.unbound(Returns::KeyArray), Some("key"));
        assert_eq!(bindings.unbound(Returns::OptionalValue), Some("value"));
        assert_eq!(bindings.unbound(Returns::Prim(Primitive::Bool)), None);
    }
}
