//! Backend abstractions.
//!
//! - [`LanguageCodegen`] - implemented by each code generator
//! - [`TypeMapper`] - semantic types to backend type syntax
//! - [`NamingConvention`] - backend naming rules and reserved words

mod naming;
mod traits;

pub use naming::NamingConvention;
pub use traits::{GenerateResult, LanguageCodegen, PreviewFile, TypeMapper};
