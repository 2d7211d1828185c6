//! Built-in convention lints.

mod field_naming;
mod missing_primary_key;
mod redundant_modifier;
mod resource_naming;

pub use field_naming::FieldNamingLint;
pub use missing_primary_key::MissingPrimaryKeyLint;
pub use redundant_modifier::RedundantModifierLint;
pub use resource_naming::ResourceNamingLint;
