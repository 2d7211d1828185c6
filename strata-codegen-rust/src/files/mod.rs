//! Files written next to the per-resource modules.

mod generated_mod;
mod metadata_json;

pub use generated_mod::{GeneratedMod, ModEntry};
pub use metadata_json::MetadataJson;

/// First line of every generated Rust file.
pub const GENERATED_HEADER: &str = "// @generated by strata. Do not edit.";
