//! Rust code generator for the Strata resource compiler.
//!
//! Every checked resource becomes one Rust module with a record struct, its
//! enums and inline structs, validation, hook methods and CRUD functions.
//! A `mod.rs` re-exports the generated types and `metadata.json` describes
//! them for the runtime.
//!
//! # Example
//!
//! ```ignore
//! use strata_codegen_rust::{Generator, LanguageCodegen, NameCheckPhase};
//!
//! let ctx = Pipeline::new().phase(NameCheckPhase).run(sources)?;
//! let result = Generator::from_context(&ctx).generate(Path::new("src/generated"))?;
//! ```

mod generator;
mod naming;
mod names;
mod resource;
mod rust_file;
mod transpile;
mod type_mapper;

pub mod ast;
pub mod files;

pub use ast::{Enum, Field, Fn, Impl, Param, Struct, Variant};
pub use generator::{DEFAULT_RUNTIME_CRATE, Generator};
pub use naming::RUST_NAMING;
pub use names::NameCheckPhase;
pub use resource::render_resource;
pub use rust_file::{RawCode, RustFile, Use};
pub use strata_compiler::language::{GenerateResult, LanguageCodegen, PreviewFile};
pub use type_mapper::RustTypeMapper;
