//! Backend-agnostic code generation traits.

use std::path::{Path, PathBuf};

use eyre::Result;
use strata_core::Primitive;
use strata_ir::Ty;

/// A code generator for one backend language.
pub trait LanguageCodegen {
    /// Language identifier (e.g. "rust").
    fn language(&self) -> &'static str;

    /// Extension of generated source files (e.g. "rs").
    fn file_extension(&self) -> &'static str;

    /// Render every file without touching the disk.
    fn preview(&self) -> Result<Vec<PreviewFile>>;

    /// Write every file into `output_dir`.
    fn generate(&self, output_dir: &Path) -> Result<GenerateResult>;
}

/// What a call to [`LanguageCodegen::generate`] did.
#[derive(Debug, Default)]
pub struct GenerateResult {
    /// Files written or rewritten.
    pub written: Vec<PathBuf>,
    /// Files whose content was already up to date.
    pub unchanged: Vec<PathBuf>,
    /// Resources left out because they carry errors.
    pub skipped: Vec<String>,
}

/// A rendered file.
#[derive(Debug, Clone, PartialEq)]
pub struct PreviewFile {
    /// Path relative to the output directory.
    pub path: String,
    pub content: String,
}

/// Maps semantic types to backend type syntax.
pub trait TypeMapper {
    fn language(&self) -> &'static str;

    fn map_primitive(&self, primitive: Primitive) -> &'static str;

    /// The full type, including nullability.
    fn map_type(&self, ty: &Ty) -> String;
}
