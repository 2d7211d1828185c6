use std::path::{Path, PathBuf};

use eyre::Result;
use rayon::prelude::*;
use strata_compiler::{
    language::{GenerateResult, LanguageCodegen, PreviewFile},
    metadata::build_metadata,
    pipeline::CompilationContext,
};
use strata_core::{File, FileRules, GeneratedFile, WriteResult};
use strata_ir::ResourceIr;

use crate::{
    RUST_NAMING,
    files::{GENERATED_HEADER, GeneratedMod, MetadataJson, ModEntry},
    resource::render_resource,
};

/// Crate generated code imports its runtime from unless configured.
pub const DEFAULT_RUNTIME_CRATE: &str = "strata_runtime";

/// Rust code generator for checked resources.
///
/// Resources with error diagnostics are skipped; the others are generated
/// regardless. `metadata.json` is produced only when the compilation has no
/// errors at all.
pub struct Generator<'a> {
    resources: Vec<&'a ResourceIr>,
    skipped: Vec<String>,
    metadata: Option<MetadataJson>,
    runtime_crate: String,
}

impl<'a> Generator<'a> {
    pub fn from_context(ctx: &'a CompilationContext) -> Self {
        let blocked = ctx.blocked_resources();
        let skipped = ctx
            .resources
            .iter()
            .filter(|r| blocked.contains(&r.name))
            .map(|r| r.name.clone())
            .collect();
        let metadata =
            (!ctx.has_errors()).then(|| MetadataJson::new(build_metadata(&ctx.resources)));
        Self {
            resources: ctx.generable_resources(),
            skipped,
            metadata,
            runtime_crate: DEFAULT_RUNTIME_CRATE.to_string(),
        }
    }

    /// Crate that provides `Db`, `Tx`, `Error` and the standard library.
    pub fn runtime_crate(mut self, name: impl Into<String>) -> Self {
        self.runtime_crate = name.into();
        self
    }

    /// Write `metadata.json` to `path` instead of the output directory.
    pub fn metadata_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.metadata = self.metadata.map(|metadata| metadata.at(path));
        self
    }

    /// Names of resources left out because of errors.
    pub fn skipped(&self) -> &[String] {
        &self.skipped
    }

    /// One module per resource, rendered in parallel and kept in
    /// declaration order.
    fn resource_files(&self) -> Vec<File> {
        self.resources
            .par_iter()
            .map(|resource| {
                let _span = tracing::debug_span!("render", resource = %resource.name).entered();
                let content = render_resource(resource, &self.runtime_crate);
                File::new(format!("{}.rs", RUST_NAMING.file_name(&resource.name)), content)
                    .with_rules(FileRules::generated(GENERATED_HEADER))
            })
            .collect()
    }

    fn mod_file(&self) -> GeneratedMod {
        let entries = self
            .resources
            .iter()
            .map(|resource| ModEntry {
                module: RUST_NAMING.file_name(&resource.name),
                exports: std::iter::once(&resource.name)
                    .chain(resource.enums.iter().map(|e| &e.name))
                    .chain(resource.structs.iter().map(|s| &s.name))
                    .cloned()
                    .collect(),
            })
            .collect();
        GeneratedMod::new(entries)
    }
}

impl LanguageCodegen for Generator<'_> {
    fn language(&self) -> &'static str {
        "rust"
    }

    fn file_extension(&self) -> &'static str {
        "rs"
    }

    fn preview(&self) -> Result<Vec<PreviewFile>> {
        let mut files: Vec<PreviewFile> = self
            .resource_files()
            .into_iter()
            .map(|file| PreviewFile {
                path: file.relative_path().display().to_string(),
                content: file.contents(),
            })
            .collect();
        files.push(PreviewFile {
            path: "mod.rs".to_string(),
            content: self.mod_file().contents(),
        });
        if let Some(metadata) = &self.metadata {
            files.push(PreviewFile {
                path: metadata.display_path(),
                content: metadata.contents(),
            });
        }
        Ok(files)
    }

    fn generate(&self, output_dir: &Path) -> Result<GenerateResult> {
        let mut result = GenerateResult {
            skipped: self.skipped.clone(),
            ..GenerateResult::default()
        };
        for file in self.resource_files() {
            write(&file, output_dir, &mut result)?;
        }
        write(&self.mod_file(), output_dir, &mut result)?;
        if let Some(metadata) = &self.metadata {
            write(metadata, output_dir, &mut result)?;
        }
        tracing::debug!(
            written = result.written.len(),
            unchanged = result.unchanged.len(),
            skipped = result.skipped.len(),
            "generated rust sources"
        );
        Ok(result)
    }
}

fn write(file: &impl GeneratedFile, output_dir: &Path, result: &mut GenerateResult) -> Result<()> {
    let path = file.path(output_dir);
    match file.write(output_dir)? {
        WriteResult::Written => result.written.push(path),
        WriteResult::Unchanged => result.unchanged.push(path),
    }
    Ok(())
}
