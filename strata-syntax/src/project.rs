//! `strata.toml` project configuration and source discovery.

use std::{
    path::{Path, PathBuf},
    str::FromStr,
};

use serde::Deserialize;

use crate::{Error, Result, SourceFile};

/// Name of the project configuration file.
pub const CONFIG_FILE: &str = "strata.toml";

/// Extension of resource definition files.
pub const SOURCE_EXTENSION: &str = "strata";

/// Root of `strata.toml`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    #[serde(default)]
    pub project: ProjectSection,
    #[serde(default)]
    pub build: BuildSection,
    #[serde(default)]
    pub codegen: CodegenSection,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectSection {
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct BuildSection {
    /// Directory scanned for `.strata` files.
    pub source: PathBuf,
    /// Directory generated Rust files are written to.
    pub output: PathBuf,
    /// Metadata document path; defaults to `metadata.json` in `output`.
    pub metadata: Option<PathBuf>,
}

impl Default for BuildSection {
    fn default() -> Self {
        Self {
            source: PathBuf::from("resources"),
            output: PathBuf::from("src/generated"),
            metadata: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct CodegenSection {
    /// Crate path generated code imports its runtime support from.
    pub runtime_crate: String,
}

impl Default for CodegenSection {
    fn default() -> Self {
        Self {
            runtime_crate: "strata_runtime".to_string(),
        }
    }
}

impl FromStr for ProjectConfig {
    type Err = Box<Error>;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_str_with_filename(s, CONFIG_FILE)
    }
}

impl ProjectConfig {
    /// Parse a strata.toml from a string with a custom filename for error reporting
    pub fn from_str_with_filename(content: &str, filename: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::config(e, content, filename))
    }
}

/// A project rooted at a directory, with its resolved configuration.
#[derive(Debug, Clone)]
pub struct Project {
    root: PathBuf,
    config: ProjectConfig,
}

impl Project {
    /// Open a project from an explicit config file path.
    pub fn open(config_path: impl AsRef<Path>) -> Result<Self> {
        let path = config_path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let config = ProjectConfig::from_str_with_filename(&content, &path.display().to_string())?;
        let root = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        tracing::debug!(path = %path.display(), "loaded project config");
        Ok(Self { root, config })
    }

    /// Open the project in `dir`, falling back to defaults when it has no
    /// `strata.toml`.
    pub fn discover(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let config_path = dir.join(CONFIG_FILE);
        if config_path.is_file() {
            Self::open(config_path)
        } else {
            Ok(Self::with_config(dir, ProjectConfig::default()))
        }
    }

    pub fn with_config(root: impl Into<PathBuf>, config: ProjectConfig) -> Self {
        Self {
            root: root.into(),
            config,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &ProjectConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut ProjectConfig {
        &mut self.config
    }

    /// Project name, defaulting to the root directory's name.
    pub fn name(&self) -> String {
        self.config.project.name.clone().unwrap_or_else(|| {
            self.root
                .canonicalize()
                .ok()
                .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
                .unwrap_or_else(|| "strata".to_string())
        })
    }

    pub fn source_dir(&self) -> PathBuf {
        self.root.join(&self.config.build.source)
    }

    pub fn output_dir(&self) -> PathBuf {
        self.root.join(&self.config.build.output)
    }

    pub fn metadata_path(&self) -> PathBuf {
        match &self.config.build.metadata {
            Some(path) => self.root.join(path),
            None => self.output_dir().join("metadata.json"),
        }
    }

    /// Read every `.strata` file under the source directory, sorted by path.
    pub fn load_sources(&self) -> Result<Vec<SourceFile>> {
        let dir = self.source_dir();
        if !dir.is_dir() {
            return Err(Box::new(Error::MissingSourceDir { path: dir }));
        }

        let mut paths = Vec::new();
        collect_sources(&dir, &mut paths)?;
        paths.sort();

        let sources = paths
            .into_iter()
            .map(|path| {
                let text = std::fs::read_to_string(&path).map_err(|e| Error::io(&path, e))?;
                let display = path.strip_prefix(&self.root).unwrap_or(&path).to_path_buf();
                Ok(SourceFile::new(display, text))
            })
            .collect::<Result<Vec<_>>>()?;
        tracing::debug!(count = sources.len(), dir = %dir.display(), "loaded sources");
        Ok(sources)
    }
}

fn collect_sources(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    let entries = std::fs::read_dir(dir).map_err(|e| Error::io(dir, e))?;
    for entry in entries {
        let path = entry.map_err(|e| Error::io(dir, e))?.path();
        if path.is_dir() {
            collect_sources(&path, out)?;
        } else if path.extension().is_some_and(|ext| ext == SOURCE_EXTENSION) {
            out.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_empty() {
        let config: ProjectConfig = "".parse().unwrap();
        assert_eq!(config, ProjectConfig::default());
        assert_eq!(config.codegen.runtime_crate, "strata_runtime");
        assert_eq!(config.build.source, PathBuf::from("resources"));
    }

    #[test]
    fn test_parse_sections() {
        let config: ProjectConfig = r#"
            [project]
            name = "blog"

            [build]
            source = "schema"
            output = "gen"
            metadata = "meta/blog.json"

            [codegen]
            runtime_crate = "blog_runtime"
        "#
        .parse()
        .unwrap();
        assert_eq!(config.project.name.as_deref(), Some("blog"));
        assert_eq!(config.build.output, PathBuf::from("gen"));
        assert_eq!(config.build.metadata, Some(PathBuf::from("meta/blog.json")));
        assert_eq!(config.codegen.runtime_crate, "blog_runtime");
    }

    #[test]
    fn test_unknown_key_is_config_error() {
        let err = "[build]\nsorce = \"x\"".parse::<ProjectConfig>().unwrap_err();
        assert!(matches!(*err, Error::Config { .. }));
    }

    #[test]
    fn test_discover_and_load_sources_sorted() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            "[build]\nsource = \"defs\"\noutput = \"out\"\n",
        )
        .unwrap();
        let defs = dir.path().join("defs");
        std::fs::create_dir_all(defs.join("nested")).unwrap();
        std::fs::write(defs.join("b.strata"), "resource B {}").unwrap();
        std::fs::write(defs.join("a.strata"), "resource A {}").unwrap();
        std::fs::write(defs.join("nested/c.strata"), "resource C {}").unwrap();
        std::fs::write(defs.join("notes.txt"), "ignored").unwrap();

        let project = Project::discover(dir.path()).unwrap();
        assert_eq!(project.output_dir(), dir.path().join("out"));
        assert_eq!(project.metadata_path(), dir.path().join("out/metadata.json"));

        let sources = project.load_sources().unwrap();
        let names: Vec<_> = sources.iter().map(|s| s.name()).collect();
        assert_eq!(names, ["defs/a.strata", "defs/b.strata", "defs/nested/c.strata"]);
    }

    #[test]
    fn test_missing_source_dir() {
        let dir = tempfile::tempdir().unwrap();
        let project = Project::discover(dir.path()).unwrap();
        let err = project.load_sources().unwrap_err();
        assert!(matches!(*err, Error::MissingSourceDir { .. }));
    }
}
