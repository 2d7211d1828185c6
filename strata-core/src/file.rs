use std::path::{Path, PathBuf};

use eyre::{Result, WrapErr};

/// Trait for types that represent a generated file
pub trait GeneratedFile {
    /// Get the file path relative to the base directory
    fn path(&self, base: &Path) -> PathBuf;

    /// Get the rules for writing this file
    fn rules(&self) -> FileRules {
        FileRules::default()
    }

    /// Render the file content
    fn render(&self) -> String;

    /// The content as written to disk, header included.
    fn contents(&self) -> String {
        self.rules().apply_header(self.render())
    }

    /// Write the file to disk, leaving it untouched when the content is
    /// already identical.
    fn write(&self, base: &Path) -> Result<WriteResult> {
        let path = self.path(base);
        let content = self.contents();

        if std::fs::read_to_string(&path).is_ok_and(|existing| existing == content) {
            tracing::debug!(path = %path.display(), "file unchanged");
            return Ok(WriteResult::Unchanged);
        }
        write_file(&path, &content)?;
        Ok(WriteResult::Written)
    }
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .wrap_err_with(|| format!("failed to create '{}'", parent.display()))?;
    }
    std::fs::write(path, content)
        .wrap_err_with(|| format!("failed to write '{}'", path.display()))?;
    tracing::debug!(path = %path.display(), bytes = content.len(), "wrote file");
    Ok(())
}

/// Result of a write operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteResult {
    Written,
    /// The file already had this content.
    Unchanged,
}

/// A file to be generated
#[derive(Debug, Clone)]
pub struct File {
    path: PathBuf,
    content: String,
    rules: FileRules,
}

impl File {
    /// Create a new file with the given path and content (default rules: always overwrite)
    pub fn new(path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
            rules: FileRules::default(),
        }
    }

    /// Replace the write rules.
    pub fn with_rules(mut self, rules: FileRules) -> Self {
        self.rules = rules;
        self
    }

    /// Get the path relative to the output directory
    pub fn relative_path(&self) -> &Path {
        &self.path
    }

    /// Get the file content
    pub fn content(&self) -> &str {
        &self.content
    }
}

impl GeneratedFile for File {
    fn path(&self, base: &Path) -> PathBuf {
        base.join(&self.path)
    }

    fn rules(&self) -> FileRules {
        self.rules.clone()
    }

    fn render(&self) -> String {
        self.content.clone()
    }
}

/// Rules that determine how a file should be written
#[derive(Debug, Clone, Default)]
pub struct FileRules {
    /// Line placed above the content, separated by a blank line.
    pub header: Option<&'static str>,
}

impl FileRules {
    /// Rules for generated sources.
    pub fn generated(header: &'static str) -> Self {
        Self {
            header: Some(header),
        }
    }

    fn apply_header(&self, content: String) -> String {
        match self.header {
            Some(header) => format!("{}\n\n{}", header, content),
            None => content,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_write_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let file = File::new("nested/out.rs", "fn main() {}\n");

        let result = file.write(dir.path()).unwrap();

        assert_eq!(result, WriteResult::Written);
        let written = std::fs::read_to_string(dir.path().join("nested/out.rs")).unwrap();
        assert_eq!(written, "fn main() {}\n");
    }

    #[test]
    fn test_header_is_prepended() {
        let dir = tempfile::tempdir().unwrap();
        let file =
            File::new("out.rs", "struct A;\n").with_rules(FileRules::generated("// @generated"));

        file.write(dir.path()).unwrap();

        let written = std::fs::read_to_string(dir.path().join("out.rs")).unwrap();
        assert_eq!(written, "// @generated\n\nstruct A;\n");
    }

    #[test]
    fn test_identical_content_is_not_rewritten() {
        let dir = tempfile::tempdir().unwrap();
        let file = File::new("same.rs", "struct A;\n");

        assert_eq!(file.write(dir.path()).unwrap(), WriteResult::Written);
        assert_eq!(file.write(dir.path()).unwrap(), WriteResult::Unchanged);

        let changed = File::new("same.rs", "struct B;\n");
        assert_eq!(changed.write(dir.path()).unwrap(), WriteResult::Written);
    }
}
