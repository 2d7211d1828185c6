use std::path::{Path, PathBuf};

use strata_core::GeneratedFile;
use strata_ir::MetadataDocument;

/// The `metadata.json` document read by the runtime.
pub struct MetadataJson {
    document: MetadataDocument,
    /// Explicit location; defaults to `metadata.json` in the output directory.
    path: Option<PathBuf>,
}

impl MetadataJson {
    pub fn new(document: MetadataDocument) -> Self {
        Self {
            document,
            path: None,
        }
    }

    pub fn at(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Path shown in previews.
    pub fn display_path(&self) -> String {
        match &self.path {
            Some(path) => path.display().to_string(),
            None => "metadata.json".to_string(),
        }
    }
}

impl GeneratedFile for MetadataJson {
    fn path(&self, base: &Path) -> PathBuf {
        match &self.path {
            Some(path) => path.clone(),
            None => base.join("metadata.json"),
        }
    }

    fn render(&self) -> String {
        // Serializing plain strings, numbers and maps cannot fail.
        let mut json = serde_json::to_string_pretty(&self.document).unwrap_or_default();
        json.push('\n');
        json
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_path_is_in_output_dir() {
        let file = MetadataJson::new(MetadataDocument::default());
        assert_eq!(
            file.path(Path::new("out")),
            Path::new("out").join("metadata.json")
        );
        assert_eq!(file.display_path(), "metadata.json");
    }

    #[test]
    fn test_explicit_path_wins() {
        let file = MetadataJson::new(MetadataDocument::default()).at("/tmp/meta.json");
        assert_eq!(file.path(Path::new("out")), PathBuf::from("/tmp/meta.json"));
    }

    #[test]
    fn test_renders_pretty_json_with_newline() {
        let file = MetadataJson::new(MetadataDocument::default());
        assert_eq!(file.render(), "{\n  \"version\": 1,\n  \"resources\": {}\n}\n");
    }
}
