use std::path::{Path, PathBuf};

use strata_core::{FileRules, GeneratedFile};

use super::GENERATED_HEADER;
use crate::{RawCode, RustFile};

/// A module declared by `mod.rs` and the types it re-exports.
#[derive(Debug, Clone)]
pub struct ModEntry {
    pub module: String,
    pub exports: Vec<String>,
}

/// The `mod.rs` file that declares and re-exports every generated resource.
pub struct GeneratedMod {
    entries: Vec<ModEntry>,
}

impl GeneratedMod {
    pub fn new(entries: Vec<ModEntry>) -> Self {
        Self { entries }
    }
}

impl GeneratedFile for GeneratedMod {
    fn path(&self, base: &Path) -> PathBuf {
        base.join("mod.rs")
    }

    fn rules(&self) -> FileRules {
        FileRules::generated(GENERATED_HEADER)
    }

    fn render(&self) -> String {
        let mods = self
            .entries
            .iter()
            .map(|entry| format!("pub mod {};", entry.module));
        let uses = self.entries.iter().map(|entry| match entry.exports.as_slice() {
            [one] => format!("pub use {}::{one};", entry.module),
            many => format!("pub use {}::{{{}}};", entry.module, many.join(", ")),
        });
        RustFile::new()
            .add(RawCode::lines(mods))
            .add(RawCode::lines(uses))
            .render()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mod_declares_and_reexports() {
        let file = GeneratedMod::new(vec![
            ModEntry {
                module: "post".into(),
                exports: vec!["Post".into(), "PostStatus".into()],
            },
            ModEntry {
                module: "user".into(),
                exports: vec!["User".into()],
            },
        ]);
        insta::assert_snapshot!(file.contents(), @r"
        // @generated by strata. Do not edit.

        pub mod post;
        pub mod user;

        pub use post::{Post, PostStatus};
        pub use user::User;
        ");
    }
}
