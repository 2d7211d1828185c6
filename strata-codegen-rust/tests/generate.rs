use std::fs;

use strata_codegen_rust::{Generator, LanguageCodegen, NameCheckPhase};
use strata_compiler::pipeline::{CompilationContext, Pipeline};
use strata_syntax::SourceFile;

const BLOG: &str = r##"resource User {
  id: uuid! @primary
  name: string! @min(1)
}

resource Post {
  id: uuid! @primary
  title: string!
  status: enum["draft", "published"]! @default("draft")
  author: User!
  @computed label: string! { "#{self.title} (#{self.status})" }
}
"##;

fn compile(files: &[(&str, &str)]) -> CompilationContext {
    let sources = files
        .iter()
        .map(|(path, text)| SourceFile::new(*path, *text))
        .collect();
    Pipeline::new()
        .phase(NameCheckPhase)
        .run(sources)
        .expect("pipeline should succeed")
}

#[test]
fn test_generates_one_module_per_resource() {
    let ctx = compile(&[("blog.strata", BLOG)]);
    assert!(!ctx.has_errors(), "{:?}", ctx.diagnostics);

    let dir = tempfile::tempdir().unwrap();
    let result = Generator::from_context(&ctx).generate(dir.path()).unwrap();

    assert_eq!(result.written.len(), 4);
    assert!(result.skipped.is_empty());
    let post = fs::read_to_string(dir.path().join("post.rs")).unwrap();
    assert!(post.starts_with("// @generated by strata. Do not edit.\n\n"));
    assert!(post.contains("pub author_id: uuid::Uuid,"));
    assert!(post.contains("pub fn label(&self) -> String {"));

    let module = fs::read_to_string(dir.path().join("mod.rs")).unwrap();
    assert!(module.contains("pub mod post;"));
    assert!(module.contains("pub use post::{Post, PostStatus};"));
    assert!(module.contains("pub use user::User;"));
    assert!(dir.path().join("metadata.json").exists());
}

#[test]
fn test_second_run_leaves_files_unchanged() {
    let ctx = compile(&[("blog.strata", BLOG)]);
    let dir = tempfile::tempdir().unwrap();
    let generator = Generator::from_context(&ctx);

    generator.generate(dir.path()).unwrap();
    let again = generator.generate(dir.path()).unwrap();
    assert!(again.written.is_empty());
    assert_eq!(again.unchanged.len(), 4);
}

#[test]
fn test_preview_is_deterministic() {
    let first = Generator::from_context(&compile(&[("blog.strata", BLOG)]))
        .preview()
        .unwrap();
    let second = Generator::from_context(&compile(&[("blog.strata", BLOG)]))
        .preview()
        .unwrap();
    assert_eq!(first, second);
    let paths: Vec<&str> = first.iter().map(|f| f.path.as_str()).collect();
    assert_eq!(paths, ["user.rs", "post.rs", "mod.rs", "metadata.json"]);
}

#[test]
fn test_resource_with_errors_is_skipped() {
    let broken = "resource Draft {\n  title: string!\n  @computed shout: string! { self.missing }\n}\n";
    let ctx = compile(&[("blog.strata", BLOG), ("draft.strata", broken)]);
    assert!(ctx.has_errors());

    let dir = tempfile::tempdir().unwrap();
    let result = Generator::from_context(&ctx).generate(dir.path()).unwrap();

    assert_eq!(result.skipped, ["Draft"]);
    assert!(dir.path().join("post.rs").exists());
    assert!(dir.path().join("user.rs").exists());
    assert!(!dir.path().join("draft.rs").exists());
    assert!(!dir.path().join("metadata.json").exists());
}

#[test]
fn test_uninferrable_call_is_never_generated() {
    let src = "resource Note {\n  id: uuid! @primary\n  @computed label: string! { Array.first([]) ?? \"x\" }\n}\n";
    let ctx = compile(&[("note.strata", src)]);
    assert!(ctx.has_errors());

    let files = Generator::from_context(&ctx).preview().unwrap();
    assert!(files.iter().all(|f| !f.content.contains("unreachable!()")));
    assert!(files.iter().all(|f| f.path != "note.rs"));
}

#[test]
fn test_cascade_cycle_skips_only_its_members() {
    let src = r#"resource Account {
  id: uuid! @primary
  team: Team! @on_delete(cascade)
}

resource Team {
  id: uuid! @primary
  owner: Member! @on_delete(cascade)
}

resource Member {
  id: uuid! @primary
  account: Account! @on_delete(cascade)
}

resource Tag {
  id: uuid! @primary
  label: string!
}
"#;
    let ctx = compile(&[("org.strata", src)]);
    assert_eq!(ctx.error_count(), 1, "{:?}", ctx.diagnostics);

    let dir = tempfile::tempdir().unwrap();
    let generator = Generator::from_context(&ctx);
    assert_eq!(generator.skipped(), ["Account", "Team", "Member"]);

    let result = generator.generate(dir.path()).unwrap();
    assert_eq!(result.skipped, ["Account", "Team", "Member"]);
    assert!(dir.path().join("tag.rs").exists());
    for skipped in ["account.rs", "team.rs", "member.rs", "metadata.json"] {
        assert!(!dir.path().join(skipped).exists(), "{skipped}");
    }
    let module = fs::read_to_string(dir.path().join("mod.rs")).unwrap();
    assert!(module.contains("pub mod tag;"));
    assert!(!module.contains("pub mod team;"));
}

#[test]
fn test_metadata_path_and_runtime_crate() {
    let ctx = compile(&[("blog.strata", BLOG)]);
    let out = tempfile::tempdir().unwrap();
    let meta = tempfile::tempdir().unwrap();
    let metadata = meta.path().join("strata.json");

    Generator::from_context(&ctx)
        .runtime_crate("my_runtime")
        .metadata_path(&metadata)
        .generate(out.path())
        .unwrap();

    let post = fs::read_to_string(out.path().join("post.rs")).unwrap();
    assert!(post.contains("use my_runtime::{"));
    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&metadata).unwrap()).unwrap();
    assert!(json.get("resources").is_some());
    assert!(!out.path().join("metadata.json").exists());
}

#[test]
fn test_name_collision_blocks_generation() {
    let src = "resource Post {\n  id: uuid! @primary\n  viewCount: int!\n  view_count: int!\n}\n";
    let ctx = compile(&[("post.strata", src)]);
    let dir = tempfile::tempdir().unwrap();
    let result = Generator::from_context(&ctx).generate(dir.path()).unwrap();
    assert_eq!(result.skipped, ["Post"]);
    assert!(!dir.path().join("post.rs").exists());
}
