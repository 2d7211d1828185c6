use std::{fs, path::Path, process::Command};

fn strata(dir: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_strata"));
    cmd.current_dir(dir);
    cmd
}

fn project(resources: &[(&str, &str)]) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("resources");
    fs::create_dir_all(&source).unwrap();
    for (name, text) in resources {
        fs::write(source.join(name), text).unwrap();
    }
    dir
}

const POST: &str = "resource Post {\n  id: uuid! @primary\n  title: string! @min(1)\n}\n";
const BROKEN: &str = "resource Draft {\n  id: uuid! @primary\n  title: string\n}\n";

#[test]
fn test_help() {
    let dir = tempfile::tempdir().unwrap();
    let output = strata(dir.path()).arg("--help").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("build"));
    assert!(stdout.contains("check"));
}

#[test]
fn test_check_valid_project() {
    let dir = project(&[("post.strata", POST)]);
    let output = strata(dir.path()).arg("check").output().unwrap();
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(String::from_utf8_lossy(&output.stdout).contains("is valid"));
}

#[test]
fn test_check_json_reports_errors_and_fails() {
    let dir = project(&[("draft.strata", BROKEN)]);
    let output = strata(dir.path()).args(["check", "--json"]).output().unwrap();
    assert_eq!(output.status.code(), Some(1));

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let diagnostics = json.as_array().unwrap();
    let missing = diagnostics
        .iter()
        .find(|d| d["code"] == "syntax::missing_nullability")
        .unwrap();
    assert_eq!(missing["file"], "resources/draft.strata");
    assert_eq!(missing["line"], 3);
}

#[test]
fn test_build_writes_generated_code() {
    let dir = project(&[("post.strata", POST)]);
    let output = strata(dir.path()).arg("build").output().unwrap();
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let out = dir.path().join("src/generated");
    let post = fs::read_to_string(out.join("post.rs")).unwrap();
    assert!(post.contains("pub struct Post {"));
    assert!(out.join("mod.rs").exists());
    assert!(out.join("metadata.json").exists());
}

#[test]
fn test_build_generates_unaffected_resources_on_error() {
    let dir = project(&[("draft.strata", BROKEN), ("post.strata", POST)]);
    let output = strata(dir.path())
        .args(["build", "--output", "gen"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));

    let out = dir.path().join("gen");
    assert!(out.join("post.rs").exists());
    assert!(!out.join("draft.rs").exists());
    assert!(!out.join("metadata.json").exists());
}

#[test]
fn test_build_dry_run_writes_nothing() {
    let dir = project(&[("post.strata", POST)]);
    let output = strata(dir.path())
        .args(["build", "--dry-run"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("── post.rs ──"));
    assert!(stdout.contains("files would be generated"));
    assert!(!dir.path().join("src/generated").exists());
}

#[test]
fn test_config_file_sets_paths_and_runtime() {
    let dir = project(&[]);
    fs::create_dir_all(dir.path().join("defs")).unwrap();
    fs::write(dir.path().join("defs/post.strata"), POST).unwrap();
    fs::write(
        dir.path().join("strata.toml"),
        "[build]\nsource = \"defs\"\noutput = \"out\"\nmetadata = \"meta.json\"\n\n[codegen]\nruntime_crate = \"crate::runtime\"\n",
    )
    .unwrap();

    let output = strata(dir.path()).arg("build").output().unwrap();
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let post = fs::read_to_string(dir.path().join("out/post.rs")).unwrap();
    assert!(post.contains("use crate::runtime::{"));
    assert!(dir.path().join("meta.json").exists());
}

#[test]
fn test_missing_source_dir_fails() {
    let dir = tempfile::tempdir().unwrap();
    let output = strata(dir.path()).arg("check").output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("missing_source_dir"));
}
