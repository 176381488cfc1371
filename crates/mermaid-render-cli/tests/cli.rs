use std::fs;
use std::path::{Path, PathBuf};

use mermaid_render_core::ExitCode;
use predicates::prelude::*;
use tempfile::{tempdir, TempDir};

const TWO_DIAGRAMS: &str = "# Design\n\n```mermaid\ngraph TD; A-->B\n```\n\nSome prose.\n\n```mermaid\nsequenceDiagram Alice->>Bob: Hi\n```\n";

fn cargo_bin() -> assert_cmd::Command {
    assert_cmd::Command::cargo_bin("mermaid-to-png").unwrap()
}

fn workspace(markdown: &str) -> (TempDir, PathBuf) {
    let dir = tempdir().unwrap();
    let document = dir.path().join("doc.md");
    fs::write(&document, markdown).unwrap();
    (dir, document)
}

#[cfg(unix)]
fn fake_renderer(dir: &Path) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let renderer = dir.join("fake-mmdc");
    let script = r#"#!/bin/sh
out=""
while [ "$#" -gt 0 ]; do
  if [ "$1" = "-o" ]; then
    shift
    out="$1"
  fi
  shift
done
printf 'PNG' > "$out"
"#;
    fs::write(&renderer, script).unwrap();
    let mut perms = fs::metadata(&renderer).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&renderer, perms).unwrap();
    renderer
}

fn listing(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[cfg(unix)]
#[test]
fn converts_every_diagram_next_to_the_working_directory() {
    let (dir, _document) = workspace(TWO_DIAGRAMS);
    let renderer = fake_renderer(dir.path());

    cargo_bin()
        .current_dir(dir.path())
        .arg("doc.md")
        .arg("--renderer")
        .arg(&renderer)
        .assert()
        .success()
        .stdout(predicate::str::contains("Processing: doc.md"))
        .stdout(predicate::str::contains("Found 2 mermaid diagram(s)"))
        .stdout(predicate::str::contains(
            "✓ Diagram 2 (line 9): converted doc_diagrams/diagram_2.mmd to doc_diagrams/diagram_2.png",
        ))
        .stdout(predicate::str::contains(
            "Conversion complete: 2/2 diagrams converted successfully",
        ))
        .stdout(predicate::str::contains("Diagrams saved in: doc_diagrams/"));

    assert_eq!(
        listing(&dir.path().join("doc_diagrams")),
        vec!["diagram_1.mmd", "diagram_1.png", "diagram_2.mmd", "diagram_2.png"]
    );
}

#[cfg(unix)]
#[test]
fn out_dir_flag_moves_the_artifacts() {
    let (dir, document) = workspace(TWO_DIAGRAMS);
    let renderer = fake_renderer(dir.path());
    let out = dir.path().join("build");

    cargo_bin()
        .current_dir(dir.path())
        .arg(&document)
        .arg("--renderer")
        .arg(&renderer)
        .arg("--out-dir")
        .arg(&out)
        .arg("--quiet")
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    assert!(out.join("doc_diagrams").join("diagram_2.png").exists());
    assert!(!dir.path().join("doc_diagrams").exists());
}

#[cfg(unix)]
#[test]
fn missing_renderer_still_exits_zero() {
    let (dir, _document) = workspace(TWO_DIAGRAMS);

    cargo_bin()
        .current_dir(dir.path())
        .arg("doc.md")
        .arg("--renderer")
        .arg(dir.path().join("missing-mmdc"))
        .arg("--no-html-fallback")
        .env("PATH", "")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "✗ Diagram 1 (line 3): error converting",
        ))
        .stdout(predicate::str::contains(
            "Conversion complete: 0/2 diagrams converted successfully",
        ));

    assert_eq!(
        listing(&dir.path().join("doc_diagrams")),
        vec!["diagram_1.mmd", "diagram_2.mmd"]
    );
}

#[test]
fn document_without_diagrams_creates_nothing() {
    let (dir, _document) = workspace("# Notes\n\n```rust\nfn main() {}\n```\n");

    cargo_bin()
        .current_dir(dir.path())
        .arg("doc.md")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "No mermaid diagrams found in the file.",
        ))
        .stdout(predicate::str::contains("Conversion complete").not());

    assert!(!dir.path().join("doc_diagrams").exists());
}

#[test]
fn wrong_extension_is_rejected_before_touching_disk() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("notes.txt"), TWO_DIAGRAMS).unwrap();

    cargo_bin()
        .current_dir(dir.path())
        .arg("notes.txt")
        .assert()
        .failure()
        .code(ExitCode::Usage as i32)
        .stdout(predicate::str::contains(".md extension"));

    assert!(!dir.path().join("notes_diagrams").exists());
}

#[test]
fn missing_file_is_a_usage_error() {
    let dir = tempdir().unwrap();

    cargo_bin()
        .current_dir(dir.path())
        .arg("absent.md")
        .assert()
        .failure()
        .code(ExitCode::Usage as i32)
        .stdout(predicate::str::contains("File 'absent.md' not found."));
}

#[test]
fn missing_argument_prints_usage_and_exits_one() {
    cargo_bin()
        .assert()
        .failure()
        .code(ExitCode::Usage as i32)
        .stdout(predicate::str::contains(
            "Usage: mermaid-to-png <markdown_file.md>",
        ))
        .stdout(predicate::str::contains("Example:"));
}

#[test]
fn missing_override_config_exits_with_io_code() {
    let (dir, _document) = workspace(TWO_DIAGRAMS);

    cargo_bin()
        .current_dir(dir.path())
        .arg("doc.md")
        .arg("--config")
        .arg("absent.toml")
        .assert()
        .failure()
        .code(ExitCode::Io as i32)
        .stdout(predicate::str::contains("failed to load configuration"));
}

#[test]
fn help_exits_successfully() {
    cargo_bin()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--no-html-fallback"));
}
