use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use mermaid_render_config::{Config, ConfigError, ConfigSourceKind, LoadOptions};
use tempfile::TempDir;

fn write_file(path: impl AsRef<Path>, contents: &str) {
    let mut file = fs::File::create(path).expect("create config");
    file.write_all(contents.as_bytes()).expect("write config");
}

fn canonical(path: impl AsRef<Path>) -> PathBuf {
    fs::canonicalize(path).expect("canonicalize path")
}

#[test]
fn loads_defaults_when_no_files_present() {
    let temp = TempDir::new().expect("tempdir");
    let working_dir = canonical(temp.path());

    let config = Config::load(LoadOptions::default().with_working_dir(working_dir.clone()))
        .expect("load defaults");

    assert_eq!(config.extract.language, "mermaid");
    assert_eq!(config.render.timeout, Duration::from_secs(120));
    assert_eq!(config.sources.working_directory, working_dir);
    assert_eq!(config.sources.layers.len(), 1);
    assert_eq!(config.sources.layers[0].kind, ConfigSourceKind::Default);
}

#[test]
fn applies_precedence_and_merges_fields() {
    let temp = TempDir::new().expect("tempdir");
    let git_root = canonical(temp.path());
    fs::create_dir(git_root.join(".git")).expect("create .git");

    write_file(
        git_root.join(".mermaid-render.toml"),
        r#"
        [render]
        theme = "forest"
        timeout_secs = 30

        [runtime]
        bundled_dir = "vendor/nodejs"
        "#,
    );

    let workspace = git_root.join("workspace");
    fs::create_dir(&workspace).expect("create workspace");

    write_file(
        workspace.join(".mermaid-render.toml"),
        r#"
        [render]
        theme = "dark"

        [output]
        directory_suffix = "-images"
        root = "build"
        "#,
    );

    let override_path = workspace.join("override.toml");
    write_file(
        &override_path,
        r#"
        [render]
        html_fallback = false
        "#,
    );

    let config = Config::load(
        LoadOptions::default()
            .with_working_dir(&workspace)
            .with_override_path(&override_path),
    )
    .expect("load layered config");

    assert_eq!(config.render.theme, "dark");
    assert_eq!(config.render.timeout, Duration::from_secs(30));
    assert!(!config.render.html_fallback);
    assert_eq!(config.output.directory_suffix, "-images");
    assert_eq!(config.output.root, Some(workspace.join("build")));
    assert_eq!(
        config.runtime.bundled_dir,
        Some(git_root.join("vendor/nodejs"))
    );

    let kinds: Vec<_> = config.sources.layers.iter().map(|layer| layer.kind).collect();
    assert_eq!(
        kinds,
        vec![
            ConfigSourceKind::Default,
            ConfigSourceKind::GitRoot,
            ConfigSourceKind::Local,
            ConfigSourceKind::Override,
        ]
    );
}

#[test]
fn missing_override_is_reported() {
    let temp = TempDir::new().expect("tempdir");

    let err = Config::load(
        LoadOptions::default()
            .with_working_dir(temp.path())
            .with_override_path("missing.toml"),
    )
    .expect_err("override must exist");

    assert!(matches!(err, ConfigError::OverrideNotFound { .. }));
}

#[test]
fn unknown_keys_are_parse_errors() {
    let temp = TempDir::new().expect("tempdir");
    write_file(
        temp.path().join(".mermaid-render.toml"),
        r#"
        [render]
        colour = "blue"
        "#,
    );

    let err = Config::load(LoadOptions::default().with_working_dir(temp.path()))
        .expect_err("unknown key rejected");

    assert!(matches!(err, ConfigError::Parse { .. }), "got {err:?}");
}

#[test]
fn invalid_values_are_validation_errors() {
    let temp = TempDir::new().expect("tempdir");
    write_file(
        temp.path().join(".mermaid-render.toml"),
        r#"
        [extract]
        language = ""

        [runtime]
        package = " "
        "#,
    );

    let err = Config::load(LoadOptions::default().with_working_dir(temp.path()))
        .expect_err("validation fails");

    match err {
        ConfigError::Validation(errors) => {
            let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
            assert_eq!(messages.len(), 2, "{messages:?}");
            assert!(messages[0].starts_with("extract.language: must not be empty"));
            assert!(messages[1].starts_with("runtime.package: must not be empty"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}
