//! Settings for `mermaid-to-png`, read from `.mermaid-render.toml` files.
//!
//! Up to three files are consulted on top of the built-in values: one at the
//! repository root, one in the working directory and one named with
//! `--config`, each overriding the previous field by field.

use std::env;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

pub const CONFIG_FILE_NAME: &str = ".mermaid-render.toml";

pub const DEFAULT_LANGUAGE: &str = "mermaid";
pub const DEFAULT_SOURCE_EXTENSION: &str = "mmd";
pub const DEFAULT_DIRECTORY_SUFFIX: &str = "_diagrams";
pub const DEFAULT_THEME: &str = "default";
pub const DEFAULT_BACKGROUND: &str = "transparent";
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_PACKAGE: &str = "@mermaid-js/mermaid-cli";
pub const DEFAULT_COMMAND: &str = "mmdc";
pub const DEFAULT_MERMAID_SCRIPT_URL: &str =
    "https://cdn.jsdelivr.net/npm/mermaid@9.3.0/dist/mermaid.min.js";

/// Complete configuration resolved from defaults and on-disk overrides.
#[derive(Clone, Debug)]
pub struct Config {
    pub extract: ExtractSettings,
    pub output: OutputSettings,
    pub render: RenderSettings,
    pub runtime: RuntimeSettings,
    pub sources: ConfigSources,
}

/// How diagram blocks are recognised and stored.
#[derive(Clone, Debug)]
pub struct ExtractSettings {
    pub language: String,
    pub source_extension: String,
}

/// Where per-document artifact directories are created.
#[derive(Clone, Debug)]
pub struct OutputSettings {
    pub directory_suffix: String,
    /// Parent of the artifact directory; `None` means the process working directory.
    pub root: Option<PathBuf>,
}

/// Options passed to the external renderer.
#[derive(Clone, Debug)]
pub struct RenderSettings {
    pub theme: String,
    pub background: String,
    pub timeout: Duration,
    pub html_fallback: bool,
}

/// How the renderer executable is located.
#[derive(Clone, Debug)]
pub struct RuntimeSettings {
    pub package: String,
    pub command: String,
    pub renderer: Option<PathBuf>,
    pub bundled_dir: Option<PathBuf>,
    pub mermaid_script_url: String,
}

/// Every layer that contributed to a [`Config`], lowest precedence first.
#[derive(Clone, Debug)]
pub struct ConfigSources {
    pub working_directory: PathBuf,
    pub layers: Vec<ConfigSource>,
}

/// Where a setting came from. Relative paths in a file resolve against `base_dir`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ConfigSource {
    pub kind: ConfigSourceKind,
    pub path: Option<PathBuf>,
    pub base_dir: PathBuf,
}

impl ConfigSource {
    fn builtin(base_dir: PathBuf) -> Self {
        Self {
            kind: ConfigSourceKind::Default,
            path: None,
            base_dir,
        }
    }

    fn file(kind: ConfigSourceKind, path: PathBuf) -> Self {
        let base_dir = match path.parent() {
            Some(parent) => parent.to_path_buf(),
            None => PathBuf::from("."),
        };
        Self {
            kind,
            path: Some(path),
            base_dir,
        }
    }
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path {
            Some(path) => write!(f, "{} {}", self.kind, path.display()),
            None => write!(f, "{}", self.kind),
        }
    }
}

/// Ordered from lowest to highest precedence.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ConfigSourceKind {
    Default,
    GitRoot,
    Local,
    Override,
}

impl fmt::Display for ConfigSourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConfigSourceKind::Default => "built-in defaults",
            ConfigSourceKind::GitRoot => "repository settings",
            ConfigSourceKind::Local => "working-directory settings",
            ConfigSourceKind::Override => "--config file",
        })
    }
}

/// Where discovery starts and which file, if any, was named with `--config`.
#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub override_path: Option<PathBuf>,
    pub working_dir: Option<PathBuf>,
}

impl LoadOptions {
    pub fn with_override_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.override_path = Some(path.into());
        self
    }

    pub fn with_working_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(path.into());
        self
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot use {} as the working directory: {source}", .attempted.display())]
    WorkingDirectory {
        attempted: PathBuf,
        source: io::Error,
    },
    #[error("--config file {} does not exist", .path.display())]
    OverrideNotFound { path: PathBuf },
    #[error("cannot read {}: {source}", .path.display())]
    Io { path: PathBuf, source: io::Error },
    #[error("invalid TOML in {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid settings:\n{0}")]
    Validation(ConfigValidationErrors),
}

impl Config {
    /// Resolves the settings that apply when running from `options.working_dir`
    /// (the process working directory when unset).
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let working_dir = resolve_working_dir(options.working_dir)?;
        let explicit = options
            .override_path
            .map(|path| anchor(&path, &working_dir));
        if let Some(path) = explicit.as_ref().filter(|path| !path.exists()) {
            return Err(ConfigError::OverrideNotFound { path: path.clone() });
        }

        let builtin = ConfigSource::builtin(working_dir.clone());
        let mut merged = defaults_layer(builtin.clone());
        let mut layers = vec![builtin];

        for (kind, path) in settings_files(&working_dir, explicit.as_deref()) {
            let source = ConfigSource::file(kind, path);
            merged.merge(read_layer(&source)?);
            layers.push(source);
        }

        let resolved = merged.finalize().map_err(ConfigError::Validation)?;
        Ok(resolved.into_config(ConfigSources {
            working_directory: working_dir,
            layers,
        }))
    }

    /// The built-in values alone; no files are read.
    pub fn builtin(working_dir: impl Into<PathBuf>) -> Self {
        let working_dir = working_dir.into();
        let source = ConfigSource::builtin(working_dir.clone());
        let resolved = defaults_layer(source.clone())
            .finalize()
            .unwrap_or_else(|err| panic!("built-in mermaid-render defaults are invalid: {err}"));
        resolved.into_config(ConfigSources {
            working_directory: working_dir,
            layers: vec![source],
        })
    }
}

fn resolve_working_dir(requested: Option<PathBuf>) -> Result<PathBuf, ConfigError> {
    let attempted = match requested {
        Some(path) => path,
        None => env::current_dir().map_err(|source| ConfigError::WorkingDirectory {
            attempted: PathBuf::from("."),
            source,
        })?,
    };
    fs::canonicalize(&attempted)
        .map_err(|source| ConfigError::WorkingDirectory { attempted, source })
}

fn anchor(path: &Path, base: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Settings files that apply to `working_dir`, lowest precedence first. A file
/// reachable through more than one role is read once, in its strongest role.
fn settings_files(
    working_dir: &Path,
    explicit: Option<&Path>,
) -> Vec<(ConfigSourceKind, PathBuf)> {
    let local = working_dir.join(CONFIG_FILE_NAME);
    let repository = working_dir
        .ancestors()
        .find(|dir| dir.join(".git").exists())
        .map(|root| root.join(CONFIG_FILE_NAME));

    let mut files = Vec::new();
    if let Some(path) = repository {
        if path != local && Some(path.as_path()) != explicit && path.is_file() {
            files.push((ConfigSourceKind::GitRoot, path));
        }
    }
    if Some(local.as_path()) != explicit && local.is_file() {
        files.push((ConfigSourceKind::Local, local));
    }
    if let Some(path) = explicit {
        files.push((ConfigSourceKind::Override, path.to_path_buf()));
    }
    files
}

fn read_layer(source: &ConfigSource) -> Result<PartialConfig, ConfigError> {
    let path = source.path.clone().unwrap_or_default();
    let contents = fs::read_to_string(&path).map_err(|err| ConfigError::Io {
        path: path.clone(),
        source: err,
    })?;
    let raw: RawConfig =
        toml::from_str(&contents).map_err(|err| ConfigError::Parse { path, source: err })?;
    Ok(raw.into_partial(source.clone()))
}

fn defaults_layer(source: ConfigSource) -> PartialConfig {
    let located = |value| Some(Located::new(value, source.clone()));

    PartialConfig {
        language: located(Value::Text(DEFAULT_LANGUAGE.into())),
        source_extension: located(Value::Text(DEFAULT_SOURCE_EXTENSION.into())),
        directory_suffix: located(Value::Text(DEFAULT_DIRECTORY_SUFFIX.into())),
        output_root: None,
        theme: located(Value::Text(DEFAULT_THEME.into())),
        background: located(Value::Text(DEFAULT_BACKGROUND.into())),
        timeout_secs: located(Value::Number(DEFAULT_TIMEOUT_SECS)),
        html_fallback: located(Value::Flag(true)),
        package: located(Value::Text(DEFAULT_PACKAGE.into())),
        command: located(Value::Text(DEFAULT_COMMAND.into())),
        renderer: None,
        bundled_dir: None,
        mermaid_script_url: located(Value::Text(DEFAULT_MERMAID_SCRIPT_URL.into())),
    }
}

#[derive(Clone, Debug)]
enum Value {
    Text(String),
    Number(u64),
    Flag(bool),
    Path(PathBuf),
}

#[derive(Clone, Debug)]
struct Located<T> {
    value: T,
    source: ConfigSource,
}

impl<T> Located<T> {
    fn new(value: T, source: ConfigSource) -> Self {
        Located { value, source }
    }
}

/// One layer's worth of settings; unset fields defer to lower layers.
#[derive(Clone, Debug, Default)]
struct PartialConfig {
    language: Option<Located<Value>>,
    source_extension: Option<Located<Value>>,
    directory_suffix: Option<Located<Value>>,
    output_root: Option<Located<Value>>,
    theme: Option<Located<Value>>,
    background: Option<Located<Value>>,
    timeout_secs: Option<Located<Value>>,
    html_fallback: Option<Located<Value>>,
    package: Option<Located<Value>>,
    command: Option<Located<Value>>,
    renderer: Option<Located<Value>>,
    bundled_dir: Option<Located<Value>>,
    mermaid_script_url: Option<Located<Value>>,
}

impl PartialConfig {
    fn merge(&mut self, other: PartialConfig) {
        fn take(slot: &mut Option<Located<Value>>, other: Option<Located<Value>>) {
            if other.is_some() {
                *slot = other;
            }
        }

        take(&mut self.language, other.language);
        take(&mut self.source_extension, other.source_extension);
        take(&mut self.directory_suffix, other.directory_suffix);
        take(&mut self.output_root, other.output_root);
        take(&mut self.theme, other.theme);
        take(&mut self.background, other.background);
        take(&mut self.timeout_secs, other.timeout_secs);
        take(&mut self.html_fallback, other.html_fallback);
        take(&mut self.package, other.package);
        take(&mut self.command, other.command);
        take(&mut self.renderer, other.renderer);
        take(&mut self.bundled_dir, other.bundled_dir);
        take(&mut self.mermaid_script_url, other.mermaid_script_url);
    }

    fn finalize(self) -> Result<ResolvedConfig, ConfigValidationErrors> {
        let mut errors = Vec::new();

        let language = text(self.language, "extract.language", DEFAULT_LANGUAGE, &mut errors);
        check(&language, "extract.language", validate_language, &mut errors);

        let source_extension = text(
            self.source_extension,
            "extract.source_extension",
            DEFAULT_SOURCE_EXTENSION,
            &mut errors,
        );
        check(&source_extension, "extract.source_extension", validate_extension, &mut errors);

        let directory_suffix = text(
            self.directory_suffix,
            "output.directory_suffix",
            DEFAULT_DIRECTORY_SUFFIX,
            &mut errors,
        );
        check(&directory_suffix, "output.directory_suffix", validate_suffix, &mut errors);

        let theme = text(self.theme, "render.theme", DEFAULT_THEME, &mut errors);
        check(&theme, "render.theme", not_blank, &mut errors);

        let background = text(self.background, "render.background", DEFAULT_BACKGROUND, &mut errors);

        let timeout_secs = match self.timeout_secs {
            Some(Located {
                value: Value::Number(0),
                source,
            }) => {
                errors.push(invalid(
                    "render.timeout_secs",
                    &source,
                    "timeout must be at least one second",
                ));
                DEFAULT_TIMEOUT_SECS
            }
            Some(Located {
                value: Value::Number(secs),
                ..
            }) => secs,
            _ => DEFAULT_TIMEOUT_SECS,
        };

        let html_fallback = !matches!(
            self.html_fallback,
            Some(Located {
                value: Value::Flag(false),
                ..
            })
        );

        let package = text(self.package, "runtime.package", DEFAULT_PACKAGE, &mut errors);
        check(&package, "runtime.package", not_blank, &mut errors);

        let command = text(self.command, "runtime.command", DEFAULT_COMMAND, &mut errors);
        check(&command, "runtime.command", not_blank, &mut errors);

        let mermaid_script_url = text(
            self.mermaid_script_url,
            "runtime.mermaid_script_url",
            DEFAULT_MERMAID_SCRIPT_URL,
            &mut errors,
        );

        if !errors.is_empty() {
            return Err(ConfigValidationErrors(errors));
        }

        Ok(ResolvedConfig {
            extract: ExtractSettings {
                language: language.value,
                source_extension: source_extension.value,
            },
            output: OutputSettings {
                directory_suffix: directory_suffix.value,
                root: self.output_root.and_then(resolve_path),
            },
            render: RenderSettings {
                theme: theme.value,
                background: background.value,
                timeout: Duration::from_secs(timeout_secs),
                html_fallback,
            },
            runtime: RuntimeSettings {
                package: package.value,
                command: command.value,
                renderer: self.renderer.and_then(resolve_path),
                bundled_dir: self.bundled_dir.and_then(resolve_path),
                mermaid_script_url: mermaid_script_url.value,
            },
        })
    }
}

/// A string setting, or `fallback` when the layers never set it.
fn text(
    located: Option<Located<Value>>,
    key: &'static str,
    fallback: &str,
    errors: &mut Vec<ConfigValidationError>,
) -> Located<String> {
    match located {
        Some(Located {
            value: Value::Text(value),
            source,
        }) => Located::new(value, source),
        Some(Located { source, .. }) => {
            errors.push(invalid(key, &source, "expected a string"));
            Located::new(fallback.to_owned(), source)
        }
        None => Located::new(fallback.to_owned(), ConfigSource::builtin(PathBuf::from("."))),
    }
}

fn check(
    setting: &Located<String>,
    key: &'static str,
    rule: fn(&str) -> Option<String>,
    errors: &mut Vec<ConfigValidationError>,
) {
    if let Some(message) = rule(&setting.value) {
        errors.push(invalid(key, &setting.source, message));
    }
}

fn resolve_path(located: Located<Value>) -> Option<PathBuf> {
    match located.value {
        Value::Path(path) if path.is_absolute() => Some(path),
        Value::Path(path) => Some(located.source.base_dir.join(path)),
        _ => None,
    }
}

fn validate_language(language: &str) -> Option<String> {
    if language.is_empty() {
        return Some("must not be empty".into());
    }
    if language.chars().any(char::is_whitespace) || language.contains('`') {
        return Some(format!(
            "language tag '{language}' must not contain whitespace or backticks"
        ));
    }
    None
}

fn validate_extension(extension: &str) -> Option<String> {
    if extension.is_empty() {
        return Some("must not be empty".into());
    }
    if extension.starts_with('.') || extension.contains(['/', '\\']) {
        return Some(format!(
            "extension '{extension}' must be a bare extension such as 'mmd'"
        ));
    }
    None
}

fn validate_suffix(suffix: &str) -> Option<String> {
    suffix
        .contains(['/', '\\'])
        .then(|| format!("suffix '{suffix}' must not contain path separators"))
}

fn not_blank(value: &str) -> Option<String> {
    value.trim().is_empty().then(|| "must not be empty".to_owned())
}

#[derive(Clone, Debug)]
struct ResolvedConfig {
    extract: ExtractSettings,
    output: OutputSettings,
    render: RenderSettings,
    runtime: RuntimeSettings,
}

impl ResolvedConfig {
    fn into_config(self, sources: ConfigSources) -> Config {
        Config {
            extract: self.extract,
            output: self.output,
            render: self.render,
            runtime: self.runtime,
            sources,
        }
    }
}

/// Every problem found in the merged settings, one per line.
#[derive(Debug)]
pub struct ConfigValidationErrors(pub Vec<ConfigValidationError>);

impl ConfigValidationErrors {
    pub fn iter(&self) -> impl Iterator<Item = &ConfigValidationError> {
        self.0.iter()
    }
}

impl fmt::Display for ConfigValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lines: Vec<String> = self.0.iter().map(|err| format!("  {err}")).collect();
        f.write_str(&lines.join("\n"))
    }
}

/// A rejected setting, named by its `section.key`.
#[derive(Clone, Debug)]
pub struct ConfigValidationError {
    pub key: &'static str,
    pub message: String,
    pub source: ConfigSource,
}

fn invalid(
    key: &'static str,
    source: &ConfigSource,
    message: impl Into<String>,
) -> ConfigValidationError {
    ConfigValidationError {
        key,
        message: message.into(),
        source: source.clone(),
    }
}

impl fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} (from {})", self.key, self.message, self.source)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    extract: Option<RawExtract>,
    #[serde(default)]
    output: Option<RawOutput>,
    #[serde(default)]
    render: Option<RawRender>,
    #[serde(default)]
    runtime: Option<RawRuntime>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawExtract {
    language: Option<String>,
    source_extension: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawOutput {
    directory_suffix: Option<String>,
    root: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRender {
    theme: Option<String>,
    background: Option<String>,
    timeout_secs: Option<u64>,
    html_fallback: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRuntime {
    package: Option<String>,
    command: Option<String>,
    renderer: Option<PathBuf>,
    bundled_dir: Option<PathBuf>,
    mermaid_script_url: Option<String>,
}

impl RawConfig {
    fn into_partial(self, source: ConfigSource) -> PartialConfig {
        let at = |value: Option<Value>| value.map(|value| Located::new(value, source.clone()));
        let mut partial = PartialConfig::default();

        if let Some(extract) = self.extract {
            partial.language = at(extract.language.map(Value::Text));
            partial.source_extension = at(extract.source_extension.map(Value::Text));
        }

        if let Some(output) = self.output {
            partial.directory_suffix = at(output.directory_suffix.map(Value::Text));
            partial.output_root = at(output.root.map(Value::Path));
        }

        if let Some(render) = self.render {
            partial.theme = at(render.theme.map(Value::Text));
            partial.background = at(render.background.map(Value::Text));
            partial.timeout_secs = at(render.timeout_secs.map(Value::Number));
            partial.html_fallback = at(render.html_fallback.map(Value::Flag));
        }

        if let Some(runtime) = self.runtime {
            partial.package = at(runtime.package.map(Value::Text));
            partial.command = at(runtime.command.map(Value::Text));
            partial.renderer = at(runtime.renderer.map(Value::Path));
            partial.bundled_dir = at(runtime.bundled_dir.map(Value::Path));
            partial.mermaid_script_url = at(runtime.mermaid_script_url.map(Value::Text));
        }

        partial
    }
}
