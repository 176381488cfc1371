//! `mermaid-to-png`: renders every mermaid block of a markdown file to PNG.

mod output;
mod report;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::Parser;
use mermaid_render_config::{Config, LoadOptions};
use mermaid_render_core::platform;
use mermaid_render_core::{
    convert_document, validate_input, ConvertError, ConvertRequest, ExitCode,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

use output::Output;
use report::Reporter;

const BANNER: &str = "Mermaid to PNG Converter";
const USAGE: &str = "Usage: mermaid-to-png <markdown_file.md>";
const EXAMPLE: &str = "Example: mermaid-to-png example_document.md";

#[derive(Parser, Debug)]
#[command(
    name = "mermaid-to-png",
    author,
    version,
    about = "Convert mermaid diagrams in a markdown file to PNG images",
    long_about = None
)]
struct Cli {
    /// Markdown file to scan (must end in .md)
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Load configuration from this file instead of discovering .mermaid-render.toml
    #[arg(long = "config", value_name = "PATH")]
    config: Option<PathBuf>,

    /// Parent directory for the `<stem>_diagrams` output directory
    #[arg(long = "out-dir", value_name = "DIR")]
    out_dir: Option<PathBuf>,

    /// Seconds to wait for each diagram before giving up
    #[arg(long = "timeout", value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
    timeout: Option<u64>,

    /// Renderer theme (default, dark, forest, neutral)
    #[arg(long = "theme", value_name = "NAME")]
    theme: Option<String>,

    /// Renderer executable to invoke directly, bypassing discovery
    #[arg(long = "renderer", value_name = "PATH")]
    renderer: Option<PathBuf>,

    /// Mark diagrams as failed instead of writing an HTML preview when no renderer can start
    #[arg(long = "no-html-fallback")]
    no_html_fallback: bool,

    /// Emit info-level logs on stderr
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,

    /// Suppress progress output
    #[arg(short = 'q', long = "quiet")]
    quiet: bool,
}

fn main() -> std::process::ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            err.exit()
        }
        Err(err) => {
            let _ = err.print();
            let output = Output::new(false);
            output.plain(USAGE);
            output.plain(EXAMPLE);
            return exit(ExitCode::Usage);
        }
    };

    init_tracing(cli.verbose);
    let output = Output::new(cli.quiet);

    match run(&cli, &output) {
        Ok(code) => exit(code),
        Err(err) => {
            output.error(&format!("Error: {err:#}"));
            exit(ExitCode::Io)
        }
    }
}

fn exit(code: ExitCode) -> std::process::ExitCode {
    std::process::ExitCode::from(code as u8)
}

// --verbose forces info; otherwise RUST_LOG, falling back to warn.
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: &Cli, output: &Output) -> Result<ExitCode> {
    output.banner(BANNER);

    if let Err(err) = validate_input(&cli.file) {
        output.error(&format!("Error: {err}"));
        return Ok(ExitCode::Usage);
    }

    let config = load_config(cli)?;
    output.info(&format!("Processing: {}", cli.file.display()));

    let request = ConvertRequest {
        document: cli.file.clone(),
        config,
    };
    let resolver = platform::current();
    let mut reporter = Reporter::new(output);

    match convert_document(&request, resolver.as_ref(), &mut reporter) {
        Ok(report) => {
            info!(
                op = "cli::run",
                summary = %report.summary(),
                failed = report.failed(),
                "run finished"
            );
            Ok(ExitCode::Success)
        }
        Err(ConvertError::Usage(err)) => {
            output.error(&format!("Error: {err}"));
            Ok(ExitCode::Usage)
        }
        Err(err) => Err(err).with_context(|| format!("failed to convert {}", cli.file.display())),
    }
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut options = LoadOptions::default();
    if let Some(path) = &cli.config {
        options = options.with_override_path(path);
    }
    let mut config = Config::load(options).context("failed to load configuration")?;

    if let Some(dir) = &cli.out_dir {
        config.output.root = Some(dir.clone());
    }
    if let Some(secs) = cli.timeout {
        config.render.timeout = Duration::from_secs(secs);
    }
    if let Some(theme) = &cli.theme {
        config.render.theme = theme.clone();
    }
    if let Some(renderer) = &cli.renderer {
        config.runtime.renderer = Some(renderer.clone());
    }
    if cli.no_html_fallback {
        config.render.html_fallback = false;
    }

    info!(
        op = "cli::config",
        layers = config.sources.layers.len(),
        timeout_secs = config.render.timeout.as_secs(),
        "configuration resolved"
    );
    Ok(config)
}
