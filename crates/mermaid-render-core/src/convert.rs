use std::fs;
use std::path::{Path, PathBuf};

use mermaid_extract::{Document, FenceMatcher};
use mermaid_render_config::Config;
use tracing::{info, warn};

use crate::dispatch::{ConversionReport, Dispatcher, Progress};
use crate::error::{ConvertError, UsageError};
use crate::platform::PlatformResolver;

const MARKDOWN_SUFFIX: &str = ".md";

#[derive(Debug, Clone)]
pub struct ConvertRequest {
    pub document: PathBuf,
    pub config: Config,
}

/// Rejects anything but an existing `.md` file. The extension is checked
/// first so a wrong name never touches the filesystem.
pub fn validate_input(path: &Path) -> Result<(), UsageError> {
    if !path.to_string_lossy().ends_with(MARKDOWN_SUFFIX) {
        return Err(UsageError::WrongExtension(path.to_path_buf()));
    }
    if !path.is_file() {
        return Err(UsageError::NotFound(path.to_path_buf()));
    }
    Ok(())
}

/// `{root}/{stem}{suffix}`, relative to the working directory unless a root is configured.
pub fn output_dir_for(document: &Path, config: &Config) -> PathBuf {
    let stem = document
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = format!("{stem}{}", config.output.directory_suffix);
    match &config.output.root {
        Some(root) => root.join(name),
        None => PathBuf::from(name),
    }
}

/// Extracts every diagram from the document and renders each in turn.
///
/// Only usage and setup failures are returned as errors; per-diagram
/// failures are recorded in the report. Any bundled runtime acquired for the
/// run is released before this returns.
pub fn convert_document(
    request: &ConvertRequest,
    resolver: &dyn PlatformResolver,
    progress: &mut dyn Progress,
) -> Result<ConversionReport, ConvertError> {
    let config = &request.config;
    validate_input(&request.document)?;

    let matcher =
        FenceMatcher::new(&config.extract.language).map_err(|source| ConvertError::Pattern {
            language: config.extract.language.clone(),
            source,
        })?;

    let document =
        Document::read(&request.document).map_err(|source| ConvertError::ReadDocument {
            path: request.document.clone(),
            source,
        })?;
    let blocks: Vec<_> = matcher.blocks(&document.text).collect();

    info!(
        op = "convert::document",
        document = %request.document.display(),
        encoding = ?document.encoding,
        blocks = blocks.len(),
        "extracted diagram blocks"
    );
    progress.on_blocks_found(blocks.len());

    if blocks.is_empty() {
        let report = ConversionReport {
            document: request.document.clone(),
            output_dir: None,
            blocks: Vec::new(),
        };
        progress.on_finished(&report);
        return Ok(report);
    }

    let output_dir = output_dir_for(&request.document, config);
    fs::create_dir_all(&output_dir).map_err(|source| ConvertError::CreateOutputDir {
        path: output_dir.clone(),
        source,
    })?;

    let launcher = match resolver.locate_renderer(&config.runtime) {
        Ok(launcher) => {
            info!(op = "convert::document", launcher = %launcher.describe(), "renderer located");
            Some(launcher)
        }
        Err(err) => {
            warn!(op = "convert::document", error = %err, "renderer unavailable");
            None
        }
    };
    progress.on_renderer(launcher.as_ref());

    let dispatcher = Dispatcher::new(config, launcher.as_ref(), &output_dir);
    let reports = dispatcher.dispatch(blocks, progress);

    let report = ConversionReport {
        document: request.document.clone(),
        output_dir: Some(output_dir),
        blocks: reports,
    };

    info!(
        op = "convert::document",
        rendered = report.rendered(),
        degraded = report.degraded(),
        failed = report.failed(),
        summary = %report.summary(),
        "conversion finished"
    );
    progress.on_finished(&report);
    Ok(report)
}
