use std::path::{Path, PathBuf};
use std::time::Instant;

use mermaid_extract::DiagramBlock;
use mermaid_render_config::Config;
use tracing::{info, warn};

use crate::error::RenderError;
use crate::fallback::write_fallback;
use crate::fs::write_atomic;
use crate::invoke::RunOutput;
use crate::platform::Launcher;

/// Terminal state of one diagram.
#[derive(Debug)]
pub enum BlockOutcome {
    /// The renderer produced the requested PNG.
    Rendered { image: PathBuf },
    /// No renderer could be launched; a browser-renderable page was written instead.
    Degraded { document: PathBuf, cause: RenderError },
    Failed(RenderError),
}

impl BlockOutcome {
    /// Rendered or degraded: an artifact exists for the block.
    pub fn is_success(&self) -> bool {
        !matches!(self, BlockOutcome::Failed(_))
    }

    pub fn is_rendered(&self) -> bool {
        matches!(self, BlockOutcome::Rendered { .. })
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, BlockOutcome::Degraded { .. })
    }

    pub fn artifact(&self) -> Option<&Path> {
        match self {
            BlockOutcome::Rendered { image } => Some(image),
            BlockOutcome::Degraded { document, .. } => Some(document),
            BlockOutcome::Failed(_) => None,
        }
    }
}

#[derive(Debug)]
pub struct BlockReport {
    pub index: usize,
    pub line: usize,
    pub source_path: PathBuf,
    pub outcome: BlockOutcome,
}

#[derive(Debug)]
pub struct ConversionReport {
    pub document: PathBuf,
    /// `None` when the document held no diagrams and nothing was written.
    pub output_dir: Option<PathBuf>,
    pub blocks: Vec<BlockReport>,
}

impl ConversionReport {
    pub fn total(&self) -> usize {
        self.blocks.len()
    }

    pub fn succeeded(&self) -> usize {
        self.count(BlockOutcome::is_success)
    }

    pub fn rendered(&self) -> usize {
        self.count(BlockOutcome::is_rendered)
    }

    pub fn degraded(&self) -> usize {
        self.count(BlockOutcome::is_degraded)
    }

    pub fn failed(&self) -> usize {
        self.total() - self.succeeded()
    }

    /// `"{succeeded}/{total}"`.
    pub fn summary(&self) -> String {
        format!("{}/{}", self.succeeded(), self.total())
    }

    fn count(&self, predicate: fn(&BlockOutcome) -> bool) -> usize {
        self.blocks
            .iter()
            .filter(|block| predicate(&block.outcome))
            .count()
    }
}

/// Observer for progress reporting while a run is underway.
pub trait Progress {
    fn on_blocks_found(&mut self, _count: usize) {}
    fn on_renderer(&mut self, _launcher: Option<&Launcher>) {}
    fn on_block(&mut self, _report: &BlockReport) {}
    fn on_finished(&mut self, _report: &ConversionReport) {}
}

pub struct NoProgress;

impl Progress for NoProgress {}

pub struct Dispatcher<'a> {
    config: &'a Config,
    launcher: Option<&'a Launcher>,
    output_dir: &'a Path,
}

impl<'a> Dispatcher<'a> {
    /// `launcher` is `None` when no renderer runtime could be located.
    pub fn new(config: &'a Config, launcher: Option<&'a Launcher>, output_dir: &'a Path) -> Self {
        Self {
            config,
            launcher,
            output_dir,
        }
    }

    pub fn source_path(&self, index: usize) -> PathBuf {
        self.output_dir.join(format!(
            "diagram_{index}.{}",
            self.config.extract.source_extension
        ))
    }

    pub fn image_path(&self, index: usize) -> PathBuf {
        self.output_dir.join(format!("diagram_{index}.png"))
    }

    /// Processes every block in order; one block's failure never stops the rest.
    pub fn dispatch<I>(&self, blocks: I, progress: &mut dyn Progress) -> Vec<BlockReport>
    where
        I: IntoIterator<Item = DiagramBlock>,
    {
        blocks
            .into_iter()
            .map(|block| {
                let report = self.dispatch_block(&block);
                progress.on_block(&report);
                report
            })
            .collect()
    }

    pub fn dispatch_block(&self, block: &DiagramBlock) -> BlockReport {
        let started_at = Instant::now();
        let source_path = self.source_path(block.index);

        let outcome = match write_atomic(&source_path, &block.source) {
            Ok(()) => self.render(block, &source_path),
            Err(err) => BlockOutcome::Failed(RenderError::Io(err)),
        };

        let elapsed_ms = started_at.elapsed().as_millis() as u64;
        match &outcome {
            BlockOutcome::Rendered { image } => info!(
                op = "dispatch::block",
                index = block.index,
                result = "rendered",
                elapsed_ms,
                image = %image.display(),
                "diagram rendered"
            ),
            BlockOutcome::Degraded { document, cause } => warn!(
                op = "dispatch::block",
                index = block.index,
                result = "degraded",
                elapsed_ms,
                document = %document.display(),
                cause = %cause,
                "renderer unavailable; wrote browser fallback"
            ),
            BlockOutcome::Failed(err) => warn!(
                op = "dispatch::block",
                index = block.index,
                result = "failed",
                elapsed_ms,
                error = %err,
                "diagram conversion failed"
            ),
        }

        BlockReport {
            index: block.index,
            line: block.line,
            source_path,
            outcome,
        }
    }

    fn render(&self, block: &DiagramBlock, source_path: &Path) -> BlockOutcome {
        let Some(launcher) = self.launcher else {
            return BlockOutcome::Failed(RenderError::runtime_unavailable());
        };

        let render = &self.config.render;
        let image = self.image_path(block.index);
        let mut spawn_error = None;

        for invocation in launcher.invocations(&self.config.runtime, render, source_path, &image) {
            match invocation.run(render.timeout) {
                Ok(RunOutput::Exited { status, .. }) if status.success() => {
                    return BlockOutcome::Rendered { image };
                }
                Ok(RunOutput::Exited { status, stderr, .. }) => {
                    return BlockOutcome::Failed(RenderError::NonZeroExit {
                        code: status.code(),
                        stderr,
                    });
                }
                Ok(RunOutput::TimedOut) => {
                    return BlockOutcome::Failed(RenderError::Timeout(render.timeout));
                }
                Err(source) => {
                    warn!(
                        op = "dispatch::render",
                        index = block.index,
                        label = invocation.label,
                        program = %invocation.program.display(),
                        error = %source,
                        "failed to launch renderer"
                    );
                    spawn_error = Some(RenderError::Spawn {
                        program: invocation.program_name(),
                        source,
                    });
                }
            }
        }

        let cause = spawn_error.unwrap_or_else(RenderError::runtime_unavailable);
        if !render.html_fallback {
            return BlockOutcome::Failed(cause);
        }

        match write_fallback(
            source_path,
            &block.source,
            &self.config.runtime.mermaid_script_url,
        ) {
            Ok(document) => BlockOutcome::Degraded { document, cause },
            Err(err) => {
                warn!(
                    op = "dispatch::render",
                    index = block.index,
                    cause = %cause,
                    error = %err,
                    "browser fallback could not be written"
                );
                BlockOutcome::Failed(RenderError::Io(err))
            }
        }
    }
}
