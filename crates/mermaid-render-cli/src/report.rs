use mermaid_render_core::{
    BlockOutcome, BlockReport, ConversionReport, Launcher, Progress, INSTALL_HINT,
};

use crate::output::Output;

/// Prints one line per stage of a conversion run.
pub(crate) struct Reporter<'a> {
    output: &'a Output,
}

impl<'a> Reporter<'a> {
    pub(crate) fn new(output: &'a Output) -> Self {
        Self { output }
    }
}

impl Progress for Reporter<'_> {
    fn on_blocks_found(&mut self, count: usize) {
        if count == 0 {
            self.output.info("No mermaid diagrams found in the file.");
        } else {
            self.output.info(&format!("Found {count} mermaid diagram(s)"));
        }
    }

    fn on_renderer(&mut self, launcher: Option<&Launcher>) {
        match launcher {
            Some(launcher) => self
                .output
                .success(&format!("✓ Using {}", launcher.describe())),
            None => self.output.error(&format!(
                "✗ Error: mermaid renderer not found. Please {INSTALL_HINT}"
            )),
        }
    }

    fn on_block(&mut self, report: &BlockReport) {
        let block = format!("Diagram {} (line {})", report.index, report.line);
        let source = report.source_path.display();
        match &report.outcome {
            BlockOutcome::Rendered { image } => self.output.success(&format!(
                "✓ {block}: converted {source} to {}",
                image.display()
            )),
            BlockOutcome::Degraded { document, cause } => self.output.warning(&format!(
                "⚠ {block}: {cause}; wrote browser preview {} instead",
                document.display()
            )),
            BlockOutcome::Failed(err) => self
                .output
                .error(&format!("✗ {block}: error converting {source}: {err}")),
        }
    }

    fn on_finished(&mut self, report: &ConversionReport) {
        let Some(output_dir) = &report.output_dir else {
            return;
        };
        self.output.blank();
        self.output.info(&format!(
            "Conversion complete: {} diagrams converted successfully",
            report.summary()
        ));
        self.output
            .info(&format!("Diagrams saved in: {}/", output_dir.display()));
    }
}
