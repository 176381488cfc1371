//! Coloured progress output on stdout.

use console::{Style, Term};

pub(crate) struct Output {
    term: Term,
    quiet: bool,
    green: Style,
    yellow: Style,
    red: Style,
    bold: Style,
}

impl Output {
    /// Progress lines are dropped when `quiet` is set; errors never are.
    pub(crate) fn new(quiet: bool) -> Self {
        Self {
            term: Term::stdout(),
            quiet,
            green: Style::new().green(),
            yellow: Style::new().yellow(),
            red: Style::new().red(),
            bold: Style::new().bold(),
        }
    }

    pub(crate) fn info(&self, msg: &str) {
        if !self.quiet {
            let _ = self.term.write_line(msg);
        }
    }

    pub(crate) fn success(&self, msg: &str) {
        if !self.quiet {
            let _ = self.term.write_line(&self.green.apply_to(msg).to_string());
        }
    }

    pub(crate) fn warning(&self, msg: &str) {
        if !self.quiet {
            let _ = self.term.write_line(&self.yellow.apply_to(msg).to_string());
        }
    }

    /// Printed even in quiet mode.
    pub(crate) fn plain(&self, msg: &str) {
        let _ = self.term.write_line(msg);
    }

    pub(crate) fn error(&self, msg: &str) {
        let _ = self.term.write_line(&self.red.apply_to(msg).to_string());
    }

    pub(crate) fn banner(&self, title: &str) {
        if !self.quiet {
            let _ = self.term.write_line(&self.bold.apply_to(title).to_string());
            let _ = self.term.write_line(&"=".repeat(50));
        }
    }

    pub(crate) fn blank(&self) {
        if !self.quiet {
            let _ = self.term.write_line("");
        }
    }
}
