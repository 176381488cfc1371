use regex::{CaptureMatches, Regex, RegexBuilder};

pub const DEFAULT_LANGUAGE: &str = "mermaid";

/// A fenced diagram block, numbered from 1 in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagramBlock {
    pub index: usize,
    pub source: String,
    /// Byte offset of the opening fence.
    pub start: usize,
    /// Byte offset just past the closing fence.
    pub end: usize,
    /// 1-based line of the opening fence.
    pub line: usize,
}

/// Matches backtick fences carrying one language tag.
#[derive(Debug, Clone)]
pub struct FenceMatcher {
    language: String,
    regex: Regex,
}

impl FenceMatcher {
    pub fn new(language: &str) -> Result<Self, regex::Error> {
        let pattern = format!(r"```{}\s*\n(.*?)\n```", regex::escape(language));
        let regex = RegexBuilder::new(&pattern)
            .dot_matches_new_line(true)
            .size_limit(1024 * 100) // 100 kb
            .build()?;

        Ok(Self {
            language: language.to_string(),
            regex,
        })
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn blocks<'m, 't>(&'m self, text: &'t str) -> DiagramBlocks<'m, 't> {
        DiagramBlocks {
            text,
            captures: self.regex.captures_iter(text),
            next_index: 1,
            line: 1,
            scanned: 0,
        }
    }
}

impl Default for FenceMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_LANGUAGE).expect("default fence pattern compiles")
    }
}

/// Lazy iterator over the diagram blocks of one text.
pub struct DiagramBlocks<'m, 't> {
    text: &'t str,
    captures: CaptureMatches<'m, 't>,
    next_index: usize,
    line: usize,
    scanned: usize,
}

impl Iterator for DiagramBlocks<'_, '_> {
    type Item = DiagramBlock;

    fn next(&mut self) -> Option<Self::Item> {
        let captures = self.captures.next()?;
        let whole = captures.get(0)?;
        let body = captures.get(1)?;

        // Matches arrive in order, so line counting resumes where the last one stopped.
        self.line += count_newlines(&self.text[self.scanned..whole.start()]);
        let line = self.line;
        self.line += count_newlines(whole.as_str());
        self.scanned = whole.end();

        let block = DiagramBlock {
            index: self.next_index,
            source: body.as_str().to_string(),
            start: whole.start(),
            end: whole.end(),
            line,
        };
        self.next_index += 1;
        Some(block)
    }
}

fn count_newlines(text: &str) -> usize {
    text.bytes().filter(|&byte| byte == b'\n').count()
}
