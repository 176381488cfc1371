//! Locates fenced mermaid blocks in markdown text.
//!
//! Extraction is a single regular-expression pass: every
//! `` ```mermaid `` fence up to the next closing fence becomes one
//! [`DiagramBlock`], in document order, with its body preserved exactly.
//! Unterminated fences simply do not match.

mod document;
mod fence;

pub use document::{decode, Document, Encoding};
pub use fence::{DiagramBlock, DiagramBlocks, FenceMatcher, DEFAULT_LANGUAGE};
pub use regex::Error as FencePatternError;

use std::io::{self, BufReader, Read};
use std::path::Path;

pub fn extract_blocks(text: &str) -> Vec<DiagramBlock> {
    FenceMatcher::default().blocks(text).collect()
}

pub fn extract_from_path(path: &Path) -> io::Result<Vec<DiagramBlock>> {
    let document = Document::read(path)?;
    Ok(extract_blocks(&document.text))
}

pub fn extract_from_reader<R: Read>(reader: &mut BufReader<R>) -> io::Result<Vec<DiagramBlock>> {
    let document = Document::from_reader(reader)?;
    Ok(extract_blocks(&document.text))
}
