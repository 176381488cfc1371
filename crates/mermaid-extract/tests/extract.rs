use mermaid_extract::{extract_from_path, extract_from_reader, Document, Encoding, FenceMatcher};
use pretty_assertions::assert_eq;
use std::io::BufReader;
use std::path::PathBuf;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from("tests/markdown").join(name)
}

#[test]
fn should_extract_blocks_in_document_order() {
    // Given
    let path = fixture("two_diagrams.md");

    // When
    let blocks = extract_from_path(&path).unwrap();

    // Then
    assert_eq!(blocks.len(), 2);
    assert_eq!(blocks[0].index, 1);
    assert_eq!(blocks[0].source, "graph TD; A-->B");
    assert_eq!(blocks[1].index, 2);
    assert_eq!(blocks[1].source, "sequenceDiagram Alice->>Bob: Hi");
}

#[test]
fn should_preserve_block_content_exactly() {
    // Given
    let path = fixture("multiline.md");

    // When
    let blocks = extract_from_path(&path).unwrap();

    // Then
    assert_eq!(blocks.len(), 1);
    assert_eq!(
        blocks[0].source,
        "flowchart LR\n    start([Start]) --> check{Valid?}\n\n    check -->|yes| done([Done])\n    check -->|no| start"
    );
    assert!(!blocks[0].source.contains("```"));
}

#[test]
fn should_return_empty_when_no_diagrams() {
    let blocks = extract_from_path(&fixture("no_diagrams.md")).unwrap();
    assert!(blocks.is_empty());
}

#[test]
fn should_skip_unterminated_block() {
    let blocks = extract_from_path(&fixture("unterminated.md")).unwrap();

    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].source, "graph TD; A-->B");
}

#[test]
fn should_not_merge_adjacent_blocks() {
    let text = "```mermaid\ngraph TD\n```\n```mermaid\ngraph LR\n```\n";
    let mut reader = BufReader::new(text.as_bytes());

    let blocks = extract_from_reader(&mut reader).unwrap();

    assert_eq!(blocks.len(), 2);
    assert_eq!(blocks[0].source, "graph TD");
    assert_eq!(blocks[1].source, "graph LR");
}

#[test]
fn should_recover_from_invalid_utf8() {
    // Given
    let path = fixture("latin1.md");

    // When
    let document = Document::read(&path).unwrap();
    let blocks: Vec<_> = FenceMatcher::default().blocks(&document.text).collect();

    // Then
    assert_eq!(document.encoding, Encoding::Latin1);
    assert_eq!(document.path.as_deref(), Some(path.as_path()));
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].source, "graph TD; Café-->Bar");
}

#[test]
fn should_keep_carriage_returns_inside_body() {
    let text = "```mermaid\r\ngraph TD\r\n  A-->B\r\n```\r\n";
    let blocks: Vec<_> = FenceMatcher::default().blocks(text).collect();

    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].source, "graph TD\r\n  A-->B\r");
}

#[test]
fn should_match_custom_language_tag() {
    let text = "```plantuml\n@startuml\n@enduml\n```\n```mermaid\npie\n```\n";
    let matcher = FenceMatcher::new("plantuml").unwrap();

    let blocks: Vec<_> = matcher.blocks(text).collect();

    assert_eq!(matcher.language(), "plantuml");
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].source, "@startuml\n@enduml");
}
