use std::path::{Path, PathBuf};

use html_escape::{encode_double_quoted_attribute, encode_safe};

use crate::fs::write_atomic;

/// Path of the browser-renderable substitute for a diagram source file.
pub fn fallback_path(source_path: &Path) -> PathBuf {
    let mut name = source_path.as_os_str().to_os_string();
    name.push(".html");
    PathBuf::from(name)
}

/// Writes a minimal page that renders `source` client-side with mermaid.js.
pub fn write_fallback(
    source_path: &Path,
    source: &str,
    script_url: &str,
) -> std::io::Result<PathBuf> {
    let path = fallback_path(source_path);
    write_atomic(&path, &fallback_document(source, script_url))?;
    Ok(path)
}

pub fn fallback_document(source: &str, script_url: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<script src="{script}"></script>
<style>body {{ margin: 0; }}</style>
</head>
<body>
<pre class="mermaid">
{diagram}
</pre>
<script>mermaid.initialize({{ startOnLoad: true }});</script>
</body>
</html>
"#,
        script = encode_double_quoted_attribute(script_url),
        diagram = encode_safe(source),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_html_to_source_name() {
        assert_eq!(
            fallback_path(Path::new("doc_diagrams/diagram_3.mmd")),
            PathBuf::from("doc_diagrams/diagram_3.mmd.html")
        );
    }

    #[test]
    fn escapes_diagram_text() {
        let html = fallback_document("graph TD; A-->B<br>\"q\"", "https://cdn.example/mermaid.js");

        assert!(html.contains("graph TD; A--&gt;B&lt;br&gt;&quot;q&quot;"));
        assert!(html.contains(r#"<script src="https://cdn.example/mermaid.js"></script>"#));
        assert!(html.contains("mermaid.initialize({ startOnLoad: true });"));
    }

    #[test]
    fn quotes_cannot_escape_the_script_attribute() {
        let html = fallback_document("pie", "https://cdn.example/m.js\" onload=\"x");

        assert!(html.contains(r#"src="https://cdn.example/m.js&quot; onload=&quot;x""#));
    }
}
