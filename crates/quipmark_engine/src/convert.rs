use crate::sanitize::sanitize_html;

/// HTML body to Markdown text. Pure and stateless: unsupported content
/// degrades to placeholders or plain text, never an error.
pub trait Converter: Send + Sync {
    fn to_markdown(&self, html: &str) -> String;
}

/// html2md-backed converter with a sanitize pass and whitespace cleanup.
#[derive(Debug, Default, Clone, Copy)]
pub struct Html2MdConverter;

impl Converter for Html2MdConverter {
    fn to_markdown(&self, html: &str) -> String {
        let sanitized = sanitize_html(html);
        let markdown = html2md::parse_html(&sanitized);
        collapse_blank_lines(&markdown)
    }
}

/// Collapses runs of three or more newlines down to one blank line and
/// ends the text with exactly one newline.
fn collapse_blank_lines(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut newlines = 0usize;
    for ch in text.chars() {
        if ch == '\n' {
            newlines += 1;
            if newlines <= 2 {
                out.push(ch);
            }
        } else {
            newlines = 0;
            out.push(ch);
        }
    }
    let mut out = out.trim_end().to_string();
    out.push('\n');
    out
}
