use std::fmt::Write as _;

use quipmark_core::ThreadMeta;

/// Assembles the final Markdown document: front matter followed by the
/// converted body.
pub fn build_markdown_document(
    meta: &ThreadMeta,
    folder_path: Option<&str>,
    exported_at: u64,
    body_markdown: &str,
) -> String {
    let link = meta
        .link
        .clone()
        .unwrap_or_else(|| format!("https://quip.com/{}", meta.id));

    let mut doc = String::new();
    let _ = writeln!(doc, "---");
    let _ = writeln!(doc, "title: {}", meta.title);
    let _ = writeln!(doc, "thread_id: {}", meta.id);
    let _ = writeln!(doc, "quip_url: {link}");
    if let Some(usec) = meta.updated_usec {
        let _ = writeln!(doc, "updated_usec: {usec}");
    }
    let _ = writeln!(doc, "exported_at: {exported_at}");
    if let Some(path) = folder_path.filter(|p| !p.is_empty()) {
        let _ = writeln!(doc, "folder_path: {path}");
    }
    let _ = writeln!(doc, "---");
    let _ = writeln!(doc);
    doc.push_str(body_markdown);
    doc
}
