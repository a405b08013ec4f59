use std::fmt::Write as _;

use ego_tree::NodeRef;
use scraper::node::Node;
use scraper::{ElementRef, Html};

/// Rebuilds a thread's HTML for conversion: scripting and presentation-only
/// sections are dropped, `span` wrappers are unwrapped, and images become a
/// textual placeholder since attachment download is out of scope.
pub fn sanitize_html(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut out = String::with_capacity(html.len());
    for child in document.root_element().children() {
        visit_node(child, &mut out);
    }
    out
}

fn visit_node(node: NodeRef<'_, Node>, out: &mut String) {
    match node.value() {
        Node::Text(text) => push_escaped_text(out, text),
        Node::Element(_) => {
            if let Some(element) = ElementRef::wrap(node) {
                visit_element(element, out);
            }
        }
        _ => {
            for child in node.children() {
                visit_node(child, out);
            }
        }
    }
}

fn visit_element(element: ElementRef, out: &mut String) {
    let tag = element.value().name().to_ascii_lowercase();
    match tag.as_str() {
        "script" | "style" | "noscript" | "iframe" | "template" | "head" => {
            // skip scripting and presentation-only sections
        }
        // The parser wraps fragments in a full document; unwrap the shell.
        "html" | "body" => visit_children(element, out),
        "img" => {
            out.push_str("<em>");
            push_escaped_text(out, &image_placeholder(element));
            out.push_str("</em>");
        }
        "span" => visit_children(element, out),
        _ => {
            out.push('<');
            out.push_str(&tag);
            for (name, value) in element.value().attrs() {
                let _ = write!(out, " {}=\"{}\"", name, escape_attribute(value));
            }
            if is_void(&tag) {
                out.push_str("/>");
            } else {
                out.push('>');
                visit_children(element, out);
                let _ = write!(out, "</{tag}>");
            }
        }
    }
}

fn visit_children(element: ElementRef, out: &mut String) {
    for child in element.children() {
        visit_node(child, out);
    }
}

/// Placeholder label for an image that will not be downloaded.
fn image_placeholder(element: ElementRef) -> String {
    let alt = element
        .value()
        .attr("alt")
        .map(str::trim)
        .filter(|alt| !alt.is_empty());
    if let Some(alt) = alt {
        return format!("[image: {alt}]");
    }
    match element.value().attr("src").map(str::trim) {
        Some(src) if src.starts_with("data:") => "[embedded image]".to_string(),
        Some(src) if !src.is_empty() => match filename_from_src(src) {
            Some(name) => format!("[image: {name}]"),
            None => "[image]".to_string(),
        },
        _ => "[image]".to_string(),
    }
}

/// Last path segment of an image source, without query or fragment.
fn filename_from_src(src: &str) -> Option<String> {
    let path = src.split(['?', '#']).next().unwrap_or(src);
    let base = path.rsplit('/').next().unwrap_or(path).trim();
    if base.is_empty() {
        None
    } else {
        Some(base.to_string())
    }
}

fn push_escaped_text(out: &mut String, text: &str) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
}

fn escape_attribute(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

fn is_void(tag: &str) -> bool {
    matches!(
        tag,
        "area"
            | "base"
            | "br"
            | "col"
            | "embed"
            | "hr"
            | "input"
            | "link"
            | "meta"
            | "source"
            | "track"
            | "wbr"
    )
}
