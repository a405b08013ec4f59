const MAX_COMPONENT_LEN: usize = 120;

/// Windows-safe path component derived from a folder or document title.
///
/// Forbidden characters become `_`, runs of `_` collapse, leading and
/// trailing `_`, spaces, and dots are trimmed, and reserved device names
/// are patched. An empty result falls back to `untitled`.
pub fn sanitize_component(input: &str) -> String {
    let cleaned: String = input
        .chars()
        .map(|c| if is_forbidden(c) { '_' } else { c })
        .collect();
    let cleaned = cleaned.trim_matches(&['_', ' ', '.'][..]).to_string();
    if cleaned.is_empty() {
        return "untitled".to_string();
    }

    let mut compacted = String::with_capacity(cleaned.len());
    let mut prev_underscore = false;
    for c in cleaned.chars() {
        if c == '_' {
            if !prev_underscore {
                compacted.push(c);
            }
            prev_underscore = true;
        } else {
            compacted.push(c);
            prev_underscore = false;
        }
    }

    let mut final_name = compacted;
    if final_name.len() > MAX_COMPONENT_LEN {
        let cut = (1..=MAX_COMPONENT_LEN)
            .rev()
            .find(|&i| final_name.is_char_boundary(i))
            .unwrap_or(0);
        final_name.truncate(cut);
        final_name = final_name.trim_end_matches([' ', '.', '_']).to_string();
        if final_name.is_empty() {
            final_name = "untitled".to_string();
        }
    }
    if is_reserved_windows_name(&final_name) {
        final_name.push('_');
    }
    final_name
}

/// Default output filename for a document title.
pub fn markdown_filename(title: &str) -> String {
    format!("{}.md", sanitize_component(title))
}

/// Collision-proof filename carrying the thread identifier.
pub fn disambiguated_filename(title: &str, id: &str) -> String {
    format!("{} - {}.md", sanitize_component(title), id)
}

fn is_forbidden(c: char) -> bool {
    matches!(c,
        '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '\0'..='\u{1F}'
    )
}

fn is_reserved_windows_name(name: &str) -> bool {
    const RESERVED: &[&str] = &[
        "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
        "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
    ];
    RESERVED.iter().any(|r| r.eq_ignore_ascii_case(name))
}
