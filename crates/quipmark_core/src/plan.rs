use std::collections::HashMap;

use crate::filename::{disambiguated_filename, markdown_filename, sanitize_component};
use crate::types::{PlannedDoc, WalkedDoc};

/// Assigns a target path to every walked document.
///
/// With `keep_structure` the path mirrors the folder-name chain; otherwise
/// every document lands directly in the output root. Two documents whose
/// titles sanitize to the same filename within one directory both receive
/// the thread-id suffix, so the assignment does not depend on input order.
/// Comparison is case-insensitive to stay stable on case-folding
/// filesystems.
pub fn assign_paths(docs: Vec<WalkedDoc>, keep_structure: bool) -> Vec<PlannedDoc> {
    let mut collisions: HashMap<(String, String), usize> = HashMap::new();
    let keyed: Vec<(String, String)> = docs
        .iter()
        .map(|doc| {
            let dir = target_dir(doc, keep_structure);
            let name = sanitize_component(&doc.meta.title).to_lowercase();
            let key = (dir.to_lowercase(), name);
            *collisions.entry(key.clone()).or_insert(0) += 1;
            key
        })
        .collect();

    docs.into_iter()
        .zip(keyed)
        .map(|(doc, key)| {
            let dir = target_dir(&doc, keep_structure);
            let filename = if collisions[&key] > 1 {
                disambiguated_filename(&doc.meta.title, &doc.meta.id)
            } else {
                markdown_filename(&doc.meta.title)
            };
            let rel_path = if dir.is_empty() {
                filename
            } else {
                format!("{dir}/{filename}")
            };
            PlannedDoc { doc, rel_path }
        })
        .collect()
}

fn target_dir(doc: &WalkedDoc, keep_structure: bool) -> String {
    if !keep_structure {
        return String::new();
    }
    doc.dir
        .iter()
        .map(|name| sanitize_component(name))
        .collect::<Vec<_>>()
        .join("/")
}
