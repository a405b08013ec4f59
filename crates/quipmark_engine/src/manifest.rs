use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

use export_logging::export_warn;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::persist::{AtomicDocWriter, PersistError};

/// Default manifest filename inside the output root.
pub const MANIFEST_FILENAME: &str = ".quipmark_manifest.json";

/// Change-tracking record for one exported document.
///
/// Invariant: the recorded path holds content fully written from the state
/// described by the change key (`updated_usec`, or `content_sha256` for
/// threads the service reports no timestamp for).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub title: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_usec: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_sha256: Option<String>,
    pub exported_at: u64,
}

/// Persisted mapping from thread id to last-exported state.
///
/// Entries live in a `BTreeMap` so the serialized form has a stable key
/// order run over run.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest {
    entries: BTreeMap<String, ManifestEntry>,
}

impl Manifest {
    /// Loads the manifest at `path`. An absent or unparsable file yields an
    /// empty store: a damaged manifest degrades to a full re-export, never
    /// a failed run.
    pub fn load_or_create(path: &Path) -> Self {
        let content = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Self::default();
            }
            Err(err) => {
                export_warn!("Failed to read manifest {:?}: {}", path, err);
                return Self::default();
            }
        };
        match serde_json::from_str(&content) {
            Ok(manifest) => manifest,
            Err(err) => {
                export_warn!("Failed to parse manifest {:?}: {}", path, err);
                Self::default()
            }
        }
    }

    pub fn get(&self, thread_id: &str) -> Option<&ManifestEntry> {
        self.entries.get(thread_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether a document must be exported again: unknown id, a changed
    /// output path (move or rename), or a remote timestamp strictly newer
    /// than the recorded one. A document without a remote timestamp always
    /// needs the fetch; `matches_content` gives it a second chance to skip.
    pub fn needs_export(
        &self,
        thread_id: &str,
        remote_usec: Option<u64>,
        target_path: &str,
    ) -> bool {
        let Some(entry) = self.entries.get(thread_id) else {
            return true;
        };
        if entry.path != target_path {
            return true;
        }
        match (entry.updated_usec, remote_usec) {
            (Some(stored), Some(remote)) => remote > stored,
            _ => true,
        }
    }

    /// True when fetched content hashes to the recorded key at the recorded
    /// path: the skip condition for timestamp-less documents.
    pub fn matches_content(&self, thread_id: &str, target_path: &str, sha: &str) -> bool {
        self.entries
            .get(thread_id)
            .is_some_and(|e| e.path == target_path && e.content_sha256.as_deref() == Some(sha))
    }

    /// Upserts an entry. Recording identical values is observably a no-op.
    pub fn record(&mut self, thread_id: &str, entry: ManifestEntry) {
        self.entries.insert(thread_id.to_string(), entry);
    }

    /// Drops entries whose ids are not in `reachable`, returning the
    /// removed ids. Callers must only invoke this after a complete walk of
    /// every accessible root; a narrowed or partial walk must not prune.
    pub fn retain_reachable(&mut self, reachable: &HashSet<String>) -> Vec<String> {
        let stale: Vec<String> = self
            .entries
            .keys()
            .filter(|id| !reachable.contains(*id))
            .cloned()
            .collect();
        for id in &stale {
            self.entries.remove(id);
        }
        stale
    }

    /// Atomically persists the mapping: pretty JSON written to a temp file
    /// and renamed into place, so a crash mid-write never corrupts the
    /// previous manifest.
    pub fn flush(&self, path: &Path) -> Result<(), PersistError> {
        let serialized = serde_json::to_string_pretty(self)
            .map_err(|e| PersistError::Io(std::io::Error::other(e)))?;
        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => Path::new(".").to_path_buf(),
        };
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| PersistError::InvalidPath(path.display().to_string()))?;
        AtomicDocWriter::new(parent).write(filename, &serialized)?;
        Ok(())
    }
}

/// Hex sha256 of a document body: the change key when the service reports
/// no timestamp.
pub fn content_key(body: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(body.as_bytes());
    let digest = hasher.finalize();
    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest.iter() {
        use std::fmt::Write;
        let _ = write!(&mut hex, "{byte:02x}");
    }
    hex
}
