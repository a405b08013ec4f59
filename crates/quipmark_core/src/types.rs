/// Metadata for one remote thread (document).
///
/// `updated_usec` is assigned by the service and is monotonically
/// non-decreasing per thread; legacy threads may not carry one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadMeta {
    pub id: String,
    pub title: String,
    pub updated_usec: Option<u64>,
    pub link: Option<String>,
}

/// One folder as reported by the remote service.
///
/// Transient: rebuilt from remote data on every run, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FolderNode {
    pub id: String,
    pub title: String,
    pub child_folders: Vec<String>,
    pub child_threads: Vec<String>,
}

/// A document discovered by the walker.
///
/// `dir` is the chain of folder display names from the walk root to the
/// owning folder, empty when structure preservation is off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkedDoc {
    pub dir: Vec<String>,
    pub meta: ThreadMeta,
}

/// A walked document with its resolved output path, relative to the
/// output root and joined with `/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedDoc {
    pub doc: WalkedDoc,
    pub rel_path: String,
}

/// Why a document is scheduled for export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportReason {
    /// Not present in the manifest.
    New,
    /// Remote timestamp is strictly newer than the recorded one.
    Updated,
    /// Recorded output path differs from the planned one.
    Moved,
    /// No remote timestamp; the body must be fetched and hash-compared.
    Unverified,
}

/// A per-document failure carried into the final report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocFailure {
    pub thread_id: String,
    pub title: String,
    pub reason: String,
}

/// Final accounting for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub exported: usize,
    pub skipped: usize,
    pub failed: Vec<DocFailure>,
}
