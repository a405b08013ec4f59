use std::collections::{HashSet, VecDeque};

use export_logging::export_warn;
use quipmark_core::{DocFailure, FolderNode, WalkedDoc};

use crate::client::QuipApi;
use crate::types::{ApiError, ApiFailure};

/// Result of enumerating the reachable folder graph.
#[derive(Debug, Default)]
pub struct WalkOutcome {
    /// Discovered documents in stable (folder chain, title, id) order.
    pub docs: Vec<WalkedDoc>,
    /// Threads whose metadata could not be fetched.
    pub failures: Vec<DocFailure>,
    /// False when a child folder listing failed, leaving part of the graph
    /// unexplored. Manifest pruning must not run on an incomplete walk.
    pub complete: bool,
}

impl WalkOutcome {
    /// Every thread id seen during the walk, including metadata failures.
    pub fn reachable_thread_ids(&self) -> HashSet<String> {
        self.docs
            .iter()
            .map(|doc| doc.meta.id.clone())
            .chain(self.failures.iter().map(|f| f.thread_id.clone()))
            .collect()
    }
}

/// Walks the folder graph breadth-first from the given roots.
///
/// The graph may contain cycles and folders shared between roots; a
/// visited set keyed by folder id guarantees termination and that each
/// folder's documents are emitted at most once. A thread placed in several
/// folders is emitted only for the first placement encountered. Only an
/// authorization failure aborts the walk; an unlistable child folder skips
/// that subtree and marks the walk incomplete.
pub async fn walk(
    api: &dyn QuipApi,
    roots: &[FolderNode],
    recursive: bool,
) -> Result<WalkOutcome, ApiError> {
    let mut outcome = WalkOutcome {
        complete: true,
        ..WalkOutcome::default()
    };
    let mut visited_folders: HashSet<String> = HashSet::new();
    let mut seen_threads: HashSet<String> = HashSet::new();
    let mut queue: VecDeque<(FolderNode, Vec<String>)> = VecDeque::new();

    for root in roots {
        if visited_folders.insert(root.id.clone()) {
            queue.push_back((root.clone(), vec![root.title.clone()]));
        }
    }

    while let Some((folder, chain)) = queue.pop_front() {
        for thread_id in &folder.child_threads {
            if !seen_threads.insert(thread_id.clone()) {
                continue;
            }
            match api.thread_meta(thread_id).await {
                Ok(meta) => outcome.docs.push(WalkedDoc {
                    dir: chain.clone(),
                    meta,
                }),
                Err(err) if err.kind == ApiFailure::Auth => return Err(err),
                Err(err) => {
                    export_warn!("Could not fetch thread {}: {}", thread_id, err);
                    outcome.failures.push(DocFailure {
                        thread_id: thread_id.clone(),
                        title: thread_id.clone(),
                        reason: format!("metadata fetch failed: {err}"),
                    });
                }
            }
        }

        if !recursive {
            continue;
        }
        for folder_id in &folder.child_folders {
            if !visited_folders.insert(folder_id.clone()) {
                continue;
            }
            match api.folder(folder_id).await {
                Ok(sub) => {
                    let mut chain = chain.clone();
                    chain.push(sub.title.clone());
                    queue.push_back((sub, chain));
                }
                Err(err) if err.kind == ApiFailure::Auth => return Err(err),
                Err(err) => {
                    export_warn!("Could not list folder {}: {}", folder_id, err);
                    outcome.complete = false;
                }
            }
        }
    }

    outcome.docs.sort_by(|a, b| {
        a.dir
            .cmp(&b.dir)
            .then_with(|| a.meta.title.to_lowercase().cmp(&b.meta.title.to_lowercase()))
            .then_with(|| a.meta.id.cmp(&b.meta.id))
    });
    Ok(outcome)
}
