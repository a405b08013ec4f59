use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use export_logging::{export_debug, export_error, export_info, export_warn};
use futures_util::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;

use quipmark_core::{
    assign_paths, DocFailure, ExportReason, FolderNode, PlannedDoc, RunReport, ThreadMeta,
};

use crate::client::QuipApi;
use crate::convert::Converter;
use crate::frontmatter::build_markdown_document;
use crate::manifest::{content_key, Manifest, ManifestEntry, MANIFEST_FILENAME};
use crate::persist::{ensure_output_dir, AtomicDocWriter};
use crate::roots::discover_root_folders;
use crate::types::{ApiError, ApiFailure, ExportError};
use crate::walk::walk;

const DEFAULT_CONCURRENCY: usize = 4;

/// Which folders a run starts from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RootSelection {
    /// Explicit folder ids; every one must resolve or the run aborts.
    Folders(Vec<String>),
    /// Everything accessible to the token's account.
    AllAccessible,
}

/// Settings for one export run.
#[derive(Debug, Clone)]
pub struct ExportConfig {
    pub roots: RootSelection,
    pub output_dir: PathBuf,
    pub recursive: bool,
    pub keep_structure: bool,
    pub concurrency: usize,
}

impl ExportConfig {
    pub fn new(roots: RootSelection, output_dir: PathBuf) -> Self {
        Self {
            roots,
            output_dir,
            recursive: true,
            keep_structure: false,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

enum DocOutcome {
    Exported,
    Skipped,
    Cancelled,
    Failed(DocFailure),
    FatalAuth(String),
}

/// Drives one export run end to end: walk, plan, fetch, convert, write,
/// record.
pub struct Exporter<'a> {
    api: &'a dyn QuipApi,
    converter: &'a dyn Converter,
}

impl<'a> Exporter<'a> {
    pub fn new(api: &'a dyn QuipApi, converter: &'a dyn Converter) -> Self {
        Self { api, converter }
    }

    /// Runs a full export. Per-document failures land in the report; only
    /// run-wide conditions (bad credentials, unusable output root,
    /// unreachable root folder) surface as `Err`.
    ///
    /// On cancellation no new documents are started, in-flight writes keep
    /// their all-or-nothing guarantee, and everything recorded so far is
    /// still flushed to the manifest.
    pub async fn run(
        &self,
        config: &ExportConfig,
        cancel: &CancellationToken,
    ) -> Result<RunReport, ExportError> {
        ensure_output_dir(&config.output_dir)?;
        let roots = self.resolve_roots(config).await?;
        if roots.is_empty() {
            export_warn!("No folders to export");
            return Ok(RunReport::default());
        }

        let manifest_path = config.output_dir.join(MANIFEST_FILENAME);
        let manifest = Arc::new(Mutex::new(Manifest::load_or_create(&manifest_path)));
        {
            let manifest = manifest.lock().expect("manifest lock");
            export_info!(
                "Loaded manifest with {} entries from {:?}",
                manifest.len(),
                manifest_path
            );
        }

        let outcome = walk(self.api, &roots, config.recursive)
            .await
            .map_err(fatal_from_api)?;
        export_info!("Found {} documents", outcome.docs.len());

        let mut report = RunReport::default();
        report.failed.extend(outcome.failures.clone());
        let reachable = outcome.reachable_thread_ids();
        let walk_complete = outcome.complete;

        let planned = assign_paths(outcome.docs, config.keep_structure);
        let pending = self.partition(&manifest, planned, &mut report);
        export_info!(
            "{} documents pending, {} unchanged",
            pending.len(),
            report.skipped
        );

        let writer = Arc::new(AtomicDocWriter::new(config.output_dir.clone()));
        let exported_at = epoch_seconds();

        let outcomes = stream::iter(pending.into_iter().map(|(doc, reason)| {
            let manifest = Arc::clone(&manifest);
            let writer = Arc::clone(&writer);
            let cancel = cancel.clone();
            async move {
                if cancel.is_cancelled() {
                    return DocOutcome::Cancelled;
                }
                let outcome = self
                    .process_doc(doc, reason, exported_at, &writer, &manifest)
                    .await;
                if matches!(outcome, DocOutcome::FatalAuth(_)) {
                    cancel.cancel();
                }
                outcome
            }
        }))
        .buffer_unordered(config.concurrency.max(1))
        .collect::<Vec<_>>()
        .await;

        let mut fatal: Option<String> = None;
        for outcome in outcomes {
            match outcome {
                DocOutcome::Exported => report.exported += 1,
                DocOutcome::Skipped => report.skipped += 1,
                DocOutcome::Cancelled => {}
                DocOutcome::Failed(failure) => report.failed.push(failure),
                DocOutcome::FatalAuth(message) => fatal = Some(message),
            }
        }

        {
            let mut manifest = manifest.lock().expect("manifest lock");
            let prune_safe = walk_complete
                && config.recursive
                && config.roots == RootSelection::AllAccessible
                && fatal.is_none()
                && !cancel.is_cancelled();
            if prune_safe {
                let removed = manifest.retain_reachable(&reachable);
                if !removed.is_empty() {
                    export_info!("Pruned {} stale manifest entries", removed.len());
                }
            }
            if let Err(err) = manifest.flush(&manifest_path) {
                export_error!("Failed to flush manifest to {:?}: {}", manifest_path, err);
            }
        }

        if let Some(message) = fatal {
            return Err(ExportError::Auth(message));
        }
        Ok(report)
    }

    async fn resolve_roots(&self, config: &ExportConfig) -> Result<Vec<FolderNode>, ExportError> {
        match &config.roots {
            RootSelection::AllAccessible => discover_root_folders(self.api)
                .await
                .map_err(fatal_from_api),
            RootSelection::Folders(ids) => {
                let mut roots = Vec::new();
                for id in ids {
                    let folder = self.api.folder(id).await.map_err(|err| match err.kind {
                        ApiFailure::Auth => ExportError::Auth(err.to_string()),
                        _ => ExportError::Root {
                            id: id.clone(),
                            source: err,
                        },
                    })?;
                    roots.push(folder);
                }
                Ok(roots)
            }
        }
    }

    /// Splits the plan into documents that need work and manifest skips.
    /// Skipping happens here, before any body fetch.
    fn partition(
        &self,
        manifest: &Mutex<Manifest>,
        planned: Vec<PlannedDoc>,
        report: &mut RunReport,
    ) -> Vec<(PlannedDoc, ExportReason)> {
        let manifest = manifest.lock().expect("manifest lock");
        let mut pending = Vec::new();
        for doc in planned {
            let meta = &doc.doc.meta;
            if !manifest.needs_export(&meta.id, meta.updated_usec, &doc.rel_path) {
                export_debug!("Unchanged: {} ({})", meta.title, meta.id);
                report.skipped += 1;
                continue;
            }
            let reason = classify(
                manifest.get(&meta.id).map(|e| e.path.as_str()),
                meta,
                &doc.rel_path,
            );
            pending.push((doc, reason));
        }
        pending
    }

    async fn process_doc(
        &self,
        doc: PlannedDoc,
        reason: ExportReason,
        exported_at: u64,
        writer: &AtomicDocWriter,
        manifest: &Mutex<Manifest>,
    ) -> DocOutcome {
        let meta = &doc.doc.meta;
        export_debug!("Fetching {} ({:?})", meta.id, reason);

        let html = match self.api.thread_html(&meta.id).await {
            Ok(html) => html,
            Err(ApiError {
                kind: ApiFailure::Auth,
                message,
            }) => return DocOutcome::FatalAuth(message),
            Err(err) => return DocOutcome::Failed(failure(meta, format!("fetch failed: {err}"))),
        };

        // Timestamp-less documents get their change key from the content
        // itself; an unchanged hash at an unchanged path is still a skip.
        let content_sha = meta.updated_usec.is_none().then(|| content_key(&html));
        if let Some(sha) = content_sha.as_deref() {
            let manifest = manifest.lock().expect("manifest lock");
            if manifest.matches_content(&meta.id, &doc.rel_path, sha) {
                export_debug!("Unchanged content: {} ({})", meta.title, meta.id);
                return DocOutcome::Skipped;
            }
        }

        let body = self.converter.to_markdown(&html);
        let folder_path = (!doc.doc.dir.is_empty()).then(|| doc.doc.dir.join("/"));
        let document = build_markdown_document(meta, folder_path.as_deref(), exported_at, &body);

        if let Err(err) = writer.write(&doc.rel_path, &document) {
            return DocOutcome::Failed(failure(meta, format!("write failed: {err}")));
        }

        let previous_path = {
            let mut manifest = manifest.lock().expect("manifest lock");
            let previous = manifest.get(&meta.id).map(|e| e.path.clone());
            manifest.record(
                &meta.id,
                ManifestEntry {
                    title: meta.title.clone(),
                    path: doc.rel_path.clone(),
                    updated_usec: meta.updated_usec,
                    content_sha256: content_sha,
                    exported_at,
                },
            );
            previous
        };

        // Move policy: the stale file at the old recorded path is removed
        // once the new path holds the document.
        if let Some(old_path) = previous_path.filter(|p| *p != doc.rel_path) {
            match writer.remove(&old_path) {
                Ok(()) => export_info!("Removed stale file {}", old_path),
                Err(err) => export_warn!("Could not remove stale file {}: {}", old_path, err),
            }
        }

        export_info!("Exported {} -> {}", meta.id, doc.rel_path);
        DocOutcome::Exported
    }
}

fn classify(previous_path: Option<&str>, meta: &ThreadMeta, target_path: &str) -> ExportReason {
    match previous_path {
        None => ExportReason::New,
        Some(prev) if prev != target_path => ExportReason::Moved,
        Some(_) if meta.updated_usec.is_none() => ExportReason::Unverified,
        Some(_) => ExportReason::Updated,
    }
}

fn failure(meta: &ThreadMeta, reason: String) -> DocFailure {
    DocFailure {
        thread_id: meta.id.clone(),
        title: meta.title.clone(),
        reason,
    }
}

fn fatal_from_api(err: ApiError) -> ExportError {
    match err.kind {
        ApiFailure::Auth => ExportError::Auth(err.to_string()),
        _ => ExportError::Discovery(err),
    }
}

fn epoch_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
