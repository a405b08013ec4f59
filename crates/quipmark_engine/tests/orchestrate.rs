use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use pretty_assertions::assert_eq;
use quipmark_core::{FolderNode, ThreadMeta};
use quipmark_engine::{
    ApiError, ApiFailure, ExportConfig, ExportError, Exporter, Html2MdConverter, Manifest,
    QuipApi, RootSelection, UserInfo, MANIFEST_FILENAME,
};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct FakeApi {
    user: UserInfo,
    folders: HashMap<String, FolderNode>,
    threads: HashMap<String, ThreadMeta>,
    html: HashMap<String, String>,
    fail_html: HashSet<String>,
    auth_fail_html: HashSet<String>,
    html_calls: AtomicUsize,
}

impl FakeApi {
    fn folder(mut self, id: &str, title: &str, subfolders: &[&str], threads: &[&str]) -> Self {
        self.folders.insert(
            id.to_string(),
            FolderNode {
                id: id.to_string(),
                title: title.to_string(),
                child_folders: subfolders.iter().map(|s| s.to_string()).collect(),
                child_threads: threads.iter().map(|s| s.to_string()).collect(),
            },
        );
        self
    }

    fn thread(mut self, id: &str, title: &str, usec: Option<u64>, html: &str) -> Self {
        self.threads.insert(
            id.to_string(),
            ThreadMeta {
                id: id.to_string(),
                title: title.to_string(),
                updated_usec: usec,
                link: None,
            },
        );
        self.html.insert(id.to_string(), html.to_string());
        self
    }

    fn failing_html(mut self, id: &str) -> Self {
        self.fail_html.insert(id.to_string());
        self
    }

    fn auth_failing_html(mut self, id: &str) -> Self {
        self.auth_fail_html.insert(id.to_string());
        self
    }

    fn desktop_root(mut self, id: &str) -> Self {
        self.user.desktop_folder_id = Some(id.to_string());
        self
    }

    fn body_fetches(&self) -> usize {
        self.html_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl QuipApi for FakeApi {
    async fn current_user(&self) -> Result<UserInfo, ApiError> {
        Ok(self.user.clone())
    }

    async fn folder(&self, id: &str) -> Result<FolderNode, ApiError> {
        self.folders.get(id).cloned().ok_or(ApiError {
            kind: ApiFailure::NotFound,
            message: id.to_string(),
        })
    }

    async fn thread_meta(&self, id: &str) -> Result<ThreadMeta, ApiError> {
        self.threads.get(id).cloned().ok_or(ApiError {
            kind: ApiFailure::NotFound,
            message: id.to_string(),
        })
    }

    async fn thread_html(&self, id: &str) -> Result<String, ApiError> {
        self.html_calls.fetch_add(1, Ordering::SeqCst);
        if self.auth_fail_html.contains(id) {
            return Err(ApiError {
                kind: ApiFailure::Auth,
                message: "expired token".to_string(),
            });
        }
        if self.fail_html.contains(id) {
            return Err(ApiError {
                kind: ApiFailure::Transient,
                message: "gateway flapping".to_string(),
            });
        }
        self.html.get(id).cloned().ok_or(ApiError {
            kind: ApiFailure::NotFound,
            message: id.to_string(),
        })
    }

    async fn group_folder_id(&self, _group_id: &str) -> Result<Option<String>, ApiError> {
        Ok(None)
    }
}

fn structured_config(out: &Path) -> ExportConfig {
    let mut config = ExportConfig::new(
        RootSelection::Folders(vec!["F1".to_string()]),
        out.to_path_buf(),
    );
    config.keep_structure = true;
    config.concurrency = 2;
    config
}

fn spec_example_api() -> FakeApi {
    FakeApi::default()
        .folder("F1", "F1", &["F2"], &["doc-1"])
        .folder("F2", "F2", &[], &["doc-2"])
        .thread("doc-1", "Plan", Some(100), "<h1>Plan</h1><p>plan body</p>")
        .thread("doc-2", "Notes", Some(50), "<p>notes body</p>")
}

async fn run(api: &FakeApi, config: &ExportConfig) -> quipmark_core::RunReport {
    let converter = Html2MdConverter;
    Exporter::new(api, &converter)
        .run(config, &CancellationToken::new())
        .await
        .unwrap()
}

#[tokio::test]
async fn first_run_exports_then_second_run_skips_everything() {
    let temp = TempDir::new().unwrap();
    let config = structured_config(temp.path());

    let api = spec_example_api();
    let report = run(&api, &config).await;
    assert_eq!(report.exported, 2);
    assert_eq!(report.skipped, 0);
    assert!(report.failed.is_empty());
    assert_eq!(api.body_fetches(), 2);

    let plan_path = temp.path().join("F1/Plan.md");
    let notes_path = temp.path().join("F1/F2/Notes.md");
    let plan_before = fs::read(&plan_path).unwrap();
    let notes_before = fs::read(&notes_path).unwrap();
    assert!(temp.path().join(MANIFEST_FILENAME).exists());

    // No remote changes: everything skips without a single body fetch and
    // the files stay byte-identical.
    let api = spec_example_api();
    let report = run(&api, &config).await;
    assert_eq!(report.exported, 0);
    assert_eq!(report.skipped, 2);
    assert_eq!(api.body_fetches(), 0);
    assert_eq!(fs::read(&plan_path).unwrap(), plan_before);
    assert_eq!(fs::read(&notes_path).unwrap(), notes_before);
}

#[tokio::test]
async fn newer_remote_timestamp_re_exports_only_that_document() {
    let temp = TempDir::new().unwrap();
    let config = structured_config(temp.path());

    run(&spec_example_api(), &config).await;

    let api = spec_example_api().thread(
        "doc-1",
        "Plan",
        Some(200),
        "<h1>Plan</h1><p>revised body</p>",
    );
    let report = run(&api, &config).await;
    assert_eq!(report.exported, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(api.body_fetches(), 1);

    let plan = fs::read_to_string(temp.path().join("F1/Plan.md")).unwrap();
    assert!(plan.contains("revised body"));
    assert!(plan.contains("updated_usec: 200"));
}

#[tokio::test]
async fn one_failing_document_does_not_forfeit_the_rest() {
    let temp = TempDir::new().unwrap();
    let mut config = ExportConfig::new(
        RootSelection::Folders(vec!["F1".to_string()]),
        temp.path().to_path_buf(),
    );
    config.concurrency = 2;

    let api = FakeApi::default()
        .folder("F1", "F1", &[], &["d1", "d2", "d3"])
        .thread("d1", "One", Some(1), "<p>one</p>")
        .thread("d2", "Two", Some(1), "<p>two</p>")
        .thread("d3", "Three", Some(1), "<p>three</p>")
        .failing_html("d2");

    let report = run(&api, &config).await;
    assert_eq!(report.exported, 2);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].thread_id, "d2");
    assert!(temp.path().join("One.md").exists());
    assert!(temp.path().join("Three.md").exists());
    assert!(!temp.path().join("Two.md").exists());

    // The successes were recorded: a retry run only re-attempts the
    // failure.
    let api = FakeApi::default()
        .folder("F1", "F1", &[], &["d1", "d2", "d3"])
        .thread("d1", "One", Some(1), "<p>one</p>")
        .thread("d2", "Two", Some(1), "<p>two</p>")
        .thread("d3", "Three", Some(1), "<p>three</p>")
        .failing_html("d2");
    let report = run(&api, &config).await;
    assert_eq!(report.skipped, 2);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(api.body_fetches(), 1);
}

#[tokio::test]
async fn moved_document_is_rewritten_at_the_new_path_and_the_stale_file_removed() {
    let temp = TempDir::new().unwrap();
    let config = structured_config(temp.path());

    run(&spec_example_api(), &config).await;
    assert!(temp.path().join("F1/F2/Notes.md").exists());

    // doc-2 moved from F2 up into F1, timestamp unchanged.
    let api = FakeApi::default()
        .folder("F1", "F1", &["F2"], &["doc-1", "doc-2"])
        .folder("F2", "F2", &[], &[])
        .thread("doc-1", "Plan", Some(100), "<h1>Plan</h1><p>plan body</p>")
        .thread("doc-2", "Notes", Some(50), "<p>notes body</p>");
    let report = run(&api, &config).await;

    assert_eq!(report.exported, 1);
    assert_eq!(report.skipped, 1);
    assert!(temp.path().join("F1/Notes.md").exists());
    assert!(!temp.path().join("F1/F2/Notes.md").exists());
}

#[tokio::test]
async fn timestamp_less_documents_fall_back_to_content_hashing() {
    let temp = TempDir::new().unwrap();
    let mut config = ExportConfig::new(
        RootSelection::Folders(vec!["F1".to_string()]),
        temp.path().to_path_buf(),
    );
    config.concurrency = 1;

    let fixture = || {
        FakeApi::default()
            .folder("F1", "F1", &[], &["d1"])
            .thread("d1", "Legacy", None, "<p>stable</p>")
    };

    let api = fixture();
    let report = run(&api, &config).await;
    assert_eq!(report.exported, 1);
    assert_eq!(api.body_fetches(), 1);

    // Unchanged content still needs the fetch, then skips on the hash.
    let api = fixture();
    let report = run(&api, &config).await;
    assert_eq!(report.exported, 0);
    assert_eq!(report.skipped, 1);
    assert_eq!(api.body_fetches(), 1);

    let api = FakeApi::default()
        .folder("F1", "F1", &[], &["d1"])
        .thread("d1", "Legacy", None, "<p>edited</p>");
    let report = run(&api, &config).await;
    assert_eq!(report.exported, 1);
    let body = fs::read_to_string(temp.path().join("Legacy.md")).unwrap();
    assert!(body.contains("edited"));
}

#[tokio::test]
async fn colliding_titles_get_id_suffixed_files() {
    let temp = TempDir::new().unwrap();
    let config = ExportConfig::new(
        RootSelection::Folders(vec!["F1".to_string()]),
        temp.path().to_path_buf(),
    );

    let api = FakeApi::default()
        .folder("F1", "F1", &[], &["t1", "t2"])
        .thread("t1", "Plan", Some(1), "<p>a</p>")
        .thread("t2", "Plan", Some(1), "<p>b</p>");
    let report = run(&api, &config).await;

    assert_eq!(report.exported, 2);
    assert!(temp.path().join("Plan - t1.md").exists());
    assert!(temp.path().join("Plan - t2.md").exists());
}

#[tokio::test]
async fn auth_failure_aborts_the_run() {
    let temp = TempDir::new().unwrap();
    let config = ExportConfig::new(
        RootSelection::Folders(vec!["F1".to_string()]),
        temp.path().to_path_buf(),
    );

    let api = FakeApi::default()
        .folder("F1", "F1", &[], &["d1"])
        .thread("d1", "One", Some(1), "<p>one</p>")
        .auth_failing_html("d1");

    let converter = Html2MdConverter;
    let err = Exporter::new(&api, &converter)
        .run(&config, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ExportError::Auth(_)));
}

#[tokio::test]
async fn unreachable_root_folder_is_fatal() {
    let temp = TempDir::new().unwrap();
    let config = ExportConfig::new(
        RootSelection::Folders(vec!["missing".to_string()]),
        temp.path().to_path_buf(),
    );

    let api = FakeApi::default();
    let converter = Html2MdConverter;
    let err = Exporter::new(&api, &converter)
        .run(&config, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ExportError::Root { .. }));
}

#[tokio::test]
async fn corrupt_manifest_degrades_to_a_full_re_export() {
    let temp = TempDir::new().unwrap();
    let config = structured_config(temp.path());

    run(&spec_example_api(), &config).await;
    fs::write(temp.path().join(MANIFEST_FILENAME), "garbage{{{").unwrap();

    let api = spec_example_api();
    let report = run(&api, &config).await;
    assert_eq!(report.exported, 2);
    assert_eq!(api.body_fetches(), 2);
}

#[tokio::test]
async fn full_walk_prunes_entries_for_vanished_documents() {
    let temp = TempDir::new().unwrap();
    let mut config = ExportConfig::new(RootSelection::AllAccessible, temp.path().to_path_buf());
    config.concurrency = 2;

    let api = FakeApi::default()
        .desktop_root("F1")
        .folder("F1", "F1", &[], &["d1", "d2"])
        .thread("d1", "Keep", Some(1), "<p>keep</p>")
        .thread("d2", "Gone", Some(1), "<p>gone</p>");
    run(&api, &config).await;

    // d2 was deleted remotely.
    let api = FakeApi::default()
        .desktop_root("F1")
        .folder("F1", "F1", &[], &["d1"])
        .thread("d1", "Keep", Some(1), "<p>keep</p>");
    run(&api, &config).await;

    let manifest = Manifest::load_or_create(&temp.path().join(MANIFEST_FILENAME));
    assert!(manifest.get("d1").is_some());
    assert!(manifest.get("d2").is_none());
    // The exported file is left for manual cleanup; only the entry goes.
    assert!(temp.path().join("Gone.md").exists());
}

#[tokio::test]
async fn narrowed_scope_never_prunes() {
    let temp = TempDir::new().unwrap();
    let mut config = ExportConfig::new(RootSelection::AllAccessible, temp.path().to_path_buf());
    config.keep_structure = false;

    let fixture = || {
        FakeApi::default()
            .desktop_root("F1")
            .folder("F1", "F1", &["F2"], &["d1"])
            .folder("F2", "F2", &[], &["d2"])
            .thread("d1", "Root doc", Some(1), "<p>root</p>")
            .thread("d2", "Sub doc", Some(1), "<p>sub</p>")
    };

    run(&fixture(), &config).await;

    let mut narrowed = config.clone();
    narrowed.recursive = false;
    run(&fixture(), &narrowed).await;

    let manifest = Manifest::load_or_create(&temp.path().join(MANIFEST_FILENAME));
    assert!(
        manifest.get("d2").is_some(),
        "a non-recursive run must not prune subfolder entries"
    );
}

#[tokio::test]
async fn cancelled_runs_start_no_work_but_still_flush_the_manifest() {
    let temp = TempDir::new().unwrap();
    let config = structured_config(temp.path());

    let api = spec_example_api();
    let converter = Html2MdConverter;
    let cancel = CancellationToken::new();
    cancel.cancel();
    let report = Exporter::new(&api, &converter)
        .run(&config, &cancel)
        .await
        .unwrap();

    assert_eq!(report.exported, 0);
    assert_eq!(api.body_fetches(), 0);
    assert!(temp.path().join(MANIFEST_FILENAME).exists());
}
