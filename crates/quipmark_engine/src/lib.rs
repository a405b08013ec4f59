//! Quipmark engine: remote client, folder traversal, Markdown conversion,
//! change-tracking manifest, and the export pipeline.
mod client;
mod convert;
mod frontmatter;
mod manifest;
mod orchestrate;
mod persist;
mod roots;
mod sanitize;
mod types;
mod walk;

pub use client::{
    ClientSettings, HttpQuipClient, QuipApi, RetryPolicy, UserInfo, DEFAULT_BASE_URL,
};
pub use convert::{Converter, Html2MdConverter};
pub use frontmatter::build_markdown_document;
pub use manifest::{content_key, Manifest, ManifestEntry, MANIFEST_FILENAME};
pub use orchestrate::{ExportConfig, Exporter, RootSelection};
pub use persist::{ensure_output_dir, AtomicDocWriter, PersistError};
pub use roots::discover_root_folders;
pub use sanitize::sanitize_html;
pub use types::{ApiError, ApiFailure, ExportError};
pub use walk::{walk, WalkOutcome};
