//! Quipmark core: pure document model, naming, and target-path planning.
mod filename;
mod plan;
mod types;

pub use filename::{disambiguated_filename, markdown_filename, sanitize_component};
pub use plan::assign_paths;
pub use types::{
    DocFailure, ExportReason, FolderNode, PlannedDoc, RunReport, ThreadMeta, WalkedDoc,
};
