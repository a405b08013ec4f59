use std::path::{Path, PathBuf};

use clap::Parser;

/// Export Quip folders to Markdown files, skipping documents unchanged
/// since the previous run.
#[derive(Debug, Parser)]
#[command(name = "quipmark", version, about)]
pub struct Cli {
    /// Personal access token for the API.
    #[arg(long, env = "QUIP_TOKEN", hide_env_values = true)]
    pub token: String,

    /// Folder id to export (repeatable, comma-separated also accepted).
    /// Web shorthand ids and API ids both work.
    #[arg(
        long = "folder-id",
        env = "QUIP_FOLDER_ID",
        value_delimiter = ',',
        required_unless_present = "all"
    )]
    pub folder_ids: Vec<String>,

    /// Export every folder accessible to the token instead of specific ids.
    #[arg(long)]
    pub all: bool,

    /// Output directory.
    #[arg(long, env = "QUIP_OUT")]
    pub out: Option<PathBuf>,

    /// Do not descend into subfolders.
    #[arg(long)]
    pub no_recursive: bool,

    /// Mirror the remote folder structure in the output directory.
    #[arg(long)]
    pub maintain_structure: bool,

    /// Number of documents processed in parallel.
    #[arg(long, default_value_t = 4)]
    pub concurrency: usize,

    /// API endpoint override.
    #[arg(
        long,
        env = "QUIP_BASE_URL",
        default_value = quipmark_engine::DEFAULT_BASE_URL,
        hide = true
    )]
    pub base_url: String,

    /// Verbose logging (debug level).
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    pub fn output_dir(&self) -> PathBuf {
        self.out.clone().unwrap_or_else(default_output_dir)
    }
}

/// `<Documents>/QuipNotes`, falling back to `./QuipNotes` when the user's
/// documents directory cannot be determined.
fn default_output_dir() -> PathBuf {
    directories::UserDirs::new()
        .and_then(|dirs| dirs.document_dir().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("QuipNotes")
}
