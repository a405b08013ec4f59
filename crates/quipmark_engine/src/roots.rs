use std::collections::HashSet;

use export_logging::export_warn;
use quipmark_core::FolderNode;

use crate::client::QuipApi;
use crate::types::{ApiError, ApiFailure};

/// Root folders for "export everything accessible" mode: the account's
/// desktop and private folders, folders shared with it, and group folders.
/// Trash, starred, and archive are never content roots and are skipped.
///
/// A folder that cannot be resolved is logged and skipped; only an
/// authorization failure propagates, since nothing after it can succeed.
pub async fn discover_root_folders(api: &dyn QuipApi) -> Result<Vec<FolderNode>, ApiError> {
    let user = api.current_user().await?;

    let mut skip: HashSet<String> = HashSet::new();
    skip.extend(user.trash_folder_id.clone());
    skip.extend(user.starred_folder_id.clone());
    skip.extend(user.archive_folder_id.clone());

    let mut candidates: Vec<String> = Vec::new();
    candidates.extend(user.desktop_folder_id.clone());
    candidates.extend(user.private_folder_id.clone());
    candidates.extend(user.shared_folder_ids.clone());
    for group_id in &user.group_ids {
        match api.group_folder_id(group_id).await {
            Ok(Some(folder_id)) => candidates.push(folder_id),
            Ok(None) => {}
            Err(err) if err.kind == ApiFailure::Auth => return Err(err),
            Err(err) => export_warn!("Could not resolve group {}: {}", group_id, err),
        }
    }

    let mut seen: HashSet<String> = HashSet::new();
    let mut roots = Vec::new();
    for id in candidates {
        if skip.contains(&id) || !seen.insert(id.clone()) {
            continue;
        }
        match api.folder(&id).await {
            Ok(folder) => roots.push(folder),
            Err(err) if err.kind == ApiFailure::Auth => return Err(err),
            Err(err) => export_warn!("Could not fetch folder {}: {}", id, err),
        }
    }
    Ok(roots)
}
