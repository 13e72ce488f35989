use tracing::warn;

use crate::fs::{FileEntry, FsError, SyncableFs};

/// Deletes `name` when present. Absence, lookup failure, and deletion
/// failure all complete without error; callers must not depend on removal
/// failure signals.
pub async fn remove_if_exists<F: SyncableFs>(fs: &F, name: &str) {
    let entry = match fs.open(name, false).await {
        Ok(entry) => entry,
        Err(FsError::NotFound) => return,
        Err(err) => {
            warn!(name, error = %err, "lookup before removal failed");
            return;
        }
    };
    if let Err(err) = entry.remove().await {
        warn!(name, error = %err, "removal failed");
    }
}
