use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::bus::{EventBus, SyncEvent};
use crate::codec;
use crate::fs::{
    FileEntry, FileStatusEvent, FileSyncStatus, SyncAction, SyncDirection, SyncableFs,
};

/// Turns low-level file-status events into domain events.
///
/// Only `synced` events travelling remote-to-local produce anything; added
/// and updated files are read back before publishing, deletions publish from
/// the decoded filename alone.
pub struct ChangeEventDispatcher<F: SyncableFs> {
    fs: F,
    bus: EventBus,
}

impl<F: SyncableFs> ChangeEventDispatcher<F> {
    pub fn new(fs: F, bus: EventBus) -> Self {
        Self { fs, bus }
    }

    /// Drains the backend's status-event feed until the backend closes it.
    pub async fn run(self, mut events: mpsc::UnboundedReceiver<FileStatusEvent>) {
        while let Some(event) = events.recv().await {
            self.on_status_changed(event).await;
        }
    }

    pub async fn on_status_changed(&self, event: FileStatusEvent) {
        if event.status != FileSyncStatus::Synced {
            debug!(file = %event.file_name, status = ?event.status, "ignoring unsynced status event");
            return;
        }
        if event.direction == SyncDirection::LocalToRemote {
            debug!(file = %event.file_name, "local write confirmed remotely");
            return;
        }
        let (resource_id, resource_type) = match codec::decode(&event.file_name) {
            Ok(identity) => identity,
            Err(err) => {
                warn!(file = %event.file_name, error = %err, "undecodable filename in status event");
                return;
            }
        };
        match event.action {
            SyncAction::Added => {
                if let Some(content) = self.read(&event.file_name).await {
                    self.bus.publish(SyncEvent::RemoteAdded {
                        resource_type,
                        content,
                    });
                }
            }
            SyncAction::Updated => {
                if let Some(content) = self.read(&event.file_name).await {
                    self.bus.publish(SyncEvent::RemoteUpdated {
                        resource_type,
                        content,
                    });
                }
            }
            SyncAction::Deleted => {
                self.bus.publish(SyncEvent::RemoteDeleted {
                    resource_type,
                    resource_id,
                });
            }
        }
    }

    async fn read(&self, name: &str) -> Option<String> {
        let entry = match self.fs.open(name, false).await {
            Ok(entry) => entry,
            Err(err) => {
                warn!(name, error = %err, "cannot open remotely changed file");
                return None;
            }
        };
        match entry.read_text().await {
            Ok(content) => Some(content),
            Err(err) => {
                warn!(name, error = %err, "cannot read remotely changed file");
                None
            }
        }
    }
}
