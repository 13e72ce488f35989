use tokio::sync::{broadcast, mpsc, oneshot};

use crate::engine::EngineError;
use crate::fs::SyncableFile;

/// Domain events published to the application, one variant per topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// The syncable storage handle is available; sync requests are accepted.
    StorageReady,
    /// Storage handle acquisition failed; the engine is terminally un-ready.
    StorageFailed { error: String },
    RemoteAdded {
        resource_type: String,
        content: String,
    },
    RemoteUpdated {
        resource_type: String,
        content: String,
    },
    RemoteDeleted {
        resource_type: String,
        resource_id: String,
    },
}

/// Requests the application sends to the engine. Replies are optional where
/// the operation is fire-and-forget.
#[derive(Debug)]
pub enum SyncRequest {
    AddFile {
        file: SyncableFile,
        reply: Option<oneshot::Sender<Result<(), EngineError>>>,
    },
    UpdateFile {
        file: SyncableFile,
        reply: Option<oneshot::Sender<Result<(), EngineError>>>,
    },
    RemoveFile {
        name: String,
        reply: Option<oneshot::Sender<()>>,
    },
    ReadFile {
        name: String,
        reply: oneshot::Sender<Result<String, EngineError>>,
    },
}

#[derive(Clone)]
pub struct EventBus {
    events: broadcast::Sender<SyncEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity);
        Self { events }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    /// Publishing with no subscribers is not an error; domain events are
    /// notifications, not commands.
    pub fn publish(&self, event: SyncEvent) {
        let _ = self.events.send(event);
    }
}

/// Channel pair for feeding [`SyncRequest`]s to the engine.
pub fn request_channel() -> (
    mpsc::UnboundedSender<SyncRequest>,
    mpsc::UnboundedReceiver<SyncRequest>,
) {
    mpsc::unbounded_channel()
}
