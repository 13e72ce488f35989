use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use thiserror::Error;
use tokio::sync::{Mutex, broadcast, mpsc};
use tracing::{info, warn};

use crate::bus::{EventBus, SyncEvent, SyncRequest};
use crate::codec::CodecError;
use crate::config::SyncConfig;
use crate::dispatch::ChangeEventDispatcher;
use crate::fs::{FileEntry, FsError, StorageBackend, SyncableFile, SyncableFs};
use crate::remove::remove_if_exists;
use crate::write::{WriteError, commit_write};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("storage error: {0}")]
    Fs(#[from] FsError),
    #[error(transparent)]
    Write(#[from] WriteError),
    #[error("filename decode failed: {0}")]
    Codec(#[from] CodecError),
    #[error("sync is disabled by configuration")]
    SyncDisabled,
    #[error("syncable storage is not ready")]
    NotReady,
    #[error("storage initialization previously failed")]
    InitFailed,
    #[error("storage initialization failed: {0}")]
    Init(FsError),
}

/// Observable engine state snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncState {
    pub initialized: bool,
    pub can_sync: bool,
    pub is_syncing: bool,
}

enum GatewayPhase<F> {
    Uninitialized,
    Opening,
    Ready(F),
    Failed,
}

/// Orchestrates the syncable storage handle, the write-commit protocol, and
/// the remote-change dispatcher.
///
/// Lifecycle: `Uninitialized → Opening → Ready`, or `Failed` when handle
/// acquisition errors; there is no transition out of `Ready` or `Failed`.
/// Writes to the same storage name are serialized through a per-name lock so
/// concurrent commits cannot interleave their open/write/truncate sequences.
pub struct SyncEngine<B: StorageBackend> {
    backend: B,
    config: SyncConfig,
    bus: EventBus,
    phase: Mutex<GatewayPhase<B::Fs>>,
    name_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    initialized: AtomicBool,
    in_flight: AtomicUsize,
}

impl<B: StorageBackend> SyncEngine<B> {
    pub fn new(backend: B, config: SyncConfig) -> Self {
        let bus = EventBus::new(config.event_capacity);
        Self {
            backend,
            config,
            bus,
            phase: Mutex::new(GatewayPhase::Uninitialized),
            name_locks: Mutex::new(HashMap::new()),
            initialized: AtomicBool::new(false),
            in_flight: AtomicUsize::new(0),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.bus.subscribe()
    }

    pub fn state(&self) -> SyncState {
        SyncState {
            initialized: self.initialized.load(Ordering::SeqCst),
            can_sync: self.config.sync_enabled,
            is_syncing: self.in_flight.load(Ordering::SeqCst) > 0,
        }
    }

    /// Acquires the syncable storage handle and starts the remote-change
    /// dispatcher. A no-op when sync is disabled by configuration; on backend
    /// failure the engine lands in a terminal failed state and the failure is
    /// published as [`SyncEvent::StorageFailed`].
    pub async fn open(&self) -> Result<(), EngineError> {
        if !self.config.sync_enabled {
            info!("sync is disabled, not opening syncable storage");
            return Ok(());
        }
        {
            let mut phase = self.phase.lock().await;
            match *phase {
                GatewayPhase::Uninitialized => *phase = GatewayPhase::Opening,
                GatewayPhase::Ready(_) => return Ok(()),
                GatewayPhase::Opening => return Err(EngineError::NotReady),
                GatewayPhase::Failed => return Err(EngineError::InitFailed),
            }
        }
        match self.backend.request_file_system().await {
            Ok((fs, events)) => {
                *self.phase.lock().await = GatewayPhase::Ready(fs.clone());
                self.initialized.store(true, Ordering::SeqCst);
                info!("syncable storage is ready");
                self.bus.publish(SyncEvent::StorageReady);
                tokio::spawn(ChangeEventDispatcher::new(fs, self.bus.clone()).run(events));
                Ok(())
            }
            Err(err) => {
                *self.phase.lock().await = GatewayPhase::Failed;
                warn!(error = %err, "syncable storage handle acquisition failed");
                self.bus.publish(SyncEvent::StorageFailed {
                    error: err.to_string(),
                });
                Err(EngineError::Init(err))
            }
        }
    }

    /// Creates or overwrites the file derived from `file`'s identity pair,
    /// running the write-then-truncate commit under the per-name lock.
    pub async fn sync_file(&self, file: &SyncableFile) -> Result<(), EngineError> {
        let fs = self.ready_fs().await?;
        let name = file.storage_name();
        let lock = self.name_lock(&name).await;
        let _guard = lock.lock().await;

        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let result = async {
            let entry = fs.open(&name, true).await?;
            let mut writer = entry.create_writer().await?;
            commit_write(&mut writer, &file.content).await?;
            Ok(())
        }
        .await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    /// Best-effort removal; completes without error whether or not the file
    /// exists or the backend cooperates.
    pub async fn remove_file(&self, name: &str) {
        let fs = match self.ready_fs().await {
            Ok(fs) => fs,
            Err(err) => {
                warn!(name, error = %err, "dropping removal, storage unavailable");
                return;
            }
        };
        let lock = self.name_lock(name).await;
        let _guard = lock.lock().await;
        remove_if_exists(&fs, name).await;
    }

    /// Reads a synced file's content.
    pub async fn get_file(&self, name: &str) -> Result<String, EngineError> {
        let fs = self.ready_fs().await?;
        let entry = fs.open(name, false).await?;
        Ok(entry.read_text().await?)
    }

    /// Serves application requests until the channel closes. Each request is
    /// handled on its own task; ordering across distinct names is not
    /// guaranteed, same-name writes serialize on the per-name lock.
    pub async fn serve_requests(
        self: Arc<Self>,
        mut requests: mpsc::UnboundedReceiver<SyncRequest>,
    ) {
        while let Some(request) = requests.recv().await {
            let engine = Arc::clone(&self);
            tokio::spawn(async move { engine.handle_request(request).await });
        }
    }

    async fn handle_request(&self, request: SyncRequest) {
        match request {
            SyncRequest::AddFile { file, reply } | SyncRequest::UpdateFile { file, reply } => {
                let result = self.sync_file(&file).await;
                if let Some(reply) = reply {
                    let _ = reply.send(result);
                }
            }
            SyncRequest::RemoveFile { name, reply } => {
                self.remove_file(&name).await;
                if let Some(reply) = reply {
                    let _ = reply.send(());
                }
            }
            SyncRequest::ReadFile { name, reply } => {
                let _ = reply.send(self.get_file(&name).await);
            }
        }
    }

    async fn ready_fs(&self) -> Result<B::Fs, EngineError> {
        match &*self.phase.lock().await {
            GatewayPhase::Ready(fs) => Ok(fs.clone()),
            GatewayPhase::Failed => Err(EngineError::InitFailed),
            GatewayPhase::Uninitialized if !self.config.sync_enabled => {
                Err(EngineError::SyncDisabled)
            }
            _ => Err(EngineError::NotReady),
        }
    }

    async fn name_lock(&self, name: &str) -> Arc<Mutex<()>> {
        let mut locks = self.name_locks.lock().await;
        locks.entry(name.to_string()).or_default().clone()
    }
}
