//! Storage-backend abstraction.
//!
//! The syncable storage service is an external collaborator: it hands out a
//! filesystem handle, mirrors file operations to a remote service, and
//! delivers [`FileStatusEvent`]s when remote state changes. Writers signal
//! completion asynchronously via [`WriterSignal`]s rather than return values,
//! because the commit protocol depends on counting completions (a truncate
//! issued after a write emits its own completion signal on these backends).

use std::future::Future;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::codec;

pub mod local;

#[cfg(test)]
pub(crate) mod fake;

/// Backend-reported error codes.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FsError {
    #[error("storage quota exceeded")]
    QuotaExceeded,
    #[error("file not found")]
    NotFound,
    #[error("security violation")]
    Security,
    #[error("invalid modification")]
    InvalidModification,
    #[error("invalid state")]
    InvalidState,
    #[error("unknown storage error: {0}")]
    Unknown(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncDirection {
    /// A remote change was applied to the local replica.
    RemoteToLocal,
    /// A local write was confirmed remotely.
    LocalToRemote,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncAction {
    Added,
    Updated,
    Deleted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileSyncStatus {
    Synced,
    Conflicting,
    Other,
}

/// A low-level change notification from the backend. Immutable, consumed once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStatusEvent {
    pub file_name: String,
    pub direction: SyncDirection,
    pub action: SyncAction,
    pub status: FileSyncStatus,
}

/// Transient per-operation DTO; the storage name is always derived from the
/// identity pair, never stored alongside it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncableFile {
    pub resource_id: String,
    pub resource_type: String,
    pub content: String,
}

impl SyncableFile {
    pub fn storage_name(&self) -> String {
        codec::encode(&self.resource_id, &self.resource_type)
    }
}

/// Completion signals delivered by a [`FileWriter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriterSignal {
    /// A write or truncate finished; `position` is the writer's offset after
    /// the operation.
    WriteEnd { position: u64 },
    Error(FsError),
}

pub trait StorageBackend: Send + Sync + 'static {
    type Fs: SyncableFs;

    /// Requests the syncable filesystem handle together with the feed of
    /// remote status-change events.
    fn request_file_system(
        &self,
    ) -> impl Future<Output = Result<(Self::Fs, mpsc::UnboundedReceiver<FileStatusEvent>), FsError>>
    + Send;
}

pub trait SyncableFs: Clone + Send + Sync + 'static {
    type Entry: FileEntry;

    /// Opens `name`, creating the file when `create` is set. Opening a
    /// missing file without `create` fails with [`FsError::NotFound`].
    fn open(
        &self,
        name: &str,
        create: bool,
    ) -> impl Future<Output = Result<Self::Entry, FsError>> + Send;
}

pub trait FileEntry: Send {
    type Writer: FileWriter;

    fn create_writer(&self) -> impl Future<Output = Result<Self::Writer, FsError>> + Send;

    /// Reads the whole file as UTF-8 text.
    fn read_text(&self) -> impl Future<Output = Result<String, FsError>> + Send;

    fn remove(&self) -> impl Future<Output = Result<(), FsError>> + Send;
}

/// A handle bound to one file supporting sequential write and truncate.
/// Outcomes arrive via [`next_signal`](Self::next_signal), never as return
/// values.
pub trait FileWriter: Send {
    /// Begins writing `bytes` at the current position.
    fn write(&mut self, bytes: &[u8]) -> impl Future<Output = ()> + Send;

    /// Begins truncating the file to `len` bytes.
    fn truncate(&mut self, len: u64) -> impl Future<Output = ()> + Send;

    fn next_signal(&mut self) -> impl Future<Output = WriterSignal> + Send;
}
