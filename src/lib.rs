//! Synchronizes application data files against a cloud-backed syncable
//! storage service. Local writes go through a two-phase write-then-truncate
//! commit; remote changes arrive as low-level file-status events and are
//! republished as typed domain events after filename decoding.

pub mod bus;
pub mod codec;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod fs;
pub mod remove;
pub mod write;

pub use bus::{EventBus, SyncEvent, SyncRequest};
pub use config::SyncConfig;
pub use engine::{EngineError, SyncEngine, SyncState};
pub use fs::{
    FileStatusEvent, FileSyncStatus, FsError, SyncAction, SyncDirection, SyncableFile,
};
