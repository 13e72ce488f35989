//! Backend over a local directory.
//!
//! Implements the storage traits on top of `tokio::fs`, treating one
//! directory as the local replica of the syncable store. Remote change
//! events are not observed here; the embedding cloud layer feeds them
//! through the sender returned by [`LocalDirBackend::status_sender`].

use std::collections::VecDeque;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, mpsc};

use super::{
    FileEntry, FileStatusEvent, FileWriter, FsError, StorageBackend, SyncableFs, WriterSignal,
};

pub struct LocalDirBackend {
    root: PathBuf,
    events_tx: mpsc::UnboundedSender<FileStatusEvent>,
    events_rx: Mutex<Option<mpsc::UnboundedReceiver<FileStatusEvent>>>,
}

impl LocalDirBackend {
    pub fn new(root: PathBuf) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            root,
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
        }
    }

    /// Sender for remote status-change events; hand this to whatever layer
    /// observes the remote side.
    pub fn status_sender(&self) -> mpsc::UnboundedSender<FileStatusEvent> {
        self.events_tx.clone()
    }
}

impl StorageBackend for LocalDirBackend {
    type Fs = LocalFs;

    async fn request_file_system(
        &self,
    ) -> Result<(LocalFs, mpsc::UnboundedReceiver<FileStatusEvent>), FsError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|err| map_io_error(&err))?;
        // The event feed is single-consumer; a second handle request has no
        // feed left to hand out.
        let events = self
            .events_rx
            .lock()
            .await
            .take()
            .ok_or(FsError::InvalidState)?;
        Ok((
            LocalFs {
                root: Arc::new(self.root.clone()),
            },
            events,
        ))
    }
}

#[derive(Clone)]
pub struct LocalFs {
    root: Arc<PathBuf>,
}

impl SyncableFs for LocalFs {
    type Entry = LocalEntry;

    async fn open(&self, name: &str, create: bool) -> Result<LocalEntry, FsError> {
        let path = self.root.join(checked_name(name)?);
        if create {
            // Create without truncating; residual bytes are the commit
            // protocol's problem, not open's.
            let file = OpenOptions::new()
                .write(true)
                .create(true)
                .open(&path)
                .await
                .map_err(|err| map_io_error(&err))?;
            drop(file);
        } else {
            tokio::fs::metadata(&path)
                .await
                .map_err(|err| map_io_error(&err))?;
        }
        Ok(LocalEntry { path })
    }
}

pub struct LocalEntry {
    path: PathBuf,
}

impl FileEntry for LocalEntry {
    type Writer = LocalWriter;

    async fn create_writer(&self) -> Result<LocalWriter, FsError> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .open(&self.path)
            .await
            .map_err(|err| map_io_error(&err))?;
        Ok(LocalWriter {
            file,
            position: 0,
            signals: VecDeque::new(),
        })
    }

    async fn read_text(&self) -> Result<String, FsError> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|err| map_io_error(&err))?;
        String::from_utf8(bytes)
            .map_err(|_| FsError::Unknown("file content is not valid UTF-8".into()))
    }

    async fn remove(&self) -> Result<(), FsError> {
        tokio::fs::remove_file(&self.path)
            .await
            .map_err(|err| map_io_error(&err))
    }
}

pub struct LocalWriter {
    file: tokio::fs::File,
    position: u64,
    signals: VecDeque<WriterSignal>,
}

impl FileWriter for LocalWriter {
    async fn write(&mut self, bytes: &[u8]) {
        let signal = match self.file.write_all(bytes).await {
            Ok(()) => {
                self.position += bytes.len() as u64;
                WriterSignal::WriteEnd {
                    position: self.position,
                }
            }
            Err(err) => WriterSignal::Error(map_io_error(&err)),
        };
        self.signals.push_back(signal);
    }

    async fn truncate(&mut self, len: u64) {
        let result = async {
            self.file.flush().await?;
            self.file.set_len(len).await
        }
        .await;
        let signal = match result {
            Ok(()) => {
                self.position = len;
                WriterSignal::WriteEnd { position: len }
            }
            Err(err) => WriterSignal::Error(map_io_error(&err)),
        };
        self.signals.push_back(signal);
    }

    async fn next_signal(&mut self) -> WriterSignal {
        // Signals are queued by the operation that produced them; an empty
        // queue means the protocol asked for a signal it never scheduled.
        self.signals
            .pop_front()
            .unwrap_or(WriterSignal::Error(FsError::InvalidState))
    }
}

/// Storage names are flat; anything path-like would escape the replica root.
fn checked_name(name: &str) -> Result<&str, FsError> {
    if name.is_empty()
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.contains('\\')
    {
        return Err(FsError::Security);
    }
    Ok(name)
}

fn map_io_error(err: &std::io::Error) -> FsError {
    match err.kind() {
        ErrorKind::NotFound => FsError::NotFound,
        ErrorKind::PermissionDenied => FsError::Security,
        ErrorKind::StorageFull | ErrorKind::QuotaExceeded => FsError::QuotaExceeded,
        _ => FsError::Unknown(err.to_string()),
    }
}
