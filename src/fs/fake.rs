//! In-memory backend for tests.
//!
//! Models the syncable store's observable behavior: writes replace a prefix
//! of the stored bytes and leave any longer previous content in place until
//! truncated, and truncation emits its own completion signal. Every
//! operation yields once and appends to a shared log so tests can assert
//! serialization of concurrent commits.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use super::{
    FileEntry, FileStatusEvent, FileWriter, FsError, StorageBackend, SyncableFs, WriterSignal,
};

#[derive(Default)]
struct FakeState {
    files: Mutex<HashMap<String, Vec<u8>>>,
    op_log: Mutex<Vec<String>>,
    reads: AtomicUsize,
    fail_writes: Mutex<HashSet<String>>,
    fail_truncates: Mutex<HashSet<String>>,
}

impl FakeState {
    fn log(&self, op: String) {
        self.op_log.lock().unwrap().push(op);
    }
}

#[derive(Clone, Default)]
pub(crate) struct FakeFs {
    state: Arc<FakeState>,
}

impl FakeFs {
    pub fn seed(&self, name: &str, content: &str) {
        self.state
            .files
            .lock()
            .unwrap()
            .insert(name.to_string(), content.as_bytes().to_vec());
    }

    pub fn contents(&self, name: &str) -> Option<String> {
        self.state
            .files
            .lock()
            .unwrap()
            .get(name)
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }

    pub fn exists(&self, name: &str) -> bool {
        self.state.files.lock().unwrap().contains_key(name)
    }

    pub fn read_count(&self) -> usize {
        self.state.reads.load(Ordering::SeqCst)
    }

    pub fn op_log(&self) -> Vec<String> {
        self.state.op_log.lock().unwrap().clone()
    }

    pub fn fail_writes_to(&self, name: &str) {
        self.state
            .fail_writes
            .lock()
            .unwrap()
            .insert(name.to_string());
    }

    pub fn fail_truncates_of(&self, name: &str) {
        self.state
            .fail_truncates
            .lock()
            .unwrap()
            .insert(name.to_string());
    }
}

impl SyncableFs for FakeFs {
    type Entry = FakeEntry;

    async fn open(&self, name: &str, create: bool) -> Result<FakeEntry, FsError> {
        self.state.log(format!("open:{name}"));
        tokio::task::yield_now().await;
        let mut files = self.state.files.lock().unwrap();
        if !files.contains_key(name) {
            if !create {
                return Err(FsError::NotFound);
            }
            files.insert(name.to_string(), Vec::new());
        }
        Ok(FakeEntry {
            name: name.to_string(),
            state: Arc::clone(&self.state),
        })
    }
}

pub(crate) struct FakeEntry {
    name: String,
    state: Arc<FakeState>,
}

impl FileEntry for FakeEntry {
    type Writer = FakeWriter;

    async fn create_writer(&self) -> Result<FakeWriter, FsError> {
        self.state.log(format!("create_writer:{}", self.name));
        tokio::task::yield_now().await;
        Ok(FakeWriter {
            name: self.name.clone(),
            state: Arc::clone(&self.state),
            signals: VecDeque::new(),
        })
    }

    async fn read_text(&self) -> Result<String, FsError> {
        self.state.reads.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        let files = self.state.files.lock().unwrap();
        let bytes = files.get(&self.name).ok_or(FsError::NotFound)?;
        String::from_utf8(bytes.clone())
            .map_err(|_| FsError::Unknown("file content is not valid UTF-8".into()))
    }

    async fn remove(&self) -> Result<(), FsError> {
        self.state.log(format!("remove:{}", self.name));
        tokio::task::yield_now().await;
        self.state
            .files
            .lock()
            .unwrap()
            .remove(&self.name)
            .map(|_| ())
            .ok_or(FsError::NotFound)
    }
}

pub(crate) struct FakeWriter {
    name: String,
    state: Arc<FakeState>,
    signals: VecDeque<WriterSignal>,
}

impl FileWriter for FakeWriter {
    async fn write(&mut self, bytes: &[u8]) {
        self.state.log(format!("write:{}", self.name));
        tokio::task::yield_now().await;
        if self.state.fail_writes.lock().unwrap().contains(&self.name) {
            self.signals
                .push_back(WriterSignal::Error(FsError::QuotaExceeded));
            return;
        }
        let mut files = self.state.files.lock().unwrap();
        let data = files.entry(self.name.clone()).or_default();
        if data.len() > bytes.len() {
            data[..bytes.len()].copy_from_slice(bytes);
        } else {
            *data = bytes.to_vec();
        }
        self.signals.push_back(WriterSignal::WriteEnd {
            position: bytes.len() as u64,
        });
    }

    async fn truncate(&mut self, len: u64) {
        self.state.log(format!("truncate:{}", self.name));
        tokio::task::yield_now().await;
        if self
            .state
            .fail_truncates
            .lock()
            .unwrap()
            .contains(&self.name)
        {
            self.signals
                .push_back(WriterSignal::Error(FsError::InvalidModification));
            return;
        }
        let mut files = self.state.files.lock().unwrap();
        let data = files.entry(self.name.clone()).or_default();
        data.truncate(len as usize);
        self.signals
            .push_back(WriterSignal::WriteEnd { position: len });
    }

    async fn next_signal(&mut self) -> WriterSignal {
        tokio::task::yield_now().await;
        self.signals
            .pop_front()
            .unwrap_or(WriterSignal::Error(FsError::InvalidState))
    }
}

pub(crate) struct FakeBackend {
    fs: FakeFs,
    events_tx: mpsc::UnboundedSender<FileStatusEvent>,
    events_rx: Mutex<Option<mpsc::UnboundedReceiver<FileStatusEvent>>>,
    fail_open: bool,
}

impl FakeBackend {
    pub fn new() -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            fs: FakeFs::default(),
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
            fail_open: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_open: true,
            ..Self::new()
        }
    }

    pub fn fs(&self) -> FakeFs {
        self.fs.clone()
    }

    pub fn status_sender(&self) -> mpsc::UnboundedSender<FileStatusEvent> {
        self.events_tx.clone()
    }
}

impl StorageBackend for FakeBackend {
    type Fs = FakeFs;

    async fn request_file_system(
        &self,
    ) -> Result<(FakeFs, mpsc::UnboundedReceiver<FileStatusEvent>), FsError> {
        if self.fail_open {
            return Err(FsError::Security);
        }
        let events = self
            .events_rx
            .lock()
            .unwrap()
            .take()
            .ok_or(FsError::InvalidState)?;
        Ok((self.fs.clone(), events))
    }
}
