use thiserror::Error;

use crate::fs::{FileWriter, FsError, WriterSignal};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WriteError {
    #[error("write failed: {0}")]
    Failed(FsError),
}

/// Commit phases of a single write. Truncating after the body write emits a
/// second completion signal on syncable backends; only the post-truncate
/// signal marks the write complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CommitState {
    NotTruncated,
    Truncated,
    Done,
}

/// Writes `content` as UTF-8 through `writer`, then truncates at the write
/// position so no bytes from a previous, longer write survive. Any writer
/// error in any state abandons the commit.
pub async fn commit_write<W: FileWriter>(writer: &mut W, content: &str) -> Result<(), WriteError> {
    writer.write(content.as_bytes()).await;
    let mut state = CommitState::NotTruncated;
    while state != CommitState::Done {
        match writer.next_signal().await {
            WriterSignal::WriteEnd { position } => {
                state = match state {
                    CommitState::NotTruncated => {
                        writer.truncate(position).await;
                        CommitState::Truncated
                    }
                    CommitState::Truncated | CommitState::Done => CommitState::Done,
                };
            }
            WriterSignal::Error(code) => return Err(WriteError::Failed(code)),
        }
    }
    Ok(())
}
