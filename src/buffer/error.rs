use crate::heap::HeapError;
use crate::lock::LockError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BufferError {
    /// Lock conflict: the requesting transaction has been rolled back and
    /// must be retried from scratch by the caller.
    #[error("{0}")]
    Abort(#[from] LockError),

    #[error("heap error: {0}")]
    Heap(#[from] HeapError),

    /// Every cached frame is dirty, so there is no safe eviction victim.
    /// The calling transaction should abort to free pages.
    #[error("buffer pool exhausted: all {0} cached pages are dirty")]
    ResourceExhausted(usize),

    #[error("no file registered for table {0}")]
    UnknownTable(u32),

    #[error("tuple carries no record id")]
    MissingRecordId,
}

impl BufferError {
    /// True when the failing transaction was aborted by a lock conflict.
    pub fn is_abort(&self) -> bool {
        matches!(self, BufferError::Abort(_))
    }
}

pub type BufferResult<T> = Result<T, BufferError>;
