use crate::common::{PageId, RecordId, SlotId};
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HeapError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("page {page_no} is beyond the file's extent of {page_count} page(s)")]
    PageOutOfBounds { page_no: usize, page_count: usize },

    #[error("invalid page size: expected {expected}, got {actual}")]
    InvalidPageSize { expected: usize, actual: usize },

    #[error("tuple size mismatch: expected {expected} bytes, got {actual}")]
    TupleSizeMismatch { expected: usize, actual: usize },

    #[error("page {0} has no free slot")]
    PageFull(PageId),

    #[error("slot {0} is already empty")]
    EmptySlot(RecordId),

    #[error("slot {slot_id} is out of range for page {pid} ({slot_count} slots)")]
    SlotOutOfRange {
        pid: PageId,
        slot_id: SlotId,
        slot_count: usize,
    },

    #[error("record {0} does not belong to table {1}")]
    ForeignRecord(RecordId, u32),
}

pub type HeapResult<T> = Result<T, HeapError>;
