use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Access level a transaction requests on a page.
///
/// `ReadOnly` maps onto a shared lock, `ReadWrite` onto an exclusive lock.
/// A caller must hold `ReadWrite` access before mutating page bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permissions {
    ReadOnly,
    ReadWrite,
}

static NEXT_TRANSACTION_ID: AtomicU64 = AtomicU64::new(0);

/// Process-unique token identifying one live transaction.
///
/// Created when the transaction begins and passed to every core operation.
/// Once the transaction commits or aborts the token is dead: all its locks
/// are released and no further operation should reference it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransactionId(u64);

impl TransactionId {
    pub fn new() -> Self {
        Self(NEXT_TRANSACTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tx{}", self.0)
    }
}

/// Globally unique identifier for one page: owning table plus page number.
/// Used as both the cache key and the lock key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageId {
    pub table_id: u32,
    pub page_no: usize,
}

impl PageId {
    pub fn new(table_id: u32, page_no: usize) -> Self {
        Self { table_id, page_no }
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.table_id, self.page_no)
    }
}

/// Slot identifier within a page
pub type SlotId = usize;

/// Physical identifier for a tuple's storage slot (page + slot).
///
/// Carried inside each materialized [`Tuple`](crate::heap::Tuple) so that
/// delete can locate its origin page and slot without a secondary lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordId {
    pub page_id: PageId,
    pub slot_id: SlotId,
}

impl RecordId {
    pub fn new(page_id: PageId, slot_id: SlotId) -> Self {
        Self { page_id, slot_id }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.page_id, self.slot_id)
    }
}
