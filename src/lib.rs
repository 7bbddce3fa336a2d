pub mod buffer;
pub mod common;
pub mod heap;
pub mod lock;

pub use buffer::{BUFFER_POOL_SIZE, BufferError, BufferPool, BufferResult, PAGE_SIZE};
pub use common::{PageId, Permissions, RecordId, SlotId, TransactionId};
pub use heap::{HeapError, HeapFile, HeapFileIterator, HeapPage, HeapResult, Tuple};
pub use lock::{LockError, LockManager, LockMode, LockResult};
