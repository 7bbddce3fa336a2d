mod buffer_pool;
mod error;

pub use buffer_pool::BufferPool;
pub use error::{BufferError, BufferResult};

/// Page size in bytes, shared by every file and page instance.
pub const PAGE_SIZE: usize = 4096;

/// Default number of page frames held by the buffer pool.
pub const BUFFER_POOL_SIZE: usize = 50;
