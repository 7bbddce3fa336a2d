use crate::common::{PageId, TransactionId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LockError {
    #[error("transaction {tid} must abort: conflicting lock on page {pid}")]
    AbortRequired { tid: TransactionId, pid: PageId },
}

pub type LockResult<T> = Result<T, LockError>;
