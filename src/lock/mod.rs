mod error;
mod lock_manager;

pub use error::{LockError, LockResult};
pub use lock_manager::{LockManager, LockMode};
