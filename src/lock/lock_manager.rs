use ahash::{AHashMap, AHashSet};

use super::error::{LockError, LockResult};
use crate::common::{PageId, Permissions, TransactionId};

/// Lock mode requested on a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockMode {
    Shared,
    Exclusive,
}

impl From<Permissions> for LockMode {
    fn from(perm: Permissions) -> Self {
        match perm {
            Permissions::ReadOnly => LockMode::Shared,
            Permissions::ReadWrite => LockMode::Exclusive,
        }
    }
}

/// Page-granularity strict two-phase lock manager.
///
/// A conflicting request never waits: it fails immediately with
/// [`LockError::AbortRequired`] and the requesting transaction must be rolled
/// back by the caller. Because no transaction ever blocks, deadlocks cannot
/// occur and there is no detection subsystem.
///
/// Invariant: for any page, at most one of {exclusive holder, non-empty
/// shared-holder set} exists at a time. The per-transaction held-page set
/// only records membership; the mode is re-derived from the per-page maps.
///
/// All state lives behind `&mut self`; the buffer pool is the sole consumer
/// and serializes access, so every grant/release is atomic as a whole.
#[derive(Debug, Default)]
pub struct LockManager {
    /// Pages each transaction currently holds, in any mode
    held_by_tx: AHashMap<TransactionId, AHashSet<PageId>>,
    /// Exclusive holder per page
    exclusive: AHashMap<PageId, TransactionId>,
    /// Shared holders per page
    shared: AHashMap<PageId, AHashSet<TransactionId>>,
}

impl LockManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grant `tid` a lock on `pid` in the requested mode, or fail with
    /// `AbortRequired`. Re-acquiring a lock already held (in the same or a
    /// stronger mode) is a no-op; a failed acquire leaves the lock state
    /// untouched.
    pub fn acquire(&mut self, tid: TransactionId, pid: PageId, mode: LockMode) -> LockResult<()> {
        match mode {
            LockMode::Shared => self.acquire_shared(tid, pid)?,
            LockMode::Exclusive => self.acquire_exclusive(tid, pid)?,
        }
        self.held_by_tx.entry(tid).or_default().insert(pid);
        Ok(())
    }

    fn acquire_shared(&mut self, tid: TransactionId, pid: PageId) -> LockResult<()> {
        if let Some(&holder) = self.exclusive.get(&pid) {
            if holder != tid {
                return Err(LockError::AbortRequired { tid, pid });
            }
            // exclusive already implies read access
            return Ok(());
        }
        self.shared.entry(pid).or_default().insert(tid);
        Ok(())
    }

    fn acquire_exclusive(&mut self, tid: TransactionId, pid: PageId) -> LockResult<()> {
        if let Some(&holder) = self.exclusive.get(&pid) {
            if holder != tid {
                return Err(LockError::AbortRequired { tid, pid });
            }
            return Ok(());
        }
        if let Some(sharers) = self.shared.get(&pid) {
            // an upgrade is only legal when tid is the sole shared holder
            if sharers.len() > 1 || (sharers.len() == 1 && !sharers.contains(&tid)) {
                return Err(LockError::AbortRequired { tid, pid });
            }
        }
        self.shared.remove(&pid);
        self.exclusive.insert(pid, tid);
        Ok(())
    }

    /// Release `tid`'s lock on `pid`. No-op if `tid` does not hold `pid`.
    pub fn release(&mut self, tid: TransactionId, pid: PageId) {
        let Some(pids) = self.held_by_tx.get_mut(&tid) else {
            return;
        };
        if !pids.remove(&pid) {
            return;
        }
        if pids.is_empty() {
            self.held_by_tx.remove(&tid);
        }

        if self.exclusive.get(&pid) == Some(&tid) {
            self.exclusive.remove(&pid);
        } else if let Some(sharers) = self.shared.get_mut(&pid) {
            sharers.remove(&tid);
            if sharers.is_empty() {
                self.shared.remove(&pid);
            }
        }
    }

    /// Release every lock `tid` holds. Used at transaction end.
    pub fn release_all(&mut self, tid: TransactionId) {
        // snapshot first: release mutates the held-page set
        let pids: Vec<PageId> = self.held_pages(tid);
        for pid in pids {
            self.release(tid, pid);
        }
    }

    /// Whether `tid` holds a lock on `pid` in any mode.
    pub fn holds(&self, tid: TransactionId, pid: PageId) -> bool {
        self.held_by_tx
            .get(&tid)
            .is_some_and(|pids| pids.contains(&pid))
    }

    /// Pages `tid` currently holds, in any mode. Used for flush-on-commit.
    pub fn held_pages(&self, tid: TransactionId) -> Vec<PageId> {
        self.held_by_tx
            .get(&tid)
            .map(|pids| pids.iter().copied().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid(page_no: usize) -> PageId {
        PageId::new(1, page_no)
    }

    #[test]
    fn test_shared_locks_coexist() {
        let mut lm = LockManager::new();
        let (t1, t2) = (TransactionId::new(), TransactionId::new());

        lm.acquire(t1, pid(0), LockMode::Shared).unwrap();
        lm.acquire(t2, pid(0), LockMode::Shared).unwrap();

        assert!(lm.holds(t1, pid(0)));
        assert!(lm.holds(t2, pid(0)));
    }

    #[test]
    fn test_exclusive_excludes_everyone_else() {
        let mut lm = LockManager::new();
        let (t1, t2) = (TransactionId::new(), TransactionId::new());

        lm.acquire(t1, pid(0), LockMode::Exclusive).unwrap();

        assert!(lm.acquire(t2, pid(0), LockMode::Shared).is_err());
        assert!(lm.acquire(t2, pid(0), LockMode::Exclusive).is_err());
        assert!(!lm.holds(t2, pid(0)));
    }

    #[test]
    fn test_exclusive_implies_read_access() {
        let mut lm = LockManager::new();
        let t1 = TransactionId::new();

        lm.acquire(t1, pid(0), LockMode::Exclusive).unwrap();
        lm.acquire(t1, pid(0), LockMode::Shared).unwrap();

        // still exclusive: another reader is rejected
        let t2 = TransactionId::new();
        assert!(lm.acquire(t2, pid(0), LockMode::Shared).is_err());
    }

    #[test]
    fn test_reacquire_is_idempotent() {
        let mut lm = LockManager::new();
        let t1 = TransactionId::new();

        lm.acquire(t1, pid(0), LockMode::Shared).unwrap();
        lm.acquire(t1, pid(0), LockMode::Shared).unwrap();
        lm.acquire(t1, pid(1), LockMode::Exclusive).unwrap();
        lm.acquire(t1, pid(1), LockMode::Exclusive).unwrap();

        let mut held = lm.held_pages(t1);
        held.sort_by_key(|p| p.page_no);
        assert_eq!(held, vec![pid(0), pid(1)]);
    }

    #[test]
    fn test_upgrade_as_sole_holder() {
        let mut lm = LockManager::new();
        let t1 = TransactionId::new();

        lm.acquire(t1, pid(0), LockMode::Shared).unwrap();
        lm.acquire(t1, pid(0), LockMode::Exclusive).unwrap();

        let t2 = TransactionId::new();
        assert!(lm.acquire(t2, pid(0), LockMode::Shared).is_err());
    }

    #[test]
    fn test_upgrade_blocked_then_succeeds_after_release() {
        let mut lm = LockManager::new();
        let (t1, t2) = (TransactionId::new(), TransactionId::new());

        lm.acquire(t1, pid(0), LockMode::Shared).unwrap();
        lm.acquire(t2, pid(0), LockMode::Shared).unwrap();

        // t2 also holds shared, so t1 cannot upgrade
        assert!(lm.acquire(t1, pid(0), LockMode::Exclusive).is_err());

        lm.release(t2, pid(0));
        lm.acquire(t1, pid(0), LockMode::Exclusive).unwrap();
        assert!(lm.holds(t1, pid(0)));
    }

    #[test]
    fn test_failed_upgrade_leaves_state_unchanged() {
        let mut lm = LockManager::new();
        let (t1, t2) = (TransactionId::new(), TransactionId::new());

        lm.acquire(t1, pid(0), LockMode::Shared).unwrap();
        lm.acquire(t2, pid(0), LockMode::Shared).unwrap();
        assert!(lm.acquire(t1, pid(0), LockMode::Exclusive).is_err());

        // both transactions still hold their shared locks
        assert!(lm.holds(t1, pid(0)));
        assert!(lm.holds(t2, pid(0)));

        // and a third reader is still admitted
        let t3 = TransactionId::new();
        lm.acquire(t3, pid(0), LockMode::Shared).unwrap();
    }

    #[test]
    fn test_release_unheld_is_noop() {
        let mut lm = LockManager::new();
        let (t1, t2) = (TransactionId::new(), TransactionId::new());

        lm.acquire(t1, pid(0), LockMode::Exclusive).unwrap();
        lm.release(t2, pid(0));

        assert!(lm.holds(t1, pid(0)));
    }

    #[test]
    fn test_release_all_clears_every_trace() {
        let mut lm = LockManager::new();
        let (t1, t2) = (TransactionId::new(), TransactionId::new());

        lm.acquire(t1, pid(0), LockMode::Shared).unwrap();
        lm.acquire(t1, pid(1), LockMode::Exclusive).unwrap();
        lm.acquire(t2, pid(0), LockMode::Shared).unwrap();

        lm.release_all(t1);

        assert!(lm.held_pages(t1).is_empty());
        assert!(!lm.holds(t1, pid(0)));
        assert!(!lm.holds(t1, pid(1)));

        // t1 left no trace: t2 can now take pid(0) exclusively and anyone
        // can take pid(1)
        lm.acquire(t2, pid(0), LockMode::Exclusive).unwrap();
        lm.acquire(t2, pid(1), LockMode::Exclusive).unwrap();
    }
}
