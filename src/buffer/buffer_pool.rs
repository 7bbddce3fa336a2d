use std::num::NonZeroUsize;
use std::sync::Arc;

use ahash::AHashMap;
use lru::LruCache;

use super::BUFFER_POOL_SIZE;
use super::error::{BufferError, BufferResult};
use crate::common::{PageId, Permissions, TransactionId};
use crate::heap::{HeapFile, HeapPage, Tuple};
use crate::lock::{LockManager, LockMode};

/// Transactional page cache: the single choke point for all page access.
///
/// Every `get_page` goes through the lock manager first, so page access is
/// serialized by strict two-phase locking. The pool caches a bounded number
/// of page frames, owns eviction (never a dirty frame) and owns the
/// commit/abort flush-or-discard policy.
///
/// Concurrent transactions share one pool behind a `Mutex`; all operations
/// take `&mut self` and run under that one coarse critical section.
pub struct BufferPool {
    /// Combined frame table and recency tracker. Capacity is enforced
    /// manually so a dirty frame is never silently dropped by the cache.
    pages: LruCache<PageId, HeapPage>,
    /// Maximum number of cached page frames
    capacity: usize,
    lock_manager: LockManager,
    /// Registered heap files by table id. Stands in for the catalog, which
    /// lives outside the kernel.
    files: AHashMap<u32, Arc<HeapFile>>,
}

impl BufferPool {
    pub fn new() -> Self {
        Self::with_capacity(BUFFER_POOL_SIZE)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            pages: LruCache::new(NonZeroUsize::new(capacity).unwrap()),
            capacity,
            lock_manager: LockManager::new(),
            files: AHashMap::new(),
        }
    }

    /// Register the backing file for a table so its pages can be loaded.
    pub fn register_file(&mut self, file: Arc<HeapFile>) {
        self.files.insert(file.table_id(), file);
    }

    /// Look up the registered file for a table.
    pub fn file(&self, table_id: u32) -> Option<&Arc<HeapFile>> {
        self.files.get(&table_id)
    }

    /// Fetch a page on behalf of `tid` under the requested permission.
    ///
    /// A lock conflict rolls the transaction back in place (its dirty pages
    /// are discarded and its locks released) before the error is returned.
    /// Callers must request `ReadWrite` before mutating the returned page.
    pub fn get_page(
        &mut self,
        tid: TransactionId,
        pid: PageId,
        perm: Permissions,
    ) -> BufferResult<&mut HeapPage> {
        if let Err(err) = self.lock_manager.acquire(tid, pid, LockMode::from(perm)) {
            self.unwind(tid);
            return Err(err.into());
        }

        if self.pages.contains(&pid) {
            return Ok(self.pages.get_mut(&pid).unwrap());
        }

        let file = self
            .files
            .get(&pid.table_id)
            .ok_or(BufferError::UnknownTable(pid.table_id))?
            .clone();
        if self.pages.len() >= self.capacity {
            self.evict_clean_page()?;
        }

        let page = file.read_page(pid.page_no)?;
        self.pages.put(pid, page);
        Ok(self.pages.get_mut(&pid).unwrap())
    }

    /// Drop the least recently used clean frame. Fails with
    /// `ResourceExhausted` when every frame is dirty: evicting one would
    /// leak another transaction's uncommitted writes to disk or lose them.
    fn evict_clean_page(&mut self) -> BufferResult<()> {
        // iteration runs most- to least-recently used, so the last clean
        // frame seen is the LRU clean one
        let victim = self
            .pages
            .iter()
            .filter(|(_, page)| !page.is_dirty())
            .map(|(pid, _)| *pid)
            .last();

        match victim {
            Some(pid) => {
                self.pages.pop(&pid);
                Ok(())
            }
            None => Err(BufferError::ResourceExhausted(self.pages.len())),
        }
    }

    /// Add `tuple` to `table_id`'s file and mark the modified page dirty.
    pub fn insert_tuple(
        &mut self,
        tid: TransactionId,
        table_id: u32,
        tuple: &mut Tuple,
    ) -> BufferResult<()> {
        let file = self
            .files
            .get(&table_id)
            .ok_or(BufferError::UnknownTable(table_id))?
            .clone();

        let pid = file.insert_tuple(self, tid, tuple)?;
        if let Some(page) = self.pages.peek_mut(&pid) {
            page.mark_dirty(tid);
        }
        Ok(())
    }

    /// Remove `tuple` (located via its carried record id) and mark the
    /// modified page dirty.
    pub fn delete_tuple(&mut self, tid: TransactionId, tuple: &Tuple) -> BufferResult<()> {
        let rid = tuple.record_id().ok_or(BufferError::MissingRecordId)?;
        let table_id = rid.page_id.table_id;
        let file = self
            .files
            .get(&table_id)
            .ok_or(BufferError::UnknownTable(table_id))?
            .clone();

        let pid = file.delete_tuple(self, tid, tuple)?;
        if let Some(page) = self.pages.peek_mut(&pid) {
            page.mark_dirty(tid);
        }
        Ok(())
    }

    /// Write the page back to its file if it is cached and dirty, then
    /// clear the dirty mark. No-op for uncached or clean pages.
    pub fn flush_page(&mut self, pid: PageId) -> BufferResult<()> {
        if let Some(page) = self.pages.peek_mut(&pid) {
            if page.is_dirty() {
                let file = self
                    .files
                    .get(&pid.table_id)
                    .ok_or(BufferError::UnknownTable(pid.table_id))?;
                file.write_page(page)?;
                page.clear_dirty();
            }
        }
        Ok(())
    }

    /// Flush every dirty page. Shutdown path only: committing transactions
    /// flush through `transaction_complete`.
    pub fn flush_all_pages(&mut self) -> BufferResult<()> {
        let dirty: Vec<PageId> = self
            .pages
            .iter()
            .filter(|(_, page)| page.is_dirty())
            .map(|(pid, _)| *pid)
            .collect();
        for pid in dirty {
            self.flush_page(pid)?;
        }
        Ok(())
    }

    /// End a transaction. Commit flushes every page the transaction holds
    /// and releases its locks; abort discards its dirty pages so the next
    /// access re-reads the pre-abort bytes from disk.
    pub fn transaction_complete(&mut self, tid: TransactionId, commit: bool) -> BufferResult<()> {
        if commit {
            for pid in self.lock_manager.held_pages(tid) {
                self.flush_page(pid)?;
            }
            self.lock_manager.release_all(tid);
        } else {
            self.unwind(tid);
        }
        Ok(())
    }

    /// Roll a transaction back: drop every page it dirtied from the cache
    /// and release all its locks. An aborted transaction leaves no trace.
    fn unwind(&mut self, tid: TransactionId) {
        for pid in self.lock_manager.held_pages(tid) {
            let dirtied_here = self
                .pages
                .peek(&pid)
                .is_some_and(|page| page.dirtied_by() == Some(tid));
            if dirtied_here {
                self.pages.pop(&pid);
            }
        }
        self.lock_manager.release_all(tid);
    }

    /// Whether `tid` holds a lock on `pid` in any mode.
    pub fn holds_lock(&self, tid: TransactionId, pid: PageId) -> bool {
        self.lock_manager.holds(tid, pid)
    }

    /// Number of pages currently cached.
    pub fn cached_pages(&self) -> usize {
        self.pages.len()
    }

    /// Whether `pid` is currently cached.
    pub fn is_page_cached(&self, pid: PageId) -> bool {
        self.pages.contains(&pid)
    }

    /// Number of cached pages with unflushed mutations.
    pub fn dirty_page_count(&self) -> usize {
        self.pages.iter().filter(|(_, page)| page.is_dirty()).count()
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new()
    }
}
