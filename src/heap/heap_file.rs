use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use super::error::{HeapError, HeapResult};
use super::heap_page::HeapPage;
use super::tuple::Tuple;
use crate::buffer::{BufferError, BufferPool, BufferResult, PAGE_SIZE};
use crate::common::{PageId, Permissions, SlotId, TransactionId};

/// Heap-organized table file: a concatenation of fixed-size slotted pages in
/// page-number order, with no file-level header and no tuple ordering.
///
/// The file produces pages on demand (`read_page`) and persists them on
/// flush (`write_page`) but does not cache them; the buffer pool owns every
/// cached page. Tuple-level operations go through the buffer pool so they
/// participate in page locking.
pub struct HeapFile {
    table_id: u32,
    tuple_size: usize,
    path: PathBuf,
    file: Mutex<File>,
    /// Logical page count: derived from the file length at open, grown by
    /// insert before the new page reaches disk.
    page_count: AtomicUsize,
}

impl HeapFile {
    /// Open (or create) the backing file for a table whose tuples are
    /// `tuple_size` bytes wide.
    pub fn open<P: AsRef<Path>>(path: P, table_id: u32, tuple_size: usize) -> HeapResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;
        let page_count = file.metadata()?.len() as usize / PAGE_SIZE;

        Ok(Self {
            table_id,
            tuple_size,
            path,
            file: Mutex::new(file),
            page_count: AtomicUsize::new(page_count),
        })
    }

    pub fn table_id(&self) -> u32 {
        self.table_id
    }

    pub fn tuple_size(&self) -> usize {
        self.tuple_size
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of pages the file logically holds.
    pub fn num_pages(&self) -> usize {
        self.page_count.load(Ordering::Relaxed)
    }

    /// Read the page at `page_no` from disk. Reading the page just past the
    /// current extent yields an empty page (this is how the file grows);
    /// anything further out is an error.
    pub fn read_page(&self, page_no: usize) -> HeapResult<HeapPage> {
        let page_count = self.num_pages();
        if page_no > page_count {
            return Err(HeapError::PageOutOfBounds {
                page_no,
                page_count,
            });
        }

        let mut data = vec![0u8; PAGE_SIZE];
        let mut file = self.file.lock().unwrap();
        file.seek(SeekFrom::Start((page_no * PAGE_SIZE) as u64))?;
        let bytes_read = file.read(&mut data)?;
        // a short read is the growth frontier: the rest stays zeroed
        if bytes_read < PAGE_SIZE {
            data[bytes_read..].fill(0);
        }

        HeapPage::from_bytes(PageId::new(self.table_id, page_no), self.tuple_size, data)
    }

    /// Write the page's bytes at `page_no * PAGE_SIZE`, extending the file
    /// (and the logical page count) when writing past the current extent.
    pub fn write_page(&self, page: &HeapPage) -> HeapResult<()> {
        let page_no = page.id().page_no;
        let offset = (page_no * PAGE_SIZE) as u64;
        let required = offset + PAGE_SIZE as u64;

        let mut file = self.file.lock().unwrap();
        if file.metadata()?.len() < required {
            file.set_len(required)?;
        }
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(page.bytes())?;

        self.page_count.fetch_max(page_no + 1, Ordering::Relaxed);
        Ok(())
    }

    /// Place `tuple` in the first page (ascending page order) with a free
    /// slot, appending one new page only when every existing page is full.
    /// Returns the single modified page; the caller marks it dirty.
    pub fn insert_tuple(
        &self,
        pool: &mut BufferPool,
        tid: TransactionId,
        tuple: &mut Tuple,
    ) -> BufferResult<PageId> {
        for page_no in 0..self.num_pages() {
            let pid = PageId::new(self.table_id, page_no);
            let has_room = pool
                .get_page(tid, pid, Permissions::ReadOnly)?
                .empty_slot_count()
                > 0;
            if has_room {
                let page = pool.get_page(tid, pid, Permissions::ReadWrite)?;
                page.insert_tuple(tuple)?;
                return Ok(pid);
            }
        }

        // every existing page is full: grow the file by exactly one page
        let pid = PageId::new(self.table_id, self.num_pages());
        let page = pool.get_page(tid, pid, Permissions::ReadWrite)?;
        page.insert_tuple(tuple)?;
        self.page_count.fetch_add(1, Ordering::Relaxed);
        Ok(pid)
    }

    /// Delete `tuple` from the page named by its carried record id.
    /// Returns the single modified page; the caller marks it dirty.
    pub fn delete_tuple(
        &self,
        pool: &mut BufferPool,
        tid: TransactionId,
        tuple: &Tuple,
    ) -> BufferResult<PageId> {
        let rid = tuple.record_id().ok_or(BufferError::MissingRecordId)?;
        if rid.page_id.table_id != self.table_id || rid.page_id.page_no >= self.num_pages() {
            return Err(HeapError::ForeignRecord(rid, self.table_id).into());
        }

        let page = pool.get_page(tid, rid.page_id, Permissions::ReadWrite)?;
        page.delete_tuple(rid)?;
        Ok(rid.page_id)
    }

    /// Lazy scan over every live tuple, fetching pages through the buffer
    /// pool under `ReadOnly` so the scan participates in locking.
    pub fn iter(self: &Arc<Self>, tid: TransactionId, pool: Arc<Mutex<BufferPool>>) -> HeapFileIterator {
        HeapFileIterator::new(Arc::clone(self), tid, pool)
    }
}

/// Iterator over a heap file's live tuples in ascending (page, slot) order,
/// skipping unset slots. Restartable via [`HeapFileIterator::rewind`].
pub struct HeapFileIterator {
    file: Arc<HeapFile>,
    tid: TransactionId,
    pool: Arc<Mutex<BufferPool>>,
    page_no: usize,
    slot_id: SlotId,
}

impl HeapFileIterator {
    fn new(file: Arc<HeapFile>, tid: TransactionId, pool: Arc<Mutex<BufferPool>>) -> Self {
        Self {
            file,
            tid,
            pool,
            page_no: 0,
            slot_id: 0,
        }
    }

    /// Restart the scan from the first page.
    pub fn rewind(&mut self) {
        self.page_no = 0;
        self.slot_id = 0;
    }
}

impl Iterator for HeapFileIterator {
    type Item = BufferResult<Tuple>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.page_no >= self.file.num_pages() {
                return None;
            }

            let pid = PageId::new(self.file.table_id(), self.page_no);
            let mut pool = self.pool.lock().unwrap();
            let page = match pool.get_page(self.tid, pid, Permissions::ReadOnly) {
                Ok(page) => page,
                Err(err) => return Some(Err(err)),
            };

            for slot_id in self.slot_id..page.slot_count() {
                if page.is_slot_used(slot_id) {
                    let tuple = match page.tuple(slot_id) {
                        Ok(tuple) => tuple,
                        Err(err) => return Some(Err(err.into())),
                    };
                    self.slot_id = slot_id + 1;
                    return Some(Ok(tuple));
                }
            }

            self.page_no += 1;
            self.slot_id = 0;
        }
    }
}
