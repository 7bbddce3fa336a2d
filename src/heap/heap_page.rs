use super::error::{HeapError, HeapResult};
use super::tuple::Tuple;
use crate::buffer::PAGE_SIZE;
use crate::common::{PageId, RecordId, SlotId, TransactionId};

/// Slotted heap page: a slot-validity bitmap followed by fixed-size tuple
/// slots, in one `PAGE_SIZE`-byte buffer.
///
/// With page size `P` and tuple size `T`, the page holds
/// `N = (P * 8) / (T * 8 + 1)` slots (each slot costs `T` bytes of payload
/// plus one header bit). The header occupies bytes `[0, ceil(N / 8))`; bit
/// `i` set means slot `i` holds a live tuple. Slot `i` occupies bytes
/// `[H + i*T, H + (i+1)*T)`.
///
/// The dirty flag and the identity of the last dirtying transaction travel
/// with the in-memory page object and are never written to disk.
#[derive(Debug, Clone)]
pub struct HeapPage {
    pid: PageId,
    tuple_size: usize,
    data: Vec<u8>,
    dirtier: Option<TransactionId>,
}

impl HeapPage {
    /// Number of tuple slots a page holds for the given tuple size.
    pub fn slots_per_page(tuple_size: usize) -> usize {
        (PAGE_SIZE * 8) / (tuple_size * 8 + 1)
    }

    /// Bitmap header size in bytes for the given tuple size.
    pub fn header_size(tuple_size: usize) -> usize {
        Self::slots_per_page(tuple_size).div_ceil(8)
    }

    /// Create an empty page: all-zero bytes, every slot free.
    pub fn new_empty(pid: PageId, tuple_size: usize) -> Self {
        Self {
            pid,
            tuple_size,
            data: vec![0u8; PAGE_SIZE],
            dirtier: None,
        }
    }

    /// Wrap raw on-disk bytes. The buffer must be exactly `PAGE_SIZE` bytes.
    pub fn from_bytes(pid: PageId, tuple_size: usize, data: Vec<u8>) -> HeapResult<Self> {
        if data.len() != PAGE_SIZE {
            return Err(HeapError::InvalidPageSize {
                expected: PAGE_SIZE,
                actual: data.len(),
            });
        }
        Ok(Self {
            pid,
            tuple_size,
            data,
            dirtier: None,
        })
    }

    pub fn id(&self) -> PageId {
        self.pid
    }

    pub fn tuple_size(&self) -> usize {
        self.tuple_size
    }

    /// The page's on-disk representation.
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn slot_count(&self) -> usize {
        Self::slots_per_page(self.tuple_size)
    }

    /// Whether slot `slot_id`'s header bit is set.
    pub fn is_slot_used(&self, slot_id: SlotId) -> bool {
        if slot_id >= self.slot_count() {
            return false;
        }
        (self.data[slot_id / 8] & (1 << (slot_id % 8))) != 0
    }

    pub fn empty_slot_count(&self) -> usize {
        (0..self.slot_count())
            .filter(|&slot_id| !self.is_slot_used(slot_id))
            .count()
    }

    fn first_free_slot(&self) -> Option<SlotId> {
        (0..self.slot_count()).find(|&slot_id| !self.is_slot_used(slot_id))
    }

    fn set_slot(&mut self, slot_id: SlotId, used: bool) {
        let byte_idx = slot_id / 8;
        let bit = 1u8 << (slot_id % 8);
        if used {
            self.data[byte_idx] |= bit;
        } else {
            self.data[byte_idx] &= !bit;
        }
    }

    fn slot_offset(&self, slot_id: SlotId) -> usize {
        Self::header_size(self.tuple_size) + slot_id * self.tuple_size
    }

    /// Write `tuple` into the first free slot and set its bit. Stamps the
    /// tuple's record id with the landing slot.
    pub fn insert_tuple(&mut self, tuple: &mut Tuple) -> HeapResult<RecordId> {
        if tuple.len() != self.tuple_size {
            return Err(HeapError::TupleSizeMismatch {
                expected: self.tuple_size,
                actual: tuple.len(),
            });
        }
        let slot_id = self
            .first_free_slot()
            .ok_or(HeapError::PageFull(self.pid))?;

        let start = self.slot_offset(slot_id);
        self.data[start..start + self.tuple_size].copy_from_slice(tuple.data());
        self.set_slot(slot_id, true);

        let rid = RecordId::new(self.pid, slot_id);
        tuple.set_record_id(rid);
        Ok(rid)
    }

    /// Clear the slot bit named by `rid`. Fails if the record does not
    /// belong to this page or the slot is already empty (double delete).
    pub fn delete_tuple(&mut self, rid: RecordId) -> HeapResult<()> {
        if rid.page_id != self.pid {
            return Err(HeapError::ForeignRecord(rid, self.pid.table_id));
        }
        if rid.slot_id >= self.slot_count() {
            return Err(HeapError::SlotOutOfRange {
                pid: self.pid,
                slot_id: rid.slot_id,
                slot_count: self.slot_count(),
            });
        }
        if !self.is_slot_used(rid.slot_id) {
            return Err(HeapError::EmptySlot(rid));
        }
        self.set_slot(rid.slot_id, false);
        Ok(())
    }

    /// Materialize the tuple stored in `slot_id`, record id included.
    pub fn tuple(&self, slot_id: SlotId) -> HeapResult<Tuple> {
        if slot_id >= self.slot_count() {
            return Err(HeapError::SlotOutOfRange {
                pid: self.pid,
                slot_id,
                slot_count: self.slot_count(),
            });
        }
        if !self.is_slot_used(slot_id) {
            return Err(HeapError::EmptySlot(RecordId::new(self.pid, slot_id)));
        }
        let start = self.slot_offset(slot_id);
        let mut tuple = Tuple::new(self.data[start..start + self.tuple_size].to_vec());
        tuple.set_record_id(RecordId::new(self.pid, slot_id));
        Ok(tuple)
    }

    /// Live tuples in ascending slot order.
    pub fn tuples(&self) -> impl Iterator<Item = Tuple> + '_ {
        (0..self.slot_count())
            .filter(|&slot_id| self.is_slot_used(slot_id))
            .map(|slot_id| {
                let start = self.slot_offset(slot_id);
                let mut tuple = Tuple::new(self.data[start..start + self.tuple_size].to_vec());
                tuple.set_record_id(RecordId::new(self.pid, slot_id));
                tuple
            })
    }

    pub fn mark_dirty(&mut self, tid: TransactionId) {
        self.dirtier = Some(tid);
    }

    pub fn clear_dirty(&mut self) {
        self.dirtier = None;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirtier.is_some()
    }

    /// The transaction that last dirtied this page, if any.
    pub fn dirtied_by(&self) -> Option<TransactionId> {
        self.dirtier
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TUPLE_SIZE: usize = 1000; // 4 slots per 4096-byte page, 1 header byte

    fn pid() -> PageId {
        PageId::new(1, 0)
    }

    fn tuple(fill: u8) -> Tuple {
        Tuple::new(vec![fill; TUPLE_SIZE])
    }

    #[test]
    fn test_slot_math() {
        assert_eq!(HeapPage::slots_per_page(TUPLE_SIZE), 4);
        assert_eq!(HeapPage::header_size(TUPLE_SIZE), 1);

        // header plus slots always fit in the page
        for tuple_size in [1, 8, 23, 100, 1000, 4000] {
            let slots = HeapPage::slots_per_page(tuple_size);
            let header = HeapPage::header_size(tuple_size);
            assert!(header + slots * tuple_size <= PAGE_SIZE, "T={}", tuple_size);
        }
    }

    #[test]
    fn test_insert_fills_first_free_slot() {
        let mut page = HeapPage::new_empty(pid(), TUPLE_SIZE);

        let rid0 = page.insert_tuple(&mut tuple(1)).unwrap();
        let rid1 = page.insert_tuple(&mut tuple(2)).unwrap();
        assert_eq!(rid0.slot_id, 0);
        assert_eq!(rid1.slot_id, 1);
        assert_eq!(page.empty_slot_count(), 2);

        // freeing slot 0 makes it the next landing spot again
        page.delete_tuple(rid0).unwrap();
        let rid2 = page.insert_tuple(&mut tuple(3)).unwrap();
        assert_eq!(rid2.slot_id, 0);
    }

    #[test]
    fn test_insert_stamps_record_id() {
        let mut page = HeapPage::new_empty(pid(), TUPLE_SIZE);
        let mut t = tuple(9);
        assert_eq!(t.record_id(), None);
        let rid = page.insert_tuple(&mut t).unwrap();
        assert_eq!(t.record_id(), Some(rid));
        assert_eq!(rid.page_id, pid());
    }

    #[test]
    fn test_insert_into_full_page_fails() {
        let mut page = HeapPage::new_empty(pid(), TUPLE_SIZE);
        for i in 0..page.slot_count() {
            page.insert_tuple(&mut tuple(i as u8)).unwrap();
        }
        let result = page.insert_tuple(&mut tuple(99));
        assert!(matches!(result, Err(HeapError::PageFull(_))));
    }

    #[test]
    fn test_tuple_size_mismatch() {
        let mut page = HeapPage::new_empty(pid(), TUPLE_SIZE);
        let result = page.insert_tuple(&mut Tuple::new(vec![0; TUPLE_SIZE - 1]));
        assert!(matches!(result, Err(HeapError::TupleSizeMismatch { .. })));
    }

    #[test]
    fn test_delete_clears_exactly_one_bit() {
        let mut page = HeapPage::new_empty(pid(), TUPLE_SIZE);
        let rid0 = page.insert_tuple(&mut tuple(1)).unwrap();
        let rid1 = page.insert_tuple(&mut tuple(2)).unwrap();

        page.delete_tuple(rid0).unwrap();
        assert!(!page.is_slot_used(rid0.slot_id));
        assert!(page.is_slot_used(rid1.slot_id));
    }

    #[test]
    fn test_double_delete_fails() {
        let mut page = HeapPage::new_empty(pid(), TUPLE_SIZE);
        let rid = page.insert_tuple(&mut tuple(1)).unwrap();
        page.delete_tuple(rid).unwrap();
        let result = page.delete_tuple(rid);
        assert!(matches!(result, Err(HeapError::EmptySlot(_))));
    }

    #[test]
    fn test_delete_foreign_record_fails() {
        let mut page = HeapPage::new_empty(pid(), TUPLE_SIZE);
        page.insert_tuple(&mut tuple(1)).unwrap();

        let foreign = RecordId::new(PageId::new(2, 0), 0);
        assert!(matches!(
            page.delete_tuple(foreign),
            Err(HeapError::ForeignRecord(..))
        ));

        let out_of_range = RecordId::new(pid(), page.slot_count());
        assert!(matches!(
            page.delete_tuple(out_of_range),
            Err(HeapError::SlotOutOfRange { .. })
        ));
    }

    #[test]
    fn test_bytes_round_trip() {
        let mut page = HeapPage::new_empty(pid(), TUPLE_SIZE);
        page.insert_tuple(&mut tuple(7)).unwrap();
        page.insert_tuple(&mut tuple(8)).unwrap();
        let rid = page.insert_tuple(&mut tuple(9)).unwrap();
        page.delete_tuple(rid).unwrap();

        let restored = HeapPage::from_bytes(pid(), TUPLE_SIZE, page.bytes().to_vec()).unwrap();
        assert_eq!(restored.bytes(), page.bytes());
        for slot_id in 0..page.slot_count() {
            assert_eq!(restored.is_slot_used(slot_id), page.is_slot_used(slot_id));
        }
        assert_eq!(restored.tuple(0).unwrap().data(), tuple(7).data());
        assert_eq!(restored.tuple(1).unwrap().data(), tuple(8).data());
    }

    #[test]
    fn test_from_bytes_rejects_wrong_size() {
        let result = HeapPage::from_bytes(pid(), TUPLE_SIZE, vec![0; PAGE_SIZE - 1]);
        assert!(matches!(result, Err(HeapError::InvalidPageSize { .. })));
    }

    #[test]
    fn test_tuples_iterates_in_slot_order() {
        let mut page = HeapPage::new_empty(pid(), TUPLE_SIZE);
        let rid0 = page.insert_tuple(&mut tuple(1)).unwrap();
        page.insert_tuple(&mut tuple(2)).unwrap();
        page.insert_tuple(&mut tuple(3)).unwrap();
        page.delete_tuple(rid0).unwrap();

        let slots: Vec<SlotId> = page
            .tuples()
            .map(|t| t.record_id().unwrap().slot_id)
            .collect();
        assert_eq!(slots, vec![1, 2]);
    }

    #[test]
    fn test_dirty_tracking() {
        let mut page = HeapPage::new_empty(pid(), TUPLE_SIZE);
        assert!(!page.is_dirty());

        let tid = TransactionId::new();
        page.mark_dirty(tid);
        assert!(page.is_dirty());
        assert_eq!(page.dirtied_by(), Some(tid));

        page.clear_dirty();
        assert!(!page.is_dirty());
        assert_eq!(page.dirtied_by(), None);
    }
}
