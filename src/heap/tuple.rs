use crate::common::RecordId;

/// A fixed-size record. The byte width is dictated by the owning table; the
/// kernel treats the payload as opaque bytes.
///
/// The record id is populated when the tuple is read from a page or inserted
/// into one, and is consumed when deleting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tuple {
    data: Vec<u8>,
    rid: Option<RecordId>,
}

impl Tuple {
    /// Create a tuple that is not yet stored anywhere.
    pub fn new(data: Vec<u8>) -> Self {
        Self { data, rid: None }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn record_id(&self) -> Option<RecordId> {
        self.rid
    }

    pub fn set_record_id(&mut self, rid: RecordId) {
        self.rid = Some(rid);
    }
}
