//! # Allocation Records
//!
//! Per-page record arena. Records are addressed by [`RecordIndex`] and linked
//! forward in ascending offset order; slots of removed records are recycled.

use crate::debug::SourceLine;

/// Metadata of one live allocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AllocRecord {
    /// Byte offset of the allocation from the page base.
    pub offset: usize,
    /// Occupied bytes: header (embedded layout) + payload + canary.
    pub size: usize,
    /// Free bytes between the end of this allocation and the next record
    /// (or the page end for the tail).
    pub freespace_beyond: usize,
    /// Global allocation id.
    pub id: u64,
    /// Next record by ascending offset.
    pub next: Option<RecordIndex>,
    /// Call site that requested the allocation, when source tracking is on.
    pub source: Option<SourceLine>,
}

impl AllocRecord {
    /// First byte past the allocation.
    #[inline]
    #[must_use]
    pub const fn end(&self) -> usize {
        self.offset + self.size
    }
}

/// Handle to a record slot inside one page.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RecordIndex {
    /// Index into the slot storage.
    index: usize,
}


/// Growable slot storage for records.
///
/// Freed slots go to a free list and are reused before the storage grows.
#[derive(Debug, Default)]
pub struct RecordPool {
    /// The storage array.
    storage: Vec<Option<AllocRecord>>,
    /// Indices of vacant slots.
    free_list: Vec<usize>,
    /// Number of occupied slots.
    allocated_count: usize,
}

impl RecordPool {
    /// Creates an empty pool.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            storage: Vec::new(),
            free_list: Vec::new(),
            allocated_count: 0,
        }
    }

    /// Returns the number of occupied slots.
    #[inline]
    #[must_use]
    pub const fn allocated_count(&self) -> usize {
        self.allocated_count
    }

    /// Number of slots ever created (occupied or vacant).
    #[inline]
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.storage.len()
    }

    /// Stores a record, reusing a vacant slot when there is one.
    pub fn insert(&mut self, record: AllocRecord) -> RecordIndex {
        self.allocated_count += 1;

        if let Some(index) = self.free_list.pop() {
            self.storage[index] = Some(record);
            return RecordIndex { index };
        }

        let index = self.storage.len();
        self.storage.push(Some(record));
        RecordIndex { index }
    }

    /// Removes a record, returning it. `None` if the slot was vacant.
    pub fn remove(&mut self, handle: RecordIndex) -> Option<AllocRecord> {
        let record = self.storage.get_mut(handle.index)?.take()?;
        self.free_list.push(handle.index);
        self.allocated_count -= 1;
        Some(record)
    }

    /// Gets a record.
    #[inline]
    #[must_use]
    pub fn get(&self, handle: RecordIndex) -> Option<&AllocRecord> {
        self.storage.get(handle.index)?.as_ref()
    }

    /// Gets a record mutably.
    #[inline]
    pub fn get_mut(&mut self, handle: RecordIndex) -> Option<&mut AllocRecord> {
        self.storage.get_mut(handle.index)?.as_mut()
    }

    /// Drops every record and all slots.
    pub fn clear(&mut self) {
        self.storage.clear();
        self.free_list.clear();
        self.allocated_count = 0;
    }
}
