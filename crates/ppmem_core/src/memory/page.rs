//! # Page
//!
//! One contiguous, zero-initialised buffer and the ordered list of records
//! that occupy it.
//!
//! ## Invariants
//!
//! - The record list is sorted by ascending `offset`.
//! - `offset + size <= capacity` for every record.
//! - `head_gap + Σ size + Σ freespace_beyond == capacity`.

use std::marker::PhantomData;

use super::layout::RecordLayout;
use super::placement::{Placement, PlacementLink};
use super::record::{AllocRecord, RecordIndex, RecordPool};
use super::{MemPtr, CANARY, CANARY_SIZE, FREED_MARK};
use crate::debug::SourceLine;
use crate::error::CorruptionKind;

/// A reserved memory region managed by the allocator.
pub struct Page<L: RecordLayout> {
    /// The backing storage. Never reallocated, so its address is stable.
    pub(super) buffer: Box<[u8]>,
    /// Record arena.
    pub(super) records: RecordPool,
    /// Record with the lowest offset.
    pub(super) head: Option<RecordIndex>,
    /// Live allocations on this page.
    pub(super) num_allocations: usize,
    /// End of the furthest-committed allocation (high-water mark).
    pub(super) low_allocated: usize,
    /// Sum of `size` over live records.
    used_bytes: usize,
    _layout: PhantomData<L>,
}

/// Position of a record inside the list, with its predecessor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Located {
    /// Record that links to `index`, `None` if `index` is the head.
    pub prev: Option<RecordIndex>,
    /// The record itself.
    pub index: RecordIndex,
}

impl<L: RecordLayout> Page<L> {
    /// Reserves a zeroed buffer of `capacity` bytes. No records exist yet.
    ///
    /// # Panics
    ///
    /// Panics if capacity is zero.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "Page capacity must be greater than zero");

        Self {
            buffer: vec![0u8; capacity].into_boxed_slice(),
            records: RecordPool::new(),
            head: None,
            num_allocations: 0,
            low_allocated: 0,
            used_bytes: 0,
            _layout: PhantomData,
        }
    }

    /// Like [`new`](Self::new), but returns `None` for a zero capacity or when
    /// the system cannot supply the buffer.
    #[must_use]
    pub fn try_new(capacity: usize) -> Option<Self> {
        if capacity == 0 {
            return None;
        }

        let mut buffer = Vec::new();
        buffer.try_reserve_exact(capacity).ok()?;
        buffer.resize(capacity, 0u8);

        Some(Self {
            buffer: buffer.into_boxed_slice(),
            records: RecordPool::new(),
            head: None,
            num_allocations: 0,
            low_allocated: 0,
            used_bytes: 0,
            _layout: PhantomData,
        })
    }

    /// Bytes an allocation of `payload_size` occupies on a page, or `None`
    /// on arithmetic overflow.
    #[inline]
    #[must_use]
    pub const fn reserved_size(payload_size: usize) -> Option<usize> {
        match payload_size.checked_add(CANARY_SIZE) {
            Some(size) => size.checked_add(L::HEADER_SIZE),
            None => None,
        }
    }

    /// Payload size of a record on this kind of page.
    #[inline]
    #[must_use]
    pub const fn payload_size(record: &AllocRecord) -> usize {
        record.size - L::HEADER_SIZE - CANARY_SIZE
    }

    /// Total capacity in bytes.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Address of the first byte of the buffer.
    #[inline]
    #[must_use]
    pub fn base(&self) -> MemPtr {
        MemPtr::from_addr(self.buffer.as_ptr() as usize)
    }

    /// Returns whether `ptr` lies in `[base, base + capacity)`.
    #[inline]
    #[must_use]
    pub fn contains(&self, ptr: MemPtr) -> bool {
        let base = self.base().addr();
        ptr.addr() >= base && ptr.addr() - base < self.capacity()
    }

    /// Number of live allocations.
    #[inline]
    #[must_use]
    pub const fn num_allocations(&self) -> usize {
        self.num_allocations
    }

    /// Returns whether the page holds no records.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// End of the furthest-committed allocation.
    #[inline]
    #[must_use]
    pub const fn high_water_mark(&self) -> usize {
        self.low_allocated
    }

    /// Bytes occupied by live records.
    #[inline]
    #[must_use]
    pub const fn usage_bytes(&self) -> usize {
        self.used_bytes
    }

    /// Free bytes in front of the first record (the whole page when empty).
    #[must_use]
    pub fn head_gap(&self) -> usize {
        self.head
            .and_then(|head| self.records.get(head))
            .map_or(self.capacity(), |record| record.offset)
    }

    /// Gets a record by handle.
    #[inline]
    #[must_use]
    pub fn record(&self, index: RecordIndex) -> Option<&AllocRecord> {
        self.records.get(index)
    }

    /// Iterates over records in offset order.
    #[must_use]
    pub fn iter(&self) -> PageRecords<'_, L> {
        PageRecords {
            page: self,
            cursor: self.head,
        }
    }

    /// Address handed to the caller for `record`.
    #[inline]
    #[must_use]
    pub fn payload_ptr(&self, record: &AllocRecord) -> MemPtr {
        self.base().add(record.offset + L::HEADER_SIZE)
    }

    /// Links a record at the position chosen by the placement search, then
    /// writes its header and canary.
    pub fn insert(
        &mut self,
        placement: Placement,
        id: u64,
        source: Option<SourceLine>,
    ) -> RecordIndex {
        let next = match placement.link {
            PlacementLink::EmptyPage => None,
            PlacementLink::Head { former_head } => Some(former_head),
            PlacementLink::After { prev } => self.records.get(prev).and_then(|r| r.next),
        };

        let record = AllocRecord {
            offset: placement.offset,
            size: placement.size,
            freespace_beyond: placement.freespace_beyond,
            id,
            next,
            source,
        };
        let index = self.records.insert(record);

        match placement.link {
            PlacementLink::EmptyPage | PlacementLink::Head { .. } => self.head = Some(index),
            PlacementLink::After { prev } => {
                if let Some(prev) = self.records.get_mut(prev) {
                    prev.next = Some(index);
                    prev.freespace_beyond = 0;
                }
            }
        }

        if next.is_none() {
            self.low_allocated = record.end();
        }
        self.num_allocations += 1;
        self.used_bytes += record.size;
        self.stamp(&record);

        index
    }

    /// Finds the record whose payload address is exactly `ptr`.
    #[must_use]
    pub fn locate(&self, ptr: MemPtr) -> Option<Located> {
        if !self.contains(ptr) {
            return None;
        }

        let mut prev = None;
        for (index, record) in self.iter() {
            let payload = self.payload_ptr(record);
            if payload == ptr {
                return Some(Located { prev, index });
            }
            if payload > ptr {
                break;
            }
            prev = Some(index);
        }
        None
    }

    /// Unlinks a record and returns it.
    ///
    /// The predecessor absorbs the removed bytes and the gap behind them.
    /// When the last record goes, the page is fully reclaimed.
    pub fn unlink(&mut self, located: Located) -> Option<AllocRecord> {
        let removed = self.records.remove(located.index)?;
        self.num_allocations -= 1;
        self.used_bytes -= removed.size;
        self.write_mark(removed.end() - CANARY_SIZE, FREED_MARK);

        match located.prev {
            None => self.head = removed.next,
            Some(prev) => {
                let prev = self.records.get_mut(prev)?;
                prev.next = removed.next;
                prev.freespace_beyond += removed.size + removed.freespace_beyond;
                if removed.next.is_none() {
                    self.low_allocated = prev.end();
                }
            }
        }

        if self.num_allocations == 0 {
            self.head = None;
            self.low_allocated = 0;
            self.records.clear();
        }

        Some(removed)
    }

    /// Checks the header and canary of a record.
    #[must_use]
    pub fn verify(&self, record: &AllocRecord) -> Option<CorruptionKind> {
        let header = &self.buffer[record.offset..record.offset + L::HEADER_SIZE];
        if !L::header_intact(header, record.id, Self::payload_size(record)) {
            return Some(CorruptionKind::Underflow);
        }
        if self.read_mark(record.end() - CANARY_SIZE) != CANARY {
            return Some(CorruptionKind::Overflow);
        }
        None
    }

    /// Payload bytes of a record.
    #[must_use]
    pub fn payload(&self, record: &AllocRecord) -> &[u8] {
        let start = record.offset + L::HEADER_SIZE;
        &self.buffer[start..start + Self::payload_size(record)]
    }

    /// Payload bytes of a record, mutably.
    pub fn payload_mut(&mut self, index: RecordIndex) -> Option<&mut [u8]> {
        let record = *self.records.get(index)?;
        let start = record.offset + L::HEADER_SIZE;
        Some(&mut self.buffer[start..start + Self::payload_size(&record)])
    }

    /// Raw page bytes `[offset, offset + len)`, `None` past the page end.
    pub fn bytes_mut(&mut self, offset: usize, len: usize) -> Option<&mut [u8]> {
        let end = offset.checked_add(len)?;
        self.buffer.get_mut(offset..end)
    }

    /// Drops every record regardless of state. Returns `(records, bytes)` dropped.
    pub fn discard_all(&mut self) -> (usize, usize) {
        let discarded = (self.num_allocations, self.used_bytes);
        self.records.clear();
        self.head = None;
        self.num_allocations = 0;
        self.low_allocated = 0;
        self.used_bytes = 0;
        discarded
    }

    fn stamp(&mut self, record: &AllocRecord) {
        let payload_size = Self::payload_size(record);
        L::write_header(
            &mut self.buffer[record.offset..record.offset + L::HEADER_SIZE],
            record.id,
            payload_size,
        );
        self.write_mark(record.end() - CANARY_SIZE, CANARY);
    }

    fn write_mark(&mut self, at: usize, mark: u32) {
        self.buffer[at..at + CANARY_SIZE].copy_from_slice(&mark.to_le_bytes());
    }

    fn read_mark(&self, at: usize) -> u32 {
        let mut raw = [0u8; CANARY_SIZE];
        raw.copy_from_slice(&self.buffer[at..at + CANARY_SIZE]);
        u32::from_le_bytes(raw)
    }
}

impl<L: RecordLayout> std::fmt::Debug for Page<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Page")
            .field("base", &self.base())
            .field("capacity", &self.capacity())
            .field("num_allocations", &self.num_allocations)
            .field("low_allocated", &self.low_allocated)
            .finish_non_exhaustive()
    }
}

/// Iterator over a page's records in offset order.
pub struct PageRecords<'a, L: RecordLayout> {
    page: &'a Page<L>,
    cursor: Option<RecordIndex>,
}

impl<'a, L: RecordLayout> Iterator for PageRecords<'a, L> {
    type Item = (RecordIndex, &'a AllocRecord);

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.cursor?;
        let record = self.page.records.get(index)?;
        self.cursor = record.next;
        Some((index, record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{EmbeddedLayout, ExternalLayout};

    fn conserved<L: RecordLayout>(page: &Page<L>) -> bool {
        let occupied: usize = page.iter().map(|(_, r)| r.size + r.freespace_beyond).sum();
        page.head_gap() + occupied == page.capacity()
    }

    fn place<L: RecordLayout>(page: &mut Page<L>, size: usize, id: u64) -> MemPtr {
        let placement = page.find_best_mem_loc(size).expect("placement");
        let index = page.insert(placement, id, None);
        let record = *page.record(index).unwrap();
        page.payload_ptr(&record)
    }

    #[test]
    fn test_new_page_is_empty() {
        let page: Page<ExternalLayout> = Page::new(256);
        assert!(page.is_empty());
        assert_eq!(page.head_gap(), 256);
        assert_eq!(page.high_water_mark(), 0);
        assert!(page.contains(page.base()));
        assert!(!page.contains(page.base().add(256)));
        assert!(conserved(&page));
    }

    #[test]
    fn test_try_new_is_fallible() {
        let page: Page<EmbeddedLayout> = Page::try_new(512).unwrap();
        assert_eq!(page.capacity(), 512);
        assert!(page.is_empty());

        assert!(Page::<EmbeddedLayout>::try_new(0).is_none());
        // No system can back this; the reservation fails instead of aborting.
        assert!(Page::<EmbeddedLayout>::try_new(isize::MAX as usize).is_none());
    }

    #[test]
    fn test_insert_writes_canary_and_header() {
        let mut page: Page<EmbeddedLayout> = Page::new(512);
        let ptr = place(&mut page, 10, 3);
        let located = page.locate(ptr).unwrap();
        let record = *page.record(located.index).unwrap();

        assert_eq!(record.size, 10 + CANARY_SIZE + EmbeddedLayout::HEADER_SIZE);
        assert_eq!(ptr, page.base().add(EmbeddedLayout::HEADER_SIZE));
        assert_eq!(page.verify(&record), None);
        assert_eq!(page.payload(&record).len(), 10);
        assert_eq!(page.high_water_mark(), record.size);
    }

    #[test]
    fn test_overflow_and_underflow_detected() {
        let mut page: Page<EmbeddedLayout> = Page::new(512);
        let ptr = place(&mut page, 8, 1);
        let index = page.locate(ptr).unwrap().index;
        let record = *page.record(index).unwrap();

        let payload_offset = record.offset + EmbeddedLayout::HEADER_SIZE;
        page.bytes_mut(payload_offset + 8, 1).unwrap()[0] = 0xAA;
        assert_eq!(page.verify(&record), Some(CorruptionKind::Overflow));

        page.bytes_mut(payload_offset - 1, 1).unwrap()[0] ^= 0xFF;
        assert_eq!(page.verify(&record), Some(CorruptionKind::Underflow));
    }

    #[test]
    fn test_unlink_mid_record_coalesces_into_predecessor() {
        let mut page: Page<ExternalLayout> = Page::new(1024);
        let ptrs: Vec<_> = (0..3).map(|i| place(&mut page, 12, i)).collect();

        let located = page.locate(ptrs[1]).unwrap();
        let removed = page.unlink(located).unwrap();
        assert_eq!(removed.id, 1);

        let first = page.record(page.locate(ptrs[0]).unwrap().index).unwrap();
        assert_eq!(first.freespace_beyond, 16);
        assert_eq!(page.num_allocations(), 2);
        assert_eq!(page.high_water_mark(), 48);
        assert!(conserved(&page));
    }

    #[test]
    fn test_unlink_tail_moves_high_water_mark() {
        let mut page: Page<ExternalLayout> = Page::new(1024);
        let a = place(&mut page, 12, 0);
        let b = place(&mut page, 12, 1);
        let c = place(&mut page, 12, 2);

        page.unlink(page.locate(b).unwrap()).unwrap();
        page.unlink(page.locate(c).unwrap()).unwrap();

        assert_eq!(page.high_water_mark(), 16);
        let first = page.record(page.locate(a).unwrap().index).unwrap();
        assert_eq!(first.freespace_beyond, 1024 - 16);
        assert!(conserved(&page));
    }

    #[test]
    fn test_unlink_head_grows_head_gap() {
        let mut page: Page<ExternalLayout> = Page::new(1024);
        let a = place(&mut page, 12, 0);
        let _b = place(&mut page, 12, 1);

        page.unlink(page.locate(a).unwrap()).unwrap();
        assert_eq!(page.head_gap(), 16);
        assert!(conserved(&page));
    }

    #[test]
    fn test_last_free_reclaims_page() {
        let mut page: Page<ExternalLayout> = Page::new(1024);
        let a = place(&mut page, 100, 0);
        let removed = page.unlink(page.locate(a).unwrap()).unwrap();

        assert!(page.is_empty());
        assert_eq!(page.high_water_mark(), 0);
        assert_eq!(page.usage_bytes(), 0);
        assert_eq!(page.records.slot_count(), 0);
        // Freed region carries the freed mark.
        assert_eq!(page.read_mark(removed.end() - CANARY_SIZE), FREED_MARK);
    }

    #[test]
    fn test_locate_rejects_interior_pointer() {
        let mut page: Page<ExternalLayout> = Page::new(1024);
        let a = place(&mut page, 32, 0);
        assert!(page.locate(a.add(1)).is_none());
        assert!(page.locate(MemPtr::NULL).is_none());
    }

    #[test]
    fn test_discard_all() {
        let mut page: Page<EmbeddedLayout> = Page::new(1024);
        place(&mut page, 8, 0);
        place(&mut page, 8, 1);
        let (count, bytes) = page.discard_all();
        assert_eq!(count, 2);
        assert_eq!(bytes, 2 * (8 + CANARY_SIZE + EmbeddedLayout::HEADER_SIZE));
        assert!(page.is_empty());
        assert!(conserved(&page));
    }

    #[test]
    #[should_panic(expected = "greater than zero")]
    fn test_zero_capacity_panics() {
        let _page: Page<ExternalLayout> = Page::new(0);
    }
}
