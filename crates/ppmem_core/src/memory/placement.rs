//! # Placement Search
//!
//! First-fit search for a slot inside one page, in this priority order:
//!
//! 1. empty page: offset 0
//! 2. head gap: in front of the first record
//! 3. walking head to tail, the first record whose trailing gap fits,
//!    either extending the tail or splicing between two records
//!
//! The head gap wins by priority even when a tighter gap exists further on.
//! The search never mutates the page; [`Page::insert`] applies the result.

use super::layout::RecordLayout;
use super::page::Page;
use super::record::RecordIndex;

/// Where a new record gets linked.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlacementLink {
    /// The page holds no records; the new one becomes the only record.
    EmptyPage,
    /// New head, in front of the current first record.
    Head {
        /// Record that becomes the new record's `next`.
        former_head: RecordIndex,
    },
    /// Directly behind `prev`, either as the new tail or between two records.
    After {
        /// Record whose trailing gap is used.
        prev: RecordIndex,
    },
}

/// A prepared, not yet linked record position.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Placement {
    /// Offset of the new record from the page base.
    pub offset: usize,
    /// Bytes the new record occupies.
    pub size: usize,
    /// Gap left behind the new record.
    pub freespace_beyond: usize,
    /// How the record is linked in.
    pub link: PlacementLink,
}

impl<L: RecordLayout> Page<L> {
    /// Finds the first slot that can hold `payload_size` bytes plus overhead.
    ///
    /// Zero-sized requests still reserve the canary (and header).
    /// Returns `None` when nothing on this page fits.
    #[must_use]
    pub fn find_best_mem_loc(&self, payload_size: usize) -> Option<Placement> {
        let needed = Self::reserved_size(payload_size)?;

        let Some(head) = self.head else {
            return (needed <= self.capacity()).then_some(Placement {
                offset: 0,
                size: needed,
                freespace_beyond: self.capacity() - needed,
                link: PlacementLink::EmptyPage,
            });
        };

        let head_offset = self.records.get(head)?.offset;
        if head_offset >= needed {
            return Some(Placement {
                offset: 0,
                size: needed,
                freespace_beyond: head_offset - needed,
                link: PlacementLink::Head { former_head: head },
            });
        }

        for (index, record) in self.iter() {
            if record.freespace_beyond < needed {
                continue;
            }

            let offset = record.end();
            let limit = match record.next {
                // Tail: the gap runs to the page end.
                None => self.capacity(),
                Some(next) => self.records.get(next)?.offset,
            };
            if offset + needed > limit {
                continue;
            }

            return Some(Placement {
                offset,
                size: needed,
                freespace_beyond: record.freespace_beyond - needed,
                link: PlacementLink::After { prev: index },
            });
        }

        None
    }
}
