//! # Memory Management
//!
//! Pages, allocation records and the in-page placement search.
//!
//! ## Layout of one allocation inside a page
//!
//! ```text
//!   offset                                            offset + size
//!     │                                                     │
//!     ▼                                                     ▼
//!     ┌──────────────┬──────────────────────────┬──────────┐┌─────────────────┐
//!     │ record header│ payload (requested size) │  canary  ││ freespace_beyond│
//!     │ (embedded    │                          │ 4 bytes  ││ (up to the next │
//!     │  layout only)│                          │          ││  record / end)  │
//!     └──────────────┴──────────────────────────┴──────────┘└─────────────────┘
//! ```
//!
//! Pointers handed to callers are [`MemPtr`] values: the numeric address of
//! the payload inside the owning page buffer. They are resolved back to a page
//! by address-range containment and to a record by exact payload match.

mod layout;
mod page;
mod placement;
mod record;

pub use layout::{EmbeddedLayout, ExternalLayout, LayoutKind, RecordHeader, RecordLayout};
pub use page::{Located, Page, PageRecords};
pub use placement::{Placement, PlacementLink};
pub use record::{AllocRecord, RecordIndex, RecordPool};

/// Sentinel written right after every payload.
pub const CANARY: u32 = 0x1DF0_01ED;

/// Mark written over the canary of a released allocation (`"EMTY"`).
pub const FREED_MARK: u32 = u32::from_le_bytes(*b"EMTY");

/// Size of the trailing canary in bytes.
pub const CANARY_SIZE: usize = std::mem::size_of::<u32>();

/// Default minimum page size: 32 MiB.
pub const DEFAULT_PAGE_SIZE: usize = 32 * 1024 * 1024;

/// Address of a payload handed out by the allocator.
///
/// This is a plain address value: it carries no provenance and cannot be
/// dereferenced directly. Payload bytes are reached through the allocator,
/// which resolves the address back to its page and record.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct MemPtr(usize);

impl MemPtr {
    /// The null pointer.
    pub const NULL: Self = Self(0);

    /// Wraps a raw address.
    #[inline]
    #[must_use]
    pub const fn from_addr(addr: usize) -> Self {
        Self(addr)
    }

    /// Returns the raw address.
    #[inline]
    #[must_use]
    pub const fn addr(self) -> usize {
        self.0
    }

    /// Returns whether this is the null pointer.
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Returns the pointer `bytes` further on (wrapping, like pointer arithmetic).
    #[inline]
    #[must_use]
    pub const fn add(self, bytes: usize) -> Self {
        Self(self.0.wrapping_add(bytes))
    }
}

impl std::fmt::Debug for MemPtr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MemPtr({:#x})", self.0)
    }
}

impl std::fmt::Display for MemPtr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}
