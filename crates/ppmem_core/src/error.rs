//! # Allocator Error Types
//!
//! All errors that can occur in the debug allocator.

use thiserror::Error;

use crate::memory::MemPtr;

/// Which end of an allocation was found damaged.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CorruptionKind {
    /// The trailing canary was overwritten (write past the end).
    Overflow,
    /// The embedded record header was overwritten (write before the start).
    Underflow,
}

impl std::fmt::Display for CorruptionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Overflow => f.write_str("overflow"),
            Self::Underflow => f.write_str("underflow"),
        }
    }
}

/// Errors that can occur in the debug allocator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AllocError {
    /// No page in the chain, including a freshly grown one, can place the request.
    #[error("out of memory: cannot place {requested} bytes")]
    OutOfMemory {
        /// Payload size the caller asked for.
        requested: usize,
    },

    /// The pointer is not the payload address of any live allocation.
    #[error("invalid free of {ptr}: pointer is not a live allocation{}", describe_owner(.owning_page))]
    InvalidFree {
        /// The pointer the caller handed in.
        ptr: MemPtr,
        /// Byte offset into the page that contains the pointer, if any does.
        owning_page: Option<usize>,
    },

    /// Payload access or check with a pointer that is not a live allocation.
    #[error("unknown pointer {ptr}")]
    UnknownPointer {
        /// The pointer the caller handed in.
        ptr: MemPtr,
    },

    /// A canary or header mismatch found by a synchronous check.
    #[error("memory corruption ({kind}) detected in allocation id={id} at {ptr}")]
    CorruptionDetected {
        /// Id of the damaged allocation.
        id: u64,
        /// Payload pointer of the damaged allocation.
        ptr: MemPtr,
        /// Which guard failed.
        kind: CorruptionKind,
    },

    /// A payload access reached outside the region it is allowed to touch.
    #[error("access of {len} bytes at {ptr}+{offset} is out of bounds")]
    OutOfBounds {
        /// Base pointer of the access.
        ptr: MemPtr,
        /// Offset from `ptr`.
        offset: usize,
        /// Number of bytes accessed.
        len: usize,
    },

    /// Invalid configuration file or value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

fn describe_owner(owning_page: &Option<usize>) -> String {
    match *owning_page {
        Some(offset) => format!(" (found inside a page at offset {offset})"),
        None => String::new(),
    }
}

/// Result type for allocator operations.
pub type AllocResult<T> = Result<T, AllocError>;
