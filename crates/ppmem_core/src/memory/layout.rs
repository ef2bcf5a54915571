//! # Record Metadata Layouts
//!
//! Where an allocation's metadata lives.
//!
//! - [`EmbeddedLayout`] places a [`RecordHeader`] inside the page, directly in
//!   front of the payload. The header counts towards the record size and
//!   doubles as an underflow guard.
//! - [`ExternalLayout`] keeps the metadata only in the page's record arena.
//!   Records occupy exactly payload + canary bytes.

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

use super::CANARY;

/// Which record layout an allocator uses. Chosen at construction time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutKind {
    /// Metadata header embedded in the page in front of every payload.
    #[default]
    Embedded,
    /// Metadata held outside the page buffer.
    External,
}

impl std::fmt::Display for LayoutKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Embedded => f.write_str("embedded"),
            Self::External => f.write_str("external"),
        }
    }
}

/// In-page metadata header used by [`EmbeddedLayout`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct RecordHeader {
    /// Always [`CANARY`] while the record is live.
    pub magic: u32,
    /// Unused, keeps the header free of padding.
    pub reserved: u32,
    /// Allocation id.
    pub id: u64,
    /// Requested payload size.
    pub payload_size: u64,
}

impl RecordHeader {
    /// Header size in bytes.
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Builds the header for a live allocation.
    #[must_use]
    pub const fn new(id: u64, payload_size: usize) -> Self {
        Self {
            magic: CANARY,
            reserved: 0,
            id,
            payload_size: payload_size as u64,
        }
    }
}

/// Placement of record metadata relative to the payload.
///
/// Implementors are zero-sized markers; the allocator is generic over them.
pub trait RecordLayout: Send + Sync + 'static {
    /// Which variant this is.
    const KIND: LayoutKind;

    /// Bytes of metadata stored in the page in front of each payload.
    const HEADER_SIZE: usize;

    /// Writes the header for a fresh allocation into `header`
    /// (exactly `HEADER_SIZE` bytes).
    fn write_header(header: &mut [u8], id: u64, payload_size: usize);

    /// Returns whether the header bytes still describe the given allocation.
    fn header_intact(header: &[u8], id: u64, payload_size: usize) -> bool;
}

/// Record metadata embedded in the page.
#[derive(Clone, Copy, Debug, Default)]
pub struct EmbeddedLayout;

impl RecordLayout for EmbeddedLayout {
    const KIND: LayoutKind = LayoutKind::Embedded;
    const HEADER_SIZE: usize = RecordHeader::SIZE;

    fn write_header(header: &mut [u8], id: u64, payload_size: usize) {
        let value = RecordHeader::new(id, payload_size);
        header.copy_from_slice(bytemuck::bytes_of(&value));
    }

    fn header_intact(header: &[u8], id: u64, payload_size: usize) -> bool {
        // Page bytes carry no alignment guarantee.
        let stored: RecordHeader = bytemuck::pod_read_unaligned(header);
        stored == RecordHeader::new(id, payload_size)
    }
}

/// Record metadata kept outside the page.
#[derive(Clone, Copy, Debug, Default)]
pub struct ExternalLayout;

impl RecordLayout for ExternalLayout {
    const KIND: LayoutKind = LayoutKind::External;
    const HEADER_SIZE: usize = 0;

    fn write_header(_header: &mut [u8], _id: u64, _payload_size: usize) {}

    fn header_intact(_header: &[u8], _id: u64, _payload_size: usize) -> bool {
        true
    }
}
