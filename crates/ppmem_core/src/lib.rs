//! # PPMEM Core
//!
//! Page-based debug memory allocator for the engine runtime.
//!
//! ## Design Principles
//!
//! 1. **Large pages** - Memory is reserved in pages of at least 32 MiB and
//!    carved into records in address order
//! 2. **Guarded records** - Every payload is followed by a canary; the
//!    embedded layout also puts a header in front of it
//! 3. **Provenance** - Each allocation remembers its id and requesting line
//! 4. **Diagnostics on demand** - Usage reports validate every guard
//!
//! ## Layouts
//!
//! | Layout     | Page bytes per allocation       | Metadata      |
//! |------------|---------------------------------|---------------|
//! | `Embedded` | header (24) + payload + canary  | header + pool |
//! | `External` | payload + canary                | pool only     |
//!
//! ## Example
//!
//! ```rust,ignore
//! use ppmem_core::{source_line, AllocatorConfig, EmbeddedAllocator};
//!
//! let allocator = EmbeddedAllocator::new(AllocatorConfig::from_toml_file("ppmem.toml")?)?;
//!
//! let ptr = allocator.allocate(256, source_line!())?;
//! allocator.write_payload(ptr, 0, &[1, 2, 3])?;
//! let ptr = allocator.reallocate(ptr, 1024, source_line!())?;
//! allocator.free(ptr)?;
//!
//! println!("{}", allocator.report_usage(true));
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod allocator;
pub mod config;
pub mod debug;
pub mod diagnostics;
pub mod error;
pub mod memory;

pub use allocator::{
    from_config, from_config_with_vars, DebugAllocator, EmbeddedAllocator, ExternalAllocator,
    FreeOutcome, PageAllocator, ShutdownReport,
};
pub use config::AllocatorConfig;
pub use debug::{BreakEvent, BreakHook, DebugVars, SourceLine};
pub use diagnostics::{AllocationEntry, PageUsage, SourceRate, SourceUsage, UsageReport};
pub use error::{AllocError, AllocResult, CorruptionKind};
pub use memory::{LayoutKind, MemPtr, DEFAULT_PAGE_SIZE};
