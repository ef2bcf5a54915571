//! # Page Allocator
//!
//! The allocator façade: owns the page chain and serializes every operation
//! behind one mutex.
//!
//! ## Flow
//!
//! ```text
//!   allocate(size) ──> page 0 ──> page 1 ──> ... ──> grow chain ──> retry once
//!                       │ fit       │ fit                 │
//!                       ▼           ▼                     ▼
//!                  write header + canary, assign id, count source
//!
//!   free(ptr) ──> page by address range ──> record by exact payload match
//!                       │                         │
//!                       ▼                         ▼
//!                 InvalidFree              verify, unlink, coalesce
//! ```
//!
//! ## Reallocation
//!
//! `reallocate` releases the old record first and then places the new size
//! with a fresh allocation. By default the payload is **not** copied: the old
//! pointer is dead and the caller repopulates the new block. Set
//! `copy_on_realloc` to copy `min(old, new)` bytes instead.
//!
//! ## Locking
//!
//! One coarse lock over all pages. Allocation ids are assigned under it, so
//! their order matches the order in which calls complete. Payload closures
//! run while the lock is held and must not call back into the allocator.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::AllocatorConfig;
use crate::debug::{BreakEvent, BreakHook, DebugVars, SourceLine};
use crate::diagnostics::{build_report, check_page, SourceCounter, UsageReport};
use crate::error::{AllocError, AllocResult, CorruptionKind};
use crate::memory::{
    AllocRecord, EmbeddedLayout, ExternalLayout, LayoutKind, MemPtr, Page, Placement,
    RecordIndex, RecordLayout,
};

/// What a free found while releasing the block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FreeOutcome {
    /// The block was released cleanly.
    Freed,
    /// The pointer was null; nothing happened.
    NullPointer,
    /// The block was released, but its own guard was damaged.
    FreedWithCorruption {
        /// Which guard failed.
        kind: CorruptionKind,
    },
    /// The block was released; verify-before-free found other damaged records
    /// on the same page.
    FreedOnCorruptedPage {
        /// Number of damaged records on the page.
        damaged: usize,
    },
}

/// Summary of a shutdown.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Pages torn down.
    pub pages: usize,
    /// Allocations still live at shutdown and discarded.
    pub leaked_allocations: usize,
    /// Bytes those allocations occupied.
    pub leaked_bytes: usize,
}

/// A placed allocation.
struct Granted {
    ptr: MemPtr,
    id: u64,
}

/// A released allocation.
struct Released {
    outcome: FreeOutcome,
    record: AllocRecord,
    /// Old payload bytes, kept only when copying on reallocate.
    payload: Option<Vec<u8>>,
}

/// Everything the allocator mutex protects.
struct ChainState<L: RecordLayout> {
    /// The page chain, in growth order.
    pages: Vec<Page<L>>,
    /// Next allocation id.
    next_id: u64,
    /// Cumulative (re)allocation calls per call site.
    source_counters: HashMap<SourceLine, SourceCounter>,
    /// Bytes occupied by live records over all pages.
    usage_bytes: usize,
    /// Callback for break-on-allocation hits.
    break_hook: Option<BreakHook>,
}

impl<L: RecordLayout> ChainState<L> {
    fn new() -> Self {
        Self {
            pages: Vec::new(),
            next_id: 0,
            source_counters: HashMap::new(),
            usage_bytes: 0,
            break_hook: None,
        }
    }

    fn page_containing(&self, ptr: MemPtr) -> Option<usize> {
        self.pages.iter().position(|page| page.contains(ptr))
    }

    fn allocate(
        &mut self,
        size: usize,
        source: Option<SourceLine>,
        min_page_size: usize,
    ) -> AllocResult<Granted> {
        let found = self
            .pages
            .iter()
            .enumerate()
            .find_map(|(index, page)| page.find_best_mem_loc(size).map(|p| (index, p)));
        if let Some((index, placement)) = found {
            return Ok(self.commit(index, placement, source));
        }

        let out_of_memory = AllocError::OutOfMemory { requested: size };
        let needed = Page::<L>::reserved_size(size).ok_or_else(|| out_of_memory.clone())?;
        let capacity = needed.max(min_page_size);
        if isize::try_from(capacity).is_err() {
            return Err(out_of_memory);
        }

        tracing::debug!(
            "growing page chain: page {} with {} bytes for a {} byte request",
            self.pages.len(),
            capacity,
            size
        );
        let Some(page) = Page::try_new(capacity) else {
            tracing::debug!("page reservation of {} bytes failed", capacity);
            return Err(out_of_memory);
        };
        self.pages.push(page);

        let index = self.pages.len() - 1;
        let placement = self.pages[index]
            .find_best_mem_loc(size)
            .ok_or(out_of_memory)?;
        Ok(self.commit(index, placement, source))
    }

    fn commit(
        &mut self,
        page_index: usize,
        placement: Placement,
        source: Option<SourceLine>,
    ) -> Granted {
        let id = self.next_id;
        self.next_id += 1;

        let page = &mut self.pages[page_index];
        let ptr = page.base().add(placement.offset + L::HEADER_SIZE);
        page.insert(placement, id, source);

        self.usage_bytes += placement.size;
        if let Some(source) = source {
            let counter = self.source_counters.entry(source).or_default();
            counter.count += 1;
            counter.last_id = id;
        }

        Granted { ptr, id }
    }

    fn release(
        &mut self,
        ptr: MemPtr,
        verify_page: bool,
        keep_payload: bool,
    ) -> AllocResult<Released> {
        let Some(page_index) = self.page_containing(ptr) else {
            return Err(AllocError::InvalidFree {
                ptr,
                owning_page: None,
            });
        };

        let page = &mut self.pages[page_index];
        let located = page.locate(ptr);
        let Some((located, record)) =
            located.and_then(|loc| page.record(loc.index).map(|record| (loc, *record)))
        else {
            return Err(AllocError::InvalidFree {
                ptr,
                owning_page: Some(ptr.addr() - page.base().addr()),
            });
        };

        let damaged = if verify_page { check_page(page) } else { 0 };
        let outcome = match page.verify(&record) {
            Some(kind) => FreeOutcome::FreedWithCorruption { kind },
            None if damaged > 0 => FreeOutcome::FreedOnCorruptedPage { damaged },
            None => FreeOutcome::Freed,
        };
        let payload = keep_payload.then(|| page.payload(&record).to_vec());

        page.unlink(located);
        self.usage_bytes -= record.size;

        Ok(Released {
            outcome,
            record,
            payload,
        })
    }

    fn resolve(&self, ptr: MemPtr) -> AllocResult<(&Page<L>, &AllocRecord)> {
        let page = self
            .page_containing(ptr)
            .map(|index| &self.pages[index])
            .ok_or(AllocError::UnknownPointer { ptr })?;
        page.locate(ptr)
            .and_then(|located| page.record(located.index))
            .map(|record| (page, record))
            .ok_or(AllocError::UnknownPointer { ptr })
    }

    fn resolve_mut(&mut self, ptr: MemPtr) -> AllocResult<(&mut Page<L>, RecordIndex)> {
        let index = self
            .page_containing(ptr)
            .ok_or(AllocError::UnknownPointer { ptr })?;
        let page = &mut self.pages[index];
        let located = page.locate(ptr).ok_or(AllocError::UnknownPointer { ptr })?;
        Ok((page, located.index))
    }
}

/// Page-based debug allocator, generic over where record metadata lives.
///
/// # Thread Safety
///
/// All operations take `&self` and serialize on one internal mutex; share
/// the allocator with `Arc`.
///
/// # Example
///
/// ```rust,ignore
/// let allocator = EmbeddedAllocator::new(AllocatorConfig::default())?;
///
/// let ptr = allocator.allocate(64, source_line!())?;
/// allocator.write_payload(ptr, 0, b"hello")?;
/// allocator.free(ptr)?;
///
/// allocator.report_usage(true);
/// ```
pub struct PageAllocator<L: RecordLayout> {
    config: AllocatorConfig,
    vars: Arc<DebugVars>,
    state: Mutex<ChainState<L>>,
}

/// Allocator with record headers embedded in the pages.
pub type EmbeddedAllocator = PageAllocator<EmbeddedLayout>;

/// Allocator with record metadata kept outside the pages.
pub type ExternalAllocator = PageAllocator<ExternalLayout>;

impl<L: RecordLayout> PageAllocator<L> {
    /// Creates an allocator with console variables seeded from `config`.
    ///
    /// No page is reserved until the first allocation. The layout is the
    /// one of `L`; `config.layout` is overwritten to match.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError::InvalidConfig`] if the config does not validate.
    pub fn new(config: AllocatorConfig) -> AllocResult<Self> {
        let vars = Arc::new(config.debug_vars());
        Self::with_debug_vars(config, vars)
    }

    /// Creates an allocator reading the given console variables.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError::InvalidConfig`] if the config does not validate.
    pub fn with_debug_vars(mut config: AllocatorConfig, vars: Arc<DebugVars>) -> AllocResult<Self> {
        config.validate()?;
        config.layout = L::KIND;

        tracing::debug!(
            "ppmem init: layout={}, min page size={} bytes, strict={}",
            config.layout,
            config.min_page_size,
            config.strict
        );

        Ok(Self {
            config,
            vars,
            state: Mutex::new(ChainState::new()),
        })
    }

    /// The active configuration.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &AllocatorConfig {
        &self.config
    }

    /// The console variables this allocator reads.
    #[inline]
    #[must_use]
    pub fn debug_vars(&self) -> &Arc<DebugVars> {
        &self.vars
    }

    /// Installs (or with `None` removes) the break-on-allocation callback.
    pub fn set_break_hook(&self, hook: Option<BreakHook>) {
        self.state.lock().break_hook = hook;
    }

    /// Allocates `size` payload bytes.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError::OutOfMemory`] if no page, including a freshly
    /// grown one, can place the request.
    pub fn allocate(&self, size: usize, source: SourceLine) -> AllocResult<MemPtr> {
        let source = self.tracked(source);
        let (granted, hook) = {
            let mut state = self.state.lock();
            let granted = state.allocate(size, source, self.config.min_page_size)?;
            (granted, state.break_hook.clone())
        };

        self.check_break(granted.id, size, source, hook);
        Ok(granted.ptr)
    }

    /// Moves an allocation to a fresh placement of `size` bytes.
    ///
    /// A null `ptr` behaves like [`allocate`](Self::allocate). Otherwise the
    /// old record is released first; the payload is copied only with
    /// `copy_on_realloc`.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError::InvalidFree`] if `ptr` is not a live allocation,
    /// or [`AllocError::OutOfMemory`] if the new size cannot be placed (the
    /// old block is already released at that point).
    pub fn reallocate(&self, ptr: MemPtr, size: usize, source: SourceLine) -> AllocResult<MemPtr> {
        if ptr.is_null() {
            return self.allocate(size, source);
        }

        let source = self.tracked(source);
        let (released, placed) = {
            let mut state = self.state.lock();
            let released = match state.release(ptr, false, self.config.copy_on_realloc) {
                Ok(released) => released,
                Err(err) => {
                    drop(state);
                    self.escalate(&err);
                    return Err(err);
                }
            };

            let placed = state
                .allocate(size, source, self.config.min_page_size)
                .and_then(|granted| {
                    if let Some(old) = &released.payload {
                        let (page, index) = state.resolve_mut(granted.ptr)?;
                        if let Some(new) = page.payload_mut(index) {
                            let len = old.len().min(new.len());
                            new[..len].copy_from_slice(&old[..len]);
                        }
                    }
                    Ok((granted, state.break_hook.clone()))
                });
            (released, placed)
        };

        // The old block is gone either way; its guards are reported even when
        // the new size cannot be placed.
        self.report_outcome(ptr, &released);
        let (granted, hook) = placed?;
        self.check_break(granted.id, size, source, hook);
        Ok(granted.ptr)
    }

    /// Releases an allocation. Freeing null is a no-op.
    ///
    /// The block's own guards are always checked; with verify-before-free on,
    /// every record of the page is checked first.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError::InvalidFree`] if `ptr` is not the payload address
    /// of a live allocation.
    ///
    /// # Panics
    ///
    /// In strict mode, panics on an invalid free or detected corruption.
    pub fn free(&self, ptr: MemPtr) -> AllocResult<FreeOutcome> {
        if ptr.is_null() {
            return Ok(FreeOutcome::NullPointer);
        }

        let verify = self.vars.verify_before_free();
        let released = self.state.lock().release(ptr, verify, false);
        match released {
            Ok(released) => {
                self.report_outcome(ptr, &released);
                Ok(released.outcome)
            }
            Err(err) => {
                self.escalate(&err);
                Err(err)
            }
        }
    }

    /// Walks all pages, validates every guard and logs the result.
    pub fn report_usage(&self, full_detail: bool) -> UsageReport {
        let report = {
            let state = self.state.lock();
            let rates = self.vars.stats_rate().then_some(&state.source_counters);
            build_report(&state.pages, full_detail, rates)
        };
        report.log();
        report
    }

    /// Validates the guards of one live allocation.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError::UnknownPointer`] for a pointer that is not a live
    /// allocation, or [`AllocError::CorruptionDetected`] for a damaged one.
    pub fn check(&self, ptr: MemPtr) -> AllocResult<()> {
        let (id, corruption) = {
            let state = self.state.lock();
            let (page, record) = state.resolve(ptr)?;
            (record.id, page.verify(record))
        };

        match corruption {
            None => Ok(()),
            Some(kind) => {
                let err = AllocError::CorruptionDetected { id, ptr, kind };
                self.escalate(&err);
                Err(err)
            }
        }
    }

    /// Bytes occupied by live allocations, overhead included.
    #[must_use]
    pub fn usage_bytes(&self) -> usize {
        self.state.lock().usage_bytes
    }

    /// Number of pages in the chain.
    #[must_use]
    pub fn page_count(&self) -> usize {
        self.state.lock().pages.len()
    }

    /// Number of live allocations.
    #[must_use]
    pub fn allocation_count(&self) -> usize {
        self.state.lock().pages.iter().map(Page::num_allocations).sum()
    }

    /// Runs `f` over the payload of a live allocation.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError::UnknownPointer`] if `ptr` is not a live allocation.
    pub fn with_payload<R>(&self, ptr: MemPtr, f: impl FnOnce(&[u8]) -> R) -> AllocResult<R> {
        let state = self.state.lock();
        let (page, record) = state.resolve(ptr)?;
        Ok(f(page.payload(record)))
    }

    /// Runs `f` over the payload of a live allocation, mutably.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError::UnknownPointer`] if `ptr` is not a live allocation.
    pub fn with_payload_mut<R>(
        &self,
        ptr: MemPtr,
        f: impl FnOnce(&mut [u8]) -> R,
    ) -> AllocResult<R> {
        let mut state = self.state.lock();
        let (page, index) = state.resolve_mut(ptr)?;
        let payload = page
            .payload_mut(index)
            .ok_or(AllocError::UnknownPointer { ptr })?;
        Ok(f(payload))
    }

    /// Copies `bytes` into the payload at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError::OutOfBounds`] if the write leaves the payload.
    pub fn write_payload(&self, ptr: MemPtr, offset: usize, bytes: &[u8]) -> AllocResult<()> {
        self.with_payload_mut(ptr, |payload| {
            let target = offset
                .checked_add(bytes.len())
                .and_then(|end| payload.get_mut(offset..end))
                .ok_or(AllocError::OutOfBounds {
                    ptr,
                    offset,
                    len: bytes.len(),
                })?;
            target.copy_from_slice(bytes);
            Ok(())
        })?
    }

    /// Writes `bytes` at `ptr + offset`, bounded only by the owning page.
    ///
    /// This is what a raw pointer write from the caller does; it may run over
    /// guards and neighbouring allocations.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError::UnknownPointer`] if `ptr` is in no page, or
    /// [`AllocError::OutOfBounds`] if the write leaves the page.
    pub fn write_raw(&self, ptr: MemPtr, offset: usize, bytes: &[u8]) -> AllocResult<()> {
        let mut state = self.state.lock();
        let index = state
            .page_containing(ptr)
            .ok_or(AllocError::UnknownPointer { ptr })?;
        let page = &mut state.pages[index];
        let start = ptr.addr() - page.base().addr();

        let target = start
            .checked_add(offset)
            .and_then(|at| page.bytes_mut(at, bytes.len()))
            .ok_or(AllocError::OutOfBounds {
                ptr,
                offset,
                len: bytes.len(),
            })?;
        target.copy_from_slice(bytes);
        Ok(())
    }

    /// Tears down every page, discarding still-attached records.
    ///
    /// The allocator stays usable; the next allocation grows a new chain.
    /// Ids keep counting up.
    pub fn shutdown(&self) -> ShutdownReport {
        let mut report = ShutdownReport::default();
        {
            let mut state = self.state.lock();
            report.pages = state.pages.len();
            for page in &mut state.pages {
                let (count, bytes) = page.discard_all();
                report.leaked_allocations += count;
                report.leaked_bytes += bytes;
            }
            state.pages.clear();
            state.usage_bytes = 0;
            state.source_counters.clear();
        }

        if report.leaked_allocations > 0 {
            tracing::warn!(
                "ppmem shutdown: {} allocations ({} bytes) still live in {} pages",
                report.leaked_allocations,
                report.leaked_bytes,
                report.pages
            );
        } else {
            tracing::debug!("ppmem shutdown: {} pages released", report.pages);
        }
        report
    }

    fn tracked(&self, source: SourceLine) -> Option<SourceLine> {
        self.config.track_sources.then_some(source)
    }

    fn check_break(&self, id: u64, size: usize, source: Option<SourceLine>, hook: Option<BreakHook>) {
        if self.vars.break_on_alloc() != Some(id) {
            return;
        }

        let event = BreakEvent { id, size, source };
        if let Some(hook) = hook {
            hook(&event);
            return;
        }

        match source {
            Some(source) => tracing::warn!("break on allocation id={} ({})", id, source),
            None => tracing::warn!("break on allocation id={}", id),
        }
        if self.config.strict {
            panic!("break on allocation id={id}");
        }
    }

    fn report_outcome(&self, ptr: MemPtr, released: &Released) {
        match released.outcome {
            FreeOutcome::Freed | FreeOutcome::NullPointer => {}
            FreeOutcome::FreedWithCorruption { kind } => {
                self.escalate(&AllocError::CorruptionDetected {
                    id: released.record.id,
                    ptr,
                    kind,
                });
            }
            FreeOutcome::FreedOnCorruptedPage { damaged } => {
                tracing::error!(
                    "{} damaged allocations on the page of {} (freed id={})",
                    damaged,
                    ptr,
                    released.record.id
                );
                if self.config.strict {
                    panic!("{damaged} damaged allocations on the page of {ptr}");
                }
            }
        }
    }

    fn escalate(&self, err: &AllocError) {
        tracing::error!("{}", err);
        if self.config.strict {
            panic!("{err}");
        }
    }
}

impl<L: RecordLayout> std::fmt::Debug for PageAllocator<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageAllocator")
            .field("layout", &L::KIND)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// The allocator interface shared by both layouts.
pub trait DebugAllocator: Send + Sync {
    /// Where record metadata lives.
    fn layout_kind(&self) -> LayoutKind;

    /// See [`PageAllocator::allocate`].
    ///
    /// # Errors
    ///
    /// [`AllocError::OutOfMemory`] when the request cannot be placed.
    fn allocate(&self, size: usize, source: SourceLine) -> AllocResult<MemPtr>;

    /// See [`PageAllocator::reallocate`].
    ///
    /// # Errors
    ///
    /// [`AllocError::InvalidFree`] or [`AllocError::OutOfMemory`].
    fn reallocate(&self, ptr: MemPtr, size: usize, source: SourceLine) -> AllocResult<MemPtr>;

    /// See [`PageAllocator::free`].
    ///
    /// # Errors
    ///
    /// [`AllocError::InvalidFree`] when `ptr` is not a live allocation.
    fn free(&self, ptr: MemPtr) -> AllocResult<FreeOutcome>;

    /// See [`PageAllocator::report_usage`].
    fn report_usage(&self, full_detail: bool) -> UsageReport;

    /// See [`PageAllocator::check`].
    ///
    /// # Errors
    ///
    /// [`AllocError::UnknownPointer`] or [`AllocError::CorruptionDetected`].
    fn check(&self, ptr: MemPtr) -> AllocResult<()>;

    /// See [`PageAllocator::usage_bytes`].
    fn usage_bytes(&self) -> usize;

    /// See [`PageAllocator::page_count`].
    fn page_count(&self) -> usize;

    /// Copy of the payload of a live allocation.
    ///
    /// # Errors
    ///
    /// [`AllocError::UnknownPointer`] when `ptr` is not a live allocation.
    fn read_payload(&self, ptr: MemPtr) -> AllocResult<Vec<u8>>;

    /// See [`PageAllocator::write_payload`].
    ///
    /// # Errors
    ///
    /// [`AllocError::UnknownPointer`] or [`AllocError::OutOfBounds`].
    fn write_payload(&self, ptr: MemPtr, offset: usize, bytes: &[u8]) -> AllocResult<()>;

    /// See [`PageAllocator::write_raw`].
    ///
    /// # Errors
    ///
    /// [`AllocError::UnknownPointer`] or [`AllocError::OutOfBounds`].
    fn write_raw(&self, ptr: MemPtr, offset: usize, bytes: &[u8]) -> AllocResult<()>;

    /// See [`PageAllocator::shutdown`].
    fn shutdown(&self) -> ShutdownReport;
}

impl<L: RecordLayout> DebugAllocator for PageAllocator<L> {
    fn layout_kind(&self) -> LayoutKind {
        L::KIND
    }

    fn allocate(&self, size: usize, source: SourceLine) -> AllocResult<MemPtr> {
        Self::allocate(self, size, source)
    }

    fn reallocate(&self, ptr: MemPtr, size: usize, source: SourceLine) -> AllocResult<MemPtr> {
        Self::reallocate(self, ptr, size, source)
    }

    fn free(&self, ptr: MemPtr) -> AllocResult<FreeOutcome> {
        Self::free(self, ptr)
    }

    fn report_usage(&self, full_detail: bool) -> UsageReport {
        Self::report_usage(self, full_detail)
    }

    fn check(&self, ptr: MemPtr) -> AllocResult<()> {
        Self::check(self, ptr)
    }

    fn usage_bytes(&self) -> usize {
        Self::usage_bytes(self)
    }

    fn page_count(&self) -> usize {
        Self::page_count(self)
    }

    fn read_payload(&self, ptr: MemPtr) -> AllocResult<Vec<u8>> {
        self.with_payload(ptr, <[u8]>::to_vec)
    }

    fn write_payload(&self, ptr: MemPtr, offset: usize, bytes: &[u8]) -> AllocResult<()> {
        Self::write_payload(self, ptr, offset, bytes)
    }

    fn write_raw(&self, ptr: MemPtr, offset: usize, bytes: &[u8]) -> AllocResult<()> {
        Self::write_raw(self, ptr, offset, bytes)
    }

    fn shutdown(&self) -> ShutdownReport {
        Self::shutdown(self)
    }
}

/// Builds the allocator variant named by `config.layout`.
///
/// # Errors
///
/// Returns [`AllocError::InvalidConfig`] if the config does not validate.
pub fn from_config(config: AllocatorConfig) -> AllocResult<Box<dyn DebugAllocator>> {
    let vars = Arc::new(config.debug_vars());
    from_config_with_vars(config, vars)
}

/// Like [`from_config`], reading the given console variables.
///
/// # Errors
///
/// Returns [`AllocError::InvalidConfig`] if the config does not validate.
pub fn from_config_with_vars(
    config: AllocatorConfig,
    vars: Arc<DebugVars>,
) -> AllocResult<Box<dyn DebugAllocator>> {
    Ok(match config.layout {
        LayoutKind::Embedded => Box::new(EmbeddedAllocator::with_debug_vars(config, vars)?),
        LayoutKind::External => Box::new(ExternalAllocator::with_debug_vars(config, vars)?),
    })
}
