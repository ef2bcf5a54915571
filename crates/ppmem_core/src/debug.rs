//! # Debug Hooks
//!
//! Call-site provenance, console-driven debug variables and the
//! break-on-allocation hook.
//!
//! The console subsystem owns the values in [`DebugVars`]; the allocator only
//! reads them, fresh on every call.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;

/// Source location of an allocation request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceLine {
    /// Source file name.
    pub file: &'static str,
    /// Line number.
    pub line: u32,
}

impl SourceLine {
    /// Creates a source location.
    #[must_use]
    pub const fn new(file: &'static str, line: u32) -> Self {
        Self { file, line }
    }
}

impl std::fmt::Display for SourceLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// Expands to the [`SourceLine`] of the call site.
///
/// ```rust,ignore
/// let ptr = allocator.allocate(64, ppmem_core::source_line!())?;
/// ```
#[macro_export]
macro_rules! source_line {
    () => {
        $crate::SourceLine::new(file!(), line!())
    };
}

/// Console-owned debug values.
///
/// Shared with the console through an `Arc`; the allocator reads the current
/// value at the moment of each call.
#[derive(Debug)]
pub struct DebugVars {
    /// Allocation id that triggers the break hook, `-1` when disabled.
    break_on_alloc: AtomicI64,
    /// Validate every record of a page before freeing from it.
    verify_before_free: AtomicBool,
    /// Include per-source allocation rates in usage reports.
    stats_rate: AtomicBool,
}

impl DebugVars {
    /// Creates the variables with their initial values.
    #[must_use]
    pub fn new(break_on_alloc: Option<u64>, verify_before_free: bool) -> Self {
        let vars = Self {
            break_on_alloc: AtomicI64::new(-1),
            verify_before_free: AtomicBool::new(verify_before_free),
            stats_rate: AtomicBool::new(false),
        };
        vars.set_break_on_alloc(break_on_alloc);
        vars
    }

    /// Creates shared variables.
    #[must_use]
    pub fn shared(break_on_alloc: Option<u64>, verify_before_free: bool) -> Arc<Self> {
        Arc::new(Self::new(break_on_alloc, verify_before_free))
    }

    /// Current break-on-allocation id.
    #[inline]
    #[must_use]
    pub fn break_on_alloc(&self) -> Option<u64> {
        u64::try_from(self.break_on_alloc.load(Ordering::Relaxed)).ok()
    }

    /// Sets the break-on-allocation id; `None` disables it.
    pub fn set_break_on_alloc(&self, id: Option<u64>) {
        let raw = id.and_then(|id| i64::try_from(id).ok()).unwrap_or(-1);
        self.break_on_alloc.store(raw, Ordering::Relaxed);
    }

    /// Sets the id from the console integer, where any negative value disables.
    pub fn set_break_on_alloc_raw(&self, value: i64) {
        self.break_on_alloc.store(value.max(-1), Ordering::Relaxed);
    }

    /// Current verify-before-free toggle.
    #[inline]
    #[must_use]
    pub fn verify_before_free(&self) -> bool {
        self.verify_before_free.load(Ordering::Relaxed)
    }

    /// Sets the verify-before-free toggle.
    pub fn set_verify_before_free(&self, enabled: bool) {
        self.verify_before_free.store(enabled, Ordering::Relaxed);
    }

    /// Current rate-statistics toggle.
    #[inline]
    #[must_use]
    pub fn stats_rate(&self) -> bool {
        self.stats_rate.load(Ordering::Relaxed)
    }

    /// Sets the rate-statistics toggle.
    pub fn set_stats_rate(&self, enabled: bool) {
        self.stats_rate.store(enabled, Ordering::Relaxed);
    }
}

impl Default for DebugVars {
    fn default() -> Self {
        Self::new(None, false)
    }
}

/// The allocation that matched the break-on-allocation id.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BreakEvent {
    /// Allocation id.
    pub id: u64,
    /// Requested payload size.
    pub size: usize,
    /// Requesting call site, when tracked.
    pub source: Option<SourceLine>,
}

/// Callback run when the break-on-allocation id is hit.
///
/// Runs after the allocator lock is released, so it may call back into the
/// allocator (for example to print a usage report).
pub type BreakHook = Arc<dyn Fn(&BreakEvent) + Send + Sync>;
