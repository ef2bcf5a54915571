//! # Diagnostics
//!
//! Walks every page and record, validates guards and aggregates usage.
//!
//! [`UsageReport`] is a plain value so hosts and tests can inspect it; its
//! `Display` form is the text printed by the `ppmem_stats` console command.

use std::collections::HashMap;
use std::fmt;

use crate::debug::SourceLine;
use crate::error::CorruptionKind;
use crate::memory::{MemPtr, Page, RecordLayout};

/// Usage of one page.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageUsage {
    /// Position in the page chain.
    pub index: usize,
    /// Page base address.
    pub base: MemPtr,
    /// Page capacity in bytes.
    pub capacity: usize,
    /// Live allocations.
    pub num_allocations: usize,
    /// Bytes occupied by live records.
    pub usage_bytes: usize,
    /// End of the furthest-committed allocation.
    pub high_water_mark: usize,
    /// Free bytes in front of the first record.
    pub head_gap: usize,
    /// Records with a damaged guard.
    pub corruptions: usize,
}

/// One live allocation (full-detail reports only).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AllocationEntry {
    /// Page the allocation lives on.
    pub page: usize,
    /// Allocation id.
    pub id: u64,
    /// Payload pointer.
    pub ptr: MemPtr,
    /// Offset from the page base.
    pub offset: usize,
    /// Occupied bytes including overhead.
    pub size: usize,
    /// Requested payload bytes.
    pub payload_size: usize,
    /// Free bytes up to the next record.
    pub freespace_beyond: usize,
    /// Requesting call site, when tracked.
    pub source: Option<SourceLine>,
    /// Damaged guard, if any.
    pub corruption: Option<CorruptionKind>,
}

/// Live allocations grouped by call site.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceUsage {
    /// Call site.
    pub source: SourceLine,
    /// Live allocations from it.
    pub count: usize,
    /// Bytes they occupy.
    pub bytes: usize,
}

/// Cumulative (re)allocation count of one call site.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceRate {
    /// Call site.
    pub source: SourceLine,
    /// Allocate and reallocate calls since start-up.
    pub count: u64,
    /// Id of the most recent allocation from this call site.
    pub last_id: u64,
}

/// Per call-site counter kept by the allocator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct SourceCounter {
    pub(crate) count: u64,
    pub(crate) last_id: u64,
}

/// Result of a usage report.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UsageReport {
    /// Whether per-allocation entries were collected.
    pub full_detail: bool,
    /// Per page, in chain order.
    pub pages: Vec<PageUsage>,
    /// Per allocation, in chain then offset order. Empty unless `full_detail`.
    pub entries: Vec<AllocationEntry>,
    /// Live allocations by call site, most allocations first.
    pub by_source: Vec<SourceUsage>,
    /// Cumulative call counts by call site, most recently used first.
    /// Empty unless rate statistics are enabled.
    pub source_rates: Vec<SourceRate>,
    /// Live allocations over all pages.
    pub num_allocations: usize,
    /// Bytes occupied over all pages.
    pub usage_bytes: usize,
    /// Damaged records over all pages.
    pub corruptions: usize,
}

impl UsageReport {
    /// Number of pages in the chain.
    #[inline]
    #[must_use]
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Entries that live on page `index`.
    pub fn entries_on(&self, index: usize) -> impl Iterator<Item = &AllocationEntry> {
        self.entries.iter().filter(move |e| e.page == index)
    }

    /// The operator warning, present when corruption was found.
    #[must_use]
    pub fn corruption_warning(&self) -> Option<String> {
        (self.corruptions > 0).then(|| {
            format!(
                "{} allocations have overflow/underflow happened in runtime. \
                 Please print full stats to console",
                self.corruptions
            )
        })
    }

    /// Writes the report to the log: body as `info`, the corruption warning as `warn`.
    pub fn log(&self) {
        for line in Body(self).to_string().lines() {
            tracing::info!("{}", line);
        }
        if let Some(warning) = self.corruption_warning() {
            tracing::warn!("{}", warning);
        }
    }
}

impl fmt::Display for UsageReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Body(self))?;
        if let Some(warning) = self.corruption_warning() {
            writeln!(f, "{warning}")?;
        }
        Ok(())
    }
}

/// Everything except the corruption warning.
struct Body<'a>(&'a UsageReport);

impl fmt::Display for Body<'_> {
    #[allow(clippy::cast_precision_loss)]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let report = self.0;

        if report.full_detail {
            writeln!(f, "--- currently allocated memory ---")?;
        }

        for page in &report.pages {
            writeln!(
                f,
                "--- page {}: base={}, capacity={}, allocations={}, usage={} bytes, high water={} ---",
                page.index,
                page.base,
                page.capacity,
                page.num_allocations,
                page.usage_bytes,
                page.high_water_mark
            )?;

            for entry in report.entries_on(page.index) {
                match entry.source {
                    Some(source) => write!(f, "alloc id={}, src='{source}'", entry.id)?,
                    None => write!(f, "alloc id={}", entry.id)?,
                }
                writeln!(
                    f,
                    ", ptr={}, size={}, freespace_beyond={}",
                    entry.ptr, entry.size, entry.freespace_beyond
                )?;
                if let Some(kind) = entry.corruption {
                    writeln!(f, " ^^^ outranged ({kind}) ^^^")?;
                }
            }
        }

        if !report.by_source.is_empty() {
            writeln!(f, "--- allocations grouped by file-line ---")?;
            for group in &report.by_source {
                writeln!(
                    f,
                    "'{}' count: {}, size: {:.2} KB",
                    group.source,
                    group.count,
                    group.bytes as f64 / 1024.0
                )?;
            }
        }

        if !report.source_rates.is_empty() {
            writeln!(f, "--- allocation rate statistics ---")?;
            for rate in &report.source_rates {
                writeln!(f, "'{}' counter: {}", rate.source, rate.count)?;
            }
        }

        writeln!(
            f,
            "Total {} allocations in {} pages, mem usage: {:.2} MB",
            report.num_allocations,
            report.pages.len(),
            report.usage_bytes as f64 / (1024.0 * 1024.0)
        )
    }
}

/// Counts records whose payload falls outside the page or whose guards fail.
///
/// The quiet pass run before a free when verify-before-free is on.
#[must_use]
pub fn check_page<L: RecordLayout>(page: &Page<L>) -> usize {
    page.iter()
        .filter(|(_, record)| {
            record.end() > page.capacity()
                || !page.contains(page.payload_ptr(record))
                || page.verify(record).is_some()
        })
        .count()
}

/// Builds a report over the whole page chain.
///
/// Rate statistics are included only when `source_counters` is given.
pub(crate) fn build_report<L: RecordLayout>(
    pages: &[Page<L>],
    full_detail: bool,
    source_counters: Option<&HashMap<SourceLine, SourceCounter>>,
) -> UsageReport {
    let mut report = UsageReport {
        full_detail,
        ..UsageReport::default()
    };
    let mut groups: HashMap<SourceLine, (usize, usize)> = HashMap::new();

    for (index, page) in pages.iter().enumerate() {
        let mut usage = PageUsage {
            index,
            base: page.base(),
            capacity: page.capacity(),
            num_allocations: 0,
            usage_bytes: 0,
            high_water_mark: page.high_water_mark(),
            head_gap: page.head_gap(),
            corruptions: 0,
        };

        for (_, record) in page.iter() {
            let corruption = page.verify(record);
            usage.num_allocations += 1;
            usage.usage_bytes += record.size;
            if corruption.is_some() {
                usage.corruptions += 1;
            }

            if let Some(source) = record.source {
                let group = groups.entry(source).or_default();
                group.0 += 1;
                group.1 += record.size;
            }

            if full_detail {
                report.entries.push(AllocationEntry {
                    page: index,
                    id: record.id,
                    ptr: page.payload_ptr(record),
                    offset: record.offset,
                    size: record.size,
                    payload_size: Page::<L>::payload_size(record),
                    freespace_beyond: record.freespace_beyond,
                    source: record.source,
                    corruption,
                });
            }
        }

        report.num_allocations += usage.num_allocations;
        report.usage_bytes += usage.usage_bytes;
        report.corruptions += usage.corruptions;
        report.pages.push(usage);
    }

    report.by_source = groups
        .into_iter()
        .map(|(source, (count, bytes))| SourceUsage {
            source,
            count,
            bytes,
        })
        .collect();
    report
        .by_source
        .sort_by(|a, b| b.count.cmp(&a.count).then(a.source.cmp(&b.source)));

    if let Some(counters) = source_counters {
        report.source_rates = counters
            .iter()
            .map(|(&source, counter)| SourceRate {
                source,
                count: counter.count,
                last_id: counter.last_id,
            })
            .collect();
        report
            .source_rates
            .sort_by(|a, b| b.last_id.cmp(&a.last_id).then(a.source.cmp(&b.source)));
    }

    report
}
