//! Integration tests for page placement, reallocation and diagnostics.

use ppmem_core::memory::CANARY_SIZE;
use ppmem_core::{
    source_line, AllocatorConfig, EmbeddedAllocator, ExternalAllocator, FreeOutcome, LayoutKind,
    MemPtr, UsageReport, DEFAULT_PAGE_SIZE,
};

const HEADER: usize = 24;

fn lenient(page_size: usize) -> AllocatorConfig {
    AllocatorConfig {
        strict: false,
        ..AllocatorConfig::with_page_size(page_size)
    }
}

/// Every page is tiled exactly by head gap plus `size + freespace_beyond` of each record.
fn assert_conserved(report: &UsageReport) {
    for page in &report.pages {
        let tiled: usize = report
            .entries_on(page.index)
            .map(|e| e.size + e.freespace_beyond)
            .sum();
        if page.num_allocations > 0 {
            assert_eq!(page.head_gap + tiled, page.capacity, "page {}", page.index);
        }
    }
}

/// Records are ordered and lie inside their page.
fn assert_ordered(report: &UsageReport) {
    for page in &report.pages {
        let mut cursor = 0;
        for entry in report.entries_on(page.index) {
            assert!(entry.offset >= cursor, "overlap at id={}", entry.id);
            assert!(entry.offset + entry.size <= page.capacity);
            let header = entry.size - entry.payload_size - CANARY_SIZE;
            assert_eq!(entry.ptr, page.base.add(entry.offset + header));
            cursor = entry.offset + entry.size;
        }
    }
}

#[test]
fn test_mid_list_gap_reused() {
    let allocator = EmbeddedAllocator::new(lenient(4096)).unwrap();
    let ptrs: Vec<MemPtr> = (0..10)
        .map(|_| allocator.allocate(64, source_line!()).unwrap())
        .collect();

    let report = allocator.report_usage(true);
    assert_eq!(report.num_allocations, 10);
    assert_eq!(report.usage_bytes, 10 * (64 + CANARY_SIZE + HEADER));
    let fifth_offset = report.entries[4].offset;

    allocator.free(ptrs[4]).unwrap();
    let reused = allocator.allocate(64, source_line!()).unwrap();
    assert_eq!(reused, ptrs[4]);

    let report = allocator.report_usage(true);
    assert_eq!(report.entries[4].offset, fifth_offset);
    assert_eq!(report.entries[9].offset, 9 * (64 + CANARY_SIZE + HEADER));
    assert_conserved(&report);
    assert_ordered(&report);
}

#[test]
fn test_request_beyond_default_page_appends_page() {
    let allocator = EmbeddedAllocator::new(AllocatorConfig {
        strict: false,
        ..AllocatorConfig::default()
    })
    .unwrap();

    let _small = allocator.allocate(128, source_line!()).unwrap();
    assert_eq!(allocator.page_count(), 1);

    let huge = DEFAULT_PAGE_SIZE + 1024 * 1024;
    let _big = allocator.allocate(huge, source_line!()).unwrap();
    assert_eq!(allocator.page_count(), 2);

    let report = allocator.report_usage(false);
    assert_eq!(report.page_count(), 2);
    assert_eq!(report.pages[0].capacity, DEFAULT_PAGE_SIZE);
    assert_eq!(report.pages[1].capacity, huge + HEADER + CANARY_SIZE);
    assert_eq!(report.pages[1].num_allocations, 1);
}

#[test]
fn test_reallocate_larger_moves_and_unlinks() {
    let allocator = EmbeddedAllocator::new(lenient(4096)).unwrap();
    let ptr = allocator.allocate(32, source_line!()).unwrap();
    let _neighbour = allocator.allocate(32, source_line!()).unwrap();
    assert_eq!(allocator.report_usage(false).pages[0].num_allocations, 2);

    let moved = allocator.reallocate(ptr, 256, source_line!()).unwrap();
    assert_ne!(moved, ptr);

    let report = allocator.report_usage(true);
    assert_eq!(report.pages[0].num_allocations, 2);
    assert!(report.entries.iter().all(|e| e.ptr != ptr));
    assert_eq!(report.pages[0].head_gap, 32 + HEADER + CANARY_SIZE);
    assert_conserved(&report);
}

#[test]
fn test_free_then_allocate_is_stable() {
    let allocator = EmbeddedAllocator::new(lenient(4096)).unwrap();
    let _anchor = allocator.allocate(40, source_line!()).unwrap();

    let first = allocator.allocate(100, source_line!()).unwrap();
    let before = allocator.report_usage(true);
    allocator.free(first).unwrap();
    let second = allocator.allocate(100, source_line!()).unwrap();
    let after = allocator.report_usage(true);

    assert_eq!(first, second);
    assert_eq!(before.usage_bytes, after.usage_bytes);
    assert_eq!(before.pages, after.pages);
}

#[test]
fn test_ids_increase_in_allocation_order() {
    let allocator = EmbeddedAllocator::new(lenient(4096)).unwrap();
    let a = allocator.allocate(8, source_line!()).unwrap();
    let _b = allocator.allocate(8, source_line!()).unwrap();
    allocator.free(a).unwrap();
    let _c = allocator.allocate(8, source_line!()).unwrap();

    let report = allocator.report_usage(true);
    let mut ids: Vec<u64> = report.entries.iter().map(|e| e.id).collect();
    ids.sort_unstable();
    assert_eq!(ids, vec![1, 2]);
    // The reused head slot carries the newest id.
    assert_eq!(report.entries[0].id, 2);
}

#[test]
fn test_single_byte_overrun_reports_one_corruption() {
    let allocator = EmbeddedAllocator::new(lenient(4096)).unwrap();
    let victim = allocator.allocate(17, source_line!()).unwrap();
    for _ in 0..5 {
        let _ = allocator.allocate(17, source_line!()).unwrap();
    }
    assert_eq!(allocator.report_usage(true).corruptions, 0);

    allocator.write_raw(victim, 17, &[0x00]).unwrap();
    let report = allocator.report_usage(true);
    assert_eq!(report.corruptions, 1);
    assert_eq!(report.page_count(), 1);
    assert_eq!(report.pages[0].corruptions, 1);
    assert!(report.corruption_warning().is_some());
    assert!(report.to_string().contains("outranged"));
}

#[test]
fn test_freed_block_is_marked() {
    let allocator = EmbeddedAllocator::new(lenient(4096)).unwrap();
    let keep = allocator.allocate(16, source_line!()).unwrap();
    let gone = allocator.allocate(16, source_line!()).unwrap();
    allocator.free(gone).unwrap();

    // The freed canary now reads as the freed mark; the live block is intact.
    let report = allocator.report_usage(true);
    assert_eq!(report.corruptions, 0);
    assert!(allocator.check(keep).is_ok());
    allocator.free(keep).unwrap();
    assert_eq!(allocator.usage_bytes(), 0);
}

#[test]
fn test_layouts_share_placement_semantics() {
    for layout in [LayoutKind::Embedded, LayoutKind::External] {
        let allocator = ppmem_core::from_config(AllocatorConfig {
            layout,
            ..lenient(1024)
        })
        .unwrap();
        let overhead = match layout {
            LayoutKind::Embedded => HEADER + CANARY_SIZE,
            LayoutKind::External => CANARY_SIZE,
        };

        let ptrs: Vec<MemPtr> = (0..4)
            .map(|_| allocator.allocate(50, source_line!()).unwrap())
            .collect();
        assert_eq!(allocator.usage_bytes(), 4 * (50 + overhead));

        assert_eq!(allocator.free(ptrs[1]).unwrap(), FreeOutcome::Freed);
        let again = allocator.allocate(50, source_line!()).unwrap();
        assert_eq!(again, ptrs[1], "{layout}");

        let report = allocator.report_usage(true);
        assert_conserved(&report);
        assert_ordered(&report);
        allocator.shutdown();
    }
}

#[test]
fn test_external_layout_has_no_underflow_guard() {
    let allocator = ExternalAllocator::new(lenient(1024)).unwrap();
    let _first = allocator.allocate(8, source_line!()).unwrap();
    let second = allocator.allocate(8, source_line!()).unwrap();

    // Writing just before `second` lands on the first block's canary.
    let before = MemPtr::from_addr(second.addr() - 1);
    allocator.write_raw(before, 0, &[0]).unwrap();
    assert!(allocator.check(second).is_ok());
    assert_eq!(allocator.report_usage(false).corruptions, 1);
}

#[test]
fn test_config_file_drives_allocator() {
    let config = AllocatorConfig::from_toml_str(
        r#"
        min_page_size = 2048
        layout = "external"
        strict = false
        verify_before_free = true
        "#,
    )
    .unwrap();
    let allocator = ppmem_core::from_config(config).unwrap();
    assert_eq!(allocator.layout_kind(), LayoutKind::External);

    let a = allocator.allocate(10, source_line!()).unwrap();
    let b = allocator.allocate(10, source_line!()).unwrap();
    allocator.write_raw(a, 10, &[0]).unwrap();
    assert_eq!(
        allocator.free(b).unwrap(),
        FreeOutcome::FreedOnCorruptedPage { damaged: 1 }
    );
}
