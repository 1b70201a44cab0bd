//! Diagnostic dump of every live dynamic heap
//!
//! One line per heap with its name, live allocation count and live byte
//! total, tab-separated so the output pastes straight into a spreadsheet.
//! With `leak-tracking` enabled each heap's unfreed allocations follow its
//! line, complete with symbolized capture sites.

use core::fmt;

use super::registry;

/// Writes the per-heap statistics table (and leak details, when tracked)
/// to `out`
pub fn write_memory_stats<W: fmt::Write>(out: &mut W) -> fmt::Result {
    let guard = registry::read();
    for heap in guard.iter() {
        writeln!(
            out,
            "{}\t{}\t{}",
            heap.name(),
            heap.allocation_count(),
            heap.bytes_allocated()
        )?;
        #[cfg(feature = "leak-tracking")]
        heap.write_leaks(out)?;
    }
    Ok(())
}

/// Renders the statistics table and emits it through `tracing`
pub fn log_memory_stats() {
    let mut report = String::new();
    if write_memory_stats(&mut report).is_ok() {
        tracing::info!(heaps = registry::len(), "memory statistics\n{report}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heap::DynamicHeap;

    #[test]
    fn report_contains_heap_line() {
        let heap = DynamicHeap::new("report-unit");
        let ptr = heap.allocate(128).unwrap();

        let mut report = String::new();
        write_memory_stats(&mut report).unwrap();
        assert!(report.lines().any(|l| l.starts_with("report-unit\t1\t128")));

        unsafe {
            heap.deallocate(ptr, core::alloc::Layout::from_size_align(128, 16).unwrap());
        }
    }

    #[cfg(feature = "leak-tracking")]
    #[test]
    fn report_includes_unfreed_allocations() {
        let heap = DynamicHeap::new("report-leak");
        let ptr = heap.allocate(96).unwrap();

        let mut report = String::new();
        write_memory_stats(&mut report).unwrap();
        assert!(report.contains("report-leak: unfreed allocation"));
        assert!(report.contains("(96 bytes)"));

        unsafe {
            heap.deallocate(ptr, core::alloc::Layout::from_size_align(96, 16).unwrap());
        }
    }
}
