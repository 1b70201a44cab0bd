//! Per-allocation metadata for leak reports
//!
//! When the `leak-tracking` feature is enabled every successful dynamic-heap
//! allocation records its address, size and an unresolved backtrace here.
//! Backtraces are symbolized only when a report is printed; capture stays
//! cheap on the allocation path.
//!
//! The map is guarded by a [`ThreadOwnedLock`]: symbolization may allocate
//! from the very heap being reported, and that inner allocation must be able
//! to re-enter the tracker on the same thread without deadlocking.

use core::cell::UnsafeCell;
use core::fmt;
use std::collections::HashMap;

use backtrace::Backtrace;

use crate::sync::ThreadOwnedLock;

/// Metadata recorded for one live allocation
pub(crate) struct AllocationRecord {
    pub(crate) size: usize,
    trace: Backtrace,
}

/// Address -> metadata map for one dynamic heap
pub(crate) struct AllocationTracker {
    lock: ThreadOwnedLock,
    /// Guarded by `lock`; same-thread re-entry sees its own consistent view.
    records: UnsafeCell<HashMap<usize, AllocationRecord>>,
}

// SAFETY: the map is only touched while `lock` is held; recursive entries
// stay on the owning thread.
unsafe impl Send for AllocationTracker {}
unsafe impl Sync for AllocationTracker {}

impl AllocationTracker {
    pub(crate) fn new() -> Self {
        Self {
            lock: ThreadOwnedLock::new(),
            records: UnsafeCell::new(HashMap::new()),
        }
    }

    /// Record a successful allocation
    pub(crate) fn record(&self, addr: usize, size: usize) {
        let _entry = self.lock.enter();
        // SAFETY: lock held (possibly recursively, by this thread only).
        let records = unsafe { &mut *self.records.get() };
        records.insert(
            addr,
            AllocationRecord {
                size,
                trace: Backtrace::new_unresolved(),
            },
        );
    }

    /// Drop the record for a freed allocation
    pub(crate) fn forget(&self, addr: usize) {
        let _entry = self.lock.enter();
        // SAFETY: lock held (possibly recursively, by this thread only).
        let records = unsafe { &mut *self.records.get() };
        records.remove(&addr);
    }

    /// Number of live records
    pub(crate) fn len(&self) -> usize {
        let _entry = self.lock.enter();
        // SAFETY: lock held.
        unsafe { &*self.records.get() }.len()
    }

    /// Writes one block per unfreed allocation: address, size and the
    /// symbolized capture site
    ///
    /// Frames that fail to symbolize degrade to `???`; the report never
    /// aborts over a resolution failure.
    pub(crate) fn write_report(&self, name: &str, out: &mut dyn fmt::Write) -> fmt::Result {
        let _entry = self.lock.enter();
        // The walk operates on a detached snapshot: symbolization may
        // allocate and re-enter `record`/`forget` on this thread, so no
        // borrow of the live map may be held while `resolve` runs.
        // SAFETY: lock held; the borrow ends before symbolization starts.
        let mut snapshot = std::mem::take(unsafe { &mut *self.records.get() });

        let mut addrs: Vec<usize> = snapshot.keys().copied().collect();
        addrs.sort_unstable();
        let mut result = Ok(());
        'walk: for &addr in &addrs {
            let Some(record) = snapshot.get_mut(&addr) else {
                continue;
            };
            result = writeln!(out, "{name}: unfreed allocation {addr:#x} ({} bytes)", record.size);
            if result.is_err() {
                break;
            }
            record.trace.resolve();
            for frame in record.trace.frames() {
                result = match frame.symbols().first().and_then(|s| s.name()) {
                    Some(symbol) => writeln!(out, "    {symbol}"),
                    None => writeln!(out, "    ???"),
                };
                if result.is_err() {
                    break 'walk;
                }
            }
        }

        // Merge the snapshot back, keeping anything recorded mid-walk. An
        // address freed by this same thread mid-walk is conservatively
        // re-listed until it is recorded or freed again.
        // SAFETY: lock still held; the snapshot walk is over.
        let records = unsafe { &mut *self.records.get() };
        for (addr, record) in snapshot {
            records.entry(addr).or_insert(record);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_and_forget() {
        let tracker = AllocationTracker::new();
        tracker.record(0x1000, 64);
        tracker.record(0x2000, 32);
        assert_eq!(tracker.len(), 2);
        tracker.forget(0x1000);
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn report_lists_live_records() {
        let tracker = AllocationTracker::new();
        tracker.record(0xABC0, 48);
        let mut report = String::new();
        tracker.write_report("Test", &mut report).unwrap();
        assert!(report.contains("0xabc0"));
        assert!(report.contains("48 bytes"));
    }

    #[test]
    fn report_leaves_records_intact() {
        let tracker = AllocationTracker::new();
        tracker.record(0x1100, 8);
        tracker.record(0x2200, 8);

        let mut first = String::new();
        tracker.write_report("Test", &mut first).unwrap();
        assert_eq!(tracker.len(), 2);

        // A second walk sees the same records.
        let mut second = String::new();
        tracker.write_report("Test", &mut second).unwrap();
        assert!(second.contains("0x1100"));
        assert!(second.contains("0x2200"));
    }

    #[test]
    fn forgotten_record_leaves_report() {
        let tracker = AllocationTracker::new();
        tracker.record(0xDEF0, 16);
        tracker.forget(0xDEF0);
        let mut report = String::new();
        tracker.write_report("Test", &mut report).unwrap();
        assert!(report.is_empty());
    }
}
