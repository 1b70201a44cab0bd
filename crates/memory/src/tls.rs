//! Process-wide thread-local storage slots
//!
//! A slot is a process-unique index into every thread's private table of
//! machine words. Any code needing an extra per-thread word (the thread-local
//! stack allocator, recursion guards in diagnostics) allocates a slot once
//! and reads/writes the calling thread's entry through it. A thread that
//! never wrote a slot observes `0` for it, never another thread's value.
//!
//! The facility is a singleton constructed on first use and never torn down.

use std::cell::RefCell;
use std::sync::OnceLock;

use parking_lot::Mutex;

/// Process-unique index of a thread-local storage slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TlsSlot(u32);

impl TlsSlot {
    /// Raw slot index
    #[inline]
    pub fn index(self) -> u32 {
        self.0
    }
}

#[derive(Default)]
struct SlotTable {
    free: Vec<u32>,
    next: u32,
}

std::thread_local! {
    static WORDS: RefCell<Vec<usize>> = const { RefCell::new(Vec::new()) };
}

static INSTANCE: OnceLock<ThreadLocalStorage> = OnceLock::new();

/// Process-wide registry of thread-local storage slots
pub struct ThreadLocalStorage {
    table: Mutex<SlotTable>,
}

impl ThreadLocalStorage {
    /// The process-wide instance, constructed on first use
    pub fn instance() -> &'static Self {
        INSTANCE.get_or_init(|| Self {
            table: Mutex::new(SlotTable::default()),
        })
    }

    /// Allocates a fresh slot index
    ///
    /// Freed indices are reused, so a slot must only be allocated through
    /// this registry and freed exactly once.
    pub fn allocate(&self) -> TlsSlot {
        let mut table = self.table.lock();
        let index = match table.free.pop() {
            Some(index) => index,
            None => {
                let index = table.next;
                table.next += 1;
                index
            }
        };
        TlsSlot(index)
    }

    /// Releases a slot index for reuse
    ///
    /// The caller must guarantee no thread will touch the slot again: stale
    /// per-thread words are not cleared, so a reused index can expose a dead
    /// slot's values to its new owner.
    pub fn free(&self, slot: TlsSlot) {
        let mut table = self.table.lock();
        debug_assert!(slot.0 < table.next, "freeing a slot that was never allocated");
        debug_assert!(!table.free.contains(&slot.0), "slot freed twice");
        table.free.push(slot.0);
    }

    /// The calling thread's word in `slot`, `0` if never set on this thread
    pub fn get(&self, slot: TlsSlot) -> usize {
        WORDS.with(|words| {
            words
                .borrow()
                .get(slot.0 as usize)
                .copied()
                .unwrap_or(0)
        })
    }

    /// Sets the calling thread's word in `slot`
    pub fn set(&self, slot: TlsSlot, value: usize) {
        WORDS.with(|words| {
            let mut words = words.borrow_mut();
            let index = slot.0 as usize;
            if words.len() <= index {
                words.resize(index + 1, 0);
            }
            words[index] = value;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_slot_reads_zero() {
        let tls = ThreadLocalStorage::instance();
        let slot = tls.allocate();
        assert_eq!(tls.get(slot), 0);
        tls.free(slot);
    }

    #[test]
    fn set_then_get_roundtrip() {
        let tls = ThreadLocalStorage::instance();
        let slot = tls.allocate();
        tls.set(slot, 0xDEAD);
        assert_eq!(tls.get(slot), 0xDEAD);
        tls.set(slot, 7);
        assert_eq!(tls.get(slot), 7);
        tls.set(slot, 0);
        tls.free(slot);
    }

    #[test]
    fn values_are_thread_private() {
        let tls = ThreadLocalStorage::instance();
        let slot = tls.allocate();
        tls.set(slot, 42);

        std::thread::spawn(move || {
            let tls = ThreadLocalStorage::instance();
            // This thread never wrote the slot.
            assert_eq!(tls.get(slot), 0);
            tls.set(slot, 99);
            assert_eq!(tls.get(slot), 99);
        })
        .join()
        .unwrap();

        assert_eq!(tls.get(slot), 42);
        tls.set(slot, 0);
        tls.free(slot);
    }

    #[test]
    fn slot_indices_are_unique_while_live() {
        let tls = ThreadLocalStorage::instance();
        let a = tls.allocate();
        let b = tls.allocate();
        let c = tls.allocate();
        assert_ne!(a, b);
        assert_ne!(b, c);
        assert_ne!(a, c);
        tls.free(a);
        tls.free(b);
        tls.free(c);
    }
}
