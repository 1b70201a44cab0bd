//! Portable atomic read-modify-write primitives
//!
//! Every operation is a single indivisible update of a 32-bit cell or a
//! native-width pointer cell, parameterised by one of four fence strengths.
//! The contract lives entirely in which function and order the caller picks:
//! composing several of these into a protocol (a lock, a publish/consume
//! handshake) requires reasoning about the fences explicitly.
//!
//! Exchange, compare-exchange and the bitwise/arithmetic fetch operations
//! return the value observed immediately *before* the update; increment and
//! decrement return the value immediately *after* it.

use core::sync::atomic::{AtomicPtr, AtomicU32, Ordering};

/// Fence strength applied around an atomic read-modify-write
///
/// Pick the cheapest variant that still satisfies the cross-thread
/// visibility requirement of the surrounding protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryOrder {
    /// Sequentially-consistent barrier on both sides of the operation
    Full,
    /// Later reads/writes on this thread cannot move before the operation
    Acquire,
    /// Earlier reads/writes on this thread cannot move after the operation
    Release,
    /// No fence; atomicity of the single operation only
    Relaxed,
}

impl MemoryOrder {
    #[inline]
    fn rmw(self) -> Ordering {
        match self {
            MemoryOrder::Full => Ordering::SeqCst,
            MemoryOrder::Acquire => Ordering::Acquire,
            MemoryOrder::Release => Ordering::Release,
            MemoryOrder::Relaxed => Ordering::Relaxed,
        }
    }

    // Failure side of a compare-exchange is a plain load; release has no
    // meaning there.
    #[inline]
    fn cas_failure(self) -> Ordering {
        match self {
            MemoryOrder::Full => Ordering::SeqCst,
            MemoryOrder::Acquire => Ordering::Acquire,
            MemoryOrder::Release | MemoryOrder::Relaxed => Ordering::Relaxed,
        }
    }
}

/// Atomically replace the value, returning the previous one
#[inline]
pub fn exchange(cell: &AtomicU32, new: u32, order: MemoryOrder) -> u32 {
    cell.swap(new, order.rmw())
}

/// Atomically replace the value only if it currently equals `expected`
///
/// Returns the value actually observed; the update happened iff the return
/// value equals `expected`.
#[inline]
pub fn compare_exchange(cell: &AtomicU32, new: u32, expected: u32, order: MemoryOrder) -> u32 {
    match cell.compare_exchange(expected, new, order.rmw(), order.cas_failure()) {
        Ok(observed) | Err(observed) => observed,
    }
}

/// Atomically add, returning the previous value
#[inline]
pub fn fetch_add(cell: &AtomicU32, value: u32, order: MemoryOrder) -> u32 {
    cell.fetch_add(value, order.rmw())
}

/// Atomically subtract, returning the previous value
#[inline]
pub fn fetch_sub(cell: &AtomicU32, value: u32, order: MemoryOrder) -> u32 {
    cell.fetch_sub(value, order.rmw())
}

/// Atomically AND, returning the previous value
#[inline]
pub fn fetch_and(cell: &AtomicU32, value: u32, order: MemoryOrder) -> u32 {
    cell.fetch_and(value, order.rmw())
}

/// Atomically OR, returning the previous value
#[inline]
pub fn fetch_or(cell: &AtomicU32, value: u32, order: MemoryOrder) -> u32 {
    cell.fetch_or(value, order.rmw())
}

/// Atomically XOR, returning the previous value
#[inline]
pub fn fetch_xor(cell: &AtomicU32, value: u32, order: MemoryOrder) -> u32 {
    cell.fetch_xor(value, order.rmw())
}

/// Atomically add one, returning the new value
#[inline]
pub fn increment(cell: &AtomicU32, order: MemoryOrder) -> u32 {
    cell.fetch_add(1, order.rmw()).wrapping_add(1)
}

/// Atomically subtract one, returning the new value
#[inline]
pub fn decrement(cell: &AtomicU32, order: MemoryOrder) -> u32 {
    cell.fetch_sub(1, order.rmw()).wrapping_sub(1)
}

/// Atomically replace a pointer, returning the previous one
#[inline]
pub fn exchange_ptr<T>(cell: &AtomicPtr<T>, new: *mut T, order: MemoryOrder) -> *mut T {
    cell.swap(new, order.rmw())
}

/// Atomically replace a pointer only if it currently equals `expected`
///
/// Returns the pointer actually observed; the update happened iff the return
/// value equals `expected`.
#[inline]
pub fn compare_exchange_ptr<T>(
    cell: &AtomicPtr<T>,
    new: *mut T,
    expected: *mut T,
    order: MemoryOrder,
) -> *mut T {
    match cell.compare_exchange(expected, new, order.rmw(), order.cas_failure()) {
        Ok(observed) | Err(observed) => observed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exchange_returns_previous() {
        let cell = AtomicU32::new(5);
        assert_eq!(exchange(&cell, 9, MemoryOrder::Full), 5);
        assert_eq!(cell.load(Ordering::SeqCst), 9);
    }

    #[test]
    fn compare_exchange_success_and_failure() {
        let cell = AtomicU32::new(1);
        // Succeeds: observed equals expected.
        assert_eq!(compare_exchange(&cell, 2, 1, MemoryOrder::Full), 1);
        assert_eq!(cell.load(Ordering::SeqCst), 2);
        // Fails: observed differs, value untouched.
        assert_eq!(compare_exchange(&cell, 7, 1, MemoryOrder::Acquire), 2);
        assert_eq!(cell.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn fetch_ops_return_previous() {
        let cell = AtomicU32::new(0b1100);
        assert_eq!(fetch_add(&cell, 1, MemoryOrder::Relaxed), 0b1100);
        assert_eq!(fetch_sub(&cell, 1, MemoryOrder::Relaxed), 0b1101);
        assert_eq!(fetch_and(&cell, 0b0100, MemoryOrder::Relaxed), 0b1100);
        assert_eq!(fetch_or(&cell, 0b0011, MemoryOrder::Relaxed), 0b0100);
        assert_eq!(fetch_xor(&cell, 0b0111, MemoryOrder::Relaxed), 0b0111);
    }

    #[test]
    fn increment_decrement_return_new() {
        let cell = AtomicU32::new(41);
        assert_eq!(increment(&cell, MemoryOrder::Full), 42);
        assert_eq!(decrement(&cell, MemoryOrder::Release), 41);
    }

    #[test]
    fn pointer_exchange() {
        let mut a = 1u64;
        let mut b = 2u64;
        let cell = AtomicPtr::new(&mut a as *mut u64);
        assert_eq!(
            exchange_ptr(&cell, &mut b, MemoryOrder::Full),
            &mut a as *mut u64
        );
        assert_eq!(
            compare_exchange_ptr(
                &cell,
                core::ptr::null_mut(),
                &mut b as *mut u64,
                MemoryOrder::Full
            ),
            &mut b as *mut u64
        );
        assert!(cell.load(Ordering::SeqCst).is_null());
    }
}
