//! Alignment helpers and spin-loop utilities shared across the crate

use core::sync::atomic::{AtomicUsize, Ordering};

/// Default alignment handed out by `alloc(size)`-style entry points that do
/// not name an alignment, matching the guarantee of a typical malloc.
pub const DEFAULT_ALIGNMENT: usize = 16;

/// Aligns a value up to the nearest multiple of alignment
///
/// # Examples
/// ```
/// use keystone_memory::utils::align_up;
///
/// assert_eq!(align_up(7, 8), 8);
/// assert_eq!(align_up(8, 8), 8);
/// assert_eq!(align_up(9, 8), 16);
/// ```
#[inline(always)]
pub const fn align_up(value: usize, alignment: usize) -> usize {
    debug_assert!(alignment.is_power_of_two());
    (value + alignment - 1) & !(alignment - 1)
}

/// Aligns a value down to the nearest multiple of alignment
#[inline(always)]
pub const fn align_down(value: usize, alignment: usize) -> usize {
    debug_assert!(alignment.is_power_of_two());
    value & !(alignment - 1)
}

/// Checks if a value is aligned to the given alignment
#[inline(always)]
pub const fn is_aligned(value: usize, alignment: usize) -> bool {
    debug_assert!(alignment.is_power_of_two());
    value & (alignment - 1) == 0
}

/// Calculates padding needed to align a value
#[inline(always)]
pub const fn padding_needed(value: usize, alignment: usize) -> usize {
    align_up(value, alignment) - value
}

/// Atomically update maximum value
#[inline]
pub fn atomic_max(current: &AtomicUsize, value: usize) {
    let mut max = current.load(Ordering::Relaxed);
    loop {
        if value <= max {
            break;
        }
        match current.compare_exchange_weak(max, value, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => break,
            Err(x) => max = x,
        }
    }
}

/// Format bytes into a human-readable string
///
/// ```
/// use keystone_memory::utils::format_bytes;
///
/// assert_eq!(format_bytes(512), "512 B");
/// assert_eq!(format_bytes(1536), "1.50 KB");
/// ```
pub fn format_bytes(bytes: usize) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.2} {}", UNITS[unit])
    }
}

/// Backoff utility for spin loops
///
/// Spins with exponentially growing pause counts; once the budget is
/// exhausted the caller is expected to yield the timeslice instead.
#[derive(Debug, Clone)]
pub struct Backoff {
    current: u32,
    max: u32,
}

impl Backoff {
    /// Create new backoff with default parameters
    #[inline]
    pub fn new() -> Self {
        Self { current: 1, max: 64 }
    }

    /// Spin for the current pause count and grow it
    #[inline]
    pub fn spin(&mut self) {
        for _ in 0..self.current {
            core::hint::spin_loop();
        }
        if self.current < self.max {
            self.current <<= 1;
        }
    }

    /// Whether the spin budget is exhausted and the caller should yield
    #[inline]
    pub fn is_completed(&self) -> bool {
        self.current >= self.max
    }

    /// Reset to the initial pause count
    #[inline]
    pub fn reset(&mut self) {
        self.current = 1;
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new()
    }
}
