//! Error types for memory allocation operations

use core::alloc::Layout;

use thiserror::Error;

/// Result type for allocation operations
pub type AllocResult<T> = core::result::Result<T, AllocError>;

/// Memory allocation errors
///
/// The taxonomy is deliberately narrow: contract violations (double free,
/// out-of-order marker release) are debug assertions, not error values, and
/// stack-heap block exhaustion is fatal. What remains recoverable is a failed
/// request against a backing allocator and malformed layout parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AllocError {
    /// The backing allocator could not satisfy the request
    #[error("allocation of {size} bytes (align {align}) failed")]
    AllocationFailed {
        /// Requested size in bytes
        size: usize,
        /// Requested alignment in bytes
        align: usize,
    },

    /// Size/alignment parameters do not form a valid layout
    #[error("invalid layout: {reason}")]
    InvalidLayout {
        /// What was wrong with the parameters
        reason: &'static str,
    },

    /// A size calculation overflowed `usize`
    #[error("allocation size calculation overflowed")]
    SizeOverflow,
}

impl AllocError {
    /// Create an allocation failure error
    pub fn allocation_failed(size: usize, align: usize) -> Self {
        Self::AllocationFailed { size, align }
    }

    /// Allocation failure described by a [`Layout`]
    pub fn for_layout(layout: Layout) -> Self {
        Self::AllocationFailed {
            size: layout.size(),
            align: layout.align(),
        }
    }

    /// Create an invalid layout error
    pub fn invalid_layout(reason: &'static str) -> Self {
        Self::InvalidLayout { reason }
    }

    /// Create a size overflow error
    pub fn size_overflow() -> Self {
        Self::SizeOverflow
    }

    /// Whether this error represents memory exhaustion
    pub fn is_out_of_memory(&self) -> bool {
        matches!(self, Self::AllocationFailed { .. })
    }
}
