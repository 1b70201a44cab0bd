//! # keystone-memory
//!
//! Low-level memory services for the Keystone engine runtime: atomic
//! primitives with explicit ordering, a spin lock, dynamic thread-local
//! storage slots, per-thread stack (arena) heaps with marker rewind, and
//! named dynamic heaps with process-wide diagnostics and leak tracking.
//!
//! ## Layers
//!
//! - [`sync`] - [`MemoryOrder`](sync::MemoryOrder) atomics,
//!   [`SpinLock`](sync::SpinLock) and the [`HeapLock`](sync::HeapLock)
//!   policy seam
//! - [`tls`] - dynamically allocated word-sized thread-local slots
//! - [`stack`] - growable bump arenas, one per thread, rewound by marker
//! - [`heap`] - named [`DynamicHeap`](heap::DynamicHeap)s over a pluggable
//!   backing allocator, enumerable for statistics and leak reports
//!
//! ## Quick start
//!
//! ```
//! use keystone_memory::heap::DynamicHeap;
//! use keystone_memory::stack::ThreadLocalStackAllocator;
//!
//! let heap = DynamicHeap::new("game-objects");
//! let block = heap.allocate(256).unwrap();
//! // ... use the block ...
//! unsafe {
//!     heap.deallocate(block, core::alloc::Layout::from_size_align(256, 16).unwrap());
//! }
//!
//! // Scratch memory that vanishes at the end of the scope:
//! let scope = ThreadLocalStackAllocator::scope();
//! let scratch = scope.heap().alloc(1024);
//! assert_eq!(scratch.as_ptr() as usize % 16, 0);
//! ```
//!
//! ## Features
//!
//! - `leak-tracking` (default) - record a backtrace per live dynamic-heap
//!   allocation and print unfreed allocations in the memory report

#![warn(missing_docs)]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod error;
pub mod heap;
pub mod stack;
pub mod sync;
pub mod tls;
pub mod utils;

pub use error::{AllocError, AllocResult};
pub use heap::{DynamicHeap, HeapStats};
pub use stack::{StackHeap, StackMarker, ThreadLocalStackAllocator};
pub use sync::{MemoryOrder, SpinLock};
pub use tls::{ThreadLocalStorage, TlsSlot};

/// Crate version, for diagnostics banners
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
