//! Named dynamic heaps with a global diagnostic registry
//!
//! ## Modules
//! - `dynamic` - the [`DynamicHeap`] handle and its shared node
//! - `backing` - the [`BackingAllocator`] seam and the system implementation
//! - `registry` - the process-wide list the report walks
//! - `stats` - per-heap atomic counters
//! - `report` - the tab-separated statistics dump
//! - `tracking` - per-allocation backtraces (feature `leak-tracking`)

pub mod backing;
pub mod dynamic;
pub mod registry;
pub mod report;
pub mod stats;
#[cfg(feature = "leak-tracking")]
mod tracking;

pub use backing::{BackingAllocator, SystemAllocator};
pub use dynamic::{DynamicHeap, HeapNode};
pub use report::{log_memory_stats, write_memory_stats};
pub use stats::{AtomicHeapStats, HeapStats};
