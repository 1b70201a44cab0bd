//! Concurrency primitives underpinning the allocators
//!
//! ## Modules
//! - `atomic` - portable read-modify-write primitives in four fence strengths
//! - `spin` - busy-waiting mutual exclusion built on `atomic`
//! - `lock` - the lock-policy capability plugged into dynamic heaps
//! - `reentrant` - owner-thread-token lock used by allocation tracking

pub mod atomic;
pub mod lock;
pub mod reentrant;
pub mod spin;

pub use atomic::MemoryOrder;
pub use lock::{HeapLock, OsMutex};
pub(crate) use lock::HeapLockGuard;
pub use reentrant::{ReentrancyGuard, ThreadOwnedLock};
pub use spin::{SpinGuard, SpinLock};
