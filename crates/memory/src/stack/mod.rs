//! Per-thread stack (arena) allocation
//!
//! ## Modules
//! - `heap` - growable bump arena with marker-based rewind
//! - `marker` - saved cursor positions and the RAII `StackFrame`
//! - `config` - block size and debug-fill configuration
//! - `thread_local` - one lazily-created heap per OS thread

pub mod config;
pub mod heap;
pub mod marker;
pub mod thread_local;

pub use config::StackConfig;
pub use heap::StackHeap;
pub use marker::{StackFrame, StackMarker};
pub use thread_local::{StackScope, ThreadLocalStackAllocator};
