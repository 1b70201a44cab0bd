//! Process-wide list of live dynamic heaps
//!
//! Heaps add themselves on construction and remove themselves on drop; the
//! diagnostic report walks the list under a read lock while heaps keep
//! serving allocations on their own locks.

use std::collections::VecDeque;
use std::sync::{Arc, OnceLock};

use parking_lot::{RwLock, RwLockReadGuard};

use super::dynamic::HeapNode;

static GLOBAL_HEAPS: OnceLock<RwLock<VecDeque<Arc<HeapNode>>>> = OnceLock::new();

fn heaps() -> &'static RwLock<VecDeque<Arc<HeapNode>>> {
    GLOBAL_HEAPS.get_or_init(|| RwLock::new(VecDeque::new()))
}

/// Read guard over the heap list
///
/// Holding this blocks heap creation and destruction, not allocation; keep
/// it only as long as the walk takes.
pub struct HeapListGuard {
    inner: RwLockReadGuard<'static, VecDeque<Arc<HeapNode>>>,
}

impl HeapListGuard {
    /// Iterates heaps newest-first
    pub fn iter(&self) -> impl Iterator<Item = &HeapNode> {
        self.inner.iter().map(Arc::as_ref)
    }

    /// Number of live heaps
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// True when no dynamic heap is live
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

/// Locks the heap list for enumeration
pub fn read() -> HeapListGuard {
    HeapListGuard { inner: heaps().read() }
}

/// Number of live heaps
pub fn len() -> usize {
    heaps().read().len()
}

pub(crate) fn register(node: Arc<HeapNode>) {
    heaps().write().push_front(node);
}

pub(crate) fn unregister(node: &Arc<HeapNode>) {
    let mut list = heaps().write();
    if let Some(pos) = list.iter().position(|n| Arc::ptr_eq(n, node)) {
        list.remove(pos);
    }
}
