//! Position markers and RAII frames for scoped stack-heap deallocation

use super::heap::StackHeap;

/// A saved cursor position in a [`StackHeap`]
///
/// Releasing a marker rewinds the heap's cursor, bulk-freeing everything
/// allocated after the marker was taken. Markers obey strict nesting: they
/// must be released in the reverse order they were taken (checked by a debug
/// assertion in [`StackHeap::release`]).
///
/// Deliberately neither `Copy` nor `Clone` - a marker is consumed by exactly
/// one release.
#[must_use = "a marker that is never released frees nothing"]
#[derive(Debug)]
pub struct StackMarker {
    pub(super) block: usize,
    pub(super) offset: usize,
    pub(super) depth: usize,
}

/// RAII helper binding a marker's release to scope exit
///
/// Marks the heap on creation and rewinds to that position on drop, so every
/// allocation made inside the scope is freed the instant the frame dies.
pub struct StackFrame<'a> {
    heap: &'a StackHeap,
    marker: Option<StackMarker>,
}

impl<'a> StackFrame<'a> {
    /// Creates a frame that restores the heap to its current position on drop
    pub fn new(heap: &'a StackHeap) -> Self {
        let marker = heap.mark();
        Self {
            heap,
            marker: Some(marker),
        }
    }

    /// The heap this frame scopes
    pub fn heap(&self) -> &'a StackHeap {
        self.heap
    }

    /// Manually restore and consume this frame
    pub fn restore(self) {
        drop(self);
    }
}

impl Drop for StackFrame<'_> {
    fn drop(&mut self) {
        if let Some(marker) = self.marker.take() {
            self.heap.release(marker);
        }
    }
}
