//! Backing allocator capability
//!
//! A dynamic heap does not implement a malloc; it wraps one. The backing
//! free-list/coalescing allocator is an external collaborator reached
//! through this trait, and the heap's lock policy serializes every call into
//! it - implementations need not be internally synchronized.

use core::alloc::Layout;
use core::ptr::NonNull;
use std::alloc::{GlobalAlloc, System};

use crate::error::{AllocError, AllocResult};

/// Byte-level allocator wrapped by a dynamic heap
///
/// # Safety
///
/// Implementations must return pointers that are valid for `layout.size()`
/// bytes at `layout.align()` alignment and stay valid until deallocated
/// through the same instance.
pub unsafe trait BackingAllocator: Send + Sync {
    /// Allocate memory for `layout`
    ///
    /// # Safety
    ///
    /// `layout` must have non-zero size.
    unsafe fn allocate(&self, layout: Layout) -> AllocResult<NonNull<[u8]>>;

    /// Deallocate memory previously returned by this allocator
    ///
    /// # Safety
    ///
    /// `ptr` must have been allocated by this instance with `layout` and not
    /// yet deallocated.
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout);

    /// Grow or shrink an allocation, preserving its prefix
    ///
    /// # Safety
    ///
    /// `ptr` must have been allocated by this instance with `old_layout`;
    /// on success the old pointer is invalid, on failure it stays valid.
    unsafe fn reallocate(
        &self,
        ptr: NonNull<u8>,
        old_layout: Layout,
        new_layout: Layout,
    ) -> AllocResult<NonNull<[u8]>> {
        // SAFETY: forwarded caller contracts.
        unsafe { default_reallocate(self, ptr, old_layout, new_layout) }
    }
}

/// The platform's general-purpose allocator as a backing allocator
///
/// Zero-sized and stateless; delegates to `std::alloc::System`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemAllocator;

impl SystemAllocator {
    /// Creates a new system allocator handle
    #[inline]
    pub const fn new() -> Self {
        SystemAllocator
    }
}

// SAFETY: delegates to the system allocator, which upholds the pointer
// validity contract.
unsafe impl BackingAllocator for SystemAllocator {
    #[inline]
    unsafe fn allocate(&self, layout: Layout) -> AllocResult<NonNull<[u8]>> {
        if layout.size() == 0 {
            // SAFETY: layout.align() is a non-zero power of two, so the
            // address is non-null and satisfies the requested alignment.
            let ptr = unsafe { NonNull::new_unchecked(layout.align() as *mut u8) };
            return Ok(NonNull::slice_from_raw_parts(ptr, 0));
        }

        // SAFETY: layout has non-zero size.
        let ptr = unsafe { System.alloc(layout) };
        match NonNull::new(ptr) {
            Some(ptr) => Ok(NonNull::slice_from_raw_parts(ptr, layout.size())),
            None => Err(AllocError::for_layout(layout)),
        }
    }

    #[inline]
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        if layout.size() == 0 {
            return;
        }
        // SAFETY: forwarded caller contract.
        unsafe { System.dealloc(ptr.as_ptr(), layout) };
    }

    unsafe fn reallocate(
        &self,
        ptr: NonNull<u8>,
        old_layout: Layout,
        new_layout: Layout,
    ) -> AllocResult<NonNull<[u8]>> {
        // System realloc only preserves alignment when it matches.
        if old_layout.align() == new_layout.align()
            && old_layout.size() > 0
            && new_layout.size() > 0
        {
            // SAFETY: forwarded caller contract; alignments match.
            let new_ptr = unsafe { System.realloc(ptr.as_ptr(), old_layout, new_layout.size()) };
            if let Some(new_ptr) = NonNull::new(new_ptr) {
                return Ok(NonNull::slice_from_raw_parts(new_ptr, new_layout.size()));
            }
            return Err(AllocError::for_layout(new_layout));
        }

        // SAFETY: forwarded caller contracts.
        unsafe { default_reallocate(self, ptr, old_layout, new_layout) }
    }
}

// Allocate-copy-deallocate fallback shared by the trait default and the
// cross-alignment path of SystemAllocator's override.
unsafe fn default_reallocate<A: BackingAllocator + ?Sized>(
    backing: &A,
    ptr: NonNull<u8>,
    old_layout: Layout,
    new_layout: Layout,
) -> AllocResult<NonNull<[u8]>> {
    // SAFETY: forwarded caller contracts.
    let new_ptr = unsafe { backing.allocate(new_layout)? };
    let copy_size = core::cmp::min(old_layout.size(), new_layout.size());
    if copy_size > 0 {
        // SAFETY: both regions valid for copy_size bytes, non-overlapping.
        unsafe {
            core::ptr::copy_nonoverlapping(ptr.as_ptr(), new_ptr.as_ptr().cast::<u8>(), copy_size);
        }
    }
    // SAFETY: forwarded caller contracts.
    unsafe { backing.deallocate(ptr, old_layout) };
    Ok(new_ptr)
}
