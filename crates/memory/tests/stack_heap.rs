//! End-to-end behavior of per-thread stack heaps

use std::thread;

use keystone_memory::stack::{StackConfig, StackFrame, StackHeap, ThreadLocalStackAllocator};

#[test]
fn frame_allocation_pattern() {
    // The intended steady-state shape: mark once per frame, allocate freely,
    // rewind in bulk, never grow after warm-up.
    let heap = StackHeap::new(StackConfig::default().with_block_size(64 * 1024));

    // Warm-up frame sizes the block chain.
    {
        let frame = StackFrame::new(&heap);
        for _ in 0..100 {
            frame.heap().alloc(256);
        }
    }
    let warm_blocks = heap.block_count();

    for _ in 0..50 {
        let frame = StackFrame::new(&heap);
        for _ in 0..100 {
            frame.heap().alloc(256);
        }
        drop(frame);
        assert_eq!(heap.used(), 0);
    }
    assert_eq!(heap.block_count(), warm_blocks);
}

#[test]
fn nested_frames_restore_in_order() {
    let heap = StackHeap::new(StackConfig::default().with_block_size(4096));

    let outer = StackFrame::new(&heap);
    heap.alloc(128);
    let after_outer = heap.used();

    {
        let _inner = StackFrame::new(&heap);
        heap.alloc(512);
        assert!(heap.used() > after_outer);
    }
    assert_eq!(heap.used(), after_outer);

    outer.restore();
    assert_eq!(heap.used(), 0);
}

#[test]
fn allocations_are_writable_across_block_boundaries() {
    let heap = StackHeap::new(StackConfig::production().with_block_size(1024));
    let mut ptrs = Vec::new();
    for i in 0..64u8 {
        let p = heap.alloc(100);
        unsafe { core::ptr::write_bytes(p.as_ptr(), i, 100) };
        ptrs.push((p, i));
    }
    for (p, i) in ptrs {
        let slice = unsafe { core::slice::from_raw_parts(p.as_ptr(), 100) };
        assert!(slice.iter().all(|&b| b == i));
    }
    assert!(heap.block_count() > 1);
}

#[test]
fn threads_get_independent_scratch_heaps() {
    let mut handles = Vec::new();
    for t in 0..4u8 {
        handles.push(thread::spawn(move || {
            let scope = ThreadLocalStackAllocator::scope();
            let p = scope.heap().alloc(1024);
            unsafe { core::ptr::write_bytes(p.as_ptr(), t, 1024) };
            let slice = unsafe { core::slice::from_raw_parts(p.as_ptr(), 1024) };
            assert!(slice.iter().all(|&b| b == t));
            drop(scope);
            // SAFETY: the scope is dropped and no heap reference survives.
            unsafe { ThreadLocalStackAllocator::release_heap() };
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }
}
