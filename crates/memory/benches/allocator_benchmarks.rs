use core::alloc::Layout;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use keystone_memory::heap::DynamicHeap;
use keystone_memory::stack::{StackConfig, StackFrame, StackHeap};

fn stack_heap_alloc(c: &mut Criterion) {
    let mut group = c.benchmark_group("stack_heap");

    group.bench_function("alloc_64", |b| {
        let heap = StackHeap::new(StackConfig::production());
        b.iter(|| {
            let frame = StackFrame::new(&heap);
            for _ in 0..100 {
                black_box(frame.heap().alloc(black_box(64)));
            }
        });
    });

    group.bench_function("alloc_aligned_64", |b| {
        let heap = StackHeap::new(StackConfig::production());
        b.iter(|| {
            let frame = StackFrame::new(&heap);
            for _ in 0..100 {
                black_box(frame.heap().alloc_aligned(black_box(64), black_box(64)));
            }
        });
    });

    group.bench_function("mark_release", |b| {
        let heap = StackHeap::new(StackConfig::production());
        b.iter(|| {
            let marker = heap.mark();
            black_box(heap.alloc(256));
            heap.release(marker);
        });
    });

    group.finish();
}

fn dynamic_heap_alloc(c: &mut Criterion) {
    let mut group = c.benchmark_group("dynamic_heap");
    let layout = Layout::from_size_align(64, 16).unwrap();

    group.bench_function("allocate_free_64", |b| {
        let heap = DynamicHeap::new("bench");
        b.iter(|| {
            let p = heap.allocate(black_box(64)).unwrap();
            unsafe { heap.deallocate(black_box(p), layout) };
        });
    });

    group.bench_function("system_malloc_baseline", |b| {
        b.iter(|| unsafe {
            let p = std::alloc::alloc(layout);
            std::alloc::dealloc(black_box(p), layout);
        });
    });

    group.finish();
}

criterion_group!(benches, stack_heap_alloc, dynamic_heap_alloc);
criterion_main!(benches);
