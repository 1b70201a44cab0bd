//! Cross-thread behavior of the atomic primitives

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;

use keystone_memory::sync::atomic::{compare_exchange, decrement, increment};
use keystone_memory::sync::MemoryOrder;

#[test]
fn concurrent_increments_and_decrements_balance() {
    const THREADS: usize = 8;
    const ITERS: u32 = 10_000;

    let cell = Arc::new(AtomicU32::new(0));
    let mut handles = Vec::new();

    for i in 0..THREADS {
        let cell = Arc::clone(&cell);
        handles.push(thread::spawn(move || {
            for _ in 0..ITERS {
                if i % 2 == 0 {
                    increment(&cell, MemoryOrder::Full);
                } else {
                    decrement(&cell, MemoryOrder::Full);
                }
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    // Equal numbers of increments and decrements cancel exactly.
    assert_eq!(cell.load(Ordering::SeqCst), 0);
}

#[test]
fn increment_never_loses_updates() {
    const THREADS: usize = 4;
    const ITERS: u32 = 25_000;

    let cell = Arc::new(AtomicU32::new(0));
    let mut handles = Vec::new();
    for _ in 0..THREADS {
        let cell = Arc::clone(&cell);
        handles.push(thread::spawn(move || {
            for _ in 0..ITERS {
                increment(&cell, MemoryOrder::Relaxed);
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(cell.load(Ordering::SeqCst), THREADS as u32 * ITERS);
}

#[test]
fn compare_exchange_admits_one_winner_per_generation() {
    const THREADS: u32 = 8;
    const GENERATIONS: u32 = 1_000;

    let cell = Arc::new(AtomicU32::new(0));
    let wins = Arc::new(AtomicU32::new(0));
    let mut handles = Vec::new();

    for _ in 0..THREADS {
        let cell = Arc::clone(&cell);
        let wins = Arc::clone(&wins);
        handles.push(thread::spawn(move || {
            let mut generation = 0;
            while generation < GENERATIONS {
                let observed = compare_exchange(&cell, generation + 1, generation, MemoryOrder::Full);
                if observed == generation {
                    // This thread advanced the counter for this generation.
                    wins.fetch_add(1, Ordering::Relaxed);
                    generation += 1;
                } else {
                    // Lost the race; catch up with whoever won.
                    generation = cell.load(Ordering::Acquire).min(GENERATIONS);
                }
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(cell.load(Ordering::SeqCst), GENERATIONS);
    assert_eq!(wins.load(Ordering::SeqCst), GENERATIONS);
}
