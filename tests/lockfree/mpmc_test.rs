/*!
 * MPMC Queue Tests
 * Loss-freedom and per-producer ordering under concurrency
 */

use adaptive_sync::core::sync::MpmcQueue;
use pretty_assertions::assert_eq;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

const PRODUCERS: usize = 10;
const PER_PRODUCER: usize = 15;

#[test]
fn test_concurrent_enqueue_then_drain() {
    let queue = Arc::new(MpmcQueue::new());
    let barrier = Arc::new(Barrier::new(PRODUCERS));

    let handles: Vec<_> = (0..PRODUCERS)
        .map(|p| {
            let queue = queue.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                for i in 0..PER_PRODUCER {
                    queue.enqueue(p * 100 + i);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(queue.len(), PRODUCERS * PER_PRODUCER);

    let mut seen = HashSet::new();
    while let Some(v) = queue.dequeue() {
        assert!(seen.insert(v), "value {} dequeued twice", v);
    }
    assert_eq!(seen.len(), PRODUCERS * PER_PRODUCER);
    assert!(queue.is_empty());
}

#[test]
fn test_producers_and_consumers_preserve_per_producer_order() {
    const CONSUMERS: usize = 4;
    const PER: usize = 5_000;

    let queue = Arc::new(MpmcQueue::new());
    let consumed = Arc::new(AtomicUsize::new(0));
    let total = PRODUCERS * PER;

    let producers: Vec<_> = (0..PRODUCERS)
        .map(|p| {
            let queue = queue.clone();
            thread::spawn(move || {
                for seq in 0..PER {
                    queue.enqueue((p, seq));
                }
            })
        })
        .collect();

    let consumers: Vec<_> = (0..CONSUMERS)
        .map(|_| {
            let queue = queue.clone();
            let consumed = consumed.clone();
            thread::spawn(move || {
                let mut last = vec![None::<usize>; PRODUCERS];
                let mut got = Vec::new();
                while consumed.load(Ordering::Acquire) < total {
                    if let Some((p, seq)) = queue.dequeue() {
                        // One consumer sees each producer's values in order
                        if let Some(prev) = last[p] {
                            assert!(seq > prev, "producer {} reordered", p);
                        }
                        last[p] = Some(seq);
                        got.push((p, seq));
                        consumed.fetch_add(1, Ordering::AcqRel);
                    } else {
                        thread::yield_now();
                    }
                }
                got
            })
        })
        .collect();

    for handle in producers {
        handle.join().unwrap();
    }
    let mut all = HashSet::new();
    for handle in consumers {
        for item in handle.join().unwrap() {
            assert!(all.insert(item));
        }
    }
    assert_eq!(all.len(), total);
    assert_eq!(queue.dequeue(), None);
}

#[test]
fn test_range_visits_snapshot_in_fifo_order() {
    let queue = MpmcQueue::new();
    for i in 0..10u32 {
        queue.enqueue(i);
    }
    assert_eq!(queue.dequeue(), Some(0));

    let mut visited = Vec::new();
    queue.range(|v| {
        visited.push(v);
        true
    });
    assert_eq!(visited, (1..10).collect::<Vec<_>>());

    // Visiting does not consume
    assert_eq!(queue.len(), 9);
}
