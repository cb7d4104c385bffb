/*!
 * Deque Chain Tests
 * Growth, segment retirement and stealing across threads
 */

use adaptive_sync::core::sync::{ChainConfig, DequeChain, RingDeque};
use adaptive_sync::SyncError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

#[test]
fn test_growth_is_logarithmic() {
    let chain = DequeChain::new();
    for i in 0..1_000_000u32 {
        chain.push_head(i);
    }
    // 8 * (2^17 - 1) >= 1_000_000 > 8 * (2^16 - 1)
    assert_eq!(chain.segments_allocated(), 17);
    assert_eq!(chain.len(), 1_000_000);

    let stealer = chain.stealer();
    assert_eq!(stealer.pop_tail(), Some(0));
    assert_eq!(chain.pop_head(), Some(999_999));
}

#[test]
fn test_invalid_configuration_is_reported() {
    let err = DequeChain::<u8>::with_config(ChainConfig {
        initial_capacity: 0,
        ..Default::default()
    })
    .unwrap_err();
    assert!(matches!(err, SyncError::InvalidCapacity { capacity: 0, .. }));

    assert!(RingDeque::<u8>::with_capacity(1 << 31).is_err());
}

#[test]
fn test_stealers_drain_while_owner_grows() {
    const TOTAL: u64 = 200_000;
    let chain = DequeChain::with_config(ChainConfig {
        initial_capacity: 4,
        max_segment_capacity: 256,
    })
    .unwrap();
    let done = Arc::new(AtomicBool::new(false));

    let stealers: Vec<_> = (0..4)
        .map(|_| {
            let stealer = chain.stealer();
            let done = done.clone();
            thread::spawn(move || {
                let mut sum = 0u64;
                let mut count = 0u64;
                loop {
                    match stealer.pop_tail() {
                        Some(v) => {
                            sum += v;
                            count += 1;
                        }
                        None if done.load(Ordering::Acquire) && stealer.is_empty() => break,
                        None => thread::yield_now(),
                    }
                }
                (sum, count)
            })
        })
        .collect();

    for i in 0..TOTAL {
        chain.push_head(i);
    }
    done.store(true, Ordering::Release);

    let (mut sum, mut count) = (0u64, 0u64);
    for handle in stealers {
        let (s, c) = handle.join().unwrap();
        sum += s;
        count += c;
    }

    assert_eq!(count, TOTAL);
    assert_eq!(sum, TOTAL * (TOTAL - 1) / 2);
    // Everything behind the head segment was retired
    assert_eq!(chain.live_segments(), 1);
}
