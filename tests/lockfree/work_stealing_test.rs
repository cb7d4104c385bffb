/*!
 * Work-Stealing Scenario
 *
 * Ten workers each own a deque chain. They push 10,000 values apiece and
 * pop 5,000 back locally while two stealers round-robin over every chain.
 * Every value must be handled exactly once.
 */

use adaptive_sync::core::sync::{ChainStealer, DequeChain};
use adaptive_sync::monitoring::span_operation;
use adaptive_sync::try_init_tracing;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

const WORKERS: usize = 10;
const PUSHES: usize = 10_000;
const LOCAL_POPS: usize = 5_000;
const STEALERS: usize = 2;

fn steal_round(stealers: &[ChainStealer<usize>], out: &mut Vec<usize>) -> bool {
    let mut stole = false;
    for stealer in stealers {
        if let Some(v) = stealer.pop_tail() {
            out.push(v);
            stole = true;
        }
    }
    stole
}

#[test]
fn test_every_value_handled_exactly_once() {
    try_init_tracing();
    let span = span_operation("work_stealing_scenario");

    let chains: Vec<DequeChain<usize>> = (0..WORKERS).map(|_| DequeChain::new()).collect();
    let stealer_sets: Vec<ChainStealer<usize>> = chains.iter().map(|c| c.stealer()).collect();

    let workers_done = Arc::new(AtomicUsize::new(0));
    let start = Arc::new(Barrier::new(WORKERS + STEALERS));

    let stealers: Vec<_> = (0..STEALERS)
        .map(|_| {
            let handles = stealer_sets.clone();
            let workers_done = workers_done.clone();
            let start = start.clone();
            thread::spawn(move || {
                start.wait();
                let mut got = Vec::new();
                loop {
                    let finished = workers_done.load(Ordering::Acquire) == WORKERS;
                    // A fruitless pass after every worker finished means all
                    // chains are empty for good.
                    if !steal_round(&handles, &mut got) && finished {
                        break;
                    }
                }
                got
            })
        })
        .collect();

    let workers: Vec<_> = chains
        .into_iter()
        .enumerate()
        .map(|(w, chain)| {
            let workers_done = workers_done.clone();
            let start = start.clone();
            thread::spawn(move || {
                start.wait();
                let mut got = Vec::new();
                let mut popped = 0;
                for i in 0..PUSHES {
                    chain.push_head(w * PUSHES + i);
                    if i % 2 == 1 && popped < LOCAL_POPS {
                        popped += 1;
                        if let Some(v) = chain.pop_head() {
                            got.push(v);
                        }
                    }
                }
                workers_done.fetch_add(1, Ordering::AcqRel);
                got
            })
        })
        .collect();

    let mut all = Vec::with_capacity(WORKERS * PUSHES);
    for handle in workers.into_iter().chain(stealers) {
        all.extend(handle.join().unwrap());
    }
    span.record_items(all.len());

    let unique: HashSet<_> = all.iter().copied().collect();
    assert_eq!(all.len(), WORKERS * PUSHES);
    assert_eq!(unique.len(), WORKERS * PUSHES);
    assert!(stealer_sets.iter().all(|s| s.is_empty()));
}
