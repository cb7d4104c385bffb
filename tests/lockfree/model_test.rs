/*!
 * Sequential Model Tests
 *
 * Random single-threaded operation sequences checked against a VecDeque
 */

use adaptive_sync::core::sync::{ChainConfig, DequeChain, MpmcQueue, RingDeque};
use proptest::prelude::*;
use std::collections::VecDeque;

#[derive(Debug, Clone)]
enum DequeOp {
    PushHead(u16),
    PopHead,
    PopTail,
}

fn deque_op() -> impl Strategy<Value = DequeOp> {
    prop_oneof![
        3 => any::<u16>().prop_map(DequeOp::PushHead),
        1 => Just(DequeOp::PopHead),
        1 => Just(DequeOp::PopTail),
    ]
}

proptest! {
    #[test]
    fn chain_matches_model(ops in prop::collection::vec(deque_op(), 0..400)) {
        let chain = DequeChain::with_config(ChainConfig {
            initial_capacity: 2,
            max_segment_capacity: 16,
        })
        .unwrap();
        let mut model = VecDeque::new();

        for op in ops {
            match op {
                DequeOp::PushHead(v) => {
                    chain.push_head(v);
                    model.push_back(v);
                }
                DequeOp::PopHead => prop_assert_eq!(chain.pop_head(), model.pop_back()),
                DequeOp::PopTail => prop_assert_eq!(chain.pop_tail(), model.pop_front()),
            }
            prop_assert_eq!(chain.len(), model.len());
        }
    }

    #[test]
    fn ring_matches_bounded_model(ops in prop::collection::vec(deque_op(), 0..400)) {
        const CAPACITY: usize = 8;
        let ring = RingDeque::with_capacity(CAPACITY).unwrap();
        let mut model = VecDeque::new();

        for op in ops {
            match op {
                DequeOp::PushHead(v) => {
                    let pushed = unsafe { ring.push_head(v) };
                    if model.len() == CAPACITY {
                        prop_assert_eq!(pushed, Err(v));
                    } else {
                        prop_assert_eq!(pushed, Ok(()));
                        model.push_back(v);
                    }
                }
                DequeOp::PopHead => prop_assert_eq!(unsafe { ring.pop_head() }, model.pop_back()),
                DequeOp::PopTail => prop_assert_eq!(ring.pop_tail(), model.pop_front()),
            }
            prop_assert_eq!(ring.len(), model.len());
        }
    }

    #[test]
    fn mpmc_matches_fifo_model(ops in prop::collection::vec(prop::option::of(any::<i32>()), 0..400)) {
        let queue = MpmcQueue::new();
        let mut model = VecDeque::new();

        for op in ops {
            match op {
                Some(v) => {
                    queue.enqueue(v);
                    model.push_back(v);
                }
                None => prop_assert_eq!(queue.dequeue(), model.pop_front()),
            }
            prop_assert_eq!(queue.len(), model.len());
            prop_assert_eq!(queue.is_empty(), model.is_empty());
        }
    }
}
