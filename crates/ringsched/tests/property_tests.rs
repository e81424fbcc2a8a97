//! Property-based tests for the invariants named in the design doc's
//! "Testable Properties" section, tagged the same way the unit tests are
//! (`INV-RQ-*` for the ring buffer, `INV-PS-*` for the pub/sub bus).

use std::cell::RefCell;
use std::rc::Rc;

use proptest::prelude::*;

use ringsched::{Config, Message, PubSubManager, RingQ, Value};

#[derive(Debug, Clone, Copy)]
enum RingOp {
    Push(u32),
    Pop,
}

fn ring_op_strategy() -> impl Strategy<Value = RingOp> {
    prop_oneof![
        (0u32..10_000).prop_map(RingOp::Push),
        Just(RingOp::Pop),
    ]
}

proptest! {
    /// INV-RQ-01: cumulative pops never exceed cumulative pushes, for any
    /// interleaving of push/pop.
    #[test]
    fn inv_rq_01_pops_never_exceed_pushes(ops in prop::collection::vec(ring_op_strategy(), 0..500)) {
        let q = RingQ::new(16);
        let mut pushed = 0u64;
        let mut popped = 0u64;

        for op in ops {
            match op {
                RingOp::Push(v) => {
                    if q.push(v) {
                        pushed += 1;
                    }
                }
                RingOp::Pop => {
                    if q.pop().is_some() {
                        popped += 1;
                    }
                }
            }
            prop_assert!(popped <= pushed);
        }
    }

    /// INV-RQ-02: whenever the ring reports empty, its internal checksum
    /// bookkeeping must also agree (observed indirectly: pop returns None
    /// and a subsequent push/pop round trip is exact).
    #[test]
    fn inv_rq_02_drained_ring_round_trips_exactly(values in prop::collection::vec(0u32..10_000, 0..64)) {
        let q = RingQ::new(128);
        for &v in &values {
            prop_assert!(q.push(v));
        }
        let mut out = Vec::new();
        while let Some(v) = q.pop() {
            out.push(v);
        }
        prop_assert_eq!(out, values);
        prop_assert!(q.is_empty());
        prop_assert_eq!(q.count(), 0);
    }

    /// INV-PS-01: for K successful publishes on one topic with one
    /// subscriber and no removal, the subscriber sees exactly K callbacks
    /// in publish order.
    #[test]
    fn inv_ps_01_exactly_once_delivery_in_order(keys in prop::collection::vec(0i64..1_000_000, 0..200)) {
        let mgr = PubSubManager::new(Config::default());
        let received = Rc::new(RefCell::new(Vec::new()));
        let received2 = Rc::clone(&received);
        mgr.subscribe("t", move |_topic, msg| {
            received2.borrow_mut().push(msg.key);
        }).unwrap();

        let mut published = Vec::new();
        for key in keys {
            if mgr.publish("t", Message::new(key, Value::Number(key as u64))) {
                published.push(key);
            }
            if published.len() % 17 == 0 {
                mgr.process_all();
            }
        }
        mgr.process_all();

        prop_assert_eq!(received.borrow().clone(), published);
    }

    /// Boundary: `qsize - 1` successful publishes without dispatch fill the
    /// queue; the next publish fails.
    #[test]
    fn boundary_queue_fills_at_capacity_minus_one(qsize in 2usize..32) {
        let config = Config::new(2, 4, 16, qsize, 2, 256, false);
        let mgr = PubSubManager::new(config);
        mgr.create_topic("t").unwrap();

        for key in 0..(qsize - 1) as i64 {
            prop_assert!(mgr.publish("t", Message::new(key, Value::Number(key as u64))));
        }
        prop_assert!(!mgr.publish("t", Message::new(9999, Value::Number(9999))));
    }
}
