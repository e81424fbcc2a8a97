//! End-to-end scenarios exercising the scheduler, the pub/sub bus, and the
//! ring buffer together, one per concrete example worked through in the
//! design doc.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use ringsched::{Adapter, Config, Message, PubSubManager, RingQ, Scheduler, Value};

#[test]
fn scenario_1_single_producer_single_subscriber_100_items() {
    let mgr = PubSubManager::new(Config::default());
    let received = Rc::new(RefCell::new(Vec::new()));
    let received2 = Rc::clone(&received);

    mgr.subscribe("t", move |_topic, msg| {
        let Value::Number(v) = msg.value else { unreachable!() };
        received2.borrow_mut().push((msg.key, v));
    })
    .unwrap();

    for key in 0..100i64 {
        assert!(mgr.publish("t", Message::new(key, Value::Number(key as u64))));
    }
    mgr.process_all();

    let received = received.borrow();
    assert_eq!(received.len(), 100);
    for (i, (key, value)) in received.iter().enumerate() {
        assert_eq!(*key, i as i64);
        assert_eq!(*value, i as u64);
    }
}

#[test]
fn scenario_2_full_queue_back_pressure() {
    // qsize = 64 → 63 usable slots.
    let mgr = PubSubManager::new(Config::default());
    mgr.create_topic("t").unwrap();

    for key in 0..63i64 {
        assert!(mgr.publish("t", Message::new(key, Value::Number(key as u64))));
    }
    assert!(!mgr.publish("t", Message::new(63, Value::Number(63))));

    mgr.process_all();
    assert_eq!(mgr.queue_size("t"), 0);
    assert!(mgr.publish("t", Message::new(100, Value::Number(100))));
}

#[test]
fn scenario_3_multi_producer_fan_in() {
    let mgr = Rc::new(PubSubManager::new(Config::default()));
    let received: Rc<RefCell<HashMap<i64, u64>>> = Rc::new(RefCell::new(HashMap::new()));

    let received2 = Rc::clone(&received);
    mgr.subscribe("t", move |_topic, msg| {
        let Value::Number(v) = msg.value else { unreachable!() };
        received2.borrow_mut().insert(msg.key, v);
    })
    .unwrap();

    // max_tasks must fit 4 producers + the driver below.
    let config = Config::new(4, 8, 16, 1024, 5, 256, false);
    let sched = Scheduler::new(&config);

    for producer_idx in 0..4i64 {
        let mgr_producer = Rc::clone(&mgr);
        sched.add(move |h| async move {
            for n in 0..250i64 {
                let key = producer_idx * 250 + n;
                loop {
                    if mgr_producer.publish("t", Message::new(key, Value::Number(key as u64))) {
                        break;
                    }
                    h.yield_now().await;
                }
                h.yield_now().await;
            }
        });
    }

    let mgr_driver = Rc::clone(&mgr);
    sched.add(move |h| async move {
        // Drain periodically so producers don't permanently back off, then
        // once more after every producer has had a chance to finish.
        for _ in 0..2000 {
            mgr_driver.process_all();
            h.yield_now().await;
        }
    });

    sched.run();
    mgr.process_all();

    let received = received.borrow();
    assert_eq!(received.len(), 1000);
    for key in 0..1000i64 {
        assert_eq!(received.get(&key), Some(&(key as u64)));
    }
}

#[test]
fn scenario_4_cooperative_sleep_ordering() {
    // max_tasks must fit A, B, the idle task, and the driver below.
    let config = Config::new(1, 1, 2, 2, 4, 2, false);
    let sched = Scheduler::new(&config);

    let a_wakes = Rc::new(RefCell::new(0u32));
    let a_wakes2 = Rc::clone(&a_wakes);
    sched.add(move |h| async move {
        loop {
            h.sleep(100).await;
            *a_wakes2.borrow_mut() += 1;
        }
    });

    let b_wakes = Rc::new(RefCell::new(0u32));
    let b_wakes2 = Rc::clone(&b_wakes);
    sched.add(move |h| async move {
        loop {
            h.sleep(50).await;
            *b_wakes2.borrow_mut() += 1;
        }
    });

    let idle_id = sched
        .add(|h| async move {
            loop {
                h.yield_now().await;
            }
        })
        .unwrap();
    sched.set_idle_task(idle_id).unwrap();

    // A, B, and the idle task all loop forever, so `run()` would never
    // return on its own. A fourth, self-terminating driver task counts 1000
    // ticks, tears the other three down, then returns so `run()` can exit.
    let a_id = 0usize;
    let b_id = 1usize;
    sched.add(move |h| async move {
        for _ in 0..1000 {
            h.yield_now().await;
        }
        h.remove(a_id).unwrap();
        h.remove(b_id).unwrap();
        h.remove(idle_id).unwrap();
    });

    sched.run();

    assert!(*b_wakes.borrow() >= *a_wakes.borrow() * 2);
    assert!(*a_wakes.borrow() >= 8);
}

#[test]
fn scenario_5_adapter_poll_ingestion() {
    let mgr = PubSubManager::new(Config::default());

    let mut inbound = vec![
        ("ext".to_string(), Message::new(1, Value::Number(1))),
        ("ext".to_string(), Message::new(2, Value::Number(2))),
        ("ext".to_string(), Message::new(3, Value::Number(3))),
    ];
    inbound.reverse();
    let inbound = RefCell::new(inbound);

    let outbound_invocations = Rc::new(RefCell::new(0u32));
    let outbound_invocations2 = Rc::clone(&outbound_invocations);

    mgr.set_adapter(Some(Adapter::new(
        move |_topic, _msg| {
            *outbound_invocations2.borrow_mut() += 1;
            true
        },
        move || inbound.borrow_mut().pop(),
    )));

    let received = Rc::new(RefCell::new(Vec::new()));
    let received2 = Rc::clone(&received);
    mgr.subscribe("ext", move |_topic, msg| {
        received2.borrow_mut().push(msg.key);
    })
    .unwrap();

    mgr.poll_adapter();
    mgr.process_all();

    assert_eq!(*received.borrow(), vec![1, 2, 3]);
    assert_eq!(*outbound_invocations.borrow(), 0);
}

#[test]
fn scenario_6_ring_buffer_wrap() {
    let q = RingQ::new(8);
    for v in 1..=7 {
        assert!(q.push(v));
    }
    for expected in 1..=4 {
        assert_eq!(q.pop(), Some(expected));
    }
    for v in 8..=11 {
        assert!(q.push(v));
    }
    for expected in 5..=11 {
        assert_eq!(q.pop(), Some(expected));
    }
    assert_eq!(q.count(), 0);
    assert!(q.is_empty());
}
