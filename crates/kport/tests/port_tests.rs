//! End-to-end port behavior: consumer pools, overflow isolation, close.

use kport::{
    DeliveryFlags, Event, IoPort, Payload, PortError, Signals, UserPayload, IO_PAYLOAD_SIZE,
    SENTINEL_KEY, USER_PAYLOAD_SIZE,
};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[test]
fn consumer_pool_with_sentinels() {
    const WAITERS: usize = 5;
    const WORK: u64 = 10;

    let port = IoPort::create(0).unwrap();

    let mut waiters = Vec::new();
    for _ in 0..WAITERS {
        let port = Arc::clone(&port);
        waiters.push(thread::spawn(move || {
            let mut sum = 0u64;
            loop {
                let (key, payload) = port.wait(USER_PAYLOAD_SIZE).unwrap();
                assert!(key >= 0, "pool waiters only see user packets here");
                if key == SENTINEL_KEY {
                    return sum;
                }
                let Payload::User(user) = payload else {
                    panic!("non-negative key must carry a user payload");
                };
                sum += user.param[0];
            }
        }));
    }

    for i in 0..WORK {
        port.queue(1 + i as i64, UserPayload::new([10 + i, 0, 0]))
            .unwrap();
    }
    // One sentinel per waiter shuts the pool down cleanly.
    for _ in 0..WAITERS {
        port.queue(SENTINEL_KEY, UserPayload::default()).unwrap();
    }

    let total: u64 = waiters.into_iter().map(|w| w.join().unwrap()).sum();
    assert_eq!(total, (10..10 + WORK).sum::<u64>());
    port.close();
}

#[test]
fn overflow_is_isolated_from_the_signaller() {
    let port = IoPort::create(0).unwrap();
    let event = Event::create();
    port.bind(-1, event.as_ref(), Signals::SIGNALED).unwrap();

    // No consumer: the ring fills, then transitions drop. The signaller
    // never blocks, so this loop must terminate regardless.
    for _ in 0..200 {
        event.signal();
        event.reset();
    }
    assert_eq!(port.pending(), port.capacity());

    let mut delivered = 0;
    while port.pending() > 0 {
        let (key, payload) = port.wait(IO_PAYLOAD_SIZE).unwrap();
        assert_eq!(key, -1);
        let Payload::Io(io) = payload else {
            panic!("expected io packet");
        };
        // Queued packets predate the overflow; the flag rides a later one.
        assert!(!io.flags.contains(DeliveryFlags::OVERFLOW));
        delivered += 1;
    }
    assert_eq!(delivered, port.capacity());
    assert_eq!(port.counters().overflow_dropped, 200 - port.capacity() as u64);

    // The next successful delivery carries the sticky overflow flag...
    event.signal();
    let (_, payload) = port.wait(IO_PAYLOAD_SIZE).unwrap();
    let Payload::Io(io) = payload else {
        panic!("expected io packet");
    };
    assert!(io.flags.contains(DeliveryFlags::OVERFLOW));

    // ...and carrying it cleared it.
    event.reset();
    event.signal();
    let (_, payload) = port.wait(IO_PAYLOAD_SIZE).unwrap();
    let Payload::Io(io) = payload else {
        panic!("expected io packet");
    };
    assert!(!io.flags.contains(DeliveryFlags::OVERFLOW));
}

#[test]
fn close_wakes_blocked_waiters() {
    let port = IoPort::create(0).unwrap();

    let waiter = {
        let port = Arc::clone(&port);
        thread::spawn(move || port.wait(USER_PAYLOAD_SIZE))
    };

    // Give the waiter time to block.
    thread::sleep(Duration::from_millis(50));
    port.close();

    assert_eq!(waiter.join().unwrap(), Err(PortError::Drained));
}

#[test]
fn wait_on_closed_port_returns_drained_immediately() {
    let port = IoPort::create(0).unwrap();
    port.close();
    assert_eq!(port.wait(USER_PAYLOAD_SIZE), Err(PortError::Drained));
    assert_eq!(
        port.queue(1, UserPayload::default()),
        Err(PortError::BadState)
    );
}

#[test]
fn unbind_leaves_queued_packets_deliverable() {
    let port = IoPort::create(0).unwrap();
    let event = Event::create();
    port.bind(-3, event.as_ref(), Signals::SIGNALED).unwrap();

    event.signal();
    assert_eq!(port.pending(), 1);

    // Removal is ordered after the packet already queued.
    port.bind(-3, event.as_ref(), Signals::empty()).unwrap();
    assert_eq!(port.binding_count(), 0);

    let (key, payload) = port.wait(IO_PAYLOAD_SIZE).unwrap();
    assert_eq!(key, -3);
    assert!(matches!(payload, Payload::Io(_)));
}

#[test]
fn wrong_size_wait_leaves_packet_for_the_next_waiter() {
    let port = IoPort::create(0).unwrap();
    let event = Event::create();
    port.bind(-1, event.as_ref(), Signals::SIGNALED).unwrap();
    event.signal();

    // Sizes that match no packet kind fail up front; the packet stays.
    assert_eq!(port.wait(16), Err(PortError::InvalidArgs));
    assert_eq!(port.pending(), 1);

    let (key, _) = port.wait(IO_PAYLOAD_SIZE).unwrap();
    assert_eq!(key, -1);
}
