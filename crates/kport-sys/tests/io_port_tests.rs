//! End-to-end port tests driven through the handle table, following the
//! original user-space suite: queue-limit basics, a consumer thread pool,
//! bind validation, and cross-binding delivery order.

use kport_sys::{
    Handle, HandleTable, IoPayload, Key, PortError, Signals, UserPayload, IO_PAYLOAD_SIZE,
    SENTINEL_KEY, USER_PAYLOAD_SIZE,
};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const NUM_IO_THREADS: usize = 5;
const NUM_SLOTS: usize = 10;

#[test]
fn basic() {
    let table = HandleTable::new();
    let port = table.port_create(0).unwrap();

    let payload = UserPayload::default().to_bytes();

    // Truncated payload.
    assert_eq!(
        table.port_queue(port, 1, &payload[..8]),
        Err(PortError::InvalidArgs)
    );
    // Negative keys are reserved for bindings.
    assert_eq!(table.port_queue(port, -1, &payload), Err(PortError::InvalidArgs));

    // Wrong-size wait fails without blocking, even on an empty port.
    let mut short = [0u8; 8];
    assert_eq!(table.port_wait(port, &mut short), Err(PortError::InvalidArgs));

    // Fill the ring: keys 128 down to 1.
    let mut slots = 0i64;
    loop {
        match table.port_queue(port, 128 - slots, &payload) {
            Ok(()) => slots += 1,
            Err(PortError::NotEnoughBuffer) => break,
            Err(err) => panic!("queue failed: {err}"),
        }
    }
    assert_eq!(slots, 128);

    // FIFO: the first packet out carries the first key in.
    let mut out = [0u8; USER_PAYLOAD_SIZE];
    let key = table.port_wait(port, &mut out).unwrap();
    assert_eq!(key, 128);

    table.handle_close(port).unwrap();
}

fn pool_consumer(table: &HandleTable, port: Handle) -> Result<[u64; NUM_SLOTS], PortError> {
    let mut work_count = [0u64; NUM_SLOTS];
    loop {
        let mut payload = [0u8; USER_PAYLOAD_SIZE];
        let key = table.port_wait(port, &mut payload)?;
        if key < 0 {
            return Err(PortError::BadState);
        }
        let slot = key as usize;
        if slot >= NUM_SLOTS {
            // Pool convention: keys past the work range are exit sentinels.
            return Ok(work_count);
        }
        work_count[slot] += UserPayload::from_bytes(&payload).param[0];
        thread::yield_now();
    }
}

#[test]
fn thread_pool() {
    let table = Arc::new(HandleTable::new());
    let port = table.port_create(0).unwrap();

    let mut workers = Vec::new();
    for _ in 0..NUM_IO_THREADS {
        let table = Arc::clone(&table);
        workers.push(thread::spawn(move || pool_consumer(&table, port)));
    }

    // Ten work packets, then one exit sentinel per thread.
    for ix in 0..(NUM_SLOTS + NUM_IO_THREADS) {
        let payload = UserPayload::new([10 + ix as u64, 0, 0]).to_bytes();
        table.port_queue(port, ix as Key, &payload).unwrap();
    }

    let mut work_count = [0u64; NUM_SLOTS];
    for worker in workers {
        let counts = worker.join().unwrap().expect("consumer faulted");
        for (total, count) in work_count.iter_mut().zip(counts) {
            *total += count;
        }
    }

    // Every slot was worked exactly once; 10 + 11 + ... + 19.
    assert!(work_count.iter().all(|&count| count > 0));
    assert_eq!(work_count.iter().sum::<u64>(), 145);

    table.handle_close(port).unwrap();
}

#[test]
fn bind_validation() {
    let table = HandleTable::new();
    let port = table.port_create(0).unwrap();
    let event = table.event_create(0).unwrap();
    let other = table.port_create(0).unwrap();

    // Positive keys are reserved for user packets.
    assert_eq!(
        table.port_bind(port, 1, event, Signals::SIGNALED),
        Err(PortError::InvalidArgs)
    );
    // Ports are not waitable.
    assert_eq!(
        table.port_bind(port, -1, other, Signals::SIGNALED),
        Err(PortError::InvalidArgs)
    );

    table.port_bind(port, -1, event, Signals::SIGNALED).unwrap();
    // Empty mask unbinds.
    table.port_bind(port, -1, event, Signals::empty()).unwrap();

    table.handle_close(port).unwrap();
    table.handle_close(other).unwrap();
    table.handle_close(event).unwrap();
}

#[test]
fn bound_events_deliver_in_poke_order() {
    let table = Arc::new(HandleTable::new());
    let port = table.port_create(0).unwrap();

    let events: Vec<Handle> = (0..5).map(|_| table.event_create(0).unwrap()).collect();
    for (ix, &event) in events.iter().enumerate() {
        table
            .port_bind(port, -(ix as Key + 1), event, Signals::SIGNALED)
            .unwrap();
    }

    // The reply thread forwards each io packet's key and signals until the
    // sentinel arrives.
    let (report_tx, report_rx) = mpsc::channel::<(Key, Signals)>();
    let reply = {
        let table = Arc::clone(&table);
        thread::spawn(move || loop {
            let mut payload = [0u8; IO_PAYLOAD_SIZE];
            let key = table.port_wait(port, &mut payload).expect("wait failed");
            assert!(key <= 0, "only io packets and the sentinel expected");
            if key == SENTINEL_KEY {
                return;
            }
            let io = IoPayload::from_bytes(&payload);
            report_tx.send((key, io.signals)).expect("report channel");
        })
    };

    // Poke the events in a scrambled order, resetting after each poke so
    // every poke is a fresh edge.
    let order = [2usize, 1, 0, 4, 3, 1, 2];
    for &ix in &order {
        table.event_signal(events[ix]).unwrap();
        table.event_reset(events[ix]).unwrap();
    }

    // Final user packet makes the reply thread exit.
    let sentinel = UserPayload::new([255, 255, 255]).to_bytes();
    table.port_queue(port, SENTINEL_KEY, &sentinel).unwrap();

    // Reports must match the poke order exactly.
    for &ix in &order {
        let (key, signals) = report_rx
            .recv_timeout(Duration::from_secs(10))
            .expect("missing report");
        assert_eq!(key, -(ix as Key + 1));
        assert!(signals.contains(Signals::SIGNALED));
    }

    reply.join().unwrap();

    for &event in &events {
        table.handle_close(event).unwrap();
    }
    table.handle_close(port).unwrap();
}

#[test]
fn close_wakes_pool_waiters() {
    let table = Arc::new(HandleTable::new());
    let port = table.port_create(0).unwrap();

    let waiter = {
        let table = Arc::clone(&table);
        thread::spawn(move || {
            let mut payload = [0u8; USER_PAYLOAD_SIZE];
            table.port_wait(port, &mut payload)
        })
    };

    thread::sleep(Duration::from_millis(50));
    table.handle_close(port).unwrap();

    assert_eq!(waiter.join().unwrap(), Err(PortError::Drained));
}
