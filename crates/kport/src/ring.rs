use crate::config::RingConfig;
use crate::error::PortError;
use crate::invariants::{
    debug_assert_bounded_count, debug_assert_head_not_past_tail, debug_assert_initialized_read,
    debug_assert_monotonic,
};
use crate::packet::Packet;
use parking_lot::{Condvar, Mutex};
use std::mem::MaybeUninit;

// =============================================================================
// SYNCHRONIZATION STRATEGY
// =============================================================================
//
// The ring is multi-producer multi-consumer, so unlike a wait-free SPSC
// design every operation runs under one short mutex critical section. The
// lock is the linearisation point: a successful enqueue is ordered before
// its own dequeue, and the global dequeue order equals the global enqueue
// order across all producers.
//
// Unbounded u64 sequence numbers are used for `head` and `tail`; the buffer
// index is `sequence & mask`. Slots in `[head, tail)` are initialized.
//
// Blocking: `dequeue_blocking` is the only suspension point in the whole
// subsystem. Producers and signal observers use `try_enqueue`, which never
// waits on a consumer. One condvar signal per enqueue hands each packet to
// exactly one waiter; phase changes broadcast.
//
// =============================================================================

/// Delivery phase of a ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Accepting packets and waiters.
    Open,
    /// Producers rejected; queued packets still delivered.
    Draining,
    /// Producers rejected; waiters observe `Drained` immediately.
    Closed,
}

struct RingState {
    /// Storage indexed by `sequence & mask`.
    buffer: Box<[MaybeUninit<Packet>]>,
    /// Next sequence to read.
    head: u64,
    /// Next sequence to write.
    tail: u64,
    phase: Phase,
}

impl RingState {
    #[inline]
    fn len(&self) -> usize {
        self.tail.wrapping_sub(self.head) as usize
    }
}

/// Bounded multi-producer multi-consumer packet FIFO.
///
/// Insertion order is delivery order: one global FIFO per ring, across all
/// producers and binding observers. Capacity is fixed at construction.
pub struct PacketRing {
    state: Mutex<RingState>,
    readable: Condvar,
    config: RingConfig,
}

impl PacketRing {
    /// Creates an open ring with the configured capacity.
    pub fn new(config: RingConfig) -> Self {
        let capacity = config.capacity();
        let mut buffer = Vec::with_capacity(capacity);
        buffer.resize_with(capacity, MaybeUninit::uninit);

        Self {
            state: Mutex::new(RingState {
                buffer: buffer.into_boxed_slice(),
                head: 0,
                tail: 0,
                phase: Phase::Open,
            }),
            readable: Condvar::new(),
            config,
        }
    }

    // ---------------------------------------------------------------------
    // STATUS
    // ---------------------------------------------------------------------

    /// Returns the ring capacity.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.config.capacity()
    }

    #[inline]
    fn mask(&self) -> usize {
        self.config.mask()
    }

    /// Returns the current number of queued packets.
    pub fn len(&self) -> usize {
        self.state.lock().len()
    }

    /// Returns `true` if no packets are queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` if the ring still accepts packets.
    pub fn is_open(&self) -> bool {
        self.state.lock().phase == Phase::Open
    }

    // ---------------------------------------------------------------------
    // PRODUCER SIDE
    // ---------------------------------------------------------------------

    /// Non-blocking enqueue.
    ///
    /// Returns [`PortError::NotEnoughBuffer`] when full and
    /// [`PortError::BadState`] once the ring has left the open phase. A
    /// full ring is reported, never waited on: signallers must not block
    /// behind consumers.
    pub fn try_enqueue(&self, packet: Packet) -> Result<(), PortError> {
        let mut state = self.state.lock();
        if state.phase != Phase::Open {
            return Err(PortError::BadState);
        }
        if state.len() >= self.capacity() {
            return Err(PortError::NotEnoughBuffer);
        }

        let tail = state.tail;
        let idx = (tail as usize) & self.mask();
        state.buffer[idx] = MaybeUninit::new(packet);

        let new_tail = tail.wrapping_add(1);
        debug_assert_monotonic!("tail", tail, new_tail);
        debug_assert_bounded_count!(new_tail.wrapping_sub(state.head) as usize, self.capacity());
        state.tail = new_tail;
        drop(state);

        // Exactly one waiter takes each packet.
        self.readable.notify_one();
        Ok(())
    }

    // ---------------------------------------------------------------------
    // CONSUMER SIDE
    // ---------------------------------------------------------------------

    /// Blocking dequeue.
    ///
    /// Blocks until a packet is available or the ring stops delivering,
    /// in which case the result is [`PortError::Drained`]. If the packet
    /// at the head stores a payload whose size differs from
    /// `expected_size`, returns [`PortError::InvalidArgs`] and leaves the
    /// packet queued.
    pub fn dequeue_blocking(&self, expected_size: usize) -> Result<Packet, PortError> {
        let mut state = self.state.lock();
        loop {
            if state.head != state.tail {
                let head = state.head;
                debug_assert_initialized_read!(head, state.head, state.tail);
                let idx = (head as usize) & self.mask();

                // SAFETY: slots in [head, tail) were written by
                // `try_enqueue` before tail advanced, and the mutex orders
                // that write before this read. `Packet` is `Copy`, so the
                // slot stays valid if we bail out below.
                let packet = unsafe { state.buffer[idx].assume_init_read() };
                if packet.payload.size() != expected_size {
                    return Err(PortError::InvalidArgs);
                }

                let new_head = head.wrapping_add(1);
                debug_assert_head_not_past_tail!(new_head, state.tail);
                debug_assert_monotonic!("head", head, new_head);
                state.head = new_head;

                // Last packet out of a draining ring seals it.
                if state.phase == Phase::Draining && state.head == state.tail {
                    state.phase = Phase::Closed;
                    drop(state);
                    self.readable.notify_all();
                }
                return Ok(packet);
            }

            match state.phase {
                Phase::Open => {
                    self.readable.wait(&mut state);
                }
                Phase::Draining | Phase::Closed => return Err(PortError::Drained),
            }
        }
    }

    // ---------------------------------------------------------------------
    // LIFECYCLE
    // ---------------------------------------------------------------------

    /// Closes the ring immediately.
    ///
    /// Undelivered packets are discarded, all waiters wake and observe
    /// [`PortError::Drained`], and subsequent enqueues fail with
    /// [`PortError::BadState`]. Idempotent.
    pub fn close(&self) {
        let mut state = self.state.lock();
        // Packets are plain copies; discarding is a head jump.
        state.head = state.tail;
        state.phase = Phase::Closed;
        drop(state);
        self.readable.notify_all();
    }

    /// Stops producers while still delivering queued packets.
    ///
    /// New enqueues fail with [`PortError::BadState`]; consumers keep
    /// receiving until the ring is empty, then observe
    /// [`PortError::Drained`]. Idempotent; a no-op after [`close`].
    ///
    /// [`close`]: PacketRing::close
    pub fn drain_and_close(&self) {
        let mut state = self.state.lock();
        if state.phase == Phase::Open {
            state.phase = if state.len() == 0 {
                Phase::Closed
            } else {
                Phase::Draining
            };
        }
        drop(state);
        self.readable.notify_all();
    }
}
