use crate::binding::Binding;
use crate::config::RingConfig;
use crate::counters::{CounterSnapshot, PortCounters};
use crate::error::PortError;
use crate::packet::{self, Key, Packet, Payload, UserPayload};
use crate::ring::PacketRing;
use crate::signal::{SignalObserver, Signals, Waitable};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tracing::{debug, trace};

/// The IO port: a bounded packet queue that doubles as a signal dispatcher.
///
/// Producers submit user packets with non-negative keys through [`queue`];
/// waitable objects are bound under negative keys with [`bind`], and every
/// 0->1 transition on their masked signals becomes an io packet in the same
/// queue. Consumers block in [`wait`] and route on the key's sign.
///
/// # Consumer pools
///
/// A port is built for a pool of waiters sharing one ring; each packet is
/// delivered to exactly one of them, whichever wakes first. The port itself
/// implements no shutdown fan-out: to terminate a pool cleanly the owner
/// queues one sentinel per waiter (conventionally `key ==`
/// [`SENTINEL_KEY`], or any agreed key range) and each waiter exits on
/// receipt. The only other way to release waiters is [`close`].
///
/// [`queue`]: IoPort::queue
/// [`bind`]: IoPort::bind
/// [`wait`]: IoPort::wait
/// [`close`]: IoPort::close
/// [`SENTINEL_KEY`]: crate::SENTINEL_KEY
pub struct IoPort {
    ring: PacketRing,
    /// Bindings keyed by `(target koid, binding key)`. Only bind, unbind
    /// and teardown touch this map; transition observers go straight to
    /// the ring.
    bindings: RwLock<HashMap<(u64, Key), Arc<Binding>>>,
    counters: PortCounters,
}

impl IoPort {
    /// Creates a port with the reference ring capacity.
    ///
    /// `options` is reserved and must be zero; unknown bits fail with
    /// [`PortError::InvalidArgs`].
    pub fn create(options: u32) -> Result<Arc<Self>, PortError> {
        Self::create_with_config(options, RingConfig::default())
    }

    /// Creates a port with an explicit ring size.
    pub fn create_with_config(options: u32, config: RingConfig) -> Result<Arc<Self>, PortError> {
        if options != 0 {
            return Err(PortError::InvalidArgs);
        }
        let port = Arc::new(Self {
            ring: PacketRing::new(config),
            bindings: RwLock::new(HashMap::new()),
            counters: PortCounters::new(),
        });
        trace!(capacity = config.capacity(), "port created");
        Ok(port)
    }

    // ---------------------------------------------------------------------
    // QUEUE / WAIT
    // ---------------------------------------------------------------------

    /// Enqueues a user packet. Never blocks.
    ///
    /// Negative keys are reserved for bindings and fail with
    /// [`PortError::InvalidArgs`]; a full ring fails with
    /// [`PortError::NotEnoughBuffer`] and leaves the ring unchanged.
    pub fn queue(&self, key: Key, payload: UserPayload) -> Result<(), PortError> {
        if key < 0 {
            return Err(PortError::InvalidArgs);
        }
        self.ring.try_enqueue(Packet::user(key, payload))?;
        self.counters.add_queued(1);
        Ok(())
    }

    /// Dequeues one packet, blocking until one is available or the port
    /// closes ([`PortError::Drained`]).
    ///
    /// `expected_size` must equal the stored packet's payload size. An
    /// unknown size fails before blocking; a size that does not match the
    /// packet at the head fails with [`PortError::InvalidArgs`] and leaves
    /// the packet queued.
    pub fn wait(&self, expected_size: usize) -> Result<(Key, Payload), PortError> {
        if !packet::is_valid_payload_size(expected_size) {
            return Err(PortError::InvalidArgs);
        }
        let packet = self.ring.dequeue_blocking(expected_size)?;
        self.counters.add_delivered(1);
        Ok((packet.key, packet.payload))
    }

    // ---------------------------------------------------------------------
    // BINDINGS
    // ---------------------------------------------------------------------

    /// Creates, updates, or removes a binding on `target`.
    ///
    /// `key` must be negative. A non-empty `mask` creates the binding (or
    /// atomically replaces the mask of an existing `(target, key)`
    /// binding); an empty `mask` removes it, with no error if absent.
    ///
    /// A successful bind is ordered before any packet the binding
    /// produces. Removal is ordered after packets already queued: waiters
    /// may still observe late packets from a removed binding.
    pub fn bind(
        self: &Arc<Self>,
        key: Key,
        target: &dyn Waitable,
        mask: Signals,
    ) -> Result<(), PortError> {
        if key >= 0 {
            return Err(PortError::InvalidArgs);
        }
        let source = target.signal_source();
        let slot = (source.koid(), key);

        // The bindings lock also serializes against `close`, which drains
        // the map and seals the ring while holding it: a bind either lands
        // before teardown or observes the closed ring.
        let mut bindings = self.bindings.write();
        if !self.ring.is_open() {
            return Err(PortError::BadState);
        }

        if mask.is_empty() {
            let removed = bindings.remove(&slot);
            drop(bindings);
            if let Some(binding) = removed {
                binding.unregister();
                trace!(key, koid = slot.0, "unbound");
            }
            return Ok(());
        }

        if let Some(existing) = bindings.get(&slot) {
            existing.set_mask(mask);
            trace!(key, koid = slot.0, mask = mask.bits(), "rebound");
            return Ok(());
        }

        let binding = Binding::new(key, mask, Arc::downgrade(self), source);
        let observer_arc: Arc<dyn SignalObserver> = binding.clone();
        let observer: Weak<dyn SignalObserver> = Arc::downgrade(&observer_arc);
        binding.set_token(source.observe(observer));
        bindings.insert(slot, binding);
        trace!(key, koid = slot.0, mask = mask.bits(), "bound");
        Ok(())
    }

    /// Number of live bindings on this port.
    pub fn binding_count(&self) -> usize {
        self.bindings.read().len()
    }

    // ---------------------------------------------------------------------
    // LIFECYCLE / INTROSPECTION
    // ---------------------------------------------------------------------

    /// Closes the port: all bindings are torn down, undelivered packets
    /// are discarded, and pending waiters wake with
    /// [`PortError::Drained`]. Idempotent.
    pub fn close(&self) {
        let torn_down: Vec<Arc<Binding>> = {
            let mut bindings = self.bindings.write();
            let torn_down = bindings.drain().map(|(_, binding)| binding).collect();
            // Sealed under the bindings lock so no bind can slip in
            // between teardown and close.
            self.ring.close();
            torn_down
        };
        for binding in &torn_down {
            binding.unregister();
        }
        debug!(bindings = torn_down.len(), "port closed");
    }

    /// Current ring occupancy.
    pub fn pending(&self) -> usize {
        self.ring.len()
    }

    /// Ring capacity of this port.
    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }

    /// Snapshot of the port's delivery counters.
    pub fn counters(&self) -> CounterSnapshot {
        self.counters.snapshot()
    }

    // ---------------------------------------------------------------------
    // BINDING-SIDE HOOKS
    // ---------------------------------------------------------------------

    pub(crate) fn enqueue_io(&self, packet: Packet) -> Result<(), PortError> {
        self.ring.try_enqueue(packet)?;
        self.counters.add_queued(1);
        Ok(())
    }

    pub(crate) fn note_overflow_drop(&self, key: Key) {
        self.counters.add_overflow_dropped(1);
        trace!(key, "io packet dropped on full ring");
    }

    /// Removes a binding entry without touching the target; used when the
    /// target itself is going away.
    pub(crate) fn remove_binding_entry(&self, koid: u64, key: Key) {
        self.bindings.write().remove(&(koid, key));
    }
}
