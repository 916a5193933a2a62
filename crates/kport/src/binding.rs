use crate::error::PortError;
use crate::packet::{DeliveryFlags, IoPayload, Key, Packet};
use crate::port::IoPort;
use crate::signal::{ObserverToken, SignalObserver, SignalSource, Signals};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::trace;

/// Subscription edge between a port and a waitable target.
///
/// The port's binding table holds the only strong reference; the target's
/// observer list and the back-reference to the port are both weak, so
/// closing either end cancels the edge without keeping the other alive.
///
/// Uniquely identified within its port by `(target koid, key)`.
pub(crate) struct Binding {
    /// Caller-chosen routing key, always negative.
    key: Key,
    /// Signals of interest. Rebinds replace this atomically; a binding
    /// with an empty mask is removed by the port, never kept.
    mask: AtomicU64,
    port: Weak<IoPort>,
    target: Weak<SignalSource>,
    target_koid: u64,
    /// Registration on the target, set once right after `observe`.
    token: AtomicU64,
    /// Sticky record of a full-ring drop, carried in the flags word of the
    /// next packet this binding manages to enqueue.
    overflow: AtomicBool,
}

impl Binding {
    pub(crate) fn new(
        key: Key,
        mask: Signals,
        port: Weak<IoPort>,
        target: &Arc<SignalSource>,
    ) -> Arc<Self> {
        Arc::new(Self {
            key,
            mask: AtomicU64::new(mask.bits()),
            port,
            target: Arc::downgrade(target),
            target_koid: target.koid(),
            token: AtomicU64::new(0),
            overflow: AtomicBool::new(false),
        })
    }

    #[inline]
    pub(crate) fn mask(&self) -> Signals {
        Signals::from_bits_retain(self.mask.load(Ordering::Acquire))
    }

    /// Atomic mask replacement for rebinds; the observer registration on
    /// the target is untouched.
    pub(crate) fn set_mask(&self, mask: Signals) {
        self.mask.store(mask.bits(), Ordering::Release);
    }

    /// Records where this binding is registered on its target.
    pub(crate) fn set_token(&self, token: ObserverToken) {
        self.token.store(token.0, Ordering::Release);
    }

    /// Drops the observer registration, if the target is still alive.
    pub(crate) fn unregister(&self) {
        if let Some(source) = self.target.upgrade() {
            source.unobserve(ObserverToken(self.token.load(Ordering::Acquire)));
        }
    }
}

impl SignalObserver for Binding {
    // Runs in the signaller's context. Permitted work: one stack packet,
    // one non-blocking enqueue, and on failure the sticky overflow bit.
    fn on_transition(&self, edges: Signals, observed: Signals) {
        let mask = self.mask();
        if (edges & mask).is_empty() {
            return;
        }
        let Some(port) = self.port.upgrade() else {
            return;
        };

        let mut flags = DeliveryFlags::empty();
        if self.overflow.swap(false, Ordering::AcqRel) {
            flags |= DeliveryFlags::OVERFLOW;
        }

        let payload = IoPayload::new(observed & mask, flags);
        match port.enqueue_io(Packet::io(self.key, payload)) {
            Ok(()) => {}
            Err(PortError::NotEnoughBuffer) => {
                // Dropped on a full ring: remember the loss (including any
                // flag we just consumed) and surface it on the next
                // successful delivery. The signaller is never blocked.
                self.overflow.store(true, Ordering::Release);
                port.note_overflow_drop(self.key);
            }
            Err(_) => {
                // Port is closing; late transitions vanish with it.
            }
        }
    }

    fn on_source_closed(&self) {
        trace!(key = self.key, koid = self.target_koid, "binding target closed");
        if let Some(port) = self.port.upgrade() {
            port.remove_binding_entry(self.target_koid, self.key);
        }
    }
}
