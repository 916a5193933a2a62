//! Signal sources and the transition-observer contract.
//!
//! A waitable kernel object embeds a [`SignalSource`]: a word of asserted
//! signal bits plus a reader-biased list of observers. Asserting bits
//! computes the 0->1 edge set and synchronously invokes every live observer
//! in the signaller's execution context. Observers must not block; the port
//! side enforces that by limiting itself to one non-blocking ring enqueue
//! per transition.

use bitflags::bitflags;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

bitflags! {
    /// Logical conditions a waitable kernel object can assert.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Signals: u64 {
        const READABLE    = 1 << 0;
        const WRITABLE    = 1 << 1;
        const PEER_CLOSED = 1 << 2;
        const SIGNALED    = 1 << 3;
    }
}

/// Receiver half of the signal-transition contract.
pub trait SignalObserver: Send + Sync {
    /// Invoked for every 0->1 edge on the source, with the edge set and the
    /// full signal set observed at transition time.
    ///
    /// Runs in the signaller's context and must complete in bounded time
    /// without blocking on ring consumers.
    fn on_transition(&self, edges: Signals, observed: Signals);

    /// Invoked once when the observed source is dropped.
    fn on_source_closed(&self) {}
}

/// Identifies one observer registration on a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObserverToken(pub(crate) u64);

/// A kernel object whose signal transitions can be observed.
pub trait Waitable: Send + Sync {
    /// The object's embedded signal source.
    fn signal_source(&self) -> &Arc<SignalSource>;
}

static NEXT_KOID: AtomicU64 = AtomicU64::new(1);

struct ObserverEntry {
    token: ObserverToken,
    observer: Weak<dyn SignalObserver>,
}

/// The observable half of a waitable object.
///
/// Observers are held weakly: a registration never extends the observer's
/// lifetime, and a dropped observer is skipped on delivery and reaped on
/// the next list mutation.
pub struct SignalSource {
    koid: u64,
    asserted: AtomicU64,
    next_token: AtomicU64,
    observers: RwLock<Vec<ObserverEntry>>,
}

impl SignalSource {
    /// Creates a source with no asserted signals and a fresh koid.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            koid: NEXT_KOID.fetch_add(1, Ordering::Relaxed),
            asserted: AtomicU64::new(0),
            next_token: AtomicU64::new(1),
            observers: RwLock::new(Vec::new()),
        })
    }

    /// Stable identity of the owning object.
    #[inline]
    pub fn koid(&self) -> u64 {
        self.koid
    }

    /// The currently asserted signal set.
    #[inline]
    pub fn signals(&self) -> Signals {
        Signals::from_bits_retain(self.asserted.load(Ordering::Acquire))
    }

    /// Raises `bits`. Every 0->1 edge is delivered synchronously to all
    /// live observers, in registration order, before this returns.
    ///
    /// Raising a bit that is already set generates no transition.
    pub fn assert_signals(&self, bits: Signals) {
        let prev = self.asserted.fetch_or(bits.bits(), Ordering::AcqRel);
        let edges = bits & !Signals::from_bits_retain(prev);
        if edges.is_empty() {
            return;
        }
        let observed = self.signals();
        let observers = self.observers.read();
        for entry in observers.iter() {
            if let Some(observer) = entry.observer.upgrade() {
                observer.on_transition(edges, observed);
            }
        }
    }

    /// Clears `bits`. Clearing never generates a transition; it re-arms the
    /// next assert as an edge.
    pub fn deassert_signals(&self, bits: Signals) {
        self.asserted.fetch_and(!bits.bits(), Ordering::AcqRel);
    }

    /// Registers an observer, returning a token for [`unobserve`].
    ///
    /// Dead registrations are reaped here rather than on the delivery path.
    ///
    /// [`unobserve`]: SignalSource::unobserve
    pub fn observe(&self, observer: Weak<dyn SignalObserver>) -> ObserverToken {
        let token = ObserverToken(self.next_token.fetch_add(1, Ordering::Relaxed));
        let mut observers = self.observers.write();
        observers.retain(|e| e.observer.strong_count() > 0);
        observers.push(ObserverEntry { token, observer });
        token
    }

    /// Removes a registration. Unknown tokens are ignored.
    pub fn unobserve(&self, token: ObserverToken) {
        self.observers.write().retain(|e| e.token != token);
    }

    #[cfg(test)]
    pub(crate) fn observer_count(&self) -> usize {
        self.observers.read().len()
    }
}

impl Drop for SignalSource {
    fn drop(&mut self) {
        // Closing the source cancels every registration; surviving
        // observers get one last callback to clean up their side.
        let entries = std::mem::take(self.observers.get_mut());
        for entry in entries {
            if let Some(observer) = entry.observer.upgrade() {
                observer.on_source_closed();
            }
        }
    }
}
