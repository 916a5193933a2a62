use crate::signal::{SignalSource, Signals, Waitable};
use std::sync::Arc;

/// Minimal waitable object: a single user-controlled `SIGNALED` bit.
///
/// Exists mostly as the canonical binding target; richer waitables embed a
/// [`SignalSource`] the same way.
pub struct Event {
    source: Arc<SignalSource>,
}

impl Event {
    pub fn create() -> Arc<Self> {
        Arc::new(Self {
            source: SignalSource::new(),
        })
    }

    /// Raises `SIGNALED`. Ports bound to this event observe the 0->1 edge.
    pub fn signal(&self) {
        self.source.assert_signals(Signals::SIGNALED);
    }

    /// Clears `SIGNALED`, re-arming the next [`signal`] as an edge.
    ///
    /// [`signal`]: Event::signal
    pub fn reset(&self) {
        self.source.deassert_signals(Signals::SIGNALED);
    }

    /// Stable object identity.
    pub fn koid(&self) -> u64 {
        self.source.koid()
    }
}

impl Waitable for Event {
    fn signal_source(&self) -> &Arc<SignalSource> {
        &self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_and_reset_toggle_the_bit() {
        let event = Event::create();
        assert!(event.signal_source().signals().is_empty());

        event.signal();
        assert!(event.signal_source().signals().contains(Signals::SIGNALED));

        event.reset();
        assert!(event.signal_source().signals().is_empty());
    }
}
