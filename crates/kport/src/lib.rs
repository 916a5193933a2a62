//! Kernel-style IO port: a bounded MPMC packet queue that doubles as a
//! signal dispatcher.
//!
//! A port carries two kinds of traffic through one ordered ring:
//!
//! - **User packets**, submitted with [`IoPort::queue`] under a
//!   non-negative key.
//! - **IO packets**, generated when a waitable object *bound* to the port
//!   ([`IoPort::bind`], negative key) takes a 0->1 signal transition.
//!
//! Consumers block in [`IoPort::wait`] and route on the key's sign:
//! negative means io notification, positive means user packet, and zero is
//! the consumer-pool sentinel ([`SENTINEL_KEY`]) by convention.
//!
//! # Key properties
//!
//! - One global FIFO per port across all producers and bindings
//! - Producers and signallers never block; a full ring is reported
//!   (`NotEnoughBuffer`) or recorded on the binding (overflow sticky flag)
//! - `wait` is the only suspension point in the subsystem
//! - Bindings hold weak references both ways; closing either end cancels
//!
//! # Example
//!
//! ```
//! use kport::{Event, IoPort, Payload, Signals, UserPayload};
//! use kport::{IO_PAYLOAD_SIZE, USER_PAYLOAD_SIZE};
//!
//! let port = IoPort::create(0).unwrap();
//!
//! // User traffic.
//! port.queue(7, UserPayload::new([1, 2, 3])).unwrap();
//! let (key, payload) = port.wait(USER_PAYLOAD_SIZE).unwrap();
//! assert_eq!(key, 7);
//! assert!(matches!(payload, Payload::User(_)));
//!
//! // Signal traffic through a binding.
//! let event = Event::create();
//! port.bind(-1, event.as_ref(), Signals::SIGNALED).unwrap();
//! event.signal();
//! let (key, payload) = port.wait(IO_PAYLOAD_SIZE).unwrap();
//! assert_eq!(key, -1);
//! assert!(matches!(payload, Payload::Io(_)));
//! ```

mod binding;
mod config;
mod counters;
mod error;
mod event;
mod invariants;
mod packet;
mod port;
mod ring;
mod signal;

pub use config::{RingConfig, DEFAULT_RING_BITS, PORT_CAPACITY};
pub use counters::CounterSnapshot;
pub use error::PortError;
pub use event::Event;
pub use packet::{
    is_valid_payload_size, DeliveryFlags, IoPayload, Key, Packet, Payload, UserPayload,
    IO_PAYLOAD_SIZE, PAYLOAD_WORDS, SENTINEL_KEY, USER_PAYLOAD_SIZE,
};
pub use port::IoPort;
pub use ring::PacketRing;
pub use signal::{ObserverToken, SignalObserver, SignalSource, Signals, Waitable};
