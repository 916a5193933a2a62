//! The packet envelope: a signed routing key plus a fixed-size payload.
//!
//! Key sign encodes packet origin: negative keys belong to bindings,
//! non-negative keys to user packets, and key 0 is the consumer-pool
//! sentinel by convention ([`SENTINEL_KEY`]).

use crate::signal::Signals;
use bitflags::bitflags;

/// Caller-chosen routing tag. The sign carries meaning; see module docs.
pub type Key = i64;

/// Key reserved by the consumer-pool protocol for orderly shutdown.
///
/// The port applies no special routing to it: a sentinel is an ordinary
/// user packet whose meaning is agreed between pool owner and waiters.
pub const SENTINEL_KEY: Key = 0;

/// Number of payload words in every packet.
pub const PAYLOAD_WORDS: usize = 3;

/// Byte size of a user payload (three opaque words).
pub const USER_PAYLOAD_SIZE: usize = PAYLOAD_WORDS * 8;

/// Byte size of an io payload (signal word, flags word, reserved word).
pub const IO_PAYLOAD_SIZE: usize = PAYLOAD_WORDS * 8;

/// Returns `true` if `size` matches a payload kind this port can store.
#[inline]
pub fn is_valid_payload_size(size: usize) -> bool {
    size == USER_PAYLOAD_SIZE || size == IO_PAYLOAD_SIZE
}

bitflags! {
    /// Delivery metadata carried in an io packet's flags word.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DeliveryFlags: u64 {
        /// At least one earlier transition on this binding was dropped on a
        /// full ring since the last delivered packet.
        const OVERFLOW = 1 << 0;
    }
}

/// Opaque payload chosen by a producer. The port never interprets it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UserPayload {
    pub param: [u64; PAYLOAD_WORDS],
}

impl UserPayload {
    pub const fn new(param: [u64; PAYLOAD_WORDS]) -> Self {
        Self { param }
    }

    /// Serializes to the wire layout (native-endian words).
    pub fn to_bytes(&self) -> [u8; USER_PAYLOAD_SIZE] {
        words_to_bytes(self.param)
    }

    pub fn from_bytes(bytes: &[u8; USER_PAYLOAD_SIZE]) -> Self {
        Self {
            param: words_from_bytes(bytes),
        }
    }
}

/// Payload of a binding-generated packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IoPayload {
    /// Signals observed at transition time, masked by the binding's mask.
    pub signals: Signals,
    /// Delivery metadata; see [`DeliveryFlags`].
    pub flags: DeliveryFlags,
    /// Padding word, always zero.
    pub reserved: u64,
}

impl IoPayload {
    pub fn new(signals: Signals, flags: DeliveryFlags) -> Self {
        Self {
            signals,
            flags,
            reserved: 0,
        }
    }

    pub fn to_bytes(&self) -> [u8; IO_PAYLOAD_SIZE] {
        words_to_bytes([self.signals.bits(), self.flags.bits(), self.reserved])
    }

    pub fn from_bytes(bytes: &[u8; IO_PAYLOAD_SIZE]) -> Self {
        let words = words_from_bytes(bytes);
        Self {
            signals: Signals::from_bits_retain(words[0]),
            flags: DeliveryFlags::from_bits_retain(words[1]),
            reserved: words[2],
        }
    }
}

/// Tagged payload variant. Consumers branch on the key's sign, but the
/// variant is authoritative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Payload {
    User(UserPayload),
    Io(IoPayload),
}

impl Payload {
    /// Byte size of the stored kind. `wait` callers must match it exactly.
    #[inline]
    pub fn size(&self) -> usize {
        match self {
            Payload::User(_) => USER_PAYLOAD_SIZE,
            Payload::Io(_) => IO_PAYLOAD_SIZE,
        }
    }
}

/// One ring slot: key plus payload, copied by value on enqueue and dequeue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Packet {
    pub key: Key,
    pub payload: Payload,
}

impl Packet {
    pub fn user(key: Key, payload: UserPayload) -> Self {
        Self {
            key,
            payload: Payload::User(payload),
        }
    }

    pub fn io(key: Key, payload: IoPayload) -> Self {
        Self {
            key,
            payload: Payload::Io(payload),
        }
    }
}

fn words_to_bytes(words: [u64; PAYLOAD_WORDS]) -> [u8; PAYLOAD_WORDS * 8] {
    let mut bytes = [0u8; PAYLOAD_WORDS * 8];
    for (chunk, word) in bytes.chunks_exact_mut(8).zip(words) {
        chunk.copy_from_slice(&word.to_ne_bytes());
    }
    bytes
}

fn words_from_bytes(bytes: &[u8; PAYLOAD_WORDS * 8]) -> [u64; PAYLOAD_WORDS] {
    let mut words = [0u64; PAYLOAD_WORDS];
    for (word, chunk) in words.iter_mut().zip(bytes.chunks_exact(8)) {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(chunk);
        *word = u64::from_ne_bytes(buf);
    }
    words
}
