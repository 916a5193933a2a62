//! Syscall-shaped surface over [`kport`].
//!
//! Kernel code talks to ports through typed references; user code talks
//! through handles and byte buffers. This crate provides that outer edge:
//! a slab-backed [`HandleTable`] mapping handles to object references, and
//! operations mirroring the port syscalls (`port_create`, `port_queue`,
//! `port_wait`, `port_bind`, `handle_close`) with payloads marshalled as
//! native-endian byte arrays.
//!
//! # Example
//!
//! ```
//! use kport::{UserPayload, USER_PAYLOAD_SIZE};
//! use kport_sys::HandleTable;
//!
//! let table = HandleTable::new();
//! let port = table.port_create(0).unwrap();
//!
//! let payload = UserPayload::new([1, 2, 3]).to_bytes();
//! table.port_queue(port, 42, &payload).unwrap();
//!
//! let mut out = [0u8; USER_PAYLOAD_SIZE];
//! let key = table.port_wait(port, &mut out).unwrap();
//! assert_eq!(key, 42);
//! assert_eq!(out, payload);
//!
//! table.handle_close(port).unwrap();
//! ```

mod handle;

pub use handle::{Handle, HandleTable, ObjectRef, DEFAULT_MAX_HANDLES};

// Re-export the core types the surface hands back and forth.
pub use kport::{
    DeliveryFlags, IoPayload, Key, PortError, Signals, UserPayload, IO_PAYLOAD_SIZE, SENTINEL_KEY,
    USER_PAYLOAD_SIZE,
};
