use kport::{
    Event, IoPort, Key, Payload, PortError, Signals, UserPayload, Waitable, USER_PAYLOAD_SIZE,
};
use parking_lot::Mutex;
use slab::Slab;
use std::sync::Arc;
use tracing::trace;

/// Default cap on live handles per table.
pub const DEFAULT_MAX_HANDLES: usize = 4096;

/// Opaque index into a [`HandleTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(u32);

impl Handle {
    /// Raw table index, for diagnostics only.
    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }
}

/// Reference to a kernel object held by a handle table slot.
#[derive(Clone)]
pub enum ObjectRef {
    Port(Arc<IoPort>),
    Event(Arc<Event>),
}

impl ObjectRef {
    fn as_port(&self) -> Result<&Arc<IoPort>, PortError> {
        match self {
            ObjectRef::Port(port) => Ok(port),
            ObjectRef::Event(_) => Err(PortError::BadHandle),
        }
    }

    fn as_event(&self) -> Result<&Arc<Event>, PortError> {
        match self {
            ObjectRef::Event(event) => Ok(event),
            ObjectRef::Port(_) => Err(PortError::BadHandle),
        }
    }

    /// Ports are not waitable in this core; only events qualify as binding
    /// targets.
    fn as_waitable(&self) -> Option<&dyn Waitable> {
        match self {
            ObjectRef::Event(event) => Some(event.as_ref()),
            ObjectRef::Port(_) => None,
        }
    }
}

/// Per-process handle table.
///
/// One handle per object in this fragment: closing a port handle performs
/// the port teardown, closing an event handle drops the table's reference
/// (bindings hold only weak references, so the source drop cancels them).
pub struct HandleTable {
    slots: Mutex<Slab<ObjectRef>>,
    max_handles: usize,
}

impl HandleTable {
    pub fn new() -> Self {
        Self::with_limit(DEFAULT_MAX_HANDLES)
    }

    /// A table that refuses to grow past `max_handles` live entries.
    pub fn with_limit(max_handles: usize) -> Self {
        Self {
            slots: Mutex::new(Slab::new()),
            max_handles,
        }
    }

    fn insert(&self, object: ObjectRef) -> Result<Handle, PortError> {
        let mut slots = self.slots.lock();
        if slots.len() >= self.max_handles {
            return Err(PortError::NoMemory);
        }
        let handle = Handle(slots.insert(object) as u32);
        trace!(handle = handle.raw(), "handle installed");
        Ok(handle)
    }

    /// Clones the slot's object reference so no table lock is held across
    /// blocking operations.
    fn get(&self, handle: Handle) -> Result<ObjectRef, PortError> {
        self.slots
            .lock()
            .get(handle.0 as usize)
            .cloned()
            .ok_or(PortError::BadHandle)
    }

    // ---------------------------------------------------------------------
    // OBJECT CREATION
    // ---------------------------------------------------------------------

    /// `port_create`: options are reserved and must be zero.
    pub fn port_create(&self, options: u32) -> Result<Handle, PortError> {
        let port = IoPort::create(options)?;
        self.insert(ObjectRef::Port(port))
    }

    /// `event_create`: options are reserved and must be zero.
    pub fn event_create(&self, options: u32) -> Result<Handle, PortError> {
        if options != 0 {
            return Err(PortError::InvalidArgs);
        }
        self.insert(ObjectRef::Event(Event::create()))
    }

    // ---------------------------------------------------------------------
    // PORT OPERATIONS
    // ---------------------------------------------------------------------

    /// `port_queue`: `payload` must be exactly the user payload size.
    pub fn port_queue(&self, handle: Handle, key: Key, payload: &[u8]) -> Result<(), PortError> {
        let object = self.get(handle)?;
        let port = object.as_port()?;
        let bytes: &[u8; USER_PAYLOAD_SIZE] =
            payload.try_into().map_err(|_| PortError::InvalidArgs)?;
        port.queue(key, UserPayload::from_bytes(bytes))
    }

    /// `port_wait`: `payload.len()` is the expected payload size; on
    /// success the packet's payload bytes are written and its key returned.
    ///
    /// Blocks until a packet arrives or the port closes (`Drained`).
    pub fn port_wait(&self, handle: Handle, payload: &mut [u8]) -> Result<Key, PortError> {
        let object = self.get(handle)?;
        let port = object.as_port()?;
        let (key, delivered) = port.wait(payload.len())?;
        match delivered {
            Payload::User(user) => payload.copy_from_slice(&user.to_bytes()),
            Payload::Io(io) => payload.copy_from_slice(&io.to_bytes()),
        }
        Ok(key)
    }

    /// `port_bind`: `target` must be a waitable object; binding a port to
    /// a port is rejected.
    pub fn port_bind(
        &self,
        handle: Handle,
        key: Key,
        target: Handle,
        mask: Signals,
    ) -> Result<(), PortError> {
        let object = self.get(handle)?;
        let port = object.as_port()?;
        let target_ref = self.get(target)?;
        let waitable = target_ref.as_waitable().ok_or(PortError::InvalidArgs)?;
        port.bind(key, waitable, mask)
    }

    // ---------------------------------------------------------------------
    // EVENT OPERATIONS
    // ---------------------------------------------------------------------

    pub fn event_signal(&self, handle: Handle) -> Result<(), PortError> {
        self.get(handle)?.as_event()?.signal();
        Ok(())
    }

    pub fn event_reset(&self, handle: Handle) -> Result<(), PortError> {
        self.get(handle)?.as_event()?.reset();
        Ok(())
    }

    // ---------------------------------------------------------------------
    // TEARDOWN
    // ---------------------------------------------------------------------

    /// `handle_close`: drops the table's reference. For a port this is the
    /// last reference the kernel hands out, so the port is torn down and
    /// its waiters drain out.
    pub fn handle_close(&self, handle: Handle) -> Result<(), PortError> {
        let object = {
            self.slots
                .lock()
                .try_remove(handle.0 as usize)
                .ok_or(PortError::BadHandle)?
        };
        if let ObjectRef::Port(port) = &object {
            port.close();
        }
        trace!(handle = handle.raw(), "handle closed");
        Ok(())
    }

    /// Number of live handles.
    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for HandleTable {
    fn default() -> Self {
        Self::new()
    }
}
