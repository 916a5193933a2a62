use thiserror::Error;

/// Status codes surfaced by port operations.
///
/// Every failure is reported to the caller; the port core never panics on
/// external input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PortError {
    /// Wrong payload size, wrong key sign, non-waitable target, or unknown
    /// option bits. No state change.
    #[error("invalid arguments")]
    InvalidArgs,

    /// The packet ring is full. Producers are never blocked.
    #[error("not enough buffer space")]
    NotEnoughBuffer,

    /// The port is closed (or draining and empty); no more packets will be
    /// delivered.
    #[error("port drained")]
    Drained,

    /// The handle is invalid or refers to the wrong object type.
    #[error("bad handle")]
    BadHandle,

    /// The operation is not valid in the object's current state.
    #[error("bad state")]
    BadState,

    /// Resource allocation failed.
    #[error("no memory")]
    NoMemory,
}

impl PortError {
    /// Returns `true` if retrying the same operation later can succeed
    /// (ring full is transient; consumers drain it).
    #[inline]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::NotEnoughBuffer)
    }

    /// Returns `true` if the error indicates the object is permanently
    /// unusable for this operation.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Drained | Self::BadState | Self::BadHandle)
    }
}
