/// Ring capacity expressed as a power of two (default: 7 = 128 slots).
pub const DEFAULT_RING_BITS: u8 = 7;

/// Reference ring capacity of a port created with the default config.
pub const PORT_CAPACITY: usize = 1 << DEFAULT_RING_BITS;

/// Sizing for a port's packet ring.
#[derive(Debug, Clone, Copy)]
pub struct RingConfig {
    /// Ring capacity as a power of 2.
    pub ring_bits: u8,
}

impl RingConfig {
    /// Creates a configuration with a custom ring size.
    ///
    /// # Panics
    ///
    /// Panics if `ring_bits` is 0 or greater than 16 (64K slots max) to
    /// keep per-port memory bounded.
    pub const fn new(ring_bits: u8) -> Self {
        assert!(
            ring_bits > 0 && ring_bits <= 16,
            "ring_bits must be between 1 and 16 (max 64K slots)"
        );
        Self { ring_bits }
    }

    /// Returns the capacity of the packet ring.
    #[inline]
    pub const fn capacity(&self) -> usize {
        1 << self.ring_bits
    }

    /// Returns the mask for index wrapping.
    #[inline]
    pub const fn mask(&self) -> usize {
        self.capacity() - 1
    }
}

impl Default for RingConfig {
    fn default() -> Self {
        Self {
            ring_bits: DEFAULT_RING_BITS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_capacity_is_reference_value() {
        let config = RingConfig::default();
        assert_eq!(config.capacity(), 128);
        assert_eq!(config.capacity(), PORT_CAPACITY);
        assert_eq!(config.mask(), 127);
    }

    #[test]
    fn custom_capacity() {
        let config = RingConfig::new(3);
        assert_eq!(config.capacity(), 8);
        assert_eq!(config.mask(), 7);
    }
}
