use super::*;

/// Read-only accessors used by debugging output and by attaching sessions.
impl SharedMemoryAllocator {
    /// Get a reference to the underlying shared memory backend
    pub fn shm(&self) -> &dyn SharedMemoryBackend {
        &*self.shm
    }

    /// Get the raw pointer to the GlobalHeader
    ///
    /// The pointer is only valid while the allocator is alive.
    pub fn header_ptr(&self) -> *const GlobalHeader {
        self.header
    }

    /// Name of the /dev/shm region, if the region is named.
    pub fn region_name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Largest payload a slot in this region can carry.
    pub fn slot_payload(&self) -> usize {
        self.header().slot_payload as usize
    }

    /// Check if the allocator has been properly initialized
    ///
    /// Returns true if the magic number in the header matches the expected value.
    pub fn is_initialized(&self) -> bool {
        !self.header.is_null() && self.header().magic == super::MAGIC_NUMBER
    }
}
