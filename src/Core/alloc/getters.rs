use super::*;

/// Getter methods exposing arena internals for debugging and monitoring.
impl RingArena {
    /// Get a reference to the underlying memory backend
    ///
    /// # Safety
    /// Writes through the backend bypass the ring protocol.
    pub unsafe fn shm(&self) -> &dyn SharedMemoryBackend {
        &*self.shm
    }

    /// Get the raw pointer to the GlobalHeader
    pub fn header_ptr(&self) -> *const GlobalHeader {
        self.header
    }

    /// Check that the header carries the arena magic number.
    pub fn is_initialized(&self) -> bool {
        unsafe { !self.header.is_null() && (*self.header).magic == ARENA_MAGIC }
    }

    /// Total bytes of the backing region.
    pub fn size(&self) -> usize {
        self.shm.size()
    }
}
