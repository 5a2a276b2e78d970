use crate::Capture::Buffer::CaptureRing;
use crate::Core::alloc::RingArena;
use std::fmt;

/// Debug function for RingArena
///
/// Shows the header location, worker count and aggregate drops without
/// walking the bands.
pub fn debug_ring_arena(arena: &RingArena, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("RingArena")
        .field("shm", &"<opaque>")
        .field("header", &format_args!("{:p}", arena.header_ptr()))
        .field("size", &arena.size())
        .field("workers", &arena.worker_count())
        .field("dropped", &arena.dropped_total())
        .field("initialized", &arena.is_initialized())
        .finish()
}

/// Debug function for CaptureRing
///
/// Cursors are loaded atomically; the band itself is never dereferenced.
pub fn debug_capture_ring(ring: &CaptureRing, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CaptureRing")
        .field("worker", &ring.worker())
        .field("band", &format_args!("0x{:x}", ring.band as usize))
        .field("capacity", &ring.capacity())
        .field("slack", &ring.slack())
        .field("write", &ring.write_cursor())
        .field("read", &ring.read_cursor())
        .field("dropped", &ring.dropped())
        .finish()
}
