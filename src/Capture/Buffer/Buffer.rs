// A single worker's capture ring: a byte band of `capacity + slack` inside an arena.

use super::layout::RingEntry;

/// A lock-free, single-producer single-consumer byte ring view.
///
/// This struct is NOT stored in the arena. It is a transient view that holds
/// pointers to the ring's metadata and band.
///
/// ### Concurrency Design:
/// - **Producer (append)**: writes record bytes at `write & mask`, possibly
///   running into the slack region past `capacity`, mirrors any spill to the
///   band start, then publishes by storing `write + len` with `Release`.
/// - **Consumer (read)**: loads `write` with `Acquire`, copies pending bytes
///   (in at most two pieces around the logical end), then releases them by
///   storing `read + n`.
/// - Cursors grow monotonically; `write - read` is always in `[0, capacity]`.
pub struct CaptureRing {
    /// Pointer to the ring metadata in the arena header.
    pub(crate) metadata: *const RingEntry,

    /// Pointer to the start of this ring's band.
    pub(crate) band: *mut u8,

    /// Logical size of the ring in bytes.
    pub(crate) capacity: usize,

    /// Bytes available past `capacity` for a record that straddles the end.
    pub(crate) slack: usize,

    /// `capacity - 1`, maps a cursor to a band offset.
    pub(crate) mask: usize,
}

unsafe impl Send for CaptureRing {}
unsafe impl Sync for CaptureRing {}
