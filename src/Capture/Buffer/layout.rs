use crossbeam_utils::CachePadded;
use std::sync::atomic::{AtomicU32, AtomicU64};

/// The maximum number of worker rings one arena can describe.
/// This must be a constant to allow for a fixed-size array in the GlobalHeader.
pub const MAX_WORKERS: usize = 64;

/// "MGCAPRNG"
pub const ARENA_MAGIC: u64 = 0x4D47_4341_5052_4E47;

pub const ARENA_VERSION: u32 = 1;

/// Claim bit held by the single producer of a ring.
pub const CLAIM_PRODUCER: u32 = 1 << 0;
/// Claim bit held by the single consumer of a ring.
pub const CLAIM_CONSUMER: u32 = 1 << 1;

/// Metadata for one worker's capture ring.
///
/// Lives in the arena header so that a consumer attached from another
/// process sees the same cursors and counters as the producer.
#[repr(C, align(128))]
pub struct RingEntry {
    /// Worker (CPU) index this ring belongs to.
    pub worker_id: u32,

    /// Role claim bits (`CLAIM_PRODUCER`, `CLAIM_CONSUMER`).
    pub claims: AtomicU32,

    /// Logical ring size in bytes. Power of two, zero if the entry is unused.
    pub capacity: u64,

    /// Bytes past `capacity` that a record may spill into before it is
    /// mirrored back to the start of the band.
    pub slack: u64,

    /// Byte offset from the start of the arena to this ring's band.
    pub band_offset: u64,

    /// Monotonic byte offset of the next write. Only the producer stores it.
    pub write: CachePadded<AtomicU64>,

    /// Monotonic byte offset of the next read. Only the consumer stores it.
    pub read: CachePadded<AtomicU64>,

    /// Records rejected because the ring was full.
    pub dropped: CachePadded<AtomicU64>,
}

/// Header located at the very beginning of an arena.
#[repr(C, align(128))]
pub struct GlobalHeader {
    pub magic: u64,

    pub version: u32,

    /// Record width both sides were built with; attach refuses a mismatch.
    pub slot_size: u32,

    pub worker_count: u32,

    pub reserved: u32,

    /// Total arena size in bytes, header included.
    pub total_size: u64,

    pub rings: [RingEntry; MAX_WORKERS],
}
