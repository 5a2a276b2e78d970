// Producer side of a capture ring: turns delivered frames into slot records.
use crate::Capture::Buffer::layout::CLAIM_PRODUCER;
use crate::Capture::Buffer::CaptureRing;
use crate::Capture::Structs::{FrameSlotRecord, MAX_FRAME_LEN, MIN_FRAME_LEN};
use crate::Core::alloc::RingArena;
use crate::error::CaptureError;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Frames dropped on full rings across every ingestor in the process.
static DROPPED_FRAMES: AtomicU64 = AtomicU64::new(0);

/// Process-wide count of frames dropped because a ring was full.
pub fn dropped_frames_total() -> u64 {
    DROPPED_FRAMES.load(Ordering::Relaxed)
}

/// Answer given to a frame source for each delivered frame.
///
/// The source must not retry either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The capture subsystem took responsibility for the frame. This
    /// includes frames dropped because the ring was full.
    Accepted,
    /// The frame length is outside `MIN_FRAME_LEN..=MAX_FRAME_LEN`.
    Rejected,
}

/// Callback a frame source invokes once per received frame.
pub trait FrameHandler {
    fn on_frame(&mut self, frame: &[u8], timestamp_ns: u64) -> Verdict;
}

/// The single producer of one worker's capture ring.
///
/// Safe to call from contexts that must not block: `on_frame` builds the
/// record on the stack and appends it in O(1) without allocating.
pub struct FrameIngestor {
    arena: Arc<RingArena>,
    ring: CaptureRing,
    worker: usize,
    accepted: u64,
    dropped: u64,
}

impl FrameIngestor {
    /// Claim the producer role of `worker`'s ring.
    pub fn attach(arena: Arc<RingArena>, worker: usize) -> crate::Result<Self> {
        let ring = arena.claim_producer(worker)?;
        Ok(Self {
            arena,
            ring,
            worker,
            accepted: 0,
            dropped: 0,
        })
    }

    /// Worker index this ingestor appends to.
    pub fn worker(&self) -> usize {
        self.worker
    }

    /// Frames stored in the ring by this ingestor.
    pub fn accepted(&self) -> u64 {
        self.accepted
    }

    /// Frames this ingestor dropped on a full ring.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn ring(&self) -> &CaptureRing {
        &self.ring
    }
}

impl FrameHandler for FrameIngestor {
    fn on_frame(&mut self, frame: &[u8], timestamp_ns: u64) -> Verdict {
        // Lengths the encoder would read as corruption never enter the ring.
        let original_length = match u16::try_from(frame.len()) {
            Ok(len) if (MIN_FRAME_LEN..=MAX_FRAME_LEN).contains(&len) => len,
            _ => return Verdict::Rejected,
        };

        let record = FrameSlotRecord::new(frame, original_length, timestamp_ns);
        // Safety: the producer claim is held for the lifetime of `self`.
        match unsafe { self.ring.append(record.as_bytes()) } {
            Ok(()) => {
                self.accepted += 1;
                Verdict::Accepted
            }
            Err(CaptureError::ResourceExhausted { .. }) => {
                self.dropped += 1;
                DROPPED_FRAMES.fetch_add(1, Ordering::Relaxed);
                Verdict::Accepted
            }
            // A slot always fits the slack checked at arena creation.
            Err(_) => Verdict::Rejected,
        }
    }
}

impl Drop for FrameIngestor {
    fn drop(&mut self) {
        self.arena.release(self.worker, CLAIM_PRODUCER);
    }
}
