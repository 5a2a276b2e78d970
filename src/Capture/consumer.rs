// Consumer side of a capture ring: bulk drains whole slots.

use crate::Capture::Buffer::layout::CLAIM_CONSUMER;
use crate::Capture::Buffer::CaptureRing;
use crate::Capture::Structs::SLOT_SIZE;
use crate::Core::alloc::RingArena;
use crate::error::{CaptureError, Result};
use std::sync::Arc;

/// The single consumer of one worker's capture ring.
///
/// Reads are non-blocking: an empty ring yields 0 and the caller decides
/// how to back off.
pub struct RingReader {
    arena: Arc<RingArena>,
    ring: CaptureRing,
    worker: usize,
}

impl RingReader {
    /// Claim the consumer role of `worker`'s ring.
    pub fn attach(arena: Arc<RingArena>, worker: usize) -> Result<Self> {
        let ring = arena.claim_consumer(worker)?;
        Ok(Self {
            arena,
            ring,
            worker,
        })
    }

    pub fn worker(&self) -> usize {
        self.worker
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Bytes pending in the ring.
    pub fn available(&self) -> usize {
        self.ring.available_to_read()
    }

    pub fn ring(&self) -> &CaptureRing {
        &self.ring
    }

    /// Copy `min(available, dst.len())` bytes into `dst` and release them.
    ///
    /// `dst.len()` must be a non-zero multiple of `SLOT_SIZE`; anything else
    /// would hand a partial slot downstream and is rejected with
    /// `InvalidArgument`.
    ///
    /// # Returns
    /// * `Ok(0)` if the ring is empty
    /// * `Ok(n)` with `n % SLOT_SIZE == 0` otherwise
    pub fn read_into(&mut self, dst: &mut [u8]) -> Result<usize> {
        if dst.is_empty() || dst.len() % SLOT_SIZE != 0 {
            return Err(CaptureError::invalid(format!(
                "read buffer of {} bytes is not a non-zero multiple of the {} byte slot",
                dst.len(),
                SLOT_SIZE
            )));
        }
        if self.ring.is_empty() {
            return Ok(0);
        }

        // Producers only append whole slots; rounding keeps that true even
        // if a raw appender misbehaved.
        let want = self.ring.available_to_read().min(dst.len());
        let want = want - want % SLOT_SIZE;
        if want == 0 {
            return Ok(0);
        }

        // Safety: the consumer claim is held for the lifetime of `self`.
        unsafe { self.ring.read_into(&mut dst[..want]) }
    }

    /// Release `n` bytes without copying them.
    ///
    /// Fails with `InvalidArgument` and leaves the ring untouched if `n`
    /// exceeds what is pending.
    pub fn advance(&mut self, n: usize) -> Result<()> {
        // Safety: the consumer claim is held for the lifetime of `self`.
        unsafe { self.ring.advance_read(n) }
    }
}

impl Drop for RingReader {
    fn drop(&mut self) {
        self.arena.release(self.worker, CLAIM_CONSUMER);
    }
}
