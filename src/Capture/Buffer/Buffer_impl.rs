use std::ptr;
use std::sync::atomic::Ordering::{Acquire, Relaxed, Release};

use super::layout::RingEntry;
use super::Buffer::CaptureRing;
use crate::error::{CaptureError, Result};

impl CaptureRing {
    /// Create a ring view over an existing band.
    ///
    /// # Safety
    /// `metadata` must point to an initialized `RingEntry` whose `capacity`
    /// is a power of two, and `band` must be valid for `capacity + slack`
    /// bytes for as long as the view is used.
    pub unsafe fn new(metadata: *const RingEntry, band: *mut u8) -> Self {
        let capacity = (*metadata).capacity as usize;
        let slack = (*metadata).slack as usize;
        Self {
            metadata,
            band,
            capacity,
            slack,
            mask: capacity - 1,
        }
    }

    #[inline]
    fn entry(&self) -> &RingEntry {
        // Safety: `new` requires the metadata pointer to outlive the view.
        unsafe { &*self.metadata }
    }

    /// Logical ring size in bytes.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn slack(&self) -> usize {
        self.slack
    }

    pub fn worker(&self) -> u32 {
        self.entry().worker_id
    }

    pub fn write_cursor(&self) -> u64 {
        self.entry().write.load(Acquire)
    }

    pub fn read_cursor(&self) -> u64 {
        self.entry().read.load(Acquire)
    }

    /// Records this ring refused because it was full.
    pub fn dropped(&self) -> u64 {
        self.entry().dropped.load(Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.write_cursor() == self.read_cursor()
    }

    /// Bytes written but not yet consumed. Never exceeds `capacity`.
    pub fn available_to_read(&self) -> usize {
        // Load `read` first: both cursors only grow, so a `write` loaded
        // afterwards can never be behind it.
        let read = self.read_cursor();
        let write = self.write_cursor();
        write.wrapping_sub(read) as usize
    }

    /// Append `bytes` as one unit.
    ///
    /// Either every byte is written and published, or nothing is written and
    /// `ResourceExhausted` is returned after bumping the dropped counter.
    /// O(1), never blocks, never allocates.
    ///
    /// # Safety
    /// The caller must be the ring's only producer.
    pub unsafe fn append(&self, bytes: &[u8]) -> Result<()> {
        let len = bytes.len();
        if len > self.slack || len > self.capacity {
            return Err(CaptureError::invalid(format!(
                "record of {} bytes exceeds ring slack {}",
                len, self.slack
            )));
        }

        let entry = self.entry();
        // Relaxed: we are the only writer of `write`.
        let write = entry.write.load(Relaxed);
        let read = entry.read.load(Acquire);
        let used = write.wrapping_sub(read) as usize;

        if used + len > self.capacity {
            entry.dropped.fetch_add(1, Relaxed);
            return Err(CaptureError::ResourceExhausted {
                worker: entry.worker_id,
            });
        }

        let offset = (write as usize) & self.mask;
        // offset < capacity and len <= slack, so the copy stays in the band.
        ptr::copy_nonoverlapping(bytes.as_ptr(), self.band.add(offset), len);

        let end = offset + len;
        if end > self.capacity {
            // Mirror the part that landed in the slack back to the band
            // start, where the consumer expects it. Those bytes are free:
            // `used + len <= capacity` was checked above.
            let spill = end - self.capacity;
            ptr::copy_nonoverlapping(self.band.add(self.capacity), self.band, spill);
        }

        entry.write.store(write.wrapping_add(len as u64), Release);
        Ok(())
    }

    /// Copy up to `dst.len()` pending bytes without releasing them.
    ///
    /// Returns the number of bytes copied.
    ///
    /// # Safety
    /// The caller must be the ring's only consumer.
    pub unsafe fn peek_into(&self, dst: &mut [u8]) -> usize {
        let entry = self.entry();
        let read = entry.read.load(Relaxed);
        let write = entry.write.load(Acquire);
        let n = (write.wrapping_sub(read) as usize).min(dst.len());
        if n == 0 {
            return 0;
        }

        let offset = (read as usize) & self.mask;
        let first = n.min(self.capacity - offset);
        ptr::copy_nonoverlapping(self.band.add(offset), dst.as_mut_ptr(), first);
        if n > first {
            ptr::copy_nonoverlapping(self.band, dst.as_mut_ptr().add(first), n - first);
        }
        n
    }

    /// Release `n` consumed bytes back to the producer.
    ///
    /// Fails with `InvalidArgument`, leaving the read cursor untouched, if
    /// `n` exceeds what is pending. That is a consumer protocol bug and is
    /// never clamped.
    ///
    /// # Safety
    /// The caller must be the ring's only consumer.
    pub unsafe fn advance_read(&self, n: usize) -> Result<()> {
        let entry = self.entry();
        let read = entry.read.load(Relaxed);
        let write = entry.write.load(Acquire);
        let available = write.wrapping_sub(read) as usize;
        if n > available {
            return Err(CaptureError::invalid(format!(
                "advance_read({}) exceeds {} available bytes on worker {}",
                n, available, entry.worker_id
            )));
        }
        entry.read.store(read.wrapping_add(n as u64), Release);
        Ok(())
    }

    /// Copy up to `dst.len()` pending bytes and release them.
    ///
    /// # Safety
    /// The caller must be the ring's only consumer.
    pub unsafe fn read_into(&self, dst: &mut [u8]) -> Result<usize> {
        let n = self.peek_into(dst);
        if n > 0 {
            self.advance_read(n)?;
        }
        Ok(n)
    }
}
