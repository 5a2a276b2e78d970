// The consumer drain loop: rings -> encoder -> sink.

use crate::Capture::Structs::SLOT_SIZE;
use crate::Capture::RingReader;
use crate::Trace::TraceEncoder;
use crate::error::{CaptureError, Result};
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info};

/// Slots fetched per ring read.
pub const DEFAULT_READ_BATCH_SLOTS: usize = 1024;

/// Idle sleep when every ring came back empty.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_micros(100);

/// Drains a set of rings round-robin into one trace stream.
///
/// Records keep per-ring FIFO order; there is no cross-ring ordering by
/// timestamp.
pub struct DumpSession<W: Write> {
    readers: Vec<RingReader>,
    encoder: TraceEncoder<W>,
    ibuf: Vec<u8>,
    poll_interval: Duration,
}

impl<W: Write> DumpSession<W> {
    pub fn new(readers: Vec<RingReader>, sink: W) -> Self {
        Self {
            readers,
            encoder: TraceEncoder::new(sink),
            ibuf: vec![0u8; DEFAULT_READ_BATCH_SLOTS * SLOT_SIZE],
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_batch_slots(mut self, slots: usize) -> Result<Self> {
        if slots == 0 {
            return Err(CaptureError::invalid("read batch must hold at least one slot"));
        }
        self.ibuf = vec![0u8; slots * SLOT_SIZE];
        Ok(self)
    }

    /// Write the trace headers now rather than with the first frame.
    pub fn start(&mut self) -> Result<()> {
        self.encoder.write_headers()
    }

    /// Read each ring once and encode what came back.
    ///
    /// Returns the number of frames written by this pass.
    pub fn drain_once(&mut self) -> Result<usize> {
        let mut frames = 0;
        for reader in &mut self.readers {
            let n = reader.read_into(&mut self.ibuf)?;
            if n == 0 {
                continue;
            }
            frames += self.encoder.encode(&self.ibuf[..n])?;
        }
        Ok(frames)
    }

    /// Drain until every ring is empty.
    pub fn drain_all(&mut self) -> Result<u64> {
        let mut total = 0;
        loop {
            let n = self.drain_once()?;
            if n == 0 {
                return Ok(total);
            }
            total += n as u64;
        }
    }

    /// Drain until `stop` is set, sleeping `poll_interval` whenever a pass
    /// finds nothing. Rings are drained one last time before returning.
    ///
    /// Returns the number of packets captured.
    pub fn run(&mut self, stop: &AtomicBool) -> Result<u64> {
        self.start()?;
        info!(rings = self.readers.len(), "drain loop started");
        while !stop.load(Ordering::Relaxed) {
            if self.drain_once()? == 0 {
                std::thread::sleep(self.poll_interval);
            }
        }
        self.drain_all()?;
        self.encoder.flush()?;
        debug!(bytes = self.encoder.bytes_written(), "trace flushed");
        info!(packets = self.encoder.frames_encoded(), "drain loop stopped");
        Ok(self.encoder.frames_encoded())
    }

    pub fn packets(&self) -> u64 {
        self.encoder.frames_encoded()
    }

    pub fn encoder(&self) -> &TraceEncoder<W> {
        &self.encoder
    }

    pub fn into_parts(self) -> (Vec<RingReader>, TraceEncoder<W>) {
        (self.readers, self.encoder)
    }
}
