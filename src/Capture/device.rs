//! File-like read boundary over a capture ring.
//!
//! An external consumer sees a byte stream of raw slot records. Readiness
//! polling and out-of-band control are part of the boundary but are not
//! implemented; they answer `Unsupported` so callers can tell.

use super::RingReader;
use crate::error::{CaptureError, Result};
use std::io;

/// Readiness reported by [`CaptureDevice::poll`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Readable,
    Idle,
}

pub struct CaptureDevice {
    reader: RingReader,
}

impl CaptureDevice {
    /// Expose `reader`'s ring. In the minimal wiring this is worker 0.
    pub fn new(reader: RingReader) -> Self {
        Self { reader }
    }

    /// Copy between 0 and `buf.len()` bytes of raw ring content.
    ///
    /// Never blocks; returns 0 when nothing is pending.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.reader.read_into(buf)
    }

    pub fn poll(&self) -> Result<Readiness> {
        Err(CaptureError::Unsupported("poll"))
    }

    pub fn control(&mut self, _cmd: u32, _arg: u64) -> Result<()> {
        Err(CaptureError::Unsupported("control"))
    }

    pub fn worker(&self) -> usize {
        self.reader.worker()
    }

    pub fn into_reader(self) -> RingReader {
        self.reader
    }
}

impl io::Read for CaptureDevice {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        CaptureDevice::read(self, buf).map_err(io::Error::from)
    }
}
