// Repacks drained slot records into a pcapng stream.

use super::pcapng;
use crate::Capture::Structs::{SlotHeader, SLOT_HEADER_SIZE, SLOT_SIZE};
use crate::error::{CaptureError, Result};
use std::io::Write;
use tracing::error;

/// Append the enhanced packet block for one slot record to `out`.
///
/// Returns the block length, or `StreamCorruption` (with `offset` as given)
/// when the record's original length is outside the frame-size range.
pub fn encode_frame_block(record: &[u8], offset: u64, out: &mut Vec<u8>) -> Result<usize> {
    if record.len() != SLOT_SIZE {
        return Err(CaptureError::invalid(format!(
            "slot record is {} bytes, expected {}",
            record.len(),
            SLOT_SIZE
        )));
    }
    let header = SlotHeader::read_from(record).unwrap_or_default();
    if !header.is_sane() {
        return Err(CaptureError::StreamCorruption {
            offset,
            declared_len: header.original_length,
        });
    }

    let captured = header.capture_length();
    Ok(pcapng::enhanced_packet_block(
        out,
        header.capture_timestamp,
        u32::from(header.original_length),
        &record[SLOT_HEADER_SIZE..SLOT_HEADER_SIZE + captured],
    ))
}

/// Streams a pcapng section to `sink`.
///
/// Section and interface headers go out once, before the first frame.
/// Each `encode` call takes a slot-aligned chunk from a ring read and writes
/// one enhanced packet block per record with a single `write_all`.
pub struct TraceEncoder<W: Write> {
    sink: W,
    scratch: Vec<u8>,
    headers_written: bool,
    input_offset: u64,
    frames: u64,
    bytes_written: u64,
}

impl<W: Write> TraceEncoder<W> {
    pub fn new(sink: W) -> Self {
        Self {
            sink,
            scratch: Vec::with_capacity(pcapng::SHB_SIZE + pcapng::IDB_SIZE),
            headers_written: false,
            input_offset: 0,
            frames: 0,
            bytes_written: 0,
        }
    }

    /// Write the section and interface headers. Later calls are no-ops.
    pub fn write_headers(&mut self) -> Result<()> {
        if self.headers_written {
            return Ok(());
        }
        self.scratch.clear();
        pcapng::section_header_block(&mut self.scratch);
        pcapng::interface_description_block(&mut self.scratch);
        self.sink.write_all(&self.scratch)?;
        self.bytes_written += self.scratch.len() as u64;
        self.headers_written = true;
        Ok(())
    }

    /// Encode every record in `chunk`; returns the number of frames written.
    ///
    /// `chunk.len()` must be a multiple of `SLOT_SIZE`. On a corrupt record
    /// the blocks before it are still written, then `StreamCorruption` is
    /// returned and nothing after it is touched.
    pub fn encode(&mut self, chunk: &[u8]) -> Result<usize> {
        if chunk.len() % SLOT_SIZE != 0 {
            return Err(CaptureError::invalid(format!(
                "chunk of {} bytes is not a multiple of the {} byte slot",
                chunk.len(),
                SLOT_SIZE
            )));
        }
        self.write_headers()?;

        self.scratch.clear();
        let mut encoded = 0;
        let mut failure = None;
        for record in chunk.chunks_exact(SLOT_SIZE) {
            match encode_frame_block(record, self.input_offset, &mut self.scratch) {
                Ok(_) => {
                    encoded += 1;
                    self.input_offset += SLOT_SIZE as u64;
                }
                Err(e) => {
                    if let CaptureError::StreamCorruption {
                        offset,
                        declared_len,
                    } = &e
                    {
                        error!(
                            offset,
                            declared_len,
                            frames_before = self.frames + encoded as u64,
                            "slot record out of range; ring and encoder desynchronized"
                        );
                    }
                    failure = Some(e);
                    break;
                }
            }
        }

        if !self.scratch.is_empty() {
            self.sink.write_all(&self.scratch)?;
            self.bytes_written += self.scratch.len() as u64;
        }
        self.frames += encoded as u64;

        match failure {
            Some(e) => Err(e),
            None => Ok(encoded),
        }
    }

    /// Frames encoded so far.
    pub fn frames_encoded(&self) -> u64 {
        self.frames
    }

    /// Bytes handed to the sink so far, headers included.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn flush(&mut self) -> Result<()> {
        self.sink.flush()?;
        Ok(())
    }

    pub fn get_ref(&self) -> &W {
        &self.sink
    }

    pub fn into_inner(self) -> W {
        self.sink
    }
}
