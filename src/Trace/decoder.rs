// Minimal little-endian pcapng block reader, enough to walk what the encoder writes.

use super::pcapng::{BT_EPB, BT_IDB, BT_SHB, BYTE_ORDER_MAGIC, EPB_HEAD_SIZE, EPB_TAIL_SIZE};
use crate::error::{CaptureError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceOption<'a> {
    pub code: u16,
    pub value: &'a [u8],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedFrame<'a> {
    pub interface_id: u32,
    pub timestamp: u64,
    pub original_len: u32,
    pub data: &'a [u8],
}

impl CapturedFrame<'_> {
    pub fn captured_len(&self) -> usize {
        self.data.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block<'a> {
    SectionHeader {
        major: u16,
        minor: u16,
        section_length: u64,
    },
    InterfaceDescription {
        link_type: u16,
        snap_len: u32,
        options: Vec<InterfaceOption<'a>>,
    },
    CapturedFrame(CapturedFrame<'a>),
    Unknown {
        block_type: u32,
        body: &'a [u8],
    },
}

/// Iterates the blocks of a trace held in memory.
///
/// Yields `Err(MalformedTrace)` once and then stops if a block is truncated,
/// its trailing length disagrees with its leading one, or the section header
/// is not little-endian.
pub struct TraceReader<'a> {
    buf: &'a [u8],
    pos: usize,
    failed: bool,
}

impl<'a> TraceReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            pos: 0,
            failed: false,
        }
    }

    /// Byte offset of the next block.
    pub fn position(&self) -> usize {
        self.pos
    }

    fn malformed(&mut self, msg: String) -> Option<Result<Block<'a>>> {
        self.failed = true;
        Some(Err(CaptureError::MalformedTrace(format!(
            "at offset {}: {}",
            self.pos, msg
        ))))
    }
}

fn u16_at(b: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([b[at], b[at + 1]])
}

fn u32_at(b: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([b[at], b[at + 1], b[at + 2], b[at + 3]])
}

fn u64_at(b: &[u8], at: usize) -> u64 {
    (u64::from(u32_at(b, at + 4)) << 32) | u64::from(u32_at(b, at))
}

fn parse_options(mut b: &[u8]) -> std::result::Result<Vec<InterfaceOption<'_>>, String> {
    let mut options = Vec::new();
    while b.len() >= 4 {
        let code = u16_at(b, 0);
        let len = u16_at(b, 2) as usize;
        if code == 0 {
            return Ok(options);
        }
        let padded = len + (4 - len % 4) % 4;
        if b.len() < 4 + padded {
            return Err(format!("option {} overruns its block", code));
        }
        options.push(InterfaceOption {
            code,
            value: &b[4..4 + len],
        });
        b = &b[4 + padded..];
    }
    Ok(options)
}

fn parse_block(block_type: u32, body: &[u8]) -> std::result::Result<Block<'_>, String> {
    match block_type {
        BT_SHB => {
            if body.len() < 16 {
                return Err("section header too short".into());
            }
            if u32_at(body, 0) != BYTE_ORDER_MAGIC {
                return Err(format!(
                    "unsupported byte-order magic 0x{:08x}",
                    u32_at(body, 0)
                ));
            }
            Ok(Block::SectionHeader {
                major: u16_at(body, 4),
                minor: u16_at(body, 6),
                section_length: u64_at(body, 8),
            })
        }
        BT_IDB => {
            if body.len() < 8 {
                return Err("interface description too short".into());
            }
            Ok(Block::InterfaceDescription {
                link_type: u16_at(body, 0),
                snap_len: u32_at(body, 4),
                options: parse_options(&body[8..])?,
            })
        }
        BT_EPB => {
            let fixed = EPB_HEAD_SIZE - 8;
            if body.len() < fixed {
                return Err("enhanced packet block too short".into());
            }
            let captured = u32_at(body, 12) as usize;
            if fixed + captured > body.len() {
                return Err(format!(
                    "captured length {} overruns its block",
                    captured
                ));
            }
            Ok(Block::CapturedFrame(CapturedFrame {
                interface_id: u32_at(body, 0),
                timestamp: (u64::from(u32_at(body, 4)) << 32) | u64::from(u32_at(body, 8)),
                original_len: u32_at(body, 16),
                data: &body[fixed..fixed + captured],
            }))
        }
        other => Ok(Block::Unknown {
            block_type: other,
            body,
        }),
    }
}

impl<'a> Iterator for TraceReader<'a> {
    type Item = Result<Block<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.pos >= self.buf.len() {
            return None;
        }
        let buf: &'a [u8] = self.buf;
        let rest = &buf[self.pos..];
        if rest.len() < 12 {
            return self.malformed(format!("{} trailing bytes are not a block", rest.len()));
        }

        let block_type = u32_at(rest, 0);
        let total = u32_at(rest, 4) as usize;
        if total < 12 || total % 4 != 0 || total > rest.len() {
            return self.malformed(format!("bad block length {}", total));
        }
        let trailer = u32_at(rest, total - EPB_TAIL_SIZE) as usize;
        if trailer != total {
            return self.malformed(format!(
                "trailing length {} does not match leading {}",
                trailer, total
            ));
        }

        match parse_block(block_type, &rest[8..total - EPB_TAIL_SIZE]) {
            Ok(block) => {
                self.pos += total;
                Some(Ok(block))
            }
            Err(msg) => self.malformed(msg),
        }
    }
}

/// Collect every captured frame in `buf`, failing on the first malformed block.
pub fn captured_frames(buf: &[u8]) -> Result<Vec<CapturedFrame<'_>>> {
    let mut frames = Vec::new();
    for block in TraceReader::new(buf) {
        if let Block::CapturedFrame(frame) = block? {
            frames.push(frame);
        }
    }
    Ok(frames)
}
