//! PCAPNG block constants and builders.
//!
//! Every multi-byte field is written little-endian, matching the byte-order
//! magic in the section header. Builders append to a caller-owned buffer so
//! the encoder can reuse one allocation across reads.

pub const BT_SHB: u32 = 0x0A0D_0D0A;
pub const BT_IDB: u32 = 0x0000_0001;
pub const BT_EPB: u32 = 0x0000_0006;

pub const BYTE_ORDER_MAGIC: u32 = 0x1A2B_3C4D;
pub const VERSION_MAJOR: u16 = 1;
pub const VERSION_MINOR: u16 = 0;

/// Section length is not known while streaming.
pub const SECTION_LENGTH_UNKNOWN: u64 = u64::MAX;

/// LINKTYPE_ETHERNET.
pub const LINKTYPE_ETHERNET: u16 = 1;

/// Declared interface snapshot length, all ones.
pub const SNAPLEN: u32 = u32::MAX;

pub const OPT_ENDOFOPT: u16 = 0;
/// Time stamp resolution option; value 9 means 10^-9 s.
pub const IF_TSRESOL: u16 = 9;
/// Frame check sequence length option.
pub const IF_FCSLEN: u16 = 13;

pub const TSRESOL_NANOS: u8 = 9;
pub const FCS_LEN: u8 = 4;

pub const SHB_SIZE: usize = 28;
pub const IDB_SIZE: usize = 40;

/// Type, total length, interface id, timestamp high/low, captured and
/// original length.
pub const EPB_HEAD_SIZE: usize = 28;
/// Repeated total length.
pub const EPB_TAIL_SIZE: usize = 4;

/// Zero bytes needed to bring `len` to a 32-bit boundary.
pub fn pad_len(len: usize) -> usize {
    (4 - len % 4) % 4
}

/// Total block length of an enhanced packet block holding `captured` bytes.
pub fn epb_len(captured: usize) -> usize {
    EPB_HEAD_SIZE + EPB_TAIL_SIZE + captured + pad_len(captured)
}

fn put_u16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn put_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn put_opt_u8(out: &mut Vec<u8>, code: u16, value: u8) {
    put_u16(out, code);
    put_u16(out, 1);
    out.push(value);
    out.extend_from_slice(&[0u8; 3]);
}

/// Append the section header block.
pub fn section_header_block(out: &mut Vec<u8>) {
    let start = out.len();
    put_u32(out, BT_SHB);
    put_u32(out, SHB_SIZE as u32);
    put_u32(out, BYTE_ORDER_MAGIC);
    put_u16(out, VERSION_MAJOR);
    put_u16(out, VERSION_MINOR);
    out.extend_from_slice(&SECTION_LENGTH_UNKNOWN.to_le_bytes());
    put_u32(out, SHB_SIZE as u32);
    debug_assert_eq!(out.len() - start, SHB_SIZE);
}

/// Append the interface description block for the single captured
/// Ethernet interface.
pub fn interface_description_block(out: &mut Vec<u8>) {
    let start = out.len();
    put_u32(out, BT_IDB);
    put_u32(out, IDB_SIZE as u32);
    put_u16(out, LINKTYPE_ETHERNET);
    put_u16(out, 0); // reserved
    put_u32(out, SNAPLEN);
    put_opt_u8(out, IF_FCSLEN, FCS_LEN);
    put_opt_u8(out, IF_TSRESOL, TSRESOL_NANOS);
    put_u16(out, OPT_ENDOFOPT);
    put_u16(out, 0);
    put_u32(out, IDB_SIZE as u32);
    debug_assert_eq!(out.len() - start, IDB_SIZE);
}

/// Append one enhanced packet block on interface 0.
///
/// `data` is stored as is; the caller has already applied the capture
/// ceiling. Returns the block length.
pub fn enhanced_packet_block(
    out: &mut Vec<u8>,
    timestamp: u64,
    original_len: u32,
    data: &[u8],
) -> usize {
    let total = epb_len(data.len());
    put_u32(out, BT_EPB);
    put_u32(out, total as u32);
    put_u32(out, 0); // interface id
    put_u32(out, (timestamp >> 32) as u32);
    put_u32(out, (timestamp & 0xFFFF_FFFF) as u32);
    put_u32(out, data.len() as u32);
    put_u32(out, original_len);
    out.extend_from_slice(data);
    out.extend_from_slice(&[0u8; 3][..pad_len(data.len())]);
    put_u32(out, total as u32);
    total
}
