// Fixed-width frame record written into the capture rings.
//
// A consumer that reads N bytes with N % SLOT_SIZE == 0 splits them into
// N / SLOT_SIZE records without parsing anything; there is no length field
// in the byte stream itself.

/// Width in bytes of one frame record inside a ring.
pub const SLOT_SIZE: usize = 128;

/// Packed header: `u16` original length followed by `u64` timestamp.
pub const SLOT_HEADER_SIZE: usize = 10;

/// Frame bytes retained per slot. Longer frames are truncated, shorter ones
/// are zero-padded.
pub const SLOT_PAYLOAD_CAPACITY: usize = SLOT_SIZE - SLOT_HEADER_SIZE;

/// Upper bound on bytes stored per captured-frame block in the trace
/// container. Kept below the slot payload capacity on purpose.
pub const CAPTURE_CEILING: usize = 96;

/// Smallest original length a decoder accepts.
pub const MIN_FRAME_LEN: u16 = 40;

/// Largest original length a decoder accepts (jumbo frame with FCS).
pub const MAX_FRAME_LEN: u16 = 9014;

const _: () = {
    assert!(SLOT_SIZE.is_power_of_two(), "SLOT_SIZE must be a power of two");
    assert!(CAPTURE_CEILING < SLOT_PAYLOAD_CAPACITY);
    assert!(SLOT_HEADER_SIZE == 2 + 8);
};

/// Decoded header of a frame record.
///
/// On the wire all fields are little-endian and packed, so this struct is
/// never transmuted; use [`SlotHeader::write_to`] and [`SlotHeader::read_from`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct SlotHeader {
    /// Length of the frame as received, before truncation.
    pub original_length: u16,
    /// Capture time in nanoseconds.
    pub capture_timestamp: u64,
}

impl SlotHeader {
    pub fn write_to(&self, slot: &mut [u8; SLOT_SIZE]) {
        slot[0..2].copy_from_slice(&self.original_length.to_le_bytes());
        slot[2..SLOT_HEADER_SIZE].copy_from_slice(&self.capture_timestamp.to_le_bytes());
    }

    /// Read the header of the record starting at `record[0]`.
    ///
    /// Returns `None` if fewer than `SLOT_HEADER_SIZE` bytes are given.
    pub fn read_from(record: &[u8]) -> Option<Self> {
        if record.len() < SLOT_HEADER_SIZE {
            return None;
        }
        let mut len = [0u8; 2];
        len.copy_from_slice(&record[0..2]);
        let mut ts = [0u8; 8];
        ts.copy_from_slice(&record[2..SLOT_HEADER_SIZE]);
        Some(Self {
            original_length: u16::from_le_bytes(len),
            capture_timestamp: u64::from_le_bytes(ts),
        })
    }

    /// Whether `original_length` falls in the range a real frame can have.
    pub fn is_sane(&self) -> bool {
        (MIN_FRAME_LEN..=MAX_FRAME_LEN).contains(&self.original_length)
    }

    /// Bytes a trace block stores for this record.
    pub fn capture_length(&self) -> usize {
        (self.original_length as usize).min(CAPTURE_CEILING)
    }
}

/// One complete slot, built on the stack by the producer.
#[derive(Clone)]
pub struct FrameSlotRecord {
    bytes: [u8; SLOT_SIZE],
}

impl FrameSlotRecord {
    /// Encode `frame` captured at `timestamp_ns` into a slot.
    ///
    /// `original_length` is taken from the caller rather than `frame.len()`
    /// so a source that already truncated the frame can still report the
    /// true size.
    pub fn new(frame: &[u8], original_length: u16, timestamp_ns: u64) -> Self {
        let mut bytes = [0u8; SLOT_SIZE];
        SlotHeader {
            original_length,
            capture_timestamp: timestamp_ns,
        }
        .write_to(&mut bytes);

        let len = frame.len().min(SLOT_PAYLOAD_CAPACITY);
        bytes[SLOT_HEADER_SIZE..SLOT_HEADER_SIZE + len].copy_from_slice(&frame[..len]);
        Self { bytes }
    }

    pub fn header(&self) -> SlotHeader {
        // A full slot always holds a header.
        SlotHeader::read_from(&self.bytes).unwrap_or_default()
    }

    pub fn payload(&self) -> &[u8] {
        &self.bytes[SLOT_HEADER_SIZE..]
    }

    pub fn as_bytes(&self) -> &[u8; SLOT_SIZE] {
        &self.bytes
    }
}

/// Split a slot-aligned buffer into records.
///
/// Trailing bytes that do not fill a full slot are ignored; callers that
/// care reject such buffers before getting here.
pub fn records(buf: &[u8]) -> impl Iterator<Item = &[u8]> {
    buf.chunks_exact(SLOT_SIZE)
}
