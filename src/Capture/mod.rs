mod builder;
mod consumer;
mod producer;
pub mod device;
pub mod source;

pub use builder::{CaptureBuilder, CaptureSet, DEFAULT_BURST_FACTOR, DEFAULT_RING_ORDER};
pub use consumer::RingReader;
pub use device::CaptureDevice;
pub use producer::{dropped_frames_total, FrameHandler, FrameIngestor, Verdict};

pub mod Buffer {
    pub mod Buffer;
    pub mod Buffer_impl;
    pub mod layout;
    pub use Buffer::CaptureRing; // re-export for stable path
}

pub mod Structs {
    pub mod Frame_Structs;
    pub use Frame_Structs::{
        FrameSlotRecord, SlotHeader, CAPTURE_CEILING, MAX_FRAME_LEN, MIN_FRAME_LEN,
        SLOT_HEADER_SIZE, SLOT_PAYLOAD_CAPACITY, SLOT_SIZE,
    }; // re-export for stable path
}
