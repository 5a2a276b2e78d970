pub mod decoder;
pub mod encoder;
pub mod pcapng;

pub use decoder::{captured_frames, Block, CapturedFrame, TraceReader};
pub use encoder::{encode_frame_block, TraceEncoder};
