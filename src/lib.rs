// Module naming follows project convention (Core = backing memory, Capture = rings, Trace = pcapng)
#[allow(non_snake_case)]
pub mod Capture;
#[allow(non_snake_case)]
pub mod Core;
#[allow(non_snake_case)]
pub mod Trace;
#[allow(non_snake_case)]
pub mod Debug {
    pub mod StructDebug;
}

pub mod cli;
pub mod dump;
pub mod error;
pub mod ffi;

pub use error::{CaptureError, Result};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
