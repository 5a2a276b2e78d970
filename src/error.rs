use std::io;
use thiserror::Error;

/// Errors surfaced by the capture rings, the trace encoder and the
/// boundaries around them.
///
/// Ring-full and ring-empty are normal operating states and are reported
/// through return values and counters; `ResourceExhausted` only leaves the
/// raw ring API, never the ingestor.
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("capture ring for worker {worker} is full")]
    ResourceExhausted { worker: u32 },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("stream corruption at input offset {offset}: declared frame length {declared_len} is out of range")]
    StreamCorruption { offset: u64, declared_len: u16 },

    #[error("{what} is unavailable: {source}")]
    BoundaryUnavailable {
        what: String,
        #[source]
        source: io::Error,
    },

    #[error("operation not supported: {0}")]
    Unsupported(&'static str),

    #[error("malformed trace: {0}")]
    MalformedTrace(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl CaptureError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        CaptureError::InvalidArgument(msg.into())
    }

    pub(crate) fn unavailable(what: impl Into<String>, source: io::Error) -> Self {
        CaptureError::BoundaryUnavailable {
            what: what.into(),
            source,
        }
    }
}

impl From<CaptureError> for io::Error {
    fn from(err: CaptureError) -> Self {
        match err {
            CaptureError::Io(e) => e,
            CaptureError::BoundaryUnavailable { source, .. } => source,
            CaptureError::InvalidArgument(_) => io::Error::new(io::ErrorKind::InvalidInput, err),
            CaptureError::Unsupported(_) => io::Error::new(io::ErrorKind::Unsupported, err),
            CaptureError::ResourceExhausted { .. } => {
                io::Error::new(io::ErrorKind::WouldBlock, err)
            }
            CaptureError::StreamCorruption { .. } | CaptureError::MalformedTrace(_) => {
                io::Error::new(io::ErrorKind::InvalidData, err)
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, CaptureError>;
