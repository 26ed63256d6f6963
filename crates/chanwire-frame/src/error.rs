use chanwire_rw::RwError;

use crate::checksum::ChecksumType;
use crate::types::FrameType;

/// Errors that can occur while encoding, decoding or moving frames.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// A codec rejected the bytes or the value.
    #[error("frame codec error: {0}")]
    Rw(#[from] RwError),

    /// The encoded frame exceeds the configured maximum size.
    #[error("frame too large ({size} bytes, max {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed before a complete frame was received.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,

    /// The digest carried by a frame does not match its argument bytes.
    #[error("{kind} checksum mismatch (frame carries {expected:#010x}, computed {actual:#010x})")]
    ChecksumMismatch {
        kind: ChecksumType,
        expected: u32,
        actual: u32,
    },

    /// The frame's checksum algorithm is recognized but cannot be computed.
    #[error("unsupported checksum type {0}")]
    UnsupportedChecksum(ChecksumType),

    /// A frame arrived that does not fit the current call sequence.
    #[error("unexpected {frame_type} frame: {reason}")]
    UnexpectedFrame {
        frame_type: FrameType,
        reason: &'static str,
    },
}

pub type Result<T> = std::result::Result<T, FrameError>;
