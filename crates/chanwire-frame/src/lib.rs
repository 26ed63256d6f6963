//! The v2 call frame protocol.
//!
//! Every frame is a fixed 16-byte header followed by a body selected by the
//! header's type byte:
//! - 2-byte big-endian total size (header included)
//! - 1-byte frame type, 1 reserved byte
//! - 4-byte big-endian frame id
//! - 8 reserved bytes
//!
//! Frames can be decoded eagerly into a [`Frame`], or viewed lazily through a
//! [`LazyFrame`] that reads single fields straight out of the receive buffer
//! and patches the id or TTL in place when relaying.

pub mod body;
pub mod checksum;
pub mod codec;
pub mod error;
pub mod fragment;
pub mod headers;
pub mod lazy;
pub mod reader;
pub mod trace;
pub mod types;
pub mod writer;

#[cfg(feature = "async")]
pub mod async_codec;

pub use body::{
    body_table, CallCont, CallRequest, CallResponse, Cancel, Claim, ErrorResponse, FrameBody,
    Init, MAX_ARGS, PROTOCOL_VERSION,
};
pub use checksum::{Checksum, ChecksumState, ChecksumType};
pub use codec::{decode_frame, encode_frame, frame_rw, Frame, FrameConfig, FrameHeader};
pub use error::{FrameError, Result};
pub use fragment::{ArgAssembler, ArgWriter};
pub use headers::{Headers, ARG_SCHEME, CALLER_NAME};
pub use lazy::{LazyFrame, LazyHeaders};
pub use reader::FrameReader;
pub use trace::{Tracing, TRACING_SIZE};
pub use types::{
    ErrorCode, FrameType, FLAG_FRAGMENT, FLAG_NO_RESPONSE, HEADER_SIZE, MAX_FRAME_SIZE,
    RESPONSE_APP_ERROR, RESPONSE_OK,
};
pub use writer::FrameWriter;

#[cfg(feature = "async")]
pub use async_codec::FrameCodec;
