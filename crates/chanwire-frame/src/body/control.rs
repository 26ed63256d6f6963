//! Connection-level bodies: init handshake, cancel, claim and error.

use std::sync::OnceLock;

use chanwire_rw::{
    check_remaining, Field, LengthResult, ReadResult, Rw, RwError, StringRw, StructRw,
    WriteResult, UINT16_BE, UINT32_BE,
};

use crate::headers::{Headers, INIT_HEADERS};
use crate::trace::{Tracing, TracingRw};
use crate::types::ErrorCode;

/// Protocol version carried in init bodies.
pub const PROTOCOL_VERSION: u16 = 2;

/// Message and reason codec (`message~2`, `why~2`).
pub const MESSAGE: StringRw<u16> = StringRw::new(UINT16_BE);

/// Body of InitRequest and InitResponse.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Init {
    pub version: u16,
    pub headers: Headers,
}

impl Init {
    pub fn new(headers: Headers) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            headers,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Cancel {
    pub ttl: u32,
    pub tracing: Tracing,
    pub why: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Claim {
    pub ttl: u32,
    pub tracing: Tracing,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ErrorResponse {
    pub code: ErrorCode,
    pub tracing: Tracing,
    pub message: String,
}

impl Default for ErrorResponse {
    fn default() -> Self {
        Self {
            code: ErrorCode::UnexpectedError,
            tracing: Tracing::default(),
            message: String::new(),
        }
    }
}

/// One-byte error code mapped onto [`ErrorCode`]; unknown codes are rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorCodeRw;

impl Rw for ErrorCodeRw {
    type Value = ErrorCode;

    fn byte_length(&self, _value: &ErrorCode) -> LengthResult {
        Ok(1)
    }

    fn write_into(&self, value: &ErrorCode, buffer: &mut [u8], offset: usize) -> WriteResult {
        check_remaining(buffer, offset, 1)?;
        buffer[offset] = value.code();
        Ok(offset + 1)
    }

    fn read_from(&self, buffer: &[u8], offset: usize) -> ReadResult<ErrorCode> {
        check_remaining(buffer, offset, 1)?;
        let code = ErrorCode::from_code(buffer[offset]).ok_or_else(|| {
            RwError::invalid(format!("unknown error code {:#04x}", buffer[offset]), offset)
        })?;
        Ok((offset + 1, code))
    }
}

pub fn init_rw() -> &'static StructRw<Init> {
    static RW: OnceLock<StructRw<Init>> = OnceLock::new();
    RW.get_or_init(|| {
        StructRw::new("Init")
            .field(Field::new("version", UINT16_BE, |b: &Init| &b.version, |b, v| b.version = v))
            .field(Field::new(
                "headers",
                INIT_HEADERS,
                |b: &Init| &b.headers,
                |b, v| b.headers = v,
            ))
    })
}

pub fn cancel_rw() -> &'static StructRw<Cancel> {
    static RW: OnceLock<StructRw<Cancel>> = OnceLock::new();
    RW.get_or_init(|| {
        StructRw::new("Cancel")
            .field(Field::new("ttl", UINT32_BE, |b: &Cancel| &b.ttl, |b, v| b.ttl = v))
            .field(Field::new(
                "tracing",
                TracingRw,
                |b: &Cancel| &b.tracing,
                |b, v| b.tracing = v,
            ))
            .field(Field::new("why", MESSAGE, |b: &Cancel| &b.why, |b, v| b.why = v))
    })
}

pub fn claim_rw() -> &'static StructRw<Claim> {
    static RW: OnceLock<StructRw<Claim>> = OnceLock::new();
    RW.get_or_init(|| {
        StructRw::new("Claim")
            .field(Field::new("ttl", UINT32_BE, |b: &Claim| &b.ttl, |b, v| b.ttl = v))
            .field(Field::new(
                "tracing",
                TracingRw,
                |b: &Claim| &b.tracing,
                |b, v| b.tracing = v,
            ))
    })
}

pub fn error_response_rw() -> &'static StructRw<ErrorResponse> {
    static RW: OnceLock<StructRw<ErrorResponse>> = OnceLock::new();
    RW.get_or_init(|| {
        StructRw::new("ErrorResponse")
            .field(Field::new(
                "code",
                ErrorCodeRw,
                |b: &ErrorResponse| &b.code,
                |b, v| b.code = v,
            ))
            .field(Field::new(
                "tracing",
                TracingRw,
                |b: &ErrorResponse| &b.tracing,
                |b, v| b.tracing = v,
            ))
            .field(Field::new(
                "message",
                MESSAGE,
                |b: &ErrorResponse| &b.message,
                |b, v| b.message = v,
            ))
    })
}
