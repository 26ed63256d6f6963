//! Fixed v2 constant tables: frame types, call flags, response and error codes.

use std::fmt;

use chanwire_rw::RwError;

/// Frame header length in bytes.
pub const HEADER_SIZE: usize = 16;

/// Largest frame the 16-bit size field can describe.
pub const MAX_FRAME_SIZE: usize = 0xFFFF;

/// Call flag: more fragments of this call follow.
pub const FLAG_FRAGMENT: u8 = 0x01;

/// Call flag: the caller does not expect a response.
pub const FLAG_NO_RESPONSE: u8 = 0x02;

/// Frame body type, the discriminant at header offset 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum FrameType {
    InitRequest = 0x01,
    InitResponse = 0x02,
    CallRequest = 0x03,
    CallResponse = 0x04,
    CallRequestCont = 0x13,
    CallResponseCont = 0x14,
    Cancel = 0xc0,
    Claim = 0xc1,
    PingRequest = 0xd0,
    PingResponse = 0xd1,
    ErrorResponse = 0xff,
}

impl FrameType {
    pub const ALL: [FrameType; 11] = [
        FrameType::InitRequest,
        FrameType::InitResponse,
        FrameType::CallRequest,
        FrameType::CallResponse,
        FrameType::CallRequestCont,
        FrameType::CallResponseCont,
        FrameType::Cancel,
        FrameType::Claim,
        FrameType::PingRequest,
        FrameType::PingResponse,
        FrameType::ErrorResponse,
    ];

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.code() == code)
    }

    /// Like [`FrameType::from_code`], failing with the switch error an
    /// unknown discriminant produces anywhere else.
    pub fn try_from_code(code: u8, offset: usize) -> Result<Self, RwError> {
        Self::from_code(code).ok_or(RwError::InvalidSwitchValue {
            value: code.into(),
            offset,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::InitRequest => "init-request",
            Self::InitResponse => "init-response",
            Self::CallRequest => "call-request",
            Self::CallResponse => "call-response",
            Self::CallRequestCont => "call-request-cont",
            Self::CallResponseCont => "call-response-cont",
            Self::Cancel => "cancel",
            Self::Claim => "claim",
            Self::PingRequest => "ping-request",
            Self::PingResponse => "ping-response",
            Self::ErrorResponse => "error-response",
        }
    }

    /// The four body types that carry flags and argument chunks.
    pub fn is_call(self) -> bool {
        matches!(
            self,
            Self::CallRequest | Self::CallResponse | Self::CallRequestCont | Self::CallResponseCont
        )
    }

    /// The continuation type that follows a fragmented frame of this type.
    pub fn continuation(self) -> Option<Self> {
        match self {
            Self::CallRequest | Self::CallRequestCont => Some(Self::CallRequestCont),
            Self::CallResponse | Self::CallResponseCont => Some(Self::CallResponseCont),
            _ => None,
        }
    }
}

impl fmt::Display for FrameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// CallResponse status code.
pub const RESPONSE_OK: u8 = 0x00;
pub const RESPONSE_APP_ERROR: u8 = 0x01;

/// ErrorResponse code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ErrorCode {
    Timeout = 0x01,
    Cancelled = 0x02,
    Busy = 0x03,
    Declined = 0x04,
    UnexpectedError = 0x05,
    BadRequest = 0x06,
    NetworkError = 0x07,
    Unhealthy = 0x08,
    ProtocolError = 0xff,
}

impl ErrorCode {
    pub const ALL: [ErrorCode; 9] = [
        ErrorCode::Timeout,
        ErrorCode::Cancelled,
        ErrorCode::Busy,
        ErrorCode::Declined,
        ErrorCode::UnexpectedError,
        ErrorCode::BadRequest,
        ErrorCode::NetworkError,
        ErrorCode::Unhealthy,
        ErrorCode::ProtocolError,
    ];

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.code() == code)
    }

    /// Short name, as used for the `type` stat tag.
    pub fn name(self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
            Self::Busy => "busy",
            Self::Declined => "declined",
            Self::UnexpectedError => "unexpected",
            Self::BadRequest => "bad-request",
            Self::NetworkError => "network",
            Self::Unhealthy => "unhealthy",
            Self::ProtocolError => "protocol",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
