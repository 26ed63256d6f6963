use chanwire_frame::{ErrorCode, FrameError};

use crate::state::RequestState;

/// Errors delivered through an outbound request's completion.
///
/// Every variant is `Clone` so the same error can be handed to the caller of
/// the failing operation and to the request's waiters.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RequestError {
    /// An operation was attempted from a state that forbids it.
    #[error("cannot send {attempted} in {state} state")]
    FrameState {
        attempted: &'static str,
        state: RequestState,
    },

    /// A send was attempted after the request finished sending.
    #[error("cannot send {attempted}, request already done")]
    AlreadyDone { attempted: &'static str },

    /// The owning connection is draining.
    #[error("request drained: {reason}")]
    Drained { reason: String },

    /// No terminal response arrived before the deadline.
    #[error(
        "request {id} timed out after {elapsed_ms}ms (timeout {timeout_ms}ms, remote {remote_addr})"
    )]
    Timeout {
        id: u32,
        start_ms: u64,
        elapsed_ms: u64,
        timeout_ms: u64,
        logical: bool,
        remote_addr: String,
    },

    /// The remote answered with an ErrorResponse frame.
    #[error("{code} error from remote: {message}")]
    ErrorFrame { code: ErrorCode, message: String },

    /// Frames could not be built, written or reassembled locally.
    #[error("frame error: {0}")]
    Frame(String),
}

impl RequestError {
    /// Stable type string, used as the operational error stat tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::FrameState { .. } => "tchannel.request-frame-state",
            Self::AlreadyDone { .. } => "tchannel.request-already-done",
            Self::Drained { .. } => "tchannel.request.drained",
            Self::Timeout { .. } => "tchannel.request.timeout",
            Self::ErrorFrame { .. } => "tchannel.error-frame",
            Self::Frame(_) => "tchannel.frame",
        }
    }

    /// Error code of a remote ErrorResponse.
    pub fn error_code(&self) -> Option<ErrorCode> {
        match self {
            Self::ErrorFrame { code, .. } => Some(*code),
            _ => None,
        }
    }

    pub fn is_error_frame(&self) -> bool {
        matches!(self, Self::ErrorFrame { .. })
    }
}

impl From<FrameError> for RequestError {
    fn from(err: FrameError) -> Self {
        Self::Frame(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RequestError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_and_messages() {
        let err = RequestError::FrameState {
            attempted: "call request",
            state: RequestState::Streaming,
        };
        assert_eq!(err.kind(), "tchannel.request-frame-state");
        assert_eq!(err.to_string(), "cannot send call request in Streaming state");

        let err = RequestError::ErrorFrame {
            code: ErrorCode::Busy,
            message: "try later".into(),
        };
        assert!(err.is_error_frame());
        assert_eq!(err.error_code(), Some(ErrorCode::Busy));
        assert_eq!(err.to_string(), "busy error from remote: try later");
    }

    #[test]
    fn frame_errors_become_messages() {
        let err: RequestError = FrameError::ConnectionClosed.into();
        assert_eq!(err.kind(), "tchannel.frame");
        assert!(matches!(err, RequestError::Frame(msg) if msg.contains("connection closed")));
    }
}
