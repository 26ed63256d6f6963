use std::fmt;
use std::io;

use chanwire_frame::FrameError;
use chanwire_request::RequestError;

// Process exit codes; USAGE matches sysexits EX_USAGE.
pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::NotFound => FAILURE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Io(source) => io_error(context, source),
        FrameError::Rw(_)
        | FrameError::FrameTooLarge { .. }
        | FrameError::ChecksumMismatch { .. }
        | FrameError::UnexpectedFrame { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        FrameError::UnsupportedChecksum(_) => CliError::new(USAGE, format!("{context}: {err}")),
        FrameError::ConnectionClosed => CliError::new(FAILURE, format!("{context}: {err}")),
    }
}

pub fn request_error(context: &str, err: RequestError) -> CliError {
    match err {
        RequestError::Frame(_) => CliError::new(DATA_INVALID, format!("{context}: {err}")),
        RequestError::FrameState { .. } | RequestError::AlreadyDone { .. } => {
            CliError::new(INTERNAL, format!("{context}: {err}"))
        }
        other => CliError::new(FAILURE, format!("{context}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chanwire_frame::ChecksumType;

    #[test]
    fn frame_errors_map_to_exit_codes() {
        let err = frame_error("read", FrameError::ConnectionClosed);
        assert_eq!(err.code, FAILURE);
        assert!(err.message.starts_with("read: "));

        let err = frame_error("encode", FrameError::UnsupportedChecksum(ChecksumType::Farm32));
        assert_eq!(err.code, USAGE);

        let err = frame_error(
            "read",
            FrameError::Io(io::Error::new(io::ErrorKind::PermissionDenied, "no")),
        );
        assert_eq!(err.code, PERMISSION_DENIED);
    }

    #[test]
    fn request_errors_map_to_exit_codes() {
        let err = request_error("send", RequestError::Frame("too big".into()));
        assert_eq!(err.code, DATA_INVALID);
        let err = request_error(
            "send",
            RequestError::Drained {
                reason: "closing".into(),
            },
        );
        assert_eq!(err.code, FAILURE);
    }
}
