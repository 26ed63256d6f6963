/// Errors produced by length, write and read operations.
///
/// Codec errors never advance logical state: a failed read leaves the caller's
/// cursor where it was, and a failed write leaves the destination untouched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RwError {
    /// Fewer bytes remain than the codec requires.
    #[error("short buffer at offset {offset}: need {expected} bytes, {actual} remain")]
    ShortBuffer {
        expected: usize,
        actual: usize,
        offset: usize,
    },

    /// A numeric value lies outside the codec's declared bounds.
    #[error("value {value} out of range [{min}, {max}]")]
    Range {
        value: i128,
        min: i128,
        max: i128,
        offset: usize,
    },

    /// A discriminant has no registered case.
    #[error("invalid switch value {value}")]
    InvalidSwitchValue { value: i128, offset: usize },

    /// A required field is absent at encode time.
    #[error("missing field {field} on {structure}")]
    MissingStructField {
        structure: &'static str,
        field: &'static str,
    },

    /// Encoded content is malformed (bad UTF-8, unknown enumeration value, ...).
    #[error("invalid value at offset {offset}: {reason}")]
    InvalidValue { reason: String, offset: usize },

    /// A field accessor was used against a shape that does not carry it.
    #[error("field {field} not present on {structure}")]
    NoSuchField {
        structure: &'static str,
        field: &'static str,
    },
}

impl RwError {
    /// Build a short-buffer error for `offset` in a buffer of `len` bytes.
    pub fn short(expected: usize, len: usize, offset: usize) -> Self {
        Self::ShortBuffer {
            expected,
            actual: len.saturating_sub(offset),
            offset,
        }
    }

    pub fn invalid(reason: impl Into<String>, offset: usize) -> Self {
        Self::InvalidValue {
            reason: reason.into(),
            offset,
        }
    }

    /// Buffer position the error relates to, when there is one.
    pub fn offset(&self) -> Option<usize> {
        match self {
            Self::ShortBuffer { offset, .. }
            | Self::Range { offset, .. }
            | Self::InvalidSwitchValue { offset, .. }
            | Self::InvalidValue { offset, .. } => Some(*offset),
            Self::MissingStructField { .. } | Self::NoSuchField { .. } => None,
        }
    }

    /// True for errors that more input could cure.
    pub fn is_short_buffer(&self) -> bool {
        matches!(self, Self::ShortBuffer { .. })
    }
}

pub type Result<T> = std::result::Result<T, RwError>;
