use std::fmt;

use serde::Serialize;

/// Lifecycle of one outbound attempt, and of the response streaming back.
///
/// `Initial -> Streaming -> Done`, with `Error` reachable from either
/// non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum RequestState {
    #[default]
    Initial,
    Streaming,
    Done,
    Error,
}

impl RequestState {
    pub fn describe(self) -> &'static str {
        match self {
            Self::Initial => "Initial",
            Self::Streaming => "Streaming",
            Self::Done => "Done",
            Self::Error => "Error",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Error)
    }
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}
