//! Outbound call attempts over the v2 frame protocol.
//!
//! An [`OutRequest`] moves `Initial -> Streaming -> Done` as its CallRequest
//! and continuation frames are written, collects the response frames routed
//! to it, and finishes exactly once through its [`Completion`]. Finishing
//! emits per-attempt stats to the connection's [`StatSink`].
//!
//! [`Operations`] is the per-connection table of pending requests: it routes
//! response and error frames by id, expires requests past their deadline and
//! defers their timeout errors to the next tick.

pub mod channel;
pub mod clock;
pub mod completion;
pub mod error;
pub mod operations;
pub mod options;
pub mod out_request;
pub mod span;
pub mod state;
pub mod stats;

pub use channel::Channel;
pub use clock::{Clock, SystemClock};
#[cfg(any(test, feature = "test-util"))]
pub use clock::ManualClock;
pub use completion::{Completion, Outcome, Response};
pub use error::{RequestError, Result};
pub use operations::{Delivery, Operations, TickQueue};
pub use options::RequestOptions;
pub use out_request::{FrameSink, OutRequest, RequestLogInfo, OUT_REQUEST_TYPE};
pub use span::{Annotation, BinaryAnnotation, Span, CLIENT_SEND};
pub use state::RequestState;
pub use stats::{
    NullStats, Stat, StatKind, StatSink, StatTags, CALLS_SENT, CALLS_SUCCESS,
    PER_ATTEMPT_APP_ERRORS, PER_ATTEMPT_LATENCY, PER_ATTEMPT_OPERATIONAL_ERRORS,
    PER_ATTEMPT_SYSTEM_ERRORS,
};
#[cfg(any(test, feature = "test-util"))]
pub use stats::RecordingStats;
