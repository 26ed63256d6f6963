//! Call framing for TChannel-style RPC.
//!
//! # Crate Structure
//!
//! - [`rw`]: byte-length/write/read codec combinators
//! - [`frame`]: v2 frames, lazy frame views, fragmentation and checksums
//! - [`request`]: the outbound request state machine and pending-request table

/// Re-export codec combinators.
pub mod rw {
    pub use chanwire_rw::*;
}

/// Re-export frame types.
pub mod frame {
    pub use chanwire_frame::*;
}

/// Re-export outbound request types.
pub mod request {
    pub use chanwire_request::*;
}
