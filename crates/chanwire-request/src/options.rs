use std::time::Duration;

use chanwire_frame::{ChecksumType, Headers, Tracing, ARG_SCHEME, CALLER_NAME, MAX_FRAME_SIZE};

/// Per-attempt settings for an outbound request.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestOptions {
    /// Service being called.
    pub service: String,
    /// Transport headers. The caller name lives here under `cn`.
    pub headers: Headers,
    /// Deadline for a terminal response, also sent as the TTL.
    pub timeout: Duration,
    /// Zero for the first attempt of a call.
    pub retry_count: u32,
    pub checksum_type: ChecksumType,
    pub tracing: Option<Tracing>,
    /// Record a span for this attempt.
    pub trace: bool,
    pub remote_addr: String,
    /// Logical requests wrap retries; only non-logical attempts feed the
    /// sent and success counters.
    pub logical: bool,
    pub max_frame_size: usize,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            service: String::new(),
            headers: Headers::new(),
            timeout: Duration::from_secs(1),
            retry_count: 0,
            checksum_type: ChecksumType::Crc32,
            tracing: None,
            trace: false,
            remote_addr: String::new(),
            logical: false,
            max_frame_size: MAX_FRAME_SIZE,
        }
    }
}

impl RequestOptions {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            ..Self::default()
        }
    }

    pub fn caller_name(mut self, name: impl Into<String>) -> Self {
        self.headers.insert(CALLER_NAME, name.into());
        self
    }

    pub fn arg_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.headers.insert(ARG_SCHEME, scheme.into());
        self
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key, value);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn remote_addr(mut self, addr: impl Into<String>) -> Self {
        self.remote_addr = addr.into();
        self
    }

    pub fn retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count;
        self
    }

    pub fn logical(mut self, logical: bool) -> Self {
        self.logical = logical;
        self
    }

    pub fn checksum_type(mut self, kind: ChecksumType) -> Self {
        self.checksum_type = kind;
        self
    }

    pub fn tracing(mut self, tracing: Tracing) -> Self {
        self.tracing = Some(tracing);
        self
    }

    pub fn trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }

    pub fn max_frame_size(mut self, size: usize) -> Self {
        self.max_frame_size = size;
        self
    }

    pub fn caller(&self) -> &str {
        self.headers.get(CALLER_NAME).unwrap_or("")
    }

    pub fn timeout_ms(&self) -> u64 {
        u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX)
    }

    /// TTL field of the CallRequest, saturating at the field width.
    pub fn ttl(&self) -> u32 {
        u32::try_from(self.timeout_ms()).unwrap_or(u32::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_headers() {
        let opts = RequestOptions::new("castle")
            .caller_name("mario")
            .arg_scheme("raw")
            .timeout(Duration::from_millis(250));
        assert_eq!(opts.caller(), "mario");
        assert_eq!(opts.headers.get("as"), Some("raw"));
        assert_eq!(opts.ttl(), 250);
        assert_eq!(opts.max_frame_size, MAX_FRAME_SIZE);
    }

    #[test]
    fn ttl_saturates() {
        let opts = RequestOptions::new("x").timeout(Duration::from_secs(u64::from(u32::MAX)));
        assert_eq!(opts.ttl(), u32::MAX);
        assert_eq!(RequestOptions::default().caller(), "");
    }
}
