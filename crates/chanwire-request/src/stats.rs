//! Outbound call stats: names, tag sets and the sink they are emitted to.

#[cfg(any(test, feature = "test-util"))]
use std::sync::{Mutex, PoisonError};

use serde::Serialize;

pub const CALLS_SENT: &str = "tchannel.outbound.calls.sent";
pub const CALLS_SUCCESS: &str = "tchannel.outbound.calls.success";
pub const PER_ATTEMPT_LATENCY: &str = "tchannel.outbound.calls.per-attempt-latency";
pub const PER_ATTEMPT_APP_ERRORS: &str = "tchannel.outbound.calls.per-attempt.app-errors";
pub const PER_ATTEMPT_SYSTEM_ERRORS: &str = "tchannel.outbound.calls.per-attempt.system-errors";
pub const PER_ATTEMPT_OPERATIONAL_ERRORS: &str =
    "tchannel.outbound.calls.per-attempt.operational-errors";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatKind {
    Counter,
    Timing,
}

/// Which tag values make it into the flat stat key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum KeyShape {
    #[default]
    Endpoint,
    Typed,
    Attempt,
    TypedAttempt,
}

/// Tags carried by every outbound call stat.
///
/// `service` is the calling service (the `cn` header); `target_service` is
/// the service being called.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatTags {
    pub app: String,
    pub host: String,
    pub cluster: String,
    pub version: String,
    pub target_service: String,
    pub service: String,
    pub target_endpoint: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_count: Option<u32>,
    #[serde(skip)]
    shape: KeyShape,
}

impl StatTags {
    fn base(target_service: &str, caller: &str, endpoint: &str, shape: KeyShape) -> Self {
        Self {
            target_service: target_service.to_string(),
            service: caller.to_string(),
            target_endpoint: endpoint.to_string(),
            shape,
            ..Self::default()
        }
    }

    pub fn sent(target_service: &str, caller: &str, endpoint: &str) -> Self {
        Self::base(target_service, caller, endpoint, KeyShape::Endpoint)
    }

    pub fn success(target_service: &str, caller: &str, endpoint: &str) -> Self {
        Self::base(target_service, caller, endpoint, KeyShape::Endpoint)
    }

    pub fn per_attempt_latency(
        target_service: &str,
        caller: &str,
        endpoint: &str,
        peer: &str,
        retry_count: u32,
    ) -> Self {
        Self {
            peer: Some(peer.to_string()),
            retry_count: Some(retry_count),
            ..Self::base(target_service, caller, endpoint, KeyShape::Attempt)
        }
    }

    pub fn system_error(
        target_service: &str,
        caller: &str,
        endpoint: &str,
        code_name: &str,
        retry_count: u32,
    ) -> Self {
        Self {
            error_type: Some(code_name.to_string()),
            retry_count: Some(retry_count),
            ..Self::base(target_service, caller, endpoint, KeyShape::Typed)
        }
    }

    pub fn app_error(
        target_service: &str,
        caller: &str,
        endpoint: &str,
        error_type: &str,
        retry_count: u32,
    ) -> Self {
        Self {
            error_type: Some(error_type.to_string()),
            retry_count: Some(retry_count),
            ..Self::base(target_service, caller, endpoint, KeyShape::TypedAttempt)
        }
    }

    pub fn operational_error(
        target_service: &str,
        caller: &str,
        endpoint: &str,
        error_type: &str,
        retry_count: u32,
    ) -> Self {
        Self {
            error_type: Some(error_type.to_string()),
            retry_count: Some(retry_count),
            ..Self::base(target_service, caller, endpoint, KeyShape::TypedAttempt)
        }
    }

    /// Flat statsd-style key:
    /// `prefix.service.target-service.endpoint[.type][.retry-count]`.
    pub fn to_stat_key(&self, prefix: &str) -> String {
        let mut key = format!(
            "{prefix}.{}.{}.{}",
            clean(&self.service, "no-service"),
            clean(&self.target_service, "no-target-service"),
            clean(&self.target_endpoint, "no-endpoint"),
        );
        if matches!(self.shape, KeyShape::Typed | KeyShape::TypedAttempt) {
            key.push('.');
            key.push_str(&clean(self.error_type.as_deref().unwrap_or(""), "no-type"));
        }
        if matches!(self.shape, KeyShape::Attempt | KeyShape::TypedAttempt) {
            key.push('.');
            key.push_str(&self.retry_count.unwrap_or(0).to_string());
        }
        key
    }
}

/// Make a value safe for one key segment: empty becomes `default`, anything
/// outside `[A-Za-z0-9_-]` becomes `-`.
pub fn clean(value: &str, default: &str) -> String {
    if value.is_empty() {
        return default.to_string();
    }
    value
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '-'
            }
        })
        .collect()
}

/// One emitted stat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Stat {
    pub name: String,
    pub kind: StatKind,
    pub value: u64,
    pub tags: StatTags,
}

impl Stat {
    pub fn key(&self) -> String {
        self.tags.to_stat_key(&self.name)
    }
}

/// Receiver for stats. Storage and export are up to the implementation.
pub trait StatSink: Send + Sync {
    fn emit(&self, name: &str, kind: StatKind, value: u64, tags: StatTags);
}

/// Drops every stat.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullStats;

impl StatSink for NullStats {
    fn emit(&self, _name: &str, _kind: StatKind, _value: u64, _tags: StatTags) {}
}

/// Keeps every stat in memory, in emission order.
#[cfg(any(test, feature = "test-util"))]
#[derive(Debug, Default)]
pub struct RecordingStats {
    stats: Mutex<Vec<Stat>>,
}

#[cfg(any(test, feature = "test-util"))]
impl RecordingStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> Vec<Stat> {
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn names(&self) -> Vec<String> {
        self.stats().into_iter().map(|s| s.name).collect()
    }

    pub fn take(&self) -> Vec<Stat> {
        std::mem::take(&mut *self.stats.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

#[cfg(any(test, feature = "test-util"))]
impl StatSink for RecordingStats {
    fn emit(&self, name: &str, kind: StatKind, value: u64, tags: StatTags) {
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Stat {
                name: name.to_string(),
                kind,
                value,
                tags,
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_shapes() {
        let tags = StatTags::success("castle", "mario", "door");
        assert_eq!(
            tags.to_stat_key(CALLS_SUCCESS),
            "tchannel.outbound.calls.success.mario.castle.door"
        );

        let tags = StatTags::system_error("castle", "mario", "door", "busy", 2);
        assert_eq!(
            tags.to_stat_key(PER_ATTEMPT_SYSTEM_ERRORS),
            "tchannel.outbound.calls.per-attempt.system-errors.mario.castle.door.busy"
        );

        let tags = StatTags::operational_error("castle", "", "", "tchannel.request.timeout", 1);
        assert_eq!(
            tags.to_stat_key("p"),
            "p.no-service.castle.no-endpoint.tchannel-request-timeout.1"
        );

        let tags =
            StatTags::per_attempt_latency("castle", "mario", "open door", "10.0.0.1:4040", 0);
        assert_eq!(tags.to_stat_key("lat"), "lat.mario.castle.open-door.0");
    }

    #[test]
    fn tags_serialize_like_the_wire_names() {
        let tags = StatTags::app_error("castle", "mario", "door", "unknown", 3);
        let json = serde_json::to_value(&tags).unwrap();
        assert_eq!(json["targetService"], "castle");
        assert_eq!(json["service"], "mario");
        assert_eq!(json["targetEndpoint"], "door");
        assert_eq!(json["type"], "unknown");
        assert_eq!(json["retryCount"], 3);
        assert_eq!(json["app"], "");
        assert!(json.get("peer").is_none());
        assert!(json.get("shape").is_none());
    }

    #[test]
    fn recording_sink_keeps_order() {
        let sink = RecordingStats::new();
        sink.emit(CALLS_SENT, StatKind::Counter, 1, StatTags::sent("a", "b", "c"));
        sink.emit(PER_ATTEMPT_LATENCY, StatKind::Timing, 12, StatTags::default());
        assert_eq!(sink.names(), vec![CALLS_SENT, PER_ATTEMPT_LATENCY]);
        let taken = sink.take();
        assert_eq!(taken[1].value, 12);
        assert_eq!(taken[0].key(), "tchannel.outbound.calls.sent.b.a.c");
        assert!(sink.stats().is_empty());
    }

    #[test]
    fn clean_rules() {
        assert_eq!(clean("", "dflt"), "dflt");
        assert_eq!(clean("a.b:c/d", "x"), "a-b-c-d");
        assert_eq!(clean("ok_name-1", "x"), "ok_name-1");
    }
}
