//! Client-side tracing span for one outbound attempt.

use serde::Serialize;

use chanwire_frame::Tracing;

/// Client send marker.
pub const CLIENT_SEND: &str = "cs";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Annotation {
    pub value: &'static str,
    pub timestamp: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BinaryAnnotation {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Span {
    /// The endpoint, once arg1 is known.
    pub name: String,
    pub service: String,
    pub remote: String,
    #[serde(skip)]
    pub tracing: Tracing,
    annotations: Vec<Annotation>,
    binary_annotations: Vec<BinaryAnnotation>,
}

impl Span {
    pub fn new(tracing: Tracing, service: impl Into<String>, remote: impl Into<String>) -> Self {
        Self {
            name: String::new(),
            service: service.into(),
            remote: remote.into(),
            tracing,
            annotations: Vec::new(),
            binary_annotations: Vec::new(),
        }
    }

    pub fn annotate(&mut self, value: &'static str, timestamp: u64) {
        self.annotations.push(Annotation { value, timestamp });
    }

    pub fn annotate_binary(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.binary_annotations.push(BinaryAnnotation {
            key: key.into(),
            value: value.into(),
        });
    }

    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    pub fn binary_annotations(&self) -> &[BinaryAnnotation] {
        &self.binary_annotations
    }
}
