//! Events and the generic envelope they are read back as.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

/// Event type tag (e.g. `"log"`, `"finish-task"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventType(pub String);

impl EventType {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Event schema version (e.g. `"5.1"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventVersion(pub String);

impl EventVersion {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A build event produced by the host.
///
/// The payload is expected to carry a numeric `time` field (unix seconds);
/// the store orders events by it.
pub trait Event: Send + Sync {
    fn event_type(&self) -> EventType;
    fn version(&self) -> EventVersion;

    /// Serialize the event payload.
    fn payload(&self) -> serde_json::Result<Box<RawValue>>;
}

/// Generic shape of a stored event, decoded without knowing its type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub event: EventType,
    pub version: EventVersion,
    pub data: Box<RawValue>,
}

impl Envelope {
    /// Decode the payload into a concrete event type.
    pub fn decode<'a, T: Deserialize<'a>>(&'a self) -> serde_json::Result<T> {
        serde_json::from_str(self.data.get())
    }
}

impl Event for Envelope {
    fn event_type(&self) -> EventType {
        self.event.clone()
    }

    fn version(&self) -> EventVersion {
        self.version.clone()
    }

    fn payload(&self) -> serde_json::Result<Box<RawValue>> {
        Ok(self.data.clone())
    }
}
