//! Build event storage interface.

use std::time::Duration;

use async_trait::async_trait;

use super::{Build, Envelope, Event, EventKey, Pipeline, Team};
use crate::transport::TransportError;

/// Result type for event store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur during event store operations.
///
/// `op` names the operation that failed (e.g. `"bulk put"`), so the
/// rendered message reads `"bulk put: <cause>"`.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{op}: {source}")]
    Cluster {
        op: &'static str,
        #[source]
        source: TransportError,
    },

    #[error("{op}: {source}")]
    Serialization {
        op: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// The batch was written, but the key of its last event could not be
    /// derived. Callers must not retry the write.
    #[error("events written but key unknown: {source}")]
    KeyUnknown {
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid key type (expected {expected}, got {actual})")]
    KeyType {
        expected: &'static str,
        actual: String,
    },

    #[error("{op}: timed out after {timeout:?}")]
    Timeout { op: &'static str, timeout: Duration },

    #[error("event store is not set up")]
    NotSetUp,

    #[error("configuration error: {0}")]
    Config(String),
}

impl StoreError {
    /// True when the failed call may still have persisted its events.
    pub fn is_written(&self) -> bool {
        matches!(self, StoreError::KeyUnknown { .. })
    }
}

/// Interface for build event persistence.
///
/// Events are an append-only stream per build. Readers page through a
/// build's stream with an opaque cursor (`EventKey`) that only ever moves
/// forward to the last event actually returned.
///
/// Implementations:
/// - `ElasticsearchEventStore`: search cluster storage
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Whether enough configuration was supplied to activate this backend.
    fn is_configured(&self) -> bool;

    /// Connect and provision whatever the backend needs. Idempotent.
    async fn setup(&self) -> Result<()>;

    /// Release the underlying connection.
    async fn close(&self) -> Result<()>;

    /// Per-build setup hook, called when a build starts.
    async fn initialize(&self, build: &dyn Build) -> Result<()>;

    /// Per-build teardown hook, called when a build finishes.
    async fn finalize(&self, build: &dyn Build) -> Result<()>;

    /// Append events to a build's stream as one batch.
    ///
    /// Returns the key of the last event written, or `None` when `events`
    /// is empty.
    async fn put(
        &self,
        build: &dyn Build,
        events: &[&dyn Event],
    ) -> Result<Option<Box<dyn EventKey>>>;

    /// Read up to `requested` events after `cursor`, in append order.
    ///
    /// On a non-empty page the cursor is replaced with the key of the last
    /// returned event. An empty page leaves it untouched. Backends may cap
    /// `requested` at their own page limit; a short page does not mean the
    /// stream is exhausted.
    async fn get(
        &self,
        build: &dyn Build,
        requested: usize,
        cursor: &mut Option<Box<dyn EventKey>>,
    ) -> Result<Vec<Envelope>>;

    /// Submit deletion of all events of the given builds.
    async fn delete(&self, builds: &[&dyn Build]) -> Result<()>;

    /// Submit deletion of all events of a pipeline.
    async fn delete_pipeline(&self, pipeline: &dyn Pipeline) -> Result<()>;

    /// Submit deletion of all events of a team.
    async fn delete_team(&self, team: &dyn Team) -> Result<()>;

    /// Reconstruct a key from its persisted byte form.
    fn unmarshal_key(&self, data: &[u8]) -> Result<Box<dyn EventKey>>;
}
