//! buildevents - build event storage for CI systems
//!
//! A pluggable backend that stores the append-only event stream of every
//! build in a search cluster and pages it back to readers in strict order,
//! using an opaque `(time, tiebreak)` cursor.

pub mod config;
pub mod interfaces;
pub mod storage;
pub mod transport;
pub mod utils;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use interfaces::{EventKey, EventStore, StoreError};
pub use storage::elasticsearch::{ElasticsearchConfig, ElasticsearchEventStore, Key};
