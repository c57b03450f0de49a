//! Abstract interfaces shared with the host CI system.
//!
//! These traits define the contracts for:
//! - Build event storage (the pluggable backend itself)
//! - Host-owned identities (builds, pipelines, teams)
//! - Events and the envelope they are decoded back into
//! - Opaque event keys used as read cursors

pub mod event;
pub mod event_key;
pub mod event_store;
pub mod host;

pub use event::{Envelope, Event, EventType, EventVersion};
pub use event_key::EventKey;
pub use event_store::{EventStore, Result, StoreError};
pub use host::{Build, Pipeline, Team};
