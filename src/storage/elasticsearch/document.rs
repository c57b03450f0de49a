//! Stored event document.

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use super::Key;
use crate::interfaces::{Build, EventType, EventVersion};

/// One stored event, with the identity of its build flattened in so reads
/// and deletes filter on a single document.
#[derive(Debug, Serialize, Deserialize)]
pub struct EventDocument {
    pub build_id: i64,
    pub build_name: String,
    pub job_id: i64,
    pub job_name: String,
    pub pipeline_id: i64,
    pub pipeline_name: String,
    pub team_id: i64,
    pub team_name: String,
    #[serde(rename = "event")]
    pub event_type: EventType,
    pub version: EventVersion,
    pub data: Box<RawValue>,
    pub tiebreak: i64,
}

impl EventDocument {
    pub fn new(
        build: &dyn Build,
        event_type: EventType,
        version: EventVersion,
        data: Box<RawValue>,
        tiebreak: i64,
    ) -> Self {
        Self {
            build_id: build.id(),
            build_name: build.name().to_string(),
            job_id: build.job_id(),
            job_name: build.job_name().to_string(),
            pipeline_id: build.pipeline_id(),
            pipeline_name: build.pipeline_name().to_string(),
            team_id: build.team_id(),
            team_name: build.team_name().to_string(),
            event_type,
            version,
            data,
            tiebreak,
        }
    }

    /// Key of this document, derived from the payload's `time` field.
    pub fn key(&self) -> serde_json::Result<Key> {
        let payload: TimedPayload = serde_json::from_str(self.data.get())?;
        Ok(Key::new(payload.time_millis(), self.tiebreak))
    }
}

/// The only payload field the store reads: unix seconds.
#[derive(Debug, Deserialize)]
struct TimedPayload {
    time: i64,
}

impl TimedPayload {
    fn time_millis(&self) -> i64 {
        self.time.saturating_mul(1000)
    }
}
