//! Test utilities and host fixtures.
//!
//! Minimal implementations of the host's build, pipeline, team and event
//! capabilities, for testing stores without a CI system.

use serde::{Deserialize, Serialize};
use serde_json::value::{to_raw_value, RawValue};

use crate::interfaces::{Build, Envelope, Event, EventType, EventVersion, Pipeline, Team};

/// Build fixture.
#[derive(Debug, Clone)]
pub struct TestBuild {
    pub id: i64,
    pub name: String,
    pub job_id: i64,
    pub job_name: String,
    pub pipeline_id: i64,
    pub pipeline_name: String,
    pub team_id: i64,
    pub team_name: String,
}

impl TestBuild {
    /// Build `id` of job 1 in pipeline 1 of team 1.
    pub fn new(id: i64) -> Self {
        Self {
            id,
            name: id.to_string(),
            job_id: 1,
            job_name: "unit".to_string(),
            pipeline_id: 1,
            pipeline_name: "main".to_string(),
            team_id: 1,
            team_name: "core".to_string(),
        }
    }

    pub fn in_pipeline(mut self, pipeline_id: i64) -> Self {
        self.pipeline_id = pipeline_id;
        self.pipeline_name = format!("pipeline-{}", pipeline_id);
        self
    }

    pub fn in_team(mut self, team_id: i64) -> Self {
        self.team_id = team_id;
        self.team_name = format!("team-{}", team_id);
        self
    }
}

impl Build for TestBuild {
    fn id(&self) -> i64 {
        self.id
    }
    fn name(&self) -> &str {
        &self.name
    }
    fn job_id(&self) -> i64 {
        self.job_id
    }
    fn job_name(&self) -> &str {
        &self.job_name
    }
    fn pipeline_id(&self) -> i64 {
        self.pipeline_id
    }
    fn pipeline_name(&self) -> &str {
        &self.pipeline_name
    }
    fn team_id(&self) -> i64 {
        self.team_id
    }
    fn team_name(&self) -> &str {
        &self.team_name
    }
}

/// Pipeline fixture.
#[derive(Debug, Clone)]
pub struct TestPipeline {
    pub id: i64,
    pub name: String,
}

impl TestPipeline {
    pub fn new(id: i64) -> Self {
        Self {
            id,
            name: format!("pipeline-{}", id),
        }
    }
}

impl Pipeline for TestPipeline {
    fn id(&self) -> i64 {
        self.id
    }
    fn name(&self) -> &str {
        &self.name
    }
}

/// Team fixture.
#[derive(Debug, Clone)]
pub struct TestTeam {
    pub id: i64,
    pub name: String,
}

impl TestTeam {
    pub fn new(id: i64) -> Self {
        Self {
            id,
            name: format!("team-{}", id),
        }
    }
}

impl Team for TestTeam {
    fn id(&self) -> i64 {
        self.id
    }
    fn name(&self) -> &str {
        &self.name
    }
}

/// A build log line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEvent {
    pub time: i64,
    pub payload: String,
}

impl LogEvent {
    pub fn new(time: i64, payload: impl Into<String>) -> Self {
        Self {
            time,
            payload: payload.into(),
        }
    }
}

impl Event for LogEvent {
    fn event_type(&self) -> EventType {
        EventType::new("log")
    }

    fn version(&self) -> EventVersion {
        EventVersion::new("5.1")
    }

    fn payload(&self) -> serde_json::Result<Box<RawValue>> {
        to_raw_value(self)
    }
}

/// An event whose payload carries no `time` field.
#[derive(Debug, Clone, Serialize)]
pub struct UntimedEvent {
    pub message: String,
}

impl Event for UntimedEvent {
    fn event_type(&self) -> EventType {
        EventType::new("error")
    }

    fn version(&self) -> EventVersion {
        EventVersion::new("4.1")
    }

    fn payload(&self) -> serde_json::Result<Box<RawValue>> {
        to_raw_value(self)
    }
}

/// Log events `0..count`, all at `time`, with payload `"line-<i>"`.
pub fn make_logs(time: i64, count: usize) -> Vec<LogEvent> {
    (0..count)
        .map(|i| LogEvent::new(time, format!("line-{}", i)))
        .collect()
}

/// Borrow a slice of events as trait objects.
pub fn as_events<E: Event>(events: &[E]) -> Vec<&dyn Event> {
    events.iter().map(|e| e as &dyn Event).collect()
}

/// Decode envelopes read back from a store into log events.
pub fn decode_logs(envelopes: &[Envelope]) -> Vec<LogEvent> {
    envelopes
        .iter()
        .map(|e| e.decode().expect("envelope should hold a log event"))
        .collect()
}
