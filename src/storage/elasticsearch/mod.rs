//! Search cluster (Elasticsearch) event store.
//!
//! Events of every build live in one logical, append-only collection: a
//! write alias over rolled-over indices named by a pattern. Rollover is
//! handled by the cluster's lifecycle policy; queries always target the
//! alias, never a concrete index.
//!
//! ## Document
//! - `build_id`, `build_name`, `job_id`, `job_name`, `pipeline_id`,
//!   `pipeline_name`, `team_id`, `team_name`: denormalized identity
//! - `event`, `version`: event type tag and schema version
//! - `data`: the event payload as produced by the host
//! - `tiebreak`: per-process counter ordering events within one second
//!
//! ## Ordering
//! Events sort by `data.time` (mapped as `epoch_second`, so sort values are
//! milliseconds) then `tiebreak`. `Key` is exactly that sort tuple, which
//! lets a cursor feed straight into `search_after`.

mod document;
mod event_store;
mod key;
pub mod schema;

pub use document::EventDocument;
pub use event_store::{ElasticsearchEventStore, MAX_PAGE_SIZE};
pub use key::{Key, BACKEND};

use std::time::Duration;

use serde::Deserialize;

/// Elasticsearch event store configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ElasticsearchConfig {
    /// Cluster URL. Empty means the backend is not configured.
    pub url: String,
    /// How long `setup` waits for the cluster to answer.
    pub healthcheck_timeout_secs: u64,
    /// Deadline for each cluster call.
    pub request_timeout_secs: u64,
    /// Write alias all reads and writes target.
    pub index_alias: String,
    /// Pattern matching every index behind the alias.
    pub index_pattern: String,
    /// Index lifecycle policy name.
    pub ilm_policy_name: String,
    /// Index template name.
    pub index_template_name: String,
    /// First concrete index, created behind the alias on first boot.
    pub initial_index_name: String,
}

impl Default for ElasticsearchConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            healthcheck_timeout_secs: 60,
            request_timeout_secs: 30,
            index_alias: "build-events".to_string(),
            index_pattern: "build-events-*".to_string(),
            ilm_policy_name: "build-events-ilm-policy".to_string(),
            index_template_name: "build-events-template".to_string(),
            initial_index_name: "build-events-000001".to_string(),
        }
    }
}

impl ElasticsearchConfig {
    /// Set the cluster URL.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Use `prefix` for the alias, pattern, policy, template and initial index.
    pub fn with_index_prefix(mut self, prefix: &str) -> Self {
        self.index_alias = prefix.to_string();
        self.index_pattern = format!("{}-*", prefix);
        self.ilm_policy_name = format!("{}-ilm-policy", prefix);
        self.index_template_name = format!("{}-template", prefix);
        self.initial_index_name = format!("{}-000001", prefix);
        self
    }

    pub fn healthcheck_timeout(&self) -> Duration {
        Duration::from_secs(self.healthcheck_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
