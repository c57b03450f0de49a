//! Document field names and provisioning bodies.
//!
//! The policy, template and initial index bodies are sent once per `setup`;
//! all three are safe to resend.

use serde_json::{json, Value};

use super::ElasticsearchConfig;

pub const BUILD_ID: &str = "build_id";
pub const PIPELINE_ID: &str = "pipeline_id";
pub const TEAM_ID: &str = "team_id";
pub const TIEBREAK: &str = "tiebreak";
/// Event timestamp inside the payload, in unix seconds.
pub const TIME: &str = "data.time";

/// Lifecycle policy: roll the write index over by size or age.
pub fn ilm_policy() -> Value {
    json!({
        "policy": {
            "phases": {
                "hot": {
                    "actions": {
                        "rollover": {
                            "max_size": "50gb",
                            "max_age": "30d"
                        }
                    }
                }
            }
        }
    })
}

/// Template every index behind the alias inherits.
pub fn index_template(config: &ElasticsearchConfig) -> Value {
    json!({
        "index_patterns": [config.index_pattern],
        "settings": {
            "index.lifecycle.name": config.ilm_policy_name,
            "index.lifecycle.rollover_alias": config.index_alias
        },
        "mappings": {
            "dynamic": false,
            "properties": {
                "build_id": { "type": "long" },
                "build_name": { "type": "keyword" },
                "job_id": { "type": "long" },
                "job_name": { "type": "keyword" },
                "pipeline_id": { "type": "long" },
                "pipeline_name": { "type": "keyword" },
                "team_id": { "type": "long" },
                "team_name": { "type": "keyword" },
                "event": { "type": "keyword" },
                "version": { "type": "keyword" },
                "tiebreak": { "type": "long" },
                "data": {
                    "dynamic": false,
                    "properties": {
                        "time": { "type": "date", "format": "epoch_second" }
                    }
                }
            }
        }
    })
}

/// First concrete index, registered as the alias's write index.
pub fn initial_index(config: &ElasticsearchConfig) -> Value {
    let mut aliases = serde_json::Map::new();
    aliases.insert(
        config.index_alias.clone(),
        json!({ "is_write_index": true }),
    );
    json!({ "aliases": aliases })
}
