//! buildevents-setup: provision the search cluster
//!
//! Waits for the cluster, then installs the index lifecycle policy, the
//! index template and the initial write index. Safe to run repeatedly.
//!
//! ## Configuration
//! - First argument: path to a YAML config file (optional)
//! - BUILDEVENTS_CONFIG: path to a YAML config file (optional)
//! - BUILDEVENTS__ELASTICSEARCH__URL: cluster URL (required)
//! - BUILDEVENTS_LOG: tracing filter (default: info)

use tracing::{error, info};

use buildevents::config::Config;
use buildevents::utils::bootstrap::init_tracing;
use buildevents::{ElasticsearchEventStore, EventStore, StoreError};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let path = std::env::args().nth(1);
    let config = Config::load(path.as_deref())?;

    let store = ElasticsearchEventStore::new(config.elasticsearch);
    if !store.is_configured() {
        error!("No cluster URL configured; set BUILDEVENTS__ELASTICSEARCH__URL");
        return Err(StoreError::Config("elasticsearch url not configured".to_string()).into());
    }

    store.setup().await?;
    info!(
        alias = %store.config().index_alias,
        index = %store.config().initial_index_name,
        "Cluster provisioned"
    );

    store.close().await?;
    Ok(())
}
