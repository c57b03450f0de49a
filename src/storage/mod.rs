//! Storage implementations.

use std::sync::Arc;

use tracing::info;

use crate::config::Config;
use crate::interfaces::{EventStore, Result};

pub mod elasticsearch;
pub mod mock;

pub use elasticsearch::ElasticsearchEventStore;
pub use mock::MockCluster;

/// Initialize the event store based on configuration.
///
/// Returns `None` when no cluster is configured, so the host can fall back
/// to another backend. Otherwise the store is set up before it is returned.
pub async fn init_storage(config: &Config) -> Result<Option<Arc<dyn EventStore>>> {
    let store = ElasticsearchEventStore::new(config.elasticsearch.clone());
    if !store.is_configured() {
        info!("Elasticsearch event store not configured");
        return Ok(None);
    }

    info!(url = %config.elasticsearch.url, "Event store: elasticsearch");
    store.setup().await?;

    Ok(Some(Arc::new(store)))
}
