//! Elasticsearch EventStore implementation.
//!
//! Writes go through one bulk request per `put`. Reads page through a
//! build's events sorted by `(data.time, tiebreak)` and resume with
//! `search_after` from the caller's cursor.

use std::future::Future;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::value::to_raw_value;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use super::document::EventDocument;
use super::{schema, ElasticsearchConfig, Key};
use crate::interfaces::{
    Build, Envelope, Event, EventKey, EventStore, Pipeline, Result, StoreError, Team,
};
use crate::transport::{
    HttpTransport, Query, SearchRequest, SearchTransport, SortField, TransportError,
};
use crate::utils::bootstrap::wait_for_cluster;

/// Largest page a single search may return (the cluster's default
/// `index.max_result_window`).
pub const MAX_PAGE_SIZE: usize = 10_000;

/// Elasticsearch event store.
///
/// Events are totally ordered within a build by `(time, tiebreak)`. The
/// tiebreak is an in-memory counter: unique and increasing for the life of
/// this process only. After a restart it starts over, so events appended
/// in the same second on both sides of the restart may tie or invert.
pub struct ElasticsearchEventStore {
    config: ElasticsearchConfig,
    transport: RwLock<Option<Arc<dyn SearchTransport>>>,
    request_timeout: Duration,
    counter: AtomicI64,
}

impl ElasticsearchEventStore {
    /// Create a store for the configured cluster.
    ///
    /// Nothing is contacted until `setup`.
    pub fn new(config: ElasticsearchConfig) -> Self {
        let request_timeout = config.request_timeout();
        Self {
            config,
            transport: RwLock::new(None),
            request_timeout,
            counter: AtomicI64::new(0),
        }
    }

    /// Create a store over an existing transport.
    pub fn with_transport(
        config: ElasticsearchConfig,
        transport: Arc<dyn SearchTransport>,
    ) -> Self {
        let request_timeout = config.request_timeout();
        Self {
            config,
            transport: RwLock::new(Some(transport)),
            request_timeout,
            counter: AtomicI64::new(0),
        }
    }

    /// Override the per-call deadline.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn config(&self) -> &ElasticsearchConfig {
        &self.config
    }

    fn next_tiebreak(&self) -> i64 {
        self.counter.fetch_add(1, Ordering::Relaxed) + 1
    }

    async fn transport(&self) -> Result<Arc<dyn SearchTransport>> {
        self.transport
            .read()
            .await
            .clone()
            .ok_or(StoreError::NotSetUp)
    }

    /// Reuse the current transport, or open one to the configured URL.
    async fn connect(&self) -> Result<Arc<dyn SearchTransport>> {
        let mut slot = self.transport.write().await;
        if let Some(transport) = slot.as_ref() {
            return Ok(Arc::clone(transport));
        }

        let transport: Arc<dyn SearchTransport> = Arc::new(
            HttpTransport::new(&self.config.url, self.request_timeout).map_err(|source| {
                StoreError::Cluster {
                    op: "connect to cluster",
                    source,
                }
            })?,
        );
        *slot = Some(Arc::clone(&transport));
        Ok(transport)
    }

    /// Run one cluster call under the request deadline.
    async fn call<T, F>(&self, op: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, TransportError>>,
    {
        match tokio::time::timeout(self.request_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(source)) => Err(StoreError::Cluster { op, source }),
            Err(_) => Err(StoreError::Timeout {
                op,
                timeout: self.request_timeout,
            }),
        }
    }

    async fn create_index_if_not_exists(
        transport: &dyn SearchTransport,
        name: &str,
        body: &serde_json::Value,
    ) -> std::result::Result<(), TransportError> {
        if transport.index_exists(name).await? {
            debug!(index = %name, "Index already present");
            return Ok(());
        }

        match transport.create_index(name, body).await {
            Err(e) if e.is_already_exists() => {
                warn!(index = %name, "Index created concurrently by another instance");
                Ok(())
            }
            other => other,
        }
    }

    async fn async_delete(&self, op: &'static str, query: Query) -> Result<()> {
        let transport = self.transport().await?;
        let task = self
            .call(op, transport.delete_by_query(&self.config.index_alias, &query))
            .await?;
        debug!(task = %task.task, query = ?query, "Delete by query submitted");
        Ok(())
    }
}

#[async_trait]
impl EventStore for ElasticsearchEventStore {
    fn is_configured(&self) -> bool {
        !self.config.url.is_empty()
    }

    async fn setup(&self) -> Result<()> {
        debug!(url = %self.config.url, "Setting up event store");

        let transport = self.connect().await.inspect_err(|e| {
            error!(url = %self.config.url, error = %e, "Connect to cluster failed");
        })?;
        wait_for_cluster(transport.as_ref(), self.config.healthcheck_timeout())
            .await
            .map_err(|source| {
                error!(url = %self.config.url, error = %source, "Connect to cluster failed");
                StoreError::Cluster {
                    op: "connect to cluster",
                    source,
                }
            })?;

        let policy = schema::ilm_policy();
        self.call(
            "put ilm policy",
            transport.put_lifecycle_policy(&self.config.ilm_policy_name, &policy),
        )
        .await
        .inspect_err(|e| {
            error!(name = %self.config.ilm_policy_name, error = %e, "Put ILM policy failed");
        })?;

        let template = schema::index_template(&self.config);
        self.call(
            "put index template",
            transport.put_index_template(&self.config.index_template_name, &template),
        )
        .await
        .inspect_err(|e| {
            error!(name = %self.config.index_template_name, error = %e, "Put index template failed");
        })?;

        let initial = schema::initial_index(&self.config);
        self.call(
            "create initial index",
            Self::create_index_if_not_exists(
                transport.as_ref(),
                &self.config.initial_index_name,
                &initial,
            ),
        )
        .await
        .inspect_err(|e| {
            error!(name = %self.config.initial_index_name, error = %e, "Create initial index failed");
        })?;

        info!(alias = %self.config.index_alias, "Event store ready");
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        let transport = self.transport.write().await.take();
        if let Some(transport) = transport {
            transport.close().await;
        }
        Ok(())
    }

    async fn initialize(&self, _build: &dyn Build) -> Result<()> {
        Ok(())
    }

    async fn finalize(&self, _build: &dyn Build) -> Result<()> {
        Ok(())
    }

    async fn put(
        &self,
        build: &dyn Build,
        events: &[&dyn Event],
    ) -> Result<Option<Box<dyn EventKey>>> {
        if events.is_empty() {
            return Ok(None);
        }
        let transport = self.transport().await?;

        let mut docs = Vec::with_capacity(events.len());
        let mut last = None;
        for event in events {
            let marshal_failed = |source: serde_json::Error| {
                error!(build_id = build.id(), error = %source, "Marshal event failed");
                StoreError::Serialization {
                    op: "marshal event",
                    source,
                }
            };

            let payload = event.payload().map_err(marshal_failed)?;
            let doc = EventDocument::new(
                build,
                event.event_type(),
                event.version(),
                payload,
                self.next_tiebreak(),
            );
            docs.push(to_raw_value(&doc).map_err(marshal_failed)?);
            last = Some(doc);
        }

        self.call("bulk put", transport.bulk_index(&self.config.index_alias, docs))
            .await
            .inspect_err(|e| {
                error!(build_id = build.id(), count = events.len(), error = %e, "Bulk put failed");
            })?;

        let Some(last) = last else {
            return Ok(None);
        };
        let key = last.key().map_err(|source| {
            error!(
                build_id = build.id(),
                tiebreak = last.tiebreak,
                error = %source,
                "Events written but last event has no time"
            );
            StoreError::KeyUnknown { source }
        })?;

        debug!(build_id = build.id(), count = events.len(), key = ?key, "Events written");
        Ok(Some(Box::new(key)))
    }

    async fn get(
        &self,
        build: &dyn Build,
        requested: usize,
        cursor: &mut Option<Box<dyn EventKey>>,
    ) -> Result<Vec<Envelope>> {
        let offset = Key::from_cursor(cursor.as_deref()).inspect_err(|e| {
            error!(build_id = build.id(), error = %e, "Invalid cursor");
        })?;
        let transport = self.transport().await?;

        let request = SearchRequest {
            query: Query::term(schema::BUILD_ID, build.id()),
            sort: vec![
                SortField::asc(schema::TIME),
                SortField::asc(schema::TIEBREAK),
            ],
            size: requested.min(MAX_PAGE_SIZE),
            search_after: (offset.time_millis > 0).then(|| offset.sort_values()),
        };

        let hits = self
            .call("perform search", transport.search(&self.config.index_alias, &request))
            .await
            .inspect_err(|e| {
                error!(build_id = build.id(), error = %e, "Search failed");
            })?;

        let Some(last_hit) = hits.last() else {
            return Ok(Vec::new());
        };

        let events = hits
            .iter()
            .map(|hit| {
                serde_json::from_str::<Envelope>(hit.source.get()).map_err(|source| {
                    error!(build_id = build.id(), error = %source, "Unmarshal hit failed");
                    StoreError::Serialization {
                        op: "unmarshal source to envelope",
                        source,
                    }
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let next = Key::from_sort_values(&last_hit.sort).map_err(|source| {
            error!(
                build_id = build.id(),
                sort = ?last_hit.sort,
                error = %source,
                "Unmarshal last hit failed"
            );
            StoreError::Serialization {
                op: "unmarshal last hit",
                source,
            }
        })?;

        debug!(build_id = build.id(), count = events.len(), cursor = ?next, "Events read");
        *cursor = Some(Box::new(next));
        Ok(events)
    }

    async fn delete(&self, builds: &[&dyn Build]) -> Result<()> {
        if builds.is_empty() {
            return Ok(());
        }
        let build_ids: Vec<i64> = builds.iter().map(|b| b.id()).collect();

        self.async_delete("delete builds", Query::terms(schema::BUILD_ID, build_ids.clone()))
            .await
            .inspect_err(|e| {
                error!(build_ids = ?build_ids, error = %e, "Delete builds failed");
            })
    }

    async fn delete_pipeline(&self, pipeline: &dyn Pipeline) -> Result<()> {
        self.async_delete("delete pipeline", Query::term(schema::PIPELINE_ID, pipeline.id()))
            .await
            .inspect_err(|e| {
                error!(pipeline_id = pipeline.id(), error = %e, "Delete pipeline failed");
            })
    }

    async fn delete_team(&self, team: &dyn Team) -> Result<()> {
        self.async_delete("delete team", Query::term(schema::TEAM_ID, team.id()))
            .await
            .inspect_err(|e| {
                error!(team_id = team.id(), error = %e, "Delete team failed");
            })
    }

    fn unmarshal_key(&self, data: &[u8]) -> Result<Box<dyn EventKey>> {
        Ok(Box::new(Key::from_bytes(data)?))
    }
}
