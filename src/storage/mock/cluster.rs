//! In-memory search cluster.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::value::RawValue;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::storage::elasticsearch::schema;
use crate::transport::{
    lookup, DeleteTask, Hit, Query, SearchRequest, SearchTransport, SortOrder, TransportError,
};

#[derive(Default)]
struct ClusterState {
    policies: HashMap<String, Value>,
    templates: HashMap<String, Value>,
    indices: HashMap<String, Value>,
    /// Every document behind every index, in arrival order.
    documents: Vec<Value>,
    delete_tasks: Vec<Query>,
    bulk_calls: usize,
    search_calls: usize,
    last_search: Option<SearchRequest>,
    ping_calls: usize,
    unhealthy_pings: usize,
    closed: bool,
}

/// Mock cluster that keeps indices and documents in memory.
///
/// Evaluates the same typed requests `HttpTransport` renders to the query
/// DSL: term/terms filters, ascending/descending sorts, `search_after` and
/// `size`. `data.time` sorts in milliseconds, as the index template maps it
/// with `epoch_second`. Delete-by-query is applied as soon as it is
/// submitted.
#[derive(Default)]
pub struct MockCluster {
    state: RwLock<ClusterState>,
    fail_on_bulk: RwLock<bool>,
    fail_on_search: RwLock<bool>,
    fail_on_delete: RwLock<bool>,
    fail_on_template: RwLock<bool>,
    stale_index_exists: RwLock<bool>,
    delay: RwLock<Option<Duration>>,
}

impl MockCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `count` pings with `Unavailable`.
    pub async fn set_unhealthy_pings(&self, count: usize) {
        self.state.write().await.unhealthy_pings = count;
    }

    pub async fn set_fail_on_bulk(&self, fail: bool) {
        *self.fail_on_bulk.write().await = fail;
    }

    pub async fn set_fail_on_search(&self, fail: bool) {
        *self.fail_on_search.write().await = fail;
    }

    pub async fn set_fail_on_delete(&self, fail: bool) {
        *self.fail_on_delete.write().await = fail;
    }

    pub async fn set_fail_on_template(&self, fail: bool) {
        *self.fail_on_template.write().await = fail;
    }

    /// Make `index_exists` report every index as missing, as a racing
    /// instance sees it just before another one creates it.
    pub async fn set_stale_index_exists(&self, stale: bool) {
        *self.stale_index_exists.write().await = stale;
    }

    /// Delay every data call (bulk, search, delete) by `delay`.
    pub async fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.write().await = delay;
    }

    /// Store a document as-is, bypassing the bulk API.
    pub async fn insert_raw(&self, doc: Value) {
        self.state.write().await.documents.push(doc);
    }

    pub async fn documents(&self) -> Vec<Value> {
        self.state.read().await.documents.clone()
    }

    pub async fn document_count(&self) -> usize {
        self.state.read().await.documents.len()
    }

    pub async fn has_index(&self, name: &str) -> bool {
        self.state.read().await.indices.contains_key(name)
    }

    pub async fn index_count(&self) -> usize {
        self.state.read().await.indices.len()
    }

    pub async fn policy(&self, name: &str) -> Option<Value> {
        self.state.read().await.policies.get(name).cloned()
    }

    pub async fn template(&self, name: &str) -> Option<Value> {
        self.state.read().await.templates.get(name).cloned()
    }

    pub async fn delete_tasks(&self) -> Vec<Query> {
        self.state.read().await.delete_tasks.clone()
    }

    pub async fn bulk_calls(&self) -> usize {
        self.state.read().await.bulk_calls
    }

    pub async fn search_calls(&self) -> usize {
        self.state.read().await.search_calls
    }

    /// Most recent search request received.
    pub async fn last_search(&self) -> Option<SearchRequest> {
        self.state.read().await.last_search.clone()
    }

    pub async fn ping_count(&self) -> usize {
        self.state.read().await.ping_calls
    }

    async fn simulate_latency(&self) {
        let delay = *self.delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    async fn ensure_open(&self) -> Result<(), TransportError> {
        if self.state.read().await.closed {
            return Err(TransportError::Closed);
        }
        Ok(())
    }

    /// Sort value of `field`, in the units the cluster sorts by.
    ///
    /// A missing field gets the sentinel the cluster reports for it, which
    /// sorts last in either direction.
    fn sort_value(doc: &Value, field: &str, order: SortOrder) -> i64 {
        match lookup(doc, field).and_then(Value::as_i64) {
            Some(value) if field == schema::TIME => value.saturating_mul(1000),
            Some(value) => value,
            None => match order {
                SortOrder::Asc => i64::MAX,
                SortOrder::Desc => i64::MIN,
            },
        }
    }

    fn compare(a: &[i64], b: &[i64], orders: &[SortOrder]) -> Ordering {
        a.iter()
            .zip(b)
            .zip(orders)
            .map(|((a, b), order)| match order {
                SortOrder::Asc => a.cmp(b),
                SortOrder::Desc => b.cmp(a),
            })
            .find(|ord| *ord != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    }
}

#[async_trait]
impl SearchTransport for MockCluster {
    async fn ping(&self) -> Result<(), TransportError> {
        let mut state = self.state.write().await;
        state.ping_calls += 1;
        if state.closed {
            return Err(TransportError::Closed);
        }
        if state.unhealthy_pings > 0 {
            state.unhealthy_pings -= 1;
            return Err(TransportError::Unavailable("cluster starting".to_string()));
        }
        Ok(())
    }

    async fn put_lifecycle_policy(&self, name: &str, body: &Value) -> Result<(), TransportError> {
        self.ensure_open().await?;
        self.state
            .write()
            .await
            .policies
            .insert(name.to_string(), body.clone());
        Ok(())
    }

    async fn put_index_template(&self, name: &str, body: &Value) -> Result<(), TransportError> {
        self.ensure_open().await?;
        if *self.fail_on_template.read().await {
            return Err(TransportError::Status {
                status: 400,
                body: "mock template rejection".to_string(),
            });
        }
        self.state
            .write()
            .await
            .templates
            .insert(name.to_string(), body.clone());
        Ok(())
    }

    async fn index_exists(&self, index: &str) -> Result<bool, TransportError> {
        self.ensure_open().await?;
        if *self.stale_index_exists.read().await {
            return Ok(false);
        }
        Ok(self.state.read().await.indices.contains_key(index))
    }

    async fn create_index(&self, index: &str, body: &Value) -> Result<(), TransportError> {
        self.ensure_open().await?;
        let mut state = self.state.write().await;
        if state.indices.contains_key(index) {
            return Err(TransportError::AlreadyExists {
                index: index.to_string(),
            });
        }
        state.indices.insert(index.to_string(), body.clone());
        Ok(())
    }

    async fn bulk_index(
        &self,
        _index: &str,
        docs: Vec<Box<RawValue>>,
    ) -> Result<(), TransportError> {
        self.ensure_open().await?;
        self.simulate_latency().await;
        if *self.fail_on_bulk.read().await {
            return Err(TransportError::Unavailable("mock bulk failure".to_string()));
        }

        let parsed = docs
            .iter()
            .map(|doc| serde_json::from_str::<Value>(doc.get()))
            .collect::<Result<Vec<_>, _>>()?;

        let mut state = self.state.write().await;
        state.bulk_calls += 1;
        state.documents.extend(parsed);
        Ok(())
    }

    async fn search(
        &self,
        _index: &str,
        request: &SearchRequest,
    ) -> Result<Vec<Hit>, TransportError> {
        self.ensure_open().await?;
        self.simulate_latency().await;
        if *self.fail_on_search.read().await {
            return Err(TransportError::Unavailable("mock search failure".to_string()));
        }

        let mut state = self.state.write().await;
        state.search_calls += 1;
        state.last_search = Some(request.clone());

        let orders: Vec<SortOrder> = request.sort.iter().map(|s| s.order).collect();
        let mut matched: Vec<(Vec<i64>, &Value)> = state
            .documents
            .iter()
            .filter(|doc| request.query.matches(doc))
            .map(|doc| {
                let sort = request
                    .sort
                    .iter()
                    .map(|s| Self::sort_value(doc, &s.field, s.order))
                    .collect();
                (sort, doc)
            })
            .collect();
        matched.sort_by(|(a, _), (b, _)| Self::compare(a, b, &orders));

        let after = request.search_after.as_deref();

        matched
            .into_iter()
            .filter(|(sort, _)| match after {
                Some(after) => Self::compare(sort, after, &orders) == Ordering::Greater,
                None => true,
            })
            .take(request.size)
            .map(|(sort, doc)| -> Result<Hit, TransportError> {
                Ok(Hit {
                    source: RawValue::from_string(doc.to_string())?,
                    sort: sort.into_iter().map(Value::from).collect(),
                })
            })
            .collect()
    }

    async fn delete_by_query(
        &self,
        _index: &str,
        query: &Query,
    ) -> Result<DeleteTask, TransportError> {
        self.ensure_open().await?;
        self.simulate_latency().await;
        if *self.fail_on_delete.read().await {
            return Err(TransportError::Status {
                status: 503,
                body: "mock delete rejection".to_string(),
            });
        }

        let mut state = self.state.write().await;
        state.documents.retain(|doc| !query.matches(doc));
        state.delete_tasks.push(query.clone());
        Ok(DeleteTask {
            task: format!("mock:{}", state.delete_tasks.len()),
        })
    }

    async fn close(&self) {
        self.state.write().await.closed = true;
    }
}
