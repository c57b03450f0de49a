//! Transport layer abstraction for the search cluster.
//!
//! One trait method per cluster call the event store makes. Requests are
//! typed so implementations can either render them to the REST query DSL
//! (`HttpTransport`) or evaluate them directly (`MockCluster`).

pub mod http;

use async_trait::async_trait;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::value::RawValue;
use serde_json::Value;

pub use http::HttpTransport;

/// Errors returned by a search transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("cluster returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("index already exists: {index}")]
    AlreadyExists { index: String },

    #[error("bulk item rejected: {reason}")]
    BulkItem { reason: String },

    #[error("decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("cluster unavailable: {0}")]
    Unavailable(String),

    #[error("transport closed")]
    Closed,
}

impl TransportError {
    /// Whether this is the "index already exists" rejection of a create.
    pub fn is_already_exists(&self) -> bool {
        matches!(self, TransportError::AlreadyExists { .. })
    }
}

/// Filter on exact field values.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    /// Field equals value.
    Term { field: String, value: i64 },
    /// Field equals any of the values.
    Terms { field: String, values: Vec<i64> },
}

impl Query {
    pub fn term(field: impl Into<String>, value: i64) -> Self {
        Query::Term {
            field: field.into(),
            value,
        }
    }

    pub fn terms(field: impl Into<String>, values: Vec<i64>) -> Self {
        Query::Terms {
            field: field.into(),
            values,
        }
    }

    /// Evaluate the filter against a document's field value.
    pub fn matches(&self, doc: &Value) -> bool {
        match self {
            Query::Term { field, value } => {
                lookup(doc, field).and_then(Value::as_i64) == Some(*value)
            }
            Query::Terms { field, values } => lookup(doc, field)
                .and_then(Value::as_i64)
                .is_some_and(|v| values.contains(&v)),
        }
    }
}

impl Serialize for Query {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut outer = serializer.serialize_map(Some(1))?;
        match self {
            Query::Term { field, value } => {
                outer.serialize_entry("term", &FieldValue(field, value))?;
            }
            Query::Terms { field, values } => {
                outer.serialize_entry("terms", &FieldValue(field, values))?;
            }
        }
        outer.end()
    }
}

/// Renders as `{field: value}`.
struct FieldValue<'a, T>(&'a str, &'a T);

impl<T: Serialize> Serialize for FieldValue<'_, T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(self.0, self.1)?;
        map.end()
    }
}

/// Look up a dotted field path (e.g. `data.time`) in a document.
pub fn lookup<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(doc, |current, part| current.get(part))
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

/// One sort criterion.
#[derive(Debug, Clone, PartialEq)]
pub struct SortField {
    pub field: String,
    pub order: SortOrder,
}

impl SortField {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            order: SortOrder::Asc,
        }
    }
}

impl Serialize for SortField {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Order {
            order: SortOrder,
        }

        FieldValue(&self.field, &Order { order: self.order }).serialize(serializer)
    }
}

/// Search request body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchRequest {
    pub query: Query,
    pub sort: Vec<SortField>,
    pub size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_after: Option<Vec<i64>>,
}

/// A single search hit.
#[derive(Debug, Clone, Deserialize)]
pub struct Hit {
    #[serde(rename = "_source")]
    pub source: Box<RawValue>,
    #[serde(default)]
    pub sort: Vec<Value>,
}

/// Handle of an accepted asynchronous delete-by-query task.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DeleteTask {
    pub task: String,
}

/// Calls the event store makes against the search cluster.
///
/// Implementations:
/// - `HttpTransport`: REST API over HTTP
/// - `MockCluster`: in-memory cluster for testing
#[async_trait]
pub trait SearchTransport: Send + Sync {
    /// Check the cluster answers.
    async fn ping(&self) -> Result<(), TransportError>;

    /// Create or replace an index lifecycle policy.
    async fn put_lifecycle_policy(&self, name: &str, body: &Value) -> Result<(), TransportError>;

    /// Create or replace an index template.
    async fn put_index_template(&self, name: &str, body: &Value) -> Result<(), TransportError>;

    async fn index_exists(&self, index: &str) -> Result<bool, TransportError>;

    /// Create an index. Fails with `AlreadyExists` if it is already there.
    async fn create_index(&self, index: &str, body: &Value) -> Result<(), TransportError>;

    /// Index pre-serialized documents in one bulk request. Any rejected
    /// item fails the whole call.
    async fn bulk_index(&self, index: &str, docs: Vec<Box<RawValue>>)
        -> Result<(), TransportError>;

    async fn search(&self, index: &str, request: &SearchRequest)
        -> Result<Vec<Hit>, TransportError>;

    /// Submit a delete-by-query without waiting for it to run.
    async fn delete_by_query(&self, index: &str, query: &Query)
        -> Result<DeleteTask, TransportError>;

    /// Release connections. Later calls fail with `Closed`.
    async fn close(&self);
}
