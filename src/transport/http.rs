//! REST transport for the search cluster.
//!
//! Speaks the cluster's JSON-over-HTTP API with `reqwest`. Bulk writes use
//! the `application/x-ndjson` body format.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::value::RawValue;
use serde_json::Value;
use tracing::{debug, error};

use super::{DeleteTask, Hit, Query, SearchRequest, SearchTransport, TransportError};

/// Error types the cluster uses for "index already exists".
const ALREADY_EXISTS_TYPES: &[&str] = &[
    "resource_already_exists_exception",
    "index_already_exists_exception",
];

/// Maximum number of response body characters kept in errors.
const MAX_ERROR_BODY: usize = 200;

/// HTTP transport to a search cluster.
pub struct HttpTransport {
    client: Client,
    base_url: String,
    closed: AtomicBool,
}

impl HttpTransport {
    /// Create a transport for the cluster at `url`.
    ///
    /// No request is made; use `ping` to check the cluster answers.
    pub fn new(url: &str, timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: url.trim_end_matches('/').to_string(),
            closed: AtomicBool::new(false),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, TransportError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }
        Ok(self.client.request(method, self.url(path)))
    }

    /// Turn a non-2xx response into `TransportError::Status`.
    async fn check_status(response: Response) -> Result<Response, TransportError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        error!(status = %status, body = %body, "Cluster request failed");
        Err(TransportError::Status {
            status: status.as_u16(),
            body: body.chars().take(MAX_ERROR_BODY).collect(),
        })
    }

    /// Render bulk index actions as NDJSON.
    fn bulk_body(docs: &[Box<RawValue>]) -> String {
        let mut body = String::new();
        for doc in docs {
            body.push_str("{\"index\":{}}\n");
            body.push_str(doc.get());
            body.push('\n');
        }
        body
    }
}

/// Whether an error response body reports an existing index.
fn is_already_exists_body(body: &str) -> bool {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/type")
                .and_then(Value::as_str)
                .map(|t| ALREADY_EXISTS_TYPES.contains(&t))
        })
        .unwrap_or(false)
}

#[derive(Debug, Deserialize)]
struct BulkResponse {
    #[serde(default)]
    errors: bool,
    #[serde(default)]
    items: Vec<Value>,
}

impl BulkResponse {
    /// Reason of the first rejected item, if any.
    fn first_error(&self) -> Option<String> {
        if !self.errors {
            return None;
        }
        let reason = self
            .items
            .iter()
            .find_map(|item| {
                item.as_object()?
                    .values()
                    .find_map(|action| action.get("error"))
                    .map(|err| {
                        err.get("reason")
                            .and_then(Value::as_str)
                            .map(str::to_string)
                            .unwrap_or_else(|| err.to_string())
                    })
            })
            .unwrap_or_else(|| "unknown bulk failure".to_string());
        Some(reason)
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    hits: SearchHits,
}

#[derive(Debug, Deserialize)]
struct SearchHits {
    #[serde(default)]
    hits: Vec<Hit>,
}

#[async_trait]
impl SearchTransport for HttpTransport {
    async fn ping(&self) -> Result<(), TransportError> {
        let response = self.request(Method::GET, "_cluster/health")?.send().await?;
        Self::check_status(response).await?;
        Ok(())
    }

    async fn put_lifecycle_policy(&self, name: &str, body: &Value) -> Result<(), TransportError> {
        let response = self
            .request(Method::PUT, &format!("_ilm/policy/{}", name))?
            .json(body)
            .send()
            .await?;
        Self::check_status(response).await?;
        Ok(())
    }

    async fn put_index_template(&self, name: &str, body: &Value) -> Result<(), TransportError> {
        let response = self
            .request(Method::PUT, &format!("_template/{}", name))?
            .json(body)
            .send()
            .await?;
        Self::check_status(response).await?;
        Ok(())
    }

    async fn index_exists(&self, index: &str) -> Result<bool, TransportError> {
        let response = self.request(Method::HEAD, index)?.send().await?;
        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => Self::check_status(response).await.map(|_| true),
        }
    }

    async fn create_index(&self, index: &str, body: &Value) -> Result<(), TransportError> {
        let response = self.request(Method::PUT, index)?.json(body).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let text = response.text().await.unwrap_or_default();
        if status == StatusCode::BAD_REQUEST && is_already_exists_body(&text) {
            return Err(TransportError::AlreadyExists {
                index: index.to_string(),
            });
        }
        Err(TransportError::Status {
            status: status.as_u16(),
            body: text.chars().take(MAX_ERROR_BODY).collect(),
        })
    }

    async fn bulk_index(
        &self,
        index: &str,
        docs: Vec<Box<RawValue>>,
    ) -> Result<(), TransportError> {
        let count = docs.len();
        let response = self
            .request(Method::POST, &format!("{}/_bulk", index))?
            .header("Content-Type", "application/x-ndjson")
            .body(Self::bulk_body(&docs))
            .send()
            .await?;
        let response = Self::check_status(response).await?;

        let bulk: BulkResponse = serde_json::from_slice(&response.bytes().await?)?;
        if let Some(reason) = bulk.first_error() {
            return Err(TransportError::BulkItem { reason });
        }

        debug!(index = %index, count, "Bulk request indexed");
        Ok(())
    }

    async fn search(
        &self,
        index: &str,
        request: &SearchRequest,
    ) -> Result<Vec<Hit>, TransportError> {
        let response = self
            .request(Method::POST, &format!("{}/_search", index))?
            .json(request)
            .send()
            .await?;
        let response = Self::check_status(response).await?;

        let result: SearchResponse = serde_json::from_slice(&response.bytes().await?)?;
        Ok(result.hits.hits)
    }

    async fn delete_by_query(
        &self,
        index: &str,
        query: &Query,
    ) -> Result<DeleteTask, TransportError> {
        let response = self
            .request(
                Method::POST,
                &format!("{}/_delete_by_query?wait_for_completion=false", index),
            )?
            .json(&serde_json::json!({ "query": query }))
            .send()
            .await?;
        let response = Self::check_status(response).await?;

        Ok(serde_json::from_slice(&response.bytes().await?)?)
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}
