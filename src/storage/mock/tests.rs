use serde_json::json;
use serde_json::value::{to_raw_value, RawValue};
use serde_json::Value;

use super::*;
use crate::transport::{Query, SearchRequest, SearchTransport, SortField, TransportError};

fn raw(doc: Value) -> Box<RawValue> {
    to_raw_value(&doc).unwrap()
}

fn by_build(build_id: i64, size: usize, search_after: Option<Vec<i64>>) -> SearchRequest {
    SearchRequest {
        query: Query::term("build_id", build_id),
        sort: vec![SortField::asc("data.time"), SortField::asc("tiebreak")],
        size,
        search_after,
    }
}

fn tiebreaks(hits: &[crate::transport::Hit]) -> Vec<i64> {
    hits.iter()
        .map(|hit| {
            let doc: Value = serde_json::from_str(hit.source.get()).unwrap();
            doc["tiebreak"].as_i64().unwrap()
        })
        .collect()
}

#[tokio::test]
async fn test_bulk_then_search_sorted() {
    let cluster = MockCluster::new();
    cluster
        .bulk_index(
            "events",
            vec![
                raw(json!({"build_id": 1, "data": {"time": 20}, "tiebreak": 1})),
                raw(json!({"build_id": 1, "data": {"time": 10}, "tiebreak": 2})),
                raw(json!({"build_id": 2, "data": {"time": 5}, "tiebreak": 3})),
                raw(json!({"build_id": 1, "data": {"time": 10}, "tiebreak": 4})),
            ],
        )
        .await
        .unwrap();

    let hits = cluster.search("events", &by_build(1, 10, None)).await.unwrap();

    assert_eq!(tiebreaks(&hits), vec![2, 4, 1]);
    assert_eq!(hits[0].sort, vec![json!(10_000), json!(2)]);
    assert_eq!(cluster.bulk_calls().await, 1);
    assert_eq!(cluster.search_calls().await, 1);
}

#[tokio::test]
async fn test_search_after_is_exclusive() {
    let cluster = MockCluster::new();
    for tiebreak in 1..=3 {
        cluster
            .insert_raw(json!({"build_id": 1, "data": {"time": 7}, "tiebreak": tiebreak}))
            .await;
    }

    let hits = cluster
        .search("events", &by_build(1, 10, Some(vec![7_000, 2])))
        .await
        .unwrap();

    assert_eq!(tiebreaks(&hits), vec![3]);
}

#[tokio::test]
async fn test_search_respects_size() {
    let cluster = MockCluster::new();
    for tiebreak in 1..=5 {
        cluster
            .insert_raw(json!({"build_id": 1, "data": {"time": 1}, "tiebreak": tiebreak}))
            .await;
    }

    let hits = cluster.search("events", &by_build(1, 2, None)).await.unwrap();

    assert_eq!(tiebreaks(&hits), vec![1, 2]);
}

#[tokio::test]
async fn test_documents_without_sort_field_sort_last() {
    let cluster = MockCluster::new();
    cluster
        .insert_raw(json!({"build_id": 1, "data": {}, "tiebreak": 1}))
        .await;
    cluster
        .insert_raw(json!({"build_id": 1, "data": {"time": 3}, "tiebreak": 2}))
        .await;

    let hits = cluster.search("events", &by_build(1, 10, None)).await.unwrap();

    assert_eq!(tiebreaks(&hits), vec![2, 1]);
    assert_eq!(hits[1].sort, vec![json!(i64::MAX), json!(1)]);
}

#[tokio::test]
async fn test_delete_by_query_applies_immediately() {
    let cluster = MockCluster::new();
    cluster
        .insert_raw(json!({"build_id": 1, "team_id": 1, "tiebreak": 1}))
        .await;
    cluster
        .insert_raw(json!({"build_id": 2, "team_id": 2, "tiebreak": 2}))
        .await;

    let task = cluster
        .delete_by_query("events", &Query::term("team_id", 1))
        .await
        .unwrap();

    assert_eq!(task.task, "mock:1");
    assert_eq!(cluster.document_count().await, 1);
    assert_eq!(cluster.delete_tasks().await, vec![Query::term("team_id", 1)]);
}

#[tokio::test]
async fn test_create_index_twice_reports_already_exists() {
    let cluster = MockCluster::new();
    cluster.create_index("events-000001", &json!({})).await.unwrap();

    let err = cluster
        .create_index("events-000001", &json!({}))
        .await
        .unwrap_err();

    assert!(err.is_already_exists());
    assert!(cluster.index_exists("events-000001").await.unwrap());
}

#[tokio::test]
async fn test_stale_index_exists_hides_indices() {
    let cluster = MockCluster::new();
    cluster.create_index("events-000001", &json!({})).await.unwrap();
    cluster.set_stale_index_exists(true).await;

    assert!(!cluster.index_exists("events-000001").await.unwrap());
}

#[tokio::test]
async fn test_unhealthy_pings_then_healthy() {
    let cluster = MockCluster::new();
    cluster.set_unhealthy_pings(2).await;

    assert!(matches!(cluster.ping().await, Err(TransportError::Unavailable(_))));
    assert!(matches!(cluster.ping().await, Err(TransportError::Unavailable(_))));
    assert!(cluster.ping().await.is_ok());
    assert_eq!(cluster.ping_count().await, 3);
}

#[tokio::test]
async fn test_closed_cluster_rejects_calls() {
    let cluster = MockCluster::new();
    cluster.close().await;

    assert!(matches!(
        cluster.search("events", &by_build(1, 1, None)).await,
        Err(TransportError::Closed)
    ));
    assert!(matches!(
        cluster.bulk_index("events", vec![]).await,
        Err(TransportError::Closed)
    ));
}

#[tokio::test]
async fn test_failure_injection() {
    let cluster = MockCluster::new();
    cluster.set_fail_on_bulk(true).await;
    cluster.set_fail_on_search(true).await;
    cluster.set_fail_on_delete(true).await;
    cluster.set_fail_on_template(true).await;

    assert!(cluster
        .bulk_index("events", vec![raw(json!({"build_id": 1}))])
        .await
        .is_err());
    assert!(cluster.search("events", &by_build(1, 1, None)).await.is_err());
    assert!(cluster
        .delete_by_query("events", &Query::term("build_id", 1))
        .await
        .is_err());
    assert!(cluster
        .put_index_template("events-template", &json!({}))
        .await
        .is_err());
    assert_eq!(cluster.document_count().await, 0);
    assert!(cluster.template("events-template").await.is_none());
}
