//! EventStore interface tests.
//!
//! These tests verify the contract of the EventStore trait.
//! Each storage implementation should run these tests.
//!
//! Writes and deletes may become visible only after an index refresh, so
//! reads that follow a write poll until the expected result shows up.

use std::time::Duration;

use buildevents::interfaces::{EventKey, EventStore};
use buildevents::test_utils::{
    as_events, decode_logs, make_logs, LogEvent, TestBuild, TestPipeline, TestTeam,
};

const VISIBILITY_ATTEMPTS: usize = 50;
const VISIBILITY_INTERVAL: Duration = Duration::from_millis(100);

/// Event time used by every test, in epoch seconds.
const T0: i64 = 1_700_000_000;

/// Unique positive id, so runs against a shared cluster never collide.
pub fn unique_id() -> i64 {
    (uuid::Uuid::new_v4().as_u128() & 0x000f_ffff_ffff_ffff) as i64 + 1
}

pub fn unique_build() -> TestBuild {
    TestBuild::new(unique_id())
}

/// Read a build's whole stream in pages of `page`.
pub async fn read_all<S: EventStore>(store: &S, build: &TestBuild, page: usize) -> Vec<LogEvent> {
    let mut cursor = None;
    let mut all = Vec::new();
    loop {
        let envelopes = store
            .get(build, page, &mut cursor)
            .await
            .expect("get should succeed");
        if envelopes.is_empty() {
            return all;
        }
        assert!(envelopes.len() <= page, "page should not exceed requested size");
        all.extend(decode_logs(&envelopes));
    }
}

/// Read a build's stream once it holds `expected` events.
pub async fn read_visible<S: EventStore>(
    store: &S,
    build: &TestBuild,
    page: usize,
    expected: usize,
) -> Vec<LogEvent> {
    let mut events = Vec::new();
    for _ in 0..VISIBILITY_ATTEMPTS {
        events = read_all(store, build, page).await;
        if events.len() == expected {
            return events;
        }
        tokio::time::sleep(VISIBILITY_INTERVAL).await;
    }
    events
}

// =============================================================================
// EventStore::put tests
// =============================================================================

pub async fn test_put_returns_key_of_last_event<S: EventStore>(store: &S) {
    let build = unique_build();
    let logs = make_logs(T0, 3);

    let key = store
        .put(&build, &as_events(&logs))
        .await
        .expect("put should succeed")
        .expect("non-empty put should return a key");

    assert_eq!(key.backend(), store.unmarshal_key(&key.marshal().unwrap()).unwrap().backend());
    assert!(key.greater_than(None).unwrap(), "any key is after the start");
}

pub async fn test_put_empty_returns_none<S: EventStore>(store: &S) {
    let build = unique_build();

    let key = store.put(&build, &[]).await.expect("empty put should succeed");

    assert!(key.is_none(), "empty put should return no key");
}

pub async fn test_put_keys_increase<S: EventStore>(store: &S) {
    let build = unique_build();

    let first = store
        .put(&build, &as_events(&make_logs(T0, 2)))
        .await
        .unwrap()
        .unwrap();
    let second = store
        .put(&build, &as_events(&make_logs(T0, 2)))
        .await
        .unwrap()
        .unwrap();
    let later = store
        .put(&build, &[&LogEvent::new(T0 + 1, "later")])
        .await
        .unwrap()
        .unwrap();

    assert!(second.greater_than(Some(first.as_ref())).unwrap());
    assert!(!first.greater_than(Some(second.as_ref())).unwrap());
    assert!(later.greater_than(Some(second.as_ref())).unwrap());
}

// =============================================================================
// EventStore::get tests
// =============================================================================

pub async fn test_get_unknown_build_is_empty<S: EventStore>(store: &S) {
    let build = unique_build();
    let mut cursor = None;

    let events = store.get(&build, 10, &mut cursor).await.expect("get should succeed");

    assert!(events.is_empty(), "unknown build should have no events");
    assert!(cursor.is_none(), "empty read should not move the cursor");
}

pub async fn test_get_pages_in_order<S: EventStore>(store: &S) {
    let build = unique_build();
    let mut appended = Vec::new();
    for (offset, count) in [(0, 3), (0, 2), (2, 4), (5, 1)] {
        let batch: Vec<LogEvent> = (0..count)
            .map(|i| LogEvent::new(T0 + offset, format!("{}-{}", appended.len(), i)))
            .collect();
        store.put(&build, &as_events(&batch)).await.unwrap();
        appended.extend(batch);
    }

    assert_eq!(read_visible(store, &build, 100, appended.len()).await, appended);
    for page in [1, 2, 3, 7] {
        assert_eq!(
            read_all(store, &build, page).await,
            appended,
            "page size {} should yield the same stream",
            page
        );
    }
}

pub async fn test_get_isolates_builds<S: EventStore>(store: &S) {
    let mine = unique_build();
    let other = unique_build();

    store.put(&mine, &as_events(&make_logs(T0, 2))).await.unwrap();
    store.put(&other, &as_events(&make_logs(T0, 3))).await.unwrap();

    assert_eq!(read_visible(store, &mine, 10, 2).await, make_logs(T0, 2));
    assert_eq!(read_visible(store, &other, 10, 3).await.len(), 3);
}

pub async fn test_get_resumes_after_new_writes<S: EventStore>(store: &S) {
    let build = unique_build();
    let first = make_logs(T0, 2);
    store.put(&build, &as_events(&first)).await.unwrap();
    read_visible(store, &build, 10, 2).await;

    let mut cursor = None;
    let page = store.get(&build, 10, &mut cursor).await.unwrap();
    assert_eq!(decode_logs(&page), first);

    let second = vec![LogEvent::new(T0 + 1, "after")];
    store.put(&build, &as_events(&second)).await.unwrap();
    read_visible(store, &build, 10, 3).await;

    let page = store.get(&build, 10, &mut cursor).await.unwrap();
    assert_eq!(decode_logs(&page), second, "resumed read should see only new events");
}

pub async fn test_cursor_survives_marshal<S: EventStore>(store: &S) {
    let build = unique_build();
    let logs = make_logs(T0, 4);
    store.put(&build, &as_events(&logs)).await.unwrap();
    read_visible(store, &build, 10, 4).await;

    let mut cursor = None;
    store.get(&build, 2, &mut cursor).await.unwrap();
    let bytes = cursor.expect("cursor should be set").marshal().unwrap();

    let mut restored = Some(store.unmarshal_key(&bytes).expect("key should decode"));
    let page = store.get(&build, 10, &mut restored).await.unwrap();

    assert_eq!(decode_logs(&page), logs[2..].to_vec());
}

// =============================================================================
// Delete tests
// =============================================================================

/// Poll until `build` has no visible events.
async fn wait_until_empty<S: EventStore>(store: &S, build: &TestBuild) -> bool {
    for _ in 0..VISIBILITY_ATTEMPTS {
        if read_all(store, build, 100).await.is_empty() {
            return true;
        }
        tokio::time::sleep(VISIBILITY_INTERVAL).await;
    }
    false
}

pub async fn test_delete_builds<S: EventStore>(store: &S) {
    let gone = unique_build();
    let kept = unique_build();
    store.put(&gone, &as_events(&make_logs(T0, 2))).await.unwrap();
    store.put(&kept, &as_events(&make_logs(T0, 2))).await.unwrap();
    read_visible(store, &gone, 10, 2).await;
    read_visible(store, &kept, 10, 2).await;

    store.delete(&[&gone]).await.expect("delete should succeed");

    assert!(wait_until_empty(store, &gone).await, "deleted build should be empty");
    assert_eq!(read_all(store, &kept, 10).await.len(), 2);
}

pub async fn test_delete_no_builds<S: EventStore>(store: &S) {
    store.delete(&[]).await.expect("empty delete should succeed");
}

pub async fn test_delete_pipeline<S: EventStore>(store: &S) {
    let pipeline = TestPipeline::new(unique_id());
    let build = unique_build().in_pipeline(pipeline.id);
    store.put(&build, &as_events(&make_logs(T0, 1))).await.unwrap();
    read_visible(store, &build, 10, 1).await;

    store.delete_pipeline(&pipeline).await.expect("delete should succeed");

    assert!(wait_until_empty(store, &build).await, "pipeline builds should be empty");
}

pub async fn test_delete_team<S: EventStore>(store: &S) {
    let team = TestTeam::new(unique_id());
    let build = unique_build().in_team(team.id);
    store.put(&build, &as_events(&make_logs(T0, 1))).await.unwrap();
    read_visible(store, &build, 10, 1).await;

    store.delete_team(&team).await.expect("delete should succeed");

    assert!(wait_until_empty(store, &build).await, "team builds should be empty");
}

// =============================================================================
// Lifecycle tests
// =============================================================================

pub async fn test_build_hooks_succeed<S: EventStore>(store: &S) {
    let build = unique_build();

    store.initialize(&build).await.expect("initialize should succeed");
    store.finalize(&build).await.expect("finalize should succeed");
}

pub async fn test_setup_is_repeatable<S: EventStore>(store: &S) {
    store.setup().await.expect("repeated setup should succeed");
}

/// Run all EventStore tests against a store.
#[macro_export]
macro_rules! run_event_store_tests {
    ($store:expr) => {
        use $crate::storage::event_store_tests::*;

        // put tests
        test_put_returns_key_of_last_event($store).await;
        println!("  test_put_returns_key_of_last_event: PASSED");

        test_put_empty_returns_none($store).await;
        println!("  test_put_empty_returns_none: PASSED");

        test_put_keys_increase($store).await;
        println!("  test_put_keys_increase: PASSED");

        // get tests
        test_get_unknown_build_is_empty($store).await;
        println!("  test_get_unknown_build_is_empty: PASSED");

        test_get_pages_in_order($store).await;
        println!("  test_get_pages_in_order: PASSED");

        test_get_isolates_builds($store).await;
        println!("  test_get_isolates_builds: PASSED");

        test_get_resumes_after_new_writes($store).await;
        println!("  test_get_resumes_after_new_writes: PASSED");

        test_cursor_survives_marshal($store).await;
        println!("  test_cursor_survives_marshal: PASSED");

        // delete tests
        test_delete_builds($store).await;
        println!("  test_delete_builds: PASSED");

        test_delete_no_builds($store).await;
        println!("  test_delete_no_builds: PASSED");

        test_delete_pipeline($store).await;
        println!("  test_delete_pipeline: PASSED");

        test_delete_team($store).await;
        println!("  test_delete_team: PASSED");

        // lifecycle tests
        test_build_hooks_succeed($store).await;
        println!("  test_build_hooks_succeed: PASSED");

        test_setup_is_repeatable($store).await;
        println!("  test_setup_is_repeatable: PASSED");
    };
}
