//! Snapshot-then-delta synchronization tests
//!
//! These tests drive a [`StateStore`] the way a server would and check what
//! clients of each role observe:
//!  - partitions evolve by merge, lazily created per named role
//!  - a client gets exactly one `sync` if its role has state, then deltas
//!  - deltas reach only the roles they are scoped to
//!  - a client replaying sync + deltas ends up with the server's partition

use axum::http::request::Parts;
use axum::http::Request;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rolesync_core::{tree, Event, EventKind, Roles, StateTree};
use rolesync_store::{StateStore, StoreConfig, StoreConfigBuilder, StoreError};
use std::sync::Arc;
use std::thread;

fn request(role: &str) -> Parts {
    Request::builder()
        .uri(format!("/events?role={}", role))
        .body(())
        .unwrap()
        .into_parts()
        .0
}

/// Rebuild a client's view from the events it received.
fn replay(events: &[Event]) -> StateTree {
    let mut state = StateTree::new();
    for event in events {
        let tree = event.tree().unwrap();
        match event.kind {
            EventKind::Sync => state = tree,
            EventKind::Delta => state.merge(tree),
        }
    }
    state
}

// ============================================================================
// Partition Tests
// ============================================================================

#[test]
fn test_populate_with_no_role() {
    let store = StateStore::new(StoreConfig::default());
    store.update(tree! {}, "test").unwrap();
    store.update(tree! { "1" => "2" }, Roles::All).unwrap();

    assert_eq!(store.roles(), vec!["test".to_string()]);
    assert_eq!(store.snapshot("test"), Some(tree! { "1" => "2" }));
}

#[test]
fn test_populate_with_one_role() {
    let store = StateStore::new(StoreConfig::default());
    store.update(tree! {}, "test1").unwrap();
    store.update(tree! { "1" => "2" }, "test2").unwrap();

    assert_eq!(store.snapshot("test1"), Some(tree! {}));
    assert_eq!(store.snapshot("test2"), Some(tree! { "1" => "2" }));
}

#[test]
fn test_update_with_update_func() {
    let store = StateStore::new(StoreConfig::default());
    store.update_func(|_, _| tree! {}, "test").unwrap();
    assert_eq!(store.snapshot("test"), Some(tree! {}));

    store.update_func(|_, _| tree! { "1" => "2" }, None::<Vec<String>>).unwrap();
    assert_eq!(store.snapshot("test"), Some(tree! { "1" => "2" }));
}

#[test]
fn test_nested_merge_through_store() {
    let store = StateStore::new(StoreConfig::default());
    store
        .update(tree! { "x" => tree! { "a" => 1, "b" => 1 } }, "r")
        .unwrap();
    store.update(tree! { "x" => tree! { "b" => 2 } }, "r").unwrap();

    assert_eq!(
        store.snapshot("r"),
        Some(tree! { "x" => tree! { "a" => 1, "b" => 2 } })
    );
}

// ============================================================================
// Sync / Delta Delivery Tests
// ============================================================================

#[test]
fn test_no_sync_before_first_update() {
    let store = StateStore::new(StoreConfig::default());
    let mut early = store.connect(&request("r1")).unwrap();
    assert!(early.drain().is_empty());

    store.update(tree! { "a" => 1 }, "r1").unwrap();

    // the early client only ever sees the delta
    let events = early.drain();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, EventKind::Delta);
}

#[test]
fn test_late_client_gets_one_sync_of_current_state() {
    let store = StateStore::new(StoreConfig::default());
    store.update(tree! { "a" => 1 }, "r1").unwrap();
    store.update(tree! { "b" => tree! { "c" => true } }, "r1").unwrap();

    let mut late = store.connect(&request("r1")).unwrap();
    let events = late.drain();

    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, EventKind::Sync);
    assert_eq!(
        events[0].tree().unwrap(),
        tree! { "a" => 1, "b" => tree! { "c" => true } }
    );
    assert_eq!(Some(events[0].tree().unwrap()), store.snapshot("r1"));
}

#[test]
fn test_scoped_delta_reaches_only_its_role() {
    let store = StateStore::new(StoreConfig::default());
    let mut r1 = store.connect(&request("r1")).unwrap();
    let mut r2 = store.connect(&request("r2")).unwrap();

    store.update(tree! { "only" => "r1" }, "r1").unwrap();
    store.update(tree! { "every" => "one" }, Roles::All).unwrap();

    let r1_events = r1.drain();
    let r2_events = r2.drain();

    assert_eq!(r1_events.len(), 2);
    assert_eq!(r2_events.len(), 1);
    assert_eq!(r2_events[0].tree().unwrap(), tree! { "every" => "one" });
}

#[test]
fn test_update_func_deltas_are_per_role() {
    let store = StateStore::new(StoreConfig::default());
    store.update(tree! { "n" => 0 }, ["a", "b"]).unwrap();

    let mut a = store.connect(&request("a")).unwrap();
    let mut b = store.connect(&request("b")).unwrap();
    a.drain();
    b.drain();

    store
        .update_func(|_, role| tree! { "greeting" => format!("hi {}", role) }, Roles::All)
        .unwrap();

    let a_events = a.drain();
    let b_events = b.drain();
    assert_eq!(a_events.len(), 1);
    assert_eq!(b_events.len(), 1);
    assert_eq!(a_events[0].tree().unwrap(), tree! { "greeting" => "hi a" });
    assert_eq!(b_events[0].tree().unwrap(), tree! { "greeting" => "hi b" });
}

#[test]
fn test_unencodable_partition_sends_no_sync() {
    let store = StateStore::new(StoreConfig::default());
    store.update(tree! { "bad" => f64::NAN }, "r").unwrap();

    let mut client = store.connect(&request("r")).unwrap();
    assert!(client.drain().is_empty());
    assert!(store.snapshot("r").is_some());
}

#[test]
fn test_custom_role_fn() {
    let config = StoreConfigBuilder::new()
        .role_fn(|request| request.uri.path().trim_start_matches("/as/").to_string())
        .build();
    let store = StateStore::new(config);
    store.update(tree! { "k" => "v" }, "ops").unwrap();

    let (parts, _) = Request::builder()
        .uri("/as/ops")
        .body(())
        .unwrap()
        .into_parts();
    let mut client = store.connect(&parts).unwrap();
    assert_eq!(client.role(), "ops");
    assert_eq!(client.drain().len(), 1);
}

// ============================================================================
// Concurrency Tests
// ============================================================================

#[test]
fn test_disjoint_concurrent_updates_do_not_interleave() {
    let store = Arc::new(StateStore::new(StoreConfig::default()));
    let writers = 8;
    let rounds = 500;

    let handles: Vec<_> = (0..writers)
        .map(|w| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                let role = format!("role-{}", w);
                for i in 0..rounds {
                    store
                        .update(tree! { "last" => i as i64, "writer" => w as i64 }, role.as_str())
                        .unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    for w in 0..writers {
        assert_eq!(
            store.snapshot(&format!("role-{}", w)),
            Some(tree! { "last" => (rounds - 1) as i64, "writer" => w as i64 })
        );
    }
    assert_eq!(store.sequence(), (writers * rounds) as u64);
}

#[test]
fn test_clients_converge_under_concurrent_writers() {
    let config = StoreConfigBuilder::new().client_buffer(100_000).build();
    let store = Arc::new(StateStore::new(config));
    let roles = ["red", "green", "blue"];
    // with every partition present, each client starts from a sync
    store.update(tree! {}, roles).unwrap();

    let writers: Vec<_> = (0..4u64)
        .map(|seed| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                let mut rng = StdRng::seed_from_u64(seed);
                for i in 0..400i64 {
                    let key = format!("k{}", rng.gen_range(0..8));
                    let delta = tree! { key.as_str() => tree! { "v" => i, "w" => seed as i64 } };
                    match rng.gen_range(0..3) {
                        0 => store.update(delta, Roles::All).unwrap(),
                        1 => store.update(delta, roles[rng.gen_range(0..3)]).unwrap(),
                        _ => store
                            .update_func(
                                |current, role| tree! { "seen" => current.len() as i64, "role" => role },
                                roles[rng.gen_range(0..3)],
                            )
                            .unwrap(),
                    }
                }
            })
        })
        .collect();

    // clients join while the writers are running
    let mut clients = Vec::new();
    for i in 0..30 {
        clients.push(store.connect(&request(roles[i % roles.len()])).unwrap());
        thread::yield_now();
    }

    for writer in writers {
        writer.join().unwrap();
    }

    for mut client in clients {
        let role = client.role().clone();
        let events = client.drain();
        let ids: Vec<u64> = events.iter().filter_map(|e| e.id).collect();
        assert!(ids.windows(2).all(|w| w[0] < w[1]), "out of order for {}", role);
        assert!(
            events.iter().skip(1).all(|e| e.kind == EventKind::Delta),
            "sync must come first"
        );
        assert_eq!(
            replay(&events),
            store.snapshot(&role).unwrap_or_default(),
            "client of {} diverged",
            role
        );
    }
}

// ============================================================================
// Lifecycle Tests
// ============================================================================

#[tokio::test]
async fn test_close_drains_and_refuses() {
    let store = StateStore::new(StoreConfig::default());
    store.update(tree! { "a" => 1 }, "r").unwrap();
    let mut client = store.connect(&request("r")).unwrap();

    let store = Arc::new(store);
    let closing = tokio::spawn({
        let store = Arc::clone(&store);
        async move { store.close().await }
    });

    let mut received = Vec::new();
    while let Some(event) = client.recv().await {
        received.push(event);
    }
    assert_eq!(received.len(), 1);
    drop(client);
    closing.await.unwrap();

    assert_eq!(store.update(tree! { "a" => 2 }, "r"), Err(StoreError::Closed));
    assert_eq!(store.snapshot("r"), None);
    assert!(matches!(
        store.connect(&request("r")),
        Err(StoreError::Transport(_))
    ));
}

#[tokio::test]
async fn test_router_serves_event_stream() {
    use axum::body::{to_bytes, Body};
    use tower::ServiceExt;

    let store = Arc::new(StateStore::new(StoreConfig::default()));
    store.update(tree! { "hello" => "world" }, "viewer").unwrap();

    let app = Arc::clone(&store).router("/events");
    let response = app
        .oneshot(
            Request::builder()
                .uri("/events?role=viewer")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::OK);

    let closing = tokio::spawn({
        let store = Arc::clone(&store);
        async move { store.close().await }
    });
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    closing.await.unwrap();

    let body = String::from_utf8(body.to_vec()).unwrap();
    assert!(body.contains("event: sync"));
    assert!(body.contains("data: {\"hello\":\"world\"}"));
}
