//! Listener Registry Invariant Tests
//!
//! The contract of subscriptions and teardown:
//! - Subscribe then unsubscribe leaves no registry entry
//! - Unsubscribing with no prior subscription fails descriptively
//! - `onValue` suppresses the initial replay, forwards the second delivery
//! - The disconnect slot holds at most one pending registration

use std::sync::{Arc, Mutex};

use serde_json::{json, Value};

use signalfire::backend::{MemoryAuth, MemoryDatabase, MemoryFiles, RealtimeDatabase};
use signalfire::{OrderBy, Provider, ProviderError, QueryOptions, SignalHub, TreePath};

// =============================================================================
// Helper Functions
// =============================================================================

struct Fixture {
    db: Arc<MemoryDatabase>,
    hub: Arc<SignalHub>,
    provider: Provider,
}

fn setup() -> Fixture {
    let db = Arc::new(MemoryDatabase::new());
    let hub = Arc::new(SignalHub::new());
    let provider = Provider::new(
        Arc::clone(&db) as Arc<dyn RealtimeDatabase>,
        Arc::new(MemoryAuth::new()),
        Arc::new(MemoryFiles::new("test")),
        Arc::clone(&hub) as Arc<dyn signalfire::SignalRouter>,
    );
    Fixture { db, hub, provider }
}

fn capture(hub: &SignalHub, signal: &str) -> Arc<Mutex<Vec<Value>>> {
    let seen: Arc<Mutex<Vec<Value>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    hub.register(signal, move |payload| {
        sink.lock().unwrap().push(payload);
    });
    seen
}

async fn write(db: &MemoryDatabase, path: &str, value: Value) {
    db.set(&TreePath::parse(path).unwrap(), value).await.unwrap();
}

// =============================================================================
// Registry Invariants
// =============================================================================

#[tokio::test]
async fn test_subscribe_unsubscribe_leaves_no_entry() {
    let fx = setup();
    fx.provider
        .on_child_added("rows", "added", QueryOptions::default())
        .unwrap();
    assert_eq!(fx.provider.listener_count(), 1);

    fx.provider.off("rows", Some("onChildAdded")).unwrap();
    assert_eq!(fx.provider.listener_count(), 0);
    assert_eq!(fx.db.listener_count(), 0);
}

#[tokio::test]
async fn test_unsubscribe_without_subscription_always_fails() {
    let fx = setup();
    let err = fx.provider.off("rows", None).unwrap_err();
    assert!(matches!(err, ProviderError::NoListeners(path) if path == "rows"));

    // Registered path, wrong event.
    fx.provider
        .on_value("rows", "changed", QueryOptions::default())
        .unwrap();
    let err = fx.provider.off("rows", Some("onChildAdded")).unwrap_err();
    assert!(matches!(err, ProviderError::NoListenersForEvent(_, _)));
}

#[tokio::test]
async fn test_second_unsubscribe_fails_not_silently_succeeds() {
    let fx = setup();
    fx.provider
        .on_value("a", "changed", QueryOptions::default())
        .unwrap();
    fx.provider.off("a", Some("onValue")).unwrap();

    let err = fx.provider.off("a", Some("onValue")).unwrap_err();
    assert!(matches!(err, ProviderError::NoListeners(_)));
}

#[tokio::test]
async fn test_wildcard_teardown_spans_events_and_subpaths() {
    let fx = setup();
    fx.provider
        .on_value("chat.r1", "changed", QueryOptions::default())
        .unwrap();
    fx.provider
        .on_child_added("chat.r1.msgs", "added", QueryOptions::default())
        .unwrap();
    fx.provider
        .on_child_removed("chat.r2", "removed", QueryOptions::default())
        .unwrap();
    fx.provider
        .on_value("presence", "changed", QueryOptions::default())
        .unwrap();

    fx.provider.off("chat.*", None).unwrap();
    assert_eq!(fx.provider.listener_count(), 1);
    assert_eq!(fx.db.listener_count(), 1);
}

// =============================================================================
// onValue Delivery Semantics
// =============================================================================

#[tokio::test]
async fn test_on_value_first_event_suppressed_second_forwarded() {
    let fx = setup();
    let seen = capture(&fx.hub, "changed");
    write(&fx.db, "doc", json!("v1")).await;

    fx.provider
        .on_value("doc", "changed", QueryOptions::default())
        .unwrap();
    assert!(seen.lock().unwrap().is_empty(), "first native event suppressed");

    write(&fx.db, "doc", json!("v2")).await;
    {
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1, "second native event forwarded");
        assert_eq!(seen[0], json!({"value": "v2"}));
    }

    write(&fx.db, "doc", json!("v3")).await;
    assert_eq!(seen.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_per_path_delivery_order_matches_mutation_order() {
    let fx = setup();
    let seen = capture(&fx.hub, "added");
    fx.provider
        .on_child_added("rows", "added", QueryOptions::default())
        .unwrap();

    for n in 0..4 {
        write(&fx.db, &format!("rows.r{n}"), json!(n)).await;
    }

    let keys: Vec<String> = seen
        .lock()
        .unwrap()
        .iter()
        .map(|payload| payload["key"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(keys, vec!["r0", "r1", "r2", "r3"]);
}

#[tokio::test]
async fn test_filtered_child_subscription_skips_non_matching_children() {
    let fx = setup();
    let seen = capture(&fx.hub, "added");
    write(&fx.db, "rows.a", json!(5)).await;

    let options = QueryOptions::default()
        .order_by(OrderBy::Value)
        .equal_to(json!(1));
    fx.provider.on_child_added("rows", "added", options).unwrap();
    assert!(seen.lock().unwrap().is_empty(), "existing child outside the window");

    write(&fx.db, "rows.b", json!(1)).await;
    write(&fx.db, "rows.c", json!(9)).await;

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0], json!({"key": "b", "value": 1}));
}

#[tokio::test]
async fn test_detached_listener_receives_nothing_further() {
    let fx = setup();
    let seen = capture(&fx.hub, "changed");
    fx.provider
        .on_value("doc", "changed", QueryOptions::default())
        .unwrap();

    write(&fx.db, "doc", json!(1)).await;
    fx.provider.off("doc", Some("onValue")).unwrap();
    write(&fx.db, "doc", json!(2)).await;

    assert_eq!(seen.lock().unwrap().len(), 1);
}

// =============================================================================
// Disconnect Slot
// =============================================================================

#[tokio::test]
async fn test_disconnect_slot_single_registration() {
    let fx = setup();
    fx.provider
        .set_on_disconnect("status.me", json!("offline"))
        .unwrap();

    let err = fx
        .provider
        .set_on_disconnect("status.me", json!("away"))
        .unwrap_err();
    assert!(matches!(err, ProviderError::DisconnectAlreadySet));

    fx.provider.cancel_on_disconnect().unwrap();
    let err = fx.provider.cancel_on_disconnect().unwrap_err();
    assert!(matches!(err, ProviderError::NoDisconnectSet));
}

#[tokio::test]
async fn test_dispose_clears_listeners_and_disconnect() {
    let fx = setup();
    fx.provider
        .on_value("a", "changed", QueryOptions::default())
        .unwrap();
    fx.provider.set_on_disconnect("b", json!(1)).unwrap();

    fx.provider.dispose();
    assert_eq!(fx.provider.listener_count(), 0);
    assert_eq!(fx.db.listener_count(), 0);
    assert_eq!(fx.db.pending_disconnect_count(), 0);
}
