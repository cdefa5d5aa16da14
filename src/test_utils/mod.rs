//! Helpers shared by the unit tests.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::Span;

use crate::store::MemoryStore;
use crate::Connection;
use crate::WatchConfig;
use crate::WatchEvent;

/// Connection over a fresh in-memory store, logging into the current span.
pub(crate) fn memory_connection() -> (Connection, MemoryStore) {
    let store = MemoryStore::new();
    let conn = Connection::builder(Arc::new(store.clone()), Arc::new(store.clone()))
        .span(Span::current())
        .build();
    (conn, store)
}

pub(crate) fn memory_connection_with_watch(delivery_timeout_ms: u64) -> (Connection, MemoryStore) {
    let store = MemoryStore::new();
    let conn = Connection::builder(Arc::new(store.clone()), Arc::new(store.clone()))
        .watch_config(WatchConfig { delivery_timeout_ms })
        .span(Span::current())
        .build();
    (conn, store)
}

/// Receives exactly `n` events, failing the test if they do not arrive in time.
pub(crate) async fn recv_events(
    rx: &mut mpsc::Receiver<WatchEvent>,
    n: usize,
) -> Vec<WatchEvent> {
    let mut events = Vec::with_capacity(n);
    for i in 0..n {
        let event = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap_or_else(|_| panic!("timed out waiting for event {}", i))
            .expect("watch channel closed");
        events.push(event);
    }
    events
}

/// Asserts that no event arrives within `wait`.
pub(crate) async fn assert_no_event(
    rx: &mut mpsc::Receiver<WatchEvent>,
    wait: Duration,
) {
    if let Ok(Some(event)) = tokio::time::timeout(wait, rx.recv()).await {
        panic!("unexpected event {:?}", event);
    }
}
