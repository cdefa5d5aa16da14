use std::sync::Arc;
use std::time::Duration;

use keyval_broker::store::MemoryStore;
use keyval_broker::Connection;
use keyval_broker::WatchConfig;
use keyval_broker::WatchEvent;
use tokio::sync::mpsc;
use tokio::time::timeout;

pub const EVENT_WAIT: Duration = Duration::from_secs(2);

pub fn memory_connection() -> (Connection, MemoryStore) {
    let store = MemoryStore::new();
    let conn = Connection::builder(Arc::new(store.clone()), Arc::new(store.clone()))
        .watch_config(WatchConfig {
            delivery_timeout_ms: 500,
        })
        .span(tracing::info_span!("integration"))
        .build();
    (conn, store)
}

pub async fn next_event(rx: &mut mpsc::Receiver<WatchEvent>) -> WatchEvent {
    timeout(EVENT_WAIT, rx.recv())
        .await
        .expect("no watch event in time")
        .expect("watch channel closed")
}

/// Unique key prefix so live tests do not trip over each other.
pub fn unique_prefix(test: &str) -> String {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    format!("/keyval-broker-test/{}/{}/", test, nanos)
}
