//! Runs against a real etcd cluster.
//!
//! ```text
//! KEYVAL_BROKER__ETCD__ENDPOINTS=127.0.0.1:2379 cargo test -- --ignored
//! ```

use std::time::Duration;

use keyval_broker::BrokerConfig;
use keyval_broker::BytesBroker;
use keyval_broker::BytesWatcher;
use keyval_broker::Connection;
use keyval_broker::PutOptions;
use keyval_broker::WatchEventType;
use tokio::sync::mpsc;

use crate::common::next_event;
use crate::common::unique_prefix;

async fn live_connection() -> Connection {
    let config = BrokerConfig::load(None).expect("invalid broker config");
    Connection::open(&config).await.expect("etcd unreachable")
}

#[tokio::test]
#[ignore = "requires a running etcd, see KEYVAL_BROKER__ETCD__ENDPOINTS"]
async fn test_live_put_get_list_delete() {
    let conn = live_connection().await;
    let broker = conn.new_broker(&unique_prefix("crud"));

    broker.put("a", b"1", None).await.unwrap();
    broker.put("b", b"2", None).await.unwrap();

    let kv = broker.get_value("a").await.unwrap().unwrap();
    assert_eq!((kv.key(), kv.value()), ("a", &b"1"[..]));
    assert!(broker.get_value("missing").await.unwrap().is_none());

    let keys: Vec<String> = broker.list_keys("").await.unwrap().map(|(k, _)| k).collect();
    assert_eq!(keys, vec!["a", "b"]);

    let range: Vec<String> = broker
        .list_values_range("a", "b")
        .await
        .unwrap()
        .map(|kv| kv.key().to_string())
        .collect();
    assert_eq!(range, vec!["a"]);

    assert!(!broker.delete("a").await.unwrap());
    assert!(broker.delete("a").await.unwrap());

    let mut txn = broker.new_txn();
    txn.delete("b").put("c", b"3");
    txn.commit().await.unwrap();
    assert!(broker.get_value("b").await.unwrap().is_none());

    conn.close().unwrap();
}

#[tokio::test]
#[ignore = "requires a running etcd, see KEYVAL_BROKER__ETCD__ENDPOINTS"]
async fn test_live_watch_and_ttl() {
    let conn = live_connection().await;
    let broker = conn.new_broker(&unique_prefix("watch"));
    let (tx, mut rx) = mpsc::channel(8);
    broker.watch(tx, &["k"]).await.unwrap();

    broker
        .put("k", b"v", Some(PutOptions::new().with_ttl(Duration::from_secs(2))))
        .await
        .unwrap();
    let put = next_event(&mut rx).await;
    assert_eq!((put.event_type(), put.key()), (WatchEventType::Put, "k"));

    // etcd expires leases on its own clock
    tokio::time::sleep(Duration::from_secs(4)).await;
    let expired = next_event(&mut rx).await;
    assert_eq!(expired.event_type(), WatchEventType::Delete);

    conn.close().unwrap();
    assert!(tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .unwrap()
        .is_none());
}
