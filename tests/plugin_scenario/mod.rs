//! End-to-end flows through the public API, backed by the in-memory store.

use std::time::Duration;

use keyval_broker::BytesBroker;
use keyval_broker::BytesWatcher;
use keyval_broker::Error;
use keyval_broker::PutOptions;
use keyval_broker::WatchEvent;
use keyval_broker::WatchEventType;
use keyval_broker::ROOT;
use tokio::sync::mpsc;

use crate::common::memory_connection;
use crate::common::next_event;

/// Plugins receive a trait object and never know their prefix.
async fn write_interface_config(broker: &dyn BytesBroker) -> keyval_broker::Result<()> {
    let mut txn = broker.new_txn();
    txn.put("interfaces/eth0", b"{\"mtu\":1500}")
        .put("interfaces/eth1", b"{\"mtu\":9000}");
    txn.commit().await
}

#[tokio::test]
async fn test_agent_config_round_trip() {
    let (conn, _store) = memory_connection();
    let agent = conn.new_broker("/vnf-agent/vpp1/");

    write_interface_config(&agent).await.unwrap();

    let listed: Vec<(String, Vec<u8>)> = agent
        .list_values("interfaces/")
        .await
        .unwrap()
        .map(|kv| (kv.key().to_string(), kv.into_value()))
        .collect();
    assert_eq!(
        listed,
        vec![
            ("interfaces/eth0".to_string(), b"{\"mtu\":1500}".to_vec()),
            ("interfaces/eth1".to_string(), b"{\"mtu\":9000}".to_vec()),
        ]
    );

    // Same data seen from the root
    let root = conn.new_broker(ROOT);
    let keys: Vec<String> = root
        .list_keys("/vnf-agent/")
        .await
        .unwrap()
        .map(|(key, _)| key)
        .collect();
    assert_eq!(
        keys,
        vec!["/vnf-agent/vpp1/interfaces/eth0", "/vnf-agent/vpp1/interfaces/eth1"]
    );
}

#[tokio::test]
async fn test_watcher_sees_changes_made_by_another_broker() {
    let (conn, _store) = memory_connection();
    let watcher = conn.new_watcher("/vnf-agent/vpp1/");
    let writer = conn.new_broker("/vnf-agent/");

    let (tx, mut rx) = mpsc::channel(8);
    watcher.watch(tx, &["interfaces/"]).await.unwrap();

    writer.put("vpp1/interfaces/eth0", b"up", None).await.unwrap();
    writer.put("vpp1/interfaces/eth0", b"down", None).await.unwrap();
    assert!(!writer.delete("vpp1/interfaces/eth0").await.unwrap());

    let events = vec![
        next_event(&mut rx).await,
        next_event(&mut rx).await,
        next_event(&mut rx).await,
    ];
    assert_eq!(
        events.iter().map(WatchEvent::event_type).collect::<Vec<_>>(),
        vec![WatchEventType::Put, WatchEventType::Put, WatchEventType::Delete]
    );
    assert!(events.iter().all(|e| e.key() == "interfaces/eth0"));
    assert_eq!(events[1].value(), Some(&b"down"[..]));
}

#[tokio::test(start_paused = true)]
async fn test_status_key_with_ttl_disappears() {
    let (conn, store) = memory_connection();
    let agent = conn.new_broker("/vnf-agent/vpp1/");

    let (tx, mut rx) = mpsc::channel(8);
    agent.watch(tx, &["status/"]).await.unwrap();

    agent
        .put(
            "status/alive",
            b"1",
            Some(PutOptions::new().with_ttl(Duration::from_secs(3))),
        )
        .await
        .unwrap();
    assert_eq!(next_event(&mut rx).await.event_type(), WatchEventType::Put);

    tokio::time::advance(Duration::from_secs(3)).await;
    assert!(agent.get_value("status/alive").await.unwrap().is_none());
    assert_eq!(store.lease_count(), 0);

    let expired = next_event(&mut rx).await;
    assert_eq!(expired.event_type(), WatchEventType::Delete);
    assert_eq!(expired.key(), "status/alive");
}

#[tokio::test]
async fn test_close_ends_everything() {
    let (conn, _store) = memory_connection();
    let agent = conn.new_broker("/vnf-agent/");
    let (tx, mut rx) = mpsc::channel(8);
    agent.watch(tx, &["a/", "b/"]).await.unwrap();

    conn.close().unwrap();

    assert!(tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .unwrap()
        .is_none());
    assert!(matches!(
        agent.put("a/x", b"1", None).await,
        Err(Error::ConnectionClosed)
    ));
    // Second close is harmless
    conn.close().unwrap();
}
