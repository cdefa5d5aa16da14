use std::time::Duration;

use futures::StreamExt;
use tokio::time::timeout;

use super::*;
use crate::Error;
use crate::RemoteCallError;

async fn next_batch(stream: &mut ChangeStream) -> Vec<Change> {
    timeout(Duration::from_secs(1), stream.next())
        .await
        .expect("no batch in time")
        .expect("stream ended")
        .expect("stream error")
}

#[tokio::test]
async fn test_put_bumps_revision_and_classifies_changes() {
    let store = MemoryStore::new();
    let mut stream = store.watch("").await.unwrap();

    let r1 = store.put("a", b"1".to_vec(), None).await.unwrap();
    let r2 = store.put("a", b"2".to_vec(), None).await.unwrap();
    assert_eq!((r1, r2), (1, 2));

    assert_eq!(
        next_batch(&mut stream).await,
        vec![Change::put(ChangeKind::Create, "a", b"1".to_vec(), 1)]
    );
    assert_eq!(
        next_batch(&mut stream).await,
        vec![Change::put(ChangeKind::Modify, "a", b"2".to_vec(), 2)]
    );
}

#[tokio::test]
async fn test_range_variants() {
    let store = MemoryStore::new();
    for key in ["a", "ab", "abc", "b", "c"] {
        store.put(key, key.as_bytes().to_vec(), None).await.unwrap();
    }

    let keys = |records: Vec<KeyVal>| -> Vec<String> {
        records.into_iter().map(|kv| kv.key().to_string()).collect()
    };

    assert_eq!(
        keys(store.range(KeyRange::Key("ab".to_string()), false).await.unwrap()),
        vec!["ab"]
    );
    assert_eq!(
        keys(store.range(KeyRange::Prefix("ab".to_string()), false).await.unwrap()),
        vec!["ab", "abc"]
    );
    assert_eq!(
        keys(
            store
                .range(
                    KeyRange::Range {
                        from: "ab".to_string(),
                        to: Some("c".to_string()),
                    },
                    false,
                )
                .await
                .unwrap()
        ),
        vec!["ab", "abc", "b"]
    );
    assert_eq!(
        keys(
            store
                .range(
                    KeyRange::Range {
                        from: "b".to_string(),
                        to: None,
                    },
                    false,
                )
                .await
                .unwrap()
        ),
        vec!["b", "c"]
    );
    // Inverted bounds
    assert!(store
        .range(
            KeyRange::Range {
                from: "c".to_string(),
                to: Some("a".to_string()),
            },
            false,
        )
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_keys_only_omits_values() {
    let store = MemoryStore::new();
    store.put("k", b"value".to_vec(), None).await.unwrap();

    let records = store.range(KeyRange::Prefix(String::new()), true).await.unwrap();
    assert_eq!(records, vec![KeyVal::new("k", Vec::new(), 1)]);
}

#[tokio::test]
async fn test_delete_counts() {
    let store = MemoryStore::new();
    store.put("k", b"v".to_vec(), None).await.unwrap();

    assert_eq!(store.delete("k").await.unwrap(), 1);
    assert_eq!(store.delete("k").await.unwrap(), 0);
    // A miss does not bump the revision
    assert_eq!(store.revision(), 2);
}

#[tokio::test]
async fn test_put_with_unknown_lease_fails() {
    let store = MemoryStore::new();

    let err = store.put("k", b"v".to_vec(), Some(99)).await.unwrap_err();
    assert!(matches!(err, Error::Remote(RemoteCallError::LeaseNotFound(99))));
    assert_eq!(store.revision(), 0);
}

#[tokio::test]
async fn test_grant_rejects_non_positive_ttl() {
    let store = MemoryStore::new();

    assert!(matches!(
        store.grant(0).await,
        Err(Error::Remote(RemoteCallError::InvalidTtl(0)))
    ));
    assert!(matches!(
        store.grant(-5).await,
        Err(Error::Remote(RemoteCallError::InvalidTtl(-5)))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_lease_expiry_deletes_attached_keys_in_one_revision() {
    let store = MemoryStore::new();
    let lease = store.grant(5).await.unwrap();
    store.put("a", b"1".to_vec(), Some(lease)).await.unwrap();
    store.put("b", b"2".to_vec(), Some(lease)).await.unwrap();
    store.put("c", b"3".to_vec(), None).await.unwrap();
    let mut stream = store.watch("").await.unwrap();

    tokio::time::advance(Duration::from_secs(5)).await;

    let remaining = store.range(KeyRange::Prefix(String::new()), false).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].key(), "c");
    assert_eq!(store.revision(), 4);
    assert_eq!(
        next_batch(&mut stream).await,
        vec![Change::delete("a", 4), Change::delete("b", 4)]
    );
}

#[tokio::test]
async fn test_txn_is_one_revision_and_one_batch() {
    let store = MemoryStore::new();
    store.put("old", b"x".to_vec(), None).await.unwrap();
    let mut stream = store.watch("").await.unwrap();

    store
        .txn(vec![
            TxnOp::Put {
                key: "a".to_string(),
                value: b"1".to_vec(),
            },
            TxnOp::Delete {
                key: "old".to_string(),
            },
            TxnOp::Delete {
                key: "missing".to_string(),
            },
        ])
        .await
        .unwrap();

    assert_eq!(store.revision(), 2);
    assert_eq!(
        next_batch(&mut stream).await,
        vec![
            Change::put(ChangeKind::Create, "a", b"1".to_vec(), 2),
            Change::delete("old", 2),
        ]
    );
}

#[tokio::test]
async fn test_txn_without_effect_keeps_revision() {
    let store = MemoryStore::new();

    store
        .txn(vec![TxnOp::Delete {
            key: "missing".to_string(),
        }])
        .await
        .unwrap();
    assert_eq!(store.revision(), 0);
}

#[tokio::test]
async fn test_watch_filters_by_prefix() {
    let store = MemoryStore::new();
    let mut stream = store.watch("/a/").await.unwrap();

    store.put("/b/1", b"x".to_vec(), None).await.unwrap();
    store.put("/a/1", b"y".to_vec(), None).await.unwrap();

    let batch = next_batch(&mut stream).await;
    assert_eq!(batch.len(), 1);
    assert_eq!(batch[0].key, "/a/1");
    assert_eq!(batch[0].revision, 2);
}

#[tokio::test]
async fn test_lagging_watcher_gets_error() {
    let store = MemoryStore::new();
    let mut stream = store.watch("").await.unwrap();

    for i in 0..(crate::constants::MEMORY_WATCH_CAPACITY + 10) {
        store.put("k", i.to_string().into_bytes(), None).await.unwrap();
    }

    let item = stream.next().await.unwrap();
    assert!(matches!(
        item,
        Err(Error::Remote(RemoteCallError::WatchLagged(n))) if n > 0
    ));
}

#[tokio::test]
async fn test_closed_store_rejects_calls() {
    let store = MemoryStore::new();
    store.close().unwrap();
    store.close().unwrap();

    assert!(matches!(store.put("k", Vec::new(), None).await, Err(Error::ConnectionClosed)));
    assert!(matches!(store.grant(1).await, Err(Error::ConnectionClosed)));
    assert!(matches!(store.watch("").await, Err(Error::ConnectionClosed)));
}

#[tokio::test]
async fn test_clones_share_state() {
    let store = MemoryStore::new();
    let other = store.clone();

    store.put("k", b"v".to_vec(), None).await.unwrap();
    assert_eq!(other.range(KeyRange::Key("k".to_string()), false).await.unwrap().len(), 1);
    assert_eq!(other.revision(), 1);
}
