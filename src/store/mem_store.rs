//! In-process revisioned store.
//!
//! Mirrors the parts of etcd semantics that brokers rely on:
//! - one global revision, bumped once per put, delete or transaction
//! - keys kept in byte order
//! - transactions validated up front and applied all-or-nothing
//! - leases whose expiry deletes every attached key in one revision
//! - prefix watches fed from a broadcast of change batches
//!
//! Lease expiry is lazy: expired leases are reaped at the start of the next
//! store call, and the resulting deletes are published to watchers then.

use std::collections::BTreeMap;
use std::collections::HashSet;
use std::ops::Bound;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicI64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::RwLock;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tonic::async_trait;
use tracing::debug;
use tracing::trace;

use super::Change;
use super::ChangeKind;
use super::ChangeStream;
use super::KeyRange;
use super::KvStore;
use super::Lessor;
use super::TxnOp;
use crate::constants::DEFAULT_MAX_TXN_OPS;
use crate::constants::MEMORY_WATCH_CAPACITY;
use crate::Error;
use crate::KeyVal;
use crate::LeaseId;
use crate::RemoteCallError;
use crate::Result;
use crate::Revision;

/// Upper bound for lease lifetimes that overflow `Instant`
const MAX_LEASE_TTL: Duration = Duration::from_secs(100 * 365 * 24 * 3600);

/// Cloneable handle to an in-memory store; clones share the same data.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    inner: Arc<MemoryStoreInner>,
}

#[derive(Debug)]
struct MemoryStoreInner {
    state: RwLock<MemState>,

    /// lease id → expiration deadline
    leases: DashMap<LeaseId, Instant>,

    next_lease_id: AtomicI64,

    changes: broadcast::Sender<Arc<Vec<Change>>>,

    closed: AtomicBool,

    max_txn_ops: usize,
}

#[derive(Debug, Default)]
struct MemState {
    revision: Revision,
    data: BTreeMap<String, StoredValue>,
}

#[derive(Debug, Clone)]
struct StoredValue {
    value: Vec<u8>,
    create_revision: Revision,
    mod_revision: Revision,
    lease: Option<LeaseId>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_max_txn_ops(DEFAULT_MAX_TXN_OPS)
    }

    /// Store rejecting transactions with more than `max_txn_ops` operations.
    pub fn with_max_txn_ops(max_txn_ops: usize) -> Self {
        let (changes, _) = broadcast::channel(MEMORY_WATCH_CAPACITY);
        Self {
            inner: Arc::new(MemoryStoreInner {
                state: RwLock::new(MemState::default()),
                leases: DashMap::new(),
                next_lease_id: AtomicI64::new(1),
                changes,
                closed: AtomicBool::new(false),
                max_txn_ops,
            }),
        }
    }

    /// Current store revision
    pub fn revision(&self) -> Revision {
        self.inner.state.read().revision
    }

    /// Number of live (not yet reaped) leases
    pub fn lease_count(&self) -> usize {
        self.inner.leases.len()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(Error::ConnectionClosed);
        }
        self.reap_expired_leases();
        Ok(())
    }

    fn reap_expired_leases(&self) {
        let now = Instant::now();

        // Collect first, remove after the iterator is dropped
        let expired: Vec<LeaseId> = self
            .inner
            .leases
            .iter()
            .filter(|entry| *entry.value() <= now)
            .map(|entry| *entry.key())
            .collect();
        let expired: HashSet<LeaseId> = expired
            .into_iter()
            .filter(|id| self.inner.leases.remove_if(id, |_, deadline| *deadline <= now).is_some())
            .collect();
        if expired.is_empty() {
            return;
        }

        let mut state = self.inner.state.write();
        let keys: Vec<String> = state
            .data
            .iter()
            .filter(|(_, v)| v.lease.is_some_and(|id| expired.contains(&id)))
            .map(|(k, _)| k.clone())
            .collect();
        debug!(leases = ?expired, keys = keys.len(), "Leases expired");
        if keys.is_empty() {
            return;
        }

        state.revision += 1;
        let revision = state.revision;
        let mut batch = Vec::with_capacity(keys.len());
        for key in keys {
            state.data.remove(&key);
            batch.push(Change::delete(key, revision));
        }
        self.publish(batch);
    }

    fn check_lease(
        &self,
        lease: Option<LeaseId>,
    ) -> Result<()> {
        match lease {
            Some(id) if !self.inner.leases.contains_key(&id) => {
                Err(RemoteCallError::LeaseNotFound(id).into())
            }
            _ => Ok(()),
        }
    }

    /// Must be called with the state write lock held so that batches are
    /// published in revision order.
    fn publish(
        &self,
        batch: Vec<Change>,
    ) {
        // No subscribers is fine
        let _ = self.inner.changes.send(Arc::new(batch));
    }
}

fn apply_put(
    state: &mut MemState,
    key: &str,
    value: Vec<u8>,
    lease: Option<LeaseId>,
    revision: Revision,
) -> Change {
    let (kind, create_revision) = match state.data.get(key) {
        Some(existing) => (ChangeKind::Modify, existing.create_revision),
        None => (ChangeKind::Create, revision),
    };
    state.data.insert(
        key.to_string(),
        StoredValue {
            value: value.clone(),
            create_revision,
            mod_revision: revision,
            lease,
        },
    );
    Change::put(kind, key, value, revision)
}

fn in_range(
    key: &str,
    range: &KeyRange,
) -> bool {
    match range {
        KeyRange::Key(k) => key == k,
        KeyRange::Prefix(p) => key.starts_with(p.as_str()),
        KeyRange::Range { from, to } => {
            key >= from.as_str() && to.as_deref().map_or(true, |to| key < to)
        }
    }
}

fn range_bounds(range: &KeyRange) -> (Bound<String>, Bound<String>) {
    match range {
        KeyRange::Key(k) => (Bound::Included(k.clone()), Bound::Included(k.clone())),
        KeyRange::Prefix(p) => (Bound::Included(p.clone()), Bound::Unbounded),
        KeyRange::Range { from, to } => (
            Bound::Included(from.clone()),
            to.clone().map_or(Bound::Unbounded, Bound::Excluded),
        ),
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn put(
        &self,
        key: &str,
        value: Vec<u8>,
        lease: Option<LeaseId>,
    ) -> Result<Revision> {
        self.ensure_open()?;
        self.check_lease(lease)?;

        let mut state = self.inner.state.write();
        state.revision += 1;
        let revision = state.revision;
        let change = apply_put(&mut state, key, value, lease, revision);
        trace!(key, revision, "put");
        self.publish(vec![change]);
        Ok(revision)
    }

    async fn range(
        &self,
        range: KeyRange,
        keys_only: bool,
    ) -> Result<Vec<KeyVal>> {
        self.ensure_open()?;

        if let KeyRange::Range { from, to: Some(to) } = &range {
            if to <= from {
                return Ok(Vec::new());
            }
        }

        let state = self.inner.state.read();
        let result = state
            .data
            .range(range_bounds(&range))
            .take_while(|(key, _)| in_range(key, &range))
            .map(|(key, stored)| {
                let value = if keys_only {
                    Vec::new()
                } else {
                    stored.value.clone()
                };
                KeyVal::new(key.clone(), value, stored.mod_revision)
            })
            .collect();
        Ok(result)
    }

    async fn delete(
        &self,
        key: &str,
    ) -> Result<i64> {
        self.ensure_open()?;

        let mut state = self.inner.state.write();
        if !state.data.contains_key(key) {
            return Ok(0);
        }
        state.revision += 1;
        let revision = state.revision;
        state.data.remove(key);
        self.publish(vec![Change::delete(key, revision)]);
        Ok(1)
    }

    async fn txn(
        &self,
        ops: Vec<TxnOp>,
    ) -> Result<()> {
        self.ensure_open()?;

        if ops.len() > self.inner.max_txn_ops {
            return Err(RemoteCallError::TooManyTxnOps {
                count: ops.len(),
                max: self.inner.max_txn_ops,
            }
            .into());
        }
        {
            let mut seen = HashSet::with_capacity(ops.len());
            for op in &ops {
                if !seen.insert(op.key()) {
                    return Err(RemoteCallError::DuplicateTxnKey(op.key().to_string()).into());
                }
            }
        }

        let mut state = self.inner.state.write();
        // A transaction that changes nothing does not bump the revision
        let changes_anything = ops.iter().any(|op| match op {
            TxnOp::Put { .. } => true,
            TxnOp::Delete { key } => state.data.contains_key(key),
        });
        if !changes_anything {
            return Ok(());
        }

        state.revision += 1;
        let revision = state.revision;
        let mut batch = Vec::with_capacity(ops.len());
        for op in ops {
            match op {
                TxnOp::Put { key, value } => {
                    batch.push(apply_put(&mut state, &key, value, None, revision));
                }
                TxnOp::Delete { key } => {
                    if state.data.remove(&key).is_some() {
                        batch.push(Change::delete(key, revision));
                    }
                }
            }
        }
        self.publish(batch);
        Ok(())
    }

    async fn watch(
        &self,
        prefix: &str,
    ) -> Result<ChangeStream> {
        self.ensure_open()?;

        let prefix = prefix.to_string();
        let stream = BroadcastStream::new(self.inner.changes.subscribe()).filter_map(move |item| {
            match item {
                Ok(batch) => {
                    let matched: Vec<Change> = batch
                        .iter()
                        .filter(|change| change.key.starts_with(prefix.as_str()))
                        .cloned()
                        .collect();
                    (!matched.is_empty()).then_some(Ok(matched))
                }
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    Some(Err(RemoteCallError::WatchLagged(skipped).into()))
                }
            }
        });
        Ok(Box::pin(stream))
    }

    fn close(&self) -> Result<()> {
        self.inner.closed.store(true, Ordering::Release);
        Ok(())
    }
}

#[async_trait]
impl Lessor for MemoryStore {
    async fn grant(
        &self,
        ttl_secs: i64,
    ) -> Result<LeaseId> {
        self.ensure_open()?;
        if ttl_secs <= 0 {
            return Err(RemoteCallError::InvalidTtl(ttl_secs).into());
        }

        let id = self.inner.next_lease_id.fetch_add(1, Ordering::Relaxed);
        let now = Instant::now();
        // Clamp TTLs too large for the clock
        let deadline = now
            .checked_add(Duration::from_secs(ttl_secs as u64))
            .unwrap_or_else(|| now + MAX_LEASE_TTL);
        self.inner.leases.insert(id, deadline);
        trace!(lease = id, ttl_secs, "lease granted");
        Ok(id)
    }
}
