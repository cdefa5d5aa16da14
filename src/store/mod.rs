//! Remote store seam.
//!
//! Brokers never talk to a client library directly. They go through the
//! [`KvStore`] and [`Lessor`] capability traits, which have three
//! implementations:
//! - [`EtcdStore`] - etcd v3 over gRPC
//! - [`MemoryStore`] - in-process revisioned store
//! - [`ScopedStore`] - decorator that confines any `KvStore` to a key prefix
//!
//! Scoped and unscoped handles are interchangeable through `Arc<dyn KvStore>`.

mod etcd_store;
mod mem_store;
mod scoped;

pub use etcd_store::*;
pub use mem_store::*;
pub use scoped::*;

#[cfg(test)]
mod mem_store_test;

use futures::stream::BoxStream;
#[cfg(test)]
use mockall::automock;
use tonic::async_trait;

use crate::KeyVal;
use crate::LeaseId;
use crate::Result;
use crate::Revision;

/// Keys addressed by a read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyRange {
    /// Exactly one key
    Key(String),
    /// Every key starting with the prefix
    Prefix(String),
    /// Half-open `[from, to)`; `to = None` means no upper bound
    Range { from: String, to: Option<String> },
}

/// One staged transaction operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxnOp {
    Put { key: String, value: Vec<u8> },
    Delete { key: String },
}

impl TxnOp {
    pub fn key(&self) -> &str {
        match self {
            TxnOp::Put { key, .. } | TxnOp::Delete { key } => key,
        }
    }
}

/// Kind of a remote change notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Create,
    Modify,
    Delete,
}

/// A single change as reported by the store's watch stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub kind: ChangeKind,
    pub key: String,
    /// New value for create/modify; `None` for deletes
    pub value: Option<Vec<u8>>,
    pub revision: Revision,
}

impl Change {
    pub fn put(
        kind: ChangeKind,
        key: impl Into<String>,
        value: impl Into<Vec<u8>>,
        revision: Revision,
    ) -> Self {
        Self {
            kind,
            key: key.into(),
            value: Some(value.into()),
            revision,
        }
    }

    pub fn delete(
        key: impl Into<String>,
        revision: Revision,
    ) -> Self {
        Self {
            kind: ChangeKind::Delete,
            key: key.into(),
            value: None,
            revision,
        }
    }
}

/// Notification batches of one watch subscription, until the session closes
pub type ChangeStream = BoxStream<'static, Result<Vec<Change>>>;

/// Key-value capability of a remote session.
///
/// All implementations are `Send + Sync` and safe to share between brokers;
/// concurrency control of the data itself is left to the store.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait KvStore: Send + Sync + 'static {
    /// Writes `key`, optionally attached to a lease, and returns the new revision.
    async fn put(
        &self,
        key: &str,
        value: Vec<u8>,
        lease: Option<LeaseId>,
    ) -> Result<Revision>;

    /// Reads every key in `range` in key order.
    ///
    /// With `keys_only` the store omits the values.
    async fn range(
        &self,
        range: KeyRange,
        keys_only: bool,
    ) -> Result<Vec<KeyVal>>;

    /// Removes `key` and returns how many keys were deleted.
    async fn delete(
        &self,
        key: &str,
    ) -> Result<i64>;

    /// Applies all operations atomically, or none of them.
    async fn txn(
        &self,
        ops: Vec<TxnOp>,
    ) -> Result<()>;

    /// Subscribes to changes of every key starting with `prefix`.
    ///
    /// The subscription is registered when this returns.
    async fn watch(
        &self,
        prefix: &str,
    ) -> Result<ChangeStream>;

    /// Releases the session. Later calls fail with `Error::ConnectionClosed`.
    fn close(&self) -> Result<()>;
}

/// Lease capability of a remote session
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Lessor: Send + Sync + 'static {
    /// Grants a new lease expiring after `ttl_secs` seconds.
    async fn grant(
        &self,
        ttl_secs: i64,
    ) -> Result<LeaseId>;
}
