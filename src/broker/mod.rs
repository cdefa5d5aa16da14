//! Broker layer: connection lifecycle, prefix-scoped views, transactions and
//! watch registration.
//!
//! - [`Connection`] - owns the remote session and the shutdown token
//! - [`Broker`] - prefix-scoped view sharing a connection's session
//! - [`Transaction`] - staged put/delete operations committed atomically
//!
//! Both `Connection` and `Broker` implement [`BytesBroker`] and
//! [`BytesWatcher`], so plugins can be written against the traits and handed
//! either a scoped or an unscoped view.
//!
//! # Basic Usage
//! ```no_run
//! use keyval_broker::{BrokerConfig, BytesBroker, BytesWatcher, Connection, PutOptions};
//! use std::time::Duration;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> keyval_broker::Result<()> {
//!     let config = BrokerConfig::load(None)?;
//!     let conn = Connection::open(&config).await?;
//!
//!     let broker = conn.new_broker("/vnf-agent/");
//!     broker.put("config/mtu", b"1500", None).await?;
//!     broker
//!         .put("status/alive", b"1", Some(PutOptions::new().with_ttl(Duration::from_secs(10))))
//!         .await?;
//!
//!     let (tx, mut rx) = tokio::sync::mpsc::channel(64);
//!     broker.watch(tx, &["config/"]).await?;
//!     if let Some(event) = rx.recv().await {
//!         println!("{} changed", event.key());
//!     }
//!
//!     conn.close()
//! }
//! ```

mod access;
mod broker;
mod connection;
mod txn;

pub(crate) use access::*;
pub use broker::*;
pub use connection::*;
pub use txn::*;


use tokio::sync::mpsc;
use tonic::async_trait;

use crate::KeyIterator;
use crate::KeyVal;
use crate::KeyValIterator;
use crate::PutOptions;
use crate::Result;
use crate::WatchEvent;

/// Read/write access to a (possibly prefix-scoped) key space.
#[async_trait]
pub trait BytesBroker: Send + Sync {
    /// Writes `value` under `key`.
    ///
    /// With a TTL in `options`, a new lease is granted first and attached to
    /// the write; if the grant fails nothing is written.
    async fn put(
        &self,
        key: &str,
        value: &[u8],
        options: Option<PutOptions>,
    ) -> Result<()>;

    /// Reads one key.
    ///
    /// # Returns
    /// - `Ok(Some(record))` with the value and its modification revision
    /// - `Ok(None)` if the key does not exist
    async fn get_value(
        &self,
        key: &str,
    ) -> Result<Option<KeyVal>>;

    /// All records whose key starts with `key_prefix`.
    async fn list_values(
        &self,
        key_prefix: &str,
    ) -> Result<KeyValIterator>;

    /// Records in the half-open range `[from, to)`.
    ///
    /// As with etcd range ends, an empty `to` reads the single key `from`
    /// and [`RANGE_END_OPEN`](crate::constants::RANGE_END_OPEN) (`"\0"`)
    /// reads up to the end of this view's key space.
    async fn list_values_range(
        &self,
        from: &str,
        to: &str,
    ) -> Result<KeyValIterator>;

    /// Keys (with revisions) starting with `key_prefix`; values are not
    /// transferred.
    async fn list_keys(
        &self,
        key_prefix: &str,
    ) -> Result<KeyIterator>;

    /// Removes `key`.
    ///
    /// # Returns
    /// - `Ok(true)` if **no** matching key existed, so nothing was deleted
    /// - `Ok(false)` if a value was deleted
    async fn delete(
        &self,
        key: &str,
    ) -> Result<bool>;

    /// New transaction over this view's key space; keys are given relative
    /// to the view.
    fn new_txn(&self) -> Transaction;
}

/// Change subscription on a (possibly prefix-scoped) key space.
#[async_trait]
pub trait BytesWatcher: Send + Sync {
    /// Starts one subscription per entry of `keys`, each treated as a prefix.
    ///
    /// Events are pushed to `events`; an event the consumer does not take
    /// within the configured delivery timeout is dropped. Registration stops
    /// at the first failing key and returns its error; watches registered
    /// before it stay active. Watches end when the connection closes.
    async fn watch(
        &self,
        events: mpsc::Sender<WatchEvent>,
        keys: &[&str],
    ) -> Result<()>;
}
