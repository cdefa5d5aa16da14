//! Operations shared by `Connection` and `Broker`.
//!
//! Both types are thin shells around an [`Access`]: a store handle (scoped or
//! root) plus the session context shared by every view of one connection.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::Instrument;
use tracing::Span;

use super::Transaction;
use crate::store::KeyRange;
use crate::store::KvStore;
use crate::store::Lessor;
use crate::watch::WatchTranslator;
use crate::constants::RANGE_END_OPEN;
use crate::KeyIterator;
use crate::KeyVal;
use crate::KeyValIterator;
use crate::PutOptions;
use crate::Result;
use crate::WatchConfig;
use crate::WatchEvent;

/// State owned by a connection and shared, read-only, with its brokers
pub(crate) struct SessionContext {
    pub(crate) lessor: Arc<dyn Lessor>,

    /// Fired exactly once by `Connection::close`
    pub(crate) shutdown: CancellationToken,

    pub(crate) watch: WatchConfig,

    /// Injected logging context for every operation and watch task
    pub(crate) span: Span,
}

#[derive(Clone)]
pub(crate) struct Access {
    pub(crate) store: Arc<dyn KvStore>,
    pub(crate) ctx: Arc<SessionContext>,
}

impl Access {
    pub(crate) async fn put(
        &self,
        key: &str,
        value: &[u8],
        options: Option<PutOptions>,
    ) -> Result<()> {
        async {
            let lease = match options.and_then(|o| o.lease_ttl_secs()) {
                Some(ttl_secs) => match self.ctx.lessor.grant(ttl_secs).await {
                    Ok(id) => Some(id),
                    Err(e) => {
                        error!(key, ttl_secs, "lease grant error: {}", e);
                        return Err(e);
                    }
                },
                None => None,
            };

            match self.store.put(key, value.to_vec(), lease).await {
                Ok(revision) => {
                    debug!(key, revision, ?lease, "put");
                    Ok(())
                }
                Err(e) => {
                    error!(key, "put error: {}", e);
                    Err(e)
                }
            }
        }
        .instrument(self.ctx.span.clone())
        .await
    }

    pub(crate) async fn get_value(
        &self,
        key: &str,
    ) -> Result<Option<KeyVal>> {
        async {
            match self.store.range(KeyRange::Key(key.to_string()), false).await {
                Ok(records) => Ok(records.into_iter().next()),
                Err(e) => {
                    error!(key, "get error: {}", e);
                    Err(e)
                }
            }
        }
        .instrument(self.ctx.span.clone())
        .await
    }

    pub(crate) async fn list_values(
        &self,
        key_prefix: &str,
    ) -> Result<KeyValIterator> {
        self.list(KeyRange::Prefix(key_prefix.to_string()), false)
            .await
            .map(KeyValIterator::new)
    }

    pub(crate) async fn list_values_range(
        &self,
        from: &str,
        to: &str,
    ) -> Result<KeyValIterator> {
        self.list(value_range(from, to), false).await.map(KeyValIterator::new)
    }

    pub(crate) async fn list_keys(
        &self,
        key_prefix: &str,
    ) -> Result<KeyIterator> {
        self.list(KeyRange::Prefix(key_prefix.to_string()), true)
            .await
            .map(KeyIterator::new)
    }

    async fn list(
        &self,
        range: KeyRange,
        keys_only: bool,
    ) -> Result<Vec<KeyVal>> {
        async {
            match self.store.range(range.clone(), keys_only).await {
                Ok(records) => Ok(records),
                Err(e) => {
                    error!(?range, keys_only, "list error: {}", e);
                    Err(e)
                }
            }
        }
        .instrument(self.ctx.span.clone())
        .await
    }

    pub(crate) async fn delete(
        &self,
        key: &str,
    ) -> Result<bool> {
        async {
            match self.store.delete(key).await {
                // true means "no matching key found", not "deleted"
                Ok(deleted) => Ok(deleted == 0),
                Err(e) => {
                    error!(key, "delete error: {}", e);
                    Err(e)
                }
            }
        }
        .instrument(self.ctx.span.clone())
        .await
    }

    pub(crate) fn new_txn(&self) -> Transaction {
        Transaction::new(self.store.clone(), self.ctx.span.clone())
    }

    pub(crate) async fn watch(
        &self,
        events: mpsc::Sender<WatchEvent>,
        keys: &[&str],
    ) -> Result<()> {
        async {
            for key in keys {
                let stream = match self.store.watch(key).await {
                    Ok(stream) => stream,
                    Err(e) => {
                        error!(key, "watch error: {}", e);
                        return Err(e);
                    }
                };
                WatchTranslator::new(
                    *key,
                    stream,
                    events.clone(),
                    self.ctx.shutdown.clone(),
                    self.ctx.watch.delivery_timeout(),
                )
                .spawn(self.ctx.span.clone());
            }
            Ok(())
        }
        .instrument(self.ctx.span.clone())
        .await
    }
}

/// Maps a `[from, to)` request onto a store range the way etcd reads a range
/// end: empty selects `from` alone, `"\0"` leaves the range open-ended.
fn value_range(
    from: &str,
    to: &str,
) -> KeyRange {
    match to {
        "" => KeyRange::Key(from.to_string()),
        RANGE_END_OPEN => KeyRange::Range {
            from: from.to_string(),
            to: None,
        },
        to => KeyRange::Range {
            from: from.to_string(),
            to: Some(to.to_string()),
        },
    }
}
