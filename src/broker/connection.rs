use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tonic::async_trait;
use tracing::error;
use tracing::info;
use tracing::info_span;
use tracing::Span;

use super::Access;
use super::Broker;
use super::BytesBroker;
use super::BytesWatcher;
use super::SessionContext;
use super::Transaction;
use crate::store::EtcdStore;
use crate::store::KvStore;
use crate::store::Lessor;
use crate::store::ScopedStore;
use crate::BrokerConfig;
use crate::KeyIterator;
use crate::KeyVal;
use crate::KeyValIterator;
use crate::PutOptions;
use crate::Result;
use crate::WatchConfig;
use crate::WatchEvent;

/// Owner of one remote session.
///
/// Operations on the connection itself use unprefixed keys. Brokers created
/// with [`new_broker`](Self::new_broker) share the session and stop working
/// once [`close`](Self::close) is called.
#[derive(Clone)]
pub struct Connection {
    access: Access,
}

impl std::fmt::Debug for Connection {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("closed", &self.access.ctx.shutdown.is_cancelled())
            .finish()
    }
}

/// Assembles a [`Connection`] over arbitrary store implementations.
///
/// # Example
/// ```rust,ignore
/// let store = Arc::new(MemoryStore::new());
/// let conn = Connection::builder(store.clone(), store)
///     .watch_config(WatchConfig { delivery_timeout_ms: 200 })
///     .span(tracing::info_span!("agent", name = "vpp"))
///     .build();
/// ```
pub struct ConnectionBuilder {
    store: Arc<dyn KvStore>,
    lessor: Arc<dyn Lessor>,
    watch: WatchConfig,
    span: Option<Span>,
}

impl ConnectionBuilder {
    pub fn watch_config(
        mut self,
        watch: WatchConfig,
    ) -> Self {
        self.watch = watch;
        self
    }

    /// Logging context attached to every operation and watch task.
    pub fn span(
        mut self,
        span: Span,
    ) -> Self {
        self.span = Some(span);
        self
    }

    pub fn build(self) -> Connection {
        let span = self.span.unwrap_or_else(|| info_span!("kv_connection"));
        Connection {
            access: Access {
                store: self.store,
                ctx: Arc::new(SessionContext {
                    lessor: self.lessor,
                    shutdown: CancellationToken::new(),
                    watch: self.watch,
                    span,
                }),
            },
        }
    }
}

impl Connection {
    /// Connects to the etcd cluster described by `config.etcd`.
    ///
    /// Invalid settings fail before any network activity. An empty endpoint
    /// list fails with `ConnectError::NoEndpoints`.
    pub async fn open(config: &BrokerConfig) -> Result<Self> {
        config.watch.validate()?;
        let span = info_span!("kv_connection", endpoints = ?config.etcd.endpoints);

        let store = match EtcdStore::connect(&config.etcd).await {
            Ok(store) => Arc::new(store),
            Err(e) => {
                span.in_scope(|| {
                    error!(endpoints = ?config.etcd.endpoints, "Failed to connect to etcd: {}", e)
                });
                return Err(e);
            }
        };
        span.in_scope(|| info!("Connected to etcd"));

        Ok(Self::builder(store.clone(), store)
            .watch_config(config.watch.clone())
            .span(span)
            .build())
    }

    /// Wraps an already connected etcd client.
    pub fn from_client(
        client: etcd_client::Client,
        watch: WatchConfig,
    ) -> Self {
        let store = Arc::new(EtcdStore::from_client(client));
        Self::builder(store.clone(), store).watch_config(watch).build()
    }

    pub fn builder(
        store: Arc<dyn KvStore>,
        lessor: Arc<dyn Lessor>,
    ) -> ConnectionBuilder {
        ConnectionBuilder {
            store,
            lessor,
            watch: WatchConfig::default(),
            span: None,
        }
    }

    /// Broker whose keys all live under `prefix`.
    ///
    /// An empty prefix gives an unscoped view equivalent to the connection.
    pub fn new_broker(
        &self,
        prefix: &str,
    ) -> Broker {
        let store: Arc<dyn KvStore> = if prefix.is_empty() {
            self.access.store.clone()
        } else {
            Arc::new(ScopedStore::new(prefix, self.access.store.clone()))
        };
        Broker::new(
            prefix.to_string(),
            Access {
                store,
                ctx: self.access.ctx.clone(),
            },
        )
    }

    /// Same view as [`new_broker`](Self::new_broker), for callers that only
    /// need [`BytesWatcher`].
    pub fn new_watcher(
        &self,
        prefix: &str,
    ) -> Broker {
        self.new_broker(prefix)
    }

    /// Stops every watch task and releases the session.
    ///
    /// Safe to call more than once. Brokers derived from this connection fail
    /// with `Error::ConnectionClosed` afterwards.
    pub fn close(&self) -> Result<()> {
        let ctx = &self.access.ctx;
        if !ctx.shutdown.is_cancelled() {
            ctx.span.in_scope(|| info!("Closing connection"));
        }
        ctx.shutdown.cancel();
        self.access.store.close()
    }

    pub fn is_closed(&self) -> bool {
        self.access.ctx.shutdown.is_cancelled()
    }
}

#[async_trait]
impl BytesBroker for Connection {
    async fn put(
        &self,
        key: &str,
        value: &[u8],
        options: Option<PutOptions>,
    ) -> Result<()> {
        self.access.put(key, value, options).await
    }

    async fn get_value(
        &self,
        key: &str,
    ) -> Result<Option<KeyVal>> {
        self.access.get_value(key).await
    }

    async fn list_values(
        &self,
        key_prefix: &str,
    ) -> Result<KeyValIterator> {
        self.access.list_values(key_prefix).await
    }

    async fn list_values_range(
        &self,
        from: &str,
        to: &str,
    ) -> Result<KeyValIterator> {
        self.access.list_values_range(from, to).await
    }

    async fn list_keys(
        &self,
        key_prefix: &str,
    ) -> Result<KeyIterator> {
        self.access.list_keys(key_prefix).await
    }

    async fn delete(
        &self,
        key: &str,
    ) -> Result<bool> {
        self.access.delete(key).await
    }

    fn new_txn(&self) -> Transaction {
        self.access.new_txn()
    }
}

#[async_trait]
impl BytesWatcher for Connection {
    async fn watch(
        &self,
        events: mpsc::Sender<WatchEvent>,
        keys: &[&str],
    ) -> Result<()> {
        self.access.watch(events, keys).await
    }
}
