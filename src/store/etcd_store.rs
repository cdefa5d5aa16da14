//! etcd v3 implementation of the store seam.

use etcd_client::Client;
use etcd_client::Event;
use etcd_client::EventType;
use etcd_client::GetOptions;
use etcd_client::KeyValue;
use etcd_client::PutOptions as EtcdPutOptions;
use etcd_client::Txn;
use etcd_client::TxnOp as EtcdTxnOp;
use etcd_client::WatchOptions;
use futures::StreamExt;
use parking_lot::RwLock;
use tonic::async_trait;
use tracing::debug;

use super::Change;
use super::ChangeKind;
use super::ChangeStream;
use super::KeyRange;
use super::KvStore;
use super::Lessor;
use super::TxnOp;
use crate::ConnectError;
use crate::EtcdConfig;
use crate::Error;
use crate::KeyVal;
use crate::LeaseId;
use crate::RemoteCallError;
use crate::Result;
use crate::Revision;

/// Session with an etcd v3 cluster.
///
/// `etcd_client::Client` is a cheap handle over a shared gRPC channel, so
/// every call works on its own clone. [`close`](KvStore::close) drops the
/// stored handle; requests issued afterwards fail with
/// [`Error::ConnectionClosed`].
pub struct EtcdStore {
    client: RwLock<Option<Client>>,
}

impl std::fmt::Debug for EtcdStore {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("EtcdStore")
            .field("open", &self.client.read().is_some())
            .finish()
    }
}

impl EtcdStore {
    /// Dials the cluster.
    ///
    /// Fails with `ConnectError::NoEndpoints` when no non-blank endpoint is
    /// given, and with a config error for any other invalid setting, both
    /// before any network activity.
    pub async fn connect(config: &EtcdConfig) -> Result<Self> {
        let endpoints: Vec<String> = config
            .endpoints
            .iter()
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty())
            .collect();
        if endpoints.is_empty() {
            return Err(ConnectError::NoEndpoints.into());
        }
        config.validate()?;

        debug!(?endpoints, "Connecting to etcd");
        let client = Client::connect(endpoints.clone(), Some(config.connect_options()))
            .await
            .map_err(|source| ConnectError::Etcd { endpoints, source })?;

        Ok(Self::from_client(client))
    }

    /// Wraps an already connected client.
    pub fn from_client(client: Client) -> Self {
        Self {
            client: RwLock::new(Some(client)),
        }
    }

    fn client(&self) -> Result<Client> {
        self.client.read().clone().ok_or(Error::ConnectionClosed)
    }
}

#[async_trait]
impl KvStore for EtcdStore {
    async fn put(
        &self,
        key: &str,
        value: Vec<u8>,
        lease: Option<LeaseId>,
    ) -> Result<Revision> {
        let options = lease.map(|id| EtcdPutOptions::new().with_lease(id));
        let resp = self
            .client()?
            .put(key, value, options)
            .await
            .map_err(|e| RemoteCallError::etcd("put", e))?;
        Ok(resp.header().map(|h| h.revision()).unwrap_or_default())
    }

    async fn range(
        &self,
        range: KeyRange,
        keys_only: bool,
    ) -> Result<Vec<KeyVal>> {
        let (key, mut options) = match range {
            KeyRange::Key(key) => (key, GetOptions::new()),
            KeyRange::Prefix(prefix) => (prefix, GetOptions::new().with_prefix()),
            // "\0" as range end selects every key >= from
            KeyRange::Range { from, to } => (
                from,
                GetOptions::new().with_range(to.unwrap_or_else(|| "\0".to_string())),
            ),
        };
        if keys_only {
            options = options.with_keys_only();
        }

        let resp = self
            .client()?
            .get(key, Some(options))
            .await
            .map_err(|e| RemoteCallError::etcd("get", e))?;
        Ok(resp.kvs().iter().map(to_key_val).collect())
    }

    async fn delete(
        &self,
        key: &str,
    ) -> Result<i64> {
        let resp = self
            .client()?
            .delete(key, None)
            .await
            .map_err(|e| RemoteCallError::etcd("delete", e))?;
        Ok(resp.deleted())
    }

    async fn txn(
        &self,
        ops: Vec<TxnOp>,
    ) -> Result<()> {
        let ops: Vec<EtcdTxnOp> = ops
            .into_iter()
            .map(|op| match op {
                TxnOp::Put { key, value } => EtcdTxnOp::put(key, value, None),
                TxnOp::Delete { key } => EtcdTxnOp::delete(key, None),
            })
            .collect();

        self.client()?
            .txn(Txn::new().and_then(ops))
            .await
            .map_err(|e| RemoteCallError::etcd("txn", e))?;
        Ok(())
    }

    async fn watch(
        &self,
        prefix: &str,
    ) -> Result<ChangeStream> {
        let options = WatchOptions::new().with_prefix().with_prev_key();
        let (watcher, stream) = self
            .client()?
            .watch(prefix, Some(options))
            .await
            .map_err(|e| RemoteCallError::etcd("watch", e))?;

        let stream = stream.map(move |resp| -> Result<Vec<Change>> {
            // The watcher owns the request side of the stream and must live
            // as long as the stream does.
            let _watcher = &watcher;
            let resp = resp.map_err(|e| RemoteCallError::etcd("watch", e))?;
            if resp.canceled() {
                return Err(RemoteCallError::WatchCanceled(resp.cancel_reason().to_string()).into());
            }
            Ok(resp.events().iter().filter_map(to_change).collect())
        });
        Ok(stream.boxed())
    }

    fn close(&self) -> Result<()> {
        if self.client.write().take().is_some() {
            debug!("etcd session released");
        }
        Ok(())
    }
}

#[async_trait]
impl Lessor for EtcdStore {
    async fn grant(
        &self,
        ttl_secs: i64,
    ) -> Result<LeaseId> {
        let resp = self
            .client()?
            .lease_grant(ttl_secs, None)
            .await
            .map_err(|e| RemoteCallError::etcd("lease grant", e))?;
        Ok(resp.id())
    }
}

fn to_key_val(kv: &KeyValue) -> KeyVal {
    KeyVal::new(
        String::from_utf8_lossy(kv.key()).into_owned(),
        kv.value().to_vec(),
        kv.mod_revision(),
    )
}

fn to_change(event: &Event) -> Option<Change> {
    let kv = event.kv()?;
    let key = String::from_utf8_lossy(kv.key()).into_owned();
    match change_kind(event.event_type(), kv.create_revision(), kv.mod_revision()) {
        ChangeKind::Delete => Some(Change::delete(key, kv.mod_revision())),
        kind => Some(Change::put(kind, key, kv.value().to_vec(), kv.mod_revision())),
    }
}

/// Splits PUT events into create/modify the same way etcd's own clients do:
/// a key created by this very revision is a create.
fn change_kind(
    event_type: EventType,
    create_revision: Revision,
    mod_revision: Revision,
) -> ChangeKind {
    match event_type {
        EventType::Delete => ChangeKind::Delete,
        EventType::Put if create_revision == mod_revision => ChangeKind::Create,
        EventType::Put => ChangeKind::Modify,
    }
}
