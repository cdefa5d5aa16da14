use tokio::sync::mpsc;
use tonic::async_trait;

use super::Access;
use super::BytesBroker;
use super::BytesWatcher;
use super::Transaction;
use crate::KeyIterator;
use crate::KeyVal;
use crate::KeyValIterator;
use crate::PutOptions;
use crate::Result;
use crate::WatchEvent;

/// Prefix-scoped view over a [`Connection`](crate::Connection).
///
/// The prefix is prepended to every key passed in and stripped from every key
/// handed back (records, listed keys, watch events). Many brokers may share
/// one connection; none of them owns the session, and all of them become
/// unusable once the connection is closed.
#[derive(Clone)]
pub struct Broker {
    prefix: String,
    access: Access,
}

impl std::fmt::Debug for Broker {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("Broker").field("prefix", &self.prefix).finish()
    }
}

impl Broker {
    pub(crate) fn new(
        prefix: String,
        access: Access,
    ) -> Self {
        Self { prefix, access }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

#[async_trait]
impl BytesBroker for Broker {
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
impl BytesWatcher for Broker {
    async fn watch(
        &self,
        events: mpsc::Sender<WatchEvent>,
        keys: &[&str],
    ) -> Result<()> {
        self.access.watch(events, keys).await
    }
}
