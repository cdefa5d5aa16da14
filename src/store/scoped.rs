use std::sync::Arc;

use futures::StreamExt;
use tonic::async_trait;

use super::Change;
use super::ChangeStream;
use super::KeyRange;
use super::KvStore;
use super::TxnOp;
use crate::KeyVal;
use crate::LeaseId;
use crate::Result;
use crate::Revision;

/// Confines a store to the keys under `prefix`.
///
/// Every key, range bound, transaction operation and watch key is prefixed on
/// the way in; the prefix is stripped from every record and change on the way
/// out. Closing a scoped store closes the shared session underneath it.
#[derive(Clone)]
pub struct ScopedStore {
    prefix: String,
    inner: Arc<dyn KvStore>,
}

impl std::fmt::Debug for ScopedStore {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("ScopedStore")
            .field("prefix", &self.prefix)
            .finish()
    }
}

/// Shorthand for [`ScopedStore::new`].
pub fn scoped(
    prefix: impl Into<String>,
    inner: Arc<dyn KvStore>,
) -> ScopedStore {
    ScopedStore::new(prefix, inner)
}

impl ScopedStore {
    pub fn new(
        prefix: impl Into<String>,
        inner: Arc<dyn KvStore>,
    ) -> Self {
        Self {
            prefix: prefix.into(),
            inner,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn full_key(
        &self,
        key: &str,
    ) -> String {
        format!("{}{}", self.prefix, key)
    }

    fn full_range(
        &self,
        range: KeyRange,
    ) -> KeyRange {
        match range {
            KeyRange::Key(key) => KeyRange::Key(self.full_key(&key)),
            KeyRange::Prefix(prefix) => KeyRange::Prefix(self.full_key(&prefix)),
            KeyRange::Range { from, to } => KeyRange::Range {
                from: self.full_key(&from),
                // An open end must not escape the namespace
                to: match to {
                    Some(to) => Some(self.full_key(&to)),
                    None => prefix_end(&self.prefix),
                },
            },
        }
    }
}

/// Strips `prefix` from `key`; keys outside the prefix are returned unchanged.
pub(crate) fn strip_prefix(
    prefix: &str,
    key: String,
) -> String {
    match key.strip_prefix(prefix) {
        Some(stripped) => stripped.to_string(),
        None => key,
    }
}

/// Smallest key greater than every key starting with `prefix`, or `None`
/// when no such key exists (empty prefix or all `\u{10FFFF}`).
pub(crate) fn prefix_end(prefix: &str) -> Option<String> {
    let mut chars: Vec<char> = prefix.chars().collect();
    while let Some(last) = chars.pop() {
        let next = (last as u32 + 1..=char::MAX as u32).find_map(char::from_u32);
        if let Some(next) = next {
            chars.push(next);
            return Some(chars.into_iter().collect());
        }
    }
    None
}

#[async_trait]
impl KvStore for ScopedStore {
    async fn put(
        &self,
        key: &str,
        value: Vec<u8>,
        lease: Option<LeaseId>,
    ) -> Result<Revision> {
        self.inner.put(&self.full_key(key), value, lease).await
    }

    async fn range(
        &self,
        range: KeyRange,
        keys_only: bool,
    ) -> Result<Vec<KeyVal>> {
        let records = self.inner.range(self.full_range(range), keys_only).await?;
        Ok(records
            .into_iter()
            .map(|kv| {
                let key = strip_prefix(&self.prefix, kv.key().to_string());
                kv.with_key(key)
            })
            .collect())
    }

    async fn delete(
        &self,
        key: &str,
    ) -> Result<i64> {
        self.inner.delete(&self.full_key(key)).await
    }

    async fn txn(
        &self,
        ops: Vec<TxnOp>,
    ) -> Result<()> {
        let ops = ops
            .into_iter()
            .map(|op| match op {
                TxnOp::Put { key, value } => TxnOp::Put {
                    key: self.full_key(&key),
                    value,
                },
                TxnOp::Delete { key } => TxnOp::Delete {
                    key: self.full_key(&key),
                },
            })
            .collect();
        self.inner.txn(ops).await
    }

    async fn watch(
        &self,
        prefix: &str,
    ) -> Result<ChangeStream> {
        let stream = self.inner.watch(&self.full_key(prefix)).await?;
        let scope = self.prefix.clone();
        let stream = stream.map(move |batch| {
            batch.map(|changes| {
                changes
                    .into_iter()
                    .map(|change| Change {
                        key: strip_prefix(&scope, change.key),
                        ..change
                    })
                    .collect()
            })
        });
        Ok(stream.boxed())
    }

    fn close(&self) -> Result<()> {
        self.inner.close()
    }
}
