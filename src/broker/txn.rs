use std::sync::Arc;

use tracing::debug;
use tracing::error;
use tracing::Instrument;
use tracing::Span;

use crate::store::KvStore;
use crate::store::TxnOp;
use crate::Result;

/// Staged put/delete operations committed as one atomic remote call.
///
/// Operations have no effect until [`commit`](Self::commit). Keys are
/// relative to the broker that created the transaction.
///
/// # Example
/// ```rust,ignore
/// let mut txn = broker.new_txn();
/// txn.put("a", b"1").put("b", b"2").delete("c");
/// txn.commit().await?;
/// ```
pub struct Transaction {
    store: Arc<dyn KvStore>,
    ops: Vec<TxnOp>,
    span: Span,
}

impl std::fmt::Debug for Transaction {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("Transaction").field("ops", &self.ops).finish()
    }
}

impl Transaction {
    pub(crate) fn new(
        store: Arc<dyn KvStore>,
        span: Span,
    ) -> Self {
        Self {
            store,
            ops: Vec::new(),
            span,
        }
    }

    pub fn put(
        &mut self,
        key: &str,
        value: &[u8],
    ) -> &mut Self {
        self.ops.push(TxnOp::Put {
            key: key.to_string(),
            value: value.to_vec(),
        });
        self
    }

    pub fn delete(
        &mut self,
        key: &str,
    ) -> &mut Self {
        self.ops.push(TxnOp::Delete {
            key: key.to_string(),
        });
        self
    }

    /// Number of staged operations
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Sends every staged operation in one remote transaction.
    ///
    /// Either all operations apply or none do. The staged list is drained
    /// whatever the outcome; an empty transaction makes no remote call.
    pub async fn commit(&mut self) -> Result<()> {
        let ops = std::mem::take(&mut self.ops);
        if ops.is_empty() {
            return Ok(());
        }
        let count = ops.len();

        async {
            match self.store.txn(ops).await {
                Ok(()) => {
                    debug!(ops = count, "txn committed");
                    Ok(())
                }
                Err(e) => {
                    error!(ops = count, "txn commit error: {}", e);
                    Err(e)
                }
            }
        }
        .instrument(self.span.clone())
        .await
    }
}
