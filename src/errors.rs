//! Broker Error Hierarchy
//!
//! Errors are grouped by the layer that produced them: establishing the
//! session, calling the remote store, loading configuration, or using a
//! connection after it was closed.
//!
//! A key that does not exist is never an error. Reads report it as `Ok(None)`
//! and deletes report it through their boolean result.

use config::ConfigError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Session establishment failures (network, auth, malformed config)
    #[error(transparent)]
    Connect(#[from] ConnectError),

    /// Any put/get/delete/list/commit/lease/watch call rejected by the store
    #[error(transparent)]
    Remote(#[from] RemoteCallError),

    /// Configuration loading or validation failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The owning connection has been closed
    #[error("Connection is closed")]
    ConnectionClosed,
}

#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    #[error("No store endpoints configured")]
    NoEndpoints,

    #[error("Failed to connect to etcd endpoints {endpoints:?}: {source}")]
    Etcd {
        endpoints: Vec<String>,
        #[source]
        source: etcd_client::Error,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum RemoteCallError {
    /// Request rejected or lost by the etcd cluster
    #[error("etcd {op} request failed: {source}")]
    Etcd {
        op: &'static str,
        #[source]
        source: etcd_client::Error,
    },

    #[error("Requested lease {0} not found")]
    LeaseNotFound(i64),

    #[error("Invalid lease TTL {0}s")]
    InvalidTtl(i64),

    #[error("Duplicate key {0:?} given in transaction")]
    DuplicateTxnKey(String),

    #[error("Too many operations in transaction: {count} > {max}")]
    TooManyTxnOps { count: usize, max: usize },

    /// The subscriber fell behind and notifications were skipped
    #[error("Watch subscription lagged, {0} notification batches skipped")]
    WatchLagged(u64),

    #[error("Watch canceled by the store: {0}")]
    WatchCanceled(String),
}

impl RemoteCallError {
    pub(crate) fn etcd(
        op: &'static str,
        source: etcd_client::Error,
    ) -> Error {
        Error::Remote(RemoteCallError::Etcd { op, source })
    }
}

impl Error {
    /// gRPC status code of the underlying etcd failure, if any
    pub fn status_code(&self) -> Option<tonic::Code> {
        match self {
            Error::Remote(RemoteCallError::Etcd {
                source: etcd_client::Error::GRpcStatus(status),
                ..
            }) => Some(status.code()),
            _ => None,
        }
    }
}
