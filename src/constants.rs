use std::time::Duration;

/// Prefix that yields an unscoped broker
pub const ROOT: &str = "";

/// Bounded wait before a watch event is dropped for a slow consumer
pub const DEFAULT_DELIVERY_TIMEOUT: Duration = Duration::from_millis(1000);

/// Range end reading up to the end of a broker's key space
pub const RANGE_END_OPEN: &str = "\0";

/// Same default as etcd's `--max-txn-ops`
pub const DEFAULT_MAX_TXN_OPS: usize = 128;

/// Buffered notification batches per in-memory watch subscriber
pub(crate) const MEMORY_WATCH_CAPACITY: usize = 1024;

/// Environment variable naming an optional TOML config file
pub const CONFIG_PATH_ENV: &str = "KEYVAL_BROKER_CONFIG";

/// Prefix of environment variable overrides, e.g. `KEYVAL_BROKER__ETCD__ENDPOINTS`
pub const CONFIG_ENV_PREFIX: &str = "KEYVAL_BROKER";
