use std::time::Duration;

/// Options accepted by [`BytesBroker::put`](crate::BytesBroker::put)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PutOptions {
    ttl: Option<Duration>,
}

impl PutOptions {
    pub const fn new() -> Self {
        Self { ttl: None }
    }

    /// Expire the written key after `ttl`.
    ///
    /// A fresh lease is granted for every put carrying a non-zero TTL; leases
    /// are never shared between writes nor renewed.
    pub const fn with_ttl(
        mut self,
        ttl: Duration,
    ) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    /// Lease length in whole seconds, or `None` when no lease is needed.
    pub fn lease_ttl_secs(&self) -> Option<i64> {
        self.ttl.filter(|ttl| !ttl.is_zero()).map(ttl_to_lease_secs)
    }
}

/// Rounds up to whole seconds: a key never expires earlier than asked.
pub(crate) fn ttl_to_lease_secs(ttl: Duration) -> i64 {
    let secs = ttl.as_secs().saturating_add(u64::from(ttl.subsec_nanos() > 0));
    i64::try_from(secs).unwrap_or(i64::MAX)
}
