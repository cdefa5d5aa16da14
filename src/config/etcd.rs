use std::time::Duration;

use etcd_client::ConnectOptions;
use serde::Deserialize;
use serde::Serialize;

use super::invalid;
use crate::Result;

/// Session parameters for the etcd v3 cluster
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct EtcdConfig {
    /// Cluster endpoints, e.g. `127.0.0.1:2379` or `http://etcd-0:2379`
    #[serde(default = "default_endpoints")]
    pub endpoints: Vec<String>,

    /// Timeout for establishing the connection in milliseconds
    #[serde(default = "default_dial_timeout")]
    pub dial_timeout_ms: u64,

    /// Per-request timeout in milliseconds
    #[serde(default = "default_op_timeout")]
    pub op_timeout_ms: u64,

    /// HTTP2 keepalive ping interval in milliseconds
    #[serde(default = "default_keep_alive_interval")]
    pub keep_alive_interval_ms: u64,

    /// HTTP2 keepalive timeout in milliseconds
    #[serde(default = "default_keep_alive_timeout")]
    pub keep_alive_timeout_ms: u64,

    /// Auth is enabled only when both username and password are set
    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,
}

impl Default for EtcdConfig {
    fn default() -> Self {
        Self {
            endpoints: default_endpoints(),
            dial_timeout_ms: default_dial_timeout(),
            op_timeout_ms: default_op_timeout(),
            keep_alive_interval_ms: default_keep_alive_interval(),
            keep_alive_timeout_ms: default_keep_alive_timeout(),
            username: None,
            password: None,
        }
    }
}

impl EtcdConfig {
    pub fn validate(&self) -> Result<()> {
        if self.endpoints.iter().all(|e| e.trim().is_empty()) {
            return Err(invalid("etcd.endpoints must contain at least one endpoint"));
        }
        if self.dial_timeout_ms == 0 {
            return Err(invalid("etcd.dial_timeout_ms must be greater than 0"));
        }
        if self.username.is_some() != self.password.is_some() {
            return Err(invalid(
                "etcd.username and etcd.password must be set together",
            ));
        }
        Ok(())
    }

    pub fn dial_timeout(&self) -> Duration {
        Duration::from_millis(self.dial_timeout_ms)
    }

    pub fn op_timeout(&self) -> Duration {
        Duration::from_millis(self.op_timeout_ms)
    }

    pub(crate) fn connect_options(&self) -> ConnectOptions {
        let mut options = ConnectOptions::new()
            .with_connect_timeout(self.dial_timeout())
            .with_keep_alive(
                Duration::from_millis(self.keep_alive_interval_ms),
                Duration::from_millis(self.keep_alive_timeout_ms),
            );
        if self.op_timeout_ms > 0 {
            options = options.with_timeout(self.op_timeout());
        }
        if let (Some(user), Some(password)) = (&self.username, &self.password) {
            options = options.with_user(user.clone(), password.clone());
        }
        options
    }
}

fn default_endpoints() -> Vec<String> {
    vec!["127.0.0.1:2379".to_string()]
}
fn default_dial_timeout() -> u64 {
    1000
}
fn default_op_timeout() -> u64 {
    3000
}
fn default_keep_alive_interval() -> u64 {
    30_000
}
fn default_keep_alive_timeout() -> u64 {
    10_000
}
