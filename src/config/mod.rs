//! Configuration management for broker connections.
//!
//! Sources are merged with increasing priority:
//! 1. Default values (hardcoded)
//! 2. Config file from `KEYVAL_BROKER_CONFIG`
//! 3. Explicit override file
//! 4. Environment variables `KEYVAL_BROKER__<SECTION>__<FIELD>`

mod etcd;
mod watch;
pub use etcd::*;
pub use watch::*;


//---
use std::env;

use config::Config;
use config::ConfigError;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::constants::CONFIG_ENV_PREFIX;
use crate::constants::CONFIG_PATH_ENV;
use crate::Error;
use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct BrokerConfig {
    /// Remote store session parameters
    #[serde(default)]
    pub etcd: EtcdConfig,

    /// Watch delivery parameters
    #[serde(default)]
    pub watch: WatchConfig,
}

impl BrokerConfig {
    /// Defaults, then `KEYVAL_BROKER_CONFIG` file, then environment overrides.
    ///
    /// No validation happens here; call [`validate`](Self::validate) once
    /// every override has been applied.
    pub fn new() -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Ok(config_path) = env::var(CONFIG_PATH_ENV) {
            builder = builder.add_source(File::with_name(&config_path).required(true));
        }

        let config: Self = builder.add_source(env_source()).build()?.try_deserialize()?;
        Ok(config)
    }

    /// Merges a configuration file on top of the current values.
    ///
    /// Environment variables still win over the file.
    pub fn with_override_config(
        &self,
        path: &str,
    ) -> Result<Self> {
        let config: Self = Config::builder()
            .add_source(Config::try_from(self)?)
            .add_source(File::with_name(path))
            .add_source(env_source())
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    /// Convenience for `new()` + optional override + `validate()`.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut config = Self::new()?;
        if let Some(path) = path {
            config = config.with_override_config(path)?;
        }
        config.validate()
    }

    pub fn validate(self) -> Result<Self> {
        self.etcd.validate()?;
        self.watch.validate()?;
        Ok(self)
    }
}

fn env_source() -> Environment {
    Environment::with_prefix(CONFIG_ENV_PREFIX)
        .separator("__")
        .list_separator(",")
        .with_list_parse_key("etcd.endpoints")
        .ignore_empty(true)
        .try_parsing(true)
}

pub(crate) fn invalid(message: impl Into<String>) -> Error {
    Error::Config(ConfigError::Message(message.into()))
}
