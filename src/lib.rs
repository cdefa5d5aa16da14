//! # keyval-broker
//!
//! Client-side access layer over an etcd v3 style key-value store.
//!
//! A [`Connection`] owns one remote session. Any number of prefix-scoped
//! [`Broker`]s can be derived from it; each exposes get/put/delete/list,
//! atomic [`Transaction`]s and background watches that translate remote
//! change notifications into [`WatchEvent`]s. Closing the connection stops
//! every watch it spawned and makes all derived brokers unusable.
//!
//! The remote store is reached through the [`store::KvStore`] and
//! [`store::Lessor`] traits, so the same broker code runs against etcd
//! ([`store::EtcdStore`]) or the in-process [`store::MemoryStore`].

mod broker;
mod config;
mod errors;
mod keyval;
mod watch;

pub mod constants;
pub mod resync;
pub mod store;

pub use broker::*;
pub use config::*;
pub use constants::RANGE_END_OPEN;
pub use constants::ROOT;
pub use errors::*;
pub use keyval::*;
pub use watch::WatchEvent;
pub use watch::WatchEventType;

//-----------------------------------------------------------
// Test utils

#[cfg(test)]
pub(crate) mod test_utils;
