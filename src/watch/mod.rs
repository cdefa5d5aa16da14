//! Watch event model and the background translator that feeds it.
//!
//! # Architecture
//!
//! ```text
//! KvStore::watch(prefix) → ChangeStream → WatchTranslator (1 task per key) → mpsc::Sender<WatchEvent>
//!                                               ↑
//!                               Connection shutdown token
//! ```
//!
//! Delivery is best-effort: an event the consumer does not accept within the
//! configured timeout is dropped with a warning. There is no per-watch
//! cancellation; closing the connection stops every translator it spawned.

mod translator;

pub(crate) use translator::*;


use crate::Revision;

/// Local change notification delivered to watch consumers.
///
/// Keys are relative to the broker that registered the watch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    Put {
        key: String,
        value: Vec<u8>,
        revision: Revision,
    },
    Delete {
        key: String,
        revision: Revision,
    },
}

/// Discriminant of a [`WatchEvent`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchEventType {
    Put,
    Delete,
}

impl WatchEvent {
    pub fn event_type(&self) -> WatchEventType {
        match self {
            WatchEvent::Put { .. } => WatchEventType::Put,
            WatchEvent::Delete { .. } => WatchEventType::Delete,
        }
    }

    pub fn key(&self) -> &str {
        match self {
            WatchEvent::Put { key, .. } | WatchEvent::Delete { key, .. } => key,
        }
    }

    /// New value; `None` for deletes
    pub fn value(&self) -> Option<&[u8]> {
        match self {
            WatchEvent::Put { value, .. } => Some(value.as_slice()),
            WatchEvent::Delete { .. } => None,
        }
    }

    pub fn revision(&self) -> Revision {
        match self {
            WatchEvent::Put { revision, .. } | WatchEvent::Delete { revision, .. } => *revision,
        }
    }
}
