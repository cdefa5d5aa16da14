//! Resync contract between a data-sync orchestrator and plugins.
//!
//! A plugin registers under a name and receives [`StatusEvent`]s on its
//! registration channel. On [`ResyncStatus::Started`] it reloads its state
//! from the store and then calls [`StatusEvent::ack`]. The orchestrator itself
//! lives outside this crate; only the types both sides exchange are here.

use std::fmt;

use tokio::sync::mpsc;
use tokio::sync::oneshot;

/// Resync phase announced to plugins
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResyncStatus {
    Started,
    NotActive,
}

/// Notification carrying a status and a one-time acknowledgement handle.
#[derive(Debug)]
pub struct StatusEvent {
    status: ResyncStatus,
    ack: oneshot::Sender<()>,
}

/// Orchestrator side of [`StatusEvent::ack`]; resolves once the plugin acks.
///
/// Resolves with an error if the event was dropped without an ack.
pub type AckReceiver = oneshot::Receiver<()>;

impl StatusEvent {
    pub fn new(status: ResyncStatus) -> (Self, AckReceiver) {
        let (ack, ack_rx) = oneshot::channel();
        (Self { status, ack }, ack_rx)
    }

    pub fn status(&self) -> ResyncStatus {
        self.status
    }

    /// Signals that the plugin finished handling the event.
    pub fn ack(self) {
        // Orchestrator may have stopped waiting
        let _ = self.ack.send(());
    }
}

/// A plugin's handle on the resync orchestrator.
#[derive(Debug)]
pub struct Registration {
    name: String,
    status_rx: mpsc::Receiver<StatusEvent>,
}

impl Registration {
    /// Registration plus the sender the orchestrator keeps for it.
    pub fn new(
        name: impl Into<String>,
        capacity: usize,
    ) -> (Self, mpsc::Sender<StatusEvent>) {
        let (tx, status_rx) = mpsc::channel(capacity);
        (
            Self {
                name: name.into(),
                status_rx,
            },
            tx,
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Channel on which resync status events arrive
    pub fn status_chan(&mut self) -> &mut mpsc::Receiver<StatusEvent> {
        &mut self.status_rx
    }
}

impl fmt::Display for Registration {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Implemented by the orchestrator
pub trait ResyncSubscriber: Send + Sync {
    fn register(
        &self,
        name: &str,
    ) -> Registration;
}

/// Lets a plugin report a failed resync back to the orchestrator.
pub trait ResyncReporter: Send + Sync {
    fn report_error(
        &self,
        plugin: &str,
        error: &(dyn std::error::Error + Send + Sync),
    );
}
