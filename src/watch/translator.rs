use std::time::Duration;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::SendTimeoutError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::trace;
use tracing::warn;
use tracing::Instrument;
use tracing::Span;

use super::WatchEvent;
use crate::store::Change;
use crate::store::ChangeKind;
use crate::store::ChangeStream;

/// Bridges one remote subscription into the local event model.
///
/// Lifecycle: the subscription is registered before the translator is built
/// (Subscribing), [`run`](Self::run) forwards batches (Streaming) and returns
/// once the shutdown token fires (Closed). Buffered notifications are not
/// drained on shutdown.
pub(crate) struct WatchTranslator {
    /// Watched key, for logging
    key: String,

    stream: ChangeStream,

    events: mpsc::Sender<WatchEvent>,

    shutdown: CancellationToken,

    delivery_timeout: Duration,
}

impl WatchTranslator {
    pub(crate) fn new(
        key: impl Into<String>,
        stream: ChangeStream,
        events: mpsc::Sender<WatchEvent>,
        shutdown: CancellationToken,
        delivery_timeout: Duration,
    ) -> Self {
        Self {
            key: key.into(),
            stream,
            events,
            shutdown,
            delivery_timeout,
        }
    }

    pub(crate) fn spawn(
        self,
        span: Span,
    ) -> JoinHandle<()> {
        tokio::spawn(self.run().instrument(span))
    }

    pub(crate) async fn run(mut self) {
        debug!(key = %self.key, "Watch started");

        loop {
            tokio::select! {
                biased;

                _ = self.shutdown.cancelled() => {
                    debug!(key = %self.key, "Watch ended");
                    return;
                }

                batch = self.stream.next() => match batch {
                    Some(Ok(changes)) => {
                        for change in changes {
                            let Some(event) = translate(change) else {
                                continue;
                            };
                            if !self.deliver(event).await {
                                return;
                            }
                        }
                    }
                    Some(Err(e)) => {
                        warn!(key = %self.key, "Watch stream error: {}", e);
                    }
                    None => {
                        debug!(key = %self.key, "Watch stream closed by the store");
                        return;
                    }
                },
            }
        }
    }

    /// Hands `event` to the consumer, waiting at most `delivery_timeout`.
    ///
    /// Returns `false` when the translator must stop: shutdown fired while
    /// waiting, or the consumer dropped its receiver.
    async fn deliver(
        &self,
        event: WatchEvent,
    ) -> bool {
        tokio::select! {
            biased;

            _ = self.shutdown.cancelled() => {
                debug!(key = %self.key, "Watch ended during delivery");
                false
            }

            sent = self.events.send_timeout(event, self.delivery_timeout) => match sent {
                Ok(()) => true,
                Err(SendTimeoutError::Timeout(event)) => {
                    warn!(
                        key = %self.key,
                        event_key = %event.key(),
                        revision = event.revision(),
                        "Unable to deliver watch event before timeout."
                    );
                    true
                }
                Err(SendTimeoutError::Closed(_)) => {
                    debug!(key = %self.key, "Watch consumer gone, stopping");
                    false
                }
            },
        }
    }
}

/// Remote change → local event; `None` for changes that carry no event.
pub(crate) fn translate(change: Change) -> Option<WatchEvent> {
    match (change.kind, change.value) {
        (ChangeKind::Delete, _) => Some(WatchEvent::Delete {
            key: change.key,
            revision: change.revision,
        }),
        (ChangeKind::Create | ChangeKind::Modify, Some(value)) => {
            trace!(key = %change.key, "put event");
            Some(WatchEvent::Put {
                key: change.key,
                value,
                revision: change.revision,
            })
        }
        (ChangeKind::Create | ChangeKind::Modify, None) => None,
    }
}
