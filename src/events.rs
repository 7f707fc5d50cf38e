//! Event broadcasting for MC Runner.
//!
//! The supervisor never talks to its consumers directly. Classified output,
//! player-count changes, status messages and failures are published on an
//! [`EventBus`], a thin wrapper over a Tokio broadcast channel, and whoever
//! presents them (a GUI, a console, a log shipper) subscribes.
//!
//! Events are published in the order the supervisor produces them; a receiver
//! that falls more than the bus capacity behind skips the oldest events.

use crate::error::{Error, FailureKind};
use crate::output::OutputEvent;
use futures::Stream;
use serde::Serialize;
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

/// Something the supervisor wants its consumers to know.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// A classified line of server output.
    Output(OutputEvent),
    /// The derived player count changed.
    PlayerCount { count: usize },
    /// Plain status message, e.g. "Server started." or "Backup saved!".
    Status { message: String },
    /// A lifecycle operation failed.
    Failure { kind: FailureKind, message: String },
    /// The session ended. `requested` is false when the process exited on its own.
    Exited {
        exit_code: Option<i32>,
        requested: bool,
    },
}

/// Synchronous callback invoked for every published event.
pub type EventHandler = Arc<dyn Fn(&ServerEvent) + Send + Sync>;

/// Broadcast channel for supervisor events.
///
/// Cheap to clone; all clones publish into the same channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<ServerEvent>,
    handler: Arc<RwLock<Option<EventHandler>>>,
}

impl EventBus {
    /// Create a new event bus with the specified channel capacity
    ///
    /// # Arguments
    ///
    /// * `capacity` - Maximum number of events buffered before slow receivers start lagging
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            handler: Arc::new(RwLock::new(None)),
        }
    }

    /// Get a new receiver for subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.sender.subscribe()
    }

    /// Subscribe as a stream. Lagged receivers skip ahead instead of ending the stream.
    pub fn stream(&self) -> impl Stream<Item = ServerEvent> + Send + 'static {
        let mut receiver = self.sender.subscribe();
        async_stream::stream! {
            loop {
                match receiver.recv().await {
                    Ok(event) => yield event,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Event stream lagged, skipping events");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }

    /// Registers the optional handler, replacing any previous one.
    pub fn set_handler(&self, handler: EventHandler) {
        if let Ok(mut slot) = self.handler.write() {
            *slot = Some(handler);
        }
    }

    /// Removes the handler, if any.
    pub fn clear_handler(&self) {
        if let Ok(mut slot) = self.handler.write() {
            *slot = None;
        }
    }

    /// Publish an event to every receiver and the handler, if one is registered.
    ///
    /// Never blocks; the event is dropped when nobody is listening.
    pub fn publish(&self, event: ServerEvent) {
        if let Ok(slot) = self.handler.read() {
            if let Some(handler) = slot.as_ref() {
                handler(&event);
            }
        }

        let _ = self.sender.send(event);
    }

    pub fn output(&self, event: OutputEvent) {
        self.publish(ServerEvent::Output(event));
    }

    pub fn player_count(&self, count: usize) {
        self.publish(ServerEvent::PlayerCount { count });
    }

    pub fn status(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::info!(status = %message, "Status");
        self.publish(ServerEvent::Status { message });
    }

    /// Publishes `error` as a failure event.
    pub fn failure(&self, error: &Error) {
        tracing::warn!(error = %error, kind = ?error.kind(), "Reporting failure");
        self.publish(ServerEvent::Failure {
            kind: error.kind(),
            message: error.to_string(),
        });
    }

    /// Number of live receivers.
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("receivers", &self.sender.receiver_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::sync::Mutex;

    #[tokio::test]
    async fn test_events_arrive_in_order() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.status("Starting server...");
        bus.player_count(1);
        bus.output(OutputEvent::system("hello"));

        assert_eq!(
            rx.recv().await.unwrap(),
            ServerEvent::Status {
                message: "Starting server...".to_string()
            }
        );
        assert_eq!(rx.recv().await.unwrap(), ServerEvent::PlayerCount { count: 1 });
        assert!(matches!(rx.recv().await.unwrap(), ServerEvent::Output(_)));
    }

    #[tokio::test]
    async fn test_handler_is_optional() {
        let bus = EventBus::new(4);
        bus.status("nobody listening");

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        bus.set_handler(Arc::new(move |event| {
            sink.lock().unwrap().push(event.clone());
        }));

        bus.player_count(2);
        bus.clear_handler();
        bus.player_count(3);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.as_slice(), &[ServerEvent::PlayerCount { count: 2 }]);
    }

    #[tokio::test]
    async fn test_stream_skips_lagged_events() {
        let bus = EventBus::new(2);
        let stream = bus.stream();
        tokio::pin!(stream);

        for count in 0..5 {
            bus.player_count(count);
        }

        let first = stream.next().await.unwrap();
        assert_eq!(first, ServerEvent::PlayerCount { count: 3 });
    }

    #[test]
    fn test_failure_event_carries_kind() {
        let bus = EventBus::new(4);
        let mut rx = bus.subscribe();

        bus.failure(&Error::Launch("no such file".to_string()));

        match rx.try_recv().unwrap() {
            ServerEvent::Failure { kind, message } => {
                assert_eq!(kind, FailureKind::Launch);
                assert!(message.contains("no such file"));
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
