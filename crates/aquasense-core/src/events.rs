//! Console event system.
//!
//! Components publish [`ConsoleEvent`]s on a broadcast channel so the
//! presentation layer can react to snapshots, connectivity changes, command
//! outcomes and, most importantly, the "log in again" signal.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use aquasense_types::{DeviceAction, DeviceId, MetricKind, SummaryPeriod};

/// Events emitted by the synchronization core.
///
/// All events are serializable for logging and IPC.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new event types
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[non_exhaustive]
pub enum ConsoleEvent {
    /// A poll cycle replaced the live snapshot.
    SnapshotPublished { generation: u64, connected: bool },
    /// The connected flag flipped.
    ConnectivityChanged { connected: bool },
    /// The session was invalidated; the user must log in again.
    ///
    /// Emitted once per invalidated token.
    LoginRequired { reason: String },
    /// The backend acknowledged a control command.
    CommandSucceeded {
        device: DeviceId,
        action: DeviceAction,
    },
    /// A control command failed; local device state was not changed.
    CommandFailed {
        device: DeviceId,
        action: DeviceAction,
        message: String,
    },
    /// The history buffer was rebuilt for a metric.
    HistoryReplaced { metric: MetricKind, points: usize },
    /// The summary state changed. `loaded == false` means the explicit empty state.
    SummaryChanged { period: SummaryPeriod, loaded: bool },
}

/// Sender for console events.
pub type EventSender = broadcast::Sender<ConsoleEvent>;

/// Receiver for console events.
pub type EventReceiver = broadcast::Receiver<ConsoleEvent>;

/// Event dispatcher for sending events to multiple receivers.
#[derive(Debug, Clone)]
pub struct EventDispatcher {
    sender: EventSender,
}

impl EventDispatcher {
    /// Create a new event dispatcher.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to events.
    pub fn subscribe(&self) -> EventReceiver {
        self.sender.subscribe()
    }

    /// Send an event.
    pub fn send(&self, event: ConsoleEvent) {
        // Ignore error if no receivers
        let _ = self.sender.send(event);
    }

    /// Get the number of active receivers.
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new(100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_dispatcher_fan_out() {
        let dispatcher = EventDispatcher::new(8);
        let mut a = dispatcher.subscribe();
        let mut b = dispatcher.subscribe();
        assert_eq!(dispatcher.receiver_count(), 2);

        dispatcher.send(ConsoleEvent::ConnectivityChanged { connected: true });

        assert_eq!(
            a.recv().await.unwrap(),
            ConsoleEvent::ConnectivityChanged { connected: true }
        );
        assert_eq!(
            b.recv().await.unwrap(),
            ConsoleEvent::ConnectivityChanged { connected: true }
        );
    }

    #[test]
    fn test_send_without_receivers() {
        let dispatcher = EventDispatcher::default();
        dispatcher.send(ConsoleEvent::LoginRequired {
            reason: "expired".into(),
        });
    }

    #[test]
    fn test_event_serialization() {
        let event = ConsoleEvent::HistoryReplaced {
            metric: MetricKind::Ammonia,
            points: 20,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"history_replaced\""));
        assert!(json.contains("\"metric\":\"nh3\""));
    }
}
