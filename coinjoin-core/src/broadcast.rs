//! Phase broadcaster (spec.md \S2 component 3, \S6 outbound events).
//!
//! A thin push channel to connected clients. The scheduler's only
//! operation on it is "publish a phase-change event"; how (or whether)
//! anyone is listening is not this crate's concern.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// One phase-change notification (spec.md \S6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseEvent {
    pub new_phase: String,
    pub message: String,
}

/// Wraps a `tokio::sync::broadcast` sender. Cloning shares the same
/// underlying channel — every clone publishes to every subscriber.
#[derive(Clone)]
pub struct PhaseBroadcaster {
    sender: broadcast::Sender<PhaseEvent>,
}

impl PhaseBroadcaster {
    /// `capacity` bounds how far a slow subscriber may lag before it
    /// starts missing events (`broadcast::error::RecvError::Lagged`).
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        PhaseBroadcaster { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PhaseEvent> {
        self.sender.subscribe()
    }

    /// Publishes an event once per phase entry. A `SendError` here only
    /// means nobody is currently subscribed — not a fault worth
    /// surfacing to the phase loop.
    pub fn publish(&self, event: PhaseEvent) {
        let _ = self.sender.send(event);
    }
}

impl Default for PhaseBroadcaster {
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_receives_published_events() {
        let broadcaster = PhaseBroadcaster::new(8);
        let mut rx = broadcaster.subscribe();
        broadcaster.publish(PhaseEvent { new_phase: "InputRegistration".into(), message: "round 1".into() });
        let event = rx.recv().await.unwrap();
        assert_eq!(event.new_phase, "InputRegistration");
    }

    #[test]
    fn publish_with_no_subscribers_does_not_panic() {
        let broadcaster = PhaseBroadcaster::new(8);
        broadcaster.publish(PhaseEvent { new_phase: "Signing".into(), message: "".into() });
    }
}
