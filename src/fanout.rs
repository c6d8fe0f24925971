//! Background event fan-out.
//!
//! One task for the process lifetime: dequeues property-changed events
//! serially and delivers each to the sessions subscribed to the
//! originating oid. Delivery order matches enqueue order.

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, error};

use crate::state::AppState;
use crate::types::{NotificationMessage, PropertyChangedEvent};

/// Spawn the fan-out task. `events` is the receive side of the queue
/// every object core produces into.
pub fn spawn_fanout(state: Arc<AppState>, mut events: UnboundedReceiver<PropertyChangedEvent>) {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            deliver(&state, event);
        }
        debug!("event queue closed, fan-out task exiting");
    });
}

/// Deliver one event. Serialized once; sessions without a matching
/// subscription are skipped, failed sends are swallowed (the session is
/// reaped when its transport closes).
pub fn deliver(state: &AppState, event: PropertyChangedEvent) {
    let oid = event.oid;
    let text = match serde_json::to_string(&NotificationMessage::new(event)) {
        Ok(text) => text,
        Err(e) => {
            error!("notification serialize error: {e}");
            return;
        }
    };

    // Snapshot the interested senders first so session churn during
    // delivery cannot invalidate the iteration.
    let targets: Vec<_> = state
        .connections
        .iter()
        .filter(|entry| entry.subscribed_oids.contains(&oid))
        .map(|entry| entry.tx.clone())
        .collect();

    for tx in targets {
        let _ = tx.send(text.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::state::Session;
    use crate::types::{ElementId, EventSender, PropertyChangeType};
    use serde_json::json;
    use tokio::sync::mpsc;
    use uuid::Uuid;

    #[test]
    fn delivers_only_to_subscribed_sessions() {
        let (state, _event_rx) = AppState::new(Config::from_env());

        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let mut session_a = Session::new(tx_a);
        session_a.subscribed_oids.insert(5);
        state.connections.insert(Uuid::new_v4(), session_a);

        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        state.connections.insert(Uuid::new_v4(), Session::new(tx_b));

        let (events, mut rx) = EventSender::channel();
        events.emit(
            5,
            ElementId::new(1, 6),
            PropertyChangeType::ValueChanged,
            json!("hi"),
            None,
        );
        deliver(&state, rx.try_recv().unwrap());

        let text = rx_a.try_recv().unwrap();
        let msg: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(msg["messageType"], 2);
        assert_eq!(msg["notifications"][0]["oid"], 5);

        assert!(rx_b.try_recv().is_err(), "unsubscribed session received event");
    }
}
