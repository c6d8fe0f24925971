//! WebSocket control-protocol session.
//!
//! Flow per connection:
//! 1. Accept WS upgrade, register the session in the shared map
//! 2. Spawn a writer task — command replies and event notifications
//!    share one outbound channel into the socket sink
//! 3. Reader loop: each text frame is dispatched to command execution
//!    or subscription update; malformed input gets a protocol-error
//!    reply, never a disconnect
//! 4. On any exit path: remove the session from the map

use std::collections::BTreeSet;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::state::{AppState, Session};
use crate::types::{
    arg_element_id, Command, CommandResponse, CommandResponseMessage, MethodOutcome, MethodStatus,
    Oid, ProtocolErrorMessage, SubscriptionResponseMessage, MESSAGE_TYPE_COMMAND,
    MESSAGE_TYPE_SUBSCRIPTION,
};

/// Axum handler for GET /ws — upgrades to WebSocket.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Per-connection loop.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let conn_id = Uuid::new_v4();
    let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<String>();
    state.connections.insert(conn_id, Session::new(outbound));
    info!(%conn_id, "controller connected");

    let (mut sink, mut stream) = socket.split();

    // Writer task: drains the outbound channel into the sink so that
    // replies and fan-out notifications cannot interleave mid-frame.
    let writer = tokio::spawn(async move {
        while let Some(text) = outbound_rx.recv().await {
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => {
                if let Some(reply) = dispatch_text(&state, conn_id, &text) {
                    let delivered = state
                        .connections
                        .get(&conn_id)
                        .map(|session| session.tx.send(reply).is_ok())
                        .unwrap_or(false);
                    if !delivered {
                        break;
                    }
                }
            }
            Ok(Message::Close(_)) => break,
            Ok(Message::Ping(_)) => { /* axum auto-pongs */ }
            Ok(_) => { /* binary frames ignored */ }
            Err(e) => {
                warn!(%conn_id, "ws recv error: {e}");
                break;
            }
        }
    }

    state.connections.remove(&conn_id);
    writer.abort();
    info!(%conn_id, "controller disconnected");
}

// ═══════════════════════════════════════════════════════════════
// Message dispatch
// ═══════════════════════════════════════════════════════════════

/// Route one inbound text frame to command execution or subscription
/// update. Returns the reply to send, if any. Transport-independent so
/// the whole pipeline is testable without a socket.
pub fn dispatch_text(state: &AppState, conn_id: Uuid, text: &str) -> Option<String> {
    let parsed: Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(_) => return encode(&ProtocolErrorMessage::new("Invalid JSON")),
    };

    match parsed.get("messageType").and_then(Value::as_u64) {
        Some(t) if t == u64::from(MESSAGE_TYPE_COMMAND) => {
            match parsed.get("commands").and_then(Value::as_array) {
                Some(commands) => encode(&process_commands(state, commands)),
                None => encode(&ProtocolErrorMessage::new("Invalid message")),
            }
        }
        Some(t) if t == u64::from(MESSAGE_TYPE_SUBSCRIPTION) => {
            match parsed.get("subscriptions").and_then(Value::as_array) {
                Some(subscriptions) => {
                    encode(&process_subscription(state, conn_id, subscriptions))
                }
                None => encode(&ProtocolErrorMessage::new("Invalid message")),
            }
        }
        _ => encode(&ProtocolErrorMessage::new("Invalid message")),
    }
}

fn encode<T: serde::Serialize>(message: &T) -> Option<String> {
    match serde_json::to_string(message) {
        Ok(text) => Some(text),
        Err(e) => {
            error!("reply serialize error: {e}");
            None
        }
    }
}

/// Execute a command batch in array order; one response per command in
/// the same order. A command entry that fails to parse yields a
/// per-command BadCommandFormat response and never poisons the batch.
fn process_commands(state: &AppState, commands: &[Value]) -> CommandResponseMessage {
    let mut responses = Vec::with_capacity(commands.len());
    for raw in commands {
        let response = match serde_json::from_value::<Command>(raw.clone()) {
            Ok(cmd) => CommandResponse::from_outcome(cmd.handle, execute_command(state, &cmd)),
            Err(e) => {
                let handle = raw.get("handle").and_then(Value::as_i64).unwrap_or(0);
                CommandResponse::from_outcome(
                    handle,
                    MethodOutcome::err(
                        MethodStatus::BadCommandFormat,
                        format!("Malformed command: {e}"),
                    ),
                )
            }
        };
        responses.push(response);
    }
    CommandResponseMessage::new(responses)
}

/// `1m1`/`1m2` route to the property operations, everything else to
/// method invocation. Get/invoke take the tree's read side, Set the
/// write side.
fn execute_command(state: &AppState, cmd: &Command) -> MethodOutcome {
    match (cmd.method_id.level, cmd.method_id.index) {
        (1, 1) => {
            let Some(id) = arg_element_id(&cmd.arguments) else {
                return MethodOutcome::err(MethodStatus::ParameterError, "Invalid arguments");
            };
            let root = state.root.read().unwrap_or_else(|poisoned| poisoned.into_inner());
            root.get_property(cmd.oid, id)
        }
        (1, 2) => {
            let Some(id) = arg_element_id(&cmd.arguments) else {
                return MethodOutcome::err(MethodStatus::ParameterError, "Invalid arguments");
            };
            let value = cmd.arguments.get("value").cloned().unwrap_or(Value::Null);
            let mut root = state.root.write().unwrap_or_else(|poisoned| poisoned.into_inner());
            root.set_property(cmd.oid, id, &value)
        }
        _ => {
            let root = state.root.read().unwrap_or_else(|poisoned| poisoned.into_inner());
            root.invoke_method(cmd.oid, cmd.method_id, &cmd.arguments)
        }
    }
}

/// Replace the session's subscription set. The echo is deduplicated and
/// sorted ascending.
fn process_subscription(
    state: &AppState,
    conn_id: Uuid,
    subscriptions: &[Value],
) -> SubscriptionResponseMessage {
    let normalized: BTreeSet<Oid> = subscriptions.iter().filter_map(Value::as_u64).collect();
    if let Some(mut session) = state.connections.get_mut(&conn_id) {
        session.subscribed_oids = normalized.iter().copied().collect();
    }
    SubscriptionResponseMessage::new(normalized.into_iter().collect())
}

// ═══════════════════════════════════════════════════════════════
// Tests — the dispatcher drives the bootstrapped device model
// ═══════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::fanout;
    use crate::types::PropertyChangedEvent;
    use serde_json::json;
    use tokio::sync::mpsc::UnboundedReceiver;

    struct Harness {
        state: Arc<AppState>,
        conn_id: Uuid,
        outbound: UnboundedReceiver<String>,
        events: UnboundedReceiver<PropertyChangedEvent>,
    }

    /// A session attached to the bootstrapped device model. Events
    /// emitted during tree construction are drained away.
    fn harness() -> Harness {
        let (state, mut events) = AppState::new(Config::from_env());
        while events.try_recv().is_ok() {}

        let conn_id = Uuid::new_v4();
        let (tx, outbound) = mpsc::unbounded_channel();
        state.connections.insert(conn_id, Session::new(tx));
        Harness {
            state,
            conn_id,
            outbound,
            events,
        }
    }

    fn send(h: &Harness, msg: Value) -> Value {
        let reply = dispatch_text(&h.state, h.conn_id, &msg.to_string()).unwrap();
        serde_json::from_str(&reply).unwrap()
    }

    #[test]
    fn subscribe_then_mutate_notifies_the_session() {
        let mut h = harness();

        let reply = send(&h, json!({"messageType": 3, "subscriptions": [5]}));
        assert_eq!(reply, json!({"messageType": 4, "subscriptions": [5]}));

        let reply = send(
            &h,
            json!({
                "messageType": 0,
                "commands": [{
                    "handle": 1,
                    "oid": 5,
                    "methodId": {"level": 1, "index": 2},
                    "arguments": {"id": {"level": 1, "index": 6}, "value": "hi"}
                }]
            }),
        );
        assert_eq!(
            reply,
            json!({"messageType": 1, "responses": [{"handle": 1, "result": {"status": 200}}]})
        );

        // Fan the queued event out and read the notification.
        let event = h.events.try_recv().unwrap();
        fanout::deliver(&h.state, event);
        let notification: Value = serde_json::from_str(&h.outbound.try_recv().unwrap()).unwrap();
        assert_eq!(
            notification,
            json!({
                "messageType": 2,
                "notifications": [{
                    "oid": 5,
                    "eventId": {"level": 1, "index": 1},
                    "eventData": {
                        "propertyId": {"level": 1, "index": 6},
                        "changeType": 0,
                        "value": "hi",
                        "sequenceItemIndex": null
                    }
                }]
            })
        );
    }

    #[test]
    fn unknown_oid_answers_bad_oid() {
        let h = harness();
        let reply = send(
            &h,
            json!({
                "messageType": 0,
                "commands": [{
                    "handle": 7,
                    "oid": 999,
                    "methodId": {"level": 1, "index": 1},
                    "arguments": {"id": {"level": 1, "index": 5}}
                }]
            }),
        );
        assert_eq!(reply["responses"][0]["handle"], 7);
        assert_eq!(reply["responses"][0]["error"]["status"], 404);
    }

    #[test]
    fn commands_run_in_array_order() {
        let h = harness();
        let reply = send(
            &h,
            json!({
                "messageType": 0,
                "commands": [
                    {
                        "handle": 1,
                        "oid": 1,
                        "methodId": {"level": 1, "index": 1},
                        "arguments": {"id": {"level": 1, "index": 5}}
                    },
                    {
                        "handle": 2,
                        "oid": 4,
                        "methodId": {"level": 1, "index": 1},
                        "arguments": {"id": {"level": 1, "index": 5}}
                    }
                ]
            }),
        );
        let responses = reply["responses"].as_array().unwrap();
        assert_eq!(responses[0]["handle"], 1);
        assert_eq!(responses[0]["result"]["value"], "root");
        assert_eq!(responses[1]["handle"], 2);
        assert_eq!(responses[1]["result"]["value"], "my-obj-01");
    }

    #[test]
    fn malformed_command_entry_fails_alone() {
        let h = harness();
        let reply = send(
            &h,
            json!({
                "messageType": 0,
                "commands": [
                    {"handle": 9, "oid": "not-an-oid", "methodId": {"level": 1, "index": 1}},
                    {
                        "handle": 10,
                        "oid": 1,
                        "methodId": {"level": 1, "index": 1},
                        "arguments": {"id": {"level": 1, "index": 2}}
                    }
                ]
            }),
        );
        let responses = reply["responses"].as_array().unwrap();
        assert_eq!(responses[0]["handle"], 9);
        assert_eq!(responses[0]["error"]["status"], 400);
        assert_eq!(responses[1]["result"]["value"], 1);
    }

    #[test]
    fn subscription_echo_is_deduplicated() {
        let h = harness();
        let reply = send(&h, json!({"messageType": 3, "subscriptions": [5, 5, 1, 5]}));
        assert_eq!(reply, json!({"messageType": 4, "subscriptions": [1, 5]}));

        let session = h.state.connections.get(&h.conn_id).unwrap();
        assert_eq!(session.subscribed_oids.len(), 2);
    }

    #[test]
    fn subscription_replaces_previous_set() {
        let h = harness();
        send(&h, json!({"messageType": 3, "subscriptions": [1, 5]}));
        send(&h, json!({"messageType": 3, "subscriptions": [6]}));
        let session = h.state.connections.get(&h.conn_id).unwrap();
        assert_eq!(session.subscribed_oids, [6].into());
    }

    #[test]
    fn malformed_json_keeps_the_session_usable() {
        let h = harness();
        let reply = dispatch_text(&h.state, h.conn_id, "{").unwrap();
        let reply: Value = serde_json::from_str(&reply).unwrap();
        assert_eq!(reply["messageType"], 5);
        assert_eq!(reply["status"], 400);
        assert!(h.state.connections.contains_key(&h.conn_id));

        // A subsequent valid command still succeeds.
        let reply = send(
            &h,
            json!({
                "messageType": 0,
                "commands": [{
                    "handle": 1,
                    "oid": 1,
                    "methodId": {"level": 1, "index": 1},
                    "arguments": {"id": {"level": 1, "index": 2}}
                }]
            }),
        );
        assert_eq!(reply["responses"][0]["result"]["status"], 200);
    }

    #[test]
    fn unrecognized_message_type_answers_protocol_error() {
        let h = harness();
        let reply = send(&h, json!({"messageType": 9, "whatever": true}));
        assert_eq!(reply["messageType"], 5);
        assert_eq!(reply["status"], 400);

        let reply = send(&h, json!({"messageType": 0}));
        assert_eq!(reply["messageType"], 5);
    }

    #[test]
    fn class_manager_reachable_through_dispatch() {
        let h = harness();
        let reply = send(
            &h,
            json!({
                "messageType": 0,
                "commands": [{
                    "handle": 4,
                    "oid": 3,
                    "methodId": {"level": 3, "index": 1},
                    "arguments": {"classId": [1, 3, 1], "includeInherited": true}
                }]
            }),
        );
        let value = &reply["responses"][0]["result"]["value"];
        assert_eq!(value["name"], "NcDeviceManager");
        assert_eq!(value["properties"].as_array().unwrap().len(), 18);
        assert_eq!(value["properties"][0]["name"], "ncVersion");
        assert_eq!(value["properties"][10]["name"], "classId");
    }

    #[test]
    fn runtime_constraints_readable_through_dispatch() {
        let h = harness();
        let reply = send(
            &h,
            json!({
                "messageType": 0,
                "commands": [
                    {
                        "handle": 1,
                        "oid": 5,
                        "methodId": {"level": 1, "index": 7},
                        "arguments": {"id": {"level": 1, "index": 8}}
                    },
                    {
                        "handle": 2,
                        "oid": 5,
                        "methodId": {"level": 1, "index": 3},
                        "arguments": {"id": {"level": 1, "index": 8}, "index": 0}
                    }
                ]
            }),
        );
        let responses = reply["responses"].as_array().unwrap();
        assert_eq!(responses[0]["result"]["value"], 1);
        let constraint = &responses[1]["result"]["value"];
        assert_eq!(constraint["propertyId"], json!({"level": 1, "index": 6}));
        assert_eq!(constraint["maxCharacters"], 64);
    }

    #[test]
    fn device_manager_write_emits_event_for_touched_id() {
        let mut h = harness();
        send(&h, json!({"messageType": 3, "subscriptions": [2]}));
        let reply = send(
            &h,
            json!({
                "messageType": 0,
                "commands": [{
                    "handle": 1,
                    "oid": 2,
                    "methodId": {"level": 1, "index": 2},
                    "arguments": {"id": {"level": 3, "index": 6}, "value": "edge-gw-7"}
                }]
            }),
        );
        assert_eq!(reply["responses"][0]["result"]["status"], 200);

        let event = h.events.try_recv().unwrap();
        assert_eq!(event.oid, 2);
        assert_eq!(event.event_data.property_id.level, 3);
        assert_eq!(event.event_data.property_id.index, 6);
    }
}
