//! Core protocol types for ncpd.
//!
//! Covers: element/class/object identity, the method status enumeration,
//! property-changed events, the event-bus sender, and the wire messages
//! (command, command-response, notification, subscription,
//! subscription-response, protocol-error).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_repr::{Deserialize_repr, Serialize_repr};
use tokio::sync::mpsc;

// ═══════════════════════════════════════════════════════════════
// Identity
// ═══════════════════════════════════════════════════════════════

/// Process-unique identity of a live object.
pub type Oid = u64;

/// Addresses a property, method, or event within an inheritance path.
/// Level 1 is the root object class; index is 1-based within a level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementId {
    pub level: u16,
    pub index: u16,
}

impl ElementId {
    pub const fn new(level: u16, index: u16) -> Self {
        Self { level, index }
    }
}

/// Dotted form of a class id, e.g. `[1, 3, 2]` → `"1.3.2"`.
/// Inheritance is prefix matching on this form.
pub fn class_id_key(class_id: &[i32]) -> String {
    class_id
        .iter()
        .map(|x| x.to_string())
        .collect::<Vec<_>>()
        .join(".")
}

// ═══════════════════════════════════════════════════════════════
// Enumerations (integer-coded on the wire)
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize_repr, Deserialize_repr)]
#[repr(u16)]
pub enum MethodStatus {
    Ok = 200,
    PropertyDeprecated = 298,
    MethodDeprecated = 299,
    BadCommandFormat = 400,
    Unauthorized = 401,
    BadOid = 404,
    Readonly = 405,
    InvalidRequest = 406,
    Conflict = 409,
    BufferOverflow = 413,
    IndexOutOfBounds = 414,
    ParameterError = 417,
    Locked = 423,
    DeviceError = 500,
    MethodNotImplemented = 501,
    PropertyNotImplemented = 502,
    NotReady = 503,
    Timeout = 504,
}

impl MethodStatus {
    /// Name/value pairs for the reflective enum datatype.
    pub const VARIANTS: &'static [(&'static str, u16)] = &[
        ("Ok", 200),
        ("PropertyDeprecated", 298),
        ("MethodDeprecated", 299),
        ("BadCommandFormat", 400),
        ("Unauthorized", 401),
        ("BadOid", 404),
        ("Readonly", 405),
        ("InvalidRequest", 406),
        ("Conflict", 409),
        ("BufferOverflow", 413),
        ("IndexOutOfBounds", 414),
        ("ParameterError", 417),
        ("Locked", 423),
        ("DeviceError", 500),
        ("MethodNotImplemented", 501),
        ("PropertyNotImplemented", 502),
        ("NotReady", 503),
        ("Timeout", 504),
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize_repr, Deserialize_repr)]
#[repr(u16)]
pub enum PropertyChangeType {
    ValueChanged = 0,
    SequenceItemAdded = 1,
    SequenceItemChanged = 2,
    SequenceItemRemoved = 3,
}

impl PropertyChangeType {
    pub const VARIANTS: &'static [(&'static str, u16)] = &[
        ("ValueChanged", 0),
        ("SequenceItemAdded", 1),
        ("SequenceItemChanged", 2),
        ("SequenceItemRemoved", 3),
    ];
}

/// Kind discriminant of a datatype descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize_repr, Deserialize_repr)]
#[repr(u16)]
pub enum DatatypeKind {
    Primitive = 0,
    Typedef = 1,
    Struct = 2,
    Enum = 3,
}

impl DatatypeKind {
    pub const VARIANTS: &'static [(&'static str, u16)] = &[
        ("Primitive", 0),
        ("Typedef", 1),
        ("Struct", 2),
        ("Enum", 3),
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize_repr, Deserialize_repr)]
#[repr(u16)]
pub enum DeviceGenericState {
    Unknown = 0,
    NormalOperation = 1,
    Initializing = 2,
    Updating = 3,
    LicensingError = 4,
    InternalError = 5,
}

impl DeviceGenericState {
    pub const VARIANTS: &'static [(&'static str, u16)] = &[
        ("Unknown", 0),
        ("NormalOperation", 1),
        ("Initializing", 2),
        ("Updating", 3),
        ("LicensingError", 4),
        ("InternalError", 5),
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize_repr, Deserialize_repr)]
#[repr(u16)]
pub enum ResetCause {
    Unknown = 0,
    PowerOn = 1,
    InternalError = 2,
    Upgrade = 3,
    ControllerRequest = 4,
    ManualReset = 5,
}

impl ResetCause {
    pub const VARIANTS: &'static [(&'static str, u16)] = &[
        ("Unknown", 0),
        ("PowerOn", 1),
        ("InternalError", 2),
        ("Upgrade", 3),
        ("ControllerRequest", 4),
        ("ManualReset", 5),
    ];
}

// ═══════════════════════════════════════════════════════════════
// Property-changed events + event bus
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyChangedEventData {
    pub property_id: ElementId,
    pub change_type: PropertyChangeType,
    pub value: Value,
    pub sequence_item_index: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyChangedEvent {
    pub oid: Oid,
    pub event_id: ElementId,
    pub event_data: PropertyChangedEventData,
}

/// Every event carries the fixed PropertyChanged event id `1e1`.
pub const PROPERTY_CHANGED_EVENT_ID: ElementId = ElementId::new(1, 1);

/// Producer handle onto the event queue. Cloned into every object core;
/// enqueue never blocks (the queue is unbounded, drained by the fan-out
/// task). Send failures are swallowed — the receiver only drops at
/// process exit or in tests.
#[derive(Debug, Clone)]
pub struct EventSender(mpsc::UnboundedSender<PropertyChangedEvent>);

impl EventSender {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<PropertyChangedEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self(tx), rx)
    }

    pub fn emit(
        &self,
        oid: Oid,
        property_id: ElementId,
        change_type: PropertyChangeType,
        value: Value,
        sequence_item_index: Option<u64>,
    ) {
        let _ = self.0.send(PropertyChangedEvent {
            oid,
            event_id: PROPERTY_CHANGED_EVENT_ID,
            event_data: PropertyChangedEventData {
                property_id,
                change_type,
                value,
                sequence_item_index,
            },
        });
    }
}

// ═══════════════════════════════════════════════════════════════
// Method outcomes
// ═══════════════════════════════════════════════════════════════

/// Uniform result of get/set/invoke against the object tree.
/// `error` set means the command response carries an error object.
#[derive(Debug, Clone)]
pub struct MethodOutcome {
    pub status: MethodStatus,
    pub error: Option<String>,
    pub value: Option<Value>,
}

impl MethodOutcome {
    /// Success carrying a value. A null value collapses to "no value"
    /// in the response encoding.
    pub fn ok(value: Value) -> Self {
        let value = if value.is_null() { None } else { Some(value) };
        Self {
            status: MethodStatus::Ok,
            error: None,
            value,
        }
    }

    /// Success with no result payload (Set and sequence writes).
    pub fn ok_empty() -> Self {
        Self {
            status: MethodStatus::Ok,
            error: None,
            value: None,
        }
    }

    pub fn err(status: MethodStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            error: Some(message.into()),
            value: None,
        }
    }
}

// ═══════════════════════════════════════════════════════════════
// Wire messages
// ═══════════════════════════════════════════════════════════════

pub const MESSAGE_TYPE_COMMAND: u8 = 0;
pub const MESSAGE_TYPE_COMMAND_RESPONSE: u8 = 1;
pub const MESSAGE_TYPE_NOTIFICATION: u8 = 2;
pub const MESSAGE_TYPE_SUBSCRIPTION: u8 = 3;
pub const MESSAGE_TYPE_SUBSCRIPTION_RESPONSE: u8 = 4;
pub const MESSAGE_TYPE_ERROR: u8 = 5;

/// One entry of a command batch.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Command {
    pub handle: i64,
    pub oid: Oid,
    pub method_id: ElementId,
    #[serde(default)]
    pub arguments: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResponse {
    pub handle: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ResultPayload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorPayload>,
}

#[derive(Debug, Serialize)]
pub struct ResultPayload {
    pub status: MethodStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    pub status: MethodStatus,
    pub error_message: String,
}

impl CommandResponse {
    /// Encode one outcome; an outcome with error text becomes the error
    /// form, everything else the result form.
    pub fn from_outcome(handle: i64, outcome: MethodOutcome) -> Self {
        match outcome.error {
            Some(message) => Self {
                handle,
                result: None,
                error: Some(ErrorPayload {
                    status: outcome.status,
                    error_message: message,
                }),
            },
            None => Self {
                handle,
                result: Some(ResultPayload {
                    status: outcome.status,
                    value: outcome.value,
                }),
                error: None,
            },
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResponseMessage {
    pub message_type: u8,
    pub responses: Vec<CommandResponse>,
}

impl CommandResponseMessage {
    pub fn new(responses: Vec<CommandResponse>) -> Self {
        Self {
            message_type: MESSAGE_TYPE_COMMAND_RESPONSE,
            responses,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationMessage {
    pub message_type: u8,
    pub notifications: Vec<PropertyChangedEvent>,
}

impl NotificationMessage {
    pub fn new(event: PropertyChangedEvent) -> Self {
        Self {
            message_type: MESSAGE_TYPE_NOTIFICATION,
            notifications: vec![event],
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionResponseMessage {
    pub message_type: u8,
    pub subscriptions: Vec<Oid>,
}

impl SubscriptionResponseMessage {
    pub fn new(subscriptions: Vec<Oid>) -> Self {
        Self {
            message_type: MESSAGE_TYPE_SUBSCRIPTION_RESPONSE,
            subscriptions,
        }
    }
}

/// Standalone reply for malformed or unrecognized inbound messages.
/// Never closes the connection.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolErrorMessage {
    pub message_type: u8,
    pub status: MethodStatus,
    pub error_message: String,
}

impl ProtocolErrorMessage {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message_type: MESSAGE_TYPE_ERROR,
            status: MethodStatus::BadCommandFormat,
            error_message: message.into(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════
// Argument helpers
// ═══════════════════════════════════════════════════════════════

/// Extract `arguments.id` as an element id.
pub fn arg_element_id(args: &Value) -> Option<ElementId> {
    args.get("id")
        .and_then(|id| serde_json::from_value(id.clone()).ok())
}

/// Extract `arguments.index`. `None` means missing or non-integer
/// (ParameterError at the caller); negative values are returned as-is so
/// the caller can report IndexOutOfBounds.
pub fn arg_index(args: &Value) -> Option<i64> {
    args.get("index").and_then(Value::as_i64)
}

/// Extract a named boolean argument, defaulting to false when absent.
pub fn arg_bool(args: &Value, name: &str) -> bool {
    args.get(name).and_then(Value::as_bool).unwrap_or(false)
}

// ═══════════════════════════════════════════════════════════════
// Time encoding
// ═══════════════════════════════════════════════════════════════

/// IS-04 version timestamp: `"<tai_seconds>:<nanoseconds>"` with the
/// current 37-second TAI-UTC offset.
pub fn tai_timestamp() -> String {
    let now = chrono::Utc::now();
    format!("{}:{}", now.timestamp() + 37, now.timestamp_subsec_nanos())
}

// ═══════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════
