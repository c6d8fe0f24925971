//! Object model runtime — the polymorphic member tree.
//!
//! Every live object is a `Member` variant carrying a shared
//! `ObjectCore`. Dispatch is an exhaustive match on the variant; base
//! (level-1) behavior lives on the core and variants fall through to it.
//! Target routing: a call addressed at another oid descends through
//! block children; leaves answer BadOid.

use serde_json::{json, Value};

use crate::block::Block;
use crate::descriptors::{BlockMemberDescriptor, PropertyConstraint, Touchpoint};
use crate::device::DeviceManager;
use crate::registry::ClassManager;
use crate::types::{
    arg_element_id, arg_index, ElementId, EventSender, MethodOutcome, MethodStatus, Oid,
    PropertyChangeType,
};

/// Infallible serialization for model values (all model types serialize
/// without error; a failure would only mean a programming bug upstream).
pub(crate) fn to_json<T: serde::Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

fn bad_oid() -> MethodOutcome {
    MethodOutcome::err(MethodStatus::BadOid, "Member not found")
}

// ═══════════════════════════════════════════════════════════════
// Object core — the invariant record every member carries
// ═══════════════════════════════════════════════════════════════

#[derive(Debug)]
pub struct ObjectCore {
    pub class_id: Vec<i32>,
    pub oid: Oid,
    pub constant_oid: bool,
    pub owner: Option<Oid>,
    pub role: String,
    pub user_label: Option<String>,
    pub touchpoints: Option<Vec<Touchpoint>>,
    pub runtime_constraints: Option<Vec<PropertyConstraint>>,
    pub events: EventSender,
}

impl ObjectCore {
    pub fn new(
        events: &EventSender,
        class_id: Vec<i32>,
        oid: Oid,
        constant_oid: bool,
        owner: Option<Oid>,
        role: &str,
        user_label: Option<&str>,
    ) -> Self {
        Self {
            class_id,
            oid,
            constant_oid,
            owner,
            role: role.into(),
            user_label: user_label.map(Into::into),
            touchpoints: None,
            runtime_constraints: None,
            events: events.clone(),
        }
    }

    pub fn with_touchpoints(mut self, touchpoints: Vec<Touchpoint>) -> Self {
        self.touchpoints = Some(touchpoints);
        self
    }

    pub fn with_runtime_constraints(mut self, constraints: Vec<PropertyConstraint>) -> Self {
        self.runtime_constraints = Some(constraints);
        self
    }

    pub fn notify(
        &self,
        property_id: ElementId,
        change_type: PropertyChangeType,
        value: Value,
        sequence_item_index: Option<u64>,
    ) {
        self.events
            .emit(self.oid, property_id, change_type, value, sequence_item_index);
    }

    /// Level-1 property reads: `classId, oid, constantOid, owner, role,
    /// userLabel, touchpoints, runtimePropertyConstraints`.
    pub fn base_property(&self, id: ElementId) -> MethodOutcome {
        match (id.level, id.index) {
            (1, 1) => MethodOutcome::ok(json!(self.class_id)),
            (1, 2) => MethodOutcome::ok(json!(self.oid)),
            (1, 3) => MethodOutcome::ok(json!(self.constant_oid)),
            (1, 4) => MethodOutcome::ok(to_json(&self.owner)),
            (1, 5) => MethodOutcome::ok(json!(self.role)),
            (1, 6) => MethodOutcome::ok(to_json(&self.user_label)),
            (1, 7) => MethodOutcome::ok(to_json(&self.touchpoints)),
            (1, 8) => MethodOutcome::ok(to_json(&self.runtime_constraints)),
            _ => MethodOutcome::err(MethodStatus::PropertyNotImplemented, "Property not found"),
        }
    }

    /// Level-1 writes. Only `userLabel` is writable (string or null);
    /// every other level-1 property answers Readonly.
    pub fn set_base_property(&mut self, id: ElementId, value: &Value) -> MethodOutcome {
        if id.level != 1 {
            return MethodOutcome::err(MethodStatus::PropertyNotImplemented, "Property not found");
        }
        if id.index != 6 {
            return MethodOutcome::err(
                MethodStatus::Readonly,
                "Could not find the property or it is read-only",
            );
        }
        match value {
            Value::String(s) => self.user_label = Some(s.clone()),
            Value::Null => self.user_label = None,
            _ => {
                return MethodOutcome::err(MethodStatus::ParameterError, "Property value was invalid")
            }
        }
        self.notify(id, PropertyChangeType::ValueChanged, value.clone(), None);
        MethodOutcome::ok_empty()
    }

    /// Base method dispatch: the sequence operations `1m3..1m7` against
    /// the level-1 sequences. Derived classes intercept their own
    /// sequence properties before delegating here.
    pub fn invoke_base(&self, method: ElementId, args: &Value) -> MethodOutcome {
        match (method.level, method.index) {
            (1, 3) => {
                let seq = match self.level1_sequence_args(args) {
                    Ok(seq) => seq,
                    Err(outcome) => return outcome,
                };
                let Some(index) = arg_index(args) else {
                    return MethodOutcome::err(MethodStatus::ParameterError, "Invalid index parameter");
                };
                sequence_item(&seq, index)
            }
            (1, 4) | (1, 5) | (1, 6) => {
                if let Err(outcome) = self.level1_sequence_args(args) {
                    return outcome;
                }
                MethodOutcome::err(MethodStatus::Readonly, "Sequence property is read-only")
            }
            (1, 7) => {
                let seq = match self.level1_sequence_args(args) {
                    Ok(seq) => seq,
                    Err(outcome) => return outcome,
                };
                MethodOutcome::ok(json!(seq.len()))
            }
            _ => MethodOutcome::err(MethodStatus::MethodNotImplemented, "Method not found"),
        }
    }

    /// Resolve `arguments.id` to one of the level-1 sequence properties.
    /// An absent optional sequence reads as empty.
    fn level1_sequence_args(&self, args: &Value) -> Result<Vec<Value>, MethodOutcome> {
        let Some(id) = arg_element_id(args) else {
            return Err(MethodOutcome::err(MethodStatus::ParameterError, "Invalid arguments"));
        };
        match (id.level, id.index) {
            (1, 7) => Ok(sequence_values(&self.touchpoints)),
            (1, 8) => Ok(sequence_values(&self.runtime_constraints)),
            _ => Err(MethodOutcome::err(
                MethodStatus::ParameterError,
                "Property is not a sequence",
            )),
        }
    }
}

fn sequence_values<T: serde::Serialize>(seq: &Option<Vec<T>>) -> Vec<Value> {
    seq.as_ref()
        .map(|items| items.iter().map(to_json).collect())
        .unwrap_or_default()
}

/// Bounds-checked sequence read shared by every sequence-valued property.
pub(crate) fn sequence_item(seq: &[Value], index: i64) -> MethodOutcome {
    if index < 0 || index as usize >= seq.len() {
        return MethodOutcome::err(
            MethodStatus::IndexOutOfBounds,
            format!("Index {index} out of bounds"),
        );
    }
    MethodOutcome::ok(seq[index as usize].clone())
}

// ═══════════════════════════════════════════════════════════════
// Worker
// ═══════════════════════════════════════════════════════════════

#[derive(Debug)]
pub struct Worker {
    pub core: ObjectCore,
    pub enabled: bool,
}

impl Worker {
    pub fn new(core: ObjectCore, enabled: bool) -> Self {
        Self { core, enabled }
    }

    fn get_local(&self, id: ElementId) -> MethodOutcome {
        match (id.level, id.index) {
            (2, 1) => MethodOutcome::ok(json!(self.enabled)),
            _ => self.core.base_property(id),
        }
    }

    fn set_local(&mut self, id: ElementId, value: &Value) -> MethodOutcome {
        match (id.level, id.index) {
            (2, 1) => {
                let Some(enabled) = value.as_bool() else {
                    return MethodOutcome::err(
                        MethodStatus::ParameterError,
                        "Invalid value type for enabled property",
                    );
                };
                if self.enabled != enabled {
                    self.enabled = enabled;
                    self.core
                        .notify(id, PropertyChangeType::ValueChanged, json!(enabled), None);
                }
                MethodOutcome::ok_empty()
            }
            _ => self.core.set_base_property(id, value),
        }
    }
}

// ═══════════════════════════════════════════════════════════════
// Member — the tagged variant over all object classes
// ═══════════════════════════════════════════════════════════════

#[derive(Debug)]
pub enum Member {
    Object(ObjectCore),
    Worker(Worker),
    Block(Block),
    Manager(ObjectCore),
    DeviceManager(DeviceManager),
    ClassManager(ClassManager),
}

impl Member {
    pub fn core(&self) -> &ObjectCore {
        match self {
            Member::Object(core) | Member::Manager(core) => core,
            Member::Worker(w) => &w.core,
            Member::Block(b) => &b.core,
            Member::DeviceManager(d) => &d.core,
            Member::ClassManager(m) => &m.core,
        }
    }

    /// Wire descriptor of this member as a child of `owner`.
    pub fn descriptor(&self, owner: Oid) -> BlockMemberDescriptor {
        let core = self.core();
        BlockMemberDescriptor {
            role: core.role.clone(),
            oid: core.oid,
            constant_oid: core.constant_oid,
            class_id: core.class_id.clone(),
            user_label: core.user_label.clone().unwrap_or_default(),
            owner,
        }
    }

    // ── Uniform access contract ─────────────────────────────

    pub fn get_property(&self, target: Oid, id: ElementId) -> MethodOutcome {
        if target == self.core().oid {
            return self.get_local(id);
        }
        match self {
            Member::Block(b) => match b.find_member(target) {
                Some(m) => m.get_local(id),
                None => bad_oid(),
            },
            _ => bad_oid(),
        }
    }

    pub fn set_property(&mut self, target: Oid, id: ElementId, value: &Value) -> MethodOutcome {
        if target == self.core().oid {
            return self.set_local(id, value);
        }
        match self {
            Member::Block(b) => match b.find_member_mut(target) {
                Some(m) => m.set_local(id, value),
                None => bad_oid(),
            },
            _ => bad_oid(),
        }
    }

    pub fn invoke_method(&self, target: Oid, method: ElementId, args: &Value) -> MethodOutcome {
        if target == self.core().oid {
            return self.invoke_local(method, args);
        }
        match self {
            Member::Block(b) => match b.find_member(target) {
                Some(m) => m.invoke_local(method, args),
                None => bad_oid(),
            },
            _ => bad_oid(),
        }
    }

    // ── Local dispatch (target already resolved) ────────────

    pub(crate) fn get_local(&self, id: ElementId) -> MethodOutcome {
        match self {
            Member::Object(core) | Member::Manager(core) => core.base_property(id),
            Member::Worker(w) => w.get_local(id),
            Member::Block(b) => b.get_local(id),
            Member::DeviceManager(d) => d.get_local(id),
            Member::ClassManager(m) => m.get_local(id),
        }
    }

    pub(crate) fn set_local(&mut self, id: ElementId, value: &Value) -> MethodOutcome {
        match self {
            Member::Object(core) | Member::Manager(core) => core.set_base_property(id, value),
            Member::Worker(w) => w.set_local(id, value),
            Member::Block(b) => b.set_local(id, value),
            Member::DeviceManager(d) => d.set_local(id, value),
            Member::ClassManager(m) => m.set_local(id, value),
        }
    }

    pub(crate) fn invoke_local(&self, method: ElementId, args: &Value) -> MethodOutcome {
        match self {
            Member::Object(core) | Member::Manager(core) => core.invoke_base(method, args),
            Member::Worker(w) => w.core.invoke_base(method, args),
            Member::Block(b) => b.invoke_local(method, args),
            Member::DeviceManager(d) => d.core.invoke_base(method, args),
            Member::ClassManager(m) => m.invoke_local(method, args),
        }
    }
}

// ═══════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::sync::mpsc::UnboundedReceiver;

    use crate::types::PropertyChangedEvent;

    fn test_core(events: &EventSender, oid: Oid, role: &str) -> ObjectCore {
        ObjectCore::new(events, vec![1], oid, true, Some(1), role, Some("label"))
    }

    fn channel() -> (EventSender, UnboundedReceiver<PropertyChangedEvent>) {
        EventSender::channel()
    }

    #[test]
    fn base_properties_read_back() {
        let (events, _rx) = channel();
        let obj = Member::Object(test_core(&events, 4, "my-obj-01"));

        let out = obj.get_property(4, ElementId::new(1, 1));
        assert_eq!(out.status, MethodStatus::Ok);
        assert_eq!(out.value, Some(json!([1])));

        let out = obj.get_property(4, ElementId::new(1, 5));
        assert_eq!(out.value, Some(json!("my-obj-01")));

        // Absent touchpoints read as null (no value in the response).
        let out = obj.get_property(4, ElementId::new(1, 7));
        assert_eq!(out.status, MethodStatus::Ok);
        assert_eq!(out.value, None);

        let out = obj.get_property(4, ElementId::new(1, 9));
        assert_eq!(out.status, MethodStatus::PropertyNotImplemented);
    }

    #[test]
    fn user_label_set_roundtrip_and_event() {
        let (events, mut rx) = channel();
        let mut obj = Member::Object(test_core(&events, 4, "obj"));

        let out = obj.set_property(4, ElementId::new(1, 6), &json!("hi"));
        assert_eq!(out.status, MethodStatus::Ok);
        assert!(out.error.is_none());

        let out = obj.get_property(4, ElementId::new(1, 6));
        assert_eq!(out.value, Some(json!("hi")));

        let ev = rx.try_recv().unwrap();
        assert_eq!(ev.oid, 4);
        assert_eq!(ev.event_id, ElementId::new(1, 1));
        assert_eq!(ev.event_data.property_id, ElementId::new(1, 6));
        assert_eq!(ev.event_data.value, json!("hi"));

        // Null clears the label.
        let out = obj.set_property(4, ElementId::new(1, 6), &Value::Null);
        assert_eq!(out.status, MethodStatus::Ok);
        let out = obj.get_property(4, ElementId::new(1, 6));
        assert_eq!(out.value, None);
    }

    #[test]
    fn level1_writes_other_than_user_label_are_readonly() {
        let (events, _rx) = channel();
        let mut obj = Member::Object(test_core(&events, 4, "obj"));

        for index in [1u16, 2, 3, 4, 5, 7, 8] {
            let out = obj.set_property(4, ElementId::new(1, index), &json!("x"));
            assert_eq!(out.status, MethodStatus::Readonly, "index {index}");
        }

        let out = obj.set_property(4, ElementId::new(1, 6), &json!(42));
        assert_eq!(out.status, MethodStatus::ParameterError);
    }

    #[test]
    fn leaf_routing_answers_bad_oid() {
        let (events, _rx) = channel();
        let obj = Member::Object(test_core(&events, 4, "obj"));
        let out = obj.get_property(999, ElementId::new(1, 1));
        assert_eq!(out.status, MethodStatus::BadOid);
    }

    #[test]
    fn worker_enabled_set_and_event_only_on_change() {
        let (events, mut rx) = channel();
        let mut worker = Member::Worker(Worker::new(
            ObjectCore::new(&events, vec![1, 2], 5, true, Some(1), "my-worker-01", None),
            true,
        ));

        let out = worker.set_property(5, ElementId::new(2, 1), &json!(false));
        assert_eq!(out.status, MethodStatus::Ok);
        let ev = rx.try_recv().unwrap();
        assert_eq!(ev.event_data.property_id, ElementId::new(2, 1));
        assert_eq!(ev.event_data.value, json!(false));

        // Same value again: no event.
        let out = worker.set_property(5, ElementId::new(2, 1), &json!(false));
        assert_eq!(out.status, MethodStatus::Ok);
        assert!(rx.try_recv().is_err());

        let out = worker.set_property(5, ElementId::new(2, 1), &json!("yes"));
        assert_eq!(out.status, MethodStatus::ParameterError);
    }

    #[test]
    fn touchpoint_sequence_served_by_base() {
        let (events, _rx) = channel();
        let core = ObjectCore::new(&events, vec![1], 4, true, Some(1), "obj", None)
            .with_touchpoints(vec![Touchpoint::nmos("device", "abc")]);
        let obj = Member::Object(core);

        let args = json!({"id": {"level": 1, "index": 7}});
        let out = obj.invoke_method(4, ElementId::new(1, 7), &args);
        assert_eq!(out.value, Some(json!(1)));

        let args = json!({"id": {"level": 1, "index": 7}, "index": 0});
        let out = obj.invoke_method(4, ElementId::new(1, 3), &args);
        assert_eq!(out.status, MethodStatus::Ok);
        assert_eq!(out.value.unwrap()["resource"]["id"], "abc");

        let args = json!({"id": {"level": 1, "index": 7}, "index": 1});
        let out = obj.invoke_method(4, ElementId::new(1, 3), &args);
        assert_eq!(out.status, MethodStatus::IndexOutOfBounds);

        let args = json!({"id": {"level": 1, "index": 7}, "index": -1});
        let out = obj.invoke_method(4, ElementId::new(1, 3), &args);
        assert_eq!(out.status, MethodStatus::IndexOutOfBounds);

        // Writes to a read-only sequence.
        let args = json!({"id": {"level": 1, "index": 7}, "index": 0, "value": {}});
        let out = obj.invoke_method(4, ElementId::new(1, 4), &args);
        assert_eq!(out.status, MethodStatus::Readonly);
    }

    #[test]
    fn unknown_method_not_implemented() {
        let (events, _rx) = channel();
        let obj = Member::Object(test_core(&events, 4, "obj"));
        let out = obj.invoke_method(4, ElementId::new(7, 9), &Value::Null);
        assert_eq!(out.status, MethodStatus::MethodNotImplemented);
    }
}
