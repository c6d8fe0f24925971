//! DeviceManager — product/manufacturer identity and device health.
//!
//! Class `[1,3,1]`, fixed role `DeviceManager`. Level-3 properties are
//! read-only identity except the three nullable inventory strings
//! (userInventoryCode, deviceName, deviceRole).

use serde_json::{json, Value};

use crate::descriptors::{Manufacturer, OperationalState, Product};
use crate::object::{to_json, ObjectCore};
use crate::types::{
    DeviceGenericState, ElementId, MethodOutcome, MethodStatus, PropertyChangeType, ResetCause,
};

#[derive(Debug)]
pub struct DeviceManager {
    pub core: ObjectCore,
    pub nc_version: String,
    pub manufacturer: Manufacturer,
    pub product: Product,
    pub serial_number: String,
    pub user_inventory_code: Option<String>,
    pub device_name: Option<String>,
    pub device_role: Option<String>,
    pub operational_state: OperationalState,
    pub reset_cause: ResetCause,
    pub message: Option<String>,
}

impl DeviceManager {
    pub fn new(
        core: ObjectCore,
        nc_version: &str,
        manufacturer: Manufacturer,
        product: Product,
        serial_number: &str,
    ) -> Self {
        Self {
            core,
            nc_version: nc_version.into(),
            manufacturer,
            product,
            serial_number: serial_number.into(),
            user_inventory_code: None,
            device_name: None,
            device_role: None,
            operational_state: OperationalState {
                generic: DeviceGenericState::NormalOperation,
                device_specific_details: None,
            },
            reset_cause: ResetCause::PowerOn,
            message: None,
        }
    }

    pub(crate) fn get_local(&self, id: ElementId) -> MethodOutcome {
        if id.level != 3 {
            return self.core.base_property(id);
        }
        match id.index {
            1 => MethodOutcome::ok(json!(self.nc_version)),
            2 => MethodOutcome::ok(to_json(&self.manufacturer)),
            3 => MethodOutcome::ok(to_json(&self.product)),
            4 => MethodOutcome::ok(json!(self.serial_number)),
            5 => MethodOutcome::ok(to_json(&self.user_inventory_code)),
            6 => MethodOutcome::ok(to_json(&self.device_name)),
            7 => MethodOutcome::ok(to_json(&self.device_role)),
            8 => MethodOutcome::ok(to_json(&self.operational_state)),
            9 => MethodOutcome::ok(to_json(&self.reset_cause)),
            10 => MethodOutcome::ok(to_json(&self.message)),
            _ => MethodOutcome::err(MethodStatus::PropertyNotImplemented, "Property not found"),
        }
    }

    pub(crate) fn set_local(&mut self, id: ElementId, value: &Value) -> MethodOutcome {
        if id.level != 3 {
            return self.core.set_base_property(id, value);
        }
        let slot = match id.index {
            5 => &mut self.user_inventory_code,
            6 => &mut self.device_name,
            7 => &mut self.device_role,
            _ => {
                return MethodOutcome::err(
                    MethodStatus::Readonly,
                    "Could not find the property or it is read-only",
                )
            }
        };
        match value {
            Value::String(s) => *slot = Some(s.clone()),
            Value::Null => *slot = None,
            _ => {
                return MethodOutcome::err(MethodStatus::ParameterError, "Property value was invalid")
            }
        }
        self.core
            .notify(id, PropertyChangeType::ValueChanged, value.clone(), None);
        MethodOutcome::ok_empty()
    }
}

// ═══════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::Member;
    use crate::types::EventSender;

    fn device_manager(events: &EventSender) -> Member {
        Member::DeviceManager(DeviceManager::new(
            ObjectCore::new(
                events,
                vec![1, 3, 1],
                2,
                true,
                Some(1),
                "DeviceManager",
                Some("Device Manager"),
            ),
            "v1.0.0",
            Manufacturer {
                name: "Acme Broadcast".into(),
                organization_id: None,
                website: Some("https://example.com".into()),
            },
            Product {
                name: "Gateway".into(),
                key: "MODEL-XYZ-2000".into(),
                revision_level: "1.0".into(),
                brand_name: None,
                uuid: None,
                description: None,
            },
            "SN-123456789",
        ))
    }

    #[test]
    fn identity_properties_read_back() {
        let (events, _rx) = EventSender::channel();
        let dm = device_manager(&events);

        let out = dm.get_property(2, ElementId::new(3, 1));
        assert_eq!(out.value, Some(json!("v1.0.0")));

        let out = dm.get_property(2, ElementId::new(3, 2));
        assert_eq!(out.value.unwrap()["name"], "Acme Broadcast");

        let out = dm.get_property(2, ElementId::new(3, 8));
        assert_eq!(
            out.value,
            Some(json!({"generic": 1, "deviceSpecificDetails": null}))
        );

        let out = dm.get_property(2, ElementId::new(3, 9));
        assert_eq!(out.value, Some(json!(1)));

        let out = dm.get_property(2, ElementId::new(3, 11));
        assert_eq!(out.status, MethodStatus::PropertyNotImplemented);
    }

    #[test]
    fn inventory_strings_accept_string_or_null() {
        let (events, mut rx) = EventSender::channel();
        let mut dm = device_manager(&events);

        let out = dm.set_property(2, ElementId::new(3, 6), &json!("studio-device"));
        assert_eq!(out.status, MethodStatus::Ok);
        let ev = rx.try_recv().unwrap();
        assert_eq!(ev.event_data.property_id, ElementId::new(3, 6));
        assert_eq!(ev.event_data.value, json!("studio-device"));

        let out = dm.get_property(2, ElementId::new(3, 6));
        assert_eq!(out.value, Some(json!("studio-device")));

        let out = dm.set_property(2, ElementId::new(3, 6), &Value::Null);
        assert_eq!(out.status, MethodStatus::Ok);
        let out = dm.get_property(2, ElementId::new(3, 6));
        assert_eq!(out.value, None);

        let out = dm.set_property(2, ElementId::new(3, 5), &json!(12));
        assert_eq!(out.status, MethodStatus::ParameterError);
    }

    #[test]
    fn other_level3_writes_are_readonly() {
        let (events, _rx) = EventSender::channel();
        let mut dm = device_manager(&events);
        for index in [1u16, 2, 3, 4, 8, 9, 10] {
            let out = dm.set_property(2, ElementId::new(3, index), &json!("x"));
            assert_eq!(out.status, MethodStatus::Readonly, "index {index}");
        }
    }
}
