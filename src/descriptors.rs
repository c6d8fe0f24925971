//! Reflective descriptor model.
//!
//! Everything a controller can discover about the device: class
//! descriptors (properties, methods, events), datatype descriptors
//! (primitive / typedef / enum / struct), block-member descriptors,
//! touchpoints, runtime property constraints, and the device identity
//! records surfaced by the device manager.

use serde::Serialize;
use serde_json::Value;

use crate::types::{DatatypeKind, DeviceGenericState, ElementId, Oid};

// ═══════════════════════════════════════════════════════════════
// Class descriptors
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyDescriptor {
    pub description: Option<String>,
    pub id: ElementId,
    pub name: String,
    pub type_name: Option<String>,
    pub is_read_only: bool,
    pub is_nullable: bool,
    pub is_sequence: bool,
    pub is_deprecated: bool,
    pub constraints: Option<Value>,
}

impl PropertyDescriptor {
    pub fn new(
        id: ElementId,
        name: &str,
        type_name: &str,
        read_only: bool,
        nullable: bool,
        sequence: bool,
    ) -> Self {
        Self {
            description: None,
            id,
            name: name.into(),
            type_name: Some(type_name.into()),
            is_read_only: read_only,
            is_nullable: nullable,
            is_sequence: sequence,
            is_deprecated: false,
            constraints: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterDescriptor {
    pub description: Option<String>,
    pub name: String,
    pub type_name: Option<String>,
    pub is_nullable: bool,
    pub is_sequence: bool,
    pub constraints: Option<Value>,
}

impl ParameterDescriptor {
    pub fn new(name: &str, type_name: &str, nullable: bool, sequence: bool) -> Self {
        Self {
            description: None,
            name: name.into(),
            type_name: Some(type_name.into()),
            is_nullable: nullable,
            is_sequence: sequence,
            constraints: None,
        }
    }

    /// Open-typed parameter (the `value` of Set and the sequence writes).
    pub fn untyped(name: &str) -> Self {
        Self {
            description: None,
            name: name.into(),
            type_name: None,
            is_nullable: true,
            is_sequence: false,
            constraints: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodDescriptor {
    pub description: Option<String>,
    pub id: ElementId,
    pub name: String,
    pub result_datatype: String,
    pub parameters: Vec<ParameterDescriptor>,
    pub is_deprecated: bool,
}

impl MethodDescriptor {
    pub fn new(
        id: ElementId,
        name: &str,
        result_datatype: &str,
        parameters: Vec<ParameterDescriptor>,
    ) -> Self {
        Self {
            description: None,
            id,
            name: name.into(),
            result_datatype: result_datatype.into(),
            parameters,
            is_deprecated: false,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDescriptor {
    pub description: Option<String>,
    pub id: ElementId,
    pub name: String,
    pub event_datatype: String,
    pub is_deprecated: bool,
}

impl EventDescriptor {
    pub fn new(id: ElementId, name: &str, event_datatype: &str) -> Self {
        Self {
            description: None,
            id,
            name: name.into(),
            event_datatype: event_datatype.into(),
            is_deprecated: false,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassDescriptor {
    pub description: Option<String>,
    pub class_id: Vec<i32>,
    pub name: String,
    pub fixed_role: Option<String>,
    pub properties: Vec<PropertyDescriptor>,
    pub methods: Vec<MethodDescriptor>,
    pub events: Vec<EventDescriptor>,
}

// ═══════════════════════════════════════════════════════════════
// Datatype descriptors
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDescriptor {
    pub description: Option<String>,
    pub name: String,
    pub type_name: Option<String>,
    pub is_nullable: bool,
    pub is_sequence: bool,
    pub constraints: Option<Value>,
}

/// Shorthand for the field tables in the registry.
pub fn field(name: &str, type_name: Option<&str>, nullable: bool, sequence: bool) -> FieldDescriptor {
    FieldDescriptor {
        description: None,
        name: name.into(),
        type_name: type_name.map(Into::into),
        is_nullable: nullable,
        is_sequence: sequence,
        constraints: None,
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnumItemDescriptor {
    pub description: Option<String>,
    pub name: String,
    pub value: u16,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrimitiveDatatype {
    pub description: Option<String>,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: DatatypeKind,
    pub constraints: Option<Value>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TypedefDatatype {
    pub description: Option<String>,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: DatatypeKind,
    pub constraints: Option<Value>,
    pub parent_type: String,
    pub is_sequence: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnumDatatype {
    pub description: Option<String>,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: DatatypeKind,
    pub constraints: Option<Value>,
    pub items: Vec<EnumItemDescriptor>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StructDatatype {
    pub description: Option<String>,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: DatatypeKind,
    pub constraints: Option<Value>,
    pub fields: Vec<FieldDescriptor>,
    pub parent_type: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum DatatypeDescriptor {
    Primitive(PrimitiveDatatype),
    Typedef(TypedefDatatype),
    Enum(EnumDatatype),
    Struct(StructDatatype),
}

impl DatatypeDescriptor {
    pub fn primitive(name: &str, description: &str) -> Self {
        Self::Primitive(PrimitiveDatatype {
            description: Some(description.into()),
            name: name.into(),
            kind: DatatypeKind::Primitive,
            constraints: None,
        })
    }

    pub fn typedef(name: &str, parent_type: &str, is_sequence: bool, description: &str) -> Self {
        Self::Typedef(TypedefDatatype {
            description: Some(description.into()),
            name: name.into(),
            kind: DatatypeKind::Typedef,
            constraints: None,
            parent_type: parent_type.into(),
            is_sequence,
        })
    }

    pub fn enumeration(name: &str, description: &str, variants: &[(&str, u16)]) -> Self {
        Self::Enum(EnumDatatype {
            description: Some(description.into()),
            name: name.into(),
            kind: DatatypeKind::Enum,
            constraints: None,
            items: variants
                .iter()
                .map(|(item, value)| EnumItemDescriptor {
                    description: None,
                    name: (*item).into(),
                    value: *value,
                })
                .collect(),
        })
    }

    pub fn structure(
        name: &str,
        description: &str,
        fields: Vec<FieldDescriptor>,
        parent_type: Option<&str>,
    ) -> Self {
        Self::Struct(StructDatatype {
            description: Some(description.into()),
            name: name.into(),
            kind: DatatypeKind::Struct,
            constraints: None,
            fields,
            parent_type: parent_type.map(Into::into),
        })
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Primitive(d) => &d.name,
            Self::Typedef(d) => &d.name,
            Self::Enum(d) => &d.name,
            Self::Struct(d) => &d.name,
        }
    }

    pub fn as_struct(&self) -> Option<&StructDatatype> {
        match self {
            Self::Struct(d) => Some(d),
            _ => None,
        }
    }
}

// ═══════════════════════════════════════════════════════════════
// Block membership
// ═══════════════════════════════════════════════════════════════

/// Wire form of one block child, as carried by the `members` property
/// and the membership query methods.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockMemberDescriptor {
    pub role: String,
    pub oid: Oid,
    pub constant_oid: bool,
    pub class_id: Vec<i32>,
    /// Empty string when the member carries no label.
    pub user_label: String,
    pub owner: Oid,
}

// ═══════════════════════════════════════════════════════════════
// Touchpoints
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TouchpointResourceNmos {
    pub resource_type: String,
    pub id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TouchpointNmos {
    pub context_namespace: String,
    pub resource: TouchpointResourceNmos,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TouchpointResourceNmosChannelMapping {
    pub resource_type: String,
    pub id: String,
    pub io_id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TouchpointNmosChannelMapping {
    pub context_namespace: String,
    pub resource: TouchpointResourceNmosChannelMapping,
}

/// Out-of-band reference linking an NC object to a resource in another
/// namespace. Immutable after construction.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Touchpoint {
    Nmos(TouchpointNmos),
    NmosChannelMapping(TouchpointNmosChannelMapping),
}

impl Touchpoint {
    /// Touchpoint into the `x-nmos` namespace (e.g. the IS-04 device).
    pub fn nmos(resource_type: &str, id: &str) -> Self {
        Self::Nmos(TouchpointNmos {
            context_namespace: "x-nmos".into(),
            resource: TouchpointResourceNmos {
                resource_type: resource_type.into(),
                id: id.into(),
            },
        })
    }

    /// Touchpoint into an IS-08 channel-mapping resource.
    pub fn nmos_channel_mapping(resource_type: &str, id: &str, io_id: &str) -> Self {
        Self::NmosChannelMapping(TouchpointNmosChannelMapping {
            context_namespace: "x-nmos/channelmapping".into(),
            resource: TouchpointResourceNmosChannelMapping {
                resource_type: resource_type.into(),
                id: id.into(),
                io_id: io_id.into(),
            },
        })
    }
}

// ═══════════════════════════════════════════════════════════════
// Runtime property constraints
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyConstraintsNumber {
    pub property_id: ElementId,
    pub default_value: Option<Value>,
    pub maximum: Option<f64>,
    pub minimum: Option<f64>,
    pub step: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyConstraintsString {
    pub property_id: ElementId,
    pub default_value: Option<Value>,
    pub max_characters: Option<u32>,
    pub pattern: Option<String>,
}

/// Per-instance constraint on a property, surfaced through `(1,8)`.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum PropertyConstraint {
    #[allow(dead_code)] // No numeric-valued property ships in this model yet
    Number(PropertyConstraintsNumber),
    String(PropertyConstraintsString),
}

// ═══════════════════════════════════════════════════════════════
// Device identity records
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Manufacturer {
    pub name: String,
    pub organization_id: Option<i64>,
    pub website: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub name: String,
    pub key: String,
    pub revision_level: String,
    pub brand_name: Option<String>,
    pub uuid: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationalState {
    pub generic: DeviceGenericState,
    pub device_specific_details: Option<String>,
}

// ═══════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn block_member_descriptor_wire_shape() {
        let desc = BlockMemberDescriptor {
            role: "my-worker-01".into(),
            oid: 5,
            constant_oid: true,
            class_id: vec![1, 2],
            user_label: "My worker 01".into(),
            owner: 1,
        };
        assert_eq!(
            serde_json::to_value(&desc).unwrap(),
            json!({
                "role": "my-worker-01",
                "oid": 5,
                "constantOid": true,
                "classId": [1, 2],
                "userLabel": "My worker 01",
                "owner": 1
            })
        );
    }

    #[test]
    fn typedef_serializes_flat() {
        let dt = DatatypeDescriptor::typedef("NcClassId", "NcInt32", true, "Sequence of class ID fields");
        let v = serde_json::to_value(&dt).unwrap();
        assert_eq!(v["name"], "NcClassId");
        assert_eq!(v["type"], 1);
        assert_eq!(v["parentType"], "NcInt32");
        assert_eq!(v["isSequence"], true);
    }

    #[test]
    fn enum_items_carry_numeric_values() {
        let dt = DatatypeDescriptor::enumeration(
            "NcPropertyChangeType",
            "Type of property change",
            crate::types::PropertyChangeType::VARIANTS,
        );
        let v = serde_json::to_value(&dt).unwrap();
        assert_eq!(v["type"], 3);
        assert_eq!(v["items"][0], json!({"description": null, "name": "ValueChanged", "value": 0}));
        assert_eq!(v["items"].as_array().unwrap().len(), 4);
    }

    #[test]
    fn touchpoint_wire_shape() {
        let tp = Touchpoint::nmos("device", "67c25159-ce25-4000-a66c-f31fff890265");
        assert_eq!(
            serde_json::to_value(&tp).unwrap(),
            json!({
                "contextNamespace": "x-nmos",
                "resource": {
                    "resourceType": "device",
                    "id": "67c25159-ce25-4000-a66c-f31fff890265"
                }
            })
        );
    }
}
