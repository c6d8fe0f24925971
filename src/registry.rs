//! Class and datatype registry + the ClassManager member.
//!
//! Built once at bootstrap. Control classes are stored in their
//! non-inheritance-expanded form, keyed by dotted class id; datatypes
//! are keyed by name. Both collections preserve insertion order — the
//! sequence item/length operations are order-sensitive.
//!
//! One expansion rule everywhere: derived-first concatenation. Classes
//! expand by truncating the class-id path one element at a time;
//! struct datatypes by walking `parentType`.

use std::sync::Arc;

use serde_json::{json, Value};

use crate::descriptors::{
    field, ClassDescriptor, DatatypeDescriptor, EventDescriptor, MethodDescriptor,
    ParameterDescriptor, PropertyDescriptor,
};
use crate::object::{sequence_item, to_json, ObjectCore};
use crate::types::{
    arg_bool, arg_element_id, arg_index, class_id_key, DatatypeKind, DeviceGenericState, ElementId,
    MethodOutcome, MethodStatus, PropertyChangeType, ResetCause,
};

const CONTROL_CLASSES_PROPERTY: ElementId = ElementId::new(3, 1);
const DATATYPES_PROPERTY: ElementId = ElementId::new(3, 2);

// ═══════════════════════════════════════════════════════════════
// Registry
// ═══════════════════════════════════════════════════════════════

#[derive(Debug)]
pub struct Registry {
    classes: Vec<ClassDescriptor>,
    datatypes: Vec<DatatypeDescriptor>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            classes: vec![
                object_class(),
                block_class(),
                worker_class(),
                manager_class(),
                device_manager_class(),
                class_manager_class(),
            ],
            datatypes: build_datatypes(),
        }
    }

    pub fn control_classes(&self) -> &[ClassDescriptor] {
        &self.classes
    }

    pub fn datatypes(&self) -> &[DatatypeDescriptor] {
        &self.datatypes
    }

    /// Lookup by dotted class id, non-expanded form.
    pub fn class(&self, class_id: &[i32]) -> Option<&ClassDescriptor> {
        let key = class_id_key(class_id);
        self.classes.iter().find(|c| class_id_key(&c.class_id) == key)
    }

    pub fn datatype(&self, name: &str) -> Option<&DatatypeDescriptor> {
        self.datatypes.iter().find(|d| d.name() == name)
    }

    /// Inheritance-expanded class descriptor: own members first, then
    /// each ancestor's, walking the class-id path towards the root.
    pub fn class_expanded(&self, class_id: &[i32]) -> Option<ClassDescriptor> {
        let mut expanded = self.class(class_id)?.clone();
        let mut path = class_id.to_vec();
        while path.len() > 1 {
            path.pop();
            if let Some(parent) = self.class(&path) {
                expanded.properties.extend(parent.properties.iter().cloned());
                expanded.methods.extend(parent.methods.iter().cloned());
                expanded.events.extend(parent.events.iter().cloned());
            }
        }
        Some(expanded)
    }

    /// Struct datatypes expand derived-first along `parentType`;
    /// non-struct datatypes are returned unchanged.
    pub fn datatype_expanded(&self, name: &str) -> Option<DatatypeDescriptor> {
        let own = self.datatype(name)?;
        let Some(own_struct) = own.as_struct() else {
            return Some(own.clone());
        };
        let mut merged = own_struct.clone();
        let mut parent_name = own_struct.parent_type.clone();
        while let Some(next) = parent_name {
            let Some(parent) = self.datatype(&next).and_then(DatatypeDescriptor::as_struct) else {
                break;
            };
            merged.fields.extend(parent.fields.iter().cloned());
            parent_name = parent.parent_type.clone();
        }
        Some(DatatypeDescriptor::Struct(merged))
    }
}

// ═══════════════════════════════════════════════════════════════
// Control class descriptors (non-expanded)
// ═══════════════════════════════════════════════════════════════

fn class(
    class_id: Vec<i32>,
    name: &str,
    fixed_role: Option<&str>,
    properties: Vec<PropertyDescriptor>,
    methods: Vec<MethodDescriptor>,
    events: Vec<EventDescriptor>,
) -> ClassDescriptor {
    ClassDescriptor {
        description: Some(format!("{name} class descriptor")),
        class_id,
        name: name.into(),
        fixed_role: fixed_role.map(Into::into),
        properties,
        methods,
        events,
    }
}

fn id_param() -> ParameterDescriptor {
    ParameterDescriptor::new("id", "NcPropertyId", false, false)
}

fn index_param() -> ParameterDescriptor {
    ParameterDescriptor::new("index", "NcId", false, false)
}

fn object_class() -> ClassDescriptor {
    class(
        vec![1],
        "NcObject",
        None,
        vec![
            PropertyDescriptor::new(ElementId::new(1, 1), "classId", "NcClassId", true, false, false),
            PropertyDescriptor::new(ElementId::new(1, 2), "oid", "NcOid", true, false, false),
            PropertyDescriptor::new(ElementId::new(1, 3), "constantOid", "NcBoolean", true, false, false),
            PropertyDescriptor::new(ElementId::new(1, 4), "owner", "NcOid", true, true, false),
            PropertyDescriptor::new(ElementId::new(1, 5), "role", "NcString", true, false, false),
            PropertyDescriptor::new(ElementId::new(1, 6), "userLabel", "NcString", false, true, false),
            PropertyDescriptor::new(ElementId::new(1, 7), "touchpoints", "NcTouchpoint", true, true, true),
            PropertyDescriptor::new(
                ElementId::new(1, 8),
                "runtimePropertyConstraints",
                "NcPropertyConstraints",
                true,
                true,
                true,
            ),
        ],
        vec![
            MethodDescriptor::new(
                ElementId::new(1, 1),
                "Get",
                "NcMethodResultPropertyValue",
                vec![id_param()],
            ),
            MethodDescriptor::new(
                ElementId::new(1, 2),
                "Set",
                "NcMethodResult",
                vec![id_param(), ParameterDescriptor::untyped("value")],
            ),
            MethodDescriptor::new(
                ElementId::new(1, 3),
                "GetSequenceItem",
                "NcMethodResultPropertyValue",
                vec![id_param(), index_param()],
            ),
            MethodDescriptor::new(
                ElementId::new(1, 4),
                "SetSequenceItem",
                "NcMethodResult",
                vec![id_param(), index_param(), ParameterDescriptor::untyped("value")],
            ),
            MethodDescriptor::new(
                ElementId::new(1, 5),
                "AddSequenceItem",
                "NcMethodResultId",
                vec![id_param(), ParameterDescriptor::untyped("value")],
            ),
            MethodDescriptor::new(
                ElementId::new(1, 6),
                "RemoveSequenceItem",
                "NcMethodResult",
                vec![id_param(), index_param()],
            ),
            MethodDescriptor::new(
                ElementId::new(1, 7),
                "GetSequenceLength",
                "NcMethodResultLength",
                vec![id_param()],
            ),
        ],
        vec![EventDescriptor::new(
            ElementId::new(1, 1),
            "PropertyChanged",
            "NcPropertyChangedEventData",
        )],
    )
}

fn block_class() -> ClassDescriptor {
    let member_list_result = "NcMethodResultBlockMemberDescriptors";
    class(
        vec![1, 1],
        "NcBlock",
        None,
        vec![
            PropertyDescriptor::new(ElementId::new(2, 1), "enabled", "NcBoolean", true, false, false),
            PropertyDescriptor::new(
                ElementId::new(2, 2),
                "members",
                "NcBlockMemberDescriptor",
                true,
                false,
                true,
            ),
        ],
        vec![
            MethodDescriptor::new(
                ElementId::new(2, 1),
                "GetMemberDescriptors",
                member_list_result,
                vec![ParameterDescriptor::new("recurse", "NcBoolean", false, false)],
            ),
            MethodDescriptor::new(
                ElementId::new(2, 2),
                "FindMembersByPath",
                member_list_result,
                vec![ParameterDescriptor::new("path", "NcRolePath", false, false)],
            ),
            MethodDescriptor::new(
                ElementId::new(2, 3),
                "FindMembersByRole",
                member_list_result,
                vec![
                    ParameterDescriptor::new("role", "NcString", false, false),
                    ParameterDescriptor::new("caseSensitive", "NcBoolean", false, false),
                    ParameterDescriptor::new("matchWholeString", "NcBoolean", false, false),
                    ParameterDescriptor::new("recurse", "NcBoolean", false, false),
                ],
            ),
            MethodDescriptor::new(
                ElementId::new(2, 4),
                "FindMembersByClassId",
                member_list_result,
                vec![
                    ParameterDescriptor::new("classId", "NcClassId", false, false),
                    ParameterDescriptor::new("includeDerived", "NcBoolean", false, false),
                    ParameterDescriptor::new("recurse", "NcBoolean", false, false),
                ],
            ),
        ],
        vec![],
    )
}

fn worker_class() -> ClassDescriptor {
    class(
        vec![1, 2],
        "NcWorker",
        None,
        vec![PropertyDescriptor::new(
            ElementId::new(2, 1),
            "enabled",
            "NcBoolean",
            false,
            false,
            false,
        )],
        vec![],
        vec![],
    )
}

fn manager_class() -> ClassDescriptor {
    class(vec![1, 3], "NcManager", None, vec![], vec![], vec![])
}

fn device_manager_class() -> ClassDescriptor {
    class(
        vec![1, 3, 1],
        "NcDeviceManager",
        Some("DeviceManager"),
        vec![
            PropertyDescriptor::new(ElementId::new(3, 1), "ncVersion", "NcVersionCode", true, false, false),
            PropertyDescriptor::new(ElementId::new(3, 2), "manufacturer", "NcManufacturer", true, false, false),
            PropertyDescriptor::new(ElementId::new(3, 3), "product", "NcProduct", true, false, false),
            PropertyDescriptor::new(ElementId::new(3, 4), "serialNumber", "NcString", true, false, false),
            PropertyDescriptor::new(ElementId::new(3, 5), "userInventoryCode", "NcString", false, true, false),
            PropertyDescriptor::new(ElementId::new(3, 6), "deviceName", "NcString", false, true, false),
            PropertyDescriptor::new(ElementId::new(3, 7), "deviceRole", "NcString", false, true, false),
            PropertyDescriptor::new(
                ElementId::new(3, 8),
                "operationalState",
                "NcDeviceOperationalState",
                true,
                false,
                false,
            ),
            PropertyDescriptor::new(ElementId::new(3, 9), "resetCause", "NcResetCause", true, false, false),
            PropertyDescriptor::new(ElementId::new(3, 10), "message", "NcString", true, true, false),
        ],
        vec![],
        vec![],
    )
}

fn class_manager_class() -> ClassDescriptor {
    class(
        vec![1, 3, 2],
        "NcClassManager",
        Some("ClassManager"),
        vec![
            PropertyDescriptor::new(
                ElementId::new(3, 1),
                "controlClasses",
                "NcClassDescriptor",
                true,
                false,
                true,
            ),
            PropertyDescriptor::new(
                ElementId::new(3, 2),
                "datatypes",
                "NcDatatypeDescriptor",
                true,
                false,
                true,
            ),
        ],
        vec![
            MethodDescriptor::new(
                ElementId::new(3, 1),
                "GetControlClass",
                "NcMethodResultClassDescriptor",
                vec![
                    ParameterDescriptor::new("classId", "NcClassId", false, false),
                    ParameterDescriptor::new("includeInherited", "NcBoolean", false, false),
                ],
            ),
            MethodDescriptor::new(
                ElementId::new(3, 2),
                "GetDatatype",
                "NcMethodResultDatatypeDescriptor",
                vec![
                    ParameterDescriptor::new("name", "NcName", false, false),
                    ParameterDescriptor::new("includeInherited", "NcBoolean", false, false),
                ],
            ),
        ],
        vec![],
    )
}

// ═══════════════════════════════════════════════════════════════
// Datatype descriptors
// ═══════════════════════════════════════════════════════════════

fn build_datatypes() -> Vec<DatatypeDescriptor> {
    let mut reg = Vec::with_capacity(70);

    // Primitives.
    for (name, description) in [
        ("NcBoolean", "Boolean value"),
        ("NcInt16", "16-bit signed integer"),
        ("NcInt32", "32-bit signed integer"),
        ("NcInt64", "64-bit signed integer"),
        ("NcUint16", "16-bit unsigned integer"),
        ("NcUint32", "32-bit unsigned integer"),
        ("NcUint64", "64-bit unsigned integer"),
        ("NcFloat32", "32-bit floating point"),
        ("NcFloat64", "64-bit floating point"),
        ("NcString", "String value"),
    ] {
        reg.push(DatatypeDescriptor::primitive(name, description));
    }

    // Typedefs.
    for (name, parent, is_sequence, description) in [
        ("NcName", "NcString", false, "Programmatically significant name"),
        ("NcRolePath", "NcString", true, "Role path"),
        ("NcRegex", "NcString", false, "Regex pattern"),
        ("NcRole", "NcString", false, "Role string"),
        ("NcClassId", "NcInt32", true, "Sequence of class ID fields"),
        ("NcId", "NcUint32", false, "Identifier handle"),
        ("NcOid", "NcUint32", false, "Object id"),
        ("NcOrganizationId", "NcInt32", false, "Unique 24-bit organization id"),
        ("NcUri", "NcString", false, "Uniform resource identifier"),
        ("NcVersionCode", "NcString", false, "Semantic version code"),
        ("NcUuid", "NcString", false, "UUID"),
        ("NcTimeInterval", "NcInt64", false, "Nanoseconds interval"),
    ] {
        reg.push(DatatypeDescriptor::typedef(name, parent, is_sequence, description));
    }

    // Enumerations, derived from the model enums.
    reg.push(DatatypeDescriptor::enumeration(
        "NcMethodStatus",
        "Method invocation status",
        crate::types::MethodStatus::VARIANTS,
    ));
    reg.push(DatatypeDescriptor::enumeration(
        "NcDatatypeType",
        "Datatype type kind",
        DatatypeKind::VARIANTS,
    ));
    reg.push(DatatypeDescriptor::enumeration(
        "NcDeviceGenericState",
        "Device generic state",
        DeviceGenericState::VARIANTS,
    ));
    reg.push(DatatypeDescriptor::enumeration(
        "NcResetCause",
        "Reason for most recent reset",
        ResetCause::VARIANTS,
    ));
    reg.push(DatatypeDescriptor::enumeration(
        "NcPropertyChangeType",
        "Type of property change",
        PropertyChangeType::VARIANTS,
    ));

    // Structs. Field lists are the non-expanded (own) members; the
    // parent chain is resolved on demand by `datatype_expanded`.
    let structure = DatatypeDescriptor::structure;

    reg.push(structure(
        "NcElementId",
        "Element id within an inheritance level",
        vec![
            field("level", Some("NcUint16"), false, false),
            field("index", Some("NcUint16"), false, false),
        ],
        None,
    ));
    reg.push(structure("NcPropertyId", "Property id", vec![], Some("NcElementId")));
    reg.push(structure("NcMethodId", "Method id", vec![], Some("NcElementId")));
    reg.push(structure("NcEventId", "Event id", vec![], Some("NcElementId")));
    reg.push(structure(
        "NcDescriptor",
        "Base descriptor",
        vec![field("description", Some("NcString"), true, false)],
        None,
    ));
    reg.push(structure(
        "NcDatatypeDescriptor",
        "Datatype descriptor base",
        vec![
            field("name", Some("NcName"), false, false),
            field("type", Some("NcDatatypeType"), false, false),
            field("constraints", Some("NcParameterConstraints"), true, false),
        ],
        Some("NcDescriptor"),
    ));
    reg.push(structure(
        "NcDatatypeDescriptorStruct",
        "Struct datatype descriptor",
        vec![
            field("fields", Some("NcFieldDescriptor"), false, true),
            field("parentType", Some("NcName"), true, false),
        ],
        Some("NcDatatypeDescriptor"),
    ));
    reg.push(structure(
        "NcDatatypeDescriptorTypeDef",
        "Typedef datatype descriptor",
        vec![
            field("parentType", Some("NcName"), false, false),
            field("isSequence", Some("NcBoolean"), false, false),
        ],
        Some("NcDatatypeDescriptor"),
    ));
    reg.push(structure(
        "NcDatatypeDescriptorEnum",
        "Enum datatype descriptor",
        vec![field("items", Some("NcEnumItemDescriptor"), false, true)],
        Some("NcDatatypeDescriptor"),
    ));
    reg.push(structure(
        "NcDatatypeDescriptorPrimitive",
        "Primitive datatype descriptor",
        vec![],
        Some("NcDatatypeDescriptor"),
    ));
    reg.push(structure(
        "NcFieldDescriptor",
        "Descriptor of a struct field",
        vec![
            field("name", Some("NcName"), false, false),
            field("typeName", Some("NcName"), true, false),
            field("isNullable", Some("NcBoolean"), false, false),
            field("isSequence", Some("NcBoolean"), false, false),
            field("constraints", Some("NcParameterConstraints"), true, false),
        ],
        Some("NcDescriptor"),
    ));
    reg.push(structure(
        "NcEnumItemDescriptor",
        "Descriptor of an enum item",
        vec![
            field("name", Some("NcName"), false, false),
            field("value", Some("NcUint16"), false, false),
        ],
        Some("NcDescriptor"),
    ));
    reg.push(structure(
        "NcParameterDescriptor",
        "Descriptor of a method parameter",
        vec![
            field("name", Some("NcName"), false, false),
            field("typeName", Some("NcName"), true, false),
            field("isNullable", Some("NcBoolean"), false, false),
            field("isSequence", Some("NcBoolean"), false, false),
            field("constraints", Some("NcParameterConstraints"), true, false),
        ],
        Some("NcDescriptor"),
    ));
    reg.push(structure(
        "NcMethodDescriptor",
        "Descriptor of a method",
        vec![
            field("id", Some("NcMethodId"), false, false),
            field("name", Some("NcName"), false, false),
            field("resultDatatype", Some("NcName"), false, false),
            field("parameters", Some("NcParameterDescriptor"), false, true),
            field("isDeprecated", Some("NcBoolean"), false, false),
        ],
        Some("NcDescriptor"),
    ));
    reg.push(structure(
        "NcPropertyDescriptor",
        "Descriptor of a property",
        vec![
            field("id", Some("NcPropertyId"), false, false),
            field("name", Some("NcName"), false, false),
            field("typeName", Some("NcName"), true, false),
            field("isReadOnly", Some("NcBoolean"), false, false),
            field("isNullable", Some("NcBoolean"), false, false),
            field("isSequence", Some("NcBoolean"), false, false),
            field("isDeprecated", Some("NcBoolean"), false, false),
            field("constraints", Some("NcParameterConstraints"), true, false),
        ],
        Some("NcDescriptor"),
    ));
    reg.push(structure(
        "NcEventDescriptor",
        "Descriptor of an event",
        vec![
            field("id", Some("NcEventId"), false, false),
            field("name", Some("NcName"), false, false),
            field("eventDatatype", Some("NcName"), false, false),
            field("isDeprecated", Some("NcBoolean"), false, false),
        ],
        Some("NcDescriptor"),
    ));
    reg.push(structure(
        "NcClassDescriptor",
        "Descriptor of a class",
        vec![
            field("classId", Some("NcClassId"), false, false),
            field("name", Some("NcName"), false, false),
            field("fixedRole", Some("NcString"), true, false),
            field("properties", Some("NcPropertyDescriptor"), false, true),
            field("methods", Some("NcMethodDescriptor"), false, true),
            field("events", Some("NcEventDescriptor"), false, true),
        ],
        Some("NcDescriptor"),
    ));
    reg.push(structure(
        "NcBlockMemberDescriptor",
        "Block member descriptor",
        vec![
            field("role", Some("NcString"), false, false),
            field("oid", Some("NcOid"), false, false),
            field("constantOid", Some("NcBoolean"), false, false),
            field("classId", Some("NcClassId"), false, false),
            field("userLabel", Some("NcString"), true, false),
            field("owner", Some("NcOid"), false, false),
        ],
        Some("NcDescriptor"),
    ));
    reg.push(structure(
        "NcMethodResult",
        "Method result base",
        vec![field("status", Some("NcMethodStatus"), false, false)],
        None,
    ));
    reg.push(structure(
        "NcMethodResultPropertyValue",
        "Property value result",
        vec![field("value", None, true, false)],
        Some("NcMethodResult"),
    ));
    reg.push(structure(
        "NcMethodResultDatatypeDescriptor",
        "Datatype descriptor result",
        vec![field("value", Some("NcDatatypeDescriptor"), false, false)],
        Some("NcMethodResult"),
    ));
    reg.push(structure(
        "NcMethodResultClassDescriptor",
        "Class descriptor result",
        vec![field("value", Some("NcClassDescriptor"), false, false)],
        Some("NcMethodResult"),
    ));
    reg.push(structure(
        "NcMethodResultId",
        "Id result",
        vec![field("value", Some("NcId"), false, false)],
        Some("NcMethodResult"),
    ));
    reg.push(structure(
        "NcMethodResultLength",
        "Length result",
        vec![field("value", Some("NcUint32"), true, false)],
        Some("NcMethodResult"),
    ));
    reg.push(structure(
        "NcMethodResultError",
        "Error result",
        vec![field("errorMessage", Some("NcString"), false, false)],
        Some("NcMethodResult"),
    ));
    reg.push(structure(
        "NcMethodResultBlockMemberDescriptors",
        "Block member descriptors result",
        vec![field("value", Some("NcBlockMemberDescriptor"), false, true)],
        Some("NcMethodResult"),
    ));
    reg.push(structure(
        "NcPropertyConstraints",
        "Base property constraints",
        vec![
            field("propertyId", Some("NcPropertyId"), false, false),
            field("defaultValue", None, true, false),
        ],
        None,
    ));
    reg.push(structure(
        "NcPropertyConstraintsNumber",
        "Numeric property constraints",
        vec![
            field("maximum", None, true, false),
            field("minimum", None, true, false),
            field("step", None, true, false),
        ],
        Some("NcPropertyConstraints"),
    ));
    reg.push(structure(
        "NcPropertyConstraintsString",
        "String property constraints",
        vec![
            field("maxCharacters", Some("NcUint32"), true, false),
            field("pattern", Some("NcRegex"), true, false),
        ],
        Some("NcPropertyConstraints"),
    ));
    reg.push(structure(
        "NcParameterConstraints",
        "Base parameter constraints",
        vec![field("defaultValue", None, true, false)],
        None,
    ));
    reg.push(structure(
        "NcParameterConstraintsNumber",
        "Numeric parameter constraints",
        vec![
            field("maximum", None, true, false),
            field("minimum", None, true, false),
            field("step", None, true, false),
        ],
        Some("NcParameterConstraints"),
    ));
    reg.push(structure(
        "NcParameterConstraintsString",
        "String parameter constraints",
        vec![
            field("maxCharacters", Some("NcUint32"), true, false),
            field("pattern", Some("NcRegex"), true, false),
        ],
        Some("NcParameterConstraints"),
    ));
    reg.push(structure(
        "NcManufacturer",
        "Manufacturer descriptor",
        vec![
            field("name", Some("NcString"), false, false),
            field("organizationId", Some("NcOrganizationId"), true, false),
            field("website", Some("NcUri"), true, false),
        ],
        None,
    ));
    reg.push(structure(
        "NcProduct",
        "Product descriptor",
        vec![
            field("name", Some("NcString"), false, false),
            field("key", Some("NcString"), false, false),
            field("revisionLevel", Some("NcString"), false, false),
            field("brandName", Some("NcString"), true, false),
            field("uuid", Some("NcUuid"), true, false),
            field("description", Some("NcString"), true, false),
        ],
        None,
    ));
    reg.push(structure(
        "NcDeviceOperationalState",
        "Device operational state",
        vec![
            field("generic", Some("NcDeviceGenericState"), false, false),
            field("deviceSpecificDetails", Some("NcString"), true, false),
        ],
        None,
    ));
    reg.push(structure(
        "NcTouchpoint",
        "Touchpoint base",
        vec![field("contextNamespace", Some("NcString"), false, false)],
        None,
    ));
    reg.push(structure(
        "NcTouchpointResource",
        "Touchpoint resource base",
        vec![field("resourceType", Some("NcString"), false, false)],
        None,
    ));
    reg.push(structure(
        "NcTouchpointResourceNmos",
        "Touchpoint NMOS resource",
        vec![field("id", Some("NcUuid"), false, false)],
        Some("NcTouchpointResource"),
    ));
    reg.push(structure(
        "NcTouchpointResourceNmosChannelMapping",
        "Touchpoint NMOS channel-mapping resource",
        vec![field("ioId", Some("NcString"), false, false)],
        Some("NcTouchpointResourceNmos"),
    ));
    reg.push(structure(
        "NcTouchpointNmos",
        "Touchpoint NMOS",
        vec![field("resource", Some("NcTouchpointResourceNmos"), false, false)],
        Some("NcTouchpoint"),
    ));
    reg.push(structure(
        "NcTouchpointNmosChannelMapping",
        "Touchpoint NMOS channel mapping",
        vec![field(
            "resource",
            Some("NcTouchpointResourceNmosChannelMapping"),
            false,
            false,
        )],
        Some("NcTouchpoint"),
    ));
    reg.push(structure(
        "NcPropertyChangedEventData",
        "Property changed event data",
        vec![
            field("propertyId", Some("NcPropertyId"), false, false),
            field("changeType", Some("NcPropertyChangeType"), false, false),
            field("value", None, true, false),
            field("sequenceItemIndex", Some("NcId"), true, false),
        ],
        None,
    ));

    reg
}

// ═══════════════════════════════════════════════════════════════
// ClassManager member
// ═══════════════════════════════════════════════════════════════

#[derive(Debug)]
pub struct ClassManager {
    pub core: ObjectCore,
    pub registry: Arc<Registry>,
}

impl ClassManager {
    pub fn new(core: ObjectCore, registry: Arc<Registry>) -> Self {
        Self { core, registry }
    }

    pub(crate) fn get_local(&self, id: ElementId) -> MethodOutcome {
        if id.level != 3 {
            return self.core.base_property(id);
        }
        match id.index {
            1 => MethodOutcome::ok(to_json(&self.registry.control_classes())),
            2 => MethodOutcome::ok(to_json(&self.registry.datatypes())),
            _ => MethodOutcome::err(MethodStatus::PropertyNotImplemented, "Property not found"),
        }
    }

    pub(crate) fn set_local(&mut self, id: ElementId, value: &Value) -> MethodOutcome {
        if id.level == 3 {
            return MethodOutcome::err(
                MethodStatus::Readonly,
                "Could not find the property or it is read-only",
            );
        }
        self.core.set_base_property(id, value)
    }

    pub(crate) fn invoke_local(&self, method: ElementId, args: &Value) -> MethodOutcome {
        match (method.level, method.index) {
            (3, 1) => self.get_control_class(args),
            (3, 2) => self.get_datatype(args),
            (1, 3..=7) if matches!(
                arg_element_id(args),
                Some(CONTROL_CLASSES_PROPERTY) | Some(DATATYPES_PROPERTY)
            ) =>
            {
                let seq: Vec<Value> = if arg_element_id(args) == Some(CONTROL_CLASSES_PROPERTY) {
                    self.registry.control_classes().iter().map(to_json).collect()
                } else {
                    self.registry.datatypes().iter().map(to_json).collect()
                };
                match method.index {
                    3 => {
                        let Some(index) = arg_index(args) else {
                            return MethodOutcome::err(
                                MethodStatus::ParameterError,
                                "Invalid index parameter",
                            );
                        };
                        sequence_item(&seq, index)
                    }
                    7 => MethodOutcome::ok(json!(seq.len())),
                    _ => MethodOutcome::err(
                        MethodStatus::Readonly,
                        "Sequence property is read-only",
                    ),
                }
            }
            _ => self.core.invoke_base(method, args),
        }
    }

    /// 3m1 GetControlClass
    fn get_control_class(&self, args: &Value) -> MethodOutcome {
        let class_id: Vec<i32> = match args.get("classId").and_then(Value::as_array) {
            Some(items) => {
                let parsed: Option<Vec<i32>> =
                    items.iter().map(|v| v.as_i64().map(|x| x as i32)).collect();
                match parsed {
                    Some(ids) => ids,
                    None => {
                        return MethodOutcome::err(MethodStatus::ParameterError, "Invalid classId")
                    }
                }
            }
            None => return MethodOutcome::err(MethodStatus::ParameterError, "Invalid classId"),
        };

        let descriptor = if arg_bool(args, "includeInherited") {
            self.registry.class_expanded(&class_id).map(|c| to_json(&c))
        } else {
            self.registry.class(&class_id).map(to_json)
        };
        match descriptor {
            Some(value) => MethodOutcome::ok(value),
            None => MethodOutcome::err(MethodStatus::PropertyNotImplemented, "Class not found"),
        }
    }

    /// 3m2 GetDatatype
    fn get_datatype(&self, args: &Value) -> MethodOutcome {
        let Some(name) = args.get("name").and_then(Value::as_str) else {
            return MethodOutcome::err(MethodStatus::ParameterError, "Invalid name");
        };
        let descriptor = if arg_bool(args, "includeInherited") {
            self.registry.datatype_expanded(name).map(|d| to_json(&d))
        } else {
            self.registry.datatype(name).map(to_json)
        };
        match descriptor {
            Some(value) => MethodOutcome::ok(value),
            None => MethodOutcome::err(MethodStatus::PropertyNotImplemented, "Datatype not found"),
        }
    }
}

// ═══════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::Member;
    use crate::types::{EventSender, PropertyChangedEvent};
    use tokio::sync::mpsc::UnboundedReceiver;

    fn class_manager() -> (Member, UnboundedReceiver<PropertyChangedEvent>) {
        let (events, rx) = EventSender::channel();
        let cm = Member::ClassManager(ClassManager::new(
            ObjectCore::new(
                &events,
                vec![1, 3, 2],
                3,
                true,
                Some(1),
                "ClassManager",
                Some("Class Manager"),
            ),
            Arc::new(Registry::new()),
        ));
        (cm, rx)
    }

    #[test]
    fn registry_holds_the_six_classes_in_order() {
        let reg = Registry::new();
        let ids: Vec<String> = reg
            .control_classes()
            .iter()
            .map(|c| class_id_key(&c.class_id))
            .collect();
        assert_eq!(ids, ["1", "1.1", "1.2", "1.3", "1.3.1", "1.3.2"]);
        assert!(reg.class(&[1, 3, 1]).is_some());
        assert!(reg.class(&[9]).is_none());
    }

    #[test]
    fn class_expansion_is_derived_first() {
        let reg = Registry::new();
        let expanded = reg.class_expanded(&[1, 3, 1]).unwrap();

        // 10 DeviceManager properties, then the 8 inherited NcObject ones.
        assert_eq!(expanded.properties.len(), 18);
        assert_eq!(expanded.properties[0].name, "ncVersion");
        assert_eq!(expanded.properties[9].name, "message");
        assert_eq!(expanded.properties[10].name, "classId");
        assert_eq!(expanded.properties[17].name, "runtimePropertyConstraints");

        // Inherited base methods and the PropertyChanged event arrive too.
        assert_eq!(expanded.methods.len(), 7);
        assert_eq!(expanded.events.len(), 1);
    }

    #[test]
    fn non_expanded_is_prefix_of_expanded() {
        let reg = Registry::new();
        for c in reg.control_classes() {
            let expanded = reg.class_expanded(&c.class_id).unwrap();
            assert!(expanded.properties.len() >= c.properties.len());
            for (own, exp) in c.properties.iter().zip(&expanded.properties) {
                assert_eq!(own.name, exp.name);
            }
        }
    }

    #[test]
    fn datatype_lookups() {
        let reg = Registry::new();
        assert!(reg.datatype("NcBoolean").is_some());
        assert!(reg.datatype("NcSomething").is_none());

        let class_id = reg.datatype("NcClassId").unwrap();
        let v = to_json(class_id);
        assert_eq!(v["parentType"], "NcInt32");
        assert_eq!(v["isSequence"], true);

        let status = reg.datatype("NcMethodStatus").unwrap();
        let v = to_json(status);
        let items = v["items"].as_array().unwrap();
        assert_eq!(items.len(), 18);
        assert_eq!(items[0]["name"], "Ok");
        assert_eq!(items[0]["value"], 200);
    }

    #[test]
    fn struct_expansion_walks_parent_types() {
        let reg = Registry::new();
        let expanded = reg.datatype_expanded("NcDatatypeDescriptorStruct").unwrap();
        let fields: Vec<String> = expanded
            .as_struct()
            .unwrap()
            .fields
            .iter()
            .map(|f| f.name.clone())
            .collect();
        // Own fields, then NcDatatypeDescriptor's, then NcDescriptor's.
        assert_eq!(
            fields,
            ["fields", "parentType", "name", "type", "constraints", "description"]
        );

        // Non-struct expansion is the identity.
        let same = reg.datatype_expanded("NcClassId").unwrap();
        assert_eq!(same.name(), "NcClassId");
    }

    #[test]
    fn get_control_class_method() {
        let (cm, _rx) = class_manager();

        let args = json!({"classId": [1, 3, 1], "includeInherited": false});
        let out = cm.invoke_method(3, ElementId::new(3, 1), &args);
        assert_eq!(out.status, MethodStatus::Ok);
        let v = out.value.unwrap();
        assert_eq!(v["name"], "NcDeviceManager");
        assert_eq!(v["fixedRole"], "DeviceManager");
        assert_eq!(v["properties"].as_array().unwrap().len(), 10);

        let args = json!({"classId": [1, 3, 1], "includeInherited": true});
        let out = cm.invoke_method(3, ElementId::new(3, 1), &args);
        assert_eq!(out.value.unwrap()["properties"].as_array().unwrap().len(), 18);

        let args = json!({"classId": [4, 4]});
        let out = cm.invoke_method(3, ElementId::new(3, 1), &args);
        assert_eq!(out.status, MethodStatus::PropertyNotImplemented);
    }

    #[test]
    fn get_datatype_method() {
        let (cm, _rx) = class_manager();

        let args = json!({"name": "NcBlockMemberDescriptor", "includeInherited": true});
        let out = cm.invoke_method(3, ElementId::new(3, 2), &args);
        let fields = out.value.unwrap()["fields"].as_array().unwrap().len();
        assert_eq!(fields, 7); // 6 own + inherited description

        let args = json!({"name": "NcNothing"});
        let out = cm.invoke_method(3, ElementId::new(3, 2), &args);
        assert_eq!(out.status, MethodStatus::PropertyNotImplemented);

        let args = json!({"name": 42});
        let out = cm.invoke_method(3, ElementId::new(3, 2), &args);
        assert_eq!(out.status, MethodStatus::ParameterError);
    }

    #[test]
    fn registry_sequences_serve_items_and_lengths() {
        let (cm, _rx) = class_manager();

        let args = json!({"id": {"level": 3, "index": 1}});
        let out = cm.invoke_method(3, ElementId::new(1, 7), &args);
        assert_eq!(out.value, Some(json!(6)));

        let args = json!({"id": {"level": 3, "index": 1}, "index": 0});
        let out = cm.invoke_method(3, ElementId::new(1, 3), &args);
        assert_eq!(out.value.unwrap()["name"], "NcObject");

        let args = json!({"id": {"level": 3, "index": 1}, "index": 6});
        let out = cm.invoke_method(3, ElementId::new(1, 3), &args);
        assert_eq!(out.status, MethodStatus::IndexOutOfBounds);

        let args = json!({"id": {"level": 3, "index": 2}});
        let out = cm.invoke_method(3, ElementId::new(1, 7), &args);
        let count = out.value.unwrap().as_u64().unwrap();
        assert!(count > 40, "datatype registry unexpectedly small: {count}");
    }

    #[test]
    fn level3_properties_are_readonly() {
        let (mut cm, _rx) = class_manager();
        let out = cm.set_property(3, ElementId::new(3, 1), &json!([]));
        assert_eq!(out.status, MethodStatus::Readonly);
    }

    #[test]
    fn control_classes_property_reads_back() {
        let (cm, _rx) = class_manager();
        let out = cm.get_property(3, ElementId::new(3, 1));
        assert_eq!(out.value.unwrap().as_array().unwrap().len(), 6);
        let out = cm.get_property(3, ElementId::new(3, 3));
        assert_eq!(out.status, MethodStatus::PropertyNotImplemented);
    }
}
