//! Shared server state — session tracking, event bus, object tree.

use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use dashmap::DashMap;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::block::Block;
use crate::config::Config;
use crate::descriptors::{
    Manufacturer, Product, PropertyConstraint, PropertyConstraintsString, Touchpoint,
};
use crate::device::DeviceManager;
use crate::discovery::{DeviceDocument, NodeDocument};
use crate::object::{Member, ObjectCore, Worker};
use crate::registry::{ClassManager, Registry};
use crate::types::{ElementId, EventSender, Oid, PropertyChangedEvent};

/// Per-connection state: the outbound text channel (drained by the
/// session's writer task) and the set of oids whose events this
/// controller receives.
#[derive(Debug)]
pub struct Session {
    pub tx: mpsc::UnboundedSender<String>,
    pub subscribed_oids: HashSet<Oid>,
}

impl Session {
    pub fn new(tx: mpsc::UnboundedSender<String>) -> Self {
        Self {
            tx,
            subscribed_oids: HashSet::new(),
        }
    }
}

/// Shared state accessible from all handlers and the fan-out task.
pub struct AppState {
    /// Active WebSocket sessions keyed by connection id.
    pub connections: DashMap<Uuid, Session>,
    /// The object tree (each member holds its own clone of the event
    /// sender). Reads are concurrent; Set commands take the write side.
    /// Guards are never held across await points.
    pub root: RwLock<Member>,
    /// IS-04 node document, built once at startup.
    pub node: NodeDocument,
    /// IS-04 device document referencing the control endpoint.
    pub device: DeviceDocument,
    pub config: Config,
}

impl AppState {
    /// Build documents, event queue, and the device model. The returned
    /// receiver feeds the fan-out task.
    pub fn new(config: Config) -> (Arc<Self>, mpsc::UnboundedReceiver<PropertyChangedEvent>) {
        let (events, event_rx) = EventSender::channel();
        let node = NodeDocument::build(&config);
        let device = DeviceDocument::build(&config, &node.id);
        let registry = Arc::new(Registry::new());
        let root = build_device_model(&events, registry, &device.id);

        let state = Arc::new(Self {
            connections: DashMap::new(),
            root: RwLock::new(root),
            node,
            device,
            config,
        });
        (state, event_rx)
    }
}

/// The object tree shipped by this device:
///
/// ```text
/// root (1)
/// ├── DeviceManager (2)
/// ├── ClassManager (3)
/// ├── my-obj-01 (4)
/// ├── my-worker-01 (5)
/// └── my-block-01 (6)
///     ├── my-nested-block-obj (7)
///     └── my-worker-02 (8)
/// ```
pub fn build_device_model(events: &EventSender, registry: Arc<Registry>, device_id: &str) -> Member {
    let mut root = Block::new(
        ObjectCore::new(events, vec![1, 1], 1, true, None, "root", None),
        true,
        true,
    );

    let device_manager = DeviceManager::new(
        ObjectCore::new(
            events,
            vec![1, 3, 1],
            2,
            true,
            Some(1),
            "DeviceManager",
            Some("Device Manager"),
        )
        .with_touchpoints(vec![Touchpoint::nmos("device", device_id)]),
        "v1.0.0",
        Manufacturer {
            name: "Acme Broadcast".into(),
            organization_id: None,
            website: Some("https://example.com".into()),
        },
        Product {
            name: "NCP Gateway".into(),
            key: "MODEL-XYZ-2000".into(),
            revision_level: "1.0".into(),
            brand_name: Some("Acme".into()),
            uuid: Some("550e8400-e29b-41d4-a716-446655440000".into()),
            description: Some("Professional media device".into()),
        },
        "SN-123456789",
    );
    root.add_member(Member::DeviceManager(device_manager));

    let class_manager = ClassManager::new(
        ObjectCore::new(
            events,
            vec![1, 3, 2],
            3,
            true,
            Some(1),
            "ClassManager",
            Some("Class Manager"),
        ),
        registry,
    );
    root.add_member(Member::ClassManager(class_manager));

    root.add_member(Member::Object(ObjectCore::new(
        events,
        vec![1],
        4,
        true,
        Some(1),
        "my-obj-01",
        Some("My object 01"),
    )));

    root.add_member(Member::Worker(Worker::new(
        ObjectCore::new(
            events,
            vec![1, 2],
            5,
            true,
            Some(1),
            "my-worker-01",
            Some("My worker 01"),
        )
        .with_runtime_constraints(vec![PropertyConstraint::String(PropertyConstraintsString {
            property_id: ElementId::new(1, 6),
            default_value: None,
            max_characters: Some(64),
            pattern: None,
        })]),
        true,
    )));

    let mut child = Block::new(
        ObjectCore::new(events, vec![1, 1], 6, true, Some(1), "my-block-01", None),
        false,
        true,
    );
    child.add_member(Member::Object(ObjectCore::new(
        events,
        vec![1],
        7,
        true,
        Some(6),
        "my-nested-block-obj",
        Some("My nested block obj"),
    )));
    child.add_member(Member::Worker(Worker::new(
        ObjectCore::new(
            events,
            vec![1, 2],
            8,
            true,
            Some(6),
            "my-worker-02",
            Some("My worker 02"),
        )
        .with_touchpoints(vec![Touchpoint::nmos_channel_mapping(
            "input",
            "5f2a8d1e-9c3b-47d0-8a11-2f64c0a2ab57",
            "in01",
        )]),
        true,
    )));
    root.add_member(Member::Block(child));

    Member::Block(root)
}

// ═══════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════
