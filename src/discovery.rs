//! IS-04 discovery surface.
//!
//! Read-only JSON views under `/x-nmos/node/v1.3/`. The node and device
//! documents are constructed once at startup; the device lists exactly
//! one control referencing the NCP WebSocket endpoint. Sources, flows,
//! senders, and receivers are empty-list stubs.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::config::{self, Config};
use crate::error::ApiError;
use crate::state::AppState;
use crate::types::tai_timestamp;

/// Fixed IS-04 device id; the device manager's touchpoint and the
/// device document must agree on it.
pub const DEVICE_ID: &str = "67c25159-ce25-4000-a66c-f31fff890265";

pub const NCP_CONTROL_TYPE: &str = "urn:x-nmos:control:ncp/v1.0";

// ═══════════════════════════════════════════════════════════════
// Documents (IS-04 snake_case key style)
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize)]
pub struct NodeClock {
    pub name: String,
    pub ref_type: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeInterface {
    pub chassis_id: String,
    pub name: String,
    pub port_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApiEndpoint {
    pub host: String,
    pub port: u16,
    pub protocol: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeApi {
    pub endpoints: Vec<ApiEndpoint>,
    pub versions: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeDocument {
    pub id: String,
    pub label: String,
    pub description: String,
    pub version: String,
    pub tags: Map<String, Value>,
    pub href: String,
    pub hostname: String,
    pub caps: Map<String, Value>,
    pub services: Vec<Value>,
    pub clocks: Vec<NodeClock>,
    pub interfaces: Vec<NodeInterface>,
    pub api: NodeApi,
}

impl NodeDocument {
    pub fn build(config: &Config) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            label: config.node_label.clone(),
            description: "ncpd IS-04 node".into(),
            version: tai_timestamp(),
            tags: Map::new(),
            href: config.public_href(),
            hostname: config::hostname(),
            caps: Map::new(),
            services: Vec::new(),
            clocks: vec![NodeClock {
                name: "clk0".into(),
                ref_type: "internal".into(),
            }],
            interfaces: vec![NodeInterface {
                chassis_id: "00-15-5d-67-c3-4e".into(),
                name: "eth0".into(),
                port_id: "00-15-5d-67-c3-4e".into(),
            }],
            api: NodeApi {
                endpoints: vec![ApiEndpoint {
                    host: config.public_host.clone(),
                    port: config.public_port,
                    protocol: "http".into(),
                }],
                versions: vec!["v1.3".into()],
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DeviceControl {
    #[serde(rename = "type")]
    pub control_type: String,
    pub href: String,
    pub authorization: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeviceDocument {
    pub id: String,
    pub label: String,
    pub description: String,
    pub version: String,
    pub tags: Map<String, Value>,
    pub senders: Vec<String>,
    pub receivers: Vec<String>,
    pub node_id: String,
    #[serde(rename = "type")]
    pub device_type: String,
    pub controls: Vec<DeviceControl>,
}

impl DeviceDocument {
    pub fn build(config: &Config, node_id: &str) -> Self {
        Self {
            id: DEVICE_ID.into(),
            label: config.device_label.clone(),
            description: "ncpd control-protocol device".into(),
            version: tai_timestamp(),
            tags: Map::new(),
            senders: Vec::new(),
            receivers: Vec::new(),
            node_id: node_id.into(),
            device_type: "urn:x-nmos:device:generic".into(),
            controls: vec![DeviceControl {
                control_type: NCP_CONTROL_TYPE.into(),
                href: config.control_href(),
                authorization: false,
            }],
        }
    }
}

// ═══════════════════════════════════════════════════════════════
// Handlers
// ═══════════════════════════════════════════════════════════════

pub async fn index() -> Json<Value> {
    Json(json!([
        "self/",
        "sources/",
        "flows/",
        "devices/",
        "senders/",
        "receivers/"
    ]))
}

pub async fn node_self(State(state): State<Arc<AppState>>) -> Json<NodeDocument> {
    Json(state.node.clone())
}

pub async fn devices(State(state): State<Arc<AppState>>) -> Json<Vec<DeviceDocument>> {
    Json(vec![state.device.clone()])
}

pub async fn device_by_id(
    Path(device_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<DeviceDocument>, ApiError> {
    if device_id == state.device.id {
        return Ok(Json(state.device.clone()));
    }
    Err(ApiError::NotFound("device"))
}

pub async fn empty_list() -> Json<Vec<Value>> {
    Json(Vec::new())
}

pub async fn source_by_id() -> ApiError {
    ApiError::NotFound("source")
}

pub async fn flow_by_id() -> ApiError {
    ApiError::NotFound("flow")
}

pub async fn sender_by_id() -> ApiError {
    ApiError::NotFound("sender")
}

pub async fn receiver_by_id() -> ApiError {
    ApiError::NotFound("receiver")
}

// ═══════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════
