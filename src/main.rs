//! ncpd — NMOS control-protocol device endpoint.
//!
//! IS-04 discovery surface over REST + MS-05 object control over
//! WebSocket. The object tree is built once at startup; the fan-out
//! task delivers property-changed events to subscribed controllers.

mod block;
mod config;
mod descriptors;
mod device;
mod discovery;
mod error;
mod fanout;
mod object;
mod registry;
mod state;
mod types;
mod ws;

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::info;

#[tokio::main]
async fn main() {
    // Load .env if present (local dev).
    let _ = dotenvy::dotenv();

    let config = config::Config::from_env();

    // Tracing.
    tracing_subscriber::fmt()
        .with_env_filter(&config.log_level)
        .with_target(true)
        .init();

    info!("ncpd starting");
    info!(listen = %config.listen_addr, control = %config.control_href());

    // ── Shared state: documents, event queue, object tree ───
    let (state, events) = state::AppState::new(config.clone());

    info!(node_id = %state.node.id, device_id = %state.device.id, "device model ready");

    // ── Background tasks ────────────────────────────────────
    // Event fan-out — runs for the process lifetime.
    fanout::spawn_fanout(Arc::clone(&state), events);

    // ── Routes ──────────────────────────────────────────────
    let app = Router::new()
        // Control-protocol endpoint.
        .route("/ws", get(ws::ws_handler))
        // IS-04 node API.
        .route("/x-nmos/node/v1.3", get(discovery::index))
        .route("/x-nmos/node/v1.3/", get(discovery::index))
        .route("/x-nmos/node/v1.3/self", get(discovery::node_self))
        .route("/x-nmos/node/v1.3/sources", get(discovery::empty_list))
        .route("/x-nmos/node/v1.3/sources/", get(discovery::empty_list))
        .route("/x-nmos/node/v1.3/sources/{source_id}", get(discovery::source_by_id))
        .route("/x-nmos/node/v1.3/flows", get(discovery::empty_list))
        .route("/x-nmos/node/v1.3/flows/", get(discovery::empty_list))
        .route("/x-nmos/node/v1.3/flows/{flow_id}", get(discovery::flow_by_id))
        .route("/x-nmos/node/v1.3/senders", get(discovery::empty_list))
        .route("/x-nmos/node/v1.3/senders/", get(discovery::empty_list))
        .route("/x-nmos/node/v1.3/senders/{sender_id}", get(discovery::sender_by_id))
        .route("/x-nmos/node/v1.3/receivers", get(discovery::empty_list))
        .route("/x-nmos/node/v1.3/receivers/", get(discovery::empty_list))
        .route("/x-nmos/node/v1.3/receivers/{receiver_id}", get(discovery::receiver_by_id))
        .route("/x-nmos/node/v1.3/devices", get(discovery::devices))
        .route("/x-nmos/node/v1.3/devices/", get(discovery::devices))
        .route("/x-nmos/node/v1.3/devices/{device_id}", get(discovery::device_by_id))
        // Health check (useful for K8s liveness probes).
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // ── Bind & serve ────────────────────────────────────────
    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .expect("failed to bind");

    info!(addr = %config.listen_addr, "ncpd listening");

    axum::serve(listener, app)
        .await
        .expect("server error");
}

/// Liveness probe.
async fn healthz() -> &'static str {
    "ok"
}
