//! Server configuration — all from environment variables.

use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    /// Listen address for REST + WebSocket.
    pub listen_addr: String,
    /// Host advertised in the IS-04 node/device documents.
    pub public_host: String,
    /// Port advertised in the IS-04 node/device documents.
    pub public_port: u16,
    /// Label for the node document.
    pub node_label: String,
    /// Label for the device document.
    pub device_label: String,
    /// Log level filter.
    pub log_level: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            listen_addr: env::var("LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into()),
            public_host: env::var("PUBLIC_HOST").unwrap_or_else(|_| "127.0.0.1".into()),
            public_port: env::var("PUBLIC_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            node_label: env::var("NODE_LABEL").unwrap_or_else(|_| "Example Node".into()),
            device_label: env::var("DEVICE_LABEL").unwrap_or_else(|_| "Example Device".into()),
            log_level: env::var("RUST_LOG")
                .unwrap_or_else(|_| "ncpd=info,tower_http=info".into()),
        }
    }

    /// Base HTTP URL advertised to controllers.
    pub fn public_href(&self) -> String {
        format!("http://{}:{}", self.public_host, self.public_port)
    }

    /// WebSocket URL of the control-protocol endpoint.
    pub fn control_href(&self) -> String {
        format!("ws://{}:{}/ws", self.public_host, self.public_port)
    }
}

pub fn hostname() -> String {
    hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "unknown".into())
}
