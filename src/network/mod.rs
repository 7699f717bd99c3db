//! Network module - Carries controller commands over TCP
//!
//! Provides:
//! - Server that feeds decoded method calls into the command bridge
//! - Client used by `pointerd send`
//! - Framed connections

mod client;
mod connection;
mod server;

pub use client::*;
pub use connection::*;
pub use server::*;

use std::net::SocketAddr;

use crate::config::BridgeConfig;

/// Configuration for network operations
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Interface to listen on
    pub bind_address: String,
    /// Port to listen on or connect to
    pub port: u16,
    /// Connection timeout in milliseconds
    pub connect_timeout_ms: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: crate::protocol::DEFAULT_PORT,
            connect_timeout_ms: 5000,
        }
    }
}

impl NetworkConfig {
    pub fn new(port: u16) -> Self {
        Self {
            port,
            ..Default::default()
        }
    }

    pub fn with_bind_address(mut self, address: impl Into<String>) -> Self {
        self.bind_address = address.into();
        self
    }
}

impl From<&BridgeConfig> for NetworkConfig {
    fn from(config: &BridgeConfig) -> Self {
        let defaults = Self::default();
        Self {
            bind_address: config
                .bind_address
                .clone()
                .unwrap_or(defaults.bind_address),
            port: config.port,
            connect_timeout_ms: config.connect_timeout_ms,
        }
    }
}

/// Resolve a hostname to a socket address
pub async fn resolve_host(host: &str, port: u16) -> std::io::Result<SocketAddr> {
    use tokio::net::lookup_host;

    let addr_string = format!("{}:{}", host, port);
    let mut addrs = lookup_host(&addr_string).await?;

    addrs.next().ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("Could not resolve host: {}", host),
        )
    })
}
