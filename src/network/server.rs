//! Bridge server
//!
//! Accepts controller connections and feeds every decoded method call into
//! the command bridge. Each call is answered with exactly one response
//! carrying the call's sequence number. Calls on one connection are handled
//! one after another, so their order reaches the cursor unchanged.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch, RwLock};

use super::connection::{Connection, ConnectionError};
use super::NetworkConfig;
use crate::bridge::{BridgeError, CommandBridge};
use crate::protocol::{MethodCall, MethodResponse};

/// Server errors
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Server already running")]
    AlreadyRunning,

    #[error("Server not running")]
    NotRunning,

    #[error("Bind failed: {0}")]
    BindFailed(String),
}

pub type ServerResult<T> = Result<T, ServerError>;

/// Events emitted by the server
#[derive(Debug, Clone)]
pub enum ServerEvent {
    /// Server started
    Started { bind_addr: SocketAddr },
    /// A controller has connected
    ClientConnected { addr: SocketAddr },
    /// A controller has disconnected
    ClientDisconnected { addr: SocketAddr, reason: String },
    /// A method call was answered
    CallHandled {
        addr: SocketAddr,
        method: String,
        response: MethodResponse,
    },
    /// Server stopped
    Stopped,
}

/// Information about a connected controller
#[derive(Debug, Clone)]
pub struct ClientInfo {
    pub addr: SocketAddr,
    pub connected_at: Instant,
}

/// Accepts controllers and drives the command bridge
pub struct BridgeServer {
    config: NetworkConfig,
    bridge: CommandBridge,
    clients: Arc<RwLock<HashMap<SocketAddr, ClientInfo>>>,
    event_tx: mpsc::Sender<ServerEvent>,
    event_rx: Option<mpsc::Receiver<ServerEvent>>,
    shutdown_tx: Option<watch::Sender<bool>>,
    local_addr: Option<SocketAddr>,
    running: Arc<RwLock<bool>>,
}

impl BridgeServer {
    /// Create a new server
    pub fn new(config: NetworkConfig, bridge: CommandBridge) -> Self {
        let (event_tx, event_rx) = mpsc::channel(256);

        Self {
            config,
            bridge,
            clients: Arc::new(RwLock::new(HashMap::new())),
            event_tx,
            event_rx: Some(event_rx),
            shutdown_tx: None,
            local_addr: None,
            running: Arc::new(RwLock::new(false)),
        }
    }

    /// Take the event receiver (can only be called once)
    pub fn take_event_receiver(&mut self) -> Option<mpsc::Receiver<ServerEvent>> {
        self.event_rx.take()
    }

    /// Start the server
    pub async fn start(&mut self) -> ServerResult<SocketAddr> {
        {
            let running = self.running.read().await;
            if *running {
                return Err(ServerError::AlreadyRunning);
            }
        }

        let bind_addr = format!("{}:{}", self.config.bind_address, self.config.port);
        let listener = TcpListener::bind(&bind_addr).await.map_err(|e| {
            ServerError::BindFailed(format!("Failed to bind to {}: {}", bind_addr, e))
        })?;

        let local_addr = listener.local_addr()?;
        self.local_addr = Some(local_addr);
        tracing::info!("Bridge server listening on {}", local_addr);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        self.shutdown_tx = Some(shutdown_tx);

        {
            let mut running = self.running.write().await;
            *running = true;
        }

        emit(&self.event_tx, ServerEvent::Started { bind_addr: local_addr });

        let clients = self.clients.clone();
        let event_tx = self.event_tx.clone();
        let bridge = self.bridge.clone();
        let running = self.running.clone();

        tokio::spawn(async move {
            let mut accept_shutdown = shutdown_rx.clone();

            loop {
                tokio::select! {
                    result = listener.accept() => {
                        match result {
                            Ok((stream, addr)) => {
                                tracing::info!("Controller connected from {}", addr);

                                let clients = clients.clone();
                                let event_tx = event_tx.clone();
                                let bridge = bridge.clone();
                                let shutdown = shutdown_rx.clone();

                                tokio::spawn(async move {
                                    handle_client(stream, addr, bridge, clients, event_tx, shutdown).await;
                                });
                            }
                            Err(e) => {
                                tracing::error!("Accept error: {}", e);
                            }
                        }
                    }
                    _ = accept_shutdown.changed() => {
                        tracing::info!("Bridge server shutdown requested");
                        break;
                    }
                }
            }

            let mut running = running.write().await;
            *running = false;

            emit(&event_tx, ServerEvent::Stopped);
        });

        Ok(local_addr)
    }

    /// Stop accepting controllers and close every open connection
    pub async fn stop(&mut self) -> ServerResult<()> {
        {
            let running = self.running.read().await;
            if !*running {
                return Err(ServerError::NotRunning);
            }
        }

        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(true);
        }

        Ok(())
    }

    /// Address the server is bound to, once started
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Get a list of connected controllers
    pub async fn clients(&self) -> Vec<ClientInfo> {
        let clients = self.clients.read().await;
        clients.values().cloned().collect()
    }

    /// Check if the server is running
    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }
}

fn emit(event_tx: &mpsc::Sender<ServerEvent>, event: ServerEvent) {
    if let Err(e) = event_tx.try_send(event) {
        tracing::debug!("Server event dropped: {}", e);
    }
}

/// Answer a single decoded payload
async fn respond(bridge: &CommandBridge, payload: serde_json::Value) -> (String, MethodResponse) {
    let call: MethodCall = match serde_json::from_value(payload) {
        Ok(call) => call,
        Err(e) => {
            return (
                String::new(),
                MethodResponse::Error {
                    message: format!("Malformed method call: {}", e),
                },
            );
        }
    };

    let response = match bridge.handle_call(&call).await {
        Ok(_ack) => MethodResponse::Success,
        Err(BridgeError::UnsupportedCommand(method)) => MethodResponse::NotImplemented { method },
    };
    (call.method, response)
}

/// Handle a controller connection
async fn handle_client(
    stream: TcpStream,
    addr: SocketAddr,
    bridge: CommandBridge,
    clients: Arc<RwLock<HashMap<SocketAddr, ClientInfo>>>,
    event_tx: mpsc::Sender<ServerEvent>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut conn = Connection::new(stream, addr);

    {
        let mut clients = clients.write().await;
        clients.insert(
            addr,
            ClientInfo {
                addr,
                connected_at: Instant::now(),
            },
        );
    }

    emit(&event_tx, ServerEvent::ClientConnected { addr });

    let disconnect_reason = loop {
        tokio::select! {
            result = conn.recv::<serde_json::Value>() => {
                match result {
                    Ok(Some(frame)) => {
                        let (method, response) = respond(&bridge, frame.message).await;
                        tracing::debug!("{} {} -> {:?}", addr, method, response);

                        if let Err(e) = conn.send_frame(frame.sequence, &response).await {
                            break format!("Send error: {}", e);
                        }
                        emit(&event_tx, ServerEvent::CallHandled { addr, method, response });
                    }
                    Ok(None) => {
                        break "Connection closed".to_string();
                    }
                    Err(ConnectionError::Protocol(e)) => {
                        tracing::warn!("Dropping controller {}: {}", addr, e);
                        break format!("Protocol error: {}", e);
                    }
                    Err(e) => {
                        break format!("Error: {}", e);
                    }
                }
            }
            _ = shutdown.changed() => {
                break "Server shutting down".to_string();
            }
        }
    };

    {
        let mut clients = clients.write().await;
        clients.remove(&addr);
    }

    let stats = conn.stats();
    tracing::info!(
        "Controller {} disconnected after {} calls ({} bytes in, {} bytes out): {}",
        addr,
        stats.frames_received,
        stats.bytes_received,
        stats.bytes_sent,
        disconnect_reason
    );
    emit(
        &event_tx,
        ServerEvent::ClientDisconnected {
            addr,
            reason: disconnect_reason,
        },
    );

    let _ = conn.close().await;
}
