//! Controller client
//!
//! Sends method calls to a running `pointerd serve` and waits for the
//! matching response.

use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpStream;

use super::connection::{Connection, ConnectionError};
use super::NetworkConfig;
use crate::protocol::{Frame, MethodCall, MethodResponse};

/// Client errors
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    #[error("Connection timeout")]
    Timeout,

    #[error("Response for sequence {received} while waiting for {expected}")]
    SequenceMismatch { expected: u32, received: u32 },
}

pub type ClientResult<T> = Result<T, ClientError>;

/// A connection to the bridge server from the controller side
pub struct ControllerClient {
    conn: Connection,
    response_timeout: Duration,
}

impl ControllerClient {
    /// Connect to a server by address
    pub async fn connect(server_addr: SocketAddr, timeout: Duration) -> ClientResult<Self> {
        tracing::debug!("Connecting to {}", server_addr);

        let stream = match tokio::time::timeout(timeout, TcpStream::connect(server_addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(ClientError::Io(e)),
            Err(_) => return Err(ClientError::Timeout),
        };
        stream.set_nodelay(true)?;

        Ok(Self {
            conn: Connection::new(stream, server_addr),
            response_timeout: timeout,
        })
    }

    /// Connect to a server by hostname
    pub async fn connect_hostname(host: &str, config: &NetworkConfig) -> ClientResult<Self> {
        let addr = super::resolve_host(host, config.port).await?;
        Self::connect(addr, Duration::from_millis(config.connect_timeout_ms)).await
    }

    /// Send a call and wait for its response
    pub async fn call(&mut self, call: &MethodCall) -> ClientResult<MethodResponse> {
        let expected = self.conn.send(call).await?;

        let frame: Frame<MethodResponse> = match self.conn.recv_timeout(self.response_timeout).await {
            Ok(Some(frame)) => frame,
            Ok(None) => return Err(ClientError::Connection(ConnectionError::Closed)),
            Err(ConnectionError::Timeout) => return Err(ClientError::Timeout),
            Err(e) => return Err(e.into()),
        };

        if frame.sequence != expected {
            return Err(ClientError::SequenceMismatch {
                expected,
                received: frame.sequence,
            });
        }
        Ok(frame.message)
    }

    pub async fn move_cursor(&mut self, delta_x: i32, delta_y: i32) -> ClientResult<MethodResponse> {
        self.call(&MethodCall::move_cursor(delta_x, delta_y)).await
    }

    pub async fn perform_click(&mut self) -> ClientResult<MethodResponse> {
        self.call(&MethodCall::perform_click()).await
    }

    pub async fn open_accessibility_settings(&mut self) -> ClientResult<MethodResponse> {
        self.call(&MethodCall::open_accessibility_settings()).await
    }

    pub fn server_addr(&self) -> SocketAddr {
        self.conn.remote_addr()
    }

    /// Close the connection
    pub async fn close(mut self) -> ClientResult<()> {
        self.conn.close().await?;
        Ok(())
    }
}
