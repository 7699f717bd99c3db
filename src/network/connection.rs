//! Connection handling
//!
//! Wraps a TCP stream with the frame codec and keeps per-connection
//! statistics. Connections are payload-agnostic: the server reads method
//! calls and writes responses, the client does the reverse.

use bytes::BytesMut;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::protocol::{CodecError, Decoder, Encoder, Frame};

/// Connection errors
#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Protocol error: {0}")]
    Protocol(#[from] CodecError),

    #[error("Connection closed")]
    Closed,

    #[error("Connection timeout")]
    Timeout,
}

pub type ConnectionResult<T> = Result<T, ConnectionError>;

/// State of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Open,
    Closed,
}

/// Connection statistics
#[derive(Debug, Default, Clone)]
pub struct ConnectionStats {
    pub frames_sent: u64,
    pub frames_received: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
}

/// A framed connection to a remote peer
pub struct Connection {
    remote_addr: SocketAddr,
    stream: TcpStream,
    encoder: Encoder,
    decoder: Decoder,
    read_buf: BytesMut,
    write_buf: BytesMut,
    state: ConnectionState,
    last_activity: Instant,
    stats: ConnectionStats,
}

impl Connection {
    /// Create a new connection from an established TCP stream
    pub fn new(stream: TcpStream, remote_addr: SocketAddr) -> Self {
        Self {
            remote_addr,
            stream,
            encoder: Encoder::new(),
            decoder: Decoder::new(),
            read_buf: BytesMut::with_capacity(4096),
            write_buf: BytesMut::with_capacity(4096),
            state: ConnectionState::Open,
            last_activity: Instant::now(),
            stats: ConnectionStats::default(),
        }
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn stats(&self) -> &ConnectionStats {
        &self.stats
    }

    /// Send a message with the next outgoing sequence number, returning it
    pub async fn send<T: Serialize>(&mut self, message: &T) -> ConnectionResult<u32> {
        self.write_buf.clear();
        let sequence = self.encoder.encode(message, &mut self.write_buf)?;
        self.flush_write_buf().await?;
        Ok(sequence)
    }

    /// Send a message under an explicit sequence number
    pub async fn send_frame<T: Serialize>(&mut self, sequence: u32, message: &T) -> ConnectionResult<()> {
        self.write_buf.clear();
        self.encoder.encode_frame(sequence, message, &mut self.write_buf)?;
        self.flush_write_buf().await
    }

    async fn flush_write_buf(&mut self) -> ConnectionResult<()> {
        if self.state == ConnectionState::Closed {
            return Err(ConnectionError::Closed);
        }

        self.stream.write_all(&self.write_buf).await?;
        self.stream.flush().await?;

        self.stats.frames_sent += 1;
        self.stats.bytes_sent += self.write_buf.len() as u64;
        self.last_activity = Instant::now();
        Ok(())
    }

    /// Receive the next frame. `Ok(None)` means the peer closed cleanly.
    pub async fn recv<T: DeserializeOwned>(&mut self) -> ConnectionResult<Option<Frame<T>>> {
        loop {
            if let Some(frame) = self.decoder.decode(&mut self.read_buf)? {
                self.stats.frames_received += 1;
                self.last_activity = Instant::now();
                return Ok(Some(frame));
            }

            let mut buf = [0u8; 4096];
            let n = self.stream.read(&mut buf).await?;

            if n == 0 {
                self.state = ConnectionState::Closed;
                if self.read_buf.is_empty() {
                    return Ok(None);
                } else {
                    return Err(ConnectionError::Closed);
                }
            }

            self.read_buf.extend_from_slice(&buf[..n]);
            self.stats.bytes_received += n as u64;
        }
    }

    /// Receive with a timeout
    pub async fn recv_timeout<T: DeserializeOwned>(
        &mut self,
        timeout: Duration,
    ) -> ConnectionResult<Option<Frame<T>>> {
        match tokio::time::timeout(timeout, self.recv()).await {
            Ok(result) => result,
            Err(_) => Err(ConnectionError::Timeout),
        }
    }

    /// Close the write half of the connection
    pub async fn close(&mut self) -> ConnectionResult<()> {
        if self.state == ConnectionState::Closed {
            return Ok(());
        }
        self.state = ConnectionState::Closed;
        self.stream.shutdown().await?;
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.state == ConnectionState::Open
    }

    /// Time since the last frame in either direction
    pub fn idle_time(&self) -> Duration {
        self.last_activity.elapsed()
    }
}
