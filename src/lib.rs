//! Signaling server library for LAN-scoped peer discovery and WebRTC
//! signaling relay.
//!
//! Browsers on the same observed network address join an implicit room,
//! learn about each other, and exchange the small control messages needed
//! to bootstrap a direct data channel (or fall back to server relay). The
//! server never inspects relayed payloads.
//!
//! # Example
//!
//! ```rust,no_run
//! use drpl_signal::SignalingServer;
//! use std::net::SocketAddr;
//!
//! #[tokio::main]
//! async fn main() {
//!     let addr: SocketAddr = "0.0.0.0:3002".parse().unwrap();
//!     let server = SignalingServer::bind(addr).await.unwrap();
//!     server.run().await.unwrap();
//! }
//! ```

pub mod identity;
pub mod keepalive;
pub mod lifecycle;
pub mod protocol;
pub mod room;
pub mod router;
pub mod server;
pub mod session;

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{error, info};

use room::RoomRegistry;
use server::handle_connection;

/// A WebSocket signaling server for LAN peer discovery and relay.
pub struct SignalingServer {
    listener: TcpListener,
    registry: Arc<RoomRegistry>,
}

impl SignalingServer {
    /// Bind a listening socket at `addr`. Pass port `0` to let the OS pick
    /// an ephemeral port (recoverable via [`SignalingServer::local_addr`]).
    pub async fn bind(addr: SocketAddr) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            registry: Arc::new(RoomRegistry::new()),
        })
    }

    /// The address actually bound, useful when `addr` was port `0`.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Run the server, accepting connections until the process is
    /// terminated. Returns only on a fatal accept error.
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        info!(addr = %self.listener.local_addr()?, "signaling server listening");

        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    let registry = self.registry.clone();
                    tokio::spawn(async move {
                        handle_connection(stream, addr, registry).await;
                    });
                }
                Err(e) => {
                    error!(error = %e, "failed to accept connection");
                }
            }
        }
    }

    /// Access the room registry, e.g. for embedding or inspection.
    pub fn registry(&self) -> Arc<RoomRegistry> {
        self.registry.clone()
    }
}
