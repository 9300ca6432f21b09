//! WebSocket signaling gateway.
//!
//! Architecture:
//! ```text
//! Broadcaster ──┐                          ┌── outbound queue ──► Broadcaster
//!               ├── Session ── RoomRegistry ┤
//! Viewer     ───┘   (per conn)   ("abc")    └── outbound queue ──► Viewer
//! ```
//!
//! Each accepted connection runs in its own task, selecting between inbound
//! frames and its bounded outbound queue. Inbound frames go through the
//! connection's [`Session`]; fan-out only ever enqueues, so a slow socket
//! stalls nobody but itself. When the loop ends for any reason the session
//! is closed, which deregisters the client and notifies its room.

use std::net::SocketAddr;
use std::sync::Arc;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, RwLock};
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::Message;

use crate::config::ServerConfig;
use crate::error::{ProtocolError, ServerError};
use crate::registry::RoomRegistry;
use crate::session::{Handled, Session};

/// Server statistics.
#[derive(Debug, Clone, Default)]
pub struct ServerStats {
    pub total_connections: u64,
    pub active_connections: u64,
    pub total_messages: u64,
    pub malformed_messages: u64,
    pub dropped_messages: u64,
    pub active_rooms: usize,
}

/// The signaling server.
pub struct SignalServer {
    config: ServerConfig,
    registry: Arc<RoomRegistry>,
    stats: Arc<RwLock<ServerStats>>,
}

impl SignalServer {
    pub fn new(config: ServerConfig) -> Self {
        Self::with_registry(config, Arc::new(RoomRegistry::new()))
    }

    /// Create with an existing registry (shared with other components or tests).
    pub fn with_registry(config: ServerConfig, registry: Arc<RoomRegistry>) -> Self {
        Self {
            config,
            registry,
            stats: Arc::new(RwLock::new(ServerStats::default())),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(ServerConfig::default())
    }

    /// Bind the configured address and serve until the process exits.
    pub async fn run(&self) -> Result<(), ServerError> {
        let listener = TcpListener::bind(self.config.bind_addr()).await?;
        log::info!("Signaling server listening on {}", listener.local_addr()?);
        self.serve(listener).await
    }

    /// Serve connections from an already bound listener.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), ServerError> {
        loop {
            let (stream, addr) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    log::warn!("Failed to accept connection: {e}");
                    continue;
                }
            };
            log::debug!("New TCP connection from {addr}");

            let registry = self.registry.clone();
            let stats = self.stats.clone();
            let config = self.config.clone();

            tokio::spawn(async move {
                if let Err(e) = Self::handle_connection(stream, addr, registry, stats, config).await {
                    log::error!("Connection error from {addr}: {e}");
                }
            });
        }
    }

    /// Handle a single WebSocket connection.
    async fn handle_connection(
        stream: TcpStream,
        addr: SocketAddr,
        registry: Arc<RoomRegistry>,
        stats: Arc<RwLock<ServerStats>>,
        config: ServerConfig,
    ) -> Result<(), ServerError> {
        let ws_config = WebSocketConfig::default()
            .max_message_size(Some(config.max_message_bytes))
            .max_frame_size(Some(config.max_message_bytes));
        let ws_stream = tokio_tungstenite::accept_async_with_config(stream, Some(ws_config)).await?;
        let (mut ws_sender, mut ws_receiver) = ws_stream.split();

        let (outbound_tx, mut outbound_rx) = mpsc::channel::<Arc<str>>(config.outbound_capacity);
        let mut session = Session::new(outbound_tx);

        log::info!("WebSocket connection {} established from {addr}", session.id());

        {
            let mut s = stats.write().await;
            s.total_connections += 1;
            s.active_connections += 1;
        }

        let result: Result<(), ServerError> = loop {
            tokio::select! {
                frame = ws_receiver.next() => {
                    let handled = match frame {
                        Some(Ok(Message::Text(text))) => {
                            session.handle_text(&registry, text.as_str()).await
                        }
                        Some(Ok(Message::Binary(data))) => match std::str::from_utf8(&data) {
                            Ok(text) => session.handle_text(&registry, text).await,
                            Err(_) => {
                                log::warn!("Dropping frame from {addr}: {}", ProtocolError::InvalidUtf8);
                                Handled::Malformed
                            }
                        },
                        Some(Ok(Message::Ping(data))) => {
                            if let Err(e) = ws_sender.send(Message::Pong(data)).await {
                                break Err(e.into());
                            }
                            continue;
                        }
                        Some(Ok(Message::Close(_))) => {
                            // tungstenite only queues the close reply; flush it out.
                            if let Err(e) = ws_sender.close().await {
                                log::debug!("Close handshake with {addr} failed: {e}");
                            }
                            log::info!("Connection closed from {addr}");
                            break Ok(());
                        }
                        None => {
                            log::info!("Connection closed from {addr}");
                            break Ok(());
                        }
                        Some(Err(e)) => break Err(e.into()),
                        Some(Ok(_)) => continue,
                    };

                    let mut s = stats.write().await;
                    s.total_messages += 1;
                    match handled {
                        Handled::Malformed => s.malformed_messages += 1,
                        Handled::Routed(fan_out) => s.dropped_messages += fan_out.dropped as u64,
                        Handled::Joined { .. } | Handled::Ignored => {}
                    }
                }

                Some(frame) = outbound_rx.recv() => {
                    if let Err(e) = ws_sender.send(Message::text(frame.to_string())).await {
                        break Err(e.into());
                    }
                }
            }
        };

        // Deregister before reporting, so the room never keeps a dead member.
        session.close(&registry).await;

        {
            let mut s = stats.write().await;
            s.active_connections -= 1;
            s.active_rooms = registry.room_count().await;
        }

        result
    }

    /// Get server statistics.
    pub async fn stats(&self) -> ServerStats {
        let mut stats = self.stats.read().await.clone();
        stats.active_rooms = self.registry.room_count().await;
        stats
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<RoomRegistry> {
        &self.registry
    }
}
