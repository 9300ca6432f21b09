//! WebSocket client for the signaling gateway.
//!
//! Speaks the same wire protocol as the browser studio: connect, `join` a
//! room with a role, then exchange signaling and chat messages. Media is out
//! of scope; WebRTC payloads are passed in and out as opaque JSON.

use std::sync::Arc;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::{mpsc, RwLock};
use tokio_tungstenite::tungstenite::Message;

use crate::error::ProtocolError;
use crate::protocol::{ClientMessage, Role, ServerMessage};

/// Client connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Events emitted by the client.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// A message from the gateway
    Message(ServerMessage),
    /// The connection ended
    Disconnected,
}

/// Signaling client bound to one room.
pub struct SignalClient {
    stream_id: String,
    role: Role,
    client_id: Option<String>,
    server_url: String,
    state: Arc<RwLock<ConnectionState>>,
    outgoing_tx: Option<mpsc::Sender<Message>>,
    event_tx: mpsc::Sender<ClientEvent>,
    event_rx: Option<mpsc::Receiver<ClientEvent>>,
}

impl SignalClient {
    pub fn new(server_url: impl Into<String>, stream_id: impl Into<String>, role: Role) -> Self {
        let (event_tx, event_rx) = mpsc::channel(256);
        Self {
            stream_id: stream_id.into(),
            role,
            client_id: None,
            server_url: server_url.into(),
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
            outgoing_tx: None,
            event_tx,
            event_rx: Some(event_rx),
        }
    }

    /// Request a specific `clientId` instead of a server-generated one.
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Take the event receiver (can only be called once).
    pub fn take_event_rx(&mut self) -> Option<mpsc::Receiver<ClientEvent>> {
        self.event_rx.take()
    }

    /// Connect and send `join`. The `joined` ack arrives as the first event.
    pub async fn connect(&mut self) -> Result<(), ProtocolError> {
        *self.state.write().await = ConnectionState::Connecting;

        let ws_stream = match tokio_tungstenite::connect_async(&self.server_url).await {
            Ok((ws_stream, _)) => ws_stream,
            Err(e) => {
                log::warn!("Failed to connect to {}: {e}", self.server_url);
                *self.state.write().await = ConnectionState::Disconnected;
                return Err(ProtocolError::ConnectionClosed);
            }
        };
        let (mut ws_writer, mut ws_reader) = ws_stream.split();

        // Writer task: forward outgoing channel to WebSocket
        let (out_tx, mut out_rx) = mpsc::channel::<Message>(256);
        tokio::spawn(async move {
            while let Some(msg) = out_rx.recv().await {
                let closing = matches!(msg, Message::Close(_));
                if ws_writer.send(msg).await.is_err() || closing {
                    break;
                }
            }
        });
        self.outgoing_tx = Some(out_tx);

        // Reader task: decode gateway messages into events
        let event_tx = self.event_tx.clone();
        let state = self.state.clone();
        tokio::spawn(async move {
            while let Some(msg) = ws_reader.next().await {
                match msg {
                    Ok(Message::Text(text)) => match ServerMessage::decode(text.as_str()) {
                        Ok(message) => {
                            if event_tx.send(ClientEvent::Message(message)).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => log::warn!("Ignoring undecodable server message: {e}"),
                    },
                    Ok(Message::Close(_)) | Err(_) => break,
                    _ => {}
                }
            }

            *state.write().await = ConnectionState::Disconnected;
            let _ = event_tx.send(ClientEvent::Disconnected).await;
        });

        *self.state.write().await = ConnectionState::Connected;

        let join = ClientMessage::Join {
            stream_id: self.stream_id.clone(),
            client_type: self.role,
            client_id: self.client_id.clone(),
        };
        self.send(&join).await
    }

    /// Send any protocol message, stamped with this client's `streamId`.
    pub async fn send(&self, message: &ClientMessage) -> Result<(), ProtocolError> {
        let mut frame = serde_json::to_value(message)
            .map_err(|e| ProtocolError::Serialization(e.to_string()))?;
        if let Value::Object(fields) = &mut frame {
            fields
                .entry("streamId")
                .or_insert_with(|| Value::String(self.stream_id.clone()));
        }
        self.send_raw(frame.to_string()).await
    }

    /// Send a raw text frame, bypassing encoding.
    pub async fn send_raw(&self, text: impl Into<String>) -> Result<(), ProtocolError> {
        let tx = self.outgoing_tx.as_ref().ok_or(ProtocolError::ConnectionClosed)?;
        tx.send(Message::text(text.into()))
            .await
            .map_err(|_| ProtocolError::ConnectionClosed)
    }

    pub async fn send_offer(&self, offer: Value) -> Result<(), ProtocolError> {
        self.send(&ClientMessage::Offer { offer }).await
    }

    pub async fn request_offer(&self) -> Result<(), ProtocolError> {
        self.send(&ClientMessage::RequestOffer).await
    }

    pub async fn send_answer(&self, answer: Value) -> Result<(), ProtocolError> {
        self.send(&ClientMessage::Answer {
            answer,
            client_id: self.client_id.clone(),
        })
        .await
    }

    pub async fn send_ice_candidate(&self, candidate: Value) -> Result<(), ProtocolError> {
        self.send(&ClientMessage::IceCandidate {
            candidate,
            client_id: self.client_id.clone(),
        })
        .await
    }

    pub async fn send_chat(
        &self,
        message: impl Into<String>,
        author: impl Into<Value>,
        timestamp: Value,
    ) -> Result<(), ProtocolError> {
        self.send(&ClientMessage::Chat {
            message: message.into(),
            author: Some(author.into()),
            timestamp: Some(timestamp),
        })
        .await
    }

    pub async fn send_reaction(&self, reaction: Value, timestamp: Value) -> Result<(), ProtocolError> {
        self.send(&ClientMessage::Reaction {
            reaction,
            timestamp: Some(timestamp),
        })
        .await
    }

    /// Send a close frame; the gateway then runs its disconnect path.
    pub async fn close(&mut self) -> Result<(), ProtocolError> {
        let tx = self.outgoing_tx.take().ok_or(ProtocolError::ConnectionClosed)?;
        tx.send(Message::Close(None))
            .await
            .map_err(|_| ProtocolError::ConnectionClosed)
    }

    pub async fn connection_state(&self) -> ConnectionState {
        *self.state.read().await
    }

    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }
}
