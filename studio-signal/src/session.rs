//! Per-connection session state machine.
//!
//! ```text
//!   Unjoined ──join──► Joined ──close──► Closed
//!      │                                   ▲
//!      └───────────────close───────────────┘
//! ```
//!
//! A session is created when a connection is accepted and owns that
//! connection's outbound queue. Room and role are fixed by the first `join`
//! and never change; a client that wants another room reconnects.

use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;
use uuid::Uuid;

use crate::error::ProtocolError;
use crate::protocol::{ClientMessage, Role};
use crate::registry::{ConnectionId, Departure, FanOut, Member, Outbound, RoomRegistry};
use crate::routing;

/// Identity a client established with `join`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinedClient {
    pub client_id: String,
    pub stream_id: String,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Unjoined,
    Joined(JoinedClient),
    Closed,
}

/// What happened to one inbound frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handled {
    /// The client joined a room.
    Joined { room_created: bool },
    /// The message was fanned out.
    Routed(FanOut),
    /// Valid message with no effect in the current state or role.
    Ignored,
    /// The frame could not be decoded and was dropped.
    Malformed,
}

pub struct Session {
    id: ConnectionId,
    outbound: Outbound,
    state: SessionState,
}

impl Session {
    pub fn new(outbound: Outbound) -> Self {
        Self {
            id: Uuid::new_v4(),
            outbound,
            state: SessionState::Unjoined,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn joined(&self) -> Option<&JoinedClient> {
        match &self.state {
            SessionState::Joined(client) => Some(client),
            _ => None,
        }
    }

    /// Decode and apply one text frame. Never fails: bad input is logged
    /// and reported as [`Handled::Malformed`].
    pub async fn handle_text(&mut self, registry: &RoomRegistry, text: &str) -> Handled {
        match ClientMessage::decode(text) {
            Ok(message) => self.handle(registry, message).await,
            Err(e) => {
                log::warn!("Dropping malformed message on {}: {e}", self.id);
                Handled::Malformed
            }
        }
    }

    /// Apply one decoded message.
    pub async fn handle(&mut self, registry: &RoomRegistry, message: ClientMessage) -> Handled {
        match self.dispatch(registry, message).await {
            Ok(handled) => handled,
            Err(e) => {
                log::error!("Failed to process message on {}: {e}", self.id);
                Handled::Ignored
            }
        }
    }

    async fn dispatch(
        &mut self,
        registry: &RoomRegistry,
        message: ClientMessage,
    ) -> Result<Handled, ProtocolError> {
        let client = match self.state {
            SessionState::Closed => return Ok(Handled::Ignored),
            SessionState::Unjoined => {
                return match message {
                    ClientMessage::Join { stream_id, client_type, client_id } => {
                        self.join(registry, stream_id, client_type, client_id).await
                    }
                    other => {
                        log::debug!("Ignoring {} from {} before join", other.kind(), self.id);
                        Ok(Handled::Ignored)
                    }
                };
            }
            SessionState::Joined(ref client) => client,
        };

        match message {
            ClientMessage::Join { stream_id, .. } => {
                log::warn!(
                    "Ignoring join to {stream_id} from {}: already in room {}",
                    client.client_id,
                    client.stream_id
                );
                Ok(Handled::Ignored)
            }
            ClientMessage::Unknown => {
                log::info!("Unknown message type from {}", client.client_id);
                Ok(Handled::Ignored)
            }
            message => {
                let kind = message.kind();
                match routing::route(client, message) {
                    Some(delivery) => {
                        let result = registry
                            .fan_out(&client.stream_id, self.id, delivery.audience, &delivery.message)
                            .await?;
                        log::debug!(
                            "Routed {kind} from {} in {} to {} recipients",
                            client.client_id,
                            client.stream_id,
                            result.delivered
                        );
                        Ok(Handled::Routed(result))
                    }
                    None => {
                        log::debug!("Ignoring {kind} from {} {}", client.role, client.client_id);
                        Ok(Handled::Ignored)
                    }
                }
            }
        }
    }

    async fn join(
        &mut self,
        registry: &RoomRegistry,
        stream_id: String,
        role: Role,
        client_id: Option<String>,
    ) -> Result<Handled, ProtocolError> {
        let client_id = client_id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(generate_client_id);
        let member = Member::new(client_id.clone(), role, self.outbound.clone());
        let outcome = registry.join(&stream_id, self.id, member).await?;

        self.state = SessionState::Joined(JoinedClient {
            client_id,
            stream_id,
            role,
        });
        Ok(Handled::Joined {
            room_created: outcome.room_created,
        })
    }

    /// Move to `Closed`, leaving the room if joined. Safe to call repeatedly.
    pub async fn close(&mut self, registry: &RoomRegistry) -> Option<Departure> {
        match std::mem::replace(&mut self.state, SessionState::Closed) {
            SessionState::Joined(client) => registry.leave(&client.stream_id, self.id).await,
            _ => None,
        }
    }
}

const CLIENT_ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// `client-<unix millis>-<9 base36 chars>`
pub fn generate_client_id() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    let mut rng = rand::rng();
    let suffix: String = (0..9)
        .map(|_| CLIENT_ID_ALPHABET[rng.random_range(0..CLIENT_ID_ALPHABET.len())] as char)
        .collect();
    format!("client-{millis}-{suffix}")
}
