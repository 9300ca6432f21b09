//! Room registry: `streamId` → connected members, with role-filtered fan-out.
//!
//! ```text
//!                    ┌──────────────── RoomRegistry ────────────────┐
//!  join  ──write──►  │  "abc" ─► { conn A: broadcaster,             │
//!  leave ──write──►  │            conn B: viewer, conn C: viewer }  │
//!  fan_out ─read──►  │  "xyz" ─► { conn D: broadcaster }            │
//!                    └──────────────────────────────────────────────┘
//! ```
//!
//! A room exists exactly while it has at least one member. Every mutation and
//! every fan-out runs under one lock, so a member list is never observed half
//! updated. Delivery is a non-blocking `try_send` into each member's bounded
//! outbound queue: a full or closed queue costs that member the message and
//! nobody else.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

use crate::error::ProtocolError;
use crate::protocol::{Role, ServerMessage};

/// Server-assigned identity of one live connection.
///
/// Distinct from the client-supplied `clientId`, which is not unique.
pub type ConnectionId = Uuid;

/// Sending half of a member's outbound frame queue.
pub type Outbound = mpsc::Sender<Arc<str>>;

/// Which members of a room a message is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    /// Members holding this role.
    Role(Role),
    /// Every member.
    Everyone,
}

impl Audience {
    pub fn admits(self, role: Role) -> bool {
        match self {
            Self::Role(wanted) => wanted == role,
            Self::Everyone => true,
        }
    }
}

/// A registered connection inside a room.
#[derive(Debug, Clone)]
pub struct Member {
    pub client_id: String,
    pub role: Role,
    outbound: Outbound,
}

impl Member {
    pub fn new(client_id: impl Into<String>, role: Role, outbound: Outbound) -> Self {
        Self {
            client_id: client_id.into(),
            role,
            outbound,
        }
    }

    /// Best-effort enqueue. Never waits.
    fn deliver(&self, frame: &Arc<str>) -> bool {
        match self.outbound.try_send(frame.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                log::warn!("Outbound queue full for client {}, dropping message", self.client_id);
                false
            }
            Err(TrySendError::Closed(_)) => {
                log::debug!("Client {} is closing, dropping message", self.client_id);
                false
            }
        }
    }
}

/// Result of a single fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanOut {
    pub delivered: usize,
    pub dropped: usize,
}

/// Result of [`RoomRegistry::join`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinOutcome {
    /// The room did not exist before this join.
    pub room_created: bool,
    /// Member count after the join.
    pub members: usize,
    /// `broadcaster-joined` notices sent to viewers (zero for viewers).
    pub notified: FanOut,
}

/// Result of [`RoomRegistry::leave`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Departure {
    pub client_id: String,
    pub role: Role,
    /// The leaving member was the last one and the room was deleted.
    pub room_closed: bool,
    /// `client-left` notices sent to the remaining members.
    pub notified: FanOut,
}

/// Delivery counters (snapshot).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryStats {
    pub messages_delivered: u64,
    pub messages_dropped: u64,
    pub active_rooms: usize,
    pub active_members: usize,
}

struct AtomicRegistryStats {
    messages_delivered: AtomicU64,
    messages_dropped: AtomicU64,
}

#[derive(Default)]
struct Room {
    members: HashMap<ConnectionId, Member>,
}

impl Room {
    fn send(&self, sender: ConnectionId, audience: Audience, frame: &Arc<str>) -> FanOut {
        let mut result = FanOut::default();
        for (conn, member) in &self.members {
            if *conn == sender || !audience.admits(member.role) {
                continue;
            }
            if member.deliver(frame) {
                result.delivered += 1;
            } else {
                result.dropped += 1;
            }
        }
        result
    }
}

/// Registry of live rooms. Share it behind an `Arc`.
pub struct RoomRegistry {
    rooms: RwLock<HashMap<String, Room>>,
    stats: AtomicRegistryStats,
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            stats: AtomicRegistryStats {
                messages_delivered: AtomicU64::new(0),
                messages_dropped: AtomicU64::new(0),
            },
        }
    }

    /// Register `conn` in `stream_id`, creating the room if needed.
    ///
    /// Under the same lock: the `joined` ack is queued to the new member
    /// first, then (for broadcasters) `broadcaster-joined` goes to every
    /// viewer already in the room. Anything routed to the member afterwards
    /// is therefore queued behind its ack.
    pub async fn join(
        &self,
        stream_id: &str,
        conn: ConnectionId,
        member: Member,
    ) -> Result<JoinOutcome, ProtocolError> {
        let ack: Arc<str> = ServerMessage::Joined {
            client_id: member.client_id.clone(),
            stream_id: stream_id.to_string(),
            client_type: member.role,
        }
        .encode()?
        .into();
        let notice: Option<Arc<str>> = match member.role {
            Role::Broadcaster => Some(
                ServerMessage::BroadcasterJoined { stream_id: stream_id.to_string() }
                    .encode()?
                    .into(),
            ),
            Role::Viewer => None,
        };

        let mut rooms = self.rooms.write().await;
        let room_created = !rooms.contains_key(stream_id);
        let room = rooms.entry(stream_id.to_string()).or_default();

        if !member.deliver(&ack) {
            self.record(FanOut { delivered: 0, dropped: 1 });
        }
        let role = member.role;
        room.members.insert(conn, member);

        let notified = match notice {
            Some(frame) => room.send(conn, Audience::Role(Role::Viewer), &frame),
            None => FanOut::default(),
        };
        self.record(notified);

        log::info!(
            "{role} {conn} joined room {stream_id} ({} members{})",
            room.members.len(),
            if room_created { ", new room" } else { "" }
        );

        Ok(JoinOutcome {
            room_created,
            members: room.members.len(),
            notified,
        })
    }

    /// Send `message` to every member of `stream_id` admitted by `audience`,
    /// except `sender`. Unknown rooms deliver to nobody.
    pub async fn fan_out(
        &self,
        stream_id: &str,
        sender: ConnectionId,
        audience: Audience,
        message: &ServerMessage,
    ) -> Result<FanOut, ProtocolError> {
        let frame: Arc<str> = message.encode()?.into();
        let rooms = self.rooms.read().await;
        let result = match rooms.get(stream_id) {
            Some(room) => room.send(sender, audience, &frame),
            None => FanOut::default(),
        };
        self.record(result);
        Ok(result)
    }

    /// Remove `conn` from `stream_id`.
    ///
    /// Deletes the room when it empties, otherwise notifies the remaining
    /// members with `client-left`. Returns `None` if `conn` was not a member,
    /// which makes a repeated call a no-op.
    pub async fn leave(&self, stream_id: &str, conn: ConnectionId) -> Option<Departure> {
        let mut rooms = self.rooms.write().await;
        let room = rooms.get_mut(stream_id)?;
        let member = room.members.remove(&conn)?;

        if room.members.is_empty() {
            rooms.remove(stream_id);
            log::info!("{} {conn} left, room {stream_id} removed (empty)", member.role);
            return Some(Departure {
                client_id: member.client_id,
                role: member.role,
                room_closed: true,
                notified: FanOut::default(),
            });
        }

        let notice = ServerMessage::ClientLeft {
            client_id: member.client_id.clone(),
            client_type: member.role,
        };
        let notified = match notice.encode() {
            Ok(frame) => room.send(conn, Audience::Everyone, &Arc::from(frame)),
            Err(e) => {
                log::error!("Failed to encode client-left for room {stream_id}: {e}");
                FanOut::default()
            }
        };
        self.record(notified);
        log::info!(
            "{} {conn} left room {stream_id} ({} remaining)",
            member.role,
            room.members.len()
        );

        Some(Departure {
            client_id: member.client_id,
            role: member.role,
            room_closed: false,
            notified,
        })
    }

    fn record(&self, result: FanOut) {
        self.stats
            .messages_delivered
            .fetch_add(result.delivered as u64, Ordering::Relaxed);
        self.stats
            .messages_dropped
            .fetch_add(result.dropped as u64, Ordering::Relaxed);
    }

    /// Number of live rooms.
    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }

    /// Whether `stream_id` currently has a room.
    pub async fn has_room(&self, stream_id: &str) -> bool {
        self.rooms.read().await.contains_key(stream_id)
    }

    /// Member count of `stream_id` (zero when the room does not exist).
    pub async fn member_count(&self, stream_id: &str) -> usize {
        self.rooms
            .read()
            .await
            .get(stream_id)
            .map_or(0, |room| room.members.len())
    }

    /// `(clientId, role)` of every member of `stream_id`.
    pub async fn members(&self, stream_id: &str) -> Vec<(String, Role)> {
        self.rooms
            .read()
            .await
            .get(stream_id)
            .map(|room| {
                room.members
                    .values()
                    .map(|m| (m.client_id.clone(), m.role))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Stream ids of all live rooms.
    pub async fn active_streams(&self) -> Vec<String> {
        self.rooms.read().await.keys().cloned().collect()
    }

    pub async fn stats(&self) -> RegistryStats {
        let rooms = self.rooms.read().await;
        RegistryStats {
            messages_delivered: self.stats.messages_delivered.load(Ordering::Relaxed),
            messages_dropped: self.stats.messages_dropped.load(Ordering::Relaxed),
            active_rooms: rooms.len(),
            active_members: rooms.values().map(|r| r.members.len()).sum(),
        }
    }
}
