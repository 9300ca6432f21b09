//! JSON wire protocol for the signaling gateway.
//!
//! Every frame is a UTF-8 JSON object tagged by its `type` field:
//! ```text
//! { "type": "offer", "streamId": "abc", "offer": { ...opaque SDP... } }
//! ```
//!
//! Inbound frames decode into [`ClientMessage`], outbound frames are built
//! from [`ServerMessage`]. WebRTC payloads (`offer`, `answer`, `candidate`)
//! are carried as raw [`serde_json::Value`]s and never inspected. A payload
//! the sender left out stays out of the forwarded frame.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProtocolError;

/// Role a client declares when joining a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Publishes the scene and sends offers.
    Broadcaster,
    /// Consumes the stream and answers offers.
    Viewer,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Broadcaster => "broadcaster",
            Self::Viewer => "viewer",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Messages a client sends to the gateway.
///
/// Any `type` outside the closed set decodes to [`ClientMessage::Unknown`]
/// so the caller can log it without treating the frame as malformed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    Join {
        stream_id: String,
        #[serde(alias = "role")]
        client_type: Role,
        #[serde(
            default,
            deserialize_with = "string_or_absent",
            skip_serializing_if = "Option::is_none"
        )]
        client_id: Option<String>,
    },
    Offer {
        #[serde(default, skip_serializing_if = "Value::is_null")]
        offer: Value,
    },
    RequestOffer,
    Answer {
        #[serde(default, skip_serializing_if = "Value::is_null")]
        answer: Value,
        #[serde(
            default,
            deserialize_with = "string_or_absent",
            skip_serializing_if = "Option::is_none"
        )]
        client_id: Option<String>,
    },
    IceCandidate {
        #[serde(default, skip_serializing_if = "Value::is_null")]
        candidate: Value,
        #[serde(
            default,
            deserialize_with = "string_or_absent",
            skip_serializing_if = "Option::is_none"
        )]
        client_id: Option<String>,
    },
    Chat {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        author: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<Value>,
    },
    Reaction {
        #[serde(default, skip_serializing_if = "Value::is_null")]
        reaction: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<Value>,
    },
    #[serde(other)]
    Unknown,
}

/// A `clientId` that is not a string is treated as absent, so the session
/// falls back to an id of its own.
fn string_or_absent<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(id) => Some(id),
        _ => None,
    })
}

impl ClientMessage {
    /// Decode a single inbound text frame.
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(text).map_err(|e| ProtocolError::Deserialization(e.to_string()))
    }

    /// Encode for sending (used by [`crate::client::SignalClient`]).
    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(|e| ProtocolError::Serialization(e.to_string()))
    }

    /// The wire name of this message's `type`.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Join { .. } => "join",
            Self::Offer { .. } => "offer",
            Self::RequestOffer => "request-offer",
            Self::Answer { .. } => "answer",
            Self::IceCandidate { .. } => "ice-candidate",
            Self::Chat { .. } => "chat",
            Self::Reaction { .. } => "reaction",
            Self::Unknown => "unknown",
        }
    }
}

/// Messages the gateway sends to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    /// Join acknowledgement, sent to the joining client only.
    Joined {
        client_id: String,
        stream_id: String,
        client_type: Role,
    },
    BroadcasterJoined {
        stream_id: String,
    },
    Offer {
        #[serde(default, skip_serializing_if = "Value::is_null")]
        offer: Value,
        stream_id: String,
    },
    RequestOffer {
        stream_id: String,
    },
    Answer {
        #[serde(default, skip_serializing_if = "Value::is_null")]
        answer: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        client_id: Option<String>,
    },
    IceCandidate {
        #[serde(default, skip_serializing_if = "Value::is_null")]
        candidate: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        client_id: Option<String>,
    },
    Chat {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        author: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<Value>,
    },
    Reaction {
        #[serde(default, skip_serializing_if = "Value::is_null")]
        reaction: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<Value>,
    },
    ClientLeft {
        client_id: String,
        client_type: Role,
    },
}

impl ServerMessage {
    /// Serialize to a text frame.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(|e| ProtocolError::Serialization(e.to_string()))
    }

    /// Parse a text frame received from the gateway.
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(text).map_err(|e| ProtocolError::Deserialization(e.to_string()))
    }

    /// The wire name of this message's `type`.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Joined { .. } => "joined",
            Self::BroadcasterJoined { .. } => "broadcaster-joined",
            Self::Offer { .. } => "offer",
            Self::RequestOffer { .. } => "request-offer",
            Self::Answer { .. } => "answer",
            Self::IceCandidate { .. } => "ice-candidate",
            Self::Chat { .. } => "chat",
            Self::Reaction { .. } => "reaction",
            Self::ClientLeft { .. } => "client-left",
        }
    }
}
