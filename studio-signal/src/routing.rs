//! The routing table: which members of a room receive which inbound message.
//!
//! | inbound          | sender role  | outbound audience        |
//! |------------------|--------------|--------------------------|
//! | `offer`          | broadcaster  | viewers                  |
//! | `request-offer`  | viewer       | broadcasters             |
//! | `answer`         | viewer       | broadcasters             |
//! | `ice-candidate`  | broadcaster  | viewers                  |
//! | `ice-candidate`  | viewer       | broadcasters             |
//! | `chat`           | any          | everyone                 |
//! | `reaction`       | any          | everyone                 |
//!
//! The sender is always excluded by [`crate::registry::RoomRegistry::fan_out`].
//! A role that does not match the table yields no delivery at all.

use crate::protocol::{ClientMessage, Role, ServerMessage};
use crate::registry::Audience;
use crate::session::JoinedClient;

/// An outbound message and who should get it.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub audience: Audience,
    pub message: ServerMessage,
}

impl Delivery {
    fn to(audience: Audience, message: ServerMessage) -> Option<Self> {
        Some(Self { audience, message })
    }
}

/// Apply the routing table to a message from a joined client.
///
/// `join` and unrecognized types are session concerns and return `None`.
pub fn route(sender: &JoinedClient, message: ClientMessage) -> Option<Delivery> {
    use Role::{Broadcaster, Viewer};

    match (sender.role, message) {
        (Broadcaster, ClientMessage::Offer { offer }) => Delivery::to(
            Audience::Role(Viewer),
            ServerMessage::Offer {
                offer,
                stream_id: sender.stream_id.clone(),
            },
        ),
        (Viewer, ClientMessage::RequestOffer) => Delivery::to(
            Audience::Role(Broadcaster),
            ServerMessage::RequestOffer {
                stream_id: sender.stream_id.clone(),
            },
        ),
        (Viewer, ClientMessage::Answer { answer, client_id }) => Delivery::to(
            Audience::Role(Broadcaster),
            ServerMessage::Answer {
                answer,
                client_id: Some(client_id.unwrap_or_else(|| sender.client_id.clone())),
            },
        ),
        (Broadcaster, ClientMessage::IceCandidate { candidate, .. }) => Delivery::to(
            Audience::Role(Viewer),
            ServerMessage::IceCandidate {
                candidate,
                client_id: None,
            },
        ),
        (Viewer, ClientMessage::IceCandidate { candidate, client_id }) => Delivery::to(
            Audience::Role(Broadcaster),
            ServerMessage::IceCandidate {
                candidate,
                client_id: Some(client_id.unwrap_or_else(|| sender.client_id.clone())),
            },
        ),
        (_, ClientMessage::Chat { message, author, timestamp }) => Delivery::to(
            Audience::Everyone,
            ServerMessage::Chat {
                message,
                author,
                timestamp,
            },
        ),
        (_, ClientMessage::Reaction { reaction, timestamp }) => Delivery::to(
            Audience::Everyone,
            ServerMessage::Reaction { reaction, timestamp },
        ),
        _ => None,
    }
}
