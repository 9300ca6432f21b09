//! # studio-signal: signaling and session coordination for the live studio
//!
//! One broadcaster and any number of viewers share a room keyed by
//! `streamId`. Over a single WebSocket per client the gateway relays WebRTC
//! offers, answers and ICE candidates between roles, and carries the room's
//! chat and reactions.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐    WebSocket     ┌──────────────┐
//! │ SignalClient │ ◄──── JSON ────► │ SignalServer │
//! │ (per client) │                  │  (gateway)   │
//! └──────────────┘                  └──────┬───────┘
//!                                          │ one task per connection
//!                                          ▼
//!                                   ┌──────────────┐
//!                                   │   Session    │  Unjoined → Joined → Closed
//!                                   └──────┬───────┘
//!                                          │ routing::route
//!                                          ▼
//!                                   ┌──────────────┐
//!                                   │ RoomRegistry │  role-filtered fan-out
//!                                   └──────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`protocol`]: JSON wire messages (`ClientMessage`, `ServerMessage`)
//! - [`routing`]: the role-based routing table
//! - [`registry`]: rooms, membership and fan-out
//! - [`session`]: per-connection state machine
//! - [`server`]: WebSocket gateway
//! - [`client`]: WebSocket client
//! - [`config`]: environment-driven configuration
//! - [`error`]: error types

pub mod protocol;
pub mod error;
pub mod routing;
pub mod registry;
pub mod session;
pub mod server;
pub mod client;
pub mod config;

// Re-exports for convenience
pub use protocol::{ClientMessage, Role, ServerMessage};
pub use error::{ProtocolError, ServerError};
pub use routing::{route, Delivery};
pub use registry::{Audience, ConnectionId, Departure, FanOut, JoinOutcome, Member, RoomRegistry};
pub use session::{Handled, JoinedClient, Session, SessionState};
pub use server::{ServerStats, SignalServer};
pub use client::{ClientEvent, ConnectionState, SignalClient};
pub use config::ServerConfig;
