//! Session layer for the tycoon board game.
//!
//! A single room is owned by one dispatcher task ([`room::RoomState`]).
//! WebSocket connections ([`connection`]) translate frames into
//! [`protocol::Intent`]s and forward them to the room through a
//! [`RoomHandle`]; the room answers with [`protocol::Notification`]s pushed
//! to each client's outbound queue.

pub mod broadcast;
pub mod config;
pub mod connection;
pub mod error;
pub mod history;
pub mod protocol;
pub mod registry;
pub mod room;
pub mod server;

/// Identifier assigned to each admitted connection, increasing in join order.
pub type ConnectionId = usize;

pub use broadcast::ClientHandle;
pub use config::ServerConfig;
pub use error::{AdmissionError, DeliveryError, RoomError, ServerError};
pub use history::{ConnectionEvent, ConnectionEventKind, ConnectionHistory, ConnectionStatistics};
pub use protocol::{Intent, Notification, Outbound, Outcome, Unaffordable};
pub use registry::{RoomPhase, SessionRegistry};
pub use room::{ConnectionsReport, RoomHandle, RoomState, RoomStatus};
pub use server::TycoonServer;
