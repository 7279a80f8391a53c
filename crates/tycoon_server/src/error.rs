//! Error types for the session layer.

use crate::protocol::{CLOSE_ADDRESS_LIMIT, CLOSE_DUPLICATE_NAME, CLOSE_ROOM_CLOSED};
use thiserror::Error;

/// Reasons a connection is refused before it is bound to a player.
///
/// Admission errors are raised before any registry mutation. The transport
/// closes the socket with [`AdmissionError::close_code`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AdmissionError {
    #[error("Game already in progress, {0} is not a player in it")]
    RoomClosed(String),
    #[error("Address {address} already has {limit} live connection(s)")]
    AddressLimit { address: String, limit: usize },
    #[error("Player name already taken: {0}")]
    DuplicateName(String),
}

impl AdmissionError {
    pub fn close_code(&self) -> u16 {
        match self {
            AdmissionError::RoomClosed(_) => CLOSE_ROOM_CLOSED,
            AdmissionError::AddressLimit { .. } => CLOSE_ADDRESS_LIMIT,
            AdmissionError::DuplicateName(_) => CLOSE_DUPLICATE_NAME,
        }
    }
}

/// Refusals of non-game room requests. Reported to the requester only.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RoomError {
    #[error("Only the host can start the game")]
    NotHost,
    #[error("The game has already started")]
    AlreadyStarted,
    #[error("The game has not started yet")]
    NotStarted,
    #[error("Invalid color choice: {0}")]
    UnknownColor(String),
    #[error("Color {0} is already taken by another player")]
    ColorTaken(String),
}

/// A send to a connection whose writer has gone away.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Connection closed")]
pub struct DeliveryError;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Admission refused: {0}")]
    Admission(#[from] AdmissionError),
    #[error("Room dispatcher has stopped")]
    RoomStopped,
    #[error("Internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admission_close_codes() {
        assert_eq!(AdmissionError::RoomClosed("Z".into()).close_code(), 4003);
        let limit = AdmissionError::AddressLimit { address: "10.0.0.1".into(), limit: 1 };
        assert_eq!(limit.close_code(), 4001);
        assert_eq!(AdmissionError::DuplicateName("A".into()).close_code(), 4002);
    }
}
