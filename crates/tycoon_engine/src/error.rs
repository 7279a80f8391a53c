//! Error types for the rules engine.

use crate::model::Money;
use crate::view::PendingKind;
use thiserror::Error;

/// Reasons an intent or game setup was refused.
///
/// Every variant is raised before any state is mutated, so a caller can
/// report the error and carry on with the game untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GameError {
    #[error("Game must have {min} to {max} players, got {count}")]
    InvalidPlayerCount { count: usize, min: usize, max: usize },
    #[error("Duplicate player name: {0}")]
    DuplicatePlayer(String),
    #[error("Invalid board: {0}")]
    InvalidBoard(String),
    #[error("Player not found: {0}")]
    UnknownPlayer(String),
    #[error("It is not {0}'s turn")]
    NotYourTurn(String),
    #[error("Dice already rolled this turn, finish the current action or end the turn")]
    AlreadyRolled,
    #[error("Dice values must be between 1 and 6, got {0:?}")]
    InvalidDice([u8; 2]),
    #[error("No pending {0} decision")]
    NoPendingDecision(PendingKind),
    #[error("Property not found: {0}")]
    UnknownProperty(String),
    #[error("{property} is not owned by {player}")]
    NotOwner { property: String, player: String },
    #[error("{0} cannot be upgraded")]
    CannotUpgrade(String),
    #[error("{0} is already mortgaged")]
    AlreadyMortgaged(String),
    #[error("{0} is not mortgaged")]
    NotMortgaged(String),
    #[error("Insufficient funds: need ${needed}, have ${available}")]
    InsufficientFunds { needed: Money, available: Money },
    #[error("The game is over")]
    GameOver,
}

impl GameError {
    /// True for failures caused by a lack of cash rather than an illegal intent.
    pub fn is_insufficient_funds(&self) -> bool {
        matches!(self, GameError::InsufficientFunds { .. })
    }
}
