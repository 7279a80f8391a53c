//! # Tycoon Engine
//!
//! The authoritative rules engine for a turn-based property-trading board game.
//! It owns no sockets and performs no I/O: the session layer feeds it player
//! intents one at a time and broadcasts the reports it returns.
//!
//! ## Components
//!
//! * [`catalog`] - Static board layout, property economics and the [`Board`] built from them
//! * [`model`] - [`Player`] and [`Property`] entities with invariant-preserving operations
//! * [`cards`] - Chance and Fortune decks as data-driven [`CardEffect`]s
//! * [`game`] - The [`Game`] turn state machine: roll, buy, upgrade, free actions,
//!   bankruptcy and win detection
//! * [`view`] - Serializable projections consumed by clients
//!
//! ## Turn Flow
//!
//! 1. The active player rolls two dice and moves around the circular board
//! 2. The landed tile is resolved (purchase prompt, rent, upgrade prompt or event card)
//! 3. Any cash decrease is followed by a bankruptcy check
//! 4. The turn advances, skipping inactive players, unless a decision is pending
//!
//! Mortgage, redeem and sell are free actions that never advance the turn.

pub mod cards;
pub mod catalog;
pub mod error;
pub mod game;
pub mod model;
pub mod view;

pub use cards::{CardEffect, EventCard, EventKind};
pub use catalog::{Board, BoardCatalog, PropertySpec, Tile, TileSpec, TileSummary};
pub use error::GameError;
pub use game::{Game, GameRules, TurnPhase};
pub use model::{Money, Player, PlayerIndex, Property, MAX_HOUSES};
pub use view::{
    ActionReport, DebtSituation, FinancialOptions, GameSnapshot, MortgageOption, PendingAction,
    PendingKind, PlayerView, RedeemOption, SellOption, TileView,
};
