//! Serializable projections of engine state.
//!
//! These are the shapes clients receive. They are computed on demand and
//! never fed back into the engine.

use crate::model::Money;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerView {
    pub name: String,
    pub cash: Money,
    pub position: usize,
    pub properties: Vec<String>,
    pub total_asset_value: Money,
    pub mortgageable_properties: Vec<String>,
    pub redeemable_properties: Vec<String>,
}

/// One tile as clients see it. Event tiles carry zeroed economics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TileView {
    pub name: String,
    pub cost: Vec<Money>,
    pub owner: Option<String>,
    pub houses: u8,
    pub max_houses: u8,
    pub is_mortgaged: bool,
    pub mortgage_value: Money,
    pub sell_value: Money,
}

/// Decision the active player must make before the turn can advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PendingKind {
    #[serde(rename = "prompt_buy")]
    Buy,
    #[serde(rename = "prompt_upgrade")]
    Upgrade,
}

impl fmt::Display for PendingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PendingKind::Buy => write!(f, "buy"),
            PendingKind::Upgrade => write!(f, "upgrade"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingAction {
    pub action: PendingKind,
    pub property: String,
    #[serde(skip)]
    pub position: usize,
}

/// Full game state, sent on game start and on reconnection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GameSnapshot {
    pub players: Vec<PlayerView>,
    pub properties: Vec<TileView>,
    pub current_player: String,
    pub has_rolled_this_turn: bool,
    pub pending_action: Option<PendingAction>,
    pub last_roll: u8,
    pub game_over: bool,
    pub winner: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MortgageOption {
    pub name: String,
    pub mortgage_value: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RedeemOption {
    pub name: String,
    pub redeem_cost: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SellOption {
    pub name: String,
    pub sell_value: Money,
}

/// What a player could do to raise or spend cash right now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FinancialOptions {
    pub player: String,
    pub money: Money,
    pub total_asset_value: Money,
    pub mortgageable_properties: Vec<MortgageOption>,
    pub redeemable_properties: Vec<RedeemOption>,
    pub sellable_properties: Vec<SellOption>,
}

/// Result of a bankruptcy check. `can_recover` distinguishes an advisory
/// from a forced liquidation that has already happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DebtSituation {
    pub player: String,
    pub debt: Money,
    pub can_recover: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub financial_options: Option<FinancialOptions>,
}

/// Outcome of one game intent, with the resulting state attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionReport {
    pub player: String,
    pub events: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dice_values: Option<[u8; 2]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dice_total: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub landed_on: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending: Option<PendingAction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debt_situation: Option<DebtSituation>,
    #[serde(flatten)]
    pub state: GameSnapshot,
}
