//! JSON wire protocol.
//!
//! Clients send [`Intent`]s tagged by `action`; the server answers with
//! [`Notification`]s tagged by `type`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tycoon_engine::{ActionReport, FinancialOptions, GameSnapshot, TileSummary};

pub const CLOSE_NORMAL: u16 = 1000;
pub const CLOSE_GOING_AWAY: u16 = 1001;
pub const CLOSE_ADDRESS_LIMIT: u16 = 4001;
pub const CLOSE_DUPLICATE_NAME: u16 = 4002;
pub const CLOSE_ROOM_CLOSED: u16 = 4003;
pub const CLOSE_KICKED: u16 = 4003;
pub const CLOSE_ROOM_RESET: u16 = 4004;

/// Something a player asks the room to do.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Intent {
    #[serde(alias = "roll_dice")]
    Roll,
    BuyProperty,
    UpgradeProperty,
    MortgageProperty { property_name: String },
    RedeemProperty { property_name: String },
    SellProperty { property_name: String },
    GetFinancialOptions,
    EndTurn,
    StartGame,
    ChooseColor { color: String },
    LeaveRoom,
    Ping,
}

impl Intent {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Wire name of the action, echoed back in error notifications.
    pub fn action(&self) -> &'static str {
        match self {
            Intent::Roll => "roll",
            Intent::BuyProperty => "buy_property",
            Intent::UpgradeProperty => "upgrade_property",
            Intent::MortgageProperty { .. } => "mortgage_property",
            Intent::RedeemProperty { .. } => "redeem_property",
            Intent::SellProperty { .. } => "sell_property",
            Intent::GetFinancialOptions => "get_financial_options",
            Intent::EndTurn => "end_turn",
            Intent::StartGame => "start_game",
            Intent::ChooseColor { .. } => "choose_color",
            Intent::LeaveRoom => "leave_room",
            Intent::Ping => "ping",
        }
    }
}

/// Result of a paid operation (buy, upgrade, redeem).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Outcome {
    Applied(ActionReport),
    Unaffordable(Unaffordable),
}

/// A paid operation refused for lack of cash. Nothing was debited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Unaffordable {
    pub success: bool,
    pub player: String,
    pub message: String,
}

/// Something the room tells one or all players.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    GameStarted {
        #[serde(flatten)]
        state: GameSnapshot,
        host: Option<String>,
        player_colors: BTreeMap<String, String>,
        board: Vec<TileSummary>,
    },
    TurnResult {
        #[serde(flatten)]
        report: ActionReport,
    },
    BuyResult {
        #[serde(flatten)]
        outcome: Outcome,
    },
    UpgradeResult {
        #[serde(flatten)]
        outcome: Outcome,
    },
    MortgageResult {
        #[serde(flatten)]
        report: ActionReport,
    },
    RedeemResult {
        #[serde(flatten)]
        outcome: Outcome,
    },
    SellResult {
        #[serde(flatten)]
        report: ActionReport,
    },
    FinancialOptions {
        #[serde(flatten)]
        options: FinancialOptions,
    },
    TurnEnded {
        #[serde(flatten)]
        report: ActionReport,
    },
    PlayerList {
        players: Vec<String>,
        host: Option<String>,
        player_colors: BTreeMap<String, String>,
        available_colors: Vec<String>,
    },
    PlayerLeft {
        player: String,
        remaining_players: Vec<String>,
        new_host: Option<String>,
        disconnect_reason: String,
    },
    GameReconnect {
        #[serde(flatten)]
        state: GameSnapshot,
        host: Option<String>,
        player_colors: BTreeMap<String, String>,
        board: Vec<TileSummary>,
        message: String,
    },
    ColorSelected {
        player: String,
        color: String,
    },
    Error {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        action: Option<String>,
    },
    Ping,
    Pong,
}

impl Notification {
    pub fn error(message: impl Into<String>, action: Option<&str>) -> Self {
        Notification::Error {
            message: message.into(),
            action: action.map(str::to_string),
        }
    }

    /// The failed-operation result for `action`, if it is a paid operation.
    pub fn unaffordable(action: &str, player: &str, message: impl Into<String>) -> Option<Self> {
        let outcome = Outcome::Unaffordable(Unaffordable {
            success: false,
            player: player.to_string(),
            message: message.into(),
        });
        match action {
            "buy_property" => Some(Notification::BuyResult { outcome }),
            "upgrade_property" => Some(Notification::UpgradeResult { outcome }),
            "redeem_property" => Some(Notification::RedeemResult { outcome }),
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Notification::GameStarted { .. } => "game_started",
            Notification::TurnResult { .. } => "turn_result",
            Notification::BuyResult { .. } => "buy_result",
            Notification::UpgradeResult { .. } => "upgrade_result",
            Notification::MortgageResult { .. } => "mortgage_result",
            Notification::RedeemResult { .. } => "redeem_result",
            Notification::SellResult { .. } => "sell_result",
            Notification::FinancialOptions { .. } => "financial_options",
            Notification::TurnEnded { .. } => "turn_ended",
            Notification::PlayerList { .. } => "player_list",
            Notification::PlayerLeft { .. } => "player_left",
            Notification::GameReconnect { .. } => "game_reconnect",
            Notification::ColorSelected { .. } => "color_selected",
            Notification::Error { .. } => "error",
            Notification::Ping => "ping",
            Notification::Pong => "pong",
        }
    }

    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Frames queued for a connection's writer task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Text(String),
    Close { code: u16, reason: String },
}
