//! The turn state machine.
//!
//! A [`Game`] owns the players, the board and the random source. Every
//! public operation either returns an error without touching state or
//! applies its full effect and returns an [`ActionReport`].

use crate::cards::{CardEffect, EventKind};
use crate::catalog::{Board, BoardCatalog, Tile};
use crate::error::GameError;
use crate::model::{Money, Player, PlayerIndex, Property, MAX_HOUSES};
use crate::view::{
    ActionReport, DebtSituation, FinancialOptions, GameSnapshot, MortgageOption, PendingAction,
    PendingKind, RedeemOption, SellOption, TileView,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info};

/// Tunable parameters for a new game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameRules {
    pub starting_cash: Money,
    pub min_players: usize,
    pub max_players: usize,
}

impl Default for GameRules {
    fn default() -> Self {
        Self {
            starting_cash: 1500,
            min_players: 2,
            max_players: 6,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnPhase {
    AwaitingRoll,
    AwaitingBuyDecision,
    AwaitingUpgradeDecision,
    GameOver,
}

enum Landing {
    Property(usize),
    Event(EventKind),
}

/// Accumulates the parts of a report while an intent is applied.
struct ReportDraft {
    player: String,
    events: Vec<String>,
    dice: Option<[u8; 2]>,
    landed_on: Option<String>,
    pending: Option<PendingAction>,
    debt_situation: Option<DebtSituation>,
}

impl ReportDraft {
    fn new(player: &str) -> Self {
        Self {
            player: player.to_string(),
            events: Vec::new(),
            dice: None,
            landed_on: None,
            pending: None,
            debt_situation: None,
        }
    }

    fn event(&mut self, event: impl Into<String>) {
        self.events.push(event.into());
    }

    fn finish(self, game: &Game) -> ActionReport {
        ActionReport {
            player: self.player,
            events: self.events,
            dice_values: self.dice,
            dice_total: self.dice.map(|[a, b]| a + b),
            landed_on: self.landed_on,
            pending: self.pending,
            debt_situation: self.debt_situation,
            state: game.state(),
        }
    }
}

/// One game in progress.
#[derive(Debug, Clone)]
pub struct Game {
    players: Vec<Player>,
    board: Board,
    current: PlayerIndex,
    last_roll: u8,
    pending: Option<PendingAction>,
    has_rolled: bool,
    rng: StdRng,
}

impl Game {
    /// Starts a game on the standard board with default rules.
    pub fn new<S: AsRef<str>>(names: &[S]) -> Result<Self, GameError> {
        let board = BoardCatalog::standard().build()?;
        Self::with_options(names, &GameRules::default(), board, StdRng::from_entropy())
    }

    /// Starts a game with explicit rules, board and random source.
    ///
    /// Turn order follows `names`.
    pub fn with_options<S: AsRef<str>>(
        names: &[S],
        rules: &GameRules,
        board: Board,
        rng: StdRng,
    ) -> Result<Self, GameError> {
        if names.len() < rules.min_players || names.len() > rules.max_players {
            return Err(GameError::InvalidPlayerCount {
                count: names.len(),
                min: rules.min_players,
                max: rules.max_players,
            });
        }

        let mut seen = HashSet::new();
        for name in names {
            if !seen.insert(name.as_ref()) {
                return Err(GameError::DuplicatePlayer(name.as_ref().to_string()));
            }
        }

        let players = names
            .iter()
            .map(|name| Player::new(name.as_ref(), rules.starting_cash))
            .collect();

        info!("🎲 New game with {} players on a {}-tile board", names.len(), board.size());
        Ok(Self {
            players,
            board,
            current: 0,
            last_roll: 0,
            pending: None,
            has_rolled: false,
            rng,
        })
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn player(&self, name: &str) -> Option<&Player> {
        self.players.iter().find(|player| player.name() == name)
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn current_player(&self) -> &Player {
        &self.players[self.current]
    }

    pub fn has_rolled_this_turn(&self) -> bool {
        self.has_rolled
    }

    pub fn pending_action(&self) -> Option<&PendingAction> {
        self.pending.as_ref()
    }

    pub fn phase(&self) -> TurnPhase {
        if self.is_game_over() {
            return TurnPhase::GameOver;
        }
        match self.pending.as_ref().map(|pending| pending.action) {
            Some(PendingKind::Buy) => TurnPhase::AwaitingBuyDecision,
            Some(PendingKind::Upgrade) => TurnPhase::AwaitingUpgradeDecision,
            None => TurnPhase::AwaitingRoll,
        }
    }

    /// At most one player still holds cash or land.
    pub fn is_game_over(&self) -> bool {
        self.players.iter().filter(|player| player.is_active()).count() <= 1
    }

    /// The winner once the game is over: the last active player, or the
    /// richest by total asset value with ties going to turn order.
    pub fn winner(&self) -> Option<&Player> {
        if !self.is_game_over() {
            return None;
        }
        let mut active = self.players.iter().filter(|player| player.is_active());
        if let (Some(sole), None) = (active.next(), active.next()) {
            return Some(sole);
        }

        let mut best: Option<(&Player, Money)> = None;
        for player in &self.players {
            let value = player.total_asset_value(&self.board);
            if best.map_or(true, |(_, top)| value > top) {
                best = Some((player, value));
            }
        }
        best.map(|(player, _)| player)
    }

    /// Rolls two dice for the active player and resolves the landing.
    pub fn roll(&mut self, name: &str) -> Result<ActionReport, GameError> {
        self.authorize_roll(name)?;
        let dice = [self.rng.gen_range(1..=6), self.rng.gen_range(1..=6)];
        self.roll_with(name, dice)
    }

    /// Same as [`Game::roll`] with the dice supplied by the caller.
    pub fn roll_with(&mut self, name: &str, dice: [u8; 2]) -> Result<ActionReport, GameError> {
        if dice.iter().any(|die| !(1..=6).contains(die)) {
            return Err(GameError::InvalidDice(dice));
        }
        let index = self.authorize_roll(name)?;

        let total = dice[0] + dice[1];
        self.has_rolled = true;
        self.last_roll = total;

        let mut draft = ReportDraft::new(name);
        draft.dice = Some(dice);

        let tile = self
            .board
            .move_player(&mut self.players[index], usize::from(total));
        draft.landed_on = Some(tile.name().to_string());
        let landing = match tile {
            Tile::Property(property) => Landing::Property(property.position()),
            Tile::Event(kind) => Landing::Event(*kind),
        };
        debug!("{} rolled {:?} and landed on {}", name, dice, tile.name());

        match landing {
            Landing::Property(position) => self.resolve_property(index, position, &mut draft),
            Landing::Event(kind) => {
                let card = kind.draw(&mut self.rng);
                draft.event(format!("{}: {}", kind.label(), card.description));
                self.apply_card(index, card.effect, &mut draft);
                if card.effect.is_debit() {
                    self.check_bankrupt(index, &mut draft);
                }
                self.next_player();
            }
        }

        Ok(draft.finish(self))
    }

    fn resolve_property(&mut self, index: PlayerIndex, position: usize, draft: &mut ReportDraft) {
        let Some(property) = self.board.property(position) else {
            self.next_player();
            return;
        };

        match property.owner() {
            None if property.is_purchasable() => {
                let pending = PendingAction {
                    action: PendingKind::Buy,
                    property: property.name().to_string(),
                    position,
                };
                draft.pending = Some(pending.clone());
                self.pending = Some(pending);
            }
            None => self.next_player(),
            Some(owner) if owner != index => {
                if property.is_mortgaged() {
                    draft.event(format!("{} is mortgaged, no rent charged", property.name()));
                } else {
                    let rent = property.rent();
                    self.players[index].cash -= rent;
                    self.players[owner].cash += rent;
                    draft.event(format!(
                        "{} paid ${} rent to {}",
                        self.players[index].name(),
                        rent,
                        self.players[owner].name()
                    ));
                    self.check_bankrupt(index, draft);
                }
                self.next_player();
            }
            Some(_) if property.can_upgrade() => {
                let pending = PendingAction {
                    action: PendingKind::Upgrade,
                    property: property.name().to_string(),
                    position,
                };
                draft.pending = Some(pending.clone());
                self.pending = Some(pending);
            }
            Some(_) => self.next_player(),
        }
    }

    fn apply_card(&mut self, index: PlayerIndex, effect: CardEffect, draft: &mut ReportDraft) {
        match effect {
            CardEffect::Collect(amount) => self.players[index].cash += amount,
            CardEffect::Pay(amount) => debit_floored(&mut self.players[index], amount),
            CardEffect::AdvanceToStart { bonus } => {
                let steps = self.board.size() - self.players[index].position();
                self.board.move_player(&mut self.players[index], steps);
                self.players[index].cash += bonus;
            }
            CardEffect::AdvanceToNearestRailroad => {
                let from = self.players[index].position();
                if let Some(railroad) = self.board.nearest_railroad(from) {
                    let steps = (railroad + self.board.size() - from) % self.board.size();
                    let tile = self.board.move_player(&mut self.players[index], steps);
                    draft.event(format!("{} moved to {}", self.players[index].name(), tile.name()));
                }
            }
            CardEffect::BuildingRepairs { per_house } => {
                let houses: Money = self.players[index]
                    .owned(&self.board)
                    .map(|property| Money::from(property.houses()))
                    .sum();
                debit_floored(&mut self.players[index], houses * per_house);
            }
            CardEffect::PayEachPlayer(amount) => {
                let payees: Vec<PlayerIndex> = (0..self.players.len())
                    .filter(|&other| other != index && self.players[other].is_active())
                    .collect();
                for &payee in &payees {
                    self.players[payee].cash += amount;
                }
                self.players[index].cash -= amount * payees.len() as Money;
            }
        }
    }

    /// Resolves a negative balance into either an advisory or a forced
    /// liquidation.
    fn check_bankrupt(&mut self, index: PlayerIndex, draft: &mut ReportDraft) {
        let cash = self.players[index].cash;
        if cash >= 0 {
            return;
        }
        let debt = -cash;
        let name = self.players[index].name().to_string();

        if self.players[index].can_pay_debt(&self.board, debt) {
            draft.event(format!(
                "{} has insufficient funds (${}), needs to mortgage/sell properties",
                name, cash
            ));
            draft.debt_situation = Some(DebtSituation {
                player: name,
                debt,
                can_recover: true,
                financial_options: Some(self.options_for(index)),
            });
            return;
        }

        for position in std::mem::take(&mut self.players[index].properties) {
            if let Some(property) = self.board.property_mut(position) {
                property.release();
            }
        }
        self.players[index].cash = 0;
        info!("💸 {} went bankrupt owing ${}", name, debt);
        draft.event(format!("{} has gone bankrupt!", name));
        draft.debt_situation = Some(DebtSituation {
            player: name,
            debt,
            can_recover: false,
            financial_options: None,
        });
    }

    /// Advances to the next active player, bounded by one lap.
    fn next_player(&mut self) {
        self.pending = None;
        self.has_rolled = false;
        for _ in 0..self.players.len() {
            self.current = (self.current + 1) % self.players.len();
            if self.players[self.current].is_active() {
                break;
            }
        }
        if self.is_game_over() {
            if let Some(winner) = self.winner() {
                info!("🏆 Game over, winner: {}", winner.name());
            }
        }
    }

    pub fn buy_property(&mut self, name: &str) -> Result<ActionReport, GameError> {
        let index = self.authorize_turn(name)?;
        let position = self.pending_position(PendingKind::Buy)?;
        let property = self
            .board
            .property(position)
            .filter(|property| property.is_purchasable())
            .ok_or(GameError::NoPendingDecision(PendingKind::Buy))?;

        let price = property.price();
        let available = self.players[index].cash;
        if available < price {
            return Err(GameError::InsufficientFunds { needed: price, available });
        }

        let mut draft = ReportDraft::new(name);
        draft.event(format!("{} bought {} for ${}", name, property.name(), price));
        self.players[index].cash -= price;
        self.players[index].properties.push(position);
        if let Some(property) = self.board.property_mut(position) {
            property.assign(index);
        }
        self.next_player();
        Ok(draft.finish(self))
    }

    pub fn upgrade_property(&mut self, name: &str) -> Result<ActionReport, GameError> {
        let index = self.authorize_turn(name)?;
        let position = self.pending_position(PendingKind::Upgrade)?;
        let property = self
            .board
            .property_mut(position)
            .ok_or(GameError::NoPendingDecision(PendingKind::Upgrade))?;

        let houses = property.upgrade(&mut self.players[index])?;
        let mut draft = ReportDraft::new(name);
        draft.event(format!("{} upgraded {} to {} houses", name, property.name(), houses));
        self.next_player();
        Ok(draft.finish(self))
    }

    pub fn mortgage_property(
        &mut self,
        name: &str,
        property_name: &str,
    ) -> Result<ActionReport, GameError> {
        let (index, position) = self.authorize_free_action(name, property_name)?;
        let value = property_at(&mut self.board, position)?.mortgage(&mut self.players[index])?;

        let mut draft = ReportDraft::new(name);
        draft.event(format!("{} mortgaged {} for ${}", name, property_name, value));
        Ok(draft.finish(self))
    }

    pub fn redeem_property(
        &mut self,
        name: &str,
        property_name: &str,
    ) -> Result<ActionReport, GameError> {
        let (index, position) = self.authorize_free_action(name, property_name)?;
        let cost = property_at(&mut self.board, position)?.redeem(&mut self.players[index])?;

        let mut draft = ReportDraft::new(name);
        draft.event(format!("{} redeemed {} for ${}", name, property_name, cost));
        Ok(draft.finish(self))
    }

    pub fn sell_property(
        &mut self,
        name: &str,
        property_name: &str,
    ) -> Result<ActionReport, GameError> {
        let (index, position) = self.authorize_free_action(name, property_name)?;
        let value = property_at(&mut self.board, position)?.sell(&mut self.players[index])?;

        let mut draft = ReportDraft::new(name);
        draft.event(format!("{} sold {} for ${}", name, property_name, value));
        Ok(draft.finish(self))
    }

    /// Ends the active player's turn, discarding any pending decision.
    pub fn end_turn(&mut self, name: &str) -> Result<ActionReport, GameError> {
        self.authorize_turn(name)?;
        let mut draft = ReportDraft::new(name);
        draft.event(format!("{} ended their turn", name));
        self.next_player();
        Ok(draft.finish(self))
    }

    pub fn financial_options(&self, name: &str) -> Result<FinancialOptions, GameError> {
        let index = self.index_of(name)?;
        Ok(self.options_for(index))
    }

    pub fn state(&self) -> GameSnapshot {
        let game_over = self.is_game_over();
        GameSnapshot {
            players: self
                .players
                .iter()
                .map(|player| player.view(&self.board))
                .collect(),
            properties: self.board.tiles().iter().map(|tile| self.tile_view(tile)).collect(),
            current_player: self.current_player().name().to_string(),
            has_rolled_this_turn: self.has_rolled,
            pending_action: self.pending.clone(),
            last_roll: self.last_roll,
            game_over,
            winner: self.winner().map(|player| player.name().to_string()),
        }
    }

    fn tile_view(&self, tile: &Tile) -> TileView {
        match tile {
            Tile::Property(property) => TileView {
                name: property.name().to_string(),
                cost: property.cost_schedule().to_vec(),
                owner: property
                    .owner()
                    .map(|owner| self.players[owner].name().to_string()),
                houses: property.houses(),
                max_houses: MAX_HOUSES,
                is_mortgaged: property.is_mortgaged(),
                mortgage_value: property.mortgage_value(),
                sell_value: property.sale_value(),
            },
            Tile::Event(kind) => TileView {
                name: kind.label().to_string(),
                cost: vec![0],
                owner: None,
                houses: 0,
                max_houses: 0,
                is_mortgaged: false,
                mortgage_value: 0,
                sell_value: 0,
            },
        }
    }

    fn options_for(&self, index: PlayerIndex) -> FinancialOptions {
        let player = &self.players[index];
        FinancialOptions {
            player: player.name().to_string(),
            money: player.cash,
            total_asset_value: player.total_asset_value(&self.board),
            mortgageable_properties: player
                .mortgageable(&self.board)
                .map(|property| MortgageOption {
                    name: property.name().to_string(),
                    mortgage_value: property.mortgage_value(),
                })
                .collect(),
            redeemable_properties: player
                .redeemable(&self.board)
                .map(|property| RedeemOption {
                    name: property.name().to_string(),
                    redeem_cost: property.mortgage_value(),
                })
                .collect(),
            sellable_properties: player
                .owned(&self.board)
                .map(|property| SellOption {
                    name: property.name().to_string(),
                    sell_value: property.sale_value(),
                })
                .collect(),
        }
    }

    fn index_of(&self, name: &str) -> Result<PlayerIndex, GameError> {
        self.players
            .iter()
            .position(|player| player.name() == name)
            .ok_or_else(|| GameError::UnknownPlayer(name.to_string()))
    }

    fn authorize_turn(&self, name: &str) -> Result<PlayerIndex, GameError> {
        if self.is_game_over() {
            return Err(GameError::GameOver);
        }
        let index = self.index_of(name)?;
        if index != self.current {
            return Err(GameError::NotYourTurn(name.to_string()));
        }
        Ok(index)
    }

    fn authorize_roll(&self, name: &str) -> Result<PlayerIndex, GameError> {
        let index = self.authorize_turn(name)?;
        if self.has_rolled {
            return Err(GameError::AlreadyRolled);
        }
        Ok(index)
    }

    /// Free actions belong to the active player, or to anyone settling a
    /// negative balance.
    fn authorize_free_action(
        &self,
        name: &str,
        property_name: &str,
    ) -> Result<(PlayerIndex, usize), GameError> {
        if self.is_game_over() {
            return Err(GameError::GameOver);
        }
        let index = self.index_of(name)?;
        if index != self.current && self.players[index].cash >= 0 {
            return Err(GameError::NotYourTurn(name.to_string()));
        }
        let position = self
            .board
            .find_property(property_name)
            .ok_or_else(|| GameError::UnknownProperty(property_name.to_string()))?;
        if !self.players[index].properties.contains(&position) {
            return Err(GameError::NotOwner {
                property: property_name.to_string(),
                player: name.to_string(),
            });
        }
        Ok((index, position))
    }

    fn pending_position(&self, kind: PendingKind) -> Result<usize, GameError> {
        match &self.pending {
            Some(pending) if pending.action == kind => Ok(pending.position),
            _ => Err(GameError::NoPendingDecision(kind)),
        }
    }
}

fn property_at(board: &mut Board, position: usize) -> Result<&mut Property, GameError> {
    board
        .property_mut(position)
        .ok_or_else(|| GameError::UnknownProperty(position.to_string()))
}

/// Debits without pushing the balance below zero, or below an existing debt.
fn debit_floored(player: &mut Player, amount: Money) {
    let floor = player.cash.min(0);
    player.cash = (player.cash - amount).max(floor);
}
