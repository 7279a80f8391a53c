//! Player and property entities.
//!
//! Properties carry the only mutable economic state on the board. Every
//! operation that touches an owner's cash takes the owner explicitly, checks
//! its preconditions first and leaves both sides untouched on failure.

use crate::catalog::{Board, PropertySpec};
use crate::error::GameError;
use crate::view::PlayerView;

/// Cash amounts. Signed because a balance may dip below zero mid-resolution.
pub type Money = i64;

/// Index of a player in the game's fixed turn order.
pub type PlayerIndex = usize;

/// Highest house count a property can reach.
pub const MAX_HOUSES: u8 = 3;

/// A participant in the game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    name: String,
    /// Current cash balance.
    pub cash: Money,
    pub(crate) position: usize,
    pub(crate) properties: Vec<usize>,
}

impl Player {
    pub fn new(name: impl Into<String>, cash: Money) -> Self {
        Self {
            name: name.into(),
            cash,
            position: 0,
            properties: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn position(&self) -> usize {
        self.position
    }

    /// Board positions of every property this player owns.
    pub fn property_positions(&self) -> &[usize] {
        &self.properties
    }

    /// A player stays in the turn rotation while they hold cash or land.
    pub fn is_active(&self) -> bool {
        self.cash > 0 || !self.properties.is_empty()
    }

    /// Owned properties, resolved against the board.
    pub fn owned<'a>(&'a self, board: &'a Board) -> impl Iterator<Item = &'a Property> + 'a {
        self.properties
            .iter()
            .filter_map(move |&position| board.property(position))
    }

    pub fn mortgageable<'a>(&'a self, board: &'a Board) -> impl Iterator<Item = &'a Property> + 'a {
        self.owned(board).filter(|property| !property.is_mortgaged())
    }

    pub fn redeemable<'a>(&'a self, board: &'a Board) -> impl Iterator<Item = &'a Property> + 'a {
        self.owned(board).filter(|property| property.is_mortgaged())
    }

    /// Cash plus the sale value of every unmortgaged property.
    ///
    /// Mortgaged land contributes nothing: it cannot be sold for value while
    /// encumbered.
    pub fn total_asset_value(&self, board: &Board) -> Money {
        self.cash
            + self
                .mortgageable(board)
                .map(Property::sale_value)
                .sum::<Money>()
    }

    /// Liquidity check only. Nothing is sold or mortgaged automatically.
    pub fn can_pay_debt(&self, board: &Board, amount: Money) -> bool {
        self.total_asset_value(board) >= amount
    }

    pub fn view(&self, board: &Board) -> PlayerView {
        PlayerView {
            name: self.name.clone(),
            cash: self.cash,
            position: self.position,
            properties: self.owned(board).map(|p| p.name().to_string()).collect(),
            total_asset_value: self.total_asset_value(board),
            mortgageable_properties: self
                .mortgageable(board)
                .map(|p| p.name().to_string())
                .collect(),
            redeemable_properties: self
                .redeemable(board)
                .map(|p| p.name().to_string())
                .collect(),
        }
    }
}

/// An ownable tile. The Start tile is a property with all-zero economics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    name: String,
    position: usize,
    cost: [Money; 4],
    rent: [Money; 4],
    mortgage_value: Money,
    sale_value: Money,
    owner: Option<PlayerIndex>,
    houses: u8,
    mortgaged: bool,
}

impl Property {
    pub fn new(name: impl Into<String>, position: usize, spec: &PropertySpec) -> Self {
        Self {
            name: name.into(),
            position,
            cost: spec.cost,
            rent: spec.rent,
            mortgage_value: spec.mortgage_value,
            sale_value: spec.sale_value,
            owner: None,
            houses: 0,
            mortgaged: false,
        }
    }

    /// The zero-economics Start tile.
    pub fn start(name: impl Into<String>, position: usize) -> Self {
        Self::new(name, position, &PropertySpec::default())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn cost_schedule(&self) -> &[Money; 4] {
        &self.cost
    }

    /// Purchase price (tier 0 cost).
    pub fn price(&self) -> Money {
        self.cost[0]
    }

    pub fn mortgage_value(&self) -> Money {
        self.mortgage_value
    }

    pub fn sale_value(&self) -> Money {
        self.sale_value
    }

    pub fn owner(&self) -> Option<PlayerIndex> {
        self.owner
    }

    pub fn houses(&self) -> u8 {
        self.houses
    }

    pub fn is_mortgaged(&self) -> bool {
        self.mortgaged
    }

    /// Only tiles with a positive price can be bought.
    pub fn is_purchasable(&self) -> bool {
        self.owner.is_none() && self.price() > 0
    }

    pub fn rent(&self) -> Money {
        if self.mortgaged {
            return 0;
        }
        self.rent[usize::from(self.houses)]
    }

    pub fn can_upgrade(&self) -> bool {
        self.owner.is_some() && self.houses < MAX_HOUSES && !self.mortgaged
    }

    /// Cost of the next house, if one can still be built.
    pub fn next_upgrade_cost(&self) -> Option<Money> {
        (self.houses < MAX_HOUSES).then(|| self.cost[usize::from(self.houses) + 1])
    }

    /// Builds one house, debiting the owner. Returns the new house count.
    pub fn upgrade(&mut self, owner: &mut Player) -> Result<u8, GameError> {
        let cost = match self.next_upgrade_cost() {
            Some(cost) if self.can_upgrade() => cost,
            _ => return Err(GameError::CannotUpgrade(self.name.clone())),
        };
        if owner.cash < cost {
            return Err(GameError::InsufficientFunds {
                needed: cost,
                available: owner.cash,
            });
        }
        owner.cash -= cost;
        self.houses += 1;
        Ok(self.houses)
    }

    /// Credits the owner the mortgage value. Houses are kept.
    pub fn mortgage(&mut self, owner: &mut Player) -> Result<Money, GameError> {
        if self.owner.is_none() {
            return Err(GameError::NotOwner {
                property: self.name.clone(),
                player: owner.name().to_string(),
            });
        }
        if self.mortgaged {
            return Err(GameError::AlreadyMortgaged(self.name.clone()));
        }
        owner.cash += self.mortgage_value;
        self.mortgaged = true;
        Ok(self.mortgage_value)
    }

    pub fn redeem(&mut self, owner: &mut Player) -> Result<Money, GameError> {
        if !self.mortgaged {
            return Err(GameError::NotMortgaged(self.name.clone()));
        }
        if owner.cash < self.mortgage_value {
            return Err(GameError::InsufficientFunds {
                needed: self.mortgage_value,
                available: owner.cash,
            });
        }
        owner.cash -= self.mortgage_value;
        self.mortgaged = false;
        Ok(self.mortgage_value)
    }

    /// Sells back to the bank for the sale value. Houses are forfeited
    /// without refund and the mortgage flag is cleared regardless.
    pub fn sell(&mut self, owner: &mut Player) -> Result<Money, GameError> {
        if self.owner.is_none() {
            return Err(GameError::NotOwner {
                property: self.name.clone(),
                player: owner.name().to_string(),
            });
        }
        owner.cash += self.sale_value;
        owner.properties.retain(|&position| position != self.position);
        self.release();
        Ok(self.sale_value)
    }

    pub(crate) fn assign(&mut self, owner: PlayerIndex) {
        self.owner = Some(owner);
    }

    /// Returns the property to the bank in pristine condition.
    pub(crate) fn release(&mut self) {
        self.owner = None;
        self.houses = 0;
        self.mortgaged = false;
    }
}
