//! Board catalog: the static layout and property economics, and the
//! [`Board`] instance built from them.
//!
//! The catalog is plain data. A [`Board`] is the mutable per-game copy that
//! tracks ownership, houses and mortgages.

use crate::cards::EventKind;
use crate::error::GameError;
use crate::model::{Money, Player, Property};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Name of the Start tile on the standard board.
pub const START_TILE: &str = "Start";

/// Positions the "nearest railroad" card can send a player to.
pub const RAILROAD_POSITIONS: [usize; 5] = [4, 5, 12, 20, 26];

/// Economics of one purchasable property.
///
/// `cost[0]` is the purchase price and `cost[n]` the price of the n-th house.
/// `rent[n]` is the rent charged with n houses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertySpec {
    pub cost: [Money; 4],
    pub rent: [Money; 4],
    pub mortgage_value: Money,
    pub sale_value: Money,
}

/// One entry of a board layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum TileSpec {
    Start,
    Property(String),
    Event(EventKind),
}

/// Static description of a board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardCatalog {
    /// Tiles in board order. Position 0 is where every player begins.
    pub layout: Vec<TileSpec>,
    /// Economics keyed by property name.
    pub economics: BTreeMap<String, PropertySpec>,
    /// Railroad-like positions targeted by the nearest-railroad card.
    pub railroad_positions: Vec<usize>,
}

/// Presentation summary of one tile, for clients that draw the board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TileSummary {
    pub name: String,
    pub price: Money,
    pub special: bool,
}

impl BoardCatalog {
    /// The 28-tile standard board.
    pub fn standard() -> Self {
        let economics = (1..=34)
            .map(|n: Money| {
                let spec = PropertySpec {
                    cost: [n, n + 1, n + 2, n + 3],
                    rent: [n, n + 1, n + 2, n + 3],
                    mortgage_value: 1,
                    sale_value: 2,
                };
                (format!("country{n}"), spec)
            })
            .collect();

        let country = |n: u32| TileSpec::Property(format!("country{n}"));
        let mut layout = vec![TileSpec::Start];
        layout.extend((1..=4).map(country));
        layout.push(TileSpec::Event(EventKind::Chance));
        layout.push(country(5));
        layout.push(TileSpec::Event(EventKind::Fortune));
        layout.extend((6..=8).map(country));
        layout.push(TileSpec::Event(EventKind::Chance));
        layout.extend((9..=23).map(country));
        layout.push(TileSpec::Event(EventKind::Fortune));

        Self {
            layout,
            economics,
            railroad_positions: RAILROAD_POSITIONS.to_vec(),
        }
    }

    /// Builds a fresh board with every property owned by the bank.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::InvalidBoard`] if the layout is empty or names a
    /// property missing from the economics table.
    pub fn build(&self) -> Result<Board, GameError> {
        if self.layout.is_empty() {
            return Err(GameError::InvalidBoard("layout has no tiles".to_string()));
        }

        let tiles = self
            .layout
            .iter()
            .enumerate()
            .map(|(position, spec)| match spec {
                TileSpec::Start => Ok(Tile::Property(Property::start(START_TILE, position))),
                TileSpec::Event(kind) => Ok(Tile::Event(*kind)),
                TileSpec::Property(name) => self
                    .economics
                    .get(name)
                    .map(|economics| Tile::Property(Property::new(name, position, economics)))
                    .ok_or_else(|| {
                        GameError::InvalidBoard(format!("no economics entry for {name}"))
                    }),
            })
            .collect::<Result<Vec<_>, _>>()?;

        let railroad_positions = self
            .railroad_positions
            .iter()
            .copied()
            .filter(|&position| position < tiles.len())
            .collect();

        Ok(Board {
            tiles,
            railroad_positions,
        })
    }

    /// Read-only projection of the layout for board rendering.
    pub fn board_layout(&self) -> Vec<TileSummary> {
        self.layout
            .iter()
            .map(|spec| match spec {
                TileSpec::Start => TileSummary {
                    name: START_TILE.to_string(),
                    price: 0,
                    special: true,
                },
                TileSpec::Event(kind) => TileSummary {
                    name: kind.label().to_string(),
                    price: 0,
                    special: false,
                },
                TileSpec::Property(name) => TileSummary {
                    name: name.clone(),
                    price: self.economics.get(name).map_or(0, |spec| spec.cost[0]),
                    special: false,
                },
            })
            .collect()
    }
}

impl Default for BoardCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

/// A board tile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tile {
    Property(Property),
    Event(EventKind),
}

impl Tile {
    pub fn name(&self) -> &str {
        match self {
            Tile::Property(property) => property.name(),
            Tile::Event(kind) => kind.label(),
        }
    }
}

/// The circular board of one game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    tiles: Vec<Tile>,
    railroad_positions: Vec<usize>,
}

impl Board {
    pub fn size(&self) -> usize {
        self.tiles.len()
    }

    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    pub fn tile(&self, position: usize) -> &Tile {
        &self.tiles[position % self.tiles.len()]
    }

    pub fn property(&self, position: usize) -> Option<&Property> {
        match self.tiles.get(position) {
            Some(Tile::Property(property)) => Some(property),
            _ => None,
        }
    }

    pub(crate) fn property_mut(&mut self, position: usize) -> Option<&mut Property> {
        match self.tiles.get_mut(position) {
            Some(Tile::Property(property)) => Some(property),
            _ => None,
        }
    }

    /// Position of the property with the given name.
    pub fn find_property(&self, name: &str) -> Option<usize> {
        self.tiles.iter().position(|tile| match tile {
            Tile::Property(property) => property.name() == name,
            Tile::Event(_) => false,
        })
    }

    /// Advances the player by `steps`, wrapping around the board, and
    /// returns the tile they land on. This is the only place a player's
    /// position changes through movement.
    pub fn move_player(&self, player: &mut Player, steps: usize) -> &Tile {
        player.position = (player.position + steps) % self.tiles.len();
        &self.tiles[player.position]
    }

    /// Nearest railroad position reachable by moving forward from `from`.
    /// Ties go to the railroad listed first.
    pub fn nearest_railroad(&self, from: usize) -> Option<usize> {
        let size = self.tiles.len();
        let mut nearest: Option<(usize, usize)> = None;
        for &railroad in &self.railroad_positions {
            let distance = (railroad + size - from % size) % size;
            if nearest.map_or(true, |(best, _)| distance < best) {
                nearest = Some((distance, railroad));
            }
        }
        nearest.map(|(_, railroad)| railroad)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_board_layout() {
        let board = BoardCatalog::standard().build().unwrap();
        assert_eq!(board.size(), 28);
        assert_eq!(board.tile(0).name(), START_TILE);
        assert_eq!(board.tile(1).name(), "country1");
        assert_eq!(board.tile(5), &Tile::Event(EventKind::Chance));
        assert_eq!(board.tile(7), &Tile::Event(EventKind::Fortune));
        assert_eq!(board.tile(11), &Tile::Event(EventKind::Chance));
        assert_eq!(board.tile(26).name(), "country23");
        assert_eq!(board.tile(27), &Tile::Event(EventKind::Fortune));

        let country9 = board.property(12).unwrap();
        assert_eq!(country9.name(), "country9");
        assert_eq!(country9.cost_schedule(), &[9, 10, 11, 12]);
        assert_eq!(country9.mortgage_value(), 1);
        assert_eq!(country9.sale_value(), 2);
    }

    #[test]
    fn test_start_is_not_purchasable() {
        let board = BoardCatalog::standard().build().unwrap();
        let start = board.property(0).unwrap();
        assert!(!start.is_purchasable());
        assert_eq!(start.rent(), 0);
        assert!(board.property(1).unwrap().is_purchasable());
    }

    #[test]
    fn test_move_wraps_around() {
        let board = BoardCatalog::standard().build().unwrap();
        let mut player = Player::new("A", 1500);
        assert_eq!(board.move_player(&mut player, 3).name(), "country3");
        assert_eq!(board.move_player(&mut player, 26).name(), "country1");
        assert_eq!(player.position(), 1);
    }

    #[test]
    fn test_nearest_railroad_wraps_forward() {
        let board = BoardCatalog::standard().build().unwrap();
        assert_eq!(board.nearest_railroad(0), Some(4));
        assert_eq!(board.nearest_railroad(5), Some(5));
        assert_eq!(board.nearest_railroad(7), Some(12));
        assert_eq!(board.nearest_railroad(21), Some(26));
        assert_eq!(board.nearest_railroad(27), Some(4));
    }

    #[test]
    fn test_missing_economics_rejected() {
        let catalog = BoardCatalog {
            layout: vec![TileSpec::Start, TileSpec::Property("Nowhere".to_string())],
            economics: BTreeMap::new(),
            railroad_positions: vec![],
        };
        assert!(matches!(catalog.build(), Err(GameError::InvalidBoard(_))));
    }

    #[test]
    fn test_board_layout_projection() {
        let layout = BoardCatalog::standard().board_layout();
        assert_eq!(layout.len(), 28);
        assert!(layout[0].special);
        assert_eq!(layout[3].price, 3);
        assert_eq!(layout[5].name, "Chance");
        assert!(!layout[5].special);
    }

    #[test]
    fn test_railroads_outside_small_board_are_ignored() {
        let catalog = BoardCatalog {
            layout: vec![TileSpec::Start, TileSpec::Event(EventKind::Chance)],
            economics: BTreeMap::new(),
            railroad_positions: RAILROAD_POSITIONS.to_vec(),
        };
        let board = catalog.build().unwrap();
        assert_eq!(board.nearest_railroad(1), None);
    }
}
