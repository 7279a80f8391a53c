//! End-to-end turn scenarios on small custom boards.

use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::BTreeMap;
use tycoon_engine::{
    BoardCatalog, Game, GameRules, PendingKind, PropertySpec, TileSpec, TurnPhase,
};

fn flat(price: i64, rent: i64) -> PropertySpec {
    PropertySpec {
        cost: [price, 10, 10, 10],
        rent: [rent, rent, rent, rent],
        mortgage_value: price / 2,
        sale_value: price / 2,
    }
}

/// Start, Plaza, Park, Dock, Tower; dice totals of 2 or more wrap around.
fn game_with(plaza: PropertySpec, names: &[&str]) -> Game {
    let mut economics = BTreeMap::new();
    economics.insert("Plaza".to_string(), plaza);
    economics.insert("Park".to_string(), flat(20, 2));
    economics.insert("Dock".to_string(), flat(30, 3));
    economics.insert("Tower".to_string(), flat(40, 4));
    let catalog = BoardCatalog {
        layout: vec![
            TileSpec::Start,
            TileSpec::Property("Plaza".to_string()),
            TileSpec::Property("Park".to_string()),
            TileSpec::Property("Dock".to_string()),
            TileSpec::Property("Tower".to_string()),
        ],
        economics,
        railroad_positions: vec![],
    };
    Game::with_options(
        names,
        &GameRules::default(),
        catalog.build().unwrap(),
        StdRng::seed_from_u64(9),
    )
    .unwrap()
}

#[test]
fn test_buy_then_turn_passes() {
    let mut game = game_with(flat(100, 50), &["A", "B"]);

    // 3 + 3 = 6 steps on a 5-tile board lands on Plaza.
    let report = game.roll_with("A", [3, 3]).unwrap();
    assert_eq!(report.landed_on.as_deref(), Some("Plaza"));
    let pending = report.pending.unwrap();
    assert_eq!(pending.action, PendingKind::Buy);
    assert_eq!(pending.property, "Plaza");

    let report = game.buy_property("A").unwrap();
    assert_eq!(report.events, vec!["A bought Plaza for $100".to_string()]);
    assert_eq!(report.state.current_player, "B");

    let a = game.player("A").unwrap();
    assert_eq!(a.cash, 1400);
    assert_eq!(a.property_positions(), &[1]);
    assert_eq!(game.current_player().name(), "B");
    assert_eq!(game.phase(), TurnPhase::AwaitingRoll);
}

#[test]
fn test_rent_moves_cash_between_players() {
    let mut game = game_with(flat(100, 50), &["A", "B"]);
    game.roll_with("A", [3, 3]).unwrap();
    game.buy_property("A").unwrap();

    let report = game.roll_with("B", [3, 3]).unwrap();
    assert_eq!(report.events, vec!["B paid $50 rent to A".to_string()]);
    assert!(report.debt_situation.is_none());
    assert_eq!(game.player("B").unwrap().cash, 1450);
    assert_eq!(game.player("A").unwrap().cash, 1450);
    assert_eq!(game.current_player().name(), "A");
}

#[test]
fn test_ruinous_rent_forces_bankruptcy_and_ends_game() {
    let mut game = game_with(flat(100, 5000), &["A", "B"]);
    game.roll_with("A", [3, 3]).unwrap();
    game.buy_property("A").unwrap();

    let report = game.roll_with("B", [3, 3]).unwrap();
    let debt = report.debt_situation.unwrap();
    assert!(!debt.can_recover);
    assert_eq!(debt.debt, 5000 - 1500);

    let b = game.player("B").unwrap();
    assert_eq!(b.cash, 0);
    assert!(!b.is_active());
    assert!(report.state.game_over);
    assert_eq!(report.state.winner.as_deref(), Some("A"));
    assert_eq!(game.phase(), TurnPhase::GameOver);
}

#[test]
fn test_recoverable_rent_debt_can_be_settled_out_of_turn() {
    let mut game = game_with(flat(100, 1540), &["A", "B"]);
    // B buys Tower first so they hold land to sell.
    game.end_turn("A").unwrap();
    game.roll_with("B", [2, 2]).unwrap();
    game.buy_property("B").unwrap();

    game.roll_with("A", [3, 3]).unwrap();
    game.buy_property("A").unwrap();

    // B has 1460 cash plus Tower (sale 20); rent 1540 leaves -80.
    let report = game.roll_with("B", [1, 1]).unwrap();
    assert_eq!(report.landed_on.as_deref(), Some("Plaza"));
    let debt = report.debt_situation.unwrap();
    assert!(!debt.can_recover);

    let mut game = game_with(flat(100, 1470), &["A", "B"]);
    game.end_turn("A").unwrap();
    game.roll_with("B", [2, 2]).unwrap();
    game.buy_property("B").unwrap();
    game.roll_with("A", [3, 3]).unwrap();
    game.buy_property("A").unwrap();

    // 1460 - 1470 = -10, covered by Tower's sale value of 20.
    let report = game.roll_with("B", [1, 1]).unwrap();
    let debt = report.debt_situation.unwrap();
    assert!(debt.can_recover);
    assert_eq!(debt.debt, 10);
    assert_eq!(game.current_player().name(), "A");

    game.sell_property("B", "Tower").unwrap();
    assert_eq!(game.player("B").unwrap().cash, 10);
    assert_eq!(game.current_player().name(), "A");
}
