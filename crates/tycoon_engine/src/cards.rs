//! Chance and Fortune decks.
//!
//! Cards are static data. Drawing picks uniformly with replacement; the
//! game applies the drawn [`CardEffect`] to the triggering player.

use crate::model::Money;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Which deck an event tile draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Chance,
    Fortune,
}

impl EventKind {
    pub fn label(&self) -> &'static str {
        match self {
            EventKind::Chance => "Chance",
            EventKind::Fortune => "Fortune",
        }
    }

    pub fn deck(&self) -> &'static [EventCard] {
        match self {
            EventKind::Chance => &CHANCE_DECK,
            EventKind::Fortune => &FORTUNE_DECK,
        }
    }

    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> &'static EventCard {
        let deck = self.deck();
        &deck[rng.gen_range(0..deck.len())]
    }
}

/// What a card does to the player who drew it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardEffect {
    Collect(Money),
    /// Flat debit, floored at zero.
    Pay(Money),
    /// Relocate to position 0 and collect a bonus.
    AdvanceToStart { bonus: Money },
    /// Relocate without resolving the destination tile.
    AdvanceToNearestRailroad,
    /// Maintenance per house owned, floored at zero.
    BuildingRepairs { per_house: Money },
    /// Pay the amount to every other active player. Not floored.
    PayEachPlayer(Money),
}

impl CardEffect {
    /// True when applying the effect can lower the drawer's cash.
    pub fn is_debit(&self) -> bool {
        matches!(
            self,
            CardEffect::Pay(_) | CardEffect::BuildingRepairs { .. } | CardEffect::PayEachPlayer(_)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventCard {
    pub description: &'static str,
    pub effect: CardEffect,
}

pub const CHANCE_DECK: [EventCard; 8] = [
    EventCard {
        description: "Bank pays you a dividend of $50",
        effect: CardEffect::Collect(50),
    },
    EventCard {
        description: "Advance to Start, collect $200",
        effect: CardEffect::AdvanceToStart { bonus: 200 },
    },
    EventCard {
        description: "Bank error in your favor, collect $200",
        effect: CardEffect::Collect(200),
    },
    EventCard {
        description: "Doctor's fee, pay $50",
        effect: CardEffect::Pay(50),
    },
    EventCard {
        description: "Income tax refund, collect $20",
        effect: CardEffect::Collect(20),
    },
    EventCard {
        description: "Street repairs, pay $25 per house",
        effect: CardEffect::BuildingRepairs { per_house: 25 },
    },
    EventCard {
        description: "Charity donation, pay $100",
        effect: CardEffect::Pay(100),
    },
    EventCard {
        description: "Advance to the nearest railroad",
        effect: CardEffect::AdvanceToNearestRailroad,
    },
];

pub const FORTUNE_DECK: [EventCard; 8] = [
    EventCard {
        description: "Life insurance matures, collect $100",
        effect: CardEffect::Collect(100),
    },
    EventCard {
        description: "Holiday fund matures, collect $100",
        effect: CardEffect::Collect(100),
    },
    EventCard {
        description: "You won second prize, collect $10",
        effect: CardEffect::Collect(10),
    },
    EventCard {
        description: "You have been elected chairman, pay each player $50",
        effect: CardEffect::PayEachPlayer(50),
    },
    EventCard {
        description: "Bank error in your favor, collect $200",
        effect: CardEffect::Collect(200),
    },
    EventCard {
        description: "Doctor's fee, pay $50",
        effect: CardEffect::Pay(50),
    },
    EventCard {
        description: "School tax, pay $150",
        effect: CardEffect::Pay(150),
    },
    EventCard {
        description: "House repairs, pay $40 per house",
        effect: CardEffect::BuildingRepairs { per_house: 40 },
    },
];
