//! Deck construction and shuffling
//!
//! The deck is a plain stack of cards: the top is the end of the vector, so
//! drawing is a pop. A freshly built deck holds the canonical 108 cards:
//! per color one `0`, two each of `1..=9`, two each of `Skip`, `Reverse`
//! and `+2`, plus four `Wild` and four `Wild+4`.

use rand::Rng;
use shared::{Card, CardValue, Color, DECK_SIZE};

#[derive(Debug, Clone, Default)]
pub struct Deck {
    cards: Vec<Card>,
}

impl Deck {
    /// Builds the canonical deck in a fixed, unshuffled order.
    pub fn standard() -> Self {
        let mut cards = Vec::with_capacity(DECK_SIZE);

        for color in Color::PLAYABLE {
            cards.push(Card::number(color, 0));
            for _ in 0..2 {
                for n in 1..=9 {
                    cards.push(Card::number(color, n));
                }
                for value in CardValue::ACTIONS {
                    cards.push(Card::action(color, value));
                }
            }
        }

        for _ in 0..4 {
            cards.push(Card::wild());
            cards.push(Card::wild_draw_four());
        }

        Self { cards }
    }

    pub fn from_cards(cards: Vec<Card>) -> Self {
        Self { cards }
    }

    /// Fisher-Yates: walk from the last index down to 1, swapping each slot
    /// with a uniformly chosen index in `[0, i]`.
    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        for i in (1..self.cards.len()).rev() {
            let j = rng.gen_range(0..=i);
            self.cards.swap(i, j);
        }
    }

    pub fn draw(&mut self) -> Option<Card> {
        self.cards.pop()
    }

    /// Adds cards underneath the current stack and reshuffles everything.
    pub fn refill<R: Rng + ?Sized>(&mut self, cards: Vec<Card>, rng: &mut R) {
        self.cards.extend(cards);
        self.shuffle(rng);
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }
}

/// Builds the canonical deck and shuffles it.
pub fn build_deck<R: Rng + ?Sized>(rng: &mut R) -> Deck {
    let mut deck = Deck::standard();
    deck.shuffle(rng);
    deck
}
