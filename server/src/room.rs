//! Authoritative state machine for one two-player match
//!
//! A room moves through `WaitingToStart -> InProgress -> Ended`. Every intent
//! returns `Result<Outcome, Rejection>`; an `Err` guarantees the room was left
//! untouched, so callers can safely resend the current view after a refusal.
//!
//! Cards are conserved: deck, discard pile and both hands always hold the same
//! population, minus the action/wild cards burned while revealing the starting
//! card. When the deck runs dry it is rebuilt from the discard pile, keeping
//! the top card in place.

use crate::deck::{build_deck, Deck};
use log::{debug, info, warn};
use rand::rngs::StdRng;
use shared::{Card, CardKind, CardValue, Color, Rejection, HAND_SIZE};

pub const SEATS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    WaitingToStart,
    InProgress,
    Ended,
}

/// Turn order direction. With two seats it has no observable effect; it is
/// kept so seat advancement already works for larger tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

impl Direction {
    pub fn reversed(self) -> Self {
        match self {
            Direction::Forward => Direction::Backward,
            Direction::Backward => Direction::Forward,
        }
    }

    fn step(self) -> isize {
        match self {
            Direction::Forward => 1,
            Direction::Backward => -1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    Finished { winner: usize },
}

#[derive(Debug, Clone)]
pub struct Player {
    pub id: u32,
    pub name: String,
    hand: Vec<Card>,
    called_uno: bool,
}

impl Player {
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            hand: Vec::new(),
            called_uno: false,
        }
    }

    pub fn hand(&self) -> &[Card] {
        &self.hand
    }

    pub fn called_uno(&self) -> bool {
        self.called_uno
    }

    fn receive(&mut self, card: Card) {
        self.hand.push(card);
        if self.hand.len() > 1 {
            self.called_uno = false;
        }
    }
}

pub struct Room {
    id: String,
    players: [Player; SEATS],
    deck: Deck,
    discard: Vec<Card>,
    current: usize,
    active_color: Option<Color>,
    active_value: Option<CardValue>,
    direction: Direction,
    phase: Phase,
    burned: usize,
    winner: Option<usize>,
    rng: StdRng,
}

impl Room {
    pub fn new(id: impl Into<String>, first: Player, second: Player, rng: StdRng) -> Self {
        Self {
            id: id.into(),
            players: [first, second],
            deck: Deck::default(),
            discard: Vec::new(),
            current: 0,
            active_color: None,
            active_value: None,
            direction: Direction::Forward,
            phase: Phase::WaitingToStart,
            burned: 0,
            winner: None,
            rng,
        }
    }

    /// Shuffles a fresh deck, deals both hands (seat 0 first) and reveals the
    /// first number card as the starting discard. Action and wild cards drawn
    /// during the reveal leave the game.
    pub fn start(&mut self, player_id: u32) -> Result<Outcome, Rejection> {
        match self.phase {
            Phase::WaitingToStart => {}
            Phase::InProgress => return Err(Rejection::AlreadyStarted),
            Phase::Ended => return Err(Rejection::GameOver),
        }
        self.seat_of(player_id).ok_or(Rejection::NotInRoom)?;

        let mut deck = build_deck(&mut self.rng);
        let mut hands: [Vec<Card>; SEATS] = Default::default();
        for hand in hands.iter_mut() {
            for _ in 0..HAND_SIZE {
                hand.push(deck.draw().ok_or(Rejection::NoCardsLeft)?);
            }
        }

        let mut burned = 0;
        let starter = loop {
            match deck.draw() {
                Some(card) if card.kind() == CardKind::Number => break card,
                Some(card) => {
                    debug!("Room {}: burned {} during reveal", self.id, card);
                    burned += 1;
                }
                None => return Err(Rejection::NoCardsLeft),
            }
        };

        for (player, hand) in self.players.iter_mut().zip(hands) {
            player.hand = hand;
            player.called_uno = false;
        }
        self.deck = deck;
        self.discard = vec![starter];
        self.active_color = Some(starter.color);
        self.active_value = Some(starter.value);
        self.current = 0;
        self.burned = burned;
        self.phase = Phase::InProgress;

        info!(
            "Room {} started: {} vs {}, starting card {}",
            self.id, self.players[0].name, self.players[1].name, starter
        );
        Ok(Outcome::Applied)
    }

    /// Plays the card at `index` from the current player's hand
    ///
    /// The card must match the active color or value, or be wild; wilds need a
    /// non-wild `chosen` color, which becomes the active color. The effect is
    /// resolved before the win check, so a final `+2` still lands.
    pub fn play_card(
        &mut self,
        player_id: u32,
        index: usize,
        chosen: Option<Color>,
    ) -> Result<Outcome, Rejection> {
        let seat = self.acting_seat(player_id)?;
        let (active_color, active_value) = self.active()?;

        let card = *self.players[seat]
            .hand
            .get(index)
            .ok_or(Rejection::NoSuchCard { index })?;

        if !card.is_playable_on(active_color, active_value) {
            return Err(Rejection::IllegalCard);
        }

        let next_color = if card.is_wild() {
            match chosen {
                None => return Err(Rejection::MissingColor),
                Some(color) if color.is_wild() => return Err(Rejection::InvalidColor),
                Some(color) => color,
            }
        } else {
            card.color
        };

        self.players[seat].hand.remove(index);
        self.discard.push(card);
        self.active_color = Some(next_color);
        self.active_value = Some(card.value);
        debug!(
            "Room {}: {} played {} (color now {})",
            self.id, self.players[seat].name, card, next_color
        );

        self.resolve_effect(card, seat);

        if self.players[seat].hand.is_empty() {
            self.phase = Phase::Ended;
            self.winner = Some(seat);
            info!("Room {}: {} wins", self.id, self.players[seat].name);
            return Ok(Outcome::Finished { winner: seat });
        }

        Ok(Outcome::Applied)
    }

    /// Moves the top deck card into the current player's hand and passes the turn.
    pub fn draw_card(&mut self, player_id: u32) -> Result<Outcome, Rejection> {
        let seat = self.acting_seat(player_id)?;
        let card = self.draw_one().ok_or(Rejection::NoCardsLeft)?;

        self.players[seat].receive(card);
        self.current = self.next_seat(seat);
        Ok(Outcome::Applied)
    }

    /// Allowed with one card in hand, or with two on the caller's own turn
    /// (about to play down to one).
    pub fn call_uno(&mut self, player_id: u32) -> Result<Outcome, Rejection> {
        self.ensure_in_progress()?;
        let seat = self.seat_of(player_id).ok_or(Rejection::NotInRoom)?;

        let allowed = match self.players[seat].hand.len() {
            1 => true,
            2 => seat == self.current,
            _ => false,
        };
        if !allowed {
            return Err(Rejection::UnoNotAllowed);
        }

        self.players[seat].called_uno = true;
        Ok(Outcome::Applied)
    }

    /// Catches an opponent sitting on one card without having called uno;
    /// they draw two.
    pub fn challenge_uno(&mut self, player_id: u32) -> Result<Outcome, Rejection> {
        self.ensure_in_progress()?;
        let seat = self.seat_of(player_id).ok_or(Rejection::NotInRoom)?;
        let target = self.next_seat(seat);

        let exposed = {
            let player = &self.players[target];
            player.hand.len() == 1 && !player.called_uno
        };
        if !exposed {
            return Err(Rejection::NothingToChallenge);
        }

        self.penalty_draw(target, 2);
        Ok(Outcome::Applied)
    }

    pub fn end(&mut self) {
        self.phase = Phase::Ended;
    }

    fn resolve_effect(&mut self, card: Card, mover: usize) {
        let opponent = self.next_seat(mover);

        match card.value {
            CardValue::Skip => return,
            // Two seats: flipping direction lands back on the mover, same as Skip.
            CardValue::Reverse => {
                self.direction = self.direction.reversed();
                return;
            }
            value => {
                let penalty = value.draw_penalty();
                if penalty > 0 {
                    self.penalty_draw(opponent, penalty);
                }
            }
        }

        self.current = opponent;
    }

    fn penalty_draw(&mut self, seat: usize, count: usize) -> usize {
        let mut dealt = 0;
        for _ in 0..count {
            match self.draw_one() {
                Some(card) => {
                    self.players[seat].receive(card);
                    dealt += 1;
                }
                None => break,
            }
        }

        if dealt < count {
            warn!(
                "Room {}: only {} of {} penalty cards available for {}",
                self.id, dealt, count, self.players[seat].name
            );
        }
        dealt
    }

    fn draw_one(&mut self) -> Option<Card> {
        if self.deck.is_empty() {
            self.replenish();
        }
        self.deck.draw()
    }

    fn replenish(&mut self) {
        if self.discard.len() <= 1 {
            return;
        }

        let top = self.discard.len() - 1;
        let reclaimed: Vec<Card> = self.discard.drain(..top).collect();
        debug!(
            "Room {}: reshuffling {} discarded cards into the deck",
            self.id,
            reclaimed.len()
        );
        self.deck.refill(reclaimed, &mut self.rng);
    }

    fn acting_seat(&self, player_id: u32) -> Result<usize, Rejection> {
        self.ensure_in_progress()?;
        let seat = self.seat_of(player_id).ok_or(Rejection::NotInRoom)?;
        if seat != self.current {
            return Err(Rejection::NotYourTurn);
        }
        Ok(seat)
    }

    fn ensure_in_progress(&self) -> Result<(), Rejection> {
        match self.phase {
            Phase::WaitingToStart => Err(Rejection::NotStarted),
            Phase::InProgress => Ok(()),
            Phase::Ended => Err(Rejection::GameOver),
        }
    }

    fn active(&self) -> Result<(Color, CardValue), Rejection> {
        match (self.active_color, self.active_value) {
            (Some(color), Some(value)) => Ok((color, value)),
            _ => Err(Rejection::NotStarted),
        }
    }

    pub fn next_seat(&self, from: usize) -> usize {
        (from as isize + self.direction.step()).rem_euclid(SEATS as isize) as usize
    }

    pub fn seat_of(&self, player_id: u32) -> Option<usize> {
        self.players.iter().position(|p| p.id == player_id)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_started(&self) -> bool {
        self.phase != Phase::WaitingToStart
    }

    pub fn players(&self) -> &[Player; SEATS] {
        &self.players
    }

    pub fn player(&self, seat: usize) -> Option<&Player> {
        self.players.get(seat)
    }

    pub fn current_seat(&self) -> usize {
        self.current
    }

    pub fn active_color(&self) -> Option<Color> {
        self.active_color
    }

    pub fn active_value(&self) -> Option<CardValue> {
        self.active_value
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn top_card(&self) -> Option<Card> {
        self.discard.last().copied()
    }

    pub fn deck_len(&self) -> usize {
        self.deck.len()
    }

    pub fn discard_len(&self) -> usize {
        self.discard.len()
    }

    /// Cards burned while revealing the starting card.
    pub fn burned(&self) -> usize {
        self.burned
    }

    pub fn winner(&self) -> Option<usize> {
        self.winner
    }

    /// Cards currently in circulation: deck, discard pile and both hands.
    pub fn cards_in_play(&self) -> usize {
        self.deck.len()
            + self.discard.len()
            + self.players.iter().map(|p| p.hand.len()).sum::<usize>()
    }
}

#[cfg(test)]
impl Room {
    pub(crate) fn set_hand(&mut self, seat: usize, cards: Vec<Card>) {
        self.players[seat].hand = cards;
    }

    pub(crate) fn set_deck(&mut self, cards: Vec<Card>) {
        self.deck = Deck::from_cards(cards);
    }

    /// Replaces the discard pile; the last card becomes the active card.
    pub(crate) fn set_discard(&mut self, cards: Vec<Card>) {
        if let Some(top) = cards.last() {
            self.active_color = Some(top.color);
            self.active_value = Some(top.value);
        }
        self.discard = cards;
    }

    pub(crate) fn set_current(&mut self, seat: usize) {
        self.current = seat;
    }
}
