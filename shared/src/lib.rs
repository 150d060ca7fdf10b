use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fmt;

pub const HAND_SIZE: usize = 7;
pub const DECK_SIZE: usize = 108;
pub const MAX_NAME_LEN: usize = 24;
pub const DEFAULT_NAME: &str = "Anonymous";

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Color {
    Red,
    Blue,
    Green,
    Yellow,
    Wild,
}

impl Color {
    /// The four colors a wild card may be declared as.
    pub const PLAYABLE: [Color; 4] = [Color::Red, Color::Blue, Color::Green, Color::Yellow];

    pub fn is_wild(self) -> bool {
        self == Color::Wild
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Color::Red => "red",
            Color::Blue => "blue",
            Color::Green => "green",
            Color::Yellow => "yellow",
            Color::Wild => "wild",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CardValue {
    Number(u8),
    Skip,
    Reverse,
    DrawTwo,
    Wild,
    WildDrawFour,
}

impl CardValue {
    pub const ACTIONS: [CardValue; 3] = [CardValue::Skip, CardValue::Reverse, CardValue::DrawTwo];

    pub fn kind(self) -> CardKind {
        match self {
            CardValue::Number(_) => CardKind::Number,
            CardValue::Skip | CardValue::Reverse | CardValue::DrawTwo => CardKind::Action,
            CardValue::Wild | CardValue::WildDrawFour => CardKind::Wild,
        }
    }

    /// Cards the opponent must draw when this value is played.
    pub fn draw_penalty(self) -> usize {
        match self {
            CardValue::DrawTwo => 2,
            CardValue::WildDrawFour => 4,
            _ => 0,
        }
    }
}

impl fmt::Display for CardValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CardValue::Number(n) => write!(f, "{}", n),
            CardValue::Skip => f.write_str("Skip"),
            CardValue::Reverse => f.write_str("Reverse"),
            CardValue::DrawTwo => f.write_str("+2"),
            CardValue::Wild => f.write_str("Wild"),
            CardValue::WildDrawFour => f.write_str("Wild+4"),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CardKind {
    Number,
    Action,
    Wild,
}

/// A card has no identity beyond its color and value; duplicates are normal.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Card {
    pub color: Color,
    pub value: CardValue,
}

impl Card {
    pub fn number(color: Color, n: u8) -> Self {
        Self {
            color,
            value: CardValue::Number(n),
        }
    }

    pub fn action(color: Color, value: CardValue) -> Self {
        Self { color, value }
    }

    pub fn wild() -> Self {
        Self {
            color: Color::Wild,
            value: CardValue::Wild,
        }
    }

    pub fn wild_draw_four() -> Self {
        Self {
            color: Color::Wild,
            value: CardValue::WildDrawFour,
        }
    }

    pub fn kind(&self) -> CardKind {
        self.value.kind()
    }

    pub fn is_wild(&self) -> bool {
        self.kind() == CardKind::Wild
    }

    /// Legal iff the color or the value matches, or the card is wild.
    pub fn is_playable_on(&self, active_color: Color, active_value: CardValue) -> bool {
        self.color == active_color || self.value == active_value || self.is_wild()
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_wild() {
            write!(f, "{}", self.value)
        } else {
            write!(f, "{} {}", self.color, self.value)
        }
    }
}

/// One player's projection of a room. Never carries the opponent's cards.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct PlayerView {
    pub room_id: String,
    pub your_hand: Vec<Card>,
    pub opponent_name: String,
    pub opponent_card_count: usize,
    pub top_card: Card,
    pub active_color: Color,
    pub is_your_turn: bool,
    pub deck_count: usize,
}

/// Why an intent was refused. A refused intent never changes room state.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("no such room")]
    UnknownRoom,
    #[error("not a player in this room")]
    NotInRoom,
    #[error("game has not started")]
    NotStarted,
    #[error("game already started")]
    AlreadyStarted,
    #[error("game is over")]
    GameOver,
    #[error("not your turn")]
    NotYourTurn,
    #[error("no card at hand index {index}")]
    NoSuchCard { index: usize },
    #[error("card does not match the active color or value")]
    IllegalCard,
    #[error("a wild card needs a chosen color")]
    MissingColor,
    #[error("wild is not a color that can be chosen")]
    InvalidColor,
    #[error("no cards left to draw")]
    NoCardsLeft,
    #[error("already waiting for an opponent")]
    AlreadyQueued,
    #[error("already seated in a room")]
    AlreadyInRoom,
    #[error("uno can only be called with one card left, or two on your turn")]
    UnoNotAllowed,
    #[error("opponent is not exposed to an uno challenge")]
    NothingToChallenge,
    #[error("server full")]
    ServerFull,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub enum ClientPacket {
    FindGame {
        name: String,
    },
    StartGame {
        room_id: String,
    },
    PlayCard {
        room_id: String,
        index: usize,
        color: Option<Color>,
    },
    DrawCard {
        room_id: String,
    },
    CallUno {
        room_id: String,
    },
    ChallengeUno {
        room_id: String,
    },
    Leave,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub enum ServerPacket {
    Waiting,
    GameFound {
        room_id: String,
        opponent_name: String,
    },
    GameStarted(PlayerView),
    GameState(PlayerView),
    OpponentDisconnected,
    Rejected {
        reason: Rejection,
    },
    GameOver {
        winner_name: String,
        you_won: bool,
    },
    UnoCalled {
        player_name: String,
    },
}

pub fn encode<T: Serialize>(packet: &T) -> bincode::Result<Vec<u8>> {
    bincode::serialize(packet)
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> bincode::Result<T> {
    bincode::deserialize(bytes)
}

/// Trims a requested display name and falls back to a default when empty.
pub fn sanitize_name(raw: &str) -> String {
    let trimmed: String = raw.trim().chars().take(MAX_NAME_LEN).collect();
    let trimmed = trimmed.trim_end();
    if trimmed.is_empty() {
        DEFAULT_NAME.to_string()
    } else {
        trimmed.to_string()
    }
}
