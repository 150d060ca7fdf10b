//! # Card Game Server Library
//!
//! Authoritative server for a two-player shedding card game. It pairs
//! anonymous players, runs one state machine per match that enforces every
//! rule, and streams each player their own view of that state.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Rooms
//! Every match lives in a [`room::Room`]: deck, hands, discard pile, turn
//! pointer and active color/value. Clients only send intents; the room
//! validates them and either applies them or returns a named
//! [`shared::Rejection`] without touching its state.
//!
//! ### Matchmaking and Sessions
//! Connections looking for a game wait in a FIFO [`matchmaking::MatchQueue`].
//! The [`registry::SessionRegistry`] maps connections to rooms for routing and
//! tears rooms down when a player leaves or disconnects.
//!
//! ### Information Hiding
//! [`view::view_for`] projects the room for one player: their own cards in
//! full, the opponent's only as a count.
//!
//! ## Architecture Design
//!
//! ### Event Loop Plus Room Actors
//! The server loop in [`network`] owns the lobby (registry and queue) and
//! handles connection events one at a time, so pairing and teardown are
//! serialized. Each room runs as its own task ([`room_actor`]) fed by a
//! channel: a room's intents apply in order, different rooms run in
//! parallel.
//!
//! ### TCP Framing
//! One persistent TCP connection per player, length-delimited frames, one
//! bincode packet per frame ([`connection`]).
//!
//! ### No Turn Timers
//! A turn may be held indefinitely. A disconnect is the only thing that
//! cancels a match, and it ends the match immediately whoever's turn it is.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig {
//!         port: 3000,
//!         ..ServerConfig::default()
//!     };
//!
//!     let server = Server::bind(&config).await?;
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod connection;
pub mod deck;
pub mod error;
pub mod lobby;
pub mod matchmaking;
pub mod network;
pub mod registry;
pub mod room;
pub mod room_actor;
pub mod utils;
pub mod view;
