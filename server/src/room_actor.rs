//! Each room runs on its own task and owns its `Room` outright.
//!
//! The server loop forwards intents over the room's channel, so all
//! operations on one room are applied one at a time while separate rooms run
//! in parallel. After every applied change the actor pushes a fresh view to
//! each seated player.

use crate::connection::Outbox;
use crate::network::ServerMessage;
use crate::room::{Outcome, Room};
use crate::view::view_for;
use log::{debug, info};
use shared::{Color, PlayerView, Rejection, ServerPacket};
use std::collections::HashMap;
use std::ops::ControlFlow;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomCommand {
    Start {
        player_id: u32,
    },
    Play {
        player_id: u32,
        index: usize,
        color: Option<Color>,
    },
    Draw {
        player_id: u32,
    },
    CallUno {
        player_id: u32,
    },
    ChallengeUno {
        player_id: u32,
    },
    Disconnect {
        player_id: u32,
    },
}

/// What the registry keeps for a live room
#[derive(Debug, Clone)]
pub struct RoomHandle {
    pub room_id: String,
    pub seats: [u32; 2],
    pub sender: UnboundedSender<RoomCommand>,
}

pub struct RoomActor {
    room: Room,
    outboxes: HashMap<u32, Outbox<ServerPacket>>,
    server_tx: UnboundedSender<ServerMessage>,
}

impl RoomActor {
    pub fn new(
        room: Room,
        outboxes: HashMap<u32, Outbox<ServerPacket>>,
        server_tx: UnboundedSender<ServerMessage>,
    ) -> Self {
        Self {
            room,
            outboxes,
            server_tx,
        }
    }

    /// Spawns the actor task and returns the handle used to reach it.
    pub fn spawn(self) -> RoomHandle {
        let (sender, receiver) = mpsc::unbounded_channel();
        let players = self.room.players();
        let handle = RoomHandle {
            room_id: self.room.id().to_string(),
            seats: [players[0].id, players[1].id],
            sender,
        };

        tokio::spawn(self.run(receiver));
        handle
    }

    async fn run(mut self, mut receiver: UnboundedReceiver<RoomCommand>) {
        while let Some(command) = receiver.recv().await {
            if self.handle(command).is_break() {
                break;
            }
        }
        debug!("Room {} actor stopped", self.room.id());
    }

    pub fn handle(&mut self, command: RoomCommand) -> ControlFlow<()> {
        match command {
            RoomCommand::Start { player_id } => match self.room.start(player_id) {
                Ok(_) => {
                    self.broadcast(ServerPacket::GameStarted);
                    ControlFlow::Continue(())
                }
                Err(reason) => self.reject(player_id, reason),
            },
            RoomCommand::Play {
                player_id,
                index,
                color,
            } => {
                let result = self.room.play_card(player_id, index, color);
                self.after_move(player_id, result)
            }
            RoomCommand::Draw { player_id } => {
                let result = self.room.draw_card(player_id);
                self.after_move(player_id, result)
            }
            RoomCommand::CallUno { player_id } => match self.room.call_uno(player_id) {
                Ok(_) => {
                    if let Some(caller) = self.room.seat_of(player_id) {
                        let player_name = self.room.players()[caller].name.clone();
                        info!("Room {}: {} called uno", self.room.id(), player_name);
                        self.send_all(ServerPacket::UnoCalled { player_name });
                    }
                    ControlFlow::Continue(())
                }
                Err(reason) => self.reject(player_id, reason),
            },
            RoomCommand::ChallengeUno { player_id } => {
                let result = self.room.challenge_uno(player_id);
                self.after_move(player_id, result)
            }
            RoomCommand::Disconnect { player_id } => {
                self.room.end();
                info!(
                    "Room {} closed: player {} disconnected",
                    self.room.id(),
                    player_id
                );
                for (id, outbox) in &self.outboxes {
                    if *id != player_id {
                        outbox.send(ServerPacket::OpponentDisconnected);
                    }
                }
                ControlFlow::Break(())
            }
        }
    }

    fn after_move(&mut self, player_id: u32, result: Result<Outcome, Rejection>) -> ControlFlow<()> {
        match result {
            Ok(Outcome::Applied) => {
                self.broadcast(ServerPacket::GameState);
                ControlFlow::Continue(())
            }
            Ok(Outcome::Finished { winner }) => {
                self.broadcast(ServerPacket::GameState);

                let winner_id = self.room.players()[winner].id;
                let winner_name = self.room.players()[winner].name.clone();
                for (id, outbox) in &self.outboxes {
                    outbox.send(ServerPacket::GameOver {
                        winner_name: winner_name.clone(),
                        you_won: *id == winner_id,
                    });
                }

                let room_id = self.room.id().to_string();
                let _ = self.server_tx.send(ServerMessage::RoomClosed { room_id });
                ControlFlow::Break(())
            }
            Err(reason) => self.reject(player_id, reason),
        }
    }

    /// Tells the offender why, then resends their current view.
    fn reject(&self, player_id: u32, reason: Rejection) -> ControlFlow<()> {
        debug!(
            "Room {}: rejected intent from {}: {}",
            self.room.id(),
            player_id,
            reason
        );
        if let Some(outbox) = self.outboxes.get(&player_id) {
            outbox.send(ServerPacket::Rejected { reason });
            if let Some(view) = view_for(&self.room, player_id) {
                outbox.send(ServerPacket::GameState(view));
            }
        }
        ControlFlow::Continue(())
    }

    /// Sends every seated player their own freshly projected view.
    fn broadcast(&self, wrap: fn(PlayerView) -> ServerPacket) {
        for (id, outbox) in &self.outboxes {
            if let Some(view) = view_for(&self.room, *id) {
                outbox.send(wrap(view));
            }
        }
    }

    fn send_all(&self, packet: ServerPacket) {
        for outbox in self.outboxes.values() {
            outbox.send(packet.clone());
        }
    }

    pub fn room(&self) -> &Room {
        &self.room
    }
}
