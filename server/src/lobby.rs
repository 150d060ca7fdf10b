//! Routes client intents to the matchmaking queue and to room actors
//!
//! The lobby owns the session registry and the waiting queue and is only
//! driven from the server loop, which makes it the single serialization point
//! for pairing and teardown. Room-level intents are forwarded to the owning
//! room actor untouched.

use crate::connection::Outbox;
use crate::matchmaking::{MatchQueue, Pairing, WaitingPlayer};
use crate::network::ServerMessage;
use crate::registry::SessionRegistry;
use crate::room::{Player, Room};
use crate::room_actor::{RoomActor, RoomCommand};
use crate::utils::get_timestamp;
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use shared::{sanitize_name, ClientPacket, Rejection, ServerPacket};
use std::collections::HashMap;
use std::net::SocketAddr;
use tokio::sync::mpsc::UnboundedSender;

pub struct Lobby {
    registry: SessionRegistry,
    queue: MatchQueue,
    server_tx: UnboundedSender<ServerMessage>,
    seed: Option<u64>,
    rooms_created: u64,
}

impl Lobby {
    pub fn new(max_clients: usize, seed: Option<u64>, server_tx: UnboundedSender<ServerMessage>) -> Self {
        Self {
            registry: SessionRegistry::new(max_clients),
            queue: MatchQueue::new(),
            server_tx,
            seed,
            rooms_created: 0,
        }
    }

    /// Registers a newly accepted connection and returns its id, or
    /// `ServerFull` when the server is at capacity.
    pub fn connect(
        &mut self,
        addr: SocketAddr,
        outbox: Outbox<ServerPacket>,
    ) -> Result<u32, Rejection> {
        self.registry.add_client(addr, outbox)
    }

    /// Applies one event from the server loop: an inbound packet, a dropped
    /// connection or a room that finished on its own.
    pub fn handle_message(&mut self, message: ServerMessage) {
        match message {
            ServerMessage::PacketReceived { client_id, packet } => {
                self.handle_packet(client_id, packet)
            }
            ServerMessage::ClientDisconnected { client_id } => self.disconnect(client_id),
            ServerMessage::RoomClosed { room_id } => {
                if self.registry.remove_room(&room_id).is_some() {
                    info!("Room {} finished", room_id);
                }
            }
            ServerMessage::Shutdown => {}
        }
    }

    /// Dispatches a client packet. Queue and session intents are handled here;
    /// game intents are routed to the room actor after checking the sender is
    /// seated in the named room.
    pub fn handle_packet(&mut self, client_id: u32, packet: ClientPacket) {
        if self.registry.client(client_id).is_none() {
            warn!("Packet from unregistered connection {}", client_id);
            return;
        }

        match packet {
            ClientPacket::FindGame { name } => self.find_game(client_id, &name),
            ClientPacket::StartGame { room_id } => {
                self.forward(client_id, &room_id, RoomCommand::Start { player_id: client_id })
            }
            ClientPacket::PlayCard {
                room_id,
                index,
                color,
            } => self.forward(
                client_id,
                &room_id,
                RoomCommand::Play {
                    player_id: client_id,
                    index,
                    color,
                },
            ),
            ClientPacket::DrawCard { room_id } => {
                self.forward(client_id, &room_id, RoomCommand::Draw { player_id: client_id })
            }
            ClientPacket::CallUno { room_id } => self.forward(
                client_id,
                &room_id,
                RoomCommand::CallUno {
                    player_id: client_id,
                },
            ),
            ClientPacket::ChallengeUno { room_id } => self.forward(
                client_id,
                &room_id,
                RoomCommand::ChallengeUno {
                    player_id: client_id,
                },
            ),
            ClientPacket::Leave => self.leave(client_id),
        }
    }

    fn find_game(&mut self, client_id: u32, raw_name: &str) {
        if self.registry.room_of(client_id).is_some() {
            self.reject(client_id, Rejection::AlreadyInRoom);
            return;
        }
        if self.queue.contains(client_id) {
            self.reject(client_id, Rejection::AlreadyQueued);
            return;
        }

        let requester = WaitingPlayer {
            id: client_id,
            name: sanitize_name(raw_name),
        };

        match self.queue.find_game(requester) {
            Pairing::Waiting => {
                self.registry.send_to(client_id, ServerPacket::Waiting);
            }
            Pairing::Matched { first, second } => self.open_room(first, second),
        }
    }

    fn open_room(&mut self, first: WaitingPlayer, second: WaitingPlayer) {
        self.rooms_created += 1;
        let room_id = format!("room_{}_{}", get_timestamp(), self.rooms_created);
        let rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(self.rooms_created)),
            None => StdRng::from_entropy(),
        };

        let mut outboxes = HashMap::new();
        for id in [first.id, second.id] {
            if let Some(outbox) = self.registry.outbox(id) {
                outboxes.insert(id, outbox);
            }
        }

        let room = Room::new(
            room_id.clone(),
            Player::new(first.id, first.name.clone()),
            Player::new(second.id, second.name.clone()),
            rng,
        );
        let handle = RoomActor::new(room, outboxes, self.server_tx.clone()).spawn();
        self.registry.insert_room(handle);
        info!(
            "Room {} opened for {} and {}",
            room_id, first.name, second.name
        );

        self.registry.send_to(
            first.id,
            ServerPacket::GameFound {
                room_id: room_id.clone(),
                opponent_name: second.name,
            },
        );
        self.registry.send_to(
            second.id,
            ServerPacket::GameFound {
                room_id,
                opponent_name: first.name,
            },
        );
    }

    fn forward(&mut self, client_id: u32, room_id: &str, command: RoomCommand) {
        let delivered = match self.registry.route(room_id, client_id) {
            Ok(handle) => handle.sender.send(command).is_ok(),
            Err(reason) => {
                self.reject(client_id, reason);
                return;
            }
        };

        if !delivered {
            // Actor already stopped; its RoomClosed message is still in flight.
            self.registry.remove_room(room_id);
            self.reject(client_id, Rejection::UnknownRoom);
        }
    }

    /// Leaves the queue or tears down the caller's room. The connection stays
    /// registered and may look for a new game.
    pub fn leave(&mut self, client_id: u32) {
        if self.queue.remove(client_id) {
            debug!("Connection {} left the queue", client_id);
        }

        let room_id = match self.registry.room_of(client_id) {
            Some(room_id) => room_id.to_string(),
            None => return,
        };

        if let Some(handle) = self.registry.remove_room(&room_id) {
            let _ = handle.sender.send(RoomCommand::Disconnect {
                player_id: client_id,
            });
        }
    }

    pub fn disconnect(&mut self, client_id: u32) {
        self.leave(client_id);
        self.registry.remove_client(client_id);
    }

    fn reject(&self, client_id: u32, reason: Rejection) {
        debug!("Rejected intent from {}: {}", client_id, reason);
        self.registry
            .send_to(client_id, ServerPacket::Rejected { reason });
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn queue(&self) -> &MatchQueue {
        &self.queue
    }
}
