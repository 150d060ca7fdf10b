//! Session registry: live connections and the rooms they are seated in
//!
//! This module tracks:
//! - Connection lifecycle (register, lookup, removal) under a capacity limit
//! - The outbound packet channel of every connection
//! - Live rooms by id, and which room each connection is seated in
//!
//! The registry is owned by the server loop and only touched from there, so
//! routing decisions and room teardown are serialized.

use crate::connection::Outbox;
use crate::room_actor::RoomHandle;
use log::{debug, info};
use shared::{Rejection, ServerPacket};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Instant;

/// A registered connection
#[derive(Debug)]
pub struct Client {
    /// Unique connection identifier assigned by the registry
    pub id: u32,
    /// Remote address, for logging
    pub addr: SocketAddr,
    /// When the connection was registered
    pub connected_at: Instant,
    /// Room this connection is seated in, if any
    pub room_id: Option<String>,
    outbox: Outbox<ServerPacket>,
}

impl Client {
    /// Creates a client record for a freshly accepted connection
    ///
    /// The connection starts outside any room; `room_id` is set when the
    /// registry seats it.
    pub fn new(id: u32, addr: SocketAddr, outbox: Outbox<ServerPacket>) -> Self {
        Self {
            id,
            addr,
            connected_at: Instant::now(),
            room_id: None,
            outbox,
        }
    }

    /// Queues a packet for the connection's writer. Returns false once the
    /// writer has gone away or the backlog overflowed.
    pub fn send(&self, packet: ServerPacket) -> bool {
        self.outbox.send(packet)
    }
}

pub struct SessionRegistry {
    clients: HashMap<u32, Client>,
    rooms: HashMap<String, RoomHandle>,
    next_client_id: u32,
    max_clients: usize,
}

impl SessionRegistry {
    /// Connection ids start from 1 and are never reused.
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: HashMap::new(),
            rooms: HashMap::new(),
            next_client_id: 1,
            max_clients,
        }
    }

    /// Registers a connection, or refuses it when the server is at capacity.
    pub fn add_client(
        &mut self,
        addr: SocketAddr,
        outbox: Outbox<ServerPacket>,
    ) -> Result<u32, Rejection> {
        if self.clients.len() >= self.max_clients {
            return Err(Rejection::ServerFull);
        }

        let client_id = self.next_client_id;
        self.next_client_id += 1;

        info!("Client {} connected from {}", client_id, addr);
        self.clients
            .insert(client_id, Client::new(client_id, addr, outbox));

        Ok(client_id)
    }

    /// Unregisters a connection and returns its record, if it was known.
    pub fn remove_client(&mut self, client_id: u32) -> Option<Client> {
        let client = self.clients.remove(&client_id)?;
        info!(
            "Client {} ({}) disconnected after {:?}",
            client.id,
            client.addr,
            client.connected_at.elapsed()
        );
        Some(client)
    }

    pub fn client(&self, client_id: u32) -> Option<&Client> {
        self.clients.get(&client_id)
    }

    /// A handle on the connection's outbox, for rooms that push views directly.
    pub fn outbox(&self, client_id: u32) -> Option<Outbox<ServerPacket>> {
        self.clients.get(&client_id).map(|c| c.outbox.clone())
    }

    /// Queues a packet for a connection. Returns false for unknown ids.
    pub fn send_to(&self, client_id: u32, packet: ServerPacket) -> bool {
        self.clients
            .get(&client_id)
            .map(|c| c.send(packet))
            .unwrap_or(false)
    }

    /// Registers a room and marks its seated connections.
    pub fn insert_room(&mut self, handle: RoomHandle) {
        for seat in handle.seats {
            if let Some(client) = self.clients.get_mut(&seat) {
                client.room_id = Some(handle.room_id.clone());
            }
        }
        debug!("Registered room {}", handle.room_id);
        self.rooms.insert(handle.room_id.clone(), handle);
    }

    /// Unregisters a room and frees its seats. Returns the handle if the room
    /// was still live.
    pub fn remove_room(&mut self, room_id: &str) -> Option<RoomHandle> {
        let handle = self.rooms.remove(room_id)?;
        for seat in handle.seats {
            if let Some(client) = self.clients.get_mut(&seat) {
                if client.room_id.as_deref() == Some(room_id) {
                    client.room_id = None;
                }
            }
        }
        debug!("Removed room {}", room_id);
        Some(handle)
    }

    /// Resolves an intent's room id, checking the caller is seated there.
    pub fn route(&self, room_id: &str, client_id: u32) -> Result<&RoomHandle, Rejection> {
        let handle = self.rooms.get(room_id).ok_or(Rejection::UnknownRoom)?;
        if !handle.seats.contains(&client_id) {
            return Err(Rejection::NotInRoom);
        }
        Ok(handle)
    }

    /// Room the connection is currently seated in.
    pub fn room_of(&self, client_id: u32) -> Option<&str> {
        self.clients
            .get(&client_id)
            .and_then(|c| c.room_id.as_deref())
    }

    /// Whether the room is still live.
    pub fn has_room(&self, room_id: &str) -> bool {
        self.rooms.contains_key(room_id)
    }

    /// Returns the number of live rooms
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Returns the number of currently connected clients
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Returns true when no client is connected
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
