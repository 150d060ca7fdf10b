//! Server network layer: TCP accept loop, per-connection tasks and the main
//! event loop that feeds the lobby

use crate::config::ServerConfig;
use crate::connection::{outbox, split_stream, PacketReceiver, PacketSender, OUTBOX_CAPACITY};
use crate::error::ServerError;
use crate::lobby::Lobby;
use log::{debug, error, info, warn};
use shared::{ClientPacket, ServerPacket};
use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Messages sent from connection and room tasks to the main server loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived {
        client_id: u32,
        packet: ClientPacket,
    },
    ClientDisconnected {
        client_id: u32,
    },
    RoomClosed {
        room_id: String,
    },
    Shutdown,
}

/// Main server coordinating connections, matchmaking and rooms
pub struct Server {
    listener: TcpListener,
    lobby: Lobby,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
}

impl Server {
    pub async fn bind(config: &ServerConfig) -> Result<Self, ServerError> {
        let addr = config.socket_addr()?;
        let listener = TcpListener::bind(addr).await?;
        info!("Server listening on {}", listener.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let lobby = Lobby::new(config.max_clients, config.seed, server_tx.clone());

        Ok(Server {
            listener,
            lobby,
            server_tx,
            server_rx,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Sender for injecting messages such as `Shutdown` into the main loop.
    pub fn handle(&self) -> mpsc::UnboundedSender<ServerMessage> {
        self.server_tx.clone()
    }

    /// Registers a new connection and spawns its reader and writer tasks.
    fn accept_connection(&mut self, stream: TcpStream, addr: SocketAddr) {
        let (sink, stream) = split_stream::<ServerPacket, ClientPacket>(stream);
        let (outbox_tx, outbox_rx) = outbox(OUTBOX_CAPACITY);
        let overflow = outbox_tx.overflow_token();

        match self.lobby.connect(addr, outbox_tx.clone()) {
            Ok(client_id) => {
                Self::spawn_connection_writer(client_id, sink, outbox_rx, overflow.clone());
                Self::spawn_connection_reader(client_id, stream, self.server_tx.clone(), overflow);
            }
            Err(reason) => {
                warn!("Refusing connection from {}: {}", addr, reason);
                outbox_tx.send(ServerPacket::Rejected { reason });
                Self::spawn_connection_writer(0, sink, outbox_rx, overflow);
            }
        }
    }

    /// Forwards decoded packets to the main loop. Any read or decode failure,
    /// or an overflowed outbox, ends the connection.
    fn spawn_connection_reader(
        client_id: u32,
        mut receiver: PacketReceiver<ClientPacket>,
        server_tx: mpsc::UnboundedSender<ServerMessage>,
        overflow: CancellationToken,
    ) {
        tokio::spawn(async move {
            loop {
                let next = tokio::select! {
                    next = receiver.next_packet() => next,
                    _ = overflow.cancelled() => {
                        warn!("Dropping connection {}: not reading its packets", client_id);
                        break;
                    }
                };

                match next {
                    Some(Ok(packet)) => {
                        if let Err(e) =
                            server_tx.send(ServerMessage::PacketReceived { client_id, packet })
                        {
                            error!("Failed to send packet to main loop: {}", e);
                            return;
                        }
                    }
                    Some(Err(e)) => {
                        warn!("Dropping connection {}: {}", client_id, e);
                        break;
                    }
                    None => break,
                }
            }

            let _ = server_tx.send(ServerMessage::ClientDisconnected { client_id });
        });
    }

    /// Drains the connection's outbox into its socket until every sender is
    /// gone or the outbox overflows, then closes the socket.
    fn spawn_connection_writer(
        client_id: u32,
        mut sink: PacketSender<ServerPacket>,
        mut outbox: mpsc::Receiver<ServerPacket>,
        overflow: CancellationToken,
    ) {
        tokio::spawn(async move {
            loop {
                let packet = tokio::select! {
                    packet = outbox.recv() => packet,
                    _ = overflow.cancelled() => break,
                };

                let Some(packet) = packet else {
                    break;
                };
                if let Err(e) = sink.send(&packet).await {
                    error!("Failed to send to client {}: {}", client_id, e);
                    break;
                }
            }

            if let Err(e) = sink.close().await {
                debug!("Closing connection {} failed: {}", client_id, e);
            }
        });
    }

    /// Main server loop: accepts connections and applies queued messages in
    /// arrival order.
    pub async fn run(mut self) -> Result<(), ServerError> {
        info!("Server started successfully");

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, addr)) => self.accept_connection(stream, addr),
                        Err(e) => error!("Error accepting connection: {}", e),
                    }
                },

                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::Shutdown) | None => {
                            info!("Server shutting down");
                            break;
                        },
                        Some(message) => self.lobby.handle_message(message),
                    }
                },
            }
        }

        Ok(())
    }
}
