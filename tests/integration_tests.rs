//! Integration tests for the card game server
//!
//! These tests run a real server on a loopback port and drive it through the
//! same framed TCP protocol the clients use.

use rand::rngs::StdRng;
use rand::SeedableRng;
use server::config::ServerConfig;
use server::connection::{split_stream, PacketReceiver, PacketSender};
use server::network::{Server, ServerMessage};
use server::room::{Outcome, Player, Room};
use shared::{Card, ClientPacket, Color, PlayerView, Rejection, ServerPacket, DECK_SIZE, HAND_SIZE};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::{sleep, timeout};

const RECV_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_TURNS: usize = 2_000;

/// Spawns a server on an ephemeral port. Dropping the returned handle does
/// not stop it; tests send `Shutdown` when they care.
async fn start_server() -> (SocketAddr, UnboundedSender<ServerMessage>) {
    let config = ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        max_clients: 16,
        seed: Some(42),
    };

    let server = Server::bind(&config).await.unwrap();
    let addr = server.local_addr().unwrap();
    let handle = server.handle();
    tokio::spawn(server.run());
    (addr, handle)
}

struct TestClient {
    sender: PacketSender<ClientPacket>,
    receiver: PacketReceiver<ServerPacket>,
}

impl TestClient {
    async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.unwrap();
        let (sender, receiver) = split_stream::<ClientPacket, ServerPacket>(stream);
        Self { sender, receiver }
    }

    async fn send(&mut self, packet: ClientPacket) {
        self.sender.send(&packet).await.unwrap();
    }

    async fn recv(&mut self) -> ServerPacket {
        timeout(RECV_TIMEOUT, self.receiver.next_packet())
            .await
            .expect("timed out waiting for server")
            .expect("connection closed")
            .expect("undecodable packet")
    }

    /// Next view, skipping uno announcements.
    async fn recv_view(&mut self) -> PlayerView {
        loop {
            match self.recv().await {
                ServerPacket::GameStarted(view) | ServerPacket::GameState(view) => return view,
                ServerPacket::UnoCalled { .. } => continue,
                other => panic!("Expected a view, got {:?}", other),
            }
        }
    }

    async fn find_game(&mut self, name: &str) {
        self.send(ClientPacket::FindGame {
            name: name.to_string(),
        })
        .await;
    }
}

/// Queues Ana then Bo and returns both connections plus their room id.
async fn paired(addr: SocketAddr) -> (TestClient, TestClient, String) {
    let mut ana = TestClient::connect(addr).await;
    let mut bo = TestClient::connect(addr).await;

    ana.find_game("Ana").await;
    assert_eq!(ana.recv().await, ServerPacket::Waiting);
    bo.find_game("Bo").await;

    let room_id = match ana.recv().await {
        ServerPacket::GameFound {
            room_id,
            opponent_name,
        } => {
            assert_eq!(opponent_name, "Bo");
            room_id
        }
        other => panic!("Expected GameFound, got {:?}", other),
    };
    match bo.recv().await {
        ServerPacket::GameFound {
            room_id: bo_room,
            opponent_name,
        } => {
            assert_eq!(opponent_name, "Ana");
            assert_eq!(bo_room, room_id);
        }
        other => panic!("Expected GameFound, got {:?}", other),
    }

    (ana, bo, room_id)
}

/// Pairs Ana and Bo and starts their room; returns the opening views.
async fn started(addr: SocketAddr) -> ([TestClient; 2], [PlayerView; 2], String) {
    let (mut ana, mut bo, room_id) = paired(addr).await;
    ana.send(ClientPacket::StartGame {
        room_id: room_id.clone(),
    })
    .await;

    let ana_view = match ana.recv().await {
        ServerPacket::GameStarted(view) => view,
        other => panic!("Expected GameStarted, got {:?}", other),
    };
    let bo_view = match bo.recv().await {
        ServerPacket::GameStarted(view) => view,
        other => panic!("Expected GameStarted, got {:?}", other),
    };

    ([ana, bo], [ana_view, bo_view], room_id)
}

/// The playable color held most often.
fn favourite_color(hand: &[Card]) -> Color {
    Color::PLAYABLE
        .iter()
        .copied()
        .max_by_key(|color| hand.iter().filter(|card| card.color == *color).count())
        .unwrap_or(Color::Red)
}

/// NETWORK PROTOCOL TESTS
mod protocol_tests {
    use super::*;

    /// Tests that an intent for a room that never existed is refused by name
    #[tokio::test]
    async fn unknown_room_is_rejected() {
        let (addr, _server) = start_server().await;
        let mut client = TestClient::connect(addr).await;

        client
            .send(ClientPacket::DrawCard {
                room_id: "room_0_0".to_string(),
            })
            .await;

        assert_eq!(
            client.recv().await,
            ServerPacket::Rejected {
                reason: Rejection::UnknownRoom
            }
        );
    }

    /// Tests that a frame the server can't decode drops the connection
    #[tokio::test]
    async fn malformed_packet_closes_connection() {
        let (addr, _server) = start_server().await;
        let stream = TcpStream::connect(addr).await.unwrap();
        let (mut sender, mut receiver) = split_stream::<ServerPacket, ServerPacket>(stream);

        sender
            .send(&ServerPacket::UnoCalled {
                player_name: "nobody".to_string(),
            })
            .await
            .unwrap();

        let next = timeout(RECV_TIMEOUT, receiver.next_packet())
            .await
            .expect("server kept the connection open");
        assert!(next.is_none() || matches!(next, Some(Err(_))));
    }

    /// Tests that the server loop stops on request
    #[tokio::test]
    async fn shutdown_refuses_new_connections() {
        let (addr, server) = start_server().await;
        server.send(ServerMessage::Shutdown).unwrap();
        sleep(Duration::from_millis(200)).await;

        assert!(TcpStream::connect(addr).await.is_err());
    }
}

/// MATCHMAKING TESTS
mod matchmaking_tests {
    use super::*;

    /// Tests FIFO pairing of two anonymous players
    #[tokio::test]
    async fn two_players_are_paired() {
        let (addr, _server) = start_server().await;
        let (_ana, _bo, room_id) = paired(addr).await;

        assert!(room_id.starts_with("room_"));
    }

    /// Tests that queueing twice is refused without losing the queue slot
    #[tokio::test]
    async fn duplicate_find_game_is_rejected() {
        let (addr, _server) = start_server().await;
        let mut ana = TestClient::connect(addr).await;
        let mut bo = TestClient::connect(addr).await;

        ana.find_game("Ana").await;
        assert_eq!(ana.recv().await, ServerPacket::Waiting);
        ana.find_game("Ana").await;
        assert_eq!(
            ana.recv().await,
            ServerPacket::Rejected {
                reason: Rejection::AlreadyQueued
            }
        );

        bo.find_game("Bo").await;
        assert!(matches!(ana.recv().await, ServerPacket::GameFound { .. }));
        assert!(matches!(bo.recv().await, ServerPacket::GameFound { .. }));
    }

    /// Tests that blank names fall back to the default
    #[tokio::test]
    async fn blank_name_becomes_anonymous() {
        let (addr, _server) = start_server().await;
        let mut ana = TestClient::connect(addr).await;
        let mut bo = TestClient::connect(addr).await;

        ana.find_game("   ").await;
        assert_eq!(ana.recv().await, ServerPacket::Waiting);
        bo.find_game("Bo").await;

        let _ = ana.recv().await;
        match bo.recv().await {
            ServerPacket::GameFound { opponent_name, .. } => {
                assert_eq!(opponent_name, shared::DEFAULT_NAME)
            }
            other => panic!("Expected GameFound, got {:?}", other),
        }
    }

    /// Tests that leaving the queue removes the entry
    #[tokio::test]
    async fn leave_removes_queue_entry() {
        let (addr, _server) = start_server().await;
        let mut ana = TestClient::connect(addr).await;
        let mut bo = TestClient::connect(addr).await;

        ana.find_game("Ana").await;
        assert_eq!(ana.recv().await, ServerPacket::Waiting);
        ana.send(ClientPacket::Leave).await;

        bo.find_game("Bo").await;
        assert_eq!(bo.recv().await, ServerPacket::Waiting);

        // Same connection may queue again and is paired with the waiting Bo.
        ana.find_game("Ana").await;
        assert!(matches!(bo.recv().await, ServerPacket::GameFound { .. }));
        assert!(matches!(ana.recv().await, ServerPacket::GameFound { .. }));
    }

    /// Tests that a seated player can't queue for a second game
    #[tokio::test]
    async fn find_game_while_seated_is_rejected() {
        let (addr, _server) = start_server().await;
        let (mut ana, _bo, _room_id) = paired(addr).await;

        ana.find_game("Ana").await;
        assert_eq!(
            ana.recv().await,
            ServerPacket::Rejected {
                reason: Rejection::AlreadyInRoom
            }
        );
    }
}

/// GAMEPLAY TESTS
mod gameplay_tests {
    use super::*;

    /// Tests dealing, starting card and first turn
    #[tokio::test]
    async fn start_deals_both_hands() {
        let (addr, _server) = start_server().await;
        let (_clients, [ana, bo], room_id) = started(addr).await;

        for view in [&ana, &bo] {
            assert_eq!(view.room_id, room_id);
            assert_eq!(view.your_hand.len(), HAND_SIZE);
            assert_eq!(view.opponent_card_count, HAND_SIZE);
            assert_eq!(view.top_card.kind(), shared::CardKind::Number);
            assert_eq!(view.active_color, view.top_card.color);
            assert!(view.deck_count <= DECK_SIZE - 2 * HAND_SIZE - 1);
        }

        assert_eq!(ana.top_card, bo.top_card);
        assert_eq!(ana.deck_count, bo.deck_count);
        assert!(ana.is_your_turn);
        assert!(!bo.is_your_turn);
    }

    /// Tests that starting twice is a no-op refusal
    #[tokio::test]
    async fn second_start_is_rejected() {
        let (addr, _server) = start_server().await;
        let ([_ana, mut bo], [_, bo_view], room_id) = started(addr).await;

        bo.send(ClientPacket::StartGame { room_id }).await;

        assert_eq!(
            bo.recv().await,
            ServerPacket::Rejected {
                reason: Rejection::AlreadyStarted
            }
        );
        assert_eq!(bo.recv_view().await, bo_view);
    }

    /// Tests turn enforcement and the view resent after a refusal
    #[tokio::test]
    async fn out_of_turn_draw_is_rejected() {
        let (addr, _server) = start_server().await;
        let ([_ana, mut bo], [_, bo_view], room_id) = started(addr).await;

        bo.send(ClientPacket::DrawCard { room_id }).await;

        assert_eq!(
            bo.recv().await,
            ServerPacket::Rejected {
                reason: Rejection::NotYourTurn
            }
        );
        let resent = bo.recv_view().await;
        assert_eq!(resent, bo_view);
        assert!(!resent.is_your_turn);
    }

    /// Tests that drawing grows the hand by one and passes the turn
    #[tokio::test]
    async fn draw_passes_turn() {
        let (addr, _server) = start_server().await;
        let ([mut ana, mut bo], [ana_before, _], room_id) = started(addr).await;

        ana.send(ClientPacket::DrawCard { room_id }).await;

        let ana_after = ana.recv_view().await;
        let bo_after = bo.recv_view().await;
        assert_eq!(ana_after.your_hand.len(), HAND_SIZE + 1);
        assert_eq!(ana_after.deck_count, ana_before.deck_count - 1);
        assert!(!ana_after.is_your_turn);
        assert_eq!(bo_after.opponent_card_count, HAND_SIZE + 1);
        assert!(bo_after.is_your_turn);
    }

    /// Tests that an index past the end of the hand is refused
    #[tokio::test]
    async fn out_of_range_index_is_rejected() {
        let (addr, _server) = start_server().await;
        let ([mut ana, _bo], [ana_view, _], room_id) = started(addr).await;

        ana.send(ClientPacket::PlayCard {
            room_id,
            index: 99,
            color: None,
        })
        .await;

        assert_eq!(
            ana.recv().await,
            ServerPacket::Rejected {
                reason: Rejection::NoSuchCard { index: 99 }
            }
        );
        assert_eq!(ana.recv_view().await, ana_view);
    }

    /// Plays a whole match over the wire with both sides on autopilot
    #[tokio::test]
    async fn full_game_reaches_game_over() {
        let (addr, _server) = start_server().await;
        let (mut clients, mut views, room_id) = started(addr).await;

        for _ in 0..MAX_TURNS {
            let mover = if views[0].is_your_turn { 0 } else { 1 };
            assert!(views[1 - mover].is_your_turn != views[mover].is_your_turn);

            let view = &views[mover];
            let intent = match view
                .your_hand
                .iter()
                .position(|c| c.is_playable_on(view.active_color, view.top_card.value))
            {
                Some(index) => ClientPacket::PlayCard {
                    room_id: room_id.clone(),
                    index,
                    color: view.your_hand[index]
                        .is_wild()
                        .then(|| favourite_color(&view.your_hand)),
                },
                None => ClientPacket::DrawCard {
                    room_id: room_id.clone(),
                },
            };
            clients[mover].send(intent).await;

            for (client, view) in clients.iter_mut().zip(views.iter_mut()) {
                *view = client.recv_view().await;
            }
            assert_eq!(views[0].your_hand.len(), views[1].opponent_card_count);
            assert_eq!(views[1].your_hand.len(), views[0].opponent_card_count);
            assert!(views[0].your_hand.len() + views[1].your_hand.len() + views[0].deck_count < DECK_SIZE);

            if views[mover].your_hand.is_empty() {
                for (seat, client) in clients.iter_mut().enumerate() {
                    match client.recv().await {
                        ServerPacket::GameOver { you_won, .. } => assert_eq!(you_won, seat == mover),
                        other => panic!("Expected GameOver, got {:?}", other),
                    }
                }

                // The room is gone once the match ends.
                clients[0].send(ClientPacket::DrawCard { room_id }).await;
                assert_eq!(
                    clients[0].recv().await,
                    ServerPacket::Rejected {
                        reason: Rejection::UnknownRoom
                    }
                );
                return;
            }
        }

        panic!("Game did not finish within {} turns", MAX_TURNS);
    }
}

/// DISCONNECT AND TEARDOWN TESTS
mod disconnect_tests {
    use super::*;

    /// Tests that a dropped connection ends the match for the opponent
    #[tokio::test]
    async fn disconnect_mid_game_notifies_opponent() {
        let (addr, _server) = start_server().await;
        let ([ana, mut bo], _, room_id) = started(addr).await;

        drop(ana);

        assert_eq!(bo.recv().await, ServerPacket::OpponentDisconnected);

        bo.send(ClientPacket::DrawCard { room_id }).await;
        assert_eq!(
            bo.recv().await,
            ServerPacket::Rejected {
                reason: Rejection::UnknownRoom
            }
        );

        bo.find_game("Bo").await;
        assert_eq!(bo.recv().await, ServerPacket::Waiting);
    }

    /// Tests that leaving a room tears it down but keeps both connections usable
    #[tokio::test]
    async fn leave_mid_game_frees_both_players() {
        let (addr, _server) = start_server().await;
        let (mut ana, mut bo, room_id) = paired(addr).await;

        ana.send(ClientPacket::Leave).await;
        assert_eq!(bo.recv().await, ServerPacket::OpponentDisconnected);

        ana.send(ClientPacket::StartGame { room_id }).await;
        assert_eq!(
            ana.recv().await,
            ServerPacket::Rejected {
                reason: Rejection::UnknownRoom
            }
        );

        ana.find_game("Ana").await;
        assert_eq!(ana.recv().await, ServerPacket::Waiting);
        bo.find_game("Bo").await;
        assert!(matches!(ana.recv().await, ServerPacket::GameFound { .. }));
        assert!(matches!(bo.recv().await, ServerPacket::GameFound { .. }));
    }

    /// Tests that a queued player who disconnects is never matched
    #[tokio::test]
    async fn disconnect_while_queued_leaves_queue() {
        let (addr, _server) = start_server().await;
        let mut ghost = TestClient::connect(addr).await;
        ghost.find_game("Ghost").await;
        assert_eq!(ghost.recv().await, ServerPacket::Waiting);

        drop(ghost);
        sleep(Duration::from_millis(100)).await;

        let mut bo = TestClient::connect(addr).await;
        bo.find_game("Bo").await;
        assert_eq!(bo.recv().await, ServerPacket::Waiting);
    }
}

/// ROOM STATE MACHINE TESTS
mod room_tests {
    use super::*;

    fn new_room(seed: u64) -> Room {
        Room::new(
            format!("room_{}", seed),
            Player::new(1, "Ana"),
            Player::new(2, "Bo"),
            StdRng::seed_from_u64(seed),
        )
    }

    /// Plays the current seat's first legal card, or draws.
    fn autoplay(room: &mut Room) -> Result<Outcome, Rejection> {
        let seat = room.current_seat();
        let player = &room.players()[seat];
        let id = player.id;
        let color = room.active_color().unwrap();
        let value = room.active_value().unwrap();

        let playable = player
            .hand()
            .iter()
            .position(|c| c.is_playable_on(color, value));

        match playable {
            Some(index) => {
                let chosen = player.hand()[index]
                    .is_wild()
                    .then(|| favourite_color(player.hand()));
                room.play_card(id, index, chosen)
            }
            None => room.draw_card(id),
        }
    }

    /// Tests card conservation over many seeded matches
    #[test]
    fn cards_are_conserved_through_full_games() {
        for seed in 0..25 {
            let mut room = new_room(seed);
            room.start(1).unwrap();
            assert_eq!(room.cards_in_play() + room.burned(), DECK_SIZE);

            let mut finished = false;
            for _ in 0..MAX_TURNS {
                let outcome = autoplay(&mut room).unwrap();
                assert_eq!(room.cards_in_play() + room.burned(), DECK_SIZE);

                if let Outcome::Finished { winner } = outcome {
                    assert!(room.players()[winner].hand().is_empty());
                    assert_eq!(room.winner(), Some(winner));
                    finished = true;
                    break;
                }
            }
            assert!(finished, "seed {} did not finish", seed);
        }
    }

    /// Tests that a finished room refuses further intents
    #[test]
    fn finished_room_rejects_moves() {
        let mut room = new_room(3);
        room.start(1).unwrap();

        loop {
            if let Outcome::Finished { .. } = autoplay(&mut room).unwrap() {
                break;
            }
        }

        assert_eq!(room.draw_card(1), Err(Rejection::GameOver));
        assert_eq!(room.draw_card(2), Err(Rejection::GameOver));
        assert_eq!(room.start(1), Err(Rejection::GameOver));
    }

    /// Tests that the same seed reproduces the same deal
    #[test]
    fn seeded_rooms_deal_identically() {
        let mut first = new_room(11);
        let mut second = new_room(11);
        first.start(1).unwrap();
        second.start(2).unwrap();

        assert_eq!(first.players()[0].hand(), second.players()[0].hand());
        assert_eq!(first.players()[1].hand(), second.players()[1].hand());
        assert_eq!(first.top_card(), second.top_card());
    }
}
