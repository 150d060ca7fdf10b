//! Scripted player for exercising a running server by hand.
//!
//! Connects, queues under the given name, starts the match as soon as it is
//! paired and then plays on its own: first legal card, wilds named after the
//! most common color in hand, uno called when down to two, otherwise draw.

use clap::Parser;
use server::connection::split_stream;
use shared::{Card, ClientPacket, Color, PlayerView, ServerPacket};
use tokio::net::TcpStream;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Name shown to the opponent
    #[arg(short, long, default_value = "Bot")]
    name: String,
}

/// Index of the first playable card, if any.
fn choose_card(view: &PlayerView) -> Option<usize> {
    view.your_hand
        .iter()
        .position(|card| card.is_playable_on(view.active_color, view.top_card.value))
}

/// The playable color held most often, red when the hand is all wilds.
fn favourite_color(hand: &[Card]) -> Color {
    Color::PLAYABLE
        .iter()
        .copied()
        .max_by_key(|color| hand.iter().filter(|card| card.color == *color).count())
        .unwrap_or(Color::Red)
}

fn print_view(view: &PlayerView) {
    let hand: Vec<String> = view.your_hand.iter().map(|c| c.to_string()).collect();
    println!(
        "Top: {} ({}) | deck {} | {} holds {} | your hand: [{}]{}",
        view.top_card,
        view.active_color,
        view.deck_count,
        view.opponent_name,
        view.opponent_card_count,
        hand.join(", "),
        if view.is_your_turn { " <- your turn" } else { "" }
    );
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let stream = TcpStream::connect(&args.server).await?;
    println!("Connected to {}", args.server);
    let (mut sender, mut receiver) = split_stream::<ClientPacket, ServerPacket>(stream);

    sender
        .send(&ClientPacket::FindGame {
            name: args.name.clone(),
        })
        .await?;

    while let Some(packet) = receiver.next_packet().await {
        match packet? {
            ServerPacket::Waiting => println!("Waiting for an opponent..."),
            ServerPacket::GameFound {
                room_id,
                opponent_name,
            } => {
                println!("Matched against {} in {}", opponent_name, room_id);
                sender.send(&ClientPacket::StartGame { room_id }).await?;
            }
            ServerPacket::GameStarted(view) | ServerPacket::GameState(view) => {
                print_view(&view);
                if !view.is_your_turn {
                    continue;
                }

                let room_id = view.room_id.clone();
                let intent = match choose_card(&view) {
                    Some(index) => {
                        if view.your_hand.len() == 2 {
                            sender
                                .send(&ClientPacket::CallUno {
                                    room_id: room_id.clone(),
                                })
                                .await?;
                        }
                        let card = view.your_hand[index];
                        let color = card.is_wild().then(|| favourite_color(&view.your_hand));
                        println!("Playing {}", card);
                        ClientPacket::PlayCard {
                            room_id,
                            index,
                            color,
                        }
                    }
                    None => {
                        println!("Nothing playable, drawing");
                        ClientPacket::DrawCard { room_id }
                    }
                };
                sender.send(&intent).await?;
            }
            ServerPacket::UnoCalled { player_name } => println!("{} called uno!", player_name),
            ServerPacket::Rejected { reason } => println!("Rejected: {}", reason),
            ServerPacket::GameOver {
                winner_name,
                you_won,
            } => {
                if you_won {
                    println!("You won!");
                } else {
                    println!("{} won the game", winner_name);
                }
                break;
            }
            ServerPacket::OpponentDisconnected => {
                println!("Opponent disconnected");
                break;
            }
        }
    }

    let _ = sender.close().await;
    Ok(())
}
