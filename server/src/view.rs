//! Per-player projection of room state
//!
//! Each seat gets its own view: full details of its own hand, only the card
//! count of the opponent's. Views are rebuilt from the room after every change
//! and never shared between players.

use crate::room::Room;
use shared::PlayerView;

/// Returns `None` until the room has started or when `player_id` is not seated.
pub fn view_for(room: &Room, player_id: u32) -> Option<PlayerView> {
    let seat = room.seat_of(player_id)?;
    let me = room.player(seat)?;
    let opponent = room.player(room.next_seat(seat))?;

    Some(PlayerView {
        room_id: room.id().to_string(),
        your_hand: me.hand().to_vec(),
        opponent_name: opponent.name.clone(),
        opponent_card_count: opponent.hand().len(),
        top_card: room.top_card()?,
        active_color: room.active_color()?,
        is_your_turn: room.current_seat() == seat,
        deck_count: room.deck_len(),
    })
}
