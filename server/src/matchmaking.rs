//! FIFO queue of connections waiting for an opponent

use log::info;
use std::collections::VecDeque;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitingPlayer {
    pub id: u32,
    pub name: String,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Pairing {
    Waiting,
    /// `first` waited longest and takes seat 0.
    Matched {
        first: WaitingPlayer,
        second: WaitingPlayer,
    },
}

/// Dequeue-and-pair happens in one call, so a request is either queued or
/// matched, never both and never lost.
#[derive(Debug, Default)]
pub struct MatchQueue {
    waiting: VecDeque<WaitingPlayer>,
}

impl MatchQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pairs the requester with the oldest waiting player, or queues them.
    /// Callers must ensure the requester is not already queued.
    pub fn find_game(&mut self, requester: WaitingPlayer) -> Pairing {
        match self.waiting.pop_front() {
            Some(first) => {
                info!(
                    "Matched {} ({}) with {} ({})",
                    first.name, first.id, requester.name, requester.id
                );
                Pairing::Matched {
                    first,
                    second: requester,
                }
            }
            None => {
                info!("{} ({}) waiting for an opponent", requester.name, requester.id);
                self.waiting.push_back(requester);
                Pairing::Waiting
            }
        }
    }

    /// Removes exactly the entry for `id`. Returns false if it was not queued.
    pub fn remove(&mut self, id: u32) -> bool {
        match self.waiting.iter().position(|p| p.id == id) {
            Some(index) => {
                self.waiting.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, id: u32) -> bool {
        self.waiting.iter().any(|p| p.id == id)
    }

    pub fn len(&self) -> usize {
        self.waiting.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waiting.is_empty()
    }
}
