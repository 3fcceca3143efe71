//! Top-N ranking derived from the registry.
//!
//! The ranking is recomputed from scratch on every score change, so there is
//! no incremental state that could drift from the registry.

use crate::registry::{Player, PlayerId};
use crate::utils::get_timestamp;
use shared::LeaderboardEntry;
use std::cmp::Ordering;

/// Ranks `players` by score descending, ties by identity ascending, and keeps
/// the first `limit`.
pub fn recompute<'a, I>(players: I, limit: usize, timestamp: u64) -> Vec<LeaderboardEntry>
where
    I: IntoIterator<Item = (&'a PlayerId, &'a Player)>,
{
    let mut ranked: Vec<(&PlayerId, &Player)> = players.into_iter().collect();
    ranked.sort_by(|(a_id, a), (b_id, b)| rank_order(a.score, a_id, b.score, b_id));
    ranked.truncate(limit);

    ranked
        .into_iter()
        .map(|(id, player)| LeaderboardEntry {
            id: id.to_string(),
            name: player.name.clone(),
            score: player.score,
            timestamp,
        })
        .collect()
}

fn rank_order(a_score: u32, a_id: &PlayerId, b_score: u32, b_id: &PlayerId) -> Ordering {
    b_score.cmp(&a_score).then_with(|| a_id.cmp(b_id))
}

/// Cached ranking, refreshed by the lobby after score-affecting mutations.
#[derive(Debug)]
pub struct Leaderboard {
    size: usize,
    entries: Vec<LeaderboardEntry>,
}

impl Leaderboard {
    pub fn new(size: usize) -> Self {
        Self {
            size,
            entries: Vec::new(),
        }
    }

    pub fn refresh<'a, I>(&mut self, players: I)
    where
        I: IntoIterator<Item = (&'a PlayerId, &'a Player)>,
    {
        self.entries = recompute(players, self.size, get_timestamp());
    }

    pub fn entries(&self) -> &[LeaderboardEntry] {
        &self.entries
    }
}
