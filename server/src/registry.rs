//! Player registry for the sync server
//!
//! This module owns the server-side record of every registered player:
//! - Player lifecycle (register, update, remove, liveness expiry)
//! - Identity generation for new connections
//! - Liveness tracking so silently dead connections can be evicted
//!
//! Positions and scores are taken as reported by the client; nothing here
//! checks that a report is physically plausible.

use log::info;
use rand::distributions::Alphanumeric;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{PlayerView, SPAWN_X, SPAWN_Y};
use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};
use thiserror::Error;

const ID_PREFIX: &str = "player_";
const ID_SUFFIX_LEN: usize = 9;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("player name cannot be empty")]
    InvalidName,

    #[error("unknown player {0}")]
    UnknownPlayer(PlayerId),
}

/// Opaque identity handed to a client when it registers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlayerId(String);

impl PlayerId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlayerId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// A registered player and the last state their client reported
#[derive(Debug, Clone)]
pub struct Player {
    /// Display name, trimmed
    pub name: String,
    /// Horizontal progress through the course
    pub world_x: f32,
    pub y: f32,
    pub score: u32,
    pub is_dead: bool,
    /// Last time we received a report from this player
    pub last_seen: Instant,
}

impl Player {
    pub fn new(name: String) -> Self {
        Self {
            name,
            world_x: SPAWN_X,
            y: SPAWN_Y,
            score: 0,
            is_dead: false,
            last_seen: Instant::now(),
        }
    }

    /// Returns true if nothing was reported for longer than `timeout` as of `now`
    pub fn is_timed_out(&self, now: Instant, timeout: Duration) -> bool {
        now.saturating_duration_since(self.last_seen) > timeout
    }

    pub fn view(&self) -> PlayerView {
        PlayerView {
            name: self.name.clone(),
            world_x: self.world_x,
            y: self.y,
            score: self.score,
            is_dead: self.is_dead,
        }
    }
}

/// Manages every registered player
///
/// The registry is owned by a single task, so no method blocks and none of
/// them need interior locking.
pub struct PlayerRegistry {
    players: HashMap<PlayerId, Player>,
    rng: StdRng,
}

impl PlayerRegistry {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            players: HashMap::new(),
            rng,
        }
    }

    /// Registers a new player at the spawn point
    ///
    /// Fails with `InvalidName` if the name is blank. The returned identity is
    /// unique among currently registered players.
    pub fn register(&mut self, name: &str) -> Result<PlayerId, RegistryError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(RegistryError::InvalidName);
        }

        let id = loop {
            let candidate = self.generate_id();
            if !self.players.contains_key(&candidate) {
                break candidate;
            }
        };

        info!("Player {} registered as '{}'", id, name);
        self.players.insert(id.clone(), Player::new(name.to_string()));
        Ok(id)
    }

    fn generate_id(&mut self) -> PlayerId {
        let suffix: String = (&mut self.rng)
            .sample_iter(&Alphanumeric)
            .take(ID_SUFFIX_LEN)
            .map(|b| char::from(b).to_ascii_lowercase())
            .collect();
        PlayerId(format!("{}{}", ID_PREFIX, suffix))
    }

    /// Replaces the reported state of a player and refreshes their liveness
    ///
    /// Returns whether the score changed.
    pub fn update_player(
        &mut self,
        id: &PlayerId,
        x: f32,
        y: f32,
        score: u32,
        is_dead: bool,
    ) -> Result<bool, RegistryError> {
        let player = self
            .players
            .get_mut(id)
            .ok_or_else(|| RegistryError::UnknownPlayer(id.clone()))?;

        let score_changed = player.score != score;
        player.world_x = x;
        player.y = y;
        player.score = score;
        player.is_dead = is_dead;
        player.last_seen = Instant::now();

        Ok(score_changed)
    }

    /// Removes a player. Returns false if they were already gone.
    pub fn remove(&mut self, id: &PlayerId) -> bool {
        if let Some(player) = self.players.remove(id) {
            info!("Player {} ('{}') removed", id, player.name);
            true
        } else {
            false
        }
    }

    /// Removes every player that has been silent longer than `timeout`
    ///
    /// Returns the removed identities so the caller can tear down their
    /// connections.
    pub fn sweep_expired(&mut self, now: Instant, timeout: Duration) -> Vec<PlayerId> {
        let expired: Vec<PlayerId> = self
            .players
            .iter()
            .filter(|(_, player)| player.is_timed_out(now, timeout))
            .map(|(id, _)| id.clone())
            .collect();

        for id in &expired {
            info!("Player {} timed out", id);
            self.players.remove(id);
        }

        expired
    }

    pub fn get(&self, id: &PlayerId) -> Option<&Player> {
        self.players.get(id)
    }

    pub fn contains(&self, id: &PlayerId) -> bool {
        self.players.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PlayerId, &Player)> {
        self.players.iter()
    }

    /// Position of the player furthest behind, if anyone is registered
    pub fn min_world_x(&self) -> Option<f32> {
        self.players
            .values()
            .map(|player| player.world_x)
            .reduce(f32::min)
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn get_mut(&mut self, id: &PlayerId) -> Option<&mut Player> {
        self.players.get_mut(id)
    }
}

impl Default for PlayerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
