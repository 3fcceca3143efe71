//! Per-player view of the shared world.
//!
//! Each snapshot only carries the pipes and peers inside the recipient's render
//! window, and at most `max_peers` peers, so payload size does not grow with
//! the total number of connected players.

use crate::registry::{Player, PlayerId, PlayerRegistry};
use crate::utils::distance_x;
use crate::world::World;
use shared::{LeaderboardEntry, Pipe, ServerMessage};
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct Snapshot<'a> {
    pub viewer: &'a PlayerId,
    pub pipes: Vec<Pipe>,
    /// Nearest first.
    pub peers: Vec<(&'a PlayerId, &'a Player)>,
    pub leaderboard: &'a [LeaderboardEntry],
}

#[derive(Debug, Clone, Copy)]
pub struct ViewFilter {
    pub render_distance: f32,
    pub max_peers: usize,
}

impl ViewFilter {
    pub fn new(render_distance: f32, max_peers: usize) -> Self {
        Self {
            render_distance,
            max_peers,
        }
    }

    /// Builds the view for `viewer`, or `None` if they are not registered.
    pub fn build_snapshot<'a>(
        &self,
        viewer: &'a PlayerId,
        registry: &'a PlayerRegistry,
        world: &World,
        leaderboard: &'a [LeaderboardEntry],
    ) -> Option<Snapshot<'a>> {
        let me = registry.get(viewer)?;

        Some(Snapshot {
            viewer,
            pipes: world.pipes_near(me.world_x, self.render_distance),
            peers: self.nearby_peers(viewer, me.world_x, registry),
            leaderboard,
        })
    }

    fn nearby_peers<'a>(
        &self,
        viewer: &PlayerId,
        center: f32,
        registry: &'a PlayerRegistry,
    ) -> Vec<(&'a PlayerId, &'a Player)> {
        let mut peers: Vec<(&PlayerId, &Player)> = registry
            .iter()
            .filter(|(id, player)| {
                *id != viewer
                    && !player.is_dead
                    && distance_x(player.world_x, center) < self.render_distance
            })
            .collect();

        peers.sort_by(|(a_id, a), (b_id, b)| {
            distance_x(a.world_x, center)
                .total_cmp(&distance_x(b.world_x, center))
                .then_with(|| a_id.cmp(b_id))
        });
        peers.truncate(self.max_peers);
        peers
    }
}

impl Snapshot<'_> {
    /// Wire form. `players` holds the peers plus the recipient's own record.
    pub fn to_message(&self, registry: &PlayerRegistry, world: &World) -> ServerMessage {
        let mut players: BTreeMap<String, shared::PlayerView> = self
            .peers
            .iter()
            .map(|(id, player)| (id.to_string(), player.view()))
            .collect();

        if let Some(me) = registry.get(self.viewer) {
            players.insert(self.viewer.to_string(), me.view());
        }

        ServerMessage::State {
            players,
            game_state: world.view_with(self.pipes.clone()),
            top_players: self.leaderboard.to_vec(),
        }
    }
}
