//! Connection lifecycle and the single-owner game state.
//!
//! Every connection moves through `Connecting -> Registered -> Active ->
//! Closed`. [`transition`] decides what an input means for a connection in a
//! given state without touching any shared data; [`Lobby`] then applies that
//! decision to the registry, the course and the leaderboard, and returns the
//! frames the network layer has to deliver.

use crate::config::GameConfig;
use crate::leaderboard::Leaderboard;
use crate::registry::{PlayerId, PlayerRegistry};
use crate::view::ViewFilter;
use crate::world::World;
use log::{debug, info, warn};
use shared::{ClientMessage, ServerMessage};
use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

pub type ConnectionId = u64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Registered(PlayerId),
    Active(PlayerId),
    Closed,
}

impl ConnectionState {
    pub fn player_id(&self) -> Option<&PlayerId> {
        match self {
            ConnectionState::Registered(id) | ConnectionState::Active(id) => Some(id),
            ConnectionState::Connecting | ConnectionState::Closed => None,
        }
    }
}

/// Everything that can happen to a connection.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionInput {
    Message(ClientMessage),
    /// The transport reported a close or a read error.
    Closed,
    /// Sending to the connection failed.
    TransportFailed,
    /// The liveness sweep gave up on the player.
    TimedOut,
}

/// Report carried by `init` and `update`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Report {
    pub x: f32,
    pub y: f32,
    pub score: u32,
    pub is_dead: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    EmptyName,
    AlreadyRegistered,
    NotRegistered,
    ForeignPlayerId,
    ConnectionClosed,
}

/// What the lobby has to do for one input.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Register { name: String, report: Report },
    Update { player_id: PlayerId, report: Report },
    Remove { player_id: PlayerId },
    Close,
    Drop(DropReason),
}

/// Pure state machine for a single connection.
///
/// `Connecting` stays `Connecting` after a `Register` step; the lobby moves it
/// to `Registered` once the registry has handed out an identity.
pub fn transition(state: &ConnectionState, input: &SessionInput) -> (ConnectionState, Step) {
    use ConnectionState::*;

    match (state, input) {
        (Closed, _) => (Closed, Step::Drop(DropReason::ConnectionClosed)),

        (Connecting, SessionInput::Message(ClientMessage::Init { name, x, y, score, is_dead })) => {
            if name.trim().is_empty() {
                (Connecting, Step::Drop(DropReason::EmptyName))
            } else {
                let report = Report {
                    x: *x,
                    y: *y,
                    score: *score,
                    is_dead: *is_dead,
                };
                (
                    Connecting,
                    Step::Register {
                        name: name.clone(),
                        report,
                    },
                )
            }
        }
        (Connecting, SessionInput::Message(ClientMessage::Update { .. })) => {
            (Connecting, Step::Drop(DropReason::NotRegistered))
        }
        (Connecting, _) => (Closed, Step::Close),

        (Registered(id) | Active(id), SessionInput::Message(message)) => match message {
            ClientMessage::Init { .. } => (state.clone(), Step::Drop(DropReason::AlreadyRegistered)),
            ClientMessage::Update {
                player_id,
                x,
                y,
                score,
                is_dead,
            } => {
                if player_id.as_deref().is_some_and(|claimed| claimed != id.as_str()) {
                    return (state.clone(), Step::Drop(DropReason::ForeignPlayerId));
                }
                let report = Report {
                    x: *x,
                    y: *y,
                    score: *score,
                    is_dead: *is_dead,
                };
                (
                    Active(id.clone()),
                    Step::Update {
                        player_id: id.clone(),
                        report,
                    },
                )
            }
        },
        (Registered(id) | Active(id), _) => (
            Closed,
            Step::Remove {
                player_id: id.clone(),
            },
        ),
    }
}

/// Frames and side effects the network layer must carry out.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Send {
        connection: ConnectionId,
        message: ServerMessage,
    },
    /// Push a fresh snapshot to every registered connection right away.
    BroadcastState,
    Close {
        connection: ConnectionId,
    },
}

/// Single owner of the registry, the course and the leaderboard.
pub struct Lobby {
    config: GameConfig,
    registry: PlayerRegistry,
    world: World,
    leaderboard: Leaderboard,
    view: ViewFilter,
    connections: HashMap<ConnectionId, ConnectionState>,
    owners: HashMap<PlayerId, ConnectionId>,
    /// When each still-`Connecting` socket was accepted.
    pending: HashMap<ConnectionId, Instant>,
}

impl Lobby {
    pub fn new(config: GameConfig) -> Self {
        let registry = match config.world.seed {
            Some(seed) => PlayerRegistry::with_seed(seed),
            None => PlayerRegistry::new(),
        };

        Self {
            registry,
            world: World::new(config.world.clone()),
            leaderboard: Leaderboard::new(config.leaderboard_size),
            view: ViewFilter::new(config.world.render_distance, config.max_rendered_peers),
            connections: HashMap::new(),
            owners: HashMap::new(),
            pending: HashMap::new(),
            config,
        }
    }

    pub fn connect(&mut self, connection: ConnectionId) {
        self.connect_at(connection, Instant::now());
    }

    pub fn connect_at(&mut self, connection: ConnectionId, now: Instant) {
        self.connections
            .insert(connection, ConnectionState::Connecting);
        self.pending.insert(connection, now);
    }

    /// Feeds one input for `connection` through the state machine.
    pub fn handle(&mut self, connection: ConnectionId, input: SessionInput) -> Vec<Outbound> {
        let Some(state) = self.connections.get(&connection) else {
            debug!("Input for unknown connection {}: {:?}", connection, input);
            return Vec::new();
        };

        let (next, step) = transition(state, &input);
        let mut outbound = Vec::new();

        let next = match step {
            Step::Register { name, report } => match self.registry.register(&name) {
                Ok(player_id) => {
                    self.apply_report(&player_id, report);
                    self.leaderboard.refresh(self.registry.iter());
                    self.owners.insert(player_id.clone(), connection);
                    outbound.push(Outbound::Send {
                        connection,
                        message: self.bootstrap(&player_id),
                    });
                    outbound.push(Outbound::BroadcastState);
                    info!("Connection {} joined as {}", connection, player_id);
                    ConnectionState::Registered(player_id)
                }
                Err(e) => {
                    warn!("Connection {} failed to register: {}", connection, e);
                    next
                }
            },
            Step::Update { player_id, report } => {
                self.apply_report(&player_id, report);
                next
            }
            Step::Remove { player_id } => {
                self.remove_player(&player_id);
                info!(
                    "Connection {} closed ({:?}), {} players left",
                    connection,
                    input,
                    self.registry.len()
                );
                outbound.push(Outbound::BroadcastState);
                next
            }
            Step::Close => next,
            Step::Drop(reason) => {
                match reason {
                    DropReason::EmptyName => {
                        warn!("Connection {} sent init with an empty name", connection)
                    }
                    _ => debug!("Dropped input from connection {}: {:?}", connection, reason),
                }
                next
            }
        };

        if next != ConnectionState::Connecting {
            self.pending.remove(&connection);
        }
        if next == ConnectionState::Closed {
            self.connections.remove(&connection);
            outbound.push(Outbound::Close { connection });
        } else {
            self.connections.insert(connection, next);
        }
        outbound
    }

    /// Evicts players whose connection stopped reporting, and closes sockets
    /// that never sent a valid `init` within the same timeout.
    pub fn sweep(&mut self, now: Instant) -> Vec<Outbound> {
        let timeout = self.config.liveness_timeout;
        let expired = self.registry.sweep_expired(now, timeout);

        let stale: Vec<ConnectionId> = self
            .pending
            .iter()
            .filter(|(_, opened)| now.saturating_duration_since(**opened) > timeout)
            .map(|(connection, _)| *connection)
            .collect();

        let mut outbound = Vec::new();
        for connection in stale {
            warn!("Connection {} never registered, closing", connection);
            outbound.extend(self.handle(connection, SessionInput::TimedOut));
        }
        for player_id in expired {
            match self.owners.get(&player_id).copied() {
                Some(connection) => {
                    outbound.extend(self.handle(connection, SessionInput::TimedOut))
                }
                None => self.after_removal(),
            }
        }
        outbound
    }

    /// One filtered `state` message per registered connection.
    pub fn snapshots(&self) -> Vec<(ConnectionId, ServerMessage)> {
        self.connections
            .iter()
            .filter_map(|(connection, state)| {
                let player_id = state.player_id()?;
                let snapshot = self.view.build_snapshot(
                    player_id,
                    &self.registry,
                    &self.world,
                    self.leaderboard.entries(),
                )?;
                Some((*connection, snapshot.to_message(&self.registry, &self.world)))
            })
            .collect()
    }

    /// Full, unfiltered `init` reply for a newly registered player.
    pub fn bootstrap(&self, player_id: &PlayerId) -> ServerMessage {
        let players: BTreeMap<String, shared::PlayerView> = self
            .registry
            .iter()
            .map(|(id, player)| (id.to_string(), player.view()))
            .collect();

        ServerMessage::Init {
            player_id: player_id.to_string(),
            players,
            game_state: self.world.view(),
        }
    }

    fn apply_report(&mut self, player_id: &PlayerId, report: Report) {
        let score_changed = match self.registry.update_player(
            player_id,
            report.x,
            report.y,
            report.score,
            report.is_dead,
        ) {
            Ok(changed) => changed,
            Err(e) => {
                debug!("{}", e);
                return;
            }
        };

        self.world.extend_for(report.x);
        if let Some(min_x) = self.registry.min_world_x() {
            self.world.prune_behind(min_x);
        }
        if score_changed {
            self.leaderboard.refresh(self.registry.iter());
        }
    }

    fn remove_player(&mut self, player_id: &PlayerId) {
        self.registry.remove(player_id);
        self.owners.remove(player_id);
        self.after_removal();
    }

    /// An empty lobby leaves the course untouched; ids and positions carry on
    /// from where the last player left them.
    fn after_removal(&mut self) {
        self.leaderboard.refresh(self.registry.iter());
        if let Some(min_x) = self.registry.min_world_x() {
            self.world.prune_behind(min_x);
        }
    }

    pub fn state(&self, connection: ConnectionId) -> Option<&ConnectionState> {
        self.connections.get(&connection)
    }

    pub fn registry(&self) -> &PlayerRegistry {
        &self.registry
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn leaderboard(&self) -> &Leaderboard {
        &self.leaderboard
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    #[cfg(test)]
    pub(crate) fn registry_mut(&mut self) -> &mut PlayerRegistry {
        &mut self.registry
    }
}
