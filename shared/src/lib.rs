//! Wire protocol and default tuning shared by the server, the bot client and
//! the integration tests.
//!
//! Every message is a JSON text frame with a `type` tag. Field names follow the
//! browser client (`worldX`, `isDead`, `gapHeight`, ...), so the serde renames
//! below are part of the protocol and must not change.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const PIPE_SPACING: f32 = 200.0;
pub const PIPE_WIDTH: f32 = 50.0;
pub const MIN_PIPE_HEIGHT: f32 = 50.0;
pub const MAX_PIPE_HEIGHT: f32 = 400.0;
pub const MIN_GAP_HEIGHT: f32 = 100.0;
pub const MAX_GAP_HEIGHT: f32 = 200.0;
pub const INITIAL_PIPES: usize = 5;
pub const FIRST_PIPE_X: f32 = 300.0;
pub const DIFFICULTY_STEP: f32 = 0.1;
pub const RENDER_DISTANCE: f32 = 1000.0;
pub const CLEANUP_MARGIN: f32 = 1000.0;
pub const SPAWN_X: f32 = 150.0;
pub const SPAWN_Y: f32 = 150.0;
pub const LEADERBOARD_SIZE: usize = 10;
pub const MAX_RENDERED_PEERS: usize = 10;
pub const TICK_MS: u64 = 30;
pub const LIVENESS_TIMEOUT_SECS: u64 = 10;
pub const CLIENT_UPDATE_INTERVAL_MS: u64 = 50;

/// Messages sent by a browser (or bot) client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    Init {
        name: String,
        #[serde(default = "default_spawn_x")]
        x: f32,
        #[serde(default = "default_spawn_y")]
        y: f32,
        #[serde(default)]
        score: u32,
        #[serde(default, rename = "isDead")]
        is_dead: bool,
    },
    Update {
        #[serde(default, rename = "playerId", skip_serializing_if = "Option::is_none")]
        player_id: Option<String>,
        x: f32,
        y: f32,
        score: u32,
        #[serde(default, rename = "isDead")]
        is_dead: bool,
    },
}

fn default_spawn_x() -> f32 {
    SPAWN_X
}

fn default_spawn_y() -> f32 {
    SPAWN_Y
}

/// Messages pushed by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMessage {
    /// One-time bootstrap for the registering connection, unfiltered.
    Init {
        #[serde(rename = "playerId")]
        player_id: String,
        players: BTreeMap<String, PlayerView>,
        #[serde(rename = "gameState")]
        game_state: GameStateView,
    },
    /// Per-recipient snapshot sent on every broadcast.
    State {
        players: BTreeMap<String, PlayerView>,
        #[serde(rename = "gameState")]
        game_state: GameStateView,
        #[serde(rename = "topPlayers")]
        top_players: Vec<LeaderboardEntry>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerView {
    pub name: String,
    #[serde(rename = "worldX")]
    pub world_x: f32,
    pub y: f32,
    pub score: u32,
    #[serde(rename = "isDead")]
    pub is_dead: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pipe {
    pub id: u32,
    pub x: f32,
    pub top: f32,
    pub width: f32,
    #[serde(rename = "gapHeight")]
    pub gap_height: f32,
    pub passed: bool,
    pub difficulty: f32,
}

impl Pipe {
    /// Lower edge of the passable gap.
    pub fn gap_bottom(&self) -> f32 {
        self.top + self.gap_height
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GameStateView {
    pub pipes: Vec<Pipe>,
    #[serde(rename = "lastPipeX")]
    pub last_pipe_x: f32,
    #[serde(rename = "maxPipeId")]
    pub max_pipe_id: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub id: String,
    pub name: String,
    pub score: u32,
    /// Milliseconds since the Unix epoch when the ranking was computed.
    pub timestamp: u64,
}

pub fn encode<T: Serialize>(message: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string(message)
}

pub fn decode_client(text: &str) -> Result<ClientMessage, serde_json::Error> {
    serde_json::from_str(text)
}

pub fn decode_server(text: &str) -> Result<ServerMessage, serde_json::Error> {
    serde_json::from_str(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_decode_init_from_browser() {
        let text = r#"{"type":"init","name":"ana","x":150,"y":150,"score":0,"isDead":false}"#;
        match decode_client(text).unwrap() {
            ClientMessage::Init {
                name,
                x,
                y,
                score,
                is_dead,
            } => {
                assert_eq!(name, "ana");
                assert_approx_eq!(x, 150.0);
                assert_approx_eq!(y, 150.0);
                assert_eq!(score, 0);
                assert!(!is_dead);
            }
            other => panic!("Unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_decode_init_defaults() {
        let msg = decode_client(r#"{"type":"init","name":"bo"}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::Init {
                name: "bo".to_string(),
                x: SPAWN_X,
                y: SPAWN_Y,
                score: 0,
                is_dead: false,
            }
        );
    }

    #[test]
    fn test_decode_update_ignores_extra_fields() {
        let text = r#"{"type":"update","playerId":"player_abc","x":412.5,"y":90,"score":3,"name":"ana","isDead":true}"#;
        match decode_client(text).unwrap() {
            ClientMessage::Update {
                player_id,
                x,
                score,
                is_dead,
                ..
            } => {
                assert_eq!(player_id.as_deref(), Some("player_abc"));
                assert_approx_eq!(x, 412.5);
                assert_eq!(score, 3);
                assert!(is_dead);
            }
            other => panic!("Unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_decode_rejects_malformed() {
        assert!(decode_client("not json").is_err());
        assert!(decode_client(r#"{"type":"teleport","x":1}"#).is_err());
        assert!(decode_client(r#"{"type":"update","x":1,"y":2,"score":-4}"#).is_err());
        assert!(decode_client(r#"{"name":"no type"}"#).is_err());
    }

    #[test]
    fn test_state_message_field_names() {
        let mut players = BTreeMap::new();
        players.insert(
            "player_a".to_string(),
            PlayerView {
                name: "a".to_string(),
                world_x: 10.0,
                y: 20.0,
                score: 1,
                is_dead: false,
            },
        );
        let msg = ServerMessage::State {
            players,
            game_state: GameStateView {
                pipes: vec![Pipe {
                    id: 0,
                    x: 500.0,
                    top: 80.0,
                    width: PIPE_WIDTH,
                    gap_height: 150.0,
                    passed: false,
                    difficulty: 0.0,
                }],
                last_pipe_x: 500.0,
                max_pipe_id: 1,
            },
            top_players: vec![],
        };

        let value: serde_json::Value = serde_json::from_str(&encode(&msg).unwrap()).unwrap();
        assert_eq!(value["type"], "state");
        assert_eq!(value["players"]["player_a"]["worldX"], 10.0);
        assert_eq!(value["players"]["player_a"]["isDead"], false);
        assert_eq!(value["gameState"]["pipes"][0]["gapHeight"], 150.0);
        assert_eq!(value["gameState"]["lastPipeX"], 500.0);
        assert_eq!(value["gameState"]["maxPipeId"], 1);
        assert!(value["topPlayers"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_pipe_gap_bottom() {
        let pipe = Pipe {
            id: 3,
            x: 900.0,
            top: 60.0,
            width: PIPE_WIDTH,
            gap_height: 120.0,
            passed: false,
            difficulty: 0.3,
        };
        assert_approx_eq!(pipe.gap_bottom(), 180.0);
    }

    #[test]
    fn test_default_gap_bounds_fit_pipe_band() {
        assert!(MIN_GAP_HEIGHT <= MAX_GAP_HEIGHT);
        assert!(MIN_PIPE_HEIGHT + MAX_GAP_HEIGHT <= MAX_PIPE_HEIGHT - MIN_PIPE_HEIGHT);
    }
}
