//! # Sync Server Library
//!
//! This library provides the authoritative server for the multiplayer
//! side-scroller. It owns the shared pipe course, the set of connected players
//! and the leaderboard, and keeps every client's view consistent by pushing a
//! per-player snapshot on a fixed tick.
//!
//! ## Core Responsibilities
//!
//! ### Shared World
//! The course is generated on the server so every player flies through the same
//! pipes. It grows one pipe at a time ahead of the fastest player and is pruned
//! behind the slowest one, so its length stays bounded.
//!
//! ### Connection Lifecycle
//! Handles the complete lifecycle of a client connection:
//! - Registration and identity assignment
//! - Applying position and score reports
//! - Disconnection and liveness-timeout cleanup
//!
//! ### State Broadcasting
//! Every tick each registered connection receives only the pipes and peers
//! inside its render window, plus the leaderboard. Lost snapshots are never
//! retried; the next tick supersedes them.
//!
//! ## Architecture Design
//!
//! ### Single-Owner Event Loop
//! One task owns the [`session::Lobby`] and processes connection events,
//! broadcast ticks and liveness sweeps sequentially. Connection tasks only parse
//! frames and forward them over a channel, so no lock guards the game state and
//! two updates can never race on the pipe queue.
//!
//! ### WebSocket Transport
//! Clients speak JSON over WebSocket text frames (see the `shared` crate).
//! Malformed frames are logged and dropped without closing the connection.
//!
//! ### Trusted Reports
//! Positions and scores are applied as reported. There is no server-side
//! physics, so a modified client can report anything.
//!
//! ## Module Organization
//!
//! ### Registry Module (`registry`)
//! Player records, identity generation and liveness expiry.
//!
//! ### World Module (`world`)
//! Procedural pipe generation, difficulty curve and pruning.
//!
//! ### Leaderboard Module (`leaderboard`)
//! Deterministic top-N ranking recomputed from the registry.
//!
//! ### View Module (`view`)
//! Render-distance filtering and peer capping for per-player snapshots.
//!
//! ### Session Module (`session`)
//! Connection state machine and the lobby that applies it.
//!
//! ### Network Module (`network`)
//! Listener, per-connection tasks and the main `select!` loop.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::GameConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut server = Server::bind("0.0.0.0:8080", GameConfig::default()).await?;
//!
//!     // Runs until the process is stopped:
//!     // - accepts WebSocket connections
//!     // - applies init/update messages in arrival order
//!     // - pushes filtered snapshots every tick
//!     // - evicts players that stopped reporting
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod leaderboard;
pub mod network;
pub mod registry;
pub mod session;
pub mod utils;
pub mod view;
pub mod world;
