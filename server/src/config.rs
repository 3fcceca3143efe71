//! Tunables for the world generator, view filter and scheduler.

use shared::{
    CLEANUP_MARGIN, DIFFICULTY_STEP, FIRST_PIPE_X, INITIAL_PIPES, LEADERBOARD_SIZE,
    LIVENESS_TIMEOUT_SECS, MAX_GAP_HEIGHT, MAX_PIPE_HEIGHT, MAX_RENDERED_PEERS, MIN_GAP_HEIGHT,
    MIN_PIPE_HEIGHT, PIPE_SPACING, PIPE_WIDTH, RENDER_DISTANCE, TICK_MS,
};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("tick interval must be greater than zero")]
    ZeroTick,

    #[error("liveness timeout must be greater than zero")]
    ZeroLivenessTimeout,

    #[error("pipe spacing must be positive (got {0})")]
    NonPositiveSpacing(f32),

    #[error("render distance must be positive (got {0})")]
    NonPositiveRenderDistance(f32),

    #[error("min gap height {min} exceeds max gap height {max}")]
    GapRange { min: f32, max: f32 },

    #[error("max gap height {gap} does not fit between pipe heights {min}..{max}")]
    GapDoesNotFit { gap: f32, min: f32, max: f32 },

    #[error("difficulty step must be within 0..=1 (got {0})")]
    DifficultyStep(f32),
}

/// Course geometry and difficulty curve.
#[derive(Debug, Clone, PartialEq)]
pub struct WorldConfig {
    pub pipe_spacing: f32,
    pub pipe_width: f32,
    pub min_pipe_height: f32,
    pub max_pipe_height: f32,
    pub min_gap_height: f32,
    pub max_gap_height: f32,
    pub difficulty_step: f32,
    pub initial_pipes: usize,
    pub first_pipe_x: f32,
    /// Pipes further than this behind the slowest player are dropped.
    pub cleanup_margin: f32,
    pub render_distance: f32,
    /// Fixed RNG seed; `None` seeds from the OS.
    pub seed: Option<u64>,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            pipe_spacing: PIPE_SPACING,
            pipe_width: PIPE_WIDTH,
            min_pipe_height: MIN_PIPE_HEIGHT,
            max_pipe_height: MAX_PIPE_HEIGHT,
            min_gap_height: MIN_GAP_HEIGHT,
            max_gap_height: MAX_GAP_HEIGHT,
            difficulty_step: DIFFICULTY_STEP,
            initial_pipes: INITIAL_PIPES,
            first_pipe_x: FIRST_PIPE_X,
            cleanup_margin: CLEANUP_MARGIN,
            render_distance: RENDER_DISTANCE,
            seed: None,
        }
    }
}

/// Everything the lobby and the server loop need.
#[derive(Debug, Clone, PartialEq)]
pub struct GameConfig {
    pub world: WorldConfig,
    pub tick_interval: Duration,
    pub liveness_timeout: Duration,
    pub sweep_interval: Duration,
    pub leaderboard_size: usize,
    pub max_rendered_peers: usize,
    /// Capacity of each connection's outbound frame queue.
    pub outbound_queue: usize,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            world: WorldConfig::default(),
            tick_interval: Duration::from_millis(TICK_MS),
            liveness_timeout: Duration::from_secs(LIVENESS_TIMEOUT_SECS),
            sweep_interval: Duration::from_secs(1),
            leaderboard_size: LEADERBOARD_SIZE,
            max_rendered_peers: MAX_RENDERED_PEERS,
            outbound_queue: 64,
        }
    }
}

impl GameConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let world = &self.world;

        if self.tick_interval.is_zero() {
            return Err(ConfigError::ZeroTick);
        }
        if self.liveness_timeout.is_zero() {
            return Err(ConfigError::ZeroLivenessTimeout);
        }
        if world.pipe_spacing <= 0.0 {
            return Err(ConfigError::NonPositiveSpacing(world.pipe_spacing));
        }
        if world.render_distance <= 0.0 {
            return Err(ConfigError::NonPositiveRenderDistance(world.render_distance));
        }
        if world.min_gap_height > world.max_gap_height {
            return Err(ConfigError::GapRange {
                min: world.min_gap_height,
                max: world.max_gap_height,
            });
        }
        if world.min_pipe_height * 2.0 + world.max_gap_height > world.max_pipe_height {
            return Err(ConfigError::GapDoesNotFit {
                gap: world.max_gap_height,
                min: world.min_pipe_height,
                max: world.max_pipe_height,
            });
        }
        if !(0.0..=1.0).contains(&world.difficulty_step) {
            return Err(ConfigError::DifficultyStep(world.difficulty_step));
        }

        Ok(())
    }
}
