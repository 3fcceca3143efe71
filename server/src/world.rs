//! Procedural pipe course shared by every player.
//!
//! The course only ever grows to the right: each pipe is placed one
//! `pipe_spacing` after the previous one, and pipes left far behind the slowest
//! player are pruned so the queue stays bounded.

use crate::config::WorldConfig;
use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{GameStateView, Pipe};
use std::collections::VecDeque;

#[derive(Debug)]
pub struct World {
    config: WorldConfig,
    pipes: VecDeque<Pipe>,
    last_pipe_x: f32,
    /// Number of pipes ever generated; also the next pipe id.
    next_id: u32,
    rng: StdRng,
}

impl World {
    pub fn new(config: WorldConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut world = Self {
            last_pipe_x: config.first_pipe_x,
            config,
            pipes: VecDeque::new(),
            next_id: 0,
            rng,
        };
        world.lay_initial_course();
        world
    }

    /// Lays down the opening pipes. Runs once; the course is never rebuilt.
    fn lay_initial_course(&mut self) {
        for _ in 0..self.config.initial_pipes {
            self.generate_next();
        }
        info!(
            "Course created with {} pipes up to x={}",
            self.pipes.len(),
            self.last_pipe_x
        );
    }

    /// Difficulty for the next pipe, saturating at 1.
    pub fn difficulty(&self) -> f32 {
        (self.next_id as f32 * self.config.difficulty_step).min(1.0)
    }

    /// Appends one pipe at `last_pipe_x + pipe_spacing`.
    pub fn generate_next(&mut self) -> &Pipe {
        let cfg = &self.config;
        let difficulty = self.difficulty();

        let max_gap =
            cfg.max_gap_height - (cfg.max_gap_height - cfg.min_gap_height) * difficulty;
        let gap_height = if max_gap > cfg.min_gap_height {
            self.rng.gen_range(cfg.min_gap_height..=max_gap)
        } else {
            cfg.min_gap_height
        };

        let top_max = (cfg.max_pipe_height - cfg.min_pipe_height - gap_height)
            .max(cfg.min_pipe_height);
        let top = self.rng.gen_range(cfg.min_pipe_height..=top_max).floor();

        let pipe = Pipe {
            id: self.next_id,
            x: self.last_pipe_x + cfg.pipe_spacing,
            top,
            width: cfg.pipe_width,
            gap_height,
            passed: false,
            difficulty,
        };

        self.next_id += 1;
        self.last_pipe_x = pipe.x;
        self.pipes.push_back(pipe);
        &self.pipes[self.pipes.len() - 1]
    }

    /// Generates at most one pipe when `player_x` is within render distance of
    /// the end of the course. Returns the id of the new pipe, if any.
    pub fn extend_for(&mut self, player_x: f32) -> Option<u32> {
        if player_x > self.last_pipe_x - self.config.render_distance {
            let pipe = self.generate_next();
            debug!("Generated pipe {} at x={}", pipe.id, pipe.x);
            Some(pipe.id)
        } else {
            None
        }
    }

    /// Drops pipes with `x < min_player_x - cleanup_margin`.
    pub fn prune_behind(&mut self, min_player_x: f32) -> usize {
        let cutoff = min_player_x - self.config.cleanup_margin;
        let mut removed = 0;

        while self.pipes.front().is_some_and(|pipe| pipe.x < cutoff) {
            self.pipes.pop_front();
            removed += 1;
        }

        if removed > 0 {
            debug!("Pruned {} pipes behind x={}", removed, cutoff);
        }
        removed
    }

    /// Pipes strictly closer than `radius` to `center`, in course order.
    pub fn pipes_near(&self, center: f32, radius: f32) -> Vec<Pipe> {
        self.pipes
            .iter()
            .skip_while(|pipe| pipe.x <= center - radius)
            .take_while(|pipe| pipe.x < center + radius)
            .cloned()
            .collect()
    }

    pub fn pipes(&self) -> impl Iterator<Item = &Pipe> {
        self.pipes.iter()
    }

    pub fn len(&self) -> usize {
        self.pipes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pipes.is_empty()
    }

    pub fn last_pipe_x(&self) -> f32 {
        self.last_pipe_x
    }

    pub fn render_distance(&self) -> f32 {
        self.config.render_distance
    }

    /// Full, unfiltered course.
    pub fn view(&self) -> GameStateView {
        self.view_with(self.pipes.iter().cloned().collect())
    }

    pub fn view_with(&self, pipes: Vec<Pipe>) -> GameStateView {
        GameStateView {
            pipes,
            last_pipe_x: self.last_pipe_x,
            max_pipe_id: self.next_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn seeded() -> WorldConfig {
        WorldConfig {
            seed: Some(7),
            ..WorldConfig::default()
        }
    }

    #[test]
    fn test_initial_course() {
        let world = World::new(seeded());
        assert_eq!(world.len(), shared::INITIAL_PIPES);

        let xs: Vec<f32> = world.pipes().map(|p| p.x).collect();
        assert_approx_eq!(xs[0], shared::FIRST_PIPE_X + shared::PIPE_SPACING);
        for pair in xs.windows(2) {
            assert_approx_eq!(pair[1] - pair[0], shared::PIPE_SPACING);
        }
        assert_approx_eq!(world.last_pipe_x(), *xs.last().unwrap());
        assert!(world.pipes().all(|p| !p.passed));
    }

    #[test]
    fn test_ids_and_positions_strictly_increase() {
        let mut world = World::new(seeded());
        for _ in 0..200 {
            world.generate_next();
        }

        let pipes: Vec<&Pipe> = world.pipes().collect();
        for pair in pipes.windows(2) {
            assert!(pair[1].x > pair[0].x);
            assert_eq!(pair[1].id, pair[0].id + 1);
        }
    }

    #[test]
    fn test_gap_and_top_within_bounds() {
        let config = seeded();
        let mut world = World::new(config.clone());
        for _ in 0..500 {
            world.generate_next();
        }

        for pipe in world.pipes() {
            assert!(pipe.gap_height >= config.min_gap_height);
            assert!(pipe.gap_height <= config.max_gap_height);
            assert!(pipe.top >= config.min_pipe_height);
            assert!(pipe.gap_bottom() <= config.max_pipe_height - config.min_pipe_height + 1.0);
            assert!((0.0..=1.0).contains(&pipe.difficulty));
        }
    }

    #[test]
    fn test_difficulty_narrows_gap() {
        let mut world = World::new(seeded());
        for _ in 0..20 {
            world.generate_next();
        }
        assert_approx_eq!(world.difficulty(), 1.0);

        let pipe = world.generate_next().clone();
        assert_approx_eq!(pipe.difficulty, 1.0);
        assert_approx_eq!(pipe.gap_height, shared::MIN_GAP_HEIGHT);
    }

    #[test]
    fn test_extend_for_generates_one_pipe() {
        let mut world = World::new(seeded());
        let old_last = world.last_pipe_x();
        let old_len = world.len();

        assert_eq!(world.extend_for(100.0), None);
        assert_eq!(world.len(), old_len);

        let id = world.extend_for(2000.0);
        assert_eq!(id, Some(old_len as u32));
        assert_eq!(world.len(), old_len + 1);
        assert_approx_eq!(world.last_pipe_x(), old_last + shared::PIPE_SPACING);
    }

    #[test]
    fn test_prune_behind() {
        let mut world = World::new(seeded());
        for _ in 0..20 {
            world.generate_next();
        }

        let cutoff_player = 2500.0;
        let removed = world.prune_behind(cutoff_player);
        assert!(removed > 0);
        assert!(world
            .pipes()
            .all(|p| p.x >= cutoff_player - shared::CLEANUP_MARGIN));
        assert_eq!(world.prune_behind(cutoff_player), 0);
    }

    #[test]
    fn test_pipes_near_respects_radius() {
        let mut world = World::new(seeded());
        for _ in 0..30 {
            world.generate_next();
        }

        let near = world.pipes_near(3000.0, 1000.0);
        assert!(!near.is_empty());
        assert!(near.iter().all(|p| (p.x - 3000.0).abs() < 1000.0));

        let expected = world
            .pipes()
            .filter(|p| (p.x - 3000.0).abs() < 1000.0)
            .count();
        assert_eq!(near.len(), expected);
    }

    #[test]
    fn test_pruning_everything_keeps_counters() {
        let mut world = World::new(seeded());
        let last = world.last_pipe_x();
        let next = world.view().max_pipe_id;

        world.prune_behind(last + 10_000.0);
        assert!(world.is_empty());

        let pipe = world.generate_next().clone();
        assert_eq!(pipe.id, next);
        assert_approx_eq!(pipe.x, last + shared::PIPE_SPACING);
    }
}
