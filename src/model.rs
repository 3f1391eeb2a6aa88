//! Simulation data types.

use crate::vector::Vec2;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Primary life-cycle state of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgentKind {
    Human,
    Infected,
    Zombie,
    Dead,
}

/// Zombie sub-classification. Ignored unless the agent is a [`AgentKind::Zombie`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Variant {
    #[default]
    Shambler,
    Runner,
    Tank,
}

impl Variant {
    pub const ALL: [Variant; 3] = [Variant::Shambler, Variant::Runner, Variant::Tank];
}

/// A mobile agent.
///
/// `id` is unique within a run and identifies the agent in neighbor loops.
/// `Dead` agents are kept in the collection but never move again.
#[derive(Debug, Clone)]
pub struct Agent {
    pub id: u64,
    pub kind: AgentKind,
    pub variant: Variant,
    pub position: Vec2,
    pub velocity: Vec2,
    /// Wander angle in radians, persisted so the random walk stays smooth.
    pub heading: f64,
    /// Ticks left before an infected agent turns.
    pub incubation_remaining: u32,
    /// Assigned from the variant. Nothing consumes it yet.
    pub hit_points: u32,
    pub lifetime_ticks: u32,
    pub is_patient_zero: bool,
    /// Most recent positions, oldest first.
    pub trail: VecDeque<Vec2>,
}

impl Agent {
    pub fn is_alive(&self) -> bool {
        self.kind != AgentKind::Dead
    }

    /// Record `position` in the trail, dropping the oldest entries beyond `capacity`.
    pub fn push_trail(&mut self, position: Vec2, capacity: usize) {
        self.trail.push_back(position);
        while self.trail.len() > capacity {
            self.trail.pop_front();
        }
    }
}

/// Static axis-aligned rectangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Obstacle {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Obstacle {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn contains(&self, point: Vec2) -> bool {
        point.x >= self.x
            && point.x <= self.x + self.width
            && point.y >= self.y
            && point.y <= self.y + self.height
    }

    /// Point of the rectangle nearest to `point` (the point itself when inside).
    pub fn closest_point(&self, point: Vec2) -> Vec2 {
        Vec2::new(
            point.x.clamp(self.x, self.x + self.width),
            point.y.clamp(self.y, self.y + self.height),
        )
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

/// Population counts at one sampled tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PopulationSample {
    pub tick: u64,
    pub humans: usize,
    pub infected: usize,
    pub zombies: usize,
}

/// Current population counts and elapsed ticks.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub humans: usize,
    pub infected: usize,
    pub zombies: usize,
    pub dead: usize,
    pub elapsed: u64,
}

impl Stats {
    pub fn sample(&self) -> PopulationSample {
        PopulationSample {
            tick: self.elapsed,
            humans: self.humans,
            infected: self.infected,
            zombies: self.zombies,
        }
    }
}

/// Exported observation of a run at a single tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    pub stats: Stats,

    /// Humans infected during this tick.
    pub new_infections: usize,

    /// Current day/night factor.
    pub night: f64,
}
