//! Agent spawning, per-tick update and infection resolution.

use crate::config::Config;
use crate::grid::SpatialGrid;
use crate::model::{Agent, AgentKind, Obstacle, Variant};
use crate::steering;
use crate::vector::Vec2;
use rand::prelude::*;
use rand_distr::{Uniform, weighted::WeightedIndex};
use std::collections::VecDeque;
use std::f64::consts::TAU;

/// Monotonic agent id source, owned by the simulation and reset with it.
#[derive(Debug, Default, Clone)]
pub struct IdGenerator {
    next: u64,
}

impl IdGenerator {
    pub fn next_id(&mut self) -> u64 {
        let id = self.next;
        self.next += 1;
        id
    }

    pub fn reset(&mut self) {
        self.next = 0;
    }
}

/// Create an agent with a random heading and a matching slow initial velocity.
///
/// Zombies are created as shamblers.
pub fn spawn<R: Rng + ?Sized>(
    id: u64,
    kind: AgentKind,
    position: Vec2,
    is_patient_zero: bool,
    cfg: &Config,
    rng: &mut R,
) -> Agent {
    let angle = rng.random::<f64>() * TAU;
    let variant = Variant::Shambler;
    let hit_points = match kind {
        AgentKind::Zombie => cfg.variants.params(variant).hit_points,
        _ => 0,
    };
    Agent {
        id,
        kind,
        variant,
        position,
        velocity: Vec2::from_angle(angle) * cfg.agent.initial_speed,
        heading: angle,
        incubation_remaining: 0,
        hit_points,
        lifetime_ticks: 0,
        is_patient_zero,
        trail: VecDeque::with_capacity(cfg.agent.trail_length + 1),
    }
}

/// Speed cap for the agent's kind and variant at the given day/night factor.
pub fn max_speed(agent: &Agent, cfg: &Config, night: f64) -> f64 {
    match agent.kind {
        AgentKind::Human => cfg.speed.human,
        AgentKind::Infected => cfg.speed.infected,
        AgentKind::Zombie => {
            let factor = cfg.variants.params(agent.variant).speed_factor;
            cfg.speed.zombie * factor * (1.0 + cfg.speed.night_boost * night)
        }
        AgentKind::Dead => 0.0,
    }
}

/// Bounding radius used for collisions.
pub fn radius(agent: &Agent, cfg: &Config) -> f64 {
    match agent.kind {
        AgentKind::Zombie => cfg.variants.params(agent.variant).radius,
        _ => cfg.agent.radius,
    }
}

/// Shared read-only inputs of one tick.
pub struct TickContext<'a> {
    pub cfg: &'a Config,
    pub grid: &'a SpatialGrid,
    pub obstacles: &'a [Obstacle],
    pub width: f64,
    pub height: f64,
    pub night: f64,
    pub variant_dist: &'a WeightedIndex<f64>,
}

/// What happened to an agent during its update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Already dead; nothing was done.
    Inert,
    Moved,
    /// Finished incubating and turned into the given variant, then moved.
    Turned(Variant),
    /// Runner outlived its lifespan.
    Died,
}

/// Advance agent `idx` by one tick.
///
/// Neighbors are read from `agents` as they are at this moment, so agents earlier
/// in the collection have already moved this tick while later ones have not.
pub fn update_agent<R: Rng + ?Sized>(
    agents: &mut [Agent],
    idx: usize,
    ctx: &TickContext<'_>,
    rng: &mut R,
) -> Outcome {
    let cfg = ctx.cfg;
    let mut outcome = Outcome::Moved;

    {
        let agent = &mut agents[idx];
        if !agent.is_alive() {
            return Outcome::Inert;
        }

        agent.lifetime_ticks = agent.lifetime_ticks.saturating_add(1);
        if agent.kind == AgentKind::Zombie
            && agent.variant == Variant::Runner
            && agent.lifetime_ticks > cfg.variants.runner_lifespan
        {
            agent.kind = AgentKind::Dead;
            agent.velocity = Vec2::ZERO;
            return Outcome::Died;
        }

        if agent.kind == AgentKind::Infected {
            agent.incubation_remaining = agent.incubation_remaining.saturating_sub(1);
            if agent.incubation_remaining == 0 {
                let variant = Variant::ALL[ctx.variant_dist.sample(rng)];
                agent.kind = AgentKind::Zombie;
                agent.variant = variant;
                agent.lifetime_ticks = 0;
                agent.hit_points = cfg.variants.params(variant).hit_points;
                outcome = Outcome::Turned(variant);
            }
        }
    }

    let mut heading = agents[idx].heading;
    let force = {
        let agent = &agents[idx];
        let neighbors: Vec<&Agent> = ctx
            .grid
            .query(agent.position.x, agent.position.y)
            .into_iter()
            .filter_map(|j| agents.get(j))
            .collect();
        steering_force(agent, &neighbors, ctx, &mut heading, rng)
    };

    let agent = &mut agents[idx];
    agent.heading = heading;
    integrate(agent, force, ctx);

    outcome
}

fn steering_force<R: Rng + ?Sized>(
    agent: &Agent,
    neighbors: &[&Agent],
    ctx: &TickContext<'_>,
    heading: &mut f64,
    rng: &mut R,
) -> Vec2 {
    let weights = &ctx.cfg.steering;
    let perception = &ctx.cfg.perception;

    let mut force = steering::avoid_obstacles(
        agent.position,
        ctx.obstacles,
        perception.obstacle_look_ahead,
    ) * weights.obstacle_weight;

    match agent.kind {
        AgentKind::Human => {
            force += steering::flee(agent, neighbors, perception.flee_radius) * weights.flee_weight;
            force += steering::separation(agent, neighbors, perception.separation_radius)
                * weights.separation_weight;
            force += steering::cohesion(agent, neighbors, perception.cohesion_radius)
                * weights.cohesion_weight;
            force += steering::wander(heading, weights.wander_jitter, rng) * weights.wander_weight;
        }
        AgentKind::Zombie => {
            force += steering::seek_nearest(agent, neighbors, perception.seek_radius)
                * weights.seek_weight;
            force += steering::separation(agent, neighbors, perception.separation_radius)
                * weights.separation_weight;
            force += steering::cohesion(agent, neighbors, perception.cohesion_radius)
                * weights.zombie_cohesion_weight;
            force += steering::wander(heading, weights.wander_jitter, rng) * weights.wander_weight;
        }
        AgentKind::Infected => {
            // Erratic: amplified wander, no seeking or fleeing.
            force += steering::wander(heading, weights.wander_jitter, rng)
                * (weights.wander_weight * weights.infected_wander_factor);
            force += steering::separation(agent, neighbors, perception.separation_radius)
                * weights.separation_weight;
        }
        AgentKind::Dead => return Vec2::ZERO,
    }

    force
}

fn integrate(agent: &mut Agent, force: Vec2, ctx: &TickContext<'_>) {
    let cfg = ctx.cfg;

    let cap = max_speed(agent, cfg, ctx.night);
    agent.velocity = (agent.velocity + force * cfg.speed.integration_gain).clamp_length(cap);

    agent.push_trail(agent.position, cfg.agent.trail_length);
    agent.position += agent.velocity;

    let radius = radius(agent, cfg);
    for obstacle in ctx.obstacles {
        collide_with_obstacle(agent, obstacle, radius);
    }
    collide_with_bounds(agent, radius, ctx.width, ctx.height);
}

/// Push the agent out of `obstacle` along the contact normal and bounce its velocity.
fn collide_with_obstacle(agent: &mut Agent, obstacle: &Obstacle, radius: f64) {
    let closest = obstacle.closest_point(agent.position);
    let offset = agent.position - closest;
    let dist_sq = offset.length_squared();
    if dist_sq >= radius * radius {
        return;
    }

    let (surface, normal) = if dist_sq > 0.0 {
        (closest, offset.normalize())
    } else {
        nearest_face(obstacle, agent.position)
    };

    agent.position = surface + normal * radius;
    let along = agent.velocity.dot(normal);
    if along < 0.0 {
        agent.velocity = agent.velocity - normal * (2.0 * along);
    }
}

// Surface point and outward normal of the face nearest to an interior point.
fn nearest_face(obstacle: &Obstacle, p: Vec2) -> (Vec2, Vec2) {
    let right = obstacle.x + obstacle.width;
    let bottom = obstacle.y + obstacle.height;
    let faces = [
        (p.x - obstacle.x, Vec2::new(obstacle.x, p.y), Vec2::new(-1.0, 0.0)),
        (right - p.x, Vec2::new(right, p.y), Vec2::new(1.0, 0.0)),
        (p.y - obstacle.y, Vec2::new(p.x, obstacle.y), Vec2::new(0.0, -1.0)),
        (bottom - p.y, Vec2::new(p.x, bottom), Vec2::new(0.0, 1.0)),
    ];
    let mut best = faces[0];
    for face in &faces[1..] {
        if face.0 < best.0 {
            best = *face;
        }
    }
    (best.1, best.2)
}

fn collide_with_bounds(agent: &mut Agent, radius: f64, width: f64, height: f64) {
    let pos = &mut agent.position;
    let vel = &mut agent.velocity;
    if pos.x < radius {
        pos.x = radius;
        vel.x = -vel.x;
    }
    if pos.x > width - radius {
        pos.x = width - radius;
        vel.x = -vel.x;
    }
    if pos.y < radius {
        pos.y = radius;
        vel.y = -vel.y;
    }
    if pos.y > height - radius {
        pos.y = height - radius;
        vel.y = -vel.y;
    }
}

/// Let every live zombie bite every human within bite range.
///
/// Humans are those at the start of the pass, so a human in reach of several
/// zombies keeps the incubation drawn for the last of them. Returns the number
/// of humans infected.
pub fn resolve_infections<R: Rng + ?Sized>(
    agents: &mut [Agent],
    cfg: &Config,
    incubation: &Uniform<u32>,
    rng: &mut R,
) -> usize {
    let bite_range_sq = cfg.infection.bite_range * cfg.infection.bite_range;

    let zombies: Vec<Vec2> = agents
        .iter()
        .filter(|agent| agent.kind == AgentKind::Zombie)
        .map(|agent| agent.position)
        .collect();
    let humans: Vec<usize> = agents
        .iter()
        .enumerate()
        .filter(|(_, agent)| agent.kind == AgentKind::Human)
        .map(|(idx, _)| idx)
        .collect();

    let mut infected = 0;
    for zombie in &zombies {
        for &idx in &humans {
            let target = &mut agents[idx];
            if zombie.distance_squared(target.position) >= bite_range_sq {
                continue;
            }
            if target.kind == AgentKind::Human {
                target.kind = AgentKind::Infected;
                target.velocity = target.velocity.clamp_length(cfg.speed.infected);
                infected += 1;
            }
            target.incubation_remaining = incubation.sample(rng);
        }
    }

    infected
}
