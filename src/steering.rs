//! Steering behaviours.
//!
//! Each function returns a unit vector, or zero when the behaviour has nothing to
//! react to. Distances are compared squared and the result is normalized once.

use crate::model::{Agent, AgentKind, Obstacle};
use crate::vector::Vec2;
use rand::Rng;

/// Nudge `heading` by up to `jitter` radians and return the unit vector along it.
///
/// The heading is persisted by the caller so consecutive ticks wander coherently.
pub fn wander<R: Rng + ?Sized>(heading: &mut f64, jitter: f64, rng: &mut R) -> Vec2 {
    *heading += (rng.random::<f64>() - 0.5) * 2.0 * jitter;
    Vec2::from_angle(*heading)
}

pub fn seek(agent: &Agent, target: Vec2) -> Vec2 {
    (target - agent.position).normalize()
}

/// Steer away from the nearest zombie or infected agent within `radius`.
pub fn flee(agent: &Agent, neighbors: &[&Agent], radius: f64) -> Vec2 {
    let threat = nearest(agent, neighbors, radius, |kind| {
        matches!(kind, AgentKind::Zombie | AgentKind::Infected)
    });
    match threat {
        Some(threat) => (agent.position - threat.position).normalize(),
        None => Vec2::ZERO,
    }
}

/// Steer toward the nearest human or infected agent within `radius`.
pub fn seek_nearest(agent: &Agent, neighbors: &[&Agent], radius: f64) -> Vec2 {
    let target = nearest(agent, neighbors, radius, |kind| {
        matches!(kind, AgentKind::Human | AgentKind::Infected)
    });
    match target {
        Some(target) => seek(agent, target.position),
        None => Vec2::ZERO,
    }
}

/// Push away from every live neighbor within `radius`, closer ones harder.
pub fn separation(agent: &Agent, neighbors: &[&Agent], radius: f64) -> Vec2 {
    let radius_sq = radius * radius;
    let mut force = Vec2::ZERO;

    for other in neighbors {
        if other.id == agent.id || !other.is_alive() {
            continue;
        }
        let dist_sq = agent.position.distance_squared(other.position);
        if dist_sq > 0.0 && dist_sq < radius_sq {
            let away = (agent.position - other.position).normalize();
            let weight = 1.0 - dist_sq.sqrt() / radius;
            force += away * weight;
        }
    }

    force.normalize()
}

/// Steer toward the centroid of same-kind neighbors within `radius`.
pub fn cohesion(agent: &Agent, neighbors: &[&Agent], radius: f64) -> Vec2 {
    let radius_sq = radius * radius;
    let mut sum = Vec2::ZERO;
    let mut count = 0;

    for other in neighbors {
        if other.id == agent.id || other.kind != agent.kind {
            continue;
        }
        if agent.position.distance_squared(other.position) < radius_sq {
            sum += other.position;
            count += 1;
        }
    }

    if count == 0 {
        return Vec2::ZERO;
    }
    let centroid = sum * (1.0 / count as f64);
    (centroid - agent.position).normalize()
}

/// Repel from every obstacle whose nearest point is within `look_ahead`.
pub fn avoid_obstacles(position: Vec2, obstacles: &[Obstacle], look_ahead: f64) -> Vec2 {
    let look_ahead_sq = look_ahead * look_ahead;
    let mut force = Vec2::ZERO;

    for obstacle in obstacles {
        let closest = obstacle.closest_point(position);
        let dist_sq = position.distance_squared(closest);
        if dist_sq >= look_ahead_sq {
            continue;
        }
        if dist_sq == 0.0 {
            // Inside: head out through the side away from the centre.
            force += (position - obstacle.center()).normalize();
            continue;
        }
        let away = (position - closest).normalize();
        force += away * (1.0 - dist_sq.sqrt() / look_ahead);
    }

    force.normalize()
}

fn nearest<'a, F>(
    agent: &Agent,
    neighbors: &[&'a Agent],
    radius: f64,
    is_candidate: F,
) -> Option<&'a Agent>
where
    F: Fn(AgentKind) -> bool,
{
    let radius_sq = radius * radius;
    let mut closest_dist_sq = f64::INFINITY;
    let mut closest = None;

    for &other in neighbors {
        if other.id == agent.id || !is_candidate(other.kind) {
            continue;
        }
        let dist_sq = agent.position.distance_squared(other.position);
        if dist_sq < radius_sq && dist_sq < closest_dist_sq {
            closest_dist_sq = dist_sq;
            closest = Some(other);
        }
    }

    closest
}
