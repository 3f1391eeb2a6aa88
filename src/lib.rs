//! Outbreak simulation core.
//!
//! Humans, infected, zombies and the dead move on a bounded plane under classic
//! steering behaviours. [`simulation::Simulation`] drives one tick at a time:
//! rebuild the [`grid::SpatialGrid`], update every agent, resolve bites and
//! sample the population. Renderers read its state and call
//! [`simulation::Simulation::inject_zombie`], `resize` and `reset`.

pub mod agent;
pub mod analysis;
pub mod config;
pub mod grid;
pub mod manager;
pub mod model;
pub mod simulation;
pub mod stats;
pub mod steering;
pub mod vector;

pub use config::Config;
pub use model::{Agent, AgentKind, Obstacle, PopulationSample, Stats, Variant};
pub use simulation::Simulation;
pub use vector::Vec2;
