use crate::agent::{self, IdGenerator, Outcome, TickContext};
use crate::config::Config;
use crate::grid::SpatialGrid;
use crate::model::{Agent, AgentKind, Obstacle, PopulationSample, Stats, Variant};
use crate::vector::Vec2;
use anyhow::{Context, Result};
use rand::prelude::*;
use rand_chacha::ChaCha12Rng;
use rand_distr::{Uniform, weighted::WeightedIndex};
use std::collections::VecDeque;
use std::f64::consts::TAU;

/// Simulation orchestrator.
///
/// Owns the world dimensions, agents, obstacles, spatial grid, clock and sampled
/// history, together with the random number generator driving every draw.
pub struct Simulation<R = ChaCha12Rng> {
    cfg: Config,
    width: f64,
    height: f64,
    agents: Vec<Agent>,
    obstacles: Vec<Obstacle>,
    grid: SpatialGrid,
    tick: u64,
    history: VecDeque<PopulationSample>,
    ids: IdGenerator,
    variant_dist: WeightedIndex<f64>,
    incubation_dist: Uniform<u32>,
    rng: R,
}

impl Simulation<ChaCha12Rng> {
    /// Create a simulation seeded from the operating system.
    pub fn new(cfg: Config, width: f64, height: f64) -> Result<Self> {
        let rng = ChaCha12Rng::try_from_os_rng().context("failed to seed rng")?;
        Self::with_rng(cfg, width, height, rng)
    }

    /// Create a reproducible simulation from a fixed seed.
    pub fn from_seed(cfg: Config, width: f64, height: f64, seed: u64) -> Result<Self> {
        Self::with_rng(cfg, width, height, ChaCha12Rng::seed_from_u64(seed))
    }
}

impl<R: Rng> Simulation<R> {
    /// Create a simulation drawing from `rng` and populate it.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid.
    pub fn with_rng(cfg: Config, width: f64, height: f64, rng: R) -> Result<Self> {
        cfg.validate().context("failed to validate config")?;

        let variant_dist = WeightedIndex::new(cfg.variants.weights())
            .context("failed to build variant distribution")?;
        let incubation_dist =
            Uniform::new_inclusive(cfg.infection.incubation_min, cfg.infection.incubation_max)
                .context("failed to build incubation distribution")?;
        let grid = SpatialGrid::new(width, height, cfg.grid.cell_size);
        let history = VecDeque::with_capacity(cfg.history.capacity);

        let mut sim = Self {
            cfg,
            width,
            height,
            agents: Vec::new(),
            obstacles: Vec::new(),
            grid,
            tick: 0,
            history,
            ids: IdGenerator::default(),
            variant_dist,
            incubation_dist,
            rng,
        };
        sim.reset();

        Ok(sim)
    }

    /// Discard every agent, obstacle and sample and start a fresh run.
    pub fn reset(&mut self) {
        self.agents.clear();
        self.history.clear();
        self.grid.clear();
        self.tick = 0;
        self.ids.reset();

        self.obstacles = self.generate_obstacles();
        self.spawn_population();

        log::info!(
            "initialized {}x{} world with {} agents and {} obstacles",
            self.width,
            self.height,
            self.agents.len(),
            self.obstacles.len()
        );
    }

    /// Advance the world by one tick and return the number of new infections.
    pub fn step(&mut self) -> usize {
        self.tick += 1;

        self.grid.clear();
        for (idx, agent) in self.agents.iter().enumerate() {
            if agent.is_alive() {
                self.grid.insert(idx, agent.position);
            }
        }

        let night = self.night_factor();
        let ctx = TickContext {
            cfg: &self.cfg,
            grid: &self.grid,
            obstacles: &self.obstacles,
            width: self.width,
            height: self.height,
            night,
            variant_dist: &self.variant_dist,
        };

        let mut turned = 0;
        let mut died = 0;
        for idx in 0..self.agents.len() {
            match agent::update_agent(&mut self.agents, idx, &ctx, &mut self.rng) {
                Outcome::Turned(variant) => {
                    log::debug!("agent {} turned into a {variant:?}", self.agents[idx].id);
                    turned += 1;
                }
                Outcome::Died => died += 1,
                Outcome::Moved | Outcome::Inert => {}
            }
        }

        let new_infections = agent::resolve_infections(
            &mut self.agents,
            &self.cfg,
            &self.incubation_dist,
            &mut self.rng,
        );
        if new_infections > 0 || turned > 0 || died > 0 {
            log::debug!(
                "tick {}: {new_infections} infected, {turned} turned, {died} died",
                self.tick
            );
        }

        if self.tick % self.cfg.history.sample_interval == 0 {
            let sample = self.stats().sample();
            if self.history.len() == self.cfg.history.capacity {
                self.history.pop_front();
            }
            self.history.push_back(sample);
        }

        new_infections
    }

    /// Spawn a zombie at `point`, clamped into the world.
    ///
    /// Points inside an obstacle are ignored. Returns whether an agent was added.
    pub fn inject_zombie(&mut self, point: Vec2) -> bool {
        let point = Vec2::new(
            point.x.clamp(0.0, self.width),
            point.y.clamp(0.0, self.height),
        );
        if self.obstacles.iter().any(|obstacle| obstacle.contains(point)) {
            log::debug!("rejected zombie injection inside an obstacle at {point:?}");
            return false;
        }

        let id = self.ids.next_id();
        let zombie = agent::spawn(id, AgentKind::Zombie, point, false, &self.cfg, &mut self.rng);
        self.agents.push(zombie);
        true
    }

    /// Change the world dimensions. Agents and obstacles stay where they are.
    pub fn resize(&mut self, width: f64, height: f64) {
        self.width = width;
        self.height = height;
        self.grid.resize(width, height);
    }

    /// Population counts from a full scan.
    pub fn stats(&self) -> Stats {
        let mut stats = Stats {
            elapsed: self.tick,
            ..Stats::default()
        };
        for agent in &self.agents {
            match agent.kind {
                AgentKind::Human => stats.humans += 1,
                AgentKind::Infected => stats.infected += 1,
                AgentKind::Zombie => stats.zombies += 1,
                AgentKind::Dead => stats.dead += 1,
            }
        }
        stats
    }

    /// Day/night factor in `[0, 1]`: 0 at the start of each cycle, 1 halfway through.
    pub fn night_factor(&self) -> f64 {
        night_factor(self.tick, self.cfg.cycle.length)
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn obstacles(&self) -> &[Obstacle] {
        &self.obstacles
    }

    pub fn history(&self) -> &VecDeque<PopulationSample> {
        &self.history
    }

    pub fn grid(&self) -> &SpatialGrid {
        &self.grid
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn cfg(&self) -> &Config {
        &self.cfg
    }

    fn center(&self) -> Vec2 {
        Vec2::new(self.width / 2.0, self.height / 2.0)
    }

    fn generate_obstacles(&mut self) -> Vec<Obstacle> {
        let layout = &self.cfg.obstacles;
        let center = self.center();
        let clearance_sq = layout.center_clearance * layout.center_clearance;

        let count = self.rng.random_range(layout.min_count..=layout.max_count);
        let mut obstacles = Vec::with_capacity(count);

        for _ in 0..count {
            for _ in 0..layout.placement_attempts {
                let width = self.rng.random_range(layout.min_size..=layout.max_size);
                let height = self.rng.random_range(layout.min_size..=layout.max_size);
                let x_max = self.width - layout.margin - width;
                let y_max = self.height - layout.margin - height;
                let (Some(x), Some(y)) = (
                    sample_span(&mut self.rng, layout.margin, x_max),
                    sample_span(&mut self.rng, layout.margin, y_max),
                ) else {
                    break;
                };

                let obstacle = Obstacle::new(x, y, width, height);
                if obstacle.closest_point(center).distance_squared(center) > clearance_sq {
                    obstacles.push(obstacle);
                    break;
                }
            }
        }

        obstacles
    }

    fn spawn_population(&mut self) {
        let margin = self.cfg.population.spawn_margin;
        let radius = self.cfg.agent.radius;

        for _ in 0..self.cfg.population.humans {
            let mut position = self.center();
            let mut placed = false;
            for _ in 0..self.cfg.population.spawn_attempts {
                let x = sample_span(&mut self.rng, margin, self.width - margin);
                let y = sample_span(&mut self.rng, margin, self.height - margin);
                position = Vec2::new(
                    x.unwrap_or(self.width / 2.0),
                    y.unwrap_or(self.height / 2.0),
                );
                if !self.blocked(position, radius) {
                    placed = true;
                    break;
                }
            }
            if !placed {
                log::warn!("placing human at {position:?} despite obstacle overlap");
            }

            let id = self.ids.next_id();
            let human =
                agent::spawn(id, AgentKind::Human, position, false, &self.cfg, &mut self.rng);
            self.agents.push(human);
        }

        let jitter = Uniform::new_inclusive(
            -self.cfg.population.zombie_spawn_jitter,
            self.cfg.population.zombie_spawn_jitter,
        );
        let radius = self.cfg.variants.params(Variant::Shambler).radius;
        for i in 0..self.cfg.population.zombies {
            // The center itself is kept clear by the obstacle layout.
            let mut position = self.center();
            if let Ok(jitter) = &jitter {
                for _ in 0..self.cfg.population.spawn_attempts {
                    let x = jitter.sample(&mut self.rng);
                    let y = jitter.sample(&mut self.rng);
                    let candidate = self.center() + Vec2::new(x, y);
                    if !self.blocked(candidate, radius) {
                        position = candidate;
                        break;
                    }
                }
            }

            let id = self.ids.next_id();
            let zombie =
                agent::spawn(id, AgentKind::Zombie, position, i == 0, &self.cfg, &mut self.rng);
            self.agents.push(zombie);
        }
    }

    // Inside an obstacle grown by `radius` on every side.
    fn blocked(&self, point: Vec2, radius: f64) -> bool {
        self.obstacles.iter().any(|obstacle| {
            obstacle.closest_point(point).distance_squared(point) <= radius * radius
        })
    }
}

/// `(1 - cos(2π·(tick mod cycle)/cycle)) / 2`.
pub fn night_factor(tick: u64, cycle: u64) -> f64 {
    let phase = (tick % cycle) as f64 / cycle as f64;
    (1.0 - (phase * TAU).cos()) / 2.0
}

// Uniform draw from `[low, high]`, or `None` when the span is empty.
fn sample_span<R: Rng + ?Sized>(rng: &mut R, low: f64, high: f64) -> Option<f64> {
    if high < low {
        return None;
    }
    Some(rng.random_range(low..=high))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> Config {
        let mut cfg = Config::default();
        cfg.population.humans = 80;
        cfg
    }

    fn sim(cfg: Config, seed: u64) -> Simulation {
        Simulation::from_seed(cfg, 1000.0, 800.0, seed).expect("valid config")
    }

    #[test]
    fn initializes_population_and_layout() {
        let sim = sim(small_config(), 1);
        let stats = sim.stats();
        assert_eq!(stats.humans, 80);
        assert_eq!(stats.zombies, 1);
        assert_eq!(stats.elapsed, 0);

        let ids: Vec<_> = sim.agents().iter().map(|a| a.id).collect();
        assert_eq!(ids, (0..81).collect::<Vec<_>>());

        let patient_zero: Vec<_> = sim.agents().iter().filter(|a| a.is_patient_zero).collect();
        assert_eq!(patient_zero.len(), 1);
        assert_eq!(patient_zero[0].kind, AgentKind::Zombie);

        let layout = &sim.cfg().obstacles;
        assert!(sim.obstacles().len() <= layout.max_count);
        let center = Vec2::new(500.0, 400.0);
        for obstacle in sim.obstacles() {
            assert!(obstacle.closest_point(center).distance(center) > layout.center_clearance);
        }
    }

    #[test]
    fn invalid_config_fails_at_construction() {
        let mut cfg = small_config();
        cfg.variants.runner.weight = 0.9;
        assert!(Simulation::from_seed(cfg, 1000.0, 800.0, 0).is_err());
    }

    #[test]
    fn speed_and_bounds_hold_every_tick() {
        let mut sim = sim(small_config(), 2);
        for _ in 0..400 {
            sim.step();
            let night = sim.night_factor();
            for agent in sim.agents().iter().filter(|a| a.is_alive()) {
                let cap = agent::max_speed(agent, sim.cfg(), night);
                assert!(agent.velocity.length() <= cap + 1e-9, "{agent:?} exceeds {cap}");

                let r = agent::radius(agent, sim.cfg());
                assert!(agent.position.x >= r - 1e-9 && agent.position.x <= 1000.0 - r + 1e-9);
                assert!(agent.position.y >= r - 1e-9 && agent.position.y <= 800.0 - r + 1e-9);
                assert!(agent.trail.len() <= sim.cfg().agent.trail_length);
            }
        }
    }

    #[test]
    fn incubation_never_increases_until_turning() {
        let mut sim = sim(small_config(), 3);
        let mut previous: Vec<Option<u32>> = vec![None; sim.agents().len()];
        for _ in 0..600 {
            sim.step();
            for (idx, agent) in sim.agents().iter().enumerate().take(previous.len()) {
                let current =
                    (agent.kind == AgentKind::Infected).then_some(agent.incubation_remaining);
                if let (Some(before), Some(now)) = (previous[idx], current) {
                    assert!(now <= before);
                }
                previous[idx] = current;
            }
        }
    }

    #[test]
    fn outbreak_spreads_from_patient_zero() {
        let mut cfg = small_config();
        cfg.population.humans = 200;
        cfg.speed.human = 1.0;
        let mut sim = sim(cfg, 4);
        let mut infections = 0;
        for _ in 0..2000 {
            infections += sim.step();
        }
        let stats = sim.stats();
        assert!(infections > 0);
        assert_eq!(stats.humans + infections, 200);
        assert_eq!(stats.humans + stats.infected + stats.zombies + stats.dead, 201);
    }

    #[test]
    fn initial_zombies_avoid_obstacles() {
        let mut cfg = small_config();
        cfg.population.humans = 0;
        cfg.population.zombies = 10;
        cfg.population.zombie_spawn_jitter = 150.0;
        cfg.obstacles.center_clearance = 20.0;
        cfg.obstacles.min_count = 8;
        cfg.obstacles.max_count = 12;

        for seed in 0..50 {
            let sim = sim(cfg.clone(), seed);
            for zombie in sim.agents() {
                assert!(
                    !sim.obstacles().iter().any(|o| o.contains(zombie.position)),
                    "seed {seed}: {zombie:?} spawned inside an obstacle"
                );
            }
        }
    }

    #[test]
    fn rejected_injection_leaves_agents_unchanged() {
        let mut sim = sim(small_config(), 5);
        let obstacle = *sim.obstacles().first().expect("layout has obstacles");
        let before = sim.agents().len();

        assert!(!sim.inject_zombie(obstacle.center()));
        assert_eq!(sim.agents().len(), before);

        let free = (0..1000)
            .map(|i| Vec2::new((i % 40) as f64 * 25.0, (i / 40) as f64 * 32.0))
            .find(|p| !sim.obstacles().iter().any(|o| o.contains(*p)))
            .expect("some free point");
        assert!(sim.inject_zombie(free));
        let added = sim.agents().last().expect("injected zombie");
        assert_eq!(added.kind, AgentKind::Zombie);
        assert!(!added.is_patient_zero);
        assert_eq!(added.id, before as u64);
    }

    #[test]
    fn dead_agents_are_kept_but_not_gridded() {
        let mut cfg = small_config();
        cfg.variants.runner_lifespan = 3;
        let mut sim = sim(cfg, 6);
        let zombie = sim
            .agents
            .iter_mut()
            .find(|a| a.kind == AgentKind::Zombie)
            .expect("initial zombie");
        zombie.variant = crate::model::Variant::Runner;
        let before = sim.agents().len();

        for _ in 0..5 {
            sim.step();
        }
        assert_eq!(sim.agents().len(), before);
        assert_eq!(sim.stats().dead, 1);

        let dead_idx = sim
            .agents()
            .iter()
            .position(|a| a.kind == AgentKind::Dead)
            .expect("dead runner");
        sim.step();
        let pos = sim.agents()[dead_idx].position;
        assert!(!sim.grid().query(pos.x, pos.y).contains(&dead_idx));
    }

    #[test]
    fn history_samples_at_interval_and_stays_bounded() {
        let mut cfg = small_config();
        cfg.history.sample_interval = 10;
        cfg.history.capacity = 5;
        let mut sim = sim(cfg, 7);

        for _ in 0..35 {
            sim.step();
        }
        let ticks: Vec<_> = sim.history().iter().map(|s| s.tick).collect();
        assert_eq!(ticks, vec![10, 20, 30]);

        for _ in 0..65 {
            sim.step();
        }
        let ticks: Vec<_> = sim.history().iter().map(|s| s.tick).collect();
        assert_eq!(ticks, vec![60, 70, 80, 90, 100]);
    }

    #[test]
    fn night_factor_follows_cycle() {
        let cycle = 3600;
        let dawn = night_factor(0, cycle);
        let midnight = night_factor(cycle / 2, cycle);
        assert!(dawn < 1e-9);
        assert!(midnight - dawn >= 0.5);
        assert!((night_factor(cycle, cycle) - dawn).abs() < 1e-9);
        assert!((night_factor(cycle / 4, cycle) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn resize_updates_grid_and_is_idempotent() {
        let mut sim = sim(small_config(), 8);
        let dims = (sim.grid().cols(), sim.grid().rows());
        sim.resize(1000.0, 800.0);
        assert_eq!((sim.grid().cols(), sim.grid().rows()), dims);

        sim.resize(1600.0, 900.0);
        assert_eq!((sim.grid().cols(), sim.grid().rows()), (8, 5));
        assert_eq!(sim.width(), 1600.0);
        sim.step();
    }

    #[test]
    fn reset_restarts_ids_and_clock() {
        let mut sim = sim(small_config(), 9);
        for _ in 0..50 {
            sim.step();
        }
        sim.inject_zombie(Vec2::new(1.0, 1.0));
        sim.reset();

        assert_eq!(sim.tick_count(), 0);
        assert!(sim.history().is_empty());
        assert_eq!(sim.agents().len(), 81);
        assert_eq!(sim.agents()[0].id, 0);
    }

    #[test]
    fn same_seed_same_run() {
        let mut a = sim(small_config(), 10);
        let mut b = sim(small_config(), 10);
        for _ in 0..100 {
            assert_eq!(a.step(), b.step());
        }
        let pa: Vec<_> = a.agents().iter().map(|x| x.position).collect();
        let pb: Vec<_> = b.agents().iter().map(|x| x.position).collect();
        assert_eq!(pa, pb);
    }
}
