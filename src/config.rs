use crate::model::Variant;
use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::{fmt::Debug, fs, ops::RangeBounds, path::Path};

/// Simulation configuration parameters.
///
/// Loaded from a TOML file and validated before use. Every section and field
/// falls back to the stock tuning, so a file only needs the values it overrides.
/// See [`Config::from_file`] for loading.
#[derive(Debug, Default, PartialEq, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub world: WorldConfig,
    pub agent: AgentConfig,
    pub population: PopulationConfig,
    pub speed: SpeedConfig,
    pub perception: PerceptionConfig,
    pub steering: SteeringConfig,
    pub infection: InfectionConfig,
    pub variants: VariantsConfig,
    pub obstacles: ObstacleConfig,
    pub cycle: CycleConfig,
    pub history: HistoryConfig,
    pub grid: GridConfig,
    pub output: OutputConfig,
}

/// World dimensions used by the headless driver.
#[derive(Debug, PartialEq, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorldConfig {
    pub width: f64,
    pub height: f64,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            width: 1280.0,
            height: 720.0,
        }
    }
}

#[derive(Debug, PartialEq, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AgentConfig {
    /// Bounding radius of every agent except tank zombies.
    pub radius: f64,
    /// Number of past positions kept per agent.
    pub trail_length: usize,
    /// Speed of the randomly oriented velocity given at spawn.
    pub initial_speed: f64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            radius: 4.0,
            trail_length: 8,
            initial_speed: 0.5,
        }
    }
}

#[derive(Debug, PartialEq, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PopulationConfig {
    /// Humans spawned at initialization.
    pub humans: usize,
    /// Zombies spawned near the world centre at initialization.
    pub zombies: usize,
    /// Distance from the world edge kept free when scattering humans.
    pub spawn_margin: f64,
    /// Placement attempts per human before accepting an obstacle overlap.
    pub spawn_attempts: usize,
    /// Half-width of the square around the centre where initial zombies appear.
    pub zombie_spawn_jitter: f64,
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            humans: 300,
            zombies: 1,
            spawn_margin: 40.0,
            spawn_attempts: 32,
            zombie_spawn_jitter: 10.0,
        }
    }
}

#[derive(Debug, PartialEq, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SpeedConfig {
    pub human: f64,
    pub infected: f64,
    /// Base zombie speed, scaled by the variant factor and the night boost.
    pub zombie: f64,
    /// Extra fraction of zombie speed gained at full night.
    pub night_boost: f64,
    /// Fraction of the steering force added to the velocity each tick.
    pub integration_gain: f64,
}

impl Default for SpeedConfig {
    fn default() -> Self {
        Self {
            human: 2.2,
            infected: 1.2,
            zombie: 1.4,
            night_boost: 0.5,
            integration_gain: 0.15,
        }
    }
}

#[derive(Debug, PartialEq, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PerceptionConfig {
    pub flee_radius: f64,
    pub seek_radius: f64,
    pub cohesion_radius: f64,
    pub separation_radius: f64,
    pub obstacle_look_ahead: f64,
}

impl Default for PerceptionConfig {
    fn default() -> Self {
        Self {
            flee_radius: 120.0,
            seek_radius: 200.0,
            cohesion_radius: 60.0,
            separation_radius: 16.0,
            obstacle_look_ahead: 30.0,
        }
    }
}

impl PerceptionConfig {
    fn max_radius(&self) -> f64 {
        [
            self.flee_radius,
            self.seek_radius,
            self.cohesion_radius,
            self.separation_radius,
            self.obstacle_look_ahead,
        ]
        .into_iter()
        .fold(0.0, f64::max)
    }
}

#[derive(Debug, PartialEq, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SteeringConfig {
    pub flee_weight: f64,
    pub seek_weight: f64,
    pub separation_weight: f64,
    pub cohesion_weight: f64,
    pub zombie_cohesion_weight: f64,
    pub wander_weight: f64,
    /// Multiplier on the wander weight for infected agents.
    pub infected_wander_factor: f64,
    pub obstacle_weight: f64,
    /// Maximum heading change per tick, in radians.
    pub wander_jitter: f64,
}

impl Default for SteeringConfig {
    fn default() -> Self {
        Self {
            flee_weight: 3.0,
            seek_weight: 2.0,
            separation_weight: 2.5,
            cohesion_weight: 0.3,
            zombie_cohesion_weight: 0.15,
            wander_weight: 0.8,
            infected_wander_factor: 1.5,
            obstacle_weight: 4.0,
            wander_jitter: 0.3,
        }
    }
}

#[derive(Debug, PartialEq, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InfectionConfig {
    pub bite_range: f64,
    /// Shortest incubation, in ticks.
    pub incubation_min: u32,
    /// Longest incubation, in ticks.
    pub incubation_max: u32,
}

impl Default for InfectionConfig {
    fn default() -> Self {
        Self {
            bite_range: 10.0,
            incubation_min: 300,
            incubation_max: 900,
        }
    }
}

/// Per-variant tuning.
#[derive(Debug, PartialEq, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VariantParams {
    /// Relative probability of rolling this variant on conversion.
    pub weight: f64,
    pub speed_factor: f64,
    pub radius: f64,
    pub hit_points: u32,
}

#[derive(Debug, PartialEq, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VariantsConfig {
    pub shambler: VariantParams,
    pub runner: VariantParams,
    pub tank: VariantParams,
    /// Ticks a runner survives after turning.
    pub runner_lifespan: u32,
}

impl Default for VariantsConfig {
    fn default() -> Self {
        Self {
            shambler: VariantParams {
                weight: 0.7,
                speed_factor: 1.0,
                radius: 4.0,
                hit_points: 100,
            },
            runner: VariantParams {
                weight: 0.2,
                speed_factor: 1.8,
                radius: 4.0,
                hit_points: 60,
            },
            tank: VariantParams {
                weight: 0.1,
                speed_factor: 0.6,
                radius: 7.0,
                hit_points: 300,
            },
            runner_lifespan: 1800,
        }
    }
}

impl VariantsConfig {
    pub fn params(&self, variant: Variant) -> &VariantParams {
        match variant {
            Variant::Shambler => &self.shambler,
            Variant::Runner => &self.runner,
            Variant::Tank => &self.tank,
        }
    }

    /// Roll weights ordered like [`Variant::ALL`].
    pub fn weights(&self) -> [f64; 3] {
        Variant::ALL.map(|variant| self.params(variant).weight)
    }
}

#[derive(Debug, PartialEq, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ObstacleConfig {
    pub min_count: usize,
    pub max_count: usize,
    pub min_size: f64,
    pub max_size: f64,
    /// Distance from the world edge obstacles are kept away from.
    pub margin: f64,
    /// Radius around the world centre kept free for the initial zombies.
    pub center_clearance: f64,
    /// Placement attempts per obstacle before it is skipped.
    pub placement_attempts: usize,
}

impl Default for ObstacleConfig {
    fn default() -> Self {
        Self {
            min_count: 4,
            max_count: 8,
            min_size: 40.0,
            max_size: 140.0,
            margin: 60.0,
            center_clearance: 80.0,
            placement_attempts: 20,
        }
    }
}

#[derive(Debug, PartialEq, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CycleConfig {
    /// Ticks in one full day/night cycle.
    pub length: u64,
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self { length: 3600 }
    }
}

#[derive(Debug, PartialEq, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HistoryConfig {
    /// Ticks between population samples.
    pub sample_interval: u64,
    /// Samples retained before the oldest is dropped.
    pub capacity: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            sample_interval: 30,
            capacity: 300,
        }
    }
}

#[derive(Debug, PartialEq, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GridConfig {
    pub cell_size: f64,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self { cell_size: 200.0 }
    }
}

/// Settings of the headless driver.
#[derive(Debug, PartialEq, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    /// Ticks simulated per run.
    pub ticks: u64,
    /// Ticks between exported records.
    pub ticks_per_save: u64,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            ticks: 7200,
            ticks_per_save: 60,
        }
    }
}

impl Config {
    /// Load a [`Config`] from a TOML file.
    ///
    /// Performs validation on all parameters before returning.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, deserialized,
    /// or if the configuration values are invalid.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let contents =
            fs::read_to_string(file).with_context(|| format!("failed to read {file:?}"))?;
        Self::from_toml(&contents)
    }

    /// Parse and validate a [`Config`] from TOML text.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents).context("failed to deserialize config")?;

        config.validate().context("failed to validate config")?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        check_num(self.world.width, 1.0..1e6).context("invalid world width")?;
        check_num(self.world.height, 1.0..1e6).context("invalid world height")?;

        check_num(self.agent.radius, 0.1..100.0).context("invalid agent radius")?;
        check_num(self.agent.trail_length, 0..1_000).context("invalid trail length")?;
        check_num(self.agent.initial_speed, 0.0..100.0).context("invalid initial speed")?;

        check_num(self.population.humans, 0..100_000).context("invalid number of humans")?;
        check_num(self.population.zombies, 0..100_000).context("invalid number of zombies")?;
        check_num(self.population.spawn_margin, 0.0..1e6).context("invalid spawn margin")?;
        check_num(self.population.spawn_attempts, 1..10_000)
            .context("invalid number of spawn attempts")?;
        check_num(self.population.zombie_spawn_jitter, 0.0..1e6)
            .context("invalid zombie spawn jitter")?;

        check_num(self.speed.human, 0.01..100.0).context("invalid human speed")?;
        check_num(self.speed.infected, 0.01..100.0).context("invalid infected speed")?;
        check_num(self.speed.zombie, 0.01..100.0).context("invalid zombie speed")?;
        check_num(self.speed.night_boost, 0.0..10.0).context("invalid night boost")?;
        check_num(self.speed.integration_gain, 0.0..=1.0).context("invalid integration gain")?;

        let perception = &self.perception;
        check_num(perception.flee_radius, 0.1..1e6).context("invalid flee radius")?;
        check_num(perception.seek_radius, 0.1..1e6).context("invalid seek radius")?;
        check_num(perception.cohesion_radius, 0.1..1e6).context("invalid cohesion radius")?;
        check_num(perception.separation_radius, 0.1..1e6)
            .context("invalid separation radius")?;
        check_num(perception.obstacle_look_ahead, 0.1..1e6)
            .context("invalid obstacle look-ahead")?;

        let steering = &self.steering;
        for (name, weight) in [
            ("flee", steering.flee_weight),
            ("seek", steering.seek_weight),
            ("separation", steering.separation_weight),
            ("cohesion", steering.cohesion_weight),
            ("zombie cohesion", steering.zombie_cohesion_weight),
            ("wander", steering.wander_weight),
            ("obstacle", steering.obstacle_weight),
        ] {
            check_num(weight, 0.0..100.0).with_context(|| format!("invalid {name} weight"))?;
        }
        check_num(steering.infected_wander_factor, 0.0..100.0)
            .context("invalid infected wander factor")?;
        check_num(steering.wander_jitter, 0.0..=std::f64::consts::PI)
            .context("invalid wander jitter")?;

        check_num(self.infection.bite_range, 0.0..1e6).context("invalid bite range")?;
        check_num(self.infection.incubation_min, 1..1_000_000)
            .context("invalid minimum incubation")?;
        check_num(
            self.infection.incubation_max,
            self.infection.incubation_min..1_000_000,
        )
        .context("invalid maximum incubation")?;

        for variant in Variant::ALL {
            let params = self.variants.params(variant);
            check_num(params.speed_factor, 0.01..100.0)
                .with_context(|| format!("invalid {variant:?} speed factor"))?;
            check_num(params.radius, 0.1..100.0)
                .with_context(|| format!("invalid {variant:?} radius"))?;
        }
        check_prob_vec(&self.variants.weights()).context("invalid variant weights")?;
        check_num(self.variants.runner_lifespan, 1..10_000_000)
            .context("invalid runner lifespan")?;

        let obstacles = &self.obstacles;
        check_num(obstacles.max_count, 0..1_000).context("invalid maximum obstacle count")?;
        check_num(obstacles.min_count, 0..=obstacles.max_count)
            .context("invalid minimum obstacle count")?;
        check_num(obstacles.min_size, 1.0..1e6).context("invalid minimum obstacle size")?;
        check_num(obstacles.max_size, obstacles.min_size..1e6)
            .context("invalid maximum obstacle size")?;
        check_num(obstacles.margin, 0.0..1e6).context("invalid obstacle margin")?;
        check_num(obstacles.center_clearance, 0.0..1e6).context("invalid center clearance")?;
        check_num(obstacles.placement_attempts, 1..10_000)
            .context("invalid number of placement attempts")?;

        check_num(self.cycle.length, 1..u64::MAX).context("invalid cycle length")?;

        check_num(self.history.sample_interval, 1..u64::MAX)
            .context("invalid history sample interval")?;
        check_num(self.history.capacity, 1..1_000_000).context("invalid history capacity")?;

        check_num(self.grid.cell_size, perception.max_radius()..1e6)
            .context("cell size must cover the largest perception radius")?;

        check_num(self.output.ticks, 1..u64::MAX).context("invalid number of ticks")?;
        check_num(self.output.ticks_per_save, 1..u64::MAX)
            .context("invalid number of ticks per save")?;

        Ok(())
    }
}

fn check_num<T, R>(num: T, range: R) -> Result<()>
where
    T: PartialOrd + Debug,
    R: RangeBounds<T> + Debug,
{
    if !range.contains(&num) {
        bail!("number must be in the range {range:?}, but is {num:?}");
    }
    Ok(())
}

fn check_prob_vec(vec: &[f64]) -> Result<()> {
    if vec.iter().any(|&ele| ele < 0.0) {
        bail!("vector must have only non-negative elements");
    }
    let sum: f64 = vec.iter().sum();
    let tol = 1e-8;
    if (sum - 1.0).abs() > tol {
        bail!("vector must sum to 1.0 (tolerance: {tol}), but sums to {sum}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        Config::default().validate().expect("default config should validate");
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg = Config::from_toml(
            "[population]\nhumans = 50\n\n[infection]\nbite_range = 14.0\n",
        )
        .expect("partial config should load");

        assert_eq!(cfg.population.humans, 50);
        assert_eq!(cfg.infection.bite_range, 14.0);
        assert_eq!(cfg.speed, SpeedConfig::default());
    }

    #[test]
    fn rejects_weights_not_summing_to_one() {
        let mut cfg = Config::default();
        cfg.variants.tank.weight = 0.5;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_cell_smaller_than_perception() {
        let mut cfg = Config::default();
        cfg.grid.cell_size = 100.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_negative_radius_and_unknown_fields() {
        let mut cfg = Config::default();
        cfg.perception.separation_radius = -1.0;
        assert!(cfg.validate().is_err());

        assert!(Config::from_toml("[speed]\nwarp = 9.0\n").is_err());
    }

    #[test]
    fn rejects_inverted_incubation_range() {
        let mut cfg = Config::default();
        cfg.infection.incubation_min = 500;
        cfg.infection.incubation_max = 400;
        assert!(cfg.validate().is_err());
    }
}
