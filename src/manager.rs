use crate::analysis::Analyzer;
use crate::config::Config;
use crate::model::Record;
use crate::simulation::Simulation;
use anyhow::{Context, Result};
use glob::glob;
use rmp_serde::encode;
use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

/// Layout of a simulation directory:
/// `config.toml` (optional), `run-NNNN/history.msgpack` and `results.msgpack`.
pub struct Manager {
    sim_dir: PathBuf,
    cfg: Config,
}

impl Manager {
    pub fn new<P: AsRef<Path>>(sim_dir: P) -> Result<Self> {
        let sim_dir = sim_dir.as_ref().to_path_buf();

        let config_file = sim_dir.join("config.toml");
        let cfg = if config_file.exists() {
            Config::from_file(&config_file).context("failed to construct cfg")?
        } else {
            log::info!("{config_file:?} not found, using the default config");
            Config::default()
        };
        log::debug!("{cfg:#?}");

        Ok(Self { sim_dir, cfg })
    }

    /// Run a fresh simulation into a new run directory.
    pub fn create_run(&self, ticks: Option<u64>, seed: Option<u64>) -> Result<()> {
        let run_idx = self.count_run_dirs().context("failed to count run dirs")?;

        let run_dir = self.run_dir(run_idx);
        fs::create_dir_all(&run_dir).with_context(|| format!("failed to create {run_dir:?}"))?;
        log::info!("created {run_dir:?}");

        let (width, height) = (self.cfg.world.width, self.cfg.world.height);
        let mut sim = match seed {
            Some(seed) => Simulation::from_seed(self.cfg.clone(), width, height, seed),
            None => Simulation::new(self.cfg.clone(), width, height),
        }
        .context("failed to construct simulation")?;

        let ticks = ticks.unwrap_or(self.cfg.output.ticks);
        let records = perform_run(&mut sim, ticks, self.cfg.output.ticks_per_save);

        let history_file = self.history_file(run_idx);
        write_records(&history_file, &records)
            .with_context(|| format!("failed to write {history_file:?}"))?;

        let stats = sim.stats();
        log::info!(
            "finished run {run_idx} after {} ticks: {} humans, {} infected, {} zombies, {} dead",
            stats.elapsed,
            stats.humans,
            stats.infected,
            stats.zombies,
            stats.dead
        );

        Ok(())
    }

    /// Aggregate every run history into the results file.
    pub fn analyze_sim(&self) -> Result<()> {
        let mut analyzer = Analyzer::new();

        let n_runs = self.count_run_dirs().context("failed to count run dirs")?;
        for run_idx in 0..n_runs {
            let history_file = self.history_file(run_idx);
            analyzer
                .add_file(&history_file)
                .with_context(|| format!("failed to add {history_file:?}"))?;
        }

        for report in analyzer.reports() {
            log::info!("{}: {:?}", report.name, report.stats);
        }

        let results_file = self.results_file();
        analyzer
            .save_results(&results_file)
            .context("failed to save results")?;
        log::info!("analyzed {} runs into {results_file:?}", analyzer.n_runs());

        Ok(())
    }

    /// Remove every run directory and the results file.
    pub fn clean_sim(&self) -> Result<()> {
        for run_dir in self.run_dirs().context("failed to list run dirs")? {
            fs::remove_dir_all(&run_dir)
                .with_context(|| format!("failed to remove {run_dir:?}"))?;
            log::info!("removed {run_dir:?}");
        }

        let results_file = self.results_file();
        if results_file.exists() {
            fs::remove_file(&results_file)
                .with_context(|| format!("failed to remove {results_file:?}"))?;
        }

        Ok(())
    }

    fn run_dirs(&self) -> Result<Vec<PathBuf>> {
        let pattern = self.sim_dir.join("run-*");
        let pattern = pattern.to_str().context("pattern is not valid UTF-8")?;
        let dirs = glob(pattern)
            .context("failed to glob run dirs")?
            .filter_map(Result::ok)
            .filter(|p| p.is_dir())
            .collect();
        Ok(dirs)
    }

    fn count_run_dirs(&self) -> Result<usize> {
        Ok(self.run_dirs()?.len())
    }

    fn run_dir(&self, run_idx: usize) -> PathBuf {
        self.sim_dir.join(format!("run-{run_idx:04}"))
    }

    fn history_file(&self, run_idx: usize) -> PathBuf {
        self.run_dir(run_idx).join("history.msgpack")
    }

    fn results_file(&self) -> PathBuf {
        self.sim_dir.join("results.msgpack")
    }
}

/// Step `sim` for `ticks` ticks, recording it every `ticks_per_save` ticks.
pub fn perform_run(sim: &mut Simulation, ticks: u64, ticks_per_save: u64) -> Vec<Record> {
    let mut records = Vec::with_capacity((ticks / ticks_per_save) as usize + 1);
    let mut new_infections = 0;
    let progress_step = (ticks / 10).max(1);

    for tick in 1..=ticks {
        new_infections += sim.step();

        if tick % ticks_per_save == 0 || tick == ticks {
            records.push(Record {
                stats: sim.stats(),
                new_infections,
                night: sim.night_factor(),
            });
            new_infections = 0;
        }

        if tick % progress_step == 0 {
            let progress = 100.0 * tick as f64 / ticks as f64;
            log::info!("completed {progress:06.2}%");
        }
    }

    records
}

fn write_records(file: &Path, records: &[Record]) -> Result<()> {
    let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
    let mut writer = BufWriter::new(file);
    encode::write(&mut writer, records).context("failed to serialize records")?;
    writer.flush().context("failed to flush writer stream")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_every_save_and_at_the_end() {
        let mut cfg = Config::default();
        cfg.population.humans = 30;
        let mut sim = Simulation::from_seed(cfg, 600.0, 600.0, 11).expect("valid config");

        let records = perform_run(&mut sim, 250, 60);

        let ticks: Vec<_> = records.iter().map(|r| r.stats.elapsed).collect();
        assert_eq!(ticks, vec![60, 120, 180, 240, 250]);
        let infected: usize = records.iter().map(|r| r.new_infections).sum();
        let last = &records[4].stats;
        assert_eq!(last.humans + infected, 30);
    }
}
