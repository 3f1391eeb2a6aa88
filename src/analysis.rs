use crate::model::Record;
use crate::stats::{Accumulator, AccumulatorReport};
use anyhow::{Context, Result};
use rmp_serde::{decode, encode};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::Path,
};

/// Observable aggregated across runs.
pub trait Obs {
    fn update(&mut self, run: &[Record]);
    fn report(&self) -> ObsReport;
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ObsReport {
    pub name: String,
    pub stats: AccumulatorReport,
}

/// Largest number of infected plus zombies seen in a run.
pub struct PeakOutbreak {
    acc: Accumulator,
}

impl PeakOutbreak {
    pub fn new() -> Self {
        Self {
            acc: Accumulator::new(),
        }
    }
}

impl Obs for PeakOutbreak {
    fn update(&mut self, run: &[Record]) {
        let peak = run
            .iter()
            .map(|rec| rec.stats.infected + rec.stats.zombies)
            .max();
        if let Some(peak) = peak {
            self.acc.add(peak as f64);
        }
    }

    fn report(&self) -> ObsReport {
        ObsReport {
            name: "peak_outbreak".into(),
            stats: self.acc.report(),
        }
    }
}

/// Tick at which the outbreak first reached its peak.
pub struct PeakTick {
    acc: Accumulator,
}

impl PeakTick {
    pub fn new() -> Self {
        Self {
            acc: Accumulator::new(),
        }
    }
}

impl Obs for PeakTick {
    fn update(&mut self, run: &[Record]) {
        let mut best: Option<(usize, u64)> = None;
        for rec in run {
            let size = rec.stats.infected + rec.stats.zombies;
            if best.is_none_or(|(peak, _)| size > peak) {
                best = Some((size, rec.stats.elapsed));
            }
        }
        if let Some((_, tick)) = best {
            self.acc.add(tick as f64);
        }
    }

    fn report(&self) -> ObsReport {
        ObsReport {
            name: "peak_tick".into(),
            stats: self.acc.report(),
        }
    }
}

/// Humans left at the end of a run.
pub struct FinalHumans {
    acc: Accumulator,
}

impl FinalHumans {
    pub fn new() -> Self {
        Self {
            acc: Accumulator::new(),
        }
    }
}

impl Obs for FinalHumans {
    fn update(&mut self, run: &[Record]) {
        if let Some(last) = run.last() {
            self.acc.add(last.stats.humans as f64);
        }
    }

    fn report(&self) -> ObsReport {
        ObsReport {
            name: "final_humans".into(),
            stats: self.acc.report(),
        }
    }
}

/// First recorded tick with no humans left. Runs where humans survive are skipped.
pub struct ExtinctionTick {
    acc: Accumulator,
}

impl ExtinctionTick {
    pub fn new() -> Self {
        Self {
            acc: Accumulator::new(),
        }
    }
}

impl Obs for ExtinctionTick {
    fn update(&mut self, run: &[Record]) {
        if let Some(rec) = run.iter().find(|rec| rec.stats.humans == 0) {
            self.acc.add(rec.stats.elapsed as f64);
        }
    }

    fn report(&self) -> ObsReport {
        ObsReport {
            name: "extinction_tick".into(),
            stats: self.acc.report(),
        }
    }
}

/// Total humans infected over a run.
pub struct TotalInfections {
    acc: Accumulator,
}

impl TotalInfections {
    pub fn new() -> Self {
        Self {
            acc: Accumulator::new(),
        }
    }
}

impl Obs for TotalInfections {
    fn update(&mut self, run: &[Record]) {
        let total: usize = run.iter().map(|rec| rec.new_infections).sum();
        self.acc.add(total as f64);
    }

    fn report(&self) -> ObsReport {
        ObsReport {
            name: "total_infections".into(),
            stats: self.acc.report(),
        }
    }
}

pub struct Analyzer {
    n_runs: usize,
    obs_ptr_vec: Vec<Box<dyn Obs>>,
}

impl Analyzer {
    pub fn new() -> Self {
        let obs_ptr_vec: Vec<Box<dyn Obs>> = vec![
            Box::new(PeakOutbreak::new()),
            Box::new(PeakTick::new()),
            Box::new(FinalHumans::new()),
            Box::new(ExtinctionTick::new()),
            Box::new(TotalInfections::new()),
        ];
        Self {
            n_runs: 0,
            obs_ptr_vec,
        }
    }

    pub fn n_runs(&self) -> usize {
        self.n_runs
    }

    pub fn add_run(&mut self, run: &[Record]) {
        self.n_runs += 1;
        for obs in &mut self.obs_ptr_vec {
            obs.update(run);
        }
    }

    /// Read a history file written by a run and add it.
    pub fn add_file<P: AsRef<Path>>(&mut self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::open(file).with_context(|| format!("failed to open {file:?}"))?;
        let reader = BufReader::new(file);

        let run: Vec<Record> = decode::from_read(reader).context("failed to read history")?;
        self.add_run(&run);
        Ok(())
    }

    pub fn reports(&self) -> Vec<ObsReport> {
        self.obs_ptr_vec.iter().map(|obs| obs.report()).collect()
    }

    pub fn save_results<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let mut writer = BufWriter::new(file);

        encode::write(&mut writer, &self.reports()).context("failed to serialize results")?;
        writer.flush().context("failed to flush writer stream")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Stats;

    fn rec(elapsed: u64, humans: usize, infected: usize, zombies: usize, new: usize) -> Record {
        Record {
            stats: Stats {
                humans,
                infected,
                zombies,
                dead: 0,
                elapsed,
            },
            new_infections: new,
            night: 0.0,
        }
    }

    fn report<'a>(reports: &'a [ObsReport], name: &str) -> &'a AccumulatorReport {
        &reports
            .iter()
            .find(|r| r.name == name)
            .expect("observable present")
            .stats
    }

    #[test]
    fn aggregates_runs() {
        let mut analyzer = Analyzer::new();
        analyzer.add_run(&[
            rec(60, 9, 1, 1, 1),
            rec(120, 4, 3, 4, 5),
            rec(180, 0, 2, 9, 4),
        ]);
        analyzer.add_run(&[rec(60, 10, 0, 1, 0), rec(120, 8, 2, 1, 2)]);

        let reports = analyzer.reports();
        assert_eq!(analyzer.n_runs(), 2);

        let peak = report(&reports, "peak_outbreak");
        assert_eq!((peak.min, peak.max), (3.0, 11.0));

        let peak_tick = report(&reports, "peak_tick");
        assert_eq!(peak_tick.mean, 150.0);

        let extinction = report(&reports, "extinction_tick");
        assert_eq!(extinction.n_vals, 1);
        assert_eq!(extinction.mean, 180.0);

        assert_eq!(report(&reports, "final_humans").mean, 4.0);
        assert_eq!(report(&reports, "total_infections").mean, 6.0);
    }
}
