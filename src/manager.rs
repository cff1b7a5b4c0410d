use crate::analysis::Analyzer;
use crate::config::{Config, ConfigFields};
use crate::engine::Engine;
use crate::model::{RunResult, RunSummary};
use crate::stats::{Accumulator, RunStatistics};
use anyhow::{Context, Result};
use glob::glob;
use rmp_serde::encode;
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, File},
    io::{BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

/// Number of progress messages logged per run.
const PROGRESS_CHUNKS: usize = 10;

const TRAJECTORY_FILE: &str = "trajectory.msgpack";
const SUMMARY_FILE: &str = "summary.json";
const RESULTS_FILE: &str = "results.json";

#[derive(Serialize)]
struct RunReport<'a> {
    random_seed: u64,
    summary: &'a RunSummary,
    statistics: &'a RunStatistics,
}

#[derive(Deserialize)]
struct SavedReport {
    summary: RunSummary,
}

/// Simulation directory holding a `config.toml` and one `run-XXXX` directory per run.
pub struct Manager {
    sim_dir: PathBuf,
    cfg: Config,
}

impl Manager {
    /// Load `config.toml` from `sim_dir`, apply `name=value` overrides and validate.
    pub fn new<P: AsRef<Path>>(sim_dir: P, overrides: &[(String, String)]) -> Result<Self> {
        let sim_dir = sim_dir.as_ref().to_path_buf();

        let mut fields = ConfigFields::from_file(sim_dir.join("config.toml"))
            .context("failed to load config fields")?;
        for (name, value) in overrides {
            fields
                .set(name, value)
                .with_context(|| format!("failed to override {name}"))?;
        }
        let cfg = Config::new(fields).context("failed to construct cfg")?;
        log::info!("{cfg:#?}");

        Ok(Self { sim_dir, cfg })
    }

    /// Execute `n_runs` new replicate runs after the existing ones.
    ///
    /// Run `k` is seeded with `random_seed + k`.
    pub fn create_runs(&self, n_runs: usize) -> Result<()> {
        let first_idx = self.count_run_dirs().context("failed to count run dirs")?;
        for run_idx in first_idx..first_idx + n_runs {
            self.create_run(run_idx)
                .with_context(|| format!("failed to create run {run_idx}"))?;
        }
        Ok(())
    }

    /// Write run `run_idx` into a hidden staging directory and rename it into
    /// place once complete, so a failed run never leaves a `run-XXXX` behind.
    fn create_run(&self, run_idx: usize) -> Result<()> {
        let staging_dir = self.staging_dir(run_idx);
        fs::create_dir_all(&staging_dir)
            .with_context(|| format!("failed to create {staging_dir:?}"))?;

        if let Err(error) = self.write_run(run_idx, &staging_dir) {
            if let Err(cleanup) = fs::remove_dir_all(&staging_dir) {
                log::warn!("failed to remove {staging_dir:?}: {cleanup}");
            }
            return Err(error);
        }

        let run_dir = self.run_dir(run_idx);
        fs::rename(&staging_dir, &run_dir)
            .with_context(|| format!("failed to rename {staging_dir:?} to {run_dir:?}"))?;
        log::info!("created {run_dir:?}");

        Ok(())
    }

    fn write_run(&self, run_idx: usize, dir: &Path) -> Result<()> {
        let random_seed = self.cfg.random_seed().wrapping_add(run_idx as u64);
        let mut engine =
            Engine::new(self.cfg.with_seed(random_seed)).context("failed to construct engine")?;

        let file = dir.join(TRAJECTORY_FILE);
        let file = File::create(&file).with_context(|| format!("failed to create {file:?}"))?;
        let mut writer = BufWriter::new(file);

        let max_steps = engine.config().max_steps();
        let steps_per_chunk = max_steps.div_ceil(PROGRESS_CHUNKS);
        let mut records = Vec::new();
        while !engine.phase().is_terminal() {
            let chunk = engine
                .advance(steps_per_chunk)
                .context("failed to advance engine")?;
            for record in &chunk {
                encode::write(&mut writer, record).context("failed to serialize record")?;
            }
            records.extend(chunk);

            let progress = 100.0 * engine.state().step_index as f64 / max_steps as f64;
            log::info!("completed {progress:06.2}%");
        }

        writer.flush().context("failed to flush writer stream")?;

        let result = RunResult {
            records,
            final_state: engine.state().clone(),
        };
        let summary = result.summary();
        if summary.collapsed {
            log::info!("run {run_idx} collapsed after {} steps", summary.steps_executed);
        }

        let statistics = result.statistics();
        let report = RunReport {
            random_seed,
            summary: &summary,
            statistics: &statistics,
        };
        let file = dir.join(SUMMARY_FILE);
        let file = File::create(&file).with_context(|| format!("failed to create {file:?}"))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, &report)
            .context("failed to serialize run report")?;
        writer.flush().context("failed to flush writer stream")?;

        Ok(())
    }

    /// Analyze every run and write per-run and simulation-wide results.
    pub fn analyze_sim(&self) -> Result<()> {
        let n_run_dirs = self.count_run_dirs().context("failed to count run dirs")?;

        let mut n_collapsed = 0;
        let mut final_stock = Accumulator::new();
        let mut total_catch = Accumulator::new();
        for run_idx in 0..n_run_dirs {
            let summary = self
                .load_summary(run_idx)
                .with_context(|| format!("failed to load summary of run {run_idx}"))?;

            let mut analyzer = Analyzer::new();
            analyzer
                .add_file(self.trajectory_file(run_idx), summary.steps_executed)
                .context("failed to add file")?;
            analyzer
                .save_results(self.results_file(run_idx))
                .context("failed to save results")?;

            if summary.collapsed {
                n_collapsed += 1;
            }
            final_stock.add(summary.final_stock);
            total_catch.add(summary.total_catch);
        }

        let n_runs = final_stock.count();
        let results = serde_json::json!({
            "n_runs": n_runs,
            "collapse_fraction": n_collapsed as f64 / n_runs as f64,
            "final_stock": final_stock.report(),
            "total_catch": total_catch.report(),
        });
        let file = self.sim_dir.join(RESULTS_FILE);
        let file = File::create(&file).with_context(|| format!("failed to create {file:?}"))?;
        serde_json::to_writer_pretty(BufWriter::new(file), &results)
            .context("failed to serialize results")?;

        log::info!("analyzed {n_runs} runs");
        Ok(())
    }

    /// Remove every run directory and the simulation-wide results.
    pub fn clean_sim(&self) -> Result<()> {
        for run_dir in self.run_dirs().context("failed to list run dirs")? {
            fs::remove_dir_all(&run_dir)
                .with_context(|| format!("failed to remove {run_dir:?}"))?;
            log::info!("removed {run_dir:?}");
        }

        let results_file = self.sim_dir.join(RESULTS_FILE);
        if results_file.exists() {
            fs::remove_file(&results_file)
                .with_context(|| format!("failed to remove {results_file:?}"))?;
        }
        Ok(())
    }

    fn load_summary(&self, run_idx: usize) -> Result<RunSummary> {
        let file = self.summary_file(run_idx);
        let file = File::open(&file).with_context(|| format!("failed to open {file:?}"))?;
        let report: SavedReport = serde_json::from_reader(BufReader::new(file))
            .context("failed to deserialize run report")?;
        Ok(report.summary)
    }

    fn run_dirs(&self) -> Result<Vec<PathBuf>> {
        let pattern = self.sim_dir.join("run-*");
        let pattern = pattern.to_str().context("pattern is not valid UTF-8")?;
        let run_dirs = glob(pattern)
            .context("failed to glob run dirs")?
            .filter_map(|entry| entry.ok())
            .filter(|p| p.is_dir())
            .collect();
        Ok(run_dirs)
    }

    fn count_run_dirs(&self) -> Result<usize> {
        Ok(self.run_dirs()?.len())
    }

    fn run_dir(&self, run_idx: usize) -> PathBuf {
        self.sim_dir.join(format!("run-{run_idx:04}"))
    }

    /// Not matched by the `run-*` pattern.
    fn staging_dir(&self, run_idx: usize) -> PathBuf {
        self.sim_dir.join(format!(".run-{run_idx:04}"))
    }

    fn trajectory_file(&self, run_idx: usize) -> PathBuf {
        self.run_dir(run_idx).join(TRAJECTORY_FILE)
    }

    fn summary_file(&self, run_idx: usize) -> PathBuf {
        self.run_dir(run_idx).join(SUMMARY_FILE)
    }

    fn results_file(&self, run_idx: usize) -> PathBuf {
        self.run_dir(run_idx).join(RESULTS_FILE)
    }
}
