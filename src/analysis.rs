use crate::model::StepRecord;
use crate::stats::{Accumulator, TimeSeries};
use anyhow::{Context, Result};
use rmp_serde::decode;
use std::{
    fs::File,
    io::{BufReader, BufWriter},
    path::Path,
};

/// Quantity accumulated over the step records of one run.
pub trait Obs {
    fn update(&mut self, record: &StepRecord);
    fn report(&self) -> serde_json::Value;
}

pub struct Stock {
    time_series: TimeSeries,
}

impl Stock {
    pub fn new() -> Self {
        Self {
            time_series: TimeSeries::new(),
        }
    }
}

impl Obs for Stock {
    fn update(&mut self, record: &StepRecord) {
        self.time_series.push(record.stock_after);
    }

    fn report(&self) -> serde_json::Value {
        serde_json::json!({ "stock": self.time_series.report() })
    }
}

pub struct Catch {
    acc: Accumulator,
    total: f64,
}

impl Catch {
    pub fn new() -> Self {
        Self {
            acc: Accumulator::new(),
            total: 0.0,
        }
    }
}

impl Obs for Catch {
    fn update(&mut self, record: &StepRecord) {
        self.acc.add(record.catch);
        self.total += record.catch;
    }

    fn report(&self) -> serde_json::Value {
        serde_json::json!({ "catch": self.acc.report(), "total_catch": self.total })
    }
}

pub struct Recruitment {
    acc: Accumulator,
}

impl Recruitment {
    pub fn new() -> Self {
        Self {
            acc: Accumulator::new(),
        }
    }
}

impl Obs for Recruitment {
    fn update(&mut self, record: &StepRecord) {
        self.acc.add(record.recruitment);
    }

    fn report(&self) -> serde_json::Value {
        serde_json::json!({ "recruitment": self.acc.report() })
    }
}

pub struct Collapse {
    step: Option<usize>,
}

impl Collapse {
    pub fn new() -> Self {
        Self { step: None }
    }
}

impl Obs for Collapse {
    fn update(&mut self, record: &StepRecord) {
        if record.collapsed && self.step.is_none() {
            self.step = Some(record.step_index);
        }
    }

    fn report(&self) -> serde_json::Value {
        serde_json::json!({ "collapse_step": self.step })
    }
}

/// Runs every observable over the trajectory of a single run.
pub struct Analyzer {
    obs_ptr_vec: Vec<Box<dyn Obs>>,
}

impl Analyzer {
    pub fn new() -> Self {
        let obs_ptr_vec: Vec<Box<dyn Obs>> = vec![
            Box::new(Stock::new()),
            Box::new(Catch::new()),
            Box::new(Recruitment::new()),
            Box::new(Collapse::new()),
        ];
        Self { obs_ptr_vec }
    }

    pub fn add_record(&mut self, record: &StepRecord) {
        for obs in &mut self.obs_ptr_vec {
            obs.update(record);
        }
    }

    /// Feed `n_records` MessagePack-encoded records read from `file`.
    pub fn add_file<P: AsRef<Path>>(&mut self, file: P, n_records: usize) -> Result<()> {
        let file = file.as_ref();
        let file = File::open(file).with_context(|| format!("failed to open {file:?}"))?;
        let mut reader = BufReader::new(file);

        for i_record in 0..n_records {
            let record: StepRecord = decode::from_read(&mut reader)
                .with_context(|| format!("failed to read record {i_record}"))?;
            self.add_record(&record);
        }
        Ok(())
    }

    pub fn reports(&self) -> Vec<serde_json::Value> {
        self.obs_ptr_vec.iter().map(|obs| obs.report()).collect()
    }

    pub fn save_results<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let writer = BufWriter::new(file);

        serde_json::to_writer_pretty(writer, &self.reports())
            .context("failed to serialize results")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(step_index: usize, stock_after: f64, catch: f64, collapsed: bool) -> StepRecord {
        StepRecord {
            step_index,
            stock_before: stock_after + catch,
            recruitment: 1.0,
            catch,
            stock_after,
            collapsed,
        }
    }

    #[test]
    fn reports_cover_every_observable() {
        let mut analyzer = Analyzer::new();
        analyzer.add_record(&record(0, 30.0, 5.0, false));
        analyzer.add_record(&record(1, 10.0, 15.0, false));
        analyzer.add_record(&record(2, 0.0, 10.0, true));

        let reports = analyzer.reports();

        assert_eq!(reports.len(), 4);
        assert_eq!(reports[1]["total_catch"], 30.0);
        assert_eq!(reports[1]["catch"]["mean"], 10.0);
        assert_eq!(reports[2]["recruitment"]["mean"], 1.0);
        assert_eq!(reports[3]["collapse_step"], 2);
    }

    #[test]
    fn run_without_collapse_reports_null() {
        let mut analyzer = Analyzer::new();
        analyzer.add_record(&record(0, 30.0, 5.0, false));
        assert!(analyzer.reports()[3]["collapse_step"].is_null());
    }
}
