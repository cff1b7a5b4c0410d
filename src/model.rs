//! Simulation data types.

use crate::stats::{Accumulator, RunStatistics};
use serde::{Deserialize, Serialize};

/// Phase of a run. `Collapsed` and `Finished` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Running,
    Collapsed,
    Finished,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        self != Phase::Running
    }
}

/// Mutable state of the stock, owned by a single run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopulationState {
    /// Stock size, kept within `[0, carrying_capacity]`.
    pub current_stock: f64,
    /// Total catch so far. Never decreases.
    pub cumulative_catch: f64,
    /// Number of steps executed so far.
    pub step_index: usize,
    /// Set once the stock reaches zero and never cleared.
    pub collapsed: bool,
}

impl PopulationState {
    /// Create the state at step zero.
    pub fn new(initial_stock: f64) -> Self {
        Self {
            current_stock: initial_stock,
            cumulative_catch: 0.0,
            step_index: 0,
            collapsed: false,
        }
    }
}

/// Record of the simulation at a single step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub step_index: usize,
    pub stock_before: f64,
    pub recruitment: f64,
    pub catch: f64,
    pub stock_after: f64,
    pub collapsed: bool,
}

impl StepRecord {
    /// Fixed-arity form handed across a host boundary:
    /// `(step_index, stock_before, recruitment, catch, stock_after, collapsed)`.
    pub fn to_tuple(&self) -> (usize, f64, f64, f64, f64, bool) {
        (
            self.step_index,
            self.stock_before,
            self.recruitment,
            self.catch,
            self.stock_after,
            self.collapsed,
        )
    }
}

/// Final state of a run as reported to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub final_stock: f64,
    pub total_catch: f64,
    pub steps_executed: usize,
    pub collapsed: bool,
}

/// Outcome of a complete run: every executed step plus the final state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub records: Vec<StepRecord>,
    pub final_state: PopulationState,
}

impl RunResult {
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            final_stock: self.final_state.current_stock,
            total_catch: self.final_state.cumulative_catch,
            steps_executed: self.final_state.step_index,
            collapsed: self.final_state.collapsed,
        }
    }

    /// Per-step moments of stock, catch and recruitment over the run.
    pub fn statistics(&self) -> RunStatistics {
        let mut stock = Accumulator::new();
        let mut catch = Accumulator::new();
        let mut recruitment = Accumulator::new();
        for record in &self.records {
            stock.add(record.stock_after);
            catch.add(record.catch);
            recruitment.add(record.recruitment);
        }
        RunStatistics {
            stock: stock.report(),
            catch: catch.report(),
            recruitment: recruitment.report(),
        }
    }
}
