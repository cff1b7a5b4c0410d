//! Catch removed each step under the configured fishing policy.

use crate::config::{Config, FishingPolicy};
use crate::error::{SimulationError, SimulationErrorKind};

#[derive(Debug, Clone, Copy)]
pub struct Harvest {
    policy: FishingPolicy,
    catchability: f64,
}

impl Harvest {
    pub fn new(cfg: &Config) -> Self {
        Self {
            policy: cfg.fishing_policy(),
            catchability: cfg.catchability_coefficient(),
        }
    }

    /// Catch taken from `stock`, the post-recruitment stock before the
    /// capacity clamp. Never exceeds `stock`.
    pub fn catch(&self, stock: f64, step_index: usize) -> Result<f64, SimulationError> {
        if !stock.is_finite() || stock < 0.0 {
            return Err(SimulationError::new(
                SimulationErrorKind::StockOutOfDomain,
                step_index,
                format!("harvest needs a finite non-negative stock, but got {stock:?}"),
            ));
        }

        let catch = match self.policy {
            FishingPolicy::EffortBased { effort } => self.catchability * effort * stock,
            FishingPolicy::QuotaBased { quota } => quota,
        };
        Ok(catch.min(stock))
    }
}
