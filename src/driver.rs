//! Call contract of the simulation core, as seen by a host binding.

use crate::config::{Config, ConfigFields};
use crate::engine::Engine;
use crate::error::{SimulationError, ValidationError};
use crate::model::RunResult;

/// Validate `fields` into a [`Config`], reporting every violated constraint.
pub fn validate_and_build_configuration(fields: ConfigFields) -> Result<Config, ValidationError> {
    Config::new(fields)
}

/// Run a simulation to completion.
///
/// Stops after `max_steps` steps or right after the step that collapses the
/// stock, whichever comes first. `cfg` is only read; the run's state and
/// random generator live and die inside this call.
pub fn run_simulation(cfg: &Config) -> Result<RunResult, SimulationError> {
    let mut engine = Engine::new(cfg.clone())?;
    let records = engine.advance(cfg.max_steps())?;
    Ok(RunResult {
        records,
        final_state: engine.state().clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FishingPolicy;

    #[test]
    fn result_covers_every_executed_step() {
        let cfg = validate_and_build_configuration(ConfigFields {
            max_steps: 25,
            ..ConfigFields::default()
        })
        .unwrap();

        let result = run_simulation(&cfg).unwrap();
        let summary = result.summary();

        assert_eq!(result.records.len(), 25);
        assert_eq!(summary.steps_executed, 25);
        assert!(!summary.collapsed);
        let total: f64 = result.records.iter().map(|r| r.catch).sum();
        assert!((summary.total_catch - total).abs() < 1e-9);
        assert_eq!(summary.final_stock, result.records[24].stock_after);
    }

    #[test]
    fn statistics_match_the_records() {
        let cfg = validate_and_build_configuration(ConfigFields {
            fishing_policy: FishingPolicy::QuotaBased { quota: 20.0 },
            max_steps: 4,
            ..ConfigFields::default()
        })
        .unwrap();

        let result = run_simulation(&cfg).unwrap();
        let stats = result.statistics();

        assert_eq!(stats.catch.mean, 20.0);
        assert_eq!(stats.catch.std_dev, 0.0);
        let mean_stock = result.records.iter().map(|r| r.stock_after).sum::<f64>() / 4.0;
        assert!((stats.stock.mean - mean_stock).abs() < 1e-9);
    }
}
