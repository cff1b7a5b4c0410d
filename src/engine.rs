use crate::config::Config;
use crate::error::{SimulationError, SimulationErrorKind};
use crate::harvest::Harvest;
use crate::model::{Phase, PopulationState, StepRecord};
use crate::recruitment::Recruitment;
use rand::SeedableRng;
use rand_chacha::ChaCha12Rng;

/// Simulation engine.
///
/// Holds the configuration, the population state, the models and the run's
/// own random number generator, and advances the state one step at a time.
pub struct Engine {
    cfg: Config,
    state: PopulationState,
    phase: Phase,
    recruitment: Recruitment,
    harvest: Harvest,
    rng: ChaCha12Rng,
}

impl Engine {
    /// Create a new `Engine` at step zero, seeded from the configuration.
    pub fn new(cfg: Config) -> Result<Self, SimulationError> {
        let recruitment = Recruitment::new(&cfg)?;
        let harvest = Harvest::new(&cfg);
        let rng = ChaCha12Rng::seed_from_u64(cfg.random_seed());
        let state = PopulationState::new(cfg.initial_stock());

        Ok(Self {
            cfg,
            state,
            phase: Phase::Running,
            recruitment,
            harvest,
            rng,
        })
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    pub fn state(&self) -> &PopulationState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Advance at most `n_steps`, stopping early once the run is terminal.
    pub fn advance(&mut self, n_steps: usize) -> Result<Vec<StepRecord>, SimulationError> {
        // The budget may be far larger than the run, which can collapse early.
        let mut records = Vec::new();
        for _ in 0..n_steps {
            match self.step()? {
                Some(record) => records.push(record),
                None => break,
            }
        }
        Ok(records)
    }

    /// Perform one step, or return `None` if the run is already terminal.
    pub fn step(&mut self) -> Result<Option<StepRecord>, SimulationError> {
        if self.phase.is_terminal() {
            return Ok(None);
        }

        let step_index = self.state.step_index;
        let capacity = self.cfg.carrying_capacity();
        let stock_before = self.state.current_stock;
        if !stock_before.is_finite() || stock_before < 0.0 || stock_before > capacity {
            return Err(SimulationError::new(
                SimulationErrorKind::StockOutOfDomain,
                step_index,
                format!("stock entering the step must be in [0, {capacity}], but is {stock_before:?}"),
            ));
        }

        // Natural mortality and recruitment both act on the stock entering the step.
        let natural_loss = stock_before * self.cfg.natural_mortality_rate();
        let recruitment = self
            .recruitment
            .sample(stock_before, step_index, &mut self.rng)?;
        let stock_after_growth = stock_before - natural_loss + recruitment;

        // Harvest sees the post-recruitment stock; the capacity clamp comes last.
        let catch = self.harvest.catch(stock_after_growth, step_index)?;
        let stock_after = (stock_after_growth - catch).clamp(0.0, capacity);
        let collapsed = stock_after == 0.0;

        let record = StepRecord {
            step_index,
            stock_before,
            recruitment,
            catch,
            stock_after,
            collapsed,
        };

        self.state.current_stock = stock_after;
        self.state.cumulative_catch += catch;
        self.state.step_index += 1;
        self.state.collapsed |= collapsed;

        self.phase = if collapsed {
            log::warn!("stock collapsed at step {step_index}");
            Phase::Collapsed
        } else if self.state.step_index >= self.cfg.max_steps() {
            Phase::Finished
        } else {
            Phase::Running
        };

        log::debug!("{record:?}");

        Ok(Some(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigFields, FishingPolicy};

    fn engine(fields: ConfigFields) -> Engine {
        Engine::new(Config::new(fields).unwrap()).unwrap()
    }

    #[test]
    fn step_applies_mortality_and_recruitment_before_harvest() {
        let mut engine = engine(ConfigFields {
            intrinsic_growth_rate: 0.5,
            carrying_capacity: 1000.0,
            initial_stock: 200.0,
            natural_mortality_rate: 0.1,
            catchability_coefficient: 0.1,
            fishing_policy: FishingPolicy::EffortBased { effort: 1.0 },
            max_steps: 10,
            ..ConfigFields::default()
        });

        let record = engine.step().unwrap().unwrap();

        let recruitment = 0.5 * 200.0 * (1.0 - 200.0 / 1000.0);
        let after_growth = 200.0 - 20.0 + recruitment;
        let catch = 0.1 * after_growth;
        assert_eq!(record.step_index, 0);
        assert_eq!(record.stock_before, 200.0);
        assert!((record.recruitment - recruitment).abs() < 1e-9);
        assert!((record.catch - catch).abs() < 1e-9);
        assert!((record.stock_after - (after_growth - catch)).abs() < 1e-9);
        assert!(!record.collapsed);
        assert_eq!(engine.state().step_index, 1);
        assert_eq!(engine.phase(), Phase::Running);
    }

    #[test]
    fn capacity_clamp_is_the_last_operation() {
        // Recruitment can overshoot capacity with a large growth rate.
        let mut engine = engine(ConfigFields {
            intrinsic_growth_rate: 3.0,
            carrying_capacity: 100.0,
            initial_stock: 50.0,
            fishing_policy: FishingPolicy::QuotaBased { quota: 10.0 },
            max_steps: 1,
            ..ConfigFields::default()
        });

        let record = engine.step().unwrap().unwrap();

        // 50 + 75 = 125 post-recruitment, catch 10 computed before the clamp.
        assert_eq!(record.recruitment, 75.0);
        assert_eq!(record.catch, 10.0);
        assert_eq!(record.stock_after, 100.0);
        assert_eq!(engine.phase(), Phase::Finished);
    }

    #[test]
    fn collapse_is_terminal() {
        let mut engine = engine(ConfigFields {
            intrinsic_growth_rate: 0.1,
            initial_stock: 10.0,
            fishing_policy: FishingPolicy::QuotaBased { quota: 1000.0 },
            max_steps: 3,
            ..ConfigFields::default()
        });

        let records = engine.advance(3).unwrap();

        assert_eq!(records.len(), 1);
        assert!(records[0].collapsed);
        assert_eq!(engine.phase(), Phase::Collapsed);
        assert!(engine.state().collapsed);
        assert_eq!(engine.step().unwrap(), None);
    }

    #[test]
    fn advance_is_resumable_and_stops_at_max_steps() {
        let fields = ConfigFields {
            recruitment_noise_stddev: 5.0,
            random_seed: 17,
            max_steps: 10,
            ..ConfigFields::default()
        };
        let mut chunked = engine(fields.clone());
        let mut records = chunked.advance(4).unwrap();
        records.extend(chunked.advance(4).unwrap());
        records.extend(chunked.advance(4).unwrap());

        let mut whole = engine(fields);
        let expected = whole.advance(100).unwrap();

        assert_eq!(records.len(), 10);
        assert_eq!(records, expected);
        assert_eq!(chunked.phase(), Phase::Finished);
        assert_eq!(chunked.advance(1).unwrap(), Vec::new());
    }

    #[test]
    fn unbounded_budget_allocates_only_executed_steps() {
        let mut engine = engine(ConfigFields {
            intrinsic_growth_rate: 0.1,
            initial_stock: 10.0,
            fishing_policy: FishingPolicy::QuotaBased { quota: 1000.0 },
            max_steps: usize::MAX,
            ..ConfigFields::default()
        });

        let records = engine.advance(usize::MAX).unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(engine.phase(), Phase::Collapsed);
    }

    #[test]
    fn corrupted_stock_fails_the_step() {
        let mut engine = engine(ConfigFields::default());
        engine.advance(2).unwrap();
        engine.state.current_stock = -1.0;

        let err = engine.step().unwrap_err();

        assert_eq!(err.kind, SimulationErrorKind::StockOutOfDomain);
        assert_eq!(err.step_index, 2);
        assert_eq!(engine.state().step_index, 2);
    }

    #[test]
    fn empty_initial_stock_collapses_on_the_first_step() {
        let mut engine = engine(ConfigFields {
            initial_stock: 0.0,
            ..ConfigFields::default()
        });
        assert_eq!(engine.phase(), Phase::Running);

        let records = engine.advance(5).unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].recruitment, 0.0);
        assert_eq!(records[0].catch, 0.0);
        assert!(records[0].collapsed);
    }
}
