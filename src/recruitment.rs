//! Logistic recruitment with optional additive normal noise.

use crate::config::Config;
use crate::error::{SimulationError, SimulationErrorKind};
use rand::Rng;
use rand_distr::{Distribution, Normal};

/// Recruitment model of a run.
///
/// Holds no generator of its own; the caller threads the run's generator in,
/// so independent runs never share random state.
#[derive(Debug, Clone)]
pub struct Recruitment {
    growth_rate: f64,
    capacity: f64,
    noise: Option<Normal<f64>>,
}

impl Recruitment {
    pub fn new(cfg: &Config) -> Result<Self, SimulationError> {
        let std_dev = cfg.recruitment_noise_stddev();
        let noise = if std_dev > 0.0 {
            let dist = Normal::new(0.0, std_dev).map_err(|err| {
                SimulationError::new(
                    SimulationErrorKind::InvalidDistribution,
                    0,
                    format!("failed to build recruitment noise: {err}"),
                )
            })?;
            Some(dist)
        } else {
            None
        };

        Ok(Self {
            growth_rate: cfg.intrinsic_growth_rate(),
            capacity: cfg.carrying_capacity(),
            noise,
        })
    }

    /// Noise-free logistic growth at `stock`.
    pub fn deterministic(&self, stock: f64) -> f64 {
        self.growth_rate * stock * (1.0 - stock / self.capacity)
    }

    /// Recruitment for this step, never negative.
    ///
    /// Draws exactly one noise sample when noise is enabled and none otherwise.
    pub fn sample<R: Rng + ?Sized>(
        &self,
        stock: f64,
        step_index: usize,
        rng: &mut R,
    ) -> Result<f64, SimulationError> {
        if !stock.is_finite() || stock < 0.0 || stock > self.capacity {
            return Err(SimulationError::new(
                SimulationErrorKind::StockOutOfDomain,
                step_index,
                format!(
                    "recruitment needs stock in [0, {}], but got {stock:?}",
                    self.capacity
                ),
            ));
        }

        let noise = match &self.noise {
            Some(dist) => dist.sample(rng),
            None => 0.0,
        };
        let recruitment = (self.deterministic(stock) + noise).max(0.0);

        if !recruitment.is_finite() {
            return Err(SimulationError::new(
                SimulationErrorKind::NonFiniteValue,
                step_index,
                format!("recruitment is not finite at stock {stock:?}"),
            ));
        }
        Ok(recruitment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigFields;
    use rand::SeedableRng;
    use rand_chacha::ChaCha12Rng;

    fn recruitment(noise: f64) -> Recruitment {
        let cfg = Config::new(ConfigFields {
            intrinsic_growth_rate: 0.5,
            carrying_capacity: 200.0,
            recruitment_noise_stddev: noise,
            initial_stock: 100.0,
            ..ConfigFields::default()
        })
        .unwrap();
        Recruitment::new(&cfg).unwrap()
    }

    #[test]
    fn zero_noise_is_logistic_growth() {
        let model = recruitment(0.0);
        let mut rng = ChaCha12Rng::seed_from_u64(1);
        for stock in [0.0, 20.0, 100.0, 150.0, 200.0] {
            let expected = 0.5 * stock * (1.0 - stock / 200.0);
            assert_eq!(model.sample(stock, 0, &mut rng).unwrap(), expected);
        }
    }

    #[test]
    fn zero_noise_consumes_no_draws() {
        let model = recruitment(0.0);
        let mut used = ChaCha12Rng::seed_from_u64(5);
        let fresh = ChaCha12Rng::seed_from_u64(5);
        model.sample(50.0, 0, &mut used).unwrap();
        assert_eq!(used, fresh);
    }

    #[test]
    fn noisy_recruitment_is_never_negative() {
        let model = recruitment(500.0);
        let mut rng = ChaCha12Rng::seed_from_u64(3);
        let draws: Vec<_> = (0..200)
            .map(|_| model.sample(10.0, 0, &mut rng).unwrap())
            .collect();
        assert!(draws.iter().all(|&r| r >= 0.0));
        // With a deviation this large some raw values must have been clamped.
        assert!(draws.iter().any(|&r| r == 0.0));
    }

    #[test]
    fn same_seed_gives_same_draws() {
        let model = recruitment(4.0);
        let mut rng_a = ChaCha12Rng::seed_from_u64(11);
        let mut rng_b = ChaCha12Rng::seed_from_u64(11);
        for _ in 0..20 {
            assert_eq!(
                model.sample(80.0, 0, &mut rng_a).unwrap(),
                model.sample(80.0, 0, &mut rng_b).unwrap()
            );
        }
    }

    #[test]
    fn stock_outside_domain_is_an_internal_error() {
        let model = recruitment(0.0);
        let mut rng = ChaCha12Rng::seed_from_u64(0);
        for stock in [-1.0, 250.0, f64::NAN] {
            let err = model.sample(stock, 4, &mut rng).unwrap_err();
            assert_eq!(err.kind, SimulationErrorKind::StockOutOfDomain);
            assert_eq!(err.step_index, 4);
        }
    }
}
