use crate::error::{ValidationError, Violation};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fmt::Debug, fs, ops::RangeBounds, path::Path};

/// Standard deviations that bound any sample of the recruitment noise.
const NOISE_DEVIATIONS: f64 = 40.0;

/// Fishing policy applied at every step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FishingPolicy {
    /// Catch a fixed fraction `catchability * effort` of the stock.
    EffortBased { effort: f64 },
    /// Catch a fixed amount per step, bounded by the available stock.
    QuotaBased { quota: f64 },
}

/// Raw, unvalidated simulation parameters.
///
/// This is the form read from `config.toml` or assembled by a host binding.
/// Turn it into a [`Config`] with [`Config::new`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFields {
    /// Per-step proportional growth coefficient.
    pub intrinsic_growth_rate: f64,
    /// Maximum sustainable stock size.
    pub carrying_capacity: f64,
    /// Stock at step zero.
    pub initial_stock: f64,
    /// Fraction of the stock lost to natural causes each step.
    pub natural_mortality_rate: f64,
    /// Converts effort to the fraction of stock caught.
    pub catchability_coefficient: f64,

    pub fishing_policy: FishingPolicy,

    /// Standard deviation of the additive recruitment noise (0 = deterministic).
    pub recruitment_noise_stddev: f64,
    /// Seed of the per-run noise generator.
    pub random_seed: u64,

    /// Step budget of a run.
    pub max_steps: usize,
}

impl Default for ConfigFields {
    fn default() -> Self {
        Self {
            intrinsic_growth_rate: 0.3,
            carrying_capacity: 1000.0,
            initial_stock: 500.0,
            natural_mortality_rate: 0.0,
            catchability_coefficient: 0.01,
            fishing_policy: FishingPolicy::EffortBased { effort: 10.0 },
            recruitment_noise_stddev: 0.0,
            random_seed: 0,
            max_steps: 100,
        }
    }
}

impl ConfigFields {
    /// Names accepted by [`ConfigFields::set`], in declaration order.
    pub const FIELD_NAMES: [&'static str; 9] = [
        "intrinsic_growth_rate",
        "carrying_capacity",
        "initial_stock",
        "natural_mortality_rate",
        "catchability_coefficient",
        "fishing_policy",
        "recruitment_noise_stddev",
        "random_seed",
        "max_steps",
    ];

    /// Read unvalidated fields from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or deserialized.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let contents =
            fs::read_to_string(file).with_context(|| format!("failed to read {file:?}"))?;
        toml::from_str(&contents).context("failed to deserialize config fields")
    }

    /// Assign a single field from its textual value.
    ///
    /// Numbers use Rust's float/integer syntax. The policy is written
    /// `effort:<value>` or `quota:<value>`. Domain checks are left to
    /// [`Config::new`]; only unknown names and unparsable values fail here.
    pub fn set(&mut self, name: &str, raw_value: &str) -> Result<(), ValidationError> {
        let raw_value = raw_value.trim();
        match name {
            "intrinsic_growth_rate" => {
                self.intrinsic_growth_rate = parse_value("intrinsic_growth_rate", raw_value)?
            }
            "carrying_capacity" => {
                self.carrying_capacity = parse_value("carrying_capacity", raw_value)?
            }
            "initial_stock" => self.initial_stock = parse_value("initial_stock", raw_value)?,
            "natural_mortality_rate" => {
                self.natural_mortality_rate = parse_value("natural_mortality_rate", raw_value)?
            }
            "catchability_coefficient" => {
                self.catchability_coefficient = parse_value("catchability_coefficient", raw_value)?
            }
            "fishing_policy" => self.fishing_policy = parse_policy(raw_value)?,
            "recruitment_noise_stddev" => {
                self.recruitment_noise_stddev = parse_value("recruitment_noise_stddev", raw_value)?
            }
            "random_seed" => self.random_seed = parse_value("random_seed", raw_value)?,
            "max_steps" => self.max_steps = parse_value("max_steps", raw_value)?,
            _ => {
                return Err(ValidationError {
                    violations: vec![Violation::new(
                        "setting",
                        format!(
                            "unknown setting {name:?}, expected one of {:?}",
                            Self::FIELD_NAMES
                        ),
                    )],
                });
            }
        }
        Ok(())
    }
}

fn parse_value<T>(field: &'static str, raw_value: &str) -> Result<T, ValidationError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw_value.parse().map_err(|err| ValidationError {
        violations: vec![Violation::new(
            field,
            format!("cannot parse {raw_value:?}: {err}"),
        )],
    })
}

fn parse_policy(raw_value: &str) -> Result<FishingPolicy, ValidationError> {
    let field = "fishing_policy";
    let Some((kind, amount)) = raw_value.split_once(':') else {
        return Err(ValidationError {
            violations: vec![Violation::new(
                field,
                format!("expected `effort:<value>` or `quota:<value>`, got {raw_value:?}"),
            )],
        });
    };
    let amount: f64 = parse_value(field, amount.trim())?;
    match kind.trim() {
        "effort" => Ok(FishingPolicy::EffortBased { effort: amount }),
        "quota" => Ok(FishingPolicy::QuotaBased { quota: amount }),
        other => Err(ValidationError {
            violations: vec![Violation::new(
                field,
                format!("unknown policy kind {other:?}, expected `effort` or `quota`"),
            )],
        }),
    }
}

/// Validated simulation configuration.
///
/// Only obtainable through [`Config::new`] (or deserialization, which runs the
/// same checks), so every instance satisfies the parameter domains.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ConfigFields", into = "ConfigFields")]
pub struct Config {
    fields: ConfigFields,
}

impl Config {
    /// Validate `fields`, reporting every violated constraint.
    pub fn new(fields: ConfigFields) -> Result<Self, ValidationError> {
        let violations = validate(&fields);
        if !violations.is_empty() {
            return Err(ValidationError { violations });
        }
        Ok(Self { fields })
    }

    /// Same configuration with a different noise seed.
    pub fn with_seed(&self, random_seed: u64) -> Self {
        let mut fields = self.fields.clone();
        fields.random_seed = random_seed;
        Self { fields }
    }

    pub fn intrinsic_growth_rate(&self) -> f64 {
        self.fields.intrinsic_growth_rate
    }

    pub fn carrying_capacity(&self) -> f64 {
        self.fields.carrying_capacity
    }

    pub fn initial_stock(&self) -> f64 {
        self.fields.initial_stock
    }

    pub fn natural_mortality_rate(&self) -> f64 {
        self.fields.natural_mortality_rate
    }

    pub fn catchability_coefficient(&self) -> f64 {
        self.fields.catchability_coefficient
    }

    pub fn fishing_policy(&self) -> FishingPolicy {
        self.fields.fishing_policy
    }

    pub fn recruitment_noise_stddev(&self) -> f64 {
        self.fields.recruitment_noise_stddev
    }

    pub fn random_seed(&self) -> u64 {
        self.fields.random_seed
    }

    pub fn max_steps(&self) -> usize {
        self.fields.max_steps
    }
}

impl TryFrom<ConfigFields> for Config {
    type Error = ValidationError;

    fn try_from(fields: ConfigFields) -> Result<Self, Self::Error> {
        Config::new(fields)
    }
}

impl From<Config> for ConfigFields {
    fn from(config: Config) -> Self {
        config.fields
    }
}

fn validate(fields: &ConfigFields) -> Vec<Violation> {
    let mut violations = Vec::new();
    let mut check = |field: &'static str, result: Option<String>| {
        if let Some(reason) = result {
            violations.push(Violation::new(field, reason));
        }
    };

    check(
        "intrinsic_growth_rate",
        check_positive(fields.intrinsic_growth_rate),
    );
    check("carrying_capacity", check_positive(fields.carrying_capacity));
    // Stock entering a step is at most the capacity, so this bounds every
    // intermediate of the deterministic update.
    let peak = fields.carrying_capacity + fields.intrinsic_growth_rate * fields.carrying_capacity;
    let growth_is_valid = check_positive(fields.intrinsic_growth_rate).is_none()
        && check_positive(fields.carrying_capacity).is_none();
    if growth_is_valid {
        check("intrinsic_growth_rate", check_finite(peak, "growth at capacity"));
    }
    // An invalid capacity already has its own violation.
    let upper = if fields.carrying_capacity.is_finite() && fields.carrying_capacity > 0.0 {
        fields.carrying_capacity
    } else {
        f64::INFINITY
    };
    check("initial_stock", check_num(fields.initial_stock, 0.0..=upper));
    check(
        "natural_mortality_rate",
        check_num(fields.natural_mortality_rate, 0.0..1.0),
    );
    check(
        "catchability_coefficient",
        check_non_negative(fields.catchability_coefficient),
    );
    match fields.fishing_policy {
        FishingPolicy::EffortBased { effort } => {
            check("fishing_policy", check_non_negative(effort).map(|r| format!("effort {r}")))
        }
        FishingPolicy::QuotaBased { quota } => {
            check("fishing_policy", check_non_negative(quota).map(|r| format!("quota {r}")))
        }
    }
    check(
        "recruitment_noise_stddev",
        check_non_negative(fields.recruitment_noise_stddev),
    );
    if growth_is_valid
        && peak.is_finite()
        && check_non_negative(fields.recruitment_noise_stddev).is_none()
    {
        let spread = peak + NOISE_DEVIATIONS * fields.recruitment_noise_stddev;
        check(
            "recruitment_noise_stddev",
            check_finite(spread, "noisy growth at capacity"),
        );
    }
    check("max_steps", check_num(fields.max_steps, 1..));

    violations
}

fn check_num<T, R>(num: T, range: R) -> Option<String>
where
    T: PartialOrd + Debug,
    R: RangeBounds<T> + Debug,
{
    // NaN is contained in no range, so it is rejected here too.
    if !range.contains(&num) {
        return Some(format!("number must be in the range {range:?}, but is {num:?}"));
    }
    None
}

fn check_positive(num: f64) -> Option<String> {
    if !num.is_finite() || num <= 0.0 {
        return Some(format!("number must be finite and positive, but is {num:?}"));
    }
    None
}

fn check_finite(num: f64, what: &str) -> Option<String> {
    if !num.is_finite() {
        return Some(format!("{what} must be finite, but is {num:?}"));
    }
    None
}

fn check_non_negative(num: f64) -> Option<String> {
    if !num.is_finite() || num < 0.0 {
        return Some(format!("number must be finite and non-negative, but is {num:?}"));
    }
    None
}
