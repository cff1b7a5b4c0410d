//! Population dynamics of a fished stock.
//!
//! A [`Config`] is validated once, then [`run_simulation`] (or an [`Engine`]
//! advanced step by step) applies natural mortality, logistic recruitment with
//! optional noise, harvest and the capacity clamp each step, producing one
//! [`StepRecord`] per step until the step budget is spent or the stock
//! collapses.

pub mod analysis;
pub mod config;
pub mod driver;
pub mod engine;
pub mod error;
pub mod harvest;
pub mod manager;
pub mod model;
pub mod recruitment;
pub mod stats;

pub use config::{Config, ConfigFields, FishingPolicy};
pub use driver::{run_simulation, validate_and_build_configuration};
pub use engine::Engine;
pub use error::{SimulationError, SimulationErrorKind, ValidationError, Violation};
pub use model::{Phase, PopulationState, RunResult, RunSummary, StepRecord};
pub use stats::{Moments, RunStatistics};
