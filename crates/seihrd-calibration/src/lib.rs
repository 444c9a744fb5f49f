//! Maximum-likelihood calibration of the SEIHRD model.
//!
//! [`LikelihoodEvaluator`] implements argmin's `CostFunction` on top of any
//! [`SimulationEngine`](seihrd_core::SimulationEngine), [`optimize`] drives
//! Nelder-Mead or Particle Swarm over the 18 rate slots, and [`fit`] ties the
//! search to a final re-simulation.

pub mod error;
pub mod fit;
pub mod likelihood;
pub mod optimization;
pub mod results;
pub mod types;

pub use error::CalibrationError;
pub use fit::fit;
pub use likelihood::{
    log_poisson_pmf, LikelihoodEvaluator, MAX_VIOLATION, NON_FINITE_PENALTY,
};
pub use optimization::{optimize, NelderMeadConfig, OptimizationConfig, ParticleSwarmConfig};
pub use results::{CompartmentSeries, ExtractedSeries, ResultExtractor};
pub use types::{FitResult, LikelihoodConfig, OptimizationOutcome, ParameterBounds};
