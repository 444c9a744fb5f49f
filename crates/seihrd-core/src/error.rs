use thiserror::Error;

use crate::types::age_band::AgeBand;

/// Errors raised while building model inputs.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CoreError {
    #[error("population of band '{band}' must be finite and > 0, got {value}")]
    InvalidPopulation { band: AgeBand, value: f64 },

    #[error("initial {compartment} of band '{band}' must be finite and >= 0, got {value}")]
    NegativeSeed {
        band: AgeBand,
        compartment: &'static str,
        value: f64,
    },

    #[error("initial seeds of band '{band}' sum to {seeded}, exceeding population {population}")]
    SeedsExceedPopulation {
        band: AgeBand,
        seeded: f64,
        population: f64,
    },

    #[error("expected {expected} values, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("time grid must contain at least one day")]
    EmptyGrid,
}

/// Errors raised while integrating the model.
///
/// These never abort a fit: the likelihood turns them into a penalty.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SimulationError {
    #[error("integration step budget of {max_steps} exhausted at t = {t}")]
    StepLimit { t: f64, max_steps: usize },

    #[error("step size {h} fell below the minimum at t = {t}")]
    StepSizeUnderflow { t: f64, h: f64 },

    #[error("state became non-finite at t = {t}")]
    NonFinite { t: f64 },

    #[error("invalid integrator settings: {0}")]
    InvalidSettings(String),
}
