//! Type definitions for calibration

use std::collections::HashMap;

use seihrd_core::{ParameterSet, Trajectory, NUM_PARAMETERS};
use serde::{Deserialize, Serialize};

use crate::error::CalibrationError;

/// Per-slot search bounds, expressed as two parameter sets.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParameterBounds {
    pub min: ParameterSet,
    pub max: ParameterSet,
}

impl Default for ParameterBounds {
    fn default() -> Self {
        Self::uniform(0.0, 5.0)
    }
}

impl ParameterBounds {
    /// Same `[min, max]` for every slot.
    pub fn uniform(min: f64, max: f64) -> Self {
        Self {
            min: ParameterSet::uniform(min, min, min, min, min, min),
            max: ParameterSet::uniform(max, max, max, max, max, max),
        }
    }

    pub fn new(min: ParameterSet, max: ParameterSet) -> Result<Self, CalibrationError> {
        let bounds = Self { min, max };
        bounds.validate()?;
        Ok(bounds)
    }

    /// Every slot must satisfy `0 <= min <= max < inf`.
    pub fn validate(&self) -> Result<(), CalibrationError> {
        let names = ParameterSet::slot_names();
        for ((name, lo), hi) in names.iter().zip(self.lower()).zip(self.upper()) {
            if !(lo.is_finite() && hi.is_finite()) || lo < 0.0 || lo > hi {
                return Err(CalibrationError::InvalidBounds(format!(
                    "{}: [{}, {}]",
                    name, lo, hi
                )));
            }
        }
        Ok(())
    }

    pub fn lower(&self) -> Vec<f64> {
        self.min.to_vec()
    }

    pub fn upper(&self) -> Vec<f64> {
        self.max.to_vec()
    }

    /// Clamp a flat vector slot by slot.
    pub fn clamp(&self, values: &[f64]) -> Vec<f64> {
        values
            .iter()
            .zip(self.lower().into_iter().zip(self.upper()))
            .map(|(value, (lo, hi))| value.clamp(lo, hi))
            .collect()
    }

    pub fn contains(&self, params: &ParameterSet) -> bool {
        params
            .to_vec()
            .iter()
            .zip(self.lower().into_iter().zip(self.upper()))
            .all(|(value, (lo, hi))| (lo..=hi).contains(value))
    }
}

/// Settings of the Poisson likelihood.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LikelihoodConfig {
    /// Lower limit applied to each observed rate. `0.0` keeps the exact
    /// semantics where a zero rate with a positive count scores `-inf`.
    pub rate_floor: f64,
}

impl Default for LikelihoodConfig {
    fn default() -> Self {
        Self { rate_floor: 0.0 }
    }
}

impl LikelihoodConfig {
    pub fn with_rate_floor(mut self, rate_floor: f64) -> Self {
        self.rate_floor = rate_floor;
        self
    }
}

/// Result from an optimization run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationOutcome {
    /// Best parameter values found, clamped to the bounds
    pub best_parameters: Vec<f64>,

    /// Slot names (in same order as best_parameters)
    pub parameter_names: Vec<String>,

    /// Negative log-likelihood at the best parameters
    pub best_cost: f64,

    pub iterations: u64,

    /// Number of cost function evaluations
    pub cost_evaluations: u64,

    /// True only when the solver's own stopping rule or the target cost ended
    /// the run
    pub converged: bool,

    pub termination_reason: String,
}

impl OptimizationOutcome {
    /// Get parameters as a HashMap for easy lookup
    pub fn parameters_map(&self) -> HashMap<String, f64> {
        self.parameter_names
            .iter()
            .zip(self.best_parameters.iter())
            .map(|(name, value)| (name.clone(), *value))
            .collect()
    }

    pub fn parameter_set(&self) -> Result<ParameterSet, CalibrationError> {
        Ok(ParameterSet::from_slice(&self.best_parameters)?)
    }
}

/// Everything a fit produces.
#[derive(Debug, Clone, Serialize)]
pub struct FitResult {
    pub parameters: ParameterSet,
    pub converged: bool,
    pub termination_reason: String,
    pub iterations: u64,
    pub cost_evaluations: u64,
    /// Score of the fitted parameters; `-inf` (serialised as `null`) when even
    /// the best candidate was infeasible.
    pub log_likelihood: f64,
    /// Score of the starting point.
    pub initial_log_likelihood: f64,
    pub trajectory: Trajectory,
}

impl FitResult {
    pub fn parameters_map(&self) -> HashMap<String, f64> {
        ParameterSet::slot_names()
            .into_iter()
            .zip(self.parameters.to_vec())
            .collect()
    }
}

pub(crate) fn slot_count_matches(values: &[f64]) -> Result<(), String> {
    if values.len() != NUM_PARAMETERS {
        return Err(format!(
            "Expected {} parameters, got {}",
            NUM_PARAMETERS,
            values.len()
        ));
    }
    Ok(())
}
