//! Poisson likelihood of observed hospital and death counts.
//!
//! For every grid day and band with an observation, the simulated cumulative
//! admissions (the `H` compartment) and cumulative deaths (`D`) are scored as
//! Poisson counts whose rate is the observed value:
//!
//! ```text
//! log L = sum log p(H_sim; lambda = H_obs) + sum log p(D_sim; lambda = D_obs)
//! ```
//!
//! Simulated values are real, so the pmf uses the continuous extension
//! `k ln(lambda) - lambda - ln Gamma(k + 1)`.

use argmin::core::{CostFunction, Error};
use log::debug;
use seihrd_core::{AgeBand, Compartment, ParameterSet, SimulationEngine, TimeGrid, Trajectory};
use seihrd_data::{Observation, ObservedSeries};
use statrs::function::gamma::ln_gamma;

use crate::error::CalibrationError;
use crate::types::{slot_count_matches, LikelihoodConfig, ParameterBounds};

/// Smallest cost handed to the optimizer in place of `+inf`.
pub const NON_FINITE_PENALTY: f64 = 1e30;

/// Cap on the graded violation; also charged for failed simulations and
/// non-finite counts.
pub const MAX_VIOLATION: f64 = 1e12;

/// Log of the Poisson pmf at a real-valued count `k`.
///
/// Returns `-inf` when `k` is negative or non-finite, when `lambda` is
/// negative or non-finite, or when `lambda == 0` and `k > 0`.
pub fn log_poisson_pmf(k: f64, lambda: f64) -> f64 {
    if !k.is_finite() || k < 0.0 || !lambda.is_finite() || lambda < 0.0 {
        return f64::NEG_INFINITY;
    }
    if lambda == 0.0 {
        return if k == 0.0 { 0.0 } else { f64::NEG_INFINITY };
    }
    k * lambda.ln() - lambda - ln_gamma(k + 1.0)
}

/// Scores parameter sets against an aligned observed series.
///
/// The engine is a template: every evaluation runs a fresh clone from the
/// engine's initial state.
#[derive(Debug, Clone)]
pub struct LikelihoodEvaluator<E: SimulationEngine> {
    engine: E,
    observed: ObservedSeries,
    config: LikelihoodConfig,
    bounds: ParameterBounds,
}

impl<E: SimulationEngine> LikelihoodEvaluator<E> {
    pub fn new(
        engine: E,
        observed: ObservedSeries,
        config: LikelihoodConfig,
    ) -> Result<Self, CalibrationError> {
        if observed.observed_count() == 0 {
            return Err(CalibrationError::NoObservations);
        }
        Ok(Self {
            engine,
            observed,
            config,
            bounds: ParameterBounds::default(),
        })
    }

    /// Bounds applied to candidates coming through [`CostFunction::cost`].
    pub fn with_bounds(mut self, bounds: ParameterBounds) -> Self {
        self.bounds = bounds;
        self
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn observed(&self) -> &ObservedSeries {
        &self.observed
    }

    pub fn grid(&self) -> &TimeGrid {
        self.observed.grid()
    }

    pub fn config(&self) -> &LikelihoodConfig {
        &self.config
    }

    pub fn bounds(&self) -> &ParameterBounds {
        &self.bounds
    }

    /// Simulate `params` and score the result; `-inf` if the simulation fails.
    pub fn log_likelihood(&self, params: &ParameterSet) -> f64 {
        match self.simulate(params) {
            Some(trajectory) => self.score(&trajectory),
            None => f64::NEG_INFINITY,
        }
    }

    pub fn negative_log_likelihood(&self, params: &ParameterSet) -> f64 {
        -self.log_likelihood(params)
    }

    /// Score an existing trajectory laid out on the observed grid.
    pub fn score(&self, trajectory: &Trajectory) -> f64 {
        match self.assess(trajectory) {
            Assessment::Feasible(log_likelihood) => log_likelihood,
            Assessment::Infeasible(_) => f64::NEG_INFINITY,
        }
    }

    /// Cost of `params` as seen by the optimizer.
    ///
    /// Feasible candidates cost `-log L`. Infeasible ones cost at least
    /// [`NON_FINITE_PENALTY`], growing with how far they sit outside the
    /// likelihood's domain.
    pub fn penalised_cost(&self, params: &ParameterSet) -> f64 {
        let assessment = match self.simulate(params) {
            Some(trajectory) => self.assess(&trajectory),
            None => Assessment::Infeasible(MAX_VIOLATION),
        };
        match assessment {
            Assessment::Feasible(log_likelihood) => -log_likelihood,
            Assessment::Infeasible(violation) => {
                NON_FINITE_PENALTY * (1.0 + violation.min(MAX_VIOLATION))
            }
        }
    }

    fn simulate(&self, params: &ParameterSet) -> Option<Trajectory> {
        let mut engine = self.engine.clone();
        engine
            .run(params, self.observed.grid())
            .inspect_err(|e| debug!("Simulation failed during likelihood evaluation: {}", e))
            .ok()
    }

    fn assess(&self, trajectory: &Trajectory) -> Assessment {
        let mut total = 0.0;
        let mut violation = 0.0;
        for (day, state) in trajectory.states().iter().enumerate() {
            for band in AgeBand::ALL {
                let pairs = [
                    (Compartment::Hospitalised, self.observed.hospital(day, band)),
                    (Compartment::Deceased, self.observed.deaths(day, band)),
                ];
                for (compartment, observation) in pairs {
                    let Some(Observation { cumulative, .. }) = observation else {
                        continue;
                    };
                    let simulated = state.get(compartment, band);
                    let rate = self.rate(cumulative);
                    let term = log_poisson_pmf(simulated, rate);
                    if term.is_finite() {
                        total += term;
                    } else {
                        violation += term_violation(simulated, rate);
                    }
                }
            }
        }
        if violation > 0.0 {
            Assessment::Infeasible(violation)
        } else {
            Assessment::Feasible(total)
        }
    }

    fn rate(&self, observed: f64) -> f64 {
        if observed >= 0.0 {
            observed.max(self.config.rate_floor)
        } else {
            observed
        }
    }
}

enum Assessment {
    Feasible(f64),
    Infeasible(f64),
}

/// Distance of one out-of-domain term from the feasible region, plus one.
fn term_violation(k: f64, lambda: f64) -> f64 {
    if !k.is_finite() {
        return MAX_VIOLATION;
    }
    let mut distance = (-k).max(0.0);
    if lambda == 0.0 {
        distance += k.max(0.0);
    }
    1.0 + distance
}

impl<E: SimulationEngine> CostFunction for LikelihoodEvaluator<E> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, param_values: &Self::Param) -> Result<Self::Output, Error> {
        slot_count_matches(param_values).map_err(Error::msg)?;

        // Nelder-Mead may step outside the bounds; never simulate there.
        let clamped = self.bounds.clamp(param_values);
        let params = ParameterSet::from_slice(&clamped)?;

        Ok(self.penalised_cost(&params))
    }
}
