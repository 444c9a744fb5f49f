//! End-to-end fit: optimize, re-simulate, assemble the result.

use log::{info, warn};
use seihrd_core::{ParameterSet, SimulationEngine};

use crate::error::CalibrationError;
use crate::likelihood::{LikelihoodEvaluator, NON_FINITE_PENALTY};
use crate::optimization::{optimize, OptimizationConfig};
use crate::results::ResultExtractor;
use crate::types::{FitResult, ParameterBounds};

/// Fit the model behind `evaluator` starting from `initial`.
///
/// `bounds` replaces whatever bounds the evaluator carried.
pub fn fit<E: SimulationEngine>(
    evaluator: LikelihoodEvaluator<E>,
    initial: &ParameterSet,
    bounds: ParameterBounds,
    config: &OptimizationConfig,
) -> Result<FitResult, CalibrationError> {
    bounds.validate()?;
    let evaluator = evaluator.with_bounds(bounds);

    let start = ParameterSet::from_slice(&bounds.clamp(&initial.to_vec()))?;
    let initial_log_likelihood = evaluator.log_likelihood(&start);
    if initial_log_likelihood.is_finite() {
        info!("Initial log-likelihood: {:.6}", initial_log_likelihood);
    } else {
        warn!(
            "Start point is outside the likelihood's domain; searching on the graded penalty \
             (consider a positive rate_floor)"
        );
    }

    let extractor = ResultExtractor::new(evaluator.engine().clone(), *evaluator.grid());
    let outcome = optimize(evaluator, &start, config)?;

    let parameters = outcome.parameter_set()?;
    let trajectory = extractor.simulate(&parameters)?;

    let log_likelihood = if outcome.best_cost.is_finite() && outcome.best_cost < NON_FINITE_PENALTY
    {
        -outcome.best_cost
    } else {
        f64::NEG_INFINITY
    };
    info!("Fitted log-likelihood: {:.6}", log_likelihood);

    Ok(FitResult {
        parameters,
        converged: outcome.converged,
        termination_reason: outcome.termination_reason,
        iterations: outcome.iterations,
        cost_evaluations: outcome.cost_evaluations,
        log_likelihood,
        initial_log_likelihood,
        trajectory,
    })
}
