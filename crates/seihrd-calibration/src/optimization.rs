//! Optimization solver setup and execution

use std::time::Duration;

use argmin::core::observers::ObserverMode;
use argmin::core::{
    CostFunction, Executor, OptimizationResult, Solver, State as _, TerminationReason,
    TerminationStatus,
};
use argmin::solver::neldermead::NelderMead;
use argmin::solver::particleswarm::ParticleSwarm;
use argmin_observer_slog::SlogLogger;
use log::{info, warn};
use seihrd_core::{ParameterSet, SimulationEngine};
use serde::{Deserialize, Serialize};

use crate::error::CalibrationError;
use crate::likelihood::LikelihoodEvaluator;
use crate::types::OptimizationOutcome;

/// Relative step of each extra simplex vertex.
const SIMPLEX_RELATIVE_STEP: f64 = 0.1;
/// Absolute step used instead when a slot starts at zero.
const SIMPLEX_ZERO_STEP: f64 = 0.00025;

/// Log the optimization header in verbose mode
fn log_optimization_header(
    algorithm: &str,
    parameter_names: &[String],
    initial_values: &[f64],
    max_iterations: u64,
) {
    info!("=== {} optimization ===", algorithm);
    for (name, value) in parameter_names.iter().zip(initial_values) {
        info!("  {:<16} {:.6}", name, value);
    }
    info!("Max iterations: {}", max_iterations);
}

/// Run executor with the terminal observer attached
fn run_with_logging<O, S, I>(
    executor: Executor<O, S, I>,
) -> Result<OptimizationResult<O, S, I>, CalibrationError>
where
    O: CostFunction,
    S: Solver<O, I>,
    I: argmin::core::State,
{
    executor
        .add_observer(SlogLogger::term(), ObserverMode::Always)
        .run()
        .map_err(|e| CalibrationError::Solver(e.to_string()))
}

/// Configuration for Nelder-Mead optimization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NelderMeadConfig {
    /// Maximum number of iterations
    pub max_iterations: u64,

    /// Sample standard deviation tolerance (convergence criterion)
    /// Must be non-negative
    pub sd_tolerance: f64,

    /// Reflection parameter (alpha)
    /// Must be > 0, defaults to 1.0
    pub alpha: Option<f64>,

    /// Expansion parameter (gamma)
    /// Must be > 1, defaults to 2.0
    pub gamma: Option<f64>,

    /// Contraction parameter (rho)
    /// Must be in (0, 0.5], defaults to 0.5
    pub rho: Option<f64>,

    /// Shrinking parameter (sigma)
    /// Must be in (0, 1], defaults to 0.5
    pub sigma: Option<f64>,

    /// Wall-clock limit in seconds, fractions allowed
    pub timeout_seconds: Option<f64>,

    /// Attach the terminal observer
    pub verbose: bool,
}

impl Default for NelderMeadConfig {
    fn default() -> Self {
        Self {
            max_iterations: 5000,
            sd_tolerance: 1e-6,
            alpha: None, // Use argmin's default: 1.0
            gamma: None, // Use argmin's default: 2.0
            rho: None,   // Use argmin's default: 0.5
            sigma: None, // Use argmin's default: 0.5
            timeout_seconds: None,
            verbose: false,
        }
    }
}

impl NelderMeadConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_iterations(mut self, max_iterations: u64) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_sd_tolerance(mut self, tolerance: f64) -> Self {
        self.sd_tolerance = tolerance;
        self
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = Some(alpha);
        self
    }

    pub fn with_gamma(mut self, gamma: f64) -> Self {
        self.gamma = Some(gamma);
        self
    }

    pub fn with_rho(mut self, rho: f64) -> Self {
        self.rho = Some(rho);
        self
    }

    pub fn with_sigma(mut self, sigma: f64) -> Self {
        self.sigma = Some(sigma);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_seconds = Some(timeout.as_secs_f64());
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

/// Configuration for Particle Swarm Optimization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParticleSwarmConfig {
    /// Number of particles in the swarm
    pub num_particles: usize,

    /// Maximum number of iterations
    pub max_iterations: u64,

    /// Stop once the cost reaches this value
    pub target_cost: Option<f64>,

    /// Inertia weight applied to particle velocity
    /// Defaults to 1/(2*ln(2)) ≈ 0.721
    pub inertia_factor: Option<f64>,

    /// Attraction to the personal best
    /// Defaults to 0.5 + ln(2) ≈ 1.193
    pub cognitive_factor: Option<f64>,

    /// Attraction to the swarm best
    /// Defaults to 0.5 + ln(2) ≈ 1.193
    pub social_factor: Option<f64>,

    /// Wall-clock limit in seconds, fractions allowed
    pub timeout_seconds: Option<f64>,

    /// Attach the terminal observer
    pub verbose: bool,
}

impl Default for ParticleSwarmConfig {
    fn default() -> Self {
        Self {
            num_particles: 40,
            max_iterations: 500,
            target_cost: None,
            inertia_factor: None,   // Use argmin's default: 1/(2*ln(2))
            cognitive_factor: None, // Use argmin's default: 0.5 + ln(2)
            social_factor: None,    // Use argmin's default: 0.5 + ln(2)
            timeout_seconds: None,
            verbose: false,
        }
    }
}

impl ParticleSwarmConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_num_particles(mut self, num_particles: usize) -> Self {
        self.num_particles = num_particles;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: u64) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_target_cost(mut self, target_cost: f64) -> Self {
        self.target_cost = Some(target_cost);
        self
    }

    pub fn with_inertia_factor(mut self, factor: f64) -> Self {
        self.inertia_factor = Some(factor);
        self
    }

    pub fn with_cognitive_factor(mut self, factor: f64) -> Self {
        self.cognitive_factor = Some(factor);
        self
    }

    pub fn with_social_factor(mut self, factor: f64) -> Self {
        self.social_factor = Some(factor);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_seconds = Some(timeout.as_secs_f64());
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

/// Algorithm-specific optimization configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "algorithm", rename_all = "snake_case")]
pub enum OptimizationConfig {
    /// Nelder-Mead simplex method (local, gradient-free)
    NelderMead(NelderMeadConfig),

    /// Particle Swarm Optimization (global search within the bounds)
    ParticleSwarm(ParticleSwarmConfig),
}

impl Default for OptimizationConfig {
    fn default() -> Self {
        OptimizationConfig::NelderMead(NelderMeadConfig::default())
    }
}

impl OptimizationConfig {
    pub fn verbose(&self) -> bool {
        match self {
            OptimizationConfig::NelderMead(config) => config.verbose,
            OptimizationConfig::ParticleSwarm(config) => config.verbose,
        }
    }

    pub fn with_verbose(self, verbose: bool) -> Self {
        match self {
            OptimizationConfig::NelderMead(config) => {
                OptimizationConfig::NelderMead(config.with_verbose(verbose))
            }
            OptimizationConfig::ParticleSwarm(config) => {
                OptimizationConfig::ParticleSwarm(config.with_verbose(verbose))
            }
        }
    }
}

impl std::fmt::Display for OptimizationConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OptimizationConfig::NelderMead(_) => write!(f, "Nelder-Mead"),
            OptimizationConfig::ParticleSwarm(_) => write!(f, "Particle Swarm"),
        }
    }
}

/// Search for the parameters minimizing the evaluator's cost, i.e. maximizing
/// the log-likelihood.
///
/// The starting point is clamped to the evaluator's bounds. Running out of
/// iterations or time is reported through
/// [`OptimizationOutcome::converged`], not as an error.
///
/// # Example
///
/// ```rust,ignore
/// use seihrd_calibration::{optimize, NelderMeadConfig, OptimizationConfig};
///
/// let config = OptimizationConfig::NelderMead(
///     NelderMeadConfig::new()
///         .with_max_iterations(2000)
///         .with_sd_tolerance(1e-8),
/// );
///
/// let outcome = optimize(evaluator, &ParameterSet::prior(), &config)?;
/// println!("Best parameters: {:?}", outcome.parameters_map());
/// ```
pub fn optimize<E: SimulationEngine>(
    problem: LikelihoodEvaluator<E>,
    initial: &ParameterSet,
    config: &OptimizationConfig,
) -> Result<OptimizationOutcome, CalibrationError> {
    problem.bounds().validate()?;
    let initial_params = problem.bounds().clamp(&initial.to_vec());
    let parameter_names = ParameterSet::slot_names();

    info!(
        "Starting {} optimization over {} parameters",
        config,
        parameter_names.len()
    );

    let outcome = match config {
        OptimizationConfig::NelderMead(nm_config) => {
            optimize_nelder_mead(problem, initial_params, parameter_names, nm_config)
        }
        OptimizationConfig::ParticleSwarm(ps_config) => {
            optimize_particle_swarm(problem, initial_params, parameter_names, ps_config)
        }
    }?;

    if outcome.converged {
        info!(
            "{} converged after {} iterations ({} cost evaluations), cost {:.6}",
            config, outcome.iterations, outcome.cost_evaluations, outcome.best_cost
        );
    } else {
        warn!(
            "{} stopped without converging: {} after {} iterations, cost {:.6}",
            config, outcome.termination_reason, outcome.iterations, outcome.best_cost
        );
    }

    Ok(outcome)
}

/// Start point plus one vertex per slot, each moved along a single axis.
fn initial_simplex(initial_params: &[f64]) -> Vec<Vec<f64>> {
    let mut vertices = vec![initial_params.to_vec()];
    for i in 0..initial_params.len() {
        let mut vertex = initial_params.to_vec();
        if vertex[i] == 0.0 {
            vertex[i] = SIMPLEX_ZERO_STEP;
        } else {
            vertex[i] *= 1.0 + SIMPLEX_RELATIVE_STEP;
        }
        vertices.push(vertex);
    }
    vertices
}

/// Build Nelder-Mead solver from configuration
fn build_nelder_mead_solver(
    initial_params: &[f64],
    config: &NelderMeadConfig,
) -> Result<NelderMead<Vec<f64>, f64>, CalibrationError> {
    let solver_error = |what: &str, e: argmin::core::Error| {
        CalibrationError::Solver(format!("failed to set {}: {}", what, e))
    };

    let mut solver = NelderMead::new(initial_simplex(initial_params))
        .with_sd_tolerance(config.sd_tolerance)
        .map_err(|e| solver_error("sd_tolerance", e))?;

    if let Some(alpha) = config.alpha {
        solver = solver
            .with_alpha(alpha)
            .map_err(|e| solver_error("alpha", e))?;
    }

    if let Some(gamma) = config.gamma {
        solver = solver
            .with_gamma(gamma)
            .map_err(|e| solver_error("gamma", e))?;
    }

    if let Some(rho) = config.rho {
        solver = solver.with_rho(rho).map_err(|e| solver_error("rho", e))?;
    }

    if let Some(sigma) = config.sigma {
        solver = solver
            .with_sigma(sigma)
            .map_err(|e| solver_error("sigma", e))?;
    }

    Ok(solver)
}

fn timeout_duration(seconds: Option<f64>) -> Result<Option<Duration>, CalibrationError> {
    seconds
        .map(|s| {
            Duration::try_from_secs_f64(s).map_err(|e| {
                CalibrationError::Solver(format!("invalid timeout_seconds {}: {}", s, e))
            })
        })
        .transpose()
}

fn is_converged(status: &TerminationStatus) -> bool {
    matches!(
        status,
        TerminationStatus::Terminated(
            TerminationReason::SolverConverged | TerminationReason::TargetCostReached
        )
    )
}

fn termination_reason(status: &TerminationStatus) -> String {
    match status {
        TerminationStatus::Terminated(reason) => format!("{:?}", reason),
        TerminationStatus::NotTerminated => "NotTerminated".to_string(),
    }
}

/// Optimize using Nelder-Mead algorithm
fn optimize_nelder_mead<E: SimulationEngine>(
    problem: LikelihoodEvaluator<E>,
    initial_params: Vec<f64>,
    parameter_names: Vec<String>,
    config: &NelderMeadConfig,
) -> Result<OptimizationOutcome, CalibrationError> {
    let bounds = *problem.bounds();
    let solver = build_nelder_mead_solver(&initial_params, config)?;
    let mut executor =
        Executor::new(problem, solver).configure(|state| state.max_iters(config.max_iterations));
    if let Some(timeout) = timeout_duration(config.timeout_seconds)? {
        executor = executor.timeout(timeout);
    }

    let result = if config.verbose {
        log_optimization_header(
            "Nelder-Mead",
            &parameter_names,
            &initial_params,
            config.max_iterations,
        );
        info!("SD tolerance: {}", config.sd_tolerance);
        run_with_logging(executor)?
    } else {
        executor
            .run()
            .map_err(|e| CalibrationError::Solver(e.to_string()))?
    };

    let state = result.state();
    let best = state.best_param.clone().unwrap_or(initial_params);

    Ok(OptimizationOutcome {
        best_parameters: bounds.clamp(&best),
        parameter_names,
        best_cost: state.best_cost,
        iterations: state.iter,
        cost_evaluations: state.get_func_counts().get("cost_count").copied().unwrap_or(0),
        converged: is_converged(&state.termination_status),
        termination_reason: termination_reason(&state.termination_status),
    })
}

/// Optimize using Particle Swarm algorithm
fn optimize_particle_swarm<E: SimulationEngine>(
    problem: LikelihoodEvaluator<E>,
    initial_params: Vec<f64>,
    parameter_names: Vec<String>,
    config: &ParticleSwarmConfig,
) -> Result<OptimizationOutcome, CalibrationError> {
    let bounds = *problem.bounds();
    let solver_error = |what: &str, e: argmin::core::Error| {
        CalibrationError::Solver(format!("failed to set {}: {}", what, e))
    };

    let mut solver = ParticleSwarm::new((bounds.lower(), bounds.upper()), config.num_particles);

    if let Some(inertia) = config.inertia_factor {
        solver = solver
            .with_inertia_factor(inertia)
            .map_err(|e| solver_error("inertia_factor", e))?;
    }

    if let Some(cognitive) = config.cognitive_factor {
        solver = solver
            .with_cognitive_factor(cognitive)
            .map_err(|e| solver_error("cognitive_factor", e))?;
    }

    if let Some(social) = config.social_factor {
        solver = solver
            .with_social_factor(social)
            .map_err(|e| solver_error("social_factor", e))?;
    }

    let mut executor = Executor::new(problem, solver).configure(|state| {
        let mut state = state.max_iters(config.max_iterations);
        if let Some(target) = config.target_cost {
            state = state.target_cost(target);
        }
        state
    });
    if let Some(timeout) = timeout_duration(config.timeout_seconds)? {
        executor = executor.timeout(timeout);
    }

    let result = if config.verbose {
        log_optimization_header(
            "Particle Swarm",
            &parameter_names,
            &initial_params,
            config.max_iterations,
        );
        info!("Num particles: {}", config.num_particles);
        if let Some(target) = config.target_cost {
            info!("Target cost: {}", target);
        }
        run_with_logging(executor)?
    } else {
        executor
            .run()
            .map_err(|e| CalibrationError::Solver(e.to_string()))?
    };

    let state = result.state();

    // The swarm is seeded at random within the bounds, so the start point is
    // only a fallback.
    let (best_params, best_cost) = match &state.best_individual {
        Some(particle) => (particle.position.clone(), particle.cost),
        None => (initial_params, f64::INFINITY),
    };

    Ok(OptimizationOutcome {
        best_parameters: bounds.clamp(&best_params),
        parameter_names,
        best_cost,
        iterations: state.iter,
        cost_evaluations: state.get_func_counts().get("cost_count").copied().unwrap_or(0),
        converged: is_converged(&state.termination_status),
        termination_reason: termination_reason(&state.termination_status),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_simplex_perturbs_one_slot_each() {
        let mut start = ParameterSet::prior().to_vec();
        start[4] = 0.0;
        let simplex = initial_simplex(&start);

        assert_eq!(simplex.len(), start.len() + 1);
        assert_eq!(simplex[0], start);
        for (i, vertex) in simplex.iter().enumerate().skip(1) {
            let changed: Vec<usize> = (0..start.len()).filter(|&j| vertex[j] != start[j]).collect();
            assert_eq!(changed, vec![i - 1]);
        }
        assert!((simplex[1][0] - start[0] * 1.1).abs() < 1e-15);
        assert_eq!(simplex[5][4], 0.00025);
    }

    #[test]
    fn test_config_from_json() {
        let config: OptimizationConfig =
            serde_json::from_str(r#"{"algorithm": "nelder_mead", "max_iterations": 50}"#).unwrap();
        match config {
            OptimizationConfig::NelderMead(nm) => {
                assert_eq!(nm.max_iterations, 50);
                assert_eq!(nm.sd_tolerance, NelderMeadConfig::default().sd_tolerance);
            }
            other => panic!("unexpected config {:?}", other),
        }

        let config: OptimizationConfig = serde_json::from_str(
            r#"{"algorithm": "particle_swarm", "num_particles": 8, "timeout_seconds": 30}"#,
        )
        .unwrap();
        assert_eq!(
            config,
            OptimizationConfig::ParticleSwarm(
                ParticleSwarmConfig::new()
                    .with_num_particles(8)
                    .with_timeout(Duration::from_secs(30))
            )
        );
        assert!(!config.verbose());
        assert!(config.with_verbose(true).verbose());
    }

    #[test]
    fn test_invalid_solver_settings_are_errors() {
        let start = ParameterSet::prior().to_vec();
        let config = NelderMeadConfig::new().with_alpha(-1.0);
        assert!(matches!(
            build_nelder_mead_solver(&start, &config),
            Err(CalibrationError::Solver(_))
        ));
        let config = NelderMeadConfig::new().with_sd_tolerance(-1.0);
        assert!(build_nelder_mead_solver(&start, &config).is_err());
    }

    #[test]
    fn test_sub_second_timeout_is_kept() {
        let config = NelderMeadConfig::new().with_timeout(Duration::from_millis(250));
        assert_eq!(config.timeout_seconds, Some(0.25));
        assert_eq!(
            timeout_duration(config.timeout_seconds).unwrap(),
            Some(Duration::from_millis(250))
        );
        assert_eq!(timeout_duration(None).unwrap(), None);
        assert!(timeout_duration(Some(-1.0)).is_err());
        assert!(timeout_duration(Some(f64::NAN)).is_err());
    }

    #[test]
    fn test_converged_only_on_solver_criteria() {
        let converged = TerminationStatus::Terminated(TerminationReason::SolverConverged);
        let target = TerminationStatus::Terminated(TerminationReason::TargetCostReached);
        let budget = TerminationStatus::Terminated(TerminationReason::MaxItersReached);
        let timeout = TerminationStatus::Terminated(TerminationReason::Timeout);

        assert!(is_converged(&converged));
        assert!(is_converged(&target));
        assert!(!is_converged(&budget));
        assert!(!is_converged(&timeout));
        assert!(!is_converged(&TerminationStatus::NotTerminated));
        assert_eq!(termination_reason(&budget), "MaxItersReached");
    }
}
